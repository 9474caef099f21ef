//! Diesel schema for sync persistence.

diesel::table! {
    /// Per-user tracker integrations.
    external_integrations (id) {
        /// Integration identifier.
        id -> Uuid,
        /// Owning user.
        user_id -> Uuid,
        /// Tracker tag.
        #[max_length = 20]
        provider -> Varchar,
        /// Connection status.
        #[max_length = 20]
        status -> Varchar,
        /// Encrypted access token.
        access_token_encrypted -> Nullable<Bytea>,
        /// Encrypted refresh token.
        refresh_token_encrypted -> Nullable<Bytea>,
        /// Access token expiry.
        token_expires_at -> Nullable<Timestamptz>,
        /// Default project.
        default_project -> Nullable<Text>,
        /// Default team.
        default_team -> Nullable<Text>,
        /// Field mapping configuration.
        field_mapping -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Links between local entities and external issues.
    external_push_mappings (user_id, provider, entity_kind, entity_id) {
        /// Owning user.
        user_id -> Uuid,
        /// Tracker tag.
        #[max_length = 20]
        provider -> Varchar,
        /// Local entity kind.
        #[max_length = 20]
        entity_kind -> Varchar,
        /// Local entity identifier.
        entity_id -> Uuid,
        /// Tracker identifier.
        external_id -> Text,
        /// Human-readable tracker key.
        external_key -> Nullable<Text>,
        /// Browser URL.
        external_url -> Nullable<Text>,
        /// Time of the last successful push.
        last_pushed_at -> Timestamptz,
        /// Hash of the payload last sent.
        #[max_length = 64]
        last_push_hash -> Bpchar,
    }
}

diesel::table! {
    /// Push run audit records.
    external_push_runs (id) {
        /// Run identifier.
        id -> Uuid,
        /// Pushing user.
        user_id -> Uuid,
        /// Tracker tag.
        #[max_length = 20]
        provider -> Varchar,
        /// Root epic.
        epic_id -> Uuid,
        /// Push scope.
        #[max_length = 30]
        scope -> Varchar,
        /// Whether linked bugs were included.
        include_bugs -> Bool,
        /// Whether network calls were suppressed.
        is_dry_run -> Bool,
        /// Run status.
        #[max_length = 20]
        status -> Varchar,
        /// Created issues.
        created -> Jsonb,
        /// Updated issues.
        updated -> Jsonb,
        /// Failed entities.
        failed -> Jsonb,
        /// Skipped entities.
        skipped -> Jsonb,
        /// Dry-run classifications.
        preview -> Jsonb,
        /// Summary counts.
        summary -> Jsonb,
        /// Start time.
        started_at -> Timestamptz,
        /// End time.
        ended_at -> Nullable<Timestamptz>,
    }
}
