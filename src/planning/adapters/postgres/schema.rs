//! Diesel schema for planning persistence.

diesel::table! {
    /// Epic aggregate rows.
    epics (id) {
        /// Epic identifier.
        id -> Uuid,
        /// Owning user.
        owner_id -> Uuid,
        /// Epic title.
        title -> Text,
        /// Confirmed problem statement.
        problem_statement -> Nullable<Text>,
        /// Confirmed desired outcome.
        desired_outcome -> Nullable<Text>,
        /// Confirmed summary.
        summary -> Nullable<Text>,
        /// Lifecycle stage.
        #[max_length = 50]
        stage -> Varchar,
        /// Pending proposal payload.
        pending_proposal -> Nullable<Jsonb>,
        /// Insertion order.
        position -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Feature rows.
    features (id) {
        /// Feature identifier.
        id -> Uuid,
        /// Owning epic.
        epic_id -> Uuid,
        /// Title.
        title -> Text,
        /// Description.
        description -> Nullable<Text>,
        /// Acceptance criteria as a JSON array of strings.
        acceptance_criteria -> Jsonb,
        /// Labels as a JSON array of strings.
        labels -> Jsonb,
        /// Lifecycle stage.
        #[max_length = 50]
        stage -> Varchar,
        /// Approval timestamp.
        approved_at -> Nullable<Timestamptz>,
        /// Insertion order.
        position -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// User story rows.
    user_stories (id) {
        /// Story identifier.
        id -> Uuid,
        /// Owning feature, unset for standalone stories.
        feature_id -> Nullable<Uuid>,
        /// Owning user of a standalone story.
        owner_id -> Nullable<Uuid>,
        /// Title.
        title -> Text,
        /// Description.
        description -> Nullable<Text>,
        /// Acceptance criteria as a JSON array of strings.
        acceptance_criteria -> Jsonb,
        /// Labels as a JSON array of strings.
        labels -> Jsonb,
        /// Lifecycle stage.
        #[max_length = 50]
        stage -> Varchar,
        /// Approval timestamp.
        approved_at -> Nullable<Timestamptz>,
        /// Insertion order.
        position -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Bug rows.
    bugs (id) {
        /// Bug identifier.
        id -> Uuid,
        /// Owning user.
        owner_id -> Uuid,
        /// Severity.
        #[max_length = 20]
        severity -> Varchar,
        /// Title.
        title -> Text,
        /// Description.
        description -> Nullable<Text>,
        /// Acceptance criteria as a JSON array of strings.
        acceptance_criteria -> Jsonb,
        /// Labels as a JSON array of strings.
        labels -> Jsonb,
        /// Lifecycle stage.
        #[max_length = 50]
        stage -> Varchar,
        /// Approval timestamp.
        approved_at -> Nullable<Timestamptz>,
        /// Insertion order.
        position -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Typed links from bugs to other entities.
    bug_links (bug_id, target_kind, target_id) {
        /// Linked bug.
        bug_id -> Uuid,
        /// Target entity kind.
        #[max_length = 20]
        target_kind -> Varchar,
        /// Target entity identifier.
        target_id -> Uuid,
        /// Link type.
        #[max_length = 20]
        link_type -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only decision log.
    decision_logs (id) {
        /// Entry identifier.
        id -> Uuid,
        /// Decided epic.
        epic_id -> Uuid,
        /// Decided proposal.
        #[max_length = 100]
        proposal_id -> Varchar,
        /// Decision outcome.
        #[max_length = 20]
        outcome -> Varchar,
        /// Targeted epic field.
        #[max_length = 50]
        field -> Varchar,
        /// Stage before the decision.
        #[max_length = 50]
        from_stage -> Varchar,
        /// Stage after the decision.
        #[max_length = 50]
        to_stage -> Varchar,
        /// Proposed content snapshot.
        content -> Text,
        /// Insertion order.
        position -> Int8,
        /// Decision timestamp.
        decided_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only deletion receipts.
    deletion_receipts (id) {
        /// Receipt identifier.
        id -> Uuid,
        /// Deleted entity kind.
        #[max_length = 20]
        target_kind -> Varchar,
        /// Deleted entity identifier.
        target_id -> Uuid,
        /// Confirming user.
        actor_id -> Uuid,
        /// Stated reason.
        reason -> Text,
        /// Append-only rows removed with the entity.
        cascaded_rows -> Int8,
        /// Insertion order.
        position -> Int8,
        /// Deletion timestamp.
        deleted_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(epics, features, user_stories, bugs, bug_links);
