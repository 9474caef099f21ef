//! Identifier newtypes for the planning domain.
//!
//! Each identifier wraps a UUID so that epic, feature, story, and bug
//! identifiers cannot be mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the wrapped UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for an epic.
    EpicId
);
uuid_identifier!(
    /// Unique identifier for a feature.
    FeatureId
);
uuid_identifier!(
    /// Unique identifier for a user story.
    StoryId
);
uuid_identifier!(
    /// Unique identifier for a bug.
    BugId
);
uuid_identifier!(
    /// Unique identifier for a user who owns planning artefacts.
    UserId
);
uuid_identifier!(
    /// Unique identifier for a decision log entry.
    DecisionId
);
uuid_identifier!(
    /// Unique identifier for a transcript or conversation event.
    EventId
);

/// Identifier of a pending epic proposal.
///
/// Proposal identifiers are opaque strings so callers may echo back any value
/// they were given; generated identifiers carry a `prop_` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
    /// Generates a fresh proposal identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("prop_{}", Uuid::new_v4().simple()))
    }

    /// Wraps an existing proposal identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ProposalId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
