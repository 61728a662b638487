//! Consent decisions and the records the ledger keeps.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{ContentHash, Origin};

/// What the origin was trying to do when consent was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ConsentOperation {
    /// Asking whether a file is stored (it is not, as far as the prompt knows).
    CheckExistence,
    /// Reading a file that is stored.
    AccessContent,
    /// Obtaining a handle that may store the file.
    Create,
}

impl ConsentOperation {
    /// Classifies a request by its create flag and whether the entry exists.
    #[must_use]
    pub const fn classify(create: bool, exists_already: bool) -> Self {
        match (create, exists_already) {
            (true, _) => Self::Create,
            (false, true) => Self::AccessContent,
            (false, false) => Self::CheckExistence,
        }
    }
}

/// The user's answer to a consent prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ConsentChoice {
    /// Allow this request only. Never remembered.
    AllowOnce,
    /// Allow this and every later request for the same origin and hash.
    AllowPersistent,
    /// Refuse the request.
    Deny,
}

impl ConsentChoice {
    /// Button label shown by the prompter.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AllowOnce => "Allow this time",
            Self::AllowPersistent => "Allow on every visit",
            Self::Deny => "Don't allow",
        }
    }

    /// Choices in the order a prompter presents them.
    pub const ALL: [Self; 3] = [Self::AllowOnce, Self::AllowPersistent, Self::Deny];

    /// Whether the choice grants access.
    #[must_use]
    pub const fn is_allow(self) -> bool {
        matches!(self, Self::AllowOnce | Self::AllowPersistent)
    }
}

/// A remembered consent decision for one origin and one content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Origin the decision applies to.
    pub origin: Origin,
    /// Content hash the decision applies to.
    pub hash: ContentHash,
    /// Operation that triggered the prompt.
    pub operation: ConsentOperation,
    /// The user's answer.
    pub decision: ConsentChoice,
    /// Unix time, in seconds, the answer was given.
    pub timestamp: u64,
}
