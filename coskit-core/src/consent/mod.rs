//! Consent: the ledger of remembered decisions, the prompter capability, and
//! the permission state machine that ties them together.

mod ledger;
mod machine;
mod prompter;
mod record;

pub use ledger::{ConsentLedger, LedgerSnapshot};
pub use machine::{
    Access, DecisionSource, PermissionRequest, PermissionState, PermissionStateMachine,
    Resolution,
};
pub use prompter::{ConsentPrompter, PromptError, PromptRequest, StaticPrompter};
pub use record::{ConsentChoice, ConsentOperation, ConsentRecord};
