//! Default values shared by the broker, its configuration and the CLI.

/// Storage partition under which all content-addressed entries live.
pub const STORAGE_PARTITION: &str = "cross-origin-storage";

/// Whether a `deny` answer is remembered in the consent ledger.
///
/// `false` means every request after a denial prompts again.
pub const REMEMBER_DENIALS: bool = false;

/// Whether written bytes are re-hashed and checked against the handle's hash.
pub const VERIFY_WRITES: bool = false;

/// Version tag written into consent ledger snapshots.
pub const LEDGER_SNAPSHOT_VERSION: u32 = 1;
