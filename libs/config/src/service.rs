//! Service configuration defaults
//!
//! Default values shared by the pool service, its CLI, and tests.

/// Pool economics defaults
pub mod pool {
    /// Trading fee in basis points (30 = 0.3%)
    pub const DEFAULT_FEE_BPS: u32 = 30;

    /// Extra allowance requested on top of the exact deposit amount
    pub const DEFAULT_APPROVAL_CUSHION_BPS: u32 = 0;

    /// Development pool account
    pub const DEFAULT_POOL_ACCOUNT: &str = "0x00000000000000000000000000000000000d3c5a";
}

/// Serialised-writer service defaults
pub mod service {
    /// Bounded command mailbox size
    pub const MAILBOX_CAPACITY: usize = 1024;

    /// Default deadline for a single pool operation (milliseconds)
    pub const OP_TIMEOUT_MS: u64 = 30_000;
}

/// Storage defaults
pub mod storage {
    pub const STATE_DIR: &str = "./data/dex";
    pub const SNAPSHOT_FILE: &str = "pool_state.bin";
    pub const LEDGER_FILE: &str = "dev_ledger.bin";
}
