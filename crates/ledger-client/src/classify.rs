//! Classification of `getBlock` failures.
//!
//! The RPC node reports a missing block in several shapes: a dedicated error
//! code, or a free-text message on older node versions. Everything that means
//! "this slot holds no block" collapses into [`LedgerError::NotFound`] here,
//! at the collaborator boundary, so callers never match on message text.

use crate::LedgerError;

/// Block not available for slot.
const BLOCK_NOT_AVAILABLE: i64 = -32004;
/// Slot was skipped, or missing due to ledger jump to recent snapshot.
const SLOT_SKIPPED: i64 = -32007;
/// Slot was skipped, or missing in long-term storage.
const LONG_TERM_STORAGE_SLOT_SKIPPED: i64 = -32009;

/// Message fragments older node versions emit for absent blocks.
const NOT_FOUND_PATTERNS: [&str; 3] = [
    "Block not available",
    "failed to get confirmed block",
    "was skipped",
];

pub(crate) fn classify_rpc_error(code: i64, message: String) -> LedgerError {
    match code {
        BLOCK_NOT_AVAILABLE | SLOT_SKIPPED | LONG_TERM_STORAGE_SLOT_SKIPPED => {
            LedgerError::NotFound
        }
        _ if NOT_FOUND_PATTERNS
            .iter()
            .any(|pattern| message.contains(pattern)) =>
        {
            LedgerError::NotFound
        }
        _ => LedgerError::Rpc { code, message },
    }
}
