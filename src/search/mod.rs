//! Search coordination layer.
//!
//! - **[`generation`]**: the ledger deciding which search attempt is current.
//! - **[`debounce`]**: keystroke debouncing with single pending commit.
//! - **[`cache`]**: TTL-gated memoization of sub-query results.
//! - **[`classify`]**: barcode-like vs name-like query classification.
//! - **[`catalog`]**: the data collaborator trait.
//! - **[`local`]**: synchronous direct-field matching.
//! - **[`fanout`]**: concurrent sub-query fan-out and merge.

pub mod cache;
pub mod catalog;
pub mod classify;
pub mod debounce;
pub mod fanout;
pub mod generation;
pub mod local;
