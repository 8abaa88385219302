//! Daily credit ledger for Palaver
//!
//! Tracks a per-identity balance that lazily resets at UTC midnight and
//! supports limited borrowing against the next day's allotment. The
//! check-and-debit operation is atomic relative to concurrent requests
//! for the same identity: the memory backend serializes on the map
//! entry, the Redis backend runs a single server-side script.

mod cost;
mod error;
mod ledger;
pub mod storage;

pub use cost::{FixedPricing, PricingState, effective_cost};
pub use error::QuotaError;
pub use ledger::{BorrowOutcome, CreditLedger, CreditSnapshot, DebitOutcome, QuotaLimits, QuotaStore};
