use async_trait::async_trait;
use dashmap::DashMap;
use jiff::Timestamp;
use palaver_core::UserClass;

use crate::error::QuotaError;
use crate::ledger::{
    BorrowOutcome, CreditSnapshot, DebitOutcome, QuotaLimits, QuotaStore, next_utc_midnight, start_of_utc_day, utc_day,
};

/// Per-identity ledger entry
#[derive(Debug, Clone, Copy)]
struct Entry {
    balance: u32,
    borrowed: u32,
    last_reset: Timestamp,
}

impl Entry {
    fn fresh(daily: u32, now: Timestamp) -> Self {
        Self {
            balance: daily,
            borrowed: 0,
            last_reset: start_of_utc_day(now),
        }
    }

    /// Apply the lazy UTC-midnight reset if the entry is stale
    fn reset_if_stale(&mut self, daily: u32, now: Timestamp) {
        if utc_day(now) > utc_day(self.last_reset) {
            self.balance = daily;
            self.borrowed = 0;
            self.last_reset = start_of_utc_day(now);
        }
    }
}

/// In-memory ledger store (single instance only)
///
/// Concurrent debits for one identity serialize on the map entry, so
/// check-and-debit is atomic without a separate lock.
pub struct MemoryQuotaStore {
    limits: QuotaLimits,
    entries: DashMap<String, Entry>,
}

impl MemoryQuotaStore {
    /// Create an empty store
    #[must_use]
    pub fn new(limits: QuotaLimits) -> Self {
        Self {
            limits,
            entries: DashMap::new(),
        }
    }

    fn with_entry<T>(&self, key: &str, class: UserClass, now: Timestamp, f: impl FnOnce(&mut Entry, u32, u32) -> T) -> T {
        let daily = self.limits.daily(class);
        let mut entry = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Entry::fresh(daily, now));
        let state = entry.value_mut();
        state.reset_if_stale(daily, now);
        f(state, daily, self.limits.max_borrow)
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn snapshot(&self, key: &str, class: UserClass, now: Timestamp) -> Result<CreditSnapshot, QuotaError> {
        Ok(self.with_entry(key, class, now, |state, daily, _| CreditSnapshot {
            class,
            remaining: state.balance,
            daily,
            borrowed: state.borrowed,
            reset_at: next_utc_midnight(now),
        }))
    }

    async fn try_debit(
        &self,
        key: &str,
        class: UserClass,
        amount: u32,
        now: Timestamp,
    ) -> Result<DebitOutcome, QuotaError> {
        Ok(self.with_entry(key, class, now, |state, _, max_borrow| {
            if state.balance >= amount {
                state.balance -= amount;
                return DebitOutcome {
                    allowed: true,
                    remaining: state.balance,
                    borrow_available: max_borrow - state.borrowed,
                };
            }

            let shortfall = amount - state.balance;
            let available = max_borrow - state.borrowed;

            if shortfall <= available {
                state.borrowed += shortfall;
                state.balance = 0;
                DebitOutcome {
                    allowed: true,
                    remaining: 0,
                    borrow_available: max_borrow - state.borrowed,
                }
            } else {
                DebitOutcome {
                    allowed: false,
                    remaining: state.balance,
                    borrow_available: available,
                }
            }
        }))
    }

    async fn borrow(
        &self,
        key: &str,
        class: UserClass,
        amount: u32,
        now: Timestamp,
    ) -> Result<BorrowOutcome, QuotaError> {
        Ok(self.with_entry(key, class, now, |state, _, max_borrow| {
            let available = max_borrow - state.borrowed;

            if amount <= available {
                state.borrowed += amount;
                state.balance += amount;
                BorrowOutcome {
                    allowed: true,
                    remaining: state.balance,
                    borrowed: state.borrowed,
                    borrow_available: max_borrow - state.borrowed,
                }
            } else {
                BorrowOutcome {
                    allowed: false,
                    remaining: state.balance,
                    borrowed: state.borrowed,
                    borrow_available: available,
                }
            }
        }))
    }
}
