use std::sync::Arc;

use async_trait::async_trait;
use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::Timestamp;
use palaver_core::{Identity, UserClass};
use palaver_config::QuotaConfig;
use serde::Serialize;

use crate::error::QuotaError;
use crate::storage::memory::MemoryQuotaStore;
use crate::storage::redis::RedisQuotaStore;

/// Class-dependent daily allotments and the borrow ceiling
#[derive(Debug, Clone, Copy)]
pub struct QuotaLimits {
    /// Daily allotment for guest identities
    pub guest_daily: u32,
    /// Daily allotment for account identities
    pub regular_daily: u32,
    /// Maximum outstanding borrowed amount
    pub max_borrow: u32,
}

impl QuotaLimits {
    /// Extract limits from configuration
    #[must_use]
    pub const fn from_config(config: &QuotaConfig) -> Self {
        Self {
            guest_daily: config.guest_daily_credits,
            regular_daily: config.regular_daily_credits,
            max_borrow: config.max_borrow,
        }
    }

    /// Daily allotment for a user class
    #[must_use]
    pub const fn daily(&self, class: UserClass) -> u32 {
        match class {
            UserClass::Guest => self.guest_daily,
            UserClass::Regular => self.regular_daily,
        }
    }
}

/// Point-in-time view of an identity's credit state
#[derive(Debug, Clone, Serialize)]
pub struct CreditSnapshot {
    /// User class the snapshot was resolved for
    pub class: UserClass,
    /// Credits remaining today
    pub remaining: u32,
    /// Daily allotment for the class
    pub daily: u32,
    /// Outstanding borrowed amount
    pub borrowed: u32,
    /// When the balance next resets (UTC midnight)
    pub reset_at: Timestamp,
}

/// Result of an atomic check-and-debit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebitOutcome {
    /// Whether the debit was applied
    pub allowed: bool,
    /// Balance after the call (unchanged when rejected)
    pub remaining: u32,
    /// Borrow headroom after the call
    pub borrow_available: u32,
}

/// Result of an explicit borrow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowOutcome {
    /// Whether the borrow was applied
    pub allowed: bool,
    /// Balance after the call
    pub remaining: u32,
    /// Outstanding borrowed amount after the call
    pub borrowed: u32,
    /// Borrow headroom after the call
    pub borrow_available: u32,
}

/// Storage backend for the credit ledger
///
/// Implementations apply the lazy UTC-midnight reset and the requested
/// mutation as one atomic step per identity key.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Resolve the current state, applying a lazy reset if stale
    async fn snapshot(&self, key: &str, class: UserClass, now: Timestamp) -> Result<CreditSnapshot, QuotaError>;

    /// Atomically check and debit `amount`, borrowing the shortfall if
    /// it fits under the ceiling
    async fn try_debit(
        &self,
        key: &str,
        class: UserClass,
        amount: u32,
        now: Timestamp,
    ) -> Result<DebitOutcome, QuotaError>;

    /// Atomically borrow `amount` from the next day's allotment
    async fn borrow(
        &self,
        key: &str,
        class: UserClass,
        amount: u32,
        now: Timestamp,
    ) -> Result<BorrowOutcome, QuotaError>;
}

/// Credit ledger facade over a storage backend
#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn QuotaStore>,
}

impl CreditLedger {
    /// Wrap an existing store
    #[must_use]
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    /// Ledger backed by in-process memory
    #[must_use]
    pub fn in_memory(limits: QuotaLimits) -> Self {
        Self::new(Arc::new(MemoryQuotaStore::new(limits)))
    }

    /// Ledger backed by Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis URL is invalid
    pub fn redis(url: &str, limits: QuotaLimits) -> Result<Self, QuotaError> {
        Ok(Self::new(Arc::new(RedisQuotaStore::new(url, limits)?)))
    }

    /// Current credit state for an identity
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails
    pub async fn snapshot(&self, identity: &Identity) -> Result<CreditSnapshot, QuotaError> {
        self.snapshot_at(identity, Timestamp::now()).await
    }

    /// `snapshot` with an explicit clock, for tests
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails
    pub async fn snapshot_at(&self, identity: &Identity, now: Timestamp) -> Result<CreditSnapshot, QuotaError> {
        self.store.snapshot(identity.key(), identity.class(), now).await
    }

    /// Atomically check and debit credits for an identity
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails
    pub async fn try_debit(&self, identity: &Identity, amount: u32) -> Result<DebitOutcome, QuotaError> {
        self.try_debit_at(identity, amount, Timestamp::now()).await
    }

    /// `try_debit` with an explicit clock, for tests
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails
    pub async fn try_debit_at(
        &self,
        identity: &Identity,
        amount: u32,
        now: Timestamp,
    ) -> Result<DebitOutcome, QuotaError> {
        self.store.try_debit(identity.key(), identity.class(), amount, now).await
    }

    /// Borrow credits from the next day's allotment
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails
    pub async fn borrow(&self, identity: &Identity, amount: u32) -> Result<BorrowOutcome, QuotaError> {
        self.borrow_at(identity, amount, Timestamp::now()).await
    }

    /// `borrow` with an explicit clock, for tests
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails
    pub async fn borrow_at(
        &self,
        identity: &Identity,
        amount: u32,
        now: Timestamp,
    ) -> Result<BorrowOutcome, QuotaError> {
        self.store.borrow(identity.key(), identity.class(), amount, now).await
    }
}

/// Civil date of a timestamp in UTC
pub(crate) fn utc_day(ts: Timestamp) -> Date {
    ts.to_zoned(TimeZone::UTC).date()
}

/// UTC midnight at the start of the timestamp's day
pub(crate) fn start_of_utc_day(ts: Timestamp) -> Timestamp {
    utc_day(ts)
        .to_zoned(TimeZone::UTC)
        .expect("UTC midnight is always valid")
        .timestamp()
}

/// The UTC midnight at which a balance observed at `ts` resets
pub(crate) fn next_utc_midnight(ts: Timestamp) -> Timestamp {
    utc_day(ts)
        .tomorrow()
        .expect("date within supported range")
        .to_zoned(TimeZone::UTC)
        .expect("UTC midnight is always valid")
        .timestamp()
}
