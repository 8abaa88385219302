use async_trait::async_trait;
use jiff::Timestamp;
use palaver_core::UserClass;

use crate::error::QuotaError;
use crate::ledger::{BorrowOutcome, CreditSnapshot, DebitOutcome, QuotaLimits, QuotaStore, next_utc_midnight, utc_day};

/// Lazy reset + check-and-debit as one server-side step
///
/// KEYS[1] = ledger hash; ARGV = daily, max_borrow, amount, today.
/// Returns {allowed, balance, borrowed}.
const DEBIT_SCRIPT: &str = r"
local daily = tonumber(ARGV[1])
local max_borrow = tonumber(ARGV[2])
local amount = tonumber(ARGV[3])
local today = ARGV[4]
local balance = tonumber(redis.call('HGET', KEYS[1], 'balance'))
local borrowed = tonumber(redis.call('HGET', KEYS[1], 'borrowed'))
local day = redis.call('HGET', KEYS[1], 'day')
if balance == nil or day ~= today then
  balance = daily
  borrowed = 0
end
local allowed = 0
if balance >= amount then
  balance = balance - amount
  allowed = 1
else
  local shortfall = amount - balance
  if shortfall <= (max_borrow - borrowed) then
    borrowed = borrowed + shortfall
    balance = 0
    allowed = 1
  end
end
redis.call('HSET', KEYS[1], 'balance', balance, 'borrowed', borrowed, 'day', today)
return {allowed, balance, borrowed}
";

/// Lazy reset + read. Returns {balance, borrowed}.
const SNAPSHOT_SCRIPT: &str = r"
local daily = tonumber(ARGV[1])
local today = ARGV[2]
local balance = tonumber(redis.call('HGET', KEYS[1], 'balance'))
local borrowed = tonumber(redis.call('HGET', KEYS[1], 'borrowed'))
local day = redis.call('HGET', KEYS[1], 'day')
if balance == nil or day ~= today then
  balance = daily
  borrowed = 0
  redis.call('HSET', KEYS[1], 'balance', balance, 'borrowed', borrowed, 'day', today)
end
return {balance, borrowed}
";

/// Lazy reset + explicit borrow. Returns {allowed, balance, borrowed}.
const BORROW_SCRIPT: &str = r"
local daily = tonumber(ARGV[1])
local max_borrow = tonumber(ARGV[2])
local amount = tonumber(ARGV[3])
local today = ARGV[4]
local balance = tonumber(redis.call('HGET', KEYS[1], 'balance'))
local borrowed = tonumber(redis.call('HGET', KEYS[1], 'borrowed'))
local day = redis.call('HGET', KEYS[1], 'day')
if balance == nil or day ~= today then
  balance = daily
  borrowed = 0
end
local allowed = 0
if amount <= (max_borrow - borrowed) then
  borrowed = borrowed + amount
  balance = balance + amount
  allowed = 1
end
redis.call('HSET', KEYS[1], 'balance', balance, 'borrowed', borrowed, 'day', today)
return {allowed, balance, borrowed}
";

/// Redis-backed ledger store (distributed)
///
/// All three operations run as single Lua scripts so concurrent
/// requests for one identity cannot interleave between the reset and
/// the mutation.
pub struct RedisQuotaStore {
    client: redis::Client,
    limits: QuotaLimits,
    key_prefix: String,
}

impl RedisQuotaStore {
    /// Create a new Redis-backed store
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis URL is invalid
    pub fn new(url: &str, limits: QuotaLimits) -> Result<Self, QuotaError> {
        let client = redis::Client::open(url).map_err(|e| QuotaError::Backend(format!("invalid URL: {e}")))?;

        Ok(Self {
            client,
            limits,
            key_prefix: "palaver:credits".to_owned(),
        })
    }

    fn key(&self, identity_key: &str) -> String {
        format!("{}:{identity_key}", self.key_prefix)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, QuotaError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QuotaError::Backend(format!("connection failed: {e}")))
    }
}

#[async_trait]
impl QuotaStore for RedisQuotaStore {
    async fn snapshot(&self, key: &str, class: UserClass, now: Timestamp) -> Result<CreditSnapshot, QuotaError> {
        let mut conn = self.connection().await?;
        let daily = self.limits.daily(class);

        let (balance, borrowed): (u32, u32) = redis::Script::new(SNAPSHOT_SCRIPT)
            .key(self.key(key))
            .arg(daily)
            .arg(utc_day(now).to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QuotaError::Backend(format!("snapshot script failed: {e}")))?;

        Ok(CreditSnapshot {
            class,
            remaining: balance,
            daily,
            borrowed,
            reset_at: next_utc_midnight(now),
        })
    }

    async fn try_debit(
        &self,
        key: &str,
        class: UserClass,
        amount: u32,
        now: Timestamp,
    ) -> Result<DebitOutcome, QuotaError> {
        let mut conn = self.connection().await?;

        let (allowed, balance, borrowed): (u8, u32, u32) = redis::Script::new(DEBIT_SCRIPT)
            .key(self.key(key))
            .arg(self.limits.daily(class))
            .arg(self.limits.max_borrow)
            .arg(amount)
            .arg(utc_day(now).to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QuotaError::Backend(format!("debit script failed: {e}")))?;

        Ok(DebitOutcome {
            allowed: allowed == 1,
            remaining: balance,
            borrow_available: self.limits.max_borrow - borrowed,
        })
    }

    async fn borrow(
        &self,
        key: &str,
        class: UserClass,
        amount: u32,
        now: Timestamp,
    ) -> Result<BorrowOutcome, QuotaError> {
        let mut conn = self.connection().await?;

        let (allowed, balance, borrowed): (u8, u32, u32) = redis::Script::new(BORROW_SCRIPT)
            .key(self.key(key))
            .arg(self.limits.daily(class))
            .arg(self.limits.max_borrow)
            .arg(amount)
            .arg(utc_day(now).to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QuotaError::Backend(format!("borrow script failed: {e}")))?;

        Ok(BorrowOutcome {
            allowed: allowed == 1,
            remaining: balance,
            borrowed,
            borrow_available: self.limits.max_borrow - borrowed,
        })
    }
}
