use async_trait::async_trait;

/// Compute the effective credit cost of a request
///
/// The base catalog cost is scaled by the active pricing multiplier and
/// rounded up, floored at 1 so no billable request is ever free.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn effective_cost(base_cost: u32, multiplier: f64) -> u32 {
    let scaled = (f64::from(base_cost) * multiplier).ceil();
    if scaled < 1.0 {
        1
    } else if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Source of the active pricing multiplier
///
/// In production this is fed by the external budget tracker reacting to
/// provider cost pressure; tests and default deployments pin it.
#[async_trait]
pub trait PricingState: Send + Sync {
    /// Current cost multiplier, >= 0
    async fn active_multiplier(&self) -> f64;
}

/// Pricing state pinned to a configured multiplier
pub struct FixedPricing {
    multiplier: f64,
}

impl FixedPricing {
    /// Create a pinned pricing state
    #[must_use]
    pub const fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

#[async_trait]
impl PricingState for FixedPricing {
    async fn active_multiplier(&self) -> f64 {
        self.multiplier
    }
}
