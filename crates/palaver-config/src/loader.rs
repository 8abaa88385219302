use std::path::Path;

use crate::{AUTO_MODEL_ID, Config};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded =
            crate::env::expand_env(&raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the model catalog, quota limits, or rate
    /// limit windows are invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_models()?;
        self.validate_quota()?;
        self.validate_rate_limits()?;

        if self.provider.api_keys.is_empty() {
            tracing::warn!("no provider API keys configured; chat requests will be rejected");
        }

        Ok(())
    }

    /// Validate the model catalog and selection defaults
    fn validate_models(&self) -> anyhow::Result<()> {
        if self.models.catalog.is_empty() {
            anyhow::bail!("models.catalog must contain at least one entry");
        }

        for entry in &self.models.catalog {
            if entry.id == AUTO_MODEL_ID {
                anyhow::bail!("model id '{AUTO_MODEL_ID}' is reserved for automatic selection");
            }
        }

        if !self.models.is_known(&self.models.default) {
            anyhow::bail!("models.default '{}' is not in the catalog", self.models.default);
        }

        Ok(())
    }

    /// Validate quota limits
    fn validate_quota(&self) -> anyhow::Result<()> {
        if self.quota.guest_daily_credits == 0 || self.quota.regular_daily_credits == 0 {
            anyhow::bail!("daily credit allotments must be greater than 0");
        }

        if self.quota.active_multiplier <= 0.0 {
            anyhow::bail!("quota.active_multiplier must be positive");
        }

        Ok(())
    }

    /// Validate rate limit window strings parse as durations
    fn validate_rate_limits(&self) -> anyhow::Result<()> {
        let Some(ref rate_limit) = self.server.rate_limit else {
            return Ok(());
        };

        for limit in [rate_limit.global.as_ref(), rate_limit.per_ip.as_ref()].into_iter().flatten() {
            duration_str::parse(&limit.window)
                .map_err(|e| anyhow::anyhow!("invalid rate limit window '{}': {e}", limit.window))?;
            if limit.requests == 0 {
                anyhow::bail!("rate limit requests must be greater than 0");
            }
        }

        Ok(())
    }
}
