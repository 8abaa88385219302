//! Test configuration builder

use palaver_config::Config;

use super::mock_provider::{MODERATION_MODEL, TITLE_MODEL};

/// Builds a gateway config pointed at a mock provider
pub struct ConfigBuilder {
    base_url: String,
    api_keys: Vec<String>,
    guest_daily: u32,
    regular_daily: u32,
    max_borrow: u32,
    credit_cost: u32,
}

impl ConfigBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_owned(),
            api_keys: vec!["test-key".to_owned()],
            guest_daily: 40,
            regular_daily: 120,
            max_borrow: 20,
            credit_cost: 2,
        }
    }

    pub fn with_api_keys(mut self, keys: &[&str]) -> Self {
        self.api_keys = keys.iter().map(|key| (*key).to_owned()).collect();
        self
    }

    pub fn with_guest_daily(mut self, credits: u32) -> Self {
        self.guest_daily = credits;
        self
    }

    pub fn with_max_borrow(mut self, max_borrow: u32) -> Self {
        self.max_borrow = max_borrow;
        self
    }

    pub fn build(self) -> Config {
        let keys = self
            .api_keys
            .iter()
            .map(|key| format!("\"{key}\""))
            .collect::<Vec<_>>()
            .join(", ");

        let raw = format!(
            r#"
[server]
listen_address = "127.0.0.1:0"

[provider]
base_url = "{base_url}"
api_keys = [{keys}]

[models]
default = "mock-model"
title_model = "{TITLE_MODEL}"

[[models.catalog]]
id = "mock-model"
name = "Mock Model"
provider = "mock"
credit_cost = {credit_cost}
supports_tools = true

[moderation]
model = "{MODERATION_MODEL}"

[quota]
guest_daily_credits = {guest_daily}
regular_daily_credits = {regular_daily}
max_borrow = {max_borrow}
"#,
            base_url = self.base_url,
            credit_cost = self.credit_cost,
            guest_daily = self.guest_daily,
            regular_daily = self.regular_daily,
            max_borrow = self.max_borrow,
        );

        let config: Config = toml::from_str(&raw).expect("test config must parse");
        config.validate().expect("test config must validate");
        config
    }
}
