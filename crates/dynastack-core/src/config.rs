//! DynamoDB configuration.
//!
//! All settings come from environment variables.

use std::env;

use tracing_subscriber::EnvFilter;

use crate::query::MAX_PAGE_SIZE;
use crate::storage::MAX_ITEM_SIZE;

/// DynamoDB service configuration.
#[derive(Debug, Clone)]
pub struct DynamoDBConfig {
    /// Region used in table and backup ARNs.
    pub default_region: String,
    /// Account id used in table and backup ARNs.
    pub account_id: String,
    /// Largest item accepted by writes, in bytes.
    pub max_item_size: u64,
    /// Byte ceiling for one page of query or scan results.
    pub max_page_size: u64,
    /// Log every dispatched operation at `info` instead of `debug`.
    pub log_operations: bool,
}

impl DynamoDBConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_region: env::var("DEFAULT_REGION").unwrap_or(defaults.default_region),
            account_id: env::var("DYNAMODB_ACCOUNT_ID").unwrap_or(defaults.account_id),
            max_item_size: env_u64("DYNAMODB_MAX_ITEM_SIZE", defaults.max_item_size),
            max_page_size: env_u64("DYNAMODB_MAX_PAGE_SIZE", defaults.max_page_size),
            log_operations: env_bool("DYNAMODB_LOG_OPERATIONS", defaults.log_operations),
        }
    }

    /// ARN of a table in this region and account.
    #[must_use]
    pub fn table_arn(&self, table_name: &str) -> String {
        format!(
            "arn:aws:dynamodb:{}:{}:table/{table_name}",
            self.default_region, self.account_id
        )
    }
}

impl Default for DynamoDBConfig {
    fn default() -> Self {
        Self {
            default_region: "us-east-1".to_owned(),
            account_id: "000000000000".to_owned(),
            max_item_size: MAX_ITEM_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            log_operations: false,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Install a global `tracing` subscriber for embedders.
///
/// Uses `RUST_LOG` when set, otherwise `default_filter`. Setting
/// `DYNASTACK_LOG_FORMAT=json` switches to JSON lines. Does nothing if a
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = env::var("DYNASTACK_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
