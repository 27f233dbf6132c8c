//! In-process integration tests for dynastack.
//!
//! Every test drives the operation dispatcher with the JSON bodies a client
//! would send, against a fresh provider, and inspects the JSON that comes
//! back. Nothing listens on a socket, so the tests run with plain
//! `cargo test -p dynastack-integration`.

use std::fmt;
use std::sync::Once;

use anyhow::Context;
use serde_json::{Value, json};

use dynastack_core::config::DynamoDBConfig;
use dynastack_core::handler;
use dynastack_core::provider::DynastackDynamoDB;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A failed call, decoded from the error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status of the response.
    pub status: http::StatusCode,
    /// Short error type, e.g. `ValidationException`.
    pub error_type: String,
    /// The `Message` field.
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for ApiError {}

/// A fresh provider reached only through the dispatcher.
#[derive(Debug)]
pub struct TestClient {
    provider: DynastackDynamoDB,
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClient {
    /// Create a client over an empty provider with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DynamoDBConfig::default())
    }

    /// Create a client over an empty provider.
    #[must_use]
    pub fn with_config(config: DynamoDBConfig) -> Self {
        init_tracing();
        Self {
            provider: DynastackDynamoDB::new(config),
        }
    }

    /// Send one request. Error responses come back as an [`ApiError`].
    pub fn call(&self, operation: &str, body: &Value) -> anyhow::Result<Value> {
        let target = format!("DynamoDB_20120810.{operation}");
        let payload = serde_json::to_vec(body)?;
        let response = handler::handle_request(&self.provider, Some(&target), &payload);

        let crc = crc_header(&response)?;
        anyhow::ensure!(
            crc == crc32fast::hash(response.body()),
            "x-amz-crc32 does not match the body"
        );

        let status = response.status();
        let json: Value = serde_json::from_slice(response.body())
            .with_context(|| format!("{operation} returned a non-JSON body"))?;
        if status.is_success() {
            return Ok(json);
        }
        let error_type = json["__type"]
            .as_str()
            .and_then(|t| t.rsplit('#').next())
            .unwrap_or_default()
            .to_owned();
        let message = json["Message"].as_str().unwrap_or_default().to_owned();
        Err(ApiError {
            status,
            error_type,
            message,
        }
        .into())
    }

    /// Send a request that must succeed.
    pub fn ok(&self, operation: &str, body: &Value) -> Value {
        self.call(operation, body)
            .unwrap_or_else(|e| panic!("{operation} failed: {e}"))
    }

    /// Send a request that must fail with a DynamoDB error.
    pub fn err(&self, operation: &str, body: &Value) -> ApiError {
        match self.call(operation, body) {
            Ok(value) => panic!("{operation} unexpectedly succeeded: {value}"),
            Err(e) => e
                .downcast::<ApiError>()
                .unwrap_or_else(|e| panic!("{operation} failed outside DynamoDB: {e}")),
        }
    }

    /// Create a table keyed by `pk` (S).
    pub fn create_simple_table(&self, table_name: &str) {
        self.ok(
            "CreateTable",
            &json!({
                "TableName": table_name,
                "KeySchema": [{"AttributeName": "pk", "KeyType": "HASH"}],
                "AttributeDefinitions": [{"AttributeName": "pk", "AttributeType": "S"}],
                "BillingMode": "PAY_PER_REQUEST",
            }),
        );
    }

    /// Create a table keyed by `pk` (S) and `sk` (S).
    pub fn create_composite_table(&self, table_name: &str) {
        self.ok(
            "CreateTable",
            &json!({
                "TableName": table_name,
                "KeySchema": [
                    {"AttributeName": "pk", "KeyType": "HASH"},
                    {"AttributeName": "sk", "KeyType": "RANGE"},
                ],
                "AttributeDefinitions": [
                    {"AttributeName": "pk", "AttributeType": "S"},
                    {"AttributeName": "sk", "AttributeType": "S"},
                ],
                "BillingMode": "PAY_PER_REQUEST",
            }),
        );
    }

    /// Create a `pk`/`sk` table with a GSI `by_status` (`status` S, `score` N,
    /// `ALL` projection) and an LSI `by_score` (`pk`, `score`, `KEYS_ONLY`).
    pub fn create_indexed_table(&self, table_name: &str) {
        self.ok(
            "CreateTable",
            &json!({
                "TableName": table_name,
                "KeySchema": [
                    {"AttributeName": "pk", "KeyType": "HASH"},
                    {"AttributeName": "sk", "KeyType": "RANGE"},
                ],
                "AttributeDefinitions": [
                    {"AttributeName": "pk", "AttributeType": "S"},
                    {"AttributeName": "sk", "AttributeType": "S"},
                    {"AttributeName": "status", "AttributeType": "S"},
                    {"AttributeName": "score", "AttributeType": "N"},
                ],
                "GlobalSecondaryIndexes": [{
                    "IndexName": "by_status",
                    "KeySchema": [
                        {"AttributeName": "status", "KeyType": "HASH"},
                        {"AttributeName": "score", "KeyType": "RANGE"},
                    ],
                    "Projection": {"ProjectionType": "ALL"},
                }],
                "LocalSecondaryIndexes": [{
                    "IndexName": "by_score",
                    "KeySchema": [
                        {"AttributeName": "pk", "KeyType": "HASH"},
                        {"AttributeName": "score", "KeyType": "RANGE"},
                    ],
                    "Projection": {"ProjectionType": "KEYS_ONLY"},
                }],
            }),
        );
    }

    /// Put an item without conditions.
    pub fn put(&self, table_name: &str, item: Value) {
        self.ok("PutItem", &json!({"TableName": table_name, "Item": item}));
    }

    /// Get an item by key; `None` when absent.
    pub fn get(&self, table_name: &str, key: Value) -> Option<Value> {
        let resp = self.ok("GetItem", &json!({"TableName": table_name, "Key": key}));
        resp.get("Item").cloned()
    }
}

fn crc_header(response: &http::Response<bytes::Bytes>) -> anyhow::Result<u32> {
    let value = response
        .headers()
        .get("x-amz-crc32")
        .context("missing x-amz-crc32 header")?;
    Ok(value.to_str()?.parse()?)
}

/// Wrap a string as an `S` attribute value.
#[must_use]
pub fn s(value: &str) -> Value {
    json!({ "S": value })
}

/// Wrap a number literal as an `N` attribute value.
#[must_use]
pub fn n(value: &str) -> Value {
    json!({ "N": value })
}

mod test_backups;
mod test_items;
mod test_legacy;
mod test_query;
mod test_scan;
mod test_tables;
