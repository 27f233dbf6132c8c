//! Operation dispatcher for the `awsJson1_0` protocol.
//!
//! A request is an `X-Amz-Target` value (`DynamoDB_20120810.<Operation>`)
//! plus a JSON body. Every outcome, including decode failures, becomes an
//! HTTP response carrying the request id and a CRC32 of the body.

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use dynastack_model::error::DynamoDBError;
use dynastack_model::operations::DynamoDBOperation;

use crate::provider::DynastackDynamoDB;

/// Content type for DynamoDB JSON responses.
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Resolve the target header and dispatch the request.
///
/// `target` is the raw `X-Amz-Target` header value, if the request had one.
#[must_use]
pub fn handle_request(
    provider: &DynastackDynamoDB,
    target: Option<&str>,
    body: &[u8],
) -> http::Response<Bytes> {
    match resolve_operation(target) {
        Ok(op) => dispatch(provider, op, body),
        Err(err) => {
            warn!(target = ?target, "rejected request target");
            error_to_response(&err, &new_request_id())
        }
    }
}

/// Map an `X-Amz-Target` value onto an operation.
///
/// # Errors
///
/// Returns `MissingAction` without a target and `UnrecognizedClientException`
/// for a target that names no supported operation.
pub fn resolve_operation(target: Option<&str>) -> Result<DynamoDBOperation, DynamoDBError> {
    let target = target.ok_or_else(DynamoDBError::missing_action)?;
    DynamoDBOperation::from_target(target).ok_or_else(|| DynamoDBError::unknown_operation(target))
}

/// Run one operation and render its response.
#[instrument(skip_all, fields(operation = %op))]
#[must_use]
pub fn dispatch(provider: &DynastackDynamoDB, op: DynamoDBOperation, body: &[u8]) -> http::Response<Bytes> {
    let request_id = new_request_id();
    let result = dispatch_operation(provider, op, body)
        .and_then(|json| json_response(json, &request_id));
    match result {
        Ok(response) => {
            if provider.config.log_operations {
                info!(request_id = %request_id, "request succeeded");
            } else {
                debug!(request_id = %request_id, "request succeeded");
            }
            response
        }
        Err(err) => {
            if provider.config.log_operations {
                info!(request_id = %request_id, error = %err.error_type(), message = %err.message, "request failed");
            } else {
                debug!(request_id = %request_id, error = %err.error_type(), message = %err.message, "request failed");
            }
            error_to_response(&err, &request_id)
        }
    }
}

fn dispatch_operation(
    provider: &DynastackDynamoDB,
    op: DynamoDBOperation,
    body: &[u8],
) -> Result<Vec<u8>, DynamoDBError> {
    match op {
        DynamoDBOperation::CreateTable => serialize(&provider.handle_create_table(deserialize(body)?)?),
        DynamoDBOperation::DeleteTable => serialize(&provider.handle_delete_table(deserialize(body)?)?),
        DynamoDBOperation::DescribeTable => {
            serialize(&provider.handle_describe_table(deserialize(body)?)?)
        }
        DynamoDBOperation::ListTables => serialize(&provider.handle_list_tables(deserialize(body)?)?),
        DynamoDBOperation::PutItem => serialize(&provider.handle_put_item(deserialize(body)?)?),
        DynamoDBOperation::GetItem => serialize(&provider.handle_get_item(deserialize(body)?)?),
        DynamoDBOperation::UpdateItem => serialize(&provider.handle_update_item(deserialize(body)?)?),
        DynamoDBOperation::DeleteItem => serialize(&provider.handle_delete_item(deserialize(body)?)?),
        DynamoDBOperation::Query => serialize(&provider.handle_query(deserialize(body)?)?),
        DynamoDBOperation::Scan => serialize(&provider.handle_scan(deserialize(body)?)?),
        DynamoDBOperation::CreateBackup => {
            serialize(&provider.handle_create_backup(deserialize(body)?)?)
        }
        DynamoDBOperation::DescribeBackup => {
            serialize(&provider.handle_describe_backup(deserialize(body)?)?)
        }
        DynamoDBOperation::ListBackups => serialize(&provider.handle_list_backups(deserialize(body)?)?),
        DynamoDBOperation::DeleteBackup => {
            serialize(&provider.handle_delete_backup(deserialize(body)?)?)
        }
        DynamoDBOperation::RestoreTableFromBackup => {
            serialize(&provider.handle_restore_table_from_backup(deserialize(body)?)?)
        }
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Deserialize a JSON request body into the input type. An empty body is `{}`.
fn deserialize<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, DynamoDBError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| {
        DynamoDBError::serialization_exception(format!("Failed to deserialize request body: {e}"))
    })
}

fn serialize<T: serde::Serialize>(output: &T) -> Result<Vec<u8>, DynamoDBError> {
    serde_json::to_vec(output)
        .map_err(|e| DynamoDBError::internal_error(format!("Failed to serialize response: {e}")))
}

/// Serialize a DynamoDB error into a JSON response body.
///
/// ```json
/// {
///   "__type": "com.amazonaws.dynamodb.v20120810#ResourceNotFoundException",
///   "Message": "Requested resource not found"
/// }
/// ```
#[must_use]
pub fn error_to_json(error: &DynamoDBError) -> Vec<u8> {
    serde_json::json!({
        "__type": error.error_type(),
        "Message": error.message,
    })
    .to_string()
    .into_bytes()
}

/// Convert a `DynamoDBError` into a complete HTTP error response.
#[must_use]
pub fn error_to_response(error: &DynamoDBError, request_id: &str) -> http::Response<Bytes> {
    let json = error_to_json(error);
    build_response(error.status_code, json, request_id).unwrap_or_else(|_| {
        let mut response = http::Response::new(Bytes::from(error_to_json(error)));
        *response.status_mut() = error.status_code;
        response
    })
}

/// Build a success response from JSON bytes.
///
/// # Errors
///
/// Returns `InternalServerError` if the request id is not a valid header value.
pub fn json_response(json: Vec<u8>, request_id: &str) -> Result<http::Response<Bytes>, DynamoDBError> {
    build_response(http::StatusCode::OK, json, request_id)
        .map_err(|e| DynamoDBError::internal_error(format!("Failed to build response: {e}")))
}

fn build_response(
    status: http::StatusCode,
    json: Vec<u8>,
    request_id: &str,
) -> Result<http::Response<Bytes>, http::Error> {
    let crc = crc32fast::hash(&json);
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, CONTENT_TYPE)
        .header("x-amzn-requestid", request_id)
        .header("x-amz-crc32", crc.to_string())
        .body(Bytes::from(json))
}
