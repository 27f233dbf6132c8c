//! Conversions from internal error enums into DynamoDB errors.
//!
//! Every internal failure surfaces as a `ValidationException` carrying the
//! internal error's message verbatim.

use dynastack_model::error::{DynamoDBError, DynamoDBErrorCode};

use crate::expression::ExpressionError;
use crate::legacy::LegacyError;
use crate::storage::StorageError;

/// Convert a storage error into a DynamoDB validation error.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn storage_error_to_dynamodb(e: StorageError) -> DynamoDBError {
    DynamoDBError::with_message(DynamoDBErrorCode::ValidationException, e.to_string())
}

/// Convert an expression error into a DynamoDB validation error.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn expression_error_to_dynamodb(e: ExpressionError) -> DynamoDBError {
    DynamoDBError::with_message(DynamoDBErrorCode::ValidationException, e.to_string())
}

/// Convert a legacy-parameter error into a DynamoDB validation error.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn legacy_error_to_dynamodb(e: LegacyError) -> DynamoDBError {
    DynamoDBError::with_message(DynamoDBErrorCode::ValidationException, e.to_string())
}
