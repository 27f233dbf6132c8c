//! DynamoDB model types for dynastack.
//!
//! Wire-level request/response shapes, the `AttributeValue` tagged union, the
//! exact decimal `Number` used for every `N` value, and the error taxonomy
//! surfaced to callers. DynamoDB's JSON protocol maps cleanly onto serde
//! derives, so everything here is hand-written.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod number;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{DynamoDBError, DynamoDBErrorCode};
pub use number::{Number, NumberError};
pub use operations::DynamoDBOperation;
