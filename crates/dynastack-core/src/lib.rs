//! DynamoDB core business logic for dynastack.
//!
//! Everything below the wire model: the expression language, the per-table
//! item store with its secondary indexes, the query/scan engine, backups and
//! the provider that ties them to the operation surface.
#![allow(missing_docs, clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod backup;
pub mod config;
pub mod error;
pub mod expression;
pub mod handler;
pub mod index;
pub mod legacy;
pub mod provider;
pub mod query;
pub mod state;
pub mod storage;
