//! DynamoDB operation enum.

use std::fmt;

/// All operations the emulator dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamoDBOperation {
    // Table management
    /// Create a new table.
    CreateTable,
    /// Delete a table.
    DeleteTable,
    /// Describe a table.
    DescribeTable,
    /// List all tables.
    ListTables,

    // Item CRUD
    /// Put (insert or replace) an item.
    PutItem,
    /// Get an item by primary key.
    GetItem,
    /// Update an item.
    UpdateItem,
    /// Delete an item by primary key.
    DeleteItem,

    // Query & Scan
    /// Query items by key condition.
    Query,
    /// Scan all items in a table or index.
    Scan,

    // Backups
    /// Take an on-demand backup of a table.
    CreateBackup,
    /// Describe a backup.
    DescribeBackup,
    /// List backups, optionally for one table.
    ListBackups,
    /// Delete a backup.
    DeleteBackup,
    /// Create a new table from a backup.
    RestoreTableFromBackup,
}

impl DynamoDBOperation {
    /// Every supported operation.
    pub const ALL: [Self; 15] = [
        Self::CreateTable,
        Self::DeleteTable,
        Self::DescribeTable,
        Self::ListTables,
        Self::PutItem,
        Self::GetItem,
        Self::UpdateItem,
        Self::DeleteItem,
        Self::Query,
        Self::Scan,
        Self::CreateBackup,
        Self::DescribeBackup,
        Self::ListBackups,
        Self::DeleteBackup,
        Self::RestoreTableFromBackup,
    ];

    /// Returns the AWS operation name string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTable => "CreateTable",
            Self::DeleteTable => "DeleteTable",
            Self::DescribeTable => "DescribeTable",
            Self::ListTables => "ListTables",
            Self::PutItem => "PutItem",
            Self::GetItem => "GetItem",
            Self::UpdateItem => "UpdateItem",
            Self::DeleteItem => "DeleteItem",
            Self::Query => "Query",
            Self::Scan => "Scan",
            Self::CreateBackup => "CreateBackup",
            Self::DescribeBackup => "DescribeBackup",
            Self::ListBackups => "ListBackups",
            Self::DeleteBackup => "DeleteBackup",
            Self::RestoreTableFromBackup => "RestoreTableFromBackup",
        }
    }

    /// Parse an operation name string into a `DynamoDBOperation`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Parse an `X-Amz-Target` header value (`DynamoDB_20120810.<Operation>`).
    #[must_use]
    pub fn from_target(target: &str) -> Option<Self> {
        target
            .strip_prefix("DynamoDB_20120810.")
            .and_then(Self::from_name)
    }
}

impl fmt::Display for DynamoDBOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
