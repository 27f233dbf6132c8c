//! Expression error type.
//!
//! Most messages are prefixed with the dialect the expression was supplied
//! as (`Invalid UpdateExpression: ...`), so the dialect travels inside each
//! variant. The rendered text is what DynamoDB returns verbatim.

use std::fmt;

use dynastack_model::NumberError;

/// The request parameter an expression came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    /// `ConditionExpression` on a write.
    Condition,
    /// `FilterExpression` on a query or scan.
    Filter,
    /// `KeyConditionExpression` on a query.
    KeyCondition,
    /// `UpdateExpression` on `UpdateItem`.
    Update,
    /// `ProjectionExpression` on a read.
    Projection,
}

impl ExpressionKind {
    /// The request parameter name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Condition => "ConditionExpression",
            Self::Filter => "FilterExpression",
            Self::KeyCondition => "KeyConditionExpression",
            Self::Update => "UpdateExpression",
            Self::Projection => "ProjectionExpression",
        }
    }
}

impl fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced during expression parsing, validation or evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    /// An unexpected token was encountered.
    #[error("Invalid {kind}: Syntax error; token: \"{token}\", near: \"{near}\"")]
    Syntax {
        kind: ExpressionKind,
        /// Offending token text, `<EOF>` at end of input.
        token: String,
        /// Source text surrounding the token.
        near: String,
    },
    #[error("Invalid {kind}: The expression can not be empty;")]
    Empty { kind: ExpressionKind },
    #[error(
        "Invalid {kind}: Expression size has exceeded the maximum allowed size; expression size: {size}"
    )]
    TooLarge { kind: ExpressionKind, size: usize },
    #[error(
        "Invalid {kind}: The expression has exceeded the maximum nesting depth; maximum depth: {max}"
    )]
    TooDeeplyNested { kind: ExpressionKind, max: usize },
    #[error(
        "Invalid {kind}: An expression attribute name used in the document path is not defined; attribute name: {name}"
    )]
    UnresolvedName { kind: ExpressionKind, name: String },
    #[error(
        "Invalid {kind}: An expression attribute value used in expression is not defined; attribute value: {name}"
    )]
    UnresolvedValue { kind: ExpressionKind, name: String },
    #[error("Invalid {kind}: Attribute name is a reserved keyword; reserved keyword: {name}")]
    ReservedKeyword { kind: ExpressionKind, name: String },
    #[error("Invalid {kind}: Attribute name starts with a number")]
    NameStartsWithNumber { kind: ExpressionKind },
    #[error("Invalid {kind}: Attribute name contains white space")]
    NameContainsWhiteSpace { kind: ExpressionKind },
    #[error("Invalid {kind}: Invalid function name; function: {function}")]
    InvalidFunction {
        kind: ExpressionKind,
        function: String,
    },
    #[error(
        "Invalid {kind}: The function is not allowed to be used this way in an expression; function: {function}"
    )]
    FunctionMisuse {
        kind: ExpressionKind,
        function: String,
    },
    #[error(
        "Invalid {kind}: Operator or function requires a document path; operator or function: {function}"
    )]
    RequiresDocumentPath {
        kind: ExpressionKind,
        function: String,
    },
    #[error(
        "Invalid {kind}: Incorrect number of operands for operator or function; operator or function: {function}, number of operands: {count}"
    )]
    InvalidOperandCount {
        kind: ExpressionKind,
        function: String,
        count: usize,
    },
    #[error(
        "Invalid {kind}: The IN operator is provided with too many operands; number of operands: {count}"
    )]
    TooManyInOperands { kind: ExpressionKind, count: usize },
    #[error(
        "Invalid {kind}: Incorrect operand type for operator or function; operator or function: {function}, operand type: {operand_type}"
    )]
    IncorrectFunctionOperandType {
        kind: ExpressionKind,
        function: String,
        operand_type: String,
    },
    #[error(
        "Invalid {kind}: Incorrect operand type for operator or function; operator: {operator}, operand type: {operand_type}"
    )]
    IncorrectOperatorOperandType {
        kind: ExpressionKind,
        operator: String,
        operand_type: String,
    },
    #[error(
        "Invalid {kind}: Two document paths overlap with each other; must remove or rewrite one of these paths; path one: {first}, path two: {second}"
    )]
    OverlappingPaths {
        kind: ExpressionKind,
        first: String,
        second: String,
    },
    #[error(
        "Invalid {kind}: Two document paths conflict with each other; must remove or rewrite one of these paths; path one: {first}, path two: {second}"
    )]
    ConflictingPaths {
        kind: ExpressionKind,
        first: String,
        second: String,
    },
    #[error(
        "Invalid {kind}: The \"{clause}\" section can only be used once in an update expression;"
    )]
    DuplicateClause {
        kind: ExpressionKind,
        clause: &'static str,
    },
    #[error(
        "Invalid {kind}: The BETWEEN operator requires upper bound to be greater than or equal to lower bound; lower bound operand: AttributeValue: {low}, upper bound operand: AttributeValue: {high}"
    )]
    BetweenBounds {
        kind: ExpressionKind,
        low: String,
        high: String,
    },
    #[error(
        "Invalid {kind}: Invalid attribute type name found; type: {type_name}, valid types: {{ B,NULL,SS,BOOL,L,BS,N,NS,S,M }}"
    )]
    InvalidAttributeType {
        kind: ExpressionKind,
        type_name: String,
    },
    #[error("An operand in the update expression has an incorrect data type")]
    ArithmeticOperandType,
    #[error("The provided expression refers to an attribute that does not exist in the item")]
    MissingAttribute,
    #[error("The document path provided in the update expression is invalid for update")]
    InvalidDocumentPath,

    #[error("Value provided in ExpressionAttributeNames unused in expressions: keys: {{{keys}}}")]
    UnusedNames { keys: String },
    #[error("Value provided in ExpressionAttributeValues unused in expressions: keys: {{{keys}}}")]
    UnusedValues { keys: String },

    // Key-condition shape errors carry no dialect prefix.
    #[error("Query condition missed key schema element: {name}")]
    MissingKeyCondition { name: String },
    #[error("Query key condition not supported")]
    UnsupportedKeyCondition,
    #[error("Unsupported operator on KeyConditionExpression: operator: {operator}")]
    UnsupportedKeyOperator { operator: String },
    #[error("Invalid operator used in KeyConditionExpression: {operator}")]
    InvalidKeyOperator { operator: String },
    #[error("KeyConditionExpressions must only contain one condition per key")]
    DuplicateKeyCondition,
    #[error("Condition parameter type does not match schema type for key attribute '{name}'")]
    KeyTypeMismatch { name: String },

    #[error(transparent)]
    Number(#[from] NumberError),
}
