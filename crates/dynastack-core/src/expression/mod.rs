//! DynamoDB expression parsing and evaluation.
//!
//! This module provides a complete implementation of DynamoDB's expression language,
//! supporting condition/filter/key-condition expressions, update expressions, and
//! projection expressions. The pipeline is:
//!
//! 1. **Lexing**: Tokenize the expression string into a token stream.
//! 2. **Parsing**: Build an AST from the token stream using recursive descent.
//! 3. **Binding**: Check placeholders against the request's name/value maps
//!    ([`RequestExpressions`]).
//! 4. **Evaluation**: Walk the AST to evaluate conditions, apply updates, or project attributes.

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod key_condition;
pub mod lexer;
pub mod parser;
pub mod path;
pub mod reserved;

use std::collections::{BTreeSet, HashMap};

use dynastack_model::AttributeValue;

pub use ast::{AttributePath, Expr, Operand, PathElement, Placeholders, UpdateExpr};
pub use error::{ExpressionError, ExpressionKind};
pub use evaluator::{EvalContext, values_equal};
pub use key_condition::{KeyCondition, KeySlot, RangeCondition, extract_key_condition};
pub use parser::{parse_condition, parse_projection, parse_update};
pub use path::{DocumentPath, PathStep, project};

/// An update expression with its resolved target paths.
#[derive(Debug, Clone)]
pub struct ParsedUpdate {
    /// The parsed clauses.
    pub expr: UpdateExpr,
    /// Every path the update writes, in clause order.
    pub targets: Vec<DocumentPath>,
}

/// The expressions of one request, bound to its placeholder maps.
///
/// Each expression is checked for undefined placeholders as it is added;
/// [`RequestExpressions::finish`] then rejects placeholders that no
/// expression referenced.
#[derive(Debug)]
pub struct RequestExpressions<'a> {
    names: &'a HashMap<String, String>,
    values: &'a HashMap<String, AttributeValue>,
    used: Placeholders,
}

impl<'a> RequestExpressions<'a> {
    #[must_use]
    pub fn new(
        names: &'a HashMap<String, String>,
        values: &'a HashMap<String, AttributeValue>,
    ) -> Self {
        Self {
            names,
            values,
            used: Placeholders::default(),
        }
    }

    /// Parse and bind a condition, filter or key-condition expression.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` on a parse failure or an undefined placeholder.
    pub fn condition(&mut self, input: &str, kind: ExpressionKind) -> Result<Expr, ExpressionError> {
        let expr = parse_condition(input, kind)?;
        let mut found = Placeholders::default();
        found.visit_expr(&expr);
        self.bind(found, kind)?;
        Ok(expr)
    }

    /// Parse and bind an update expression, rejecting overlapping targets.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` on a parse failure, an undefined placeholder
    /// or two target paths that overlap or conflict.
    pub fn update(&mut self, input: &str) -> Result<ParsedUpdate, ExpressionError> {
        let kind = ExpressionKind::Update;
        let expr = parse_update(input)?;
        let mut found = Placeholders::default();
        found.visit_update(&expr);
        self.bind(found, kind)?;

        let targets = expr
            .target_paths()
            .map(|p| p.resolve(self.names, kind))
            .collect::<Result<Vec<_>, _>>()?;
        check_overlaps(&targets, kind)?;
        Ok(ParsedUpdate { expr, targets })
    }

    /// Parse and bind a projection expression into resolved paths.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` on a parse failure, a reserved or malformed
    /// name, an undefined placeholder or overlapping paths.
    pub fn projection(&mut self, input: &str) -> Result<Vec<DocumentPath>, ExpressionError> {
        let kind = ExpressionKind::Projection;
        let paths = parse_projection(input)?;
        let mut found = Placeholders::default();
        found.visit_projection(&paths);
        self.bind(found, kind)?;

        let resolved = paths
            .iter()
            .map(|p| p.resolve(self.names, kind))
            .collect::<Result<Vec<_>, _>>()?;
        check_overlaps(&resolved, kind)?;
        Ok(resolved)
    }

    /// Reject supplied placeholders that no expression referenced.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError::UnusedNames` or `ExpressionError::UnusedValues`.
    pub fn finish(&self) -> Result<(), ExpressionError> {
        let unused_names = unused(self.names.keys(), &self.used.names);
        if !unused_names.is_empty() {
            return Err(ExpressionError::UnusedNames { keys: unused_names });
        }
        let unused_values = unused(self.values.keys(), &self.used.values);
        if !unused_values.is_empty() {
            return Err(ExpressionError::UnusedValues {
                keys: unused_values,
            });
        }
        Ok(())
    }

    /// An evaluation context over `item` using this request's placeholders.
    #[must_use]
    pub fn context<'b>(
        &'b self,
        item: &'b HashMap<String, AttributeValue>,
        kind: ExpressionKind,
    ) -> EvalContext<'b> {
        EvalContext {
            item,
            names: self.names,
            values: self.values,
            kind,
        }
    }

    #[must_use]
    pub fn names(&self) -> &'a HashMap<String, String> {
        self.names
    }

    #[must_use]
    pub fn values(&self) -> &'a HashMap<String, AttributeValue> {
        self.values
    }

    fn bind(&mut self, found: Placeholders, kind: ExpressionKind) -> Result<(), ExpressionError> {
        if let Some(name) = found.names.iter().find(|n| !self.names.contains_key(*n)) {
            return Err(ExpressionError::UnresolvedName {
                kind,
                name: name.clone(),
            });
        }
        if let Some(value) = found.values.iter().find(|v| !self.values.contains_key(*v)) {
            return Err(ExpressionError::UnresolvedValue {
                kind,
                name: value.clone(),
            });
        }
        self.used.names.extend(found.names);
        self.used.values.extend(found.values);
        Ok(())
    }
}

/// Reject any pair of paths where one is a prefix of the other, or where
/// they disagree on whether a step indexes a list or names a map member.
///
/// # Errors
///
/// Returns `ExpressionError::OverlappingPaths` or `ExpressionError::ConflictingPaths`.
pub fn check_overlaps(paths: &[DocumentPath], kind: ExpressionKind) -> Result<(), ExpressionError> {
    for (i, first) in paths.iter().enumerate() {
        for second in &paths[i + 1..] {
            if first.overlaps(second) {
                return Err(ExpressionError::OverlappingPaths {
                    kind,
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
            if first.conflicts(second) {
                return Err(ExpressionError::ConflictingPaths {
                    kind,
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn unused<'k>(supplied: impl Iterator<Item = &'k String>, used: &[String]) -> String {
    supplied
        .filter(|k| !used.contains(k))
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(", ")
}
