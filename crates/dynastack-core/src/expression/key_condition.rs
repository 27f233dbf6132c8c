//! Key-condition extraction for `Query`.
//!
//! A key-condition expression is parsed with the condition grammar and then
//! narrowed here to one equality on the hash key plus an optional range-key
//! predicate.

use std::cmp::Ordering;
use std::collections::HashMap;

use dynastack_model::AttributeValue;
use dynastack_model::types::ScalarAttributeType;

use super::ast::{AttributePath, CompareOp, Expr, FunctionName, LogicalOp, Operand};
use super::error::{ExpressionError, ExpressionKind};
use super::evaluator::{begins_with, check_between_bounds, compare_values, values_equal};

const KIND: ExpressionKind = ExpressionKind::KeyCondition;

/// A key attribute of the index being queried.
#[derive(Debug, Clone, Copy)]
pub struct KeySlot<'a> {
    /// Attribute name.
    pub name: &'a str,
    /// Declared scalar type.
    pub attribute_type: &'a ScalarAttributeType,
}

/// Predicate on the range key.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeCondition {
    /// `=`, `<`, `<=`, `>` or `>=` against a value.
    Compare(CompareOp, AttributeValue),
    /// Inclusive `BETWEEN low AND high`.
    Between(AttributeValue, AttributeValue),
    /// `begins_with(sk, prefix)`.
    BeginsWith(AttributeValue),
}

impl RangeCondition {
    /// Returns `true` if `value` satisfies the predicate.
    #[must_use]
    pub fn matches(&self, value: &AttributeValue) -> bool {
        match self {
            Self::Compare(op, operand) => {
                let ord = compare_values(value, operand);
                match op {
                    CompareOp::Eq => values_equal(value, operand),
                    CompareOp::Ne => !values_equal(value, operand),
                    CompareOp::Lt => ord == Some(Ordering::Less),
                    CompareOp::Le => ord.is_some_and(Ordering::is_le),
                    CompareOp::Gt => ord == Some(Ordering::Greater),
                    CompareOp::Ge => ord.is_some_and(Ordering::is_ge),
                }
            }
            Self::Between(low, high) => {
                compare_values(value, low).is_some_and(Ordering::is_ge)
                    && compare_values(value, high).is_some_and(Ordering::is_le)
            }
            Self::BeginsWith(prefix) => begins_with(value, prefix),
        }
    }
}

/// The hash-key value to select plus an optional range predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    /// Value the hash key must equal.
    pub hash_value: AttributeValue,
    /// Optional predicate on the range key.
    pub range: Option<RangeCondition>,
}

/// Narrow a parsed key-condition expression to a [`KeyCondition`].
///
/// # Errors
///
/// Returns `ExpressionError` when the expression uses anything beyond one
/// hash equality and one range predicate, names an undefined placeholder,
/// or compares a key against a value of the wrong type.
pub fn extract_key_condition(
    expr: &Expr,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
    hash: KeySlot<'_>,
    range: Option<KeySlot<'_>>,
) -> Result<KeyCondition, ExpressionError> {
    let mut conjuncts = Vec::new();
    flatten_and(expr, &mut conjuncts)?;

    let mut hash_value = None;
    let mut range_condition = None;

    for conjunct in conjuncts {
        let (path, predicate) = split_predicate(conjunct)?;
        let name = attribute_name(path, names)?;
        let predicate = predicate.bind(values)?;

        if name == hash.name {
            let RangeCondition::Compare(CompareOp::Eq, value) = predicate else {
                return Err(ExpressionError::UnsupportedKeyCondition);
            };
            if hash_value.is_some() {
                return Err(ExpressionError::DuplicateKeyCondition);
            }
            check_type(hash, &value)?;
            hash_value = Some(value);
        } else if let Some(range) = range.filter(|r| r.name == name) {
            if range_condition.is_some() {
                return Err(ExpressionError::DuplicateKeyCondition);
            }
            match &predicate {
                RangeCondition::Compare(_, value) => check_type(range, value)?,
                RangeCondition::Between(low, high) => {
                    check_type(range, low)?;
                    check_type(range, high)?;
                    check_between_bounds(low, high, KIND)?;
                }
                RangeCondition::BeginsWith(prefix) => {
                    if *range.attribute_type == ScalarAttributeType::N {
                        return Err(ExpressionError::IncorrectFunctionOperandType {
                            kind: KIND,
                            function: FunctionName::BeginsWith.to_string(),
                            operand_type: "N".to_owned(),
                        });
                    }
                    check_type(range, prefix)?;
                }
            }
            range_condition = Some(predicate);
        } else {
            return Err(ExpressionError::UnsupportedKeyCondition);
        }
    }

    let hash_value = hash_value.ok_or_else(|| ExpressionError::MissingKeyCondition {
        name: hash.name.to_owned(),
    })?;
    Ok(KeyCondition {
        hash_value,
        range: range_condition,
    })
}

fn flatten_and<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) -> Result<(), ExpressionError> {
    match expr {
        Expr::Logical {
            op: LogicalOp::And,
            left,
            right,
        } => {
            flatten_and(left, out)?;
            flatten_and(right, out)
        }
        Expr::Logical {
            op: LogicalOp::Or, ..
        } => Err(ExpressionError::InvalidKeyOperator {
            operator: "OR".to_owned(),
        }),
        Expr::Not(_) => Err(ExpressionError::InvalidKeyOperator {
            operator: "NOT".to_owned(),
        }),
        Expr::In { .. } => Err(ExpressionError::InvalidKeyOperator {
            operator: "IN".to_owned(),
        }),
        other => {
            out.push(other);
            Ok(())
        }
    }
}

/// A predicate whose operands are still placeholders.
enum Unbound<'e> {
    Compare(CompareOp, &'e str),
    Between(&'e str, &'e str),
    BeginsWith(&'e str),
}

impl Unbound<'_> {
    fn bind(
        self,
        values: &HashMap<String, AttributeValue>,
    ) -> Result<RangeCondition, ExpressionError> {
        let lookup = |name: &str| {
            values
                .get(name)
                .cloned()
                .ok_or_else(|| ExpressionError::UnresolvedValue {
                    kind: KIND,
                    name: name.to_owned(),
                })
        };
        Ok(match self {
            Self::Compare(op, v) => RangeCondition::Compare(op, lookup(v)?),
            Self::Between(lo, hi) => RangeCondition::Between(lookup(lo)?, lookup(hi)?),
            Self::BeginsWith(v) => RangeCondition::BeginsWith(lookup(v)?),
        })
    }
}

fn split_predicate(expr: &Expr) -> Result<(&AttributePath, Unbound<'_>), ExpressionError> {
    match expr {
        Expr::Compare { op: CompareOp::Ne, .. } => Err(ExpressionError::UnsupportedKeyOperator {
            operator: CompareOp::Ne.to_string(),
        }),
        Expr::Compare { left, op, right } => match (left, right) {
            (Operand::Path(path), Operand::Value(v)) => Ok((path, Unbound::Compare(*op, v))),
            (Operand::Value(v), Operand::Path(path)) => {
                Ok((path, Unbound::Compare(op.flipped(), v)))
            }
            _ => Err(ExpressionError::UnsupportedKeyCondition),
        },
        Expr::Between {
            value: Operand::Path(path),
            low: Operand::Value(lo),
            high: Operand::Value(hi),
        } => Ok((path, Unbound::Between(lo, hi))),
        Expr::Function {
            name: FunctionName::BeginsWith,
            args,
        } => match args.as_slice() {
            [Operand::Path(path), Operand::Value(prefix)] => {
                Ok((path, Unbound::BeginsWith(prefix)))
            }
            _ => Err(ExpressionError::UnsupportedKeyCondition),
        },
        Expr::Function { name, .. } => Err(ExpressionError::InvalidKeyOperator {
            operator: name.to_string(),
        }),
        _ => Err(ExpressionError::UnsupportedKeyCondition),
    }
}

fn attribute_name(
    path: &AttributePath,
    names: &HashMap<String, String>,
) -> Result<String, ExpressionError> {
    let resolved = path.resolve(names, KIND)?;
    match resolved.root() {
        Some(root) if resolved.is_top_level() => Ok(root.to_owned()),
        _ => Err(ExpressionError::UnsupportedKeyCondition),
    }
}

fn check_type(slot: KeySlot<'_>, value: &AttributeValue) -> Result<(), ExpressionError> {
    if slot.attribute_type.matches(value) {
        Ok(())
    } else {
        Err(ExpressionError::KeyTypeMismatch {
            name: slot.name.to_owned(),
        })
    }
}
