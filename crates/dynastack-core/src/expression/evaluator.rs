//! Expression evaluator for DynamoDB condition and update expressions.
//!
//! The evaluator resolves expression attribute names and values against an item,
//! then evaluates condition expressions to booleans or applies update mutations.
//! Numbers are compared and added exactly through [`Number`].

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use dynastack_model::{AttributeValue, Number, NumberError};

use super::ast::{
    AddAction, AttributePath, CompareOp, DeleteAction, Expr, FunctionName, LogicalOp, Operand,
    SetValue, UpdateExpr, UpdateOperand,
};
use super::error::{ExpressionError, ExpressionKind};
use super::path::DocumentPath;

// ---------------------------------------------------------------------------
// Evaluation context
// ---------------------------------------------------------------------------

/// Evaluation context binding an item to its expression attribute name/value mappings.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// The DynamoDB item being evaluated.
    pub item: &'a HashMap<String, AttributeValue>,
    /// Expression attribute name substitutions (`#name` -> actual attribute name).
    pub names: &'a HashMap<String, String>,
    /// Expression attribute value substitutions (`:val` -> `AttributeValue`).
    pub values: &'a HashMap<String, AttributeValue>,
    /// Dialect used to prefix error messages.
    pub kind: ExpressionKind,
}

// ---------------------------------------------------------------------------
// Condition evaluation
// ---------------------------------------------------------------------------

impl<'a> EvalContext<'a> {
    /// Evaluate a condition expression against the item, returning `true` or `false`.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` if placeholders cannot be resolved, `BETWEEN`
    /// bounds are inverted, or `attribute_type` names an unknown type.
    pub fn evaluate(&self, expr: &Expr) -> Result<bool, ExpressionError> {
        match expr {
            Expr::Compare { left, op, right } => self.eval_compare(left, *op, right),
            Expr::Between { value, low, high } => self.eval_between(value, low, high),
            Expr::In { value, list } => self.eval_in(value, list),
            Expr::Logical { op, left, right } => self.eval_logical(*op, left, right),
            Expr::Not(inner) => self.evaluate(inner).map(|v| !v),
            Expr::Function { name, args } => self.eval_function(*name, args),
        }
    }

    fn eval_compare(
        &self,
        left: &Operand,
        op: CompareOp,
        right: &Operand,
    ) -> Result<bool, ExpressionError> {
        let lval = self.resolve_operand(left)?;
        let rval = self.resolve_operand(right)?;

        let (Some(lv), Some(rv)) = (lval, rval) else {
            return Ok(false);
        };

        Ok(match op {
            CompareOp::Eq => values_equal(&lv, &rv),
            CompareOp::Ne => !values_equal(&lv, &rv),
            CompareOp::Lt => compare_values(&lv, &rv) == Some(Ordering::Less),
            CompareOp::Le => compare_values(&lv, &rv).is_some_and(Ordering::is_le),
            CompareOp::Gt => compare_values(&lv, &rv) == Some(Ordering::Greater),
            CompareOp::Ge => compare_values(&lv, &rv).is_some_and(Ordering::is_ge),
        })
    }

    fn eval_between(
        &self,
        value: &Operand,
        low: &Operand,
        high: &Operand,
    ) -> Result<bool, ExpressionError> {
        let v = self.resolve_operand(value)?;
        let lo = self.resolve_operand(low)?;
        let hi = self.resolve_operand(high)?;

        if let (Some(lo), Some(hi)) = (&lo, &hi) {
            check_between_bounds(lo, hi, self.kind)?;
        }

        let (Some(v), Some(lo), Some(hi)) = (v, lo, hi) else {
            return Ok(false);
        };

        Ok(compare_values(&v, &lo).is_some_and(Ordering::is_ge)
            && compare_values(&v, &hi).is_some_and(Ordering::is_le))
    }

    fn eval_in(&self, value: &Operand, list: &[Operand]) -> Result<bool, ExpressionError> {
        let Some(v) = self.resolve_operand(value)? else {
            return Ok(false);
        };
        for candidate in list {
            if let Some(cv) = self.resolve_operand(candidate)? {
                if values_equal(&v, &cv) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn eval_logical(
        &self,
        op: LogicalOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<bool, ExpressionError> {
        match op {
            LogicalOp::And => {
                if !self.evaluate(left)? {
                    return Ok(false);
                }
                self.evaluate(right)
            }
            LogicalOp::Or => {
                if self.evaluate(left)? {
                    return Ok(true);
                }
                self.evaluate(right)
            }
        }
    }

    fn eval_function(&self, name: FunctionName, args: &[Operand]) -> Result<bool, ExpressionError> {
        let Some(Operand::Path(path)) = args.first() else {
            return Err(ExpressionError::RequiresDocumentPath {
                kind: self.kind,
                function: name.to_string(),
            });
        };
        let attr = self.resolve_path(path)?;
        let arg = match args.get(1) {
            Some(operand) => self.resolve_operand(operand)?,
            None => None,
        };

        match name {
            FunctionName::AttributeExists => Ok(attr.is_some()),
            FunctionName::AttributeNotExists => Ok(attr.is_none()),
            FunctionName::AttributeType => {
                let descriptor = match arg.as_deref() {
                    Some(AttributeValue::S(s)) if AttributeValue::is_valid_type_descriptor(s) => {
                        s.as_str()
                    }
                    Some(AttributeValue::S(s)) => {
                        return Err(ExpressionError::InvalidAttributeType {
                            kind: self.kind,
                            type_name: s.clone(),
                        });
                    }
                    Some(other) => {
                        return Err(ExpressionError::IncorrectFunctionOperandType {
                            kind: self.kind,
                            function: name.to_string(),
                            operand_type: other.type_descriptor().to_owned(),
                        });
                    }
                    None => return Ok(false),
                };
                Ok(attr.is_some_and(|v| v.type_descriptor() == descriptor))
            }
            FunctionName::BeginsWith => Ok(match (attr, arg.as_deref()) {
                (Some(v), Some(prefix)) => begins_with(v, prefix),
                _ => false,
            }),
            FunctionName::Contains => Ok(match (attr, arg.as_deref()) {
                (Some(v), Some(needle)) => contains(v, needle),
                _ => false,
            }),
            FunctionName::Size | FunctionName::IfNotExists | FunctionName::ListAppend => {
                Err(ExpressionError::FunctionMisuse {
                    kind: self.kind,
                    function: name.to_string(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Operand resolution
// ---------------------------------------------------------------------------

impl<'a> EvalContext<'a> {
    /// Resolve an operand to its concrete `AttributeValue`, if present.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` if a `#name` or `:value` placeholder is not defined.
    pub fn resolve_operand(
        &self,
        operand: &Operand,
    ) -> Result<Option<Cow<'a, AttributeValue>>, ExpressionError> {
        match operand {
            Operand::Path(path) => Ok(self.resolve_path(path)?.map(Cow::Borrowed)),
            Operand::Value(name) => Ok(Some(Cow::Borrowed(self.value(name)?))),
            Operand::Size(path) => Ok(self
                .resolve_path(path)?
                .and_then(size_of)
                .map(|n| Cow::Owned(AttributeValue::N(n.to_string())))),
        }
    }

    /// Walk an attribute path against the item, substituting `#name` placeholders.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError::UnresolvedName` for an undefined placeholder.
    pub fn resolve_path(
        &self,
        path: &AttributePath,
    ) -> Result<Option<&'a AttributeValue>, ExpressionError> {
        Ok(self.document_path(path)?.resolve(self.item))
    }

    fn document_path(&self, path: &AttributePath) -> Result<DocumentPath, ExpressionError> {
        path.resolve(self.names, self.kind)
    }

    fn value(&self, name: &str) -> Result<&'a AttributeValue, ExpressionError> {
        self.values
            .get(name)
            .ok_or_else(|| ExpressionError::UnresolvedValue {
                kind: self.kind,
                name: name.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Update application
// ---------------------------------------------------------------------------

impl EvalContext<'_> {
    /// Apply an update expression to the item, returning the modified item.
    ///
    /// Every SET right-hand side is read from the original item before any
    /// action is applied. Clauses then run in the order SET, REMOVE, ADD, DELETE.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` if operands cannot be resolved, types are
    /// incompatible, or a path cannot be written.
    pub fn apply_update(
        &self,
        update: &UpdateExpr,
    ) -> Result<HashMap<String, AttributeValue>, ExpressionError> {
        let mut assignments = Vec::with_capacity(update.set_actions.len());
        for action in &update.set_actions {
            let path = self.document_path(&action.path)?;
            let value = self.resolve_set_value(&action.value)?;
            assignments.push((path, value));
        }

        let mut removals = update
            .remove_paths
            .iter()
            .map(|p| self.document_path(p))
            .collect::<Result<Vec<_>, _>>()?;
        // Highest list index first so earlier removals do not shift later ones.
        removals.sort_by(|a, b| b.cmp(a));

        let mut result = self.item.clone();
        for (path, value) in assignments {
            path.set(&mut result, value)?;
        }
        for path in &removals {
            path.remove(&mut result)?;
        }
        for action in &update.add_actions {
            self.apply_add_action(&mut result, action)?;
        }
        for action in &update.delete_actions {
            self.apply_delete_action(&mut result, action)?;
        }

        Ok(result)
    }

    fn resolve_set_value(&self, set_value: &SetValue) -> Result<AttributeValue, ExpressionError> {
        match set_value {
            SetValue::Operand(op) => self.resolve_update_operand(op),
            SetValue::Plus(a, b) => self.arithmetic(a, b, Number::checked_add),
            SetValue::Minus(a, b) => self.arithmetic(a, b, Number::checked_sub),
        }
    }

    fn arithmetic(
        &self,
        a: &UpdateOperand,
        b: &UpdateOperand,
        op: fn(&Number, &Number) -> Result<Number, NumberError>,
    ) -> Result<AttributeValue, ExpressionError> {
        let av = self.resolve_update_operand(a)?;
        let bv = self.resolve_update_operand(b)?;
        let (AttributeValue::N(x), AttributeValue::N(y)) = (&av, &bv) else {
            return Err(ExpressionError::ArithmeticOperandType);
        };
        let x: Number = x.parse()?;
        let y: Number = y.parse()?;
        Ok(AttributeValue::from(op(&x, &y)?))
    }

    fn resolve_update_operand(
        &self,
        operand: &UpdateOperand,
    ) -> Result<AttributeValue, ExpressionError> {
        match operand {
            UpdateOperand::Path(path) => self
                .resolve_path(path)?
                .cloned()
                .ok_or(ExpressionError::MissingAttribute),
            UpdateOperand::Value(name) => self.value(name).cloned(),
            UpdateOperand::IfNotExists(path, fallback) => match self.resolve_path(path)? {
                Some(existing) => Ok(existing.clone()),
                None => self.resolve_update_operand(fallback),
            },
            UpdateOperand::ListAppend(a, b) => {
                let av = self.resolve_update_operand(a)?;
                let bv = self.resolve_update_operand(b)?;
                match (av, bv) {
                    (AttributeValue::L(mut head), AttributeValue::L(tail)) => {
                        head.extend(tail);
                        Ok(AttributeValue::L(head))
                    }
                    (AttributeValue::L(_), other) | (other, _) => {
                        Err(ExpressionError::IncorrectFunctionOperandType {
                            kind: self.kind,
                            function: FunctionName::ListAppend.to_string(),
                            operand_type: other.type_descriptor().to_owned(),
                        })
                    }
                }
            }
        }
    }

    fn apply_add_action(
        &self,
        item: &mut HashMap<String, AttributeValue>,
        action: &AddAction,
    ) -> Result<(), ExpressionError> {
        let path = self.document_path(&action.path)?;
        let operand = self.value(&action.value)?;

        let updated = match (path.resolve(item), operand) {
            (None, AttributeValue::N(n)) => {
                AttributeValue::from(Number::zero().checked_add(&n.parse::<Number>()?)?)
            }
            (Some(AttributeValue::N(current)), AttributeValue::N(n)) => {
                let current: Number = current.parse()?;
                AttributeValue::from(current.checked_add(&n.parse::<Number>()?)?)
            }
            (None, set) if set.is_set() => set.clone(),
            (Some(AttributeValue::Ss(current)), AttributeValue::Ss(added)) => {
                AttributeValue::Ss(union(current, added, |a, b| a == b))
            }
            (Some(AttributeValue::Ns(current)), AttributeValue::Ns(added)) => {
                AttributeValue::Ns(union(current, added, |a, b| numbers_equal(a, b)))
            }
            (Some(AttributeValue::Bs(current)), AttributeValue::Bs(added)) => {
                AttributeValue::Bs(union(current, added, |a, b| a == b))
            }
            (current, operand) => {
                let offending = match current {
                    Some(existing) if operand.is_n() || operand.is_set() => existing,
                    _ => operand,
                };
                return Err(ExpressionError::IncorrectOperatorOperandType {
                    kind: self.kind,
                    operator: "ADD".to_owned(),
                    operand_type: offending.type_descriptor().to_owned(),
                });
            }
        };

        path.set(item, updated)
    }

    fn apply_delete_action(
        &self,
        item: &mut HashMap<String, AttributeValue>,
        action: &DeleteAction,
    ) -> Result<(), ExpressionError> {
        let path = self.document_path(&action.path)?;
        let operand = self.value(&action.value)?;

        let Some(existing) = path.resolve(item) else {
            if operand.is_set() {
                return Ok(());
            }
            return Err(self.delete_type_error(operand));
        };

        let remaining = match (existing, operand) {
            (AttributeValue::Ss(current), AttributeValue::Ss(removed)) => {
                AttributeValue::Ss(difference(current, removed, |a, b| a == b))
            }
            (AttributeValue::Ns(current), AttributeValue::Ns(removed)) => {
                AttributeValue::Ns(difference(current, removed, |a, b| numbers_equal(a, b)))
            }
            (AttributeValue::Bs(current), AttributeValue::Bs(removed)) => {
                AttributeValue::Bs(difference(current, removed, |a, b| a == b))
            }
            (existing, operand) => {
                let offending = if operand.is_set() { existing } else { operand };
                return Err(self.delete_type_error(offending));
            }
        };

        if remaining.collection_len() == Some(0) {
            path.remove(item)?;
            Ok(())
        } else {
            path.set(item, remaining)
        }
    }

    fn delete_type_error(&self, offending: &AttributeValue) -> ExpressionError {
        ExpressionError::IncorrectOperatorOperandType {
            kind: self.kind,
            operator: "DELETE".to_owned(),
            operand_type: offending.type_descriptor().to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Deep equality: numbers compare numerically, sets and maps ignore order.
#[must_use]
pub fn values_equal(left: &AttributeValue, right: &AttributeValue) -> bool {
    match (left, right) {
        (AttributeValue::N(a), AttributeValue::N(b)) => numbers_equal(a, b),
        (AttributeValue::Ss(a), AttributeValue::Ss(b)) => same_members(a, b, |x, y| x == y),
        (AttributeValue::Ns(a), AttributeValue::Ns(b)) => {
            same_members(a, b, |x, y| numbers_equal(x, y))
        }
        (AttributeValue::Bs(a), AttributeValue::Bs(b)) => same_members(a, b, |x, y| x == y),
        (AttributeValue::L(a), AttributeValue::L(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (AttributeValue::M(a), AttributeValue::M(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => left == right,
    }
}

/// Ordering between two values of the same scalar type (`N`, `S` or `B`).
///
/// Returns `None` for any other pairing; ordering comparators treat that as false.
#[must_use]
pub fn compare_values(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::N(a), AttributeValue::N(b)) => {
            let a: Number = a.parse().ok()?;
            let b: Number = b.parse().ok()?;
            Some(a.cmp(&b))
        }
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.as_ref().cmp(b.as_ref())),
        _ => None,
    }
}

/// Reject `BETWEEN` bounds where the lower bound sorts above the upper bound.
///
/// # Errors
///
/// Returns `ExpressionError::BetweenBounds` when `low > high`.
pub fn check_between_bounds(
    low: &AttributeValue,
    high: &AttributeValue,
    kind: ExpressionKind,
) -> Result<(), ExpressionError> {
    if compare_values(low, high) == Some(Ordering::Greater) {
        return Err(ExpressionError::BetweenBounds {
            kind,
            low: low.to_string(),
            high: high.to_string(),
        });
    }
    Ok(())
}

/// `begins_with` for strings and binaries.
#[must_use]
pub fn begins_with(value: &AttributeValue, prefix: &AttributeValue) -> bool {
    match (value, prefix) {
        (AttributeValue::S(s), AttributeValue::S(p)) => s.starts_with(p.as_str()),
        (AttributeValue::B(b), AttributeValue::B(p)) => b.starts_with(p),
        _ => false,
    }
}

fn contains(haystack: &AttributeValue, needle: &AttributeValue) -> bool {
    match (haystack, needle) {
        (AttributeValue::S(s), AttributeValue::S(sub)) => s.contains(sub.as_str()),
        (AttributeValue::Ss(set), AttributeValue::S(val)) => set.contains(val),
        (AttributeValue::Ns(set), AttributeValue::N(val)) => {
            set.iter().any(|n| numbers_equal(n, val))
        }
        (AttributeValue::Bs(set), AttributeValue::B(val)) => set.contains(val),
        (AttributeValue::L(list), _) => list.iter().any(|v| values_equal(v, needle)),
        _ => false,
    }
}

/// Result of `size(path)`: byte length for `S`/`B`, element count for collections.
fn size_of(value: &AttributeValue) -> Option<usize> {
    match value {
        AttributeValue::S(s) => Some(s.len()),
        AttributeValue::B(b) => Some(b.len()),
        other => other.collection_len(),
    }
}

/// Numeric equality of two `N` strings, falling back to text equality for
/// values that do not parse.
#[must_use]
pub fn numbers_equal(a: &str, b: &str) -> bool {
    match (a.parse::<Number>(), b.parse::<Number>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

fn same_members<T>(a: &[T], b: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| eq(x, y)))
}

fn union<T: Clone>(current: &[T], added: &[T], eq: impl Fn(&T, &T) -> bool) -> Vec<T> {
    let mut merged = current.to_vec();
    for value in added {
        if !merged.iter().any(|m| eq(m, value)) {
            merged.push(value.clone());
        }
    }
    merged
}

fn difference<T: Clone>(current: &[T], removed: &[T], eq: impl Fn(&T, &T) -> bool) -> Vec<T> {
    current
        .iter()
        .filter(|v| !removed.iter().any(|r| eq(v, r)))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
