//! Legacy (pre-expression) request parameters.
//!
//! `Expected`, `AttributeUpdates`, `KeyConditions`, `QueryFilter`,
//! `ScanFilter` and `AttributesToGet` are rewritten into expression strings
//! with generated placeholders, then run through the ordinary expression
//! pipeline. Generated placeholders use the `#lc` / `:lc` prefixes.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use dynastack_model::AttributeValue;
use dynastack_model::types::{
    AttributeAction, AttributeValueUpdate, ComparisonOperator, Condition, ConditionalOperator,
    ExpectedAttributeValue,
};

/// Errors in legacy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegacyError {
    /// Legacy and expression parameters in one request.
    #[error(
        "Can not use both expression and non-expression parameters in the same request: Non-expression parameters: {{{legacy}}} Expression parameters: {{{expression}}}"
    )]
    Mixed { legacy: String, expression: String },
    /// Placeholder maps supplied without any expression.
    #[error("{parameter} can only be specified when using expressions")]
    PlaceholdersWithoutExpression { parameter: &'static str },
    /// Wrong `AttributeValueList` length for an operator.
    #[error(
        "One or more parameter values were invalid: Invalid number of argument(s) for the {operator} ComparisonOperator"
    )]
    ArgumentCount { operator: String },
    /// An operator that cannot select by key.
    #[error("Attempted conditional constraint is not an indexable operation")]
    NotIndexable,
    /// `Exists: true` (or the default) without a `Value`.
    #[error(
        "One or more parameter values were invalid: Value must be provided when Exists is true for Attribute: {attr}"
    )]
    ExistsWithoutValue { attr: String },
    /// `Exists: false` together with a `Value`.
    #[error(
        "One or more parameter values were invalid: Value cannot be used when Exists is false for Attribute: {attr}"
    )]
    ValueWithoutExists { attr: String },
    /// `Value` or `Exists` together with `ComparisonOperator`.
    #[error(
        "One or more parameter values were invalid: Exists and Value cannot be used with ComparisonOperator for Attribute: {attr}"
    )]
    OperatorWithValue { attr: String },
    /// `ConditionalOperator` without the map it joins.
    #[error("ConditionalOperator can only be used when {parameter} is present")]
    OperatorWithoutConditions { parameter: &'static str },
    /// A name listed twice in `AttributesToGet`.
    #[error("One or more parameter values were invalid: Duplicate value in AttributesToGet: {attr}")]
    DuplicateAttribute { attr: String },
    /// `ADD` with a value that is not a number, set or list.
    #[error(
        "One or more parameter values were invalid: ADD action is not supported for the type {type_name}"
    )]
    UnsupportedAdd { type_name: &'static str },
    /// `DELETE` with a value that is not a set.
    #[error(
        "One or more parameter values were invalid: DELETE action with value is not supported for the type {type_name}"
    )]
    UnsupportedDelete { type_name: &'static str },
    /// `PUT` or `ADD` without a value.
    #[error(
        "One or more parameter values were invalid: Only DELETE action is allowed when no attribute value is specified"
    )]
    MissingUpdateValue,
}

/// Reject a request that carries both legacy and expression parameters.
///
/// Each slice lists `(parameter, present)` in the order reported.
///
/// # Errors
///
/// Returns `LegacyError::Mixed` naming every present parameter of each kind.
pub fn check_mixing(legacy: &[(&str, bool)], expression: &[(&str, bool)]) -> Result<(), LegacyError> {
    let present = |params: &[(&str, bool)]| {
        params
            .iter()
            .filter(|(_, present)| *present)
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let legacy = present(legacy);
    let expression = present(expression);
    if legacy.is_empty() || expression.is_empty() {
        return Ok(());
    }
    Err(LegacyError::Mixed { legacy, expression })
}

/// Reject placeholder maps on a request that uses no expression.
///
/// # Errors
///
/// Returns `LegacyError::PlaceholdersWithoutExpression`.
pub fn check_placeholders_used(
    uses_expressions: bool,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<(), LegacyError> {
    if uses_expressions {
        return Ok(());
    }
    if !names.is_empty() {
        return Err(LegacyError::PlaceholdersWithoutExpression {
            parameter: "ExpressionAttributeNames",
        });
    }
    if !values.is_empty() {
        return Err(LegacyError::PlaceholdersWithoutExpression {
            parameter: "ExpressionAttributeValues",
        });
    }
    Ok(())
}

/// Collects generated placeholders while legacy parameters are rewritten.
#[derive(Debug, Default)]
pub struct LegacyExpressions {
    /// Generated `#lc*` names.
    pub names: HashMap<String, String>,
    /// Generated `:lc*` values.
    pub values: HashMap<String, AttributeValue>,
    counter: usize,
}

impl LegacyExpressions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the generated placeholders into a request's maps.
    pub fn merge_into(
        self,
        names: &mut HashMap<String, String>,
        values: &mut HashMap<String, AttributeValue>,
    ) {
        names.extend(self.names);
        values.extend(self.values);
    }

    fn name(&mut self, attr: &str) -> String {
        let placeholder = format!("#lc{}", self.counter);
        self.counter += 1;
        self.names.insert(placeholder.clone(), attr.to_owned());
        placeholder
    }

    fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!(":lc{}", self.counter);
        self.counter += 1;
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    /// Rewrite `KeyConditions` into a key-condition expression.
    ///
    /// # Errors
    ///
    /// Returns `NotIndexable` for operators a key cannot use, or
    /// `ArgumentCount` for a wrong number of values.
    pub fn key_conditions(
        &mut self,
        conditions: &HashMap<String, Condition>,
    ) -> Result<Option<String>, LegacyError> {
        for condition in conditions.values() {
            if !matches!(
                condition.comparison_operator,
                ComparisonOperator::Eq
                    | ComparisonOperator::Le
                    | ComparisonOperator::Lt
                    | ComparisonOperator::Ge
                    | ComparisonOperator::Gt
                    | ComparisonOperator::BeginsWith
                    | ComparisonOperator::Between
            ) {
                return Err(LegacyError::NotIndexable);
            }
        }
        self.conditions(conditions, None)
    }

    /// Rewrite `QueryFilter` / `ScanFilter` into a filter expression.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentCount` for a wrong number of values.
    pub fn conditions(
        &mut self,
        conditions: &HashMap<String, Condition>,
        operator: Option<&ConditionalOperator>,
    ) -> Result<Option<String>, LegacyError> {
        let mut parts = Vec::with_capacity(conditions.len());
        for attr in sorted_keys(conditions) {
            let condition = &conditions[attr];
            parts.push(self.comparison(
                attr,
                &condition.comparison_operator,
                &condition.attribute_value_list,
            )?);
        }
        Ok(join(parts, operator))
    }

    /// Rewrite `Expected` into a condition expression.
    ///
    /// # Errors
    ///
    /// Returns a `LegacyError` for contradictory `Exists`/`Value`/operator
    /// combinations or a wrong number of values.
    pub fn expected(
        &mut self,
        expected: &HashMap<String, ExpectedAttributeValue>,
        operator: Option<&ConditionalOperator>,
    ) -> Result<Option<String>, LegacyError> {
        if expected.is_empty() && operator.is_some() {
            return Err(LegacyError::OperatorWithoutConditions {
                parameter: "Expected",
            });
        }
        let mut parts = Vec::with_capacity(expected.len());
        for attr in sorted_keys(expected) {
            let entry = &expected[attr];
            let part = match (&entry.comparison_operator, entry.exists, &entry.value) {
                (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                    return Err(LegacyError::OperatorWithValue { attr: attr.clone() });
                }
                (Some(op), None, None) => self.comparison(attr, op, &entry.attribute_value_list)?,
                (None, Some(false), Some(_)) => {
                    return Err(LegacyError::ValueWithoutExists { attr: attr.clone() });
                }
                (None, Some(false), None) => {
                    format!("attribute_not_exists({})", self.name(attr))
                }
                (None, _, Some(value)) => {
                    let name = self.name(attr);
                    let value = self.value(value);
                    format!("{name} = {value}")
                }
                (None, _, None) => {
                    return Err(LegacyError::ExistsWithoutValue { attr: attr.clone() });
                }
            };
            parts.push(part);
        }
        Ok(join(parts, operator))
    }

    /// Rewrite `AttributeUpdates` into an update expression.
    ///
    /// # Errors
    ///
    /// Returns a `LegacyError` for an action the value's type cannot take.
    pub fn attribute_updates(
        &mut self,
        updates: &HashMap<String, AttributeValueUpdate>,
    ) -> Result<Option<String>, LegacyError> {
        let mut set = Vec::new();
        let mut remove = Vec::new();
        let mut add = Vec::new();
        let mut delete = Vec::new();

        for attr in sorted_keys(updates) {
            let update = &updates[attr];
            let action = update.action.as_ref().unwrap_or(&AttributeAction::Put);
            match (action, &update.value) {
                (AttributeAction::Put, Some(value)) => {
                    let name = self.name(attr);
                    let value = self.value(value);
                    set.push(format!("{name} = {value}"));
                }
                (AttributeAction::Delete, None) => remove.push(self.name(attr)),
                (AttributeAction::Delete, Some(value)) => {
                    if !value.is_set() {
                        return Err(LegacyError::UnsupportedDelete {
                            type_name: value.type_descriptor(),
                        });
                    }
                    let name = self.name(attr);
                    let value = self.value(value);
                    delete.push(format!("{name} {value}"));
                }
                (AttributeAction::Add, Some(value @ AttributeValue::L(_))) => {
                    let name = self.name(attr);
                    let empty = self.value(&AttributeValue::L(Vec::new()));
                    let value = self.value(value);
                    set.push(format!(
                        "{name} = list_append(if_not_exists({name}, {empty}), {value})"
                    ));
                }
                (AttributeAction::Add, Some(value)) => {
                    if !value.is_n() && !value.is_set() {
                        return Err(LegacyError::UnsupportedAdd {
                            type_name: value.type_descriptor(),
                        });
                    }
                    let name = self.name(attr);
                    let value = self.value(value);
                    add.push(format!("{name} {value}"));
                }
                (AttributeAction::Put | AttributeAction::Add, None) => {
                    return Err(LegacyError::MissingUpdateValue);
                }
            }
        }

        let clauses: Vec<String> = [("SET", set), ("REMOVE", remove), ("ADD", add), ("DELETE", delete)]
            .into_iter()
            .filter(|(_, actions)| !actions.is_empty())
            .map(|(clause, actions)| format!("{clause} {}", actions.join(", ")))
            .collect();
        Ok((!clauses.is_empty()).then(|| clauses.join(" ")))
    }

    /// Rewrite `AttributesToGet` into a projection expression.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateAttribute` when a name is listed twice.
    pub fn attributes_to_get(&mut self, attrs: &[String]) -> Result<Option<String>, LegacyError> {
        let mut seen = HashSet::new();
        let mut paths = Vec::with_capacity(attrs.len());
        for attr in attrs {
            if !seen.insert(attr.as_str()) {
                return Err(LegacyError::DuplicateAttribute { attr: attr.clone() });
            }
            paths.push(self.name(attr));
        }
        Ok((!paths.is_empty()).then(|| paths.join(", ")))
    }

    fn comparison(
        &mut self,
        attr: &str,
        op: &ComparisonOperator,
        args: &[AttributeValue],
    ) -> Result<String, LegacyError> {
        let expected = match op {
            ComparisonOperator::Null | ComparisonOperator::NotNull => Some(0),
            ComparisonOperator::Between => Some(2),
            ComparisonOperator::In => None,
            _ => Some(1),
        };
        let count_ok = expected.map_or(!args.is_empty(), |n| args.len() == n);
        if !count_ok {
            return Err(LegacyError::ArgumentCount {
                operator: op.as_str().to_owned(),
            });
        }

        let name = self.name(attr);
        let fragment = match op {
            ComparisonOperator::Null => format!("attribute_not_exists({name})"),
            ComparisonOperator::NotNull => format!("attribute_exists({name})"),
            ComparisonOperator::Between => {
                let low = self.value(&args[0]);
                let high = self.value(&args[1]);
                format!("{name} BETWEEN {low} AND {high}")
            }
            ComparisonOperator::In => {
                let list: Vec<String> = args.iter().map(|v| self.value(v)).collect();
                format!("{name} IN ({})", list.join(", "))
            }
            ComparisonOperator::Contains => {
                let value = self.value(&args[0]);
                format!("contains({name}, {value})")
            }
            ComparisonOperator::NotContains => {
                // A missing attribute fails NOT_CONTAINS.
                let value = self.value(&args[0]);
                format!("(attribute_exists({name}) AND NOT contains({name}, {value}))")
            }
            ComparisonOperator::BeginsWith => {
                let value = self.value(&args[0]);
                format!("begins_with({name}, {value})")
            }
            ComparisonOperator::Eq
            | ComparisonOperator::Ne
            | ComparisonOperator::Le
            | ComparisonOperator::Lt
            | ComparisonOperator::Ge
            | ComparisonOperator::Gt => {
                let symbol = match op {
                    ComparisonOperator::Eq => "=",
                    ComparisonOperator::Ne => "<>",
                    ComparisonOperator::Le => "<=",
                    ComparisonOperator::Lt => "<",
                    ComparisonOperator::Ge => ">=",
                    _ => ">",
                };
                let value = self.value(&args[0]);
                format!("{name} {symbol} {value}")
            }
        };
        Ok(fragment)
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys
}

fn join(parts: Vec<String>, operator: Option<&ConditionalOperator>) -> Option<String> {
    if parts.is_empty() {
        return None;
    }
    let joiner = match operator {
        Some(ConditionalOperator::Or) => " OR ",
        _ => " AND ",
    };
    Some(parts.join(joiner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionKind, RequestExpressions};

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_owned())
    }

    fn n(v: &str) -> AttributeValue {
        AttributeValue::N(v.to_owned())
    }

    fn condition(op: ComparisonOperator, args: Vec<AttributeValue>) -> Condition {
        Condition {
            comparison_operator: op,
            attribute_value_list: args,
        }
    }

    #[test]
    fn test_should_report_mixed_parameters_in_order() {
        let err = check_mixing(
            &[("AttributesToGet", true), ("QueryFilter", true), ("KeyConditions", false)],
            &[("ProjectionExpression", true), ("FilterExpression", false)],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can not use both expression and non-expression parameters in the same request: Non-expression parameters: {AttributesToGet, QueryFilter} Expression parameters: {ProjectionExpression}"
        );
        assert!(check_mixing(&[("Expected", true)], &[("ConditionExpression", false)]).is_ok());
    }

    #[test]
    fn test_should_convert_filter_conditions() {
        let mut legacy = LegacyExpressions::new();
        let filter = HashMap::from([
            ("a".to_owned(), condition(ComparisonOperator::Between, vec![n("1"), n("5")])),
            ("b".to_owned(), condition(ComparisonOperator::NotNull, vec![])),
        ]);
        let expr = legacy
            .conditions(&filter, Some(&ConditionalOperator::Or))
            .unwrap()
            .unwrap();
        assert_eq!(expr, "#lc0 BETWEEN :lc1 AND :lc2 OR attribute_exists(#lc3)");

        let mut exprs = RequestExpressions::new(&legacy.names, &legacy.values);
        let parsed = exprs.condition(&expr, ExpressionKind::Filter).unwrap();
        let item = HashMap::from([("a".to_owned(), n("3"))]);
        assert!(exprs.context(&item, ExpressionKind::Filter).evaluate(&parsed).unwrap());
        exprs.finish().unwrap();
    }

    #[test]
    fn test_should_check_argument_counts() {
        let mut legacy = LegacyExpressions::new();
        let filter = HashMap::from([("a".to_owned(), condition(ComparisonOperator::Eq, vec![]))]);
        assert_eq!(
            legacy.conditions(&filter, None).unwrap_err().to_string(),
            "One or more parameter values were invalid: Invalid number of argument(s) for the EQ ComparisonOperator"
        );
    }

    #[test]
    fn test_should_reject_unindexable_key_conditions() {
        let mut legacy = LegacyExpressions::new();
        let conditions = HashMap::from([(
            "pk".to_owned(),
            condition(ComparisonOperator::Ne, vec![s("a")]),
        )]);
        assert_eq!(
            legacy.key_conditions(&conditions),
            Err(LegacyError::NotIndexable)
        );
    }

    #[test]
    fn test_should_convert_expected_forms() {
        let mut legacy = LegacyExpressions::new();
        let expected = HashMap::from([
            (
                "a".to_owned(),
                ExpectedAttributeValue {
                    value: Some(s("x")),
                    exists: None,
                    comparison_operator: None,
                    attribute_value_list: Vec::new(),
                },
            ),
            (
                "b".to_owned(),
                ExpectedAttributeValue {
                    value: None,
                    exists: Some(false),
                    comparison_operator: None,
                    attribute_value_list: Vec::new(),
                },
            ),
        ]);
        let expr = legacy.expected(&expected, None).unwrap().unwrap();
        assert_eq!(expr, "#lc0 = :lc1 AND attribute_not_exists(#lc2)");

        let bad = HashMap::from([(
            "c".to_owned(),
            ExpectedAttributeValue {
                value: None,
                exists: Some(true),
                comparison_operator: None,
                attribute_value_list: Vec::new(),
            },
        )]);
        assert!(matches!(
            legacy.expected(&bad, None),
            Err(LegacyError::ExistsWithoutValue { .. })
        ));
    }

    #[test]
    fn test_should_convert_attribute_updates() {
        let mut legacy = LegacyExpressions::new();
        let updates = HashMap::from([
            (
                "count".to_owned(),
                AttributeValueUpdate {
                    value: Some(n("1")),
                    action: Some(AttributeAction::Add),
                },
            ),
            (
                "gone".to_owned(),
                AttributeValueUpdate {
                    value: None,
                    action: Some(AttributeAction::Delete),
                },
            ),
            (
                "list".to_owned(),
                AttributeValueUpdate {
                    value: Some(AttributeValue::L(vec![s("x")])),
                    action: Some(AttributeAction::Add),
                },
            ),
            (
                "name".to_owned(),
                AttributeValueUpdate {
                    value: Some(s("v")),
                    action: None,
                },
            ),
        ]);
        let expr = legacy.attribute_updates(&updates).unwrap().unwrap();
        assert_eq!(
            expr,
            "SET #lc3 = list_append(if_not_exists(#lc3, :lc4), :lc5), #lc6 = :lc7 REMOVE #lc2 ADD #lc0 :lc1"
        );

        let mut exprs = RequestExpressions::new(&legacy.names, &legacy.values);
        let parsed = exprs.update(&expr).unwrap();
        let item = HashMap::from([("gone".to_owned(), s("old"))]);
        let updated = exprs
            .context(&item, ExpressionKind::Update)
            .apply_update(&parsed.expr)
            .unwrap();
        assert_eq!(updated["count"], n("1"));
        assert_eq!(updated["list"], AttributeValue::L(vec![s("x")]));
        assert!(!updated.contains_key("gone"));
        exprs.finish().unwrap();
    }

    #[test]
    fn test_should_reject_duplicate_attributes_to_get() {
        let mut legacy = LegacyExpressions::new();
        let attrs = vec!["a".to_owned(), "a".to_owned()];
        assert_eq!(
            legacy.attributes_to_get(&attrs).unwrap_err().to_string(),
            "One or more parameter values were invalid: Duplicate value in AttributesToGet: a"
        );
    }
}
