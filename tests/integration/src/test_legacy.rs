//! Legacy (pre-expression) request parameters through the dispatcher.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{TestClient, n, s};

    const TABLE: &str = "legacy";

    fn client_with_table() -> TestClient {
        let client = TestClient::new();
        client.create_composite_table(TABLE);
        client
    }

    #[test]
    fn test_should_reject_mixed_parameters() {
        let client = client_with_table();
        let err = client.err(
            "PutItem",
            &json!({
                "TableName": TABLE,
                "Item": {"pk": s("h"), "sk": s("1")},
                "Expected": {"v": {"Exists": false}},
                "ConditionExpression": "attribute_not_exists(v)",
            }),
        );
        assert_eq!(
            err.message,
            "Can not use both expression and non-expression parameters in the same request: \
             Non-expression parameters: {Expected} Expression parameters: {ConditionExpression}"
        );

        let err = client.err(
            "UpdateItem",
            &json!({
                "TableName": TABLE,
                "Key": {"pk": s("h"), "sk": s("1")},
                "AttributeUpdates": {"v": {"Action": "PUT", "Value": n("1")}},
                "UpdateExpression": "SET v = :v",
                "ExpressionAttributeValues": {":v": n("1")},
            }),
        );
        assert_eq!(
            err.message,
            "Can not use both expression and non-expression parameters in the same request: \
             Non-expression parameters: {AttributeUpdates} Expression parameters: \
             {UpdateExpression}"
        );
    }

    #[test]
    fn test_should_reject_placeholders_without_expressions() {
        let client = client_with_table();
        let err = client.err(
            "PutItem",
            &json!({
                "TableName": TABLE,
                "Item": {"pk": s("h"), "sk": s("1")},
                "ExpressionAttributeValues": {":v": n("1")},
            }),
        );
        assert_eq!(
            err.message,
            "ExpressionAttributeValues can only be specified when using expressions"
        );
    }

    #[test]
    fn test_should_apply_expected_conditions() {
        let client = client_with_table();
        let put_once = json!({
            "TableName": TABLE,
            "Item": {"pk": s("h"), "sk": s("1"), "v": n("5")},
            "Expected": {"pk": {"Exists": false}},
        });
        client.ok("PutItem", &put_once);
        let err = client.err("PutItem", &put_once);
        assert_eq!(err.error_type, "ConditionalCheckFailedException");

        let err = client.err(
            "DeleteItem",
            &json!({
                "TableName": TABLE,
                "Key": {"pk": s("h"), "sk": s("1")},
                "Expected": {
                    "v": {"ComparisonOperator": "GT", "AttributeValueList": [n("10")]},
                    "missing": {"ComparisonOperator": "NULL"},
                },
                "ConditionalOperator": "AND",
            }),
        );
        assert_eq!(err.error_type, "ConditionalCheckFailedException");

        client.ok(
            "DeleteItem",
            &json!({
                "TableName": TABLE,
                "Key": {"pk": s("h"), "sk": s("1")},
                "Expected": {
                    "v": {"ComparisonOperator": "GT", "AttributeValueList": [n("10")]},
                    "missing": {"ComparisonOperator": "NULL"},
                },
                "ConditionalOperator": "OR",
            }),
        );
        assert!(client
            .get(TABLE, json!({"pk": s("h"), "sk": s("1")}))
            .is_none());
    }

    #[test]
    fn test_should_validate_argument_counts() {
        let client = client_with_table();
        let err = client.err(
            "PutItem",
            &json!({
                "TableName": TABLE,
                "Item": {"pk": s("h"), "sk": s("1")},
                "Expected": {"v": {"ComparisonOperator": "BETWEEN", "AttributeValueList": [n("1")]}},
            }),
        );
        assert_eq!(
            err.message,
            "One or more parameter values were invalid: Invalid number of argument(s) for the \
             BETWEEN ComparisonOperator"
        );
    }

    #[test]
    fn test_should_apply_attribute_updates() {
        let client = client_with_table();
        client.put(
            TABLE,
            json!({
                "pk": s("h"),
                "sk": s("1"),
                "count": n("1"),
                "tags": {"SS": ["a", "b"]},
                "gone": s("bye"),
            }),
        );

        let resp = client.ok(
            "UpdateItem",
            &json!({
                "TableName": TABLE,
                "Key": {"pk": s("h"), "sk": s("1")},
                "AttributeUpdates": {
                    "title": {"Action": "PUT", "Value": s("new")},
                    "count": {"Action": "ADD", "Value": n("4")},
                    "log": {"Action": "ADD", "Value": {"L": [s("first")]}},
                    "tags": {"Action": "DELETE", "Value": {"SS": ["a"]}},
                    "gone": {"Action": "DELETE"},
                },
                "ReturnValues": "ALL_NEW",
            }),
        );
        assert_eq!(
            resp["Attributes"],
            json!({
                "pk": s("h"),
                "sk": s("1"),
                "title": s("new"),
                "count": n("5"),
                "log": {"L": [s("first")]},
                "tags": {"SS": ["b"]},
            })
        );
    }

    #[test]
    fn test_should_query_with_key_conditions_and_filter() {
        let client = client_with_table();
        for (sk, v) in [("a1", "1"), ("b1", "2"), ("b2", "3"), ("c1", "4")] {
            client.put(TABLE, json!({"pk": s("h"), "sk": s(sk), "v": n(v)}));
        }

        let resp = client.ok(
            "Query",
            &json!({
                "TableName": TABLE,
                "KeyConditions": {
                    "pk": {"ComparisonOperator": "EQ", "AttributeValueList": [s("h")]},
                    "sk": {"ComparisonOperator": "BEGINS_WITH", "AttributeValueList": [s("b")]},
                },
                "QueryFilter": {
                    "v": {"ComparisonOperator": "GE", "AttributeValueList": [n("3")]},
                },
                "AttributesToGet": ["sk"],
            }),
        );
        assert_eq!(resp["Items"], json!([{"sk": s("b2")}]));
        assert_eq!(resp["ScannedCount"], 2);

        let err = client.err(
            "Query",
            &json!({
                "TableName": TABLE,
                "KeyConditions": {
                    "pk": {"ComparisonOperator": "NE", "AttributeValueList": [s("h")]},
                },
            }),
        );
        assert_eq!(
            err.message,
            "Attempted conditional constraint is not an indexable operation"
        );
    }

    #[test]
    fn test_should_scan_with_or_filter() {
        let client = client_with_table();
        for (sk, v) in [("1", "1"), ("2", "2"), ("3", "3")] {
            client.put(TABLE, json!({"pk": s("h"), "sk": s(sk), "v": n(v)}));
        }
        let resp = client.ok(
            "Scan",
            &json!({
                "TableName": TABLE,
                "ScanFilter": {
                    "v": {"ComparisonOperator": "IN", "AttributeValueList": [n("1"), n("3")]},
                    "sk": {"ComparisonOperator": "EQ", "AttributeValueList": [s("2")]},
                },
                "ConditionalOperator": "OR",
            }),
        );
        assert_eq!(resp["Count"], 3);
    }

    #[test]
    fn test_should_project_attributes_to_get() {
        let client = client_with_table();
        client.put(TABLE, json!({"pk": s("h"), "sk": s("1"), "a": s("x"), "b": s("y")}));
        let resp = client.ok(
            "GetItem",
            &json!({
                "TableName": TABLE,
                "Key": {"pk": s("h"), "sk": s("1")},
                "AttributesToGet": ["a"],
            }),
        );
        assert_eq!(resp["Item"], json!({"a": s("x")}));

        let err = client.err(
            "GetItem",
            &json!({
                "TableName": TABLE,
                "Key": {"pk": s("h"), "sk": s("1")},
                "AttributesToGet": ["a", "a"],
            }),
        );
        assert_eq!(
            err.message,
            "One or more parameter values were invalid: Duplicate value in AttributesToGet: a"
        );
    }
}
