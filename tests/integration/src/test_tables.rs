//! Table administration through the dispatcher.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{TestClient, s};

    #[test]
    fn test_should_create_and_describe_table() {
        let client = TestClient::new();
        client.create_indexed_table("orders");

        let desc = client.ok("DescribeTable", &json!({"TableName": "orders"}));
        let table = &desc["Table"];
        assert_eq!(table["TableName"], "orders");
        assert_eq!(table["TableStatus"], "ACTIVE");
        assert_eq!(
            table["TableArn"],
            "arn:aws:dynamodb:us-east-1:000000000000:table/orders"
        );
        assert_eq!(table["KeySchema"].as_array().unwrap().len(), 2);
        assert_eq!(table["GlobalSecondaryIndexes"][0]["IndexName"], "by_status");
        assert_eq!(table["LocalSecondaryIndexes"][0]["IndexName"], "by_score");
        assert_eq!(table["ItemCount"], 0);
    }

    #[test]
    fn test_should_count_items_in_description() {
        let client = TestClient::new();
        client.create_simple_table("counted");
        client.put("counted", json!({"pk": s("a")}));
        client.put("counted", json!({"pk": s("b")}));

        let desc = client.ok("DescribeTable", &json!({"TableName": "counted"}));
        assert_eq!(desc["Table"]["ItemCount"], 2);
    }

    #[test]
    fn test_should_reject_duplicate_table() {
        let client = TestClient::new();
        client.create_simple_table("dup");
        let err = client.err(
            "CreateTable",
            &json!({
                "TableName": "dup",
                "KeySchema": [{"AttributeName": "pk", "KeyType": "HASH"}],
                "AttributeDefinitions": [{"AttributeName": "pk", "AttributeType": "S"}],
            }),
        );
        assert_eq!(err.error_type, "ResourceInUseException");
        assert_eq!(err.message, "Table already exists: dup");
    }

    #[test]
    fn test_should_name_missing_table_on_describe_and_delete() {
        let client = TestClient::new();
        for op in ["DescribeTable", "DeleteTable"] {
            let err = client.err(op, &json!({"TableName": "ghost"}));
            assert_eq!(err.error_type, "ResourceNotFoundException");
            assert_eq!(
                err.message,
                "Requested resource not found: Table: ghost not found"
            );
        }
    }

    #[test]
    fn test_should_reject_item_operations_after_delete() {
        let client = TestClient::new();
        client.create_simple_table("gone");
        let deleted = client.ok("DeleteTable", &json!({"TableName": "gone"}));
        assert_eq!(deleted["TableDescription"]["TableName"], "gone");

        let err = client.err(
            "GetItem",
            &json!({"TableName": "gone", "Key": {"pk": s("a")}}),
        );
        assert_eq!(err.error_type, "ResourceNotFoundException");
        assert_eq!(err.message, "Requested resource not found");
    }

    #[test]
    fn test_should_validate_table_name() {
        let client = TestClient::new();
        let err = client.err(
            "CreateTable",
            &json!({
                "TableName": "ab",
                "KeySchema": [{"AttributeName": "pk", "KeyType": "HASH"}],
                "AttributeDefinitions": [{"AttributeName": "pk", "AttributeType": "S"}],
            }),
        );
        assert_eq!(err.error_type, "ValidationException");
        assert!(err.message.contains("at least 3 characters"));

        let err = client.err(
            "CreateTable",
            &json!({
                "TableName": "bad name!",
                "KeySchema": [{"AttributeName": "pk", "KeyType": "HASH"}],
                "AttributeDefinitions": [{"AttributeName": "pk", "AttributeType": "S"}],
            }),
        );
        assert!(err.message.contains("regular expression pattern"));
    }

    #[test]
    fn test_should_require_index_keys_in_attribute_definitions() {
        let client = TestClient::new();
        let err = client.err(
            "CreateTable",
            &json!({
                "TableName": "undefined_keys",
                "KeySchema": [{"AttributeName": "pk", "KeyType": "HASH"}],
                "AttributeDefinitions": [{"AttributeName": "pk", "AttributeType": "S"}],
                "GlobalSecondaryIndexes": [{
                    "IndexName": "g",
                    "KeySchema": [{"AttributeName": "other", "KeyType": "HASH"}],
                    "Projection": {"ProjectionType": "ALL"},
                }],
            }),
        );
        assert_eq!(
            err.message,
            "One or more parameter values were invalid: Some index key attributes are not \
             defined in AttributeDefinitions. Keys: [pk, other], AttributeDefinitions: [pk]"
        );
    }

    #[test]
    fn test_should_reject_duplicate_index_names() {
        let client = TestClient::new();
        let index = json!({
            "IndexName": "same",
            "KeySchema": [{"AttributeName": "g", "KeyType": "HASH"}],
            "Projection": {"ProjectionType": "ALL"},
        });
        let err = client.err(
            "CreateTable",
            &json!({
                "TableName": "dup_index",
                "KeySchema": [{"AttributeName": "pk", "KeyType": "HASH"}],
                "AttributeDefinitions": [
                    {"AttributeName": "pk", "AttributeType": "S"},
                    {"AttributeName": "g", "AttributeType": "S"},
                ],
                "GlobalSecondaryIndexes": [index.clone(), index],
            }),
        );
        assert_eq!(
            err.message,
            "One or more parameter values were invalid: Duplicate index name: same"
        );
    }

    #[test]
    fn test_should_require_range_key_for_local_index() {
        let client = TestClient::new();
        let err = client.err(
            "CreateTable",
            &json!({
                "TableName": "lsi_without_range",
                "KeySchema": [{"AttributeName": "pk", "KeyType": "HASH"}],
                "AttributeDefinitions": [
                    {"AttributeName": "pk", "AttributeType": "S"},
                    {"AttributeName": "l", "AttributeType": "S"},
                ],
                "LocalSecondaryIndexes": [{
                    "IndexName": "local",
                    "KeySchema": [
                        {"AttributeName": "pk", "KeyType": "HASH"},
                        {"AttributeName": "l", "KeyType": "RANGE"},
                    ],
                    "Projection": {"ProjectionType": "ALL"},
                }],
            }),
        );
        assert_eq!(err.error_type, "ValidationException");
        assert!(err.message.contains("LocalSecondaryIndex"));
    }

    #[test]
    fn test_should_default_billing_mode_from_throughput() {
        let client = TestClient::new();
        let created = client.ok(
            "CreateTable",
            &json!({
                "TableName": "provisioned",
                "KeySchema": [{"AttributeName": "pk", "KeyType": "HASH"}],
                "AttributeDefinitions": [{"AttributeName": "pk", "AttributeType": "S"}],
                "ProvisionedThroughput": {"ReadCapacityUnits": 5, "WriteCapacityUnits": 5},
            }),
        );
        assert_eq!(
            created["TableDescription"]["BillingModeSummary"]["BillingMode"],
            "PROVISIONED"
        );
    }

    #[test]
    fn test_should_paginate_list_tables() {
        let client = TestClient::new();
        for name in ["table_c", "table_a", "table_b"] {
            client.create_simple_table(name);
        }

        let all = client.ok("ListTables", &json!({}));
        assert_eq!(all["TableNames"], json!(["table_a", "table_b", "table_c"]));
        assert!(all.get("LastEvaluatedTableName").is_none());

        let first = client.ok("ListTables", &json!({"Limit": 2}));
        assert_eq!(first["TableNames"], json!(["table_a", "table_b"]));
        assert_eq!(first["LastEvaluatedTableName"], "table_b");

        let second = client.ok(
            "ListTables",
            &json!({"Limit": 2, "ExclusiveStartTableName": "table_b"}),
        );
        assert_eq!(second["TableNames"], json!(["table_c"]));

        let err = client.err("ListTables", &json!({"Limit": 101}));
        assert_eq!(err.error_type, "ValidationException");
    }
}
