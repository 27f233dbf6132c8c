//! Item reads and writes through the dispatcher.

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{TestClient, n, s};

    const TABLE: &str = "items";

    fn client_with_table() -> TestClient {
        let client = TestClient::new();
        client.create_simple_table(TABLE);
        client
    }

    fn update(client: &TestClient, body: Value) -> Value {
        let mut body = body;
        body["TableName"] = json!(TABLE);
        client.ok("UpdateItem", &body)
    }

    fn update_err(client: &TestClient, body: Value) -> crate::ApiError {
        let mut body = body;
        body["TableName"] = json!(TABLE);
        client.err("UpdateItem", &body)
    }

    #[test]
    fn test_should_round_trip_every_attribute_type() {
        let client = client_with_table();
        let item = json!({
            "pk": s("all-types"),
            "str": s("hello"),
            "num": n("-12.5"),
            "bin": {"B": "AQID"},
            "flag": {"BOOL": true},
            "nothing": {"NULL": true},
            "strs": {"SS": ["a", "b"]},
            "nums": {"NS": ["1", "2.5"]},
            "bins": {"BS": ["AQ==", "Ag=="]},
            "list": {"L": [s("x"), n("1"), {"L": []}]},
            "map": {"M": {"nested": {"M": {"deep": s("")}}}},
        });
        client.put(TABLE, item.clone());

        let got = client.get(TABLE, json!({"pk": s("all-types")})).unwrap();
        assert_eq!(got, item);
    }

    #[test]
    fn test_should_store_numbers_in_canonical_form() {
        let client = client_with_table();
        client.put(
            TABLE,
            json!({
                "pk": s("numbers"),
                "zero": n("-0.000"),
                "plus": n("+5"),
                "half": n(".5"),
                "padded": n("007.2500"),
                "set": {"NS": ["1.0", "+2"]},
                "nested": {"L": [{"M": {"deep": n("10.0")}}]},
            }),
        );

        let got = client.get(TABLE, json!({"pk": s("numbers")})).unwrap();
        assert_eq!(got["zero"], n("0"));
        assert_eq!(got["plus"], n("5"));
        assert_eq!(got["half"], n("0.5"));
        assert_eq!(got["padded"], n("7.25"));
        assert_eq!(got["nested"], json!({"L": [{"M": {"deep": n("10")}}]}));
        let mut set: Vec<&str> = got["set"]["NS"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        set.sort_unstable();
        assert_eq!(set, ["1", "2"]);

        let updated = update(
            &client,
            json!({
                "Key": {"pk": s("numbers")},
                "UpdateExpression": "SET copied = :v",
                "ExpressionAttributeValues": {":v": n("3.1400")},
                "ReturnValues": "UPDATED_NEW",
            }),
        );
        assert_eq!(updated["Attributes"], json!({"copied": n("3.14")}));
    }

    #[test]
    fn test_should_not_mutate_item_when_projecting() {
        let client = client_with_table();
        let item = json!({
            "pk": s("p"),
            "a": {"M": {"b": s("1"), "c": s("2")}},
            "list": {"L": [s("x"), s("y"), s("z")]},
        });
        client.put(TABLE, item.clone());

        let projected = client.ok(
            "GetItem",
            &json!({
                "TableName": TABLE,
                "Key": {"pk": s("p")},
                "ProjectionExpression": "a.b, #l[1]",
                "ExpressionAttributeNames": {"#l": "list"},
            }),
        );
        assert_eq!(
            projected["Item"],
            json!({"a": {"M": {"b": s("1")}}, "list": {"L": [s("y")]}})
        );
        assert_eq!(client.get(TABLE, json!({"pk": s("p")})).unwrap(), item);
    }

    #[test]
    fn test_should_reject_reserved_word_in_projection() {
        let client = client_with_table();
        let err = client.err(
            "GetItem",
            &json!({
                "TableName": TABLE,
                "Key": {"pk": s("p")},
                "ProjectionExpression": "name",
            }),
        );
        assert_eq!(
            err.message,
            "Invalid ProjectionExpression: Attribute name is a reserved keyword; reserved \
             keyword: name"
        );
    }

    #[test]
    fn test_should_reject_key_that_does_not_match_schema() {
        let client = client_with_table();
        let err = client.err(
            "GetItem",
            &json!({"TableName": TABLE, "Key": {"pk": s("a"), "extra": s("b")}}),
        );
        assert_eq!(err.error_type, "ValidationException");
        assert_eq!(err.message, "The provided key element does not match the schema");
    }

    #[test]
    fn test_should_validate_key_attributes_on_put() {
        let client = client_with_table();

        let err = client.err("PutItem", &json!({"TableName": TABLE, "Item": {"x": s("1")}}));
        assert_eq!(
            err.message,
            "One or more parameter values were invalid: Missing the key pk in the item"
        );

        let err = client.err("PutItem", &json!({"TableName": TABLE, "Item": {"pk": n("1")}}));
        assert_eq!(
            err.message,
            "One or more parameter values were invalid: Type mismatch for key pk expected: S \
             actual: N"
        );

        let err = client.err("PutItem", &json!({"TableName": TABLE, "Item": {"pk": s("")}}));
        assert_eq!(
            err.message,
            "One or more parameter values were invalid: An AttributeValue may not contain an \
             empty string. Key: pk"
        );
    }

    #[test]
    fn test_should_validate_numbers_and_sets() {
        let client = client_with_table();
        let err = client.err(
            "PutItem",
            &json!({"TableName": TABLE, "Item": {"pk": s("a"), "v": n("1e200")}}),
        );
        assert_eq!(err.error_type, "ValidationException");
        assert!(err.message.contains("Number overflow"));

        let err = client.err(
            "PutItem",
            &json!({"TableName": TABLE, "Item": {"pk": s("a"), "v": {"SS": ["x", "x"]}}}),
        );
        assert!(err.message.ends_with("contains duplicates."));
    }

    #[test]
    fn test_should_reject_oversized_item() {
        let client = client_with_table();
        let big = "x".repeat(401 * 1024);
        let err = client.err(
            "PutItem",
            &json!({"TableName": TABLE, "Item": {"pk": s("big"), "blob": s(&big)}}),
        );
        assert_eq!(err.message, "Item size has exceeded the maximum allowed size");
        assert!(client.get(TABLE, json!({"pk": s("big")})).is_none());
    }

    #[test]
    fn test_should_enforce_put_condition() {
        let client = client_with_table();
        let body = json!({
            "TableName": TABLE,
            "Item": {"pk": s("once")},
            "ConditionExpression": "attribute_not_exists(pk)",
        });
        client.ok("PutItem", &body);

        let err = client.err("PutItem", &body);
        assert_eq!(err.error_type, "ConditionalCheckFailedException");
        assert_eq!(err.message, "The conditional request failed");
    }

    #[test]
    fn test_should_return_old_item_on_put_and_delete() {
        let client = client_with_table();
        client.put(TABLE, json!({"pk": s("k"), "v": n("1")}));

        let put = client.ok(
            "PutItem",
            &json!({
                "TableName": TABLE,
                "Item": {"pk": s("k"), "v": n("2")},
                "ReturnValues": "ALL_OLD",
            }),
        );
        assert_eq!(put["Attributes"], json!({"pk": s("k"), "v": n("1")}));

        let deleted = client.ok(
            "DeleteItem",
            &json!({"TableName": TABLE, "Key": {"pk": s("k")}, "ReturnValues": "ALL_OLD"}),
        );
        assert_eq!(deleted["Attributes"], json!({"pk": s("k"), "v": n("2")}));
        assert!(client.get(TABLE, json!({"pk": s("k")})).is_none());
    }

    #[test]
    fn test_should_reject_return_values_not_allowed_for_put() {
        let client = client_with_table();
        let err = client.err(
            "PutItem",
            &json!({"TableName": TABLE, "Item": {"pk": s("k")}, "ReturnValues": "ALL_NEW"}),
        );
        assert_eq!(err.message, "Return values set to invalid value");

        let err = update_err(
            &client,
            json!({"Key": {"pk": s("k")}, "ReturnValues": "SOMETIMES"}),
        );
        assert_eq!(err.message, "Return values set to invalid value");
    }

    #[test]
    fn test_should_enforce_delete_condition() {
        let client = client_with_table();
        client.put(TABLE, json!({"pk": s("k"), "state": s("locked")}));
        let err = client.err(
            "DeleteItem",
            &json!({
                "TableName": TABLE,
                "Key": {"pk": s("k")},
                "ConditionExpression": "#s = :open",
                "ExpressionAttributeNames": {"#s": "state"},
                "ExpressionAttributeValues": {":open": s("open")},
            }),
        );
        assert_eq!(err.error_type, "ConditionalCheckFailedException");
        assert!(client.get(TABLE, json!({"pk": s("k")})).is_some());
    }

    #[test]
    fn test_should_leave_missing_item_absent_after_failed_update() {
        let client = client_with_table();
        let err = update_err(
            &client,
            json!({
                "Key": {"pk": s("new")},
                "UpdateExpression": "SET total = total + :one",
                "ExpressionAttributeValues": {":one": n("1")},
            }),
        );
        assert_eq!(err.error_type, "ValidationException");
        assert!(client.get(TABLE, json!({"pk": s("new")})).is_none());
    }

    #[test]
    fn test_should_leave_item_unchanged_after_failed_update() {
        let client = client_with_table();
        let item = json!({"pk": s("k"), "label": s("x"), "hits": n("1")});
        client.put(TABLE, item.clone());

        let err = update_err(
            &client,
            json!({
                "Key": {"pk": s("k")},
                "UpdateExpression": "SET hits = hits + :one ADD label :one",
                "ExpressionAttributeValues": {":one": n("1")},
            }),
        );
        assert_eq!(err.error_type, "ValidationException");
        assert_eq!(client.get(TABLE, json!({"pk": s("k")})).unwrap(), item);
    }

    #[test]
    fn test_should_report_update_syntax_error_windows() {
        let client = client_with_table();
        let err = update_err(
            &client,
            json!({"Key": {"pk": s("k")}, "UpdateExpression": "SET MyStr = myNum + 1"}),
        );
        assert_eq!(
            err.message,
            "Invalid UpdateExpression: Syntax error; token: \"1\", near: \"+ 1\""
        );

        let err = update_err(
            &client,
            json!({"Key": {"pk": s("k")}, "UpdateExpression": "SET MyStr = myNum Mystr2 myNum2"}),
        );
        assert_eq!(
            err.message,
            "Invalid UpdateExpression: Syntax error; token: \"Mystr2\", near: \"myNum Mystr2 myNum2\""
        );
    }

    #[test]
    fn test_should_remove_set_emptied_by_add_then_delete() {
        let client = client_with_table();
        let values = json!({":tags": {"SS": ["a", "b"]}});
        update(
            &client,
            json!({
                "Key": {"pk": s("k")},
                "UpdateExpression": "ADD tags :tags",
                "ExpressionAttributeValues": values,
            }),
        );
        assert_eq!(
            client.get(TABLE, json!({"pk": s("k")})).unwrap()["tags"],
            json!({"SS": ["a", "b"]})
        );

        update(
            &client,
            json!({
                "Key": {"pk": s("k")},
                "UpdateExpression": "DELETE tags :tags",
                "ExpressionAttributeValues": values,
            }),
        );
        assert_eq!(
            client.get(TABLE, json!({"pk": s("k")})).unwrap(),
            json!({"pk": s("k")})
        );
    }

    #[test]
    fn test_should_append_with_if_not_exists() {
        let client = client_with_table();
        let body = json!({
            "Key": {"pk": s("k")},
            "UpdateExpression": "SET events = list_append(if_not_exists(events, :empty), :new)",
            "ExpressionAttributeValues": {
                ":empty": {"L": []},
                ":new": {"L": [s("a"), s("b")]},
            },
            "ReturnValues": "ALL_NEW",
        });

        let first = update(&client, body.clone());
        assert_eq!(first["Attributes"]["events"], json!({"L": [s("a"), s("b")]}));

        let second = update(&client, body);
        assert_eq!(
            second["Attributes"]["events"],
            json!({"L": [s("a"), s("b"), s("a"), s("b")]})
        );
    }

    #[test]
    fn test_should_return_updated_paths_with_nesting() {
        let client = client_with_table();
        client.put(
            TABLE,
            json!({
                "pk": s("k"),
                "profile": {"M": {"age": n("30"), "city": s("Oslo")}},
                "other": s("untouched"),
            }),
        );

        let old = update(
            &client,
            json!({
                "Key": {"pk": s("k")},
                "UpdateExpression": "SET profile.age = :age",
                "ExpressionAttributeValues": {":age": n("31")},
                "ReturnValues": "UPDATED_OLD",
            }),
        );
        assert_eq!(old["Attributes"], json!({"profile": {"M": {"age": n("30")}}}));

        let new = update(
            &client,
            json!({
                "Key": {"pk": s("k")},
                "UpdateExpression": "SET profile.age = profile.age + :one",
                "ExpressionAttributeValues": {":one": n("1")},
                "ReturnValues": "UPDATED_NEW",
            }),
        );
        assert_eq!(new["Attributes"], json!({"profile": {"M": {"age": n("32")}}}));
    }

    #[test]
    fn test_should_reject_updating_key_attribute() {
        let client = client_with_table();
        let err = update_err(
            &client,
            json!({
                "Key": {"pk": s("k")},
                "UpdateExpression": "SET pk = :v",
                "ExpressionAttributeValues": {":v": s("other")},
            }),
        );
        assert_eq!(
            err.message,
            "One or more parameter values were invalid: Cannot update attribute pk. This \
             attribute is part of the key"
        );
    }

    #[test]
    fn test_should_reject_unused_and_undefined_placeholders() {
        let client = client_with_table();
        let err = update_err(
            &client,
            json!({
                "Key": {"pk": s("k")},
                "UpdateExpression": "SET a = :a",
                "ExpressionAttributeValues": {":a": s("1"), ":b": s("2")},
            }),
        );
        assert_eq!(
            err.message,
            "Value provided in ExpressionAttributeValues unused in expressions: keys: {:b}"
        );

        let err = update_err(
            &client,
            json!({"Key": {"pk": s("k")}, "UpdateExpression": "SET a = :missing"}),
        );
        assert_eq!(
            err.message,
            "Invalid UpdateExpression: An expression attribute value used in expression is not \
             defined; attribute value: :missing"
        );
    }

    #[test]
    fn test_should_evaluate_condition_against_missing_item_as_empty() {
        let client = client_with_table();
        let created = update(
            &client,
            json!({
                "Key": {"pk": s("fresh")},
                "UpdateExpression": "SET v = :v",
                "ConditionExpression": "attribute_not_exists(v)",
                "ExpressionAttributeValues": {":v": n("7")},
                "ReturnValues": "ALL_NEW",
            }),
        );
        assert_eq!(created["Attributes"], json!({"pk": s("fresh"), "v": n("7")}));
    }
}
