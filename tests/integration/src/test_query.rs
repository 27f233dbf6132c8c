//! Query through the dispatcher, on tables and secondary indexes.

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{TestClient, n, s};

    fn query(client: &TestClient, body: Value) -> Value {
        client.ok("Query", &body)
    }

    fn range_values(resp: &Value, attr: &str) -> Vec<String> {
        resp["Items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| {
                let value = &item[attr];
                value["S"]
                    .as_str()
                    .or_else(|| value["N"].as_str())
                    .unwrap()
                    .to_owned()
            })
            .collect()
    }

    fn seeded_composite(table: &str) -> TestClient {
        let client = TestClient::new();
        client.create_composite_table(table);
        for (sk, v) in [("c", "3"), ("a", "1"), ("d", "4"), ("b", "2")] {
            client.put(table, json!({"pk": s("h"), "sk": s(sk), "v": n(v)}));
        }
        client.put(table, json!({"pk": s("other"), "sk": s("a"), "v": n("9")}));
        client
    }

    fn seeded_indexed(table: &str) -> TestClient {
        let client = TestClient::new();
        client.create_indexed_table(table);
        for (pk, sk, status, score) in [
            ("u1", "x", "open", "5"),
            ("u2", "x", "open", "1"),
            ("u1", "y", "open", "9"),
            ("u3", "x", "closed", "4"),
            ("u2", "y", "open", "3"),
            ("u3", "y", "open", "7"),
        ] {
            client.put(
                table,
                json!({
                    "pk": s(pk),
                    "sk": s(sk),
                    "status": s(status),
                    "score": n(score),
                    "note": s("payload"),
                }),
            );
        }
        client
    }

    #[test]
    fn test_should_query_in_range_order_both_directions() {
        let client = seeded_composite("q_order");
        let forward = query(
            &client,
            json!({
                "TableName": "q_order",
                "KeyConditionExpression": "pk = :h",
                "ExpressionAttributeValues": {":h": s("h")},
            }),
        );
        assert_eq!(range_values(&forward, "sk"), ["a", "b", "c", "d"]);
        assert_eq!(forward["Count"], 4);
        assert_eq!(forward["ScannedCount"], 4);
        assert!(forward.get("LastEvaluatedKey").is_none());

        let reverse = query(
            &client,
            json!({
                "TableName": "q_order",
                "KeyConditionExpression": "pk = :h",
                "ExpressionAttributeValues": {":h": s("h")},
                "ScanIndexForward": false,
            }),
        );
        assert_eq!(range_values(&reverse, "sk"), ["d", "c", "b", "a"]);
    }

    #[test]
    fn test_should_apply_range_conditions() {
        let client = seeded_composite("q_range");
        let between = query(
            &client,
            json!({
                "TableName": "q_range",
                "KeyConditionExpression": "pk = :h AND sk BETWEEN :lo AND :hi",
                "ExpressionAttributeValues": {":h": s("h"), ":lo": s("b"), ":hi": s("c")},
            }),
        );
        assert_eq!(range_values(&between, "sk"), ["b", "c"]);

        let prefix = query(
            &client,
            json!({
                "TableName": "q_range",
                "KeyConditionExpression": "#p = :h AND begins_with(#s, :pre)",
                "ExpressionAttributeNames": {"#p": "pk", "#s": "sk"},
                "ExpressionAttributeValues": {":h": s("h"), ":pre": s("d")},
            }),
        );
        assert_eq!(range_values(&prefix, "sk"), ["d"]);
    }

    #[test]
    fn test_should_resume_after_filtered_out_first_match() {
        let client = seeded_composite("q_resume");
        let body = |start: Option<Value>| {
            let mut body = json!({
                "TableName": "q_resume",
                "KeyConditionExpression": "pk = :h",
                "FilterExpression": "v <> :skip",
                "ExpressionAttributeValues": {":h": s("h"), ":skip": n("1")},
                "Limit": 1,
            });
            if let Some(start) = start {
                body["ExclusiveStartKey"] = start;
            }
            body
        };

        let first = query(&client, body(None));
        assert_eq!(first["Items"], json!([]));
        assert_eq!(first["Count"], 0);
        assert_eq!(first["ScannedCount"], 1);
        assert_eq!(first["LastEvaluatedKey"], json!({"pk": s("h"), "sk": s("a")}));

        let second = query(&client, body(Some(first["LastEvaluatedKey"].clone())));
        assert_eq!(range_values(&second, "sk"), ["b"]);
    }

    #[test]
    fn test_should_count_without_items() {
        let client = seeded_composite("q_count");
        let resp = query(
            &client,
            json!({
                "TableName": "q_count",
                "KeyConditionExpression": "pk = :h",
                "FilterExpression": "v > :one",
                "ExpressionAttributeValues": {":h": s("h"), ":one": n("1")},
                "Select": "COUNT",
            }),
        );
        assert!(resp.get("Items").is_none());
        assert_eq!(resp["Count"], 3);
        assert_eq!(resp["ScannedCount"], 4);
    }

    #[test]
    fn test_should_compare_sizes_in_filter() {
        let client = TestClient::new();
        client.create_composite_table("q_size");
        client.put(
            "q_size",
            json!({"pk": s("h"), "sk": s("1"), "text": s("hello"), "blob": {"B": "AQID"}}),
        );
        let resp = query(
            &client,
            json!({
                "TableName": "q_size",
                "KeyConditionExpression": "pk = :h",
                "FilterExpression": "size(#t) > size(blob)",
                "ExpressionAttributeNames": {"#t": "text"},
                "ExpressionAttributeValues": {":h": s("h")},
            }),
        );
        assert_eq!(resp["Count"], 1);
    }

    #[test]
    fn test_should_cut_page_at_one_megabyte() {
        let client = TestClient::new();
        client.create_composite_table("q_big");
        let payload = "x".repeat(100 * 1024);
        for i in 0..15 {
            client.put(
                "q_big",
                json!({"pk": s("h"), "sk": s(&format!("{i:02}")), "payload": s(&payload)}),
            );
        }

        let mut start: Option<Value> = None;
        let mut pages = 0;
        let mut total = 0;
        loop {
            let mut body = json!({
                "TableName": "q_big",
                "KeyConditionExpression": "pk = :h",
                "ExpressionAttributeValues": {":h": s("h")},
            });
            if let Some(key) = start.take() {
                body["ExclusiveStartKey"] = key;
            }
            let resp = query(&client, body);
            pages += 1;
            total += resp["Count"].as_u64().unwrap();
            match resp.get("LastEvaluatedKey") {
                Some(key) => start = Some(key.clone()),
                None => break,
            }
        }
        assert!(pages > 1);
        assert_eq!(total, 15);
    }

    #[test]
    fn test_should_paginate_reverse_index_query_without_gaps() {
        let client = seeded_indexed("q_gsi");
        let mut start: Option<Value> = None;
        let mut scores = Vec::new();
        loop {
            let mut body = json!({
                "TableName": "q_gsi",
                "IndexName": "by_status",
                "KeyConditionExpression": "#st = :open",
                "ExpressionAttributeNames": {"#st": "status"},
                "ExpressionAttributeValues": {":open": s("open")},
                "ScanIndexForward": false,
                "Limit": 2,
            });
            if let Some(key) = start.take() {
                body["ExclusiveStartKey"] = key;
            }
            let resp = query(&client, body);
            scores.extend(range_values(&resp, "score"));
            match resp.get("LastEvaluatedKey") {
                Some(key) => {
                    let names: Vec<&str> =
                        key.as_object().unwrap().keys().map(String::as_str).collect();
                    for attr in ["pk", "sk", "status", "score"] {
                        assert!(names.contains(&attr), "missing {attr} in {key}");
                    }
                    start = Some(key.clone());
                }
                None => break,
            }
        }
        assert_eq!(scores, ["9", "7", "5", "3", "1"]);
    }

    #[test]
    fn test_should_serve_only_projected_attributes_from_keys_only_index() {
        let client = seeded_indexed("q_lsi");
        let resp = query(
            &client,
            json!({
                "TableName": "q_lsi",
                "IndexName": "by_score",
                "KeyConditionExpression": "pk = :u AND score > :min",
                "ExpressionAttributeValues": {":u": s("u1"), ":min": n("6")},
            }),
        );
        assert_eq!(
            resp["Items"],
            json!([{"pk": s("u1"), "sk": s("y"), "score": n("9")}])
        );
    }

    #[test]
    fn test_should_reject_unknown_index() {
        let client = seeded_indexed("q_bad_index");
        let err = client.err(
            "Query",
            &json!({
                "TableName": "q_bad_index",
                "IndexName": "nope",
                "KeyConditionExpression": "pk = :u",
                "ExpressionAttributeValues": {":u": s("u1")},
            }),
        );
        assert_eq!(err.error_type, "ResourceNotFoundException");
        assert_eq!(
            err.message,
            "Invalid index: nope for table: q_bad_index. Available indexes are: by_status, \
             by_score"
        );
    }

    #[test]
    fn test_should_require_key_condition() {
        let client = seeded_composite("q_no_key");
        let err = client.err("Query", &json!({"TableName": "q_no_key"}));
        assert_eq!(err.message, "Either KeyConditions or QueryFilter should be present");
    }

    #[test]
    fn test_should_reject_start_key_for_other_hash() {
        let client = seeded_composite("q_bounds");
        let err = client.err(
            "Query",
            &json!({
                "TableName": "q_bounds",
                "KeyConditionExpression": "pk = :h",
                "ExpressionAttributeValues": {":h": s("h")},
                "ExclusiveStartKey": {"pk": s("other"), "sk": s("a")},
            }),
        );
        assert_eq!(
            err.message,
            "The provided starting key is outside query boundaries based on provided conditions"
        );
    }

    #[test]
    fn test_should_validate_limit_and_select() {
        let client = seeded_composite("q_params");
        let err = client.err(
            "Query",
            &json!({
                "TableName": "q_params",
                "KeyConditionExpression": "pk = :h",
                "ExpressionAttributeValues": {":h": s("h")},
                "Limit": 0,
            }),
        );
        assert_eq!(err.message, "Limit must be greater than 0");

        let err = client.err(
            "Query",
            &json!({
                "TableName": "q_params",
                "KeyConditionExpression": "pk = :h",
                "ExpressionAttributeValues": {":h": s("h")},
                "Select": "ALL_PROJECTED_ATTRIBUTES",
            }),
        );
        assert_eq!(err.error_type, "ValidationException");
    }
}
