//! Scan through the dispatcher, including parallel segments.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::{Value, json};

    use crate::{TestClient, n, s};

    const TABLE: &str = "scanned";

    fn seeded() -> TestClient {
        let client = TestClient::new();
        client.create_simple_table(TABLE);
        for i in 0..20 {
            client.put(
                TABLE,
                json!({"pk": s(&format!("item-{i:02}")), "n": n(&i.to_string())}),
            );
        }
        client
    }

    fn keys(resp: &Value) -> Vec<String> {
        resp["Items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["pk"]["S"].as_str().unwrap().to_owned())
            .collect()
    }

    #[test]
    fn test_should_scan_everything_with_filter_counts() {
        let client = seeded();
        let all = client.ok("Scan", &json!({"TableName": TABLE}));
        assert_eq!(all["Count"], 20);
        assert_eq!(all["ScannedCount"], 20);

        let filtered = client.ok(
            "Scan",
            &json!({
                "TableName": TABLE,
                "FilterExpression": "#n >= :ten",
                "ExpressionAttributeNames": {"#n": "n"},
                "ExpressionAttributeValues": {":ten": n("10")},
                "ProjectionExpression": "pk",
            }),
        );
        assert_eq!(filtered["Count"], 10);
        assert_eq!(filtered["ScannedCount"], 20);
        for item in filtered["Items"].as_array().unwrap() {
            assert_eq!(item.as_object().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_should_paginate_scan_without_duplicates() {
        let client = seeded();
        let mut seen = Vec::new();
        let mut start: Option<Value> = None;
        loop {
            let mut body = json!({"TableName": TABLE, "Limit": 7});
            if let Some(key) = start.take() {
                body["ExclusiveStartKey"] = key;
            }
            let resp = client.ok("Scan", &body);
            seen.extend(keys(&resp));
            match resp.get("LastEvaluatedKey") {
                Some(key) => start = Some(key.clone()),
                None => break,
            }
        }
        let unique: BTreeSet<_> = seen.iter().cloned().collect();
        assert_eq!(seen.len(), 20);
        assert_eq!(unique.len(), 20);
    }

    #[test]
    fn test_should_partition_parallel_scan_segments() {
        let client = seeded();
        let mut union = BTreeSet::new();
        let mut total = 0;
        for segment in 0..3 {
            let resp = client.ok(
                "Scan",
                &json!({"TableName": TABLE, "Segment": segment, "TotalSegments": 3}),
            );
            let found = keys(&resp);
            total += found.len();
            union.extend(found);
        }
        assert_eq!(total, 20);
        assert_eq!(union.len(), 20);
    }

    #[test]
    fn test_should_validate_segments() {
        let client = seeded();
        let err = client.err(
            "Scan",
            &json!({"TableName": TABLE, "Segment": 3, "TotalSegments": 3}),
        );
        assert_eq!(
            err.message,
            "The Segment parameter is zero-indexed and must be less than parameter \
             TotalSegments. Segment: 3, TotalSegments: 3"
        );

        let err = client.err("Scan", &json!({"TableName": TABLE, "Segment": 0}));
        assert_eq!(err.error_type, "ValidationException");

        let err = client.err(
            "Scan",
            &json!({"TableName": TABLE, "Segment": 0, "TotalSegments": 1_000_001}),
        );
        assert_eq!(err.error_type, "ValidationException");
    }

    #[test]
    fn test_should_reject_unknown_scan_index() {
        let client = seeded();
        let err = client.err("Scan", &json!({"TableName": TABLE, "IndexName": "nope"}));
        assert_eq!(err.error_type, "ValidationException");
        assert_eq!(err.message, "The table does not have the specified index: nope");
    }

    #[test]
    fn test_should_scan_secondary_index_items_only() {
        let client = TestClient::new();
        client.create_indexed_table("scan_gsi");
        client.put(
            "scan_gsi",
            json!({"pk": s("a"), "sk": s("1"), "status": s("open"), "score": n("1")}),
        );
        client.put("scan_gsi", json!({"pk": s("b"), "sk": s("1")}));

        let resp = client.ok("Scan", &json!({"TableName": "scan_gsi", "IndexName": "by_status"}));
        assert_eq!(resp["Count"], 1);
        assert_eq!(keys(&resp), ["a"]);
    }

    #[test]
    fn test_should_reject_deeply_nested_filter_without_aborting() {
        let client = seeded();
        let filter = format!("{}#n >= :ten{}", "(".repeat(900), ")".repeat(900));
        let err = client.err(
            "Scan",
            &json!({
                "TableName": TABLE,
                "FilterExpression": filter,
                "ExpressionAttributeNames": {"#n": "n"},
                "ExpressionAttributeValues": {":ten": n("10")},
            }),
        );
        assert_eq!(err.error_type, "ValidationException");
        assert_eq!(
            err.message,
            "Invalid FilterExpression: The expression has exceeded the maximum nesting depth; \
             maximum depth: 64"
        );

        let resp = client.ok("Scan", &json!({"TableName": TABLE}));
        assert_eq!(resp["Count"], 20);
    }
}
