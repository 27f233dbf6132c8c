//! On-demand backups and restores through the dispatcher.

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{TestClient, n, s};

    fn create_backup(client: &TestClient, table: &str, name: &str) -> String {
        let resp = client.ok(
            "CreateBackup",
            &json!({"TableName": table, "BackupName": name}),
        );
        let details = &resp["BackupDetails"];
        assert_eq!(details["BackupName"], name);
        assert_eq!(details["BackupStatus"], "AVAILABLE");
        assert_eq!(details["BackupType"], "USER");
        details["BackupArn"].as_str().unwrap().to_owned()
    }

    fn summaries(resp: &Value) -> Vec<String> {
        resp["BackupSummaries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["BackupName"].as_str().unwrap().to_owned())
            .collect()
    }

    #[test]
    fn test_should_restore_independent_copy() {
        let client = TestClient::new();
        client.create_simple_table("source");
        client.put("source", json!({"pk": s("a"), "v": n("1")}));

        let arn = create_backup(&client, "source", "snap");
        assert!(arn.starts_with("arn:aws:dynamodb:us-east-1:000000000000:table/source/backup/"));

        client.put("source", json!({"pk": s("a"), "v": n("2")}));
        client.put("source", json!({"pk": s("b")}));

        let restored = client.ok(
            "RestoreTableFromBackup",
            &json!({"TargetTableName": "restored", "BackupArn": arn}),
        );
        let desc = &restored["TableDescription"];
        assert_eq!(desc["TableName"], "restored");
        assert_eq!(desc["RestoreSummary"]["SourceBackupArn"], arn.as_str());

        assert_eq!(
            client.get("restored", json!({"pk": s("a")})).unwrap(),
            json!({"pk": s("a"), "v": n("1")})
        );
        assert!(client.get("restored", json!({"pk": s("b")})).is_none());

        client.put("restored", json!({"pk": s("c")}));
        assert!(client.get("source", json!({"pk": s("c")})).is_none());
        assert_eq!(
            client.get("source", json!({"pk": s("a")})).unwrap()["v"],
            n("2")
        );
    }

    #[test]
    fn test_should_rebuild_indexes_on_restore() {
        let client = TestClient::new();
        client.create_indexed_table("indexed_source");
        client.put(
            "indexed_source",
            json!({"pk": s("u"), "sk": s("1"), "status": s("open"), "score": n("3")}),
        );
        let arn = create_backup(&client, "indexed_source", "with_indexes");
        client.ok(
            "RestoreTableFromBackup",
            &json!({"TargetTableName": "indexed_copy", "BackupArn": arn}),
        );

        let resp = client.ok(
            "Query",
            &json!({
                "TableName": "indexed_copy",
                "IndexName": "by_status",
                "KeyConditionExpression": "#st = :open",
                "ExpressionAttributeNames": {"#st": "status"},
                "ExpressionAttributeValues": {":open": s("open")},
            }),
        );
        assert_eq!(resp["Count"], 1);
    }

    #[test]
    fn test_should_describe_list_and_delete_backups() {
        let client = TestClient::new();
        client.create_simple_table("first");
        client.create_simple_table("second");
        client.put("first", json!({"pk": s("a")}));
        let first = create_backup(&client, "first", "b1");
        create_backup(&client, "second", "b2");
        create_backup(&client, "first", "b3");

        let described = client.ok("DescribeBackup", &json!({"BackupArn": first}));
        let description = &described["BackupDescription"];
        assert_eq!(description["SourceTableDetails"]["TableName"], "first");
        assert_eq!(description["SourceTableDetails"]["ItemCount"], 1);

        let all = client.ok("ListBackups", &json!({}));
        assert_eq!(summaries(&all), ["b1", "b2", "b3"]);

        let only_first = client.ok("ListBackups", &json!({"TableName": "first"}));
        assert_eq!(summaries(&only_first), ["b1", "b3"]);

        let page = client.ok("ListBackups", &json!({"Limit": 2}));
        assert_eq!(summaries(&page), ["b1", "b2"]);
        let next = client.ok(
            "ListBackups",
            &json!({"ExclusiveStartBackupArn": page["LastEvaluatedBackupArn"]}),
        );
        assert_eq!(summaries(&next), ["b3"]);

        let deleted = client.ok("DeleteBackup", &json!({"BackupArn": first}));
        assert_eq!(
            deleted["BackupDescription"]["BackupDetails"]["BackupStatus"],
            "DELETED"
        );
        let err = client.err("DescribeBackup", &json!({"BackupArn": first}));
        assert_eq!(err.error_type, "BackupNotFoundException");
        assert_eq!(err.message, format!("Backup not found: {first}"));
    }

    #[test]
    fn test_should_report_backup_errors() {
        let client = TestClient::new();
        let err = client.err(
            "CreateBackup",
            &json!({"TableName": "missing", "BackupName": "b"}),
        );
        assert_eq!(err.error_type, "TableNotFoundException");
        assert_eq!(err.message, "Table not found: missing");

        client.create_simple_table("taken");
        let arn = create_backup(&client, "taken", "b");
        let err = client.err(
            "RestoreTableFromBackup",
            &json!({"TargetTableName": "taken", "BackupArn": arn}),
        );
        assert_eq!(err.error_type, "TableAlreadyExistsException");
        assert_eq!(err.message, "Table already exists: taken");

        let err = client.err(
            "RestoreTableFromBackup",
            &json!({"TargetTableName": "fresh", "BackupArn": "arn:nope"}),
        );
        assert_eq!(err.error_type, "BackupNotFoundException");
    }
}
