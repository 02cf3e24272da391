use std::fs;

use chrono::NaiveDate;
use serde_json::{json, Value};

use claims_core::ClaimsPolicy;
use claims_sheets::{compute_metrics_at, normalize_batch, revenue_by_office};

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn sheet_payload_matches_golden() {
    let payload = fs::read_to_string(fixture_path("sheet_payload.json"))
        .expect("Không đọc được payload mẫu");
    let rows: Vec<Value> = serde_json::from_str(&payload).expect("Payload không hợp lệ");

    let records = normalize_batch(&rows);
    let anchor = NaiveDate::from_ymd_opt(2024, 1, 20).expect("valid date");
    let metrics = compute_metrics_at(&records, ClaimsPolicy::CompletedOnly, anchor);
    let offices = revenue_by_office(&records);

    let actual = json!({
        "records": records,
        "metrics": metrics,
        "revenue_by_office": offices,
    });

    let expected = fs::read_to_string(fixture_path("sheet_snapshot.json"))
        .expect("Không đọc được golden snapshot");
    let expected_value: Value = serde_json::from_str(&expected).expect("Golden không hợp lệ");

    assert_eq!(actual, expected_value);
}
