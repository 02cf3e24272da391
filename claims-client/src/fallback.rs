//! Deterministic stand-in data served when the remote source is down.
//!
//! Everything in this module is hardcoded and fictional. No external
//! systems are contacted; the same inputs always produce the same rows,
//! which keeps degraded-mode behavior reproducible in tests.

use serde_json::{json, Value};

/// The development dataset served after retries are exhausted.
pub fn sample_records() -> Vec<Value> {
    vec![
        json!({
            "timestamp": "2024-01-15T10:30:00Z",
            "insurancecarrier": "Delta Dental",
            "offices": "Downtown Office",
            "patientname": "John Smith",
            "paidamount": 150.00,
            "claimstatus": "Paid",
            "typeofinteraction": "Cleaning",
            "patientdob": "1985-03-15",
            "dos": "2024-01-10",
            "productivityamount": 200.00,
            "status": "Completed"
        }),
        json!({
            "timestamp": "2024-01-15T11:15:00Z",
            "insurancecarrier": "Aetna",
            "offices": "Uptown Office",
            "patientname": "Sarah Johnson",
            "paidamount": 300.00,
            "claimstatus": "Pending",
            "typeofinteraction": "Root Canal",
            "patientdob": "1990-07-22",
            "dos": "2024-01-12",
            "productivityamount": 450.00,
            "status": "In Progress"
        }),
        json!({
            "timestamp": "2024-01-15T12:00:00Z",
            "insurancecarrier": "Cigna",
            "offices": "Downtown Office",
            "patientname": "Mike Davis",
            "paidamount": 75.00,
            "claimstatus": "Denied",
            "typeofinteraction": "Checkup",
            "patientdob": "1978-11-08",
            "dos": "2024-01-08",
            "productivityamount": 100.00,
            "status": "Needs Review"
        }),
    ]
}

const OFFICES: [&str; 4] = [
    "Downtown Office",
    "Uptown Office",
    "Westside Office",
    "Lakeview Office",
];
const CARRIERS: [&str; 5] = ["Delta Dental", "Aetna", "Cigna", "MetLife", "Guardian"];
const CLAIM_STATUSES: [&str; 4] = ["Paid", "Pending", "Denied", "Processing"];
const STATUSES: [&str; 3] = ["Completed", "In Progress", "Needs Review"];
const INTERACTIONS: [&str; 5] = ["Cleaning", "Checkup", "Root Canal", "Filling", "X-Ray"];

/// Synthetic rows used to pad short result sets.
///
/// Rows are patterned purely from their index, so padding the same batch
/// twice yields identical records.
pub fn synthetic_records(count: usize, start_index: usize) -> Vec<Value> {
    (0..count)
        .map(|offset| {
            let index = start_index + offset;
            let day = index % 28 + 1;
            let hour = 8 + index % 9;
            json!({
                "timestamp": format!("2024-01-{day:02}T{hour:02}:30:00Z"),
                "patientname": format!("Synthetic Patient {:03}", index + 1),
                "offices": OFFICES[index % OFFICES.len()],
                "insurancecarrier": CARRIERS[index % CARRIERS.len()],
                "paidamount": 50.0 + (index % 12) as f64 * 25.0,
                "claimstatus": CLAIM_STATUSES[index % CLAIM_STATUSES.len()],
                "status": STATUSES[index % STATUSES.len()],
                "typeofinteraction": INTERACTIONS[index % INTERACTIONS.len()],
                "dos": format!("2024-01-{day:02}"),
                "productivityamount": 80.0 + (index % 10) as f64 * 30.0
            })
        })
        .collect()
}
