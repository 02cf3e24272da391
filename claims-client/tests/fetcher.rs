use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::Value;

use claims_client::{fallback, Fetcher, SheetSource};
use claims_core::{ClaimsError, ScriptConfig};

struct FlakySource {
    failures_before_success: u32,
    calls: Arc<AtomicU32>,
    payload: Vec<Value>,
}

impl SheetSource for FlakySource {
    async fn fetch_raw(&self) -> Result<Vec<Value>, ClaimsError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures_before_success {
            Err(ClaimsError::Network("connection refused".to_string()))
        } else {
            Ok(self.payload.clone())
        }
    }
}

fn test_config() -> ScriptConfig {
    ScriptConfig {
        retries: 3,
        backoff_base_ms: 0,
        backoff_cap_ms: 0,
        ..ScriptConfig::default()
    }
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let calls = Arc::new(AtomicU32::new(0));
    let source = FlakySource {
        failures_before_success: 2,
        calls: Arc::clone(&calls),
        payload: fallback::sample_records(),
    };
    let fetcher = Fetcher::new(source, test_config());

    let outcome = fetcher.fetch_records().await.expect("must resolve");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.status.attempts, 3);
    assert!(!outcome.status.degraded);
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.records[0].patient_name, "John Smith");
}

#[tokio::test]
async fn exhausted_retries_serve_fallback_dataset() {
    let calls = Arc::new(AtomicU32::new(0));
    let source = FlakySource {
        failures_before_success: u32::MAX,
        calls: Arc::clone(&calls),
        payload: Vec::new(),
    };
    let fetcher = Fetcher::new(source, test_config());

    let outcome = fetcher.fetch_records().await.expect("never rejects");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(outcome.status.degraded);
    assert!(!outcome.records.is_empty());
    assert!(outcome.records.iter().all(|r| r.paid_amount >= 0.0));
}

#[tokio::test]
async fn fallback_disabled_propagates_the_last_error() {
    let source = FlakySource {
        failures_before_success: u32::MAX,
        calls: Arc::new(AtomicU32::new(0)),
        payload: Vec::new(),
    };
    let config = ScriptConfig {
        use_fallback_data: false,
        ..test_config()
    };
    let fetcher = Fetcher::new(source, config);

    match fetcher.fetch_records().await {
        Err(ClaimsError::Network(_)) => {}
        other => panic!("expected a network error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_payload_counts_as_a_failed_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let source = FlakySource {
        failures_before_success: 0,
        calls: Arc::clone(&calls),
        payload: Vec::new(),
    };
    let fetcher = Fetcher::new(source, test_config());

    let outcome = fetcher.fetch_records().await.expect("falls back");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(outcome.status.degraded);
}

#[tokio::test]
async fn invalid_rows_are_dropped_from_the_payload() {
    let mut payload = fallback::sample_records();
    payload.push(serde_json::json!({
        "timestamp": "2024-01-16T08:00:00Z",
        "offices": "Downtown Office",
        "insurancecarrier": "Delta Dental",
        "claimstatus": "Paid"
    }));
    let source = FlakySource {
        failures_before_success: 0,
        calls: Arc::new(AtomicU32::new(0)),
        payload,
    };
    let fetcher = Fetcher::new(source, test_config());

    let outcome = fetcher.fetch_records().await.expect("must resolve");
    assert_eq!(outcome.records.len(), 3);
}

#[tokio::test]
async fn short_batch_is_padded_to_the_expected_count() {
    let config = ScriptConfig {
        expected_minimum_count: Some(8),
        ..test_config()
    };
    let make_source = || FlakySource {
        failures_before_success: 0,
        calls: Arc::new(AtomicU32::new(0)),
        payload: fallback::sample_records(),
    };

    let first = Fetcher::new(make_source(), config.clone())
        .fetch_records()
        .await
        .expect("must resolve");
    assert_eq!(first.records.len(), 8);
    assert_eq!(first.status.padded, 5);
    assert!(!first.status.degraded);
    assert!(first.records[3].patient_name.starts_with("Synthetic Patient"));

    // Padding is index-patterned, so a second run reproduces it exactly.
    let second = Fetcher::new(make_source(), config)
        .fetch_records()
        .await
        .expect("must resolve");
    assert_eq!(first.records, second.records);
}

#[tokio::test]
async fn full_batch_is_not_padded() {
    let config = ScriptConfig {
        expected_minimum_count: Some(3),
        ..test_config()
    };
    let source = FlakySource {
        failures_before_success: 0,
        calls: Arc::new(AtomicU32::new(0)),
        payload: fallback::sample_records(),
    };

    let outcome = Fetcher::new(source, config)
        .fetch_records()
        .await
        .expect("must resolve");
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.status.padded, 0);
}
