use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use claims_client::{fallback, DataService, Fetcher, SheetSource};
use claims_core::{ClaimsError, ScriptConfig};

struct CountingSource {
    calls: Arc<AtomicU32>,
    fail: bool,
}

impl SheetSource for CountingSource {
    async fn fetch_raw(&self) -> Result<Vec<Value>, ClaimsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ClaimsError::Network("connection refused".to_string()))
        } else {
            Ok(fallback::sample_records())
        }
    }
}

fn service(calls: &Arc<AtomicU32>, fail: bool) -> DataService<CountingSource> {
    let config = ScriptConfig {
        backoff_base_ms: 0,
        backoff_cap_ms: 0,
        ..ScriptConfig::default()
    };
    let source = CountingSource {
        calls: Arc::clone(calls),
        fail,
    };
    DataService::new(Fetcher::new(source, config))
}

#[tokio::test]
async fn cache_hit_skips_the_second_fetch() {
    let calls = Arc::new(AtomicU32::new(0));
    let service = service(&calls, false);

    let first = service.fetch_patient_records(true).await.expect("resolves");
    let second = service.fetch_patient_records(true).await.expect("resolves");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);

    let stats = service.cache_stats().await;
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.keys, ["all_records"]);
}

#[tokio::test]
async fn bypassing_the_cache_always_refetches() {
    let calls = Arc::new(AtomicU32::new(0));
    let service = service(&calls, false);

    service.fetch_patient_records(true).await.expect("resolves");
    service.fetch_patient_records(false).await.expect("resolves");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn clearing_the_cache_forces_a_refetch() {
    let calls = Arc::new(AtomicU32::new(0));
    let service = service(&calls, false);

    service.fetch_patient_records(true).await.expect("resolves");
    service.clear_cache().await;
    assert_eq!(service.cache_stats().await.entries, 0);

    service.fetch_patient_records(true).await.expect("resolves");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_entries_are_refreshed() {
    let calls = Arc::new(AtomicU32::new(0));
    let service = service(&calls, false).with_cache_ttl(Duration::ZERO);

    service.fetch_patient_records(true).await.expect("resolves");
    service.fetch_patient_records(true).await.expect("resolves");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn degraded_mode_is_observable_through_last_status() {
    let calls = Arc::new(AtomicU32::new(0));
    let service = service(&calls, true);

    assert!(service.last_status().await.is_none());

    let records = service.fetch_patient_records(true).await.expect("falls back");
    assert!(!records.is_empty());

    let status = service.last_status().await.expect("status recorded");
    assert!(status.degraded);
    assert_eq!(status.attempts, 3);
}
