use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;

use claims_client::{DataService, Fetcher, ScriptClient};
use claims_core::{ClaimsPolicy, PatientRecord, ScriptConfig};
use claims_sheets::{compute_metrics, normalize_batch, top_performing_offices};

#[derive(Parser, Debug)]
#[command(
    name = "claims-cli",
    about = "Tóm tắt KPI hồ sơ bảo hiểm nha khoa từ file JSON hoặc API."
)]
struct Args {
    /// Đường dẫn tới file JSON chứa bản ghi thô.
    #[arg(short, long, conflicts_with = "url")]
    input: Option<PathBuf>,
    /// URL Apps Script để tải dữ liệu trực tiếp.
    #[arg(short, long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let records = match (&args.input, &args.url) {
        (Some(path), _) => load_file(path)?,
        (None, Some(url)) => fetch_remote(url.clone()).await?,
        (None, None) => anyhow::bail!("Cần --input hoặc --url"),
    };

    let metrics = compute_metrics(&records, ClaimsPolicy::CompletedOnly);
    println!(
        "Records: {}\nTotal revenue: {:.2}\nClaims processed: {}\nAverage claim: {:.2}\nActive offices: {}\nToday/week/month: {}/{}/{}",
        records.len(),
        metrics.total_revenue,
        metrics.claims_processed,
        metrics.average_claim,
        metrics.active_offices,
        metrics.todays_claims,
        metrics.weekly_claims,
        metrics.monthly_claims,
    );

    for office in top_performing_offices(&records, 5) {
        println!(
            "  {}: revenue {:.2} over {} claims",
            office.office, office.revenue, office.claims
        );
    }

    Ok(())
}

fn load_file(path: &PathBuf) -> anyhow::Result<Vec<PatientRecord>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Không đọc được file {path:?}"))?;
    let body: Value = serde_json::from_str(&data).context("File không phải JSON hợp lệ")?;
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(rows)) => rows,
            _ => anyhow::bail!("JSON không chứa mảng bản ghi"),
        },
        _ => anyhow::bail!("JSON không chứa mảng bản ghi"),
    };
    Ok(normalize_batch(&rows))
}

async fn fetch_remote(url: String) -> anyhow::Result<Vec<PatientRecord>> {
    let config = ScriptConfig {
        url,
        ..claims_client::config_from_env()
    };
    let client = ScriptClient::new(config.clone()).context("Không khởi tạo được HTTP client")?;
    let service = DataService::new(Fetcher::new(client, config));
    let records = service.fetch_patient_records(true).await?;
    if let Some(status) = service.last_status().await {
        if status.degraded {
            eprintln!("Cảnh báo: đang dùng dữ liệu mẫu (degraded mode)");
        }
    }
    Ok(records)
}
