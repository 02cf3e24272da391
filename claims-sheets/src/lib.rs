//! Spreadsheet JSON to `PatientRecord` converter with dashboard analytics.

use std::collections::{hash_map::Entry, HashMap, HashSet};

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use serde_json::Value;
use claims_core::{
    Aggregation, ClaimsError, ClaimsPolicy, DashboardMetrics, DataQuality, FilterState,
    OfficePerformance, PatientRecord, SeriesPoint, TrendPoint,
};

const TIMESTAMP_KEYS: &[&str] = &["timestamp", "Timestamp"];
const PATIENT_NAME_KEYS: &[&str] = &["patientname", "patient_name", "PatientName", "Patient"];
const OFFICES_KEYS: &[&str] = &["offices", "Offices", "Office", "OFFICE"];
const CARRIER_KEYS: &[&str] = &[
    "insurancecarrier",
    "insurance_carrier",
    "InsuranceCarrier",
    "Carrier",
];
const PAID_AMOUNT_KEYS: &[&str] = &["paidamount", "paid_amount", "PaidAmount"];
const CLAIM_STATUS_KEYS: &[&str] = &["claimstatus", "claim_status", "ClaimStatus", "Status"];
const STATUS_KEYS: &[&str] = &["status", "Status"];
const INTERACTION_KEYS: &[&str] = &[
    "typeofinteraction",
    "type_of_interaction",
    "TypeOfInteraction",
    "Type",
];
const PATIENT_DOB_KEYS: &[&str] = &["patientdob", "patient_dob", "PatientDob", "DOB"];
const DOS_KEYS: &[&str] = &["dos", "Dos", "DOS"];
const PRODUCTIVITY_KEYS: &[&str] = &[
    "productivityamount",
    "productivity_amount",
    "ProductivityAmount",
];
const MISSING_DOCS_KEYS: &[&str] = &[
    "missingdocsorinformation",
    "missing_docs_or_information",
    "MissingDocsOrInformation",
    "MissingDocs",
];
const HOW_PROCEEDED_KEYS: &[&str] = &["howweproceeded", "how_we_proceeded", "HowProceeded"];
const ESCALATED_KEYS: &[&str] = &["escalatedto", "escalated_to", "EscalatedTo"];
const COMMENTS_KEYS: &[&str] = &["commentsreasons", "comments_reasons", "Comments"];
const EMAIL_KEYS: &[&str] = &["emailaddress", "email_address", "EmailAddress", "Email"];
const TIMESTAMP_BY_INTERACTION_KEYS: &[&str] = &[
    "timestampbyinteraction",
    "timestamp_by_interaction",
    "TimestampByInteraction",
];

/// Convert one raw spreadsheet row into the canonical record.
///
/// Field names fall back across the spellings the upstream sheet has used
/// over time. Records missing a required field, or carrying a negative
/// paid amount, are rejected; malformed emails and dates only warn.
pub fn normalize(raw: &Value) -> Result<PatientRecord, ClaimsError> {
    if !raw.is_object() {
        return Err(ClaimsError::Parse("record is not a JSON object".to_string()));
    }

    let timestamp = require_str(raw, TIMESTAMP_KEYS, "timestamp")?;
    let patient_name = require_str(raw, PATIENT_NAME_KEYS, "patientname")?;
    let offices = require_str(raw, OFFICES_KEYS, "offices")?;
    let insurance_carrier = require_str(raw, CARRIER_KEYS, "insurancecarrier")?;
    let claim_status = require_str(raw, CLAIM_STATUS_KEYS, "claimstatus")?;

    let paid_amount = field_f64(raw, PAID_AMOUNT_KEYS).unwrap_or(0.0);
    if paid_amount < 0.0 {
        return Err(ClaimsError::NegativeAmount(paid_amount));
    }

    let email_address = field_str(raw, EMAIL_KEYS);
    if let Some(email) = &email_address {
        if !looks_like_email(email) {
            tracing::warn!(email = %email, "email address has unexpected shape");
        }
    }

    let dos = field_str(raw, DOS_KEYS);
    if let Some(date) = &dos {
        if parse_date(date).is_none() {
            tracing::warn!(dos = %date, "date of service is not YYYY-MM-DD");
        }
    }

    Ok(PatientRecord {
        timestamp,
        patient_name,
        offices,
        insurance_carrier,
        paid_amount,
        claim_status,
        status: field_str(raw, STATUS_KEYS),
        type_of_interaction: field_str(raw, INTERACTION_KEYS),
        patient_dob: field_str(raw, PATIENT_DOB_KEYS),
        dos,
        productivity_amount: field_f64(raw, PRODUCTIVITY_KEYS),
        missing_docs_or_information: field_str(raw, MISSING_DOCS_KEYS),
        how_we_proceeded: field_str(raw, HOW_PROCEEDED_KEYS),
        escalated_to: field_str(raw, ESCALATED_KEYS),
        comments_reasons: field_str(raw, COMMENTS_KEYS),
        email_address,
        timestamp_by_interaction: field_str(raw, TIMESTAMP_BY_INTERACTION_KEYS),
    })
}

/// Normalize a whole payload, dropping rows that fail validation.
///
/// Order is preserved; each dropped row is logged with its index.
pub fn normalize_batch(rows: &[Value]) -> Vec<PatientRecord> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, raw)| match normalize(raw) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(index, error = %err, "dropping record that failed validation");
                None
            }
        })
        .collect()
}

fn require_str(raw: &Value, keys: &[&str], field: &str) -> Result<String, ClaimsError> {
    field_str(raw, keys).ok_or_else(|| ClaimsError::MissingField(field.to_string()))
}

fn field_value<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    for key in keys {
        match raw.get(*key) {
            Some(Value::Null) | None => continue,
            Some(value) => return Some(value),
        }
    }
    None
}

fn field_str(raw: &Value, keys: &[&str]) -> Option<String> {
    let text = match field_value(raw, keys)? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn field_f64(raw: &Value, keys: &[&str]) -> Option<f64> {
    match field_value(raw, keys)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let cleaned: String = text
                .trim()
                .chars()
                .filter(|c| *c != '$' && *c != ',')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

fn looks_like_email(candidate: &str) -> bool {
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !candidate.contains(char::is_whitespace)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Best-effort date of an ISO-ish timestamp string.
fn parse_timestamp_date(value: &str) -> Option<NaiveDate> {
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime.date());
    }
    parse_date(value.get(..10).unwrap_or(value))
}

/// Compute the KPI block for the current local date.
pub fn compute_metrics(records: &[PatientRecord], policy: ClaimsPolicy) -> DashboardMetrics {
    compute_metrics_at(records, policy, Local::now().date_naive())
}

/// Compute the KPI block against an explicit calendar anchor.
///
/// `todays_claims` and `monthly_claims` read `timestamp`; `weekly_claims`
/// reads `dos`. The split mirrors the dashboard this pipeline feeds.
pub fn compute_metrics_at(
    records: &[PatientRecord],
    policy: ClaimsPolicy,
    today: NaiveDate,
) -> DashboardMetrics {
    if records.is_empty() {
        return DashboardMetrics::default();
    }

    let total_revenue: f64 = records.iter().map(|record| record.paid_amount).sum();
    let claims_processed = match policy {
        ClaimsPolicy::All => records.len(),
        ClaimsPolicy::CompletedOnly => records
            .iter()
            .filter(|record| is_completed(record.status.as_deref()))
            .count(),
    };
    let average_claim = total_revenue / records.len() as f64;

    let active_offices = records
        .iter()
        .map(|record| record.offices.trim())
        .filter(|office| !office.is_empty())
        .collect::<HashSet<_>>()
        .len();

    let week_start = today - Duration::days(7);
    let mut todays_claims = 0;
    let mut weekly_claims = 0;
    let mut monthly_claims = 0;

    for record in records {
        if let Some(date) = parse_timestamp_date(&record.timestamp) {
            if date == today {
                todays_claims += 1;
            }
            if date.year() == today.year() && date.month() == today.month() {
                monthly_claims += 1;
            }
        }
        if let Some(date) = record.dos.as_deref().and_then(parse_date) {
            if date >= week_start && date <= today {
                weekly_claims += 1;
            }
        }
    }

    DashboardMetrics {
        total_revenue,
        claims_processed,
        average_claim,
        active_offices,
        todays_claims,
        weekly_claims,
        monthly_claims,
    }
}

fn is_completed(status: Option<&str>) -> bool {
    matches!(
        status.map(|s| s.trim().to_lowercase()).as_deref(),
        Some("complete") | Some("completed")
    )
}

/// Apply every active criterion (AND-combined), preserving input order.
pub fn apply_filters(records: &[PatientRecord], filters: &FilterState) -> Vec<PatientRecord> {
    records
        .iter()
        .filter(|record| matches_filters(record, filters))
        .cloned()
        .collect()
}

fn matches_filters(record: &PatientRecord, filters: &FilterState) -> bool {
    // The range only activates once both ends are set; dos is YYYY-MM-DD
    // so a lexicographic compare is a date compare.
    if let (Some(start), Some(end)) = (&filters.date_range.start, &filters.date_range.end) {
        match &record.dos {
            Some(dos) => {
                if dos < start || dos > end {
                    return false;
                }
            }
            None => return false,
        }
    }

    if !selected(&filters.offices, &record.offices) {
        return false;
    }
    if !selected(&filters.insurance_carriers, &record.insurance_carrier) {
        return false;
    }
    if !selected(&filters.claim_status, &record.claim_status) {
        return false;
    }
    if !selected_optional(&filters.statuses, record.status.as_deref()) {
        return false;
    }
    if !selected_optional(&filters.interaction_types, record.type_of_interaction.as_deref()) {
        return false;
    }
    if !selected_optional(&filters.how_proceeded, record.how_we_proceeded.as_deref()) {
        return false;
    }
    if !selected_optional(&filters.escalated_to, record.escalated_to.as_deref()) {
        return false;
    }
    if !selected_optional(
        &filters.missing_docs,
        record.missing_docs_or_information.as_deref(),
    ) {
        return false;
    }

    let query = filters.search_query.trim();
    if !query.is_empty() {
        let needle = query.to_lowercase();
        let hit = [
            Some(record.patient_name.as_str()),
            record.email_address.as_deref(),
            Some(record.insurance_carrier.as_str()),
            Some(record.offices.as_str()),
            Some(record.claim_status.as_str()),
            record.comments_reasons.as_deref(),
            record.dos.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }

    true
}

fn selected(selection: &[String], value: &str) -> bool {
    selection.is_empty() || selection.iter().any(|candidate| candidate == value)
}

// Optional fields only participate when the record carries a value.
fn selected_optional(selection: &[String], value: Option<&str>) -> bool {
    if selection.is_empty() {
        return true;
    }
    match value {
        Some(value) => selection.iter().any(|candidate| candidate == value),
        None => true,
    }
}

/// Number of active criteria, for the filter badge.
pub fn active_filter_count(filters: &FilterState) -> usize {
    let mut count = filters.offices.len()
        + filters.insurance_carriers.len()
        + filters.claim_status.len()
        + filters.statuses.len()
        + filters.interaction_types.len()
        + filters.how_proceeded.len()
        + filters.escalated_to.len()
        + filters.missing_docs.len();
    if !filters.search_query.trim().is_empty() {
        count += 1;
    }
    if filters.date_range.start.is_some() && filters.date_range.end.is_some() {
        count += 1;
    }
    count
}

#[derive(Clone, Copy, Default)]
struct FieldAccumulator {
    value: f64,
    count: usize,
}

/// Bucket records by `x_field` and aggregate each `y_field` per bucket.
///
/// Missing x values land in the `Unknown` group. The result is sorted by
/// the first y field descending; pie-style consumers truncate with
/// [`top_n`] at the rendering boundary.
pub fn group_and_aggregate(
    records: &[PatientRecord],
    x_field: &str,
    y_fields: &[&str],
    aggregation: Aggregation,
) -> Vec<SeriesPoint> {
    if y_fields.is_empty() {
        return Vec::new();
    }

    let mut groups: HashMap<String, Vec<FieldAccumulator>> = HashMap::new();
    for record in records {
        let key = string_field(record, x_field)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let accumulators = match groups.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(vec![FieldAccumulator::default(); y_fields.len()])
            }
        };

        for (slot, y_field) in y_fields.iter().enumerate() {
            let value = numeric_field(record, y_field).unwrap_or(0.0);
            let acc = &mut accumulators[slot];
            acc.count += 1;
            match aggregation {
                Aggregation::Sum => acc.value += value,
                Aggregation::Count => acc.value += 1.0,
                Aggregation::Avg => {
                    let n = acc.count as f64;
                    acc.value = (acc.value * (n - 1.0) + value) / n;
                }
                Aggregation::Max => {
                    if acc.count == 1 || value > acc.value {
                        acc.value = value;
                    }
                }
                Aggregation::Min => {
                    if acc.count == 1 || value < acc.value {
                        acc.value = value;
                    }
                }
            }
        }
    }

    let mut series: Vec<SeriesPoint> = groups
        .into_iter()
        .map(|(name, accumulators)| SeriesPoint {
            name,
            values: accumulators.into_iter().map(|acc| acc.value).collect(),
        })
        .collect();
    series.sort_by(|a, b| b.values[0].total_cmp(&a.values[0]).then(a.name.cmp(&b.name)));
    series
}

/// Keep the `limit` largest groups of an already-sorted series.
pub fn top_n(series: Vec<SeriesPoint>, limit: usize) -> Vec<SeriesPoint> {
    series.into_iter().take(limit).collect()
}

fn string_field(record: &PatientRecord, field: &str) -> Option<String> {
    match field {
        "offices" => Some(record.offices.clone()),
        "insurance_carrier" | "insurancecarrier" => Some(record.insurance_carrier.clone()),
        "claim_status" | "claimstatus" => Some(record.claim_status.clone()),
        "patient_name" | "patientname" => Some(record.patient_name.clone()),
        "status" => record.status.clone(),
        "type_of_interaction" | "typeofinteraction" => record.type_of_interaction.clone(),
        "how_we_proceeded" | "howweproceeded" => record.how_we_proceeded.clone(),
        "escalated_to" | "escalatedto" => record.escalated_to.clone(),
        "missing_docs_or_information" | "missingdocsorinformation" => {
            record.missing_docs_or_information.clone()
        }
        "email_address" | "emailaddress" => record.email_address.clone(),
        "dos" => record.dos.clone(),
        "timestamp" => Some(record.timestamp.clone()),
        _ => None,
    }
}

fn numeric_field(record: &PatientRecord, field: &str) -> Option<f64> {
    match field {
        "paid_amount" | "paidamount" => Some(record.paid_amount),
        "productivity_amount" | "productivityamount" => record.productivity_amount,
        _ => None,
    }
}

/// Six-month trend ending at the current local month.
pub fn monthly_trend(records: &[PatientRecord]) -> Vec<TrendPoint> {
    monthly_trend_at(records, 6, Local::now().date_naive())
}

/// Fixed-width trend ending at `end`'s month: always `months` points in
/// chronological order, zero-filled where a month has no records.
///
/// Buckets match on the `YYYY-MM` prefix of `dos`, falling back to
/// `timestamp` when the record has no date of service.
pub fn monthly_trend_at(
    records: &[PatientRecord],
    months: usize,
    end: NaiveDate,
) -> Vec<TrendPoint> {
    let mut points = Vec::with_capacity(months);
    for back in (0..months).rev() {
        let (year, month) = shift_month(end.year(), end.month(), back);
        let key = format!("{year:04}-{month:02}");
        let label = NaiveDate::from_ymd_opt(year, month, 1)
            .map(|date| date.format("%b %Y").to_string())
            .unwrap_or_else(|| key.clone());

        let mut revenue = 0.0;
        let mut claims = 0;
        for record in records {
            let bucket = record.dos.as_deref().unwrap_or(&record.timestamp);
            if bucket.starts_with(&key) {
                revenue += record.paid_amount;
                claims += 1;
            }
        }

        points.push(TrendPoint {
            month: key,
            label,
            revenue,
            claims,
        });
    }
    points
}

fn shift_month(year: i32, month: u32, back: usize) -> (i32, u32) {
    let total = year as i64 * 12 + (month as i64 - 1) - back as i64;
    (total.div_euclid(12) as i32, (total.rem_euclid(12) + 1) as u32)
}

/// Revenue per office, largest first.
pub fn revenue_by_office(records: &[PatientRecord]) -> Vec<SeriesPoint> {
    group_and_aggregate(records, "offices", &["paid_amount"], Aggregation::Sum)
}

/// Claim count per claim status, largest first.
pub fn claims_by_status(records: &[PatientRecord]) -> Vec<SeriesPoint> {
    group_and_aggregate(records, "claim_status", &["paid_amount"], Aggregation::Count)
}

/// Revenue per insurance carrier, largest first.
pub fn revenue_by_carrier(records: &[PatientRecord]) -> Vec<SeriesPoint> {
    group_and_aggregate(
        records,
        "insurance_carrier",
        &["paid_amount"],
        Aggregation::Sum,
    )
}

/// Interaction-type distribution; records without a type are skipped.
pub fn interaction_type_counts(records: &[PatientRecord]) -> Vec<SeriesPoint> {
    let mut series = group_and_aggregate(
        records,
        "type_of_interaction",
        &["paid_amount"],
        Aggregation::Count,
    );
    series.retain(|point| point.name != "Unknown");
    series
}

/// Mean payment per claim status.
pub fn average_payment_by_status(records: &[PatientRecord]) -> Vec<SeriesPoint> {
    group_and_aggregate(records, "claim_status", &["paid_amount"], Aggregation::Avg)
}

/// Offices ranked by revenue, with claim counts and mean claim size.
pub fn top_performing_offices(records: &[PatientRecord], limit: usize) -> Vec<OfficePerformance> {
    let mut totals: HashMap<String, (f64, usize)> = HashMap::new();
    for record in records {
        let entry = totals.entry(record.offices.clone()).or_insert((0.0, 0));
        entry.0 += record.paid_amount;
        entry.1 += 1;
    }

    let mut ranked: Vec<OfficePerformance> = totals
        .into_iter()
        .map(|(office, (revenue, claims))| OfficePerformance {
            office,
            revenue,
            claims,
            average_claim: revenue / claims as f64,
        })
        .collect();
    ranked.sort_by(|a, b| b.revenue.total_cmp(&a.revenue).then(a.office.cmp(&b.office)));
    ranked.truncate(limit);
    ranked
}

/// Share of claims whose status reads paid or completed, as a percentage.
pub fn completion_rate(records: &[PatientRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let completed = records
        .iter()
        .filter(|record| {
            matches!(
                record.claim_status.trim().to_lowercase().as_str(),
                "paid" | "completed"
            )
        })
        .count();
    completed as f64 / records.len() as f64 * 100.0
}

/// Completeness and duplicate figures for a fetched collection.
///
/// Duplicates are keyed on `patient_name + timestamp`; the source data has
/// no stable identifier, so the key is lossy by construction.
pub fn data_quality(records: &[PatientRecord]) -> DataQuality {
    if records.is_empty() {
        return DataQuality::default();
    }

    let mut completeness_sum = 0.0;
    let mut seen = HashSet::new();
    let mut duplicate_count = 0;
    for record in records {
        let required = [
            record.patient_name.as_str(),
            record.offices.as_str(),
            record.insurance_carrier.as_str(),
            record.claim_status.as_str(),
        ];
        let filled = required.iter().filter(|value| !value.trim().is_empty()).count();
        completeness_sum += filled as f64 / required.len() as f64;

        let key = format!("{}-{}", record.patient_name, record.timestamp);
        if !seen.insert(key) {
            duplicate_count += 1;
        }
    }

    let completeness_score = completeness_sum / records.len() as f64 * 100.0;
    DataQuality {
        total_records: records.len(),
        completeness_score: (completeness_score * 10.0).round() / 10.0,
        duplicate_count,
    }
}
