//! Kiểu dữ liệu lõi cho pipeline phân tích hồ sơ bảo hiểm nha khoa.

use serde::{Deserialize, Serialize};

/// Cấu hình truy cập nguồn dữ liệu bảng tính từ xa.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptConfig {
    /// URL gốc của Apps Script xuất dữ liệu.
    pub url: String,
    /// URL proxy nội bộ, dùng thay `url` khi được đặt.
    pub proxy_url: Option<String>,
    /// Tham số `action` gửi kèm yêu cầu.
    pub action: Option<String>,
    /// Tên sheet cần đọc.
    pub sheet: Option<String>,
    /// Vùng ô cần đọc (ví dụ `A1:Z500`).
    pub range: Option<String>,
    /// Giới hạn số dòng trả về.
    pub limit: Option<u32>,
    /// Thời gian chờ mỗi lần gọi (ms).
    pub timeout_ms: u64,
    /// Số lần thử tối đa cho một chu kỳ tải.
    pub retries: u32,
    /// Độ trễ khởi điểm giữa hai lần thử (ms).
    pub backoff_base_ms: u64,
    /// Trần độ trễ giữa hai lần thử (ms).
    pub backoff_cap_ms: u64,
    /// Trả dữ liệu mẫu thay vì lỗi khi hết lượt thử.
    pub use_fallback_data: bool,
    /// Bù bản ghi tổng hợp khi kết quả ngắn hơn ngưỡng này.
    pub expected_minimum_count: Option<usize>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            proxy_url: None,
            action: None,
            sheet: None,
            range: None,
            limit: None,
            timeout_ms: 10_000,
            retries: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 10_000,
            use_fallback_data: true,
            expected_minimum_count: None,
        }
    }
}

/// Cách đếm chỉ số "claims processed".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimsPolicy {
    /// Đếm mọi bản ghi.
    All,
    /// Chỉ đếm bản ghi có `status` là complete/completed.
    CompletedOnly,
}

/// Phép gộp áp dụng cho trường số khi dựng biểu đồ.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    Max,
    Min,
}

/// Một hồ sơ bệnh nhân đã chuẩn hóa, đơn vị xử lý của toàn pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    /// Thời điểm bản ghi được nhập vào bảng tính.
    pub timestamp: String,
    pub patient_name: String,
    pub offices: String,
    pub insurance_carrier: String,
    /// Số tiền đã thanh toán, không âm.
    pub paid_amount: f64,
    pub claim_status: String,
    /// Trạng thái xử lý nội bộ, tách biệt với `claim_status`.
    pub status: Option<String>,
    pub type_of_interaction: Option<String>,
    pub patient_dob: Option<String>,
    /// Ngày khám (`YYYY-MM-DD`).
    pub dos: Option<String>,
    pub productivity_amount: Option<f64>,
    pub missing_docs_or_information: Option<String>,
    pub how_we_proceeded: Option<String>,
    pub escalated_to: Option<String>,
    pub comments_reasons: Option<String>,
    pub email_address: Option<String>,
    pub timestamp_by_interaction: Option<String>,
}

/// Khoảng ngày lọc theo `dos`; chỉ có hiệu lực khi đủ cả hai đầu.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Tập tiêu chí lọc; mọi tiêu chí đang bật đều phải thỏa (AND).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterState {
    pub date_range: DateRange,
    pub offices: Vec<String>,
    pub insurance_carriers: Vec<String>,
    pub claim_status: Vec<String>,
    pub statuses: Vec<String>,
    pub interaction_types: Vec<String>,
    pub search_query: String,
    pub how_proceeded: Vec<String>,
    pub escalated_to: Vec<String>,
    pub missing_docs: Vec<String>,
}

/// Bộ chỉ số KPI hiển thị trên dashboard, tính lại sau mỗi lần lọc.
///
/// Lưu ý: `average_claim` luôn chia cho tổng số bản ghi, nên với
/// [`ClaimsPolicy::CompletedOnly`] tích `average_claim * claims_processed`
/// không bằng `total_revenue`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardMetrics {
    pub total_revenue: f64,
    pub claims_processed: usize,
    pub average_claim: f64,
    pub active_offices: usize,
    pub todays_claims: usize,
    pub weekly_claims: usize,
    pub monthly_claims: usize,
}

/// Một nhóm trên biểu đồ; `values` song song với danh sách trường y.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub name: String,
    pub values: Vec<f64>,
}

/// Một điểm trong chuỗi xu hướng theo tháng.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendPoint {
    /// Khóa tháng dạng `YYYY-MM`.
    pub month: String,
    /// Nhãn hiển thị, ví dụ `Jan 2024`.
    pub label: String,
    pub revenue: f64,
    pub claims: usize,
}

/// Thành tích một phòng khám, dùng cho bảng xếp hạng.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfficePerformance {
    pub office: String,
    pub revenue: f64,
    pub claims: usize,
    pub average_claim: f64,
}

/// Chỉ số chất lượng dữ liệu của một lần tải.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DataQuality {
    pub total_records: usize,
    /// Tỷ lệ phần trăm các trường bắt buộc được điền, làm tròn 1 chữ số.
    pub completeness_score: f64,
    pub duplicate_count: usize,
}

/// Trạng thái của lần tải gần nhất, tín hiệu giám sát chế độ suy giảm.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FetchStatus {
    /// Dữ liệu đang phục vụ là dữ liệu mẫu do nguồn không truy cập được.
    pub degraded: bool,
    /// Số bản ghi tổng hợp đã bù thêm cho đủ ngưỡng.
    pub padded: usize,
    /// Số lần gọi nguồn đã dùng trong chu kỳ này.
    pub attempts: u32,
}

/// Kết quả một chu kỳ tải dữ liệu hoàn chỉnh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchOutcome {
    pub records: Vec<PatientRecord>,
    pub status: FetchStatus,
}

/// Lỗi chung của pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    #[error("Bản ghi thiếu trường bắt buộc: {0}")]
    MissingField(String),
    #[error("Số tiền thanh toán âm: {0}")]
    NegativeAmount(f64),
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
    #[error("Lỗi mạng: {0}")]
    Network(String),
    #[error("Yêu cầu vượt quá thời gian chờ")]
    Timeout,
}

/// Tiện ích dựng bộ chỉ số rỗng (dùng cho mock/testing).
pub fn empty_metrics() -> DashboardMetrics {
    DashboardMetrics::default()
}
