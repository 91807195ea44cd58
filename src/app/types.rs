const PAGE_SIZE: usize = 10;
const BANNER_TTL: Duration = Duration::from_secs(5);
const UI_LOG_CAPACITY: usize = 200;
const NOTICE_DETAIL_URL: &str =
    "https://www.g2b.go.kr:8081/ep/invitation/publish/bidInfoDtl.do?bidno=";

#[derive(Debug, Parser, Clone)]
#[command(
    name = "bidwatch",
    version,
    about = "Terminal control surface for the bid-notice crawl service"
)]
struct Cli {
    #[arg(value_name = "URL", default_value = "http://127.0.0.1:8000")]
    server: String,

    #[arg(long, value_name = "PATH", default_value = "/ws")]
    ws_path: String,

    #[arg(long, value_name = "N", default_value_t = 5)]
    max_reconnect_attempts: u32,

    #[arg(long, value_name = "MS", default_value_t = 3000)]
    reconnect_delay_ms: u64,

    #[arg(long, value_name = "YYYY-MM-DD")]
    start_date: Option<String>,

    #[arg(long, value_name = "YYYY-MM-DD")]
    end_date: Option<String>,

    #[arg(long, value_name = "KEY", default_value = "date")]
    sort: String,

    #[arg(long, value_name = "FILE")]
    log_file: Option<String>,

    #[arg(long, default_value_t = false)]
    no_tui: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ResultItem {
    number: Option<String>,
    title: String,
    agency: String,
    post_date: String,
    stage: String,
    status: String,
    notice: String,
    qualification: String,
}

impl ResultItem {
    fn detail_url(&self) -> Option<String> {
        let number = self.number.as_deref().map(str::trim).unwrap_or("");
        if number.is_empty() {
            return None;
        }
        Some(format!("{NOTICE_DETAIL_URL}{number}"))
    }

    fn post_date_value(&self) -> Option<NaiveDate> {
        parse_post_date(&self.post_date)
    }
}

// Accepts a bare date or a datetime prefix; the backend is not consistent
// about separators.
fn parse_post_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let head = trimmed.get(..10).unwrap_or(trimmed);
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(head, format) {
            return Some(date);
        }
    }
    None
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ResultSet {
    reported_total: usize,
    items: Vec<ResultItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StatusEvent {
    Status {
        message: String,
    },
    Error {
        message: String,
    },
    Progress {
        #[serde(default)]
        current: Option<u64>,
        #[serde(default)]
        total: Option<u64>,
        #[serde(default)]
        message: Option<String>,
    },
    CrawlingStatus(CrawlingStatus),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct CrawlingStatus {
    #[serde(default)]
    current_keyword: Option<String>,
    #[serde(default)]
    processed_count: u64,
    #[serde(default)]
    total_keywords: u64,
    #[serde(default)]
    total_results: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Exhausted,
}

impl ConnectionState {
    fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Exhausted => "exhausted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    Date,
    Title,
    Agency,
    Stage,
    Status,
}

impl SortKey {
    // Unknown labels fall back to date ordering, same as the service UI
    // always has.
    fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "title" => SortKey::Title,
            "agency" => SortKey::Agency,
            "stage" => SortKey::Stage,
            "status" => SortKey::Status,
            _ => SortKey::Date,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Title => "title",
            SortKey::Agency => "agency",
            SortKey::Stage => "stage",
            SortKey::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn toggle(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
struct LogEntry {
    at: DateTime<Local>,
    level: LogLevel,
    message: String,
}

impl LogEntry {
    fn info(message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            level: LogLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BannerKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
struct Banner {
    kind: BannerKind,
    message: String,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlAction {
    Start,
    Stop,
}

impl ControlAction {
    fn label(self) -> &'static str {
        match self {
            ControlAction::Start => "start",
            ControlAction::Stop => "stop",
        }
    }
}

#[derive(Debug)]
enum ControlCommand {
    StartCrawl {
        start_date: String,
        end_date: String,
    },
    StopCrawl,
    FetchResults,
}

#[derive(Debug)]
enum UiEvent {
    ConnectionChanged(bool),
    Feed(StatusEvent),
    FeedDropped(String),
    FeedExhausted,
    ResultsLoaded(ResultSet),
    FetchFailed(String),
    ControlDone(ControlAction),
    ControlFailed(ControlAction, String),
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn post_date_accepts_common_separators() {
        for raw in ["2026-03-02", "2026/03/02", "2026.03.02", "2026-03-02 14:11:00"] {
            assert_eq!(
                parse_post_date(raw),
                NaiveDate::from_ymd_opt(2026, 3, 2),
                "failed for {raw}"
            );
        }
    }

    #[test]
    fn post_date_rejects_garbage() {
        for raw in ["", "   ", "soon", "03-02-2026"] {
            assert_eq!(parse_post_date(raw), None, "accepted {raw}");
        }
    }

    #[test]
    fn detail_url_requires_identifier() {
        let mut item = ResultItem {
            number: Some("20260212345-00".to_string()),
            ..ResultItem::default()
        };
        assert_eq!(
            item.detail_url().as_deref(),
            Some("https://www.g2b.go.kr:8081/ep/invitation/publish/bidInfoDtl.do?bidno=20260212345-00")
        );

        item.number = Some("   ".to_string());
        assert_eq!(item.detail_url(), None);
        item.number = None;
        assert_eq!(item.detail_url(), None);
    }

    #[test]
    fn sort_key_labels_round_trip_and_default_to_date() {
        for key in [
            SortKey::Date,
            SortKey::Title,
            SortKey::Agency,
            SortKey::Stage,
            SortKey::Status,
        ] {
            assert_eq!(SortKey::from_label(key.label()), key);
        }
        assert_eq!(SortKey::from_label("seo_score"), SortKey::Date);
        assert_eq!(SortKey::from_label(""), SortKey::Date);
    }
}
