#[derive(Debug, Error)]
enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service returned {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Client for the crawl control and result retrieval endpoints. Control
/// failures surface as one-shot banners upstream; nothing here retries.
#[derive(Debug, Clone)]
struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    async fn start_crawl(&self, start_date: &str, end_date: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoint("/api/start")?)
            .json(&json!({ "startDate": start_date, "endDate": end_date }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(())
    }

    async fn stop_crawl(&self) -> Result<(), ApiError> {
        let response = self.http.post(self.endpoint("/api/stop")?).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(())
    }

    /// Fetches the full listing once; all browsing afterwards is local.
    async fn fetch_results(&self) -> Result<ResultSet, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/api/crawl-results/")?)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        let body = response.text().await?;
        Ok(decode_results(&body))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ResultsPayload {
    #[serde(default)]
    summary: SummaryPayload,
    #[serde(default)]
    results: Vec<ResultEntryPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    total_results: usize,
}

#[derive(Debug, Default, Deserialize)]
struct ResultEntryPayload {
    #[serde(default)]
    bid_info: BidInfoPayload,
    #[serde(default)]
    details: DetailPayload,
}

#[derive(Debug, Default, Deserialize)]
struct BidInfoPayload {
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    agency: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    stage: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct DetailPayload {
    #[serde(default)]
    notice: String,
    #[serde(default)]
    qualification: String,
}

// A malformed or empty payload decodes to zero results; the browsing
// engine stays navigable either way. The reported total is kept separate
// from the payload length on purpose: the headline shows what the backend
// claims, pagination runs over what actually arrived.
fn decode_results(body: &str) -> ResultSet {
    let payload: ResultsPayload = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("malformed results payload treated as empty: {err}");
            ResultsPayload::default()
        }
    };
    let items = payload
        .results
        .into_iter()
        .map(|entry| ResultItem {
            number: entry
                .bid_info
                .number
                .filter(|number| !number.trim().is_empty()),
            title: entry.bid_info.title,
            agency: entry.bid_info.agency,
            post_date: entry.bid_info.date,
            stage: entry.bid_info.stage,
            status: entry.bid_info.status,
            notice: entry.details.notice,
            qualification: entry.details.qualification,
        })
        .collect();
    ResultSet {
        reported_total: payload.summary.total_results,
        items,
    }
}

#[cfg(test)]
mod api_tests {
    use super::*;

    #[test]
    fn decodes_a_full_listing() {
        let body = r#"{
            "summary": {"total_results": 2, "elapsed": 41.2},
            "results": [
                {
                    "bid_info": {
                        "number": "20260212345-00",
                        "title": "VR classroom build",
                        "agency": "City Hall",
                        "date": "2026-01-10",
                        "stage": "open",
                        "status": "active"
                    },
                    "details": {
                        "notice": "general notice text",
                        "qualification": "regional firms only"
                    }
                },
                {
                    "bid_info": {"title": "untracked notice"}
                }
            ]
        }"#;
        let set = decode_results(body);
        assert_eq!(set.reported_total, 2);
        assert_eq!(set.items.len(), 2);

        let first = &set.items[0];
        assert_eq!(first.number.as_deref(), Some("20260212345-00"));
        assert_eq!(first.title, "VR classroom build");
        assert_eq!(first.agency, "City Hall");
        assert_eq!(first.post_date, "2026-01-10");
        assert_eq!(first.stage, "open");
        assert_eq!(first.status, "active");
        assert_eq!(first.notice, "general notice text");
        assert_eq!(first.qualification, "regional firms only");

        let second = &set.items[1];
        assert_eq!(second.number, None);
        assert_eq!(second.title, "untracked notice");
        assert_eq!(second.agency, "");
        assert_eq!(second.detail_url(), None);
    }

    #[test]
    fn empty_object_decodes_to_zero_results() {
        let set = decode_results("{}");
        assert_eq!(set.reported_total, 0);
        assert!(set.items.is_empty());
    }

    #[test]
    fn malformed_body_decodes_to_zero_results() {
        let set = decode_results("<html>502 Bad Gateway</html>");
        assert_eq!(set.reported_total, 0);
        assert!(set.items.is_empty());
    }

    #[test]
    fn blank_identifiers_are_normalized_to_none() {
        let body = r#"{"results": [{"bid_info": {"number": "   ", "title": "x"}}]}"#;
        let set = decode_results(body);
        assert_eq!(set.items[0].number, None);
    }

    #[test]
    fn reported_total_may_diverge_from_payload_length() {
        let body = r#"{"summary": {"total_results": 40}, "results": [{"bid_info": {"title": "only one"}}]}"#;
        let set = decode_results(body);
        assert_eq!(set.reported_total, 40);
        assert_eq!(set.items.len(), 1);
    }

    #[test]
    fn endpoints_join_against_the_base_url() {
        let api = ApiClient::new(Url::parse("http://127.0.0.1:8000").unwrap());
        assert_eq!(
            api.endpoint("/api/crawl-results/").unwrap().as_str(),
            "http://127.0.0.1:8000/api/crawl-results/"
        );
        assert_eq!(
            api.endpoint("/api/start").unwrap().as_str(),
            "http://127.0.0.1:8000/api/start"
        );
    }
}
