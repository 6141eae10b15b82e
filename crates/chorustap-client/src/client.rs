use std::future::Future;
use std::time::Duration;

use chorustap_core::{
    CursorValue, FetchOptions, PageSource, RawRecord, StreamKind, UpstreamClient, UpstreamError,
    UpstreamResult,
};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// HTTP client for the Chorus v3 API.
///
/// One client is built per run and shared by every stream.
#[derive(Clone)]
pub struct ChorusClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl ChorusClient {
    pub fn new(token: impl Into<String>, api_url: impl Into<String>) -> UpstreamResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(UpstreamError::Init("auth token is empty".into()));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("chorustap/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| UpstreamError::Init(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn endpoint(&self, kind: StreamKind) -> String {
        format!("{}/v3/{}", self.api_url, kind)
    }
}

impl UpstreamClient for ChorusClient {
    type Pages = ChorusPages;

    fn fetch(
        &self,
        kind: StreamKind,
        min_cursor: &CursorValue,
        options: &FetchOptions,
    ) -> impl Future<Output = UpstreamResult<ChorusPages>> + Send {
        let mut query = vec![("min_date".to_string(), min_cursor.to_string())];
        query.extend(options.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let pages = ChorusPages {
            http: self.http.clone(),
            url: self.endpoint(kind),
            token: self.token.clone(),
            kind,
            query,
            continuation_key: None,
            done: false,
        };
        async move { Ok(pages) }
    }
}

/// Pages of one Chorus listing, following `continuation_key` until the
/// API stops returning one.
pub struct ChorusPages {
    http: reqwest::Client,
    url: String,
    token: String,
    kind: StreamKind,
    query: Vec<(String, String)>,
    continuation_key: Option<String>,
    done: bool,
}

impl ChorusPages {
    fn request(&self) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .get(&self.url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .query(&self.query);
        if let Some(ref key) = self.continuation_key {
            request = request.query(&[("continuation_key", key)]);
        }
        request
    }
}

impl PageSource for ChorusPages {
    fn next_page(&mut self) -> impl Future<Output = UpstreamResult<Option<Vec<RawRecord>>>> + Send {
        async move {
            if self.done {
                return Ok(None);
            }

            let response = self
                .request()
                .send()
                .await
                .map_err(|e| UpstreamError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                self.done = true;
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, body));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| UpstreamError::Decode(e.to_string()))?;
            let (records, continuation_key) = parse_page(self.kind, body)?;

            debug!(
                kind = %self.kind,
                records = records.len(),
                more = continuation_key.is_some(),
                "Received page"
            );

            // An empty page ends the listing even if a key came back with it.
            self.done = continuation_key.is_none() || records.is_empty();
            self.continuation_key = continuation_key;
            Ok(Some(records))
        }
    }
}

/// Map a non-success response to an upstream error.
fn status_error(status: StatusCode, body: String) -> UpstreamError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            UpstreamError::Auth(format!("{}: invalid or missing token", status))
        }
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited,
        _ => UpstreamError::Server {
            status: status.as_u16(),
            message: body,
        },
    }
}

/// Split a listing body into its records and the key for the next page.
fn parse_page(kind: StreamKind, mut body: Value) -> UpstreamResult<(Vec<RawRecord>, Option<String>)> {
    let continuation_key = match body.get("continuation_key") {
        Some(Value::String(key)) if !key.is_empty() => Some(key.clone()),
        _ => None,
    };

    let items = match body.get_mut(kind.as_str()).map(Value::take) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => vec![],
        Some(other) => {
            return Err(UpstreamError::Decode(format!(
                "expected '{}' to be an array, found {}",
                kind, other
            )))
        }
    };

    let records = items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            other => Err(UpstreamError::Decode(format!(
                "expected {} record to be an object, found {}",
                kind, other
            ))),
        })
        .collect::<UpstreamResult<Vec<_>>>()?;

    Ok((records, continuation_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorustap_core::DEFAULT_API_URL;
    use serde_json::json;
    use std::collections::HashMap;

    fn query_of(request: &reqwest::Request) -> HashMap<String, String> {
        request.url().query_pairs().into_owned().collect()
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            ChorusClient::new("  ", DEFAULT_API_URL),
            Err(UpstreamError::Init(_))
        ));
    }

    #[tokio::test]
    async fn test_request_shape() {
        let client = ChorusClient::new("secret", "https://chorus.example/").unwrap();
        let options = FetchOptions::new().flag("with_trackers", "true");
        let mut pages = client
            .fetch(
                StreamKind::Engagements,
                &CursorValue::text("2024-01-01T00:00:00Z"),
                &options,
            )
            .await
            .unwrap();

        let request = pages.request().build().unwrap();
        assert_eq!(request.url().path(), "/v3/engagements");
        assert_eq!(request.headers()["authorization"], "secret");

        let query = query_of(&request);
        assert_eq!(query["min_date"], "2024-01-01T00:00:00Z");
        assert_eq!(query["with_trackers"], "true");
        assert!(!query.contains_key("continuation_key"));

        pages.continuation_key = Some("abc".into());
        let request = pages.request().build().unwrap();
        assert_eq!(query_of(&request)["continuation_key"], "abc");
    }

    #[test]
    fn test_parse_page() {
        let body = json!({
            "engagements": [{"engagement_id": "a"}, {"engagement_id": "b"}],
            "continuation_key": "next"
        });
        let (records, key) = parse_page(StreamKind::Engagements, body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["engagement_id"], "a");
        assert_eq!(key.as_deref(), Some("next"));
    }

    #[test]
    fn test_parse_last_page() {
        let body = json!({"emails": [], "continuation_key": null});
        let (records, key) = parse_page(StreamKind::Emails, body).unwrap();
        assert!(records.is_empty());
        assert!(key.is_none());

        let (records, _) = parse_page(StreamKind::Scorecards, json!({})).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_malformed_page() {
        assert!(matches!(
            parse_page(StreamKind::Emails, json!({"emails": "nope"})),
            Err(UpstreamError::Decode(_))
        ));
        assert!(matches!(
            parse_page(StreamKind::Emails, json!({"emails": [1, 2]})),
            Err(UpstreamError::Decode(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            UpstreamError::Auth(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, String::new()),
            UpstreamError::Auth(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            UpstreamError::RateLimited
        ));

        let err = status_error(StatusCode::BAD_GATEWAY, "upstream down".into());
        assert!(matches!(
            err,
            UpstreamError::Server { status: 502, ref message } if message == "upstream down"
        ));
    }
}
