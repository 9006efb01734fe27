//! Classification of HTTP outcomes into routing failure signals
//!
//! Request executors built on reqwest use these helpers to turn a response
//! or transport error into the [`ClassifiedError`] the retry policy matches
//! on, and to read the session token the service returned.

use std::time::Duration;

use polaris_domain::{ClassifiedError, FailureSignals};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};

/// Service sub-status code accompanying the HTTP status
pub const SUB_STATUS_HEADER: &str = "x-ms-substatus";
/// Server-suggested throttling delay in milliseconds
pub const RETRY_AFTER_MS_HEADER: &str = "x-ms-retry-after-ms";
/// Session token returned by, and sent to, the service
pub const SESSION_TOKEN_HEADER: &str = "x-ms-session-token";

/// Failure signals carried by a status line and its headers
pub fn signals_from_status(status: StatusCode, headers: &HeaderMap) -> FailureSignals {
    let mut signals = FailureSignals::status(status.as_u16(), sub_status(headers));
    if let Some(delay) = retry_after(headers) {
        signals = signals.with_retry_after(delay);
    }
    signals
}

/// Classify a response, or `None` when it succeeded
pub fn classify_response(response: &Response) -> Option<ClassifiedError> {
    let status = response.status();
    if status.is_success() || status.is_redirection() {
        return None;
    }
    Some(ClassifiedError::classify(signals_from_status(status, response.headers())))
}

/// Classify a transport-level failure
pub fn classify_transport_error(err: &reqwest::Error) -> ClassifiedError {
    let signals = if err.is_timeout() {
        FailureSignals::timeout()
    } else if let Some(status) = err.status() {
        FailureSignals::status(status.as_u16(), None)
    } else {
        FailureSignals::connection(err.to_string())
    };
    ClassifiedError::classify(signals)
}

/// Session token header value, if present and non-empty
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn sub_status(headers: &HeaderMap) -> Option<u32> {
    header_str(headers, SUB_STATUS_HEADER).and_then(|v| v.parse().ok())
}

/// `x-ms-retry-after-ms` wins over the standard `Retry-After` seconds
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let retry_after_ms =
        header_str(headers, RETRY_AFTER_MS_HEADER).and_then(|v| v.parse::<u64>().ok());
    if let Some(ms) = retry_after_ms {
        return Some(Duration::from_millis(ms));
    }
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::header::HeaderValue;
    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_status_and_sub_status_classification() {
        let cases = [
            (403, "3", ClassifiedError::ForbiddenWrite),
            (404, "1002", ClassifiedError::SessionNotAvailable),
            (410, "1007", ClassifiedError::StaleRouting { sub_status: 1007 }),
            (503, "0", ClassifiedError::ServiceUnavailable { status_code: 503 }),
            (409, "0", ClassifiedError::Application { status_code: 409, sub_status: 0 }),
        ];

        for (status, sub, expected) in cases {
            let status = StatusCode::from_u16(status).unwrap();
            let map = headers(&[(SUB_STATUS_HEADER, sub)]);
            assert_eq!(ClassifiedError::classify(signals_from_status(status, &map)), expected);
        }
    }

    #[test]
    fn test_retry_after_prefers_millisecond_header() {
        let map = headers(&[(RETRY_AFTER_MS_HEADER, "250"), ("retry-after", "5")]);
        let signals = signals_from_status(StatusCode::TOO_MANY_REQUESTS, &map);
        assert_eq!(signals.retry_after, Some(Duration::from_millis(250)));

        let map = headers(&[("retry-after", "2")]);
        assert_eq!(
            ClassifiedError::classify(signals_from_status(StatusCode::TOO_MANY_REQUESTS, &map)),
            ClassifiedError::Throttled { retry_after: Some(Duration::from_secs(2)) }
        );
    }

    #[test]
    fn test_session_token_header() {
        let token = session_token(&headers(&[(SESSION_TOKEN_HEADER, "0:1#50")]));
        assert_eq!(token.as_deref(), Some("0:1#50"));
        assert_eq!(session_token(&headers(&[(SESSION_TOKEN_HEADER, "  ")])), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_classify_live_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(429).insert_header(RETRY_AFTER_MS_HEADER, "40"),
            )
            .mount(&server)
            .await;

        let response = Client::new().get(server.uri()).send().await.unwrap();
        assert_eq!(
            classify_response(&response),
            Some(ClassifiedError::Throttled { retry_after: Some(Duration::from_millis(40)) })
        );
    }

    #[tokio::test]
    async fn test_successful_response_is_not_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(201)).mount(&server).await;

        let response = Client::new().get(server.uri()).send().await.unwrap();
        assert_eq!(classify_response(&response), None);
    }

    #[tokio::test]
    async fn test_transport_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::builder().no_proxy().build().unwrap();
        let err = client.get(format!("http://{addr}")).send().await.unwrap_err();
        assert!(matches!(classify_transport_error(&err), ClassifiedError::ConnectionFailure(_)));

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;
        let client =
            Client::builder().no_proxy().timeout(Duration::from_millis(20)).build().unwrap();
        let err = client.get(server.uri()).send().await.unwrap_err();
        assert_eq!(classify_transport_error(&err), ClassifiedError::ResponseTimeout);
    }
}
