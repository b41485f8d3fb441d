//! HTTP representation of a compiled stylesheet, including validators and
//! conditional-request handling.

use std::{
    io,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{
            CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, EXPIRES, IF_MODIFIED_SINCE,
            IF_NONE_MATCH, LAST_MODIFIED,
        },
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::stream;
use metrics::counter;
use sha2::{Digest, Sha256};

/// Lifetime advertised to clients and intermediaries.
pub const CACHE_LIFETIME: Duration = Duration::from_secs(31_536_000);

const CONTENT_TYPE_CSS: &str = "text/css";
const CACHE_CONTROL_VALUE: &str = "public, max-age=31536000";

/// A fully-built response: status, headers and body bytes.
#[derive(Debug, Clone)]
pub struct StyleResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl StyleResponse {
    /// Build the response for `css` whose freshness signal is `last_modified`
    /// seconds, answering `304 Not Modified` when the request validators match.
    pub fn for_stylesheet(
        css: Vec<u8>,
        last_modified: u64,
        request: &HeaderMap,
        now: SystemTime,
    ) -> Self {
        let etag = etag_for(last_modified);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_CSS));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
        insert_text(&mut headers, EXPIRES, &httpdate::fmt_http_date(now + CACHE_LIFETIME));
        insert_text(
            &mut headers,
            LAST_MODIFIED,
            &httpdate::fmt_http_date(epoch_secs(last_modified)),
        );
        insert_text(&mut headers, ETAG, &etag);

        if is_not_modified(request, last_modified, &etag) {
            counter!("stylecache_not_modified_total").increment(1);
            return Self {
                status: StatusCode::NOT_MODIFIED,
                headers,
                body: Bytes::new(),
            };
        }

        let body = Bytes::from(css);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        Self {
            status: StatusCode::OK,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED
    }
}

impl IntoResponse for StyleResponse {
    fn into_response(self) -> Response {
        // A sized body, even an empty one, makes the router add Content-Length.
        let body = if self.is_not_modified() {
            Body::from_stream(stream::empty::<Result<Bytes, io::Error>>())
        } else {
            Body::from(self.body)
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Entity tag for a freshness signal: 128-bit hex digest of its decimal form.
pub fn etag_for(last_modified: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(last_modified.to_string().as_bytes());
    let digest = hasher.finalize().to_vec();
    hex::encode(&digest[..16])
}

fn is_not_modified(request: &HeaderMap, last_modified: u64, etag: &str) -> bool {
    let unchanged_since = request
        .get(IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| httpdate::parse_http_date(value.trim()).ok())
        .is_some_and(|since| since >= epoch_secs(last_modified));

    let tag_matches = request
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim() == etag);

    unchanged_since || tag_matches
}

fn epoch_secs(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn insert_text(headers: &mut HeaderMap, name: axum::http::HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNAL: u64 = 1_700_000_000;
    const CSS: &[u8] = b"a{top:0}";

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_500)
    }

    fn request(name: axum::http::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).expect("header value"));
        headers
    }

    #[test]
    fn full_response_carries_caching_headers() {
        let response =
            StyleResponse::for_stylesheet(CSS.to_vec(), SIGNAL, &HeaderMap::new(), now());
        let headers = response.headers();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"a{top:0}");
        assert_eq!(headers[CONTENT_TYPE], "text/css");
        assert_eq!(headers[CONTENT_LENGTH], "8");
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=31536000");
        assert_eq!(headers[LAST_MODIFIED], "Tue, 14 Nov 2023 22:13:20 GMT");
        assert_eq!(headers[EXPIRES], "Wed, 13 Nov 2024 22:21:40 GMT");
        assert_eq!(headers[ETAG], etag_for(SIGNAL).as_str());
    }

    #[test]
    fn etag_is_stable_128_bit_hex() {
        let tag = etag_for(SIGNAL);
        assert_eq!(tag.len(), 32);
        assert!(tag.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(tag, etag_for(SIGNAL));
        assert_ne!(tag, etag_for(SIGNAL + 1));
    }

    #[test]
    fn matching_etag_short_circuits() {
        let headers = request(IF_NONE_MATCH, &format!("  {}  ", etag_for(SIGNAL)));
        let response = StyleResponse::for_stylesheet(CSS.to_vec(), SIGNAL, &headers, now());

        assert!(response.is_not_modified());
        assert!(response.body().is_empty());
        assert!(!response.headers().contains_key(CONTENT_LENGTH));
        assert!(response.headers().contains_key(ETAG));
    }

    #[test]
    fn stale_etag_serves_body() {
        let headers = request(IF_NONE_MATCH, &etag_for(SIGNAL - 1));
        let response = StyleResponse::for_stylesheet(CSS.to_vec(), SIGNAL, &headers, now());

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn if_modified_since_at_or_after_signal_is_not_modified() {
        for date in [
            "Tue, 14 Nov 2023 22:13:20 GMT",
            "Tue, 14 Nov 2023 22:13:21 GMT",
        ] {
            let headers = request(IF_MODIFIED_SINCE, date);
            let response = StyleResponse::for_stylesheet(CSS.to_vec(), SIGNAL, &headers, now());
            assert!(response.is_not_modified(), "{date}");
        }
    }

    #[test]
    fn if_modified_since_before_signal_serves_body() {
        let headers = request(IF_MODIFIED_SINCE, "Tue, 14 Nov 2023 22:13:19 GMT");
        let response = StyleResponse::for_stylesheet(CSS.to_vec(), SIGNAL, &headers, now());

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"a{top:0}");
    }

    #[test]
    fn unparseable_if_modified_since_is_ignored() {
        let headers = request(IF_MODIFIED_SINCE, "yesterday-ish");
        let response = StyleResponse::for_stylesheet(CSS.to_vec(), SIGNAL, &headers, now());

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn not_modified_body_is_unsized() {
        use axum::body::HttpBody;

        let headers = request(IF_NONE_MATCH, &etag_for(SIGNAL));
        let response = StyleResponse::for_stylesheet(CSS.to_vec(), SIGNAL, &headers, now());
        let response = response.into_response();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.body().size_hint().exact(), None);
        assert!(!response.headers().contains_key(CONTENT_LENGTH));
    }

    #[test]
    fn full_body_keeps_exact_size() {
        use axum::body::HttpBody;

        let response =
            StyleResponse::for_stylesheet(CSS.to_vec(), SIGNAL, &HeaderMap::new(), now())
                .into_response();

        assert_eq!(response.body().size_hint().exact(), Some(8));
    }
}
