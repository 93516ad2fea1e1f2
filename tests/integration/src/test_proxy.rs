//! Raw SigV4 requests through the proxy.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use http::{HeaderMap, HeaderValue, Method, StatusCode};
    use signproxy_auth::{Credential, SigV4Signer};
    use signproxy_http::response::SIGNATURE_MISMATCH_XML;

    use crate::{ENDPOINT, RecordingUpstream, SECRET_KEY, TestProxy, credential, signed_request};

    fn signer() -> SigV4Signer {
        SigV4Signer::new(credential())
    }

    #[tokio::test]
    async fn test_should_forward_put_with_resigned_headers() {
        let upstream = RecordingUpstream::start().await;
        let proxy = TestProxy::start(upstream.addr, None).await;
        let client = reqwest::Client::new();

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        let response = signed_request(
            &client,
            Method::PUT,
            &format!("{}/bucket/key", proxy.url()),
            &headers,
            b"0123456789",
            &signer(),
            Utc::now(),
        )
        .header("x-forwarded-proto", "https")
        .header("x-real-ip", "203.0.113.9")
        .header("cf-connecting-ip", "203.0.113.9")
        .send()
        .await
        .expect("send");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["etag"], "\"etag-10\"");

        let requests = upstream.requests();
        assert_eq!(requests.len(), 1);
        let outbound = &requests[0];
        assert!(outbound.signature_valid);
        assert_eq!(outbound.method, Method::PUT);
        assert_eq!(outbound.uri.path(), "/bucket/key");
        assert_eq!(outbound.headers["host"], ENDPOINT);
        assert_eq!(outbound.headers["content-type"], "text/plain");
        assert_eq!(outbound.body.as_ref(), b"0123456789");
        for dropped in ["x-forwarded-proto", "x-real-ip", "cf-connecting-ip"] {
            assert!(!outbound.headers.contains_key(dropped), "{dropped} forwarded");
        }

        proxy.stop().await;
    }

    #[tokio::test]
    async fn test_should_pass_through_upstream_error_responses() {
        let upstream = RecordingUpstream::start().await;
        let proxy = TestProxy::start(upstream.addr, None).await;
        let client = reqwest::Client::new();

        let response = signed_request(
            &client,
            Method::GET,
            &format!("{}/bucket/missing?versionId=3", proxy.url()),
            &HeaderMap::new(),
            b"",
            &signer(),
            Utc::now(),
        )
        .send()
        .await
        .expect("send");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.text().await.expect("body"),
            "<Error><Code>NoSuchKey</Code></Error>"
        );
        let requests = upstream.requests();
        assert!(requests[0].signature_valid);
        assert_eq!(requests[0].uri.query(), Some("versionId=3"));

        proxy.stop().await;
    }

    #[tokio::test]
    async fn test_should_reject_tampered_signature_without_upstream_call() {
        let upstream = RecordingUpstream::start().await;
        let proxy = TestProxy::start(upstream.addr, None).await;
        let client = reqwest::Client::new();

        let request = signed_request(
            &client,
            Method::GET,
            &format!("{}/bucket/key", proxy.url()),
            &HeaderMap::new(),
            b"",
            &signer(),
            Utc::now(),
        )
        .build()
        .expect("request");
        let auth = request.headers()["authorization"]
            .to_str()
            .expect("ascii")
            .to_owned();
        let flipped = if auth.ends_with('a') { 'b' } else { 'a' };
        let tampered = format!("{}{flipped}", &auth[..auth.len() - 1]);

        let mut headers = request.headers().clone();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&tampered).expect("header"),
        );

        let response = client
            .get(request.url().clone())
            .headers(headers)
            .send()
            .await
            .expect("send");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()["content-type"], "application/xml");
        assert_eq!(response.text().await.expect("body"), SIGNATURE_MISMATCH_XML);
        assert!(upstream.requests().is_empty());

        proxy.stop().await;
    }

    #[tokio::test]
    async fn test_should_reject_unsigned_and_foreign_requests() {
        let upstream = RecordingUpstream::start().await;
        let proxy = TestProxy::start(upstream.addr, None).await;
        let client = reqwest::Client::new();

        let unsigned = client
            .get(format!("{}/bucket/key", proxy.url()))
            .send()
            .await
            .expect("send");
        assert_eq!(unsigned.status(), StatusCode::FORBIDDEN);
        assert_eq!(unsigned.text().await.expect("body"), SIGNATURE_MISMATCH_XML);

        let foreign = SigV4Signer::new(Credential::new("AKIDSOMEONEELSE", SECRET_KEY, "us-west-002"));
        let response = signed_request(
            &client,
            Method::DELETE,
            &format!("{}/bucket/key", proxy.url()),
            &HeaderMap::new(),
            b"",
            &foreign,
            Utc::now(),
        )
        .send()
        .await
        .expect("send");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(upstream.requests().is_empty());

        proxy.stop().await;
    }

    #[tokio::test]
    async fn test_should_accept_stale_timestamp_and_resign_with_current_time() {
        let upstream = RecordingUpstream::start().await;
        let proxy = TestProxy::start(upstream.addr, None).await;
        let client = reqwest::Client::new();
        let stale = Utc::now() - Duration::days(2);

        let response = signed_request(
            &client,
            Method::PUT,
            &format!("{}/bucket/old", proxy.url()),
            &HeaderMap::new(),
            b"stale",
            &signer(),
            stale,
        )
        .send()
        .await
        .expect("send");

        assert_eq!(response.status(), StatusCode::OK);
        let requests = upstream.requests();
        assert!(requests[0].signature_valid);
        let outbound_date = requests[0].headers["x-amz-date"].to_str().expect("ascii");
        assert_ne!(outbound_date, stale.format("%Y%m%dT%H%M%SZ").to_string());

        proxy.stop().await;
    }

    #[tokio::test]
    async fn test_should_return_bad_gateway_when_upstream_is_unreachable() {
        let closed = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr")
        };
        let proxy = TestProxy::start(closed, None).await;
        let client = reqwest::Client::new();

        let response = signed_request(
            &client,
            Method::GET,
            &format!("{}/bucket/key", proxy.url()),
            &HeaderMap::new(),
            b"",
            &signer(),
            Utc::now(),
        )
        .send()
        .await
        .expect("send");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.bytes().await.expect("body").is_empty());

        proxy.stop().await;
    }

    #[tokio::test]
    async fn test_should_answer_health_check_without_authentication() {
        let upstream = RecordingUpstream::start().await;
        let proxy = TestProxy::start(upstream.addr, None).await;

        let response = reqwest::get(format!("{}/_health", proxy.url()))
            .await
            .expect("send");
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await.expect("json");
        assert_eq!(body, serde_json::json!({"status": "running", "service": "signproxy"}));
        assert!(upstream.requests().is_empty());

        proxy.stop().await;
    }

    #[tokio::test]
    async fn test_should_reject_body_over_limit_without_upstream_call() {
        let upstream = RecordingUpstream::start().await;
        let proxy = TestProxy::start_with_body_limit(upstream.addr, None, 4).await;
        let client = reqwest::Client::new();

        let response = signed_request(
            &client,
            Method::PUT,
            &format!("{}/bucket/key", proxy.url()),
            &HeaderMap::new(),
            b"0123456789",
            &signer(),
            Utc::now(),
        )
        .send()
        .await
        .expect("send");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(upstream.requests().is_empty());

        proxy.stop().await;
    }
}
