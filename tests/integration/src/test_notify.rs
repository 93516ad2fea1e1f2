//! Webhook notifications.

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use http::{HeaderMap, HeaderValue, Method, StatusCode};
    use signproxy_auth::SigV4Signer;

    use crate::{RecordingUpstream, TestProxy, WebhookReceiver, credential, signed_request};

    #[tokio::test]
    async fn test_should_post_one_notification_per_verified_request() {
        let upstream = RecordingUpstream::start().await;
        let mut webhook = WebhookReceiver::start().await;
        let proxy = TestProxy::start(upstream.addr, Some(webhook.url.clone())).await;
        let client = reqwest::Client::new();
        let signer = SigV4Signer::new(credential());
        let signed_at = Utc::now();

        let response = signed_request(
            &client,
            Method::GET,
            &format!("{}/bucket/key", proxy.url()),
            &HeaderMap::new(),
            b"",
            &signer,
            signed_at,
        )
        .send()
        .await
        .expect("send");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let rejected = client
            .get(format!("{}/bucket/key", proxy.url()))
            .send()
            .await
            .expect("send");
        assert_eq!(rejected.status(), StatusCode::FORBIDDEN);

        let summary = proxy.stop().await.expect("dispatcher");
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed, 0);

        let (parts, payload) = webhook.received.recv().await.expect("notification");
        assert_eq!(parts.method, Method::POST);
        assert_eq!(parts.uri.path(), "/hooks/storage");
        assert_eq!(parts.headers["content-type"], "application/json");
        assert_eq!(
            payload,
            serde_json::json!({
                "contentLength": null,
                "contentType": null,
                "method": "GET",
                "signatureTimestamp": signed_at.format("%Y%m%dT%H%M%SZ").to_string(),
                "status": 404,
                "url": "http://s3.us-west-002.backblazeb2.com/bucket/key",
            })
        );
        assert!(webhook.received.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_should_report_put_content_length_and_type() {
        let upstream = RecordingUpstream::start().await;
        let mut webhook = WebhookReceiver::start().await;
        let proxy = TestProxy::start(upstream.addr, Some(webhook.url.clone())).await;
        let client = reqwest::Client::new();
        let signer = SigV4Signer::new(credential());

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        headers.insert("content-length", HeaderValue::from_static("10"));
        let response = signed_request(
            &client,
            Method::PUT,
            &format!("{}/bucket/key", proxy.url()),
            &headers,
            b"0123456789",
            &signer,
            Utc::now(),
        )
        .send()
        .await
        .expect("send");
        assert_eq!(response.status(), StatusCode::OK);

        proxy.stop().await;
        let (_, payload) = webhook.received.recv().await.expect("notification");
        assert_eq!(payload["contentLength"], 10);
        assert_eq!(payload["contentType"], "text/plain");
        assert_eq!(payload["method"], "PUT");
        assert_eq!(payload["status"], 200);
    }

    #[tokio::test]
    async fn test_should_respond_without_waiting_for_unreachable_webhook() {
        let upstream = RecordingUpstream::start().await;
        let closed = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr")
        };
        let proxy = TestProxy::start(upstream.addr, Some(format!("http://{closed}/hook"))).await;
        let client = reqwest::Client::new();

        let response = signed_request(
            &client,
            Method::PUT,
            &format!("{}/bucket/key", proxy.url()),
            &HeaderMap::new(),
            b"payload",
            &SigV4Signer::new(credential()),
            Utc::now(),
        )
        .send()
        .await
        .expect("send");
        assert_eq!(response.status(), StatusCode::OK);

        let summary = proxy.stop().await.expect("dispatcher");
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_should_count_webhook_error_status_as_failed_delivery() {
        let upstream = RecordingUpstream::start().await;
        let mut webhook = WebhookReceiver::start_with_status(StatusCode::INTERNAL_SERVER_ERROR).await;
        let proxy = TestProxy::start(upstream.addr, Some(webhook.url.clone())).await;
        let client = reqwest::Client::new();

        let response = signed_request(
            &client,
            Method::GET,
            &format!("{}/bucket/key", proxy.url()),
            &HeaderMap::new(),
            b"",
            &SigV4Signer::new(credential()),
            Utc::now(),
        )
        .send()
        .await
        .expect("send");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let summary = proxy.stop().await.expect("dispatcher");
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.failed, 1);
        let (_, payload) = webhook.received.recv().await.expect("notification");
        assert_eq!(payload["status"], 404);
        assert!(webhook.received.try_recv().is_err());
    }
}
