//! AWS SDK clients talking to the proxy.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;
    use http::Method;

    use crate::{ENDPOINT, RecordingUpstream, TestProxy, s3_client};

    #[tokio::test]
    async fn test_should_put_and_get_object_through_proxy() {
        let upstream = RecordingUpstream::start().await;
        let proxy = TestProxy::start(upstream.addr, None).await;
        let client = s3_client(&proxy);

        client
            .put_object()
            .bucket("bucket")
            .key("key")
            .body(ByteStream::from_static(b"0123456789"))
            .content_type("text/plain")
            .send()
            .await
            .expect("put_object");

        let resp = client
            .get_object()
            .bucket("bucket")
            .key("key")
            .send()
            .await
            .expect("get_object");
        assert_eq!(resp.content_length(), Some(10));
        let data = resp
            .body
            .collect()
            .await
            .expect("collect body")
            .into_bytes();
        assert_eq!(data.as_ref(), b"0123456789");

        let requests = upstream.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.signature_valid));
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(requests[0].uri.path(), "/bucket/key");
        assert_eq!(requests[0].headers["host"], ENDPOINT);
        assert_eq!(requests[1].method, Method::GET);

        proxy.stop().await;
    }

    #[tokio::test]
    async fn test_should_surface_missing_object_as_service_error() {
        let upstream = RecordingUpstream::start().await;
        let proxy = TestProxy::start(upstream.addr, None).await;
        let client = s3_client(&proxy);

        let err = client
            .get_object()
            .bucket("bucket")
            .key("absent")
            .send()
            .await
            .expect_err("missing object");
        assert_eq!(err.raw_response().map(|r| r.status().as_u16()), Some(404));

        proxy.stop().await;
    }

    #[tokio::test]
    async fn test_should_reject_sdk_client_with_wrong_secret() {
        let upstream = RecordingUpstream::start().await;
        let proxy = TestProxy::start(upstream.addr, None).await;

        let config = s3_client(&proxy)
            .config()
            .to_builder()
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                crate::ACCESS_KEY,
                "not-the-secret",
                None,
                None,
                "integration-test",
            ))
            .build();
        let client = aws_sdk_s3::Client::from_conf(config);

        let err = client
            .delete_object()
            .bucket("bucket")
            .key("key")
            .send()
            .await
            .expect_err("rejected");
        assert_eq!(err.raw_response().map(|r| r.status().as_u16()), Some(403));
        assert!(upstream.requests().is_empty());

        proxy.stop().await;
    }
}
