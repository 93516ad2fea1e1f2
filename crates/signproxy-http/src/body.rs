//! Response body type for the proxy.
//!
//! [`ProxyBody`] covers the three kinds of response the proxy produces:
//!
//! - **Buffered**: locally generated documents (rejection XML, health JSON).
//! - **Empty**: `502 Bad Gateway` and other bodiless responses.
//! - **Streaming**: an upstream response body relayed frame by frame.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use http_body::Frame;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};

/// Proxy response body.
///
/// Implements [`http_body::Body`] so it can be used directly with hyper responses.
#[derive(Debug, Default)]
pub enum ProxyBody {
    /// Buffered body for locally generated responses.
    Buffered(Full<Bytes>),
    /// Empty body.
    #[default]
    Empty,
    /// Upstream body, relayed without buffering.
    Streaming(UnsyncBoxBody<Bytes, io::Error>),
}

impl ProxyBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Create a buffered body from a UTF-8 string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::Buffered(Full::new(Bytes::from(s.into())))
    }

    /// Wrap a stream of frames as a relayed body.
    pub fn streaming<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Frame<Bytes>, io::Error>> + Send + 'static,
    {
        Self::Streaming(StreamBody::new(stream).boxed_unsync())
    }
}

impl http_body::Body for ProxyBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Empty => Poll::Ready(None),
            Self::Streaming(body) => Pin::new(body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Empty => true,
            Self::Streaming(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
            Self::Streaming(body) => body.size_hint(),
        }
    }
}
