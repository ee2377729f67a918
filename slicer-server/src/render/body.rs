use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes, Frame};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const CSV_MEDIA_TYPE: &str = "text/csv";
pub const TEXT_MEDIA_TYPE: &str = "text/plain; charset=utf-8";

pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Chunks buffered between the producer and the connection.
const CHUNK_BUFFER: usize = 16;

/// Body fed by an iterator running on the blocking pool. Record sources may
/// block, so they are never pulled on a runtime worker. The producer stops
/// once the connection drops the body.
pub struct ChunkedBody {
    chunks: mpsc::Receiver<Bytes>,
}

impl ChunkedBody {
    pub fn new<I>(chunks: I) -> Self
    where
        I: Iterator<Item = Bytes> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        tokio::task::spawn_blocking(move || {
            for chunk in chunks {
                if tx.blocking_send(chunk).is_err() {
                    tracing::debug!("Response body dropped, stopped streaming");
                    break;
                }
            }
        });
        ChunkedBody { chunks: rx }
    }
}

impl Body for ChunkedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        self.get_mut()
            .chunks
            .poll_recv(cx)
            .map(|chunk| chunk.map(|chunk| Ok(Frame::data(chunk))))
    }
}

pub fn full_body<B: Into<Bytes>>(data: B) -> ResponseBody {
    Full::new(data.into()).boxed_unsync()
}

pub fn streamed_body<I>(chunks: I) -> ResponseBody
where
    I: Iterator<Item = Bytes> + Send + 'static,
{
    ChunkedBody::new(chunks).boxed_unsync()
}

pub fn make_response(
    status: StatusCode,
    media_type: &'static str,
    body: ResponseBody,
) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(media_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_chunked_body_yields_every_chunk() {
        let chunks = vec![Bytes::from("a,b\r\n"), Bytes::from("1,2\r\n")];
        let body = streamed_body(chunks.into_iter());
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected.as_ref(), b"a,b\r\n1,2\r\n");
    }

    #[tokio::test]
    async fn test_blocking_source_runs_off_the_runtime() {
        // A current-thread runtime would stall if the source ran on it
        let (tx, rx) = std::sync::mpsc::channel::<Bytes>();
        let body = streamed_body(rx.into_iter());
        let feeder = tokio::spawn(async move {
            tx.send(Bytes::from("first\n")).unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            tx.send(Bytes::from("second\n")).unwrap();
        });
        let collected = body.collect().await.unwrap().to_bytes();
        feeder.await.unwrap();
        assert_eq!(collected.as_ref(), b"first\nsecond\n");
    }

    #[tokio::test]
    async fn test_dropped_body_stops_the_source() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let chunks = (0..10_000).map(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Bytes::from_static(b"x")
        });
        drop(streamed_body(chunks));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(pulled.load(Ordering::SeqCst) <= CHUNK_BUFFER + 1);
    }

    #[tokio::test]
    async fn test_make_response_sets_media_type() {
        let response = make_response(StatusCode::OK, CSV_MEDIA_TYPE, full_body("x"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], CSV_MEDIA_TYPE);
    }
}
