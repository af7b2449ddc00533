use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, trace, warn};

use crate::domain::{RUVConfig, RUVError};
use crate::pager::FetchRequest;
use crate::record::Record;

/// Anything that can hand out a batch of user records.
pub trait RecordSource: Send + Sync + 'static {
    fn fetch_batch(
        &self,
        size: usize,
    ) -> impl Future<Output = Result<Vec<Record>, RUVError>> + Send;
}

/// Fetches batches from the random data api over http.
pub struct HttpSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSource {
    pub fn new(config: &RUVConfig) -> Result<Self, RUVError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(HttpSource {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

impl RecordSource for HttpSource {
    async fn fetch_batch(&self, size: usize) -> Result<Vec<Record>, RUVError> {
        let start_time = Instant::now();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("size", size)])
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        let records = decode_batch(&body, size)?;
        debug!(
            "Fetched {} records in {}ms",
            records.len(),
            start_time.elapsed().as_millis()
        );
        Ok(records)
    }
}

/// Decodes a response body into at most `size` records.
///
/// The api answers `size=1` with a bare object instead of an array, that is
/// read as a batch of one.
pub fn decode_batch(body: &[u8], size: usize) -> Result<Vec<Record>, RUVError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    let mut records: Vec<Record> = if value.is_object() {
        vec![serde_json::from_value(value)?]
    } else {
        serde_json::from_value(value)?
    };
    if records.len() > size {
        warn!("Received {} records, keeping the first {size}", records.len());
        records.truncate(size);
    }
    Ok(records)
}

/// Completion of one `FetchRequest`.
#[derive(Debug)]
pub struct FetchOutcome {
    pub request: FetchRequest,
    pub result: Result<Vec<Record>, RUVError>,
}

/// Runs fetches on the tokio runtime and reports every outcome back over a channel.
pub struct Fetcher<S: RecordSource> {
    source: Arc<S>,
    runtime: Handle,
    batch_size: usize,
    outcomes: UnboundedSender<FetchOutcome>,
}

impl<S: RecordSource> Fetcher<S> {
    pub fn new(
        source: S,
        runtime: Handle,
        batch_size: usize,
        outcomes: UnboundedSender<FetchOutcome>,
    ) -> Self {
        Fetcher {
            source: Arc::new(source),
            runtime,
            batch_size,
            outcomes,
        }
    }

    pub fn dispatch(&self, request: FetchRequest) {
        trace!("Dispatching {request:?}");
        let source = Arc::clone(&self.source);
        let outcomes = self.outcomes.clone();
        let size = self.batch_size;
        self.runtime.spawn(async move {
            let result = source.fetch_batch(size).await;
            if outcomes.send(FetchOutcome { request, result }).is_err() {
                error!("Fetch outcome for page {} has no receiver", request.page_index);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::Slot;
    use crate::record::tests::{FIXTURE, record};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    struct StubSource {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl RecordSource for StubSource {
        async fn fetch_batch(&self, size: usize) -> Result<Vec<Record>, RUVError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RUVError::NetworkFailure("timed out".into()));
            }
            Ok((0..size as u64).map(|i| record(i, "a", "b", "c")).collect())
        }
    }

    fn request(ticket: u64, page_index: usize) -> FetchRequest {
        FetchRequest {
            ticket,
            slot: Slot::Next,
            page_index,
        }
    }

    // Answers a single http request with `status` and `body`, returns the request head.
    async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/api/users/random_user", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });
        (endpoint, server)
    }

    fn http_source(endpoint: String) -> HttpSource {
        HttpSource::new(&RUVConfig::default().endpoint(endpoint).timeout_secs(5)).unwrap()
    }

    #[test]
    fn decodes_a_batch() {
        let records = decode_batch(FIXTURE.as_bytes(), 100).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].id, 4721);
    }

    #[test]
    fn truncates_batches_longer_than_requested() {
        let records = decode_batch(FIXTURE.as_bytes(), 3).unwrap();
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4721, 812, 9930]);
    }

    #[test]
    fn reads_a_bare_object_as_a_batch_of_one() {
        let records = decode_batch(br#"{"id": 7, "first_name": "Ada"}"#, 1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 7);
        assert_eq!(records[0].first_name, "Ada");
    }

    #[test]
    fn rejects_payloads_that_are_not_records() {
        assert!(matches!(
            decode_batch(br#"{"error": "rate limited"}"#, 100),
            Err(RUVError::MalformedResponse(_))
        ));
        assert!(matches!(
            decode_batch(br#"[{"id": "abc"}]"#, 100),
            Err(RUVError::MalformedResponse(_))
        ));
        assert!(matches!(
            decode_batch(b"<html>busy</html>", 100),
            Err(RUVError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn http_source_asks_for_the_batch_size() {
        let (endpoint, server) = serve_once("200 OK", FIXTURE.to_string()).await;
        let records = http_source(endpoint).fetch_batch(2).await.unwrap();
        assert_eq!(records.len(), 2);

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /api/users/random_user?size=2 HTTP/1.1"));
        assert!(head.to_lowercase().contains("accept: application/json"));
    }

    #[tokio::test]
    async fn http_source_maps_server_errors_to_network_failures() {
        let (endpoint, server) = serve_once("503 Service Unavailable", String::new()).await;
        let result = http_source(endpoint).fetch_batch(100).await;
        assert!(matches!(result, Err(RUVError::NetworkFailure(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn http_source_maps_bad_bodies_to_malformed_responses() {
        let (endpoint, server) = serve_once("200 OK", "[1, 2".to_string()).await;
        let result = http_source(endpoint).fetch_batch(100).await;
        assert!(matches!(result, Err(RUVError::MalformedResponse(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn every_request_yields_exactly_one_outcome() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let source = StubSource {
            calls: Arc::clone(&calls),
            fail: false,
        };
        let fetcher = Fetcher::new(source, Handle::current(), 3, tx);

        fetcher.dispatch(request(1, 0));
        fetcher.dispatch(request(2, 1));

        let mut tickets = Vec::new();
        for _ in 0..2 {
            let outcome = rx.recv().await.unwrap();
            assert_eq!(outcome.result.unwrap().len(), 3);
            tickets.push(outcome.request.ticket);
        }
        tickets.sort_unstable();
        assert_eq!(tickets, vec![1, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        drop(fetcher);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn failures_are_reported_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let source = StubSource {
            calls: Arc::clone(&calls),
            fail: true,
        };
        let fetcher = Fetcher::new(source, Handle::current(), 100, tx);
        fetcher.dispatch(request(5, 3));

        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.request.page_index, 3);
        assert!(matches!(outcome.result, Err(RUVError::NetworkFailure(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
