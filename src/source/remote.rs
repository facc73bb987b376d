use std::time::Duration;
use async_trait::async_trait;
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, error, warn};

use super::{FragmentSink, ResponseSource, SourceError, SERVICE_UNAVAILABLE};

static HTTP: Lazy<Client> = Lazy::new(Client::new);

/// Process-wide HTTP client, built on first use.
pub fn http_client() -> &'static Client {
    &HTTP
}

/// Bounded waits and the single-retry rule for remote streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait for response headers.
    pub request_timeout: Duration,
    /// Longest gap allowed between two body chunks.
    pub idle_timeout: Duration,
    /// Extra attempts, only taken before the first fragment arrives.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// One streaming generation service.
#[async_trait]
pub trait Backend: Send + Sync {
    fn label(&self) -> String;

    fn has_credentials(&self) -> bool {
        true
    }

    /// A single attempt: open the stream and forward every decoded chunk.
    async fn stream(
        &self,
        prompt: &str,
        policy: &RetryPolicy,
        sink: &mut dyn FragmentSink,
    ) -> Result<(), SourceError>;
}

/// Relays a [`Backend`] as a [`ResponseSource`], adding the credential gate
/// and the retry rule.
pub struct RemoteSource<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: Backend> RemoteSource<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }
}

struct CountingSink<'a, S: ?Sized> {
    inner: &'a mut S,
    delivered: usize,
}

impl<S: FragmentSink + ?Sized> FragmentSink for CountingSink<'_, S> {
    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.delivered += 1;
        self.inner.append(text);
    }
}

#[async_trait]
impl<B: Backend> ResponseSource for RemoteSource<B> {
    fn label(&self) -> String {
        self.backend.label()
    }

    async fn produce(&self, prompt: &str, sink: &mut dyn FragmentSink) -> Result<(), SourceError> {
        if !self.backend.has_credentials() {
            warn!(backend = %self.backend.label(), "no credential configured, remote generator unavailable");
            sink.append(SERVICE_UNAVAILABLE);
            return Ok(());
        }

        let mut attempt = 0u32;
        loop {
            let mut counting = CountingSink { inner: &mut *sink, delivered: 0 };
            let result = self.backend.stream(prompt, &self.policy, &mut counting).await;
            let delivered = counting.delivered;

            match result {
                Ok(()) => {
                    debug!(fragments = delivered, attempt, "remote stream finished");
                    return Ok(());
                }
                Err(err) if delivered == 0 && attempt < self.policy.max_retries && err.is_retryable() => {
                    attempt += 1;
                    warn!(error = %err, attempt, "remote stream failed before first fragment, retrying");
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(err) => {
                    error!(error = %err, fragments = delivered, "remote stream failed");
                    return Err(err);
                }
            }
        }
    }
}

/// What a backend makes of one line of the response body.
#[derive(Debug)]
pub(crate) enum LineEvent {
    Text(String),
    Done,
    Skip,
}

/// Send with the header timeout and turn non-success statuses into errors.
pub(crate) async fn send_request(request: RequestBuilder, policy: &RetryPolicy) -> Result<Response, SourceError> {
    let response = tokio::time::timeout(policy.request_timeout, request.send())
        .await
        .map_err(|_| SourceError::Timeout(policy.request_timeout))??;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Service {
            status: status.as_u16(),
            body: excerpt(&body, 200),
        });
    }
    Ok(response)
}

/// Read a line-oriented streaming body, forwarding decoded text as it arrives.
pub(crate) async fn relay_lines<F>(
    response: Response,
    policy: &RetryPolicy,
    sink: &mut dyn FragmentSink,
    decode: F,
) -> Result<(), SourceError>
where
    F: Fn(&str) -> Result<LineEvent, SourceError>,
{
    let mut stream = response.bytes_stream();
    let mut lines = LineBuffer::default();

    loop {
        let next = tokio::time::timeout(policy.idle_timeout, stream.next())
            .await
            .map_err(|_| SourceError::Timeout(policy.idle_timeout))?;
        let Some(chunk) = next else { break };
        let chunk = chunk?;

        for line in lines.push(&chunk) {
            if forward_line(&line, sink, &decode)? {
                return Ok(());
            }
        }
    }

    if let Some(line) = lines.finish() {
        forward_line(&line, sink, &decode)?;
    }
    Ok(())
}

/// Returns true once the stream reported completion.
fn forward_line<F>(line: &str, sink: &mut dyn FragmentSink, decode: &F) -> Result<bool, SourceError>
where
    F: Fn(&str) -> Result<LineEvent, SourceError>,
{
    if line.trim().is_empty() {
        return Ok(false);
    }
    match decode(line)? {
        LineEvent::Text(text) => {
            if !text.is_empty() {
                sink.append(&text);
            }
            Ok(false)
        }
        LineEvent::Done => Ok(true),
        LineEvent::Skip => Ok(false),
    }
}

/// Reassembles newline-terminated lines from arbitrary byte chunks.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&raw));
        }
        lines
    }

    /// Whatever is left after the body ended without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(|c| c == '\n' || c == '\r')
        .to_string()
}

fn excerpt(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` attempts with `error`, delivering `partial`
    /// fragments before failing.
    struct FlakyBackend {
        calls: AtomicUsize,
        failures: usize,
        partial: Vec<&'static str>,
        error: fn() -> SourceError,
        credentials: bool,
    }

    impl FlakyBackend {
        fn new(failures: usize, error: fn() -> SourceError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                partial: Vec::new(),
                error,
                credentials: true,
            }
        }
    }

    #[async_trait]
    impl Backend for FlakyBackend {
        fn label(&self) -> String {
            "Flaky: test".to_string()
        }

        fn has_credentials(&self) -> bool {
            self.credentials
        }

        async fn stream(
            &self,
            _prompt: &str,
            _policy: &RetryPolicy,
            sink: &mut dyn FragmentSink,
        ) -> Result<(), SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                for piece in &self.partial {
                    sink.append(piece);
                }
                return Err((self.error)());
            }
            sink.append("hello ");
            sink.append("world");
            Ok(())
        }
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    fn timeout() -> SourceError {
        SourceError::Timeout(Duration::from_secs(1))
    }

    fn unauthorized() -> SourceError {
        SourceError::Service { status: 401, body: "bad key".to_string() }
    }

    #[tokio::test]
    async fn test_missing_credentials_yield_single_fragment() {
        let mut backend = FlakyBackend::new(0, timeout);
        backend.credentials = false;
        let source = RemoteSource::new(backend, quick_policy());

        let mut fragments: Vec<String> = Vec::new();
        source.produce("hi", &mut fragments).await.unwrap();

        assert_eq!(fragments, vec![SERVICE_UNAVAILABLE.to_string()]);
        assert_eq!(source.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_once_before_first_fragment() {
        let source = RemoteSource::new(FlakyBackend::new(1, timeout), quick_policy());

        let mut text = String::new();
        source.produce("hi", &mut text).await.unwrap();

        assert_eq!(text, "hello world");
        assert_eq!(source.backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_single_retry() {
        let source = RemoteSource::new(FlakyBackend::new(5, timeout), quick_policy());

        let mut text = String::new();
        let err = source.produce("hi", &mut text).await.unwrap_err();

        assert!(matches!(err, SourceError::Timeout(_)));
        assert_eq!(source.backend.calls.load(Ordering::SeqCst), 2);
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_no_retry_after_partial_delivery() {
        let mut backend = FlakyBackend::new(1, timeout);
        backend.partial = vec!["par", "tial"];
        let source = RemoteSource::new(backend, quick_policy());

        let mut fragments: Vec<String> = Vec::new();
        assert!(source.produce("hi", &mut fragments).await.is_err());

        // Already delivered text stays, nothing is replayed.
        assert_eq!(fragments, vec!["par".to_string(), "tial".to_string()]);
        assert_eq!(source.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_for_client_errors() {
        let source = RemoteSource::new(FlakyBackend::new(1, unauthorized), quick_policy());

        let mut text = String::new();
        let err = source.produce("hi", &mut text).await.unwrap_err();

        assert!(err.to_string().contains("401"));
        assert_eq!(source.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_line_buffer_reassembles_split_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(buf.push(b":1}\r\n\r\ndata: x"), vec!["data: {\"a\":1}".to_string(), String::new()]);
        assert_eq!(buf.finish(), Some("data: x".to_string()));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_line_buffer_keeps_multibyte_split_across_chunks() {
        let text = "wörld\n".as_bytes();
        let (head, tail) = text.split_at(2); // splits inside 'ö'
        let mut buf = LineBuffer::default();
        assert!(buf.push(head).is_empty());
        assert_eq!(buf.push(tail), vec!["wörld".to_string()]);
    }

    #[test]
    fn test_forward_line_skips_blank_and_stops_on_done() {
        let decode = |line: &str| -> Result<LineEvent, SourceError> {
            match line {
                "end" => Ok(LineEvent::Done),
                "noise" => Ok(LineEvent::Skip),
                other => Ok(LineEvent::Text(other.to_string())),
            }
        };
        let mut out: Vec<String> = Vec::new();
        assert!(!forward_line("  ", &mut out, &decode).unwrap());
        assert!(!forward_line("noise", &mut out, &decode).unwrap());
        assert!(!forward_line("abc", &mut out, &decode).unwrap());
        assert!(forward_line("end", &mut out, &decode).unwrap());
        assert_eq!(out, vec!["abc".to_string()]);
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        assert_eq!(excerpt("  short  ", 10), "short");
        assert_eq!(excerpt("abcdefghij", 4), "abcd...");
    }
}
