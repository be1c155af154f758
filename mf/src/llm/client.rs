//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent (fresh context)
///
/// Every synthesis request is a new single-turn conversation. No state is
/// carried between calls, so calls for different candidates can run in any
/// order or concurrently.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request and wait for the full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing::debug;

    type Responder = Box<dyn Fn(usize, &CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync>;
    type DelayFn = Box<dyn Fn(&CompletionRequest) -> Duration + Send + Sync>;

    /// Mock LLM client for unit tests
    ///
    /// Replies come from a responder closure that sees the call index and the
    /// request. Every request is recorded for later inspection.
    pub struct MockLlmClient {
        responder: Responder,
        delay: Option<DelayFn>,
        requests: Mutex<Vec<CompletionRequest>>,
        call_count: AtomicUsize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl MockLlmClient {
        /// Replay `responses` in call order, erroring once exhausted
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            debug!(response_count = %responses.len(), "MockLlmClient::new: called");
            Self::from_fn(move |idx, _| {
                responses
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| LlmError::InvalidResponse("No more mock responses".to_string()))
            })
        }

        pub fn from_fn<F>(responder: F) -> Self
        where
            F: Fn(usize, &CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync + 'static,
        {
            Self {
                responder: Box::new(responder),
                delay: None,
                requests: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }
        }

        /// Sleep before answering, for the duration computed from the request
        pub fn with_delay<F>(mut self, delay: F) -> Self
        where
            F: Fn(&CompletionRequest) -> Duration + Send + Sync + 'static,
        {
            self.delay = Some(Box::new(delay));
            self
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Highest number of calls observed running at once
        pub fn peak_in_flight(&self) -> usize {
            self.peak_in_flight.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            debug!("MockLlmClient::complete: called");
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = &self.delay {
                tokio::time::sleep(delay(&request)).await;
            }

            let reply = (self.responder)(idx, &request);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            reply
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn request() -> CompletionRequest {
            CompletionRequest::single_turn("Test", 50, 0.3)
        }

        #[tokio::test]
        async fn test_mock_client_returns_responses() {
            let client = MockLlmClient::new(vec![
                CompletionResponse::text("Response 1"),
                CompletionResponse::text("Response 2"),
            ]);

            let resp1 = client.complete(request()).await.unwrap();
            assert_eq!(resp1.content, Some("Response 1".to_string()));

            let resp2 = client.complete(request()).await.unwrap();
            assert_eq!(resp2.content, Some("Response 2".to_string()));

            assert_eq!(client.call_count(), 2);
            assert_eq!(client.requests().len(), 2);
            assert_eq!(client.peak_in_flight(), 1);
        }

        #[tokio::test]
        async fn test_mock_client_errors_when_exhausted() {
            let client = MockLlmClient::new(vec![]);
            assert!(client.complete(request()).await.is_err());
        }
    }
}
