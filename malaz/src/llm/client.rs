//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless reasoning-engine client
///
/// Each call is independent: the caller supplies the whole message sequence
/// every time. The orchestrator treats a call as one opaque blocking step.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request and wait for the full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model identifier, for logging and `/state`
    fn model(&self) -> &str;
}

/// Scripted client for tests
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Returns canned responses in order and records every request it sees
    pub struct MockLlmClient {
        responses: Vec<CompletionResponse>,
        call_count: AtomicUsize,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            debug!(response_count = %responses.len(), "MockLlmClient::new: called");
            Self {
                responses,
                call_count: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Requests received so far, in call order
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            debug!("MockLlmClient::complete: called");
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.responses.get(idx).cloned().ok_or_else(|| {
                debug!(%idx, "MockLlmClient::complete: no more mock responses");
                LlmError::InvalidResponse("No more mock responses".to_string())
            })
        }

        fn model(&self) -> &str {
            "mock-model"
        }
    }

}
