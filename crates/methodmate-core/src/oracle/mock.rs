//! Mock oracle for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{OracleClient, OracleError, OracleReply, OracleRequest, Purpose};

/// A configurable mock response for [`MockOracle`].
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum MockResponse {
    Answer(String),
    Refused,
    Timeout,
    Status(u16),
}

/// A hand-rolled mock implementing [`OracleClient`] for tests.
///
/// Returns a fixed response, or a sequence of responses (one per call,
/// repeating the last when exhausted). Every request is recorded so tests
/// can assert on call counts and prompt purposes.
pub struct MockOracle {
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    purposes: Mutex<Vec<Purpose>>,
    prompts: Mutex<Vec<String>>,
}

impl MockOracle {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
            purposes: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        responses.reverse();
        let fallback = responses.first().cloned().unwrap();
        Self {
            responses: Mutex::new(responses),
            ..Self::new(fallback)
        }
    }

    /// Set simulated latency per call.
    #[allow(dead_code)]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn answering(text: &str) -> Self {
        Self::new(MockResponse::Answer(text.to_string()))
    }

    /// How many times `ask()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Purposes of every request, in call order.
    pub fn purposes(&self) -> Vec<Purpose> {
        self.purposes.lock().unwrap().clone()
    }

    /// Number of calls made with the given purpose.
    pub fn calls_for(&self, purpose: Purpose) -> usize {
        self.purposes().iter().filter(|p| **p == purpose).count()
    }

    /// Prompts of every request, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_response(&self) -> MockResponse {
        let mut seq = self.responses.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl OracleClient for MockOracle {
    fn name(&self) -> &str {
        "Mock"
    }

    fn ask<'a>(
        &'a self,
        request: &'a OracleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<OracleReply, OracleError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.purposes.lock().unwrap().push(request.purpose);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match response {
                MockResponse::Answer(text) => Ok(OracleReply::classify(text)),
                MockResponse::Refused => Ok(OracleReply::Refused(
                    "I'm sorry, I cannot assist with that.".into(),
                )),
                MockResponse::Timeout => Err(OracleError::Timeout(Duration::from_secs(10))),
                MockResponse::Status(code) => Err(OracleError::Status(code)),
            }
        })
    }
}
