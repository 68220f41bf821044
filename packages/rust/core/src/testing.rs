//! Deterministic collaborators shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use linkscout_shared::Result;

use crate::generation::{CompletionRequest, TextGenerator};

type Script = dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync;

/// Answers every request with a closure over the request.
///
/// Tracks how many calls were made and the peak number in flight at once.
pub struct ScriptedGenerator {
    script: Box<Script>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.script)(request)
    }
}

/// True for scoring prompts, false for justification prompts.
pub fn is_scoring(request: &CompletionRequest) -> bool {
    request
        .system_prompt
        .as_deref()
        .is_some_and(|s| s.contains("should_include"))
}

/// Value of a `- key: value` context line in a structured prompt.
pub fn context_value<'a>(request: &'a CompletionRequest, key: &str) -> Option<&'a str> {
    let prefix = format!("- {key}: ");
    request
        .prompt
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
}
