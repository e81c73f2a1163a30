// src/runners/scripted.rs

//! Fixture-backed simulator runner.
//!
//! `ScriptedRunner` does NOT execute code. It answers each run from a Rust
//! closure, which makes the engine, grader and scoring testable without a
//! Node/Python/JDK/C++ toolchain installed. It must never be registered in
//! place of a real runner for user-facing grading.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{RawRunResult, Runner};

type Script = dyn Fn(&str, Option<&str>) -> RawRunResult + Send + Sync;

pub struct ScriptedRunner {
    language: String,
    script: Box<Script>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedRunner {
    pub fn new<F>(language: &str, script: F) -> Self
    where
        F: Fn(&str, Option<&str>) -> RawRunResult + Send + Sync + 'static,
    {
        Self {
            language: language.to_string(),
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Prints its input back unchanged.
    pub fn echo(language: &str) -> Self {
        Self::new(language, |_, input| {
            RawRunResult::completed(input.unwrap_or_default(), "", 0)
        })
    }

    /// Never finishes on its own.
    pub fn hang(language: &str) -> Self {
        Self::echo(language).with_delay(Duration::from_secs(24 * 60 * 60))
    }

    /// Simulated run time. A delay longer than the timeout yields a
    /// timed-out result once the timeout has elapsed.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared invocation counter.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Runner for ScriptedRunner {
    fn language(&self) -> &str {
        &self.language
    }

    async fn run(&self, code: &str, input: Option<&str>, timeout: Duration) -> RawRunResult {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.delay > timeout {
            tokio::time::sleep(timeout).await;
            return RawRunResult::timed_out();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        (self.script)(code, input)
    }
}
