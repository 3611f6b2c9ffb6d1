// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Progress reporting sink.

use std::sync::Mutex;
use tracing::{error, info, warn};

/// Sink for progress and diagnostic messages of a deployment.
pub trait Reporter: Send + Sync {
    /// Report regular progress.
    fn info(&self, message: &str);

    /// Report recoverable problem.
    fn warn(&self, message: &str);

    /// Report failed item.
    fn error(&self, message: &str);
}

/// Reporter forwarding everything to [`tracing`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn warn(&self, message: &str) {
        warn!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}

/// Severity of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Reporter keeping every message in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingReporter {
    /// Construct new empty recording reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages recorded so far, oldest first.
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.lock().clone()
    }

    /// Messages of one severity recorded so far.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(recorded, _)| *recorded == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    fn record(&self, level: Level, message: &str) {
        self.lock().push((level, message.to_owned()));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Level, String)>> {
        // INVARIANT: Poisoning only means another recorder panicked mid-push.
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.record(Level::Error, message);
    }
}

impl<R> Reporter for &R
where
    R: Reporter + ?Sized,
{
    fn info(&self, message: &str) {
        (**self).info(message);
    }

    fn warn(&self, message: &str) {
        (**self).warn(message);
    }

    fn error(&self, message: &str) {
        (**self).error(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_messages_in_order() {
        let reporter = RecordingReporter::new();
        reporter.info("copied a");
        reporter.warn("left b");
        reporter.error("failed c");
        reporter.info("copied d");

        assert_eq!(
            reporter.messages(),
            vec![
                (Level::Info, "copied a".to_string()),
                (Level::Warn, "left b".to_string()),
                (Level::Error, "failed c".to_string()),
                (Level::Info, "copied d".to_string()),
            ]
        );
        assert_eq!(reporter.messages_at(Level::Info), vec!["copied a", "copied d"]);
    }
}
