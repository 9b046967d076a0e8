//! Visual feedback hook
//!
//! Arenas tint their floor or bay to show how an episode went. The loop only
//! emits a [`Signal`]; what a sink does with it never feeds back into the loop.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::Outcome;

/// Discrete state signal for the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Success,
    Failure,
    Timeout,
}

impl Signal {
    pub fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Failure => Signal::Failure,
            Outcome::Success => Signal::Success,
            Outcome::Timeout => Signal::Timeout,
        }
    }

    /// Colour name the arenas use for this signal
    pub fn color(self) -> &'static str {
        match self {
            Signal::Success => "green",
            Signal::Failure => "red",
            Signal::Timeout => "yellow",
        }
    }
}

/// Receiver of feedback signals
pub trait FeedbackSink: Send {
    fn signal(&mut self, signal: Signal);
}

/// Discards every signal
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFeedback;

impl FeedbackSink for NullFeedback {
    fn signal(&mut self, _signal: Signal) {}
}

/// Keeps every signal; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct RecordingFeedback {
    signals: Arc<Mutex<Vec<Signal>>>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals received so far, oldest first
    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Signal> {
        self.signals.lock().ok().and_then(|log| log.last().copied())
    }
}

impl FeedbackSink for RecordingFeedback {
    fn signal(&mut self, signal: Signal) {
        if let Ok(mut log) = self.signals.lock() {
            log.push(signal);
        }
    }
}
