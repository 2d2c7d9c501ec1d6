//! Engine conditions
//!
//! Readiness gates bound to specific engine events.

use std::time::Duration;

use crate::error::Result;

use super::readiness::{Outcome, ReadinessGate};

/// Result of the engine parsing media metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedStatus {
    Skipped,
    Failed,
    Timeout,
    Done,
}

/// Ready once the engine reports the media parsed, failed for any other status.
#[derive(Clone, Default)]
pub struct ParsedCondition {
    gate: ReadinessGate<(), ParsedStatus>,
}

impl ParsedCondition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the engine's parsed-status event into the condition
    pub fn media_parsed_changed(&self, status: ParsedStatus) {
        match status {
            ParsedStatus::Done => self.gate.signal_ready(()),
            other => self.gate.signal_failed(other),
        };
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<Outcome<(), ParsedStatus>> {
        self.gate.wait_timeout(timeout)
    }

    pub fn gate(&self) -> &ReadinessGate<(), ParsedStatus> {
        &self.gate
    }
}
