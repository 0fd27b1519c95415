//! Configuration for the producer side of the pipeline.

use std::time::Duration;

use crate::{rate_limited_warner::DEFAULT_WARN_INTERVAL, throttling::ThrottlingPolicy};

/// Default truncation length; zero keeps messages whole.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 0;

/// Settings owned by [`AsyncLogger`](super::AsyncLogger).
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub throttling: ThrottlingPolicy,
    /// Rendered messages longer than this many bytes are truncated.
    pub max_message_length: usize,
    /// Minimum gap between summaries of dropped records.
    pub warn_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            throttling: ThrottlingPolicy::default(),
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl PipelineConfig {
    pub fn with_throttling(mut self, throttling: ThrottlingPolicy) -> Self {
        self.throttling = throttling;
        self
    }

    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }
}
