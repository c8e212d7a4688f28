//! Pacing between upload attempts
//!
//! Keeps the batch under the services' write rate limits. The pacer is
//! awaited before every attempt; the first attempt never waits.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PacingPolicy {
    /// No delay between attempts
    None,
    /// At least `interval_ms` between the starts of consecutive attempts
    FixedInterval { interval_ms: u64 },
    /// Bursts of up to `capacity` attempts, one token regained every `refill_interval_ms`
    TokenBucket { capacity: u32, refill_interval_ms: u64 },
}

impl Default for PacingPolicy {
    fn default() -> Self {
        PacingPolicy::FixedInterval { interval_ms: 1000 }
    }
}

impl PacingPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            PacingPolicy::TokenBucket { capacity: 0, .. } => Err(ConfigError::InvalidValue {
                key: "pacing.capacity".to_string(),
                message: "token bucket capacity must be at least 1".to_string(),
            }),
            PacingPolicy::TokenBucket { refill_interval_ms: 0, .. } => Err(ConfigError::InvalidValue {
                key: "pacing.refill_interval_ms".to_string(),
                message: "refill interval must be at least 1 ms".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Stateful pacer for one batch run
#[derive(Debug)]
pub struct Pacer {
    state: PacerState,
}

#[derive(Debug)]
enum PacerState {
    Unpaced,
    Fixed {
        interval: Duration,
        last_start: Option<Instant>,
    },
    Bucket {
        capacity: u32,
        refill: Duration,
        tokens: u32,
        last_refill: Instant,
    },
}

impl Pacer {
    pub fn new(policy: &PacingPolicy) -> Self {
        let state = match *policy {
            PacingPolicy::None => PacerState::Unpaced,
            PacingPolicy::FixedInterval { interval_ms } => PacerState::Fixed {
                interval: Duration::from_millis(interval_ms),
                last_start: None,
            },
            PacingPolicy::TokenBucket { capacity, refill_interval_ms } => PacerState::Bucket {
                capacity,
                refill: Duration::from_millis(refill_interval_ms.max(1)),
                tokens: capacity,
                last_refill: Instant::now(),
            },
        };
        Self { state }
    }

    /// Wait until the next attempt is allowed to start.
    pub async fn ready(&mut self) {
        match &mut self.state {
            PacerState::Unpaced => {}
            PacerState::Fixed { interval, last_start } => {
                if let Some(last) = *last_start {
                    sleep_until(last + *interval).await;
                }
                *last_start = Some(Instant::now());
            }
            PacerState::Bucket {
                capacity,
                refill,
                tokens,
                last_refill,
            } => {
                refill_tokens(*capacity, *refill, tokens, last_refill);
                if *tokens == 0 {
                    sleep_until(*last_refill + *refill).await;
                    refill_tokens(*capacity, *refill, tokens, last_refill);
                }
                *tokens = tokens.saturating_sub(1);
            }
        }
    }
}

fn refill_tokens(capacity: u32, refill: Duration, tokens: &mut u32, last_refill: &mut Instant) {
    let now = Instant::now();
    let elapsed = now.saturating_duration_since(*last_refill);
    let gained = (elapsed.as_millis() / refill.as_millis().max(1)) as u32;
    if gained == 0 {
        return;
    }
    if tokens.saturating_add(gained) >= capacity {
        *tokens = capacity;
        *last_refill = now;
    } else {
        *tokens += gained;
        *last_refill += refill * gained;
    }
}
