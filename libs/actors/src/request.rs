//! Retrying request/reply exchange
//!
//! A request is sent, then the exchange waits one attempt timeout for a
//! correlated reply. On timeout the same request is sent again, up to the
//! attempt budget. The exchange is a small state machine driven over a
//! [`RequestChannel`], which keeps the retry policy independent of sockets.
//!
//! ```text
//! Sending(1) ─▶ AwaitingReply(1) ─reply─▶ Succeeded
//!                     │
//!                  timeout, attempts left ─▶ Sending(2) ─▶ ...
//!                     │
//!                  timeout, none left ─▶ Exhausted
//! ```

use crate::error::ConnectorError;
use crate::messages::Reply;
use cap_transport::Envelope;
use std::time::Duration;
use tracing::debug;

/// Attempt count and per-attempt timeout for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    num_attempts: u32,
    attempt_timeout: Duration,
}

impl RetryBudget {
    pub fn new(num_attempts: u32, attempt_timeout: Duration) -> Result<Self, ConnectorError> {
        if num_attempts == 0 {
            return Err(ConnectorError::InvalidAttempts(num_attempts));
        }
        Ok(Self {
            num_attempts,
            attempt_timeout,
        })
    }

    pub fn num_attempts(&self) -> u32 {
        self.num_attempts
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Upper bound on how long an unanswered request blocks; `None` on overflow
    pub fn max_wait(&self) -> Option<Duration> {
        self.attempt_timeout.checked_mul(self.num_attempts)
    }
}

/// Where a request exchange stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeState {
    Sending { attempt: u32 },
    AwaitingReply { attempt: u32 },
    Succeeded(Reply),
    Exhausted,
}

impl ExchangeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Exhausted)
    }
}

/// Outbound request path and its reply inbox
pub trait RequestChannel {
    /// Publish the request; `attempt` counts from 1
    fn send_request(&mut self, attempt: u32) -> Result<(), ConnectorError>;

    /// Wait up to `timeout` for the reply; `None` on timeout
    fn await_reply(&mut self, timeout: Duration) -> Result<Option<Envelope>, ConnectorError>;
}

#[derive(Debug)]
pub struct RequestExchange {
    budget: RetryBudget,
    state: ExchangeState,
    attempts_sent: u32,
}

impl RequestExchange {
    pub fn new(budget: RetryBudget) -> Self {
        Self {
            budget,
            state: ExchangeState::Sending { attempt: 1 },
            attempts_sent: 0,
        }
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    pub fn attempts_sent(&self) -> u32 {
        self.attempts_sent
    }

    /// Advance by one transition; no-op once terminal
    pub fn step<C: RequestChannel>(&mut self, channel: &mut C) -> Result<(), ConnectorError> {
        let next = match &self.state {
            ExchangeState::Sending { attempt } => {
                let attempt = *attempt;
                channel.send_request(attempt)?;
                self.attempts_sent += 1;
                ExchangeState::AwaitingReply { attempt }
            }
            ExchangeState::AwaitingReply { attempt } => {
                let attempt = *attempt;
                match channel.await_reply(self.budget.attempt_timeout())? {
                    Some(envelope) => ExchangeState::Succeeded(Reply::from(envelope)),
                    None if attempt < self.budget.num_attempts() => {
                        debug!(
                            retry_count = attempt,
                            remaining = self.budget.num_attempts() - attempt,
                            "No response received, retrying"
                        );
                        ExchangeState::Sending {
                            attempt: attempt + 1,
                        }
                    }
                    None => ExchangeState::Exhausted,
                }
            }
            ExchangeState::Succeeded(_) | ExchangeState::Exhausted => return Ok(()),
        };
        self.state = next;
        Ok(())
    }

    /// Drive the exchange to completion
    ///
    /// `Ok(None)` means every attempt timed out. Channel errors abort the
    /// exchange immediately.
    pub fn run<C: RequestChannel>(mut self, channel: &mut C) -> Result<Option<Reply>, ConnectorError> {
        while !self.state.is_terminal() {
            self.step(channel)?;
        }
        match self.state {
            ExchangeState::Succeeded(reply) => Ok(Some(reply)),
            _ => Ok(None),
        }
    }
}
