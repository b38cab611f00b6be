//! Device-code polling loop.
//!
//! Runs detached from the request that started the device flow. The only
//! way its result reaches the rest of the system is the durable token store.
//!
//! ```text
//! Polling(i) --Pending--> Polling(i)
//! Polling(i) --SlowDown--> Polling(i + 5s)
//! Polling(i) --Granted--> Granted   (token persisted)
//! Polling(i) --Expired--> Expired
//! Polling(i) --Denied--> Denied
//! Polling(i) --UpstreamUnavailable--> Failed
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::device::{
    DEFAULT_POLL_INTERVAL_SECS, DeviceAuthorizationRequest, DeviceTokenExchanger,
    TokenExchangeOutcome,
};
use crate::token_store::SharedDurableStore;

/// Shortest wait between exchanges, whatever interval the provider announced.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS);

/// Interval increase mandated by a `slow_down` response.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// State of one device-code polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Waiting `interval` before the next exchange.
    Polling(Duration),
    /// Token granted and persisted.
    Granted,
    /// Device code expired (provider signal or caller deadline).
    Expired,
    /// User declined the authorization.
    Denied,
    /// Provider unreachable, unexpected response, or the token could not be persisted.
    Failed(String),
    /// Stopped through the cancellation token.
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling(_))
    }

    /// Transition on an exchange outcome, persistence aside.
    fn next(interval: Duration, outcome: TokenExchangeOutcome) -> Transition {
        match outcome {
            TokenExchangeOutcome::Pending => Transition::To(PollState::Polling(interval)),
            TokenExchangeOutcome::SlowDown => {
                Transition::To(PollState::Polling(interval + SLOW_DOWN_INCREMENT))
            }
            TokenExchangeOutcome::Granted(token) => Transition::Persist(token),
            TokenExchangeOutcome::Expired => Transition::To(PollState::Expired),
            TokenExchangeOutcome::Denied => Transition::To(PollState::Denied),
            TokenExchangeOutcome::UpstreamUnavailable(msg) => {
                Transition::To(PollState::Failed(msg))
            }
        }
    }
}

enum Transition {
    To(PollState),
    Persist(String),
}

/// Provider-paced polling for one device code.
pub struct DevicePollingLoop {
    exchanger: Arc<dyn DeviceTokenExchanger>,
    durable: SharedDurableStore,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl DevicePollingLoop {
    pub fn new(exchanger: Arc<dyn DeviceTokenExchanger>, durable: SharedDurableStore) -> Self {
        Self {
            exchanger,
            durable,
            deadline: None,
            cancellation: None,
        }
    }

    /// Stop with [`PollState::Expired`] once the next attempt would start after `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop with [`PollState::Cancelled`] when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Schedule the loop as a detached task.
    pub fn spawn(self, request: &DeviceAuthorizationRequest) -> JoinHandle<PollState> {
        let device_code = request.device_code.clone();
        let interval = Duration::from_secs(request.interval);
        tokio::spawn(async move { self.run(&device_code, interval).await })
    }

    /// Poll until a terminal state is reached.
    ///
    /// An `initial_interval` below [`MIN_POLL_INTERVAL`] is raised to it.
    pub async fn run(&self, device_code: &str, initial_interval: Duration) -> PollState {
        if initial_interval < MIN_POLL_INTERVAL {
            tracing::warn!(
                interval_secs = initial_interval.as_secs(),
                min_secs = MIN_POLL_INTERVAL.as_secs(),
                "Provider interval below minimum, raising it"
            );
        }
        let mut state = PollState::Polling(initial_interval.max(MIN_POLL_INTERVAL));
        let mut attempt: u32 = 0;

        while let PollState::Polling(interval) = state {
            if let Some(deadline) = self.deadline
                && Instant::now() + interval > deadline
            {
                tracing::info!(attempt, "Device code deadline reached");
                return PollState::Expired;
            }

            if !self.suspend(interval).await {
                tracing::info!(attempt, "Device code polling cancelled");
                return PollState::Cancelled;
            }

            attempt += 1;
            let outcome = self.exchanger.exchange_device_code(device_code).await;
            tracing::debug!(
                attempt,
                interval_secs = interval.as_secs(),
                ?outcome,
                "Device code exchange"
            );

            state = match PollState::next(interval, outcome) {
                Transition::To(next) => next,
                Transition::Persist(token) => match self.durable.save(&token).await {
                    Ok(()) => PollState::Granted,
                    Err(e) => PollState::Failed(e.to_string()),
                },
            };
        }

        match &state {
            PollState::Granted => tracing::info!(attempt, "Device authorization granted"),
            PollState::Failed(msg) => {
                tracing::error!(attempt, error = %msg, "Device authorization failed")
            }
            other => tracing::info!(attempt, state = ?other, "Device authorization ended"),
        }
        state
    }

    /// Non-blocking wait. Returns `false` if cancelled first.
    async fn suspend(&self, interval: Duration) -> bool {
        match &self.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => false,
                    _ = tokio::time::sleep(interval) => true,
                }
            }
            None => {
                tokio::time::sleep(interval).await;
                true
            }
        }
    }
}
