//! Listen loop: stream, pause, act, resume.
//!
//! The loop owns the only subscription to the event stream. When a join
//! request arrives it closes the subscription (the transport refuses
//! commands while one is open), runs the join pipeline to completion, then
//! opens a fresh subscription. Events are handled strictly one at a time in
//! stream order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::actions::ActionExecutor;
use crate::agent::setup::{ProfileSetup, SetupOutcome};
use crate::carrier::LineClassifier;
use crate::channels::{OpenSubscription, Quiescent, Transport};
use crate::config::BotConfig;
use crate::error::ChannelError;
use crate::pipeline::types::is_join_trigger;
use crate::pipeline::{JoinPipeline, JoinRequest};

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenStats {
    /// Subscriptions successfully opened.
    pub subscriptions: usize,
    /// Join requests run through the pipeline.
    pub joins_handled: usize,
    /// Spontaneous exits caused by a lock conflict.
    pub lock_conflicts: usize,
}

/// Why streaming stopped.
enum Step {
    Join(JoinRequest),
    Ended,
    Broken(ChannelError),
    Shutdown,
}

/// The bot's main loop.
pub struct ListenLoop {
    transport: Arc<dyn Transport>,
    executor: Arc<dyn ActionExecutor>,
    pipeline: JoinPipeline,
    setup: ProfileSetup,
    backoff: Duration,
}

impl ListenLoop {
    pub fn new(
        config: Arc<BotConfig>,
        transport: Arc<dyn Transport>,
        executor: Arc<dyn ActionExecutor>,
        classifier: Arc<dyn LineClassifier>,
    ) -> Self {
        let setup = ProfileSetup::from_config(&config);
        let backoff = config.lock_backoff;
        let pipeline = JoinPipeline::new(config, Arc::clone(&executor), classifier);
        Self {
            transport,
            executor,
            pipeline,
            setup,
            backoff,
        }
    }

    /// Run until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> ListenStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = ListenStats::default();
        let mut idle = Quiescent::new();

        match self.setup.ensure(&idle, self.executor.as_ref()).await {
            Ok(SetupOutcome::AlreadyConfigured) => {}
            Ok(outcome) => info!(?outcome, "Profile setup ran"),
            Err(e) => warn!("Profile setup incomplete: {e}"),
        }

        info!(transport = self.transport.name(), "Listening for join requests");

        loop {
            let mut subscription = match OpenSubscription::open(self.transport.as_ref(), idle).await
            {
                Ok(s) => s,
                Err((e, token)) => {
                    warn!("Failed to open subscription: {e}");
                    idle = token;
                    if self.wait_backoff(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };
            stats.subscriptions += 1;

            let step = tokio::select! {
                biased;
                _ = &mut shutdown => Step::Shutdown,
                step = next_step(&mut subscription) => step,
            };

            match step {
                Step::Shutdown => {
                    info!("Shutdown requested, stopping listener...");
                    subscription.close().await;
                    break;
                }
                Step::Join(request) => {
                    info!(source = %request.source, "Pausing listener to reply...");
                    idle = subscription.close().await;
                    let verdict = self.pipeline.handle(&idle, &request).await;
                    stats.joins_handled += 1;
                    info!(verdict = verdict.label(), "Resuming listener");
                }
                Step::Broken(e) => {
                    warn!("Subscription stream broken, restarting: {e}");
                    idle = subscription.close().await;
                    if self.wait_backoff(&mut shutdown).await {
                        break;
                    }
                }
                Step::Ended => {
                    let finished = tokio::select! {
                        biased;
                        _ = &mut shutdown => None,
                        finished = subscription.finish() => Some(finished),
                    };
                    let Some((exit, token)) = finished else {
                        info!("Shutdown requested while reaping subscription");
                        break;
                    };
                    idle = token;
                    if exit.is_lock_conflict() {
                        stats.lock_conflicts += 1;
                        warn!(
                            backoff_ms = self.backoff.as_millis() as u64,
                            "Account locked by another process, backing off"
                        );
                        if self.wait_backoff(&mut shutdown).await {
                            break;
                        }
                    } else {
                        info!(code = ?exit.code, "Subscription ended, reopening");
                    }
                }
            }
        }

        stats
    }

    /// Sleep for the backoff interval. Returns `true` if shutdown fired first.
    async fn wait_backoff<F>(&self, shutdown: &mut std::pin::Pin<&mut F>) -> bool
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = shutdown.as_mut() => {
                info!("Shutdown requested during backoff");
                true
            }
            _ = tokio::time::sleep(self.backoff) => false,
        }
    }
}

/// Read envelopes until a join request arrives or the stream ends.
async fn next_step(subscription: &mut OpenSubscription) -> Step {
    loop {
        let envelope = match subscription.next_envelope().await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return Step::Ended,
            Err(e) => return Step::Broken(e),
        };
        let Some(text) = envelope.text() else {
            continue;
        };
        info!(
            source = envelope.sender().unwrap_or("unknown"),
            text, "Message received"
        );

        if let Some(request) = JoinRequest::from_envelope(&envelope) {
            return Step::Join(request);
        }
        if is_join_trigger(text) {
            warn!("Join request without a sender identity, ignoring");
        }
    }
}
