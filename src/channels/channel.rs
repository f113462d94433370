//! Subscription lifecycle for the event stream.
//!
//! The transport rejects administrative commands while a `receive`
//! subscription is open. That rule is enforced through [`Quiescent`]: a
//! non-clonable token that only exists while no subscription is open.
//! Opening a subscription consumes the token, and closing one (or observing
//! it exit) hands it back. Every action-issuing call takes `&Quiescent`.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::channels::Envelope;
use crate::error::ChannelError;

/// stderr fragments that mean another process holds the account lock.
const LOCK_CONFLICT_SIGNATURES: &[&str] = &[
    "LockException",
    "Config file is in use by another instance",
];

/// stderr lines kept for diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// How long a subscription whose stream ended may take to exit.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Proof that no subscription is currently open.
#[derive(Debug)]
pub struct Quiescent {
    _private: (),
}

impl Quiescent {
    /// Minted at startup and whenever an [`OpenSubscription`] is consumed.
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Incremental scan of a subscription's stderr.
///
/// Keeps only the lock-conflict verdict and a short tail, so a process that
/// logs for days holds a fixed amount of memory.
#[derive(Debug, Clone, Default)]
pub struct StderrWatch {
    lock_conflict: bool,
    tail: VecDeque<String>,
}

impl StderrWatch {
    pub fn observe(&mut self, line: &str) {
        if !self.lock_conflict {
            self.lock_conflict = LOCK_CONFLICT_SIGNATURES
                .iter()
                .any(|sig| line.contains(sig));
        }
        if self.tail.len() == STDERR_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }

    pub fn into_exit(self, code: Option<i32>) -> SubscriptionExit {
        SubscriptionExit {
            code,
            lock_conflict: self.lock_conflict,
            stderr_tail: Vec::from(self.tail).join("\n"),
        }
    }
}

/// How a subscription ended when it exited on its own.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionExit {
    /// Process exit code, if it exited normally.
    pub code: Option<i32>,
    /// Whether any stderr line carried a lock-conflict signature.
    pub lock_conflict: bool,
    /// Last few stderr lines.
    pub stderr_tail: String,
}

impl SubscriptionExit {
    /// Build from a complete stderr capture.
    pub fn from_stderr(code: Option<i32>, stderr: &str) -> Self {
        let mut watch = StderrWatch::default();
        for line in stderr.lines() {
            watch.observe(line);
        }
        watch.into_exit(code)
    }

    /// Whether the subscription died because the account state is locked.
    pub fn is_lock_conflict(&self) -> bool {
        self.lock_conflict
    }
}

/// A live stream of raw event lines.
#[async_trait]
pub trait Subscription: Send {
    /// Next raw line. `Ok(None)` once the stream has ended.
    ///
    /// Lines that are not valid UTF-8 are dropped by the implementation. An
    /// error means the stream is broken while the process may still run.
    async fn next_line(&mut self) -> Result<Option<String>, ChannelError>;

    /// Stop the subscription and wait until it has fully exited.
    async fn terminate(&mut self);

    /// Wait for a subscription whose stream already ended.
    async fn wait_exit(&mut self) -> SubscriptionExit;
}

/// Source of event-stream subscriptions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name (for logging).
    fn name(&self) -> &str;

    /// Open a new subscription.
    async fn subscribe(&self) -> Result<Box<dyn Subscription>, ChannelError>;
}

/// An open subscription. Must be consumed to get a [`Quiescent`] back.
pub struct OpenSubscription {
    inner: Box<dyn Subscription>,
}

impl OpenSubscription {
    /// Open a subscription, consuming the idle token.
    ///
    /// On failure the token is returned alongside the error.
    pub async fn open(
        transport: &dyn Transport,
        idle: Quiescent,
    ) -> Result<Self, (ChannelError, Quiescent)> {
        match transport.subscribe().await {
            Ok(inner) => {
                debug!(transport = transport.name(), "Subscription opened");
                drop(idle);
                Ok(Self { inner })
            }
            Err(e) => Err((e, idle)),
        }
    }

    /// Next decodable envelope. Undecodable lines are skipped.
    ///
    /// `Ok(None)` when the stream ends. A read error is returned so the caller
    /// can [`close`](Self::close) the still-running subscription.
    pub async fn next_envelope(&mut self) -> Result<Option<Envelope>, ChannelError> {
        loop {
            let Some(line) = self.inner.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            match Envelope::parse(&line) {
                Ok(envelope) => return Ok(Some(envelope)),
                Err(e) => debug!("Dropping undecodable line: {e}"),
            }
        }
    }

    /// Stop the subscription and wait for it to exit.
    pub async fn close(mut self) -> Quiescent {
        self.inner.terminate().await;
        debug!("Subscription closed");
        Quiescent::new()
    }

    /// Collect exit diagnostics after the stream ended on its own.
    ///
    /// A process that keeps running after closing its stream is stopped once
    /// the grace period runs out.
    pub async fn finish(mut self) -> (SubscriptionExit, Quiescent) {
        let exit = match tokio::time::timeout(EXIT_GRACE, self.inner.wait_exit()).await {
            Ok(exit) => exit,
            Err(_) => {
                warn!("Subscription stream ended but the process kept running, stopping it");
                self.inner.terminate().await;
                SubscriptionExit::default()
            }
        };
        debug!(code = ?exit.code, "Subscription exited");
        (exit, Quiescent::new())
    }
}
