//! Periodic refresh for views that have no push channel.
//!
//! A poller owns one background task. It fetches immediately, then once per
//! interval, and publishes the latest snapshot on a watch channel. A failed
//! fetch is logged and retried on the next tick. The task exits when the feed
//! reports it has ended, when [`PollHandle::stop`] is called, or when the
//! handle is dropped.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One fetch result.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    /// No further changes will arrive; polling stops after this one.
    pub ended: bool,
}

pub trait Feed: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    fn fetch(&self) -> impl Future<Output = anyhow::Result<Snapshot<Self::Item>>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading,
    Live(Vec<T>),
    Ended(Vec<T>),
}

impl<T> ViewState<T> {
    pub fn items(&self) -> &[T] {
        match self {
            ViewState::Loading => &[],
            ViewState::Live(items) | ViewState::Ended(items) => items,
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, ViewState::Ended(_))
    }
}

pub struct PollHandle<T> {
    state: watch::Receiver<ViewState<T>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T: Clone> PollHandle<T> {
    /// Latest published state.
    pub fn state(&self) -> ViewState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<T>> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Cancel the task and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub fn spawn_poller<F: Feed>(feed: F, every: Duration) -> PollHandle<F::Item> {
    let (tx, rx) = watch::channel(ViewState::Loading);
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Poller cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let snapshot = tokio::select! {
                _ = token.cancelled() => break,
                res = feed.fetch() => res,
            };

            match snapshot {
                Ok(Snapshot { items, ended: true }) => {
                    let _ = tx.send(ViewState::Ended(items));
                    debug!("Feed ended, poller stopping");
                    break;
                }
                Ok(Snapshot { items, ended: false }) => {
                    let _ = tx.send(ViewState::Live(items));
                }
                Err(e) => warn!("Poll failed: {:#}", e),
            }
        }
    });

    PollHandle {
        state: rx,
        cancel,
        task: Some(task),
    }
}
