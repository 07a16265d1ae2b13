//! Asynchronous fetch pipeline: one task per missing tile
//!
//! Each task fetches and decodes its tile under a timeout, then delivers an
//! immutable [`FetchResult`] into a bounded channel. Delivery never blocks forever:
//! it races the shutdown signal and a send timeout, and a task that gives up clears
//! its own in-flight marker so the coordinate can be retried.

use crate::cache::{TileCache, TileImage, lock_cache};
use crate::config::Config;
use crate::coord::TileCoord;
use crate::map::TileEvents;
use crate::source::TileFetcher;
use crate::{Result, TileError};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc, watch};

/// Outcome of one fetch task
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub coord: TileCoord,
    pub outcome: Result<Arc<TileImage>>,
}

/// Process-wide stop flag, closed once and observed by every task
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the signal; returns `true` only for the call that actually closed it
    pub fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal is closed (immediately if it already is)
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the only way out is the flag turning true
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// Spawns fetch tasks and owns the sending half of the result channel
pub struct FetchPipeline<F> {
    fetcher: Arc<F>,
    runtime: Handle,
    cache: Arc<Mutex<TileCache>>,
    results: mpsc::Sender<FetchResult>,
    shutdown: ShutdownSignal,
    limiter: Option<Arc<Semaphore>>,
    fetch_timeout: Duration,
    delivery_timeout: Duration,
    events: Arc<dyn TileEvents>,
    abandoned: Arc<AtomicU64>,
}

impl<F: TileFetcher> FetchPipeline<F> {
    /// Create the pipeline and the receiving half of its result channel
    pub fn new(
        config: &Config,
        fetcher: Arc<F>,
        runtime: Handle,
        cache: Arc<Mutex<TileCache>>,
        events: Arc<dyn TileEvents>,
    ) -> (Self, mpsc::Receiver<FetchResult>) {
        let (results, rx) = mpsc::channel(config.result_channel_capacity.max(1));
        let pipeline = Self {
            fetcher,
            runtime,
            cache,
            results,
            shutdown: ShutdownSignal::new(),
            limiter: config
                .max_concurrent_fetches
                .map(|permits| Arc::new(Semaphore::new(permits.max(1)))),
            fetch_timeout: config.fetch_timeout,
            delivery_timeout: config.delivery_timeout,
            events,
            abandoned: Arc::new(AtomicU64::new(0)),
        };
        (pipeline, rx)
    }

    /// Spawn the fetch task for `coord`.
    ///
    /// The caller must already hold the in-flight marker for `coord`; from here on the
    /// task (or the drainer, once the result is delivered) is responsible for clearing it.
    pub fn launch(&self, coord: TileCoord) {
        let fetcher = self.fetcher.clone();
        let cache = self.cache.clone();
        let results = self.results.clone();
        let shutdown = self.shutdown.clone();
        let limiter = self.limiter.clone();
        let events = self.events.clone();
        let abandoned = self.abandoned.clone();
        let fetch_timeout = self.fetch_timeout;
        let delivery_timeout = self.delivery_timeout;

        self.runtime.spawn(async move {
            let outcome = AssertUnwindSafe(fetch_and_decode(
                &*fetcher,
                coord,
                limiter.as_deref(),
                fetch_timeout,
                &shutdown,
            ))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(TileError::InternalFault(panic_message(&*payload))));

            if let Err(TileError::InternalFault(reason)) = &outcome {
                tracing::error!("Fetch task for tile {} faulted: {}", coord, reason);
            }

            let result = FetchResult { coord, outcome };
            let delivery: std::result::Result<(), &str> = tokio::select! {
                biased;
                _ = shutdown.triggered() => Err("shutdown"),
                sent = results.send(result) => sent.map_err(|_| "result channel closed"),
                _ = tokio::time::sleep(delivery_timeout) => Err("delivery timed out"),
            };

            match delivery {
                Ok(()) => events.result_ready(coord),
                Err(reason) => {
                    // Nobody will drain this result; release the coordinate ourselves
                    abandoned.fetch_add(1, Ordering::SeqCst);
                    lock_cache(&cache).finish_fetch(&coord);
                    tracing::debug!("Abandoned delivery of tile {}: {}", coord, reason);
                }
            }
        });
    }

    /// Close the shutdown signal; returns `true` the first time only
    pub fn shutdown(&self) -> bool {
        self.shutdown.trigger()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_triggered()
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Number of results dropped because delivery was abandoned
    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::SeqCst)
    }
}

/// Fetch and decode one tile, bounded by the fetch timeout and cut short by shutdown.
///
/// Waiting for a concurrency permit does not count against the timeout.
async fn fetch_and_decode<F: TileFetcher>(
    fetcher: &F,
    coord: TileCoord,
    limiter: Option<&Semaphore>,
    fetch_timeout: Duration,
    shutdown: &ShutdownSignal,
) -> Result<Arc<TileImage>> {
    let work = async {
        let _permit = match limiter {
            Some(limiter) => Some(
                limiter
                    .acquire()
                    .await
                    .map_err(|_| TileError::cancelled("fetch limiter closed"))?,
            ),
            None => None,
        };

        let transfer = async {
            let bytes = fetcher.fetch(coord).await?;
            TileImage::decode(&bytes).map(Arc::new)
        };
        match tokio::time::timeout(fetch_timeout, transfer).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TileError::timeout(format!(
                "no tile within {} ms",
                fetch_timeout.as_millis()
            ))),
        }
    };

    tokio::select! {
        biased;
        _ = shutdown.triggered() => Err(TileError::cancelled("shutdown during fetch")),
        outcome = work => outcome,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_triggers_once() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());
        assert!(signal.clone().is_triggered());
    }

    #[tokio::test]
    async fn test_triggered_resolves_for_late_listeners() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        // Subscribing after the trigger still observes it
        tokio::time::timeout(Duration::from_secs(1), signal.triggered())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_triggered_wakes_waiters() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.triggered().await })
        };
        tokio::task::yield_now().await;
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*payload), "unknown panic payload");
    }
}
