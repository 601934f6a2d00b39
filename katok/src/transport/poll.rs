//! Interval polling of a room's full history.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::Result;
use crate::models::{MessagePayload, RoomId};

/// Polling configuration.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
        }
    }
}

/// Where polled history comes from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, room: RoomId) -> Result<Vec<MessagePayload>>;
}

#[async_trait]
impl HistorySource for crate::KatokClient {
    async fn fetch_history(&self, room: RoomId) -> Result<Vec<MessagePayload>> {
        self.messages().all(room).await
    }
}

/// Count of sends currently awaiting the server.
///
/// Polling skips while this is non-zero so a fetch taken mid-send cannot
/// race the optimistic entry.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a send as started until the guard drops.
    pub fn enter(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(self.0.clone())
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A running poll loop. Stops when dropped.
#[derive(Debug)]
pub struct Poller {
    room: RoomId,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling `room`, handing every fetched batch to `on_batch`.
    ///
    /// Ticks that land while a send is in flight are skipped, as are results
    /// of fetches during which a send started. Returning
    /// `ControlFlow::Break` from `on_batch` ends the loop.
    pub fn start<S, F>(
        source: Arc<S>,
        room: RoomId,
        config: PollConfig,
        in_flight: InFlight,
        mut on_batch: F,
    ) -> Self
    where
        S: HistorySource + ?Sized + 'static,
        F: FnMut(Vec<MessagePayload>) -> ControlFlow<()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + config.interval, config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            log::debug!("Polling room {} every {:?}", room, config.interval);

            loop {
                ticker.tick().await;
                if in_flight.is_busy() {
                    log::trace!("Send in flight; skipping poll of room {}", room);
                    continue;
                }

                let batch = match source.fetch_history(room).await {
                    Ok(batch) => batch,
                    Err(e) => {
                        log::warn!("Poll of room {} failed: {}", room, e);
                        continue;
                    }
                };

                if in_flight.is_busy() {
                    continue;
                }
                if on_batch(batch).is_break() {
                    break;
                }
            }
        });

        Self {
            room,
            handle: Some(handle),
        }
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop. An in-progress fetch is abandoned.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::debug!("Stopped polling room {}", self.room);
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HistorySource for Counting {
        async fn fetch_history(&self, room: RoomId) -> Result<Vec<MessagePayload>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as i64;
            Ok(vec![MessagePayload {
                id: MessageId(n + 1),
                chat_room_id: room,
                content: "x".into(),
                ..Default::default()
            }])
        }
    }

    fn fast() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_poller_delivers_batches_until_break() {
        let source = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut seen = 0;
        let poller = Poller::start(source, RoomId(1), fast(), InFlight::new(), move |batch| {
            let _ = tx.send(batch);
            seen += 1;
            if seen == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        for _ in 0..3 {
            let batch = time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
            assert_eq!(batch.len(), 1);
        }
        // Loop ended; the sender was dropped with the closure.
        assert!(time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().is_none());
        time::sleep(Duration::from_millis(20)).await;
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_poller_skips_while_send_in_flight() {
        let source = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let in_flight = InFlight::new();
        let guard = in_flight.enter();
        let delivered = Arc::new(Mutex::new(0usize));
        let counter = delivered.clone();

        let mut poller = Poller::start(source.clone(), RoomId(1), fast(), in_flight.clone(), move |_| {
            *counter.lock().unwrap() += 1;
            ControlFlow::Continue(())
        });

        time::sleep(Duration::from_millis(80)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*delivered.lock().unwrap(), 0);

        drop(guard);
        time::sleep(Duration::from_millis(80)).await;
        assert!(*delivered.lock().unwrap() > 0);

        poller.stop();
        assert!(!poller.is_running());
    }
}
