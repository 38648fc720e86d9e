//! Background task that connects the engine to the sync queue.
//!
//! It receives `PersistRequest`s from engines over an mpsc channel, enqueues
//! them, and flushes:
//! - right after enqueueing, when online;
//! - when the connectivity signal flips from offline to online;
//! - when the earliest backoff deadline passes.

use crate::sync::outbox::PersistRequest;
use crate::sync::queue::SyncQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Capacity of the engine -> worker channel. Engines wait (still holding their
/// vote gate) when it is full.
pub const PERSIST_CHANNEL_CAPACITY: usize = 256;

pub struct SyncWorker {
    queue: Arc<SyncQueue>,
    requests: mpsc::Receiver<PersistRequest>,
    connectivity: watch::Receiver<bool>,
}

impl SyncWorker {
    pub fn new(
        queue: Arc<SyncQueue>,
        requests: mpsc::Receiver<PersistRequest>,
        connectivity: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            requests,
            connectivity,
        }
    }

    /// Spawn onto the current tokio runtime. The task ends once every request
    /// sender is dropped, after one last flush.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let initially_online = *self.connectivity.borrow_and_update();
        self.queue.set_online(initially_online);
        if initially_online {
            self.queue.flush().await;
        }

        let mut connectivity_open = true;
        loop {
            let online = self.queue.is_online();
            let retry_in = self.queue.next_retry_in().filter(|_| online);

            tokio::select! {
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    if let Err(e) = self.queue.enqueue(request.operation, request.payload) {
                        log::error!("Could not queue {:?} write: {}", request.operation, e);
                        continue;
                    }
                    if self.queue.is_online() {
                        self.queue.flush().await;
                    }
                }
                changed = self.connectivity.changed(), if connectivity_open => {
                    if changed.is_err() {
                        // signal source went away; keep the last known state
                        connectivity_open = false;
                        continue;
                    }
                    let now_online = *self.connectivity.borrow_and_update();
                    let was_online = self.queue.set_online(now_online);
                    if now_online && !was_online {
                        self.queue.flush().await;
                    }
                }
                _ = sleep_for(retry_in), if retry_in.is_some() => {
                    self.queue.flush().await;
                }
            }
        }

        if self.queue.is_online() {
            self.queue.flush().await;
        }
        log::info!("Sync worker stopped ({} entries pending)", self.queue.status().pending);
    }
}

async fn sleep_for(delay: Option<Duration>) {
    // a zero delay still yields so a permanently-due entry cannot spin the loop
    let delay = delay.unwrap_or(Duration::ZERO).max(Duration::from_millis(10));
    tokio::time::sleep(delay).await;
}
