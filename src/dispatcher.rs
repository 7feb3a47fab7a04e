//! Per-user ordered dispatch of inbound events.
//!
//! Every active user gets a FIFO mailbox drained by one worker task, so a
//! user's events are handled strictly in arrival order while different users
//! proceed concurrently. A worker retires after sitting idle; it removes its
//! mailbox under the same lock `dispatch()` sends under, so an event can't
//! land in a mailbox nobody drains.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};

use crate::channels::{Channel, EventStream, InboundEvent};
use crate::conversation::ConversationEngine;
use crate::store::UserId;

type Mailboxes = Arc<Mutex<HashMap<UserId, mpsc::UnboundedSender<InboundEvent>>>>;

/// Routes events from a channel to per-user workers.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<ConversationEngine>,
    channel: Arc<dyn Channel>,
    mailboxes: Mailboxes,
    worker_idle: Duration,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<ConversationEngine>,
        channel: Arc<dyn Channel>,
        worker_idle: Duration,
    ) -> Self {
        Self {
            engine,
            channel,
            mailboxes: Arc::new(Mutex::new(HashMap::new())),
            worker_idle,
        }
    }

    /// Number of users with a live worker.
    pub async fn active_workers(&self) -> usize {
        self.mailboxes.lock().await.len()
    }

    /// Queue `event` behind any earlier events from the same user.
    pub async fn dispatch(&self, event: InboundEvent) {
        let user_id = event.user_id;
        let mut mailboxes = self.mailboxes.lock().await;

        let event = match mailboxes.get(&user_id) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // Worker ended without deregistering; replace it.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(event).is_err() {
            return;
        }
        mailboxes.insert(user_id, tx);
        drop(mailboxes);

        tracing::debug!(user_id, "Spawning user worker");
        let worker = self.clone();
        tokio::spawn(async move { worker.drain(user_id, rx).await });
    }

    /// Feed every event from `events` into the mailboxes until the stream
    /// ends or Ctrl+C is received.
    pub async fn run(&self, mut events: EventStream) {
        tracing::info!(channel = self.channel.name(), "Dispatcher ready and listening");

        loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                event = events.next() => {
                    match event {
                        Some(e) => e,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };
            self.dispatch(event).await;
        }
    }

    async fn drain(&self, user_id: UserId, mut rx: mpsc::UnboundedReceiver<InboundEvent>) {
        loop {
            let event = match tokio::time::timeout(self.worker_idle, rx.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(_) => {
                    let mut mailboxes = self.mailboxes.lock().await;
                    match rx.try_recv() {
                        Ok(event) => event,
                        Err(_) => {
                            mailboxes.remove(&user_id);
                            tracing::debug!(user_id, "User worker retired");
                            break;
                        }
                    }
                }
            };
            self.process(&event).await;
        }
    }

    async fn process(&self, event: &InboundEvent) {
        let replies = self.engine.handle(event).await;
        if let Err(e) = self.channel.respond(event, replies).await {
            tracing::warn!(
                user_id = event.user_id,
                channel = %event.channel,
                error = %e,
                "Failed to deliver replies"
            );
        }
    }
}
