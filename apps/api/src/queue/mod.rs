//! Job-queue transport — at-least-once delivery of job descriptors.
//!
//! The pipeline only needs three operations from the transport: enqueue,
//! dequeue, acknowledge. A descriptor is acknowledged only after the
//! orchestrator returns, so an uncaught crash mid-run leaves it
//! re-deliverable.

pub mod consumer;

use async_trait::async_trait;
use redis::{AsyncCommands, Direction};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::info;

use crate::models::job::JobDescriptor;

/// How long a dequeue blocks before yielding control back to the worker loop.
const DEQUEUE_BLOCK_SECS: f64 = 5.0;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("bad descriptor payload: {0}")]
    Payload(String),

    #[error("transport closed")]
    Closed,
}

/// A dequeued descriptor plus the raw payload the transport needs back for
/// acknowledgment.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub descriptor: JobDescriptor,
    payload: String,
}

#[async_trait]
pub trait JobTransport: Send + Sync {
    async fn enqueue(&self, descriptor: &JobDescriptor) -> Result<(), TransportError>;

    /// Blocks briefly; `None` means no work arrived in the window.
    async fn dequeue(&self) -> Result<Option<Delivery>, TransportError>;

    /// Removes the delivery from the pending side of the transport. Called
    /// after the orchestrator returns, success or caught failure alike.
    async fn ack(&self, delivery: &Delivery) -> Result<(), TransportError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Redis transport
// ────────────────────────────────────────────────────────────────────────────

/// Redis-list transport: `LPUSH` onto a pending list, blocking `BLMOVE` into
/// an in-flight list on dequeue, `LREM` from in-flight on ack. A worker crash
/// between dequeue and ack leaves the payload in the in-flight list, where
/// `recover` returns it to pending on the next startup.
pub struct RedisTransport {
    client: redis::Client,
    pending_key: String,
    in_flight_key: String,
}

impl RedisTransport {
    pub fn new(client: redis::Client, queue_name: &str) -> Self {
        Self {
            client,
            pending_key: format!("{queue_name}:pending"),
            in_flight_key: format!("{queue_name}:in_flight"),
        }
    }

    /// Moves any descriptors left in-flight by a previous crashed process
    /// back to the pending list. Call once at startup, before workers spawn.
    pub async fn recover(&self) -> Result<usize, TransportError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let mut recovered = 0usize;
        loop {
            let moved: Option<String> = con
                .lmove(
                    &self.in_flight_key,
                    &self.pending_key,
                    Direction::Right,
                    Direction::Left,
                )
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        if recovered > 0 {
            info!("Recovered {recovered} in-flight jobs back to the pending queue");
        }
        Ok(recovered)
    }
}

#[async_trait]
impl JobTransport for RedisTransport {
    async fn enqueue(&self, descriptor: &JobDescriptor) -> Result<(), TransportError> {
        let payload = serde_json::to_string(descriptor)
            .map_err(|e| TransportError::Payload(e.to_string()))?;
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.lpush::<_, _, ()>(&self.pending_key, payload).await?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Delivery>, TransportError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = con
            .blmove(
                &self.pending_key,
                &self.in_flight_key,
                Direction::Right,
                Direction::Left,
                DEQUEUE_BLOCK_SECS,
            )
            .await?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str::<JobDescriptor>(&payload) {
            Ok(descriptor) => Ok(Some(Delivery {
                descriptor,
                payload,
            })),
            Err(e) => {
                // Drop the poison payload so it cannot wedge the queue.
                con.lrem::<_, _, ()>(&self.in_flight_key, 1, &payload).await?;
                Err(TransportError::Payload(e.to_string()))
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), TransportError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.lrem::<_, _, ()>(&self.in_flight_key, 1, &delivery.payload)
            .await?;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-process channel transport
// ────────────────────────────────────────────────────────────────────────────

/// In-process transport over a tokio channel. No redelivery semantics; used
/// by tests and single-process local runs.
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<JobDescriptor>,
    receiver: Mutex<mpsc::UnboundedReceiver<JobDescriptor>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobTransport for ChannelTransport {
    async fn enqueue(&self, descriptor: &JobDescriptor) -> Result<(), TransportError> {
        self.sender
            .send(descriptor.clone())
            .map_err(|_| TransportError::Closed)
    }

    async fn dequeue(&self) -> Result<Option<Delivery>, TransportError> {
        let mut receiver = self.receiver.lock().await;
        let wait = tokio::time::timeout(std::time::Duration::from_millis(200), receiver.recv());
        match wait.await {
            Ok(Some(descriptor)) => {
                let payload = serde_json::to_string(&descriptor)
                    .map_err(|e| TransportError::Payload(e.to_string()))?;
                Ok(Some(Delivery {
                    descriptor,
                    payload,
                }))
            }
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Ok(None),
        }
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<(), TransportError> {
        Ok(())
    }
}
