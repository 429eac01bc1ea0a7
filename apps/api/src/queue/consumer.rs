//! Queue Consumer — worker slots pulling descriptors and driving the
//! orchestrator.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::evaluation::pipeline::EvaluationPipeline;
use crate::queue::{JobTransport, TransportError};

/// Spawns `slots` independent worker tasks. Each slot processes one job at a
/// time; slots run concurrently with no shared mutable stage state.
pub fn spawn_workers(
    slots: usize,
    transport: Arc<dyn JobTransport>,
    pipeline: Arc<EvaluationPipeline>,
) -> Vec<JoinHandle<()>> {
    assert!(slots > 0, "worker slots must be > 0");
    info!("Starting {slots} evaluation worker slots");

    (0..slots)
        .map(|slot| {
            let transport = Arc::clone(&transport);
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                worker_loop(slot, transport, pipeline).await;
            })
        })
        .collect()
}

async fn worker_loop(
    slot: usize,
    transport: Arc<dyn JobTransport>,
    pipeline: Arc<EvaluationPipeline>,
) {
    debug!("Worker slot {slot} started");
    loop {
        match transport.dequeue().await {
            Ok(Some(delivery)) => {
                debug!(
                    "Worker slot {slot} picked up job {}",
                    delivery.descriptor.job_id
                );
                // run() catches every stage failure, so the descriptor is
                // acknowledged whether the job completed or failed.
                pipeline.run(&delivery.descriptor).await;
                if let Err(e) = transport.ack(&delivery).await {
                    error!(
                        "Worker slot {slot} could not ack job {}: {e}",
                        delivery.descriptor.job_id
                    );
                }
            }
            Ok(None) => continue,
            Err(TransportError::Closed) => {
                debug!("Worker slot {slot} transport closed; exiting");
                break;
            }
            Err(e) => {
                error!("Worker slot {slot} dequeue failed: {e}");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}
