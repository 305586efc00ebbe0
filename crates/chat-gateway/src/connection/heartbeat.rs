//! Heartbeat task
//!
//! Runs next to the read loop. The first beat goes out after a random
//! fraction of the interval, then one per interval. If the previous beat is
//! still unacknowledged when the next one is due the socket is a zombie:
//! the task claims the reconnect and signals the read loop.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::socket::Outbound;
use super::state::SessionShared;
use crate::protocol::GatewayMessage;

pub(crate) async fn run_heartbeat(
    interval: Duration,
    shared: Arc<SessionShared>,
    outbound: mpsc::Sender<Outbound>,
    zombie: oneshot::Sender<()>,
) {
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    let first = interval.mul_f64(jitter);
    tracing::debug!(
        interval_ms = interval.as_millis() as u64,
        first_ms = first.as_millis() as u64,
        "Heartbeat started"
    );

    tokio::time::sleep(first).await;
    loop {
        if !shared.heartbeat_sent() {
            if shared.state.begin_reconnect() {
                tracing::warn!("Heartbeat not acknowledged, connection is a zombie");
                let _ = zombie.send(());
            }
            return;
        }

        let seq = shared.sequence();
        tracing::trace!(seq = ?seq, "Sending heartbeat");
        if outbound
            .send(Outbound::Payload(GatewayMessage::heartbeat(seq)))
            .await
            .is_err()
        {
            // Writer gone, the read loop notices the dead socket itself
            return;
        }

        tokio::time::sleep(interval).await;
    }
}
