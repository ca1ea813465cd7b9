use crate::common::AnnotatedFrame;
use crate::error::BroadcastError;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub enum BroadcastCommand {
    Subscribe {
        id: Uuid,
        frame_tx: mpsc::Sender<Arc<AnnotatedFrame>>,
        responder: oneshot::Sender<()>,
    },
    Unsubscribe {
        id: Uuid,
        responder: oneshot::Sender<()>,
    },
    Publish {
        frame: Arc<AnnotatedFrame>,
    },
    SubscriberCount {
        responder: oneshot::Sender<usize>,
    },
}

struct SubscriberEntry {
    id: Uuid,
    frame_tx: mpsc::Sender<Arc<AnnotatedFrame>>,
}

/// Owns the live subscriber set. All mutation happens on this one task,
/// so a broadcast pass always iterates a consistent set even while
/// subscribers come and go.
pub struct Broadcaster {
    subscribers: Vec<SubscriberEntry>,
}

impl Broadcaster {
    /// Spawns the supervisor task and returns its handle. The task ends
    /// when every handle clone is dropped.
    pub fn spawn(command_buffer: usize) -> (JoinHandle<()>, BroadcasterHandle) {
        let (command_tx, mut command_rx) = mpsc::channel::<BroadcastCommand>(command_buffer);
        let task = tokio::spawn(async move {
            let mut broadcaster = Broadcaster {
                subscribers: Vec::new(),
            };
            while let Some(command) = command_rx.recv().await {
                broadcaster.handle_command(command);
            }
            debug!("broadcaster supervisor finished");
        });
        (task, BroadcasterHandle { command_tx })
    }

    fn handle_command(&mut self, command: BroadcastCommand) {
        match command {
            BroadcastCommand::Subscribe {
                id,
                frame_tx,
                responder,
            } => {
                info!("Subscriber {} joined", id);
                self.subscribers.push(SubscriberEntry { id, frame_tx });
                let _ = responder.send(());
            }
            BroadcastCommand::Unsubscribe { id, responder } => {
                info!("Subscriber {} left", id);
                self.subscribers.retain(|entry| entry.id != id);
                let _ = responder.send(());
            }
            BroadcastCommand::Publish { frame } => self.publish(frame),
            BroadcastCommand::SubscriberCount { responder } => {
                let _ = responder.send(self.subscribers.len());
            }
        }
    }

    /// Best-effort, at-most-once delivery. `try_send` never waits on a
    /// subscriber's transport; a full or closed channel drops that
    /// subscriber for good, and nobody else is delayed.
    fn publish(&mut self, frame: Arc<AnnotatedFrame>) {
        let mut dropped = Vec::new();
        for entry in &self.subscribers {
            if entry.frame_tx.try_send(frame.clone()).is_err() {
                dropped.push(entry.id);
            }
        }
        for id in dropped {
            warn!("Dropping slow or disconnected subscriber {}", id);
            self.subscribers.retain(|entry| entry.id != id);
        }
    }
}

#[derive(Clone)]
pub struct BroadcasterHandle {
    command_tx: mpsc::Sender<BroadcastCommand>,
}

impl BroadcasterHandle {
    pub async fn subscribe(
        &self,
        frame_tx: mpsc::Sender<Arc<AnnotatedFrame>>,
    ) -> Result<Uuid, BroadcastError> {
        let id = Uuid::new_v4();
        let (responder, response_rx) = oneshot::channel();
        self.command_tx
            .send(BroadcastCommand::Subscribe {
                id,
                frame_tx,
                responder,
            })
            .await
            .map_err(|_| BroadcastError::SupervisorGone)?;
        response_rx
            .await
            .map_err(|_| BroadcastError::SupervisorGone)?;
        Ok(id)
    }

    pub async fn unsubscribe(&self, id: Uuid) -> Result<(), BroadcastError> {
        let (responder, response_rx) = oneshot::channel();
        self.command_tx
            .send(BroadcastCommand::Unsubscribe { id, responder })
            .await
            .map_err(|_| BroadcastError::SupervisorGone)?;
        response_rx
            .await
            .map_err(|_| BroadcastError::SupervisorGone)
    }

    pub async fn publish(&self, frame: Arc<AnnotatedFrame>) -> Result<(), BroadcastError> {
        self.command_tx
            .send(BroadcastCommand::Publish { frame })
            .await
            .map_err(|_| BroadcastError::SupervisorGone)
    }

    pub async fn subscriber_count(&self) -> Result<usize, BroadcastError> {
        let (responder, response_rx) = oneshot::channel();
        self.command_tx
            .send(BroadcastCommand::SubscriberCount { responder })
            .await
            .map_err(|_| BroadcastError::SupervisorGone)?;
        response_rx
            .await
            .map_err(|_| BroadcastError::SupervisorGone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_subscriber_is_dropped_and_others_receive_every_frame() {
        let (_task, handle) = Broadcaster::spawn(64);

        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, mut rx_b) = mpsc::channel(16);
        // capacity 1 and never drained: second publish fails its try_send
        let (tx_slow, slow_rx) = mpsc::channel(1);

        handle.subscribe(tx_a).await.unwrap();
        handle.subscribe(tx_b).await.unwrap();
        handle.subscribe(tx_slow).await.unwrap();
        assert_eq!(handle.subscriber_count().await.unwrap(), 3);

        for i in 0..5u8 {
            handle
                .publish(AnnotatedFrame::new(vec![i], i as usize))
                .await
                .unwrap();
        }
        // flush: wait until the supervisor processed all publishes
        assert_eq!(handle.subscriber_count().await.unwrap(), 2);

        for i in 0..5u8 {
            assert_eq!(rx_a.recv().await.unwrap().jpeg, vec![i]);
            assert_eq!(rx_b.recv().await.unwrap().jpeg, vec![i]);
        }
        drop(slow_rx);
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_reappear() {
        let (_task, handle) = Broadcaster::spawn(64);
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        handle.subscribe(tx).await.unwrap();

        handle
            .publish(AnnotatedFrame::new(vec![1], 0))
            .await
            .unwrap();
        assert_eq!(handle.subscriber_count().await.unwrap(), 0);

        handle
            .publish(AnnotatedFrame::new(vec![2], 0))
            .await
            .unwrap();
        assert_eq!(handle.subscriber_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn explicit_unsubscribe_removes_entry() {
        let (_task, handle) = Broadcaster::spawn(64);
        let (tx, _rx) = mpsc::channel(16);
        let id = handle.subscribe(tx).await.unwrap();
        assert_eq!(handle.subscriber_count().await.unwrap(), 1);
        handle.unsubscribe(id).await.unwrap();
        assert_eq!(handle.subscriber_count().await.unwrap(), 0);
    }
}
