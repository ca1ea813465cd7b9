use crate::context::ServerContext;
use crate::error::{AppError, BroadcastError, NetworkError};
use crate::relay::FramedWriter;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Server-to-client video channel. Every accepted connection becomes a
/// broadcaster subscriber with its own bounded queue and writer task.
pub struct VideoServer {
    listener: TcpListener,
    context: Arc<ServerContext>,
    cancel: CancellationToken,
    subscriber_buffer: usize,
}

impl VideoServer {
    pub async fn bind(
        address: &str,
        port: u16,
        context: Arc<ServerContext>,
        cancel: CancellationToken,
        subscriber_buffer: usize,
    ) -> Result<Self, AppError> {
        let listener = TcpListener::bind(format!("{}:{}", address, port))
            .await
            .map_err(|e| NetworkError::Bind(e, port))?;
        Ok(Self {
            listener,
            context,
            cancel,
            subscriber_buffer,
        })
    }

    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub async fn run(self) -> Result<(), AppError> {
        info!("Video channel accepting subscribers");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!("Subscriber connected from {}", peer);
                            if let Err(e) = self.attach_subscriber(stream).await {
                                error!("Failed to attach subscriber: {}", e);
                            }
                        }
                        Err(e) => error!("{}", NetworkError::Accept(e)),
                    }
                }
            }
        }
        info!("Video channel stopped");
        Ok(())
    }

    async fn attach_subscriber(&self, stream: TcpStream) -> Result<(), BroadcastError> {
        let (frame_tx, mut frame_rx) = mpsc::channel(self.subscriber_buffer);
        let id = self.context.broadcaster.subscribe(frame_tx).await?;
        let broadcaster = self.context.broadcaster.clone();
        let cancel = self.cancel.clone();
        // late joiners get the most recent frame straight away
        let initial = self.context.state.current_frame();

        tokio::spawn(async move {
            let mut writer = FramedWriter::new(stream);
            if let Some(frame) = initial {
                if writer.write_frame(&frame.jpeg).await.is_err() {
                    let _ = broadcaster.unsubscribe(id).await;
                    return;
                }
            }
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = frame_rx.recv() => {
                        match next {
                            Some(frame) => {
                                if let Err(e) = writer.write_frame(&frame.jpeg).await {
                                    debug!("Subscriber {} write failed: {}", id, e);
                                    break;
                                }
                            }
                            // the broadcaster already dropped us
                            None => break,
                        }
                    }
                }
            }
            let _ = broadcaster.unsubscribe(id).await;
            debug!("Subscriber {} writer finished", id);
        });
        Ok(())
    }
}
