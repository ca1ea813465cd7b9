use crate::codec;
use crate::common::{AnnotatedFrame, RawFrame};
use crate::context::ServerContext;
use crate::detect::{build_detector, draw, Detector};
use crate::error::{AppError, FrameError, NetworkError};
use crate::relay::framing::FramedReader;
use crate::state::FpsCounter;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    AwaitingCamera,
    Streaming,
    Draining,
    Stopped,
}

/// Owns the single inbound camera connection and drives the per-frame
/// pipeline: decode, analyze, publish, broadcast. Strictly one frame
/// at a time, in arrival order.
pub struct RelayServer {
    listener: TcpListener,
    context: Arc<ServerContext>,
    detector: Box<dyn Detector>,
    fps: FpsCounter,
    state_tx: watch::Sender<RelayState>,
    cancel: CancellationToken,
    max_frame_bytes: u32,
}

impl RelayServer {
    /// Binds the camera listener and builds the initial detector. Both
    /// failures are fatal at startup and nowhere else.
    pub async fn bind(
        address: &str,
        port: u16,
        context: Arc<ServerContext>,
        cancel: CancellationToken,
        max_frame_bytes: u32,
    ) -> Result<Self, AppError> {
        let listener = TcpListener::bind(format!("{}:{}", address, port))
            .await
            .map_err(|e| NetworkError::Bind(e, port))?;
        let detector = build_detector(context.pipeline_config().model)?;
        let (state_tx, _) = watch::channel(RelayState::Idle);
        Ok(Self {
            listener,
            context,
            detector,
            fps: FpsCounter::new(Instant::now()),
            state_tx,
            cancel,
            max_frame_bytes,
        })
    }

    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Observable state machine, mainly for supervision and tests.
    pub fn state_watch(&self) -> watch::Receiver<RelayState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: RelayState) {
        let _ = self.state_tx.send(state);
    }

    pub async fn run(mut self) -> Result<(), AppError> {
        self.set_state(RelayState::AwaitingCamera);
        info!("Awaiting camera connection");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!("Camera connected from {}", peer);
                            self.context.state.reset_metrics();
                            self.fps = FpsCounter::new(Instant::now());
                            self.set_state(RelayState::Streaming);
                            self.stream_session(stream).await;
                            self.set_state(RelayState::AwaitingCamera);
                            info!("Awaiting camera reconnect");
                        }
                        Err(e) => error!("{}", NetworkError::Accept(e)),
                    }
                }
            }
        }
        // in-flight frame work finished above; close everything we own
        self.set_state(RelayState::Draining);
        drop(self.listener);
        let _ = self.state_tx.send(RelayState::Stopped);
        info!("Relay server stopped");
        Ok(())
    }

    /// One camera session. Ends on disconnect, stream corruption or
    /// shutdown; subscribers outlive it either way.
    async fn stream_session(&mut self, stream: TcpStream) {
        let mut reader = FramedReader::new(stream, self.max_frame_bytes);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                second = self.listener.accept() => {
                    // one camera at a time; late arrivals are rejected
                    if let Ok((_, peer)) = second {
                        warn!("Rejecting camera connection from {}: a camera is already streaming", peer);
                    }
                }
                result = reader.read_frame() => {
                    match result {
                        Ok(payload) => self.process_frame(RawFrame::new(payload)).await,
                        Err(e @ FrameError::Oversized(..)) => {
                            // a bogus length prefix desyncs the stream
                            warn!("Dropping camera session: {}", e);
                            return;
                        }
                        Err(e) => {
                            info!("Camera disconnected: {}", e);
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn process_frame(&mut self, raw: RawFrame) {
        let image = match codec::decode(raw.bytes()) {
            Ok(image) => image,
            Err(e) => {
                warn!("Failed to decode image: {}", e);
                return;
            }
        };

        // swap in a reconfigured detector between frames, never mid-frame
        if let Some(detector) = self.context.take_pending_detector() {
            self.detector = detector;
        }
        let config = self.context.pipeline_config();
        if config.model != self.detector.kind() {
            // two control updates raced; rebuild to match the snapshot
            match build_detector(config.model) {
                Ok(detector) => self.detector = detector,
                Err(e) => error!("Failed to rebuild detector, keeping active variant: {}", e),
            }
        }

        let mut detections = self.detector.analyze(&image, &config);
        let fps = self.fps.tick(Instant::now());
        self.context.state.record_fps(fps);
        if config.overlay_fps {
            draw::fps_overlay(&mut detections.image, fps);
        }

        let jpeg = match codec::encode_jpeg(&detections.image) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!("Failed to encode frame: {}", e);
                return;
            }
        };
        let frame = AnnotatedFrame::new(jpeg, detections.count);
        self.context.state.publish(frame.clone());
        if let Err(e) = self.context.broadcaster.publish(frame).await {
            error!("Broadcast failed: {}", e);
        }
    }
}
