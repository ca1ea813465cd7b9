use crate::broadcast::Broadcaster;
use crate::config::Configuration;
use crate::context::ServerContext;
use crate::control::ControlServer;
use crate::detect::{ModelKind, PipelineConfig};
use crate::error::AppError;
use crate::relay::{RelayServer, RelayState};
use crate::video::VideoServer;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Wires the three channels to one shared context and supervises their
/// tasks. Stopping cancels the token; every listener and session winds
/// down from there.
pub struct Coordinator {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    broadcaster_task: JoinHandle<()>,
    context: Arc<ServerContext>,
    relay_states: watch::Receiver<RelayState>,
    camera_addr: Option<SocketAddr>,
    video_addr: Option<SocketAddr>,
    control_addr: Option<SocketAddr>,
}

impl Coordinator {
    /// Binds every listener up front so a taken port fails the whole
    /// process at startup instead of surfacing later.
    pub async fn start(configuration: Configuration) -> Result<Self, AppError> {
        let model = ModelKind::from_str(&configuration.model)?;
        let pipeline_config = PipelineConfig::new(
            model,
            configuration.confidence_threshold,
            configuration.overlay_fps,
        );

        let (broadcaster_task, broadcaster) = Broadcaster::spawn(64);
        let context = ServerContext::new(pipeline_config, broadcaster);
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        let relay = RelayServer::bind(
            &configuration.bind_address,
            configuration.camera_port,
            context.clone(),
            cancel.clone(),
            configuration.max_frame_bytes,
        )
        .await?;
        let camera_addr = relay.local_addr();
        let relay_states = relay.state_watch();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = relay.run().await {
                error!("Relay server failed: {}", e);
            }
        }));

        let video_addr = if configuration.enable_video_channel {
            let video = VideoServer::bind(
                &configuration.bind_address,
                configuration.video_port,
                context.clone(),
                cancel.clone(),
                configuration.subscriber_buffer_size,
            )
            .await?;
            let addr = video.local_addr();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = video.run().await {
                    error!("Video server failed: {}", e);
                }
            }));
            addr
        } else {
            None
        };

        let control = ControlServer::bind(
            &configuration.bind_address,
            configuration.control_port,
            context.clone(),
            cancel.clone(),
        )
        .await?;
        let control_addr = control.local_addr();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = control.run().await {
                error!("Control server failed: {}", e);
            }
        }));

        Ok(Self {
            cancel,
            tasks,
            broadcaster_task,
            context,
            relay_states,
            camera_addr,
            video_addr,
            control_addr,
        })
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    pub fn relay_states(&self) -> watch::Receiver<RelayState> {
        self.relay_states.clone()
    }

    pub fn camera_addr(&self) -> Option<SocketAddr> {
        self.camera_addr
    }

    pub fn video_addr(&self) -> Option<SocketAddr> {
        self.video_addr
    }

    pub fn control_addr(&self) -> Option<SocketAddr> {
        self.control_addr
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Cancels and waits for the channel tasks to drain. The
    /// broadcaster supervisor ends once the last handle clone goes.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
        self.broadcaster_task.abort();
        let _ = self.broadcaster_task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_configuration() -> Configuration {
        Configuration {
            bind_address: "127.0.0.1".to_string(),
            camera_port: 0,
            video_port: 0,
            control_port: 0,
            ..Configuration::default()
        }
    }

    #[tokio::test]
    async fn start_binds_all_three_channels() {
        let coordinator = Coordinator::start(test_configuration()).await.unwrap();
        assert!(coordinator.camera_addr().is_some());
        assert!(coordinator.video_addr().is_some());
        assert!(coordinator.control_addr().is_some());
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn video_channel_can_be_disabled() {
        let configuration = Configuration {
            enable_video_channel: false,
            ..test_configuration()
        };
        let coordinator = Coordinator::start(configuration).await.unwrap();
        assert!(coordinator.video_addr().is_none());
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_initial_model_is_fatal() {
        let configuration = Configuration {
            model: "resnet".to_string(),
            ..test_configuration()
        };
        assert!(Coordinator::start(configuration).await.is_err());
    }
}
