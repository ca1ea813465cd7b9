//! Control channel: newline-delimited JSON over any number of
//! concurrent sessions. Configuration changes are validated field by
//! field and applied as one atomic replace of the whole config value.

use crate::context::ServerContext;
use crate::detect::{build_detector, ModelKind, PipelineConfig};
use crate::error::{AppError, NetworkError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{tcp::OwnedWriteHalf, TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    GetSettings,
    UpdateSettings {
        model: Option<String>,
        threshold: Option<f64>,
        #[serde(rename = "overlayFps")]
        overlay_fps: Option<bool>,
    },
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlReply {
    Settings {
        model: String,
        threshold: f64,
        #[serde(rename = "overlayFps")]
        overlay_fps: bool,
    },
    Stats {
        fps: u32,
    },
    Detections {
        count: usize,
    },
    Error {
        message: String,
    },
}

impl ControlReply {
    fn settings(config: &PipelineConfig) -> Self {
        ControlReply::Settings {
            model: config.model.as_str().to_string(),
            threshold: config.threshold,
            overlay_fps: config.overlay_fps,
        }
    }
}

/// Result of validating an `update_settings` command against the
/// current configuration. Valid fields are applied independently;
/// invalid ones are collected as rejection reasons.
pub struct UpdateOutcome {
    pub config: PipelineConfig,
    pub model_changed: bool,
    pub rejections: Vec<String>,
}

pub fn apply_update(
    current: &PipelineConfig,
    model: Option<&str>,
    threshold: Option<f64>,
    overlay_fps: Option<bool>,
) -> UpdateOutcome {
    let mut config = current.clone();
    let mut rejections = Vec::new();
    let mut model_changed = false;

    if let Some(selector) = model {
        match ModelKind::from_str(selector) {
            Ok(kind) => {
                if kind != config.model {
                    config.model = kind;
                    model_changed = true;
                }
            }
            Err(e) => rejections.push(e.to_string()),
        }
    }
    if let Some(threshold) = threshold {
        config.threshold = PipelineConfig::clamp_threshold(threshold);
    }
    if let Some(flag) = overlay_fps {
        config.overlay_fps = flag;
    }

    UpdateOutcome {
        config,
        model_changed,
        rejections,
    }
}

pub struct ControlServer {
    listener: TcpListener,
    context: Arc<ServerContext>,
    cancel: CancellationToken,
}

impl ControlServer {
    pub async fn bind(
        address: &str,
        port: u16,
        context: Arc<ServerContext>,
        cancel: CancellationToken,
    ) -> Result<Self, AppError> {
        let listener = TcpListener::bind(format!("{}:{}", address, port))
            .await
            .map_err(|e| NetworkError::Bind(e, port))?;
        Ok(Self {
            listener,
            context,
            cancel,
        })
    }

    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub async fn run(self) -> Result<(), AppError> {
        info!("Control channel accepting sessions");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!("Control session opened from {}", peer);
                            let context = self.context.clone();
                            let cancel = self.cancel.clone();
                            tokio::spawn(async move {
                                run_session(stream, context, cancel).await;
                                info!("Control session from {} closed", peer);
                            });
                        }
                        Err(e) => error!("{}", NetworkError::Accept(e)),
                    }
                }
            }
        }
        info!("Control channel stopped");
        Ok(())
    }
}

async fn run_session(stream: TcpStream, context: Arc<ServerContext>, cancel: CancellationToken) {
    let (read_half, write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut writer = BufWriter::new(write_half);

    // the current settings snapshot is pushed on connect
    if send_status(&mut writer, &context).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let command = match serde_json::from_str::<ControlCommand>(&line) {
                            Ok(command) => command,
                            Err(e) => {
                                // malformed payloads never close the session
                                warn!("Ignoring malformed control message: {}", e);
                                continue;
                            }
                        };
                        if handle_command(command, &mut writer, &context).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }
}

async fn handle_command(
    command: ControlCommand,
    writer: &mut BufWriter<OwnedWriteHalf>,
    context: &Arc<ServerContext>,
) -> std::io::Result<()> {
    match command {
        ControlCommand::GetSettings => {}
        ControlCommand::UpdateSettings {
            model,
            threshold,
            overlay_fps,
        } => {
            let rejections = update_settings(context, model.as_deref(), threshold, overlay_fps);
            for message in rejections {
                send_reply(writer, &ControlReply::Error { message }).await?;
            }
        }
    }
    send_status(writer, context).await
}

/// Validates and applies an update. A model switch is construct-then-
/// swap: the replacement detector is fully built before the new config
/// is stored; if construction fails, the active model stays, the error
/// is reported back, and any other valid fields still apply.
fn update_settings(
    context: &Arc<ServerContext>,
    model: Option<&str>,
    threshold: Option<f64>,
    overlay_fps: Option<bool>,
) -> Vec<String> {
    let current = context.pipeline_config();
    let mut outcome = apply_update(&current, model, threshold, overlay_fps);

    let detector = if outcome.model_changed {
        match build_detector(outcome.config.model) {
            Ok(detector) => Some(detector),
            Err(e) => {
                outcome.rejections.push(e.to_string());
                outcome.config.model = current.model;
                None
            }
        }
    } else {
        None
    };

    if outcome.config != *current {
        info!("Settings updated: {:?}", outcome.config);
        context.install_pipeline(outcome.config, detector);
    }
    outcome.rejections
}

async fn send_status(
    writer: &mut BufWriter<OwnedWriteHalf>,
    context: &Arc<ServerContext>,
) -> std::io::Result<()> {
    let config = context.pipeline_config();
    let metrics = context.state.current_metrics();
    send_reply(writer, &ControlReply::settings(&config)).await?;
    send_reply(writer, &ControlReply::Stats { fps: metrics.fps }).await?;
    send_reply(
        writer,
        &ControlReply::Detections {
            count: metrics.detections,
        },
    )
    .await
}

async fn send_reply(
    writer: &mut BufWriter<OwnedWriteHalf>,
    reply: &ControlReply,
) -> std::io::Result<()> {
    let json = serde_json::to_string(reply)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
