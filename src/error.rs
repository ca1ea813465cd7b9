use thiserror::Error;

// Main application error type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network Error: {0}")]
    Network(#[from] NetworkError),
    #[error("Frame Error: {0}")]
    Frame(#[from] FrameError),
    #[error("Pipeline Error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Broadcast Error: {0}")]
    Broadcast(#[from] BroadcastError),
}

// Network error type
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Failed to bind to port {1}: {0}")]
    Bind(std::io::Error, u16),
    #[error("Failed to accept connection: {0}")]
    Accept(std::io::Error),
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to read frame: {0}")]
    Read(std::io::Error),
    #[error("Failed to write frame: {0}")]
    Write(std::io::Error),
    #[error("Frame of {0} bytes exceeds the {1} byte limit")]
    Oversized(u32, u32),
    #[error("Failed to decode image: {0}")]
    Decode(image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(image::ImageError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unknown model selector: {0}")]
    UnknownModel(String),
    #[error("Failed to initialize model {0}: {1}")]
    Init(&'static str, String),
}

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("Broadcaster supervisor is not running")]
    SupervisorGone,
}
