pub mod broadcast;
pub mod codec;
pub mod common;
pub mod config;
pub mod context;
pub mod control;
pub mod coordinator;
pub mod detect;
pub mod error;
pub mod relay;
pub mod state;
pub mod video;

pub use config::Configuration;
pub use coordinator::Coordinator;
pub use error::{AppError, BroadcastError, FrameError, NetworkError, PipelineError};
