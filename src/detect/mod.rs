pub mod draw;
pub mod face;
pub mod object;
pub mod pose;
pub mod regions;

use crate::error::PipelineError;
use image::DynamicImage;
use std::str::FromStr;

/// Closed set of interchangeable analysis variants. Selector strings are
/// the wire names the control protocol accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    ObjectDetector,
    PoseEstimator,
    FaceDetector,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::ObjectDetector => "yolov4",
            ModelKind::PoseEstimator => "mediapipe_pose",
            ModelKind::FaceDetector => "mediapipe_face",
        }
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yolov4" => Ok(ModelKind::ObjectDetector),
            "mediapipe_pose" => Ok(ModelKind::PoseEstimator),
            "mediapipe_face" => Ok(ModelKind::FaceDetector),
            other => Err(PipelineError::UnknownModel(other.to_string())),
        }
    }
}

/// The one configuration value every frame is processed under. Replaced
/// wholesale via atomic swap; fields are never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub model: ModelKind,
    pub threshold: f64,
    pub overlay_fps: bool,
}

impl PipelineConfig {
    pub fn new(model: ModelKind, threshold: f64, overlay_fps: bool) -> Self {
        Self {
            model,
            threshold: Self::clamp_threshold(threshold),
            overlay_fps,
        }
    }

    /// Out-of-range thresholds are clamped to the nearest bound rather
    /// than rejected.
    pub fn clamp_threshold(threshold: f64) -> f64 {
        threshold.clamp(0.0, 1.0)
    }
}

/// Annotated pixels plus the variant-specific detection count.
pub struct Detections {
    pub image: DynamicImage,
    pub count: usize,
}

/// Capability interface over the analysis variants. Variants may keep
/// per-stream state, so a detector is owned and driven by the single
/// ingestion loop only.
pub trait Detector: Send {
    fn kind(&self) -> ModelKind;

    /// Analyzes one frame under one fixed config snapshot and returns an
    /// annotated copy. The variant never changes mid-frame.
    fn analyze(&mut self, image: &DynamicImage, config: &PipelineConfig) -> Detections;
}

/// Builds a variant from scratch. Failure here must leave whatever
/// detector is currently active untouched; callers swap only on success.
pub fn build_detector(kind: ModelKind) -> Result<Box<dyn Detector>, PipelineError> {
    match kind {
        ModelKind::ObjectDetector => Ok(Box::new(object::ObjectDetector::new()?)),
        ModelKind::PoseEstimator => Ok(Box::new(pose::PoseEstimator::new())),
        ModelKind::FaceDetector => Ok(Box::new(face::FaceDetector::new())),
    }
}
