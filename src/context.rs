use crate::broadcast::BroadcasterHandle;
use crate::detect::{Detector, PipelineConfig};
use crate::state::FrameStateStore;
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex};

/// The one value shared across the three concurrency domains: the
/// ingestion loop, the subscriber fan-out and the control sessions.
/// Everything that used to be ambient module state lives here.
pub struct ServerContext {
    config: ArcSwap<PipelineConfig>,
    // A fully constructed replacement detector parked by the control
    // channel; the ingestion loop takes it between frames.
    pending_detector: Mutex<Option<Box<dyn Detector>>>,
    pub state: FrameStateStore,
    pub broadcaster: BroadcasterHandle,
}

impl ServerContext {
    pub fn new(config: PipelineConfig, broadcaster: BroadcasterHandle) -> Arc<Self> {
        Arc::new(Self {
            config: ArcSwap::from_pointee(config),
            pending_detector: Mutex::new(None),
            state: FrameStateStore::new(),
            broadcaster,
        })
    }

    /// One atomic snapshot; a frame is processed start to finish under
    /// the value returned here.
    pub fn pipeline_config(&self) -> Arc<PipelineConfig> {
        self.config.load_full()
    }

    /// Construct-then-swap: the detector (when the model changed) is
    /// parked first, then the complete config is stored in one atomic
    /// replace. A frame loop that observes the new config finds its
    /// matching detector already waiting.
    pub fn install_pipeline(&self, config: PipelineConfig, detector: Option<Box<dyn Detector>>) {
        if let Some(detector) = detector {
            *self
                .pending_detector
                .lock()
                .expect("detector slot poisoned") = Some(detector);
        }
        self.config.store(Arc::new(config));
    }

    pub fn take_pending_detector(&self) -> Option<Box<dyn Detector>> {
        self.pending_detector
            .lock()
            .expect("detector slot poisoned")
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::detect::{build_detector, ModelKind};

    fn context() -> Arc<ServerContext> {
        let (_, handle) = Broadcaster::spawn(16);
        ServerContext::new(
            PipelineConfig::new(ModelKind::ObjectDetector, 0.5, true),
            handle,
        )
    }

    #[tokio::test]
    async fn config_swap_is_all_or_nothing() {
        let context = context();
        let before = context.pipeline_config();

        let next = PipelineConfig::new(ModelKind::FaceDetector, 0.9, false);
        let detector = build_detector(ModelKind::FaceDetector).unwrap();
        context.install_pipeline(next.clone(), Some(detector));

        let after = context.pipeline_config();
        assert_eq!(*after, next);
        // the old snapshot is untouched
        assert_eq!(before.model, ModelKind::ObjectDetector);
        assert_eq!(before.threshold, 0.5);

        let pending = context.take_pending_detector().expect("no detector parked");
        assert_eq!(pending.kind(), ModelKind::FaceDetector);
        assert!(context.take_pending_detector().is_none());
    }

    #[tokio::test]
    async fn threshold_only_update_keeps_model_and_detector() {
        let context = context();
        let mut config = (*context.pipeline_config()).clone();
        config.threshold = PipelineConfig::clamp_threshold(0.9);
        context.install_pipeline(config, None);

        let after = context.pipeline_config();
        assert_eq!(after.model, ModelKind::ObjectDetector);
        assert_eq!(after.threshold, 0.9);
        assert!(context.take_pending_detector().is_none());
    }
}
