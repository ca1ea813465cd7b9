use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub bind_address: String,
    pub camera_port: u16,
    pub video_port: u16,
    pub control_port: u16,
    pub model: String,
    pub confidence_threshold: f64,
    pub overlay_fps: bool,
    pub enable_video_channel: bool,
    pub subscriber_buffer_size: usize,
    pub max_frame_bytes: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            camera_port: 8888,
            video_port: 8080,
            control_port: 8081,
            model: "yolov4".to_string(),
            confidence_threshold: 0.5,
            overlay_fps: true,
            enable_video_channel: true,
            subscriber_buffer_size: 8,
            max_frame_bytes: 4 * 1024 * 1024,
        }
    }
}

impl Configuration {
    /// Layered load: built-in defaults, then an optional `aicam.toml`
    /// next to the binary, then `AICAM_*` environment overrides.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("aicam").required(false))
            .add_source(config::Environment::with_prefix("AICAM"))
            .build()?
            .try_deserialize()
    }

    /// Load from an explicit file, without environment overrides.
    pub fn load_from(path: &std::path::Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let configuration = Configuration::default();
        assert_eq!(configuration.camera_port, 8888);
        assert_eq!(configuration.model, "yolov4");
        assert!(configuration.enable_video_channel);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let configuration = Configuration::load().expect("load failed");
        assert_eq!(configuration.confidence_threshold, 0.5);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("aicam.toml");
        std::fs::write(&path, "camera_port = 9000\nmodel = \"mediapipe_face\"\n")
            .expect("write failed");

        let configuration = Configuration::load_from(&path).expect("load failed");
        assert_eq!(configuration.camera_port, 9000);
        assert_eq!(configuration.model, "mediapipe_face");
        assert_eq!(configuration.video_port, 8080);
    }
}
