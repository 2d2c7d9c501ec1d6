//! Pipeline configuration
//!
//! JSON description of the buffer format a player negotiates and whether its
//! planes are pinned.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::format::{BufferFormat, BufferFormatNegotiator, Chroma, ExactSize, FixedFormat, SourceSized};

/// How the configured size relates to the source size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationPolicy {
    /// Always the configured width and height, the engine scales
    #[default]
    Fixed,
    /// Source geometry with the default plane layout of the chroma
    Source,
    /// Source geometry in a single tightly packed plane
    Exact,
}

/// Frame pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Chroma tag, 1 to 4 ASCII characters
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Row pitch of the single plane; derived from the chroma when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<u32>,

    #[serde(default)]
    pub pin_memory: bool,

    #[serde(default)]
    pub policy: NegotiationPolicy,
}

fn default_pixel_format() -> String {
    "RV32".to_string()
}

fn default_width() -> u32 {
    720
}

fn default_height() -> u32 {
    480
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pixel_format: default_pixel_format(),
            width: default_width(),
            height: default_height(),
            pitch: None,
            pin_memory: false,
            policy: NegotiationPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn chroma(&self) -> Result<Chroma> {
        Chroma::new(&self.pixel_format)
    }

    /// The fixed format described by this configuration
    pub fn fixed_format(&self) -> Result<BufferFormat> {
        let chroma = self.chroma()?;
        match self.pitch {
            Some(pitch) => BufferFormat::with_chroma(chroma, self.width, self.height, vec![pitch], vec![self.height]),
            None => BufferFormat::for_chroma(chroma, self.width, self.height),
        }
    }

    /// Build the negotiator for the configured policy
    pub fn negotiator(&self) -> Result<Box<dyn BufferFormatNegotiator>> {
        let chroma = self.chroma()?;
        if self.pitch.is_some() && self.policy != NegotiationPolicy::Fixed {
            warn!("Configured pitch is ignored by the {:?} policy", self.policy);
        }

        debug!("Building {:?} negotiator for {}", self.policy, chroma);
        Ok(match self.policy {
            NegotiationPolicy::Fixed => Box::new(FixedFormat::new(self.fixed_format()?)),
            NegotiationPolicy::Source => Box::new(SourceSized::new(chroma)?),
            NegotiationPolicy::Exact => Box::new(ExactSize::new(chroma)?),
        })
    }

    /// Check that the configuration describes a usable pipeline
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid_format(format!(
                "configured size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        self.negotiator().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());

        let format = config.fixed_format().unwrap();
        assert_eq!(format.pitches(), &[2880]);
        assert_eq!(format.total_size(), 1_382_400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_policies() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"pixel_format": "I420", "policy": "source", "pin_memory": true}"#).unwrap();
        assert_eq!(config.policy, NegotiationPolicy::Source);
        assert!(config.pin_memory);

        let format = config.negotiator().unwrap().negotiate(640, 360).unwrap();
        assert_eq!(format.plane_count(), 3);
        assert_eq!((format.width(), format.height()), (640, 360));
    }

    #[test]
    fn test_explicit_pitch() {
        let config = PipelineConfig {
            pitch: Some(3072),
            ..PipelineConfig::default()
        };
        let format = config.negotiator().unwrap().negotiate(1920, 1080).unwrap();
        assert_eq!(format.pitches(), &[3072]);
        assert_eq!(format.width(), 720);
    }

    #[test]
    fn test_invalid_configs() {
        let short_pitch = PipelineConfig {
            pitch: Some(100),
            ..PipelineConfig::default()
        };
        assert!(matches!(short_pitch.validate(), Err(Error::InvalidFormat(_))));

        let exact_planar = PipelineConfig {
            pixel_format: "YV12".to_string(),
            policy: NegotiationPolicy::Exact,
            ..PipelineConfig::default()
        };
        assert!(exact_planar.validate().is_err());

        let zero = PipelineConfig {
            width: 0,
            ..PipelineConfig::default()
        };
        assert!(zero.validate().is_err());

        let long_tag = PipelineConfig {
            pixel_format: "RGB32".to_string(),
            ..PipelineConfig::default()
        };
        assert!(long_tag.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("direct-video-config-{}.json", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"width": 320, "height": 240, "policy": "exact"}}"#).unwrap();
        drop(file);

        let config = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!((config.width, config.height), (320, 240));
        assert_eq!(config.policy, NegotiationPolicy::Exact);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(PipelineConfig::load_from_file(&path), Err(Error::Io(_))));
    }

    #[test]
    fn test_malformed_json() {
        let path = std::env::temp_dir().join(format!("direct-video-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PipelineConfig::load_from_file(&path), Err(Error::Json(_))));
        std::fs::remove_file(&path).unwrap();
    }
}
