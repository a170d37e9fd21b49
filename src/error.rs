//! Error types for wakechirp.

use crate::pipeline::worker::WorkerStage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChirpError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Input errors
    #[error("Cannot read audio from {path}: {message}")]
    UnreadableAudio { path: String, message: String },

    #[error(
        "Input audio must have one or two channels (mono or stereo), this file has {channels}"
    )]
    UnsupportedChannelLayout { channels: u16 },

    // Output errors
    #[error("Encoding failed: {message}")]
    Encoding { message: String },

    #[error("Failed to write {path}: {source}")]
    OutputWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Worker pool
    #[error("Segment {segment_index} failed while {stage}: {source}")]
    Worker {
        segment_index: usize,
        stage: WorkerStage,
        #[source]
        source: Box<ChirpError>,
    },

    #[error("Cancelled after another segment failed")]
    Cancelled,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ChirpError {
    /// Unwraps worker failures down to the error that caused them.
    pub fn root(&self) -> &ChirpError {
        match self {
            ChirpError::Worker { source, .. } => source.root(),
            other => other,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ChirpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = ChirpError::ConfigInvalidValue {
            key: "chirp.chirp_volume".to_string(),
            message: "must be between 0.0 and 1.0".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for chirp.chirp_volume: must be between 0.0 and 1.0"
        );
    }

    #[test]
    fn test_unreadable_audio_display() {
        let error = ChirpError::UnreadableAudio {
            path: "/tmp/talk.mp3".to_string(),
            message: "unsupported format".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Cannot read audio from /tmp/talk.mp3: unsupported format"
        );
    }

    #[test]
    fn test_unsupported_channel_layout_display() {
        let error = ChirpError::UnsupportedChannelLayout { channels: 6 };
        assert!(error.to_string().contains("this file has 6"));
    }

    #[test]
    fn test_worker_display_includes_index_and_stage() {
        let error = ChirpError::Worker {
            segment_index: 3,
            stage: WorkerStage::Finalizing,
            source: Box::new(ChirpError::Encoding {
                message: "lame exploded".to_string(),
            }),
        };
        assert_eq!(
            error.to_string(),
            "Segment 3 failed while finalizing: Encoding failed: lame exploded"
        );
    }

    #[test]
    fn test_root_unwraps_worker_failure() {
        let error = ChirpError::Worker {
            segment_index: 0,
            stage: WorkerStage::Initializing,
            source: Box::new(ChirpError::UnsupportedChannelLayout { channels: 3 }),
        };
        assert!(matches!(
            error.root(),
            ChirpError::UnsupportedChannelLayout { channels: 3 }
        ));
    }

    #[test]
    fn test_output_write_has_source() {
        let error = ChirpError::OutputWrite {
            path: "out.000.chirp.mp3".to_string(),
            source: io::Error::new(io::ErrorKind::StorageFull, "disk full"),
        };
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
        assert!(error.to_string().contains("out.000.chirp.mp3"));
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: ChirpError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: ChirpError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<ChirpError>();
        assert_sync::<ChirpError>();
    }
}
