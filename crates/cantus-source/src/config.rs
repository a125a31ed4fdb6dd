//! Per-source configuration.

use std::path::PathBuf;

use cantus_midi::{capture_channel_with_capacity, CaptureConsumer, CaptureProducer};
use cantus_midi::{DEFAULT_CAPTURE_CAPACITY, DEFAULT_PPQN};

use crate::storage::SmfStorage;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Slots in the capture ring between the audio thread and the writer.
    pub capture_capacity: usize,
    /// SMF resolution used when the source is written to disk.
    pub ppqn: u16,
    /// File the source flushes to. `None` keeps it in memory.
    pub path: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            capture_capacity: DEFAULT_CAPTURE_CAPACITY,
            ppqn: DEFAULT_PPQN,
            path: None,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capture_capacity == 0 {
            return Err(Error::InvalidConfig(
                "capture_capacity must be greater than 0".to_string(),
            ));
        }
        if self.ppqn == 0 || self.ppqn > 0x7FFF {
            return Err(Error::InvalidConfig(format!(
                "ppqn {} out of range (1-32767)",
                self.ppqn
            )));
        }
        Ok(())
    }

    /// Fresh storage for a new source: bound to `path` when set, at `ppqn`.
    pub fn storage(&self) -> SmfStorage {
        match &self.path {
            Some(path) => SmfStorage::create(path.clone(), self.ppqn),
            None => SmfStorage::in_memory_at(self.ppqn),
        }
    }

    /// Capture ring sized for this configuration.
    pub fn capture_channel(&self) -> (CaptureProducer, CaptureConsumer) {
        capture_channel_with_capacity(self.capture_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MidiStorage;

    #[test]
    fn test_default_config() {
        let config = SourceConfig::default();
        assert_eq!(config.ppqn, 1920);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = SourceConfig {
            capture_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_ppqn_out_of_range() {
        let config = SourceConfig {
            ppqn: 0x8000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_capture_channel_capacity() {
        let config = SourceConfig {
            capture_capacity: 8,
            ..Default::default()
        };
        let (producer, _consumer) = config.capture_channel();
        assert_eq!(producer.free_space(), 8);
    }

    #[test]
    fn test_storage_follows_config() {
        let config = SourceConfig {
            ppqn: 480,
            ..Default::default()
        };
        let storage = config.storage();
        assert_eq!(storage.ppqn(), 480);
        assert!(storage.path().is_none());

        let config = SourceConfig {
            path: Some(PathBuf::from("take.mid")),
            ..config
        };
        let storage = config.storage();
        assert_eq!(storage.path(), Some(std::path::Path::new("take.mid")));
        assert!(storage.is_dirty());
    }
}
