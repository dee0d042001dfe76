//! Best-effort container metadata via lofty.

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioMetadata {
    /// Seconds.
    pub duration: Option<f64>,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u8>,
    /// Audio bitrate in kbps.
    pub bit_rate: Option<u32>,
    pub channels: Option<u8>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl AudioMetadata {
    /// Tag fields as `(key, value)` pairs for the EAV table, skipping empties.
    pub fn tag_entries(&self) -> Vec<(&'static str, String)> {
        [
            ("title", &self.title),
            ("artist", &self.artist),
            ("album", &self.album),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }
}

/// Decode container-level metadata from `path`.
///
/// Unsupported or corrupt containers yield an empty result, never an error.
pub fn extract(path: &Path) -> AudioMetadata {
    let tagged_file = match Probe::open(path).and_then(|probe| probe.guess_file_type()?.read()) {
        Ok(tagged_file) => tagged_file,
        Err(e) => {
            debug!("No metadata for {}: {}", path.display(), e);
            return AudioMetadata::default();
        }
    };

    let props = tagged_file.properties();
    let duration = props.duration().as_secs_f64();
    let mut metadata = AudioMetadata {
        duration: (duration > 0.0).then_some(duration),
        sample_rate: props.sample_rate(),
        bit_depth: props.bit_depth(),
        bit_rate: props.audio_bitrate().or_else(|| props.overall_bitrate()),
        channels: props.channels(),
        ..AudioMetadata::default()
    };

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        metadata.title = non_empty(tag.title().map(|v| v.into_owned()));
        metadata.artist = non_empty(tag.artist().map(|v| v.into_owned()));
        metadata.album = non_empty(tag.album().map(|v| v.into_owned()));
    }

    metadata
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn pcm_wav(sample_rate: u32, channels: u16, frames: u32) -> Vec<u8> {
        let block_align = channels * 2;
        let data_len = frames * block_align as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(out.len() + data_len as usize, 0);
        out
    }

    #[test]
    fn test_reads_pcm_wav_properties() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        fs::write(&path, pcm_wav(44_100, 2, 44_100)).unwrap();

        let metadata = extract(&path);
        assert_eq!(metadata.sample_rate, Some(44_100));
        assert_eq!(metadata.channels, Some(2));
        assert_eq!(metadata.bit_depth, Some(16));
        let duration = metadata.duration.unwrap();
        assert!((duration - 1.0).abs() < 0.01, "duration was {duration}");
        assert!(metadata.tag_entries().is_empty());
    }

    #[test]
    fn test_garbage_container_yields_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        fs::write(&path, b"definitely not a riff header").unwrap();
        assert_eq!(extract(&path), AudioMetadata::default());
    }

    #[test]
    fn test_missing_file_yields_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(extract(&dir.path().join("nope.flac")), AudioMetadata::default());
    }

    #[test]
    fn test_tag_entries_skip_missing() {
        let metadata = AudioMetadata {
            title: Some("Kick 01".into()),
            album: Some("Drums".into()),
            ..AudioMetadata::default()
        };
        assert_eq!(
            metadata.tag_entries(),
            vec![("title", "Kick 01".to_string()), ("album", "Drums".to_string())]
        );
    }
}
