//! Media import: raw bytes in, clips out.
//!
//! Bytes are staged in a temporary file, probed with a bounded wait and
//! validated. Only a fully accepted import keeps the staged file; every
//! failure path drops it, which deletes it.

use crossbeam_channel::{bounded, RecvTimeoutError};
use framecut_core::{FramecutError, ImportConfig, Result};
use framecut_timeline::{Clip, MediaRef, TrackKind};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::probe::{MediaProbe, MediaProber};

/// Clips produced by one import.
#[derive(Debug, Clone)]
pub struct ImportedMedia {
    pub clip: Clip,
    /// Audio clip extracted from a video that carries sound.
    pub audio: Option<Clip>,
    /// Where the media now lives.
    pub path: PathBuf,
}

/// Turns uploaded bytes into clips.
pub struct Importer {
    config: ImportConfig,
    prober: Arc<dyn MediaProber>,
}

impl Importer {
    pub fn new(config: ImportConfig, prober: Arc<dyn MediaProber>) -> Self {
        Self { config, prober }
    }

    /// Which track kind a declared media type maps to.
    pub fn classify(&self, mime: &str) -> Result<TrackKind> {
        if self.config.video_types.iter().any(|t| t == mime) {
            Ok(TrackKind::Video)
        } else if self.config.audio_types.iter().any(|t| t == mime) {
            Ok(TrackKind::Audio)
        } else {
            Err(FramecutError::UnsupportedFormat(mime.to_string()))
        }
    }

    /// Import one file.
    pub fn import(&self, name: &str, mime: &str, bytes: &[u8]) -> Result<ImportedMedia> {
        let kind = self.classify(mime)?;
        let staged = self.stage(name, bytes)?;

        let probe = match self.probe_bounded(name, staged.path().to_path_buf()) {
            Ok(probe) => probe,
            Err(e) => {
                warn!(file = name, error = %e, "Import failed, staged file released");
                return Err(e);
            }
        };
        if let Err(e) = validate(name, kind, &probe) {
            warn!(file = name, error = %e, "Import rejected, staged file released");
            return Err(e);
        }

        let (_, path) = staged
            .keep()
            .map_err(|e| FramecutError::Io(e.error))?;
        let source = MediaRef::new(&path, mime, Some(probe.duration));
        let (clip, audio) = match kind {
            TrackKind::Video => {
                let (width, height) = probe.dimensions();
                let clip = Clip::new_video(name, source, width, height).with_audio(probe.has_audio());
                let audio = clip.extract_audio();
                (clip, audio)
            }
            TrackKind::Audio => (Clip::new_audio(name, source), None),
        };
        info!(file = name, clip = %clip.id, duration = probe.duration, "Media imported");
        Ok(ImportedMedia { clip, audio, path })
    }

    fn stage(&self, name: &str, bytes: &[u8]) -> Result<NamedTempFile> {
        let suffix = std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut builder = tempfile::Builder::new();
        builder.prefix("framecut-media-").suffix(&suffix);
        let mut file = match &self.config.media_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;
        Ok(file)
    }

    /// Probe on a helper thread, giving up after the configured timeout.
    fn probe_bounded(&self, name: &str, path: PathBuf) -> Result<MediaProbe> {
        let (tx, rx) = bounded(1);
        let prober = Arc::clone(&self.prober);
        std::thread::Builder::new()
            .name("framecut-probe".into())
            .spawn(move || {
                let _ = tx.send(prober.probe(&path));
            })?;

        let timeout = self.config.metadata_timeout();
        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(FramecutError::MetadataTimeout {
                name: name.to_string(),
                seconds: timeout.as_secs_f64(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(FramecutError::Metadata(format!(
                "probe of {name} ended without a result"
            ))),
        }
    }
}

fn validate(name: &str, kind: TrackKind, probe: &MediaProbe) -> Result<()> {
    if !probe.duration.is_finite() || probe.duration <= 0.0 {
        return Err(FramecutError::Metadata(format!(
            "{name} reports duration {}",
            probe.duration
        )));
    }
    if kind == TrackKind::Video {
        let (width, height) = probe.dimensions();
        if width == 0 || height == 0 {
            return Err(FramecutError::InvalidVideoDimensions {
                name: name.to_string(),
                width,
                height,
            });
        }
    }
    Ok(())
}
