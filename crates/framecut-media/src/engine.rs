//! Codec engine boundary.
//!
//! The export pipeline talks to the encoder through [`CodecEngine`]: files
//! are written into a private scratch namespace, commands run against them,
//! and outputs are read back by name. [`FfmpegEngine`] backs this with an
//! ffmpeg binary located by ffmpeg-sidecar and a temporary directory.

use framecut_core::{FramecutError, Result};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;
use tracing::{debug, info};

/// Command-driven encoder with a private file namespace.
pub trait CodecEngine: Send {
    /// Prepare the engine. Calling it again is a no-op.
    fn load(&mut self) -> Result<()>;

    fn is_loaded(&self) -> bool;

    /// Store `bytes` under `name`. Names may contain `/` separators.
    fn write_input(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Run one command. A non-zero exit is an `EncodeFailure`.
    fn run(&mut self, args: &[String]) -> Result<()>;

    /// Read a file produced by an earlier command.
    fn read_output(&mut self, name: &str) -> Result<Vec<u8>>;

    /// Delete a file from the namespace. Missing files are ignored.
    fn remove(&mut self, name: &str) -> Result<()>;
}

/// Build an argument vector from string-like parts.
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$(::std::string::ToString::to_string(&$arg)),*]
    };
}

/// Path of the ffmpeg binary, as resolved by ffmpeg-sidecar.
pub fn ffmpeg_binary() -> PathBuf {
    ffmpeg_sidecar::paths::ffmpeg_path()
}

/// Path of the ffprobe binary shipped next to ffmpeg.
pub fn ffprobe_binary() -> PathBuf {
    let name = if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" };
    ffmpeg_binary().with_file_name(name)
}

/// Reject names that would escape the scratch directory.
pub(crate) fn checked_name(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if name.is_empty() || escapes {
        return Err(FramecutError::InvalidParameter(format!(
            "engine file name {name:?} must be a relative path"
        )));
    }
    Ok(path)
}

/// ffmpeg subprocess engine working in a temporary directory.
pub struct FfmpegEngine {
    binary: PathBuf,
    workdir: Option<TempDir>,
}

impl FfmpegEngine {
    /// Engine using the ffmpeg binary found by ffmpeg-sidecar.
    pub fn new() -> Self {
        Self::with_binary(ffmpeg_binary())
    }

    /// Engine using an explicit ffmpeg binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            workdir: None,
        }
    }

    fn dir(&self) -> Result<&Path> {
        self.workdir
            .as_ref()
            .map(TempDir::path)
            .ok_or_else(|| FramecutError::EncodeFailure("codec engine is not loaded".into()))
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        Ok(self.dir()?.join(checked_name(name)?))
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecEngine for FfmpegEngine {
    fn load(&mut self) -> Result<()> {
        if self.workdir.is_some() {
            return Ok(());
        }
        let available = if self.binary == ffmpeg_binary() {
            ffmpeg_sidecar::command::ffmpeg_is_installed()
        } else {
            self.binary.exists()
        };
        if !available {
            return Err(FramecutError::EncodeFailure(format!(
                "ffmpeg not found at {}",
                self.binary.display()
            )));
        }
        let dir = tempfile::Builder::new().prefix("framecut-engine-").tempdir()?;
        info!(binary = %self.binary.display(), workdir = %dir.path().display(), "Codec engine loaded");
        self.workdir = Some(dir);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.workdir.is_some()
    }

    fn write_input(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(())
    }

    fn run(&mut self, args: &[String]) -> Result<()> {
        let dir = self.dir()?.to_path_buf();
        debug!(args = %args.join(" "), "ffmpeg");
        let output = Command::new(&self.binary)
            .current_dir(&dir)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| FramecutError::EncodeFailure(format!("Failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(3).collect();
            return Err(FramecutError::EncodeFailure(format!(
                "ffmpeg {} exited with {}: {}",
                args.join(" "),
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }
        Ok(())
    }

    fn read_output(&mut self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        std::fs::read(&path).map_err(|e| {
            FramecutError::EncodeFailure(format!("engine output {name} unavailable: {e}"))
        })
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
