//! Export pipeline for rendering timelines to video files.
//!
//! The export is a sequential loop over every output frame. Video sources are
//! first re-encoded with a keyframe on every frame so each per-frame seek is
//! exact. Every frame is then composited the same way preview does (with an
//! exact seek), stored as a JPEG still, and finally the stills are muxed into
//! a video stream and the audio clips mixed in at their timeline positions.
//!
//! Progress is reported as a non-decreasing fraction and reaches `1.0`
//! exactly once, on success.

use framecut_core::{ExportDefaults, FrameBuffer, FrameRate, FramecutError, Result};
use framecut_media::{args, CodecEngine, FrameSource, FrameSourceFactory};
use framecut_timeline::{Clip, ClipKind, Timeline};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::compositor::{PreviewCompositor, SeekPolicy};

const FRAME_PATTERN: &str = "frames/frame_%06d.jpg";
const VIDEO_OUTPUT: &str = "output.mp4";
const FINAL_OUTPUT: &str = "final_output.mp4";

/// Share of progress spent re-encoding sources.
const PREPARE_SHARE: f64 = 0.3;
/// Progress reached when every frame is written.
const FRAMES_DONE: f64 = 0.8;
const VIDEO_MUX_DONE: f64 = 0.9;
const AUDIO_MUX_DONE: f64 = 0.95;

// ── Settings ─────────────────────────────────────────────────────

/// Output format of one export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// JPEG quality of the intermediate stills (1-100).
    pub quality: u8,
}

impl ExportSettings {
    pub fn new(width: u32, height: u32, frame_rate: FrameRate, quality: u8) -> Self {
        Self {
            width,
            height,
            frame_rate,
            quality,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramecutError::InvalidParameter(format!(
                "export size {}x{} is empty",
                self.width, self.height
            )));
        }
        if !self.frame_rate.is_valid() {
            return Err(FramecutError::InvalidParameter(format!(
                "frame rate {}/{} is invalid",
                self.frame_rate.numerator, self.frame_rate.denominator
            )));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(FramecutError::InvalidParameter(format!(
                "quality {} outside 1-100",
                self.quality
            )));
        }
        Ok(())
    }

    /// Number of frames covering `duration`.
    pub fn total_frames(&self, duration: f64) -> u64 {
        self.frame_rate.frames_for(duration)
    }
}

impl From<&ExportDefaults> for ExportSettings {
    fn from(defaults: &ExportDefaults) -> Self {
        Self::new(
            defaults.width,
            defaults.height,
            defaults.frame_rate,
            defaults.quality,
        )
    }
}

// ── Progress ─────────────────────────────────────────────────────

/// Pipeline stage a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Preparing,
    Frames,
    VideoMux,
    AudioMux,
    Done,
}

/// Export progress information.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Completion fraction (0.0 to 1.0).
    pub fraction: f64,
    pub phase: ExportPhase,
    /// Frames written so far.
    pub current_frame: u64,
    /// Total frames to render.
    pub total_frames: u64,
}

/// Keeps reported fractions non-decreasing and below 1.0 until `finish`.
struct ProgressReporter<'a> {
    callback: &'a mut dyn FnMut(ExportProgress),
    last: f64,
    total_frames: u64,
}

impl ProgressReporter<'_> {
    fn report(&mut self, fraction: f64, phase: ExportPhase, current_frame: u64) {
        let fraction = fraction.clamp(self.last, AUDIO_MUX_DONE);
        self.last = fraction;
        (self.callback)(ExportProgress {
            fraction,
            phase,
            current_frame,
            total_frames: self.total_frames,
        });
    }

    fn finish(&mut self) {
        self.last = 1.0;
        (self.callback)(ExportProgress {
            fraction: 1.0,
            phase: ExportPhase::Done,
            current_frame: self.total_frames,
            total_frames: self.total_frames,
        });
    }
}

/// Handle for cancelling an in-progress export.
#[derive(Debug, Clone)]
pub struct ExportCancel(Arc<AtomicBool>);

impl ExportCancel {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for ExportCancel {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a finished export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub output_path: PathBuf,
    pub frames: u64,
    pub bytes: usize,
    pub audio_clips: usize,
    pub elapsed: Duration,
}

// ── Engine-backed frame sources ─────────────────────────────────

/// Decodes single frames through the codec engine.
struct EngineFrameSource<E: CodecEngine> {
    engine: Arc<Mutex<E>>,
    input: String,
    scratch: String,
    width: u32,
    height: u32,
    position: f64,
    frame: Option<FrameBuffer>,
}

impl<E: CodecEngine> FrameSource for EngineFrameSource<E> {
    fn position(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, time: f64) -> Result<()> {
        self.position = time;
        self.frame = None;
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame(&mut self) -> Result<&FrameBuffer> {
        if self.frame.is_none() {
            let command = args![
                "-ss",
                format!("{:.6}", self.position),
                "-i",
                self.input,
                "-frames:v",
                1,
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                format!("{}x{}", self.width, self.height),
                self.scratch,
            ];
            let mut engine = self.engine.lock();
            engine.run(&command)?;
            let bytes = engine.read_output(&self.scratch)?;
            engine.remove(&self.scratch)?;
            drop(engine);
            self.frame = Some(FrameBuffer::from_rgba(self.width, self.height, bytes)?);
        }
        self.frame
            .as_ref()
            .ok_or_else(|| FramecutError::Decode("frame unavailable".into()))
    }
}

struct EngineSourceFactory<E: CodecEngine> {
    engine: Arc<Mutex<E>>,
    /// Source path to the frame-accurate copy inside the engine.
    optimized: HashMap<PathBuf, String>,
    opened: Mutex<u64>,
}

impl<E: CodecEngine + 'static> FrameSourceFactory for EngineSourceFactory<E> {
    fn open(&self, clip: &Clip) -> Result<Box<dyn FrameSource>> {
        let (width, height) = clip.dimensions().ok_or_else(|| {
            FramecutError::InvalidParameter(format!("clip {} has no video", clip.id))
        })?;
        let input = self
            .optimized
            .get(&clip.source.path)
            .ok_or_else(|| {
                FramecutError::NotFound(format!("prepared input for {}", clip.source.path.display()))
            })?
            .clone();
        let mut opened = self.opened.lock();
        *opened += 1;
        Ok(Box::new(EngineFrameSource {
            engine: Arc::clone(&self.engine),
            input,
            scratch: format!("decode_{}.rgba", *opened),
            width,
            height,
            position: 0.0,
            frame: None,
        }))
    }
}

// ── Renderer ────────────────────────────────────────────────────

/// Resets the in-progress flag however the export ends.
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Offline renderer producing a finished video file.
pub struct ExportRenderer<E: CodecEngine> {
    engine: Arc<Mutex<E>>,
    in_progress: AtomicBool,
}

impl<E: CodecEngine + 'static> ExportRenderer<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_exporting(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Render `timeline` to `output`.
    ///
    /// Fails with `ExportInProgress` while another export runs on this
    /// renderer. Any failure aborts the export and leaves no output file.
    pub fn export(
        &self,
        timeline: &Timeline,
        settings: &ExportSettings,
        output: &Path,
        on_progress: &mut dyn FnMut(ExportProgress),
        cancel: &ExportCancel,
    ) -> Result<ExportReport> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FramecutError::ExportInProgress);
        }
        let _guard = InProgressGuard(&self.in_progress);

        let mut session = ExportSession {
            engine: Arc::clone(&self.engine),
            staged: HashMap::new(),
            scratch: Vec::new(),
            frames_written: 0,
        };
        let result = session.run(timeline, settings, output, on_progress, cancel);
        session.cleanup();
        match &result {
            Ok(report) => info!(
                output = %report.output_path.display(),
                frames = report.frames,
                bytes = report.bytes,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Export finished"
            ),
            Err(e) => warn!(error = %e, "Export failed"),
        }
        result
    }
}

/// State of one export run inside the engine namespace.
struct ExportSession<E: CodecEngine> {
    engine: Arc<Mutex<E>>,
    /// Source path to staged input name.
    staged: HashMap<PathBuf, String>,
    /// Intermediate files to delete afterwards.
    scratch: Vec<String>,
    frames_written: u64,
}

impl<E: CodecEngine + 'static> ExportSession<E> {
    fn run(
        &mut self,
        timeline: &Timeline,
        settings: &ExportSettings,
        output: &Path,
        on_progress: &mut dyn FnMut(ExportProgress),
        cancel: &ExportCancel,
    ) -> Result<ExportReport> {
        let started = Instant::now();
        settings.validate()?;
        let duration = timeline.duration();
        let total_frames = settings.total_frames(duration);
        if total_frames == 0 {
            return Err(FramecutError::InvalidParameter(
                "timeline is empty, nothing to export".into(),
            ));
        }
        info!(duration, total_frames, rate = %settings.frame_rate, "Export started");

        let mut progress = ProgressReporter {
            callback: on_progress,
            last: 0.0,
            total_frames,
        };

        self.engine.lock().load()?;

        // 1. frame-accurate copies of every visible video source
        let video_sources = visible_sources(timeline, true);
        let mut optimized = HashMap::new();
        for (k, path) in video_sources.iter().enumerate() {
            check_cancel(cancel)?;
            let input = self.stage(path)?;
            let name = format!("optimized_{k}.mp4");
            self.scratch.push(name.clone());
            let command = args![
                "-i", input, "-an", "-c:v", "libx264", "-g", 1, "-preset", "ultrafast", "-crf", 23, name,
            ];
            self.engine.lock().run(&command)?;
            optimized.insert(path.clone(), name);
            let fraction = PREPARE_SHARE * (k + 1) as f64 / video_sources.len() as f64;
            progress.report(fraction, ExportPhase::Preparing, 0);
        }
        progress.report(PREPARE_SHARE, ExportPhase::Preparing, 0);

        // 2. composite every frame with exact seeks
        let factory = EngineSourceFactory {
            engine: Arc::clone(&self.engine),
            optimized,
            opened: Mutex::new(0),
        };
        let mut compositor = PreviewCompositor::with_policy(
            settings.width,
            settings.height,
            SeekPolicy::Exact,
            Box::new(factory),
        );
        for index in 0..total_frames {
            check_cancel(cancel)?;
            let time = settings.frame_rate.frame_time(index);
            let frame = compositor.render(timeline, time);
            if let Some(failure) = frame.failures.into_iter().next() {
                return Err(failure);
            }
            let jpeg = frame.buffer.encode_jpeg(settings.quality)?;
            self.engine
                .lock()
                .write_input(&format!("frames/frame_{index:06}.jpg"), &jpeg)?;
            self.frames_written = index + 1;
            debug!(frame = index, time, bytes = jpeg.len(), "Frame written");

            let done = (index + 1) as f64 / total_frames as f64;
            let fraction = PREPARE_SHARE + (FRAMES_DONE - PREPARE_SHARE) * done;
            progress.report(fraction, ExportPhase::Frames, index + 1);
        }
        compositor.release_all();

        // 3. stills to video stream
        check_cancel(cancel)?;
        self.scratch.push(VIDEO_OUTPUT.to_string());
        let command = args![
            "-framerate",
            settings.frame_rate.as_ffmpeg_arg(),
            "-i",
            FRAME_PATTERN,
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            VIDEO_OUTPUT,
        ];
        self.engine.lock().run(&command)?;
        progress.report(VIDEO_MUX_DONE, ExportPhase::VideoMux, total_frames);

        // 4. audio aligned to the timeline
        check_cancel(cancel)?;
        let audio = audible_clips(timeline);
        self.scratch.push(FINAL_OUTPUT.to_string());
        let command = if audio.is_empty() {
            args!["-i", VIDEO_OUTPUT, "-c:v", "copy", FINAL_OUTPUT]
        } else {
            let mut command = args!["-i", VIDEO_OUTPUT];
            for clip in &audio {
                let input = self.stage(&clip.source.path)?;
                command.extend(args!["-i", input]);
            }
            command.extend(args![
                "-filter_complex",
                audio_mix_filter(&audio),
                "-map",
                "0:v",
                "-map",
                "[aout]",
                "-c:v",
                "copy",
                "-c:a",
                "aac",
                "-t",
                format!("{duration:.6}"),
                FINAL_OUTPUT,
            ]);
            command
        };
        self.engine.lock().run(&command)?;
        progress.report(AUDIO_MUX_DONE, ExportPhase::AudioMux, total_frames);

        // 5. hand the container to the caller
        let bytes = self.engine.lock().read_output(FINAL_OUTPUT)?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, &bytes)?;
        progress.finish();

        Ok(ExportReport {
            output_path: output.to_path_buf(),
            frames: total_frames,
            bytes: bytes.len(),
            audio_clips: audio.len(),
            elapsed: started.elapsed(),
        })
    }

    /// Copy a source file into the engine once, returning its input name.
    fn stage(&mut self, path: &Path) -> Result<String> {
        if let Some(name) = self.staged.get(path) {
            return Ok(name.clone());
        }
        let data = std::fs::read(path).map_err(|e| {
            FramecutError::EncodeFailure(format!("cannot read source {}: {e}", path.display()))
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("bin");
        let name = format!("input_{}.{ext}", self.staged.len());
        self.engine.lock().write_input(&name, &data)?;
        self.staged.insert(path.to_path_buf(), name.clone());
        self.scratch.push(name.clone());
        Ok(name)
    }

    /// Delete intermediates so the next export starts clean.
    fn cleanup(&mut self) {
        let mut engine = self.engine.lock();
        let frames = (0..self.frames_written).map(|i| format!("frames/frame_{i:06}.jpg"));
        for name in self.scratch.drain(..).chain(frames) {
            if let Err(e) = engine.remove(&name) {
                debug!(file = %name, error = %e, "Cleanup skipped");
            }
        }
    }
}

fn check_cancel(cancel: &ExportCancel) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(FramecutError::ExportCancelled);
    }
    Ok(())
}

/// Distinct source files of clips on unmuted tracks, first use first.
fn visible_sources(timeline: &Timeline, video: bool) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = Vec::new();
    for clip in timeline.clips() {
        let unmuted = clip
            .track_id
            .as_ref()
            .and_then(|id| timeline.track(id))
            .is_some_and(|t| !t.muted);
        if unmuted && clip.is_video() == video && !sources.contains(&clip.source.path) {
            sources.push(clip.source.path.clone());
        }
    }
    sources
}

/// Audio clips on unmuted tracks, by timeline start.
fn audible_clips(timeline: &Timeline) -> Vec<&Clip> {
    let mut clips: Vec<&Clip> = timeline
        .clips()
        .iter()
        .filter(|c| matches!(c.kind, ClipKind::Audio { .. }))
        .filter(|c| {
            c.track_id
                .as_ref()
                .and_then(|id| timeline.track(id))
                .is_some_and(|t| !t.muted)
        })
        .collect();
    clips.sort_by(|a, b| a.track_start_time.total_cmp(&b.track_start_time));
    clips
}

/// `filter_complex` graph trimming each audio input (inputs `1..=n`) to its
/// source span, delaying it to its timeline start and mixing into `[aout]`.
pub fn audio_mix_filter(clips: &[&Clip]) -> String {
    let mut graph = String::new();
    let mut labels = String::new();
    for (k, clip) in clips.iter().enumerate() {
        let delay_ms = (clip.track_start_time * 1000.0).round() as u64;
        graph.push_str(&format!(
            "[{input}:a]atrim=start={start:.6}:end={end:.6},asetpts=PTS-STARTPTS,adelay={delay_ms}|{delay_ms}[a{k}];",
            input = k + 1,
            start = clip.source_in,
            end = clip.source_out,
        ));
        labels.push_str(&format!("[a{k}]"));
    }
    graph.push_str(&format!(
        "{labels}amix=inputs={}:duration=longest:dropout_transition=0[aout]",
        clips.len()
    ));
    graph
}
