//! In-memory stand-ins for the codec engine, prober and frame sources.

use framecut_core::{FrameBuffer, FramecutError, Result, Rgba};
use framecut_media::{CodecEngine, FrameSource, FrameSourceFactory, MediaProbe, MediaProber};
use framecut_media::probe::{AudioStreamInfo, VideoStreamInfo};
use framecut_timeline::{Clip, MediaRef};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct EngineState {
    pub loaded: bool,
    pub files: BTreeMap<String, Vec<u8>>,
    pub commands: Vec<Vec<String>>,
    /// Commands writing this output fail.
    pub fail_output: Option<String>,
    /// Frame stills present when the video mux ran.
    pub muxed_frames: usize,
}

/// Codec engine keeping its files in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    pub state: Arc<Mutex<EngineState>>,
}

impl MockEngine {
    pub fn failing_on(output: &str) -> Self {
        let engine = Self::default();
        engine.state.lock().fail_output = Some(output.to_string());
        engine
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.lock().commands.clone()
    }

    /// Commands whose output is `name`.
    pub fn commands_writing(&self, name: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|c| c.last().is_some_and(|o| o == name))
            .collect()
    }

    /// `-ss` values of every single-frame decode, in order.
    pub fn decode_seeks(&self) -> Vec<String> {
        self.commands()
            .iter()
            .filter_map(|c| {
                let pos = c.iter().position(|a| a == "-ss")?;
                c.get(pos + 1).cloned()
            })
            .collect()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).map(String::as_str)
}

impl CodecEngine for MockEngine {
    fn load(&mut self) -> Result<()> {
        self.state.lock().loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    fn write_input(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if !state.loaded {
            return Err(FramecutError::EncodeFailure("engine not loaded".into()));
        }
        state.files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn run(&mut self, args: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        state.commands.push(args.to_vec());
        let output = args
            .last()
            .cloned()
            .ok_or_else(|| FramecutError::EncodeFailure("empty command".into()))?;
        if state.fail_output.as_deref() == Some(output.as_str()) {
            return Err(FramecutError::EncodeFailure(format!("mock failure writing {output}")));
        }

        for (i, arg) in args.iter().enumerate() {
            if arg != "-i" {
                continue;
            }
            let input = args.get(i + 1).map(String::as_str).unwrap_or_default();
            let present = if input.contains('%') {
                state.files.keys().any(|k| k.starts_with("frames/"))
            } else {
                state.files.contains_key(input)
            };
            if !present {
                return Err(FramecutError::EncodeFailure(format!("missing input {input}")));
            }
        }
        if flag_value(args, "-i") == Some("frames/frame_%06d.jpg") {
            state.muxed_frames = state.files.keys().filter(|k| k.starts_with("frames/")).count();
        }

        let bytes = match flag_value(args, "-s").and_then(|s| s.split_once('x')) {
            Some((w, h)) => {
                let w: usize = w.parse().unwrap_or(0);
                let h: usize = h.parse().unwrap_or(0);
                [90u8, 90, 90, 255].repeat(w * h)
            }
            None => format!("mock:{output}").into_bytes(),
        };
        state.files.insert(output, bytes);
        Ok(())
    }

    fn read_output(&mut self, name: &str) -> Result<Vec<u8>> {
        self.state
            .lock()
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| FramecutError::EncodeFailure(format!("no output {name}")))
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        self.state.lock().files.remove(name);
        Ok(())
    }
}

/// Prober answering with a fixed result after an optional delay.
pub struct FixedProber {
    pub probe: MediaProbe,
    pub delay: Duration,
}

impl FixedProber {
    pub fn video(duration: f64, width: u32, height: u32, with_audio: bool) -> Self {
        let audio_streams = if with_audio {
            vec![AudioStreamInfo {
                index: 1,
                codec: "aac".into(),
                sample_rate: 48_000,
                channels: 2,
            }]
        } else {
            Vec::new()
        };
        Self {
            probe: MediaProbe {
                path: String::new(),
                duration,
                video_streams: vec![VideoStreamInfo {
                    index: 0,
                    codec: "h264".into(),
                    width,
                    height,
                }],
                audio_streams,
                format: "mov,mp4,m4a,3gp,3g2,mj2".into(),
            },
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl MediaProber for FixedProber {
    fn probe(&self, path: &Path) -> Result<MediaProbe> {
        std::thread::sleep(self.delay);
        Ok(MediaProbe {
            path: path.display().to_string(),
            ..self.probe.clone()
        })
    }
}

/// Opens sources that fill the frame with one color per source file.
#[derive(Default)]
pub struct SolidFactory {
    pub colors: BTreeMap<String, Rgba>,
    pub opened: Arc<Mutex<Vec<String>>>,
}

struct SolidSource {
    frame: FrameBuffer,
    position: f64,
}

impl FrameSourceFactory for SolidFactory {
    fn open(&self, clip: &Clip) -> Result<Box<dyn FrameSource>> {
        let (width, height) = clip
            .dimensions()
            .ok_or_else(|| FramecutError::Decode(format!("{} has no picture", clip.id)))?;
        let key = clip.source.path.display().to_string();
        let mut frame = FrameBuffer::new(width, height);
        frame.fill(self.colors.get(&key).copied().unwrap_or([255, 255, 255, 255]));
        self.opened.lock().push(clip.id.to_string());
        Ok(Box::new(SolidSource {
            frame,
            position: 0.0,
        }))
    }
}

impl FrameSource for SolidSource {
    fn position(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, time: f64) -> Result<()> {
        self.position = time;
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    fn frame(&mut self) -> Result<&FrameBuffer> {
        Ok(&self.frame)
    }
}

pub fn video_clip(name: &str, path: &Path, duration: f64) -> Clip {
    Clip::new_video(name, MediaRef::new(path, "video/mp4", Some(duration)), 16, 9)
}

pub fn audio_clip(name: &str, path: &Path, duration: f64) -> Clip {
    Clip::new_audio(name, MediaRef::new(path, "audio/wav", Some(duration)))
}
