//! Integration test crate for Framecut.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! The mock engine and media sources stand in for ffmpeg so the export
//! pipeline can be checked command by command.

#[cfg(test)]
mod mocks;

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod playback;

#[cfg(test)]
mod export;
