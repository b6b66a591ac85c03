//! Framecut Timeline - Timeline data model
//!
//! Implements the composition graph for editing:
//! - Clips cut from media sources, split and trimmed in place
//! - Typed tracks that keep their clips from overlapping
//! - The timeline owning both, with transport state and zoom
//! - Change events and versioned project files

pub mod clip;
pub mod events;
pub mod serialization;
pub mod timeline;
pub mod track;

pub use clip::{Clip, ClipId, ClipKind, MediaRef, ResizeEdge};
pub use events::{EventBus, TimelineEvent};
pub use serialization::ProjectFile;
pub use timeline::{ActiveClip, Timeline, TimelineSnapshot, TrackSnapshot, TransportState};
pub use track::{ActiveClips, Track, TrackId, TrackKind, TrackSlot};
