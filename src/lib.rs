//! subflow - video to translated subtitles
//!
//! Extracts the audio track of a video, transcribes it into timed subtitle
//! entries and translates them, either through a remote translation service
//! (chunked, with a per-chunk timeout) or through locally installed
//! language packages.

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod setup;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
