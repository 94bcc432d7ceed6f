//! Subtrans - Embedded Subtitle Translation
//!
//! Reads the text subtitle track of media files, translates the cues in
//! paced batches and writes bilingual SRT files next to the media.

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod subtitle;
pub mod translate;
pub mod workflow;
