//! Marathon 'snd2' sound-container codec
//!
//! This crate handles:
//! - Parsing and writing the container (header, two set tables, payload)
//! - The in-memory class model and its editing rules
//! - Mac 'snd ' resource conversion for import/export
//! - Reducing a document to its differences against another document

pub mod class;
mod compare;
pub mod document;
pub mod error;
pub mod macsnd;
pub mod view;
pub mod wire;

pub use class::{round_chance, SoundClass};
pub use document::SoundFile;
pub use error::{Result, SndError};
pub use view::StreamView;
pub use wire::{SoundClassRecord, SoundFileHeader};

pub use openwail_common::CompareMode;
