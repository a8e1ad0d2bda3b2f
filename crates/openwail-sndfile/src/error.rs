//! Error types for sound file parsing and editing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SndError {
    #[error("Failed to read sound file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid sound file format: {0}")]
    InvalidFormat(String),

    #[error("Sound class index {index} out of range (file has {count} classes)")]
    ClassOutOfRange { index: usize, count: usize },

    #[error("Sound index {index} out of range (class has {count} sounds)")]
    SoundOutOfRange { index: usize, count: usize },

    #[error("Sound class already holds the maximum of {max} sounds")]
    TooManySounds { max: usize },

    #[error("Class remaps its 8-bit sounds; 16-bit sounds cannot be added")]
    RemapForbids16Bit,

    #[error("Demo-layout files cannot hold 16-bit sounds")]
    DemoLayoutForbids16Bit,
}

pub type Result<T> = std::result::Result<T, SndError>;
