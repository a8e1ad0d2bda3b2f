//! Conversion between classic Mac 'snd ' resources and the raw sound data
//! embedded in a sound file
//!
//! The container stores each sound without its resource prelude. Every
//! sound the games ship uses the same fixed 20-byte prelude, so embedding
//! is a strip and extraction is a prepend.

use crate::error::{Result, SndError};

/// The format-1 'snd ' resource prelude all embedded sounds carry:
/// format 1, one modifier (sampledSynth, init 0xA0), one command
/// (bufferCmd with the data-offset flag, pointing at byte 20).
/// Big-endian bytes of 0x00010001, 0x00050000, 0x00A00001, 0x80510000,
/// 0x00000014.
pub const MAC_SOUND_HEADER: [u8; 20] = [
    0x00, 0x01, 0x00, 0x01, //
    0x00, 0x05, 0x00, 0x00, //
    0x00, 0xA0, 0x00, 0x01, //
    0x80, 0x51, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x14, //
];

/// Strip the resource prelude off a Mac sound, leaving the raw data the
/// sound file embeds. The prelude bytes are checked, not merely skipped.
pub fn to_marathon_sound(mac_sound: &[u8]) -> Result<Vec<u8>> {
    if mac_sound.len() < MAC_SOUND_HEADER.len() {
        return Err(SndError::InvalidFormat(format!(
            "mac sound is {} bytes, shorter than its {}-byte header",
            mac_sound.len(),
            MAC_SOUND_HEADER.len()
        )));
    }
    if mac_sound[..MAC_SOUND_HEADER.len()] != MAC_SOUND_HEADER {
        return Err(SndError::InvalidFormat(
            "mac sound header does not match a format-1 sampled sound".to_string(),
        ));
    }
    Ok(mac_sound[MAC_SOUND_HEADER.len()..].to_vec())
}

/// Wrap raw embedded sound data back into a playable 'snd ' resource.
pub fn to_mac_sound(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAC_SOUND_HEADER.len() + payload.len());
    out.extend_from_slice(&MAC_SOUND_HEADER);
    out.extend_from_slice(payload);
    out
}
