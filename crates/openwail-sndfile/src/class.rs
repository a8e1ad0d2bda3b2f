//! In-memory model of one sound class
//!
//! A class carries playback attributes and two sound lists, one per bit
//! depth, each holding at most five raw sound payloads. The lists are kept
//! behind checked mutators so the caps and the remap rule hold no matter
//! how a document is edited.

use crate::error::{Result, SndError};
use crate::wire::{CHANCE_ALWAYS, CHANCE_BUCKETS, CLASS_ID_UNUSED, MAX_SOUNDS_PER_CLASS, VOLUME_SOFT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundClass {
    /// Class ID. -1 marks an unused slot, -2 tells the shuttle to install
    /// the slot empty.
    pub class_id: i16,
    pub volume: i16,
    pub flags: i16,
    /// 0 plays always. Files written by other editors can carry values
    /// outside the known buckets; they are kept verbatim.
    pub chance: i16,
    /// Fixed-point 16.16 pitch bounds. 0 plays as recorded.
    pub low_pitch: i32,
    pub high_pitch: i32,
    pub(crate) sounds_8bit: Vec<Vec<u8>>,
    pub(crate) sounds_16bit: Vec<Vec<u8>>,
    /// When set, the game reuses the 8-bit sounds for 16-bit playback.
    /// The 16-bit list must stay empty while this is on.
    pub(crate) remap_8bit: bool,
}

impl SoundClass {
    pub fn new(class_id: i16) -> Self {
        Self {
            class_id,
            volume: VOLUME_SOFT,
            flags: 0,
            chance: CHANCE_ALWAYS,
            low_pitch: 0,
            high_pitch: 0,
            sounds_8bit: Vec::new(),
            sounds_16bit: Vec::new(),
            remap_8bit: false,
        }
    }

    /// An unused slot. Slots keep their position in the class list, so
    /// clearing a class means replacing it with one of these.
    pub fn unused() -> Self {
        Self::new(CLASS_ID_UNUSED)
    }

    pub fn is_unused(&self) -> bool {
        self.class_id == CLASS_ID_UNUSED
    }

    pub fn sounds_8bit(&self) -> &[Vec<u8>] {
        &self.sounds_8bit
    }

    pub fn sounds_16bit(&self) -> &[Vec<u8>] {
        &self.sounds_16bit
    }

    pub fn remap_8bit(&self) -> bool {
        self.remap_8bit
    }

    pub fn add_sound_8bit(&mut self, sound: Vec<u8>) -> Result<()> {
        if self.sounds_8bit.len() >= MAX_SOUNDS_PER_CLASS {
            return Err(SndError::TooManySounds {
                max: MAX_SOUNDS_PER_CLASS,
            });
        }
        self.sounds_8bit.push(sound);
        Ok(())
    }

    pub fn add_sound_16bit(&mut self, sound: Vec<u8>) -> Result<()> {
        if self.remap_8bit {
            return Err(SndError::RemapForbids16Bit);
        }
        if self.sounds_16bit.len() >= MAX_SOUNDS_PER_CLASS {
            return Err(SndError::TooManySounds {
                max: MAX_SOUNDS_PER_CLASS,
            });
        }
        self.sounds_16bit.push(sound);
        Ok(())
    }

    pub fn remove_sound_8bit(&mut self, index: usize) -> Result<Vec<u8>> {
        if index >= self.sounds_8bit.len() {
            return Err(SndError::SoundOutOfRange {
                index,
                count: self.sounds_8bit.len(),
            });
        }
        Ok(self.sounds_8bit.remove(index))
    }

    pub fn remove_sound_16bit(&mut self, index: usize) -> Result<Vec<u8>> {
        if index >= self.sounds_16bit.len() {
            return Err(SndError::SoundOutOfRange {
                index,
                count: self.sounds_16bit.len(),
            });
        }
        Ok(self.sounds_16bit.remove(index))
    }

    pub fn clear_sounds_8bit(&mut self) {
        self.sounds_8bit.clear();
    }

    pub fn clear_sounds_16bit(&mut self) {
        self.sounds_16bit.clear();
    }

    /// Turn 8-bit remapping on or off. Fails while 16-bit sounds exist;
    /// remove those first.
    pub fn set_remap_8bit(&mut self, remap: bool) -> Result<()> {
        if remap && !self.sounds_16bit.is_empty() {
            return Err(SndError::RemapForbids16Bit);
        }
        self.remap_8bit = remap;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Comparison, used by the diff feature
    // ------------------------------------------------------------------

    /// Field-by-field equality of the playback attributes. Sound lists
    /// and the remap flag are not part of this.
    pub fn attributes_match(&self, other: &SoundClass) -> bool {
        self.class_id == other.class_id
            && self.volume == other.volume
            && self.flags == other.flags
            && self.chance == other.chance
            && self.low_pitch == other.low_pitch
            && self.high_pitch == other.high_pitch
    }

    /// Exact byte equality of the 8-bit lists, position by position.
    /// A count mismatch is a mismatch.
    pub fn sounds_8bit_match(&self, other: &SoundClass) -> bool {
        self.sounds_8bit == other.sounds_8bit
    }

    pub fn sounds_16bit_match(&self, other: &SoundClass) -> bool {
        self.sounds_16bit == other.sounds_16bit
    }
}

/// Snap a chance value to the nearest legal bucket. Editors call this
/// before storing user input; loading never does.
pub fn round_chance(chance: i16) -> i16 {
    let mut best = CHANCE_ALWAYS;
    let mut best_distance = i32::MAX;
    for &bucket in &CHANCE_BUCKETS {
        let distance = (chance as i32 - bucket as i32).abs();
        if distance < best_distance {
            best = bucket;
            best_distance = distance;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{CHANCE_10_PERCENT, CHANCE_90_PERCENT, FLAG_IS_AMBIENT};

    #[test]
    fn caps_sounds_at_five_per_depth() {
        let mut class = SoundClass::new(3);
        for i in 0..5 {
            class.add_sound_8bit(vec![i]).unwrap();
        }
        let err = class.add_sound_8bit(vec![9]).unwrap_err();
        assert!(matches!(err, SndError::TooManySounds { max: 5 }));
        assert_eq!(class.sounds_8bit().len(), 5);
    }

    #[test]
    fn remap_blocks_16bit_sounds() {
        let mut class = SoundClass::new(3);
        class.set_remap_8bit(true).unwrap();
        let err = class.add_sound_16bit(vec![1, 2]).unwrap_err();
        assert!(matches!(err, SndError::RemapForbids16Bit));
        assert!(class.sounds_16bit().is_empty());
    }

    #[test]
    fn remap_refused_while_16bit_sounds_exist() {
        let mut class = SoundClass::new(3);
        class.add_sound_16bit(vec![1, 2]).unwrap();
        let err = class.set_remap_8bit(true).unwrap_err();
        assert!(matches!(err, SndError::RemapForbids16Bit));
        assert!(!class.remap_8bit());

        class.clear_sounds_16bit();
        class.set_remap_8bit(true).unwrap();
        assert!(class.remap_8bit());
    }

    #[test]
    fn remove_checks_range_and_shifts() {
        let mut class = SoundClass::new(3);
        class.add_sound_8bit(vec![1]).unwrap();
        class.add_sound_8bit(vec![2]).unwrap();

        let err = class.remove_sound_8bit(2).unwrap_err();
        assert!(matches!(err, SndError::SoundOutOfRange { index: 2, count: 2 }));

        let removed = class.remove_sound_8bit(0).unwrap();
        assert_eq!(removed, vec![1]);
        assert_eq!(class.sounds_8bit(), &[vec![2]]);
    }

    #[test]
    fn attribute_and_sound_comparison() {
        let mut a = SoundClass::new(7);
        a.volume = 2;
        a.chance = CHANCE_10_PERCENT;
        a.add_sound_8bit(vec![1, 2, 3]).unwrap();

        let mut b = a.clone();
        assert!(a.attributes_match(&b));
        assert!(a.sounds_8bit_match(&b));
        assert!(a.sounds_16bit_match(&b));

        b.flags |= FLAG_IS_AMBIENT;
        assert!(!a.attributes_match(&b));
        assert!(a.sounds_8bit_match(&b), "sound lists are untouched");

        b.flags = a.flags;
        b.add_sound_8bit(vec![4]).unwrap();
        assert!(!a.sounds_8bit_match(&b), "count mismatch is a mismatch");
    }

    #[test]
    fn round_chance_snaps_to_nearest_bucket() {
        assert_eq!(round_chance(CHANCE_10_PERCENT), CHANCE_10_PERCENT);
        assert_eq!(round_chance(0), CHANCE_ALWAYS);
        assert_eq!(round_chance(30000), CHANCE_10_PERCENT);
        assert_eq!(round_chance(i16::MAX), CHANCE_10_PERCENT);
        assert_eq!(round_chance(2000), CHANCE_90_PERCENT);
        assert_eq!(round_chance(1600), CHANCE_ALWAYS);
        assert_eq!(round_chance(-100), CHANCE_ALWAYS);
    }
}
