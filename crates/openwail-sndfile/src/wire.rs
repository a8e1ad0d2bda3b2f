//! On-disk layout of the Marathon 'snd2' sound container
//!
//! All fields are big-endian and packed exactly the way the 68k Mac games
//! wrote them: a 260-byte header, one 64-byte class record per class per
//! sound set (8-bit set first, then 16-bit), then the concatenated sound
//! payload.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, SndError};

// ============================================================================
// Format constants
// ============================================================================

/// File version stored in the header. The games only ever wrote 1.
pub const SOUND_FILE_VERSION: i32 = 1;

/// Four-byte type tag identifying a sound file.
pub const SOUND_FILE_TAG: [u8; 4] = *b"snd2";

/// Byte size of the file header.
pub const HEADER_SIZE: u64 = 260;

/// Byte size of one class record in a set table.
pub const CLASS_RECORD_SIZE: u64 = 64;

/// Set count of a normal file: one 8-bit set and one 16-bit set.
pub const SOURCE_COUNT_NORMAL: i16 = 2;

/// Set count of the M2 Demo Sounds file: 8-bit set only.
pub const SOURCE_COUNT_DEMO: i16 = 1;

/// Most sounds a class can hold per set.
pub const MAX_SOUNDS_PER_CLASS: usize = 5;

/// Class ID of an unused slot.
pub const CLASS_ID_UNUSED: i16 = -1;

/// Tells the shuttle to install the slot as an empty class anyway.
pub const CLASS_ID_UNUSED_BUT_INSTALLED: i16 = -2;

pub const VOLUME_SOFT: i16 = 0;
pub const VOLUME_MEDIUM: i16 = 1;
pub const VOLUME_LOUD: i16 = 2;
/// Seen in ZPC sound files. Meaning unknown.
pub const VOLUME_3: i16 = 3;

pub const FLAG_CANNOT_BE_RESTARTED: i16 = 0x0001;
pub const FLAG_DOESNT_SELF_ABORT: i16 = 0x0002;
pub const FLAG_RESISTS_PITCH_CHANGE: i16 = 0x0004;
pub const FLAG_CANNOT_CHANGE_PITCH: i16 = 0x0008;
pub const FLAG_NO_OBSTRUCT: i16 = 0x0010;
pub const FLAG_NO_MEDIA_OBSTRUCT: i16 = 0x0020;
pub const FLAG_IS_AMBIENT: i16 = 0x0040;

// Chance values come from the M2 source. 0 always plays; higher values
// play less often. The division truncates, which is why the buckets look
// odd, but these exact values are what the game checks against.
pub const CHANCE_10_PERCENT: i16 = (32768 * 9 / 10) as i16;
pub const CHANCE_20_PERCENT: i16 = (32768 * 8 / 10) as i16;
pub const CHANCE_30_PERCENT: i16 = (32768 * 7 / 10) as i16;
pub const CHANCE_40_PERCENT: i16 = (32768 * 6 / 10) as i16;
pub const CHANCE_50_PERCENT: i16 = (32768 * 5 / 10) as i16;
pub const CHANCE_60_PERCENT: i16 = (32768 * 4 / 10) as i16;
pub const CHANCE_70_PERCENT: i16 = (32768 * 3 / 10) as i16;
pub const CHANCE_80_PERCENT: i16 = (32768 * 2 / 10) as i16;
pub const CHANCE_90_PERCENT: i16 = (32768 * 1 / 10) as i16;
pub const CHANCE_ALWAYS: i16 = 0;

/// Every legal chance value, rarest first.
pub const CHANCE_BUCKETS: [i16; 10] = [
    CHANCE_10_PERCENT,
    CHANCE_20_PERCENT,
    CHANCE_30_PERCENT,
    CHANCE_40_PERCENT,
    CHANCE_50_PERCENT,
    CHANCE_60_PERCENT,
    CHANCE_70_PERCENT,
    CHANCE_80_PERCENT,
    CHANCE_90_PERCENT,
    CHANCE_ALWAYS,
];

// ============================================================================
// Header record
// ============================================================================

/// The 260-byte file header.
///
/// Only the set count and class count vary between files; version, tag and
/// the reserved tail are fixed and validated strictly on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundFileHeader {
    /// Number of sound sets: 2 normally, 1 for the demo layout.
    pub source_count: i16,
    /// Number of class record slots in each set table.
    pub class_count: i16,
}

impl SoundFileHeader {
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let version = r.read_i32::<BigEndian>()?;
        if version != SOUND_FILE_VERSION {
            return Err(SndError::InvalidFormat(format!(
                "file version is {}, expected {}",
                version, SOUND_FILE_VERSION
            )));
        }

        let mut tag = [0u8; 4];
        r.read_exact(&mut tag)?;
        if tag != SOUND_FILE_TAG {
            return Err(SndError::InvalidFormat(format!(
                "type tag is {:02x?}, expected 'snd2'",
                tag
            )));
        }

        let source_count = r.read_i16::<BigEndian>()?;
        if source_count != SOURCE_COUNT_NORMAL && source_count != SOURCE_COUNT_DEMO {
            return Err(SndError::InvalidFormat(format!(
                "file has {} sound sets, expected {} (or {} for the demo)",
                source_count, SOURCE_COUNT_NORMAL, SOURCE_COUNT_DEMO
            )));
        }

        let class_count = r.read_i16::<BigEndian>()?;
        if class_count < 0 {
            return Err(SndError::InvalidFormat(format!(
                "negative class count {}",
                class_count
            )));
        }

        let unknown = r.read_i32::<BigEndian>()?;
        if unknown != 0 {
            return Err(SndError::InvalidFormat(format!(
                "reserved header field is {}, expected 0",
                unknown
            )));
        }

        let mut reserved = [0u8; 244];
        r.read_exact(&mut reserved)?;
        if reserved.iter().any(|&b| b != 0) {
            return Err(SndError::InvalidFormat(
                "reserved header block is not zeroed".to_string(),
            ));
        }

        Ok(Self {
            source_count,
            class_count,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_i32::<BigEndian>(SOUND_FILE_VERSION)?;
        w.write_all(&SOUND_FILE_TAG)?;
        w.write_i16::<BigEndian>(self.source_count)?;
        w.write_i16::<BigEndian>(self.class_count)?;
        w.write_i32::<BigEndian>(0)?;
        w.write_all(&[0u8; 244])?;
        Ok(())
    }

    pub fn is_demo_layout(&self) -> bool {
        self.source_count == SOURCE_COUNT_DEMO
    }

    /// File offset of the record for `class` in `set`'s table.
    pub fn class_record_offset(&self, set: usize, class: usize) -> u64 {
        HEADER_SIZE + (set as u64 * self.class_count as u64 + class as u64) * CLASS_RECORD_SIZE
    }

    /// File offset where the sound payload begins, right after the tables.
    pub fn payload_start(&self) -> u64 {
        HEADER_SIZE + self.source_count as u64 * self.class_count as u64 * CLASS_RECORD_SIZE
    }
}

// ============================================================================
// Class record
// ============================================================================

/// One 64-byte class record as stored in a set table.
///
/// Offsets in `sound_offsets` are relative to `first_sound_offset`, which
/// is absolute in the file; `sound_offsets[0]` is always 0. Reserved fields
/// are written as zero and ignored on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundClassRecord {
    pub class_id: i16,
    pub volume: i16,
    pub flags: i16,
    pub chance: i16,
    /// Fixed-point 16.16 pitch multipliers. 0 leaves the pitch as recorded.
    pub low_pitch: i32,
    pub high_pitch: i32,
    pub sound_count: i16,
    pub first_sound_offset: i32,
    pub first_sound_length: i32,
    pub total_length: i32,
    pub sound_offsets: [i32; MAX_SOUNDS_PER_CLASS],
}

impl SoundClassRecord {
    /// Record for an unused slot: ID -1, everything else 0.
    pub fn unused() -> Self {
        Self {
            class_id: CLASS_ID_UNUSED,
            volume: 0,
            flags: 0,
            chance: CHANCE_ALWAYS,
            low_pitch: 0,
            high_pitch: 0,
            sound_count: 0,
            first_sound_offset: 0,
            first_sound_length: 0,
            total_length: 0,
            sound_offsets: [0; MAX_SOUNDS_PER_CLASS],
        }
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let class_id = r.read_i16::<BigEndian>()?;
        let volume = r.read_i16::<BigEndian>()?;
        let flags = r.read_i16::<BigEndian>()?;
        let chance = r.read_i16::<BigEndian>()?;
        let low_pitch = r.read_i32::<BigEndian>()?;
        let high_pitch = r.read_i32::<BigEndian>()?;
        let sound_count = r.read_i16::<BigEndian>()?;
        let _reserved = r.read_i16::<BigEndian>()?;
        let first_sound_offset = r.read_i32::<BigEndian>()?;
        let first_sound_length = r.read_i32::<BigEndian>()?;
        let total_length = r.read_i32::<BigEndian>()?;
        let mut sound_offsets = [0i32; MAX_SOUNDS_PER_CLASS];
        for offset in &mut sound_offsets {
            *offset = r.read_i32::<BigEndian>()?;
        }
        let _reserved5 = r.read_i32::<BigEndian>()?;
        let _reserved6 = r.read_i32::<BigEndian>()?;
        let _reserved7 = r.read_i32::<BigEndian>()?;

        Ok(Self {
            class_id,
            volume,
            flags,
            chance,
            low_pitch,
            high_pitch,
            sound_count,
            first_sound_offset,
            first_sound_length,
            total_length,
            sound_offsets,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_i16::<BigEndian>(self.class_id)?;
        w.write_i16::<BigEndian>(self.volume)?;
        w.write_i16::<BigEndian>(self.flags)?;
        w.write_i16::<BigEndian>(self.chance)?;
        w.write_i32::<BigEndian>(self.low_pitch)?;
        w.write_i32::<BigEndian>(self.high_pitch)?;
        w.write_i16::<BigEndian>(self.sound_count)?;
        w.write_i16::<BigEndian>(0)?;
        w.write_i32::<BigEndian>(self.first_sound_offset)?;
        w.write_i32::<BigEndian>(self.first_sound_length)?;
        w.write_i32::<BigEndian>(self.total_length)?;
        for offset in &self.sound_offsets {
            w.write_i32::<BigEndian>(*offset)?;
        }
        w.write_i32::<BigEndian>(0)?;
        w.write_i32::<BigEndian>(0)?;
        w.write_i32::<BigEndian>(0)?;
        Ok(())
    }

    /// Structural sanity of a record read from a file. Unused slots pass
    /// unconditionally; their fields are never consulted.
    pub fn validate(&self) -> Result<()> {
        if self.class_id == CLASS_ID_UNUSED {
            return Ok(());
        }
        if self.sound_count < 0 || self.sound_count as usize > MAX_SOUNDS_PER_CLASS {
            return Err(SndError::InvalidFormat(format!(
                "class {} declares {} sounds, at most {} fit",
                self.class_id, self.sound_count, MAX_SOUNDS_PER_CLASS
            )));
        }
        if self.sound_count == 0 {
            return Ok(());
        }
        if self.first_sound_offset < 0 {
            return Err(SndError::InvalidFormat(format!(
                "class {} has negative sound offset {}",
                self.class_id, self.first_sound_offset
            )));
        }
        if self.sound_offsets[0] != 0 {
            return Err(SndError::InvalidFormat(format!(
                "class {}: first relative sound offset is {}, not 0",
                self.class_id, self.sound_offsets[0]
            )));
        }
        let count = self.sound_count as usize;
        for i in 1..count {
            if self.sound_offsets[i] < self.sound_offsets[i - 1] {
                return Err(SndError::InvalidFormat(format!(
                    "class {}: sound offsets are not in file order",
                    self.class_id
                )));
            }
        }
        if self.total_length < self.sound_offsets[count - 1] {
            return Err(SndError::InvalidFormat(format!(
                "class {}: total length {} is shorter than the last sound offset {}",
                self.class_id,
                self.total_length,
                self.sound_offsets[count - 1]
            )));
        }
        Ok(())
    }

    /// Whether this record points at the same payload run as `other`.
    /// A 16-bit record mirroring its 8-bit partner this way is the
    /// on-disk encoding of 8-bit remapping. The byte totals must agree:
    /// two runs can share a start offset when one of them is empty.
    pub fn mirrors(&self, other: &SoundClassRecord) -> bool {
        self.sound_count > 0
            && self.sound_count == other.sound_count
            && self.first_sound_offset == other.first_sound_offset
            && self.total_length == other.total_length
    }

    /// Byte length of sound `index`, derived from the offset table.
    /// The last sound runs to `total_length`; earlier ones end where the
    /// next begins.
    pub fn sound_length(&self, index: usize) -> i32 {
        if index + 1 < self.sound_count as usize {
            self.sound_offsets[index + 1] - self.sound_offsets[index]
        } else {
            self.total_length - self.sound_offsets[index]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(source_count: i16, class_count: i16) -> Vec<u8> {
        let mut buf = Vec::new();
        SoundFileHeader {
            source_count,
            class_count,
        }
        .write_to(&mut buf)
        .unwrap();
        buf
    }

    #[test]
    fn header_round_trips() {
        let bytes = header_bytes(2, 291);
        assert_eq!(bytes.len() as u64, HEADER_SIZE);
        let header = SoundFileHeader::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(header.source_count, 2);
        assert_eq!(header.class_count, 291);
        assert!(!header.is_demo_layout());
    }

    #[test]
    fn demo_header_accepted() {
        let bytes = header_bytes(1, 10);
        let header = SoundFileHeader::read_from(&mut Cursor::new(bytes)).unwrap();
        assert!(header.is_demo_layout());
    }

    #[test]
    fn header_rejects_bad_version() {
        let mut bytes = header_bytes(2, 10);
        bytes[3] = 9;
        let err = SoundFileHeader::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, SndError::InvalidFormat(_)), "got {:?}", err);
    }

    #[test]
    fn header_rejects_bad_tag() {
        let mut bytes = header_bytes(2, 10);
        bytes[4..8].copy_from_slice(b"snd1");
        let err = SoundFileHeader::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, SndError::InvalidFormat(_)), "got {:?}", err);
    }

    #[test]
    fn header_rejects_bad_set_counts() {
        for source_count in [0i16, 3, -1] {
            let bytes = header_bytes(source_count, 10);
            let err = SoundFileHeader::read_from(&mut Cursor::new(bytes)).unwrap_err();
            assert!(
                matches!(err, SndError::InvalidFormat(_)),
                "set count {} got {:?}",
                source_count,
                err
            );
        }
    }

    #[test]
    fn header_rejects_dirty_reserved_block() {
        let mut bytes = header_bytes(2, 10);
        bytes[100] = 1;
        let err = SoundFileHeader::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, SndError::InvalidFormat(_)), "got {:?}", err);
    }

    #[test]
    fn header_offsets() {
        let header = SoundFileHeader {
            source_count: 2,
            class_count: 10,
        };
        assert_eq!(header.class_record_offset(0, 0), 260);
        assert_eq!(header.class_record_offset(0, 3), 260 + 3 * 64);
        assert_eq!(header.class_record_offset(1, 0), 260 + 10 * 64);
        assert_eq!(header.payload_start(), 260 + 2 * 10 * 64);
    }

    #[test]
    fn class_record_round_trips() {
        let record = SoundClassRecord {
            class_id: 42,
            volume: VOLUME_LOUD,
            flags: FLAG_IS_AMBIENT | FLAG_NO_OBSTRUCT,
            chance: CHANCE_50_PERCENT,
            low_pitch: 0x0000_8000,
            high_pitch: 0x0002_0000,
            sound_count: 3,
            first_sound_offset: 0x1000,
            first_sound_length: 100,
            total_length: 450,
            sound_offsets: [0, 100, 250, 0, 0],
        };
        let mut buf = Vec::new();
        record.write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, CLASS_RECORD_SIZE);
        let back = SoundClassRecord::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn unused_record_is_all_zero_but_id() {
        let mut buf = Vec::new();
        SoundClassRecord::unused().write_to(&mut buf).unwrap();
        assert_eq!(buf[0], 0xFF);
        assert_eq!(buf[1], 0xFF);
        assert!(buf[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn validate_rejects_too_many_sounds() {
        let mut record = SoundClassRecord::unused();
        record.class_id = 7;
        record.sound_count = 6;
        assert!(record.validate().is_err());
    }

    #[test]
    fn validate_rejects_unordered_offsets() {
        let mut record = SoundClassRecord::unused();
        record.class_id = 7;
        record.sound_count = 3;
        record.total_length = 300;
        record.sound_offsets = [0, 200, 100, 0, 0];
        assert!(record.validate().is_err());
    }

    #[test]
    fn validate_rejects_nonzero_first_relative_offset() {
        let mut record = SoundClassRecord::unused();
        record.class_id = 7;
        record.sound_count = 1;
        record.total_length = 50;
        record.sound_offsets[0] = 10;
        assert!(record.validate().is_err());
    }

    #[test]
    fn mirror_detection_requires_the_same_run() {
        let rec8 = SoundClassRecord {
            class_id: 9,
            sound_count: 2,
            first_sound_offset: 900,
            total_length: 120,
            sound_offsets: [0, 60, 0, 0, 0],
            first_sound_length: 60,
            ..SoundClassRecord::unused()
        };
        assert!(rec8.mirrors(&rec8), "an exact copy is a mirror");

        // Same start offset but a different byte total is a different run.
        let mut longer = rec8;
        longer.total_length = 200;
        assert!(!longer.mirrors(&rec8));

        let mut counted = rec8;
        counted.sound_count = 1;
        assert!(!counted.mirrors(&rec8));

        let empty = SoundClassRecord::unused();
        assert!(!empty.mirrors(&empty), "empty records never mirror");
    }

    #[test]
    fn sound_lengths_derive_from_offsets() {
        let record = SoundClassRecord {
            class_id: 1,
            sound_count: 3,
            total_length: 450,
            sound_offsets: [0, 100, 250, 0, 0],
            first_sound_offset: 4096,
            first_sound_length: 100,
            ..SoundClassRecord::unused()
        };
        assert_eq!(record.sound_length(0), 100);
        assert_eq!(record.sound_length(1), 150);
        assert_eq!(record.sound_length(2), 200);
    }

    #[test]
    fn chance_buckets_match_game_tables() {
        assert_eq!(CHANCE_10_PERCENT, 29491);
        assert_eq!(CHANCE_50_PERCENT, 16384);
        assert_eq!(CHANCE_90_PERCENT, 3276);
        assert_eq!(CHANCE_ALWAYS, 0);
    }
}
