//! The sound file document and its container codec
//!
//! Loading merges the two parallel set tables into one class list; saving
//! flattens the list back out, recomputing every offset and length from
//! the in-memory sound data in a single forward pass. Nothing stored in a
//! record is ever trusted over the bytes actually present.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::class::SoundClass;
use crate::error::{Result, SndError};
use crate::wire::{
    SoundClassRecord, SoundFileHeader, CLASS_ID_UNUSED, SOURCE_COUNT_DEMO, SOURCE_COUNT_NORMAL,
};

/// A loaded (or freshly built) sound file.
///
/// `classes` is in slot order: a class's position in the vector is its
/// class index in the file, and unused slots stay in place to keep the
/// indices of everything behind them stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoundFile {
    pub classes: Vec<SoundClass>,
    demo_layout: bool,
}

impl SoundFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this document uses the M2 Demo layout (single 8-bit set,
    /// no 16-bit sounds anywhere).
    pub fn demo_layout(&self) -> bool {
        self.demo_layout
    }

    /// Switch the demo layout on or off. Turning it on is refused while
    /// any class holds 16-bit sounds.
    pub fn set_demo_layout(&mut self, demo: bool) -> Result<()> {
        if demo && self.classes.iter().any(|c| !c.sounds_16bit.is_empty()) {
            return Err(SndError::DemoLayoutForbids16Bit);
        }
        self.demo_layout = demo;
        Ok(())
    }

    pub fn class(&self, index: usize) -> Result<&SoundClass> {
        self.classes.get(index).ok_or(SndError::ClassOutOfRange {
            index,
            count: self.classes.len(),
        })
    }

    pub fn class_mut(&mut self, index: usize) -> Result<&mut SoundClass> {
        let count = self.classes.len();
        self.classes
            .get_mut(index)
            .ok_or(SndError::ClassOutOfRange { index, count })
    }

    /// Append a class slot.
    pub fn push_class(&mut self, class: SoundClass) -> Result<()> {
        if self.demo_layout && !class.sounds_16bit.is_empty() {
            return Err(SndError::DemoLayoutForbids16Bit);
        }
        if self.classes.len() >= i16::MAX as usize {
            return Err(SndError::InvalidFormat(
                "class table is full; the class count is a 16-bit field".to_string(),
            ));
        }
        self.classes.push(class);
        Ok(())
    }

    /// Remove a class slot entirely, shifting the indices of every class
    /// behind it. Use `SoundClass::unused()` assignment to clear a slot
    /// in place instead.
    pub fn remove_class(&mut self, index: usize) -> Result<SoundClass> {
        if index >= self.classes.len() {
            return Err(SndError::ClassOutOfRange {
                index,
                count: self.classes.len(),
            });
        }
        Ok(self.classes.remove(index))
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Read a whole sound file. Either every class and sound arrives in
    /// memory or an error comes back and nothing does.
    pub fn load<R: Read + Seek>(r: &mut R) -> Result<SoundFile> {
        let header = SoundFileHeader::read_from(r)?;
        let demo_layout = header.is_demo_layout();
        let class_count = header.class_count as usize;

        let stream_len = r.seek(SeekFrom::End(0))?;
        if stream_len < header.payload_start() {
            return Err(SndError::InvalidFormat(format!(
                "file is {} bytes, too small for {} declared classes",
                stream_len, class_count
            )));
        }
        r.seek(SeekFrom::Start(header.class_record_offset(0, 0)))?;

        let mut set_8bit = Vec::with_capacity(class_count);
        for _ in 0..class_count {
            set_8bit.push(SoundClassRecord::read_from(r)?);
        }
        let mut set_16bit = Vec::new();
        if !demo_layout {
            set_16bit.reserve(class_count);
            for _ in 0..class_count {
                set_16bit.push(SoundClassRecord::read_from(r)?);
            }
        }

        let mut classes = Vec::with_capacity(class_count);
        for index in 0..class_count {
            classes.push(read_class(r, stream_len, index, &set_8bit[index], set_16bit.get(index))?);
        }

        tracing::debug!(
            "Loaded {} classes, {} in use{}",
            classes.len(),
            classes.iter().filter(|c| !c.is_unused()).count(),
            if demo_layout { " (demo layout)" } else { "" },
        );

        Ok(SoundFile {
            classes,
            demo_layout,
        })
    }

    // ========================================================================
    // Saving
    // ========================================================================

    /// Write the whole document in one forward pass: header, 8-bit table,
    /// 16-bit table (normal layout only), then the sound payload in class
    /// order. A slot whose ID is -1 is written as an unused record; any
    /// data it carries is not stored.
    pub fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        if self.classes.len() > i16::MAX as usize {
            return Err(SndError::InvalidFormat(format!(
                "{} classes cannot be stored in a 16-bit class count",
                self.classes.len()
            )));
        }
        if self.demo_layout && self.classes.iter().any(|c| !c.sounds_16bit.is_empty()) {
            return Err(SndError::DemoLayoutForbids16Bit);
        }

        let header = SoundFileHeader {
            source_count: if self.demo_layout {
                SOURCE_COUNT_DEMO
            } else {
                SOURCE_COUNT_NORMAL
            },
            class_count: self.classes.len() as i16,
        };

        // Lay the payload out first so every record carries final offsets.
        let mut cursor = header.payload_start();
        let mut records_8bit = Vec::with_capacity(self.classes.len());
        let mut records_16bit = Vec::with_capacity(self.classes.len());
        for class in &self.classes {
            let rec8 = build_record(class, &class.sounds_8bit, cursor)?;
            cursor += rec8.total_length as u64;
            // A remapped class writes a 16-bit record that mirrors the
            // 8-bit one; the payload bytes serve both sets.
            let rec16 = if class.remap_8bit {
                rec8
            } else {
                let rec = build_record(class, &class.sounds_16bit, cursor)?;
                cursor += rec.total_length as u64;
                rec
            };
            records_8bit.push(rec8);
            records_16bit.push(rec16);
        }

        header.write_to(w)?;
        for record in &records_8bit {
            record.write_to(w)?;
        }
        if !self.demo_layout {
            for record in &records_16bit {
                record.write_to(w)?;
            }
        }
        for class in &self.classes {
            if class.is_unused() {
                continue;
            }
            for sound in &class.sounds_8bit {
                w.write_all(sound)?;
            }
            if !class.remap_8bit {
                for sound in &class.sounds_16bit {
                    w.write_all(sound)?;
                }
            }
        }

        tracing::debug!(
            "Saved {} classes, {} payload bytes",
            self.classes.len(),
            cursor - header.payload_start(),
        );
        Ok(())
    }
}

fn read_class<R: Read + Seek>(
    r: &mut R,
    stream_len: u64,
    index: usize,
    rec8: &SoundClassRecord,
    rec16: Option<&SoundClassRecord>,
) -> Result<SoundClass> {
    if let Some(rec16) = rec16 {
        if rec16.class_id != rec8.class_id {
            return Err(SndError::InvalidFormat(format!(
                "slot {}: the set tables disagree on the class ID ({} vs {})",
                index, rec8.class_id, rec16.class_id
            )));
        }
    }
    if rec8.class_id == CLASS_ID_UNUSED {
        return Ok(SoundClass::unused());
    }

    rec8.validate()?;
    if let Some(rec16) = rec16 {
        rec16.validate()?;
    }

    let mut class = SoundClass::new(rec8.class_id);
    class.volume = rec8.volume;
    class.flags = rec8.flags;
    class.chance = rec8.chance;
    class.low_pitch = rec8.low_pitch;
    class.high_pitch = rec8.high_pitch;

    class.sounds_8bit = read_set_sounds(r, stream_len, rec8)?;

    if let Some(rec16) = rec16 {
        // A 16-bit record sitting on the same file position with the same
        // count is the remap encoding; the run is not read twice.
        if rec16.mirrors(rec8) {
            class.remap_8bit = true;
        } else {
            class.sounds_16bit = read_set_sounds(r, stream_len, rec16)?;
        }
    }

    Ok(class)
}

fn read_set_sounds<R: Read + Seek>(
    r: &mut R,
    stream_len: u64,
    record: &SoundClassRecord,
) -> Result<Vec<Vec<u8>>> {
    let count = record.sound_count.max(0) as usize;
    let mut sounds = Vec::with_capacity(count);
    for i in 0..count {
        let length = record.sound_length(i) as u64;
        let offset = record.first_sound_offset as u64 + record.sound_offsets[i] as u64;
        if offset + length > stream_len {
            return Err(SndError::InvalidFormat(format!(
                "class {}: sound {} runs past the end of the file",
                record.class_id, i
            )));
        }
        r.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; length as usize];
        r.read_exact(&mut data)?;
        sounds.push(data);
    }
    Ok(sounds)
}

fn build_record(
    class: &SoundClass,
    sounds: &[Vec<u8>],
    payload_cursor: u64,
) -> Result<SoundClassRecord> {
    if class.is_unused() {
        return Ok(SoundClassRecord::unused());
    }

    let mut record = SoundClassRecord::unused();
    record.class_id = class.class_id;
    record.volume = class.volume;
    record.flags = class.flags;
    record.chance = class.chance;
    record.low_pitch = class.low_pitch;
    record.high_pitch = class.high_pitch;
    record.sound_count = sounds.len() as i16;

    let mut relative = 0u64;
    for (i, sound) in sounds.iter().enumerate() {
        record.sound_offsets[i] = to_file_size(relative)?;
        relative += sound.len() as u64;
    }
    record.total_length = to_file_size(relative)?;
    // A run of nothing but zero-length blobs occupies no payload bytes
    // and keeps offset 0 rather than pointing at whichever run's bytes
    // start at the cursor.
    if relative > 0 {
        record.first_sound_offset = to_file_size(payload_cursor)?;
        record.first_sound_length = to_file_size(sounds[0].len() as u64)?;
    }
    Ok(record)
}

fn to_file_size(value: u64) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        SndError::InvalidFormat("sound payload too large for the format's 32-bit offsets".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{CHANCE_50_PERCENT, FLAG_IS_AMBIENT, VOLUME_LOUD};
    use std::io::Cursor;

    /// Four slots: a class with both depths, an unused slot, a remapped
    /// class, and a used class with no sounds at all.
    fn fixture() -> SoundFile {
        let mut file = SoundFile::new();

        let mut growl = SoundClass::new(10);
        growl.volume = VOLUME_LOUD;
        growl.flags = FLAG_IS_AMBIENT;
        growl.chance = CHANCE_50_PERCENT;
        growl.low_pitch = 0x0000_8000;
        growl.high_pitch = 0x0002_0000;
        growl.add_sound_8bit(vec![1; 100]).unwrap();
        growl.add_sound_8bit(vec![2; 50]).unwrap();
        growl.add_sound_16bit(vec![3; 200]).unwrap();
        file.push_class(growl).unwrap();

        file.push_class(SoundClass::unused()).unwrap();

        let mut door = SoundClass::new(20);
        door.add_sound_8bit(vec![4; 80]).unwrap();
        door.set_remap_8bit(true).unwrap();
        file.push_class(door).unwrap();

        file.push_class(SoundClass::new(30)).unwrap();

        file
    }

    fn save_to_bytes(file: &SoundFile) -> Vec<u8> {
        let mut buf = Vec::new();
        file.save(&mut buf).unwrap();
        buf
    }

    #[test]
    fn round_trips_field_for_field() {
        let file = fixture();
        let bytes = save_to_bytes(&file);
        let back = SoundFile::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn zero_length_8bit_sounds_do_not_turn_into_a_remap() {
        let mut file = SoundFile::new();
        let mut hiss = SoundClass::new(12);
        hiss.add_sound_8bit(Vec::new()).unwrap();
        hiss.add_sound_8bit(Vec::new()).unwrap();
        hiss.add_sound_16bit(vec![0xAA; 40]).unwrap();
        hiss.add_sound_16bit(vec![0xBB; 24]).unwrap();
        file.push_class(hiss).unwrap();

        let bytes = save_to_bytes(&file);
        let back = SoundFile::load(&mut Cursor::new(bytes)).unwrap();

        assert!(
            !back.classes[0].remap_8bit(),
            "a zero-byte 8-bit run is not a remap"
        );
        assert_eq!(back.classes[0].sounds_16bit().len(), 2);
        assert_eq!(back, file);
    }

    #[test]
    fn nonstandard_chance_survives_a_round_trip() {
        let mut file = SoundFile::new();
        let mut class = SoundClass::new(3);
        class.chance = 12345;
        class.add_sound_8bit(vec![9; 16]).unwrap();
        file.push_class(class).unwrap();

        let bytes = save_to_bytes(&file);
        let back = SoundFile::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(back.classes[0].chance, 12345, "chance is stored verbatim");
    }

    #[test]
    fn round_trips_demo_layout() {
        let mut file = SoundFile::new();
        let mut class = SoundClass::new(5);
        class.add_sound_8bit(vec![7; 42]).unwrap();
        file.push_class(class).unwrap();
        file.set_demo_layout(true).unwrap();

        let bytes = save_to_bytes(&file);
        let back = SoundFile::load(&mut Cursor::new(bytes.clone())).unwrap();
        assert!(back.demo_layout());
        assert_eq!(back, file);

        // Single set table: header + n records + payload, nothing else.
        assert_eq!(bytes.len(), 260 + 64 + 42);
    }

    #[test]
    fn saved_tables_carry_recomputed_offsets() {
        let bytes = save_to_bytes(&fixture());
        let mut cursor = Cursor::new(&bytes);
        let header = SoundFileHeader::read_from(&mut cursor).unwrap();
        assert_eq!(header.class_count, 4);

        let mut set_8bit = Vec::new();
        let mut set_16bit = Vec::new();
        for _ in 0..4 {
            set_8bit.push(SoundClassRecord::read_from(&mut cursor).unwrap());
        }
        for _ in 0..4 {
            set_16bit.push(SoundClassRecord::read_from(&mut cursor).unwrap());
        }

        let payload_start = header.payload_start() as i32;

        // Class 10: two 8-bit sounds at the start of the payload, the
        // 16-bit sound right behind them.
        assert_eq!(set_8bit[0].first_sound_offset, payload_start);
        assert_eq!(set_8bit[0].sound_offsets[..2], [0, 100]);
        assert_eq!(set_8bit[0].first_sound_length, 100);
        assert_eq!(set_8bit[0].total_length, 150);
        assert_eq!(set_16bit[0].first_sound_offset, payload_start + 150);
        assert_eq!(set_16bit[0].total_length, 200);

        // Unused slot writes -1 records in both sets.
        assert_eq!(set_8bit[1], SoundClassRecord::unused());
        assert_eq!(set_16bit[1], SoundClassRecord::unused());

        // The remapped class's 16-bit record mirrors its 8-bit record.
        assert_eq!(set_8bit[2].first_sound_offset, payload_start + 350);
        assert_eq!(set_16bit[2], set_8bit[2]);

        // Used class with no sounds: zero counts and offsets, real ID.
        assert_eq!(set_8bit[3].class_id, 30);
        assert_eq!(set_8bit[3].sound_count, 0);
        assert_eq!(set_8bit[3].total_length, 0);

        // Payload: 100 + 50 + 200 + 80 bytes, the remap run stored once.
        assert_eq!(bytes.len() as u64, header.payload_start() + 430);
    }

    #[test]
    fn remap_survives_the_round_trip() {
        let bytes = save_to_bytes(&fixture());
        let back = SoundFile::load(&mut Cursor::new(bytes)).unwrap();
        let door = &back.classes[2];
        assert!(door.remap_8bit());
        assert_eq!(door.sounds_8bit().len(), 1);
        assert!(door.sounds_16bit().is_empty());
    }

    #[test]
    fn demo_layout_refuses_16bit_sounds() {
        let mut file = SoundFile::new();
        let mut class = SoundClass::new(1);
        class.add_sound_16bit(vec![1, 2, 3]).unwrap();
        file.push_class(class).unwrap();

        let err = file.set_demo_layout(true).unwrap_err();
        assert!(matches!(err, SndError::DemoLayoutForbids16Bit));
    }

    #[test]
    fn load_rejects_truncated_table() {
        let mut bytes = save_to_bytes(&fixture());
        bytes.truncate(300);
        let err = SoundFile::load(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, SndError::InvalidFormat(_)), "got {:?}", err);
    }

    #[test]
    fn load_rejects_sound_running_past_eof() {
        let header = SoundFileHeader {
            source_count: 2,
            class_count: 1,
        };
        let mut rec8 = SoundClassRecord::unused();
        rec8.class_id = 3;
        rec8.sound_count = 1;
        rec8.first_sound_offset = header.payload_start() as i32;
        rec8.first_sound_length = 1000;
        rec8.total_length = 1000;
        let mut rec16 = SoundClassRecord::unused();
        rec16.class_id = 3;

        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        rec8.write_to(&mut bytes).unwrap();
        rec16.write_to(&mut bytes).unwrap();
        bytes.extend_from_slice(&[0u8; 10]); // far short of the declared 1000

        let err = SoundFile::load(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, SndError::InvalidFormat(_)), "got {:?}", err);
    }

    #[test]
    fn load_rejects_disagreeing_set_tables() {
        let header = SoundFileHeader {
            source_count: 2,
            class_count: 1,
        };
        let mut rec8 = SoundClassRecord::unused();
        rec8.class_id = 3;
        let mut rec16 = SoundClassRecord::unused();
        rec16.class_id = 4;

        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        rec8.write_to(&mut bytes).unwrap();
        rec16.write_to(&mut bytes).unwrap();

        let err = SoundFile::load(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, SndError::InvalidFormat(_)), "got {:?}", err);
    }

    #[test]
    fn class_accessors_check_range() {
        let file = fixture();
        assert!(file.class(3).is_ok());
        let err = file.class(4).unwrap_err();
        assert!(matches!(err, SndError::ClassOutOfRange { index: 4, count: 4 }));
    }

    #[test]
    fn empty_document_round_trips() {
        let file = SoundFile::new();
        let bytes = save_to_bytes(&file);
        assert_eq!(bytes.len(), 260);
        let back = SoundFile::load(&mut Cursor::new(bytes)).unwrap();
        assert!(back.classes.is_empty());
        assert!(!back.demo_layout());
    }
}
