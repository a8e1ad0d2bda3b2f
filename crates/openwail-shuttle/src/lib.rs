//! Shuttle patch construction.
//!
//! A shuttle reads an existing sound file and writes a patch file that
//! carries only a chosen subset of its classes. The header and both class
//! tables are read and checked up front; sound payloads stay on disk until
//! their class is installed, then stream straight from source to
//! destination in fixed-size chunks. A multi-megabyte source never has to
//! sit in memory.
//!
//! The patch keeps the source's slot layout: every class slot is present
//! in the destination tables, with unselected slots written as unused
//! records. Slot N of the patch always means the same class as slot N of
//! the source.

use std::io::{self, Read, Seek, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use openwail_sndfile::wire::{CLASS_ID_UNUSED, CLASS_ID_UNUSED_BUT_INSTALLED};
use openwail_sndfile::{SndError, SoundClassRecord, SoundFileHeader, StreamView};

// ============================================================
// Errors
// ============================================================

#[derive(Error, Debug)]
pub enum ShuttleError {
    #[error("Failed to read or write a patch stream: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Sound file error: {0}")]
    SndError(#[from] SndError),

    #[error("Class index {index} out of range (the source has {count} classes)")]
    ClassOutOfRange { index: usize, count: usize },

    #[error("The selection cannot change once installation has begun")]
    SelectionClosed,
}

pub type Result<T> = std::result::Result<T, ShuttleError>;

// ============================================================
// Selection and state
// ============================================================

/// What the shuttle does with one source class slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallAction {
    /// Leave the destination slot unused.
    Skip,
    /// Copy the class record and its sounds from the source.
    Install,
    /// Write an installed-but-empty slot (ID -2, no sounds).
    InstallEmpty,
}

/// Installation steps, advanced one per [`ShuttleWork::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuttleState {
    InstallHeader,
    InstallTables,
    InstallClass(usize),
    Finalize,
    Done,
}

/// Sound bytes move through a buffer this large.
const COPY_CHUNK: usize = 64 * 1024;

// ============================================================
// Shuttle work
// ============================================================

/// An in-progress patch build from a source stream to a destination
/// writer. Selections are made first, then the state machine is pumped
/// with [`run`](ShuttleWork::run) or stepped manually.
#[derive(Debug)]
pub struct ShuttleWork<R, W> {
    source: R,
    dest: W,
    header: SoundFileHeader,
    set_8bit: Vec<SoundClassRecord>,
    /// Empty for demo-layout sources, which carry no 16-bit table.
    set_16bit: Vec<SoundClassRecord>,
    actions: Vec<InstallAction>,
    state: ShuttleState,
}

impl<R: Read + Seek, W: Write> ShuttleWork<R, W> {
    /// Open a source and prime the destination. The source header and
    /// class tables are read and checked here; a table that fails its
    /// checks rejects the whole source.
    pub fn new(mut source: R, dest: W) -> Result<Self> {
        let header = SoundFileHeader::read_from(&mut source)?;
        let class_count = header.class_count as usize;

        let mut set_8bit = Vec::with_capacity(class_count);
        for _ in 0..class_count {
            set_8bit.push(SoundClassRecord::read_from(&mut source)?);
        }
        let mut set_16bit = Vec::new();
        if !header.is_demo_layout() {
            set_16bit.reserve(class_count);
            for _ in 0..class_count {
                set_16bit.push(SoundClassRecord::read_from(&mut source)?);
            }
        }

        for (index, rec8) in set_8bit.iter().enumerate() {
            rec8.validate()?;
            if let Some(rec16) = set_16bit.get(index) {
                rec16.validate()?;
                if rec16.class_id != rec8.class_id {
                    return Err(SndError::InvalidFormat(format!(
                        "slot {}: the set tables disagree on the class ID ({} vs {})",
                        index, rec8.class_id, rec16.class_id
                    ))
                    .into());
                }
            }
        }

        tracing::debug!("Shuttle source holds {} class slots", class_count);

        Ok(Self {
            source,
            dest,
            header,
            set_8bit,
            set_16bit,
            actions: vec![InstallAction::Skip; class_count],
            state: ShuttleState::InstallHeader,
        })
    }

    /// Number of class slots in the source (and so in the patch).
    pub fn class_count(&self) -> usize {
        self.actions.len()
    }

    pub fn state(&self) -> ShuttleState {
        self.state
    }

    /// Install `class` from the source into the patch.
    pub fn select(&mut self, class: usize) -> Result<()> {
        self.set_action(class, InstallAction::Install)
    }

    /// Install `class` as an empty slot (ID -2), regardless of what the
    /// source holds there.
    pub fn select_empty(&mut self, class: usize) -> Result<()> {
        self.set_action(class, InstallAction::InstallEmpty)
    }

    fn set_action(&mut self, class: usize, action: InstallAction) -> Result<()> {
        if self.state != ShuttleState::InstallHeader {
            return Err(ShuttleError::SelectionClosed);
        }
        if class >= self.actions.len() {
            return Err(ShuttleError::ClassOutOfRange {
                index: class,
                count: self.actions.len(),
            });
        }
        self.actions[class] = action;
        Ok(())
    }

    /// Perform the current step and advance. Returns the state that was
    /// just carried out; once it reports [`ShuttleState::Done`] there is
    /// nothing left to do.
    pub fn step(&mut self) -> Result<ShuttleState> {
        let current = self.state;
        match current {
            ShuttleState::InstallHeader => {
                self.header.write_to(&mut self.dest)?;
                self.state = ShuttleState::InstallTables;
            }
            ShuttleState::InstallTables => {
                self.install_tables()?;
                self.state = if self.actions.is_empty() {
                    ShuttleState::Finalize
                } else {
                    ShuttleState::InstallClass(0)
                };
            }
            ShuttleState::InstallClass(index) => {
                self.install_class(index)?;
                self.state = if index + 1 < self.actions.len() {
                    ShuttleState::InstallClass(index + 1)
                } else {
                    ShuttleState::Finalize
                };
            }
            ShuttleState::Finalize => {
                self.dest.flush()?;
                tracing::debug!(
                    "Shuttle wrote {} installed classes",
                    self.actions
                        .iter()
                        .filter(|a| **a != InstallAction::Skip)
                        .count()
                );
                self.state = ShuttleState::Done;
            }
            ShuttleState::Done => {}
        }
        Ok(current)
    }

    /// Pump the state machine to completion. `progress` is called once
    /// per class slot with the number of slots handled so far, whether or
    /// not the slot was selected.
    pub fn run<F: FnMut(usize)>(&mut self, mut progress: F) -> Result<()> {
        loop {
            match self.step()? {
                ShuttleState::InstallClass(index) => progress(index + 1),
                ShuttleState::Done => return Ok(()),
                _ => {}
            }
        }
    }

    /// Summary of the selection, one entry per source slot. Byte counts
    /// are what the patch carries; a remapped 16-bit set reports 0 since
    /// it reuses the 8-bit bytes.
    pub fn manifest(&self) -> ShuttleManifest {
        let entries = self
            .actions
            .iter()
            .enumerate()
            .map(|(index, &action)| {
                let (class_id, bytes_8bit, bytes_16bit) = match action {
                    InstallAction::Skip => (CLASS_ID_UNUSED, 0, 0),
                    InstallAction::InstallEmpty => (CLASS_ID_UNUSED_BUT_INSTALLED, 0, 0),
                    InstallAction::Install => {
                        let rec8 = &self.set_8bit[index];
                        let bytes_16bit = match self.set_16bit.get(index) {
                            Some(rec16) if !rec16.mirrors(rec8) => rec16.total_length.max(0) as u64,
                            _ => 0,
                        };
                        (rec8.class_id, rec8.total_length.max(0) as u64, bytes_16bit)
                    }
                };
                ManifestEntry {
                    class_index: index,
                    action,
                    class_id,
                    bytes_8bit,
                    bytes_16bit,
                }
            })
            .collect();

        ShuttleManifest {
            class_count: self.actions.len(),
            demo_layout: self.header.is_demo_layout(),
            entries,
        }
    }

    /// Write both destination tables. Offsets are rebased to where each
    /// class's sounds will land in the patch, which is computable from the
    /// source tables alone; that is what lets the destination be a plain
    /// `Write`.
    fn install_tables(&mut self) -> Result<()> {
        let mut cursor = self.header.payload_start();
        let mut dest_8bit = Vec::with_capacity(self.actions.len());
        let mut dest_16bit = Vec::with_capacity(self.actions.len());

        for (index, action) in self.actions.iter().enumerate() {
            match action {
                InstallAction::Skip => {
                    dest_8bit.push(SoundClassRecord::unused());
                    dest_16bit.push(SoundClassRecord::unused());
                }
                InstallAction::InstallEmpty => {
                    let mut record = SoundClassRecord::unused();
                    record.class_id = CLASS_ID_UNUSED_BUT_INSTALLED;
                    dest_8bit.push(record);
                    dest_16bit.push(record);
                }
                InstallAction::Install => {
                    let src8 = self.set_8bit[index];
                    let mut dst8 = src8;
                    // A run with no payload bytes keeps offset 0, matching
                    // the document writer's rule.
                    if src8.sound_count > 0 && src8.total_length > 0 {
                        dst8.first_sound_offset = to_file_offset(cursor)?;
                        cursor += src8.total_length as u64;
                    } else {
                        dst8.first_sound_offset = 0;
                    }
                    dest_8bit.push(dst8);

                    let dst16 = match self.set_16bit.get(index) {
                        Some(src16) if src16.mirrors(&src8) => {
                            // Remapped class: the 16-bit record points at
                            // the 8-bit run in the patch too.
                            let mut m = *src16;
                            m.first_sound_offset = dst8.first_sound_offset;
                            m
                        }
                        Some(src16) if src16.sound_count > 0 && src16.total_length > 0 => {
                            let mut d = *src16;
                            d.first_sound_offset = to_file_offset(cursor)?;
                            cursor += src16.total_length as u64;
                            d
                        }
                        Some(src16) => {
                            let mut d = *src16;
                            d.first_sound_offset = 0;
                            d
                        }
                        None => SoundClassRecord::unused(),
                    };
                    dest_16bit.push(dst16);
                }
            }
        }

        for record in &dest_8bit {
            record.write_to(&mut self.dest)?;
        }
        if !self.header.is_demo_layout() {
            for record in &dest_16bit {
                record.write_to(&mut self.dest)?;
            }
        }
        Ok(())
    }

    /// Stream one class's sounds into the patch, if it was selected.
    fn install_class(&mut self, index: usize) -> Result<()> {
        if self.actions[index] != InstallAction::Install {
            return Ok(());
        }

        let src8 = self.set_8bit[index];
        self.copy_run(&src8)?;

        if let Some(src16) = self.set_16bit.get(index).copied() {
            if !src16.mirrors(&src8) {
                self.copy_run(&src16)?;
            }
        }

        tracing::trace!("Installed class slot {}", index);
        Ok(())
    }

    /// Copy one record's payload run from source to destination.
    fn copy_run(&mut self, record: &SoundClassRecord) -> Result<()> {
        if record.sound_count <= 0 || record.total_length <= 0 {
            return Ok(());
        }
        let total = record.total_length as u64;
        let mut view = StreamView::new(
            &mut self.source,
            record.first_sound_offset as u64,
            total,
        )?;
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut copied = 0u64;
        loop {
            let n = view.read(&mut buf)?;
            if n == 0 {
                break;
            }
            self.dest.write_all(&buf[..n])?;
            copied += n as u64;
        }
        if copied != total {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("sound data ended {} bytes early", total - copied),
            )
            .into());
        }
        Ok(())
    }
}

fn to_file_offset(value: u64) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        SndError::InvalidFormat("sound payload too large for the format's 32-bit offsets".into())
            .into()
    })
}

// ============================================================
// Manifest
// ============================================================

/// One slot's line in a [`ShuttleManifest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub class_index: usize,
    pub action: InstallAction,
    pub class_id: i16,
    pub bytes_8bit: u64,
    pub bytes_16bit: u64,
}

/// Machine-readable record of a shuttle run, meant to be written next to
/// the patch so tools can see what it carries without parsing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuttleManifest {
    pub class_count: usize,
    pub demo_layout: bool,
    pub entries: Vec<ManifestEntry>,
}

// ============================================================
// Tests
// ============================================================
