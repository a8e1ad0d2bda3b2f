//! Reducing a document to its differences against another
//!
//! This is the "compare files" feature: load an edited sound file and the
//! stock one, strip everything identical, and what remains is a minimal
//! patch containing just the edits.

use openwail_common::CompareMode;

use crate::class::SoundClass;
use crate::document::SoundFile;

impl SoundFile {
    /// Strip this document down to what differs from `other`.
    ///
    /// Classes with no counterpart slot in `other` are kept as they are.
    /// `Together` treats a class as one unit and resets fully matching
    /// slots to unused. `Separately` additionally clears whichever sound
    /// list matches on its own, keeping the attributes as long as any
    /// part of the class still differs.
    pub fn compare_and_keep_only_diffs(&mut self, other: &SoundFile, mode: CompareMode) {
        let used_before = self.classes.iter().filter(|c| !c.is_unused()).count();
        match mode {
            CompareMode::Together => self.keep_diffs_together(other),
            CompareMode::Separately => self.keep_diffs_separately(other),
        }
        let used_after = self.classes.iter().filter(|c| !c.is_unused()).count();
        tracing::debug!(
            "Compare ({}) cleared {} of {} used classes",
            mode,
            used_before - used_after,
            used_before,
        );
    }

    fn keep_diffs_together(&mut self, other: &SoundFile) {
        for (index, class) in self.classes.iter_mut().enumerate() {
            if let Some(theirs) = other.classes.get(index) {
                if class.attributes_match(theirs)
                    && class.sounds_8bit_match(theirs)
                    && class.sounds_16bit_match(theirs)
                {
                    *class = SoundClass::unused();
                }
            }
        }
    }

    fn keep_diffs_separately(&mut self, other: &SoundFile) {
        for (index, class) in self.classes.iter_mut().enumerate() {
            if let Some(theirs) = other.classes.get(index) {
                let attributes = class.attributes_match(theirs);
                let low = class.sounds_8bit_match(theirs);
                let high = class.sounds_16bit_match(theirs);
                if attributes && low && high {
                    *class = SoundClass::unused();
                } else {
                    // A list that matches carries nothing the patch needs.
                    if low {
                        class.clear_sounds_8bit();
                    }
                    if high {
                        class.clear_sounds_16bit();
                    }
                }
            }
        }
    }
}
