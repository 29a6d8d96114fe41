// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Bank classification
//!
//! Maps whatever is in a bank's flash to exactly one [`BankState`]. Reads
//! only. No bit pattern is an error: an unreadable or unrecognisable bank
//! is `Invalid`, never a failure of the classifier.

use crate::descriptor::{ImageDescriptor, DESCRIPTOR_FIELDS_LEN, DESCRIPTOR_SIZE};
use crate::flash::FlashDevice;
use crate::types::{BankState, ImageFlag};
use crate::{bank_range, BoardConfig};

/// Classification result plus what the decision table needs to compare
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BankInfo {
    pub state: BankState,
    /// Present whenever the bank holds a descriptor for this hardware
    pub sequence_number: Option<u32>,
}

impl BankInfo {
    fn bare(state: BankState) -> BankInfo {
        BankInfo {
            state,
            sequence_number: None,
        }
    }
}

pub fn classify<C: BoardConfig, F: FlashDevice>(flash: &F, bank_base: usize) -> BankState {
    inspect::<C, F>(flash, bank_base).state
}

pub fn inspect<C: BoardConfig, F: FlashDevice>(flash: &F, bank_base: usize) -> BankInfo {
    let mut raw = [0u8; DESCRIPTOR_FIELDS_LEN];
    if flash.read(bank_base, &mut raw).is_err() {
        return BankInfo::bare(BankState::Invalid);
    }

    if raw.iter().all(|&b| b == 0xFF) {
        return BankInfo::bare(BankState::Empty);
    }

    let descriptor = match ImageDescriptor::parse(&raw) {
        Ok(descriptor) => descriptor,
        Err(_) => return BankInfo::bare(classify_legacy::<C, F>(flash, bank_base, &raw)),
    };

    if descriptor.hardware_id != C::HARDWARE_ID {
        return BankInfo::bare(BankState::Invalid);
    }

    let placed = bank_range::<C>(bank_base)
        .and_then(|bank| descriptor.check_placement(bank))
        .is_ok();
    if !placed {
        return BankInfo::bare(BankState::Invalid);
    }

    let state = match descriptor.image_flags {
        ImageFlag::New => BankState::New,
        ImageFlag::Valid => BankState::Valid,
        ImageFlag::CommitPending => BankState::CommitPending,
        ImageFlag::Invalid | ImageFlag::Unknown(_) => BankState::Invalid,
    };

    BankInfo {
        state,
        sequence_number: Some(descriptor.sequence_number),
    }
}

/// No magic: either a legacy image, with or without a header in front of
/// it, or garbage.
fn classify_legacy<C: BoardConfig, F: FlashDevice>(
    flash: &F,
    bank_base: usize,
    raw: &[u8; DESCRIPTOR_FIELDS_LEN],
) -> BankState {
    let mut vectors = [0u8; 8];
    vectors.copy_from_slice(&raw[..8]);
    if C::is_legacy_image(&vectors) {
        return BankState::Nordic;
    }

    if flash.read(bank_base + DESCRIPTOR_SIZE, &mut vectors).is_ok() && C::is_legacy_image(&vectors) {
        return BankState::NordicDescriptor;
    }

    BankState::Invalid
}
