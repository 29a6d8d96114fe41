// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Common types used throughout the boot process

use crate::error::BootError;

/// Image flags as stored in the descriptor.
///
/// Every transition along NEW -> COMMIT_PENDING -> VALID -> INVALID only
/// clears bits, which is what makes in-place programming of the flag legal
/// on NOR flash.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImageFlag {
    /// A new image that hasn't yet been run
    New,
    /// Image is pending commit and is ready for self test
    CommitPending,
    /// The image was accepted as valid by the self test code
    Valid,
    /// The image was NOT accepted by the self test code
    Invalid,
    /// Any other byte. Kept so decoding a descriptor is total.
    Unknown(u8),
}

impl ImageFlag {
    pub const NEW: u8 = 0xFF;
    pub const COMMIT_PENDING: u8 = 0xFE;
    pub const VALID: u8 = 0xFC;
    pub const INVALID: u8 = 0xF8;

    pub fn as_byte(self) -> u8 {
        match self {
            ImageFlag::New => Self::NEW,
            ImageFlag::CommitPending => Self::COMMIT_PENDING,
            ImageFlag::Valid => Self::VALID,
            ImageFlag::Invalid => Self::INVALID,
            ImageFlag::Unknown(raw) => raw,
        }
    }
}

impl From<u8> for ImageFlag {
    fn from(raw: u8) -> ImageFlag {
        match raw {
            Self::NEW => ImageFlag::New,
            Self::COMMIT_PENDING => ImageFlag::CommitPending,
            Self::VALID => ImageFlag::Valid,
            Self::INVALID => ImageFlag::Invalid,
            other => ImageFlag::Unknown(other),
        }
    }
}

/// Semantic state of a bank. Derived from flash on every boot, never stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BankState {
    New,
    Valid,
    CommitPending,
    Invalid,
    /// Legacy vendor image with no descriptor, starting at the bank base
    Nordic,
    /// Legacy vendor image placed after a descriptor-sized header
    NordicDescriptor,
    Empty,
}

impl BankState {
    pub fn is_legacy(self) -> bool {
        matches!(self, BankState::Nordic | BankState::NordicDescriptor)
    }

    /// Number printed in boot logs: 0 NEW, 1 VALID, 2 COMMIT_PENDING,
    /// 3 INVALID, 4 legacy, 5 legacy behind a header, 6 EMPTY.
    pub fn log_code(self) -> usize {
        match self {
            BankState::New => 0,
            BankState::Valid => 1,
            BankState::CommitPending => 2,
            BankState::Invalid => 3,
            BankState::Nordic => 4,
            BankState::NordicDescriptor => 5,
            BankState::Empty => 6,
        }
    }
}

/// A contiguous span of flash addresses.
///
/// All arithmetic is checked; a range can never wrap the address space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FlashRange {
    pub start: usize,
    pub len: usize,
}

impl FlashRange {
    pub fn new(start: usize, len: usize) -> Result<FlashRange, BootError> {
        start.checked_add(len).ok_or(BootError::OutOfBounds)?;
        Ok(FlashRange { start, len })
    }

    /// Builds `[start, end)`. `end` before `start` is rejected.
    pub fn from_bounds(start: usize, end: usize) -> Result<FlashRange, BootError> {
        let len = end.checked_sub(start).ok_or(BootError::OutOfBounds)?;
        Ok(FlashRange { start, len })
    }

    pub fn end(&self) -> usize {
        // Cannot overflow, checked on construction.
        self.start + self.len
    }

    pub fn contains(&self, address: usize) -> bool {
        address >= self.start && address < self.end()
    }

    pub fn contains_range(&self, other: &FlashRange) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// The same range moved from the bank at `from_base` to the bank at
    /// `to_base`.
    pub fn rebase(&self, from_base: usize, to_base: usize) -> Result<FlashRange, BootError> {
        let offset = self
            .start
            .checked_sub(from_base)
            .ok_or(BootError::OutOfBounds)?;
        let start = to_base.checked_add(offset).ok_or(BootError::OutOfBounds)?;
        FlashRange::new(start, self.len)
    }

    /// The smallest run of whole pages covering this range.
    ///
    /// This is what an erase of the range actually destroys: if `start` or
    /// `end` are not page aligned, bytes outside the range go with it.
    pub fn page_span(&self, page_size: usize) -> Result<FlashRange, BootError> {
        if page_size == 0 {
            return Err(BootError::OutOfBounds);
        }
        let first = self.start - (self.start % page_size);
        let last = match self.end() % page_size {
            0 => self.end(),
            rem => self
                .end()
                .checked_add(page_size - rem)
                .ok_or(BootError::OutOfBounds)?,
        };
        FlashRange::from_bounds(first, last)
    }
}

/// Value of the word at the start of the swap status page
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SwapMarker {
    None,
    InProgress,
}

impl SwapMarker {
    pub const SWAP_NONE: u32 = 0;
    pub const SWAP_IN_PROGRESS: u32 = 0x0000_0001;
    const ERASED: u32 = 0xFFFF_FFFF;

    pub fn from_word(word: u32) -> SwapMarker {
        match word {
            // A page that was never used reads as erased.
            Self::SWAP_NONE | Self::ERASED => SwapMarker::None,
            _ => SwapMarker::InProgress,
        }
    }
}

/// Where control is handed once the decision machine is done
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BootTarget {
    pub entry_point: usize,
    /// False for legacy images, which are booted without a signature check
    pub verified: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResetCause {
    /// The bootable image failed verification
    SignatureRejected,
    /// Nothing in the bootable bank can be run
    NoBootableImage,
    /// A flash operation failed part way; the swap marker resumes it
    FlashFault,
}

/// Terminal outcome of one pass of the boot machine
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BootDecision {
    Boot(BootTarget),
    Reset(ResetCause),
}
