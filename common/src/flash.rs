// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Page-granular flash operations on top of a board `FlashDevice`

use crate::error::BootError;
use crate::types::FlashRange;

/// Size of the RAM staging buffer used for flash-to-flash copies
const COPY_CHUNK: usize = 256;

/// Flash access the board must provide.
///
/// All addresses are absolute. `PAGE_SIZE` must be the smallest unit that
/// can be erased in a single operation. Writes never erase implicitly: on
/// NOR flash a write can only clear bits, so the caller erases first unless
/// it is deliberately programming a value that only clears bits (the image
/// flag and swap marker rely on this).
pub trait FlashDevice {
    const PAGE_SIZE: usize;

    /// Erases the page starting at `address`, which must be page aligned
    fn erase_page(&self, address: usize) -> Result<(), BootError>;

    /// Programs `data` starting at `address`
    fn write_bytes(&self, address: usize, data: &[u8]) -> Result<(), BootError>;

    /// Reads `buf.len()` bytes starting at `address`
    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), BootError>;
}

/// Erases every page covering `range` and returns the span really erased.
///
/// This may erase more than asked for: when `range` is not page aligned the
/// whole first and last pages go. Callers must not place live data in the
/// remainder of a page they erase a part of.
pub fn erase_region<F: FlashDevice>(flash: &F, range: FlashRange) -> Result<FlashRange, BootError> {
    let span = range.page_span(F::PAGE_SIZE)?;
    let mut page = span.start;
    while page < span.end() {
        flash.erase_page(page)?;
        page += F::PAGE_SIZE;
    }
    Ok(span)
}

/// Raw programmed write, no implicit erase
pub fn write_bytes<F: FlashDevice>(flash: &F, address: usize, data: &[u8]) -> Result<(), BootError> {
    FlashRange::new(address, data.len())?;
    flash.write_bytes(address, data)
}

/// Erases the pages under `[dst, dst + len)` then copies `len` bytes from
/// `src` through a RAM buffer. Source and destination must not overlap.
pub fn copy_region<F: FlashDevice>(
    flash: &F,
    src: usize,
    dst: usize,
    len: usize,
) -> Result<(), BootError> {
    let source = FlashRange::new(src, len)?;
    let destination = FlashRange::new(dst, len)?;
    if len > 0 && (source.contains(dst) || destination.contains(src)) {
        return Err(BootError::OutOfBounds);
    }

    erase_region(flash, destination)?;

    let mut chunk = [0u8; COPY_CHUNK];
    let mut offset = 0;
    while offset < len {
        let n = (len - offset).min(COPY_CHUNK);
        flash.read(src + offset, &mut chunk[..n])?;
        // Erased bytes need no programming; skipping them keeps copies of
        // sparse banks cheap.
        if chunk[..n].iter().any(|&b| b != 0xFF) {
            flash.write_bytes(dst + offset, &chunk[..n])?;
        }
        offset += n;
    }
    Ok(())
}

/// Reads a little endian word
pub fn read_word<F: FlashDevice>(flash: &F, address: usize) -> Result<u32, BootError> {
    let mut word = [0u8; 4];
    flash.read(address, &mut word)?;
    Ok(u32::from_le_bytes(word))
}

/// True if every byte of `range` reads as erased
pub fn is_erased<F: FlashDevice>(flash: &F, range: FlashRange) -> Result<bool, BootError> {
    let mut chunk = [0u8; COPY_CHUNK];
    let mut offset = 0;
    while offset < range.len {
        let n = (range.len - offset).min(COPY_CHUNK);
        flash.read(range.start + offset, &mut chunk[..n])?;
        if chunk[..n].iter().any(|&b| b != 0xFF) {
            return Ok(false);
        }
        offset += n;
    }
    Ok(true)
}
