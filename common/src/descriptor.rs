// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! On-flash image descriptor
//!
//! Layout at offset 0 of a bank (little endian):
//!
//! ```text
//! [0x00] magic "@AFRTOS"      7 B
//! [0x07] image flags          1 B
//! [0x08] sequence number      4 B
//! [0x0C] start address        4 B
//! [0x10] end address          4 B
//! [0x14] execution address    4 B
//! [0x18] hardware id          4 B
//! [0x1C] reserved             4 B
//! [0x20] signature size       4 B
//! [0x24] signature (DER)    256 B
//! ```
//!
//! The descriptor owns the whole first page of the bank, the signed image
//! body starts at or after `bank + DESCRIPTOR_SIZE`.

use crate::error::BootError;
use crate::flash::{self, FlashDevice};
use crate::types::{FlashRange, ImageFlag};

pub const MAGIC: [u8; 7] = *b"@AFRTOS";

/// Space reserved for the descriptor at the start of a bank
pub const DESCRIPTOR_SIZE: usize = 0x1000;

pub const MAX_SIGNATURE_SIZE: usize = 256;

const FLAGS_OFFSET: usize = 7;
const SEQUENCE_OFFSET: usize = 8;
const START_OFFSET: usize = 12;
const END_OFFSET: usize = 16;
const EXECUTION_OFFSET: usize = 20;
const HARDWARE_ID_OFFSET: usize = 24;
const RESERVED_OFFSET: usize = 28;
const SIGNATURE_SIZE_OFFSET: usize = 32;
const SIGNATURE_OFFSET: usize = 36;

/// Bytes of the descriptor that carry fields
pub const DESCRIPTOR_FIELDS_LEN: usize = SIGNATURE_OFFSET + MAX_SIGNATURE_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub image_flags: ImageFlag,
    /// Higher is newer. Ordering only, never trusted on its own.
    pub sequence_number: u32,
    pub start_address: u32,
    pub end_address: u32,
    pub execution_address: u32,
    pub hardware_id: u32,
    pub signature_size: u32,
    pub signature: [u8; MAX_SIGNATURE_SIZE],
}

fn read_u32(raw: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
}

impl ImageDescriptor {
    /// Decodes a descriptor. Only a missing magic is an error; every other
    /// bit pattern decodes to some value.
    pub fn parse(raw: &[u8; DESCRIPTOR_FIELDS_LEN]) -> Result<ImageDescriptor, BootError> {
        if raw[..MAGIC.len()] != MAGIC {
            return Err(BootError::InvalidDescriptor);
        }

        let mut signature = [0xFF; MAX_SIGNATURE_SIZE];
        signature.copy_from_slice(&raw[SIGNATURE_OFFSET..]);

        Ok(ImageDescriptor {
            image_flags: ImageFlag::from(raw[FLAGS_OFFSET]),
            sequence_number: read_u32(raw, SEQUENCE_OFFSET),
            start_address: read_u32(raw, START_OFFSET),
            end_address: read_u32(raw, END_OFFSET),
            execution_address: read_u32(raw, EXECUTION_OFFSET),
            hardware_id: read_u32(raw, HARDWARE_ID_OFFSET),
            signature_size: read_u32(raw, SIGNATURE_SIZE_OFFSET),
            signature,
        })
    }

    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_FIELDS_LEN] {
        let mut raw = [0xFF; DESCRIPTOR_FIELDS_LEN];
        raw[..MAGIC.len()].copy_from_slice(&MAGIC);
        raw[FLAGS_OFFSET] = self.image_flags.as_byte();
        for (offset, value) in [
            (SEQUENCE_OFFSET, self.sequence_number),
            (START_OFFSET, self.start_address),
            (END_OFFSET, self.end_address),
            (EXECUTION_OFFSET, self.execution_address),
            (HARDWARE_ID_OFFSET, self.hardware_id),
            (RESERVED_OFFSET, 0xFFFF_FFFF),
            (SIGNATURE_SIZE_OFFSET, self.signature_size),
        ] {
            raw[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
        raw[SIGNATURE_OFFSET..].copy_from_slice(&self.signature);
        raw
    }

    /// The DER signature, bounded by `signature_size`
    pub fn signature_bytes(&self) -> Result<&[u8], BootError> {
        let size = self.signature_size as usize;
        if size == 0 || size > MAX_SIGNATURE_SIZE {
            return Err(BootError::InvalidSignature);
        }
        Ok(&self.signature[..size])
    }

    /// The signed payload `[start_address, end_address)`
    pub fn image_range(&self) -> Result<FlashRange, BootError> {
        FlashRange::from_bounds(self.start_address as usize, self.end_address as usize)
    }

    /// Checks that the payload and entry point sit inside `bank`, after the
    /// descriptor page.
    pub fn check_placement(&self, bank: FlashRange) -> Result<(), BootError> {
        let image = self
            .image_range()
            .map_err(|_| BootError::InvalidDescriptor)?;
        let body = FlashRange::from_bounds(
            bank.start
                .checked_add(DESCRIPTOR_SIZE)
                .ok_or(BootError::OutOfBounds)?,
            bank.end(),
        )?;
        if image.len == 0
            || !body.contains_range(&image)
            || !image.contains(self.execution_address as usize)
        {
            return Err(BootError::InvalidDescriptor);
        }
        Ok(())
    }

    /// The same descriptor with every address moved from the bank at
    /// `from_base` to the bank at `to_base`.
    pub fn rebased(&self, from_base: usize, to_base: usize) -> Result<ImageDescriptor, BootError> {
        let image = self.image_range()?.rebase(from_base, to_base)?;
        let entry = FlashRange::new(self.execution_address as usize, 0)?
            .rebase(from_base, to_base)?;

        let narrow = |address: usize| u32::try_from(address).map_err(|_| BootError::OutOfBounds);
        Ok(ImageDescriptor {
            start_address: narrow(image.start)?,
            end_address: narrow(image.end())?,
            execution_address: narrow(entry.start)?,
            ..*self
        })
    }
}

/// Reads the descriptor at the start of the bank at `bank_base`
pub fn read_descriptor<F: FlashDevice>(flash: &F, bank_base: usize) -> Result<ImageDescriptor, BootError> {
    let mut raw = [0u8; DESCRIPTOR_FIELDS_LEN];
    flash.read(bank_base, &mut raw)?;
    ImageDescriptor::parse(&raw)
}

/// The descriptor area of the bank at `bank_base`, as an erasable range.
///
/// A device whose erase pages are larger than the descriptor cannot drop a
/// descriptor without taking the start of the body with it, so it is
/// rejected.
pub fn descriptor_region<F: FlashDevice>(bank_base: usize) -> Result<FlashRange, BootError> {
    if F::PAGE_SIZE > DESCRIPTOR_SIZE || DESCRIPTOR_SIZE % F::PAGE_SIZE != 0 {
        return Err(BootError::OutOfBounds);
    }
    FlashRange::new(bank_base, DESCRIPTOR_SIZE)
}

/// Replaces the descriptor of a bank: erase the descriptor page, program
/// the new record. The image body is left untouched.
pub fn write_descriptor<F: FlashDevice>(
    flash: &F,
    bank_base: usize,
    descriptor: &ImageDescriptor,
) -> Result<(), BootError> {
    flash::erase_region(flash, descriptor_region::<F>(bank_base)?)?;
    flash::write_bytes(flash, bank_base, &descriptor.to_bytes())
}

/// Programs a new flag byte over the existing one without erasing.
///
/// Only valid for transitions that clear bits, which every forward
/// transition of `ImageFlag` does.
pub fn program_flag_in_place<F: FlashDevice>(
    flash: &F,
    bank_base: usize,
    flag: ImageFlag,
) -> Result<(), BootError> {
    // Program the whole word holding the flag, the other three bytes are
    // the tail of the magic and program to the value they already hold.
    let mut word = [0u8; 4];
    word[..3].copy_from_slice(&MAGIC[4..]);
    word[3] = flag.as_byte();
    flash::write_bytes(flash, bank_base + 4, &word)
}
