// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Host-side stand-ins for the board: an emulated NOR flash, a small bank
//! layout and a signer holding the private half of the test key.

use std::cell::{Cell, RefCell};
use std::string::{String, ToString};
use std::vec::Vec;

use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};

use crate::descriptor::{ImageDescriptor, DESCRIPTOR_SIZE, MAX_SIGNATURE_SIZE};
use crate::error::BootError;
use crate::flash::FlashDevice;
use crate::signature_verifier::P256_SPKI_PREFIX;
use crate::types::ImageFlag;
use crate::{BoardConfig, BootloaderIO, MigrationStrategy};

/// Private scalar of the test code signing key
const TEST_PRIVATE_KEY: [u8; 32] = [
    0x1c, 0x4b, 0x7e, 0x2f, 0x90, 0xa3, 0xd5, 0xc8, 0xe6, 0xf1, 0x02, 0x93, 0x84, 0x75, 0x6a, 0x7b,
    0x8c, 0x9d, 0x0e, 0x1f, 0x2a, 0x3b, 0x4c, 0x5d, 0x6e, 0x7f, 0x80, 0x91, 0xa2, 0xb3, 0xc4, 0xd5,
];

/// SubjectPublicKeyInfo for `TEST_PRIVATE_KEY`
pub const TEST_PUBLIC_KEY_DER: &[u8] = &[
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08, 0x2a,
    0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00, 0x04, 0x26, 0x5e, 0x3c, 0xc8, 0x4d,
    0xd7, 0x78, 0x1e, 0x19, 0xd8, 0xd7, 0x8a, 0x3f, 0x42, 0xb5, 0x93, 0x18, 0xd3, 0x29, 0xf3, 0x37,
    0xbf, 0x60, 0x2e, 0x5b, 0xbc, 0x12, 0xb6, 0xd4, 0x3e, 0x99, 0xa6, 0x0f, 0x83, 0x8a, 0xcc, 0xf1,
    0x68, 0xdd, 0xcd, 0xcf, 0x08, 0x78, 0xd8, 0x0a, 0x01, 0xca, 0x5a, 0x40, 0x5a, 0x6c, 0x1b, 0x00,
    0x5f, 0x59, 0x9a, 0x4a, 0x03, 0x3b, 0x7f, 0x9f, 0xf0, 0xa7, 0xee,
];

/// Two 32 KiB banks followed by the swap status page
pub struct TestConfig;

impl BoardConfig for TestConfig {
    const FIRST_BANK: usize = 0x2_0000;
    const SECOND_BANK: usize = 0x2_8000;
    const BANK_SIZE: usize = 0x8000;
    const SWAP_STATUS_PAGE: usize = 0x3_0000;
    const HARDWARE_ID: u32 = 0x0052_840D;
    const CODE_SIGNER_PUBLIC_KEY: &'static [u8] = TEST_PUBLIC_KEY_DER;
    const MIGRATION: MigrationStrategy = MigrationStrategy::SwapWithMarker;
    const RAM_START: usize = 0x2000_0000;
    const RAM_END: usize = 0x2004_0000;
    const FLASH_END: usize = 0x10_0000;
}

/// `TestConfig` with the marker-less migration
pub struct InPlaceConfig;

impl BoardConfig for InPlaceConfig {
    const FIRST_BANK: usize = TestConfig::FIRST_BANK;
    const SECOND_BANK: usize = TestConfig::SECOND_BANK;
    const BANK_SIZE: usize = TestConfig::BANK_SIZE;
    const SWAP_STATUS_PAGE: usize = TestConfig::SWAP_STATUS_PAGE;
    const HARDWARE_ID: u32 = TestConfig::HARDWARE_ID;
    const CODE_SIGNER_PUBLIC_KEY: &'static [u8] = TEST_PUBLIC_KEY_DER;
    const MIGRATION: MigrationStrategy = MigrationStrategy::CommitInPlace;
    const RAM_START: usize = TestConfig::RAM_START;
    const RAM_END: usize = TestConfig::RAM_END;
    const FLASH_END: usize = TestConfig::FLASH_END;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub address: usize,
    pub erase: bool,
}

/// NOR flash in RAM: erase sets a page to 0xFF, programming can only clear
/// bits.
///
/// Every erase and program is logged. `cut_power_after` makes all mutations
/// past a given count fail, which is how the tests cut power mid-swap.
pub struct EmulatedFlash {
    base: usize,
    storage: RefCell<Vec<u8>>,
    log: RefCell<Vec<Mutation>>,
    power_budget: Cell<Option<usize>>,
    reads_fail: Cell<bool>,
}

impl EmulatedFlash {
    pub fn new(base: usize, size: usize) -> EmulatedFlash {
        EmulatedFlash {
            base,
            storage: RefCell::new(vec![0xFF; size]),
            log: RefCell::new(Vec::new()),
            power_budget: Cell::new(None),
            reads_fail: Cell::new(false),
        }
    }

    /// Covers both banks and the swap status page of `C`
    pub fn for_config<C: BoardConfig>() -> EmulatedFlash {
        let start = C::FIRST_BANK.min(C::SECOND_BANK).min(C::SWAP_STATUS_PAGE);
        let end = (C::FIRST_BANK + C::BANK_SIZE)
            .max(C::SECOND_BANK + C::BANK_SIZE)
            .max(C::SWAP_STATUS_PAGE + Self::PAGE_SIZE);
        EmulatedFlash::new(start, end - start)
    }

    fn offset(&self, address: usize, len: usize) -> Result<usize, BootError> {
        let offset = address.checked_sub(self.base).ok_or(BootError::OutOfBounds)?;
        if offset + len > self.storage.borrow().len() {
            return Err(BootError::OutOfBounds);
        }
        Ok(offset)
    }

    fn record(&self, address: usize, erase: bool) -> Result<(), BootError> {
        if let Some(budget) = self.power_budget.get() {
            if self.log.borrow().len() >= budget {
                return Err(BootError::FlashIoError);
            }
        }
        self.log.borrow_mut().push(Mutation { address, erase });
        Ok(())
    }

    /// Overwrites flash content directly, as a programmer would
    pub fn fill(&self, address: usize, data: &[u8]) {
        let offset = address - self.base;
        self.storage.borrow_mut()[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Flips the lowest bit of one byte
    pub fn corrupt(&self, address: usize) {
        self.storage.borrow_mut()[address - self.base] ^= 0x01;
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.storage.borrow().clone()
    }

    pub fn snapshot_range(&self, address: usize, len: usize) -> Vec<u8> {
        let offset = address - self.base;
        self.storage.borrow()[offset..offset + len].to_vec()
    }

    pub fn same_bytes(&self, a: usize, b: usize, len: usize) -> bool {
        self.snapshot_range(a, len) == self.snapshot_range(b, len)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.reads_fail.set(fail);
    }

    /// Lets `count` mutations in total succeed, counting those already done
    pub fn cut_power_after(&self, count: usize) {
        self.power_budget.set(Some(count));
    }

    pub fn restore_power(&self) {
        self.power_budget.set(None);
    }

    pub fn mutation_count(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn mutation_log(&self) -> Vec<Mutation> {
        self.log.borrow().clone()
    }

    pub fn erase_count(&self) -> usize {
        self.log.borrow().iter().filter(|m| m.erase).count()
    }
}

impl FlashDevice for EmulatedFlash {
    const PAGE_SIZE: usize = 0x1000;

    fn erase_page(&self, address: usize) -> Result<(), BootError> {
        if address % Self::PAGE_SIZE != 0 {
            return Err(BootError::OutOfBounds);
        }
        let offset = self.offset(address, Self::PAGE_SIZE)?;
        self.record(address, true)?;
        self.storage.borrow_mut()[offset..offset + Self::PAGE_SIZE].fill(0xFF);
        Ok(())
    }

    fn write_bytes(&self, address: usize, data: &[u8]) -> Result<(), BootError> {
        let offset = self.offset(address, data.len())?;
        self.record(address, false)?;
        let mut storage = self.storage.borrow_mut();
        for (cell, byte) in storage[offset..offset + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        Ok(())
    }

    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), BootError> {
        if self.reads_fail.get() {
            return Err(BootError::FlashIoError);
        }
        let offset = self.offset(address, buf.len())?;
        buf.copy_from_slice(&self.storage.borrow()[offset..offset + buf.len()]);
        Ok(())
    }
}

pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&TEST_PRIVATE_KEY.into()).unwrap()
}

/// DER SubjectPublicKeyInfo of `key`
pub fn spki_der(key: &SigningKey) -> Vec<u8> {
    let point = key.verifying_key().to_encoded_point(false);
    let mut der = P256_SPKI_PREFIX.to_vec();
    // The prefix already ends in the uncompressed point tag.
    der.extend_from_slice(&point.as_bytes()[1..]);
    der
}

/// DER signature over `digest` with the test key
pub fn der_signature(digest: &[u8; 32]) -> Vec<u8> {
    let signature: Signature = signing_key().sign_prehash(digest).unwrap();
    signature.to_der().as_bytes().to_vec()
}

/// First two words of a Cortex-M image that is built to run from
/// `C::FIRST_BANK`
pub fn legacy_vectors<C: BoardConfig>() -> [u8; 8] {
    let mut vectors = [0u8; 8];
    vectors[..4].copy_from_slice(&(C::RAM_END as u32).to_le_bytes());
    vectors[4..].copy_from_slice(&((C::FIRST_BANK + 0x201) as u32).to_le_bytes());
    vectors
}

/// A legacy image of `len` bytes: vector table then filler
pub fn legacy_image<C: BoardConfig>(len: usize) -> Vec<u8> {
    let mut image: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(31) & 0xFE).collect();
    image[..8].copy_from_slice(&legacy_vectors::<C>());
    image
}

/// Writes a signed image into a bank
pub struct ImageBuilder {
    bank: usize,
    flags: ImageFlag,
    sequence: u32,
    hardware_id: u32,
    body_len: usize,
    body_prefix: Vec<u8>,
    seed: u32,
}

impl ImageBuilder {
    pub fn new(bank: usize) -> ImageBuilder {
        ImageBuilder {
            bank,
            flags: ImageFlag::New,
            sequence: 1,
            hardware_id: TestConfig::HARDWARE_ID,
            body_len: 0x600,
            body_prefix: Vec::new(),
            seed: 0x2545_F491,
        }
    }

    pub fn flags(mut self, flags: ImageFlag) -> ImageBuilder {
        self.flags = flags;
        self
    }

    pub fn sequence(mut self, sequence: u32) -> ImageBuilder {
        self.sequence = sequence;
        self
    }

    pub fn hardware_id(mut self, hardware_id: u32) -> ImageBuilder {
        self.hardware_id = hardware_id;
        self
    }

    pub fn body_len(mut self, len: usize) -> ImageBuilder {
        self.body_len = len;
        self
    }

    pub fn body_prefix(mut self, prefix: &[u8]) -> ImageBuilder {
        self.body_prefix = prefix.to_vec();
        self
    }

    /// Varies the body so two images can be told apart
    pub fn seed(mut self, seed: u32) -> ImageBuilder {
        self.seed = seed.wrapping_mul(0x9E37_79B9) | 1;
        self
    }

    fn body(&self) -> Vec<u8> {
        let mut state = self.seed;
        let mut body: Vec<u8> = (0..self.body_len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                // Never 0xFF, so no chunk of the body reads as erased.
                (state as u8) & 0xFE
            })
            .collect();
        body[..self.body_prefix.len()].copy_from_slice(&self.body_prefix);
        body
    }

    /// Programs descriptor and body, bypassing the mutation log
    pub fn install(self, flash: &EmulatedFlash) -> ImageDescriptor {
        let body = self.body();
        let start = self.bank + DESCRIPTOR_SIZE;
        let digest: [u8; 32] = Sha256::digest(&body).into();
        let der = der_signature(&digest);

        let mut signature = [0xFF; MAX_SIGNATURE_SIZE];
        signature[..der.len()].copy_from_slice(&der);
        let descriptor = ImageDescriptor {
            image_flags: self.flags,
            sequence_number: self.sequence,
            start_address: start as u32,
            end_address: (start + body.len()) as u32,
            execution_address: start as u32,
            hardware_id: self.hardware_id,
            signature_size: der.len() as u32,
            signature,
        };

        flash.fill(self.bank, &[0xFF; DESCRIPTOR_SIZE]);
        flash.fill(self.bank, &descriptor.to_bytes());
        flash.fill(start, &body);
        descriptor
    }
}

/// Discards everything
pub struct NullIO;

impl BootloaderIO for NullIO {
    fn signal_success(&self) {}
    fn signal_failure(&self) {}
}

/// Keeps debug output for assertions
#[derive(Default)]
pub struct RecordingIO {
    pub messages: RefCell<Vec<String>>,
}

impl RecordingIO {
    pub fn saw(&self, needle: &str) -> bool {
        self.messages.borrow().iter().any(|m| m.contains(needle))
    }
}

impl BootloaderIO for RecordingIO {
    fn signal_success(&self) {
        self.messages.borrow_mut().push("success".to_string());
    }

    fn signal_failure(&self) {
        self.messages.borrow_mut().push("failure".to_string());
    }

    fn debug(&self, msg: &str) {
        self.messages.borrow_mut().push(msg.to_string());
    }

    fn debug_value(&self, label: &str, value: usize) {
        self.messages
            .borrow_mut()
            .push(format!("{label}: {value:#x}"));
    }
}
