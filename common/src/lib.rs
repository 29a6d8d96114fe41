// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Dual-bank secure boot common library
//!
//! Board-agnostic logic that runs on every boot: decides which of two flash
//! banks holds the firmware to run, verifies that firmware with ECDSA P-256
//! over SHA-256, and moves a newly received image from the staging bank
//! into the bootable bank in a way that survives power loss.
//!
//! Hardware is reached only through capabilities passed in by the board:
//! [`flash::FlashDevice`], the crypto traits in [`signature_verifier`], a
//! [`BootloaderIO`] for debug output and a [`Launcher`] for the final
//! hand-off.

#![no_std]

pub mod boot_decision;
pub mod classifier;
pub mod descriptor;
pub mod error;
pub mod flash;
pub mod signature_verifier;
pub mod swap;
pub mod types;

use crate::types::{BootDecision, FlashRange, ResetCause};

/// Trait that boards must implement for bootloader I/O operations
pub trait BootloaderIO {
    /// Signal that a verified image is about to be started
    fn signal_success(&self);

    /// Signal that nothing can be booted. Boards are expected to keep the
    /// indication up and never return.
    fn signal_failure(&self);

    /// Optional: Write debug message to UART
    fn debug(&self, _msg: &str) {}

    /// Optional: Write a label followed by a value in hex
    fn debug_value(&self, _label: &str, _value: usize) {}
}

/// Trait for handing control away from the bootloader
pub trait Launcher {
    /// Jump to the application as though the chip had started executing at
    /// `entry_point`
    fn boot(&self, entry_point: usize) -> !;

    /// Unconditional hardware reset
    fn reset(&self) -> !;
}

/// How an image travels from the staging bank into the bootable bank.
///
/// A device picks one and uses it for every migration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MigrationStrategy {
    /// Header first, then body, no marker. Only for layouts where the
    /// bootable bank can absorb the staging image directly.
    CommitInPlace,
    /// Marker-protected relocation that resumes after power loss
    SwapWithMarker,
}

/// Board-specific configuration that must be provided
pub trait BoardConfig {
    /// Bootable bank, the CPU vectors into this one
    const FIRST_BANK: usize;

    /// Staging bank, written by the OTA transport
    const SECOND_BANK: usize;

    /// Size of each bank, a multiple of the flash page size
    const BANK_SIZE: usize;

    /// Page holding the swap marker word
    const SWAP_STATUS_PAGE: usize;

    /// Images built for any other hardware are rejected
    const HARDWARE_ID: u32;

    /// Code signer key as a DER SubjectPublicKeyInfo blob
    const CODE_SIGNER_PUBLIC_KEY: &'static [u8];

    const MIGRATION: MigrationStrategy;

    /// RAM bounds, used to recognise a legacy vector table
    const RAM_START: usize;
    const RAM_END: usize;

    /// End of internal flash
    const FLASH_END: usize;

    /// Heuristic for a legacy image without descriptor: the first two words
    /// look like a Cortex-M vector table (initial stack pointer in RAM,
    /// Thumb reset handler in flash).
    fn is_legacy_image(vector_table: &[u8; 8]) -> bool {
        let sp = u32::from_le_bytes([
            vector_table[0],
            vector_table[1],
            vector_table[2],
            vector_table[3],
        ]) as usize;
        let reset = u32::from_le_bytes([
            vector_table[4],
            vector_table[5],
            vector_table[6],
            vector_table[7],
        ]) as usize;

        let sp_in_ram = sp >= Self::RAM_START && sp <= Self::RAM_END;
        let reset_in_flash = reset & 1 == 1 && (reset & !1) < Self::FLASH_END;
        sp_in_ram && reset_in_flash
    }
}

/// The whole flash region of the bank starting at `base`
pub fn bank_range<C: BoardConfig>(base: usize) -> Result<FlashRange, error::BootError> {
    FlashRange::new(base, C::BANK_SIZE)
}

/// Runs the boot machine and hands off. Never returns.
///
/// A missing image is shown through `signal_failure`; every other outcome
/// is silent.
pub fn run<C, F, H, D, V, IO, L>(
    caps: &boot_decision::Capabilities<'_, F, H, D, V>,
    io: &IO,
    launcher: &L,
) -> !
where
    C: BoardConfig,
    F: flash::FlashDevice,
    H: signature_verifier::Hasher,
    D: signature_verifier::SignatureDecoder,
    V: signature_verifier::SignatureVerifier,
    IO: BootloaderIO,
    L: Launcher,
{
    match boot_decision::decide_boot::<C, _, _, _, _, _>(caps, io) {
        BootDecision::Boot(target) => {
            io.debug_value("booting", target.entry_point);
            if target.verified {
                io.signal_success();
            }
            launcher.boot(target.entry_point)
        }
        BootDecision::Reset(ResetCause::NoBootableImage) => {
            io.debug("no bootable image");
            io.signal_failure();
            launcher.reset()
        }
        BootDecision::Reset(cause) => {
            match cause {
                ResetCause::SignatureRejected => io.debug("signature rejected, resetting"),
                _ => io.debug("flash fault, resetting"),
            }
            launcher.reset()
        }
    }
}

// This is used to run the tests on a host
#[cfg(test)]
#[macro_use]
extern crate std;

#[cfg(test)]
mod test_support;
