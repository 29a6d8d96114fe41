// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Dual-bank secure bootloader for nRF52840DK
//!
//! Picks the image to run from the two application banks, migrating a new
//! or reverted image into bank 1 first, and boots it once its signature
//! checks out. LED1 lights before a verified image is started; LED4 blinks
//! when there is nothing left to boot.

#![no_std]
#![no_main]

mod config;
mod flash;
mod io;
mod launch;
mod panic;

use config::Nrf52840Config;
use dual_bank_boot_common::boot_decision::Capabilities;
use dual_bank_boot_common::signature_verifier::{DerDecoder, P256Verifier, Sha256Engine};
use dual_bank_boot_common::BootloaderIO;
use flash::Nvmc;
use io::Nrf52840IO;
use launch::CortexMLauncher;

// Include the startup assembly code
core::arch::global_asm!(include_str!("startup.s"));

/// Main entry point called by startup code
#[no_mangle]
pub extern "C" fn main() -> ! {
    let io = Nrf52840IO::new();
    io.debug("\r\n\r\n");
    io.debug("Dual-bank secure boot");

    let caps = Capabilities {
        flash: &Nvmc,
        hasher: &Sha256Engine,
        decoder: &DerDecoder,
        verifier: &P256Verifier,
    };

    dual_bank_boot_common::run::<Nrf52840Config, _, _, _, _, _, _>(&caps, &io, &CortexMLauncher)
}
