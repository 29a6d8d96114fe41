// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Internal flash through the nRF52840 NVMC

use dual_bank_boot_common::error::BootError;
use dual_bank_boot_common::flash::FlashDevice;
use dual_bank_boot_common::BoardConfig;

use crate::config::Nrf52840Config;

/// nRF52840 NVMC base address
const NVMC_BASE: usize = 0x4001_E000;

/// Registers
const NVMC_READY: *const u32 = (NVMC_BASE + 0x400) as *const u32;
const NVMC_CONFIG: *mut u32 = (NVMC_BASE + 0x504) as *mut u32;
const NVMC_ERASEPAGE: *mut u32 = (NVMC_BASE + 0x508) as *mut u32;

/// Configuration values
const CONFIG_REN: u32 = 0; // Read-only
const CONFIG_WEN: u32 = 1; // Write enable
const CONFIG_EEN: u32 = 2; // Erase enable

/// Everything above the bootloader's own pages
const WRITABLE_START: usize = Nrf52840Config::FIRST_BANK;

pub struct Nvmc;

impl Nvmc {
    #[inline]
    fn wait_ready() {
        unsafe { while core::ptr::read_volatile(NVMC_READY) == 0 {} }
    }

    #[inline]
    fn set_mode(mode: u32) {
        unsafe {
            core::ptr::write_volatile(NVMC_CONFIG, mode);
        }
        Self::wait_ready();
    }

    fn check_range(address: usize, len: usize, writable: bool) -> Result<(), BootError> {
        let end = address.checked_add(len).ok_or(BootError::OutOfBounds)?;
        let start = if writable { WRITABLE_START } else { 0 };
        if address < start || end > Nrf52840Config::FLASH_END {
            return Err(BootError::OutOfBounds);
        }
        Ok(())
    }
}

impl FlashDevice for Nvmc {
    const PAGE_SIZE: usize = 4096;

    fn erase_page(&self, address: usize) -> Result<(), BootError> {
        if address % Self::PAGE_SIZE != 0 {
            return Err(BootError::FlashIoError);
        }
        Self::check_range(address, Self::PAGE_SIZE, true)?;

        Self::set_mode(CONFIG_EEN);
        unsafe {
            core::ptr::write_volatile(NVMC_ERASEPAGE, address as u32);
        }
        Self::wait_ready();
        Self::set_mode(CONFIG_REN);
        Ok(())
    }

    /// The NVMC programs whole words. Bytes of a word outside `data` are
    /// programmed as 0xFF, which leaves them as they are.
    fn write_bytes(&self, address: usize, data: &[u8]) -> Result<(), BootError> {
        Self::check_range(address, data.len(), true)?;
        if data.is_empty() {
            return Ok(());
        }

        let first_word = address & !3;
        let end = address + data.len();

        Self::set_mode(CONFIG_WEN);
        let mut word_address = first_word;
        while word_address < end {
            let mut bytes = [0xFF; 4];
            for (i, byte) in bytes.iter_mut().enumerate() {
                let at = word_address + i;
                if at >= address && at < end {
                    *byte = data[at - address];
                }
            }
            unsafe {
                core::ptr::write_volatile(word_address as *mut u32, u32::from_le_bytes(bytes));
            }
            Self::wait_ready();
            word_address += 4;
        }
        Self::set_mode(CONFIG_REN);
        Ok(())
    }

    fn read(&self, address: usize, buf: &mut [u8]) -> Result<(), BootError> {
        Self::check_range(address, buf.len(), false)?;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = unsafe { core::ptr::read_volatile((address + i) as *const u8) };
        }
        Ok(())
    }
}
