// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Panic handler for the bootloader

use core::panic::PanicInfo;

const GPIO_P0_BASE: usize = 0x5000_0000;
const GPIO_OUTSET_OFFSET: usize = 0x508;
const GPIO_OUTCLR_OFFSET: usize = 0x50C;
const GPIO_PIN_CNF_OFFSET: usize = 0x700;
const LED2_PIN: u32 = 14;

/// Blinks LED2 rapidly. Nothing is booted after a panic; the flash state
/// is left for the next boot to pick up.
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    unsafe {
        core::ptr::write_volatile(
            (GPIO_P0_BASE + GPIO_PIN_CNF_OFFSET + LED2_PIN as usize * 4) as *mut u32,
            0x0000_0001,
        );
        loop {
            core::ptr::write_volatile((GPIO_P0_BASE + GPIO_OUTCLR_OFFSET) as *mut u32, 1 << LED2_PIN);
            for _ in 0..500_000 {
                cortex_m::asm::nop();
            }
            core::ptr::write_volatile((GPIO_P0_BASE + GPIO_OUTSET_OFFSET) as *mut u32, 1 << LED2_PIN);
            for _ in 0..500_000 {
                cortex_m::asm::nop();
            }
        }
    }
}
