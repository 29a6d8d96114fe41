// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Hand-off to the application and hardware reset

use cortex_m::peripheral::{NVIC, SCB, SYST};
use dual_bank_boot_common::Launcher;

use crate::io::UARTE0_ENABLE;

pub struct CortexMLauncher;

impl Launcher for CortexMLauncher {
    /// `entry_point` is the application's vector table.
    fn boot(&self, entry_point: usize) -> ! {
        cortex_m::interrupt::disable();

        unsafe {
            // Leave the peripherals we used the way reset would.
            core::ptr::write_volatile(UARTE0_ENABLE, 0);

            let syst = &*SYST::PTR;
            syst.csr.write(0);

            let nvic = &*NVIC::PTR;
            for i in 0..2 {
                nvic.icer[i].write(0xFFFF_FFFF);
                nvic.icpr[i].write(0xFFFF_FFFF);
            }

            let scb = &*SCB::PTR;
            scb.vtor.write(entry_point as u32);
            cortex_m::asm::dsb();
            cortex_m::asm::isb();

            // Loads MSP from the table and branches to its reset vector.
            cortex_m::asm::bootload(entry_point as *const u32)
        }
    }

    fn reset(&self) -> ! {
        SCB::sys_reset()
    }
}
