// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! I/O operations for nRF52840DK bootloader
use dual_bank_boot_common::BootloaderIO;

/// LEDs for debugging
const GPIO_P0_BASE: usize = 0x5000_0000;

const GPIO_OUTSET_OFFSET: usize = 0x508;
const GPIO_OUTCLR_OFFSET: usize = 0x50C;
const GPIO_PIN_CNF_OFFSET: usize = 0x700;

const LED1_PIN: u32 = 13; // P0.13
const LED4_PIN: u32 = 16; // P0.16

/// UART for debugging
const UARTE0_BASE: usize = 0x4000_2000;
const TASKS_STARTTX: *mut u32 = (UARTE0_BASE + 0x008) as *mut u32;
const TASKS_STOPTX: *mut u32 = (UARTE0_BASE + 0x00C) as *mut u32;
const EVENTS_ENDTX: *mut u32 = (UARTE0_BASE + 0x120) as *mut u32;
pub const UARTE0_ENABLE: *mut u32 = (UARTE0_BASE + 0x500) as *mut u32;
const PSEL_TXD: *mut u32 = (UARTE0_BASE + 0x50C) as *mut u32;
const PSEL_RXD: *mut u32 = (UARTE0_BASE + 0x514) as *mut u32;
const BAUDRATE: *mut u32 = (UARTE0_BASE + 0x524) as *mut u32;
const CONFIG: *mut u32 = (UARTE0_BASE + 0x56C) as *mut u32;
const TXD_PTR: *mut u32 = (UARTE0_BASE + 0x544) as *mut u32;
const TXD_MAXCNT: *mut u32 = (UARTE0_BASE + 0x548) as *mut u32;

const TX_PIN: usize = 6;
const RX_PIN: usize = 8;
const BAUD_115200: u32 = 0x01D7_E000;

/// EasyDMA reads from RAM only, output is staged through a stack buffer
const TX_CHUNK: usize = 64;

/// nRF52840DK I/O implementation
pub struct Nrf52840IO;

impl Nrf52840IO {
    /// Initialize GPIO for LED control and UART debug
    pub fn new() -> Self {
        unsafe {
            for &pin in &[LED1_PIN, LED4_PIN] {
                let pin_cnf_addr = GPIO_P0_BASE + GPIO_PIN_CNF_OFFSET + (pin as usize * 4);
                core::ptr::write_volatile(pin_cnf_addr as *mut u32, 0x0000_0001); // DIR=Output
            }
            // LEDs are active low, start with both off.
            core::ptr::write_volatile(
                (GPIO_P0_BASE + GPIO_OUTSET_OFFSET) as *mut u32,
                (1 << LED1_PIN) | (1 << LED4_PIN),
            );

            core::ptr::write_volatile(UARTE0_ENABLE, 0);
            core::ptr::write_volatile(PSEL_TXD, TX_PIN as u32);
            core::ptr::write_volatile(PSEL_RXD, RX_PIN as u32);

            let tx_cnf = GPIO_P0_BASE + GPIO_PIN_CNF_OFFSET + (TX_PIN * 4);
            core::ptr::write_volatile(tx_cnf as *mut u32, 0x0000_0003);
            let rx_cnf = GPIO_P0_BASE + GPIO_PIN_CNF_OFFSET + (RX_PIN * 4);
            core::ptr::write_volatile(rx_cnf as *mut u32, 0x0000_0000);

            core::ptr::write_volatile(BAUDRATE, BAUD_115200);
            core::ptr::write_volatile(CONFIG, 0);
            core::ptr::write_volatile(UARTE0_ENABLE, 8);
        }
        Self
    }

    fn led_on(&self, pin: u32) {
        unsafe {
            core::ptr::write_volatile((GPIO_P0_BASE + GPIO_OUTCLR_OFFSET) as *mut u32, 1 << pin);
        }
    }

    fn led_off(&self, pin: u32) {
        unsafe {
            core::ptr::write_volatile((GPIO_P0_BASE + GPIO_OUTSET_OFFSET) as *mut u32, 1 << pin);
        }
    }

    fn delay(&self, cycles: u32) {
        for _ in 0..cycles {
            cortex_m::asm::nop();
        }
    }

    fn wait_endtx() {
        let mut timeout = 100_000;
        unsafe {
            while core::ptr::read_volatile(EVENTS_ENDTX) == 0 && timeout > 0 {
                cortex_m::asm::nop();
                timeout -= 1;
            }
        }
    }

    fn write_bytes(&self, bytes: &[u8]) {
        let mut buf = [0u8; TX_CHUNK];
        for chunk in bytes.chunks(TX_CHUNK) {
            buf[..chunk.len()].copy_from_slice(chunk);
            unsafe {
                core::ptr::write_volatile(EVENTS_ENDTX, 0);
                core::ptr::write_volatile(TXD_PTR, buf.as_ptr() as u32);
                core::ptr::write_volatile(TXD_MAXCNT, chunk.len() as u32);
                core::ptr::write_volatile(TASKS_STARTTX, 1);
                Self::wait_endtx();
                core::ptr::write_volatile(TASKS_STOPTX, 1);
            }
        }
    }
}

/// `0x` and eight lowercase hex digits
fn format_hex(value: usize, buf: &mut [u8; 10]) {
    let hex_chars = b"0123456789abcdef";
    buf[0] = b'0';
    buf[1] = b'x';
    for i in 0..8 {
        let nibble = ((value >> (28 - i * 4)) & 0xF) as usize;
        buf[2 + i] = hex_chars[nibble];
    }
}

impl BootloaderIO for Nrf52840IO {
    /// Signal success: Turn on LED1
    fn signal_success(&self) {
        self.led_on(LED1_PIN);
    }

    /// Signal failure: Blink LED4 forever
    fn signal_failure(&self) {
        loop {
            self.led_on(LED4_PIN);
            self.delay(1_000_000);
            self.led_off(LED4_PIN);
            self.delay(1_000_000);
        }
    }

    fn debug(&self, msg: &str) {
        self.write_bytes(msg.as_bytes());
        self.write_bytes(b"\r\n");
    }

    fn debug_value(&self, label: &str, value: usize) {
        let mut hex = [0u8; 10];
        format_hex(value, &mut hex);
        self.write_bytes(label.as_bytes());
        self.write_bytes(b": ");
        self.write_bytes(&hex);
        self.write_bytes(b"\r\n");
    }
}
