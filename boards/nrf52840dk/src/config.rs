// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! nRF52840DK flash layout and code signer key

use dual_bank_boot_common::{BoardConfig, MigrationStrategy};

pub struct Nrf52840Config;

impl BoardConfig for Nrf52840Config {
    const FIRST_BANK: usize = 0x0001_0000;
    const SECOND_BANK: usize = 0x0008_0000;
    const BANK_SIZE: usize = 0x0007_0000;
    const SWAP_STATUS_PAGE: usize = 0x000F_0000;

    const HARDWARE_ID: u32 = 0x0052_840D;

    /// P-256 public key in DER format (SubjectPublicKeyInfo)
    const CODE_SIGNER_PUBLIC_KEY: &'static [u8] = &[
        0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
        0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00, 0x04, 0x85, 0xc9, 0x75,
        0xeb, 0x72, 0x14, 0x83, 0x42, 0xd9, 0x9c, 0x0c, 0x4d, 0x45, 0xeb, 0xde, 0x6a, 0x1c, 0x4e,
        0x8e, 0xc3, 0x7f, 0xbb, 0x6d, 0x1c, 0x60, 0x37, 0x74, 0xe8, 0xa2, 0xef, 0x1f, 0xe5, 0x02,
        0x82, 0x33, 0x1f, 0x8c, 0xcd, 0x1c, 0x5b, 0x7c, 0x6a, 0x35, 0xf1, 0x83, 0x01, 0x0c, 0x20,
        0xb6, 0xd5, 0xab, 0x16, 0x87, 0xb9, 0x03, 0x05, 0x72, 0x83, 0xff, 0x02, 0x96, 0x27, 0x6d,
        0x58,
    ];

    const MIGRATION: MigrationStrategy = MigrationStrategy::SwapWithMarker;

    const RAM_START: usize = 0x2000_0000;
    const RAM_END: usize = 0x2004_0000;
    const FLASH_END: usize = 0x0010_0000;
}
