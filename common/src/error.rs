// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Error types for the dual-bank bootloader

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BootError {
    /// Magic, hardware id or address range of a descriptor is unusable.
    /// Never fatal on its own: the bank simply classifies as invalid.
    InvalidDescriptor,

    /// The image failed verification. Hash, decode and ECDSA failures all
    /// collapse into this value so the caller cannot tell them apart.
    InvalidSignature,

    /// The flash capability reported an erase, write or read failure
    FlashIoError,

    /// An address computation overflowed or left the bank it belongs to
    OutOfBounds,
}
