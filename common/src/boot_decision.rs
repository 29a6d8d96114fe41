// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Boot decision machine
//!
//! One pass per boot:
//!
//! 1. finish a migration a power cut interrupted,
//! 2. classify both banks and look the pair up in the decision table,
//! 3. apply the action (verifying a staged image before it is moved),
//! 4. classify the bootable bank again and pick the boot target.
//!
//! Every pass ends in exactly one [`BootDecision`].

use crate::classifier::{inspect, BankInfo};
use crate::descriptor::{read_descriptor, DESCRIPTOR_SIZE};
use crate::error::BootError;
use crate::flash::FlashDevice;
use crate::signature_verifier::{verify_image, Hasher, SignatureDecoder, SignatureVerifier};
use crate::swap::{self, EraseScope, MigrationMode};
use crate::types::{BankState, BootDecision, BootTarget, ImageFlag, ResetCause};
use crate::{BoardConfig, BootloaderIO};

/// Hardware the decision machine works through
pub struct Capabilities<'a, F, H, D, V> {
    pub flash: &'a F,
    pub hasher: &'a H,
    pub decoder: &'a D,
    pub verifier: &'a V,
}

/// Flash change selected by the decision table
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    EraseStaging,
    /// Staging goes into the bootable bank, which is then marked
    /// COMMIT_PENDING
    Swap,
    /// Staging goes into the bootable bank as is, staging is erased
    Commit,
    /// Reflag the bootable bank
    SetFlag(ImageFlag),
}

impl Action {
    fn describe(self) -> &'static str {
        match self {
            Action::None => "action: none",
            Action::EraseStaging => "action: erase staging",
            Action::Swap => "action: swap",
            Action::Commit => "action: commit",
            Action::SetFlag(_) => "action: set flag",
        }
    }
}

/// The decision table. `bootable` is bank 1, `staging` bank 2.
///
/// Pairs the table has no row for resolve to `Action::None`. An empty
/// bootable bank is handled like an invalid one.
pub fn decide(bootable: BankInfo, staging: BankInfo) -> Action {
    use BankState::*;

    match (bootable.state, staging.state) {
        (Valid, New) => {
            if staging.sequence_number > bootable.sequence_number {
                Action::Swap
            } else {
                Action::EraseStaging
            }
        }
        (Valid, Empty) => Action::None,
        // Includes a second copy of the running image left after an update.
        (Valid, Valid | Invalid | CommitPending | Nordic | NordicDescriptor) => Action::EraseStaging,

        (New, Valid) => {
            // Bootable is not newer: the swap never completed, go back.
            if bootable.sequence_number <= staging.sequence_number {
                Action::Commit
            } else {
                Action::SetFlag(ImageFlag::CommitPending)
            }
        }
        (New, _) => Action::SetFlag(ImageFlag::CommitPending),

        (CommitPending, Valid | Nordic | NordicDescriptor) => Action::Commit,
        (CommitPending, _) => Action::SetFlag(ImageFlag::Invalid),

        (Nordic | NordicDescriptor, Valid) => Action::Commit,
        (Nordic | NordicDescriptor, New) => Action::Swap,
        (Nordic | NordicDescriptor, Nordic | NordicDescriptor | CommitPending | Invalid) => {
            Action::EraseStaging
        }
        (Nordic | NordicDescriptor, Empty) => Action::None,

        (Invalid | Empty, Valid | Nordic | NordicDescriptor) => Action::Commit,
        (Invalid | Empty, New | CommitPending | Invalid | Empty) => Action::None,
    }
}

/// Runs one pass of the machine
pub fn decide_boot<C, F, H, D, V, IO>(caps: &Capabilities<'_, F, H, D, V>, io: &IO) -> BootDecision
where
    C: BoardConfig,
    F: FlashDevice,
    H: Hasher,
    D: SignatureDecoder,
    V: SignatureVerifier,
    IO: BootloaderIO,
{
    if settle::<C, F, H, D, V, IO>(caps, io).is_err() {
        io.debug("flash operation failed");
        return BootDecision::Reset(ResetCause::FlashFault);
    }
    dispatch::<C, F, H, D, V, IO>(caps, io)
}

fn verify_bank<C, F, H, D, V>(caps: &Capabilities<'_, F, H, D, V>, bank: usize) -> Result<(), BootError>
where
    C: BoardConfig,
    F: FlashDevice,
    H: Hasher,
    D: SignatureDecoder,
    V: SignatureVerifier,
{
    verify_image::<C, F, H, D, V>(caps.flash, caps.hasher, caps.decoder, caps.verifier, bank)
}

/// Resume, then decide and apply. A staged image that fails verification
/// is erased and the table consulted again; with staging empty the second
/// lookup can no longer pick a migration.
fn settle<C, F, H, D, V, IO>(caps: &Capabilities<'_, F, H, D, V>, io: &IO) -> Result<(), BootError>
where
    C: BoardConfig,
    F: FlashDevice,
    H: Hasher,
    D: SignatureDecoder,
    V: SignatureVerifier,
    IO: BootloaderIO,
{
    swap::resume_interrupted_swap::<C, F, IO>(caps.flash, io)?;

    for _ in 0..2 {
        let bootable = inspect::<C, F>(caps.flash, C::FIRST_BANK);
        let staging = inspect::<C, F>(caps.flash, C::SECOND_BANK);
        let action = decide(bootable, staging);
        io.debug_value("bank 1 state", bootable.state.log_code());
        io.debug_value("bank 2 state", staging.state.log_code());
        io.debug(action.describe());

        let migrates = matches!(action, Action::Swap | Action::Commit);
        if migrates && !staging.state.is_legacy() {
            if verify_bank::<C, F, H, D, V>(caps, C::SECOND_BANK).is_err() {
                io.debug("staged image rejected");
                swap::erase_bank::<C, F>(caps.flash, C::SECOND_BANK, EraseScope::Whole)?;
                continue;
            }
            io.debug("staged image verified");
        }

        return apply::<C, F, IO>(caps.flash, action, bootable, staging, io);
    }
    Ok(())
}

fn apply<C, F, IO>(
    flash: &F,
    action: Action,
    bootable: BankInfo,
    staging: BankInfo,
    io: &IO,
) -> Result<(), BootError>
where
    C: BoardConfig,
    F: FlashDevice,
    IO: BootloaderIO,
{
    match action {
        Action::None => Ok(()),
        Action::EraseStaging => {
            io.debug("erasing staging bank");
            swap::erase_bank::<C, F>(flash, C::SECOND_BANK, staging_scope(staging.state))
        }
        Action::Swap => {
            io.debug("swapping in new image");
            swap::migrate::<C, F, IO>(flash, MigrationMode::Swap, staging.state, bootable.state, io)?;
            swap::set_flag(flash, C::FIRST_BANK, ImageFlag::CommitPending)
        }
        Action::Commit => {
            io.debug("committing staged image");
            swap::migrate::<C, F, IO>(flash, MigrationMode::Commit, staging.state, bootable.state, io)?;
            swap::erase_bank::<C, F>(flash, C::SECOND_BANK, staging_scope(staging.state))
        }
        Action::SetFlag(flag) => {
            io.debug_value("reflagging bootable bank", flag.as_byte() as usize);
            swap::set_flag(flash, C::FIRST_BANK, flag)
        }
    }
}

/// Dropping a trusted descriptor is enough; anything else goes entirely.
fn staging_scope(state: BankState) -> EraseScope {
    match state {
        BankState::New | BankState::Valid | BankState::CommitPending => EraseScope::Descriptor,
        _ => EraseScope::Whole,
    }
}

fn dispatch<C, F, H, D, V, IO>(caps: &Capabilities<'_, F, H, D, V>, io: &IO) -> BootDecision
where
    C: BoardConfig,
    F: FlashDevice,
    H: Hasher,
    D: SignatureDecoder,
    V: SignatureVerifier,
    IO: BootloaderIO,
{
    match inspect::<C, F>(caps.flash, C::FIRST_BANK).state {
        BankState::Valid | BankState::CommitPending => {
            if verify_bank::<C, F, H, D, V>(caps, C::FIRST_BANK).is_err() {
                io.debug("bootable image failed verification");
                return BootDecision::Reset(ResetCause::SignatureRejected);
            }
            io.debug("bootable image verified");
            match read_descriptor(caps.flash, C::FIRST_BANK) {
                Ok(descriptor) => BootDecision::Boot(BootTarget {
                    entry_point: descriptor.execution_address as usize,
                    verified: true,
                }),
                Err(_) => BootDecision::Reset(ResetCause::FlashFault),
            }
        }
        BankState::Nordic => {
            io.debug("legacy image, booting unverified");
            BootDecision::Boot(BootTarget {
                entry_point: C::FIRST_BANK,
                verified: false,
            })
        }
        BankState::NordicDescriptor => {
            io.debug("legacy image, booting unverified");
            BootDecision::Boot(BootTarget {
                entry_point: C::FIRST_BANK + DESCRIPTOR_SIZE,
                verified: false,
            })
        }
        BankState::New | BankState::Invalid | BankState::Empty => {
            io.debug("no bootable image");
            BootDecision::Reset(ResetCause::NoBootableImage)
        }
    }
}
