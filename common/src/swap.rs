// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Bank swap and commit engine
//!
//! Moves the staging image into the bootable bank. With
//! [`MigrationStrategy::SwapWithMarker`] the swap marker is raised before
//! the bootable bank is touched and lowered only once the copy and the
//! staging flag update are complete. The staging bank is never erased while
//! the marker is up, so re-running the step after a power cut rebuilds the
//! same bootable bank from the same source.
//!
//! Legacy images have no descriptor and hence no known length; they move
//! as whole banks.

use crate::classifier::inspect;
use crate::descriptor::{
    descriptor_region, program_flag_in_place, read_descriptor, write_descriptor, ImageDescriptor,
    DESCRIPTOR_SIZE,
};
use crate::error::BootError;
use crate::flash::{self, FlashDevice};
use crate::types::{BankState, FlashRange, ImageFlag, SwapMarker};
use crate::{bank_range, BoardConfig, BootloaderIO, MigrationStrategy};

/// What happens to the staging bank once its image is in place
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MigrationMode {
    /// New image goes in as NEW, staging is kept and marked COMMIT_PENDING
    Swap,
    /// Image goes in with its own flags, the caller erases staging afterwards
    Commit,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EraseScope {
    /// Only the descriptor page. Enough to make the bank read as empty.
    Descriptor,
    /// Every page of the bank
    Whole,
}

pub fn read_swap_marker<C: BoardConfig, F: FlashDevice>(flash: &F) -> Result<SwapMarker, BootError> {
    flash::read_word(flash, C::SWAP_STATUS_PAGE).map(SwapMarker::from_word)
}

/// Raising the marker erases the status page; lowering it programs zero over
/// the raised value, no erase needed.
pub fn set_swap_marker<C: BoardConfig, F: FlashDevice>(
    flash: &F,
    marker: SwapMarker,
) -> Result<(), BootError> {
    match marker {
        SwapMarker::InProgress => {
            flash::erase_region(flash, FlashRange::new(C::SWAP_STATUS_PAGE, 4)?)?;
            flash::write_bytes(
                flash,
                C::SWAP_STATUS_PAGE,
                &SwapMarker::SWAP_IN_PROGRESS.to_le_bytes(),
            )
        }
        SwapMarker::None => flash::write_bytes(
            flash,
            C::SWAP_STATUS_PAGE,
            &SwapMarker::SWAP_NONE.to_le_bytes(),
        ),
    }
}

/// Reduces a bank to `BankState::Empty`
pub fn erase_bank<C: BoardConfig, F: FlashDevice>(
    flash: &F,
    bank_base: usize,
    scope: EraseScope,
) -> Result<(), BootError> {
    let range = match scope {
        EraseScope::Descriptor => descriptor_region::<F>(bank_base)?,
        EraseScope::Whole => bank_range::<C>(bank_base)?,
    };
    flash::erase_region(flash, range).map(|_| ())
}

/// Changes the image flags of a bank, leaving the body untouched.
///
/// Forward transitions only clear bits and are programmed over the current
/// flag byte. Anything else erases the descriptor page and rewrites it.
pub fn set_flag<F: FlashDevice>(flash: &F, bank_base: usize, flag: ImageFlag) -> Result<(), BootError> {
    let descriptor = read_descriptor(flash, bank_base)?;
    let current = descriptor.image_flags.as_byte();
    let wanted = flag.as_byte();
    if current == wanted {
        return Ok(());
    }

    if current & wanted == wanted {
        program_flag_in_place(flash, bank_base, flag)
    } else {
        write_descriptor(
            flash,
            bank_base,
            &ImageDescriptor {
                image_flags: flag,
                ..descriptor
            },
        )
    }
}

/// Moves the staging image into the bootable bank with the board's
/// migration strategy.
///
/// `staging` and `bootable` are the states the banks were classified with.
pub fn migrate<C, F, IO>(
    flash: &F,
    mode: MigrationMode,
    staging: BankState,
    bootable: BankState,
    io: &IO,
) -> Result<(), BootError>
where
    C: BoardConfig,
    F: FlashDevice,
    IO: BootloaderIO,
{
    match C::MIGRATION {
        MigrationStrategy::SwapWithMarker => {
            io.debug("swap marker raised");
            set_swap_marker::<C, F>(flash, SwapMarker::InProgress)?;
            relocate::<C, F>(flash, mode, staging.is_legacy(), bootable.is_legacy())?;
            finish::<C, F>(flash, mode, staging)?;
            set_swap_marker::<C, F>(flash, SwapMarker::None)?;
            io.debug("swap marker cleared");
            Ok(())
        }
        MigrationStrategy::CommitInPlace => {
            commit_in_place::<C, F>(flash, mode, staging.is_legacy(), bootable.is_legacy())?;
            finish::<C, F>(flash, mode, staging)
        }
    }
}

/// Completes a migration interrupted by a power cut. Must run before any
/// classification is trusted.
///
/// Returns `true` if a migration was found interrupted and was completed.
pub fn resume_interrupted_swap<C, F, IO>(flash: &F, io: &IO) -> Result<bool, BootError>
where
    C: BoardConfig,
    F: FlashDevice,
    IO: BootloaderIO,
{
    if C::MIGRATION == MigrationStrategy::CommitInPlace {
        return resume_in_place::<C, F, IO>(flash, io);
    }

    if read_swap_marker::<C, F>(flash)? != SwapMarker::InProgress {
        return Ok(false);
    }
    io.debug("resuming interrupted swap");

    // The staging flag tells which step was running: a swap programs it to
    // COMMIT_PENDING just before the marker drops, a commit never touches it.
    let staging = inspect::<C, F>(flash, C::SECOND_BANK).state;
    let mode = match staging {
        BankState::New | BankState::CommitPending => Some(MigrationMode::Swap),
        BankState::Valid | BankState::Nordic | BankState::NordicDescriptor => {
            Some(MigrationMode::Commit)
        }
        BankState::Invalid | BankState::Empty => None,
    };

    if let Some(mode) = mode {
        // What the bootable bank held before is unknown by now, clear all
        // of it.
        relocate::<C, F>(flash, mode, staging.is_legacy(), true)?;
        finish::<C, F>(flash, mode, staging)?;
    } else {
        io.debug("nothing left to resume");
    }

    set_swap_marker::<C, F>(flash, SwapMarker::None)?;
    Ok(true)
}

/// Without a marker an interrupted in-place swap is recognised by its
/// header: the bootable bank carries the staged sequence number as NEW
/// while staging is still NEW. A finished swap leaves staging
/// COMMIT_PENDING. An interrupted commit needs nothing here, its NEW
/// header sends the decision table back to the commit.
fn resume_in_place<C, F, IO>(flash: &F, io: &IO) -> Result<bool, BootError>
where
    C: BoardConfig,
    F: FlashDevice,
    IO: BootloaderIO,
{
    let bootable = inspect::<C, F>(flash, C::FIRST_BANK);
    let staging = inspect::<C, F>(flash, C::SECOND_BANK);
    if bootable.state != BankState::New
        || staging.state != BankState::New
        || bootable.sequence_number != staging.sequence_number
    {
        return Ok(false);
    }

    io.debug("resuming interrupted in-place swap");
    commit_in_place::<C, F>(flash, MigrationMode::Swap, false, true)?;
    finish::<C, F>(flash, MigrationMode::Swap, staging.state)?;
    Ok(true)
}

/// Marker strategy copy: body first, descriptor last. The staging bank is
/// only read.
fn relocate<C: BoardConfig, F: FlashDevice>(
    flash: &F,
    mode: MigrationMode,
    staging_legacy: bool,
    clear_destination: bool,
) -> Result<(), BootError> {
    if staging_legacy {
        return flash::copy_region(flash, C::SECOND_BANK, C::FIRST_BANK, C::BANK_SIZE);
    }

    let (descriptor, image, target) = staged_image::<C, F>(flash, mode)?;
    if clear_destination {
        erase_bank::<C, F>(flash, C::FIRST_BANK, EraseScope::Whole)?;
    }
    flash::copy_region(flash, image.start, target.start, image.len)?;
    write_descriptor(flash, C::FIRST_BANK, &descriptor)
}

/// Commit-in-place copy: header first, then body, no marker.
///
/// The header goes in as NEW and only gets the staged flags once the body
/// is complete, so a power cut leaves a bank the decision table sends back
/// to the same step.
fn commit_in_place<C: BoardConfig, F: FlashDevice>(
    flash: &F,
    mode: MigrationMode,
    staging_legacy: bool,
    bootable_legacy: bool,
) -> Result<(), BootError> {
    if staging_legacy {
        return copy_legacy_bank::<C, F>(flash);
    }

    let (descriptor, image, target) = staged_image::<C, F>(flash, mode)?;
    write_descriptor(
        flash,
        C::FIRST_BANK,
        &ImageDescriptor {
            image_flags: ImageFlag::New,
            ..descriptor
        },
    )?;
    flash::copy_region(flash, image.start, target.start, image.len)?;
    if bootable_legacy {
        // Whatever the old vendor image left outside the new payload.
        let bank = bank_range::<C>(C::FIRST_BANK)?;
        let copied = target.page_span(F::PAGE_SIZE)?;
        let body_start = bank.start + DESCRIPTOR_SIZE;
        if body_start < copied.start {
            flash::erase_region(flash, FlashRange::from_bounds(body_start, copied.start)?)?;
        }
        if copied.end() < bank.end() {
            flash::erase_region(flash, FlashRange::from_bounds(copied.end(), bank.end())?)?;
        }
    }
    if descriptor.image_flags != ImageFlag::New {
        program_flag_in_place(flash, C::FIRST_BANK, descriptor.image_flags)?;
    }
    Ok(())
}

/// Whole-bank copy of a legacy image with its first page last. Until that
/// page lands the bootable bank reads as EMPTY.
fn copy_legacy_bank<C: BoardConfig, F: FlashDevice>(flash: &F) -> Result<(), BootError> {
    let head = descriptor_region::<F>(C::FIRST_BANK)?;
    flash::erase_region(flash, head)?;
    flash::copy_region(
        flash,
        C::SECOND_BANK + DESCRIPTOR_SIZE,
        C::FIRST_BANK + DESCRIPTOR_SIZE,
        C::BANK_SIZE - DESCRIPTOR_SIZE,
    )?;
    flash::copy_region(flash, C::SECOND_BANK, C::FIRST_BANK, DESCRIPTOR_SIZE)
}

/// The staging descriptor rewritten for the bootable bank, together with
/// the payload ranges on both sides.
fn staged_image<C: BoardConfig, F: FlashDevice>(
    flash: &F,
    mode: MigrationMode,
) -> Result<(ImageDescriptor, FlashRange, FlashRange), BootError> {
    let staged = read_descriptor(flash, C::SECOND_BANK)?;
    staged.check_placement(bank_range::<C>(C::SECOND_BANK)?)?;

    let image = staged.image_range()?;
    let target = image.rebase(C::SECOND_BANK, C::FIRST_BANK)?;

    let mut descriptor = staged.rebased(C::SECOND_BANK, C::FIRST_BANK)?;
    if mode == MigrationMode::Swap {
        descriptor.image_flags = ImageFlag::New;
    }
    Ok((descriptor, image, target))
}

fn finish<C: BoardConfig, F: FlashDevice>(
    flash: &F,
    mode: MigrationMode,
    staging: BankState,
) -> Result<(), BootError> {
    if mode == MigrationMode::Swap && !staging.is_legacy() {
        program_flag_in_place(flash, C::SECOND_BANK, ImageFlag::CommitPending)?;
    }
    Ok(())
}
