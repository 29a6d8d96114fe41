// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Links the bootloader with `layout.ld` and relinks when it changes.

use std::path::Path;

const LINKER_SCRIPT: &str = "layout.ld";

fn main() {
    if !Path::new(LINKER_SCRIPT).exists() {
        panic!("The bootloader must provide a `layout.ld` link script file");
    }

    // Host builds (clippy, docs) do not link.
    if std::env::var("HOST") == std::env::var("TARGET") {
        return;
    }

    println!("cargo:rustc-link-arg=-L{}", std::env!("CARGO_MANIFEST_DIR"));
    println!("cargo:rustc-link-arg=-T{LINKER_SCRIPT}");
    println!("cargo:rerun-if-changed={LINKER_SCRIPT}");
}
