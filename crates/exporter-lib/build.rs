//! Build script for embedding toolchain version information
//!
//! Exposes the compiler version as `RUSTC_VERSION` for the build-info sample.
//! If rustc cannot be queried, the sample falls back to "unknown".

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());

    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .and_then(|stdout| stdout.split_whitespace().nth(1).map(str::to_string));

    match version {
        Some(version) => println!("cargo:rustc-env=RUSTC_VERSION={}", version),
        None => println!("cargo:warning=could not determine rustc version"),
    }
}
