//! Version and runtime details reported by `--version`, `actions version`
//! and the diagnostics logged after an unhandled error.

// External crates
use sysinfo::System;

pub const PACKAGE_NAME: &str = "datahub-actions";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// `rustc --version` of the compiler that built this binary (set by build.rs).
pub const RUSTC_VERSION: &str = env!("RUSTC_VERSION");

const DEV_VERSION: &str = "0.0.0-dev";

/// Version string for humans; source checkouts carry no meaningful version.
pub fn nice_version_name() -> &'static str {
    if VERSION == DEV_VERSION {
        "unavailable (installed from source)"
    } else {
        VERSION
    }
}

/// Path of the running executable.
pub fn install_location() -> String {
    std::env::current_exe()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "unknown location".to_string())
}

/// `<os>-<kernel>-<arch>`, e.g. `Linux-6.8.0-x86_64`.
pub fn platform() -> String {
    format!(
        "{}-{}-{}",
        System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
        System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
        std::env::consts::ARCH
    )
}

pub fn version_line() -> String {
    format!(
        "DataHub Actions version: {} at {}",
        nice_version_name(),
        install_location()
    )
}

pub fn runtime_line() -> String {
    format!(
        "Rust version: {} at {} on {}",
        RUSTC_VERSION,
        install_location(),
        platform()
    )
}
