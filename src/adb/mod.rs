// ADB module - emulator transport for the scheduler
// The core only sees the `EmulatorDriver` trait; `RustAdb` implements it on
// top of the adb server protocol and the emulator manager command line.

pub mod connections;
pub mod error;
pub mod framebuffer;
pub mod launcher;
pub mod rust_impl;
pub mod types;

// Re-export the main types and functions for easy access
pub use error::{AdbError, AdbResult};
pub use launcher::{EmulatorCommands, EmulatorLauncher};
pub use rust_impl::RustAdb;
pub use types::{Device, EmulatorDriver, ImageCapture};
