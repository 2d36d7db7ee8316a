//! Combine a bootloader and an application into one flashable image
//!
//! The target device has a fixed flash layout: a bootloader region at the
//! start of flash, followed by an application region which may end with a
//! CRC32 footer the bootloader checks before jumping to the application.
//! [image::FirmwareImage] enforces that layout, pads both components with the
//! flash erase value and appends the footer.
//!
//! ## As an application
//!
//! ```bash
//! $ cargo install fwcombine
//! ```
//!
//! ## As a library
//!
//! ```toml
//! fwcombine = { version = "0.2", default-features = false }
//! ```
//!
//! The `cli` feature (enabled by default) pulls in the command-line
//! interface and its dependencies.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use self::error::Error;

pub mod builder;
pub mod checksum;
#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub mod cli;
pub mod combine;
pub mod image;
pub mod layout;
#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub mod logging;
pub mod output;

mod error;
