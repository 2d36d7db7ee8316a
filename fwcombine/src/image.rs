//! Combined firmware image assembly
//!
//! The combined image covers the whole flash and has the following layout:
//!
//! ```text
//! offset 0                      : bootloader region
//!   [bootloader bytes][erase value padding]
//! offset bootloader_region_size : application region
//!   [application bytes][erase value padding][footer]
//! ```
//!
//! Both binaries are checked against their capacity before any buffer is
//! built, so an oversized component never produces a partial image.

use std::fmt::{self, Display, Formatter};

use log::debug;
use strum::Display as StrumDisplay;

use crate::{
    checksum::{crc32, footer_bytes},
    error::Error,
    layout::{FlashLayout, Footer},
};

/// Flash region a binary is placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum Region {
    Bootloader,
    Application,
}

/// Fail if `binary` does not fit in `capacity` bytes.
pub fn validate_size(region: Region, binary: &[u8], capacity: usize) -> Result<(), Error> {
    if binary.len() > capacity {
        return Err(Error::RegionOverflow {
            region,
            size: binary.len(),
            capacity,
        });
    }

    Ok(())
}

/// Copy `binary` into a buffer of exactly `target_length` bytes, filling the
/// remainder with `erase_value`.
///
/// Fails with [Error::RegionOverflow] if `binary` is longer than
/// `target_length`.
pub fn pad(
    region: Region,
    binary: &[u8],
    target_length: usize,
    erase_value: u8,
) -> Result<Vec<u8>, Error> {
    validate_size(region, binary, target_length)?;

    let mut padded = Vec::with_capacity(target_length);
    padded.extend_from_slice(binary);
    padded.resize(target_length, erase_value);

    Ok(padded)
}

/// A bootloader and application combined into a single flashable image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    layout: FlashLayout,
    data: Vec<u8>,
    bootloader_size: usize,
    application_size: usize,
    crc: Option<u32>,
}

impl FirmwareImage {
    /// Validate, pad and concatenate the two binaries according to `layout`.
    pub fn assemble(
        layout: &FlashLayout,
        bootloader: &[u8],
        application: &[u8],
    ) -> Result<Self, Error> {
        layout.validate()?;

        let bootloader_region = layout.bootloader_region_size as usize;
        let app_capacity = layout.app_image_capacity() as usize;

        validate_size(Region::Bootloader, bootloader, bootloader_region)?;
        validate_size(Region::Application, application, app_capacity)?;

        debug!(
            "Padding bootloader with {} bytes ({:#04x})",
            bootloader_region - bootloader.len(),
            layout.erase_value
        );
        let padded_bootloader = pad(
            Region::Bootloader,
            bootloader,
            bootloader_region,
            layout.erase_value,
        )?;

        debug!(
            "Padding application with {} bytes ({:#04x})",
            app_capacity - application.len(),
            layout.erase_value
        );
        let padded_application = pad(
            Region::Application,
            application,
            app_capacity,
            layout.erase_value,
        )?;

        let crc = match layout.footer {
            Footer::None => None,
            Footer::Crc32 => Some(crc32(&padded_application)),
        };

        let mut data = Vec::with_capacity(layout.image_size() as usize);
        data.extend_from_slice(&padded_bootloader);
        data.extend_from_slice(&padded_application);
        if let Some(crc) = crc {
            debug!("Application CRC32: {crc:#010x}");
            data.extend_from_slice(&footer_bytes(crc));
        }

        debug_assert_eq!(data.len(), layout.image_size() as usize);

        Ok(Self {
            layout: *layout,
            data,
            bootloader_size: bootloader.len(),
            application_size: application.len(),
            crc,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Checksum stored in the footer, if the layout has one
    pub fn crc(&self) -> Option<u32> {
        self.crc
    }

    pub fn layout(&self) -> &FlashLayout {
        &self.layout
    }

    /// Bootloader region of the image, including padding
    pub fn bootloader_region(&self) -> &[u8] {
        &self.data[..self.layout.bootloader_region_size as usize]
    }

    /// Application region of the image, including padding and footer
    pub fn application_region(&self) -> &[u8] {
        &self.data[self.layout.bootloader_region_size as usize..]
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            bootloader: RegionUsage {
                used: self.bootloader_size,
                capacity: self.layout.bootloader_region_size as usize,
            },
            application: RegionUsage {
                used: self.application_size,
                capacity: self.layout.app_image_capacity() as usize,
            },
            app_start_address: self.layout.app_start_address(),
            crc: self.crc,
            total_size: self.data.len(),
        }
    }
}

/// How much of a region a binary occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionUsage {
    pub used: usize,
    pub capacity: usize,
}

impl RegionUsage {
    pub fn percent(&self) -> f64 {
        self.used as f64 * 100.0 / self.capacity as f64
    }
}

impl Display for RegionUsage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} bytes ({:.1}%)",
            self.used,
            self.capacity,
            self.percent()
        )
    }
}

/// Sizes and checksum of an assembled image, for reporting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSummary {
    pub bootloader: RegionUsage,
    pub application: RegionUsage,
    pub app_start_address: u32,
    pub crc: Option<u32>,
    pub total_size: usize,
}
