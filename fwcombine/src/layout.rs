//! Flash partition geometry
//!
//! A [FlashLayout] describes how the flash of the target device is split
//! between the bootloader and the application, and whether the application
//! region ends with an integrity footer. Layouts are versioned: the bootloader
//! firmware compiled for one layout will not boot an image produced for
//! another, so the version must be selected explicitly.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, VariantNames};

use crate::error::Error;

/// Byte value erased flash reads back as
pub const ERASE_VALUE: u8 = 0xFF;

/// Start of the internal flash on the STM32F0 family
pub const FLASH_ORIGIN: u32 = 0x0800_0000;

const KIB: u32 = 1024;

/// Integrity footer stored in the last bytes of the application region
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, VariantNames, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Footer {
    /// No footer, the application may use the whole region
    None,
    /// Little-endian CRC-32/ISO-HDLC of the padded application
    #[default]
    Crc32,
}

impl Footer {
    /// Number of bytes the footer occupies at the end of the application region
    pub const fn size(self) -> u32 {
        match self {
            Footer::None => 0,
            Footer::Crc32 => 4,
        }
    }
}

/// Known flash layouts
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    EnumIter,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LayoutVersion {
    /// 16 KiB bootloader, application without footer
    V1,
    /// 20 KiB bootloader, application with CRC32 footer
    #[default]
    V2,
}

impl LayoutVersion {
    pub fn layout(self) -> FlashLayout {
        match self {
            LayoutVersion::V1 => FlashLayout {
                flash_origin: FLASH_ORIGIN,
                flash_size: 64 * KIB,
                bootloader_region_size: 16 * KIB,
                footer: Footer::None,
                erase_value: ERASE_VALUE,
            },
            LayoutVersion::V2 => FlashLayout {
                flash_origin: FLASH_ORIGIN,
                flash_size: 64 * KIB,
                bootloader_region_size: 20 * KIB,
                footer: Footer::Crc32,
                erase_value: ERASE_VALUE,
            },
        }
    }
}

/// Partition geometry of the device flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlashLayout {
    /// Address the flash is mapped at
    #[serde(default = "default_origin")]
    pub flash_origin: u32,
    /// Total size of the flash in bytes
    pub flash_size: u32,
    /// Bytes reserved for the bootloader, the application follows directly
    pub bootloader_region_size: u32,
    /// Footer appended to the application region
    #[serde(default)]
    pub footer: Footer,
    /// Value used to pad unused flash
    #[serde(default = "default_erase_value")]
    pub erase_value: u8,
}

fn default_origin() -> u32 {
    FLASH_ORIGIN
}

fn default_erase_value() -> u8 {
    ERASE_VALUE
}

impl Default for FlashLayout {
    fn default() -> Self {
        LayoutVersion::default().layout()
    }
}

impl FlashLayout {
    /// Check that the geometry can hold both regions and the footer.
    pub fn validate(&self) -> Result<(), Error> {
        if self.bootloader_region_size == 0 {
            return Err(Error::InvalidLayout(
                "the bootloader region must not be empty".into(),
            ));
        }
        if self.bootloader_region_size >= self.flash_size {
            return Err(Error::InvalidLayout(format!(
                "bootloader region of {} bytes leaves no room in {} bytes of flash",
                self.bootloader_region_size, self.flash_size
            )));
        }
        if self.app_region_size() <= self.footer_size() {
            return Err(Error::InvalidLayout(format!(
                "application region of {} bytes cannot hold a {} byte footer",
                self.app_region_size(),
                self.footer_size()
            )));
        }
        if self.flash_origin.checked_add(self.flash_size).is_none() {
            return Err(Error::InvalidLayout(format!(
                "flash of {} bytes at {:#010x} exceeds the address space",
                self.flash_size, self.flash_origin
            )));
        }

        Ok(())
    }

    pub fn app_region_size(&self) -> u32 {
        self.flash_size - self.bootloader_region_size
    }

    pub fn footer_size(&self) -> u32 {
        self.footer.size()
    }

    /// Bytes available to the application binary itself
    pub fn app_image_capacity(&self) -> u32 {
        self.app_region_size() - self.footer_size()
    }

    /// Size of a combined image, which always covers the whole flash
    pub fn image_size(&self) -> u32 {
        self.bootloader_region_size + self.app_region_size()
    }

    /// Address the bootloader jumps to
    pub fn app_start_address(&self) -> u32 {
        self.flash_origin + self.bootloader_region_size
    }
}
