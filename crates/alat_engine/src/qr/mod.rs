//! QR code rasterization
//!
//! Turns text into a square RGBA image ready for texture upload. The symbol
//! itself comes from the `qrcode` crate; this module only maps recovery
//! levels and rasterizes modules with a four-module quiet zone.
//!
//! Sizing follows the usual convention for QR images: each module gets a
//! whole number of pixels, the symbol is centered, and a requested size too
//! small to give every module one pixel yields a larger image at one pixel
//! per module.

use image::{Rgba, RgbaImage};
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Modules of light border around the symbol
pub const QUIET_ZONE_MODULES: u32 = 4;

/// Largest accepted image side, the minimum 2D image limit every Vulkan device supports
pub const MAX_IMAGE_SIZE: u32 = 4096;

const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// QR encoding errors
#[derive(Error, Debug)]
pub enum QrError {
    /// The text does not fit any QR version at the requested recovery level
    #[error("Failed to encode QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),

    /// Requested image size is zero or above [`MAX_IMAGE_SIZE`]
    #[error("Invalid QR image size: {0}")]
    InvalidSize(u32),
}

/// Error recovery capacity of the encoded symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RecoveryLevel {
    /// About 7% of codewords can be restored
    #[default]
    Low,
    /// About 15%
    Medium,
    /// About 25%
    High,
    /// About 30%
    Highest,
}

impl RecoveryLevel {
    /// Map the wire index `0..=3` to a level
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::Low),
            1 => Some(Self::Medium),
            2 => Some(Self::High),
            3 => Some(Self::Highest),
            _ => None,
        }
    }

    fn ec_level(self) -> EcLevel {
        match self {
            Self::Low => EcLevel::L,
            Self::Medium => EcLevel::M,
            Self::High => EcLevel::Q,
            Self::Highest => EcLevel::H,
        }
    }
}

/// Text to image capability used by QR windows
pub trait QrEncoder: Send {
    /// Encode `text` into a `size`×`size` image (or larger, see module docs)
    fn encode(&self, text: &str, level: RecoveryLevel, size: u32) -> Result<RgbaImage, QrError>;
}

/// Encoder backed by the `qrcode` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeEncoder;

impl QrEncoder for QrCodeEncoder {
    fn encode(&self, text: &str, level: RecoveryLevel, size: u32) -> Result<RgbaImage, QrError> {
        let bytes = (size as usize).checked_mul(size as usize).and_then(|n| n.checked_mul(4));
        if size == 0 || size > MAX_IMAGE_SIZE || bytes.is_none() {
            return Err(QrError::InvalidSize(size));
        }

        let code = QrCode::with_error_correction_level(text.as_bytes(), level.ec_level())?;
        Ok(rasterize(&code, size))
    }
}

fn rasterize(code: &QrCode, size: u32) -> RgbaImage {
    let symbol = u32::try_from(code.width()).unwrap_or(u32::MAX);
    let modules = symbol.saturating_add(2 * QUIET_ZONE_MODULES);

    let (size, pixels_per_module) = if size < modules {
        (modules, 1)
    } else {
        (size, size / modules)
    };
    let offset = (size - modules * pixels_per_module) / 2 + QUIET_ZONE_MODULES * pixels_per_module;

    let mut image = RgbaImage::from_pixel(size, size, LIGHT);
    for y in 0..symbol {
        for x in 0..symbol {
            if code[(x as usize, y as usize)] != qrcode::Color::Dark {
                continue;
            }
            let left = offset + x * pixels_per_module;
            let top = offset + y * pixels_per_module;
            for py in top..top + pixels_per_module {
                for px in left..left + pixels_per_module {
                    image.put_pixel(px, py, DARK);
                }
            }
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_produces_requested_size() {
        let image = QrCodeEncoder.encode("hello", RecoveryLevel::Low, 256).unwrap();
        assert_eq!(image.dimensions(), (256, 256));

        // Quiet zone stays light, the top-left finder pattern is dark
        assert_eq!(*image.get_pixel(0, 0), LIGHT);
        let dark = image.pixels().filter(|p| **p == DARK).count();
        assert!(dark > 0);
    }

    #[test]
    fn test_finder_pattern_position() {
        let code = QrCode::with_error_correction_level(b"hello", EcLevel::L).unwrap();
        let modules = code.width() as u32 + 2 * QUIET_ZONE_MODULES;
        let size = modules * 3;
        let image = QrCodeEncoder.encode("hello", RecoveryLevel::Low, size).unwrap();

        let corner = QUIET_ZONE_MODULES * 3;
        assert_eq!(*image.get_pixel(corner, corner), DARK);
        assert_eq!(*image.get_pixel(corner - 1, corner - 1), LIGHT);
    }

    #[test]
    fn test_small_size_grows_to_one_pixel_per_module() {
        let image = QrCodeEncoder.encode("hello", RecoveryLevel::Low, 8).unwrap();
        let code = QrCode::with_error_correction_level(b"hello", EcLevel::L).unwrap();
        let modules = code.width() as u32 + 2 * QUIET_ZONE_MODULES;
        assert_eq!(image.dimensions(), (modules, modules));
    }

    #[test]
    fn test_recovery_level_changes_symbol() {
        let low = QrCodeEncoder.encode("recovery", RecoveryLevel::Low, 512).unwrap();
        let highest = QrCodeEncoder.encode("recovery", RecoveryLevel::Highest, 512).unwrap();
        assert_ne!(low, highest);
    }

    #[test]
    fn test_oversized_text_fails() {
        let text = "x".repeat(8000);
        assert!(matches!(
            QrCodeEncoder.encode(&text, RecoveryLevel::Highest, 512),
            Err(QrError::Encode(_))
        ));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            QrCodeEncoder.encode("hello", RecoveryLevel::Low, 0),
            Err(QrError::InvalidSize(0))
        ));
    }

    #[test]
    fn test_size_above_limit_rejected() {
        assert!(QrCodeEncoder.encode("hello", RecoveryLevel::Low, MAX_IMAGE_SIZE).is_ok());
        assert!(matches!(
            QrCodeEncoder.encode("hello", RecoveryLevel::Low, MAX_IMAGE_SIZE + 1),
            Err(QrError::InvalidSize(_))
        ));
        assert!(matches!(
            QrCodeEncoder.encode("hello", RecoveryLevel::Low, i32::MAX as u32),
            Err(QrError::InvalidSize(_))
        ));
    }

    #[test]
    fn test_recovery_level_index_bounds() {
        assert_eq!(RecoveryLevel::from_index(0), Some(RecoveryLevel::Low));
        assert_eq!(RecoveryLevel::from_index(3), Some(RecoveryLevel::Highest));
        assert_eq!(RecoveryLevel::from_index(4), None);
        assert_eq!(RecoveryLevel::from_index(-1), None);
    }
}
