//! Request field checks
//!
//! Every failing field contributes one line; callers get all of them at once.

use crate::graphics::Color;
use crate::protocol::{QrArgs, SolidColorArgs};
use crate::qr::RecoveryLevel;
use crate::window::{QrWindowSpec, SolidWindowSpec};
use thiserror::Error;

/// Aggregated validation failures, one message per field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .0.join("\n"))]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    /// Individual messages in field order
    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

#[derive(Default)]
struct Checks(Vec<String>);

impl Checks {
    fn require(&mut self, ok: bool, message: &str) {
        if !ok {
            self.0.push(message.to_string());
        }
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.0.is_empty() {
            Ok(value())
        } else {
            Err(ValidationErrors(self.0))
        }
    }
}

fn positive(value: i32) -> Option<u32> {
    u32::try_from(value).ok().filter(|&v| v > 0)
}

/// Check solid window arguments
///
/// The fill is always opaque; any alpha on the wire is ignored.
pub fn validate_solid(args: SolidColorArgs) -> Result<SolidWindowSpec, ValidationErrors> {
    let width = positive(args.width);
    let height = positive(args.height);

    let mut checks = Checks::default();
    checks.require(width.is_some(), "Width must be positive");
    checks.require(height.is_some(), "Height must be positive");
    checks.require(!args.title.is_empty(), "Title must be not empty");
    checks.require(!args.id.is_empty(), "Id must be not empty");

    checks.finish(|| SolidWindowSpec {
        id: args.id,
        width: width.unwrap_or_default(),
        height: height.unwrap_or_default(),
        title: args.title,
        color: Color::rgb(args.color.r, args.color.g, args.color.b),
    })
}

/// Check QR window arguments
pub fn validate_qr(args: QrArgs) -> Result<QrWindowSpec, ValidationErrors> {
    let level = RecoveryLevel::from_index(args.recovery_level);
    let size = positive(args.size);

    let mut checks = Checks::default();
    checks.require(!args.title.is_empty(), "Title must be not empty");
    checks.require(!args.text.is_empty(), "Text must be not empty");
    checks.require(!args.id.is_empty(), "Id must be not empty");
    checks.require(level.is_some(), "RecoveryLevel must be in range [0-3]");
    checks.require(size.is_some(), "Size must be positive");

    checks.finish(|| QrWindowSpec {
        id: args.id,
        title: args.title,
        text: args.text,
        level: level.unwrap_or_default(),
        size: size.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_args() -> SolidColorArgs {
        SolidColorArgs {
            id: "a".to_string(),
            width: 100,
            height: 50,
            title: "T".to_string(),
            color: Color::WHITE,
        }
    }

    fn qr_args() -> QrArgs {
        QrArgs {
            id: "q".to_string(),
            title: "QR".to_string(),
            text: "hello".to_string(),
            recovery_level: 0,
            size: 512,
        }
    }

    #[test]
    fn test_valid_solid_converts() {
        let spec = validate_solid(solid_args()).unwrap();
        assert_eq!((spec.width, spec.height), (100, 50));
    }

    #[test]
    fn test_solid_color_forced_opaque() {
        let spec = validate_solid(SolidColorArgs {
            color: Color { r: 1, g: 2, b: 3, a: 0 },
            ..solid_args()
        })
        .unwrap();
        assert_eq!(spec.color, Color::rgb(1, 2, 3));
        assert_eq!(spec.color.a, 255);
    }

    #[test]
    fn test_zero_width_reported_alone() {
        let errors = validate_solid(SolidColorArgs { width: 0, ..solid_args() }).unwrap_err();
        assert_eq!(errors.to_string(), "Width must be positive");
    }

    #[test]
    fn test_solid_failures_in_field_order() {
        let errors = validate_solid(SolidColorArgs {
            id: String::new(),
            width: -3,
            height: 0,
            title: String::new(),
            color: Color::BLACK,
        })
        .unwrap_err();

        assert_eq!(
            errors.to_string(),
            "Width must be positive\nHeight must be positive\nTitle must be not empty\nId must be not empty"
        );
    }

    #[test]
    fn test_qr_failures_in_field_order() {
        let errors = validate_qr(QrArgs {
            id: String::new(),
            title: String::new(),
            text: String::new(),
            recovery_level: 4,
            size: 0,
        })
        .unwrap_err();

        assert_eq!(
            errors.messages(),
            [
                "Title must be not empty",
                "Text must be not empty",
                "Id must be not empty",
                "RecoveryLevel must be in range [0-3]",
                "Size must be positive",
            ]
        );
    }

    #[test]
    fn test_recovery_level_bounds() {
        assert!(validate_qr(QrArgs { recovery_level: 3, ..qr_args() }).is_ok());
        assert!(validate_qr(QrArgs { recovery_level: -1, ..qr_args() }).is_err());
    }
}
