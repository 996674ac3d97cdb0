//! Command line of the `alat` binary
//!
//! Subcommand names and argument order match the remote operations one to
//! one. Integers accept the `0x`, `0o`, `0b` and leading-zero octal prefixes.

use std::path::PathBuf;

use alat_engine::graphics::Color;
use alat_engine::protocol::{Call, QrArgs, SolidColorArgs};
use clap::{Parser, Subcommand};

/// Default QR side length in pixels
pub const DEFAULT_QR_SIZE: i32 = 512;

/// Default QR window title
pub const DEFAULT_QR_TITLE: &str = "QR";

#[derive(Parser, Debug)]
#[command(
    name = "alat",
    version,
    about = "Remote-controlled window host. Run without a command to start the host."
)]
pub struct Cli {
    /// Configuration file (.toml or .ron)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Host address; overrides the bind address when hosting and the server address otherwise
    #[arg(long, value_name = "HOST:PORT", global = true)]
    pub addr: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Terminate the host with an exit code
    #[command(name = "Close", allow_negative_numbers = true)]
    Close {
        /// Exit code of the host process
        #[arg(value_parser = parse_i32)]
        code: i32,
    },

    /// Close a window
    #[command(name = "CloseWindow")]
    CloseWindow {
        /// Window identifier
        id: String,
    },

    /// Open or update a window filled with one color
    #[command(name = "SolidColor", allow_negative_numbers = true)]
    SolidColor {
        /// Window identifier
        id: String,
        /// Width in screen coordinates
        #[arg(value_parser = parse_i32)]
        width: i32,
        /// Height in screen coordinates
        #[arg(value_parser = parse_i32)]
        height: i32,
        /// Title bar text
        title: String,
        /// Red channel
        #[arg(value_parser = parse_u8)]
        r: u8,
        /// Green channel
        #[arg(value_parser = parse_u8)]
        g: u8,
        /// Blue channel
        #[arg(value_parser = parse_u8)]
        b: u8,
    },

    /// Open or update a window showing a QR code
    #[command(name = "QrWindow", allow_negative_numbers = true)]
    QrWindow {
        /// Window identifier
        id: String,
        /// Text to encode
        text: String,
        /// Side length in pixels
        #[arg(short = 's', value_parser = parse_i32, default_value_t = DEFAULT_QR_SIZE)]
        size: i32,
        /// Title bar text
        #[arg(short = 't', default_value = DEFAULT_QR_TITLE)]
        title: String,
        /// Error correction level, 0 (lowest) to 3 (highest)
        #[arg(short = 'l', value_parser = parse_i32, default_value_t = 0)]
        level: i32,
    },
}

impl From<Command> for Call {
    fn from(command: Command) -> Self {
        match command {
            Command::Close { code } => Self::Shutdown(code),
            Command::CloseWindow { id } => Self::CloseWindow(id),
            Command::SolidColor {
                id,
                width,
                height,
                title,
                r,
                g,
                b,
            } => Self::Solid(SolidColorArgs {
                id,
                width,
                height,
                title,
                color: Color::rgb(r, g, b),
            }),
            Command::QrWindow {
                id,
                text,
                size,
                title,
                level,
            } => Self::Qr(QrArgs {
                id,
                title,
                text,
                recovery_level: level,
                size,
            }),
        }
    }
}

/// Parse an integer with an optional sign and radix prefix
pub fn parse_int(input: &str) -> Result<i64, String> {
    let (negative, digits) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    let body = body.replace('_', "");
    if body.is_empty() || body.starts_with(['+', '-']) {
        return Err(format!("invalid integer `{input}`"));
    }

    let magnitude = i128::from_str_radix(&body, radix).map_err(|e| format!("invalid integer `{input}`: {e}"))?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).map_err(|_| format!("integer `{input}` out of range"))
}

fn parse_i32(input: &str) -> Result<i32, String> {
    let value = parse_int(input)?;
    i32::try_from(value).map_err(|_| format!("integer `{input}` out of range"))
}

fn parse_u8(input: &str) -> Result<u8, String> {
    let value = parse_int(input)?;
    u8::try_from(value).map_err(|_| format!("color channel `{input}` must be between 0 and 255"))
}
