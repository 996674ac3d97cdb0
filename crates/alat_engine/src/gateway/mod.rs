//! Command gateway
//!
//! The validating front door for window requests. It runs on network tasks,
//! checks every field, and only then submits a privileged operation to the
//! executor and turns its outcome into a status string.
//!
//! Validation failures and identifier notices are ordinary status strings;
//! only resource failures and a stopped executor become [`GatewayError`]s.

use crate::executor::{ExecutorError, Submitter};
use crate::protocol::{QrArgs, SolidColorArgs};
use crate::window::{CloseRequest, Upsert, WindowError};
use thiserror::Error;

pub mod validation;

pub use validation::{validate_qr, validate_solid, ValidationErrors};

/// Gateway failures surfaced as error responses
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Creating or updating the window failed
    #[error(transparent)]
    Window(#[from] WindowError),

    /// The executor is no longer running
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Validating entry point for window requests
#[derive(Debug, Clone)]
pub struct WindowCreator {
    submitter: Submitter,
}

impl WindowCreator {
    /// Create a gateway submitting to `submitter`'s executor
    pub fn new(submitter: Submitter) -> Self {
        Self { submitter }
    }

    /// Create or update a solid-color window
    pub async fn solid(&self, args: SolidColorArgs) -> Result<String, GatewayError> {
        let spec = match validate_solid(args) {
            Ok(spec) => spec,
            Err(errors) => return Ok(errors.to_string()),
        };

        let id = spec.id.clone();
        let outcome = self.submitter.submit(move |stage| stage.upsert_solid(spec)).await??;
        Ok(match outcome {
            Upsert::Created => String::new(),
            Upsert::Updated => format!("Window with id {id} already exists and will be overwritten"),
        })
    }

    /// Create or update a QR window
    pub async fn qr(&self, args: QrArgs) -> Result<String, GatewayError> {
        let spec = match validate_qr(args) {
            Ok(spec) => spec,
            Err(errors) => return Ok(errors.to_string()),
        };

        let id = spec.id.clone();
        let outcome = self.submitter.submit(move |stage| stage.upsert_qr(spec)).await??;
        Ok(match outcome {
            Upsert::Created => String::new(),
            Upsert::Updated => format!("Window with id {id} already exists"),
        })
    }

    /// Ask window `id` to close
    pub async fn close(&self, id: String) -> Result<String, GatewayError> {
        let lookup = id.clone();
        let outcome = self.submitter.submit(move |stage| stage.request_close(&lookup)).await?;
        Ok(match outcome {
            CloseRequest::Requested => String::new(),
            CloseRequest::Missing => format!("Window with id {id} does not exist"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::Color;
    use crate::qr::QrError;
    use crate::tests::spawn_headless;

    fn solid_args(id: &str) -> SolidColorArgs {
        SolidColorArgs {
            id: id.to_string(),
            width: 200,
            height: 100,
            title: "Solid".to_string(),
            color: Color::rgb(10, 20, 30),
        }
    }

    #[tokio::test]
    async fn test_validation_failure_submits_nothing() {
        let host = spawn_headless();
        let gateway = WindowCreator::new(host.submitter.clone());

        let status = gateway
            .solid(SolidColorArgs {
                width: 0,
                title: String::new(),
                ..solid_args("a")
            })
            .await
            .unwrap();

        assert_eq!(status, "Width must be positive\nTitle must be not empty");
        assert_eq!(host.probe.open_windows(), 0);
    }

    #[tokio::test]
    async fn test_solid_overwrite_notice() {
        let host = spawn_headless();
        let gateway = WindowCreator::new(host.submitter.clone());

        assert_eq!(gateway.solid(solid_args("a")).await.unwrap(), "");
        assert_eq!(
            gateway.solid(solid_args("a")).await.unwrap(),
            "Window with id a already exists and will be overwritten"
        );
        assert_eq!(host.probe.open_windows(), 1);
    }

    #[tokio::test]
    async fn test_close_missing_window_notice() {
        let host = spawn_headless();
        let gateway = WindowCreator::new(host.submitter.clone());

        assert_eq!(
            gateway.close("ghost".to_string()).await.unwrap(),
            "Window with id ghost does not exist"
        );
    }

    #[tokio::test]
    async fn test_qr_encode_failure_is_error() {
        let host = spawn_headless();
        let gateway = WindowCreator::new(host.submitter.clone());
        gateway.solid(solid_args("keep")).await.unwrap();

        let result = gateway
            .qr(QrArgs {
                id: "big".to_string(),
                title: "QR".to_string(),
                text: "x".repeat(8000),
                recovery_level: 3,
                size: 512,
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Window(WindowError::Qr(_)))));
        assert_eq!(host.probe.open_windows(), 1);
    }

    #[tokio::test]
    async fn test_oversized_qr_is_error_and_executor_survives() {
        let host = spawn_headless();
        let gateway = WindowCreator::new(host.submitter.clone());

        let result = gateway
            .qr(QrArgs {
                id: "huge".to_string(),
                title: "QR".to_string(),
                text: "hello".to_string(),
                recovery_level: 0,
                size: i32::MAX,
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Window(WindowError::Qr(QrError::InvalidSize(_))))));
        assert_eq!(gateway.solid(solid_args("next")).await.unwrap(), "");
        assert_eq!(host.probe.open_windows(), 1);
    }
}
