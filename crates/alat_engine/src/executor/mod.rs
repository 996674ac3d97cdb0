//! Command executor
//!
//! The executor is the only code that touches the graphics backend or the
//! window registry. Other threads hand it privileged operations through a
//! [`Submitter`] and wait for the result; between operations the executor
//! sweeps every window once to close, draw and present it.
//!
//! # Loop
//!
//! Each iteration either runs exactly one queued operation or, when the queue
//! is empty, performs one full frame sweep followed by a short idle sleep.
//! Operations therefore never overlap each other or a sweep, and a sweep never
//! observes a half-built window.
//!
//! # Thread Affinity
//!
//! [`CommandExecutor::run`] must be called on the thread that created the
//! backend. With GLFW this has to be the process main thread.

use crate::core::config::ExecutorConfig;
use crate::graphics::{GraphicsBackend, Key};
use crate::qr::{QrCodeEncoder, QrEncoder};
use crate::window::{
    CloseRequest, QrWindowSpec, SolidWindowSpec, Upsert, WindowRegistry, WindowResult,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TryRecvError;

/// Executor errors seen by submitters
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorError {
    /// The executor loop is gone and will run no more operations
    #[error("Command executor has stopped")]
    Stopped,
}

/// A unit of work that must run on the executor thread
pub type PrivilegedOp = Box<dyn FnOnce(&mut Stage) + Send>;

/// Everything owned by the executor thread
///
/// Privileged operations receive `&mut Stage`, which is the only way to reach
/// the registry and backend.
pub struct Stage {
    registry: WindowRegistry,
    graphics: Box<dyn GraphicsBackend>,
    encoder: Box<dyn QrEncoder>,
}

impl Stage {
    /// Window registry
    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    /// Graphics backend
    pub fn graphics(&mut self) -> &mut dyn GraphicsBackend {
        self.graphics.as_mut()
    }

    /// Create or restyle a solid-color window
    pub fn upsert_solid(&mut self, spec: SolidWindowSpec) -> WindowResult<Upsert> {
        self.registry.upsert_solid(self.graphics.as_mut(), spec)
    }

    /// Create or re-encode a QR window
    pub fn upsert_qr(&mut self, spec: QrWindowSpec) -> WindowResult<Upsert> {
        self.registry
            .upsert_qr(self.graphics.as_mut(), self.encoder.as_ref(), spec)
    }

    /// Flag a window for closing on the next sweep
    pub fn request_close(&mut self, id: &str) -> CloseRequest {
        self.registry.request_close(self.graphics.as_mut(), id)
    }

    /// Visit every window once: drop closed ones, draw and present the rest
    ///
    /// Escape only sets the close flag; the window is destroyed on the
    /// following sweep.
    pub fn sweep(&mut self) {
        let graphics = self.graphics.as_mut();
        self.registry.retain(|id, window| {
            let surface = window.surface();

            if graphics.should_close(surface) {
                window.release(graphics);
                log::info!("Window '{id}' closed");
                return false;
            }

            if graphics.is_key_pressed(surface, Key::Escape) {
                graphics.set_should_close(surface, true);
                return true;
            }

            if let Err(err) = window.redraw(graphics).and_then(|()| graphics.present(surface)) {
                log::warn!("Frame for window '{id}' failed: {err}");
            }
            graphics.poll_events();
            true
        });
    }

    fn teardown(&mut self) {
        if !self.registry.is_empty() {
            log::info!("Closing {} remaining window(s)", self.registry.len());
        }
        self.registry.release_all(self.graphics.as_mut());
    }
}

/// Cloneable handle for submitting privileged operations
#[derive(Debug, Clone)]
pub struct Submitter {
    sender: mpsc::Sender<PrivilegedOp>,
}

fn package<R, F>(op: F) -> (PrivilegedOp, oneshot::Receiver<R>)
where
    F: FnOnce(&mut Stage) -> R + Send + 'static,
    R: Send + 'static,
{
    let (reply, response) = oneshot::channel();
    let job: PrivilegedOp = Box::new(move |stage| {
        // The submitter may have given up waiting
        let _ = reply.send(op(stage));
    });
    (job, response)
}

impl Submitter {
    /// Run `op` on the executor thread and wait for its result
    ///
    /// Blocks (asynchronously) until the executor accepts the operation and
    /// again until it has finished running it.
    pub async fn submit<R, F>(&self, op: F) -> Result<R, ExecutorError>
    where
        F: FnOnce(&mut Stage) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (job, response) = package(op);
        self.sender
            .send(job)
            .await
            .map_err(|_| ExecutorError::Stopped)?;
        response.await.map_err(|_| ExecutorError::Stopped)
    }

    /// Blocking variant of [`Submitter::submit`] for plain threads
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_submit<R, F>(&self, op: F) -> Result<R, ExecutorError>
    where
        F: FnOnce(&mut Stage) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (job, response) = package(op);
        self.sender
            .blocking_send(job)
            .map_err(|_| ExecutorError::Stopped)?;
        response.blocking_recv().map_err(|_| ExecutorError::Stopped)
    }
}

/// What one executor iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    /// Ran one privileged operation
    Operation,
    /// Swept every window
    Sweep,
    /// All submitters are gone and the queue is empty
    Disconnected,
}

/// The single-threaded loop owning the [`Stage`]
pub struct CommandExecutor {
    stage: Stage,
    receiver: mpsc::Receiver<PrivilegedOp>,
    idle_sleep: Duration,
}

impl CommandExecutor {
    /// Create an executor with the default QR encoder
    pub fn new(graphics: Box<dyn GraphicsBackend>, config: &ExecutorConfig) -> (Self, Submitter) {
        Self::with_encoder(graphics, Box::new(QrCodeEncoder), config)
    }

    /// Create an executor with a custom QR encoder
    pub fn with_encoder(
        graphics: Box<dyn GraphicsBackend>,
        encoder: Box<dyn QrEncoder>,
        config: &ExecutorConfig,
    ) -> (Self, Submitter) {
        let (sender, receiver) = mpsc::channel(config.queue_depth.max(1));
        log::debug!(
            "Command executor on '{}' backend, queue depth {}",
            graphics.name(),
            config.queue_depth.max(1)
        );

        let executor = Self {
            stage: Stage {
                registry: WindowRegistry::new(),
                graphics,
                encoder,
            },
            receiver,
            idle_sleep: config.idle_sleep(),
        };
        (executor, Submitter { sender })
    }

    /// Executor-owned state
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Mutable executor-owned state
    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    /// Run one iteration without sleeping
    pub fn step(&mut self) -> Iteration {
        match self.receiver.try_recv() {
            Ok(op) => {
                op(&mut self.stage);
                Iteration::Operation
            }
            Err(TryRecvError::Empty) => {
                self.stage.sweep();
                Iteration::Sweep
            }
            Err(TryRecvError::Disconnected) => Iteration::Disconnected,
        }
    }

    /// Loop until every submitter is dropped, then close all windows
    pub fn run(mut self) {
        log::info!("Command executor running");
        loop {
            match self.step() {
                Iteration::Operation => {}
                Iteration::Sweep => {
                    if !self.idle_sleep.is_zero() {
                        std::thread::sleep(self.idle_sleep);
                    }
                }
                Iteration::Disconnected => break,
            }
        }
        self.stage.teardown();
        log::info!("Command executor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::{Color, HeadlessBackend, HeadlessProbe, RecordedFrame};
    use crate::qr::RecoveryLevel;

    fn executor() -> (CommandExecutor, Submitter, HeadlessProbe) {
        let graphics = HeadlessBackend::new();
        let probe = graphics.probe();
        let config = ExecutorConfig {
            idle_sleep_ms: 0,
            ..ExecutorConfig::default()
        };
        let (executor, submitter) = CommandExecutor::new(Box::new(graphics), &config);
        (executor, submitter, probe)
    }

    fn solid(id: &str, color: Color) -> SolidWindowSpec {
        SolidWindowSpec {
            id: id.to_string(),
            width: 64,
            height: 48,
            title: id.to_string(),
            color,
        }
    }

    #[test]
    fn test_sweep_draws_and_presents() {
        let (mut executor, _submitter, probe) = executor();
        executor.stage_mut().upsert_solid(solid("a", Color::rgb(1, 2, 3))).unwrap();
        let surface = executor.stage().registry().get("a").unwrap().surface();

        assert_eq!(executor.step(), Iteration::Sweep);

        assert_eq!(probe.last_frame(surface), Some(RecordedFrame::Cleared(Color::rgb(1, 2, 3))));
        assert_eq!(probe.presented_frames(surface), 1);
        assert_eq!(probe.poll_count(), 1);
    }

    #[test]
    fn test_qr_window_presents_textured_frames() {
        let (mut executor, _submitter, probe) = executor();
        let spec = QrWindowSpec {
            id: "q".to_string(),
            title: "QR".to_string(),
            text: "hello".to_string(),
            level: RecoveryLevel::Medium,
            size: 128,
        };
        executor.stage_mut().upsert_qr(spec).unwrap();
        let surface = executor.stage().registry().get("q").unwrap().surface();

        executor.step();

        assert!(matches!(probe.last_frame(surface), Some(RecordedFrame::TexturedMesh { .. })));
    }

    #[test]
    fn test_escape_flags_then_next_sweep_destroys() {
        let (mut executor, _submitter, probe) = executor();
        executor.stage_mut().upsert_solid(solid("a", Color::WHITE)).unwrap();
        let surface = executor.stage().registry().get("a").unwrap().surface();
        probe.set_key(surface, Key::Escape, true);

        executor.step();
        assert!(executor.stage().registry().contains("a"));
        assert_eq!(probe.presented_frames(surface), 0);

        executor.step();
        assert!(!executor.stage().registry().contains("a"));
        assert_eq!(probe.open_windows(), 0);
    }

    #[test]
    fn test_close_button_removes_window() {
        let (mut executor, _submitter, probe) = executor();
        executor.stage_mut().upsert_solid(solid("a", Color::WHITE)).unwrap();
        executor.stage_mut().upsert_solid(solid("b", Color::BLACK)).unwrap();
        let surface = executor.stage().registry().get("a").unwrap().surface();

        probe.request_close(surface);
        executor.step();

        assert_eq!(executor.stage().registry().ids(), vec!["b".to_string()]);
        assert_eq!(probe.open_windows(), 1);
    }

    #[test]
    fn test_requested_close_waits_for_sweep() {
        let (mut executor, _submitter, probe) = executor();
        executor.stage_mut().upsert_solid(solid("a", Color::WHITE)).unwrap();

        assert_eq!(executor.stage_mut().request_close("a"), CloseRequest::Requested);
        assert_eq!(probe.open_windows(), 1);

        executor.step();
        assert_eq!(probe.open_windows(), 0);
    }

    #[test]
    fn test_queued_operation_runs_before_sweep() {
        let (mut executor, submitter, probe) = executor();

        let caller = std::thread::spawn(move || {
            submitter.blocking_submit(|stage| stage.upsert_solid(solid("a", Color::WHITE)).map_err(|e| e.to_string()))
        });

        while executor.step() != Iteration::Operation {}
        assert_eq!(probe.open_windows(), 1);

        let outcome = caller.join().unwrap();
        assert_eq!(outcome, Ok(Ok(Upsert::Created)));

        // The only submitter went away with the caller thread
        assert_eq!(executor.step(), Iteration::Disconnected);
    }

    #[test]
    fn test_run_tears_down_on_disconnect() {
        let graphics = HeadlessBackend::new();
        let probe = graphics.probe();

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let handle = std::thread::spawn(move || {
            let (executor, submitter) =
                CommandExecutor::new(Box::new(graphics), &ExecutorConfig::default());
            ready_tx.send(submitter).unwrap();
            executor.run();
        });

        let submitter = ready_rx.recv().unwrap();
        submitter
            .blocking_submit(|stage| stage.upsert_solid(solid("a", Color::WHITE)).is_ok())
            .unwrap();
        assert_eq!(probe.open_windows(), 1);

        drop(submitter);
        handle.join().unwrap();
        assert_eq!(probe.open_windows(), 0);
    }

    #[test]
    fn test_submit_after_stop_fails() {
        let (executor, submitter, _probe) = executor();
        drop(executor);

        assert_eq!(submitter.blocking_submit(|_| ()), Err(ExecutorError::Stopped));
    }
}
