//! Integration tests for the host running on the headless backend

mod host_integration;

use crate::core::config::ExecutorConfig;
use crate::executor::{CommandExecutor, Submitter};
use crate::graphics::{HeadlessBackend, HeadlessProbe};
use std::time::Duration;

/// An executor running on its own thread
///
/// The thread stops and closes every window once all submitters are dropped.
pub(crate) struct HeadlessHost {
    pub submitter: Submitter,
    pub probe: HeadlessProbe,
}

pub(crate) fn spawn_headless() -> HeadlessHost {
    let graphics = HeadlessBackend::new();
    let probe = graphics.probe();
    let config = ExecutorConfig {
        idle_sleep_ms: 1,
        ..ExecutorConfig::default()
    };

    let (ready_tx, ready_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let (executor, submitter) = CommandExecutor::new(Box::new(graphics), &config);
        if ready_tx.send(submitter).is_ok() {
            executor.run();
        }
    });

    let submitter = ready_rx.recv().expect("executor thread started");
    HeadlessHost { submitter, probe }
}

/// Poll `condition` until it holds or two seconds pass
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
