// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running spec files and streaming their output.
//!
//! A [`SpecRunner`] starts one run at a time. Output is read from the child on a background task
//! and delivered through [`RunningProcess::next_event`] as decoded text chunks, followed by the
//! exit code. stdout and stderr are interleaved in arrival order on the same stream. Lines from
//! stderr can be marked with a configurable prefix.
//!
//! If the project has no runner configuration file, runs are simulated: a couple of placeholder
//! lines are emitted and the run exits successfully. This makes it possible to try out the tool
//! on a project that isn't set up yet.

use crate::{
    config::RunnerConfig,
    errors::SpawnError,
    line_buffer::{ChunkDecoder, LinePrefixer},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    process::Stdio,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    sync::{mpsc, oneshot},
};
use tracing::{debug, info, warn};

/// The size of each buffered reader's buffer.
const CHUNK_SIZE: usize = 4 * 1024;

/// Whether runs execute the real runner or are simulated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// The configured runner command is executed.
    Real,

    /// The run is simulated.
    Simulated,
}

/// An event produced by a running spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of output. Chunks are not aligned to lines.
    Chunk(String),

    /// The process failed without producing an exit code, or its output could not be read.
    SpawnFailed(String),

    /// The process exited. The exit code is `None` if it was killed by a signal or stopped.
    ///
    /// This is always the last event.
    Exited(Option<i32>),
}

/// Starts spec runs.
#[derive(Clone, Debug)]
pub struct SpecRunner {
    project_root: Utf8PathBuf,
    config: RunnerConfig,
    active: Arc<AtomicBool>,
}

impl SpecRunner {
    /// Creates a new runner for the project.
    pub fn new(project_root: impl Into<Utf8PathBuf>, config: &RunnerConfig) -> Self {
        Self {
            project_root: project_root.into(),
            config: config.clone(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the mode runs will use, based on whether the detect file exists.
    pub fn mode(&self) -> RunMode {
        if self.project_root.join(&self.config.detect_file).is_file() {
            RunMode::Real
        } else {
            RunMode::Simulated
        }
    }

    /// Returns true if a run is in progress.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Starts running a spec file.
    ///
    /// Must be called from within a Tokio runtime. Fails with [`SpawnError::AlreadyRunning`] if
    /// a previous run hasn't exited yet.
    pub fn start(&self, spec_path: &Utf8Path) -> Result<RunningProcess, SpawnError> {
        let guard = ActiveGuard::acquire(&self.active)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let mode = self.mode();
        let description = match mode {
            RunMode::Real => {
                let (child, description) = self.spawn_runner(spec_path)?;
                info!("running `{description}`");
                let stderr_prefixer = LinePrefixer::new(self.config.stderr_prefix.clone());
                tokio::spawn(drive_child(
                    child,
                    stderr_prefixer,
                    events_tx,
                    stop_rx,
                    guard,
                ));
                description
            }
            RunMode::Simulated => {
                info!(
                    "`{}` not found, simulating run of `{spec_path}`",
                    self.config.detect_file
                );
                tokio::spawn(simulate(
                    spec_path.to_owned(),
                    self.config.simulate_delay,
                    events_tx,
                    stop_rx,
                    guard,
                ));
                format!("simulated run of {spec_path}")
            }
        };

        Ok(RunningProcess {
            mode,
            description,
            events: events_rx,
            stop: Some(stop_tx),
        })
    }

    fn spawn_runner(&self, spec_path: &Utf8Path) -> Result<(Child, String), SpawnError> {
        let mut args: Vec<&str> = self.config.command.iter().map(String::as_str).collect();
        args.push(spec_path.as_str());
        let description = args.join(" ");

        let mut command = runner_command(&args);
        command
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|err| SpawnError::Spawn {
            command: description.clone(),
            err,
        })?;
        Ok((child, description))
    }
}

// Runner commands like `npx` are batch files on Windows, which can only be started through the
// shell.
#[cfg(windows)]
fn runner_command(args: &[&str]) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").args(args);
    command
}

#[cfg(not(windows))]
fn runner_command(args: &[&str]) -> Command {
    let mut command = Command::new(args[0]);
    command.args(&args[1..]);
    command
}

/// A run in progress.
#[derive(Debug)]
pub struct RunningProcess {
    mode: RunMode,
    description: String,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    stop: Option<oneshot::Sender<()>>,
}

impl RunningProcess {
    /// Returns the mode of this run.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Returns a human-readable description of what is running.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Waits for the next event. Returns `None` after [`ProcessEvent::Exited`] has been returned.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Asks the run to stop. The process is killed, and an [`ProcessEvent::Exited`] event
    /// follows.
    ///
    /// Returns false if a stop was already requested or the run has finished.
    pub fn stop(&mut self) -> bool {
        match self.stop.take() {
            Some(stop) => stop.send(()).is_ok(),
            None => false,
        }
    }
}

/// Marks the runner as busy until dropped.
#[derive(Debug)]
struct ActiveGuard {
    active: Arc<AtomicBool>,
}

impl ActiveGuard {
    fn acquire(active: &Arc<AtomicBool>) -> Result<Self, SpawnError> {
        active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SpawnError::AlreadyRunning)?;
        Ok(Self {
            active: active.clone(),
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

async fn drive_child(
    mut child: Child,
    mut stderr_prefixer: LinePrefixer,
    events: mpsc::UnboundedSender<ProcessEvent>,
    mut stop: oneshot::Receiver<()>,
    _guard: ActiveGuard,
) {
    // Errors sending events mean the receiver has gone away, in which case there's nobody left
    // to tell.
    let send = |event: ProcessEvent| {
        _ = events.send(event);
    };

    if let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) {
        let mut stdout = BufReader::with_capacity(CHUNK_SIZE, stdout);
        let mut stderr = BufReader::with_capacity(CHUNK_SIZE, stderr);
        let mut stdout_decoder = ChunkDecoder::new();
        let mut stderr_decoder = ChunkDecoder::new();

        let mut out_done = false;
        let mut err_done = false;

        while !out_done || !err_done {
            tokio::select! {
                // Also fires if the RunningProcess is dropped.
                _ = &mut stop => {
                    debug!("stop requested, killing runner");
                    if let Err(error) = child.start_kill() {
                        warn!("failed to kill runner: {error}");
                    }
                    // Grandchildren may keep the pipes open, so don't wait for them to close.
                    break;
                }
                res = stdout.fill_buf(), if !out_done => {
                    let read = match res {
                        Ok(buf) => {
                            send_chunk(&send, stdout_decoder.decode(buf));
                            buf.len()
                        }
                        Err(error) => {
                            send(ProcessEvent::SpawnFailed(format!("error reading stdout: {error}")));
                            0
                        }
                    };
                    stdout.consume(read);
                    out_done = read == 0;
                }
                res = stderr.fill_buf(), if !err_done => {
                    let read = match res {
                        Ok(buf) => {
                            send_chunk(&send, stderr_prefixer.apply(stderr_decoder.decode(buf)));
                            buf.len()
                        }
                        Err(error) => {
                            send(ProcessEvent::SpawnFailed(format!("error reading stderr: {error}")));
                            0
                        }
                    };
                    stderr.consume(read);
                    err_done = read == 0;
                }
            }
        }

        send_chunk(&send, stdout_decoder.finish());
        send_chunk(&send, stderr_prefixer.apply(stderr_decoder.finish()));
    }

    match child.wait().await {
        Ok(status) => {
            debug!("runner exited with {status}");
            send(ProcessEvent::Exited(status.code()));
        }
        Err(error) => {
            send(ProcessEvent::SpawnFailed(format!(
                "error waiting for runner: {error}"
            )));
            send(ProcessEvent::Exited(None));
        }
    }
}

fn send_chunk(send: &impl Fn(ProcessEvent), chunk: String) {
    if !chunk.is_empty() {
        send(ProcessEvent::Chunk(chunk));
    }
}

/// The lines printed by a simulated run.
pub fn simulated_output(spec_path: &Utf8Path) -> [String; 2] {
    [
        format!("[MOCK] runner not detected. Simulating test in: {spec_path}\n"),
        "[MOCK] Done.\n".to_owned(),
    ]
}

async fn simulate(
    spec_path: Utf8PathBuf,
    delay: std::time::Duration,
    events: mpsc::UnboundedSender<ProcessEvent>,
    stop: oneshot::Receiver<()>,
    _guard: ActiveGuard,
) {
    let [first, last] = simulated_output(&spec_path);
    _ = events.send(ProcessEvent::Chunk(first));

    tokio::select! {
        _ = stop => {
            debug!("simulated run stopped");
            _ = events.send(ProcessEvent::Exited(None));
        }
        () = tokio::time::sleep(delay) => {
            _ = events.send(ProcessEvent::Chunk(last));
            _ = events.send(ProcessEvent::Exited(Some(0)));
        }
    }
}
