//! Local process commands.
//!
//! `ProcessCommand` spawns a child on a tokio runtime and reports it through
//! the callback protocol: one `on_next` per stdout line, `on_complete` on a
//! zero exit status, `on_error` otherwise, `close` always last. The start
//! handle kills the child.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use super::target::CommandSpec;
use super::{AsyncCommand, CallbackSink};
use crate::bridge::{Disposable, StartHandle};

/// Number of stderr lines attached to a failed exit.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("child {0} pipe unavailable")]
    MissingPipe(&'static str),

    #[error("i/o error while reading child output: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{program}' exited with {}{}", exit_label(.code), stderr_suffix(.stderr))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("'{0}' was cancelled")]
    Cancelled(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Kill switch behind the start handle. The running task keeps its own
/// clone, so the receiver only fires on an explicit dispose.
struct KillSwitch {
    tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl Disposable for KillSwitch {
    fn dispose(&self) {
        if let Some(tx) = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = tx.send(());
        }
    }
}

/// A command line executed as a child process.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    spec: CommandSpec,
    runtime: Handle,
}

impl ProcessCommand {
    pub fn new(spec: CommandSpec, runtime: Handle) -> Self {
        Self { spec, runtime }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }
}

impl AsyncCommand for ProcessCommand {
    type Output = String;

    fn execute(self, mut sink: CallbackSink<String>) {
        let (tx, kill_rx) = oneshot::channel();
        let switch = Arc::new(KillSwitch {
            tx: Mutex::new(Some(tx)),
        });
        let spec = self.spec;
        self.runtime.spawn(async move {
            let _switch_guard = Arc::clone(&switch);
            sink.on_start(StartHandle::from_arc(switch));
            match drive(&spec, &mut sink, kill_rx).await {
                Ok(()) => sink.on_complete(),
                Err(e) => {
                    tracing::debug!(command = %spec, error = %e, "command failed");
                    sink.on_error(Arc::new(e));
                }
            }
            sink.close();
        });
    }
}

async fn drive(
    spec: &CommandSpec,
    sink: &mut CallbackSink<String>,
    mut kill_rx: oneshot::Receiver<()>,
) -> Result<(), ProcessError> {
    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
    tracing::debug!(command = %spec, pid = ?child.id(), "spawned");

    let stdout = child.stdout.take().ok_or(ProcessError::MissingPipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(ProcessError::MissingPipe("stderr"))?;
    let stderr_task = tokio::spawn(stderr_tail(stderr, spec.program.clone()));

    let mut stdout = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        tokio::select! {
            line = next_line(&mut stdout, &mut buf) => match line? {
                Some(line) => sink.on_next(line),
                None => break,
            },
            _ = &mut kill_rx => {
                let _ = child.kill().await;
                return Err(ProcessError::Cancelled(spec.to_string()));
            }
        }
    }

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = &mut kill_rx => {
            let _ = child.kill().await;
            return Err(ProcessError::Cancelled(spec.to_string()));
        }
    };
    let stderr = stderr_task.await.unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(ProcessError::Exit {
            program: spec.program.clone(),
            code: status.code(),
            stderr,
        })
    }
}

/// Read one line, without its `\n` / `\r\n` ending. Invalid UTF-8 is
/// replaced rather than rejected.
async fn next_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let raw: &[u8] = buf;
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    Ok(Some(String::from_utf8_lossy(raw).into_owned()))
}

/// Drain stderr, logging each line and keeping the last few.
async fn stderr_tail<R: AsyncRead + Unpin>(stderr: R, program: String) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    while let Ok(Some(line)) = next_line(&mut reader, &mut buf).await {
        tracing::debug!(program = %program, "stderr: {line}");
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}
