//! Background shell processes
//!
//! Commands run under `bash -c` detached from the interactive turn. Output is
//! read line by line, fanned out to live subscribers over a broadcast channel
//! and kept in a bounded ring buffer of unread chunks for late readers. Bytes
//! that are not valid UTF-8 are replaced, never fatal.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{OrcaError, OrcaResult};

const LIVE_CHANNEL_CAPACITY: usize = 256;
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Which pipe a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellStream {
    Stdout,
    Stderr,
}

/// One line of process output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    /// Monotonic per process, starting at 0
    pub seq: u64,
    pub stream: ShellStream,
    pub line: String,
}

/// Lifecycle of a shell process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ShellStatus {
    Running,
    Completed { exit_code: i32 },
    Failed { error: String },
    Killed,
}

impl ShellStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ShellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed { exit_code } => write!(f, "completed (exit code {})", exit_code),
            Self::Failed { error } => write!(f, "failed: {}", error),
            Self::Killed => write!(f, "killed"),
        }
    }
}

/// Bounded buffer of chunks nobody has read yet
#[derive(Debug)]
struct OutputRing {
    capacity: usize,
    chunks: VecDeque<OutputChunk>,
    next_seq: u64,
    dropped: u64,
}

impl OutputRing {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            chunks: VecDeque::new(),
            next_seq: 0,
            dropped: 0,
        }
    }

    fn push(&mut self, stream: ShellStream, line: String) -> OutputChunk {
        let chunk = OutputChunk {
            seq: self.next_seq,
            stream,
            line,
        };
        self.next_seq += 1;
        if self.chunks.len() == self.capacity {
            self.chunks.pop_front();
            self.dropped += 1;
        }
        self.chunks.push_back(chunk.clone());
        chunk
    }
}

/// Backlog plus live feed handed to a subscriber
#[derive(Debug)]
pub struct ShellSubscription {
    /// Unread chunks at the moment of subscribing
    pub backlog: Vec<OutputChunk>,
    /// Every chunk produced after the backlog
    pub receiver: broadcast::Receiver<OutputChunk>,
}

/// Summary of a managed process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellInfo {
    pub id: String,
    pub command: String,
    pub working_dir: String,
    pub pid: Option<u32>,
    pub status: ShellStatus,
    pub started_at: DateTime<Utc>,
    pub unread: usize,
    pub dropped: u64,
}

struct ShellProcess {
    id: String,
    command: String,
    working_dir: String,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    ring: Mutex<OutputRing>,
    live: broadcast::Sender<OutputChunk>,
    status: watch::Sender<ShellStatus>,
    cancel: CancellationToken,
}

impl ShellProcess {
    fn emit(&self, stream: ShellStream, line: String) {
        let mut ring = self.ring.lock();
        let chunk = ring.push(stream, line);
        // no subscribers is fine
        let _ = self.live.send(chunk);
    }

    fn info(&self) -> ShellInfo {
        let ring = self.ring.lock();
        ShellInfo {
            id: self.id.clone(),
            command: self.command.clone(),
            working_dir: self.working_dir.clone(),
            pid: self.pid,
            status: self.status.borrow().clone(),
            started_at: self.started_at,
            unread: ring.chunks.len(),
            dropped: ring.dropped,
        }
    }
}

/// Runs and tracks background shell processes
pub struct ShellProcessManager {
    processes: DashMap<String, Arc<ShellProcess>>,
    buffer_capacity: usize,
}

impl ShellProcessManager {
    /// Create a manager whose processes keep at most `buffer_capacity` unread chunks
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            processes: DashMap::new(),
            buffer_capacity,
        }
    }

    /// Start `command` under `bash -c` in `working_dir`
    #[instrument(skip(self, working_dir))]
    pub fn spawn(&self, command: &str, working_dir: &Path) -> OrcaResult<String> {
        let mut child = Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                OrcaError::io_with_path(
                    format!("Failed to spawn background shell: {}", e),
                    working_dir.to_string_lossy(),
                )
            })?;

        let id = format!("shell_{}", &Uuid::new_v4().simple().to_string()[..8]);
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        let (status, _) = watch::channel(ShellStatus::Running);
        let process = Arc::new(ShellProcess {
            id: id.clone(),
            command: command.to_string(),
            working_dir: working_dir.to_string_lossy().to_string(),
            pid: child.id(),
            started_at: Utc::now(),
            ring: Mutex::new(OutputRing::new(self.buffer_capacity)),
            live,
            status,
            cancel: CancellationToken::new(),
        });

        let mut readers = Vec::with_capacity(2);
        if let Some(pipe) = child.stdout.take() {
            readers.push(spawn_reader(process.clone(), pipe, ShellStream::Stdout));
        }
        if let Some(pipe) = child.stderr.take() {
            readers.push(spawn_reader(process.clone(), pipe, ShellStream::Stderr));
        }
        tokio::spawn(monitor(child, readers, process.clone()));

        info!(shell_id = %id, pid = ?process.pid, "background shell started");
        self.processes.insert(id.clone(), process);
        Ok(id)
    }

    fn get(&self, id: &str) -> OrcaResult<Arc<ShellProcess>> {
        self.processes
            .get(id)
            .map(|p| p.clone())
            .ok_or_else(|| OrcaError::not_found_resource("shell", format!("Shell '{}' not found", id)))
    }

    /// Current unread backlog plus a receiver for everything after it
    pub fn subscribe(&self, id: &str) -> OrcaResult<ShellSubscription> {
        let process = self.get(id)?;
        let ring = process.ring.lock();
        // subscribing under the ring lock keeps backlog and live feed gap-free
        let receiver = process.live.subscribe();
        Ok(ShellSubscription {
            backlog: ring.chunks.iter().cloned().collect(),
            receiver,
        })
    }

    /// Drain and return the unread chunks
    pub fn read_unread(&self, id: &str) -> OrcaResult<Vec<OutputChunk>> {
        let process = self.get(id)?;
        let mut ring = process.ring.lock();
        Ok(ring.chunks.drain(..).collect())
    }

    /// Current status, or `None` for an unknown id
    pub fn status(&self, id: &str) -> Option<ShellStatus> {
        self.processes.get(id).map(|p| p.status.borrow().clone())
    }

    /// Info for every tracked process, oldest first
    pub fn list(&self) -> Vec<ShellInfo> {
        let mut infos: Vec<ShellInfo> = self.processes.iter().map(|p| p.info()).collect();
        infos.sort_by_key(|i| i.started_at);
        infos
    }

    /// Stop a process. Returns whether it was still running.
    #[instrument(skip(self))]
    pub async fn kill(&self, id: &str) -> OrcaResult<bool> {
        let process = self.get(id)?;
        if !process.status.borrow().is_running() {
            return Ok(false);
        }
        process.cancel.cancel();

        let mut status = process.status.subscribe();
        if tokio::time::timeout(KILL_GRACE, status.wait_for(|s| !s.is_running()))
            .await
            .is_err()
        {
            warn!(shell_id = %id, "shell did not exit within grace period");
        }
        Ok(true)
    }

    /// Wait until the process leaves `Running`; `None` on timeout
    pub async fn wait(&self, id: &str, timeout: Duration) -> OrcaResult<Option<ShellStatus>> {
        let process = self.get(id)?;
        let mut status = process.status.subscribe();
        match tokio::time::timeout(timeout, status.wait_for(|s| !s.is_running())).await {
            Ok(Ok(s)) => Ok(Some(s.clone())),
            Ok(Err(_)) => Ok(Some(process.status.borrow().clone())),
            Err(_) => Ok(None),
        }
    }

    /// Forget finished processes, returning how many were removed
    pub fn remove_finished(&self) -> usize {
        let before = self.processes.len();
        self.processes.retain(|_, p| p.status.borrow().is_running());
        before - self.processes.len()
    }

    /// Kill everything still running
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.processes.iter().map(|p| p.key().clone()).collect();
        for id in ids {
            if let Err(e) = self.kill(&id).await {
                debug!(shell_id = %id, error = %e, "shell already gone at shutdown");
            }
        }
    }
}

fn spawn_reader<R>(process: Arc<ShellProcess>, pipe: R, stream: ShellStream) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => process.emit(stream, decode_line(&buf)),
                Err(e) => {
                    debug!(shell_id = %process.id, error = %e, "output pipe closed");
                    break;
                }
            }
        }
    })
}

/// Strip the line terminator; invalid UTF-8 becomes U+FFFD
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

async fn monitor(mut child: Child, readers: Vec<JoinHandle<()>>, process: Arc<ShellProcess>) {
    let final_status = tokio::select! {
        _ = process.cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!(shell_id = %process.id, error = %e, "failed to kill shell");
            }
            for reader in &readers {
                reader.abort();
            }
            ShellStatus::Killed
        }
        result = child.wait() => {
            // drain remaining output before reporting completion
            for reader in readers {
                let _ = reader.await;
            }
            match result {
                Ok(exit) => ShellStatus::Completed { exit_code: exit.code().unwrap_or(-1) },
                Err(e) => ShellStatus::Failed { error: e.to_string() },
            }
        }
    };

    info!(shell_id = %process.id, status = %final_status, "background shell finished");
    process.status.send_replace(final_status);
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(10);

    fn tmp() -> std::path::PathBuf {
        std::env::temp_dir()
    }

    #[tokio::test]
    async fn test_output_is_buffered_until_read() {
        let manager = ShellProcessManager::new(100);
        let id = manager.spawn("echo one; echo two >&2", &tmp()).unwrap();

        let status = manager.wait(&id, WAIT).await.unwrap();
        assert_eq!(status, Some(ShellStatus::Completed { exit_code: 0 }));

        let chunks = manager.read_unread(&id).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().any(|c| c.stream == ShellStream::Stdout && c.line == "one"));
        assert!(chunks.iter().any(|c| c.stream == ShellStream::Stderr && c.line == "two"));
        assert!(manager.read_unread(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ring_buffer_evicts_oldest() {
        let manager = ShellProcessManager::new(2);
        let id = manager.spawn("for i in 1 2 3 4 5; do echo $i; done", &tmp()).unwrap();
        manager.wait(&id, WAIT).await.unwrap();

        let lines: Vec<String> = manager
            .read_unread(&id)
            .unwrap()
            .into_iter()
            .map(|c| c.line)
            .collect();
        assert_eq!(lines, vec!["4", "5"]);
        assert_eq!(manager.list()[0].dropped, 3);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_backlog_and_live_output() {
        let manager = ShellProcessManager::new(100);
        let id = manager
            .spawn("echo early; sleep 0.3; echo late", &tmp())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let mut subscription = manager.subscribe(&id).unwrap();
        let mut seen: Vec<String> = subscription.backlog.iter().map(|c| c.line.clone()).collect();
        while let Ok(Ok(chunk)) =
            tokio::time::timeout(WAIT, subscription.receiver.recv()).await
        {
            seen.push(chunk.line);
            if seen.len() == 2 {
                break;
            }
        }
        assert_eq!(seen, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_kill_running_process() {
        let manager = ShellProcessManager::new(10);
        let id = manager.spawn("sleep 30", &tmp()).unwrap();
        assert_eq!(manager.status(&id), Some(ShellStatus::Running));

        assert!(manager.kill(&id).await.unwrap());
        assert_eq!(manager.status(&id), Some(ShellStatus::Killed));
        assert!(!manager.kill(&id).await.unwrap());
        assert_eq!(manager.remove_finished(), 1);
        assert!(manager.list().is_empty());
    }

    #[tokio::test]
    async fn test_nonzero_exit_code() {
        let manager = ShellProcessManager::new(10);
        let id = manager.spawn("exit 3", &tmp()).unwrap();
        let status = manager.wait(&id, WAIT).await.unwrap();
        assert_eq!(status, Some(ShellStatus::Completed { exit_code: 3 }));
    }

    #[tokio::test]
    async fn test_invalid_utf8_does_not_stop_output() {
        let manager = ShellProcessManager::new(100);
        let id = manager
            .spawn("echo before; printf 'bad\\xff\\n'; echo after1; echo after2", &tmp())
            .unwrap();

        let status = manager.wait(&id, WAIT).await.unwrap();
        assert_eq!(status, Some(ShellStatus::Completed { exit_code: 0 }));

        let lines: Vec<String> = manager
            .read_unread(&id)
            .unwrap()
            .into_iter()
            .map(|c| c.line)
            .collect();
        assert_eq!(lines, vec!["before", "bad\u{FFFD}", "after1", "after2"]);
    }

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"plain\n"), "plain");
        assert_eq!(decode_line(b"crlf\r\n"), "crlf");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"x\xfey\n"), "x\u{FFFD}y");
    }

    #[tokio::test]
    async fn test_unknown_shell() {
        let manager = ShellProcessManager::new(10);
        assert!(manager.read_unread("missing").is_err());
        assert!(manager.status("missing").is_none());
        assert!(manager.kill("missing").await.is_err());
    }
}
