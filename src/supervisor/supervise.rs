//! Execution supervisor
//!
//! Spawns the cleared command and races the triggers that can end it:
//! natural exit, the timeout timer, an external cancellation signal, and
//! the output-size watchdog. A single `tokio::select!` loop owns the
//! outcome, so exactly the first trigger to fire performs the kill and sets
//! the terminal state; every exit path drops the timer and listeners with
//! the loop itself.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::kill::ProcessTreeKiller;
use crate::core::{
    EventSender, ExecEvent, ExecutionOutcome, ExecutionRequest, SandboxError, SandboxResult,
    MAX_DISPLAY_OUTPUT, MAX_OUTPUT_BYTES, MAX_TIMEOUT_MS, TRUNCATION_MARKER,
};

/// Grace window added to the caller's timeout before the timer fires
pub const GRACE_MS: u64 = 250;

/// Budget for draining buffered pipe output after natural exit
const DRAIN_MS: u64 = 200;

/// Terminal state of one supervised execution
enum Terminal {
    Exited(Option<i32>),
    TimedOut,
    Aborted,
    KilledForSize,
}

/// Supervises one process per call, enforcing timeout, output and abort
/// limits concurrently
pub struct Supervisor {
    events: EventSender,
    killer: Arc<dyn ProcessTreeKiller>,
}

impl Supervisor {
    /// Create a supervisor emitting progress on `events` and killing
    /// through the platform `killer`
    pub fn new(events: EventSender, killer: Arc<dyn ProcessTreeKiller>) -> Self {
        Self { events, killer }
    }

    /// Spawn the request's command and supervise it to a terminal state
    ///
    /// Returns `Err` only when the OS failed to create the process; every
    /// other ending is reported in the outcome.
    pub async fn supervise(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> SandboxResult<ExecutionOutcome> {
        let execution_id = Uuid::new_v4();
        let timeout = Duration::from_millis(request.timeout_ms.min(MAX_TIMEOUT_MS));

        let mut command = shell_command(&request.command);
        command
            .current_dir(&request.cwd)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;
        let pid = child
            .id()
            .ok_or(SandboxError::PipeUnavailable("process id"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or(SandboxError::PipeUnavailable("stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or(SandboxError::PipeUnavailable("stderr"))?;

        tracing::info!(
            "[Supervisor] Spawned pid {} for execution {}: {}",
            pid,
            execution_id,
            request.command
        );

        let mut buffer = OutputBuffer::new();
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut out_chunk = [0u8; 8192];
        let mut err_chunk = [0u8; 8192];

        let deadline = sleep(timeout + Duration::from_millis(GRACE_MS));
        tokio::pin!(deadline);

        let terminal = loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status.map_err(SandboxError::Wait)?;
                    tracing::debug!("[Supervisor] pid {} exited: {:?}", pid, status.code());
                    break Terminal::Exited(status.code());
                }
                result = stdout.read(&mut out_chunk), if stdout_open => {
                    match result {
                        Ok(0) | Err(_) => stdout_open = false,
                        Ok(n) => {
                            if self.ingest(&mut buffer, &out_chunk[..n], execution_id, request) {
                                tracing::warn!(
                                    "[Supervisor] Output ceiling exceeded, killing pid {}",
                                    pid
                                );
                                self.kill(pid);
                                let _ = child.wait().await;
                                break Terminal::KilledForSize;
                            }
                        }
                    }
                }
                result = stderr.read(&mut err_chunk), if stderr_open => {
                    match result {
                        Ok(0) | Err(_) => stderr_open = false,
                        Ok(n) => {
                            if self.ingest(&mut buffer, &err_chunk[..n], execution_id, request) {
                                tracing::warn!(
                                    "[Supervisor] Output ceiling exceeded, killing pid {}",
                                    pid
                                );
                                self.kill(pid);
                                let _ = child.wait().await;
                                break Terminal::KilledForSize;
                            }
                        }
                    }
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        "[Supervisor] Timeout after {}ms, killing pid {}",
                        request.timeout_ms,
                        pid
                    );
                    self.kill(pid);
                    let _ = child.wait().await;
                    break Terminal::TimedOut;
                }
                _ = cancel.cancelled() => {
                    tracing::info!("[Supervisor] Aborted externally, killing pid {}", pid);
                    self.kill(pid);
                    let _ = child.wait().await;
                    break Terminal::Aborted;
                }
            }
        };

        // After a natural exit the pipes may still hold buffered output;
        // drain within a bounded budget (grandchildren can keep the write
        // end open indefinitely)
        if matches!(terminal, Terminal::Exited(_)) {
            let drain = async {
                while stdout_open || stderr_open {
                    tokio::select! {
                        result = stdout.read(&mut out_chunk), if stdout_open => {
                            match result {
                                Ok(0) | Err(_) => stdout_open = false,
                                Ok(n) => {
                                    self.ingest(&mut buffer, &out_chunk[..n], execution_id, request);
                                }
                            }
                        }
                        result = stderr.read(&mut err_chunk), if stderr_open => {
                            match result {
                                Ok(0) | Err(_) => stderr_open = false,
                                Ok(n) => {
                                    self.ingest(&mut buffer, &err_chunk[..n], execution_id, request);
                                }
                            }
                        }
                    }
                }
            };
            let _ = tokio::time::timeout(Duration::from_millis(DRAIN_MS), drain).await;
        }

        let (output, truncated) = buffer.finish();
        let mut outcome = ExecutionOutcome {
            output,
            truncated,
            ..Default::default()
        };
        match terminal {
            Terminal::Exited(code) => outcome.exit_code = code,
            Terminal::TimedOut => outcome.timed_out = true,
            Terminal::Aborted => outcome.aborted = true,
            Terminal::KilledForSize => outcome.killed_for_size = true,
        }
        Ok(outcome)
    }

    /// Append a chunk; returns true exactly once when the hard byte ceiling
    /// is crossed
    fn ingest(
        &self,
        buffer: &mut OutputBuffer,
        chunk: &[u8],
        execution_id: Uuid,
        request: &ExecutionRequest,
    ) -> bool {
        let crossed = buffer.append(chunk);
        if let Some(text) = buffer.take_pending_event() {
            let _ = self.events.send(ExecEvent {
                execution_id,
                output: text,
                description: request.description.clone(),
            });
        }
        crossed
    }

    fn kill(&self, pid: u32) {
        if let Err(e) = self.killer.kill_tree(pid) {
            tracing::warn!("[Supervisor] Failed to kill process tree {}: {}", pid, e);
        }
    }
}

/// Bounded accumulation of combined stdout/stderr
///
/// Counts every byte against the hard ceiling but stores (and mirrors to
/// events) only up to the display ceiling. A multibyte UTF-8 sequence split
/// across read chunks is carried over and decoded whole; the display cap
/// never cuts inside a character.
struct OutputBuffer {
    display: String,
    pending_event: String,
    carry: Vec<u8>,
    total_bytes: usize,
    hit_hard_cap: bool,
    display_truncated: bool,
}

impl OutputBuffer {
    fn new() -> Self {
        Self {
            display: String::new(),
            pending_event: String::new(),
            carry: Vec::new(),
            total_bytes: 0,
            hit_hard_cap: false,
            display_truncated: false,
        }
    }

    /// Count and store a chunk; true exactly once when the hard cap is
    /// crossed (subsequent chunks are counted but never re-trigger)
    fn append(&mut self, chunk: &[u8]) -> bool {
        self.total_bytes += chunk.len();

        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);
        let split = bytes.len() - incomplete_suffix_len(&bytes);
        self.carry = bytes.split_off(split);
        let text = String::from_utf8_lossy(&bytes).into_owned();
        self.push_display(&text);

        if self.total_bytes > MAX_OUTPUT_BYTES && !self.hit_hard_cap {
            self.hit_hard_cap = true;
            return true;
        }
        false
    }

    /// Append decoded text up to the display ceiling, backing off to a
    /// character boundary
    fn push_display(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let room = MAX_DISPLAY_OUTPUT.saturating_sub(self.display.len());
        if room == 0 {
            self.display_truncated = true;
            return;
        }
        let mut take = text.len().min(room);
        while take > 0 && !text.is_char_boundary(take) {
            take -= 1;
        }
        if take < text.len() {
            self.display_truncated = true;
        }
        self.display.push_str(&text[..take]);
        self.pending_event.push_str(&text[..take]);
    }

    /// The display-capped output accumulated since the last event
    fn take_pending_event(&mut self) -> Option<String> {
        if self.pending_event.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending_event))
    }

    /// Final output string and whether it was truncated
    fn finish(mut self) -> (String, bool) {
        if !self.carry.is_empty() {
            // The stream ended mid-sequence; decode what is there
            let tail = std::mem::take(&mut self.carry);
            let text = String::from_utf8_lossy(&tail).into_owned();
            self.push_display(&text);
        }
        if self.display_truncated {
            self.display.push_str(TRUNCATION_MARKER);
        }
        (self.display, self.display_truncated)
    }
}

/// Length of an incomplete UTF-8 sequence at the end of `bytes`, zero when
/// the buffer ends on a complete character (or on bytes no carry can fix)
fn incomplete_suffix_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    let mut i = len;
    while i > 0 && len - i < 4 {
        let b = bytes[i - 1];
        if b < 0x80 {
            return 0;
        }
        if b >= 0xC0 {
            let width = if b >= 0xF0 {
                4
            } else if b >= 0xE0 {
                3
            } else {
                2
            };
            return if len - (i - 1) < width { len - (i - 1) } else { 0 };
        }
        i -= 1;
    }
    0
}

/// The platform shell invocation for a raw command string
fn shell_command(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command);
        cmd
    }
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::create_event_channel;
    use crate::supervisor::kill::platform_killer;
    use std::time::Instant;

    fn supervisor() -> Supervisor {
        Supervisor::new(create_event_channel(), platform_killer())
    }

    fn request(command: &str, timeout_ms: u64) -> ExecutionRequest {
        ExecutionRequest::new(command, std::env::temp_dir()).with_timeout_ms(timeout_ms)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_exit() {
        let outcome = supervisor()
            .supervise(&request("echo hello", 5_000), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.output.contains("hello"));
        assert!(!outcome.timed_out && !outcome.aborted && !outcome.killed_for_size);
        assert!(outcome.is_consistent());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_code_mirrored() {
        let outcome = supervisor()
            .supervise(&request("exit 3", 5_000), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_captured() {
        let outcome = supervisor()
            .supervise(&request("echo oops 1>&2", 5_000), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.output.contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_within_grace() {
        let started = Instant::now();
        let outcome = supervisor()
            .supervise(&request("sleep 10", 200), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
        assert!(!outcome.aborted && !outcome.killed_for_size);
        // 200ms timeout + 250ms grace, with scheduling headroom
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_abort() {
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let outcome = supervisor()
            .supervise(&request("sleep 10", 30_000), &cancel)
            .await
            .unwrap();
        assert!(outcome.aborted);
        assert_eq!(outcome.exit_code, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_ceiling_kills_once_and_truncates() {
        // ~20MB of output, double the hard ceiling
        let outcome = supervisor()
            .supervise(
                &request("head -c 20000000 /dev/zero", 30_000),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.killed_for_size);
        assert_eq!(outcome.exit_code, None);
        assert!(outcome.truncated);
        assert!(outcome.output.len() <= MAX_DISPLAY_OUTPUT + TRUNCATION_MARKER.len());
        assert!(outcome.output.ends_with(TRUNCATION_MARKER));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_progress_events_mirrored() {
        let events = create_event_channel();
        let mut rx = events.subscribe();
        let supervisor = Supervisor::new(events, platform_killer());

        let outcome = supervisor
            .supervise(
                &request("echo progress", 5_000).with_description("Print progress"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(0));

        let event = rx.recv().await.unwrap();
        assert!(event.output.contains("progress"));
        assert_eq!(event.description.as_deref(), Some("Print progress"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_failure_for_bad_cwd() {
        let request = ExecutionRequest::new("echo hi", "/no/such/dir/exists");
        let result = supervisor()
            .supervise(&request, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SandboxError::Spawn(_))));
    }

    #[test]
    fn test_output_buffer_caps_display() {
        let mut buffer = OutputBuffer::new();
        let chunk = vec![b'a'; MAX_DISPLAY_OUTPUT + 500];
        assert!(!buffer.append(&chunk));

        let (output, truncated) = buffer.finish();
        assert!(truncated);
        assert_eq!(
            output.len(),
            MAX_DISPLAY_OUTPUT + TRUNCATION_MARKER.len()
        );
    }

    #[test]
    fn test_output_buffer_multibyte_sequence_split_across_chunks() {
        // "é" is 0xC3 0xA9; the pipe can hand over the bytes separately
        let mut buffer = OutputBuffer::new();
        buffer.append(b"caf\xC3");
        buffer.append(b"\xA9 ok");

        let (output, truncated) = buffer.finish();
        assert_eq!(output, "café ok");
        assert!(!truncated);
        assert!(!output.contains('\u{FFFD}'));
    }

    #[test]
    fn test_output_buffer_display_cap_respects_char_boundaries() {
        let mut buffer = OutputBuffer::new();
        buffer.append(&vec![b'a'; MAX_DISPLAY_OUTPUT - 1]);
        buffer.append("éé".as_bytes());

        let (output, truncated) = buffer.finish();
        assert!(truncated);
        // The cap backs off rather than splitting the two-byte character
        assert_eq!(output.len(), MAX_DISPLAY_OUTPUT - 1 + TRUNCATION_MARKER.len());
        assert!(!output.contains('\u{FFFD}'));
    }

    #[test]
    fn test_output_buffer_hard_cap_fires_once() {
        let mut buffer = OutputBuffer::new();
        let chunk = vec![0u8; MAX_OUTPUT_BYTES / 2 + 1];
        assert!(!buffer.append(&chunk));
        assert!(buffer.append(&chunk));
        // Already fired; further chunks are counted but do not re-trigger
        assert!(!buffer.append(&chunk));
    }
}
