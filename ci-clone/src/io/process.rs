//! Helpers for running child processes while relaying and capturing output.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, error, instrument, warn};

/// Where a child's output is mirrored while it is being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    /// Mirror stdout to our stdout and stderr to our stderr, line by line.
    Inherit,
    /// Capture only.
    Silent,
}

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// stdout and stderr interleaved in arrival order, never truncated.
    pub combined: Vec<u8>,
}

impl CommandOutput {
    pub fn combined_lossy(&self) -> String {
        String::from_utf8_lossy(&self.combined).into_owned()
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Run a command to completion, teeing its output.
///
/// Both pipes are drained concurrently so a chatty child cannot deadlock on a
/// full pipe. There is no timeout; the call blocks until the child exits.
#[instrument(skip_all, fields(relay = ?relay))]
pub fn run_command_tee(mut cmd: Command, relay: Relay) -> io::Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e);
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr was not piped"))?;

    let combined = Arc::new(Mutex::new(Vec::new()));
    let stdout_sink = Arc::clone(&combined);
    let stderr_sink = Arc::clone(&combined);

    let stdout_handle =
        thread::spawn(move || read_stream_tee(stdout, Stream::Stdout, relay, &stdout_sink));
    let stderr_handle =
        thread::spawn(move || read_stream_tee(stderr, Stream::Stderr, relay, &stderr_sink));

    let status = child.wait()?;

    join_reader(stdout_handle)?;
    join_reader(stderr_handle)?;

    let combined = match Arc::try_unwrap(combined) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()),
        Err(shared) => shared
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone()),
    };

    debug!(exit_code = ?status.code(), bytes = combined.len(), "command finished");
    Ok(CommandOutput { status, combined })
}

fn join_reader(handle: thread::JoinHandle<io::Result<()>>) -> io::Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(io::Error::other("output reader thread panicked")),
    }
}

/// Read a stream line by line, mirroring each line and appending it to `sink`.
fn read_stream_tee<R: Read>(
    reader: R,
    stream: Stream,
    relay: Relay,
    sink: &Mutex<Vec<u8>>,
) -> io::Result<()> {
    let mut buf_reader = BufReader::new(reader);

    loop {
        let mut line = Vec::new();
        let n = buf_reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }

        if relay == Relay::Inherit {
            let written = match stream {
                Stream::Stdout => mirror(io::stdout().lock(), &line),
                Stream::Stderr => mirror(io::stderr().lock(), &line),
            };
            if let Err(e) = written {
                warn!(err = %e, ?stream, "failed to relay child output");
            }
        }

        match sink.lock() {
            Ok(mut buf) => buf.extend_from_slice(&line),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(&line),
        }
    }

    Ok(())
}

fn mirror<W: Write>(mut writer: W, line: &[u8]) -> io::Result<()> {
    writer.write_all(line)?;
    writer.flush()
}
