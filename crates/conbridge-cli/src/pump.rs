//! Threads copying bytes between this process's stdio and the child.

use std::io::{self, Read, Write};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use conbridge_pty::{ChannelReader, ChannelWriter};

const CHUNK: usize = 4096;
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Copy the child's output to our stdout until the channel ends.
pub fn spawn_output(mut reader: ChannelReader) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("conbridge-output".to_string())
        .spawn(move || {
            let mut buf = [0u8; CHUNK];
            let mut stdout = io::stdout();
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if stdout.write_all(&buf[..n]).and_then(|_| stdout.flush()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!("output pump stopped: {e}");
                        break;
                    }
                }
            }
            tracing::debug!("output pump finished");
        })
}

/// Copy our stdin to the child. Closes the child's input on EOF.
///
/// The thread may stay blocked on stdin after the child exits; it is
/// detached and ends with the process.
pub fn spawn_input(writer: ChannelWriter) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("conbridge-input".to_string())
        .spawn(move || {
            let mut writer = writer;
            let mut buf = [0u8; CHUNK];
            let mut stdin = io::stdin();
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Err(e) = writer.write_all(&buf[..n]) {
                            tracing::debug!("input pump stopped: {e}");
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::debug!("stdin read failed: {e}");
                        break;
                    }
                }
            }
            if let Err(e) = writer.close() {
                tracing::debug!("closing child input failed: {e}");
            }
        })
}

/// Give the output thread up to `grace` to drain what the child wrote
/// before it exited. Returns whether it finished.
pub async fn drain(handle: JoinHandle<()>, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
    if handle.join().is_err() {
        tracing::warn!("output pump panicked");
    }
    true
}
