//! Pipe view of a russh session channel.
//!
//! A russh `Channel` delivers stdout and stderr as interleaved messages and
//! accepts stdin as `data` calls. [`channel_pipes`] splits that into ordinary
//! byte streams so the same line multiplexer and copy protocol code work for
//! local processes and remote sessions alike:
//!
//! - [`SessionIo`] holds the caller's ends: `stdin` (write), `stdout` and
//!   `stderr` (read). Dropping `stdin` sends end-of-file to the remote side.
//! - [`ChannelPump`] holds the other ends and, while driven, moves bytes
//!   between them and the channel until the remote side closes it.
//!
//! Both output pipes must be drained by the caller: the pump waits when a
//! pipe buffer is full.

use std::io;

use russh::{Channel, ChannelMsg, client};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tracing::debug;

/// In-memory buffer of each pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Largest chunk forwarded from stdin in one `data` message.
const STDIN_CHUNK: usize = 32 * 1024;

/// SSH extended data type code for stderr.
const EXTENDED_DATA_STDERR: u32 = 1;

/// Caller-side ends of a session's standard streams.
pub(crate) struct SessionIo {
    pub stdin: DuplexStream,
    pub stdout: DuplexStream,
    pub stderr: DuplexStream,
}

/// Channel-side ends, moved by [`ChannelPump::drive`].
pub(crate) struct ChannelPump {
    stdin: Option<DuplexStream>,
    stdout: DuplexStream,
    stderr: DuplexStream,
}

/// Create the pipe pair for one session.
pub(crate) fn channel_pipes() -> (SessionIo, ChannelPump) {
    let (stdout_rx, stdout_tx) = tokio::io::duplex(PIPE_CAPACITY);
    let (stderr_rx, stderr_tx) = tokio::io::duplex(PIPE_CAPACITY);
    let (stdin_tx, stdin_rx) = tokio::io::duplex(PIPE_CAPACITY);

    (
        SessionIo {
            stdin: stdin_tx,
            stdout: stdout_rx,
            stderr: stderr_rx,
        },
        ChannelPump {
            stdin: Some(stdin_rx),
            stdout: stdout_tx,
            stderr: stderr_tx,
        },
    )
}

impl ChannelPump {
    /// Move bytes until the channel closes; returns the remote exit status.
    ///
    /// When this returns (or is dropped) the stdout/stderr pipes reach
    /// end-of-file for the caller.
    pub(crate) async fn drive(
        mut self,
        channel: &mut Channel<client::Msg>,
    ) -> Result<Option<u32>, russh::Error> {
        let mut buf = vec![0u8; STDIN_CHUNK];
        let mut exit_status = None;

        loop {
            tokio::select! {
                read = read_stdin(&mut self.stdin, &mut buf), if self.stdin.is_some() => {
                    match read {
                        Ok(0) | Err(_) => {
                            self.stdin = None;
                            channel.eof().await?;
                        }
                        Ok(n) => channel.data(&buf[..n]).await?,
                    }
                }
                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        // A caller that stopped reading must not stop the pump.
                        let _ = self.stdout.write_all(&data).await;
                    }
                    Some(ChannelMsg::ExtendedData { data, ext }) if ext == EXTENDED_DATA_STDERR => {
                        let _ = self.stderr.write_all(&data).await;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                        debug!("Remote command exited with status {}", status);
                        exit_status = Some(status);
                    }
                    Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                        debug!("Remote command terminated by signal {:?}", signal_name);
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }
        }

        Ok(exit_status)
    }
}

async fn read_stdin(stdin: &mut Option<DuplexStream>, buf: &mut [u8]) -> io::Result<usize> {
    match stdin {
        Some(stream) => stream.read(buf).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdin_pipe_connects_to_pump() {
        let (mut io, mut pump) = channel_pipes();
        io.stdin.write_all(b"C0644 10 x\n").await.unwrap();
        drop(io.stdin);

        let mut received = Vec::new();
        pump.stdin
            .as_mut()
            .unwrap()
            .read_to_end(&mut received)
            .await
            .unwrap();
        assert_eq!(received, b"C0644 10 x\n");
    }

    #[tokio::test]
    async fn test_dropping_pump_ends_output_pipes() {
        let (mut io, pump) = channel_pipes();
        drop(pump);
        let mut out = Vec::new();
        assert_eq!(io.stdout.read_to_end(&mut out).await.unwrap(), 0);
        assert_eq!(io.stderr.read_to_end(&mut out).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stdin_eof_when_caller_drops_writer() {
        let (io, mut pump) = channel_pipes();
        drop(io.stdin);
        let mut buf = [0u8; 8];
        let n = read_stdin(&mut pump.stdin, &mut buf).await.unwrap();
        assert_eq!(n, 0);
    }
}
