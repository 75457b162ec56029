//! Line-by-line forwarding of a process or session stream into a [`Sink`].
//!
//! Every stream of a command is drained to the end whether or not a sink is
//! attached: an unread pipe would eventually block the producing process.
//!
//! With a sink attached, the multiplexer holds the sink's drain lock while it
//! forwards a stream, so two commands never interleave lines in one sink. A
//! stream that has to wait for the lock keeps reading and buffers its lines
//! until the lock is free. When the stream ends (or fails) the sink
//! generation is renewed, ready for the next command.
//!
//! A single `Sink` registered for both stdout and stderr of the same command
//! therefore keeps the two streams apart: one is forwarded after the other
//! ends, and neither pipe is left unread in the meantime.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, warn};

use super::sink::Sink;

/// Longest line accepted before the stream is reported as failed.
pub(crate) const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Drain `reader`, forwarding each line into `sink`.
///
/// Line terminators (`\n`, `\r\n`) are stripped; bytes that are not valid
/// UTF-8 are replaced. Returns the number of lines forwarded, or the error
/// that stopped the scan. The remainder of a failed stream is still drained.
pub async fn forward_lines<R>(reader: R, sink: Option<&Sink>) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut lines = LineScanner::new(reader);

    let Some(sink) = sink else {
        lines.discard().await?;
        return Ok(0);
    };

    // Lines read while another stream holds the sink.
    let mut pending = Vec::new();
    let mut ended: Option<io::Result<()>> = None;

    let lock = sink.lock_drain();
    tokio::pin!(lock);
    let _guard = loop {
        tokio::select! {
            biased;
            guard = &mut lock => break guard,
            line = lines.next_line(), if ended.is_none() => match line {
                Ok(Some(line)) => pending.push(line),
                Ok(None) => ended = Some(Ok(())),
                Err(e) => {
                    lines.discard_after(&e).await;
                    ended = Some(Err(e));
                }
            },
        }
    };

    if !pending.is_empty() {
        debug!("Flushing {} lines buffered while the sink was busy", pending.len());
    }
    let mut forwarded = 0;
    for line in pending {
        // A receiver that went away is not an error; keep draining.
        sink.send(line);
        forwarded += 1;
    }

    let result = match ended {
        Some(Ok(())) => Ok(forwarded),
        Some(Err(e)) => Err(e),
        None => loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    sink.send(line);
                    forwarded += 1;
                }
                Ok(None) => break Ok(forwarded),
                Err(e) => {
                    lines.discard_after(&e).await;
                    break Err(e);
                }
            }
        },
    };

    sink.renew();
    result
}

/// Reads one line at a time, keeping a partial line across cancelled reads.
struct LineScanner<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineScanner<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, or `None` at the end of the stream.
    ///
    /// Safe to cancel: bytes read so far stay in the buffer for the next call.
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let limit = (MAX_LINE_LENGTH + 1).saturating_sub(self.buf.len()) as u64;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        } else if self.buf.len() > MAX_LINE_LENGTH {
            self.buf.clear();
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {} bytes", MAX_LINE_LENGTH),
            ));
        }

        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }

    async fn discard(&mut self) -> io::Result<u64> {
        tokio::io::copy(&mut self.reader, &mut tokio::io::sink()).await
    }

    async fn discard_after(&mut self, error: &io::Error) {
        warn!("Output scan stopped, discarding rest of stream: {}", error);
        let _ = self.discard().await;
    }
}
