//! Sender side of the scp sink handshake.
//!
//! The remote receiver is started in sink mode (`scp -qt <path>`), then:
//!
//! 1. the sender writes the header `C<perm> <size> <name>\n`
//! 2. the receiver acknowledges
//! 3. the sender writes exactly `size` payload bytes followed by a `\0`
//! 4. the receiver acknowledges again
//!
//! An acknowledgement is one byte: `0` for success, `1` (warning) or `2`
//! (error) followed by a message terminated by `\n`.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::error::ProtocolError;

const ACK_OK: u8 = 0;
const ACK_WARNING: u8 = 1;
const ACK_ERROR: u8 = 2;

/// Permission used by `copy` when the caller passes none.
pub const DEFAULT_PERMISSION: &str = "0644";

/// Check that `permission` is 3 or 4 octal digits.
pub fn validate_permission(permission: &str) -> Result<(), ProtocolError> {
    let valid = (3..=4).contains(&permission.len())
        && permission.bytes().all(|b| (b'0'..=b'7').contains(&b));
    if valid {
        Ok(())
    } else {
        Err(ProtocolError::InvalidPermission(permission.to_string()))
    }
}

/// Final component of a remote path; both `/` and `\` separate components.
pub fn base_name(remote_path: &str) -> &str {
    remote_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(remote_path)
}

pub(crate) fn header(permission: &str, size: u64, name: &str) -> String {
    format!("C{} {} {}\n", permission, size, name)
}

/// Read one acknowledgement from the receiver.
pub(crate) async fn read_response<R>(responses: &mut R) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let code = match responses.read_u8().await {
        Ok(code) => code,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::UnexpectedEof);
        }
        Err(e) => return Err(e.into()),
    };

    match code {
        ACK_OK => Ok(()),
        ACK_WARNING | ACK_ERROR => {
            let mut message = Vec::new();
            loop {
                match responses.read_u8().await {
                    Ok(b'\n') => break,
                    Ok(b) => message.push(b),
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e.into()),
                }
            }
            Err(ProtocolError::Remote(
                String::from_utf8_lossy(&message).trim().to_string(),
            ))
        }
        other => Err(ProtocolError::UnexpectedResponse(other)),
    }
}

/// Run the sender side of the handshake for one file.
///
/// `source` must yield exactly `size` bytes. `writer` is shut down on success
/// so the receiver sees end-of-file.
pub(crate) async fn send_file<W, R, S>(
    writer: &mut W,
    responses: &mut R,
    source: &mut S,
    size: u64,
    name: &str,
    permission: &str,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    S: AsyncRead + Unpin + ?Sized,
{
    let header = header(permission, size, name);
    debug!("Sending copy header {:?}", header.trim_end());
    writer.write_all(header.as_bytes()).await?;
    writer.flush().await?;
    read_response(responses).await?;

    let sent = tokio::io::copy(&mut (&mut *source).take(size), writer).await?;
    if sent != size {
        return Err(ProtocolError::SizeMismatch {
            declared: size,
            sent,
        });
    }

    writer.write_all(&[0]).await?;
    writer.flush().await?;
    read_response(responses).await?;

    writer.shutdown().await?;
    Ok(())
}
