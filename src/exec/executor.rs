//! The capability shared by local and remote connections.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::Result;
use super::sink::Sink;

/// Runs commands and forwards their output into sinks.
///
/// All methods take `&self`; implementations use interior mutability so one
/// connection can be shared (`Arc<dyn Executor>`) by concurrent callers.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Prepare the connection. Local execution needs nothing.
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Run `command` to completion.
    ///
    /// Standard output goes to `sink` when given, otherwise to the registered
    /// stdout sink; standard error goes to the registered stderr sink. Both
    /// streams are drained completely before this returns. A non-zero exit
    /// status is an error.
    async fn run(&self, command: &str, sink: Option<&Sink>) -> Result<()>;

    /// Register (or clear) the stdout sink used by later `run` calls.
    fn set_stdout_sink(&self, sink: Option<Sink>);

    /// Register (or clear) the stderr sink used by later `run` calls.
    fn set_stderr_sink(&self, sink: Option<Sink>);

    /// Release resources. Calling it twice is harmless.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A connection that can also place files on the remote host.
#[async_trait]
pub trait RemoteExecutor: Executor {
    /// Copy the local file at `local_path` to `remote_path`.
    async fn copy(&self, local_path: &Path, remote_path: &str, permission: &str) -> Result<()>;

    /// Copy exactly `size` bytes from `reader` to `remote_path`.
    async fn copy_from_reader(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
        remote_path: &str,
        permission: &str,
    ) -> Result<()>;
}

/// Run `command` and return its stdout lines joined by single spaces.
///
/// A private sink is used, so registered sinks see nothing of this command.
pub async fn capture_output<E>(executor: &E, command: &str) -> Result<String>
where
    E: Executor + ?Sized,
{
    let sink = Sink::new();
    let mut lines = sink.receiver();
    executor.run(command, Some(&sink)).await?;

    let mut output = Vec::new();
    if let Some(lines) = lines.as_mut() {
        while let Ok(line) = lines.try_recv() {
            output.push(line);
        }
    }
    Ok(output.join(" "))
}
