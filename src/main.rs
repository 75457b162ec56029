#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use nodeboot::exec::{Credentials, Executor, RemoteOptions, Runner, Sink, SinkReceiver};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logging with proper tracing default
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let command = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if command.trim().is_empty() {
        eprintln!("usage: nodeboot <command...>");
        std::process::exit(2);
    }

    let credentials = Credentials::from_env();
    let options = RemoteOptions::from_env();
    info!(
        "Connecting to {}@{}",
        credentials.username, credentials.hostname
    );
    let runner = Runner::connect(credentials, options).await?;

    let stdout = Sink::new();
    let stderr = Sink::new();
    let remote = runner.remote();
    remote.set_stdout_sink(Some(stdout.clone()));
    remote.set_stderr_sink(Some(stderr.clone()));

    let stdout_log = stdout.receiver().map(|rx| tokio::spawn(log_lines(rx, false)));
    let stderr_log = stderr.receiver().map(|rx| tokio::spawn(log_lines(rx, true)));

    let result = runner.run_remote(&command).await;
    for task in [stdout_log, stderr_log].into_iter().flatten() {
        let _ = task.await;
    }
    runner.close().await?;

    if let Err(e) = result {
        error!("Remote command failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn log_lines(mut lines: SinkReceiver, is_stderr: bool) {
    while let Some(line) = lines.recv().await {
        if is_stderr {
            warn!("{}", line);
        } else {
            info!("{}", line);
        }
    }
}
