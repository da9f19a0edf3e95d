use std::future::Future;
use std::io;

use tracing::{error, info};

/// Resolves on Ctrl-C or, on unix, SIGTERM from a service manager.
///
/// Handlers are installed before this returns, so a signal that arrives
/// before the future is first polled is not lost.
#[cfg(unix)]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => info!("received Ctrl-C"),
                Err(err) => {
                    error!("failed to listen for Ctrl-C: {err}");
                    term.recv().await;
                    info!("received SIGTERM");
                }
            },
            _ = term.recv() => info!("received SIGTERM"),
        }
    })
}

#[cfg(not(unix))]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C"),
            Err(err) => {
                error!("failed to listen for Ctrl-C: {err}");
                std::future::pending::<()>().await;
            }
        }
    })
}
