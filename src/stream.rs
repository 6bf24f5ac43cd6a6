//! Terminal session pumping for logs and exec.
//!
//! A [`Session`] is the engine side of a running command: its terminal
//! output, optionally its terminal input, and a handle resolving to the exit
//! code. [`pump_session`] copies bytes between the session and the caller's
//! sinks in two independent tasks:
//!
//! ```text
//!   caller stdin ──copy──▶ session.input
//!   session.output ──copy──▶ caller stdout
//! ```
//!
//! The session ends when the command exits. The input pump is aborted at
//! that point; the output pump runs until the terminal reaches EOF so no
//! trailing output is lost.

use crate::error::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::debug;

/// Boxed terminal output.
pub type SessionReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed terminal input.
pub type SessionWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A running engine command attached to a terminal.
pub struct Session {
    /// Terminal output. Must reach EOF once the command exits.
    pub output: SessionReader,
    /// Terminal input, if the command accepts any.
    pub input: Option<SessionWriter>,
    /// Resolves to the command's exit code.
    pub exit: JoinHandle<Result<i32>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("input", &self.input.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Reads all output and waits for the exit code.
    pub async fn collect(mut self) -> Result<(i32, Vec<u8>)> {
        drop(self.input.take());
        let mut out = Vec::new();
        self.output.read_to_end(&mut out).await?;
        let code = join_exit(self.exit).await?;
        Ok((code, out))
    }
}

async fn join_exit(exit: JoinHandle<Result<i32>>) -> Result<i32> {
    exit.await
        .map_err(|e| Error::Internal(format!("session task failed: {e}")))?
}

/// Pumps a session against caller-supplied sinks until the command exits.
///
/// Returns the exit code. `stdout` is shut down once all output is copied.
pub async fn pump_session<R, W>(
    session: Session,
    stdin: Option<R>,
    stdout: Option<W>,
) -> Result<i32>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let Session {
        mut output,
        input,
        exit,
    } = session;

    let input_pump = match (stdin, input) {
        (Some(mut stdin), Some(mut input)) => Some(tokio::spawn(async move {
            let copied = tokio::io::copy(&mut stdin, &mut input).await;
            let _ = input.shutdown().await;
            copied
        })),
        _ => None,
    };

    let output_pump: JoinHandle<std::io::Result<u64>> = tokio::spawn(async move {
        match stdout {
            Some(mut stdout) => {
                let copied = tokio::io::copy(&mut output, &mut stdout).await;
                stdout.shutdown().await?;
                copied
            }
            None => tokio::io::copy(&mut output, &mut tokio::io::sink()).await,
        }
    });

    let code = join_exit(exit).await;

    if let Some(pump) = input_pump {
        pump.abort();
    }

    match output_pump.await {
        Ok(Ok(bytes)) => debug!(bytes, "Session output drained"),
        Ok(Err(e)) => debug!(error = %e, "Session output pump ended with error"),
        Err(e) => debug!(error = %e, "Session output pump cancelled"),
    }

    code
}
