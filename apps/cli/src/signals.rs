//! Foreground notification for the terminal.
//!
//! A job stopped with Ctrl-Z and brought back with `fg` receives SIGCONT.
//! That is the terminal's version of a page becoming visible again.

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

pub struct Foreground {
    #[cfg(unix)]
    signal: Option<Signal>,
}

impl Foreground {
    pub fn new() -> Self {
        #[cfg(unix)]
        {
            let signal = match signal(SignalKind::from_raw(libc::SIGCONT)) {
                Ok(signal) => Some(signal),
                Err(e) => {
                    tracing::debug!(error = %e, "SIGCONT handler unavailable");
                    None
                }
            };
            Self { signal }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    /// Resolves each time the process returns to the foreground.
    pub async fn resumed(&mut self) {
        #[cfg(unix)]
        {
            if let Some(signal) = &mut self.signal
                && signal.recv().await.is_some()
            {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn sigcont_wakes_the_listener() {
        let mut foreground = Foreground::new();
        assert!(foreground.signal.is_some());

        // SIGCONT on a running process does nothing but notify handlers.
        unsafe { libc::raise(libc::SIGCONT) };
        tokio::time::timeout(Duration::from_secs(5), foreground.resumed())
            .await
            .expect("SIGCONT delivered");
    }
}
