//! Termination signals
//!
//! The application reads [`Signal`]s from a [`SignalSource`]. By default
//! that source is [`OsSignals`], installed when `run` starts. Tests and
//! embedders can inject any other source, e.g. an `mpsc` receiver, and then
//! no process-wide signal state is touched at all.
//!
//! Tokio registers an OS handler once per signal and keeps it for the
//! lifetime of the process. Dropping [`OsSignals`] stops forwarding, but the
//! signals remain caught: after the run ends they are ignored rather than
//! terminating the process with their default disposition.

use crate::error::{LifecycleError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use strum_macros::{Display, EnumString};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// A termination trigger the application can react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(try_from = "String")]
pub enum Signal {
    #[strum(to_string = "SIGINT", serialize = "INT", serialize = "interrupt")]
    Interrupt,
    #[strum(to_string = "SIGQUIT", serialize = "QUIT")]
    Quit,
    #[strum(to_string = "SIGTERM", serialize = "TERM", serialize = "terminate")]
    Terminate,
    #[strum(to_string = "SIGHUP", serialize = "HUP", serialize = "hangup")]
    Hangup,
    #[strum(to_string = "SIGUSR1", serialize = "USR1")]
    User1,
    #[strum(to_string = "SIGUSR2", serialize = "USR2")]
    User2,
}

impl Signal {
    /// Conventional termination triggers: SIGTERM, SIGQUIT, SIGINT
    pub const DEFAULT_SET: [Signal; 3] = [Signal::Terminate, Signal::Quit, Signal::Interrupt];

    #[cfg(unix)]
    fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Quit => SignalKind::quit(),
            Signal::Terminate => SignalKind::terminate(),
            Signal::Hangup => SignalKind::hangup(),
            Signal::User1 => SignalKind::user_defined1(),
            Signal::User2 => SignalKind::user_defined2(),
        }
    }
}

impl TryFrom<String> for Signal {
    type Error = strum::ParseError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Where the application receives termination signals from
#[async_trait]
pub trait SignalSource: Send + 'static {
    /// Next signal, or `None` once the source is closed for good
    async fn recv(&mut self) -> Option<Signal>;
}

#[async_trait]
impl SignalSource for mpsc::Receiver<Signal> {
    async fn recv(&mut self) -> Option<Signal> {
        mpsc::Receiver::recv(self).await
    }
}

#[async_trait]
impl SignalSource for mpsc::UnboundedReceiver<Signal> {
    async fn recv(&mut self) -> Option<Signal> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

/// OS signal handlers for a set of [`Signal`]s
///
/// One listener task per signal forwards deliveries into a channel.
/// Dropping `OsSignals` aborts the listeners; the process-level handlers
/// installed by tokio stay in place, so those signals are swallowed from
/// then on.
pub struct OsSignals {
    rx: mpsc::UnboundedReceiver<Signal>,
    _listeners: JoinSet<()>,
}

impl OsSignals {
    /// Install handlers for `signals`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn install(signals: &[Signal]) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = JoinSet::new();

        let mut installed = Vec::with_capacity(signals.len());
        for &signal in signals {
            if installed.contains(&signal) {
                continue;
            }
            installed.push(signal);
            listen(&mut listeners, signal, tx.clone())?;
        }

        tracing::debug!(signals = ?installed, "signal handlers installed");
        Ok(Self {
            rx,
            _listeners: listeners,
        })
    }
}

#[async_trait]
impl SignalSource for OsSignals {
    async fn recv(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }
}

#[cfg(unix)]
fn listen(
    listeners: &mut JoinSet<()>,
    signal: Signal,
    tx: mpsc::UnboundedSender<Signal>,
) -> Result<()> {
    let mut stream = tokio::signal::unix::signal(signal.kind()).map_err(|e| {
        tracing::error!(%e, %signal, "failed to install signal handler");
        LifecycleError::Signal(format!("failed to install {} handler: {}", signal, e))
    })?;

    listeners.spawn(async move {
        while stream.recv().await.is_some() {
            if tx.send(signal).is_err() {
                break;
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn listen(
    listeners: &mut JoinSet<()>,
    signal: Signal,
    tx: mpsc::UnboundedSender<Signal>,
) -> Result<()> {
    // Only Ctrl+C has a portable equivalent.
    if signal != Signal::Interrupt {
        tracing::warn!(%signal, "signal not supported on this platform; ignoring");
        return Ok(());
    }

    listeners.spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(signal).is_err() {
                break;
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("SIGTERM".parse::<Signal>().unwrap(), Signal::Terminate);
        assert_eq!("term".parse::<Signal>().unwrap(), Signal::Terminate);
        assert_eq!("Interrupt".parse::<Signal>().unwrap(), Signal::Interrupt);
        assert_eq!("sigquit".parse::<Signal>().unwrap(), Signal::Quit);
        assert_eq!("usr2".parse::<Signal>().unwrap(), Signal::User2);
        assert!("SIGKILL".parse::<Signal>().is_err());
    }

    #[test]
    fn test_display_uses_conventional_names() {
        assert_eq!(Signal::Interrupt.to_string(), "SIGINT");
        assert_eq!(Signal::Hangup.to_string(), "SIGHUP");
    }

    #[test]
    fn test_default_set() {
        assert_eq!(
            Signal::DEFAULT_SET,
            [Signal::Terminate, Signal::Quit, Signal::Interrupt]
        );
    }

    #[tokio::test]
    async fn test_channel_source() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(Signal::Hangup).await.unwrap();
        drop(tx);

        let source: &mut dyn SignalSource = &mut rx;
        assert_eq!(source.recv().await, Some(Signal::Hangup));
        assert_eq!(source.recv().await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_deduplicates() {
        let signals = OsSignals::install(&[Signal::User1, Signal::User1, Signal::User2]).unwrap();
        assert_eq!(signals._listeners.len(), 2);
    }
}
