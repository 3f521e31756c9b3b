use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::protocol::{
    ConnectionStatus, ConnectorSpecification, LogLevel, LogMessage, Message, State,
};

/// Sink for protocol messages emitted by a connector.
///
/// Implementations must write each message as exactly one line so that the platform can
/// interleave them with its own processing. Only [`Logger::emit`] is required; the remaining
/// methods build the matching envelope.
pub trait Logger {
    /// Writes a single protocol message.
    fn emit(&self, message: &Message) -> io::Result<()>;

    /// Emits a `LOG` message.
    ///
    /// Failing to write a log line is not fatal for a sync, so the failure is only reported
    /// through `tracing`.
    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = Message::Log {
            log: LogMessage {
                level,
                message: message.into(),
            },
        };

        if let Err(err) = self.emit(&message) {
            warn!(error = %err, "failed to emit log message");
        }
    }

    /// Emits a `STATE` message carrying the checkpoint unchanged.
    fn state(&self, state: &State) -> io::Result<()> {
        self.emit(&Message::State {
            state: state.clone(),
        })
    }

    /// Emits a `SPEC` message.
    fn spec(&self, spec: &ConnectorSpecification) -> io::Result<()> {
        let spec = serde_json::to_value(spec).map_err(io::Error::other)?;
        self.emit(&Message::Spec { spec })
    }

    /// Emits a `CONNECTION_STATUS` message.
    fn connection_status(&self, status: &ConnectionStatus) -> io::Result<()> {
        self.emit(&Message::ConnectionStatus {
            connection_status: status.clone(),
        })
    }
}

impl<L: Logger> Logger for &L {
    fn emit(&self, message: &Message) -> io::Result<()> {
        (**self).emit(message)
    }
}

/// [`Logger`] writing newline-delimited JSON to any [`Write`] implementation.
///
/// The binary wraps stdout in it; tests usually wrap a `Vec<u8>`.
#[derive(Debug)]
pub struct MessageWriter<W> {
    writer: Mutex<W>,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the logger returning the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write> Logger for MessageWriter<W> {
    fn emit(&self, message: &Message) -> io::Result<()> {
        let mut line = serde_json::to_vec(message).map_err(io::Error::other)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        writer.flush()
    }
}
