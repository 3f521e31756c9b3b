use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use airbyte::{LogLevel, LogMessage, Logger, Message, State};

/// [`Logger`] keeping every emitted message in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message emitted so far, in order.
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn logs(&self) -> Vec<LogMessage> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                Message::Log { log } => Some(log),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<State> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                Message::State { state } => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` if a log line of `level` containing `text` was emitted.
    pub fn contains(&self, level: LogLevel, text: &str) -> bool {
        self.logs()
            .iter()
            .any(|log| log.level == level && log.message.contains(text))
    }
}

impl Logger for MemoryLogger {
    fn emit(&self, message: &Message) -> io::Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());

        Ok(())
    }
}
