//! Mock console transport for testing.

use std::collections::VecDeque;

use super::traits::{ConsoleTransport, TransportError};

/// Mock transport for unit testing session and orchestrator logic.
///
/// Responses are scripted as queues: each `execute` call pops the next
/// command response, each `read_available` pops the next buffered chunk
/// (empty once drained), each `send_key` pops the next echo.
#[derive(Default)]
pub struct MockConsole {
    /// Queued responses for `execute`, in call order.
    exec_queue: VecDeque<String>,
    /// Queued chunks for `read_available`.
    read_queue: VecDeque<String>,
    /// Queued echoes for `send_key`.
    key_queue: VecDeque<String>,
    /// Captured commands, in send order.
    command_log: Vec<String>,
    /// Captured keystrokes.
    key_log: Vec<char>,
}

impl MockConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next unscripted `execute` call.
    pub fn queue_response(&mut self, response: &str) {
        self.exec_queue.push_back(response.to_string());
    }

    /// Queue a chunk to be returned by `read_available`.
    pub fn queue_read(&mut self, chunk: &str) {
        self.read_queue.push_back(chunk.to_string());
    }

    /// Queue the echo returned by the next `send_key` call.
    pub fn queue_key_echo(&mut self, echo: &str) {
        self.key_queue.push_back(echo.to_string());
    }

    /// All commands sent so far.
    pub fn commands(&self) -> &[String] {
        &self.command_log
    }

    /// All keystrokes sent so far.
    pub fn keys(&self) -> &[char] {
        &self.key_log
    }
}

impl ConsoleTransport for MockConsole {
    fn execute(&mut self, command: &str) -> Result<String, TransportError> {
        self.command_log.push(command.to_string());
        self.exec_queue
            .pop_front()
            .ok_or(TransportError::PromptTimeout { timeout_ms: 10_000 })
    }

    fn read_available(&mut self) -> Result<String, TransportError> {
        Ok(self.read_queue.pop_front().unwrap_or_default())
    }

    fn send_key(&mut self, key: char) -> Result<String, TransportError> {
        self.key_log.push(key);
        Ok(self.key_queue.pop_front().unwrap_or_default())
    }
}
