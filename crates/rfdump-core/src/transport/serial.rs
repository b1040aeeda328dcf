//! serialport-based console transport implementation.

use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use serialport::{DataBits, Parity, SerialPort, StopBits};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::traits::{ConsoleTransport, TransportError};
use crate::protocol::constants::{DEFAULT_COMMAND_TIMEOUT, PROMPT_MARKER};

/// How long a keystroke is given to echo back before the buffer is read.
const KEY_ECHO_DELAY: Duration = Duration::from_millis(100);

/// Wait between receive-buffer polls while a command is in flight.
const DRAIN_INTERVAL: Duration = Duration::from_millis(10);

/// Parity bit configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityMode {
    #[default]
    None,
    Odd,
    Even,
}

/// Serial line parameters. Defaults to the common bootloader console
/// setup of 115200 8-N-1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: ParityMode,
    pub stop_bits: u8,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            parity: ParityMode::None,
            stop_bits: 1,
        }
    }
}

impl SerialSettings {
    fn data_bits_setting(&self) -> DataBits {
        match self.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    fn parity_setting(&self) -> Parity {
        match self.parity {
            ParityMode::None => Parity::None,
            ParityMode::Odd => Parity::Odd,
            ParityMode::Even => Parity::Even,
        }
    }

    fn stop_bits_setting(&self) -> StopBits {
        match self.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }
}

/// serialport-backed console transport.
pub struct SerialConsole {
    port: Box<dyn SerialPort>,
    command_timeout: Duration,
}

impl SerialConsole {
    /// Open a serial port with the given line parameters.
    #[instrument(level = "info", skip(settings), fields(baud = settings.baud_rate))]
    pub fn open(path: &str, settings: &SerialSettings) -> Result<Self, TransportError> {
        let port = serialport::new(path, settings.baud_rate)
            .data_bits(settings.data_bits_setting())
            .parity(settings.parity_setting())
            .stop_bits(settings.stop_bits_setting())
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|e| TransportError::OpenFailed {
                port: path.to_string(),
                message: e.to_string(),
            })?;

        info!(port = %path, "Serial port opened");

        Ok(Self {
            port,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        })
    }

    /// Override the per-command prompt timeout.
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.command_timeout = timeout;
    }

    /// Names of all serial ports visible on this machine.
    pub fn available_ports() -> Result<Vec<String>, TransportError> {
        let ports = serialport::available_ports()
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    /// Pull everything currently sitting in the receive buffer.
    fn drain(&mut self) -> Result<String, TransportError> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;
        if pending == 0 {
            return Ok(String::new());
        }

        let mut buf = vec![0u8; pending as usize];
        let n = self
            .port
            .read(&mut buf)
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;
        buf.truncate(n);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl ConsoleTransport for SerialConsole {
    fn execute(&mut self, command: &str) -> Result<String, TransportError> {
        self.port
            .write_all(command.as_bytes())
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        self.port
            .flush()
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        let deadline = Instant::now() + self.command_timeout;
        let mut data = String::new();
        loop {
            data.push_str(&self.drain()?);

            // The prompt is the only framing there is. Search from the
            // end: the payload itself may render "=>" in an ASCII column.
            if let Some(pos) = data.rfind(PROMPT_MARKER) {
                let body = &data[..pos];
                let body = body.strip_prefix(command.trim_end()).unwrap_or(body);
                let body = body.trim_start_matches(['\r', '\n']);
                debug!(command = %command.trim_end(), response_len = body.len(), "Command complete");
                return Ok(body.to_string());
            }

            if Instant::now() >= deadline {
                return Err(TransportError::PromptTimeout {
                    timeout_ms: self.command_timeout.as_millis() as u64,
                });
            }
            thread::sleep(DRAIN_INTERVAL);
        }
    }

    fn read_available(&mut self) -> Result<String, TransportError> {
        self.drain()
    }

    fn send_key(&mut self, key: char) -> Result<String, TransportError> {
        let mut buf = [0u8; 4];
        self.port
            .write_all(key.encode_utf8(&mut buf).as_bytes())
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        self.port
            .flush()
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        thread::sleep(KEY_ECHO_DELAY);
        self.drain()
    }
}
