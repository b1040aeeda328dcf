//! Bootloader session - detection, interrogation, and block validation.
//!
//! One session per dump operation: it owns the console transport, the
//! parsed command table and environment, the identification string, and
//! the derived boot address. Nothing persists across runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::env::{BootEnvironment, CommandTable};
use crate::handshake::{BootHandshake, HandshakeError};
use crate::protocol::constants::{
    BANNER_SIGNATURE, BYTES_PER_LINE, CMD_BDINFO, CMD_HELP, CMD_MEMORY_DISPLAY, CMD_PRINTENV,
    CMD_VERSION, DEFAULT_CHUNK_SIZE, DEFAULT_DETECT_TIMEOUT, DUMP_SPAN,
};
use crate::protocol::grammar::{DumpLine, clean_lines, parse_key_values};
use crate::transport::{ConsoleTransport, SerialSettings, TransportError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error("Failed to detect boot address")]
    AddressDetectionFailed,
}

/// Configuration for a dump session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Overall deadline for banner + prompt detection, in seconds.
    pub detect_timeout_secs: u64,
    /// Nominal bytes requested per memory-display command.
    pub chunk_size: u32,
    /// Total address range to scan.
    pub span: u32,
    /// Serial line parameters.
    pub serial: SerialSettings,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            detect_timeout_secs: DEFAULT_DETECT_TIMEOUT.as_secs(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            span: DUMP_SPAN,
            serial: SerialSettings::default(),
        }
    }
}

impl DumpConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DumpConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_secs(self.detect_timeout_secs)
    }
}

/// Result of validating one hexdump block.
///
/// `resync_address` is where validation should resume: past the last
/// consumed byte on success, the last trusted line boundary on failure.
/// In both cases `resync_address == start_address + data.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub resync_address: u32,
    /// Validated bytes, in address order. On failure this is the
    /// contiguously validated prefix of the block.
    pub data: Vec<u8>,
}

/// One U-Boot session, driving a console transport.
pub struct UbootSession<T: ConsoleTransport> {
    transport: T,
    commands: CommandTable,
    environment: BootEnvironment,
    ident: Option<String>,
    boot_address: u32,
    ready: bool,
}

impl<T: ConsoleTransport> UbootSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            commands: CommandTable::default(),
            environment: BootEnvironment::default(),
            ident: None,
            boot_address: 0,
            ready: false,
        }
    }

    /// Whether the interactive prompt has been confirmed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Firmware base address. Zero until `initialize` succeeds;
    /// immutable afterwards.
    pub fn boot_address(&self) -> u32 {
        self.boot_address
    }

    /// Bootloader identification string, once known.
    pub fn ident(&self) -> Option<&str> {
        self.ident.as_deref()
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn environment(&self) -> &BootEnvironment {
        &self.environment
    }

    /// Release the underlying transport, ending the session.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Detect the bootloader and confirm the interactive prompt,
    /// failing once `deadline` has elapsed.
    #[instrument(skip(self))]
    pub fn detect(&mut self, deadline: Duration) -> Result<(), SessionError> {
        let mut handshake = BootHandshake::new();
        handshake.run(&mut self.transport, deadline)?;
        self.ready = handshake.is_ready();
        if let Some(banner) = handshake.banner() {
            self.ident = Some(banner.to_string());
        }
        Ok(())
    }

    /// Query the bootloader's capabilities and environment, then derive
    /// the firmware base address. Fails if no address heuristic matches:
    /// a zero address can never be a legitimate firmware base.
    #[instrument(skip(self))]
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        let help = self.transport.execute(&format!("{CMD_HELP}\n"))?;
        self.commands = CommandTable::from_help_output(&help);
        info!(commands = self.commands.len(), "Parsed help table");

        if self.commands.contains(CMD_PRINTENV) {
            let environ = self.transport.execute(&format!("{CMD_PRINTENV}\n"))?;
            self.environment = BootEnvironment::from_printenv_output(&environ);
            info!(vars = self.environment.len(), "Parsed environment");
        }
        if self.commands.contains(CMD_BDINFO) {
            let bdinfo = self.transport.execute(&format!("{CMD_BDINFO}\n"))?;
            let _board_information = parse_key_values(&bdinfo);
        }
        if self.commands.contains(CMD_VERSION) {
            let version = self.transport.execute(&format!("{CMD_VERSION}\n"))?;
            if let Some(ident) = extract_version_ident(&version) {
                self.ident = Some(ident);
            }
        }

        self.boot_address = self.environment.detect_boot_address();
        if self.boot_address == 0 {
            warn!("Failed to detect boot address");
            return Err(SessionError::AddressDetectionFailed);
        }
        info!(
            address = %format!("0x{:08X}", self.boot_address),
            ident = self.ident.as_deref().unwrap_or("unknown"),
            "Session initialized"
        );
        Ok(())
    }

    /// Request one hexdump block via the byte-granularity memory display.
    pub fn read_block(&mut self, address: u32, length: u32) -> Result<String, TransportError> {
        let command = format!("{CMD_MEMORY_DISPLAY} {address:X} {length:X}\n");
        self.transport.execute(&command)
    }

    /// Validate one hexdump block starting at `start_address`.
    ///
    /// Lines must be well-formed and strictly sequential, 16 bytes per
    /// line. The first grammar mismatch, address break, or malformed
    /// byte token rejects the rest of the block; the running expected
    /// address, not the line's own decoded address, is what the scan
    /// resumes from. There is no mid-block realignment.
    pub fn validate_dump_block(&self, text: &str, start_address: u32) -> ValidationOutcome {
        let lines: Vec<&str> = clean_lines(text).filter(|l| !l.trim().is_empty()).collect();

        // A real block always has at least two lines; anything less
        // means the exchange was cut short and nothing can be trusted.
        if lines.len() < 2 {
            return ValidationOutcome {
                ok: false,
                resync_address: start_address,
                data: Vec::new(),
            };
        }

        let mut expected_address = start_address;
        let mut data = Vec::with_capacity(lines.len() * BYTES_PER_LINE);
        for line in lines {
            let Some(parsed) = DumpLine::parse(line) else {
                return ValidationOutcome {
                    ok: false,
                    resync_address: expected_address,
                    data,
                };
            };
            if parsed.address != expected_address {
                return ValidationOutcome {
                    ok: false,
                    resync_address: expected_address,
                    data,
                };
            }
            data.extend_from_slice(&parsed.bytes);
            expected_address = expected_address.wrapping_add(BYTES_PER_LINE as u32);
        }

        ValidationOutcome {
            ok: true,
            resync_address: expected_address,
            data,
        }
    }
}

/// Pull the version out of a `U-Boot <version>` banner line.
fn extract_version_ident(raw: &str) -> Option<String> {
    let line = clean_lines(raw).find(|l| l.contains(BANNER_SIGNATURE))?;
    let start = line.find(BANNER_SIGNATURE)?;
    let after = line[start + BANNER_SIGNATURE.len()..].trim_start();
    let version: String = after
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if version.is_empty() {
        return None;
    }
    Some(format!("{BANNER_SIGNATURE} {version}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockConsole;

    fn hexdump_line(address: u32, fill: u8) -> String {
        let tokens: Vec<String> = (0u8..16)
            .map(|i| format!("{:02x}", fill.wrapping_add(i)))
            .collect();
        format!("{:08x}: {}    ................", address, tokens.join(" "))
    }

    fn session() -> UbootSession<MockConsole> {
        UbootSession::new(MockConsole::new())
    }

    #[test]
    fn test_initialize_interrogates_gated_commands() {
        let mut mock = MockConsole::new();
        mock.queue_response(
            "help - print command description\nprintenv - print environment\nbdinfo - board info\nversion - print monitor version\nmd - memory display\n",
        );
        mock.queue_response("bootaddr=0x40000000\nbaudrate=115200\n");
        mock.queue_response("memstart = 0x00000000\narch_number = 0x0000118F\n");
        mock.queue_response("U-Boot 2020.04 (Jan 01 2020 - 00:00:00)\n");

        let mut session = UbootSession::new(mock);
        session.initialize().expect("initialize should succeed");

        assert_eq!(session.boot_address(), 0x40000000);
        assert_eq!(session.ident(), Some("U-Boot 2020.04"));
    }

    #[test]
    fn test_initialize_skips_unadvertised_commands() {
        let mut mock = MockConsole::new();
        mock.queue_response("printenv - print environment\n");
        mock.queue_response("bootcmd=bootm 0x8000\n");

        let mut session = UbootSession::new(mock);
        session.initialize().expect("initialize should succeed");

        assert_eq!(session.boot_address(), 0x8000);
        // help + printenv only; bdinfo and version were never advertised
        // so they must not be issued
        assert_eq!(session.ident(), None);
    }

    #[test]
    fn test_initialize_fails_on_zero_address() {
        let mut mock = MockConsole::new();
        mock.queue_response("printenv - print environment\n");
        mock.queue_response("baudrate=115200\n");

        let mut session = UbootSession::new(mock);
        let err = session.initialize().unwrap_err();
        assert!(matches!(err, SessionError::AddressDetectionFailed));
        assert_eq!(session.boot_address(), 0);
    }

    #[test]
    fn test_validate_sequential_block() {
        let text = format!(
            "{}\n{}\n{}\n",
            hexdump_line(0x100, 0x00),
            hexdump_line(0x110, 0x10),
            hexdump_line(0x120, 0x20)
        );

        let outcome = session().validate_dump_block(&text, 0x100);
        assert!(outcome.ok);
        assert_eq!(outcome.data.len(), 48);
        assert_eq!(outcome.resync_address, 0x130);
        assert_eq!(outcome.data[0], 0x00);
        assert_eq!(outcome.data[16], 0x10);
        assert_eq!(outcome.data[47], 0x2f);
    }

    #[test]
    fn test_validate_address_gap_resyncs_at_expected() {
        let text = format!(
            "{}\n{}\n{}\n{}\n",
            hexdump_line(0x100, 0x00),
            hexdump_line(0x110, 0x10),
            hexdump_line(0x120, 0x20),
            hexdump_line(0x140, 0x40)
        );

        let outcome = session().validate_dump_block(&text, 0x100);
        assert!(!outcome.ok);
        // The running counter, not the stray line's own address, is
        // authoritative for resync
        assert_eq!(outcome.resync_address, 0x130);
        assert_eq!(outcome.data.len(), 48);
    }

    #[test]
    fn test_validate_regressed_address_fails() {
        let text = format!(
            "{}\n{}\n",
            hexdump_line(0x100, 0x00),
            hexdump_line(0x0f0, 0x10)
        );

        let outcome = session().validate_dump_block(&text, 0x100);
        assert!(!outcome.ok);
        assert_eq!(outcome.resync_address, 0x110);
    }

    #[test]
    fn test_validate_bad_token_fails_block() {
        let good = hexdump_line(0x100, 0x00);
        let bad = "00000110: 00 01 zz 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f    ................";
        let text = format!("{good}\n{bad}\n{}\n", hexdump_line(0x120, 0x20));

        let outcome = session().validate_dump_block(&text, 0x100);
        assert!(!outcome.ok);
        assert_eq!(outcome.resync_address, 0x110);
        assert_eq!(outcome.data.len(), 16);
    }

    #[test]
    fn test_validate_short_block_fails_at_start() {
        let outcome = session().validate_dump_block("", 0x200);
        assert!(!outcome.ok);
        assert_eq!(outcome.resync_address, 0x200);
        assert!(outcome.data.is_empty());

        let one_line = hexdump_line(0x200, 0x00);
        let outcome = session().validate_dump_block(&one_line, 0x200);
        assert!(!outcome.ok);
        assert_eq!(outcome.resync_address, 0x200);
        assert!(outcome.data.is_empty());
    }

    #[test]
    fn test_validate_is_idempotent() {
        let text = format!(
            "{}\n{}\nnoise line\n",
            hexdump_line(0x100, 0x00),
            hexdump_line(0x110, 0x10)
        );

        let s = session();
        let first = s.validate_dump_block(&text, 0x100);
        let second = s.validate_dump_block(&text, 0x100);
        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_version_ident() {
        let raw = "U-Boot 2020.04-rc3 (Mar 02 2020 - 18:00:00)\narm-linux-gcc 9.2\n";
        assert_eq!(extract_version_ident(raw).as_deref(), Some("U-Boot 2020.04"));
        assert_eq!(extract_version_ident("no banner here\n"), None);
    }

    #[test]
    fn test_dump_config_roundtrip() {
        let config = DumpConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: DumpConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.chunk_size, config.chunk_size);
        assert_eq!(parsed.span, config.span);
        assert_eq!(parsed.serial.baud_rate, 115_200);
    }
}
