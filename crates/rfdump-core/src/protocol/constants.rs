//! Wire-protocol constants for the U-Boot serial console.
//!
//! U-Boot speaks a line-buffered, human-oriented protocol: the only
//! framing is the prompt string that reappears after every command.

use std::time::Duration;

// ============================================================================
// Console markers
// ============================================================================

/// Interactive prompt marker. A command response is complete once this
/// string shows up in the receive buffer.
pub const PROMPT_MARKER: &str = "=>";

/// Banner substring identifying the U-Boot family.
pub const BANNER_SIGNATURE: &str = "U-Boot";

/// Countdown phrase printed during the autoboot window.
pub const AUTOBOOT_PHRASE: &str = "Hit any key to stop autoboot";

/// Keystroke sent to interrupt autoboot.
pub const INTERRUPT_KEY: char = '\n';

// ============================================================================
// Commands
// ============================================================================

/// List supported monitor commands.
pub const CMD_HELP: &str = "help";

/// Print the stored environment.
pub const CMD_PRINTENV: &str = "printenv";

/// Print board information.
pub const CMD_BDINFO: &str = "bdinfo";

/// Print the monitor version banner.
pub const CMD_VERSION: &str = "version";

/// Byte-granularity memory display. Formatted as
/// `md.b <address-hex> <length-hex>`.
pub const CMD_MEMORY_DISPLAY: &str = "md.b";

// ============================================================================
// Hexdump line shape
// ============================================================================

/// Bytes rendered per hexdump line.
pub const BYTES_PER_LINE: usize = 16;

/// Separator between the byte column and the ASCII rendering column.
pub const ASCII_COLUMN_SEPARATOR: &str = "    ";

// ============================================================================
// Dump policy
// ============================================================================

/// Total address range scanned per dump operation (16 MiB). A policy
/// constant, not derived from the device.
pub const DUMP_SPAN: u32 = 16 * 1024 * 1024;

/// Nominal bytes requested per memory-display command.
pub const DEFAULT_CHUNK_SIZE: u32 = 0x1000;

// ============================================================================
// Timing
// ============================================================================

/// Wait between `read_available` polls while the bootloader is booting.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Overall deadline for banner + prompt detection.
pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_secs(45);

/// How long `execute` waits for the prompt to reappear before giving up.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
