//! Bootloader environment and capability model.
//!
//! Holds the parsed `help` and `printenv` output for one session and
//! derives the firmware base address from heuristics over the
//! environment. Both tables are built once during initialization and
//! never mutated afterwards.

use std::collections::HashMap;

use crate::protocol::grammar::{parse_help_table, parse_key_values};

/// Commands the bootloader advertises in its `help` output.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    commands: HashMap<String, String>,
}

impl CommandTable {
    /// Build the table from raw `help` output.
    pub fn from_help_output(raw: &str) -> Self {
        Self {
            commands: parse_help_table(raw),
        }
    }

    /// Whether the bootloader advertises `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// One-line description for `name`, if advertised.
    pub fn description(&self, name: &str) -> Option<&str> {
        self.commands.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// The bootloader's stored environment, as printed by `printenv`.
#[derive(Debug, Clone, Default)]
pub struct BootEnvironment {
    vars: HashMap<String, String>,
}

impl BootEnvironment {
    /// Build the environment from raw `printenv` output.
    pub fn from_printenv_output(raw: &str) -> Self {
        Self {
            vars: parse_key_values(raw),
        }
    }

    /// Raw value of `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Derive the firmware base address from the environment.
    ///
    /// Precedence:
    /// 1. `bootaddr` containing `+`: each operand parsed as hex and
    ///    summed with wrapping arithmetic.
    /// 2. `bootaddr` alone: parsed as a single hex address.
    /// 3. `bootcmd` starting with `bootm`: the first `0x<hex>` literal in
    ///    the value.
    /// 4. Otherwise 0, which callers must treat as "undetermined" -- a
    ///    zero address is never a legitimate firmware base.
    ///
    /// `bootaddr` always wins over `bootcmd`, even when both are set.
    pub fn detect_boot_address(&self) -> u32 {
        if let Some(bootaddr) = self.get("bootaddr") {
            if bootaddr.contains('+') {
                let mut addr: u32 = 0;
                for operand in bootaddr.split('+') {
                    addr = addr.wrapping_add(parse_hex_u32(operand.trim()).unwrap_or(0));
                }
                return addr;
            }
            return parse_hex_u32(bootaddr.trim()).unwrap_or(0);
        }

        if let Some(bootcmd) = self.get("bootcmd")
            && bootcmd.starts_with("bootm")
            && let Some(addr) = find_hex_literal(bootcmd)
        {
            return addr;
        }

        0
    }
}

/// Parse a hex value with an optional `0x`/`0X` prefix.
fn parse_hex_u32(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Find the first `0x<hex-digits>` literal in `text`.
fn find_hex_literal(text: &str) -> Option<u32> {
    let start = text.find("0x")?;
    let digits: String = text[start + 2..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from(raw: &str) -> BootEnvironment {
        BootEnvironment::from_printenv_output(raw)
    }

    #[test]
    fn test_bootaddr_sum() {
        let env = env_from("bootaddr=1000+0x2000\n");
        assert_eq!(env.detect_boot_address(), 0x3000);
    }

    #[test]
    fn test_bootaddr_plain() {
        let env = env_from("bootaddr=8000\n");
        assert_eq!(env.detect_boot_address(), 0x8000);
    }

    #[test]
    fn test_bootcmd_bootm() {
        let env = env_from("bootcmd=bootm 0x40000000\n");
        assert_eq!(env.detect_boot_address(), 0x40000000);
    }

    #[test]
    fn test_no_heuristic_matches() {
        let env = env_from("baudrate=115200\n");
        assert_eq!(env.detect_boot_address(), 0);
    }

    #[test]
    fn test_bootaddr_wins_over_bootcmd() {
        let env = env_from("bootaddr=8000\nbootcmd=bootm 0x40000000\n");
        assert_eq!(env.detect_boot_address(), 0x8000);
    }

    #[test]
    fn test_bootcmd_ignored_without_bootm() {
        let env = env_from("bootcmd=run flashboot 0x100\n");
        assert_eq!(env.detect_boot_address(), 0);
    }

    #[test]
    fn test_bootaddr_sum_wraps() {
        let env = env_from("bootaddr=0xffffffff+0x2\n");
        assert_eq!(env.detect_boot_address(), 0x1);
    }

    #[test]
    fn test_command_table() {
        let table = CommandTable::from_help_output("printenv - print environment\nbdinfo - board info\n");
        assert!(table.contains("printenv"));
        assert!(table.contains("bdinfo"));
        assert!(!table.contains("md"));
        assert_eq!(table.description("bdinfo"), Some("board info"));
    }
}
