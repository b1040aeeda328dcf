//! Line grammar for U-Boot console output.
//!
//! Three line shapes are parsed independently, line by line:
//! help-table entries, `key=value` environment lines, and hexdump lines.
//! Everything is stateless; sequencing rules live in the session's
//! block validator.

use std::collections::HashMap;

use super::constants::{ASCII_COLUMN_SEPARATOR, BYTES_PER_LINE};

/// Split a raw response on newlines, stripping trailing carriage returns.
pub fn clean_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\n').map(|line| line.trim_end_matches('\r'))
}

/// Parse `help` output into a command → description map.
///
/// A line is a table entry if it contains a `-` separator; the first `-`
/// splits it and both sides are trimmed. Header and banner lines without
/// a `-` are ignored. On duplicate names the last occurrence wins.
pub fn parse_help_table(raw: &str) -> HashMap<String, String> {
    let mut commands = HashMap::new();
    for line in clean_lines(raw) {
        if let Some((name, description)) = line.split_once('-') {
            commands.insert(name.trim().to_string(), description.trim().to_string());
        }
    }
    commands
}

/// Parse `printenv`/`bdinfo`-style output into a key → value map.
///
/// A line matches if it contains `=`; the first `=` splits it. Values are
/// kept raw. Non-matching lines are ignored.
pub fn parse_key_values(raw: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in clean_lines(raw) {
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.to_string(), value.to_string());
        }
    }
    values
}

/// One parsed hexdump record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpLine {
    /// Address of the first byte on the line.
    pub address: u32,
    /// The 16 decoded payload bytes.
    pub bytes: [u8; BYTES_PER_LINE],
    /// ASCII rendering column, captured but not validated.
    pub ascii: String,
}

impl DumpLine {
    /// Parse one line of `md.b` output:
    /// `<hex-address>: <16 two-digit hex byte tokens>    <ascii>`,
    /// with four spaces separating the byte column from the ASCII column.
    ///
    /// Returns `None` on any grammar mismatch, including a single
    /// malformed byte token.
    pub fn parse(line: &str) -> Option<Self> {
        let (addr, rest) = line.split_once(':')?;
        let address = parse_hex_address(addr.trim())?;
        let (byte_column, ascii) = rest.split_once(ASCII_COLUMN_SEPARATOR)?;

        let mut bytes = [0u8; BYTES_PER_LINE];
        let mut count = 0;
        for token in byte_column.split_whitespace() {
            if count == BYTES_PER_LINE {
                return None;
            }
            bytes[count] = decode_byte_token(token)?;
            count += 1;
        }
        if count != BYTES_PER_LINE {
            return None;
        }

        Some(Self {
            address,
            bytes,
            ascii: ascii.to_string(),
        })
    }
}

fn parse_hex_address(text: &str) -> Option<u32> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(text, 16).ok()
}

/// Decode a single byte token. Exactly two hex digits; anything else
/// rejects the token, and with it the whole line.
fn decode_byte_token(token: &str) -> Option<u8> {
    if token.len() != 2 || !token.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_table() {
        let raw = "printenv - print environment\nbdinfo - board info\n";
        let commands = parse_help_table(raw);
        assert_eq!(commands.len(), 2);
        assert_eq!(commands["printenv"], "print environment");
        assert_eq!(commands["bdinfo"], "board info");
    }

    #[test]
    fn test_help_table_skips_headers() {
        let raw = "U-Boot 2020.04\n\nmd - memory display\n";
        let commands = parse_help_table(raw);
        assert_eq!(commands.len(), 1);
        assert!(commands.contains_key("md"));
    }

    #[test]
    fn test_help_table_splits_at_first_dash() {
        let commands = parse_help_table("erase - erase FLASH - dangerous\n");
        assert_eq!(commands["erase"], "erase FLASH - dangerous");
    }

    #[test]
    fn test_key_values() {
        let raw = "bootaddr=0x8000\r\nbootcmd=bootm 0x40000000\r\n## Environment size: 42\n";
        let env = parse_key_values(raw);
        assert_eq!(env.len(), 2);
        assert_eq!(env["bootaddr"], "0x8000");
        assert_eq!(env["bootcmd"], "bootm 0x40000000");
    }

    #[test]
    fn test_dump_line_parse() {
        let line = "00000100: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f    ................";
        let parsed = DumpLine::parse(line).unwrap();
        assert_eq!(parsed.address, 0x100);
        assert_eq!(parsed.bytes[0], 0x00);
        assert_eq!(parsed.bytes[10], 0x0a);
        assert_eq!(parsed.bytes[15], 0x0f);
        assert_eq!(parsed.ascii, "................");
    }

    #[test]
    fn test_dump_line_rejects_short_token() {
        let line = "00000100: 00 01 2 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f    ................";
        assert!(DumpLine::parse(line).is_none());
    }

    #[test]
    fn test_dump_line_rejects_non_hex_token() {
        let line = "00000100: 00 01 zz 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f    ................";
        assert!(DumpLine::parse(line).is_none());
    }

    #[test]
    fn test_dump_line_rejects_missing_ascii_column() {
        let line = "00000100: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f";
        assert!(DumpLine::parse(line).is_none());
    }

    #[test]
    fn test_dump_line_rejects_wrong_count() {
        let line = "00000100: 00 01 02 03    ....";
        assert!(DumpLine::parse(line).is_none());
    }

    #[test]
    fn test_dump_line_rejects_garbage() {
        assert!(DumpLine::parse("md.b 100 40").is_none());
        assert!(DumpLine::parse("data abort").is_none());
    }
}
