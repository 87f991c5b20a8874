//! Board pin names and I2C address text forms.

use crate::limits::{DEFAULT_I2C_ADDRESS, MAX_I2C_ADDRESS};

/// NodeMCU pin labels and their GPIO numbers.
const NAMED_PINS: [(&str, u8); 12] = [
    ("D0", 16),
    ("D1", 5),
    ("D2", 4),
    ("D3", 0),
    ("D4", 2),
    ("D5", 14),
    ("D6", 12),
    ("D7", 13),
    ("D8", 15),
    ("D9", 3),
    ("D10", 1),
    ("A0", 17),
];

/// Parse a pin given as a board label, `GPIOn`, or a decimal/hex number.
pub fn parse_pin(text: &str) -> Option<u8> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_ascii_uppercase();
    if let Some((_, gpio)) = NAMED_PINS.iter().find(|(name, _)| *name == upper) {
        return Some(*gpio);
    }
    if let Some(rest) = upper.strip_prefix("GPIO") {
        return rest.parse::<u8>().ok();
    }
    parse_c_integer(trimmed).and_then(|v| u8::try_from(v).ok())
}

/// Board label for a GPIO number, or its decimal form.
pub fn pin_name(pin: u8) -> String {
    NAMED_PINS
        .iter()
        .find(|(_, gpio)| *gpio == pin)
        .map_or_else(|| pin.to_string(), |(name, _)| (*name).to_string())
}

/// Parse a 7-bit I2C address. Anything unusable yields the default `0x60`.
pub fn parse_i2c_address(text: &str) -> u8 {
    parse_c_integer_prefix(text.trim())
        .and_then(|v| u8::try_from(v).ok())
        .filter(|v| *v <= MAX_I2C_ADDRESS)
        .unwrap_or(DEFAULT_I2C_ADDRESS)
}

/// Address as `0xNN`.
pub fn format_i2c_address(address: u8) -> String {
    format!("0x{:02X}", address & MAX_I2C_ADDRESS)
}

/// Whole-string integer with C base detection (`0x` hex, leading `0` octal).
fn parse_c_integer(text: &str) -> Option<i64> {
    let (value, consumed) = scan_c_integer(text)?;
    (consumed == text.len()).then_some(value)
}

/// Leading integer with C base detection; trailing garbage is ignored.
fn parse_c_integer_prefix(text: &str) -> Option<i64> {
    scan_c_integer(text).map(|(value, _)| value)
}

fn scan_c_integer(text: &str) -> Option<(i64, usize)> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let negative = match bytes.first() {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    let rest = &text[pos..];
    let (radix, skip) = if rest.len() > 2 && (rest.starts_with("0x") || rest.starts_with("0X")) {
        (16, 2)
    } else if rest.len() > 1 && rest.starts_with('0') {
        (8, 1)
    } else {
        (10, 0)
    };
    let digits_start = pos + skip;
    let digits_len = text[digits_start..]
        .chars()
        .take_while(|c| c.is_digit(radix))
        .count();
    if digits_len == 0 {
        // "0" followed by a non-octal digit still reads the zero.
        return (radix == 8).then_some((0, digits_start));
    }
    let digits = &text[digits_start..digits_start + digits_len];
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    Some((value, digits_start + digits_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_pins() {
        assert_eq!(parse_pin("D1"), Some(5));
        assert_eq!(parse_pin(" a0 "), Some(17));
        assert_eq!(parse_pin("d10"), Some(1));
        assert_eq!(pin_name(16), "D0");
        assert_eq!(pin_name(0), "D3");
        assert_eq!(pin_name(9), "9");
    }

    #[test]
    fn test_numeric_pins() {
        assert_eq!(parse_pin("GPIO12"), Some(12));
        assert_eq!(parse_pin("gpio"), None);
        assert_eq!(parse_pin("14"), Some(14));
        assert_eq!(parse_pin("0x0E"), Some(14));
        assert_eq!(parse_pin("12abc"), None);
        assert_eq!(parse_pin("-1"), None);
        assert_eq!(parse_pin(""), None);
    }

    #[test]
    fn test_i2c_addresses() {
        assert_eq!(parse_i2c_address("0x61"), 0x61);
        assert_eq!(parse_i2c_address("98"), 98);
        assert_eq!(parse_i2c_address("0x80"), 0x60);
        assert_eq!(parse_i2c_address("bogus"), 0x60);
        assert_eq!(parse_i2c_address(""), 0x60);
        assert_eq!(format_i2c_address(0x0A), "0x0A");
    }
}
