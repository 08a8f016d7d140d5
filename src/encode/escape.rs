use std::io::{Result, Write};

// Measurement names may contain '=' unescaped; only the separators that
// would end the series key need a backslash.
const MEASUREMENT_SPECIALS: &[char] = &[',', ' '];
const KEY_SPECIALS: &[char] = &[',', '=', ' '];
const STRING_SPECIALS: &[char] = &['"', '\\'];

fn write_escaped<W: Write>(writable: &mut W, s: &str, specials: &[char]) -> Result<()> {
    if !s.contains(|c: char| specials.contains(&c) || c == '\n') {
        return writable.write_all(s.as_bytes());
    }
    let mut buf = [0; 4];
    for c in s.chars() {
        if c == '\n' {
            writable.write_all(b"\\n")?;
            continue;
        }
        if specials.contains(&c) {
            writable.write_all(b"\\")?;
        }
        writable.write_all(c.encode_utf8(&mut buf).as_bytes())?;
    }
    Ok(())
}

pub fn write_measurement<W: Write>(writable: &mut W, s: &str) -> Result<()> {
    write_escaped(writable, s, MEASUREMENT_SPECIALS)
}

/// Tag keys, tag values and field keys share one escaping rule.
pub fn write_key<W: Write>(writable: &mut W, s: &str) -> Result<()> {
    write_escaped(writable, s, KEY_SPECIALS)
}

pub fn write_string_value<W: Write>(writable: &mut W, s: &str) -> Result<()> {
    writable.write_all(b"\"")?;
    for c in s.chars() {
        if STRING_SPECIALS.contains(&c) {
            writable.write_all(b"\\")?;
        }
        let mut buf = [0; 4];
        writable.write_all(c.encode_utf8(&mut buf).as_bytes())?;
    }
    writable.write_all(b"\"")
}
