//! Renders the bytes of a KMI value as text.
use std::fmt::Display;
use std::io::{self, Write};

/// How values are written. Chosen once per run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    /// Colon separated `name:size:value[:"literal"]` records.
    #[default]
    Raw,

    /// C enum declarations for the size and the value.
    Enum,
}

/// How a byte may appear inside a C string literal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LiteralChar {
    /// Can't be represented, the value isn't dumped as a string.
    Unrepresentable,

    /// Printable ASCII that stands for itself.
    Printable,

    /// Written as a backslash followed by this character.
    Escaped(u8),
}

/// Classifies a byte for use within a string literal. Note that nul isn't
/// representable: a literal's only nul is the terminator which isn't written.
pub fn classify(byte: u8) -> LiteralChar {
    match byte {
        0x07 => LiteralChar::Escaped(b'a'),
        0x08 => LiteralChar::Escaped(b'b'),
        b'\t' => LiteralChar::Escaped(b't'),
        b'\n' => LiteralChar::Escaped(b'n'),
        0x0b => LiteralChar::Escaped(b'v'),
        0x0c => LiteralChar::Escaped(b'f'),
        b'\r' => LiteralChar::Escaped(b'r'),
        0x1b => LiteralChar::Escaped(b'e'),
        b'"' => LiteralChar::Escaped(b'"'),
        b'\\' => LiteralChar::Escaped(b'\\'),
        0x20..=0x7e => LiteralChar::Printable,
        _ => LiteralChar::Unrepresentable,
    }
}

/// Returns the escape character used when writing byte within a literal.
fn escape(byte: u8) -> Option<u8> {
    match classify(byte) {
        LiteralChar::Escaped(c) => Some(c),
        _ if byte == 0 => Some(b'0'),
        _ => None,
    }
}

/// Values are strings if they end with a nul and everything before that can be
/// written within a C string literal.
fn is_string_literal(value: &[u8]) -> bool {
    match value.split_last() {
        Some((0, chars)) => chars
            .iter()
            .all(|c| classify(*c) != LiteralChar::Unrepresentable),
        _ => false,
    }
}

fn write_string_literal(out: &mut impl Write, value: &[u8]) -> io::Result<()> {
    let chars = &value[..value.len() - 1];
    out.write_all(b"\"")?;
    for c in chars {
        match escape(*c) {
            Some(e) => out.write_all(&[b'\\', e])?,
            None => out.write_all(&[*c])?,
        }
    }
    out.write_all(b"\"")
}

/// Values with the size of an integer are written as a little-endian integer.
fn as_integer(value: &[u8]) -> Option<u64> {
    match *value {
        [b] => Some(u64::from(b)),
        [b0, b1] => Some(u64::from(u16::from_le_bytes([b0, b1]))),
        [b0, b1, b2, b3] => Some(u64::from(u32::from_le_bytes([b0, b1, b2, b3]))),
        [b0, b1, b2, b3, b4, b5, b6, b7] => {
            Some(u64::from_le_bytes([b0, b1, b2, b3, b4, b5, b6, b7]))
        }
        _ => None,
    }
}

impl OutputFormat {
    /// Names are written as is, they aren't required to be UTF-8.
    pub fn write_value(&self, out: &mut impl Write, name: &[u8], value: &[u8]) -> io::Result<()> {
        match self {
            OutputFormat::Raw => write_raw(out, name, value),
            OutputFormat::Enum => write_enum(out, name, value),
        }
    }
}

fn write_raw(out: &mut impl Write, name: &[u8], value: &[u8]) -> io::Result<()> {
    out.write_all(name)?;
    write!(out, ":{}:", value.len())?;
    if let Some(n) = as_integer(value) {
        let width = value.len() * 2;
        write!(out, "0x{n:0width$x}")?;
    } else {
        for (i, b) in value.iter().enumerate() {
            if i > 0 {
                out.write_all(b",")?;
            }
            write!(out, "0x{b:02x}")?;
        }
    }
    if is_string_literal(value) {
        out.write_all(b":")?;
        write_string_literal(out, value)?;
    }
    writeln!(out)
}

/// Writes `enum __kmi_<name><tag> { __kmi_<name><label> = <value> };`
fn write_enum_line(
    out: &mut impl Write,
    name: &[u8],
    tag: impl Display,
    label: impl Display,
    value: impl Display,
) -> io::Result<()> {
    out.write_all(b"enum __kmi_")?;
    out.write_all(name)?;
    write!(out, "{tag} {{ __kmi_")?;
    out.write_all(name)?;
    writeln!(out, "{label} = {value} }};")
}

fn write_enum(out: &mut impl Write, name: &[u8], value: &[u8]) -> io::Result<()> {
    write_enum_line(out, name, "_s", "_size", value.len())?;
    if let Some(n) = as_integer(value) {
        let width = value.len() * 2;
        write_enum_line(out, name, "_v", "_val", format_args!("0x{n:0width$x}"))?;
    } else {
        for (i, b) in value.iter().enumerate() {
            write_enum_line(
                out,
                name,
                format_args!("_v_{i:08x}"),
                format_args!("_val_{i:08x}"),
                format_args!("0x{b:02x}"),
            )?;
        }
    }
    Ok(())
}
