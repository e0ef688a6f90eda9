//! PMON-style `printf` over target memory.
//!
//! The format string and `%s` arguments are read byte by byte from a [`ByteSource`];
//! numeric arguments come from an iterator of raw register values.

use crate::memory::Memory;

/// Largest field width or precision honored. Larger requests are clamped.
pub const MAX_FIELD: usize = 4096;

const DEFAULT_FLOAT_PRECISION: usize = 6;

/// Byte-addressed view of target memory used by the formatter.
pub trait ByteSource {
    /// Byte at `addr`, or `None` when the address is unbacked.
    fn byte_at(&self, addr: u64) -> Option<u8>;
}

impl ByteSource for Memory {
    fn byte_at(&self, addr: u64) -> Option<u8> {
        self.raw_read_byte(addr)
    }
}

/// A plain byte slice addressed from zero.
impl ByteSource for [u8] {
    fn byte_at(&self, addr: u64) -> Option<u8> {
        usize::try_from(addr).ok().and_then(|index| self.get(index).copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Justify {
    Right,
    Left,
    RightZero,
    Center,
}

#[derive(Debug, Clone, Copy)]
struct Field {
    justify: Justify,
    width: usize,
    precision: Option<usize>,
}

struct Cursor<'a, S: ByteSource + ?Sized> {
    source: &'a S,
    addr: u64,
}

impl<S: ByteSource + ?Sized> Cursor<'_, S> {
    /// Next byte of the string, `None` at the terminator or an unbacked address.
    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.source.byte_at(self.addr)?;
        self.addr = self.addr.wrapping_add(1);
        (byte != 0).then_some(byte)
    }

    fn peek(&self) -> Option<u8> {
        self.source
            .byte_at(self.addr)
            .filter(|byte| *byte != 0)
    }
}

/// Reads the NUL-terminated string at `addr`, stopping early at unbacked memory.
pub fn read_c_string<S: ByteSource + ?Sized>(source: &S, addr: u64) -> Vec<u8> {
    let mut cursor = Cursor { source, addr };
    std::iter::from_fn(|| cursor.next_byte()).collect()
}

/// Formats the string at `format` with arguments drawn from `args`.
///
/// Missing arguments read as zero.
pub fn format<S, I>(source: &S, format: u64, args: I) -> Vec<u8>
where
    S: ByteSource + ?Sized,
    I: IntoIterator<Item = u64>,
{
    let mut args = args.into_iter().chain(std::iter::repeat(0));
    let mut next_arg = move || args.next().unwrap_or(0);
    let mut cursor = Cursor {
        source,
        addr: format,
    };
    let mut out = Vec::new();

    while let Some(byte) = cursor.next_byte() {
        if byte != b'%' {
            out.push(byte);
            continue;
        }

        let mut field = Field {
            justify: Justify::Right,
            width: 0,
            precision: None,
        };
        let mut had_dot = false;
        let conversion = loop {
            let Some(c) = cursor.next_byte() else {
                return out;
            };
            match c {
                b'd' | b'o' | b'b' | b'x' | b'X' | b'u' | b'l' | b's' | b'c' | b'e' | b'E'
                | b'f' | b'g' | b'G' | b'%' => break c,
                b'-' => field.justify = Justify::Left,
                b'0' => field.justify = Justify::RightZero,
                b'~' => field.justify = Justify::Center,
                b'*' => {
                    let value = next_arg() as i32;
                    if had_dot {
                        field.precision = usize::try_from(value).ok().map(|p| p.min(MAX_FIELD));
                    } else {
                        if value < 0 {
                            field.justify = Justify::Left;
                        }
                        field.width = (value.unsigned_abs() as usize).min(MAX_FIELD);
                    }
                }
                b'1'..=b'9' => {
                    let mut value = usize::from(c - b'0');
                    while let Some(digit @ b'0'..=b'9') = cursor.peek() {
                        cursor.next_byte();
                        value = value
                            .saturating_mul(10)
                            .saturating_add(usize::from(digit - b'0'));
                    }
                    let value = value.min(MAX_FIELD);
                    if had_dot {
                        field.precision = Some(value);
                    } else {
                        field.width = value;
                    }
                }
                b'.' => {
                    had_dot = true;
                    field.precision.get_or_insert(0);
                }
                _ => {}
            }
        };

        match conversion {
            b'%' => out.push(b'%'),
            b's' => {
                // A null pointer still uses up its argument slot.
                let addr = next_arg();
                let mut text = if addr as u32 == 0 {
                    b"(null)".to_vec()
                } else {
                    read_c_string(source, addr)
                };
                if let Some(precision) = field.precision {
                    text.truncate(precision);
                }
                pad(&mut out, &text, field, false);
            }
            b'c' => pad(&mut out, &[next_arg() as u8], field, false),
            _ => {
                let mut c = conversion;
                let mut long_long = false;
                if c == b'l' {
                    let Some(next) = cursor.next_byte() else {
                        return out;
                    };
                    c = next;
                    if c == b'l' {
                        long_long = true;
                        let Some(next) = cursor.next_byte() else {
                            return out;
                        };
                        c = next;
                    }
                }
                match c {
                    b'b' => {
                        next_arg();
                        out.extend_from_slice(b"<binary not supported>");
                    }
                    b'd' | b'o' | b'x' | b'X' | b'u' => {
                        let text = format_integer(c, next_arg(), long_long, field.precision);
                        pad(&mut out, text.as_bytes(), field, true);
                    }
                    b'e' | b'E' | b'f' | b'g' | b'G' => {
                        let value = f64::from_bits(next_arg());
                        let precision = field.precision.unwrap_or(DEFAULT_FLOAT_PRECISION);
                        let text = format_float(c, value, precision);
                        pad(&mut out, text.as_bytes(), field, value.is_finite());
                    }
                    _ => {}
                }
            }
        }
    }
    out
}

fn format_integer(conversion: u8, raw: u64, long_long: bool, precision: Option<usize>) -> String {
    let unsigned = if long_long { raw } else { u64::from(raw as u32) };
    let (negative, magnitude) = match conversion {
        b'd' if long_long => ((raw as i64) < 0, (raw as i64).unsigned_abs()),
        b'd' => ((raw as i32) < 0, u64::from((raw as i32).unsigned_abs())),
        _ => (false, unsigned),
    };
    let digits = match conversion {
        b'o' => format!("{magnitude:o}"),
        b'x' => format!("{magnitude:x}"),
        b'X' => format!("{magnitude:X}"),
        _ => magnitude.to_string(),
    };
    let digits = match precision {
        Some(0) if magnitude == 0 => String::new(),
        Some(min) if digits.len() < min => format!("{}{digits}", "0".repeat(min - digits.len())),
        _ => digits,
    };
    if negative {
        format!("-{digits}")
    } else {
        digits
    }
}

fn format_float(conversion: u8, value: f64, precision: usize) -> String {
    let upper = conversion.is_ascii_uppercase();
    let text = if value.is_nan() {
        "nan".to_owned()
    } else if value.is_infinite() {
        String::from(if value < 0.0 { "-inf" } else { "inf" })
    } else {
        match conversion.to_ascii_lowercase() {
            b'e' => format_exponent(value, precision),
            b'g' => format_general(value, precision),
            _ => format!("{value:.precision$}"),
        }
    };
    if upper {
        text.to_ascii_uppercase()
    } else {
        text
    }
}

/// C-style `%e`: at least two exponent digits with an explicit sign.
fn format_exponent(value: f64, precision: usize) -> String {
    let rendered = format!("{value:.precision$e}");
    let (mantissa, exponent) = rendered.split_once('e').unwrap_or((&rendered, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
}

/// C-style `%g`: the shorter of `%e` and `%f` with trailing zeros removed.
fn format_general(value: f64, precision: usize) -> String {
    let precision = precision.max(1);
    let rendered = format!("{value:.prec$e}", prec = precision - 1);
    let exponent: i64 = rendered
        .split_once('e')
        .and_then(|(_, exponent)| exponent.parse().ok())
        .unwrap_or(0);
    let text = if exponent < -4 || exponent >= precision as i64 {
        format_exponent(value, precision - 1)
    } else {
        let decimals = (precision as i64 - 1 - exponent).max(0) as usize;
        format!("{value:.decimals$}")
    };
    strip_trailing_zeros(&text)
}

fn strip_trailing_zeros(text: &str) -> String {
    let (number, exponent) = match text.find('e') {
        Some(at) => text.split_at(at),
        None => (text, ""),
    };
    let number = if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    };
    format!("{number}{exponent}")
}

fn pad(out: &mut Vec<u8>, text: &[u8], field: Field, numeric: bool) {
    let fill = field.width.saturating_sub(text.len());
    match field.justify {
        Justify::Left => {
            out.extend_from_slice(text);
            out.resize(out.len() + fill, b' ');
        }
        Justify::Center => {
            let left = fill / 2;
            out.resize(out.len() + left, b' ');
            out.extend_from_slice(text);
            out.resize(out.len() + (fill - left), b' ');
        }
        Justify::RightZero => {
            let (sign, digits) = match text.split_first() {
                Some((b'-', rest)) if numeric => (&text[..1], rest),
                _ => (&text[..0], text),
            };
            out.extend_from_slice(sign);
            out.resize(out.len() + fill, b'0');
            out.extend_from_slice(digits);
        }
        Justify::Right => {
            out.resize(out.len() + fill, b' ');
            out.extend_from_slice(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{format, read_c_string};
    use rstest::rstest;

    fn render(fmt: &str, args: &[u64]) -> String {
        let mut image = fmt.as_bytes().to_vec();
        image.push(0);
        String::from_utf8(format(image.as_slice(), 0, args.iter().copied())).expect("utf8")
    }

    #[rstest]
    #[case("%d", &[42], "42")]
    #[case("%5d", &[3], "    3")]
    #[case("%-5d|", &[3], "3    |")]
    #[case("%05d", &[(-42i64) as u64], "-0042")]
    #[case("%~6d|", &[7], "  7   |")]
    #[case("%d", &[0xFFFF_FFFF], "-1")]
    #[case("%u", &[0xFFFF_FFFF], "4294967295")]
    #[case("%lld", &[u64::MAX], "-1")]
    #[case("%ld", &[0x1_0000_0005], "5")]
    #[case("%x/%X/%o", &[255, 255, 8], "ff/FF/10")]
    #[case("%*d", &[4, 9], "   9")]
    #[case("%.3d", &[7], "007")]
    #[case("100%%", &[], "100%")]
    #[case("%b", &[5], "<binary not supported>")]
    #[case("%c%c", &[u64::from(b'o'), u64::from(b'k')], "ok")]
    #[case("%s", &[0], "(null)")]
    fn integer_and_char_conversions(#[case] fmt: &str, #[case] args: &[u64], #[case] expected: &str) {
        assert_eq!(render(fmt, args), expected);
    }

    #[test]
    fn null_string_consumes_its_argument() {
        assert_eq!(render("%s %d", &[0, 7]), "(null) 7");
        assert_eq!(render("[%8s]", &[0]), "[  (null)]");
    }

    #[rstest]
    #[case("%f", 1.5, "1.500000")]
    #[case("%.2f", 3.14159, "3.14")]
    #[case("%8.1f", -2.26, "    -2.3")]
    #[case("%e", 1234.5, "1.234500e+03")]
    #[case("%.1E", 0.00012, "1.2E-04")]
    #[case("%g", 0.0001, "0.0001")]
    #[case("%g", 1_000_000.0, "1e+06")]
    #[case("%g", 2.5, "2.5")]
    #[case("%f", f64::INFINITY, "inf")]
    fn float_conversions(#[case] fmt: &str, #[case] value: f64, #[case] expected: &str) {
        assert_eq!(render(fmt, &[value.to_bits()]), expected);
    }

    #[test]
    fn strings_are_read_from_the_source() {
        let mut image = b"%s!\0hi\0".to_vec();
        image.push(0);
        let out = format(image.as_slice(), 0, [4]);
        assert_eq!(out, b"hi!");
        assert_eq!(read_c_string(image.as_slice(), 4), b"hi");
    }

    #[test]
    fn precision_truncates_strings() {
        let image = b"[%-6.2s]\0hello\0".to_vec();
        assert_eq!(format(image.as_slice(), 0, [9]), b"[he    ]");
    }

    #[test]
    fn unterminated_formats_stop_at_the_end_of_memory() {
        let image = b"abc%5".to_vec();
        assert_eq!(format(image.as_slice(), 0, [1]), b"abc");
    }

    #[test]
    fn huge_widths_are_clamped() {
        let image = b"%99999999999d\0".to_vec();
        assert_eq!(format(image.as_slice(), 0, [1]).len(), super::MAX_FIELD);
    }
}
