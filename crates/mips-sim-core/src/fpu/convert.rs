use std::cmp::Ordering;

use crate::{FpFormat, RoundingMode, SimFault};

use super::ops::{double, pack_double, pack_single, single};
use super::{QNAN_LONG, QNAN_WORD};

#[derive(Debug, Clone, Copy)]
enum Source {
    Float(f64),
    Integer(i64),
}

fn source(op: u64, from: FpFormat) -> Result<Source, SimFault> {
    match from {
        FpFormat::Single => Ok(Source::Float(f64::from(single(op)))),
        FpFormat::Double => Ok(Source::Float(double(op))),
        FpFormat::Word => Ok(Source::Integer(i64::from(op as u32 as i32))),
        FpFormat::Long => Ok(Source::Integer(op as i64)),
        _ => Err(SimFault::UnsupportedFormat {
            operation: "convert from",
            format: from,
        }),
    }
}

fn next_up_f32(x: f32) -> f32 {
    if x.is_nan() || (x.is_infinite() && x.is_sign_positive()) {
        return x;
    }
    if x.to_bits() & 0x7FFF_FFFF == 0 {
        return f32::from_bits(1);
    }
    let bits = x.to_bits();
    f32::from_bits(if x.is_sign_positive() { bits + 1 } else { bits - 1 })
}

fn next_down_f32(x: f32) -> f32 {
    -next_up_f32(-x)
}

fn next_up_f64(x: f64) -> f64 {
    if x.is_nan() || (x.is_infinite() && x.is_sign_positive()) {
        return x;
    }
    if x.to_bits() & 0x7FFF_FFFF_FFFF_FFFF == 0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    f64::from_bits(if x.is_sign_positive() { bits + 1 } else { bits - 1 })
}

fn next_down_f64(x: f64) -> f64 {
    -next_up_f64(-x)
}

/// Moves a round-to-nearest result one step when the mode demands the other neighbour.
///
/// `ordering` compares the nearest result against the exact value.
fn directed<T>(
    nearest: T,
    ordering: Ordering,
    negative: bool,
    rm: RoundingMode,
    up: fn(T) -> T,
    down: fn(T) -> T,
) -> T {
    match (rm, ordering) {
        (RoundingMode::ToPositiveInfinity, Ordering::Less) => up(nearest),
        (RoundingMode::ToNegativeInfinity, Ordering::Greater) => down(nearest),
        (RoundingMode::ToZero, Ordering::Greater) if !negative => down(nearest),
        (RoundingMode::ToZero, Ordering::Less) if negative => up(nearest),
        _ => nearest,
    }
}

fn float_to_single(x: f64, rm: RoundingMode) -> f32 {
    let nearest = x as f32;
    if x.is_nan() {
        return nearest;
    }
    let ordering = f64::from(nearest).total_cmp(&x);
    directed(nearest, ordering, x < 0.0, rm, next_up_f32, next_down_f32)
}

fn integer_to_single(n: i64, rm: RoundingMode) -> f32 {
    let nearest = n as f32;
    let ordering = (nearest as i128).cmp(&i128::from(n));
    directed(nearest, ordering, n < 0, rm, next_up_f32, next_down_f32)
}

fn integer_to_double(n: i64, rm: RoundingMode) -> f64 {
    let nearest = n as f64;
    let ordering = (nearest as i128).cmp(&i128::from(n));
    directed(nearest, ordering, n < 0, rm, next_up_f64, next_down_f64)
}

/// Rounds to an integer of `bits` width, or `None` when the result is not representable.
fn float_to_integer(x: f64, rm: RoundingMode, bits: i32) -> Option<i64> {
    if !x.is_finite() {
        return None;
    }
    let rounded = match rm {
        RoundingMode::Nearest => x.round_ties_even(),
        RoundingMode::ToZero => x.trunc(),
        RoundingMode::ToPositiveInfinity => x.ceil(),
        RoundingMode::ToNegativeInfinity => x.floor(),
    };
    let limit = 2f64.powi(bits - 1);
    if rounded < -limit || rounded >= limit {
        None
    } else {
        Some(rounded as i64)
    }
}

/// Converts `op` from format `from` to format `to` under rounding mode `rm`.
///
/// Every conversion is exact or correctly rounded in the requested direction. An
/// invalid conversion to a fixed-point format (NaN, infinity or out of range) yields
/// that format's quiet NaN pattern.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] when either format is untyped.
pub fn convert(rm: RoundingMode, op: u64, from: FpFormat, to: FpFormat) -> Result<u64, SimFault> {
    let value = source(op, from)?;
    let result = match (to, value) {
        (FpFormat::Single, Source::Float(x)) => pack_single(float_to_single(x, rm)),
        (FpFormat::Single, Source::Integer(n)) => pack_single(integer_to_single(n, rm)),
        (FpFormat::Double, Source::Float(x)) => pack_double(x),
        (FpFormat::Double, Source::Integer(n)) => pack_double(integer_to_double(n, rm)),
        (FpFormat::Word, Source::Float(x)) => {
            float_to_integer(x, rm, 32).map_or(QNAN_WORD, |n| u64::from(n as i32 as u32))
        }
        (FpFormat::Word, Source::Integer(n)) => {
            i32::try_from(n).map_or(QNAN_WORD, |n| u64::from(n as u32))
        }
        (FpFormat::Long, Source::Float(x)) => {
            float_to_integer(x, rm, 64).map_or(QNAN_LONG, |n| n as u64)
        }
        (FpFormat::Long, Source::Integer(n)) => n as u64,
        _ => {
            return Err(SimFault::UnsupportedFormat {
                operation: "convert to",
                format: to,
            })
        }
    };
    Ok(result)
}
