use crate::{FpFormat, SimFault};

use super::{QNAN_DOUBLE, QNAN_SINGLE};

pub(crate) fn single(op: u64) -> f32 {
    f32::from_bits((op & 0xFFFF_FFFF) as u32)
}

pub(crate) fn double(op: u64) -> f64 {
    f64::from_bits(op)
}

/// Packs a single-precision result. NaN results become the quiet NaN sentinel.
pub(crate) fn pack_single(value: f32) -> u64 {
    if value.is_nan() {
        QNAN_SINGLE
    } else {
        u64::from(value.to_bits())
    }
}

/// Packs a double-precision result. NaN results become the quiet NaN sentinel.
pub(crate) fn pack_double(value: f64) -> u64 {
    if value.is_nan() {
        QNAN_DOUBLE
    } else {
        value.to_bits()
    }
}

const fn unsupported(operation: &'static str, format: FpFormat) -> SimFault {
    SimFault::UnsupportedFormat { operation, format }
}

fn unary(
    operation: &'static str,
    op: u64,
    fmt: FpFormat,
    single_op: impl FnOnce(f32) -> f32,
    double_op: impl FnOnce(f64) -> f64,
) -> Result<u64, SimFault> {
    match fmt {
        FpFormat::Single => Ok(pack_single(single_op(single(op)))),
        FpFormat::Double => Ok(pack_double(double_op(double(op)))),
        _ => Err(unsupported(operation, fmt)),
    }
}

fn binary(
    operation: &'static str,
    op1: u64,
    op2: u64,
    fmt: FpFormat,
    single_op: impl FnOnce(f32, f32) -> f32,
    double_op: impl FnOnce(f64, f64) -> f64,
) -> Result<u64, SimFault> {
    match fmt {
        FpFormat::Single => Ok(pack_single(single_op(single(op1), single(op2)))),
        FpFormat::Double => Ok(pack_double(double_op(double(op1), double(op2)))),
        _ => Err(unsupported(operation, fmt)),
    }
}

fn compare(
    operation: &'static str,
    op1: u64,
    op2: u64,
    fmt: FpFormat,
    single_op: impl FnOnce(f32, f32) -> bool,
    double_op: impl FnOnce(f64, f64) -> bool,
) -> Result<bool, SimFault> {
    match fmt {
        FpFormat::Single => Ok(single_op(single(op1), single(op2))),
        FpFormat::Double => Ok(double_op(double(op1), double(op2))),
        _ => Err(unsupported(operation, fmt)),
    }
}

/// Returns `true` when `op` is a NaN. Fixed-point formats are viewed as floats of the same width.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for untyped formats.
pub fn nan(op: u64, fmt: FpFormat) -> Result<bool, SimFault> {
    match fmt {
        FpFormat::Single | FpFormat::Word => Ok(single(op).is_nan()),
        FpFormat::Double | FpFormat::Long => Ok(double(op).is_nan()),
        _ => Err(unsupported("nan", fmt)),
    }
}

/// Returns `true` when `op` is an infinity.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
pub fn infinity(op: u64, fmt: FpFormat) -> Result<bool, SimFault> {
    match fmt {
        FpFormat::Single => Ok(single(op).is_infinite()),
        FpFormat::Double => Ok(double(op).is_infinite()),
        _ => Err(unsupported("infinity", fmt)),
    }
}

/// Ordered less-than. Unordered operands compare false.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
pub fn less(op1: u64, op2: u64, fmt: FpFormat) -> Result<bool, SimFault> {
    compare("less", op1, op2, fmt, |a, b| a < b, |a, b| a < b)
}

/// Ordered equality. Unordered operands compare false.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
#[allow(clippy::float_cmp)]
pub fn equal(op1: u64, op2: u64, fmt: FpFormat) -> Result<bool, SimFault> {
    compare("equal", op1, op2, fmt, |a, b| a == b, |a, b| a == b)
}

/// Absolute value.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
pub fn abs(op: u64, fmt: FpFormat) -> Result<u64, SimFault> {
    unary("abs", op, fmt, f32::abs, f64::abs)
}

/// Negation.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
pub fn neg(op: u64, fmt: FpFormat) -> Result<u64, SimFault> {
    unary("neg", op, fmt, |v| -v, |v| -v)
}

/// Sum, rounded to nearest.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
pub fn add(op1: u64, op2: u64, fmt: FpFormat) -> Result<u64, SimFault> {
    binary("add", op1, op2, fmt, |a, b| a + b, |a, b| a + b)
}

/// Difference, rounded to nearest.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
pub fn sub(op1: u64, op2: u64, fmt: FpFormat) -> Result<u64, SimFault> {
    binary("sub", op1, op2, fmt, |a, b| a - b, |a, b| a - b)
}

/// Product, rounded to nearest.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
pub fn mul(op1: u64, op2: u64, fmt: FpFormat) -> Result<u64, SimFault> {
    binary("mul", op1, op2, fmt, |a, b| a * b, |a, b| a * b)
}

/// Quotient, rounded to nearest.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
pub fn div(op1: u64, op2: u64, fmt: FpFormat) -> Result<u64, SimFault> {
    binary("div", op1, op2, fmt, |a, b| a / b, |a, b| a / b)
}

/// Reciprocal.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
pub fn recip(op: u64, fmt: FpFormat) -> Result<u64, SimFault> {
    unary("recip", op, fmt, f32::recip, f64::recip)
}

/// Square root. Negative operands produce the quiet NaN.
///
/// # Errors
///
/// Returns [`SimFault::UnsupportedFormat`] for formats other than single and double.
pub fn sqrt(op: u64, fmt: FpFormat) -> Result<u64, SimFault> {
    unary("sqrt", op, fmt, f32::sqrt, f64::sqrt)
}
