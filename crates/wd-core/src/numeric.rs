use crate::{WdError, WdResult};

/// Floating point type used throughout the workspace
pub type Real = f64;

pub fn ensure_finite(v: Real, what: &'static str) -> WdResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(WdError::NonFinite { what, value: v })
    }
}

/// Decode a decision-vector slot holding a small non-negative integer code.
///
/// Optimizers hand integer slots over as floats; the value is rounded.
pub fn decode_code(v: Real, what: &'static str) -> WdResult<usize> {
    let v = ensure_finite(v, what)?;
    let rounded = v.round();
    if rounded < 0.0 {
        return Err(WdError::InvalidArg { what });
    }
    Ok(rounded as usize)
}

/// Decode a slot that indexes a lookup table of `len` entries.
pub fn decode_option(v: Real, len: usize, what: &'static str) -> WdResult<usize> {
    let index = decode_code(v, what)?;
    if index >= len {
        return Err(WdError::IndexOob { what, index, len });
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rounds_float_slots() {
        assert_eq!(decode_code(1.9999, "action").unwrap(), 2);
        assert_eq!(decode_code(0.0, "action").unwrap(), 0);
    }

    #[test]
    fn decode_rejects_negative_and_nan() {
        assert!(decode_code(-1.0, "action").is_err());
        assert!(decode_code(Real::NAN, "action").is_err());
    }

    #[test]
    fn decode_option_checks_table_length() {
        assert_eq!(decode_option(9.0, 10, "option").unwrap(), 9);
        let err = decode_option(10.0, 10, "option").unwrap_err();
        assert_eq!(
            err,
            WdError::IndexOob {
                what: "option",
                index: 10,
                len: 10
            }
        );
    }
}
