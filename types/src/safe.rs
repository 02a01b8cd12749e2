use num_traits::{Bounded, NumCast, ToPrimitive, Zero};

/// Convert a numeric value to another numeric type, saturating on range
/// loss.
///
/// Returns the converted value and `true` when the value was representable
/// in the destination type. When it was not, the destination is saturated
/// to the bound nearest the source value and `false` is returned; callers
/// raise their out-of-range flag on `false`.
///
/// ```
/// use types::safe_cast;
///
/// assert_eq!(safe_cast::<i32, i8>(100), (100i8, true));
/// assert_eq!(safe_cast::<i32, i8>(300), (i8::MAX, false));
/// assert_eq!(safe_cast::<i32, u8>(-1), (0u8, false));
/// ```
pub fn safe_cast<T, U>(value: T) -> (U, bool)
where
    T: ToPrimitive + Zero + PartialOrd + Copy,
    U: NumCast + Bounded,
{
    match <U as NumCast>::from(value) {
        Some(converted) => (converted, true),
        None => {
            if value < T::zero() {
                (U::min_value(), false)
            } else {
                (U::max_value(), false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossless_conversions() {
        assert_eq!(safe_cast::<u8, u32>(200), (200u32, true));
        assert_eq!(safe_cast::<i16, i64>(-1234), (-1234i64, true));
        assert_eq!(safe_cast::<u32, f64>(7), (7.0f64, true));
    }

    #[test]
    fn narrowing_saturates_high() {
        assert_eq!(safe_cast::<i32, i8>(300), (i8::MAX, false));
        assert_eq!(safe_cast::<u64, u16>(1 << 20), (u16::MAX, false));
    }

    #[test]
    fn narrowing_saturates_low() {
        assert_eq!(safe_cast::<i32, u32>(-5), (0u32, false));
        assert_eq!(safe_cast::<i64, i8>(-300), (i8::MIN, false));
    }

    #[test]
    fn float_to_int_truncates() {
        assert_eq!(safe_cast::<f32, i32>(3.9), (3i32, true));
        assert_eq!(safe_cast::<f64, u8>(255.0), (255u8, true));
        assert_eq!(safe_cast::<f64, u8>(256.0), (u8::MAX, false));
    }

    #[test]
    fn signed_unsigned_boundaries() {
        assert_eq!(safe_cast::<u32, i32>(u32::MAX), (i32::MAX, false));
        assert_eq!(safe_cast::<u32, i32>(42), (42i32, true));
    }
}
