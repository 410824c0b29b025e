use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-point currency amount with four decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(pub i64);

impl Money {
    pub const SCALE: i64 = 10_000; // 4 decimal places
    pub const TARGET_DECIMALS: u32 = 4;
    pub const ZERO: Money = Money(0);

    /// Whole currency units, e.g. `Money::from_major(100)` is `100.0000`.
    pub fn from_major(units: i64) -> Self {
        Self(units.saturating_mul(Self::SCALE))
    }

    pub fn as_minor(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn checked_neg(self) -> Option<Money> {
        self.0.checked_neg().map(Money)
    }

    pub fn abs(self) -> Money {
        Money(self.0.saturating_abs())
    }

    pub fn from_scaled_i128(value: i128, scale: u32) -> Option<Self> {
        let fits = |v: i128| v >= i128::from(i64::MIN) && v <= i128::from(i64::MAX);

        if scale == Self::TARGET_DECIMALS {
            return fits(value).then(|| Self(value as i64));
        }
        if scale < Self::TARGET_DECIMALS {
            let factor = 10i128.pow(Self::TARGET_DECIMALS - scale);
            let widened = value.checked_mul(factor)?;
            return fits(widened).then(|| Self(widened as i64));
        }

        // scale > TARGET_DECIMALS: round half to even
        let factor = 10i128.checked_pow(scale - Self::TARGET_DECIMALS)?;
        let div = value / factor;
        let rem = value % factor;
        let half = factor / 2;
        let step = if value.is_negative() { -1 } else { 1 };
        let abs_rem = rem.abs();

        let adjusted = if abs_rem > half || (abs_rem == half && rem != 0 && div & 1 != 0) {
            div + step
        } else {
            div
        };
        fits(adjusted).then(|| Self(adjusted as i64))
    }

    pub fn from_decimal_str(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let neg = s.starts_with('-');
        let body = s.trim_start_matches('-');
        let mut parts = body.split('.');
        let int_part = parts.next()?;
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let int_val: i128 = int_part.parse().ok()?;
        let frac_opt = parts.next();
        if parts.next().is_some() {
            return None;
        }

        let (raw, scale) = match frac_opt {
            Some(frac) if !frac.is_empty() => {
                if !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let scale = u32::try_from(frac.len()).ok()?;
                let widened = int_val.checked_mul(10i128.checked_pow(scale)?)?;
                (widened.checked_add(frac.parse::<i128>().ok()?)?, scale)
            }
            _ => (int_val, 0),
        };

        let signed = if neg { -raw } else { raw };
        Money::from_scaled_i128(signed, scale)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let minor = self.0;
        let abs = minor.unsigned_abs();
        let scale = Self::SCALE as u64;
        let sign = if minor < 0 { "-" } else { "" };
        write!(f, "{}{}.{:04}", sign, abs / scale, abs % scale)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // JSON numbers arrive as their literal text, never through f64.
        let exact = rust_decimal::serde::arbitrary_precision::deserialize(deserializer)?;
        Money::from_scaled_i128(exact.mantissa(), exact.scale())
            .ok_or_else(|| serde::de::Error::custom(format!("Money out of range: {}", exact)))
    }
}

#[cfg(test)]
mod tests {
    use super::Money;

    #[test]
    fn bankers_round_half_even() {
        let v = Money::from_scaled_i128(1_23445, 5).unwrap(); // 1.23445 -> 1.2344
        assert_eq!(format!("{}", v), "1.2344");
        let v = Money::from_scaled_i128(1_23455, 5).unwrap(); // 1.23455 -> 1.2346
        assert_eq!(format!("{}", v), "1.2346");
        let v = Money::from_scaled_i128(-1_23445, 5).unwrap();
        assert_eq!(format!("{}", v), "-1.2344");
        let v = Money::from_scaled_i128(-1_23455, 5).unwrap();
        assert_eq!(format!("{}", v), "-1.2346");
    }

    #[test]
    fn parses_plain_and_fractional_amounts() {
        assert_eq!(Money::from_decimal_str("150"), Some(Money::from_major(150)));
        assert_eq!(Money::from_decimal_str(" 2.5 "), Some(Money(25_000)));
        assert_eq!(Money::from_decimal_str("-0.0001"), Some(Money(-1)));
        assert_eq!(Money::from_decimal_str("1."), Some(Money::from_major(1)));
        assert_eq!(Money::from_decimal_str(""), None);
        assert_eq!(Money::from_decimal_str("1.2.3"), None);
        assert_eq!(Money::from_decimal_str("1.x"), None);
        assert_eq!(Money::from_decimal_str("+5"), None);
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        let v: Vec<Money> = serde_json::from_str(r#"[10, "2.25", -3.5]"#).unwrap();
        assert_eq!(v, vec![Money::from_major(10), Money(22_500), Money(-35_000)]);
    }

    #[test]
    fn json_numbers_keep_every_digit() {
        let v: Money = serde_json::from_str("900000000000000.0001").unwrap();
        assert_eq!(v, Money(9_000_000_000_000_000_001));
        let v: Money = serde_json::from_str(r#""900000000000000.0001""#).unwrap();
        assert_eq!(v, Money(9_000_000_000_000_000_001));
        assert!(serde_json::from_str::<Money>("922337203685477.5808").is_err());
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        assert_eq!(Money(i64::MAX).checked_add(Money(1)), None);
        assert_eq!(
            Money::from_major(5).checked_sub(Money::from_major(7)),
            Some(Money::from_major(-2))
        );
    }
}
