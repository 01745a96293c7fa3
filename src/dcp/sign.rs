//! Sign tracking for DCP (Disciplined Convex Programming).
//!
//! This module tracks whether expressions are non-negative, non-positive,
//! or have unknown sign. Sign information is used in DCP composition rules.

use std::fmt;

use serde::Serialize;

/// Sign of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    /// Expression is always >= 0.
    Nonnegative,
    /// Expression is always <= 0.
    Nonpositive,
    /// Expression is always == 0.
    Zero,
    /// Sign is unknown.
    Unknown,
}

impl Sign {
    /// Check if the sign is non-negative (>= 0).
    pub fn is_nonneg(self) -> bool {
        matches!(self, Sign::Nonnegative | Sign::Zero)
    }

    /// Check if the sign is non-positive (<= 0).
    pub fn is_nonpos(self) -> bool {
        matches!(self, Sign::Nonpositive | Sign::Zero)
    }

    /// Check if the sign is zero.
    pub fn is_zero(self) -> bool {
        matches!(self, Sign::Zero)
    }

    /// Negate the sign.
    pub fn negate(self) -> Self {
        match self {
            Sign::Nonnegative => Sign::Nonpositive,
            Sign::Nonpositive => Sign::Nonnegative,
            other => other,
        }
    }

    /// Sign of a single number.
    pub fn of_value(v: f64) -> Self {
        if v == 0.0 {
            Sign::Zero
        } else if v > 0.0 {
            Sign::Nonnegative
        } else if v < 0.0 {
            Sign::Nonpositive
        } else {
            Sign::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sign::Nonnegative => "nonnegative",
            Sign::Nonpositive => "nonpositive",
            Sign::Zero => "zero",
            Sign::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combine signs for addition: a + b.
pub fn add_sign(a: Sign, b: Sign) -> Sign {
    use Sign::*;
    match (a, b) {
        // Zero doesn't change sign
        (Zero, x) | (x, Zero) => x,
        (Nonnegative, Nonnegative) => Nonnegative,
        (Nonpositive, Nonpositive) => Nonpositive,
        (Nonnegative, Nonpositive) | (Nonpositive, Nonnegative) => Unknown,
        (Unknown, _) | (_, Unknown) => Unknown,
    }
}

/// Combine signs for multiplication: a * b.
pub fn mul_sign(a: Sign, b: Sign) -> Sign {
    use Sign::*;
    match (a, b) {
        (Zero, _) | (_, Zero) => Zero,
        (Nonnegative, Nonnegative) | (Nonpositive, Nonpositive) => Nonnegative,
        (Nonnegative, Nonpositive) | (Nonpositive, Nonnegative) => Nonpositive,
        (Unknown, _) | (_, Unknown) => Unknown,
    }
}

/// Common sign of stacked or concatenated parts.
pub fn combine_signs(signs: impl IntoIterator<Item = Sign>) -> Sign {
    let mut all_nonneg = true;
    let mut all_nonpos = true;
    let mut all_zero = true;

    for s in signs {
        all_nonneg &= s.is_nonneg();
        all_nonpos &= s.is_nonpos();
        all_zero &= s.is_zero();
    }

    if all_zero {
        Sign::Zero
    } else if all_nonneg {
        Sign::Nonnegative
    } else if all_nonpos {
        Sign::Nonpositive
    } else {
        Sign::Unknown
    }
}

/// Sign of an elementwise maximum.
pub fn max_sign(signs: &[Sign]) -> Sign {
    if signs.iter().all(|s| s.is_zero()) {
        Sign::Zero
    } else if signs.iter().any(|s| s.is_nonneg()) {
        Sign::Nonnegative
    } else if signs.iter().all(|s| s.is_nonpos()) {
        Sign::Nonpositive
    } else {
        Sign::Unknown
    }
}

/// Sign of an elementwise minimum.
pub fn min_sign(signs: &[Sign]) -> Sign {
    if signs.iter().all(|s| s.is_zero()) {
        Sign::Zero
    } else if signs.iter().any(|s| s.is_nonpos()) {
        Sign::Nonpositive
    } else if signs.iter().all(|s| s.is_nonneg()) {
        Sign::Nonnegative
    } else {
        Sign::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_basics() {
        assert!(Sign::Nonnegative.is_nonneg());
        assert!(!Sign::Nonnegative.is_nonpos());

        assert!(!Sign::Nonpositive.is_nonneg());
        assert!(Sign::Nonpositive.is_nonpos());

        assert!(Sign::Zero.is_nonneg());
        assert!(Sign::Zero.is_nonpos());
        assert!(Sign::Zero.is_zero());
    }

    #[test]
    fn test_negate_sign() {
        assert_eq!(Sign::Nonnegative.negate(), Sign::Nonpositive);
        assert_eq!(Sign::Nonpositive.negate(), Sign::Nonnegative);
        assert_eq!(Sign::Zero.negate(), Sign::Zero);
        assert_eq!(Sign::Unknown.negate(), Sign::Unknown);
    }

    #[test]
    fn test_add_sign() {
        use Sign::*;
        assert_eq!(add_sign(Nonnegative, Nonnegative), Nonnegative);
        assert_eq!(add_sign(Nonpositive, Nonpositive), Nonpositive);
        assert_eq!(add_sign(Nonnegative, Nonpositive), Unknown);
        assert_eq!(add_sign(Zero, Nonnegative), Nonnegative);
        assert_eq!(add_sign(Zero, Unknown), Unknown);
    }

    #[test]
    fn test_mul_sign() {
        use Sign::*;
        assert_eq!(mul_sign(Nonnegative, Nonnegative), Nonnegative);
        assert_eq!(mul_sign(Nonpositive, Nonpositive), Nonnegative);
        assert_eq!(mul_sign(Nonnegative, Nonpositive), Nonpositive);
        assert_eq!(mul_sign(Zero, Unknown), Zero);
        assert_eq!(mul_sign(Unknown, Nonnegative), Unknown);
    }

    #[test]
    fn test_value_sign() {
        assert_eq!(Sign::of_value(5.0), Sign::Nonnegative);
        assert_eq!(Sign::of_value(-5.0), Sign::Nonpositive);
        assert_eq!(Sign::of_value(0.0), Sign::Zero);
        assert_eq!(Sign::of_value(f64::NAN), Sign::Unknown);
    }

    #[test]
    fn test_stack_and_extrema_signs() {
        use Sign::*;
        assert_eq!(combine_signs([Zero, Nonnegative]), Nonnegative);
        assert_eq!(combine_signs([Nonpositive, Nonnegative]), Unknown);
        assert_eq!(combine_signs([Zero, Zero]), Zero);
        assert_eq!(max_sign(&[Unknown, Nonnegative]), Nonnegative);
        assert_eq!(max_sign(&[Nonpositive, Zero]), Nonpositive);
        assert_eq!(min_sign(&[Unknown, Nonpositive]), Nonpositive);
        assert_eq!(min_sign(&[Unknown, Nonnegative]), Unknown);
    }
}
