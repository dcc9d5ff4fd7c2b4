//! Named easing curves for transform tweens.

use crate::error::{FramemixError, Result};

/// An easing curve mapping normalized time `[0, 1]` to a normalized
/// progress factor `[0, 1]`.
///
/// Curves are looked up by string identifier at the transform-control
/// surface; unknown names fail with
/// [`InvalidEasing`](FramemixError::InvalidEasing) at the call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Easing {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
}

impl Default for Easing {
    fn default() -> Self {
        Self::Linear
    }
}

impl Easing {
    /// Resolves an easing identifier such as `"linear"` or `"in-out-quad"`.
    ///
    /// Identifiers are case-insensitive and separators (`-`, `_`) are
    /// ignored, so `"InOutQuad"` and `"in_out_quad"` name the same curve.
    pub fn from_name(name: &str) -> Result<Self> {
        let key: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "linear" => Ok(Self::Linear),
            "inquad" => Ok(Self::InQuad),
            "outquad" => Ok(Self::OutQuad),
            "inoutquad" => Ok(Self::InOutQuad),
            "incubic" => Ok(Self::InCubic),
            "outcubic" => Ok(Self::OutCubic),
            "inoutcubic" => Ok(Self::InOutCubic),
            _ => Err(FramemixError::InvalidEasing(name.to_string())),
        }
    }

    /// Applies the curve to a normalized time.
    ///
    /// Guaranteed exact at the endpoints: `apply(0.0) == 0.0` and
    /// `apply(1.0) == 1.0`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 7] = [
        Easing::Linear,
        Easing::InQuad,
        Easing::OutQuad,
        Easing::InOutQuad,
        Easing::InCubic,
        Easing::OutCubic,
        Easing::InOutCubic,
    ];

    #[test]
    fn endpoints_are_exact() {
        for easing in ALL {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
        }
    }

    #[test]
    fn curves_are_monotonic() {
        for easing in ALL {
            let mut prev = easing.apply(0.0);
            for i in 1..=100 {
                let next = easing.apply(i as f64 / 100.0);
                assert!(next >= prev, "{easing:?} regressed at step {i}");
                prev = next;
            }
        }
    }

    #[test]
    fn lookup_normalizes_separators_and_case() {
        assert_eq!(Easing::from_name("linear").unwrap(), Easing::Linear);
        assert_eq!(Easing::from_name("in-out-quad").unwrap(), Easing::InOutQuad);
        assert_eq!(Easing::from_name("InOutCubic").unwrap(), Easing::InOutCubic);
        assert_eq!(Easing::from_name("out_quad").unwrap(), Easing::OutQuad);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = Easing::from_name("bounce").unwrap_err();
        assert!(matches!(err, FramemixError::InvalidEasing(name) if name == "bounce"));
    }
}
