//! NaN/Inf validation hooks.

use serde::{Deserialize, Serialize};

use crate::error::{NeuralError, NeuralResult};

/// Magnitude infinities are clamped to when sanitizing.
pub const SANITIZE_LIMIT: f32 = 1.0e6;

/// Response to a non-finite value in a kernel output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericPolicy {
    /// Abort with the offending call site. Default in debug builds.
    Panic,
    /// Replace NaN with zero and clamp infinities. Default in release builds.
    Sanitize,
}

impl Default for NumericPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            NumericPolicy::Panic
        } else {
            NumericPolicy::Sanitize
        }
    }
}

/// Applies a [`NumericPolicy`] to freshly computed buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumericGuard {
    policy: NumericPolicy,
}

impl NumericGuard {
    pub fn new(policy: NumericPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> NumericPolicy {
        self.policy
    }

    /// Validate `values`, returning how many were replaced.
    ///
    /// # Panics
    ///
    /// Under [`NumericPolicy::Panic`] when any value is NaN or infinite.
    pub fn check(&self, site: &'static str, values: &mut [f32]) -> usize {
        if values.iter().all(|v| v.is_finite()) {
            return 0;
        }
        match self.policy {
            NumericPolicy::Panic => panic!("non-finite value in {site}"),
            NumericPolicy::Sanitize => {
                let replaced = sanitize(values);
                tracing::warn!(site, replaced, "Sanitized non-finite kernel output");
                replaced
            }
        }
    }

    /// Report non-finite values as an error without touching them.
    pub fn verify(&self, site: &'static str, values: &[f32]) -> NeuralResult<()> {
        if values.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(NeuralError::NonFinite { site })
        }
    }
}

/// Replace NaN with 0 and clamp infinities to ±[`SANITIZE_LIMIT`].
pub fn sanitize(values: &mut [f32]) -> usize {
    let mut replaced = 0;
    for v in values {
        if v.is_nan() {
            *v = 0.0;
            replaced += 1;
        } else if v.is_infinite() {
            *v = SANITIZE_LIMIT.copysign(*v);
            replaced += 1;
        }
    }
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        let mut values = [1.0, f32::NAN, f32::INFINITY, f32::NEG_INFINITY];
        assert_eq!(sanitize(&mut values), 3);
        assert_eq!(values, [1.0, 0.0, SANITIZE_LIMIT, -SANITIZE_LIMIT]);
    }

    #[test]
    fn test_sanitize_policy_repairs() {
        let guard = NumericGuard::new(NumericPolicy::Sanitize);
        let mut values = [0.5, f32::NAN];
        assert_eq!(guard.check("test", &mut values), 1);
        assert_eq!(values, [0.5, 0.0]);
        assert_eq!(guard.check("test", &mut values), 0);
    }

    #[test]
    #[should_panic(expected = "non-finite value in lstm")]
    fn test_panic_policy_aborts() {
        let guard = NumericGuard::new(NumericPolicy::Panic);
        let mut values = [f32::NAN];
        guard.check("lstm", &mut values);
    }

    #[test]
    fn test_verify_reports_site() {
        let guard = NumericGuard::default();
        assert!(guard.verify("ok", &[1.0]).is_ok());
        assert!(matches!(
            guard.verify("softmax", &[f32::INFINITY]),
            Err(NeuralError::NonFinite { site: "softmax" })
        ));
    }
}
