//! Numeric kernels.
//!
//! Two interchangeable implementations sit behind the [`Kernels`] trait:
//! - **Scalar**: straightforward reference loops
//! - **Lanes**: 8-wide chunked loops the compiler turns into SIMD
//!
//! One is picked at startup with [`select_kernels`]; nothing downstream
//! branches on the platform. Elementwise operations share one definition, so
//! only reductions differ between the two, and those agree within
//! [`KERNEL_EPSILON`].

mod guard;
mod lanes;
mod scalar;
mod tensor;

pub use guard::*;
pub use lanes::LaneKernels;
pub use scalar::ScalarKernels;
pub use tensor::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{expect_len, NeuralResult};

/// Relative tolerance between scalar and lane reductions.
pub const KERNEL_EPSILON: f32 = 1e-4;

/// Numeric kernel strategy.
///
/// Implementations never allocate. Output buffers are fully overwritten, and
/// Rust's borrow rules already forbid an output aliasing an input.
pub trait Kernels: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn dot(&self, a: &[f32], b: &[f32]) -> f32;

    /// `y += alpha * x`
    fn axpy(&self, alpha: f32, x: &[f32], y: &mut [f32]);

    /// `out = a · x` without shape checks.
    fn matvec_unchecked(&self, out: &mut [f32], a: &Tensor, x: &[f32]);

    /// `c = a · b` without shape checks.
    fn matmul_unchecked(&self, c: &mut Tensor, a: &Tensor, b: &Tensor);

    fn sum(&self, x: &[f32]) -> f32 {
        x.iter().sum()
    }

    /// `out = a · x`; requires `out.len() == a.rows()` and `x.len() == a.cols()`.
    fn matvec(&self, out: &mut [f32], a: &Tensor, x: &[f32]) -> NeuralResult<()> {
        expect_len("matvec input", a.cols(), x.len())?;
        expect_len("matvec output", a.rows(), out.len())?;
        self.matvec_unchecked(out, a, x);
        Ok(())
    }

    /// `c = a · b`; requires `a.cols() == b.rows()` and a `c` of shape
    /// `a.rows() x b.cols()`. Every element of `c` is overwritten.
    fn matmul(&self, c: &mut Tensor, a: &Tensor, b: &Tensor) -> NeuralResult<()> {
        expect_len("matmul inner", a.cols(), b.rows())?;
        expect_len("matmul rows", a.rows(), c.rows())?;
        expect_len("matmul cols", b.cols(), c.cols())?;
        self.matmul_unchecked(c, a, b);
        Ok(())
    }

    fn norm(&self, x: &[f32]) -> f32 {
        self.dot(x, x).sqrt()
    }

    /// Cosine similarity in [-1, 1]; zero when either side has no length.
    fn cosine_similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        let denom = self.norm(a) * self.norm(b);
        if denom < 1e-12 {
            return 0.0;
        }
        (self.dot(a, b) / denom).clamp(-1.0, 1.0)
    }

    fn scale(&self, x: &mut [f32], alpha: f32) {
        for v in x {
            *v *= alpha;
        }
    }

    fn add_assign(&self, y: &mut [f32], x: &[f32]) {
        for (y, x) in y.iter_mut().zip(x) {
            *y += x;
        }
    }

    fn hadamard(&self, y: &mut [f32], x: &[f32]) {
        for (y, x) in y.iter_mut().zip(x) {
            *y *= x;
        }
    }

    /// Logistic squashing into (0, 1), in place.
    fn sigmoid(&self, x: &mut [f32]) {
        for v in x {
            *v = sigmoid(*v);
        }
    }

    /// Hyperbolic tangent into (-1, 1), in place.
    fn tanh(&self, x: &mut [f32]) {
        for v in x {
            *v = v.tanh();
        }
    }

    fn relu(&self, x: &mut [f32]) {
        for v in x {
            *v = v.max(0.0);
        }
    }

    /// Max-subtracted softmax, in place. Output sums to 1 within 1e-4.
    fn softmax(&self, x: &mut [f32]) {
        if x.is_empty() {
            return;
        }
        let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut total = 0.0;
        for v in x.iter_mut() {
            *v = (*v - max).exp();
            total += *v;
        }
        if !(total > 0.0) || !total.is_finite() {
            x.fill(1.0 / x.len() as f32);
            return;
        }
        let inv = 1.0 / total;
        for v in x {
            *v *= inv;
        }
    }
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Kernel implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KernelBackend {
    /// Lanes when the CPU has wide vectors, scalar otherwise.
    #[default]
    Auto,
    Scalar,
    Lanes,
}

static SCALAR: ScalarKernels = ScalarKernels;
static LANE: LaneKernels = LaneKernels;

/// Whether the CPU has vector units worth targeting.
#[cfg(target_arch = "x86_64")]
pub fn lanes_supported() -> bool {
    std::is_x86_feature_detected!("avx2")
}

#[cfg(target_arch = "aarch64")]
pub fn lanes_supported() -> bool {
    std::arch::is_aarch64_feature_detected!("neon")
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub fn lanes_supported() -> bool {
    false
}

/// Resolve a backend choice to a kernel implementation.
pub fn select_kernels(backend: KernelBackend) -> &'static dyn Kernels {
    let kernels: &'static dyn Kernels = match backend {
        KernelBackend::Auto => {
            if lanes_supported() {
                &LANE
            } else {
                tracing::warn!("No wide vector unit detected, falling back to scalar kernels");
                &SCALAR
            }
        }
        KernelBackend::Scalar => &SCALAR,
        KernelBackend::Lanes => &LANE,
    };
    tracing::info!(backend = ?backend, kernels = kernels.name(), "Selected numeric kernels");
    kernels
}

/// Whether two reductions agree within [`KERNEL_EPSILON`].
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= KERNEL_EPSILON * a.abs().max(b.abs()).max(1.0)
}
