//! Reference scalar kernels.

use super::{Kernels, Tensor};

/// Plain loops in natural summation order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarKernels;

impl Kernels for ScalarKernels {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn dot(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        let mut total = 0.0;
        for (x, y) in a.iter().zip(b) {
            total += x * y;
        }
        total
    }

    fn axpy(&self, alpha: f32, x: &[f32], y: &mut [f32]) {
        debug_assert_eq!(x.len(), y.len());
        for (y, x) in y.iter_mut().zip(x) {
            *y += alpha * x;
        }
    }

    fn matvec_unchecked(&self, out: &mut [f32], a: &Tensor, x: &[f32]) {
        for (r, slot) in out.iter_mut().enumerate() {
            *slot = self.dot(a.row(r), x);
        }
    }

    fn matmul_unchecked(&self, c: &mut Tensor, a: &Tensor, b: &Tensor) {
        c.zero();
        for i in 0..a.rows() {
            for j in 0..b.cols() {
                let mut total = 0.0;
                for k in 0..a.cols() {
                    total += a.get(i, k) * b.get(k, j);
                }
                c.set(i, j, total);
            }
        }
    }
}
