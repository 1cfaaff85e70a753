//! Lane-chunked kernels.
//!
//! Reductions keep eight independent partial sums, one per lane, and fold
//! them at the end. That is what lets the optimizer emit packed multiply-adds,
//! and it is also why results differ from the scalar kernels in the last bits.

use super::{Kernels, Tensor, LANES};

#[derive(Debug, Clone, Copy, Default)]
pub struct LaneKernels;

#[inline]
fn fold(acc: [f32; LANES]) -> f32 {
    ((acc[0] + acc[4]) + (acc[1] + acc[5])) + ((acc[2] + acc[6]) + (acc[3] + acc[7]))
}

impl Kernels for LaneKernels {
    fn name(&self) -> &'static str {
        "lanes"
    }

    fn dot(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        let len = a.len().min(b.len());
        let (a, b) = (&a[..len], &b[..len]);
        let mut acc = [0.0f32; LANES];
        let chunks_a = a.chunks_exact(LANES);
        let chunks_b = b.chunks_exact(LANES);
        let tail = chunks_a
            .remainder()
            .iter()
            .zip(chunks_b.remainder())
            .map(|(x, y)| x * y)
            .sum::<f32>();
        for (ca, cb) in chunks_a.zip(chunks_b) {
            for lane in 0..LANES {
                acc[lane] += ca[lane] * cb[lane];
            }
        }
        fold(acc) + tail
    }

    fn sum(&self, x: &[f32]) -> f32 {
        let mut acc = [0.0f32; LANES];
        let chunks = x.chunks_exact(LANES);
        let tail: f32 = chunks.remainder().iter().sum();
        for chunk in chunks {
            for lane in 0..LANES {
                acc[lane] += chunk[lane];
            }
        }
        fold(acc) + tail
    }

    fn axpy(&self, alpha: f32, x: &[f32], y: &mut [f32]) {
        debug_assert_eq!(x.len(), y.len());
        let len = x.len().min(y.len());
        let (x, y) = (&x[..len], &mut y[..len]);
        let mut cy = y.chunks_exact_mut(LANES);
        let mut cx = x.chunks_exact(LANES);
        for (yc, xc) in (&mut cy).zip(&mut cx) {
            for lane in 0..LANES {
                yc[lane] += alpha * xc[lane];
            }
        }
        for (yv, xv) in cy.into_remainder().iter_mut().zip(cx.remainder()) {
            *yv += alpha * xv;
        }
    }

    fn matvec_unchecked(&self, out: &mut [f32], a: &Tensor, x: &[f32]) {
        for (r, slot) in out.iter_mut().enumerate() {
            *slot = self.dot(a.row(r), x);
        }
    }

    fn matmul_unchecked(&self, c: &mut Tensor, a: &Tensor, b: &Tensor) {
        // i-k-j order: each output row accumulates scaled rows of `b`.
        c.zero();
        for i in 0..a.rows() {
            for k in 0..a.cols() {
                // No zero skip: 0 × NaN must stay NaN as on the scalar path.
                self.axpy(a.get(i, k), b.row(k), c.row_mut(i));
            }
        }
    }
}
