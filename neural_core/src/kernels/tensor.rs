//! Lane-padded tensors and the per-agent budget they are allocated against.

use crate::error::{NeuralError, NeuralResult};

/// Vector width every row stride is padded to.
pub const LANES: usize = 8;

/// Round a row length up to a whole number of lanes.
pub fn padded_stride(cols: usize) -> usize {
    cols.div_ceil(LANES) * LANES
}

/// Row-major matrix (or a vector when `rows == 1`) with lane-padded rows.
///
/// Padding floats are always zero, so whole-row kernels may read them freely.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    rows: usize,
    cols: usize,
    stride: usize,
    data: Vec<f32>,
}

impl Tensor {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        let stride = padded_stride(cols);
        Self {
            rows,
            cols,
            stride,
            data: vec![0.0; rows * stride],
        }
    }

    pub fn vector(len: usize) -> Self {
        Self::zeros(1, len)
    }

    /// Build from densely packed row-major values.
    pub fn from_rows(rows: usize, cols: usize, values: &[f32]) -> NeuralResult<Self> {
        if values.len() != rows * cols {
            return Err(NeuralError::dimension("tensor init", rows * cols, values.len()));
        }
        let mut tensor = Self::zeros(rows, cols);
        if cols > 0 {
            for (r, chunk) in values.chunks_exact(cols).enumerate() {
                tensor.row_mut(r).copy_from_slice(chunk);
            }
        }
        Ok(tensor)
    }

    pub fn from_vector(values: &[f32]) -> Self {
        let mut tensor = Self::vector(values.len());
        tensor.values_mut().copy_from_slice(values);
        tensor
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Logical element count, excluding padding.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Floats actually reserved, including padding.
    pub fn footprint(&self) -> usize {
        self.data.len()
    }

    pub fn row(&self, r: usize) -> &[f32] {
        let start = r * self.stride;
        &self.data[start..start + self.cols]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f32] {
        let start = r * self.stride;
        &mut self.data[start..start + self.cols]
    }

    /// Row including its zero padding.
    pub fn padded_row(&self, r: usize) -> &[f32] {
        let start = r * self.stride;
        &self.data[start..start + self.stride]
    }

    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.stride + c]
    }

    pub fn set(&mut self, r: usize, c: usize, value: f32) {
        self.data[r * self.stride + c] = value;
    }

    /// First row; the whole tensor for vectors.
    pub fn values(&self) -> &[f32] {
        &self.data[..self.cols.min(self.data.len())]
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        let end = self.cols.min(self.data.len());
        &mut self.data[..end]
    }

    pub fn fill(&mut self, value: f32) {
        for r in 0..self.rows {
            self.row_mut(r).fill(value);
        }
    }

    pub fn zero(&mut self) {
        self.data.fill(0.0);
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Iterate rows without padding.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.rows).map(move |r| self.row(r))
    }
}

/// Float budget for everything one agent allocates at spawn.
///
/// The arena is bookkeeping, not a shared block: each tensor it hands out
/// owns its own buffer, allocated once here and charged at its padded
/// footprint. Nothing is ever given back, so the budget bounds an agent's
/// tensor memory for its whole life and ticks never allocate tensors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorArena {
    capacity: usize,
    used: usize,
    allocations: usize,
}

impl TensorArena {
    pub fn new(capacity_floats: usize) -> Self {
        Self {
            capacity: capacity_floats,
            used: 0,
            allocations: 0,
        }
    }

    pub fn alloc_matrix(&mut self, rows: usize, cols: usize) -> NeuralResult<Tensor> {
        let need = rows * padded_stride(cols);
        if self.used + need > self.capacity {
            return Err(NeuralError::exhausted("tensor arena", self.capacity));
        }
        self.used += need;
        self.allocations += 1;
        Ok(Tensor::zeros(rows, cols))
    }

    pub fn alloc_vector(&mut self, len: usize) -> NeuralResult<Tensor> {
        self.alloc_matrix(1, len)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.used
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_padding() {
        assert_eq!(padded_stride(0), 0);
        assert_eq!(padded_stride(1), 8);
        assert_eq!(padded_stride(8), 8);
        assert_eq!(padded_stride(9), 16);

        let t = Tensor::zeros(3, 5);
        assert_eq!(t.stride(), 8);
        assert_eq!(t.footprint(), 24);
        assert_eq!(t.len(), 15);
    }

    #[test]
    fn test_from_rows_keeps_padding_zero() {
        let t = Tensor::from_rows(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(t.row(1), &[4.0, 5.0, 6.0]);
        assert_eq!(t.get(0, 2), 3.0);
        assert!(t.padded_row(0)[3..].iter().all(|v| *v == 0.0));
        assert!(Tensor::from_rows(2, 3, &[1.0]).is_err());
    }

    #[test]
    fn test_fill_leaves_padding() {
        let mut t = Tensor::zeros(2, 3);
        t.fill(2.0);
        assert_eq!(t.row(0), &[2.0, 2.0, 2.0]);
        assert!(t.padded_row(1)[3..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_arena_budget() {
        let mut arena = TensorArena::new(32);
        let v = arena.alloc_vector(10).unwrap();
        assert_eq!(v.cols(), 10);
        assert_eq!(arena.used(), 16);
        let _m = arena.alloc_matrix(2, 8).unwrap();
        assert_eq!(arena.remaining(), 0);
        let err = arena.alloc_vector(1).unwrap_err();
        assert!(matches!(err, NeuralError::PoolExhausted { capacity: 32, .. }));
        assert_eq!(arena.allocations(), 2);
    }

    #[test]
    fn test_arena_charges_padded_footprint() {
        let mut arena = TensorArena::new(1024);
        let tensors = [
            arena.alloc_matrix(3, 5).unwrap(),
            arena.alloc_vector(17).unwrap(),
            arena.alloc_matrix(0, 4).unwrap(),
        ];
        let footprint: usize = tensors.iter().map(Tensor::footprint).sum();
        assert_eq!(arena.used(), footprint);
        assert_eq!(footprint, 24 + 24);
    }
}
