use serde::{Deserialize, Serialize};

use crate::math::Matrix;

/// N-dimensional tensor backed by a flat `Vec<f32>`.
///
/// Used for single decoded samples (`[3, s, s]`) and for named entries of
/// a model state dict. Batched computation happens on [`Matrix`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Tensor elements in row-major order.
    pub data: Vec<f32>,
    /// Sizes for each dimension.
    pub shape: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor from raw parts.  The number of elements in `data`
    /// must match the product of the requested `shape`.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        assert_eq!(data.len(), shape.iter().product::<usize>());
        Tensor { data, shape }
    }

    /// Take ownership of a [`Matrix`] while recording its two dimensional
    /// shape.
    pub fn from_matrix(m: Matrix) -> Self {
        Tensor {
            shape: vec![m.rows, m.cols],
            data: m.data,
        }
    }

    /// Compute the flat index for a multi-dimensional coordinate.
    fn offset(&self, idx: &[usize]) -> usize {
        assert_eq!(idx.len(), self.shape.len());
        let mut stride = 1;
        let mut off = 0usize;
        for (i, &dim) in self.shape.iter().rev().enumerate() {
            let id = idx[self.shape.len() - 1 - i];
            assert!(id < dim, "index out of bounds");
            off += id * stride;
            stride *= dim;
        }
        off
    }

    pub fn get(&self, idx: &[usize]) -> f32 {
        let off = self.offset(idx);
        self.data[off]
    }

    pub fn set(&mut self, idx: &[usize], value: f32) {
        let off = self.offset(idx);
        self.data[off] = value;
    }

    /// Change the view of the underlying data without modifying order.
    pub fn reshape(&mut self, new_shape: Vec<usize>) {
        assert_eq!(self.data.len(), new_shape.iter().product::<usize>());
        self.shape = new_shape;
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len: usize = shape.iter().product();
        Tensor {
            data: vec![0.0; len],
            shape,
        }
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Smallest and largest element, `None` for an empty tensor.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut it = self.data.iter().copied();
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_is_row_major() {
        let mut t = Tensor::zeros(vec![3, 2, 2]);
        t.set(&[1, 0, 1], 5.0);
        assert_eq!(t.data[5], 5.0);
        assert_eq!(t.get(&[1, 0, 1]), 5.0);
    }

    #[test]
    fn min_max_of_empty_is_none() {
        assert!(Tensor::zeros(vec![0]).min_max().is_none());
        let t = Tensor::new(vec![-1.0, 0.5, 1.0], vec![3]);
        assert_eq!(t.min_max(), Some((-1.0, 1.0)));
    }
}
