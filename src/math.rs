use std::sync::atomic::{AtomicUsize, Ordering};

static MATRIX_OPS: AtomicUsize = AtomicUsize::new(0);

pub fn reset_matrix_ops() {
    MATRIX_OPS.store(0, Ordering::SeqCst);
}

pub fn matrix_ops_count() -> usize {
    MATRIX_OPS.load(Ordering::SeqCst)
}

pub(crate) fn inc_ops() {
    MATRIX_OPS.fetch_add(1, Ordering::SeqCst);
}

/// Dense row-major `f32` matrix. Batches are stored one sample per row.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(r: usize, c: usize) -> Self {
        Matrix {
            rows: r,
            cols: c,
            data: vec![0.0; r * c],
        }
    }

    pub fn from_vec(r: usize, c: usize, v: Vec<f32>) -> Self {
        assert_eq!(v.len(), r * c);
        Matrix {
            rows: r,
            cols: c,
            data: v,
        }
    }

    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, v: f32) {
        self.data[r * self.cols + c] = v;
    }

    /// Borrow row `r` as a slice.
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// Copy rows `start..end` into a new matrix.
    pub fn slice_rows(&self, start: usize, end: usize) -> Matrix {
        let end = end.min(self.rows);
        let start = start.min(end);
        Matrix::from_vec(
            end - start,
            self.cols,
            self.data[start * self.cols..end * self.cols].to_vec(),
        )
    }

    pub fn matmul(a: &Matrix, b: &Matrix) -> Matrix {
        inc_ops();
        assert_eq!(a.cols, b.rows);
        let mut out = vec![0.0; a.rows * b.cols];
        for i in 0..a.rows {
            let a_row = &a.data[i * a.cols..(i + 1) * a.cols];
            let out_row = &mut out[i * b.cols..(i + 1) * b.cols];
            for (k, &a_val) in a_row.iter().enumerate() {
                if a_val == 0.0 {
                    continue;
                }
                let b_row = &b.data[k * b.cols..(k + 1) * b.cols];
                for (o, &b_val) in out_row.iter_mut().zip(b_row) {
                    *o += a_val * b_val;
                }
            }
        }
        Matrix::from_vec(a.rows, b.cols, out)
    }

    pub fn add(&self, other: &Matrix) -> Matrix {
        inc_ops();
        assert_eq!(self.rows, other.rows);
        assert_eq!(self.cols, other.cols);
        let v = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a + b)
            .collect();
        Matrix::from_vec(self.rows, self.cols, v)
    }

    /// Add a row vector to every row.
    pub fn add_row_vector(&mut self, v: &[f32]) {
        inc_ops();
        assert_eq!(v.len(), self.cols);
        for row in self.data.chunks_mut(self.cols.max(1)) {
            for (x, &b) in row.iter_mut().zip(v) {
                *x += b;
            }
        }
    }

    /// Sum over rows, returning one value per column.
    pub fn column_sums(&self) -> Vec<f32> {
        inc_ops();
        let mut sums = vec![0.0; self.cols];
        for row in self.data.chunks(self.cols.max(1)) {
            for (s, &x) in sums.iter_mut().zip(row) {
                *s += x;
            }
        }
        sums
    }

    pub fn transpose(&self) -> Matrix {
        inc_ops();
        let mut v = vec![0.0; self.rows * self.cols];
        for i in 0..self.rows {
            for j in 0..self.cols {
                v[j * self.rows + i] = self.get(i, j);
            }
        }
        Matrix::from_vec(self.cols, self.rows, v)
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f32>() / self.data.len() as f32
    }
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Eigen-decomposition of a symmetric `n × n` matrix stored row-major.
///
/// Uses cyclic Jacobi rotations. Returns `(eigenvalues, eigenvectors)` where
/// eigenvector `k` is column `k` of the returned row-major matrix.
pub fn symmetric_eigen(a: &[f64], n: usize) -> (Vec<f64>, Vec<f64>) {
    assert_eq!(a.len(), n * n);
    let mut m = a.to_vec();
    let mut v = vec![0.0f64; n * n];
    for i in 0..n {
        v[i * n + i] = 1.0;
    }

    let scale: f64 = m.iter().map(|x| x * x).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);
    for _sweep in 0..100 {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += m[p * n + q] * m[p * n + q];
            }
        }
        if off.sqrt() <= 1e-12 * scale {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = m[p * n + q];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let app = m[p * n + p];
                let aqq = m[q * n + q];
                let theta = (aqq - app) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let mkp = m[k * n + p];
                    let mkq = m[k * n + q];
                    m[k * n + p] = c * mkp - s * mkq;
                    m[k * n + q] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let mpk = m[p * n + k];
                    let mqk = m[q * n + k];
                    m[p * n + k] = c * mpk - s * mqk;
                    m[q * n + k] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - s * vkq;
                    v[k * n + q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| m[i * n + i]).collect();
    (eigenvalues, v)
}

/// Principal square root of a symmetric positive semi-definite matrix.
/// Negative eigenvalues from round-off are clamped to zero.
pub fn symmetric_sqrt(a: &[f64], n: usize) -> Vec<f64> {
    let (vals, vecs) = symmetric_eigen(a, n);
    let roots: Vec<f64> = vals.iter().map(|&l| l.max(0.0).sqrt()).collect();
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            let mut acc = 0.0;
            for k in 0..n {
                acc += vecs[i * n + k] * roots[k] * vecs[j * n + k];
            }
            out[i * n + j] = acc;
        }
    }
    out
}

/// Row-major product of two `n × n` matrices.
pub fn matmul_f64(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        for k in 0..n {
            let aik = a[i * n + k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..n {
                out[i * n + j] += aik * b[k * n + j];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matmul_small() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let b = Matrix::from_vec(2, 1, vec![1.0, 1.0]);
        let c = Matrix::matmul(&a, &b);
        assert_eq!(c.data, vec![3.0, 7.0]);
    }

    #[test]
    fn column_sums_and_row_vector() {
        let mut m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m.column_sums(), vec![5.0, 7.0, 9.0]);
        m.add_row_vector(&[1.0, 0.0, -1.0]);
        assert_eq!(m.data, vec![2.0, 2.0, 2.0, 5.0, 5.0, 5.0]);
    }

    #[test]
    fn slice_rows_clamps() {
        let m = Matrix::from_vec(3, 1, vec![1.0, 2.0, 3.0]);
        assert_eq!(m.slice_rows(1, 10).data, vec![2.0, 3.0]);
    }

    #[test]
    fn eigen_reconstructs_symmetric_matrix() {
        let a = vec![4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0];
        let (vals, vecs) = symmetric_eigen(&a, 3);
        for i in 0..3 {
            for j in 0..3 {
                let mut acc = 0.0;
                for k in 0..3 {
                    acc += vecs[i * 3 + k] * vals[k] * vecs[j * 3 + k];
                }
                assert!((acc - a[i * 3 + j]).abs() < 1e-9, "{acc} vs {}", a[i * 3 + j]);
            }
        }
    }

    #[test]
    fn sqrt_squares_back() {
        let a = vec![2.0, 0.3, 0.3, 1.0];
        let r = symmetric_sqrt(&a, 2);
        let back = matmul_f64(&r, &r, 2);
        for (x, y) in back.iter().zip(a.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }
}
