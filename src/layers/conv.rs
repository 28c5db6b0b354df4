use rand::Rng;
use thiserror::Error;

use super::layer::Layer;
use super::linear::Linear;
use super::param::Param;
use super::state::StateDict;
use crate::error::Result;
use crate::math::Matrix;

/// 2D convolution layer using im2col and a linear weight matrix.
///
/// Only square inputs are supported. Each input row is one sample laid
/// out as `in_channels × height × width` with `height == width`. The
/// kernel weights are stored in a [`Linear`] of shape
/// `(in_channels·k·k) × out_channels`, so the backward pass and the
/// optimiser see ordinary linear parameters.
pub struct Conv2d {
    pub w: Linear,
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    // Cached shapes from the last forward pass required for backward.
    last_input_shape: (usize, usize, usize), // (batch, in_h, in_w)
    last_output_shape: (usize, usize),       // (out_h, out_w)
}

#[derive(Debug, PartialEq, Error)]
pub enum ConvError {
    #[error("Input feature count {features} is not divisible by in_channels {in_channels}")]
    ChannelMismatch { features: usize, in_channels: usize },
    #[error("Input spatial size {size} is not a perfect square")]
    NonSquareInput { size: usize },
    #[error("Kernel {kernel} does not fit input {input} with padding {padding}")]
    KernelTooLarge {
        kernel: usize,
        input: usize,
        padding: usize,
    },
}

impl Conv2d {
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        rng: &mut R,
    ) -> Self {
        let in_dim = in_channels * kernel_size * kernel_size;
        Self {
            w: Linear::new(in_dim, out_channels, rng),
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            last_input_shape: (0, 0, 0),
            last_output_shape: (0, 0),
        }
    }

    /// Spatial output edge for a square input edge `in_size`.
    pub fn output_size(&self, in_size: usize) -> usize {
        (in_size + 2 * self.padding - self.kernel_size) / self.stride + 1
    }

    fn compute_shapes(
        &self,
        x: &Matrix,
    ) -> std::result::Result<(usize, usize, usize, usize, usize), ConvError> {
        let batch = x.rows;
        if x.cols % self.in_channels != 0 {
            return Err(ConvError::ChannelMismatch {
                features: x.cols,
                in_channels: self.in_channels,
            });
        }
        let in_hw = x.cols / self.in_channels;
        let in_h = (in_hw as f64).sqrt().round() as usize;
        if in_h * in_h != in_hw {
            return Err(ConvError::NonSquareInput { size: in_hw });
        }
        if in_h + 2 * self.padding < self.kernel_size {
            return Err(ConvError::KernelTooLarge {
                kernel: self.kernel_size,
                input: in_h,
                padding: self.padding,
            });
        }
        let in_w = in_h;
        let out_h = self.output_size(in_h);
        let out_w = self.output_size(in_w);
        Ok((batch, in_h, in_w, out_h, out_w))
    }

    /// Source index in `x` for a kernel tap, `None` when it falls in the
    /// zero padding.
    fn tap(
        &self,
        oh: usize,
        ow: usize,
        kh: usize,
        kw: usize,
        in_h: usize,
        in_w: usize,
    ) -> Option<(usize, usize)> {
        let ih = (oh * self.stride + kh) as isize - self.padding as isize;
        let iw = (ow * self.stride + kw) as isize - self.padding as isize;
        if ih >= 0 && ih < in_h as isize && iw >= 0 && iw < in_w as isize {
            Some((ih as usize, iw as usize))
        } else {
            None
        }
    }

    fn im2col(&self, x: &Matrix, in_h: usize, in_w: usize, out_h: usize, out_w: usize) -> Matrix {
        let batch = x.rows;
        let k = self.kernel_size;
        let mut cols = Matrix::zeros(batch * out_h * out_w, self.in_channels * k * k);
        let mut row = 0;
        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    let mut col_idx = 0;
                    for ic in 0..self.in_channels {
                        for kh in 0..k {
                            for kw in 0..k {
                                if let Some((ih, iw)) = self.tap(oh, ow, kh, kw, in_h, in_w) {
                                    let idx = b * x.cols + ic * in_h * in_w + ih * in_w + iw;
                                    cols.set(row, col_idx, x.data[idx]);
                                }
                                col_idx += 1;
                            }
                        }
                    }
                    row += 1;
                }
            }
        }
        cols
    }

    fn col2im(
        &self,
        cols: &Matrix,
        batch: usize,
        in_h: usize,
        in_w: usize,
        out_h: usize,
        out_w: usize,
    ) -> Matrix {
        let k = self.kernel_size;
        let mut img = Matrix::zeros(batch, self.in_channels * in_h * in_w);
        let mut row = 0;
        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    let mut col_idx = 0;
                    for ic in 0..self.in_channels {
                        for kh in 0..k {
                            for kw in 0..k {
                                if let Some((ih, iw)) = self.tap(oh, ow, kh, kw, in_h, in_w) {
                                    let idx = b * img.cols + ic * in_h * in_w + ih * in_w + iw;
                                    img.data[idx] += cols.get(row, col_idx);
                                }
                                col_idx += 1;
                            }
                        }
                    }
                    row += 1;
                }
            }
        }
        img
    }

    fn reshape_output(
        &self,
        out_cols: &Matrix,
        batch: usize,
        out_h: usize,
        out_w: usize,
    ) -> Matrix {
        let mut out = Matrix::zeros(batch, self.out_channels * out_h * out_w);
        let mut row = 0;
        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    for oc in 0..self.out_channels {
                        let idx = oc * out_h * out_w + oh * out_w + ow;
                        out.set(b, idx, out_cols.get(row, oc));
                    }
                    row += 1;
                }
            }
        }
        out
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
}

impl Layer for Conv2d {
    fn forward(&self, x: &Matrix) -> Result<Matrix> {
        let (batch, in_h, in_w, out_h, out_w) = self.compute_shapes(x)?;
        let cols = self.im2col(x, in_h, in_w, out_h, out_w);
        let out_cols = self.w.forward(&cols)?;
        Ok(self.reshape_output(&out_cols, batch, out_h, out_w))
    }

    fn forward_train(&mut self, x: &Matrix) -> Result<Matrix> {
        let (batch, in_h, in_w, out_h, out_w) = self.compute_shapes(x)?;
        let cols = self.im2col(x, in_h, in_w, out_h, out_w);
        let out_cols = self.w.forward_train(&cols)?;
        self.last_input_shape = (batch, in_h, in_w);
        self.last_output_shape = (out_h, out_w);
        Ok(self.reshape_output(&out_cols, batch, out_h, out_w))
    }

    fn backward(&mut self, grad_out: &Matrix) -> Matrix {
        let (batch, in_h, in_w) = self.last_input_shape;
        let (out_h, out_w) = self.last_output_shape;
        let mut grad_cols = Matrix::zeros(batch * out_h * out_w, self.out_channels);
        let mut row = 0;
        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    for oc in 0..self.out_channels {
                        let idx = oc * out_h * out_w + oh * out_w + ow;
                        grad_cols.set(row, oc, grad_out.get(b, idx));
                    }
                    row += 1;
                }
            }
        }
        let grad_in_cols = self.w.backward(&grad_cols);
        self.col2im(&grad_in_cols, batch, in_h, in_w, out_h, out_w)
    }

    fn parameters_mut(&mut self) -> Vec<&mut Param> {
        self.w.parameters_mut()
    }

    fn save_state(&self, prefix: &str, out: &mut StateDict) {
        self.w.save_state(prefix, out);
    }

    fn load_state(&mut self, prefix: &str, state: &StateDict) -> Result<()> {
        self.w.load_state(prefix, state)
    }
}
