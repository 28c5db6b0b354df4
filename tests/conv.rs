use facegan::error::GanError;
use facegan::layers::{Conv2d, ConvError, Layer};
use facegan::math::Matrix;
use facegan::rng::stream_rng;

#[test]
fn conv_forward_accepts_valid_square() {
    let conv = Conv2d::new(1, 1, 1, 1, 0, &mut stream_rng(0, 0));
    let x = Matrix::from_vec(1, 4, vec![1.0, 2.0, 3.0, 4.0]);
    assert!(conv.forward(&x).is_ok());
}

#[test]
fn conv_forward_errors_on_channel_mismatch() {
    let conv = Conv2d::new(3, 1, 1, 1, 0, &mut stream_rng(0, 0));
    let x = Matrix::from_vec(1, 7, vec![0.0; 7]);
    assert!(matches!(
        conv.forward(&x),
        Err(GanError::Conv(ConvError::ChannelMismatch { .. }))
    ));
}

#[test]
fn conv_forward_errors_on_non_square_input() {
    let conv = Conv2d::new(1, 1, 1, 1, 0, &mut stream_rng(0, 0));
    let x = Matrix::from_vec(1, 3, vec![0.0; 3]);
    assert!(matches!(
        conv.forward(&x),
        Err(GanError::Conv(ConvError::NonSquareInput { .. }))
    ));
}

#[test]
fn strided_conv_halves_edge_length() {
    let mut conv = Conv2d::new(3, 4, 4, 2, 1, &mut stream_rng(1, 0));
    assert_eq!(conv.output_size(8), 4);
    let x = Matrix::from_vec(2, 3 * 8 * 8, vec![0.1; 2 * 3 * 8 * 8]);
    let y = conv.forward_train(&x).unwrap();
    assert_eq!((y.rows, y.cols), (2, 4 * 4 * 4));
    let grad_in = conv.backward(&Matrix::from_vec(2, 64, vec![1.0; 128]));
    assert_eq!((grad_in.rows, grad_in.cols), (2, 3 * 8 * 8));
}

#[test]
fn conv_backward_matches_finite_difference() {
    let mut conv = Conv2d::new(2, 3, 3, 2, 1, &mut stream_rng(2, 0));
    for (i, w) in conv.w.weight.value.data.iter_mut().enumerate() {
        *w = ((i * 7) % 13) as f32 / 6.0 - 1.0;
    }
    conv.w.bias.value.data = vec![0.1, -0.2, 0.3];
    let x_data: Vec<f32> = (0..2 * 2 * 5 * 5)
        .map(|i| ((i * 5) % 17) as f32 / 8.0 - 1.0)
        .collect();
    let x = Matrix::from_vec(2, 2 * 5 * 5, x_data);

    let y = conv.forward_train(&x).unwrap();
    assert_eq!((y.rows, y.cols), (2, 3 * 3 * 3));
    let weights: Vec<f32> = (0..y.data.len())
        .map(|i| ((i * 3) % 11) as f32 / 5.0 - 1.0)
        .collect();
    let loss = |out: &Matrix| -> f32 {
        out.data.iter().zip(&weights).map(|(a, b)| a * b).sum()
    };
    let grad_in = conv.backward(&Matrix::from_vec(y.rows, y.cols, weights.clone()));
    let grad_w = conv.w.weight.grad.clone();

    let eps = 1e-3;
    for i in 0..x.data.len() {
        let mut xp = x.clone();
        xp.data[i] += eps;
        let mut xm = x.clone();
        xm.data[i] -= eps;
        let fp = loss(&conv.forward(&xp).unwrap());
        let fm = loss(&conv.forward(&xm).unwrap());
        let numeric = (fp - fm) / (2.0 * eps);
        assert!(
            (numeric - grad_in.data[i]).abs() < 1e-2,
            "input {i}: numeric {numeric}, analytic {}",
            grad_in.data[i]
        );
    }
    for i in (0..grad_w.len()).step_by(5) {
        let original = conv.w.weight.value.data[i];
        conv.w.weight.value.data[i] = original + eps;
        let fp = loss(&conv.forward(&x).unwrap());
        conv.w.weight.value.data[i] = original - eps;
        let fm = loss(&conv.forward(&x).unwrap());
        conv.w.weight.value.data[i] = original;
        let numeric = (fp - fm) / (2.0 * eps);
        assert!(
            (numeric - grad_w[i]).abs() < 1e-2,
            "weight {i}: numeric {numeric}, analytic {}",
            grad_w[i]
        );
    }
}
