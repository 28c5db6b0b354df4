use crate::math::{sigmoid, Matrix};

/// Apply sigmoid activation in place on a matrix.
pub fn forward_matrix(m: &mut Matrix) {
    for v in m.data.iter_mut() {
        *v = sigmoid(*v);
    }
}

/// Mean of `sigmoid(logits)`, i.e. the average probability the
/// discriminator assigns to "real".
pub fn mean_probability(logits: &Matrix) -> f32 {
    let mut probs = logits.clone();
    forward_matrix(&mut probs);
    probs.mean()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_logits_are_even_odds() {
        let m = Matrix::zeros(4, 1);
        assert!((mean_probability(&m) - 0.5).abs() < 1e-6);
    }
}
