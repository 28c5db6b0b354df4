/// Format the end-of-epoch loss summary.
pub fn format_epoch_summary(epoch: usize, epochs: usize, d_loss: f32, g_loss: f32) -> String {
    format!("epoch {epoch}/{epochs} d_loss {d_loss:.4} g_loss {g_loss:.4}")
}

/// Format the per-batch progress message shown next to the progress bar.
pub fn format_batch_progress(d_loss: f32, g_loss: f32, d_real: f32, d_fake: f32) -> String {
    format!("D {d_loss:.3} G {g_loss:.3} D(x) {d_real:.3} D(G(z)) {d_fake:.3}")
}

pub fn format_fid(fid: f64) -> String {
    format!("FID {fid:.4}")
}

/// Format a checkpoint saved message.
pub fn format_checkpoint_saved(epoch: usize, path: &std::path::Path) -> String {
    format!("Checkpoint for epoch {epoch} saved to {}", path.display())
}

/// Format a message reporting the total number of matrix operations.
pub fn format_total_ops(count: usize) -> String {
    format!("Total matrix ops: {}", count)
}

/// Log the total number of matrix operations at info level.
pub fn log_total_ops(count: usize) {
    log::info!("{}", format_total_ops(count));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_format_total_ops() {
        assert_eq!(format_total_ops(42), "Total matrix ops: 42");
    }

    #[test]
    fn test_format_epoch_summary() {
        assert_eq!(
            format_epoch_summary(3, 10, 1.23456, 0.5),
            "epoch 3/10 d_loss 1.2346 g_loss 0.5000"
        );
    }

    #[test]
    fn test_format_batch_progress() {
        assert_eq!(
            format_batch_progress(1.0, 2.0, 0.75, 0.25),
            "D 1.000 G 2.000 D(x) 0.750 D(G(z)) 0.250"
        );
    }

    #[test]
    fn test_format_fid() {
        assert_eq!(format_fid(12.345678), "FID 12.3457");
    }

    #[test]
    fn test_format_checkpoint_saved() {
        assert_eq!(
            format_checkpoint_saved(2, Path::new("results/ckpt_epoch_2.bin")),
            "Checkpoint for epoch 2 saved to results/ckpt_epoch_2.bin"
        );
    }
}
