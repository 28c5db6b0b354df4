//! Image output: preview grids, FID staging files and the loss curve.

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use plotters::prelude::*;

use crate::error::{GanError, Result};

/// Map a normalised value in `[-1, 1]` back to `[0, 1]`, clamping outliers.
pub fn denormalize(v: f32) -> f32 {
    ((v + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn to_u8(v: f32) -> u8 {
    (denormalize(v) * 255.0).round() as u8
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Convert one flattened CHW sample in `[-1, 1]` into an RGB image.
pub fn to_rgb_image(sample: &[f32], height: usize, width: usize) -> Result<RgbImage> {
    let plane = height * width;
    if sample.len() != 3 * plane {
        return Err(GanError::Shape {
            expected: vec![3, height, width],
            actual: vec![sample.len()],
        });
    }
    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let i = y as usize * width + x as usize;
        Rgb([to_u8(sample[i]), to_u8(sample[plane + i]), to_u8(sample[2 * plane + i])])
    }))
}

/// Write one normalised sample as a PNG.
pub fn save_image(sample: &[f32], height: usize, width: usize, path: &Path) -> Result<()> {
    let img = to_rgb_image(sample, height, width)?;
    ensure_parent(path)?;
    img.save(path).map_err(|e| GanError::image(path, e))
}

/// Tile `samples` (one flattened CHW image each) into a grid with `nrow`
/// images per row, separated and bordered by `padding` black pixels.
pub fn make_grid(
    samples: &[&[f32]],
    height: usize,
    width: usize,
    nrow: usize,
    padding: usize,
) -> Result<RgbImage> {
    let n = samples.len();
    let cols = nrow.min(n).max(1);
    let rows = n.div_ceil(cols).max(1);
    let cell_h = height + padding;
    let cell_w = width + padding;
    let mut grid = RgbImage::new(
        (cols * cell_w + padding) as u32,
        (rows * cell_h + padding) as u32,
    );
    for (k, sample) in samples.iter().enumerate() {
        let tile = to_rgb_image(sample, height, width)?;
        let x0 = (k % cols) * cell_w + padding;
        let y0 = (k / cols) * cell_h + padding;
        for (x, y, px) in tile.enumerate_pixels() {
            grid.put_pixel(x0 as u32 + x, y0 as u32 + y, *px);
        }
    }
    Ok(grid)
}

pub fn save_grid(
    samples: &[&[f32]],
    height: usize,
    width: usize,
    nrow: usize,
    padding: usize,
    path: &Path,
) -> Result<()> {
    let grid = make_grid(samples, height, width, nrow, padding)?;
    ensure_parent(path)?;
    grid.save(path).map_err(|e| GanError::image(path, e))
}

const PLOT_W: u32 = 800;
const PLOT_H: u32 = 480;
pub const GENERATOR_COLOUR: RGBColor = RGBColor(31, 119, 180);
pub const DISCRIMINATOR_COLOUR: RGBColor = RGBColor(255, 127, 14);

fn plot_error(e: impl std::fmt::Display) -> GanError {
    GanError::Plot(e.to_string())
}

/// Line chart of the per-epoch generator and discriminator losses.
///
/// x is the epoch starting at 1, y runs from 0 to just above the largest
/// finite loss. Generator loss is blue, discriminator loss orange; a
/// two-swatch key sits top right. No text is drawn, so no font backend is
/// needed.
pub fn save_loss_plot(g_losses: &[f32], d_losses: &[f32], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let root = BitMapBackend::new(path, (PLOT_W, PLOT_H)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let n = g_losses.len().max(d_losses.len()).max(2);
    let y_max = g_losses
        .iter()
        .chain(d_losses)
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0f32, f32::max)
        .max(f32::EPSILON)
        * 1.05;
    let mut chart = ChartBuilder::on(&root)
        .margin(30)
        .build_cartesian_2d(1f32..n as f32, 0f32..y_max)
        .map_err(plot_error)?;
    chart
        .configure_mesh()
        .x_labels(n.min(10))
        .y_labels(5)
        .light_line_style(&WHITE)
        .bold_line_style(&RGBColor(225, 225, 225))
        .draw()
        .map_err(plot_error)?;

    for (series, colour) in [(g_losses, GENERATOR_COLOUR), (d_losses, DISCRIMINATOR_COLOUR)] {
        let points: Vec<(f32, f32)> = series
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| ((i + 1) as f32, v))
            .collect();
        chart
            .draw_series(LineSeries::new(points.iter().copied(), colour.stroke_width(2)))
            .map_err(plot_error)?;
        chart
            .draw_series(points.iter().map(|&p| Circle::new(p, 3, colour.filled())))
            .map_err(plot_error)?;
    }

    let x = (PLOT_W - 70) as i32;
    root.draw(&Rectangle::new([(x, 10), (x + 24, 18)], GENERATOR_COLOUR.filled()))
        .map_err(plot_error)?;
    root.draw(&Rectangle::new([(x + 30, 10), (x + 54, 18)], DISCRIMINATOR_COLOUR.filled()))
        .map_err(plot_error)?;
    root.present().map_err(plot_error)?;
    log::debug!("saved loss plot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denormalize_stays_in_unit_range() {
        for v in [-3.0, -1.0, -0.5, 0.0, 0.25, 1.0, 7.0] {
            let d = denormalize(v);
            assert!((0.0..=1.0).contains(&d));
        }
        assert_eq!(denormalize(-1.0), 0.0);
        assert_eq!(denormalize(1.0), 1.0);
        assert_eq!(denormalize(0.0), 0.5);
    }

    #[test]
    fn grid_of_sixteen_is_four_by_four() {
        let sample = vec![1.0f32; 3 * 4 * 4];
        let samples: Vec<&[f32]> = (0..16).map(|_| sample.as_slice()).collect();
        let grid = make_grid(&samples, 4, 4, 4, 2).unwrap();
        assert_eq!(grid.dimensions(), (4 * 6 + 2, 4 * 6 + 2));
        assert_eq!(grid.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(grid.get_pixel(2, 2), &Rgb([255, 255, 255]));
    }

    #[test]
    fn channels_are_planar() {
        // 1x1 image: R=-1, G=0, B=1
        let img = to_rgb_image(&[-1.0, 0.0, 1.0], 1, 1).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 128, 255]));
    }

    #[test]
    fn loss_plot_shows_both_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots").join("training_loss.png");
        save_loss_plot(&[1.0, 0.5, 0.8], &[1.4, 1.2, 1.3], &path).unwrap();
        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (PLOT_W, PLOT_H));
        let has = |c: RGBColor| img.pixels().any(|p| *p == Rgb([c.0, c.1, c.2]));
        assert!(has(GENERATOR_COLOUR));
        assert!(has(DISCRIMINATOR_COLOUR));
    }

    #[test]
    fn single_epoch_history_still_plots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training_loss.png");
        save_loss_plot(&[0.7], &[1.3], &path).unwrap();
        assert!(path.is_file());
    }
}
