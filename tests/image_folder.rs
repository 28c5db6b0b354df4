use std::fs;
use std::path::Path;
use std::sync::Arc;

use facegan::data::{DataLoader, Dataset, ImageFolder, LoaderOptions};
use facegan::error::GanError;
use facegan::rng::stream_rng;
use image::{Rgb, RgbImage};

fn write_png(dir: &Path, name: &str, colour: [u8; 3]) {
    let img = RgbImage::from_pixel(10, 6, Rgb(colour));
    img.save(dir.join(name)).unwrap();
}

fn png_ext() -> Vec<String> {
    vec!["png".to_string()]
}

#[test]
fn enumerates_matching_files_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "b.png", [255, 255, 255]);
    write_png(dir.path(), "a.PNG", [0, 0, 0]);
    write_png(dir.path(), "c.png", [255, 0, 0]);
    fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    fs::create_dir(dir.path().join("nested.png")).unwrap();

    let ds = ImageFolder::open(dir.path(), 8, &png_ext()).unwrap();
    assert_eq!(ds.len(), 3);
    assert_eq!(ds.path(0).unwrap().file_name().unwrap(), "a.PNG");
    assert_eq!(ds.path(2).unwrap().file_name().unwrap(), "c.png");
}

#[test]
fn samples_are_resized_and_normalised() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "0.png", [0, 0, 0]);
    write_png(dir.path(), "1.png", [255, 255, 255]);
    write_png(dir.path(), "2.png", [255, 0, 0]);
    let ds = ImageFolder::open(dir.path(), 8, &png_ext()).unwrap();

    for i in 0..ds.len() {
        let t = ds.get(i).unwrap();
        assert_eq!(t.shape, vec![3, 8, 8]);
        let (lo, hi) = t.min_max().unwrap();
        assert!(lo >= -1.0 && hi <= 1.0);
    }
    assert!(ds.get(0).unwrap().data.iter().all(|v| (*v + 1.0).abs() < 1e-6));
    assert!(ds.get(1).unwrap().data.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    let red = ds.get(2).unwrap();
    assert!((red.get(&[0, 3, 3]) - 1.0).abs() < 1e-6);
    assert!((red.get(&[1, 3, 3]) + 1.0).abs() < 1e-6);
}

#[test]
fn undecodable_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.png"), b"definitely not png").unwrap();
    let ds = ImageFolder::open(dir.path(), 8, &png_ext()).unwrap();
    assert!(matches!(ds.get(0), Err(GanError::Image { .. })));
    assert!(matches!(ds.get(1), Err(GanError::IndexOutOfBounds { index: 1, len: 1 })));
}

#[test]
fn max_samples_caps_usable_length() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..5 {
        write_png(dir.path(), &format!("{i}.png"), [i as u8 * 40, 0, 0]);
    }
    let ds: Arc<dyn Dataset> = Arc::new(ImageFolder::open(dir.path(), 4, &png_ext()).unwrap());

    let capped =
        DataLoader::new(Arc::clone(&ds), LoaderOptions::training(1, Some(3)), stream_rng(0, 3))
            .unwrap();
    assert_eq!(capped.len(), 3);
    let loose =
        DataLoader::new(Arc::clone(&ds), LoaderOptions::training(1, Some(10)), stream_rng(0, 3))
            .unwrap();
    assert_eq!(loose.len(), 5);

    let batches: Vec<_> = DataLoader::new(ds, LoaderOptions::evaluation(2, 3), stream_rng(0, 3))
        .unwrap()
        .map(|b| b.unwrap().shape)
        .collect();
    assert_eq!(batches, vec![[2, 3, 4, 4], [1, 3, 4, 4]]);
}
