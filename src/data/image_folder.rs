use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;

use super::Dataset;
use crate::error::{GanError, Result};
use crate::tensor::Tensor;

/// Flat directory of image files decoded on demand.
///
/// Files are enumerated once at construction and sorted by name, so index
/// `i` always refers to the same file.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    files: Vec<PathBuf>,
    image_size: usize,
}

impl ImageFolder {
    /// Enumerate the regular files in `dir` whose extension matches one of
    /// `extensions` (case-insensitive).
    pub fn open(dir: impl AsRef<Path>, image_size: usize, extensions: &[String]) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(GanError::MissingDirectory(root));
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if has_extension(&path, extensions) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        log::debug!("found {} images in {}", files.len(), root.display());
        Ok(Self {
            root,
            files,
            image_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn path(&self, index: usize) -> Option<&Path> {
        self.files.get(index).map(PathBuf::as_path)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

/// Decode `path` into a normalised `[3, s, s]` tensor.
///
/// Pixels are scaled to `[0, 1]` and then normalised per channel with
/// mean 0.5 and std 0.5, giving values in `[-1, 1]`.
pub fn load_image(path: &Path, size: usize) -> Result<Tensor> {
    let img = image::open(path).map_err(|e| GanError::image(path, e))?;
    let side = size as u32;
    let rgb = img.resize_exact(side, side, FilterType::Triangle).to_rgb8();
    let plane = size * size;
    let mut data = vec![0.0f32; 3 * plane];
    for (i, px) in rgb.pixels().enumerate() {
        for c in 0..3 {
            let v = px.0[c] as f32 / 255.0;
            data[c * plane + i] = (v - 0.5) / 0.5;
        }
    }
    Ok(Tensor::new(data, vec![3, size, size]))
}

impl Dataset for ImageFolder {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn get(&self, index: usize) -> Result<Tensor> {
        let path = self.files.get(index).ok_or(GanError::IndexOutOfBounds {
            index,
            len: self.files.len(),
        })?;
        load_image(path, self.image_size)
    }
}
