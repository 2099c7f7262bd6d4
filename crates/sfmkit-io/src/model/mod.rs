use std::path::{Path, PathBuf};

use crate::error::SfmIoError;
use crate::types::{Camera, ColmapImage, Point3d};

/// Reader for the binary model encoding (`*.bin`).
pub mod binary;

/// Reader for the text model encoding (`*.txt`).
pub mod text;

/// On-disk encoding of a sparse model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// `cameras.bin`, `images.bin`, `points3D.bin`
    Binary,
    /// `cameras.txt`, `images.txt`, `points3D.txt`
    Text,
}

impl ModelFormat {
    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ModelFormat::Binary => ".bin",
            ModelFormat::Text => ".txt",
        }
    }

    fn file(&self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{stem}{}", self.extension()))
    }
}

/// Detect the encoding of the model stored in `dir`.
///
/// A format is present when both its `cameras` and `images` files exist; the binary
/// encoding is preferred over the text one.
pub fn detect_model_format(dir: impl AsRef<Path>) -> Option<ModelFormat> {
    let dir = dir.as_ref();
    [ModelFormat::Binary, ModelFormat::Text].into_iter().find(|format| {
        format.file(dir, "cameras").is_file() && format.file(dir, "images").is_file()
    })
}

/// Find the sparse model folder of a reconstruction workspace.
///
/// Probes `base/sparse/0`, `base/sparse` and `base` in that order.
pub fn find_sparse_model(base: impl AsRef<Path>) -> Option<PathBuf> {
    let base = base.as_ref();
    [base.join("sparse").join("0"), base.join("sparse"), base.to_path_buf()]
        .into_iter()
        .find(|dir| dir.is_dir() && detect_model_format(dir).is_some())
}

/// A sparse reconstruction loaded from disk.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Folder the model was read from
    pub path: PathBuf,
    /// Encoding the model was read from
    pub format: ModelFormat,
    /// Cameras
    pub cameras: Vec<Camera>,
    /// Registered images
    pub images: Vec<ColmapImage>,
    /// 3D points, empty when the model has no points file
    pub points3d: Vec<Point3d>,
}

impl Reconstruction {
    /// Mean reprojection error over all 3D points, `None` without points.
    pub fn mean_reprojection_error(&self) -> Option<f64> {
        if self.points3d.is_empty() {
            return None;
        }
        let total = self.points3d.iter().map(|p| p.error).sum::<f64>();
        Some(total / self.points3d.len() as f64)
    }
}

/// Read the images of the model stored in `dir`, auto-detecting the encoding.
pub fn read_model_images(dir: impl AsRef<Path>) -> Result<Vec<ColmapImage>, SfmIoError> {
    let dir = dir.as_ref();
    let format = detect_model_format(dir).ok_or_else(|| {
        SfmIoError::NotFound(format!("no sparse model in {}", dir.display()))
    })?;
    log::info!("Reading images from {} model in {}", format.extension(), dir.display());

    let path = format.file(dir, "images");
    match format {
        ModelFormat::Binary => binary::read_images_bin(path),
        ModelFormat::Text => text::read_images_txt(path),
    }
}

/// Read the full model stored in `dir`, auto-detecting the encoding.
///
/// A missing `points3D` file yields an empty point list.
pub fn read_model(dir: impl AsRef<Path>) -> Result<Reconstruction, SfmIoError> {
    let dir = dir.as_ref();
    let format = detect_model_format(dir).ok_or_else(|| {
        SfmIoError::NotFound(format!("no sparse model in {}", dir.display()))
    })?;
    log::info!("Reading {} model from {}", format.extension(), dir.display());

    let cameras_path = format.file(dir, "cameras");
    let images_path = format.file(dir, "images");
    let points_path = format.file(dir, "points3D");

    let (cameras, images) = match format {
        ModelFormat::Binary => (
            binary::read_cameras_bin(&cameras_path)?,
            binary::read_images_bin(&images_path)?,
        ),
        ModelFormat::Text => (
            text::read_cameras_txt(&cameras_path)?,
            text::read_images_txt(&images_path)?,
        ),
    };

    let points3d = if points_path.is_file() {
        match format {
            ModelFormat::Binary => binary::read_points3d_bin(&points_path)?,
            ModelFormat::Text => text::read_points3d_txt(&points_path)?,
        }
    } else {
        log::warn!("No points file at {}", points_path.display());
        Vec::new()
    };

    log::info!(
        "Read model with {} cameras, {} images and {} points",
        cameras.len(),
        images.len(),
        points3d.len()
    );

    Ok(Reconstruction {
        path: dir.to_path_buf(),
        format,
        cameras,
        images,
        points3d,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, write};

    #[test]
    fn test_detect_model_format() -> Result<(), SfmIoError> {
        let dir = tempfile::tempdir()?;
        assert_eq!(detect_model_format(dir.path()), None);

        write(dir.path().join("cameras.txt"), "")?;
        assert_eq!(detect_model_format(dir.path()), None);
        write(dir.path().join("images.txt"), "")?;
        assert_eq!(detect_model_format(dir.path()), Some(ModelFormat::Text));

        // binary wins when both are present
        write(dir.path().join("cameras.bin"), [0u8; 8])?;
        write(dir.path().join("images.bin"), [0u8; 8])?;
        assert_eq!(detect_model_format(dir.path()), Some(ModelFormat::Binary));
        Ok(())
    }

    #[test]
    fn test_find_sparse_model() -> Result<(), SfmIoError> {
        let dir = tempfile::tempdir()?;
        assert_eq!(find_sparse_model(dir.path()), None);

        let sparse = dir.path().join("sparse");
        create_dir_all(&sparse)?;
        write(sparse.join("cameras.txt"), "")?;
        write(sparse.join("images.txt"), "")?;
        assert_eq!(find_sparse_model(dir.path()), Some(sparse.clone()));

        let model0 = sparse.join("0");
        create_dir_all(&model0)?;
        write(model0.join("cameras.bin"), [0u8; 8])?;
        write(model0.join("images.bin"), [0u8; 8])?;
        assert_eq!(find_sparse_model(dir.path()), Some(model0));
        Ok(())
    }

    #[test]
    fn test_read_model_text_without_points() -> Result<(), SfmIoError> {
        let dir = tempfile::tempdir()?;
        write(
            dir.path().join("cameras.txt"),
            "# Camera list\n1 PINHOLE 640 480 500 500 320 240\n",
        )?;
        write(
            dir.path().join("images.txt"),
            "# Image list\n1 1 0 0 0 0 0 0 1 a.jpg\n10 20 -1\n",
        )?;

        let model = read_model(dir.path())?;
        assert_eq!(model.format, ModelFormat::Text);
        assert_eq!(model.cameras.len(), 1);
        assert_eq!(model.images.len(), 1);
        assert!(model.points3d.is_empty());
        assert_eq!(model.mean_reprojection_error(), None);

        assert_eq!(read_model_images(dir.path())?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_read_model_missing() -> Result<(), SfmIoError> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(read_model(dir.path()), Err(SfmIoError::NotFound(_))));
        Ok(())
    }
}
