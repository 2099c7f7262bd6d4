use sfmkit_geometry::Pose;
use sfmkit_io::types::{ColmapImage, ImageRow};
use sfmkit_io::SfmIoError;

/// Which pose fields of an image row were used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseSource {
    /// All seven optimized fields were set.
    Optimized,
    /// Only the prior quaternion (and maybe translation) was set.
    Prior,
}

/// An image with a normalized pose.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    /// Image id
    pub image_id: u32,
    /// Image name
    pub name: String,
    /// Camera id
    pub camera_id: u32,
    /// Whether the pose comes from the optimized fields
    pub is_registered: bool,
    /// The normalized world-to-camera pose
    pub pose: Pose,
}

/// Pick the authoritative pose of an image row.
///
/// The optimized fields win whenever all seven are set; otherwise the prior
/// quaternion is used with missing prior translation components set to zero.
pub fn select_pose(row: &ImageRow) -> Option<(PoseSource, [f64; 4], [f64; 3])> {
    if let Some((q, t)) = row.optimized_pose() {
        return Some((PoseSource::Optimized, q, t));
    }
    row.prior_pose().map(|(q, t)| (PoseSource::Prior, q, t))
}

/// Resolve the pose of one image row.
///
/// # Returns
///
/// `Ok(None)` when the row carries no usable pose, or
/// [`SfmIoError::MalformedRecord`] when its quaternion has zero norm.
pub fn resolve_image_row(row: &ImageRow) -> Result<Option<ResolvedImage>, SfmIoError> {
    let Some((source, q, t)) = select_pose(row) else {
        return Ok(None);
    };

    let pose = Pose::new(q, t).map_err(|e| {
        SfmIoError::MalformedRecord(format!("image {} ({}): {e}", row.image_id, row.name))
    })?;

    Ok(Some(ResolvedImage {
        image_id: row.image_id,
        name: row.name.clone(),
        camera_id: row.camera_id,
        is_registered: source == PoseSource::Optimized,
        pose,
    }))
}

/// Resolve the pose of a registered model image.
pub fn resolve_model_image(image: &ColmapImage) -> Result<ResolvedImage, SfmIoError> {
    let pose = Pose::new(image.rotation, image.translation).map_err(|e| {
        SfmIoError::MalformedRecord(format!("image {} ({}): {e}", image.image_id, image.name))
    })?;
    Ok(ResolvedImage {
        image_id: image.image_id,
        name: image.name.clone(),
        camera_id: image.camera_id,
        is_registered: true,
        pose,
    })
}

/// Outcome of resolving a batch of images.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Resolved images in input order
    pub images: Vec<ResolvedImage>,
    /// Images without any usable pose fields
    pub missing_pose: usize,
    /// Images whose pose could not be normalized
    pub malformed: usize,
}

impl Resolution {
    /// Number of resolved images that are registered.
    pub fn registered_count(&self) -> usize {
        self.images.iter().filter(|i| i.is_registered).count()
    }

    /// Total number of images that were left out.
    pub fn skipped(&self) -> usize {
        self.missing_pose + self.malformed
    }
}

/// Resolve every image row, skipping the ones without a usable pose.
pub fn resolve_images(rows: &[ImageRow]) -> Resolution {
    let mut resolution = Resolution::default();

    for row in rows {
        match resolve_image_row(row) {
            Ok(Some(image)) => resolution.images.push(image),
            Ok(None) => {
                log::warn!("Image {} ({}) has no pose, skipping", row.image_id, row.name);
                resolution.missing_pose += 1;
            }
            Err(e) => {
                log::warn!("Skipping image: {e}");
                resolution.malformed += 1;
            }
        }
    }

    log::info!(
        "Resolved {} of {} images, {} registered",
        resolution.images.len(),
        rows.len(),
        resolution.registered_count()
    );

    resolution
}

/// Resolve every image of a model, skipping the ones whose pose cannot be normalized.
pub fn resolve_model_images(images: &[ColmapImage]) -> Resolution {
    let mut resolution = Resolution::default();

    for image in images {
        match resolve_model_image(image) {
            Ok(image) => resolution.images.push(image),
            Err(e) => {
                log::warn!("Skipping model image: {e}");
                resolution.malformed += 1;
            }
        }
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn optimized_row() -> ImageRow {
        ImageRow {
            image_id: 1,
            name: "a.jpg".to_string(),
            camera_id: 1,
            prior_qw: Some(0.0),
            prior_qx: Some(1.0),
            prior_qy: Some(0.0),
            prior_qz: Some(0.0),
            qw: Some(2.0),
            qx: Some(0.0),
            qy: Some(0.0),
            qz: Some(0.0),
            tx: Some(1.0),
            ty: Some(2.0),
            tz: Some(3.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_optimized_wins_over_prior() -> Result<(), SfmIoError> {
        let Some(image) = resolve_image_row(&optimized_row())? else {
            panic!("expected a resolved image");
        };
        assert!(image.is_registered);
        assert_eq!(image.pose.quaternion(), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(image.pose.translation(), [1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_prior_translation_defaults_to_zero() -> Result<(), SfmIoError> {
        let row = ImageRow {
            image_id: 2,
            name: "b.jpg".to_string(),
            prior_qw: Some(0.5),
            prior_qx: Some(0.5),
            prior_qy: Some(0.5),
            prior_qz: Some(0.5),
            prior_tx: Some(4.0),
            ..Default::default()
        };
        let Some(image) = resolve_image_row(&row)? else {
            panic!("expected a resolved image");
        };
        assert!(!image.is_registered);
        assert_eq!(image.pose.translation(), [4.0, 0.0, 0.0]);
        let q = image.pose.quaternion();
        assert_relative_eq!(
            (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt(),
            1.0,
            epsilon = 1e-6
        );
        Ok(())
    }

    #[test]
    fn test_partial_optimized_falls_back_to_prior() -> Result<(), SfmIoError> {
        let mut row = optimized_row();
        row.tz = None;
        let Some(image) = resolve_image_row(&row)? else {
            panic!("expected a resolved image");
        };
        assert!(!image.is_registered);
        assert_eq!(image.pose.quaternion(), [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(image.pose.translation(), [0.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_resolve_batch() {
        let mut zero = optimized_row();
        zero.image_id = 3;
        zero.qw = Some(0.0);
        let empty = ImageRow {
            image_id: 4,
            name: "d.jpg".to_string(),
            ..Default::default()
        };

        let resolution = resolve_images(&[optimized_row(), zero, empty]);
        assert_eq!(resolution.images.len(), 1);
        assert_eq!(resolution.images[0].image_id, 1);
        assert_eq!(resolution.missing_pose, 1);
        assert_eq!(resolution.malformed, 1);
        assert_eq!(resolution.skipped(), 2);
        assert_eq!(resolution.registered_count(), 1);
    }

    #[test]
    fn test_zero_norm_is_malformed() {
        let mut row = optimized_row();
        row.qw = Some(0.0);
        assert!(matches!(
            resolve_image_row(&row),
            Err(SfmIoError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_resolve_model_image() -> Result<(), SfmIoError> {
        let image = ColmapImage {
            image_id: 7,
            name: "m.jpg".to_string(),
            camera_id: 2,
            rotation: [1.0, 0.0, 0.0, 0.0],
            translation: [0.0, 0.0, 1.0],
            points2d: vec![],
        };
        let resolved = resolve_model_image(&image)?;
        assert!(resolved.is_registered);
        assert_eq!(resolved.pose.camera_center(), [-0.0, -0.0, -1.0]);
        Ok(())
    }
}
