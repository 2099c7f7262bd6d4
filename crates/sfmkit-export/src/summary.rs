use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use sfmkit_io::database::{ColmapDatabase, TableRead};
use sfmkit_io::model::Reconstruction;
use sfmkit_io::types::{
    check_features_aligned, Camera, DescriptorSet, ImageRow, KeypointSet, MatchRecord,
};
use sfmkit_io::SfmIoError;

use crate::resolve::ResolvedImage;

/// Axis-aligned bounds of the camera centers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRange {
    /// Minimum per axis
    pub min: [f64; 3],
    /// Maximum per axis
    pub max: [f64; 3],
}

impl PositionRange {
    /// Bounds of the centers of the registered images, `None` if there are none.
    pub fn from_registered(images: &[ResolvedImage]) -> Option<Self> {
        images
            .iter()
            .filter(|i| i.is_registered)
            .map(|i| i.pose.camera_center())
            .fold(None, |range: Option<Self>, c| {
                Some(match range {
                    None => Self { min: c, max: c },
                    Some(r) => Self {
                        min: std::array::from_fn(|k| r.min[k].min(c[k])),
                        max: std::array::from_fn(|k| r.max[k].max(c[k])),
                    },
                })
            })
    }

    /// Extent per axis.
    pub fn extent(&self) -> [f64; 3] {
        std::array::from_fn(|k| self.max[k] - self.min[k])
    }
}

impl fmt::Display for PositionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extent = self.extent();
        for (k, axis) in ["X", "Y", "Z"].iter().enumerate() {
            writeln!(
                f,
                "  {axis}: [{:.3}, {:.3}] (range: {:.3})",
                self.min[k], self.max[k], extent[k]
            )?;
        }
        Ok(())
    }
}

/// Statistics of a loaded sparse model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    /// Folder the model was read from
    pub path: PathBuf,
    /// Number of 3D points
    pub num_points3d: usize,
    /// Number of images with at least one observation
    pub registered_images: usize,
    /// Mean reprojection error, `None` without points
    pub mean_reprojection_error: Option<f64>,
}

impl From<&Reconstruction> for ModelSummary {
    fn from(model: &Reconstruction) -> Self {
        Self {
            path: model.path.clone(),
            num_points3d: model.points3d.len(),
            registered_images: model
                .images
                .iter()
                .filter(|i| !i.points2d.is_empty())
                .count(),
            mean_reprojection_error: model.mean_reprojection_error(),
        }
    }
}

/// Content counts of a feature database.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatabaseSummary {
    /// Database path
    pub path: PathBuf,
    /// Number of cameras
    pub num_cameras: usize,
    /// Number of images
    pub num_images: usize,
    /// Number of images with a keypoints row
    pub images_with_features: usize,
    /// Keypoints over all images
    pub total_features: usize,
    /// Number of images with a descriptors row
    pub images_with_descriptors: usize,
    /// Images with keypoints but no descriptors
    pub missing_descriptors: usize,
    /// Images whose descriptor count differs from their keypoint count
    pub misaligned_descriptors: usize,
    /// Number of image pairs with matches
    pub num_match_pairs: usize,
    /// Matches over all pairs
    pub total_matches: usize,
    /// Rows that failed to decode and were skipped
    pub skipped_rows: usize,
    /// Model statistics, when a model was loaded
    pub model: Option<ModelSummary>,
}

impl DatabaseSummary {
    /// Count the contents of an open database.
    pub fn from_database(db: &ColmapDatabase) -> Result<Self, SfmIoError> {
        Ok(Self::from_tables(
            db.path(),
            &db.read_cameras()?,
            &db.read_images()?,
            &db.read_all_keypoints()?,
            &db.read_all_descriptors()?,
            &db.read_all_matches()?,
        ))
    }

    /// Count tables that were already read.
    pub fn from_tables(
        path: &Path,
        cameras: &TableRead<Camera>,
        images: &TableRead<ImageRow>,
        keypoints: &TableRead<KeypointSet>,
        descriptors: &TableRead<DescriptorSet<u8>>,
        matches: &TableRead<MatchRecord>,
    ) -> Self {
        let (missing_descriptors, misaligned_descriptors) =
            descriptor_alignment(&keypoints.records, &descriptors.records);
        Self {
            path: path.to_path_buf(),
            num_cameras: cameras.records.len(),
            num_images: images.records.len(),
            images_with_features: keypoints.records.len(),
            total_features: keypoints.records.iter().map(|k| k.len()).sum(),
            images_with_descriptors: descriptors.records.len(),
            missing_descriptors,
            misaligned_descriptors,
            num_match_pairs: matches.records.len(),
            total_matches: matches.records.iter().map(|m| m.len()).sum(),
            skipped_rows: cameras.skipped
                + images.skipped
                + keypoints.skipped
                + descriptors.skipped
                + matches.skipped,
            model: None,
        }
    }

    /// Attach the statistics of a loaded model.
    pub fn with_model(mut self, model: &Reconstruction) -> Self {
        self.model = Some(ModelSummary::from(model));
        self
    }

    /// Average keypoints per image with features.
    pub fn average_features(&self) -> Option<f64> {
        average(self.total_features, self.images_with_features)
    }

    /// Average matches per pair.
    pub fn average_matches(&self) -> Option<f64> {
        average(self.total_matches, self.num_match_pairs)
    }
}

/// Count images with keypoints whose descriptors are missing or of another length.
fn descriptor_alignment<T>(
    keypoints: &[KeypointSet],
    descriptors: &[DescriptorSet<T>],
) -> (usize, usize) {
    let descriptors = descriptors
        .iter()
        .map(|d| (d.image_id, d))
        .collect::<HashMap<_, _>>();

    let (mut missing, mut misaligned) = (0, 0);
    for kpts in keypoints {
        match descriptors.get(&kpts.image_id) {
            None => {
                log::warn!("Image {} has keypoints but no descriptors", kpts.image_id);
                missing += 1;
            }
            Some(desc) => {
                if let Err(err) = check_features_aligned(kpts, desc) {
                    log::warn!("{err}");
                    misaligned += 1;
                }
            }
        }
    }
    (missing, misaligned)
}

fn average(total: usize, count: usize) -> Option<f64> {
    (count > 0).then(|| total as f64 / count as f64)
}

impl fmt::Display for DatabaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Database: {}", self.path.display())?;
        writeln!(f, "Images and cameras:")?;
        writeln!(f, "  - Number of images: {}", self.num_images)?;
        writeln!(f, "  - Number of cameras: {}", self.num_cameras)?;

        writeln!(f, "Feature points:")?;
        writeln!(f, "  - Images with features: {}", self.images_with_features)?;
        writeln!(f, "  - Total feature points: {}", self.total_features)?;
        if let Some(avg) = self.average_features() {
            writeln!(f, "  - Average feature points: {avg:.1}")?;
        }
        writeln!(f, "  - Images with descriptors: {}", self.images_with_descriptors)?;
        if self.missing_descriptors + self.misaligned_descriptors > 0 {
            writeln!(
                f,
                "  - Descriptor problems: {} missing, {} misaligned",
                self.missing_descriptors, self.misaligned_descriptors
            )?;
        }

        writeln!(f, "Matches:")?;
        writeln!(f, "  - Number of match pairs: {}", self.num_match_pairs)?;
        writeln!(f, "  - Total match points: {}", self.total_matches)?;
        if let Some(avg) = self.average_matches() {
            writeln!(f, "  - Average match points: {avg:.1}")?;
        }

        if self.skipped_rows > 0 {
            writeln!(f, "Skipped rows: {}", self.skipped_rows)?;
        }

        if let Some(model) = &self.model {
            writeln!(f, "3D reconstruction: {}", model.path.display())?;
            writeln!(f, "  - Number of 3D points: {}", model.num_points3d)?;
            writeln!(f, "  - Registered images: {}", model.registered_images)?;
            if let Some(err) = model.mean_reprojection_error {
                writeln!(f, "  - Average reprojection error: {err:.3}")?;
            }
        }
        Ok(())
    }
}

/// What an export run produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunSummary {
    /// Database statistics
    pub database: DatabaseSummary,
    /// Images with a resolved pose
    pub resolved_images: usize,
    /// Resolved images that are registered
    pub registered_images: usize,
    /// Images without pose fields
    pub images_without_pose: usize,
    /// Images whose pose could not be normalized
    pub malformed_images: usize,
    /// Images written to the pose files after filtering
    pub exported_poses: usize,
    /// Match pairs written
    pub exported_match_pairs: usize,
    /// Match pairs filtered out or skipped
    pub skipped_match_pairs: usize,
    /// Bounds of the registered camera centers
    pub position_range: Option<PositionRange>,
    /// Every file written
    pub written_files: Vec<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.database)?;

        writeln!(f, "Poses:")?;
        writeln!(f, "  - Resolved images: {}", self.resolved_images)?;
        writeln!(f, "  - Registered images: {}", self.registered_images)?;
        writeln!(
            f,
            "  - Skipped images: {} without pose, {} malformed",
            self.images_without_pose, self.malformed_images
        )?;
        writeln!(f, "  - Exported poses: {}", self.exported_poses)?;

        writeln!(
            f,
            "Match files: {} written, {} skipped",
            self.exported_match_pairs, self.skipped_match_pairs
        )?;

        if let Some(range) = &self.position_range {
            writeln!(f, "Camera position range (registered images):")?;
            write!(f, "{range}")?;
        }

        writeln!(f, "Output files: {}", self.written_files.len())?;
        for path in &self.written_files {
            writeln!(f, "  {}", path.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfmkit_geometry::Pose;
    use sfmkit_io::model::ModelFormat;
    use sfmkit_io::types::{ColmapImage, Keypoint, Point2d};

    fn resolved(
        t: [f64; 3],
        is_registered: bool,
    ) -> Result<ResolvedImage, Box<dyn std::error::Error>> {
        Ok(ResolvedImage {
            image_id: 0,
            name: String::new(),
            camera_id: 1,
            is_registered,
            pose: Pose::new([1.0, 0.0, 0.0, 0.0], t)?,
        })
    }

    #[test]
    fn test_position_range() -> Result<(), Box<dyn std::error::Error>> {
        let images = vec![
            resolved([1.0, -2.0, 0.5], true)?,
            resolved([-3.0, 4.0, 0.5], true)?,
            resolved([100.0, 100.0, 100.0], false)?,
        ];
        let Some(range) = PositionRange::from_registered(&images) else {
            panic!("expected a range");
        };
        // centers are -t for the identity rotation
        assert_eq!(range.min, [-1.0, -4.0, -0.5]);
        assert_eq!(range.max, [3.0, 2.0, -0.5]);
        assert_eq!(range.extent(), [4.0, 6.0, 0.0]);
        assert!(range.to_string().contains("X: [-1.000, 3.000] (range: 4.000)"));

        assert_eq!(PositionRange::from_registered(&images[2..]), None);
        Ok(())
    }

    #[test]
    fn test_database_summary_display() {
        let summary = DatabaseSummary {
            path: PathBuf::from("db.db"),
            num_cameras: 2,
            num_images: 3,
            images_with_features: 2,
            total_features: 5,
            num_match_pairs: 0,
            ..Default::default()
        };
        assert_eq!(summary.average_features(), Some(2.5));
        assert_eq!(summary.average_matches(), None);

        let text = summary.to_string();
        assert!(text.contains("Number of cameras: 2"));
        assert!(text.contains("Average feature points: 2.5"));
        assert!(!text.contains("Average match points"));
        assert!(!text.contains("3D reconstruction"));
    }

    fn keypoints(image_id: u32, n: usize) -> KeypointSet {
        KeypointSet {
            image_id,
            keypoints: vec![Keypoint::default(); n],
        }
    }

    fn descriptors(image_id: u32, n: usize) -> DescriptorSet<u8> {
        DescriptorSet {
            image_id,
            dim: 2,
            data: vec![0; 2 * n],
        }
    }

    #[test]
    fn test_database_summary_descriptor_alignment() {
        let keypoints = TableRead {
            records: vec![keypoints(1, 3), keypoints(2, 4), keypoints(3, 2)],
            skipped: 0,
        };
        let descriptors = TableRead {
            records: vec![descriptors(1, 3), descriptors(2, 5)],
            skipped: 1,
        };
        let summary = DatabaseSummary::from_tables(
            Path::new("db.db"),
            &TableRead::default(),
            &TableRead::default(),
            &keypoints,
            &descriptors,
            &TableRead::default(),
        );
        assert_eq!(summary.images_with_descriptors, 2);
        assert_eq!(summary.missing_descriptors, 1);
        assert_eq!(summary.misaligned_descriptors, 1);
        assert_eq!(summary.skipped_rows, 1);
        assert!(summary
            .to_string()
            .contains("Descriptor problems: 1 missing, 1 misaligned"));
    }

    #[test]
    fn test_model_summary_counts_observed_images() {
        let image = |image_id, points2d| ColmapImage {
            image_id,
            name: format!("{image_id}.jpg"),
            camera_id: 1,
            rotation: [1.0, 0.0, 0.0, 0.0],
            translation: [0.0; 3],
            points2d,
        };
        let model = Reconstruction {
            path: PathBuf::from("sparse/0"),
            format: ModelFormat::Text,
            cameras: Vec::new(),
            images: vec![
                image(1, vec![Point2d::new(1.0, 2.0, -1)]),
                image(2, Vec::new()),
            ],
            points3d: Vec::new(),
        };
        let summary = ModelSummary::from(&model);
        assert_eq!(summary.registered_images, 1);
        assert_eq!(summary.mean_reprojection_error, None);
    }
}
