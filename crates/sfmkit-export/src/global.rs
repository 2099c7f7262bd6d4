use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use sfmkit_geometry::rotation::to_column_major;

use crate::error::ExportError;
use crate::resolve::ResolvedImage;

/// File name of the global pose file resolved from the database.
pub const DATABASE_GLOBAL_POSE_FILE: &str = "global_pose.txt";

/// File name of the global pose file read from a sparse model.
pub const MODEL_GLOBAL_POSE_FILE: &str = "global_poses.txt";

/// Write the global pose table.
///
/// The first line is the number of images, then one line per image:
/// `name R00 R10 R20 R01 R11 R21 R02 R12 R22 tx ty tz` with the rotation in
/// column-major order.
pub fn write_global_poses<W: Write>(
    writer: &mut W,
    images: &[ResolvedImage],
) -> Result<(), ExportError> {
    writeln!(writer, "{}", images.len())?;
    for image in images {
        write!(writer, "{}", image.name)?;
        let r = to_column_major(&image.pose.rotation_matrix());
        for v in r.iter().chain(image.pose.translation().iter()) {
            write!(writer, " {v:.8}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write the global pose table to `path`.
pub fn export_global_poses(
    path: impl AsRef<Path>,
    images: &[ResolvedImage],
) -> Result<(), ExportError> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_global_poses(&mut writer, images)?;
    writer.flush()?;
    log::debug!("Wrote {} poses to {}", images.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfmkit_geometry::Pose;

    #[test]
    fn test_write_global_poses() -> Result<(), Box<dyn std::error::Error>> {
        // 90 degrees about z: R = [[0, -1, 0], [1, 0, 0], [0, 0, 1]]
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let images = vec![ResolvedImage {
            image_id: 1,
            name: "a.jpg".to_string(),
            camera_id: 1,
            is_registered: true,
            pose: Pose::new([h, 0.0, 0.0, h], [0.5, -1.0, 2.0])?,
        }];

        let mut buf = Vec::new();
        write_global_poses(&mut buf, &images)?;
        let text = String::from_utf8(buf)?;
        let mut lines = text.lines();

        assert_eq!(lines.next(), Some("1"));
        let line = lines.next().unwrap_or_default();
        let fields = line.split(' ').collect::<Vec<_>>();
        assert_eq!(fields.len(), 13);
        assert_eq!(fields[0], "a.jpg");

        let values = fields[1..]
            .iter()
            .map(|v| v.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()?;
        let expected = [0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.5, -1.0, 2.0];
        for (v, e) in values.iter().zip(expected) {
            approx::assert_abs_diff_eq!(*v, e, epsilon = 1e-8);
        }
        assert!(fields[10..].iter().all(|v| v.split('.').nth(1).map(str::len) == Some(8)));
        assert_eq!(lines.next(), None);
        Ok(())
    }

    #[test]
    fn test_export_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(DATABASE_GLOBAL_POSE_FILE);
        export_global_poses(&path, &[])?;
        assert_eq!(std::fs::read_to_string(path)?, "0\n");
        Ok(())
    }
}
