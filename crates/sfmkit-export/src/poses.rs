use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sfmkit_io::types::Camera;

use crate::config::PoseFormat;
use crate::error::ExportError;
use crate::resolve::ResolvedImage;

/// Base name of the pose files, the extension follows the format.
pub const POSE_FILE_STEM: &str = "camera_poses";

const TXT_HEADER: &str = "\
# COLMAP Camera Pose Export File
# Format: image_name registration_status quaternion(w,x,y,z) translation(x,y,z) camera_center(x,y,z) euler_angles(roll,pitch,yaw)
# Registration status: 1=registered, 0=prior only
#
";

const CSV_HEADER: [&str; 16] = [
    "image_name",
    "camera_id",
    "is_registered",
    "qw",
    "qx",
    "qy",
    "qz",
    "tx",
    "ty",
    "tz",
    "camera_center_x",
    "camera_center_y",
    "camera_center_z",
    "roll_deg",
    "pitch_deg",
    "yaw_deg",
];

/// The numeric columns shared by the text and CSV exports, already formatted.
fn pose_fields(image: &ResolvedImage) -> Vec<String> {
    let pose = &image.pose;
    pose.quaternion()
        .iter()
        .chain(pose.translation().iter())
        .chain(pose.camera_center().iter())
        .map(|v| format!("{v:.8}"))
        .chain(pose.euler_angles_deg().iter().map(|v| format!("{v:.6}")))
        .collect()
}

/// Write the per-image text pose dump.
///
/// One header block, then one line per image:
/// `name flag qw qx qy qz tx ty tz cx cy cz roll pitch yaw`.
pub fn write_poses_txt<W: Write>(
    writer: &mut W,
    images: &[ResolvedImage],
) -> Result<(), ExportError> {
    writer.write_all(TXT_HEADER.as_bytes())?;
    for image in images {
        writeln!(
            writer,
            "{} {} {}",
            image.name,
            u8::from(image.is_registered),
            pose_fields(image).join(" ")
        )?;
    }
    Ok(())
}

/// Write the pose table as CSV with the same precision as the text dump.
pub fn write_poses_csv<W: Write>(writer: W, images: &[ResolvedImage]) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(CSV_HEADER)?;
    for image in images {
        let mut record = vec![
            image.name.clone(),
            image.camera_id.to_string(),
            u8::from(image.is_registered).to_string(),
        ];
        record.extend(pose_fields(image));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonCamera<'a> {
    model: i64,
    model_name: String,
    width: u64,
    height: u64,
    params: &'a [f64],
}

#[derive(Serialize)]
struct JsonPose<'a> {
    image_id: u32,
    image_name: &'a str,
    camera_id: u32,
    is_registered: bool,
    quaternion: [f64; 4],
    translation: [f64; 3],
    camera_center: [f64; 3],
    euler_angles: [f64; 3],
    rotation_matrix: [[f64; 3]; 3],
}

#[derive(Serialize)]
struct JsonMetadata {
    total_images: usize,
    registered_images: usize,
    coordinate_system: &'static str,
    quaternion_format: &'static str,
    translation_description: &'static str,
    camera_center_description: &'static str,
    euler_angles_unit: &'static str,
    euler_angles_order: &'static str,
}

#[derive(Serialize)]
struct JsonExport<'a> {
    cameras: BTreeMap<u32, JsonCamera<'a>>,
    poses: Vec<JsonPose<'a>>,
    metadata: JsonMetadata,
}

/// Write cameras, poses and provenance metadata as a pretty-printed JSON document.
///
/// Cameras are keyed by their id.
pub fn write_poses_json<W: Write>(
    writer: W,
    cameras: &[Camera],
    images: &[ResolvedImage],
) -> Result<(), ExportError> {
    let document = JsonExport {
        cameras: cameras
            .iter()
            .map(|c| {
                (
                    c.camera_id,
                    JsonCamera {
                        model: c.model.id(),
                        model_name: c.model.name(),
                        width: c.width,
                        height: c.height,
                        params: &c.params,
                    },
                )
            })
            .collect(),
        poses: images
            .iter()
            .map(|i| JsonPose {
                image_id: i.image_id,
                image_name: &i.name,
                camera_id: i.camera_id,
                is_registered: i.is_registered,
                quaternion: i.pose.quaternion(),
                translation: i.pose.translation(),
                camera_center: i.pose.camera_center(),
                euler_angles: i.pose.euler_angles_deg(),
                rotation_matrix: i.pose.rotation_matrix(),
            })
            .collect(),
        metadata: JsonMetadata {
            total_images: images.len(),
            registered_images: images.iter().filter(|i| i.is_registered).count(),
            coordinate_system: "COLMAP (right-handed coordinate system)",
            quaternion_format: "w,x,y,z",
            translation_description:
                "Translation from world coordinate system to camera coordinate system",
            camera_center_description: "Camera position in world coordinate system",
            euler_angles_unit: "degrees",
            euler_angles_order: "ZYX (roll, pitch, yaw)",
        },
    };

    serde_json::to_writer_pretty(writer, &document)?;
    Ok(())
}

/// Write the pose files selected by `format` into `folder`.
///
/// # Returns
///
/// The paths of the written files.
pub fn export_poses(
    folder: impl AsRef<Path>,
    format: PoseFormat,
    cameras: &[Camera],
    images: &[ResolvedImage],
) -> Result<Vec<PathBuf>, ExportError> {
    let folder = folder.as_ref();
    let mut written = Vec::new();

    if format.writes_txt() {
        let path = folder.join(format!("{POSE_FILE_STEM}.txt"));
        let mut writer = BufWriter::new(File::create(&path)?);
        write_poses_txt(&mut writer, images)?;
        writer.flush()?;
        log::debug!("Wrote {}", path.display());
        written.push(path);
    }

    if format.writes_csv() {
        let path = folder.join(format!("{POSE_FILE_STEM}.csv"));
        write_poses_csv(BufWriter::new(File::create(&path)?), images)?;
        log::debug!("Wrote {}", path.display());
        written.push(path);
    }

    if format.writes_json() {
        let path = folder.join(format!("{POSE_FILE_STEM}.json"));
        let mut writer = BufWriter::new(File::create(&path)?);
        write_poses_json(&mut writer, cameras, images)?;
        writer.flush()?;
        log::debug!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfmkit_geometry::Pose;
    use sfmkit_io::types::CameraModelId;

    fn images() -> Result<Vec<ResolvedImage>, Box<dyn std::error::Error>> {
        Ok(vec![
            ResolvedImage {
                image_id: 1,
                name: "a.jpg".to_string(),
                camera_id: 1,
                is_registered: true,
                pose: Pose::new([1.0, 0.0, 0.0, 0.0], [1.0, 2.0, 3.0])?,
            },
            ResolvedImage {
                image_id: 2,
                name: "b.jpg".to_string(),
                camera_id: 2,
                is_registered: false,
                pose: Pose::new([0.0, 0.0, 0.0, 2.0], [0.0, 0.0, 0.0])?,
            },
        ])
    }

    #[test]
    fn test_write_poses_txt() -> Result<(), Box<dyn std::error::Error>> {
        let mut buf = Vec::new();
        write_poses_txt(&mut buf, &images()?)?;
        let text = String::from_utf8(buf)?;
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "# COLMAP Camera Pose Export File");
        assert_eq!(lines[3], "#");
        assert!(lines[4].starts_with(
            "a.jpg 1 1.00000000 0.00000000 0.00000000 0.00000000 \
             1.00000000 2.00000000 3.00000000 \
             -1.00000000 -2.00000000 -3.00000000 "
        ));
        let angles = lines[4]
            .split(' ')
            .skip(12)
            .map(|v| v.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(angles, vec![0.0, 0.0, 0.0]);
        assert!(lines[5].starts_with("b.jpg 0 0.00000000 0.00000000 0.00000000 1.00000000 "));
        assert!(lines[5].ends_with(" 180.000000"));
        Ok(())
    }

    #[test]
    fn test_write_poses_csv() -> Result<(), Box<dyn std::error::Error>> {
        let mut buf = Vec::new();
        write_poses_csv(&mut buf, &images()?)?;
        let text = String::from_utf8(buf)?;
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "image_name,camera_id,is_registered,qw,qx,qy,qz,tx,ty,tz,\
             camera_center_x,camera_center_y,camera_center_z,roll_deg,pitch_deg,yaw_deg"
        );
        assert!(lines[1].starts_with("a.jpg,1,1,1.00000000,"));
        assert_eq!(lines[2].split(',').count(), 16);
        Ok(())
    }

    #[test]
    fn test_write_poses_json() -> Result<(), Box<dyn std::error::Error>> {
        let cameras = vec![Camera {
            camera_id: 1,
            model: CameraModelId::Pinhole,
            width: 640,
            height: 480,
            params: vec![500.0, 500.0, 320.0, 240.0],
        }];
        let mut buf = Vec::new();
        write_poses_json(&mut buf, &cameras, &images()?)?;

        let value: serde_json::Value = serde_json::from_slice(&buf)?;
        assert_eq!(value["metadata"]["total_images"], 2);
        assert_eq!(value["metadata"]["registered_images"], 1);
        assert_eq!(value["metadata"]["quaternion_format"], "w,x,y,z");
        assert_eq!(value["cameras"]["1"]["model_name"], "PINHOLE");
        assert_eq!(value["poses"][1]["image_name"], "b.jpg");
        assert_eq!(value["poses"][1]["is_registered"], false);
        Ok(())
    }

    #[test]
    fn test_export_poses_selection() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let written = export_poses(dir.path(), PoseFormat::Csv, &[], &images()?)?;
        assert_eq!(written, vec![dir.path().join("camera_poses.csv")]);

        let written = export_poses(dir.path(), PoseFormat::All, &[], &images()?)?;
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("camera_poses.json").is_file());
        Ok(())
    }
}
