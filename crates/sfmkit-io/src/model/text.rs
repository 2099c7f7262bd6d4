use std::{
    fs::File,
    io::{BufRead, BufReader, ErrorKind},
    path::Path,
};

use crate::error::SfmIoError;
use crate::types::{Camera, CameraModelId, ColmapImage, Point2d, Point3d, TrackElement};

fn open_lines(path: &Path) -> Result<Vec<String>, SfmIoError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SfmIoError::NotFound(format!("{}", path.display())),
        _ => SfmIoError::Io(e),
    })?;
    Ok(BufReader::new(file).lines().collect::<Result<Vec<_>, _>>()?)
}

fn is_record(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with('#')
}

/// Read the cameras.txt file and return a vector of cameras.
///
/// # Arguments
///
/// * `path` - The path to the cameras.txt file.
pub fn read_cameras_txt(path: impl AsRef<Path>) -> Result<Vec<Camera>, SfmIoError> {
    open_lines(path.as_ref())?
        .iter()
        .filter(|line| is_record(line))
        .map(|line| parse_camera_line(line))
        .collect()
}

/// Read the points3D.txt file and return a vector of 3D points.
///
/// # Arguments
///
/// * `path` - The path to the points3D.txt file.
pub fn read_points3d_txt(path: impl AsRef<Path>) -> Result<Vec<Point3d>, SfmIoError> {
    open_lines(path.as_ref())?
        .iter()
        .filter(|line| is_record(line))
        .map(|line| parse_point3d_line(line))
        .collect()
}

/// Read the images.txt file and return a vector of registered images.
///
/// Every image line is followed by its observations line, which is empty for an
/// image without observations and may be missing for the last image.
///
/// # Arguments
///
/// * `path` - The path to the images.txt file.
pub fn read_images_txt(path: impl AsRef<Path>) -> Result<Vec<ColmapImage>, SfmIoError> {
    let lines = open_lines(path.as_ref())?;
    let mut images = Vec::new();

    let mut iter = lines.iter();
    while let Some(line) = iter.next() {
        if !is_record(line) {
            continue;
        }
        let observations = iter.next().map(String::as_str).unwrap_or_default();
        images.push(parse_image_line(line, observations)?);
    }

    Ok(images)
}

/// Utility functions for parsing text model files
fn parse_part<T: std::str::FromStr>(s: &str) -> Result<T, SfmIoError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| SfmIoError::MalformedRecord(format!("{s}: {e}")))
}

fn field<'a>(parts: &[&'a str], index: usize, line: &str) -> Result<&'a str, SfmIoError> {
    parts
        .get(index)
        .copied()
        .ok_or_else(|| SfmIoError::MalformedRecord(format!("too few fields in line: {line}")))
}

/// Parse a camera line `CAMERA_ID MODEL WIDTH HEIGHT PARAMS[]`.
fn parse_camera_line(line: &str) -> Result<Camera, SfmIoError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();

    let camera_id = parse_part(field(&parts, 0, line)?)?;
    let model_name = field(&parts, 1, line)?;
    let model = CameraModelId::from_name(model_name).ok_or_else(|| {
        SfmIoError::MalformedRecord(format!("unknown camera model {model_name}"))
    })?;
    let width = parse_part(field(&parts, 2, line)?)?;
    let height = parse_part(field(&parts, 3, line)?)?;

    let params = parts[4..]
        .iter()
        .map(|p| parse_part(p))
        .collect::<Result<Vec<f64>, _>>()?;

    // NOTE: the number of parameters depends on the camera model
    if Some(params.len()) != model.num_params() {
        return Err(SfmIoError::MalformedRecord(format!(
            "camera {camera_id} of model {model_name} has {} parameters",
            params.len()
        )));
    }

    Ok(Camera {
        camera_id,
        model,
        width,
        height,
        params,
    })
}

/// Parse an image line `IMAGE_ID QW QX QY QZ TX TY TZ CAMERA_ID NAME` and the
/// `(X, Y, POINT3D_ID)` triples that follow it.
fn parse_image_line(line: &str, observations: &str) -> Result<ColmapImage, SfmIoError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();
    if parts.len() < 10 {
        return Err(SfmIoError::MalformedRecord(format!(
            "too few fields in image line: {line}"
        )));
    }

    let image_id = parse_part(parts[0])?;
    let rotation = [
        parse_part(parts[1])?,
        parse_part(parts[2])?,
        parse_part(parts[3])?,
        parse_part(parts[4])?,
    ];
    let translation = [
        parse_part(parts[5])?,
        parse_part(parts[6])?,
        parse_part(parts[7])?,
    ];
    let camera_id = parse_part(parts[8])?;
    // names may contain spaces
    let name = parts[9..].join(" ");

    let values = observations.split_whitespace().collect::<Vec<_>>();
    if values.len() % 3 != 0 {
        return Err(SfmIoError::MalformedRecord(format!(
            "image {image_id} has an incomplete observation"
        )));
    }
    let points2d = values
        .chunks_exact(3)
        .map(|c| {
            Ok(Point2d::new(
                parse_part(c[0])?,
                parse_part(c[1])?,
                parse_part(c[2])?,
            ))
        })
        .collect::<Result<Vec<_>, SfmIoError>>()?;

    Ok(ColmapImage {
        image_id,
        name,
        camera_id,
        rotation,
        translation,
        points2d,
    })
}

/// Parse a point line `POINT3D_ID X Y Z R G B ERROR TRACK[] as (IMAGE_ID, POINT2D_IDX)`.
fn parse_point3d_line(line: &str) -> Result<Point3d, SfmIoError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();
    if parts.len() < 8 || (parts.len() - 8) % 2 != 0 {
        return Err(SfmIoError::MalformedRecord(format!(
            "invalid point line: {line}"
        )));
    }

    let track = parts[8..]
        .chunks_exact(2)
        .map(|c| {
            Ok(TrackElement {
                image_id: parse_part(c[0])?,
                point2d_idx: parse_part(c[1])?,
            })
        })
        .collect::<Result<Vec<_>, SfmIoError>>()?;

    Ok(Point3d {
        point3d_id: parse_part(parts[0])?,
        xyz: [
            parse_part(parts[1])?,
            parse_part(parts[2])?,
            parse_part(parts[3])?,
        ],
        rgb: [
            parse_part(parts[4])?,
            parse_part(parts[5])?,
            parse_part(parts[6])?,
        ],
        error: parse_part(parts[7])?,
        track,
    })
}
