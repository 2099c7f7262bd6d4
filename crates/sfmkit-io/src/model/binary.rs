use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::SfmIoError;
use crate::types::{Camera, CameraModelId, ColmapImage, Point2d, Point3d, TrackElement};

// cap on up-front allocations driven by counts read from the file
const MAX_PREALLOC: usize = 1 << 16;

/// Little-endian reader that reports truncation as a malformed record.
struct RecordReader<R: Read> {
    inner: R,
    what: &'static str,
}

impl<R: Read> RecordReader<R> {
    fn new(inner: R, what: &'static str) -> Self {
        Self { inner, what }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SfmIoError> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => SfmIoError::MalformedRecord(format!(
                "{} ended before all declared records were read",
                self.what
            )),
            _ => SfmIoError::Io(e),
        })?;
        Ok(buf)
    }

    fn read_u8(&mut self) -> Result<u8, SfmIoError> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_i32(&mut self) -> Result<i32, SfmIoError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, SfmIoError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, SfmIoError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    fn read_f64(&mut self) -> Result<f64, SfmIoError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    fn read_f64_array<const N: usize>(&mut self) -> Result<[f64; N], SfmIoError> {
        let mut out = [0.0; N];
        for v in out.iter_mut() {
            *v = self.read_f64()?;
        }
        Ok(out)
    }

    fn read_id(&mut self, field: &str) -> Result<u32, SfmIoError> {
        let value = self.read_i32()?;
        u32::try_from(value).map_err(|_| {
            SfmIoError::MalformedRecord(format!("{}: negative {field} {value}", self.what))
        })
    }

    fn read_count(&mut self) -> Result<usize, SfmIoError> {
        let count = self.read_u64()?;
        usize::try_from(count).map_err(|_| {
            SfmIoError::MalformedRecord(format!("{}: count {count} overflows", self.what))
        })
    }

    /// Read bytes up to a zero terminator, which is consumed but not returned.
    fn read_cstring(&mut self) -> Result<String, SfmIoError> {
        let mut bytes = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|e| {
            SfmIoError::MalformedRecord(format!("{}: name is not utf-8: {e}", self.what))
        })
    }
}

fn open(path: &Path, what: &'static str) -> Result<RecordReader<BufReader<File>>, SfmIoError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SfmIoError::NotFound(format!("{}", path.display())),
        _ => SfmIoError::Io(e),
    })?;
    Ok(RecordReader::new(BufReader::new(file), what))
}

/// Read the cameras.bin file and return a vector of cameras.
///
/// # Arguments
///
/// * `path` - The path to the cameras.bin file.
pub fn read_cameras_bin(path: impl AsRef<Path>) -> Result<Vec<Camera>, SfmIoError> {
    read_cameras_from(open(path.as_ref(), "cameras.bin")?)
}

fn read_cameras_from<R: Read>(mut reader: RecordReader<R>) -> Result<Vec<Camera>, SfmIoError> {
    let num_cameras = reader.read_count()?;
    let mut cameras = Vec::with_capacity(num_cameras.min(MAX_PREALLOC));

    for _ in 0..num_cameras {
        let camera_id = reader.read_id("camera_id")?;
        let model = CameraModelId::from_id(reader.read_i32()? as i64);
        let width = reader.read_u64()?;
        let height = reader.read_u64()?;

        // the record length depends on the model, an unknown model stops the stream
        let num_params = model.num_params().ok_or_else(|| {
            SfmIoError::MalformedRecord(format!(
                "camera {camera_id} uses unknown model {}",
                model.name()
            ))
        })?;
        let params = (0..num_params)
            .map(|_| reader.read_f64())
            .collect::<Result<Vec<_>, _>>()?;

        cameras.push(Camera {
            camera_id,
            model,
            width,
            height,
            params,
        });
    }

    Ok(cameras)
}

/// Read the images.bin file and return a vector of registered images.
///
/// Each record is a 64-byte header `(image_id: i32, qw qx qy qz tx ty tz: f64,
/// camera_id: i32)`, a zero-terminated name, a u64 observation count and that many
/// `(x: f64, y: f64, point3d_id: i64)` triples.
///
/// # Arguments
///
/// * `path` - The path to the images.bin file.
pub fn read_images_bin(path: impl AsRef<Path>) -> Result<Vec<ColmapImage>, SfmIoError> {
    read_images_from(open(path.as_ref(), "images.bin")?)
}

fn read_images_from<R: Read>(mut reader: RecordReader<R>) -> Result<Vec<ColmapImage>, SfmIoError> {
    let num_images = reader.read_count()?;
    let mut images = Vec::with_capacity(num_images.min(MAX_PREALLOC));

    for _ in 0..num_images {
        let image_id = reader.read_id("image_id")?;
        let rotation = reader.read_f64_array::<4>()?;
        let translation = reader.read_f64_array::<3>()?;
        let camera_id = reader.read_id("camera_id")?;
        let name = reader.read_cstring()?;

        let num_points2d = reader.read_count()?;
        let mut points2d = Vec::with_capacity(num_points2d.min(MAX_PREALLOC));
        for _ in 0..num_points2d {
            let x = reader.read_f64()?;
            let y = reader.read_f64()?;
            let point3d_id = reader.read_i64()?;
            points2d.push(Point2d::new(x, y, point3d_id));
        }

        images.push(ColmapImage {
            image_id,
            name,
            camera_id,
            rotation,
            translation,
            points2d,
        });
    }

    Ok(images)
}

/// Read the points3D.bin file and return a vector of 3D points.
///
/// # Arguments
///
/// * `path` - The path to the points3D.bin file.
pub fn read_points3d_bin(path: impl AsRef<Path>) -> Result<Vec<Point3d>, SfmIoError> {
    read_points3d_from(open(path.as_ref(), "points3D.bin")?)
}

fn read_points3d_from<R: Read>(mut reader: RecordReader<R>) -> Result<Vec<Point3d>, SfmIoError> {
    let num_points = reader.read_count()?;
    let mut points = Vec::with_capacity(num_points.min(MAX_PREALLOC));

    for _ in 0..num_points {
        let point3d_id = reader.read_u64()?;
        let xyz = reader.read_f64_array::<3>()?;
        let rgb = [reader.read_u8()?, reader.read_u8()?, reader.read_u8()?];
        let error = reader.read_f64()?;

        let track_length = reader.read_count()?;
        let track = (0..track_length)
            .map(|_| {
                Ok(TrackElement {
                    image_id: reader.read_id("track image_id")?,
                    point2d_idx: reader.read_id("track point2d_idx")?,
                })
            })
            .collect::<Result<Vec<_>, SfmIoError>>()?;

        points.push(Point3d {
            point3d_id,
            xyz,
            rgb,
            error,
            track,
        });
    }

    Ok(points)
}
