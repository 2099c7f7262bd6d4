use crate::blob::BlobArray;
use crate::error::SfmIoError;

/// Represents a COLMAP camera model id.
///
/// Ids outside the known set are kept as [`CameraModelId::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraModelId {
    /// Simple pinhole camera model: f, cx, cy
    SimplePinhole,
    /// Pinhole camera model: fx, fy, cx, cy
    Pinhole,
    /// Simplified radial camera model: f, cx, cy, k
    SimpleRadial,
    /// Radial camera model: f, cx, cy, k1, k2
    Radial,
    /// OpenCV camera model: fx, fy, cx, cy, k1, k2, p1, p2
    OpenCV,
    /// OpenCV fisheye camera model: fx, fy, cx, cy, k1, k2, k3, k4
    OpenCVFisheye,
    /// Full OpenCV camera model: fx, fy, cx, cy, k1, k2, p1, p2, k3, k4, k5, k6
    FullOpenCV,
    /// Field of view camera model: fx, fy, cx, cy, omega
    Fov,
    /// Simple radial fisheye camera model: f, cx, cy, k
    SimpleRadialFisheye,
    /// Radial fisheye camera model: f, cx, cy, k1, k2
    RadialFisheye,
    /// Thin prism fisheye camera model: fx, fy, cx, cy, k1, k2, p1, p2, k3, k4, sx1, sy1
    ThinPrismFisheye,
    /// A model id this crate does not know about.
    Unknown(i64),
}

const KNOWN_MODELS: [(CameraModelId, i64, &str, usize); 11] = [
    (CameraModelId::SimplePinhole, 0, "SIMPLE_PINHOLE", 3),
    (CameraModelId::Pinhole, 1, "PINHOLE", 4),
    (CameraModelId::SimpleRadial, 2, "SIMPLE_RADIAL", 4),
    (CameraModelId::Radial, 3, "RADIAL", 5),
    (CameraModelId::OpenCV, 4, "OPENCV", 8),
    (CameraModelId::OpenCVFisheye, 5, "OPENCV_FISHEYE", 8),
    (CameraModelId::FullOpenCV, 6, "FULL_OPENCV", 12),
    (CameraModelId::Fov, 7, "FOV", 5),
    (CameraModelId::SimpleRadialFisheye, 8, "SIMPLE_RADIAL_FISHEYE", 4),
    (CameraModelId::RadialFisheye, 9, "RADIAL_FISHEYE", 5),
    (CameraModelId::ThinPrismFisheye, 10, "THIN_PRISM_FISHEYE", 12),
];

impl CameraModelId {
    /// Map a numeric model id; unknown ids are preserved.
    pub fn from_id(id: i64) -> Self {
        KNOWN_MODELS
            .iter()
            .find(|(_, known, _, _)| *known == id)
            .map(|(model, _, _, _)| *model)
            .unwrap_or(CameraModelId::Unknown(id))
    }

    /// Map a model name such as `PINHOLE`.
    pub fn from_name(name: &str) -> Option<Self> {
        KNOWN_MODELS
            .iter()
            .find(|(_, _, known, _)| *known == name)
            .map(|(model, _, _, _)| *model)
    }

    /// The numeric model id.
    pub fn id(&self) -> i64 {
        match self {
            CameraModelId::Unknown(id) => *id,
            model => KNOWN_MODELS
                .iter()
                .find(|(known, _, _, _)| known == model)
                .map(|(_, id, _, _)| *id)
                .unwrap_or(-1),
        }
    }

    /// The model name, `UNKNOWN_<id>` for unknown ids.
    pub fn name(&self) -> String {
        match self {
            CameraModelId::Unknown(id) => format!("UNKNOWN_{id}"),
            model => KNOWN_MODELS
                .iter()
                .find(|(known, _, _, _)| known == model)
                .map(|(_, _, name, _)| name.to_string())
                .unwrap_or_default(),
        }
    }

    /// Number of intrinsic parameters of the model, `None` if unknown.
    pub fn num_params(&self) -> Option<usize> {
        KNOWN_MODELS
            .iter()
            .find(|(known, _, _, _)| known == self)
            .map(|(_, _, _, n)| *n)
    }
}

/// Represents a camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera id
    pub camera_id: u32,
    /// Camera model id
    pub model: CameraModelId,
    /// Image width
    pub width: u64,
    /// Image height
    pub height: u64,
    /// Camera parameters, layout given by the model
    pub params: Vec<f64>,
}

/// Look up a camera by id.
///
/// Images only refer to cameras by id, so a dangling reference surfaces here as
/// [`SfmIoError::NotFound`].
pub fn find_camera(cameras: &[Camera], camera_id: u32) -> Result<&Camera, SfmIoError> {
    cameras
        .iter()
        .find(|c| c.camera_id == camera_id)
        .ok_or_else(|| SfmIoError::NotFound(format!("camera {camera_id}")))
}

/// A row of the database `images` table with every pose column optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageRow {
    /// Image id
    pub image_id: u32,
    /// Image name, unique in the database
    pub name: String,
    /// Camera id
    pub camera_id: u32,
    /// Prior quaternion w
    pub prior_qw: Option<f64>,
    /// Prior quaternion x
    pub prior_qx: Option<f64>,
    /// Prior quaternion y
    pub prior_qy: Option<f64>,
    /// Prior quaternion z
    pub prior_qz: Option<f64>,
    /// Prior translation x
    pub prior_tx: Option<f64>,
    /// Prior translation y
    pub prior_ty: Option<f64>,
    /// Prior translation z
    pub prior_tz: Option<f64>,
    /// Optimized quaternion w
    pub qw: Option<f64>,
    /// Optimized quaternion x
    pub qx: Option<f64>,
    /// Optimized quaternion y
    pub qy: Option<f64>,
    /// Optimized quaternion z
    pub qz: Option<f64>,
    /// Optimized translation x
    pub tx: Option<f64>,
    /// Optimized translation y
    pub ty: Option<f64>,
    /// Optimized translation z
    pub tz: Option<f64>,
}

impl ImageRow {
    /// The optimized pose, only if all seven fields are set.
    pub fn optimized_pose(&self) -> Option<([f64; 4], [f64; 3])> {
        Some((
            [self.qw?, self.qx?, self.qy?, self.qz?],
            [self.tx?, self.ty?, self.tz?],
        ))
    }

    /// The prior pose, if all four quaternion fields are set.
    ///
    /// Missing translation components default to zero.
    pub fn prior_pose(&self) -> Option<([f64; 4], [f64; 3])> {
        Some((
            [self.prior_qw?, self.prior_qx?, self.prior_qy?, self.prior_qz?],
            [
                self.prior_tx.unwrap_or(0.0),
                self.prior_ty.unwrap_or(0.0),
                self.prior_tz.unwrap_or(0.0),
            ],
        ))
    }
}

/// A 2D observation of a registered image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2d {
    /// Pixel coordinates
    pub xy: [f64; 2],
    /// Observed 3D point, `None` when the keypoint is not triangulated
    pub point3d_id: Option<u64>,
}

impl Point2d {
    /// Build an observation from the on-disk id where `-1` means "no point".
    pub fn new(x: f64, y: f64, point3d_id: i64) -> Self {
        Self {
            xy: [x, y],
            point3d_id: u64::try_from(point3d_id).ok(),
        }
    }
}

/// Represents a registered image of a sparse model.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapImage {
    /// Image id
    pub image_id: u32,
    /// Image name
    pub name: String,
    /// Camera id
    pub camera_id: u32,
    /// Rotation
    pub rotation: [f64; 4], // qw, qx, qy, qz
    /// Translation
    pub translation: [f64; 3], // x, y, z
    /// Observations
    pub points2d: Vec<Point2d>,
}

impl ColmapImage {
    /// Number of observations that are triangulated.
    pub fn num_points3d(&self) -> usize {
        self.points2d
            .iter()
            .filter(|p| p.point3d_id.is_some())
            .count()
    }
}

/// An element of a 3D point track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackElement {
    /// Image id
    pub image_id: u32,
    /// Index of the observation in the image
    pub point2d_idx: u32,
}

/// Represents a 3D point of a sparse model.
#[derive(Debug, Clone, PartialEq)]
pub struct Point3d {
    /// Point3d id
    pub point3d_id: u64,
    /// x, y, z coordinates
    pub xyz: [f64; 3],
    /// rgb color
    pub rgb: [u8; 3],
    /// Reprojection error
    pub error: f64,
    /// Track
    pub track: Vec<TrackElement>,
}

/// A 2D feature location.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    /// x pixel coordinate
    pub x: f32,
    /// y pixel coordinate
    pub y: f32,
    /// Feature scale, when the encoding carries it
    pub scale: Option<f32>,
    /// Feature orientation in radians, when the encoding carries it
    pub orientation: Option<f32>,
    /// Detector response, when the encoding carries it
    pub response: Option<f32>,
}

/// The keypoints of one image.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeypointSet {
    /// Image id
    pub image_id: u32,
    /// Keypoints in index order
    pub keypoints: Vec<Keypoint>,
}

impl KeypointSet {
    /// Build the set from a decoded `keypoints` blob.
    ///
    /// Supported layouts are 2 columns `(x, y)`, 4 columns `(x, y, scale, orientation)`
    /// and 6 columns `(x, y, a11, a12, a21, a22)`.
    pub fn from_blob(image_id: u32, array: &BlobArray<f32>) -> Result<Self, SfmIoError> {
        let keypoints = match array.cols {
            2 => array
                .row_iter()
                .map(|r| Keypoint {
                    x: r[0],
                    y: r[1],
                    ..Default::default()
                })
                .collect(),
            4 => array
                .row_iter()
                .map(|r| Keypoint {
                    x: r[0],
                    y: r[1],
                    scale: Some(r[2]),
                    orientation: Some(r[3]),
                    response: None,
                })
                .collect(),
            6 => array
                .row_iter()
                .map(|r| {
                    let (a11, a12, a21, a22) = (r[2], r[3], r[4], r[5]);
                    let scale_x = (a11 * a11 + a21 * a21).sqrt();
                    let scale_y = (a12 * a12 + a22 * a22).sqrt();
                    Keypoint {
                        x: r[0],
                        y: r[1],
                        scale: Some((scale_x + scale_y) / 2.0),
                        orientation: Some(a21.atan2(a11)),
                        response: None,
                    }
                })
                .collect(),
            0 if array.rows == 0 => Vec::new(),
            cols => {
                return Err(SfmIoError::Decode(format!(
                    "keypoints of image {image_id} have an unsupported column count {cols}"
                )))
            }
        };

        Ok(Self {
            image_id,
            keypoints,
        })
    }

    /// Number of keypoints.
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Pixel coordinates of a keypoint, `None` if the index is out of range.
    pub fn xy(&self, index: usize) -> Option<[f32; 2]> {
        self.keypoints.get(index).map(|k| [k.x, k.y])
    }
}

/// Fixed-dimension descriptors of one image, index-aligned with its keypoints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DescriptorSet<T> {
    /// Image id
    pub image_id: u32,
    /// Descriptor dimension
    pub dim: usize,
    /// Row-major descriptor values
    pub data: Vec<T>,
}

impl<T> DescriptorSet<T> {
    /// Number of descriptors.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow one descriptor.
    pub fn get(&self, index: usize) -> Option<&[T]> {
        if index >= self.len() {
            return None;
        }
        Some(&self.data[index * self.dim..(index + 1) * self.dim])
    }
}

impl<T: crate::blob::BlobElement> From<(u32, BlobArray<T>)> for DescriptorSet<T> {
    fn from((image_id, array): (u32, BlobArray<T>)) -> Self {
        Self {
            image_id,
            dim: array.cols,
            data: array.data,
        }
    }
}

/// Check that a descriptor set has one descriptor per keypoint.
pub fn check_features_aligned<T>(
    keypoints: &KeypointSet,
    descriptors: &DescriptorSet<T>,
) -> Result<(), SfmIoError> {
    if keypoints.len() != descriptors.len() {
        return Err(SfmIoError::Decode(format!(
            "image {} has {} keypoints but {} descriptors",
            keypoints.image_id,
            keypoints.len(),
            descriptors.len()
        )));
    }
    Ok(())
}

/// Feature matches between two images.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    /// First image id
    pub image_id1: u32,
    /// Second image id
    pub image_id2: u32,
    /// Keypoint index pairs `[index in image 1, index in image 2]`, in stored order
    pub matches: Vec<[u32; 2]>,
}

impl MatchRecord {
    /// Number of index pairs.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether the record holds no index pairs.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
