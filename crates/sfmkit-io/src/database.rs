use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::blob::{decode_blob, decode_flat_blob};
use crate::error::SfmIoError;
use crate::pair_id::{decode_pair_id, image_ids_to_pair_id};
use crate::types::{
    Camera, CameraModelId, DescriptorSet, ImageRow, KeypointSet, MatchRecord,
};

/// Pose columns of the `images` table, in [`ImageRow`] field order.
const IMAGE_POSE_COLUMNS: [&str; 14] = [
    "prior_qw", "prior_qx", "prior_qy", "prior_qz", "prior_tx", "prior_ty", "prior_tz", "qw",
    "qx", "qy", "qz", "tx", "ty", "tz",
];

/// Records read from one table, together with the number of rows that were skipped.
#[derive(Debug, Clone)]
pub struct TableRead<T> {
    /// Records decoded successfully, in table order.
    pub records: Vec<T>,
    /// Rows that failed to decode and were skipped.
    pub skipped: usize,
}

impl<T> Default for TableRead<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }
}

impl<T> TableRead<T> {
    fn push(&mut self, table: &str, row: Result<T, SfmIoError>) {
        match row {
            Ok(record) => self.records.push(record),
            Err(e) => {
                log::warn!("Skipping a row of table `{table}`: {e}");
                self.skipped += 1;
            }
        }
    }
}

struct RawCameraRow {
    camera_id: i64,
    model: i64,
    width: i64,
    height: i64,
    params: Option<Vec<u8>>,
}

struct RawBlobRow {
    key: i64,
    rows: i64,
    cols: i64,
    data: Option<Vec<u8>>,
}

fn to_id(value: i64, what: &str) -> Result<u32, SfmIoError> {
    u32::try_from(value)
        .map_err(|_| SfmIoError::Decode(format!("{what} {value} is not a valid id")))
}

fn to_size(value: i64, what: &str) -> Result<u64, SfmIoError> {
    u64::try_from(value).map_err(|_| SfmIoError::Decode(format!("{what} {value} is negative")))
}

/// A read-only handle to a COLMAP feature database.
///
/// The underlying connection is closed when the handle is dropped, on every exit path.
pub struct ColmapDatabase {
    connection: Connection,
    path: PathBuf,
    image_columns: HashSet<String>,
}

impl ColmapDatabase {
    /// Open the database read-only.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the `.db` file.
    ///
    /// # Returns
    ///
    /// The database handle, or [`SfmIoError::NotFound`] when the file or one of the
    /// required tables is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SfmIoError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SfmIoError::NotFound(format!(
                "database file {}",
                path.display()
            )));
        }

        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let mut db = Self {
            connection,
            path: path.to_path_buf(),
            image_columns: HashSet::new(),
        };

        for table in ["cameras", "images", "keypoints", "descriptors", "matches"] {
            db.ensure_table(table)?;
        }
        db.image_columns = db.table_columns("images")?;

        log::info!("Opened database {}", db.path.display());

        Ok(db)
    }

    /// The path the database was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_table(&self, table: &str) -> Result<(), SfmIoError> {
        let exists = self
            .connection
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .optional()?;
        exists.ok_or_else(|| SfmIoError::NotFound(format!("table `{table}`")))
    }

    fn table_columns(&self, table: &str) -> Result<HashSet<String>, SfmIoError> {
        let mut stmt = self
            .connection
            .prepare("SELECT name FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(columns)
    }

    /// Whether the `images` table stores the given pose column.
    pub fn has_image_column(&self, column: &str) -> bool {
        self.image_columns.contains(column)
    }

    /// Read the `cameras` table.
    pub fn read_cameras(&self) -> Result<TableRead<Camera>, SfmIoError> {
        let mut stmt = self
            .connection
            .prepare("SELECT camera_id, model, width, height, params FROM cameras")?;
        let rows = stmt.query_map([], |row| {
            Ok(RawCameraRow {
                camera_id: row.get(0)?,
                model: row.get(1)?,
                width: row.get(2)?,
                height: row.get(3)?,
                params: row.get(4)?,
            })
        })?;

        let mut cameras = TableRead::default();
        for row in rows {
            cameras.push("cameras", row.map_err(SfmIoError::from).and_then(decode_camera));
        }

        log::info!("Read {} cameras", cameras.records.len());
        Ok(cameras)
    }

    /// Read the `images` table with all the pose columns the schema provides.
    ///
    /// Pose columns missing from the schema are read as NULL.
    pub fn read_images(&self) -> Result<TableRead<ImageRow>, SfmIoError> {
        // column names come from a fixed list, never from user input
        let pose_columns = IMAGE_POSE_COLUMNS
            .iter()
            .map(|c| {
                if self.has_image_column(c) {
                    c.to_string()
                } else {
                    format!("NULL AS {c}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT image_id, name, camera_id, {pose_columns} FROM images");

        let mut stmt = self.connection.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let pose = |i: usize| row.get::<_, Option<f64>>(3 + i);
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                ImageRow {
                    prior_qw: pose(0)?,
                    prior_qx: pose(1)?,
                    prior_qy: pose(2)?,
                    prior_qz: pose(3)?,
                    prior_tx: pose(4)?,
                    prior_ty: pose(5)?,
                    prior_tz: pose(6)?,
                    qw: pose(7)?,
                    qx: pose(8)?,
                    qy: pose(9)?,
                    qz: pose(10)?,
                    tx: pose(11)?,
                    ty: pose(12)?,
                    tz: pose(13)?,
                    ..Default::default()
                },
            ))
        })?;

        let mut images = TableRead::default();
        for row in rows {
            let image = row.map_err(SfmIoError::from).and_then(|(image_id, name, camera_id, row)| {
                Ok(ImageRow {
                    image_id: to_id(image_id, "image_id")?,
                    name,
                    camera_id: to_id(camera_id, "camera_id")?,
                    ..row
                })
            });
            images.push("images", image);
        }

        log::info!("Read {} images", images.records.len());
        Ok(images)
    }

    fn read_blob_rows(&self, sql: &str) -> Result<Vec<Result<RawBlobRow, SfmIoError>>, SfmIoError> {
        let mut stmt = self.connection.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawBlobRow {
                    key: row.get(0)?,
                    rows: row.get(1)?,
                    cols: row.get(2)?,
                    data: row.get(3)?,
                })
            })?
            .map(|row| row.map_err(SfmIoError::from))
            .collect();
        Ok(rows)
    }

    /// Read the keypoints of every image.
    pub fn read_all_keypoints(&self) -> Result<TableRead<KeypointSet>, SfmIoError> {
        let mut keypoints = TableRead::default();
        for row in self.read_blob_rows("SELECT image_id, rows, cols, data FROM keypoints")? {
            keypoints.push("keypoints", row.and_then(decode_keypoints));
        }
        log::info!("Read keypoints for {} images", keypoints.records.len());
        Ok(keypoints)
    }

    /// Read the descriptors of every image.
    pub fn read_all_descriptors(&self) -> Result<TableRead<DescriptorSet<u8>>, SfmIoError> {
        let mut descriptors = TableRead::default();
        for row in self.read_blob_rows("SELECT image_id, rows, cols, data FROM descriptors")? {
            descriptors.push("descriptors", row.and_then(decode_descriptors));
        }
        log::info!("Read descriptors for {} images", descriptors.records.len());
        Ok(descriptors)
    }

    /// Read every non-empty row of the `matches` table.
    pub fn read_all_matches(&self) -> Result<TableRead<MatchRecord>, SfmIoError> {
        let mut matches = TableRead::default();
        let sql = "SELECT pair_id, rows, cols, data FROM matches WHERE rows > 0";
        for row in self.read_blob_rows(sql)? {
            matches.push("matches", row.and_then(decode_matches));
        }
        log::info!("Read matches for {} image pairs", matches.records.len());
        Ok(matches)
    }

    fn read_blob_row(&self, sql: &str, key: i64) -> Result<Option<RawBlobRow>, SfmIoError> {
        let row = self
            .connection
            .query_row(sql, [key], |row| {
                Ok(RawBlobRow {
                    key: row.get(0)?,
                    rows: row.get(1)?,
                    cols: row.get(2)?,
                    data: row.get(3)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    /// Read the keypoints of one image, `None` if the image has no row.
    pub fn read_keypoints(&self, image_id: u32) -> Result<Option<KeypointSet>, SfmIoError> {
        self.read_blob_row(
            "SELECT image_id, rows, cols, data FROM keypoints WHERE image_id = ?1",
            image_id as i64,
        )?
        .map(decode_keypoints)
        .transpose()
    }

    /// Read the descriptors of one image, `None` if the image has no row.
    pub fn read_descriptors(&self, image_id: u32) -> Result<Option<DescriptorSet<u8>>, SfmIoError> {
        self.read_blob_row(
            "SELECT image_id, rows, cols, data FROM descriptors WHERE image_id = ?1",
            image_id as i64,
        )?
        .map(decode_descriptors)
        .transpose()
    }

    /// Read the matches between two images given in any order.
    ///
    /// The ids of the returned record are in pair id order, smaller id first.
    pub fn read_matches_for_pair(
        &self,
        image_id1: u32,
        image_id2: u32,
    ) -> Result<Option<MatchRecord>, SfmIoError> {
        let pair_id = image_ids_to_pair_id(image_id1, image_id2)?;
        let pair_id = i64::try_from(pair_id)
            .map_err(|_| SfmIoError::Range(format!("pair id {pair_id} overflows")))?;
        self.read_blob_row(
            "SELECT pair_id, rows, cols, data FROM matches WHERE pair_id = ?1",
            pair_id,
        )?
        .map(decode_matches)
        .transpose()
    }
}

fn decode_camera(row: RawCameraRow) -> Result<Camera, SfmIoError> {
    let camera_id = to_id(row.camera_id, "camera_id")?;
    let model = CameraModelId::from_id(row.model);
    let params = decode_flat_blob::<f64>(row.params.as_deref())?;

    if let Some(expected) = model.num_params() {
        if expected != params.len() {
            log::warn!(
                "Camera {camera_id} ({}) has {} parameters, expected {expected}",
                model.name(),
                params.len()
            );
        }
    }

    Ok(Camera {
        camera_id,
        model,
        width: to_size(row.width, "width")?,
        height: to_size(row.height, "height")?,
        params,
    })
}

fn decode_keypoints(row: RawBlobRow) -> Result<KeypointSet, SfmIoError> {
    let image_id = to_id(row.key, "image_id")?;
    let array = decode_blob::<f32>(row.data.as_deref(), row.rows, row.cols)
        .map_err(|e| SfmIoError::Decode(format!("keypoints of image {image_id}: {e}")))?;
    KeypointSet::from_blob(image_id, &array)
}

fn decode_descriptors(row: RawBlobRow) -> Result<DescriptorSet<u8>, SfmIoError> {
    let image_id = to_id(row.key, "image_id")?;
    let array = decode_blob::<u8>(row.data.as_deref(), row.rows, row.cols)
        .map_err(|e| SfmIoError::Decode(format!("descriptors of image {image_id}: {e}")))?;
    Ok(DescriptorSet::from((image_id, array)))
}

fn decode_matches(row: RawBlobRow) -> Result<MatchRecord, SfmIoError> {
    let (image_id1, image_id2) = decode_pair_id(row.key)?;
    let array = decode_blob::<u32>(row.data.as_deref(), row.rows, row.cols).map_err(|e| {
        SfmIoError::Decode(format!("matches of pair {image_id1}-{image_id2}: {e}"))
    })?;
    if array.rows > 0 && array.cols != 2 {
        return Err(SfmIoError::Decode(format!(
            "matches of pair {image_id1}-{image_id2} have {} columns, expected 2",
            array.cols
        )));
    }

    Ok(MatchRecord {
        image_id1,
        image_id2,
        matches: array.row_iter().map(|r| [r[0], r[1]]).collect(),
    })
}
