use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sfmkit_io::types::{ImageRow, KeypointSet, MatchRecord};

use crate::error::ExportError;

/// Matched pixel coordinates of one image pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPair {
    /// First image id
    pub image_id1: u32,
    /// Second image id
    pub image_id2: u32,
    /// Camera of the first image
    pub camera_id1: u32,
    /// Camera of the second image
    pub camera_id2: u32,
    /// Name of the first image
    pub image_name1: String,
    /// Name of the second image
    pub image_name2: String,
    /// `[x1, y1, x2, y2]` per surviving index pair, in stored order
    pub coordinates: Vec<[f32; 4]>,
}

impl MatchPair {
    /// File name `matches_<stem1>_<stem2>.txt`.
    ///
    /// Only the extension of each image name is stripped; directory separators
    /// become `_`, so `cam0/x.jpg` gives `cam0_x`.
    pub fn file_name(&self) -> String {
        format!(
            "matches_{}_{}.txt",
            file_stem(&self.image_name1),
            file_stem(&self.image_name2)
        )
    }

    /// File name with the image ids appended, used when [`Self::file_name`] is taken.
    pub fn unique_file_name(&self) -> String {
        format!(
            "matches_{}_{}_{}_{}.txt",
            file_stem(&self.image_name1),
            file_stem(&self.image_name2),
            self.image_id1,
            self.image_id2
        )
    }
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .with_extension("")
        .to_string_lossy()
        .replace(['/', '\\'], "_")
}

/// Counters of a match pairing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Pairs read from the database
    pub total_pairs: usize,
    /// Pairs referring to an image that is not in the database
    pub missing_image: usize,
    /// Pairs with an image that has no keypoints
    pub missing_keypoints: usize,
    /// Index pairs dropped because they fall outside a keypoint set
    pub dropped_indices: usize,
    /// Pairs with fewer surviving coordinates than the minimum
    pub below_minimum: usize,
    /// Pairs kept for export
    pub exported: usize,
}

/// Resolve match records into pixel coordinates.
///
/// Pairs whose images or keypoints are missing are skipped, index pairs that fall
/// outside either keypoint set are dropped, and a pair is kept only when at least
/// `min_matches` (and at least one) coordinates survive.
pub fn pair_matches(
    images: &[ImageRow],
    keypoints: &[KeypointSet],
    records: &[MatchRecord],
    min_matches: usize,
) -> (Vec<MatchPair>, MatchStats) {
    let images = images
        .iter()
        .map(|i| (i.image_id, i))
        .collect::<HashMap<_, _>>();
    let keypoints = keypoints
        .iter()
        .map(|k| (k.image_id, k))
        .collect::<HashMap<_, _>>();

    let mut stats = MatchStats {
        total_pairs: records.len(),
        ..Default::default()
    };
    let mut pairs = Vec::new();

    for record in records {
        let (id1, id2) = (record.image_id1, record.image_id2);
        let (Some(image1), Some(image2)) = (images.get(&id1), images.get(&id2)) else {
            log::warn!("Matches {id1}-{id2} refer to an unknown image, skipping");
            stats.missing_image += 1;
            continue;
        };
        let (Some(kpts1), Some(kpts2)) = (keypoints.get(&id1), keypoints.get(&id2)) else {
            log::warn!("Matches {id1}-{id2} refer to an image without keypoints, skipping");
            stats.missing_keypoints += 1;
            continue;
        };

        let coordinates = record
            .matches
            .iter()
            .filter_map(|[i1, i2]| {
                let [x1, y1] = kpts1.xy(*i1 as usize)?;
                let [x2, y2] = kpts2.xy(*i2 as usize)?;
                Some([x1, y1, x2, y2])
            })
            .collect::<Vec<_>>();

        let dropped = record.len() - coordinates.len();
        if dropped > 0 {
            log::warn!("Dropped {dropped} out of range matches between {id1} and {id2}");
            stats.dropped_indices += dropped;
        }

        if coordinates.is_empty() || coordinates.len() < min_matches {
            log::debug!(
                "Pair {id1}-{id2} has {} matches, below {min_matches}",
                coordinates.len()
            );
            stats.below_minimum += 1;
            continue;
        }

        pairs.push(MatchPair {
            image_id1: id1,
            image_id2: id2,
            camera_id1: image1.camera_id,
            camera_id2: image2.camera_id,
            image_name1: image1.name.clone(),
            image_name2: image2.name.clone(),
            coordinates,
        });
    }

    stats.exported = pairs.len();
    log::info!(
        "Kept {} of {} match pairs (>= {min_matches} matches)",
        stats.exported,
        stats.total_pairs
    );

    (pairs, stats)
}

/// Write one match file: `camera_id1 camera_id2`, then `x1 y1 x2 y2` per line.
pub fn write_match_file<W: Write>(writer: &mut W, pair: &MatchPair) -> Result<(), ExportError> {
    writeln!(writer, "{} {}", pair.camera_id1, pair.camera_id2)?;
    for [x1, y1, x2, y2] in &pair.coordinates {
        writeln!(writer, "{x1:.6} {y1:.6} {x2:.6} {y2:.6}")?;
    }
    Ok(())
}

/// Write one file per pair into `folder`.
///
/// A pair whose file name was already written in this call gets the image ids
/// appended to its name instead of overwriting the earlier file.
///
/// # Returns
///
/// The paths of the written files, in pair order.
pub fn export_matches(
    folder: impl AsRef<Path>,
    pairs: &[MatchPair],
) -> Result<Vec<PathBuf>, ExportError> {
    let folder = folder.as_ref();
    let mut written = Vec::with_capacity(pairs.len());
    let mut taken = HashSet::with_capacity(pairs.len());

    for (i, pair) in pairs.iter().enumerate() {
        let mut name = pair.file_name();
        if !taken.insert(name.clone()) {
            let unique = pair.unique_file_name();
            log::warn!(
                "{name} already written, saving pair {}-{} as {unique}",
                pair.image_id1,
                pair.image_id2
            );
            if !taken.insert(unique.clone()) {
                return Err(ExportError::InvalidConfig(format!(
                    "match file name {unique} is not unique"
                )));
            }
            name = unique;
        }

        let path = folder.join(name);
        let mut writer = BufWriter::new(File::create(&path)?);
        write_match_file(&mut writer, pair)?;
        writer.flush()?;
        log::debug!(
            "[{:3}/{}] {} - {} match points",
            i + 1,
            pairs.len(),
            path.display(),
            pair.coordinates.len()
        );
        written.push(path);
    }

    Ok(written)
}
