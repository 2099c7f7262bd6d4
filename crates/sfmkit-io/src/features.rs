use std::{
    fs::File,
    io::{BufRead, BufReader, ErrorKind},
    path::Path,
};

use crate::error::SfmIoError;
use crate::types::{DescriptorSet, Keypoint, KeypointSet, MatchRecord};

fn open(path: &Path) -> Result<BufReader<File>, SfmIoError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SfmIoError::NotFound(format!("{}", path.display())),
        _ => SfmIoError::Io(e),
    })?;
    Ok(BufReader::new(file))
}

fn parse_value<T: std::str::FromStr>(s: &str, path: &Path) -> Result<T, SfmIoError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| SfmIoError::Decode(format!("{}: {s}: {e}", path.display())))
}

/// Read a keypoint/descriptor file written by an external feature extractor.
///
/// The first line holds the feature count, each following line one feature as
/// `x y scale orientation score desc0 ... descN`. Lines with fewer than five fields
/// are skipped and at most `count` features are read.
///
/// # Arguments
///
/// * `path` - The path to the feature file.
/// * `image_id` - The id of the image the features belong to.
///
/// # Returns
///
/// The keypoints and the index-aligned descriptors. All descriptors must have the
/// same dimension.
pub fn read_feature_file(
    path: impl AsRef<Path>,
    image_id: u32,
) -> Result<(KeypointSet, DescriptorSet<f32>), SfmIoError> {
    let path = path.as_ref();
    let mut lines = open(path)?.lines();

    let count = match lines.next() {
        Some(line) => parse_value::<usize>(line?.trim(), path)?,
        None => {
            return Err(SfmIoError::Decode(format!(
                "{} has no feature count",
                path.display()
            )))
        }
    };

    let mut keypoints = Vec::with_capacity(count.min(1 << 16));
    let mut descriptors = DescriptorSet {
        image_id,
        dim: 0,
        data: Vec::new(),
    };

    for line in lines {
        if keypoints.len() >= count {
            break;
        }
        let line = line?;
        let parts = line.split_whitespace().collect::<Vec<_>>();
        if parts.len() < 5 {
            continue;
        }

        keypoints.push(Keypoint {
            x: parse_value(parts[0], path)?,
            y: parse_value(parts[1], path)?,
            scale: Some(parse_value(parts[2], path)?),
            orientation: Some(parse_value(parts[3], path)?),
            response: Some(parse_value(parts[4], path)?),
        });

        let desc = &parts[5..];
        if keypoints.len() == 1 {
            descriptors.dim = desc.len();
        } else if desc.len() != descriptors.dim {
            return Err(SfmIoError::Decode(format!(
                "{}: feature {} has a descriptor of dimension {}, expected {}",
                path.display(),
                keypoints.len() - 1,
                desc.len(),
                descriptors.dim
            )));
        }
        for value in desc {
            descriptors.data.push(parse_value(value, path)?);
        }
    }

    if keypoints.len() < count {
        log::warn!(
            "{} declares {count} features but holds {}",
            path.display(),
            keypoints.len()
        );
    }

    Ok((
        KeypointSet {
            image_id,
            keypoints,
        },
        descriptors,
    ))
}

/// A putative correspondence written by an external matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMatch {
    /// Keypoint index in the query image
    pub query_idx: u32,
    /// Keypoint index in the train image
    pub train_idx: u32,
    /// Descriptor distance
    pub distance: f32,
}

/// Read a match file of `queryIndex trainIndex distance` lines.
///
/// Blank lines are ignored.
pub fn read_match_file(path: impl AsRef<Path>) -> Result<Vec<FeatureMatch>, SfmIoError> {
    let path = path.as_ref();
    let mut matches = Vec::new();

    for line in open(path)?.lines() {
        let line = line?;
        let parts = line.split_whitespace().collect::<Vec<_>>();
        match parts.as_slice() {
            [] => continue,
            [query, train, distance] => matches.push(FeatureMatch {
                query_idx: parse_value(query, path)?,
                train_idx: parse_value(train, path)?,
                distance: parse_value(distance, path)?,
            }),
            _ => {
                return Err(SfmIoError::Decode(format!(
                    "{}: expected 3 fields, got '{line}'",
                    path.display()
                )))
            }
        }
    }

    Ok(matches)
}

/// Build a [`MatchRecord`] from matcher output for the pair `(query, train)`.
pub fn to_match_record(image_id1: u32, image_id2: u32, matches: &[FeatureMatch]) -> MatchRecord {
    MatchRecord {
        image_id1,
        image_id2,
        matches: matches
            .iter()
            .map(|m| [m.query_idx, m.train_idx])
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_feature_file() -> Result<(), SfmIoError> {
        let mut file = NamedTempFile::new()?;
        file.write_all(
            b"3\n\
              10.5 20.0 1.5 0.25 0.9 0.1 0.2 0.3\n\
              short line\n\
              11.0 21.0 2.0 0.5 0.8 0.4 0.5 0.6\n\
              12.0 22.0 2.5 0.75 0.7 0.7 0.8 0.9\n\
              13.0 23.0 3.0 1.0 0.6 1.0 1.1 1.2\n",
        )?;

        let (keypoints, descriptors) = read_feature_file(file.path(), 4)?;
        assert_eq!(keypoints.image_id, 4);
        assert_eq!(keypoints.len(), 3);
        assert_eq!(keypoints.xy(1), Some([11.0, 21.0]));
        assert_relative_eq!(keypoints.keypoints[2].response.unwrap_or_default(), 0.7);
        assert_eq!(descriptors.dim, 3);
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors.get(0), Some(&[0.1f32, 0.2, 0.3][..]));
        Ok(())
    }

    #[test]
    fn test_read_feature_file_dimension_mismatch() -> Result<(), SfmIoError> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"2\n1 2 1 0 1 0.1 0.2\n1 2 1 0 1 0.1\n")?;
        assert!(matches!(
            read_feature_file(file.path(), 1),
            Err(SfmIoError::Decode(_))
        ));
        Ok(())
    }

    #[test]
    fn test_read_match_file() -> Result<(), SfmIoError> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"0 3 0.25\n\n1 2 0.5\n")?;

        let matches = read_match_file(file.path())?;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].query_idx, 1);
        assert_eq!(matches[1].train_idx, 2);

        let record = to_match_record(1, 2, &matches);
        assert_eq!(record.matches, vec![[0, 3], [1, 2]]);

        let mut bad = NamedTempFile::new()?;
        bad.write_all(b"0 3\n")?;
        assert!(read_match_file(bad.path()).is_err());
        Ok(())
    }
}
