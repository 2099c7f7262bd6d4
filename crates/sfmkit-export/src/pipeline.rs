use std::path::{Path, PathBuf};

use sfmkit_io::database::ColmapDatabase;
use sfmkit_io::model::{detect_model_format, find_sparse_model, read_model, Reconstruction};
use sfmkit_io::SfmIoError;

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::global::{export_global_poses, DATABASE_GLOBAL_POSE_FILE, MODEL_GLOBAL_POSE_FILE};
use crate::matches::{export_matches, pair_matches};
use crate::poses::export_poses;
use crate::resolve::{resolve_images, resolve_model_images, ResolvedImage};
use crate::summary::{DatabaseSummary, PositionRange, RunSummary};

/// Locate the sparse model for `path`: the folder itself when it holds a model,
/// otherwise `sparse/0` or `sparse` below it.
pub fn locate_model(path: impl AsRef<Path>) -> Result<PathBuf, SfmIoError> {
    let path = path.as_ref();
    if detect_model_format(path).is_some() {
        return Ok(path.to_path_buf());
    }
    find_sparse_model(path)
        .ok_or_else(|| SfmIoError::NotFound(format!("no sparse model under {}", path.display())))
}

fn load_model(path: &Path) -> Result<Reconstruction, SfmIoError> {
    read_model(locate_model(path)?)
}

/// Run a full export.
///
/// Opening the database, creating the output folder and reading the model are
/// fatal. Records that cannot be decoded or resolved are skipped and counted in
/// the returned summary.
pub fn run(config: &ExportConfig) -> Result<RunSummary, ExportError> {
    if config.output_folder.as_os_str().is_empty() {
        return Err(ExportError::InvalidConfig("empty output folder".to_string()));
    }

    let db = ColmapDatabase::open(&config.database_path)?;
    std::fs::create_dir_all(&config.output_folder)?;
    let output = config.output_folder.as_path();

    let cameras = db.read_cameras()?;
    let images = db.read_images()?;
    let keypoints = db.read_all_keypoints()?;
    let descriptors = db.read_all_descriptors()?;
    let matches = db.read_all_matches()?;

    let mut summary = RunSummary {
        database: DatabaseSummary::from_tables(
            db.path(),
            &cameras,
            &images,
            &keypoints,
            &descriptors,
            &matches,
        ),
        ..Default::default()
    };

    // poses
    let resolution = resolve_images(&images.records);
    summary.resolved_images = resolution.images.len();
    summary.registered_images = resolution.registered_count();
    summary.images_without_pose = resolution.missing_pose;
    summary.malformed_images = resolution.malformed;
    summary.position_range = PositionRange::from_registered(&resolution.images);

    let poses: Vec<ResolvedImage> = resolution
        .images
        .iter()
        .filter(|i| !config.registered_only || i.is_registered)
        .cloned()
        .collect();
    if config.registered_only {
        log::info!(
            "Keeping {}/{} registered images",
            poses.len(),
            resolution.images.len()
        );
    }
    summary.exported_poses = poses.len();

    if poses.is_empty() {
        log::warn!("No pose data to export");
    } else {
        let written = export_poses(output, config.pose_format, &cameras.records, &poses)?;
        summary.written_files.extend(written);
    }

    if config.export_global_poses {
        let path = output.join(DATABASE_GLOBAL_POSE_FILE);
        export_global_poses(&path, &resolution.images)?;
        summary.written_files.push(path);
    }

    // model
    if let Some(model_path) = &config.model_path {
        let model = load_model(model_path)?;
        summary.database = summary.database.with_model(&model);

        if config.export_global_poses {
            let model_resolution = resolve_model_images(&model.images);
            let path = output.join(MODEL_GLOBAL_POSE_FILE);
            export_global_poses(&path, &model_resolution.images)?;
            summary.written_files.push(path);
        }
    }

    // matches
    if config.export_matches {
        let (pairs, stats) = pair_matches(
            &images.records,
            &keypoints.records,
            &matches.records,
            config.min_matches,
        );
        let written = export_matches(output, &pairs)?;
        summary.exported_match_pairs = written.len();
        summary.skipped_match_pairs = stats.total_pairs - stats.exported;
        summary.written_files.extend(written);
    }

    log::info!(
        "Export finished: {} files in {}",
        summary.written_files.len(),
        output.display()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, write};

    #[test]
    fn test_locate_model() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(
            locate_model(dir.path()),
            Err(SfmIoError::NotFound(_))
        ));

        let model = dir.path().join("sparse").join("0");
        create_dir_all(&model)?;
        write(model.join("cameras.txt"), "")?;
        write(model.join("images.txt"), "")?;
        assert_eq!(locate_model(dir.path())?, model);
        assert_eq!(locate_model(&model)?, model);
        Ok(())
    }

    #[test]
    fn test_run_empty_output_folder() {
        let config = ExportConfig::new("database.db", "");
        assert!(matches!(run(&config), Err(ExportError::InvalidConfig(_))));
    }

    #[test]
    fn test_run_missing_database() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let config = ExportConfig::new(dir.path().join("nope.db"), dir.path().join("out"));
        assert!(matches!(
            run(&config),
            Err(ExportError::Read(SfmIoError::NotFound(_)))
        ));
        // nothing is created when the database cannot be opened
        assert!(!dir.path().join("out").exists());
        Ok(())
    }
}
