use argh::FromArgs;
use std::path::PathBuf;

use sfmkit::export::{ExportConfig, PoseFormat};
use sfmkit::io::database::ColmapDatabase;

#[derive(FromArgs)]
/// Export camera poses, global poses and matches from a COLMAP database
struct Args {
    /// path to the COLMAP database (.db)
    #[argh(option)]
    database_path: Option<PathBuf>,

    /// output folder
    #[argh(option)]
    output_folder: Option<PathBuf>,

    /// sparse model folder, or a workspace holding sparse/0 or sparse
    #[argh(option)]
    model_path: Option<PathBuf>,

    /// JSON file with the run configuration, overridden by the other flags
    #[argh(option)]
    config: Option<PathBuf>,

    /// pose file format: txt, csv, json or all
    #[argh(option)]
    format: Option<PoseFormat>,

    /// export only registered images to the pose files
    #[argh(switch)]
    registered_only: bool,

    /// minimum number of matches for a pair to be exported
    #[argh(option)]
    min_matches: Option<usize>,

    /// skip the global pose files
    #[argh(switch)]
    no_global_poses: bool,

    /// skip the match files
    #[argh(switch)]
    no_matches: bool,

    /// only print the database summary
    #[argh(switch)]
    summary_only: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Args = argh::from_env();

    let mut config = match &args.config {
        Some(path) => ExportConfig::from_json_file(path)?,
        None => ExportConfig::default(),
    };

    if let Some(database_path) = args.database_path {
        config.database_path = database_path;
    }
    if let Some(output_folder) = args.output_folder {
        config.output_folder = output_folder;
    }
    if let Some(model_path) = args.model_path {
        config = config.with_model_path(model_path);
    }
    if let Some(format) = args.format {
        config = config.with_pose_format(format);
    }
    if let Some(min_matches) = args.min_matches {
        config = config.with_min_matches(min_matches);
    }
    if args.registered_only {
        config = config.with_registered_only(true);
    }
    if args.no_global_poses {
        config = config.with_global_poses(false);
    }
    if args.no_matches {
        config = config.with_matches(false);
    }

    if args.summary_only {
        let db = ColmapDatabase::open(&config.database_path)?;
        let summary = sfmkit::export::summary::DatabaseSummary::from_database(&db)?;
        print!("{summary}");
        return Ok(());
    }

    log::info!(
        "Exporting {} to {} (format: {}, registered only: {}, min matches: {})",
        config.database_path.display(),
        config.output_folder.display(),
        config.pose_format,
        config.registered_only,
        config.min_matches
    );

    let summary = sfmkit::export::run(&config)?;
    print!("{summary}");

    Ok(())
}
