use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExportError;

/// Default minimum number of coordinate lines for a pair to get a match file.
pub const DEFAULT_MIN_MATCHES: usize = 15;

/// Which pose files to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseFormat {
    /// `camera_poses.txt`
    Txt,
    /// `camera_poses.csv`
    Csv,
    /// `camera_poses.json`
    Json,
    /// All of the above.
    #[default]
    All,
}

impl PoseFormat {
    /// Whether this selection writes the text dump.
    pub fn writes_txt(&self) -> bool {
        matches!(self, PoseFormat::Txt | PoseFormat::All)
    }

    /// Whether this selection writes the CSV table.
    pub fn writes_csv(&self) -> bool {
        matches!(self, PoseFormat::Csv | PoseFormat::All)
    }

    /// Whether this selection writes the JSON document.
    pub fn writes_json(&self) -> bool {
        matches!(self, PoseFormat::Json | PoseFormat::All)
    }
}

impl FromStr for PoseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "txt" => Ok(PoseFormat::Txt),
            "csv" => Ok(PoseFormat::Csv),
            "json" => Ok(PoseFormat::Json),
            "all" => Ok(PoseFormat::All),
            other => Err(format!("unknown pose format '{other}', expected txt, csv, json or all")),
        }
    }
}

impl std::fmt::Display for PoseFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PoseFormat::Txt => "txt",
            PoseFormat::Csv => "csv",
            PoseFormat::Json => "json",
            PoseFormat::All => "all",
        };
        write!(f, "{name}")
    }
}

/// Configuration of one export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Path to the feature database.
    pub database_path: PathBuf,
    /// Path to a sparse model folder, or to a workspace holding `sparse/0` or `sparse`.
    pub model_path: Option<PathBuf>,
    /// Folder receiving every output file.
    pub output_folder: PathBuf,
    /// Pose files to write.
    pub pose_format: PoseFormat,
    /// Only export registered images to the pose files.
    pub registered_only: bool,
    /// Minimum number of coordinate lines for a pair to be exported.
    pub min_matches: usize,
    /// Write `global_pose.txt` (and `global_poses.txt` when a model is given).
    pub export_global_poses: bool,
    /// Write one `matches_*.txt` file per qualifying image pair.
    pub export_matches: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("database.db"),
            model_path: None,
            output_folder: PathBuf::from("output"),
            pose_format: PoseFormat::All,
            registered_only: false,
            min_matches: DEFAULT_MIN_MATCHES,
            export_global_poses: true,
            export_matches: true,
        }
    }
}

impl ExportConfig {
    /// Create a configuration for a database and an output folder.
    pub fn new(database_path: impl Into<PathBuf>, output_folder: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            output_folder: output_folder.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Set the sparse model or workspace path.
    pub fn with_model_path(mut self, model_path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(model_path.into());
        self
    }

    /// Set the pose file selection.
    pub fn with_pose_format(mut self, pose_format: PoseFormat) -> Self {
        self.pose_format = pose_format;
        self
    }

    /// Restrict the pose files to registered images.
    pub fn with_registered_only(mut self, registered_only: bool) -> Self {
        self.registered_only = registered_only;
        self
    }

    /// Set the minimum number of coordinate lines per match file.
    pub fn with_min_matches(mut self, min_matches: usize) -> Self {
        self.min_matches = min_matches;
        self
    }

    /// Enable or disable the global pose files.
    pub fn with_global_poses(mut self, enabled: bool) -> Self {
        self.export_global_poses = enabled;
        self
    }

    /// Enable or disable the match files.
    pub fn with_matches(mut self, enabled: bool) -> Self {
        self.export_matches = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pose_format_from_str() {
        assert_eq!("csv".parse::<PoseFormat>(), Ok(PoseFormat::Csv));
        assert_eq!("all".parse::<PoseFormat>(), Ok(PoseFormat::All));
        assert!("xml".parse::<PoseFormat>().is_err());
        assert!(PoseFormat::All.writes_json());
        assert!(!PoseFormat::Txt.writes_csv());
        assert_eq!(PoseFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_builder() {
        let config = ExportConfig::new("a.db", "out")
            .with_min_matches(5)
            .with_registered_only(true)
            .with_matches(false);
        assert_eq!(config.database_path, PathBuf::from("a.db"));
        assert_eq!(config.min_matches, 5);
        assert!(config.registered_only);
        assert!(!config.export_matches);
        assert!(config.export_global_poses);
        assert_eq!(config.model_path, None);
    }

    #[test]
    fn test_from_json_file() -> Result<(), ExportError> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(
            br#"{"database_path": "scene/database.db", "pose_format": "csv", "min_matches": 30}"#,
        )?;

        let config = ExportConfig::from_json_file(file.path())?;
        assert_eq!(config.database_path, PathBuf::from("scene/database.db"));
        assert_eq!(config.pose_format, PoseFormat::Csv);
        assert_eq!(config.min_matches, 30);
        assert_eq!(config.output_folder, PathBuf::from("output"));
        assert!(config.export_matches);
        Ok(())
    }
}
