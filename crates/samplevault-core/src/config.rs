use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub root_paths: Vec<String>,
    pub audio_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    /// Number of new locations buffered before a catalog flush.
    pub batch_size: usize,
    /// Emit a processing progress event every N files.
    pub progress_interval: usize,
    /// Emit a reconcile progress event (and commit) every N locations.
    pub reconcile_progress_interval: usize,
    /// Period of the scheduled reconcile in daemon mode; 0 disables it.
    pub reconcile_interval_secs: u64,
    pub hash_chunk_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("samplevault.db"),
            root_paths: Vec::new(),
            audio_extensions: ["wav", "mp3", "flac", "aiff", "ogg", "m4a"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_patterns: Vec::new(),
            batch_size: 100,
            progress_interval: 10,
            reconcile_progress_interval: 50,
            reconcile_interval_secs: 3600,
            hash_chunk_size: 64 * 1024,
        }
    }
}

impl AppConfig {
    /// Allow-list normalised to lowercase extensions without the leading dot.
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.audio_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}

/// Load `Config.*` from the working directory (optional), then apply
/// `SAMPLEVAULT_*` environment overrides.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("SAMPLEVAULT")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("root_paths")
                .with_list_parse_key("audio_extensions")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        if result.iter().any(|kept| dir.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !kept.starts_with(&dir));
        result.push(dir);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_non_overlapping_no_overlap() {
        let dirs = paths(&["/home/user/kicks", "/home/user/snares", "/var/data"]);
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 3);
        assert!(result.contains(&PathBuf::from("/home/user/kicks")));
        assert!(result.contains(&PathBuf::from("/home/user/snares")));
        assert!(result.contains(&PathBuf::from("/var/data")));
    }

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let dirs = paths(&["/home/user/docs", "/home/user", "/var/data", "/home/user"]);
        let result = non_overlapping_directories(dirs);
        assert_eq!(result, paths(&["/home/user", "/var/data"]));
    }

    #[test]
    fn test_sibling_prefix_is_not_nested() {
        // "/lib2" shares a string prefix with "/lib" but is not beneath it
        let dirs = paths(&["/lib", "/lib2"]);
        assert_eq!(non_overlapping_directories(dirs).len(), 2);
    }

    #[test]
    fn test_normalized_extensions() {
        let config = AppConfig {
            audio_extensions: vec![".WAV".into(), "flac".into(), " ".into()],
            ..AppConfig::default()
        };
        assert_eq!(config.normalized_extensions(), vec!["wav", "flac"]);
    }
}
