use anyhow::Context;
use serde::Deserialize;
use skinalyze_core::{Condition, DetectorOptions, ModelPaths};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CATALOG_URL: &str = "https://clear-vision-438804-u6.el.r.appspot.com";
const DEFAULT_ARTIFACT_BASE_URL: &str =
    "https://raw.githubusercontent.com/viditvidit/Skinalyze/master/Model";

/// Optional settings file (`--config` or `SKINALYZE_CONFIG`). Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub catalog_url: Option<String>,
    pub model_dir: Option<PathBuf>,
    pub artifact_base_url: Option<String>,
    pub confidence_threshold: Option<f32>,
    pub iou_threshold: Option<f32>,
    pub intra_threads: Option<usize>,
    pub dedupe_concerns: Option<bool>,
    pub request_timeout_secs: Option<u64>,
    /// Expected SHA-256 (hex) per artifact stem, e.g. `acne = "..."`.
    #[serde(default)]
    pub checksums: HashMap<String, String>,
}

impl FileConfig {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// Resolved configuration: defaults, then the config file, then `SKINALYZE_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the product catalog API.
    pub catalog_url: String,
    /// Directory holding the detector ONNX artifacts.
    pub model_dir: PathBuf,
    /// Where missing artifacts are downloaded from (`{base}/{name}.onnx`).
    pub artifact_base_url: String,
    pub detector: DetectorOptions,
    /// Query each concern code once even if several conditions map to it.
    pub dedupe_concerns: bool,
    /// Per-request timeout for catalog calls. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
    pub checksums: HashMap<String, String>,
}

impl Config {
    /// Load from an explicit file, else `SKINALYZE_CONFIG`, then apply the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("SKINALYZE_CONFIG").map(PathBuf::from));

        let file = match path {
            Some(path) => FileConfig::read(&path)?,
            None => FileConfig::default(),
        };

        Ok(Self::resolve(file, |key| std::env::var(key).ok()))
    }

    /// Merge a parsed file with an environment lookup. Environment wins.
    pub fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = DetectorOptions::default();

        let model_dir = env("SKINALYZE_MODEL_DIR")
            .map(PathBuf::from)
            .or(file.model_dir)
            .unwrap_or_else(|| default_model_dir(&env));

        let detector = DetectorOptions {
            confidence_threshold: env_parse(&env, "SKINALYZE_CONFIDENCE_THRESHOLD")
                .or(file.confidence_threshold)
                .unwrap_or(defaults.confidence_threshold),
            iou_threshold: env_parse(&env, "SKINALYZE_IOU_THRESHOLD")
                .or(file.iou_threshold)
                .unwrap_or(defaults.iou_threshold),
            intra_threads: env_parse(&env, "SKINALYZE_INTRA_THREADS")
                .or(file.intra_threads)
                .unwrap_or(defaults.intra_threads),
        };

        Self {
            catalog_url: env("SKINALYZE_CATALOG_URL")
                .or(file.catalog_url)
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            model_dir,
            artifact_base_url: env("SKINALYZE_ARTIFACT_BASE_URL")
                .or(file.artifact_base_url)
                .unwrap_or_else(|| DEFAULT_ARTIFACT_BASE_URL.to_string()),
            detector,
            dedupe_concerns: env("SKINALYZE_DEDUPE_CONCERNS")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .or(file.dedupe_concerns)
                .unwrap_or(false),
            request_timeout_secs: env_parse(&env, "SKINALYZE_REQUEST_TIMEOUT_SECS")
                .or(file.request_timeout_secs),
            checksums: file.checksums,
        }
    }

    pub fn model_paths(&self) -> ModelPaths {
        ModelPaths::in_dir(&self.model_dir)
    }

    /// Download URL for a condition's artifact.
    pub fn artifact_url(&self, condition: Condition) -> String {
        format!(
            "{}/{}.onnx",
            self.artifact_base_url.trim_end_matches('/'),
            condition.artifact_name()
        )
    }

    pub fn checksum(&self, condition: Condition) -> Option<&str> {
        self.checksums
            .get(condition.artifact_name())
            .map(String::as_str)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// `$XDG_DATA_HOME/skinalyze/models`, falling back to `~/.local/share`.
fn default_model_dir(env: &impl Fn(&str) -> Option<String>) -> PathBuf {
    env("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("skinalyze")
        .join("models")
}

fn env_parse<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    env(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(FileConfig::default(), env_from(&[("HOME", "/home/u")]));
        assert_eq!(config.catalog_url, DEFAULT_CATALOG_URL);
        assert_eq!(config.model_dir, PathBuf::from("/home/u/.local/share/skinalyze/models"));
        assert!((config.detector.confidence_threshold - 0.25).abs() < 1e-6);
        assert!((config.detector.iou_threshold - 0.7).abs() < 1e-6);
        assert!(!config.dedupe_concerns);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_xdg_data_home() {
        let config = Config::resolve(
            FileConfig::default(),
            env_from(&[("XDG_DATA_HOME", "/data"), ("HOME", "/home/u")]),
        );
        assert_eq!(config.model_dir, PathBuf::from("/data/skinalyze/models"));
    }

    #[test]
    fn test_file_values_apply() {
        let file: FileConfig = toml::from_str(
            r#"
            catalog_url = "http://localhost:8080"
            model_dir = "/srv/models"
            confidence_threshold = 0.4
            dedupe_concerns = true
            request_timeout_secs = 15

            [checksums]
            acne = "abc123"
            "#,
        )
        .unwrap();

        let config = Config::resolve(file, env_from(&[]));
        assert_eq!(config.catalog_url, "http://localhost:8080");
        assert_eq!(config.model_dir, PathBuf::from("/srv/models"));
        assert!((config.detector.confidence_threshold - 0.4).abs() < 1e-6);
        assert!(config.dedupe_concerns);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.checksum(Condition::Acne), Some("abc123"));
        assert_eq!(config.checksum(Condition::DarkSpots), None);
    }

    #[test]
    fn test_env_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            catalog_url = "http://from-file"
            dedupe_concerns = true
            iou_threshold = 0.5
            "#,
        )
        .unwrap();

        let config = Config::resolve(
            file,
            env_from(&[
                ("SKINALYZE_CATALOG_URL", "http://from-env"),
                ("SKINALYZE_DEDUPE_CONCERNS", "0"),
                ("SKINALYZE_IOU_THRESHOLD", "0.6"),
            ]),
        );
        assert_eq!(config.catalog_url, "http://from-env");
        assert!(!config.dedupe_concerns);
        assert!((config.detector.iou_threshold - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_unparseable_env_falls_back() {
        let config = Config::resolve(
            FileConfig::default(),
            env_from(&[("SKINALYZE_INTRA_THREADS", "lots"), ("HOME", "/h")]),
        );
        assert_eq!(config.detector.intra_threads, DetectorOptions::default().intra_threads);
    }

    #[test]
    fn test_unknown_file_keys_rejected() {
        assert!(toml::from_str::<FileConfig>("catalog = \"typo\"").is_err());
    }

    #[test]
    fn test_artifact_url() {
        let config = Config::resolve(
            FileConfig::default(),
            env_from(&[("SKINALYZE_ARTIFACT_BASE_URL", "https://models.example/v1/"), ("HOME", "/h")]),
        );
        assert_eq!(
            config.artifact_url(Condition::DarkSpots),
            "https://models.example/v1/darkspot.onnx"
        );
    }
}
