use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::{error, info};

use crate::model::{ArtifactInfo, Status, WeatherResponse};

/// Name collisions tolerated before a save gives up.
const MAX_VERSIONS: u32 = 1000;

/// Writes replies as JSON reports into a directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `response`; failures are reported in the returned info, never raised.
    ///
    /// An existing report is never overwritten: a clashing name gets a `_1`, `_2`, ...
    /// suffix before the extension.
    pub async fn save(&self, base: &str, response: &WeatherResponse) -> ArtifactInfo {
        let stem = artifact_stem(base, Utc::now());

        match self.write(&stem, response).await {
            Ok(filename) => {
                info!(file = %filename, dir = %self.dir.display(), "saved weather artifact");
                ArtifactInfo {
                    status: Status::Ok,
                    filename: Some(filename),
                    message: None,
                }
            }
            Err(e) => {
                error!(file = %stem, "failed to save artifact: {e:#}");
                ArtifactInfo {
                    status: Status::Error,
                    filename: None,
                    message: Some(format!("Failed to save artifact: {e:#}")),
                }
            }
        }
    }

    async fn write(&self, stem: &str, response: &WeatherResponse) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await.with_context(|| {
            format!("Failed to create artifact directory: {}", self.dir.display())
        })?;

        let content =
            serde_json::to_vec_pretty(response).context("Failed to serialize weather report")?;

        for version in 0..MAX_VERSIONS {
            let filename = match version {
                0 => format!("{stem}.json"),
                n => format!("{stem}_{n}.json"),
            };
            let path = self.dir.join(&filename);

            let opened = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match opened {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create artifact: {}", path.display()));
                }
            };

            file.write_all(&content)
                .await
                .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
            file.flush()
                .await
                .with_context(|| format!("Failed to write artifact: {}", path.display()))?;

            return Ok(filename);
        }

        bail!(
            "{MAX_VERSIONS} reports named {stem}.json already exist in {}",
            self.dir.display()
        )
    }
}

/// Reply attached when saving was requested but no directory is configured.
pub fn not_configured() -> ArtifactInfo {
    ArtifactInfo {
        status: Status::Error,
        filename: None,
        message: Some("artifact storage is not configured (set `artifact_dir`)".to_string()),
    }
}

/// `{base}_{YYYYmmdd_HHMMSS}.json`, with every run of non-alphanumerics in `base`
/// collapsed to a single underscore.
pub fn artifact_file_name(base: &str, at: DateTime<Utc>) -> String {
    format!("{}.json", artifact_stem(base, at))
}

fn artifact_stem(base: &str, at: DateTime<Utc>) -> String {
    let mut clean = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_alphanumeric() {
            clean.push(c);
        } else if !clean.ends_with('_') {
            clean.push('_');
        }
    }
    let clean = clean.trim_matches('_');

    format!("{}_{}", clean, at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ErrorInfo, ErrorKind, Units};
    use chrono::TimeZone;

    fn not_found_reply() -> WeatherResponse {
        WeatherResponse::failure(
            "Paris",
            Units::Metric,
            ErrorInfo {
                kind: ErrorKind::NotFound,
                message: "missing".into(),
            },
        )
    }

    #[test]
    fn file_name_is_sanitized_and_timestamped() {
        let at = Utc.with_ymd_and_hms(2025, 10, 19, 8, 5, 3).unwrap();

        assert_eq!(
            artifact_file_name("current_weather_New York, NY", at),
            "current_weather_New_York_NY_20251019_080503.json"
        );
        assert_eq!(
            artifact_file_name("forecast_../etc/passwd_3day", at),
            "forecast_etc_passwd_3day_20251019_080503.json"
        );
    }

    #[tokio::test]
    async fn saves_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("reports"));

        let info = store.save("current_weather_Paris", &not_found_reply()).await;

        assert_eq!(info.status, Status::Ok);
        let filename = info.filename.expect("filename is reported");
        let written = std::fs::read_to_string(store.dir().join(&filename)).unwrap();
        let back: WeatherResponse = serde_json::from_str(&written).unwrap();
        assert_eq!(back.location, "Paris");
        assert!(written.contains('\n'));
    }

    #[tokio::test]
    async fn clashing_names_get_a_version_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let reply = not_found_reply();

        let (a, b, c) = tokio::join!(
            store.save("current_weather_Paris", &reply),
            store.save("current_weather_Paris", &reply),
            store.save("current_weather_Paris", &reply),
        );

        let mut names: Vec<String> = [a, b, c]
            .into_iter()
            .map(|info| info.filename.expect("every save succeeds"))
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn existing_report_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let stem = artifact_stem("forecast_Oslo_2day", Utc::now());
        std::fs::write(dir.path().join(format!("{stem}.json")), b"keep").unwrap();

        let filename = store.write(&stem, &not_found_reply()).await.unwrap();

        assert_eq!(filename, format!("{stem}_1.json"));
        let kept = std::fs::read_to_string(dir.path().join(format!("{stem}.json"))).unwrap();
        assert_eq!(kept, "keep");
    }

    #[tokio::test]
    async fn unwritable_directory_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let store = ArtifactStore::new(blocker.join("sub"));

        let info = store.save("x", &not_found_reply()).await;
        assert_eq!(info.status, Status::Error);
        assert!(info.message.unwrap().contains("Failed to save artifact"));
    }
}
