use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::error::{Error, Result};

pub const DATA_DIR_ENV_VAR: &str = "ROADVIEW_DATA_DIR";

const STORE_FILE: &str = "roadview.redb";

/// Where the data directory setting came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DataDirSource {
    /// The `--data-dir` flag.
    Flag,
    /// The `ROADVIEW_DATA_DIR` environment variable.
    Environment,
    /// `$XDG_DATA_HOME/roadview`.
    Xdg,
}

impl fmt::Display for DataDirSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag => f.write_str("--data-dir"),
            Self::Environment => f.write_str(DATA_DIR_ENV_VAR),
            Self::Xdg => f.write_str("XDG data home"),
        }
    }
}

/// Directory holding the roadview store.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
    source: DataDirSource,
}

impl DataDir {
    /// Resolve and create the data directory. The flag wins over
    /// `ROADVIEW_DATA_DIR`, which wins over the XDG data home. A blank
    /// environment value counts as unset.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let dir = Self::locate(explicit, std::env::var_os(DATA_DIR_ENV_VAR))?;
        std::fs::create_dir_all(&dir.root)
            .map_err(|_| Error::DataDir(dir.root.clone()))?;
        tracing::debug!(
            path = %dir.root.display(),
            source = %dir.source,
            "resolved data directory"
        );
        Ok(dir)
    }

    /// Pick the directory without touching the filesystem.
    fn locate(explicit: Option<&Path>, env_value: Option<OsString>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self {
                root: path.to_path_buf(),
                source: DataDirSource::Flag,
            });
        }

        let from_env =
            env_value.filter(|value| !value.to_string_lossy().trim().is_empty());
        if let Some(value) = from_env {
            return Ok(Self {
                root: PathBuf::from(value),
                source: DataDirSource::Environment,
            });
        }

        let root = xdg::BaseDirectories::with_prefix("roadview")
            .get_data_home()
            .ok_or_else(|| {
                Error::Config("could not determine XDG data home directory".into())
            })?;
        Ok(Self {
            root,
            source: DataDirSource::Xdg,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> DataDirSource {
        self.source
    }

    /// Path of the redb store file.
    pub fn store_db(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }

    /// Whether a store was already written here.
    pub fn has_store(&self) -> bool {
        self.store_db().is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_environment() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::locate(
            Some(tmp.path()),
            Some(OsString::from("/elsewhere")),
        )
        .unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.source(), DataDirSource::Flag);
        assert_eq!(dir.store_db(), tmp.path().join("roadview.redb"));
    }

    #[test]
    fn environment_is_used_without_flag() {
        let dir =
            DataDir::locate(None, Some(OsString::from("/srv/roadview"))).unwrap();

        assert_eq!(dir.root(), Path::new("/srv/roadview"));
        assert_eq!(dir.source(), DataDirSource::Environment);
    }

    #[test]
    fn blank_environment_value_is_ignored() {
        if let Ok(dir) = DataDir::locate(None, Some(OsString::from("  "))) {
            assert_eq!(dir.source(), DataDirSource::Xdg);
            assert!(dir.root().ends_with("roadview"));
        }
    }

    #[test]
    fn resolve_creates_directory_and_tracks_store() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let dir = DataDir::resolve(Some(&nested)).unwrap();

        assert!(dir.root().is_dir());
        assert!(!dir.has_store());
        crate::store_db::StoreDb::open(&dir.store_db()).unwrap();
        assert!(dir.has_store());
    }
}
