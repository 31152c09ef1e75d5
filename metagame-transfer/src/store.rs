//! On-disk layout for exported profile data.
//!
//! One pretty-printed JSON array per item type:
//! `{root}/{space}/{profile}/{item_type}.json`

use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Reject anything but a single plain path component, so a name can never
/// point outside the results directory.
pub fn check_name(kind: &'static str, name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == name => Ok(()),
        _ => Err(Error::InvalidName {
            kind,
            name: name.to_string(),
        }),
    }
}

/// Reads and writes exported items under a results directory
#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding one profile's files
    pub fn profile_dir(&self, space: &str, profile: &str) -> Result<PathBuf> {
        check_name("space", space)?;
        check_name("profile", profile)?;
        Ok(self.root.join(space).join(profile))
    }

    /// File holding one item type of a profile
    pub fn path_for(&self, space: &str, profile: &str, item_type: &str) -> Result<PathBuf> {
        check_name("item type", item_type)?;
        Ok(self
            .profile_dir(space, profile)?
            .join(format!("{}.json", item_type)))
    }

    /// Ensure the profile directory exists
    pub async fn ensure_dir(&self, space: &str, profile: &str) -> Result<PathBuf> {
        let dir = self.profile_dir(space, profile)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;
        Ok(dir)
    }

    /// Write `items` as a 4-space indented JSON array, replacing any previous
    /// export. The file is written next to its destination and renamed into
    /// place, so an interrupted run never leaves a truncated export behind.
    pub async fn write<T: Serialize>(
        &self,
        space: &str,
        profile: &str,
        item_type: &str,
        items: &[T],
    ) -> Result<PathBuf> {
        let path = self.path_for(space, profile, item_type)?;
        let json = to_pretty_json(items).map_err(|source| Error::Serialize {
            path: path.clone(),
            source,
        })?;

        let dir = self.ensure_dir(space, profile).await?;
        let tmp_path = dir.join(format!(".{}.json.tmp", item_type));

        info!("Writing {} {} to {}", profile, item_type, path.display());

        let written = match tokio::fs::write(&tmp_path, &json).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &path)
                .await
                .map_err(|e| Error::io(&path, e)),
            Err(e) => Err(Error::io(&tmp_path, e)),
        };

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", tmp_path.display(), cleanup);
                }
            }
            return Err(e);
        }

        debug!("Wrote {} {} ({} bytes)", items.len(), item_type, json.len());
        Ok(path)
    }

    /// Load a previously written export
    pub async fn load<T: DeserializeOwned>(
        &self,
        space: &str,
        profile: &str,
        item_type: &str,
    ) -> Result<Vec<T>> {
        let path = self.path_for(space, profile, item_type)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::io(&path, e))?;

        let items: Vec<T> = serde_json::from_slice(&bytes).map_err(|e| Error::json(&path, e))?;
        debug!("Loaded {} {} from {}", items.len(), item_type, path.display());
        Ok(items)
    }
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(buf)
}
