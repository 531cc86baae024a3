//! Topic model catalog on the shared models volume.

use anyhow::Result;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::constants::jobs::MODEL_CONFIG_FILE_NAME;

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    root: PathBuf,
}

impl ModelCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a model; `None` for names that would escape the root
    pub fn model_path(&self, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.root.join(name)),
            _ => None,
        }
    }

    pub fn config_path(&self, name: &str) -> Option<PathBuf> {
        self.model_path(name)
            .map(|path| path.join(MODEL_CONFIG_FILE_NAME))
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let Some(path) = self.model_path(name) else {
            debug!("Rejected model name {:?}", name);
            return Ok(false);
        };
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
