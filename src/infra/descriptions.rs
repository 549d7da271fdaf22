//! Tag descriptions kept as Markdown files next to the site.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tracing::debug;

use crate::{application::tags::DescriptionSource, domain::entities::TagRecord};

/// Reads `{root}/{kind}/{slug}.md`. A missing file falls back to the
/// description stored on the tag itself.
#[derive(Debug, Clone)]
pub struct FsDescriptionSource {
    root: PathBuf,
}

impl FsDescriptionSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, tag: &TagRecord) -> PathBuf {
        self.root
            .join(tag.kind.as_str())
            .join(format!("{}.md", tag.slug))
    }
}

#[async_trait]
impl DescriptionSource for FsDescriptionSource {
    async fn load(&self, tag: &TagRecord) -> std::io::Result<Option<String>> {
        let path = self.path_for(tag);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(
                    target = "scriptorium::infra::descriptions",
                    path = %path.display(),
                    "no description file, using stored description"
                );
                Ok(tag.description.clone())
            }
            Err(err) => Err(err),
        }
    }
}
