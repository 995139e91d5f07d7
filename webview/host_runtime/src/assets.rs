use crate::error::AssetError;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_VIRTUAL_HOST: &str = "flowbridge.local";
const SCHEME: &str = "https";

/// Virtual origin that maps `https://<host>/...` onto a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetOrigin {
    host: String,
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub url: String,
    pub file: PathBuf,
}

impl AssetOrigin {
    pub fn new(host: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            root: root.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a page such as `index.html?page=wall-opening` to the URL
    /// the surface should load. The file must exist under the root.
    pub fn navigation_target(&self, page: &str) -> Result<NavigationTarget, AssetError> {
        let (path, query) = match page.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (page, None),
        };

        let segments = relative_segments(path)?;
        let file = segments
            .iter()
            .fold(self.root.clone(), |dir, segment| dir.join(segment));
        if !file.is_file() {
            return Err(AssetError::PageNotFound {
                page: page.to_string(),
                path: file,
            });
        }

        let mut url = format!("{SCHEME}://{}/{}", self.host, segments.join("/"));
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }

        Ok(NavigationTarget { url, file })
    }

    /// Maps a URL requested by the surface back to a file under the root.
    pub fn resolve_url(&self, url: &str) -> Result<PathBuf, AssetError> {
        let prefix = format!("{SCHEME}://{}/", self.host);
        let rest = url
            .strip_prefix(&prefix)
            .ok_or_else(|| AssetError::ForeignOrigin(url.to_string()))?;
        let path = rest
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        let segments = relative_segments(path)?;
        Ok(segments
            .iter()
            .fold(self.root.clone(), |dir, segment| dir.join(segment)))
    }
}

fn relative_segments(path: &str) -> Result<Vec<String>, AssetError> {
    let normalized = path.replace('\\', "/");
    if normalized.trim_matches('/').is_empty() {
        return Err(AssetError::EmptyPage);
    }

    let mut segments = Vec::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(AssetError::OutsideRoot(path.to_string())),
        }
    }

    if segments.is_empty() {
        return Err(AssetError::EmptyPage);
    }
    Ok(segments)
}
