//! Uniform listing and reading over product folders and archives.
//!
//! Every source exposes its members as `/`-separated paths relative to the
//! product root. Archives that wrap all of their content in a single
//! top-level folder (the usual `S2A_..._.SAFE.zip` layout) are unwrapped so
//! that the folder's children appear at depth 0, exactly as they would for
//! the extracted product.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use eo_common::{ProductError, ProductResult};
use flate2::read::GzDecoder;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::metadata::{detect_source_kind, strip_archive_extension, terminal_component, SourceKind};

/// How deep below the product root a listing looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchDepth {
    /// Every member at any depth.
    Recursive,
    /// Members with exactly `n` parent folders (0 = immediate children).
    Exactly(usize),
}

impl SearchDepth {
    /// Convert a nesting level where any negative value means recursive.
    pub fn from_nesting(level: i32) -> Self {
        if level < 0 {
            SearchDepth::Recursive
        } else {
            SearchDepth::Exactly(level as usize)
        }
    }

    /// Check if a relative member path sits at this depth.
    pub fn accepts(&self, member: &str) -> bool {
        match self {
            SearchDepth::Recursive => true,
            SearchDepth::Exactly(n) => member.matches('/').count() == *n,
        }
    }
}

impl Default for SearchDepth {
    fn default() -> Self {
        SearchDepth::Exactly(0)
    }
}

/// Read access to the content of a product, whatever its container.
pub trait FileSource: Send + Sync + fmt::Debug {
    /// Path the source was opened from.
    fn path(&self) -> &Path;

    fn kind(&self) -> SourceKind;

    /// All members, files and folders, sorted.
    fn members(&self) -> ProductResult<Vec<String>>;

    /// Raw bytes of one member.
    fn read(&self, member: &str) -> ProductResult<Vec<u8>>;

    /// Members at the given depth.
    fn list(&self, depth: SearchDepth) -> ProductResult<Vec<String>> {
        Ok(self
            .members()?
            .into_iter()
            .filter(|m| depth.accepts(m))
            .collect())
    }

    fn is_archive(&self) -> bool {
        self.kind().is_archive()
    }

    /// Terminal path component with any archive extension removed.
    fn product_name(&self) -> String {
        let name = self
            .path()
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        strip_archive_extension(&name).to_string()
    }

    /// First member at `depth` whose terminal component matches `pattern`.
    fn find(&self, pattern: &Regex, depth: SearchDepth) -> ProductResult<Option<String>> {
        Ok(self
            .list(depth)?
            .into_iter()
            .find(|m| pattern.is_match(terminal_component(m))))
    }

    fn read_to_string(&self, member: &str) -> ProductResult<String> {
        let bytes = self.read(member)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Open the right source for a path.
///
/// # Errors
///
/// - [`ProductError::ProductNotFound`] if nothing exists at `path`
/// - [`ProductError::ArchiveRead`] if an archive cannot be listed
pub fn open_source(path: &Path) -> ProductResult<Box<dyn FileSource>> {
    if !path.exists() {
        return Err(ProductError::ProductNotFound(path.to_path_buf()));
    }

    let kind = detect_source_kind(path);
    debug!(path = %path.display(), kind = ?kind, "Opening product source");

    match kind {
        SourceKind::Directory | SourceKind::File => Ok(Box::new(DirectorySource::new(path, kind))),
        SourceKind::Zip => Ok(Box::new(ZipSource::open(path)?)),
        SourceKind::Tar | SourceKind::TarGz => Ok(Box::new(TarSource::open(path, kind)?)),
    }
}

// ============================================================================
// Directory
// ============================================================================

/// An extracted product folder, or a single-file product (no members).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    kind: SourceKind,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            root: root.into(),
            kind,
        }
    }

    fn walk(&self, min_depth: usize, max_depth: usize) -> ProductResult<Vec<String>> {
        if self.kind != SourceKind::Directory {
            return Ok(Vec::new());
        }

        let mut members = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(min_depth)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                members.push(parts.join("/"));
            }
        }
        Ok(members)
    }
}

impl FileSource for DirectorySource {
    fn path(&self) -> &Path {
        &self.root
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn members(&self) -> ProductResult<Vec<String>> {
        self.walk(1, usize::MAX)
    }

    fn list(&self, depth: SearchDepth) -> ProductResult<Vec<String>> {
        match depth {
            SearchDepth::Recursive => self.members(),
            SearchDepth::Exactly(n) => self.walk(n + 1, n + 1),
        }
    }

    fn read(&self, member: &str) -> ProductResult<Vec<u8>> {
        Ok(fs::read(self.root.join(member))?)
    }
}

// ============================================================================
// Zip
// ============================================================================

/// A zip archive, listed once at open time.
#[derive(Debug, Clone)]
pub struct ZipSource {
    path: PathBuf,
    members: Vec<String>,
    wrapper: Option<String>,
}

impl ZipSource {
    pub fn open(path: &Path) -> ProductResult<Self> {
        let archive = Self::archive(path)?;
        let (members, wrapper) = normalize_members(archive.file_names().map(str::to_string));
        debug!(path = %path.display(), members = members.len(), wrapper = ?wrapper, "Listed zip archive");
        Ok(Self {
            path: path.to_path_buf(),
            members,
            wrapper,
        })
    }

    fn archive(path: &Path) -> ProductResult<zip::ZipArchive<File>> {
        let file = File::open(path).map_err(|e| ProductError::archive_read(path, e.to_string()))?;
        zip::ZipArchive::new(file).map_err(|e| ProductError::archive_read(path, e.to_string()))
    }
}

impl FileSource for ZipSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Zip
    }

    fn members(&self) -> ProductResult<Vec<String>> {
        Ok(self.members.clone())
    }

    fn read(&self, member: &str) -> ProductResult<Vec<u8>> {
        let mut archive = Self::archive(&self.path)?;
        let name = with_wrapper(self.wrapper.as_deref(), member);
        let mut file = archive
            .by_name(&name)
            .map_err(|e| ProductError::archive_read(&self.path, format!("{}: {}", name, e)))?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| ProductError::archive_read(&self.path, format!("{}: {}", name, e)))?;
        Ok(buf)
    }
}

// ============================================================================
// Tar
// ============================================================================

/// A tarball, optionally gzip-compressed.
#[derive(Debug, Clone)]
pub struct TarSource {
    path: PathBuf,
    kind: SourceKind,
    members: Vec<String>,
    wrapper: Option<String>,
}

impl TarSource {
    pub fn open(path: &Path, kind: SourceKind) -> ProductResult<Self> {
        let mut source = Self {
            path: path.to_path_buf(),
            kind,
            members: Vec::new(),
            wrapper: None,
        };

        let mut raw = Vec::new();
        let mut archive = source.archive()?;
        let entries = archive
            .entries()
            .map_err(|e| ProductError::archive_read(path, e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| ProductError::archive_read(path, e.to_string()))?;
            let entry_path = entry
                .path()
                .map_err(|e| ProductError::archive_read(path, e.to_string()))?;
            raw.push(entry_path.to_string_lossy().replace('\\', "/"));
        }

        let (members, wrapper) = normalize_members(raw.into_iter());
        debug!(path = %path.display(), members = members.len(), wrapper = ?wrapper, "Listed tar archive");
        source.members = members;
        source.wrapper = wrapper;
        Ok(source)
    }

    fn archive(&self) -> ProductResult<tar::Archive<Box<dyn Read>>> {
        let file =
            File::open(&self.path).map_err(|e| ProductError::archive_read(&self.path, e.to_string()))?;
        let reader: Box<dyn Read> = if self.kind == SourceKind::TarGz {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(tar::Archive::new(reader))
    }
}

impl FileSource for TarSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn members(&self) -> ProductResult<Vec<String>> {
        Ok(self.members.clone())
    }

    fn read(&self, member: &str) -> ProductResult<Vec<u8>> {
        let wanted = with_wrapper(self.wrapper.as_deref(), member);
        let mut archive = self.archive()?;
        let entries = archive
            .entries()
            .map_err(|e| ProductError::archive_read(&self.path, e.to_string()))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| ProductError::archive_read(&self.path, e.to_string()))?;
            let name = entry
                .path()
                .map(|p| clean_member(&p.to_string_lossy().replace('\\', "/")).to_string())
                .map_err(|e| ProductError::archive_read(&self.path, e.to_string()))?;

            if name == wanted {
                let mut buf = Vec::new();
                entry
                    .read_to_end(&mut buf)
                    .map_err(|e| ProductError::archive_read(&self.path, format!("{}: {}", name, e)))?;
                return Ok(buf);
            }
        }

        Err(ProductError::archive_read(
            &self.path,
            format!("member not found: {}", wanted),
        ))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn clean_member(raw: &str) -> &str {
    raw.trim_start_matches("./").trim_matches('/')
}

fn with_wrapper(wrapper: Option<&str>, member: &str) -> String {
    match wrapper {
        Some(w) => format!("{}/{}", w, member),
        None => member.to_string(),
    }
}

/// Normalize raw archive entry names into a sorted member listing.
///
/// Implied parent folders are added (zip files often omit folder entries)
/// and a single wrapping top-level folder is removed. Returns the members
/// and the removed wrapper, if any.
fn normalize_members(raw: impl Iterator<Item = String>) -> (Vec<String>, Option<String>) {
    let mut all = BTreeSet::new();
    for name in raw {
        let name = clean_member(&name);
        if name.is_empty() {
            continue;
        }
        let mut prefix = String::new();
        for part in name.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            all.insert(prefix.clone());
        }
    }

    let tops: BTreeSet<&str> = all
        .iter()
        .map(|m| m.split('/').next().unwrap_or(m))
        .collect();
    let has_nested = all.iter().any(|m| m.contains('/'));

    if tops.len() == 1 && has_nested {
        let wrapper = tops.into_iter().next().map(str::to_string);
        if let Some(w) = wrapper {
            let prefix = format!("{}/", w);
            let members = all
                .iter()
                .filter_map(|m| m.strip_prefix(&prefix).map(str::to_string))
                .collect();
            return (members, Some(w));
        }
    }

    (all.into_iter().collect(), None)
}
