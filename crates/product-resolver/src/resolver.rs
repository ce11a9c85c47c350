//! Maps a product path to a [`FormatId`].

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use eo_common::{ProductError, ProductResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metadata::terminal_component;
use crate::registry::{FormatId, FormatRegistry, FormatRule};
use crate::source::{open_source, FileSource, SearchDepth};

/// Which evidence the resolver looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Product name only.
    ByName,
    /// Metadata files inside the product only.
    ByMetadata,
    /// Both must agree.
    #[default]
    Both,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::ByName => write!(f, "BY_NAME"),
            Strategy::ByMetadata => write!(f, "BY_METADATA"),
            Strategy::Both => write!(f, "BOTH"),
        }
    }
}

impl FromStr for Strategy {
    type Err = ProductError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "BY_NAME" | "NAME" => Ok(Strategy::ByName),
            "BY_METADATA" | "METADATA" => Ok(Strategy::ByMetadata),
            "BOTH" => Ok(Strategy::Both),
            _ => Err(ProductError::InvalidConfig(format!(
                "unknown resolution strategy: {}",
                s
            ))),
        }
    }
}

/// Resolves products against an ordered [`FormatRegistry`].
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<FormatRegistry>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(FormatRegistry::builtin())
    }
}

impl Resolver {
    pub fn new(registry: Arc<FormatRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Resolve the format of the product at `path`.
    ///
    /// Candidates are tried in `candidates` order when given, otherwise in
    /// registry order; the first match wins. `Ok(None)` means nothing
    /// matched.
    ///
    /// # Errors
    ///
    /// - [`ProductError::ProductNotFound`] if `path` does not exist
    /// - [`ProductError::ArchiveRead`] if an archive cannot be listed
    pub fn resolve(
        &self,
        path: &Path,
        strategy: Strategy,
        candidates: Option<&[FormatId]>,
    ) -> ProductResult<Option<FormatId>> {
        let source = open_source(path)?;
        self.resolve_source(source.as_ref(), strategy, candidates)
    }

    /// Like [`Resolver::resolve`] but an unmatched product is an error.
    pub fn resolve_required(
        &self,
        path: &Path,
        strategy: Strategy,
        candidates: Option<&[FormatId]>,
    ) -> ProductResult<FormatId> {
        self.resolve(path, strategy, candidates)?
            .ok_or_else(|| ProductError::UnrecognizedProduct(path.to_path_buf()))
    }

    /// Resolve an already opened source.
    pub fn resolve_source(
        &self,
        source: &dyn FileSource,
        strategy: Strategy,
        candidates: Option<&[FormatId]>,
    ) -> ProductResult<Option<FormatId>> {
        let name = source.product_name();
        let mut listings = Listings::new(source);

        let rules: Vec<&FormatRule> = match candidates {
            Some(list) => list
                .iter()
                .filter_map(|f| {
                    let rule = self.registry.get(*f);
                    if rule.is_none() {
                        warn!(format = %f, "Candidate format has no registered rule");
                    }
                    rule
                })
                .collect(),
            None => self.registry.rules().iter().collect(),
        };

        for rule in rules {
            let matched = match strategy {
                Strategy::ByName => matches_name(rule, &name, &mut listings)?,
                Strategy::ByMetadata => matches_metadata(rule, &mut listings)?,
                Strategy::Both => {
                    matches_name(rule, &name, &mut listings)?
                        && matches_metadata(rule, &mut listings)?
                }
            };

            if matched {
                info!(
                    path = %source.path().display(),
                    format = %rule.format,
                    strategy = %strategy,
                    "Resolved product format"
                );
                return Ok(Some(rule.format));
            }
        }

        debug!(path = %source.path().display(), strategy = %strategy, "No format matched");
        Ok(None)
    }
}

/// Member listings memoized per depth for the duration of one resolution.
struct Listings<'a> {
    source: &'a dyn FileSource,
    cache: HashMap<SearchDepth, Vec<String>>,
}

impl<'a> Listings<'a> {
    fn new(source: &'a dyn FileSource) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    fn get(&mut self, depth: SearchDepth) -> ProductResult<&[String]> {
        if !self.cache.contains_key(&depth) {
            let listing = self.source.list(depth)?;
            self.cache.insert(depth, listing);
        }
        Ok(self.cache.get(&depth).map(Vec::as_slice).unwrap_or_default())
    }
}

fn matches_name(rule: &FormatRule, name: &str, listings: &mut Listings<'_>) -> ProductResult<bool> {
    for set in &rule.name_patterns {
        if !set.outer.is_match(name) {
            continue;
        }
        match &set.inner {
            None => return Ok(true),
            Some(inner) => {
                let children = listings.get(SearchDepth::Exactly(0))?;
                if children.iter().any(|m| inner.is_match(terminal_component(m))) {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

fn matches_metadata(rule: &FormatRule, listings: &mut Listings<'_>) -> ProductResult<bool> {
    if rule.metadata_patterns.is_empty() {
        return Ok(false);
    }
    let members = listings.get(rule.search_depth)?;
    Ok(rule.metadata_patterns.iter().all(|pattern| {
        members
            .iter()
            .any(|m| pattern.is_match(terminal_component(m)))
    }))
}
