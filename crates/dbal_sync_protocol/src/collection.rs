//! Local collections and their mapping onto remote entity routes.

use crate::error::{ProtocolError, ProtocolResult};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A local entity collection kept in sync with the remote service.
///
/// The set is closed: adding a collection means adding a variant here and a
/// row in [`EntityMapping::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    /// Project files.
    Files,
    /// Data models.
    Models,
    /// UI components.
    Components,
    /// Workflow definitions.
    Workflows,
    /// Lambda functions.
    Lambdas,
    /// Application settings.
    Settings,
    /// Visual themes.
    Themes,
    /// Translation tables.
    Translations,
}

impl Collection {
    /// All collections, in declaration order.
    pub const ALL: [Collection; 8] = [
        Collection::Files,
        Collection::Models,
        Collection::Components,
        Collection::Workflows,
        Collection::Lambdas,
        Collection::Settings,
        Collection::Themes,
        Collection::Translations,
    ];

    /// Returns the local collection name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Models => "models",
            Self::Components => "components",
            Self::Workflows => "workflows",
            Self::Lambdas => "lambdas",
            Self::Settings => "settings",
            Self::Themes => "themes",
            Self::Translations => "translations",
        }
    }
}

impl FromStr for Collection {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownCollection(s.to_string()))
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The remote `(package, entityType)` pair a collection is stored under.
///
/// Combined with the configured tenant this forms the full sync target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncTarget {
    /// Remote package name.
    pub package: String,
    /// Remote entity type name.
    pub entity_type: String,
}

impl SyncTarget {
    /// Creates a new sync target.
    pub fn new(package: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            entity_type: entity_type.into(),
        }
    }
}

/// Immutable table from local collection to remote sync target.
///
/// Built once and shared behind an `Arc`; tests substitute alternate tables
/// through [`EntityMapping::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMapping {
    targets: BTreeMap<Collection, SyncTarget>,
    inverse: BTreeMap<(String, String), Collection>,
}

impl EntityMapping {
    /// Starts an empty mapping.
    pub fn builder() -> EntityMappingBuilder {
        EntityMappingBuilder {
            targets: BTreeMap::new(),
        }
    }

    /// Wraps the mapping for sharing.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns the remote target for a collection.
    pub fn target(&self, collection: Collection) -> ProtocolResult<&SyncTarget> {
        self.targets
            .get(&collection)
            .ok_or_else(|| ProtocolError::UnknownCollection(collection.as_str().to_string()))
    }

    /// Returns true if the collection is mapped.
    pub fn contains(&self, collection: Collection) -> bool {
        self.targets.contains_key(&collection)
    }

    /// Iterates over mapped collections in declaration order.
    pub fn collections(&self) -> impl Iterator<Item = Collection> + '_ {
        self.targets.keys().copied()
    }

    /// Number of mapped collections.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Inverse lookup: which collection lives at `(package, entity_type)`.
    pub fn collection_for(&self, package: &str, entity_type: &str) -> Option<Collection> {
        self.inverse
            .get(&(package.to_string(), entity_type.to_string()))
            .copied()
    }

    /// Builds `/{tenant}/{package}/{entityType}` or `/{tenant}/{package}/{entityType}/{id}`.
    ///
    /// Every segment is percent-encoded.
    pub fn entity_path(
        &self,
        tenant: &str,
        collection: Collection,
        id: Option<&str>,
    ) -> ProtocolResult<String> {
        let target = self.target(collection)?;
        let mut path = format!(
            "/{}/{}/{}",
            urlencoding::encode(tenant),
            urlencoding::encode(&target.package),
            urlencoding::encode(&target.entity_type)
        );
        if let Some(id) = id {
            path.push('/');
            path.push_str(&urlencoding::encode(id));
        }
        Ok(path)
    }
}

impl Default for EntityMapping {
    fn default() -> Self {
        Self::builder()
            .with_target(Collection::Files, SyncTarget::new("core", "File"))
            .with_target(Collection::Models, SyncTarget::new("core", "Model"))
            .with_target(Collection::Components, SyncTarget::new("core", "Component"))
            .with_target(Collection::Workflows, SyncTarget::new("core", "Workflow"))
            .with_target(Collection::Lambdas, SyncTarget::new("core", "Lambda"))
            .with_target(Collection::Settings, SyncTarget::new("core", "Setting"))
            .with_target(Collection::Themes, SyncTarget::new("core", "Theme"))
            .with_target(Collection::Translations, SyncTarget::new("core", "Translation"))
            .build()
    }
}

/// Builder for [`EntityMapping`].
#[derive(Debug, Clone)]
pub struct EntityMappingBuilder {
    targets: BTreeMap<Collection, SyncTarget>,
}

impl EntityMappingBuilder {
    /// Maps a collection to a remote target, replacing any earlier entry.
    pub fn with_target(mut self, collection: Collection, target: SyncTarget) -> Self {
        self.targets.insert(collection, target);
        self
    }

    /// Finishes the mapping.
    pub fn build(self) -> EntityMapping {
        let inverse = self
            .targets
            .iter()
            .map(|(c, t)| ((t.package.clone(), t.entity_type.clone()), *c))
            .collect();
        EntityMapping {
            targets: self.targets,
            inverse,
        }
    }
}
