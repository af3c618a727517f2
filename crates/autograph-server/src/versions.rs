//! In-memory versioned diagram storage

use autograph_core::CanvasDocument;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("diagram {0} not found")]
    NotFound(String),

    #[error("diagram {diagram_id} has no version {version}")]
    VersionNotFound { diagram_id: String, version: u64 },

    #[error("diagram {0} already exists")]
    AlreadyExists(String),

    #[error("base version {base} is stale, latest is {latest}")]
    Stale { base: u64, latest: u64 },
}

/// Every version of every diagram. Version numbers start at 1 and each
/// write appends the next one.
#[derive(Debug, Default)]
pub struct VersionStore {
    diagrams: DashMap<String, Vec<CanvasDocument>>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store version 1 of a new diagram.
    pub fn create(&self, diagram_id: &str, document: CanvasDocument) -> Result<u64, VersionError> {
        match self.diagrams.entry(diagram_id.to_string()) {
            Entry::Occupied(_) => Err(VersionError::AlreadyExists(diagram_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(vec![document]);
                Ok(1)
            }
        }
    }

    /// Append a version. With a base version, refuse unless it is the latest.
    pub fn update(
        &self,
        diagram_id: &str,
        document: CanvasDocument,
        base_version: Option<u64>,
    ) -> Result<u64, VersionError> {
        let mut versions = self
            .diagrams
            .get_mut(diagram_id)
            .ok_or_else(|| VersionError::NotFound(diagram_id.to_string()))?;

        let latest = versions.len() as u64;
        if let Some(base) = base_version {
            if base != latest {
                return Err(VersionError::Stale { base, latest });
            }
        }

        versions.push(document);
        Ok(latest + 1)
    }

    /// Remove a diagram with all its versions. Returns whether it existed.
    pub fn delete(&self, diagram_id: &str) -> bool {
        self.diagrams.remove(diagram_id).is_some()
    }

    pub fn latest(&self, diagram_id: &str) -> Result<(u64, CanvasDocument), VersionError> {
        let versions = self
            .diagrams
            .get(diagram_id)
            .ok_or_else(|| VersionError::NotFound(diagram_id.to_string()))?;
        let document = versions
            .last()
            .cloned()
            .ok_or_else(|| VersionError::NotFound(diagram_id.to_string()))?;
        Ok((versions.len() as u64, document))
    }

    pub fn version(&self, diagram_id: &str, version: u64) -> Result<CanvasDocument, VersionError> {
        let versions = self
            .diagrams
            .get(diagram_id)
            .ok_or_else(|| VersionError::NotFound(diagram_id.to_string()))?;
        version
            .checked_sub(1)
            .and_then(|index| versions.get(index as usize))
            .cloned()
            .ok_or_else(|| VersionError::VersionNotFound {
                diagram_id: diagram_id.to_string(),
                version,
            })
    }

    pub fn diagram_count(&self) -> usize {
        self.diagrams.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autograph_core::Element;

    fn doc(note: &str) -> CanvasDocument {
        CanvasDocument::new([Element::new("a", "rectangle").at(0.0, 0.0)]).with_note(note)
    }

    #[test]
    fn test_versions_are_numbered_from_one() {
        let store = VersionStore::new();
        assert_eq!(store.create("d1", doc("v1")).unwrap(), 1);
        assert_eq!(store.update("d1", doc("v2"), None).unwrap(), 2);
        assert_eq!(store.update("d1", doc("v3"), Some(2)).unwrap(), 3);

        assert_eq!(store.version("d1", 1).unwrap().note(), "v1");
        assert_eq!(store.latest("d1").unwrap().0, 3);
        assert!(matches!(
            store.version("d1", 0),
            Err(VersionError::VersionNotFound { version: 0, .. })
        ));
        assert!(store.version("d1", 4).is_err());
    }

    #[test]
    fn test_create_twice_conflicts() {
        let store = VersionStore::new();
        store.create("d1", doc("v1")).unwrap();
        assert_eq!(
            store.create("d1", doc("again")),
            Err(VersionError::AlreadyExists("d1".into()))
        );
    }

    #[test]
    fn test_stale_base_version() {
        let store = VersionStore::new();
        store.create("d1", doc("v1")).unwrap();
        store.update("d1", doc("v2"), Some(1)).unwrap();

        assert_eq!(
            store.update("d1", doc("late"), Some(1)),
            Err(VersionError::Stale { base: 1, latest: 2 })
        );
        assert_eq!(store.latest("d1").unwrap().0, 2);
    }

    #[test]
    fn test_update_and_delete_unknown() {
        let store = VersionStore::new();
        assert!(matches!(
            store.update("ghost", doc("x"), None),
            Err(VersionError::NotFound(_))
        ));
        assert!(!store.delete("ghost"));

        store.create("d1", doc("v1")).unwrap();
        assert!(store.delete("d1"));
        assert!(store.latest("d1").is_err());
        assert_eq!(store.diagram_count(), 0);
    }
}
