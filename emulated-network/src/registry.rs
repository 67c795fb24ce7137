//! Catalog of topology definitions, selectable by name

use crate::network::builder::BuildError;
use crate::network::spec::Topology;
use crate::topologies::urban_hospital::UrbanHospital;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A named, fixed topology that can be built on demand.
///
/// Building must be deterministic: every call returns a structurally identical topology.
pub trait TopologyDefinition: Send + Sync {
    /// One-line, human-readable summary
    fn description(&self) -> &str;

    fn build(&self) -> Result<Topology, BuildError>;
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("a topology named `{name}` is already registered")]
    DuplicateName { name: Arc<str> },
    #[error("no topology named `{name}` (available: {available})")]
    UnknownTopology { name: String, available: String },
    #[error("failed to build topology `{name}`")]
    Build {
        name: Arc<str>,
        #[source]
        source: BuildError,
    },
}

/// Collects definitions before the registry is frozen
#[derive(Default)]
pub struct RegistryBuilder {
    definitions: BTreeMap<Arc<str>, Box<dyn TopologyDefinition>>,
}

impl RegistryBuilder {
    pub fn register(
        mut self,
        name: &str,
        definition: impl TopologyDefinition + 'static,
    ) -> Result<Self, RegistryError> {
        let name: Arc<str> = name.into();
        if self.definitions.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }

        self.definitions.insert(name, Box::new(definition));
        Ok(self)
    }

    pub fn finish(self) -> TopologyRegistry {
        TopologyRegistry {
            definitions: self.definitions,
        }
    }
}

/// A read-only catalog of topology definitions
pub struct TopologyRegistry {
    definitions: BTreeMap<Arc<str>, Box<dyn TopologyDefinition>>,
}

impl TopologyRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The registry holding the topologies shipped with this crate
    pub fn builtin() -> Result<Self, RegistryError> {
        Ok(Self::builder()
            .register(UrbanHospital::NAME, UrbanHospital)?
            .finish())
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(|name| &**name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn TopologyDefinition> {
        self.definitions.get(name).map(|d| d.as_ref())
    }

    pub fn build(&self, name: &str) -> Result<Topology, RegistryError> {
        let (name, definition) =
            self.definitions
                .get_key_value(name)
                .ok_or_else(|| RegistryError::UnknownTopology {
                    name: name.to_string(),
                    available: self.names().collect::<Vec<_>>().join(", "),
                })?;

        definition.build().map_err(|source| RegistryError::Build {
            name: name.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::builder::TopologyBuilder;

    struct Empty;

    impl TopologyDefinition for Empty {
        fn description(&self) -> &str {
            "nothing at all"
        }

        fn build(&self) -> Result<Topology, BuildError> {
            TopologyBuilder::new("empty").build()
        }
    }

    #[test]
    fn test_builtin_registry() {
        let registry = TopologyRegistry::builtin().unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["urbanhospital"]);
        assert!(registry.get("urbanhospital").is_some());
        assert_eq!(registry.build("urbanhospital").unwrap().name().as_ref(), "urbanhospital");
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = TopologyRegistry::builder()
            .register("empty", Empty)
            .unwrap()
            .register("empty", Empty);
        assert!(matches!(result, Err(RegistryError::DuplicateName { .. })));
    }

    #[test]
    fn test_unknown_topology_lists_available() {
        let registry = TopologyRegistry::builder()
            .register("empty", Empty)
            .unwrap()
            .finish();

        let error = registry.build("missing").unwrap_err();
        assert_eq!(
            error.to_string(),
            "no topology named `missing` (available: empty)"
        );
        assert!(registry.build("empty").unwrap().nodes().is_empty());
    }
}
