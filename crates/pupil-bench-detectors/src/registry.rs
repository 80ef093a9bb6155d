//! Detector identities, their schema families and factories.

use serde::{Deserialize, Serialize};

use crate::adapter::DetectorAdapter;
use crate::dark_pupil::{DarkPupilDetector, DarkPupilParams};
use crate::detector::{DetectorError, PupilDetector};
use crate::raw::SchemaFamily;

type Factory = Box<dyn Fn() -> Result<Box<dyn PupilDetector>, DetectorError> + Send + Sync>;

/// Built-in detector kinds that can be named in a config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorKind {
    DarkPupil {
        #[serde(default)]
        params: DarkPupilParams,
    },
}

impl DetectorKind {
    pub fn family(&self) -> SchemaFamily {
        match self {
            DetectorKind::DarkPupil { .. } => SchemaFamily::FlatFields,
        }
    }
}

/// A named detector entry of a benchmark config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: DetectorKind,
}

/// One registered detector identity.
pub struct RegisteredDetector {
    name: String,
    family: SchemaFamily,
    factory: Factory,
}

impl RegisteredDetector {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> SchemaFamily {
        self.family
    }

    pub fn adapter(&self) -> DetectorAdapter {
        DetectorAdapter::new(self.family)
    }

    /// Construct a fresh detector instance.
    pub fn build(&self) -> Result<Box<dyn PupilDetector>, DetectorError> {
        (self.factory)()
    }
}

impl std::fmt::Debug for RegisteredDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredDetector")
            .field("name", &self.name)
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

/// Ordered set of detector identities. Registration order is trial order.
#[derive(Debug, Default)]
pub struct DetectorRegistry {
    entries: Vec<RegisteredDetector>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a detector identity; a later registration under the same
    /// name replaces the earlier one in place.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        family: SchemaFamily,
        factory: F,
    ) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn PupilDetector>, DetectorError> + Send + Sync + 'static,
    {
        let entry = RegisteredDetector {
            name: name.into(),
            family,
            factory: Box::new(factory),
        };
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
        self
    }

    pub fn register_spec(&mut self, spec: &DetectorSpec) -> &mut Self {
        let family = spec.kind.family();
        match spec.kind.clone() {
            DetectorKind::DarkPupil { params } => self.register(&spec.name, family, move || {
                Ok(Box::new(DarkPupilDetector::new(params.clone())) as Box<dyn PupilDetector>)
            }),
        }
    }

    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a DetectorSpec>) -> Self {
        let mut registry = Self::new();
        for spec in specs {
            registry.register_spec(spec);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Result<&RegisteredDetector, DetectorError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| DetectorError::Unknown(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredDetector> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
