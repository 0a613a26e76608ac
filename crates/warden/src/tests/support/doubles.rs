//! Collaborator doubles: services, host resources and faulty stages.

use std::cell::Cell;

use mockall::mock;

use crate::error::EngineError;
use crate::patch::DocumentPatcher;
use crate::resources::HostResources;
use crate::service::{ServiceController, ServiceError};
use crate::stages::PatchStage;

mock! {
    pub Service {}
    impl ServiceController for Service {
        fn restart(&self) -> Result<(), ServiceError>;
    }
}

/// A service that succeeds or fails on demand and counts restarts.
#[derive(Debug, Default)]
pub struct ScriptedService {
    fail: Cell<bool>,
    missing: Cell<bool>,
    restarts: Cell<usize>,
}

impl ScriptedService {
    /// A service whose restarts succeed.
    #[must_use]
    pub fn healthy() -> Self {
        Self::default()
    }

    /// A service whose restarts fail.
    #[must_use]
    pub fn broken() -> Self {
        let service = Self::default();
        service.fail.set(true);
        service
    }

    /// A service whose controller cannot run at all.
    #[must_use]
    pub fn missing() -> Self {
        let service = Self::default();
        service.missing.set(true);
        service
    }

    /// Makes subsequent restarts fail.
    pub fn break_restarts(&self) {
        self.fail.set(true);
    }

    /// Number of restart attempts seen.
    #[must_use]
    pub fn restarts(&self) -> usize {
        self.restarts.get()
    }
}

impl ServiceController for ScriptedService {
    fn restart(&self) -> Result<(), ServiceError> {
        self.restarts.set(self.restarts.get() + 1);
        if self.fail.get() {
            Err(ServiceError::Refused {
                message: "scripted failure".to_owned(),
            })
        } else {
            Ok(())
        }
    }

    fn ensure_available(&self) -> Result<(), ServiceError> {
        if self.missing.get() {
            Err(ServiceError::Unavailable {
                command: "scripted".to_owned(),
                program: "scripted".to_owned(),
            })
        } else {
            Ok(())
        }
    }
}

/// Host resources with fixed answers.
#[derive(Debug, Clone, Default)]
pub struct FixedResources {
    memory_gb: u64,
    features: Vec<String>,
}

impl FixedResources {
    /// A host with `memory_gb` of memory and no optional features.
    #[must_use]
    pub fn with_memory(memory_gb: u64) -> Self {
        Self {
            memory_gb,
            features: Vec::new(),
        }
    }

    /// Marks `feature` as available.
    #[must_use]
    pub fn with_feature(mut self, feature: &str) -> Self {
        self.features.push(feature.to_owned());
        self
    }
}

impl HostResources for FixedResources {
    fn available_memory_gb(&self) -> u64 {
        self.memory_gb
    }

    fn feature_available(&self, name: &str) -> bool {
        self.features.iter().any(|feature| feature == name)
    }
}

/// A stage that fails without producing a document.
#[derive(Debug, Clone, Copy)]
pub struct FailingStage;

impl PatchStage for FailingStage {
    fn name(&self) -> &str {
        "injected-fault"
    }

    fn apply(&self, _: &mut DocumentPatcher, _: &dyn HostResources) -> Result<(), EngineError> {
        Err(EngineError::StageFailed {
            stage: self.name().to_owned(),
            message: "fault injected".to_owned(),
        })
    }
}

/// A stage that opens a block it never closes.
#[derive(Debug, Clone, Copy)]
pub struct CorruptingStage;

impl PatchStage for CorruptingStage {
    fn name(&self) -> &str {
        "corrupting"
    }

    fn apply(
        &self,
        patcher: &mut DocumentPatcher,
        _: &dyn HostResources,
    ) -> Result<(), EngineError> {
        patcher.set_top_level("broken", "{");
        Ok(())
    }
}
