//! The fixed sequence of patch stages run by a transaction.
//!
//! Stages run in order: top-level directives, logging directives, tuning
//! directives and listener TLS policy. Each stage only decides which
//! primitives to apply; validation and commit belong to the transaction
//! controller.

use warden_config::{LoggingBlock, PatchPolicy, TlsPolicy};
use warden_syntax::{AttributePattern, BlockFilter, BlockPattern};

use crate::error::EngineError;
use crate::patch::DocumentPatcher;
use crate::resources::HostResources;

/// One step of a patch transaction.
pub trait PatchStage {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Applies this stage's primitives to the working document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the stage cannot run; the transaction
    /// then rolls back.
    fn apply(
        &self,
        patcher: &mut DocumentPatcher,
        resources: &dyn HostResources,
    ) -> Result<(), EngineError>;
}

/// Pins top-level directives.
#[derive(Debug, Clone)]
pub struct TopLevelStage {
    directives: Vec<(String, String)>,
}

impl TopLevelStage {
    /// Builds the stage from the policy's top-level table.
    #[must_use]
    pub fn from_policy(policy: &PatchPolicy) -> Self {
        Self {
            directives: policy
                .top_level
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }
}

impl PatchStage for TopLevelStage {
    fn name(&self) -> &str {
        "top-level"
    }

    fn apply(
        &self,
        patcher: &mut DocumentPatcher,
        _: &dyn HostResources,
    ) -> Result<(), EngineError> {
        for (key, value) in &self.directives {
            patcher.set_top_level(key, value);
        }
        Ok(())
    }
}

/// Adjusts directives inside logging blocks.
#[derive(Debug, Clone)]
pub struct LoggingStage {
    blocks: Vec<LoggingBlock>,
}

impl LoggingStage {
    /// Builds the stage from the policy's logging blocks.
    #[must_use]
    pub fn from_policy(policy: &PatchPolicy) -> Self {
        Self {
            blocks: policy.logging.clone(),
        }
    }
}

impl PatchStage for LoggingStage {
    fn name(&self) -> &str {
        "logging"
    }

    fn apply(
        &self,
        patcher: &mut DocumentPatcher,
        _: &dyn HostResources,
    ) -> Result<(), EngineError> {
        for block in &self.blocks {
            let pattern = match &block.token {
                Some(token) => BlockPattern::keyword(&block.keyword).with_token(token),
                None => BlockPattern::keyword(&block.keyword),
            };
            for (key, value) in &block.directives {
                patcher.set_in_block(&pattern, key, value);
            }
        }
        Ok(())
    }
}

/// Scales tuning directives with installed memory and kernel features.
#[derive(Debug, Clone)]
pub struct TuningStage {
    policy: PatchPolicy,
}

impl TuningStage {
    /// Builds the stage from the policy's tiers and feature overrides.
    #[must_use]
    pub fn from_policy(policy: &PatchPolicy) -> Self {
        Self {
            policy: policy.clone(),
        }
    }
}

impl PatchStage for TuningStage {
    fn name(&self) -> &str {
        "tuning"
    }

    fn apply(
        &self,
        patcher: &mut DocumentPatcher,
        resources: &dyn HostResources,
    ) -> Result<(), EngineError> {
        let memory_gb = resources.available_memory_gb();
        let pattern = BlockPattern::keyword(&self.policy.tuning_block);
        match self.policy.tier_for(memory_gb) {
            Some(tier) => {
                tracing::debug!(
                    target: "warden::transaction",
                    memory_gb,
                    tier = tier.min_memory_gb,
                    "selected tuning tier"
                );
                for (key, value) in &tier.top_level {
                    patcher.set_top_level(key, value);
                }
                for (key, value) in &tier.tuning {
                    patcher.set_in_block(&pattern, key, value);
                }
            }
            None => tracing::warn!(
                target: "warden::transaction",
                memory_gb,
                "no tuning tier covers this host"
            ),
        }
        for feature in &self.policy.feature_overrides {
            if resources.feature_available(&feature.feature) {
                patcher.set_in_block(&pattern, &feature.key, &feature.value);
            }
        }
        Ok(())
    }
}

/// Applies TLS settings to listeners carrying the secure attribute.
#[derive(Debug, Clone)]
pub struct ListenerTlsStage {
    filter: BlockFilter,
    tls: TlsPolicy,
}

impl ListenerTlsStage {
    /// Builds the stage for listeners introduced by `listener_keyword`.
    #[must_use]
    pub fn from_policy(policy: &PatchPolicy, listener_keyword: &str) -> Self {
        let tls = policy.tls.clone();
        let filter = BlockFilter::attribute(AttributePattern::new(
            &tls.attribute_key,
            &tls.attribute_value,
        ))
        .within(BlockPattern::keyword(listener_keyword));
        Self { filter, tls }
    }
}

impl PatchStage for ListenerTlsStage {
    fn name(&self) -> &str {
        "listener-tls"
    }

    fn apply(
        &self,
        patcher: &mut DocumentPatcher,
        _: &dyn HostResources,
    ) -> Result<(), EngineError> {
        for (key, value) in &self.tls.set {
            patcher.set_in_filtered_blocks(&self.filter, key, value);
        }
        if !self.tls.strip.is_empty() {
            let keys: Vec<&str> = self.tls.strip.iter().map(String::as_str).collect();
            patcher.strip_keys_in_filtered_blocks(&self.filter, &keys);
        }
        Ok(())
    }
}

/// The four stages in their fixed order.
#[must_use]
pub fn standard_stages(policy: &PatchPolicy, listener_keyword: &str) -> Vec<Box<dyn PatchStage>> {
    vec![
        Box::new(TopLevelStage::from_policy(policy)),
        Box::new(LoggingStage::from_policy(policy)),
        Box::new(TuningStage::from_policy(policy)),
        Box::new(ListenerTlsStage::from_policy(policy, listener_keyword)),
    ]
}
