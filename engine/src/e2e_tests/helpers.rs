//! Common helpers for end-to-end tests.

use serde_json::Value as JsonValue;

use crate::acl::AccessPolicy;
use crate::config::EngineConfig;
use crate::context::{AuthInfo, RequestContext};
use crate::error::EngineError;
use crate::pipeline::RecordEngine;
use crate::simulation::SimulatedTimeSource;
use crate::storage::MemoryStore;
use crate::testing::RecordingHooks;

/// Owns every collaborator of a [`RecordEngine`].
pub struct TestEngine {
    pub storage: MemoryStore,
    pub policy: AccessPolicy,
    pub config: EngineConfig,
    pub hooks: RecordingHooks,
    pub clock: SimulatedTimeSource,
}

impl TestEngine {
    /// A fresh engine with an empty store, an open policy and no hooks.
    pub fn new() -> Self {
        Self::with_hooks(RecordingHooks::new())
    }

    pub fn with_hooks(hooks: RecordingHooks) -> Self {
        Self {
            storage: MemoryStore::new(),
            policy: AccessPolicy::new(),
            config: EngineConfig::default(),
            hooks,
            clock: SimulatedTimeSource::default_start(),
        }
    }

    fn engine(&mut self) -> RecordEngine<'_> {
        RecordEngine::new(&mut self.storage, &self.policy, &self.config)
            .with_hooks(&self.hooks)
            .with_clock(&self.clock)
    }

    pub fn save(
        &mut self,
        ctx: &RequestContext,
        payload: &JsonValue,
    ) -> Result<JsonValue, EngineError> {
        self.engine().save(ctx, payload)
    }

    pub fn delete(
        &mut self,
        ctx: &RequestContext,
        payload: &JsonValue,
    ) -> Result<JsonValue, EngineError> {
        self.engine().delete(ctx, payload)
    }

    pub fn query(
        &mut self,
        ctx: &RequestContext,
        payload: &JsonValue,
    ) -> Result<JsonValue, EngineError> {
        self.engine().query(ctx, payload)
    }

    pub fn fetch(
        &mut self,
        ctx: &RequestContext,
        payload: &JsonValue,
    ) -> Result<JsonValue, EngineError> {
        self.engine().fetch(ctx, payload)
    }
}

/// A request made by `user_id`.
pub fn user(user_id: &str) -> RequestContext {
    RequestContext::user(AuthInfo::new(user_id))
}

/// A master-key request made by `user_id`.
pub fn master(user_id: &str) -> RequestContext {
    user(user_id).with_master_key()
}

/// The `result` list of a batch or query response.
pub fn results(response: &JsonValue) -> &[JsonValue] {
    response["result"].as_array().map(Vec::as_slice).unwrap_or_default()
}

/// A keypath expression.
pub fn keypath(path: &str) -> JsonValue {
    serde_json::json!({"$type": "keypath", "$val": path})
}
