//! Runtime backend selection
//!
//! `EngineSession` returns opaque futures and cannot be boxed, so the backend
//! chosen by configuration is dispatched through an enum.

use std::time::Duration;

use contracts::{
    ContractError, EngineBackend, EngineConfig, EngineSession, FrameRequest, RenderOutputSet,
    SceneId, SessionManifest,
};

use crate::mock::{MockEngine, MockEngineConfig};
use crate::remote::RemoteEngine;

/// Engine backend chosen at runtime
pub enum Engine {
    Mock(MockEngine),
    Remote(RemoteEngine),
}

impl Engine {
    /// Build the backend named by `config.backend`
    pub fn from_config(config: &EngineConfig) -> Self {
        match config.backend {
            EngineBackend::Mock => Engine::Mock(MockEngine::with_config(MockEngineConfig::from(
                &config.mock,
            ))),
            EngineBackend::Remote => Engine::Remote(
                RemoteEngine::new(config.address.clone())
                    .with_connect_timeout(Duration::from_millis(config.connect_timeout_ms)),
            ),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Engine::Mock(_) => "mock",
            Engine::Remote(_) => "remote",
        }
    }
}

impl EngineSession for Engine {
    async fn connect(
        &mut self,
        scene: SceneId,
        manifest: &SessionManifest,
    ) -> Result<bool, ContractError> {
        match self {
            Engine::Mock(engine) => engine.connect(scene, manifest).await,
            Engine::Remote(engine) => engine.connect(scene, manifest).await,
        }
    }

    async fn request_frame(&mut self, request: &FrameRequest) -> Result<(), ContractError> {
        match self {
            Engine::Mock(engine) => engine.request_frame(request).await,
            Engine::Remote(engine) => engine.request_frame(request).await,
        }
    }

    async fn collect_outputs(&mut self) -> Result<RenderOutputSet, ContractError> {
        match self {
            Engine::Mock(engine) => engine.collect_outputs().await,
            Engine::Remote(engine) => engine.collect_outputs().await,
        }
    }

    async fn disconnect(&mut self) -> Result<(), ContractError> {
        match self {
            Engine::Mock(engine) => engine.disconnect().await,
            Engine::Remote(engine) => engine.disconnect().await,
        }
    }
}
