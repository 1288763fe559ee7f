//! EngineSession trait - the rendering engine as seen by the bridge
//!
//! Implemented by the in-process mock engine and the TCP remote client.

use std::future::Future;

use crate::{ContractError, FrameRequest, RenderOutputSet, SceneId, SessionManifest};

/// Rendering engine session
///
/// Calls arrive strictly in the order connect, then alternating
/// `request_frame` / `collect_outputs` pairs, then `disconnect`. The bridge
/// guarantees no second request is issued before the previous one was
/// collected.
pub trait EngineSession: Send {
    /// Open the scene and instantiate every entity of the manifest.
    ///
    /// Returns `Ok(false)` when the engine answered but refused or did not
    /// become ready.
    fn connect(
        &mut self,
        scene: SceneId,
        manifest: &SessionManifest,
    ) -> impl Future<Output = Result<bool, ContractError>> + Send;

    /// Push vehicle poses and render one frame. Resolves once the engine has
    /// finished rendering or reported failure.
    fn request_frame(
        &mut self,
        request: &FrameRequest,
    ) -> impl Future<Output = Result<(), ContractError>> + Send;

    /// Outputs of the most recently completed frame.
    fn collect_outputs(
        &mut self,
    ) -> impl Future<Output = Result<RenderOutputSet, ContractError>> + Send;

    /// Release the session. Idempotent.
    fn disconnect(&mut self) -> impl Future<Output = Result<(), ContractError>> + Send;
}
