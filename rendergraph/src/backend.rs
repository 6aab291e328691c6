//! Backend Hook Interface: the vtable a concrete graphics API (Vulkan, D3D12, a mock for tests)
//! implements so the graph runtime can drive it without depending on any one API crate.

use crate::access::Access;
use crate::format::Format;
use crate::memory::Placement;
use crate::resource::{ResourceDesc, ResourceId, SubresourceRange, View};
use crate::scheduler::QueueAssignment;
use downcast_rs::{impl_downcast, DowncastSync};

/// Opaque backend command-encoder handle. The runtime never interprets this itself; it is handed
/// back to the same `BackendHooks` implementation that produced it via `CmdCallbackContext`.
pub trait CommandEncoder: DowncastSync {}
impl_downcast!(sync CommandEncoder);

/// Implemented by a concrete graphics API binding. Every method receives already-validated,
/// already-scheduled data — the runtime is responsible for ordering and synchronization
/// correctness; the backend is responsible only for issuing the matching native calls.
pub trait BackendHooks: DowncastSync {
    fn create_resource(&self, id: ResourceId, desc: &ResourceDesc, placement: Option<Placement>) -> crate::error::Result<()>;

    fn destroy_resource(&self, id: ResourceId) -> crate::error::Result<()>;

    fn begin_command_encoder(&self, queue: QueueAssignment) -> crate::error::Result<Box<dyn CommandEncoder>>;

    fn end_command_encoder(&self, encoder: Box<dyn CommandEncoder>) -> crate::error::Result<()>;

    fn record_transition(
        &self,
        encoder: &mut dyn CommandEncoder,
        resource: ResourceId,
        range: SubresourceRange,
        before: Access,
        after: Access,
        discard: bool,
    ) -> crate::error::Result<()>;

    fn begin_render_pass(&self, encoder: &mut dyn CommandEncoder, attachments: &[View]) -> crate::error::Result<()>;

    fn resume_render_pass(&self, encoder: &mut dyn CommandEncoder) -> crate::error::Result<()>;

    fn end_render_pass(&self, encoder: &mut dyn CommandEncoder) -> crate::error::Result<()>;

    fn clear(&self, encoder: &mut dyn CommandEncoder, target: View, value: [f32; 4]) -> crate::error::Result<()>;

    fn copy(&self, encoder: &mut dyn CommandEncoder, src: View, dst: View) -> crate::error::Result<()>;

    fn resolve_multisample(
        &self,
        encoder: &mut dyn CommandEncoder,
        src: View,
        dst: View,
        format: Format,
    ) -> crate::error::Result<()>;

    fn signal_fence(&self, queue: QueueAssignment, fence: crate::fence::FenceId, value: u64) -> crate::error::Result<()>;

    fn wait_fence(&self, queue: QueueAssignment, fence: crate::fence::FenceId, value: u64) -> crate::error::Result<()>;

    fn submit(&self, queue: QueueAssignment, encoders: Vec<Box<dyn CommandEncoder>>) -> crate::error::Result<()>;

    /// Hands a node callback a second command-recording context for the same queue, so it can
    /// fan work out onto a worker thread instead of recording everything inline. The default
    /// implementation just opens another primary encoder via `begin_command_encoder`; a backend
    /// that supports secondary command buffers should override this to hand out one of those
    /// instead, and is responsible for merging it into the primary encoder's submission itself.
    fn clone_command_context(&self, queue: QueueAssignment) -> crate::error::Result<Box<dyn CommandEncoder>> {
        self.begin_command_encoder(queue)
    }
}
impl_downcast!(sync BackendHooks);
