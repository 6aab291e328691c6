//! Record Orchestrator: walks the finalized batch/transition/fence/render-pass plan and drives
//! a `BackendHooks` implementation, invoking each live node's callback with a typed context.

use crate::backend::{BackendHooks, CommandEncoder};
use crate::barrier::{CommandBatch, PassAction, PassHooks, Transition};
use crate::builder::GraphIr;
use crate::error::{Error, Result};
use crate::fence::FencePlan;
use crate::node::NodeId;
use crate::resource::{ResourceDesc, View};
use crate::scheduler::QueueAssignment;
use fxhash::FxHashMap;
use std::sync::Mutex;

/// Per-build scratch storage for node callbacks that need to stash bytes with a lifetime longer
/// than the call itself (e.g. a computed clear color, a dynamically sized push-constant blob).
/// The lock is only ever held for the duration of one push or one copy-out read, never across a
/// callback invocation, so contention between callbacks recording on different queues concurrently
/// stays minimal.
#[derive(Default)]
pub struct ContextArena {
    bytes: Mutex<Vec<u8>>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ArenaToken {
    offset: usize,
    len: usize,
}

impl ContextArena {
    pub fn new() -> ContextArena {
        ContextArena::default()
    }

    pub fn alloc(&self, data: &[u8]) -> ArenaToken {
        let mut guard = self.bytes.lock().expect("context arena mutex poisoned");
        let offset = guard.len();
        guard.extend_from_slice(data);
        ArenaToken { offset, len: data.len() }
    }

    pub fn read(&self, token: ArenaToken) -> Vec<u8> {
        let guard = self.bytes.lock().expect("context arena mutex poisoned");
        guard[token.offset..token.offset + token.len].to_vec()
    }
}

/// A context's command encoder is either borrowed from the batch being recorded (the usual case)
/// or owned outright by a worker-thread clone obtained through `clone_context`.
enum EncoderSlot<'a> {
    Borrowed(&'a mut dyn CommandEncoder),
    Owned(Box<dyn CommandEncoder>),
}

impl EncoderSlot<'_> {
    fn as_mut(&mut self) -> &mut dyn CommandEncoder {
        match self {
            EncoderSlot::Borrowed(e) => *e,
            EncoderSlot::Owned(e) => e.as_mut(),
        }
    }
}

/// The render targets and depth-stencil attachment a render-pass-scoped node callback is
/// recording into, along with the viewport a full-screen draw should use by default — both
/// derived from the node's bound accesses rather than tracked separately.
#[derive(Copy, Clone, Debug)]
pub struct ViewportInfo {
    pub width: u32,
    pub height: u32,
}

/// Passed to every node callback. Exposes the node's bound resources and raw argument bytes, the
/// backend's command encoder for the batch currently being recorded, and per-build scratch
/// storage.
pub struct CmdCallbackContext<'a> {
    pub(crate) node_id: NodeId,
    pub(crate) ir: &'a GraphIr,
    pub(crate) backend: &'a dyn BackendHooks,
    pub(crate) queue: QueueAssignment,
    encoder: EncoderSlot<'a>,
    pub(crate) arena: &'a ContextArena,
}

impl<'a> CmdCallbackContext<'a> {
    pub fn node_name(&self) -> &str {
        &self.ir.nodes[self.node_id].name
    }

    /// The view bound to the node's `index`-th resource access, in declaration order.
    pub fn resource(&self, index: usize) -> Result<View> {
        self.ir.nodes[self.node_id]
            .accesses
            .get(index)
            .map(|a| a.view)
            .ok_or_else(|| {
                Error::index_out_of_bounds(format!(
                    "node `{}` has no resource access at index {}",
                    self.node_name(),
                    index
                ))
            })
    }

    /// The raw bytes bound to entry signature parameter `index` for this build. Fails if that
    /// parameter is a resource parameter or was never bound.
    pub fn entry_arg(&self, index: usize) -> Result<&'a [u8]> {
        let arg_index = self
            .ir
            .entry_arg_indices
            .get(index)
            .copied()
            .flatten()
            .ok_or_else(|| Error::index_out_of_bounds(format!("entry parameter {} has no bound argument bytes", index)))?;
        Ok(self.ir.arg_buffer.get(arg_index))
    }

    /// The full description of the resource bound to entry signature parameter `index`. Fails if
    /// that parameter is not a resource parameter or was never bound.
    pub fn entry_arg_resource_desc(&self, index: usize) -> Result<ResourceDesc> {
        let resource_id = self
            .ir
            .entry_param_resources
            .get(index)
            .copied()
            .flatten()
            .ok_or_else(|| Error::index_out_of_bounds(format!("entry parameter {} has no bound resource", index)))?;
        Ok(self.ir.resources[resource_id].desc)
    }

    /// The resource id bound to entry signature parameter `index`. Fails if that parameter is not
    /// a resource parameter or was never bound.
    pub fn entry_arg_resource(&self, index: usize) -> Result<crate::resource::ResourceId> {
        self.ir
            .entry_param_resources
            .get(index)
            .copied()
            .flatten()
            .ok_or_else(|| Error::index_out_of_bounds(format!("entry parameter {} has no bound resource", index)))
    }

    /// The exact `View` passed into `update` for entry signature parameter `index`, including its
    /// subresource range and temporal layer. Fails if that parameter is not a resource parameter
    /// or was never bound.
    pub fn entry_arg_view(&self, index: usize) -> Result<View> {
        self.ir
            .entry_param_views
            .get(index)
            .copied()
            .flatten()
            .ok_or_else(|| Error::index_out_of_bounds(format!("entry parameter {} has no bound view", index)))
    }

    /// The render-pass-scoped views bound to this node, in declaration order.
    pub fn render_targets_info(&self) -> Vec<View> {
        self.ir.nodes[self.node_id]
            .accesses
            .iter()
            .filter(|a| a.access.is_render_pass_scoped())
            .map(|a| a.view)
            .collect()
    }

    /// The extent implied by this node's first render-pass-scoped attachment, if it has one.
    pub fn viewport_info(&self) -> Option<ViewportInfo> {
        let view = self.render_targets_info().into_iter().next()?;
        let resource_id = view.resource_id()?;
        let desc = &self.ir.resources[resource_id].desc;
        Some(ViewportInfo { width: desc.width, height: desc.height_or_size_hi })
    }

    pub fn backend(&self) -> &'a dyn BackendHooks {
        self.backend
    }

    pub fn encoder_mut(&mut self) -> &mut dyn CommandEncoder {
        self.encoder.as_mut()
    }

    pub fn arena(&self) -> &ContextArena {
        self.arena
    }

    /// Clones this context with its own command-recording target, obtained from the backend's
    /// `clone_command_context` hook, so a node callback can fan work for this node out onto a
    /// worker thread. The caller is responsible for joining any threads it spawns, and for
    /// submitting the clone's encoder (e.g. via the backend) before the node callback returns —
    /// the record orchestrator only ever closes the primary encoder it opened for the batch.
    pub fn clone_context(&self) -> Result<CmdCallbackContext<'a>> {
        let encoder = self.backend.clone_command_context(self.queue)?;
        Ok(CmdCallbackContext {
            node_id: self.node_id,
            ir: self.ir,
            backend: self.backend,
            queue: self.queue,
            encoder: EncoderSlot::Owned(encoder),
            arena: self.arena,
        })
    }
}

/// Summarizes how many nodes land on each queue's batches, without recording anything — used by
/// diagnostics and by backends that want to pre-size per-queue command pools before recording
/// begins.
pub fn batch_layout(batches: &[CommandBatch]) -> Vec<(crate::scheduler::QueueAssignment, usize)> {
    batches.iter().map(|b| (b.queue, b.nodes.len())).collect()
}

/// Records every live node's commands, in schedule order, grouped into the given batches, with
/// transitions inserted immediately before the access that needs them, render-pass hooks invoked
/// around render-pass-scoped runs, and fences waited/signaled at batch boundaries.
pub fn record_commands(
    ir: &GraphIr,
    batches: &[CommandBatch],
    transitions: &[Transition],
    pass_hooks: &FxHashMap<NodeId, PassHooks>,
    fences: &FencePlan,
    backend: &dyn BackendHooks,
    arena: &ContextArena,
) -> Result<()> {
    let mut transitions_before: FxHashMap<NodeId, Vec<&Transition>> = FxHashMap::default();
    for t in transitions {
        transitions_before.entry(t.after_node).or_default().push(t);
    }

    for (batch_index, batch) in batches.iter().enumerate() {
        let mut encoder = backend.begin_command_encoder(batch.queue)?;

        if let Some(waits) = fences.waits.get(batch_index) {
            for wait in waits {
                backend.wait_fence(batch.queue, wait.fence, wait.value)?;
            }
        }

        for &node_id in &batch.nodes {
            if let Some(pending) = transitions_before.get(&node_id) {
                for t in pending {
                    backend.record_transition(
                        encoder.as_mut(),
                        t.resource_id,
                        t.range,
                        t.before,
                        t.after,
                        t.discard,
                    )?;
                }
            }

            let hooks = pass_hooks.get(&node_id).copied().unwrap_or_default();
            if let Some(pre) = hooks.pre {
                let attachments: Vec<View> = ir.nodes[node_id]
                    .accesses
                    .iter()
                    .filter(|a| a.access.is_render_pass_scoped())
                    .map(|a| a.view)
                    .collect();
                match pre {
                    PassAction::Begin => backend.begin_render_pass(encoder.as_mut(), &attachments)?,
                    PassAction::Resume => backend.resume_render_pass(encoder.as_mut())?,
                    PassAction::Suspend | PassAction::End => {}
                }
            }

            {
                let node = &ir.nodes[node_id];
                let mut ctx = CmdCallbackContext {
                    node_id,
                    ir,
                    backend,
                    queue: batch.queue,
                    encoder: EncoderSlot::Borrowed(encoder.as_mut()),
                    arena,
                };
                (node.callback)(&mut ctx)?;
            }

            if let Some(post) = hooks.post {
                match post {
                    PassAction::End | PassAction::Suspend => backend.end_render_pass(encoder.as_mut())?,
                    PassAction::Begin | PassAction::Resume => {}
                }
            }
        }

        if let Some(signals) = fences.signals.get(batch_index) {
            for signal in signals {
                backend.signal_fence(batch.queue, signal.fence, signal.value)?;
            }
        }

        backend.end_command_encoder(encoder)?;
    }

    Ok(())
}
