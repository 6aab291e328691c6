//! Graph Builder: translates one invocation of the entry callback into an immutable graph IR.

use crate::access::Access;
use crate::error::{Error, Result};
use crate::node::{Node, NodeAccess, NodeCallback, NodeId, QueueClass, Subgraph, SubgraphFlags, SubgraphId};
use crate::resource::{Resource, ResourceDesc, ResourceId, SubresourceRange, View};
use crate::signature::ArgBuffer;
use slotmap::SlotMap;
use smallvec::SmallVec;

/// One resource sub-argument passed to `add_node`: the view bound to a parameter, plus the
/// access that parameter declares. The builder expands this over the view's subresource range.
#[derive(Clone, Debug)]
pub struct ParamBinding {
    pub view: View,
    pub access: Access,
}

impl ParamBinding {
    pub fn new(view: View, access: Access) -> ParamBinding {
        ParamBinding { view, access }
    }
}

/// The finalized, immutable IR produced by one graph build. Downstream stages (lifetime
/// analysis, scheduling, barrier synthesis, memory planning, recording) all operate on this.
pub struct GraphIr {
    pub resources: SlotMap<ResourceId, Resource>,
    pub nodes: SlotMap<NodeId, Node>,
    pub subgraphs: SlotMap<SubgraphId, Subgraph>,
    /// Program-order positions (in terms of node program_order) after which no reordering may
    /// cross — a `scheduleBarrier` splits the program into independent chunks.
    pub schedule_barriers: Vec<u32>,
    pub arg_buffer: ArgBuffer,
    /// Entry signature parameter index -> bound resource id, carried from the builder so node
    /// callbacks can look up an entry resource's full `ResourceDesc` at record time.
    pub entry_param_resources: Vec<Option<ResourceId>>,
    /// Entry signature parameter index -> the exact `View` passed into `update`, including its
    /// subresource range and temporal layer — `entry_param_resources` alone loses that detail.
    pub entry_param_views: Vec<Option<View>>,
    /// Entry signature parameter index -> `arg_buffer` offset index, for the same reason on the
    /// non-resource side.
    pub entry_arg_indices: Vec<Option<usize>>,
}

impl GraphIr {
    pub fn node_order(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().collect();
        ids.sort_by_key(|id| self.nodes[*id].program_order);
        ids
    }
}

/// Builds one `GraphIr` from a sequence of `add_node`/`push_subgraph`/`pop_subgraph` calls. The
/// builder owns node/resource/access storage for exactly one update; callers are expected to
/// construct a fresh `GraphBuilder` per `update` (the graph handle releases the prior one before
/// re-invoking the entry callback, per the lifecycle invariant in the data model).
pub struct GraphBuilder {
    resources: SlotMap<ResourceId, Resource>,
    nodes: SlotMap<NodeId, Node>,
    subgraphs: SlotMap<SubgraphId, Subgraph>,
    subgraph_stack: Vec<SubgraphId>,
    schedule_barriers: Vec<u32>,
    arg_buffer: ArgBuffer,
    next_program_order: u32,
    pending_async: bool,
    entry_param_resources: Vec<Option<ResourceId>>,
    entry_param_views: Vec<Option<View>>,
    entry_arg_indices: Vec<Option<usize>>,
}

impl GraphBuilder {
    pub fn new(arg_buffer_capacity: usize) -> GraphBuilder {
        GraphBuilder {
            resources: SlotMap::with_key(),
            nodes: SlotMap::with_key(),
            subgraphs: SlotMap::with_key(),
            subgraph_stack: Vec::new(),
            schedule_barriers: Vec::new(),
            arg_buffer: ArgBuffer::with_capacity(arg_buffer_capacity),
            next_program_order: 0,
            pending_async: false,
            entry_param_resources: Vec::new(),
            entry_param_views: Vec::new(),
            entry_arg_indices: Vec::new(),
        }
    }

    pub fn allocate_data(&mut self, data: &[u8]) -> usize {
        self.arg_buffer.push(data)
    }

    /// Declares a graph-owned resource (transient unless `ResourceFlags::PERSISTENT` is set) or
    /// registers an externally-provided one.
    pub fn declare_resource(&mut self, desc: ResourceDesc, external: bool) -> ResourceId {
        self.resources.insert_with_key(|id| Resource {
            id,
            desc,
            external,
            debug_name: None,
        })
    }

    pub fn set_resource_debug_name(&mut self, id: ResourceId, name: impl Into<Box<str>>) {
        if let Some(r) = self.resources.get_mut(id) {
            r.debug_name = Some(name.into());
        }
    }

    /// Binds an entry resource parameter to a synthesized resource id. Subsequent calls for the
    /// same `entry_param_index` overwrite the binding (re-binding is used when a graph is
    /// rebuilt with different external handles for the same parameter slot).
    pub fn bind_entry_param_resource(&mut self, entry_param_index: usize, id: ResourceId) {
        if self.entry_param_resources.len() <= entry_param_index {
            self.entry_param_resources.resize(entry_param_index + 1, None);
        }
        self.entry_param_resources[entry_param_index] = Some(id);
    }

    /// Records the exact `View` an entry resource parameter was bound to, so node callbacks can
    /// recover its subresource range and temporal layer rather than just the underlying id.
    pub fn bind_entry_param_view(&mut self, entry_param_index: usize, view: View) {
        if self.entry_param_views.len() <= entry_param_index {
            self.entry_param_views.resize(entry_param_index + 1, None);
        }
        self.entry_param_views[entry_param_index] = Some(view);
    }

    pub fn get_param_resource_id(&self, entry_param_index: usize) -> Result<ResourceId> {
        self.entry_param_resources
            .get(entry_param_index)
            .copied()
            .flatten()
            .ok_or_else(|| {
                Error::not_found(format!(
                    "entry parameter {} has no bound resource",
                    entry_param_index
                ))
            })
    }

    /// Records which `arg_buffer` slot holds a non-resource entry parameter's bytes, so node
    /// callbacks can retrieve them by entry parameter index from the built `GraphIr`.
    pub fn bind_entry_param_arg(&mut self, entry_param_index: usize, arg_buffer_index: usize) {
        if self.entry_arg_indices.len() <= entry_param_index {
            self.entry_arg_indices.resize(entry_param_index + 1, None);
        }
        self.entry_arg_indices[entry_param_index] = Some(arg_buffer_index);
    }

    pub fn push_subgraph(&mut self, flags: SubgraphFlags, debug_name: Option<Box<str>>) -> SubgraphId {
        let parent = self.subgraph_stack.last().copied();
        let id = self.subgraphs.insert_with_key(|id| Subgraph {
            id,
            parent,
            flags,
            debug_name,
        });
        self.subgraph_stack.push(id);
        id
    }

    pub fn pop_subgraph(&mut self) -> Result<SubgraphId> {
        self.subgraph_stack
            .pop()
            .ok_or_else(|| Error::invalid_program("pop_subgraph called with an empty scope stack"))
    }

    pub fn current_subgraph(&self) -> Option<SubgraphId> {
        self.subgraph_stack.last().copied()
    }

    /// Marks the *next* node added as eligible for placement on a secondary (async) queue.
    pub fn set_async(&mut self, hint: bool) {
        self.pending_async = hint;
    }

    /// Splits the program into independent reorder chunks at the current position.
    pub fn set_schedule_barrier(&mut self) {
        self.schedule_barriers.push(self.next_program_order);
    }

    /// Appends a node in program order, expanding each parameter binding's access attribute over
    /// its subresource range (for resources — null views produce no access record) and unioning
    /// accesses that land on the same subresource of the same node.
    pub fn add_node(
        &mut self,
        queue_class: QueueClass,
        name: impl Into<Box<str>>,
        callback: NodeCallback,
        params: &[ParamBinding],
        has_side_effects: bool,
    ) -> Result<NodeId> {
        let mut accesses: SmallVec<[NodeAccess; 4]> = SmallVec::new();

        for param in params {
            let Some(range) = view_range(&param.view) else {
                continue; // null view: binds no resource, produces no access record
            };
            merge_or_push(&mut accesses, param.view, range, param.access)?;
        }

        let program_order = self.next_program_order;
        self.next_program_order += 1;

        let subgraph = self.current_subgraph();
        let id = self.nodes.insert_with_key(|id| Node {
            id,
            name: name.into(),
            callback,
            accesses,
            queue_class,
            async_hint: self.pending_async,
            subgraph,
            program_order,
            has_side_effects,
            debug_name: None,
        });
        self.pending_async = false;
        Ok(id)
    }

    /// Finalizes the build. Fails with `InvalidProgram` if the subgraph stack was left open.
    pub fn build(self) -> Result<GraphIr> {
        if !self.subgraph_stack.is_empty() {
            return Err(Error::invalid_program(
                "graph build finished with unbalanced push_subgraph/pop_subgraph calls",
            ));
        }
        Ok(GraphIr {
            resources: self.resources,
            nodes: self.nodes,
            subgraphs: self.subgraphs,
            schedule_barriers: self.schedule_barriers,
            arg_buffer: self.arg_buffer,
            entry_param_resources: self.entry_param_resources,
            entry_param_views: self.entry_param_views,
            entry_arg_indices: self.entry_arg_indices,
        })
    }
}

fn view_range(view: &View) -> Option<SubresourceRange> {
    match view {
        View::Null => None,
        View::Image(v) => Some(v.range),
        View::Buffer(_) => Some(SubresourceRange {
            base_mip: 0,
            mip_count: 1,
            base_array_layer: 0,
            array_count: 1,
            aspect_mask: crate::format::AspectMask::COLOR,
        }),
    }
}

/// Implements the "tie-break" rule: when two parameters of the same node touch the same
/// subresource, union their access flags, implicitly setting `DiscardBefore`/`DiscardAfter` when
/// the union turns out to be a full overwrite. `InvalidProgram` if the union is invalid.
fn merge_or_push(
    accesses: &mut SmallVec<[NodeAccess; 4]>,
    view: View,
    range: SubresourceRange,
    access: Access,
) -> Result<()> {
    let resource = view.resource_id();
    if let Some(existing) = accesses
        .iter_mut()
        .find(|a| a.view.resource_id() == resource && a.range == range)
    {
        let merged = existing
            .access
            .union(&access)
            .ok_or_else(|| Error::invalid_program("incompatible access union on node parameter"))?;
        existing.access = merged;
    } else {
        accesses.push(NodeAccess { view, range, access });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessFlags;
    use crate::resource::{ImageView, ResourceFlags};
    use std::sync::Arc;

    fn noop_callback() -> NodeCallback {
        Arc::new(|_ctx| Ok(()))
    }

    #[test]
    fn null_view_produces_no_access_record() {
        let mut b = GraphBuilder::new(0);
        let params = [ParamBinding::new(View::Null, Access::new(AccessFlags::SHADER_READ))];
        let id = b
            .add_node(QueueClass::Graphics, "node", noop_callback(), &params, true)
            .unwrap();
        assert!(b.nodes[id].accesses.is_empty());
    }

    #[test]
    fn unbalanced_subgraph_stack_fails_build() {
        let mut b = GraphBuilder::new(0);
        b.push_subgraph(SubgraphFlags::ATOMIC, None);
        assert!(b.build().is_err());
    }

    #[test]
    fn conflicting_union_is_invalid_program() {
        let mut b = GraphBuilder::new(0);
        let res = b.declare_resource(ResourceDesc::buffer(16, ResourceFlags::empty()), false);
        let view = View::Image(ImageView {
            resource: res,
            view_format: Default::default(),
            range: SubresourceRange {
                base_mip: 0,
                mip_count: 1,
                base_array_layer: 0,
                array_count: 1,
                aspect_mask: crate::format::AspectMask::COLOR,
            },
            temporal_layer: 0,
            component_mapping: Default::default(),
            cubemap: false,
        });
        let params = [
            ParamBinding::new(view, Access::new(AccessFlags::CPU_WRITE)),
            ParamBinding::new(view, Access::new(AccessFlags::RENDER_TARGET)),
        ];
        let result = b.add_node(QueueClass::Graphics, "node", noop_callback(), &params, true);
        assert!(result.is_err());
    }

    #[test]
    fn program_order_is_sequential() {
        let mut b = GraphBuilder::new(0);
        let a = b
            .add_node(QueueClass::Graphics, "a", noop_callback(), &[], true)
            .unwrap();
        let c = b
            .add_node(QueueClass::Graphics, "b", noop_callback(), &[], true)
            .unwrap();
        assert_eq!(b.nodes[a].program_order, 0);
        assert_eq!(b.nodes[c].program_order, 1);
    }
}
