//! Node and subgraph storage: the IR produced by one invocation of the entry callback.

use crate::access::Access;
use crate::resource::{SubresourceRange, View};
use bitflags::bitflags;
use derivative::Derivative;
use slotmap::new_key_type;
use smallvec::SmallVec;
use std::sync::Arc;

new_key_type! {
    pub struct NodeId;
    pub struct SubgraphId;
}

/// A node's declared queue class is the *minimum* capability required; the scheduler may place
/// it on a more capable queue (graphics is a superset of compute, which is a superset of copy).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum QueueClass {
    Copy,
    Compute,
    Graphics,
}

impl QueueClass {
    pub fn accepts(self, offered: QueueClass) -> bool {
        offered >= self
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
    pub struct SubgraphFlags: u8 {
        /// No foreign node may be interleaved between this subgraph's members.
        const ATOMIC = 1 << 0;
        /// Members keep their relative program order; no internal reordering.
        const SEQUENTIAL = 1 << 1;
    }
}

#[derive(Clone, Debug)]
pub struct Subgraph {
    pub id: SubgraphId,
    pub parent: Option<SubgraphId>,
    pub flags: SubgraphFlags,
    pub debug_name: Option<Box<str>>,
}

/// One resource sub-argument of a node: the view it binds plus the subresource range and access
/// expanded over it. A node may have zero or more of these — zero for parameterless or
/// non-resource nodes, more than one for array parameters expanded element-wise.
#[derive(Clone, Debug)]
pub struct NodeAccess {
    pub view: View,
    pub range: SubresourceRange,
    pub access: Access,
}

/// A callback invoked by the record orchestrator with a `CmdCallbackContext`. Boxed so built-in
/// catalog nodes and user nodes share one representation.
pub type NodeCallback = Arc<dyn Fn(&mut crate::record::CmdCallbackContext) -> crate::error::Result<()> + Send + Sync>;

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Node {
    pub id: NodeId,
    pub name: Box<str>,
    /// Opaque to `Debug`: a node's callback is a closure, not a printable value.
    #[derivative(Debug = "ignore")]
    pub callback: NodeCallback,
    pub accesses: SmallVec<[NodeAccess; 4]>,
    /// Minimum queue class this node can run on.
    pub queue_class: QueueClass,
    /// Hint that the scheduler may place this node on a secondary (async) queue of the same or
    /// greater capability if doing so shortens the critical path.
    pub async_hint: bool,
    /// The innermost subgraph this node was created in, if any.
    pub subgraph: Option<SubgraphId>,
    /// Program order index — this node's initial sequence number.
    pub program_order: u32,
    /// Side effects observable outside the graph (default true for user callbacks); dead-code
    /// elimination treats non-pure nodes as always-live sinks.
    pub has_side_effects: bool,
    pub debug_name: Option<Box<str>>,
}
