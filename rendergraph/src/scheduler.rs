//! Scheduler: dead-code elimination, dependency-respecting topological ordering, queue
//! assignment and subgraph-ordering constraints.

use crate::builder::GraphIr;
use crate::lifetime::AccessRecord;
use crate::node::{NodeId, QueueClass, SubgraphFlags};
use fxhash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReorderPolicy {
    /// No reordering beyond what dependencies require: ties broken by program order.
    ProgramOrder,
    /// Ties broken to keep consecutive nodes on the same queue class, reducing pipeline stalls
    /// from switching between graphics and compute state.
    MinimizeComputeGfxSwitch,
    /// Ties broken to retire resources (and thus free transient memory) as early as possible.
    PreferMemorySaving,
    /// Ties broken by a deterministic PRNG, seeded explicitly — used by fuzz/stress tests that
    /// want to explore many legal orderings without depending on a true source of randomness.
    RandomOrder(u64),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct QueueAssignment {
    pub queue_class: QueueClass,
    /// Index of the physical queue within its class: 0 is always the primary queue of that
    /// class, >0 are async/secondary queues offered for `async_hint` nodes.
    pub queue_index: u32,
}

pub struct Schedule {
    /// Final execution order, one entry per live node.
    pub order: Vec<NodeId>,
    pub queue_of: FxHashMap<NodeId, QueueAssignment>,
    /// Nodes present in the built graph but eliminated as dead (no side effects and no live
    /// consumer), in case diagnostics wants to report them.
    pub eliminated: Vec<NodeId>,
}

/// A xorshift64* PRNG: deterministic, dependency-free, reseedable per call, used only for
/// `ReorderPolicy::RandomOrder` tie-breaking.
struct XorShift64(u64);

impl XorShift64 {
    fn new(seed: u64) -> XorShift64 {
        XorShift64(if seed == 0 { 0x9E3779B97F4A7C15 } else { seed })
    }

    fn next_index(&mut self, bound: usize) -> usize {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x % bound as u64) as usize
    }
}

/// Dependency edge: `to` must be scheduled after `from`.
#[derive(Copy, Clone, Debug)]
struct Edge {
    from: NodeId,
    to: NodeId,
}

/// Builds the minimal dependency edge set from the flattened access timeline: for every
/// resource, tracks the open (most recent, not-yet-subsumed) accesses per subresource range and
/// links a new access to every open access it conflicts with — the standard approach the
/// upcoming barrier synthesizer reuses to decide where a transition is actually required.
fn dependency_edges(records: &[AccessRecord]) -> Vec<Edge> {
    let mut open: FxHashMap<crate::resource::ResourceId, Vec<(crate::resource::SubresourceRange, crate::access::Access, NodeId)>> =
        FxHashMap::default();
    let mut edges = Vec::new();

    for record in records {
        let entries = open.entry(record.resource_id).or_default();
        let mut still_open = Vec::with_capacity(entries.len());
        for (range, access, node_id) in entries.drain(..) {
            if range.overlaps(&record.range) {
                if !access.compatible_with(&record.access) {
                    edges.push(Edge {
                        from: node_id,
                        to: record.node_id,
                    });
                }
                if !record.range.is_full_overwrite_of(&range) {
                    still_open.push((range, access, node_id));
                }
            } else {
                still_open.push((range, access, node_id));
            }
        }
        still_open.push((record.range, record.access, record.node_id));
        *entries = still_open;
    }

    edges
}

/// Marks a node live if it has side effects, if any of its accesses writes a persistent or
/// external resource, or if a live node transitively depends on it (consumes something it
/// produced). Nodes with no observable effect and no live consumer are eliminated before
/// scheduling.
fn dead_code_eliminate(ir: &GraphIr, edges: &[Edge]) -> (FxHashSet<NodeId>, Vec<NodeId>) {
    let mut dependents: FxHashMap<NodeId, SmallVec<[NodeId; 4]>> = FxHashMap::default();
    for edge in edges {
        dependents.entry(edge.to).or_default().push(edge.from);
    }

    let writes_persistent_resource = |node: &crate::node::Node| {
        node.accesses.iter().any(|a| {
            a.access.is_write()
                && a.view
                    .resource_id()
                    .map(|id| ir.resources[id].is_persistent())
                    .unwrap_or(false)
        })
    };

    let mut live: FxHashSet<NodeId> = FxHashSet::default();
    let mut stack: Vec<NodeId> = ir
        .nodes
        .iter()
        .filter(|(_, n)| n.has_side_effects || writes_persistent_resource(n))
        .map(|(id, _)| id)
        .collect();
    while let Some(id) = stack.pop() {
        if live.insert(id) {
            if let Some(producers) = dependents.get(&id) {
                stack.extend(producers.iter().copied());
            }
        }
    }

    let eliminated = ir
        .nodes
        .keys()
        .filter(|id| !live.contains(id))
        .collect::<Vec<_>>();
    (live, eliminated)
}

/// Computes the chunk index a node falls into given the build's `scheduleBarrier` calls: nodes
/// may only be reordered within a chunk, never across one.
fn chunk_of(program_order: u32, barriers: &[u32]) -> u32 {
    barriers.iter().filter(|&&b| b <= program_order).count() as u32
}

/// Produces a final schedule honoring data dependencies, schedule barriers, and subgraph
/// ordering flags, then assigns each node to a queue.
pub fn schedule(ir: &GraphIr, records: &[AccessRecord], policy: ReorderPolicy) -> Schedule {
    let edges = dependency_edges(records);
    let (live, eliminated) = dead_code_eliminate(ir, &edges);

    let mut extra_edges = Vec::new();
    for subgraph_id in ir.subgraphs.keys() {
        let flags = ir.subgraphs[subgraph_id].flags;
        if !flags.intersects(SubgraphFlags::ATOMIC | SubgraphFlags::SEQUENTIAL) {
            continue;
        }
        let mut members: Vec<NodeId> = ir
            .nodes
            .iter()
            .filter(|(id, n)| n.subgraph == Some(subgraph_id) && live.contains(id))
            .map(|(id, _)| id)
            .collect();
        members.sort_by_key(|id| ir.nodes[*id].program_order);
        for pair in members.windows(2) {
            extra_edges.push(Edge {
                from: pair[0],
                to: pair[1],
            });
        }
    }

    let mut in_degree: FxHashMap<NodeId, u32> = FxHashMap::default();
    let mut successors: FxHashMap<NodeId, SmallVec<[NodeId; 4]>> = FxHashMap::default();
    for id in ir.nodes.keys().filter(|id| live.contains(id)) {
        in_degree.entry(id).or_insert(0);
    }
    for edge in edges.iter().chain(extra_edges.iter()) {
        if !live.contains(&edge.from) || !live.contains(&edge.to) {
            continue;
        }
        successors.entry(edge.from).or_default().push(edge.to);
        *in_degree.entry(edge.to).or_insert(0) += 1;
    }

    let atomic_member_of: FxHashMap<NodeId, crate::node::SubgraphId> = ir
        .nodes
        .iter()
        .filter(|(id, n)| {
            live.contains(id)
                && n.subgraph
                    .map(|s| ir.subgraphs[s].flags.contains(SubgraphFlags::ATOMIC))
                    .unwrap_or(false)
        })
        .map(|(id, n)| (id, n.subgraph.unwrap()))
        .collect();

    let mut remaining_accesses: FxHashMap<crate::resource::ResourceId, u32> = FxHashMap::default();
    for record in records {
        *remaining_accesses.entry(record.resource_id).or_insert(0) += 1;
    }
    let mut record_index: FxHashMap<NodeId, SmallVec<[crate::resource::ResourceId; 4]>> = FxHashMap::default();
    for record in records {
        record_index.entry(record.node_id).or_default().push(record.resource_id);
    }

    let max_chunk = ir
        .nodes
        .iter()
        .filter(|(id, _)| live.contains(id))
        .map(|(_, n)| chunk_of(n.program_order, &ir.schedule_barriers))
        .max()
        .unwrap_or(0);

    let mut rng = match policy {
        ReorderPolicy::RandomOrder(seed) => Some(XorShift64::new(seed)),
        _ => None,
    };

    let mut order = Vec::new();
    let mut last_queue_class: Option<QueueClass> = None;
    let mut active_atomic: Option<crate::node::SubgraphId> = None;

    for chunk in 0..=max_chunk {
        let mut ready: Vec<NodeId> = in_degree
            .iter()
            .filter(|(id, &deg)| {
                deg == 0
                    && !order.contains(*id)
                    && chunk_of(ir.nodes[**id].program_order, &ir.schedule_barriers) == chunk
            })
            .map(|(id, _)| *id)
            .collect();

        while !ready.is_empty() {
            let pick_index = if let Some(active) = active_atomic {
                ready
                    .iter()
                    .position(|id| atomic_member_of.get(id) == Some(&active))
                    .unwrap_or(0)
            } else {
                match policy {
                    ReorderPolicy::ProgramOrder => ready
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, id)| ir.nodes[**id].program_order)
                        .map(|(i, _)| i)
                        .unwrap(),
                    ReorderPolicy::MinimizeComputeGfxSwitch => ready
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, id)| {
                            let same = last_queue_class
                                .map(|q| q != ir.nodes[**id].queue_class)
                                .unwrap_or(false);
                            (same, ir.nodes[**id].program_order)
                        })
                        .map(|(i, _)| i)
                        .unwrap(),
                    ReorderPolicy::PreferMemorySaving => ready
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, id)| {
                            let retires_something = record_index
                                .get(*id)
                                .map(|resources| {
                                    resources
                                        .iter()
                                        .any(|r| remaining_accesses.get(r).copied().unwrap_or(0) == 1)
                                })
                                .unwrap_or(false);
                            (!retires_something, ir.nodes[**id].program_order)
                        })
                        .map(|(i, _)| i)
                        .unwrap(),
                    ReorderPolicy::RandomOrder(_) => {
                        rng.as_mut().unwrap().next_index(ready.len())
                    }
                }
            };

            let node_id = ready.remove(pick_index);
            order.push(node_id);
            last_queue_class = Some(ir.nodes[node_id].queue_class);

            if let Some(resources) = record_index.get(&node_id) {
                for r in resources {
                    if let Some(count) = remaining_accesses.get_mut(r) {
                        *count = count.saturating_sub(1);
                    }
                }
            }

            active_atomic = match atomic_member_of.get(&node_id) {
                Some(subgraph) => {
                    let all_done = ir
                        .nodes
                        .iter()
                        .filter(|(id, _)| atomic_member_of.get(id) == Some(subgraph))
                        .all(|(id, _)| order.contains(&id));
                    if all_done { None } else { Some(*subgraph) }
                }
                None => None,
            };

            if let Some(succs) = successors.get(&node_id) {
                for &succ in succs {
                    if let Some(deg) = in_degree.get_mut(&succ) {
                        *deg -= 1;
                        if *deg == 0 && chunk_of(ir.nodes[succ].program_order, &ir.schedule_barriers) == chunk {
                            ready.push(succ);
                        }
                    }
                }
            }
        }
    }

    let mut async_queue_cursor: FxHashMap<QueueClass, u32> = FxHashMap::default();
    let mut queue_of = FxHashMap::default();
    for &node_id in &order {
        let node = &ir.nodes[node_id];
        let queue_index = if node.async_hint {
            let cursor = async_queue_cursor.entry(node.queue_class).or_insert(0);
            *cursor = (*cursor % 1) + 1; // single async queue per class in this planner
            *cursor
        } else {
            0
        };
        queue_of.insert(
            node_id,
            QueueAssignment {
                queue_class: node.queue_class,
                queue_index,
            },
        );
    }

    Schedule {
        order,
        queue_of,
        eliminated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Access, AccessFlags};
    use crate::builder::{GraphBuilder, ParamBinding};
    use crate::lifetime::collect_access_records;
    use crate::node::QueueClass;
    use crate::resource::{BufferView, ResourceDesc, ResourceFlags, View};
    use std::sync::Arc;

    fn noop() -> crate::node::NodeCallback {
        Arc::new(|_ctx| Ok(()))
    }

    fn buffer_view(resource: crate::resource::ResourceId) -> View {
        View::Buffer(BufferView {
            resource,
            view_format: Default::default(),
            byte_offset: 0,
            byte_size: 16,
            structure_stride: 0,
            temporal_layer: 0,
        })
    }

    #[test]
    fn pure_node_with_no_live_consumer_is_eliminated() {
        let mut b = GraphBuilder::new(0);
        let r = b.declare_resource(ResourceDesc::buffer(16, ResourceFlags::empty()), false);
        let view = buffer_view(r);
        b.add_node(
            QueueClass::Copy,
            "dead write",
            noop(),
            &[ParamBinding::new(view, Access::new(AccessFlags::COPY_DST))],
            false,
        )
        .unwrap();
        let ir = b.build().unwrap();
        let records = collect_access_records(&ir);
        let schedule = scheduler_schedule(&ir, &records);
        assert!(schedule.order.is_empty());
        assert_eq!(schedule.eliminated.len(), 1);
    }

    #[test]
    fn pure_write_to_persistent_resource_is_not_eliminated() {
        let mut b = GraphBuilder::new(0);
        let r = b.declare_resource(ResourceDesc::buffer(16, ResourceFlags::PERSISTENT), false);
        let view = buffer_view(r);
        let writer = b
            .add_node(
                QueueClass::Copy,
                "persistent write",
                noop(),
                &[ParamBinding::new(view, Access::new(AccessFlags::COPY_DST))],
                false,
            )
            .unwrap();
        let ir = b.build().unwrap();
        let records = collect_access_records(&ir);
        let schedule = scheduler_schedule(&ir, &records);
        assert_eq!(schedule.order, vec![writer]);
        assert!(schedule.eliminated.is_empty());
    }

    #[test]
    fn side_effecting_node_and_its_producer_survive() {
        let mut b = GraphBuilder::new(0);
        let r = b.declare_resource(ResourceDesc::buffer(16, ResourceFlags::empty()), false);
        let view = buffer_view(r);
        let producer = b
            .add_node(
                QueueClass::Copy,
                "producer",
                noop(),
                &[ParamBinding::new(view, Access::new(AccessFlags::COPY_DST))],
                false,
            )
            .unwrap();
        let consumer = b
            .add_node(
                QueueClass::Copy,
                "consumer",
                noop(),
                &[ParamBinding::new(view, Access::new(AccessFlags::COPY_SRC))],
                true,
            )
            .unwrap();
        let ir = b.build().unwrap();
        let records = collect_access_records(&ir);
        let schedule = scheduler_schedule(&ir, &records);
        assert_eq!(schedule.order, vec![producer, consumer]);
    }

    #[test]
    fn atomic_subgraph_members_are_not_interleaved() {
        let mut b = GraphBuilder::new(0);
        b.push_subgraph(SubgraphFlags::ATOMIC, None);
        let a = b.add_node(QueueClass::Graphics, "a1", noop(), &[], true).unwrap();
        let c = b.add_node(QueueClass::Graphics, "a2", noop(), &[], true).unwrap();
        b.pop_subgraph().unwrap();
        let d = b.add_node(QueueClass::Graphics, "outside", noop(), &[], true).unwrap();
        let ir = b.build().unwrap();
        let records = collect_access_records(&ir);
        let schedule = scheduler_schedule(&ir, &records);
        let pos_a = schedule.order.iter().position(|&n| n == a).unwrap();
        let pos_c = schedule.order.iter().position(|&n| n == c).unwrap();
        let pos_d = schedule.order.iter().position(|&n| n == d).unwrap();
        assert!(pos_c == pos_a + 1, "atomic members must be adjacent");
        assert!(pos_d < pos_a || pos_d > pos_c);
    }

    fn scheduler_schedule(ir: &GraphIr, records: &[AccessRecord]) -> Schedule {
        schedule(ir, records, ReorderPolicy::ProgramOrder)
    }
}
