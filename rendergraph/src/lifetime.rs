//! Lifetime & Alias Analysis: per-subresource access timelines, live intervals over the final
//! schedule, and alias groups for transient resource memory reuse.

use crate::access::{Access, AccessFlags};
use crate::builder::GraphIr;
use crate::node::NodeId;
use crate::resource::{ResourceId, SubresourceRange};
use fxhash::FxHashMap;
use ordered_float::OrderedFloat;

/// One node's touch of one subresource range, flattened out of `Node::accesses` for analysis.
#[derive(Clone, Debug)]
pub struct AccessRecord {
    pub node_id: NodeId,
    pub resource_id: ResourceId,
    pub range: SubresourceRange,
    pub access: Access,
    pub temporal_layer: u32,
}

/// Flattens every node's resource accesses, in program order, into a flat timeline. Null-view
/// accesses were already dropped by the builder, so every record here has a concrete resource.
pub fn collect_access_records(ir: &GraphIr) -> Vec<AccessRecord> {
    let mut records = Vec::new();
    for node_id in ir.node_order() {
        let node = &ir.nodes[node_id];
        for access in &node.accesses {
            let Some(resource_id) = access.view.resource_id() else {
                continue;
            };
            records.push(AccessRecord {
                node_id,
                resource_id,
                range: access.range,
                access: access.access,
                temporal_layer: access.view.temporal_layer(),
            });
        }
    }
    records
}

#[derive(Copy, Clone, Debug, Default)]
pub struct LiveInterval {
    pub first: u32,
    pub last: u32,
    pub access_union: AccessFlags,
}

impl LiveInterval {
    pub fn overlaps(&self, other: &LiveInterval) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

/// Computes, for every resource touched by at least one access record, the `[first, last]`
/// scheduled-position interval during which it is live, plus the union of accesses across that
/// interval (used by the memory planner to bias heap selection). `order` is the final scheduled
/// node sequence, not program order — aliasing only ever reasons about the schedule that will
/// actually execute.
pub fn compute_live_intervals(
    records: &[AccessRecord],
    order: &[NodeId],
) -> FxHashMap<ResourceId, LiveInterval> {
    let mut position_of: FxHashMap<NodeId, u32> = FxHashMap::default();
    for (pos, &node_id) in order.iter().enumerate() {
        position_of.insert(node_id, pos as u32);
    }

    let mut intervals: FxHashMap<ResourceId, LiveInterval> = FxHashMap::default();
    for record in records {
        let Some(&pos) = position_of.get(&record.node_id) else {
            continue; // node was eliminated by dead-code elimination before scheduling
        };
        intervals
            .entry(record.resource_id)
            .and_modify(|interval| {
                interval.first = interval.first.min(pos);
                interval.last = interval.last.max(pos);
                interval.access_union |= record.access.flags;
            })
            .or_insert(LiveInterval {
                first: pos,
                last: pos,
                access_union: record.access.flags,
            });
    }
    intervals
}

#[derive(Clone, Debug, Default)]
pub struct AliasGroup {
    pub resources: Vec<ResourceId>,
}

/// Greedy interval-graph coloring over transient, non-persistent, non-external resources: sorted
/// by interval start, each resource joins the open group whose most recent member's interval
/// doesn't overlap it, whose heap classification matches, and whose last-placed byte size wastes
/// the least space when reused for this resource; else it starts a new group. This is the
/// standard "register allocation" reduction the spec's design note calls for; it is not optimal
/// but runs in `O(n log n)` and never aliases two concurrently-live resources.
pub fn compute_alias_groups(
    ir: &GraphIr,
    intervals: &FxHashMap<ResourceId, LiveInterval>,
) -> Vec<AliasGroup> {
    let mut candidates: Vec<(ResourceId, LiveInterval, crate::memory::HeapKey, u64)> = ir
        .resources
        .iter()
        .filter(|(_, r)| !r.is_persistent())
        .filter_map(|(id, r)| {
            intervals.get(&id).map(|interval| {
                (
                    id,
                    *interval,
                    crate::memory::heap_key(&r.desc),
                    crate::memory::resource_byte_size(&r.desc),
                )
            })
        })
        .collect();
    candidates.sort_by_key(|(_, interval, _, _)| interval.first);

    // group_index -> (heap key, interval of the last resource placed into it, its byte size)
    let mut open_groups: Vec<(crate::memory::HeapKey, LiveInterval, u64)> = Vec::new();
    let mut groups: Vec<AliasGroup> = Vec::new();

    for (id, interval, key, byte_size) in candidates {
        let best = open_groups
            .iter()
            .enumerate()
            .filter(|(_, (group_key, last_interval, _))| *group_key == key && !last_interval.overlaps(&interval))
            .min_by_key(|(_, (_, _, last_size))| {
                OrderedFloat((last_size.abs_diff(byte_size)) as f64)
            })
            .map(|(group_idx, _)| group_idx);

        match best {
            Some(group_idx) => {
                groups[group_idx].resources.push(id);
                open_groups[group_idx] = (key, interval, byte_size);
            }
            None => {
                open_groups.push((key, interval, byte_size));
                groups.push(AliasGroup { resources: vec![id] });
            }
        }
    }

    groups
}
