//! Barrier/Transition Synthesizer: emits the minimal set of resource transitions the scheduled
//! order requires, elides transitions subsumed by a full-resource discard, infers render-pass
//! begin/resume/suspend/end boundaries, and groups the schedule into per-queue command batches.

use crate::access::{Access, AccessFlags};
use crate::builder::GraphIr;
use crate::lifetime::AccessRecord;
use crate::node::NodeId;
use crate::resource::{ResourceId, SubresourceRange};
use crate::scheduler::{QueueAssignment, Schedule};
use fxhash::FxHashMap;

#[derive(Clone, Debug)]
pub struct Transition {
    pub resource_id: ResourceId,
    pub range: SubresourceRange,
    pub before: Access,
    pub after: Access,
    pub before_node: Option<NodeId>,
    pub after_node: NodeId,
    /// True when `before` is irrelevant because `after` fully overwrites the resource — the
    /// synthesizer elides any wait on the prior contents and transitions straight from
    /// "undefined".
    pub discard: bool,
}

/// Walks each resource's accesses in final schedule order (not program order) and emits a
/// transition wherever consecutive overlapping accesses are not `compatible_with` each other.
/// A transition whose destination access is a full-resource overwrite with `DISCARD_BEFORE` set
/// (either explicit or implied by a full overwrite, per the data model invariant) is marked
/// `discard` and never needs the prior access's actual value preserved.
///
/// `prior_frame_access` carries, for any graph-owned resource the caller recognizes as the same
/// persistent resource it recorded an end-of-frame access for last `update`, that access — its
/// first touch this frame transitions from there instead of from undefined, satisfying the
/// persistent round-trip invariant (the recorded end-of-frame access for a persistent resource
/// equals the assumed start-of-frame access at the next update). A resource absent from the map
/// (including every ordinary transient) keeps the existing undefined-origin, discard-eligible
/// first touch.
pub fn synthesize_transitions(
    ir: &GraphIr,
    schedule: &Schedule,
    records: &[AccessRecord],
    prior_frame_access: &FxHashMap<ResourceId, Access>,
) -> Vec<Transition> {
    let position_of: FxHashMap<NodeId, usize> = schedule
        .order
        .iter()
        .enumerate()
        .map(|(i, &n)| (n, i))
        .collect();

    let mut by_resource: FxHashMap<ResourceId, Vec<&AccessRecord>> = FxHashMap::default();
    for record in records {
        if position_of.contains_key(&record.node_id) {
            by_resource.entry(record.resource_id).or_default().push(record);
        }
    }

    let mut transitions = Vec::new();
    for (resource_id, mut accesses) in by_resource {
        accesses.sort_by_key(|r| position_of[&r.node_id]);
        let full_range = ir.resources[resource_id].desc.full_range();

        let mut open: Vec<(SubresourceRange, Access, NodeId)> = Vec::new();
        for record in accesses {
            let mut conflicted_with: Option<(Access, NodeId)> = None;
            let mut still_open = Vec::with_capacity(open.len());
            for (range, access, node_id) in open.drain(..) {
                if range.overlaps(&record.range) {
                    if !access.compatible_with(&record.access) {
                        conflicted_with = Some((access, node_id));
                    }
                    if !record.range.is_full_overwrite_of(&range) {
                        still_open.push((range, access, node_id));
                    }
                } else {
                    still_open.push((range, access, node_id));
                }
            }
            open = still_open;

            let discard = record.range.is_full_overwrite_of(&full_range)
                && (record.access.flags.contains(AccessFlags::DISCARD_BEFORE) || record.access.is_write());

            if let Some((before, before_node)) = conflicted_with {
                transitions.push(Transition {
                    resource_id,
                    range: record.range,
                    before,
                    after: record.access,
                    before_node: Some(before_node),
                    after_node: record.node_id,
                    discard,
                });
            } else if !ir.resources[resource_id].external {
                match prior_frame_access.get(&resource_id) {
                    Some(&before) => {
                        // Carried over from the previous frame: the resource already holds
                        // meaningful contents, so its first transition this frame must preserve
                        // them rather than discard.
                        transitions.push(Transition {
                            resource_id,
                            range: record.range,
                            before,
                            after: record.access,
                            before_node: None,
                            after_node: record.node_id,
                            discard: false,
                        });
                    }
                    None => {
                        // First touch ever (or a plain transient): transition from undefined.
                        transitions.push(Transition {
                            resource_id,
                            range: record.range,
                            before: Access::new(AccessFlags::empty()),
                            after: record.access,
                            before_node: None,
                            after_node: record.node_id,
                            discard: true,
                        });
                    }
                }
            }

            open.push((record.range, record.access, record.node_id));
        }
    }

    transitions
}

#[derive(Clone, Debug)]
pub struct CommandBatch {
    pub queue: QueueAssignment,
    pub nodes: Vec<NodeId>,
}

/// Splits the final schedule into contiguous runs on the same queue assignment: crossing a queue
/// boundary always starts a new batch, since that boundary is where the fence planner inserts
/// cross-queue synchronization.
pub fn form_batches(ir: &GraphIr, schedule: &Schedule) -> Vec<CommandBatch> {
    let _ = ir;
    let mut batches: Vec<CommandBatch> = Vec::new();
    for &node_id in &schedule.order {
        let queue = schedule.queue_of[&node_id];
        match batches.last_mut() {
            Some(batch) if batch.queue == queue => batch.nodes.push(node_id),
            _ => batches.push(CommandBatch {
                queue,
                nodes: vec![node_id],
            }),
        }
    }
    batches
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PassAction {
    Begin,
    Resume,
    Suspend,
    End,
}

/// A node's render-pass transition, split into the hook run immediately before its callback
/// (`pre`, opening or resuming the pass) and immediately after (`post`, suspending or closing
/// it). Either side may be absent for a node that neither opens nor closes anything.
#[derive(Copy, Clone, Debug, Default)]
pub struct PassHooks {
    pub pre: Option<PassAction>,
    pub post: Option<PassAction>,
}

/// Infers render-pass boundaries from consecutive, same-queue, render-pass-scoped nodes that
/// share at least one overlapping render-target/depth-stencil resource: the first such node in a
/// run gets `Begin`, the last gets `End`; a run interrupted by unrelated work and picked back up
/// later is `Suspend`/`Resume` rather than a fresh `Begin`/`End` pair, avoiding a redundant
/// store/load of attachment contents.
pub fn infer_render_passes(ir: &GraphIr, schedule: &Schedule) -> FxHashMap<NodeId, PassHooks> {
    let mut actions: FxHashMap<NodeId, PassHooks> = FxHashMap::default();

    let rp_nodes: Vec<NodeId> = schedule
        .order
        .iter()
        .copied()
        .filter(|id| ir.nodes[*id].accesses.iter().any(|a| a.access.is_render_pass_scoped()))
        .collect();

    if rp_nodes.is_empty() {
        return actions;
    }

    let attachments_of = |id: NodeId| -> Vec<ResourceId> {
        ir.nodes[id]
            .accesses
            .iter()
            .filter(|a| a.access.is_render_pass_scoped())
            .filter_map(|a| a.view.resource_id())
            .collect()
    };

    let schedule_position: FxHashMap<NodeId, usize> = schedule
        .order
        .iter()
        .enumerate()
        .map(|(i, &n)| (n, i))
        .collect();

    let mut groups: Vec<Vec<NodeId>> = Vec::new();
    for &node in &rp_nodes {
        let this_attachments = attachments_of(node);
        let joined = groups.last_mut().filter(|group| {
            let last = *group.last().unwrap();
            attachments_of(last)
                .iter()
                .any(|r| this_attachments.contains(r))
        });
        match joined {
            Some(group) => group.push(node),
            None => groups.push(vec![node]),
        }
    }

    for group in groups {
        if group.len() == 1 {
            // A lone render-pass-scoped node opens and closes its own pass immediately.
            actions.insert(
                group[0],
                PassHooks {
                    pre: Some(PassAction::Begin),
                    post: Some(PassAction::End),
                },
            );
            continue;
        }
        for (i, &node) in group.iter().enumerate() {
            // A gap of interleaved non-attachment work between two members of the same group
            // means the pass was suspended and later resumed, rather than staying continuously
            // open across unrelated commands.
            let gap_before = i > 0 && schedule_position[&node] > schedule_position[&group[i - 1]] + 1;
            let pre = if i == 0 {
                Some(PassAction::Begin)
            } else if gap_before {
                Some(PassAction::Resume)
            } else {
                None
            };
            let is_last = i == group.len() - 1;
            let gap_after = !is_last
                && schedule_position[&group[i + 1]] > schedule_position[&node] + 1;
            let post = if is_last {
                Some(PassAction::End)
            } else if gap_after {
                Some(PassAction::Suspend)
            } else {
                None
            };
            actions.insert(node, PassHooks { pre, post });
        }
    }

    actions
}
