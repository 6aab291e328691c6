//! Diagnostics & Printers: textual dumps of the DAG, pre-schedule and post-schedule state, plus
//! the crate's `log`-backed tracing of builder/scheduler/record-orchestrator activity.

use crate::barrier::{CommandBatch, Transition};
use crate::builder::GraphIr;
use crate::scheduler::Schedule;
use bitflags::bitflags;
use std::fmt::Write as _;

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
    pub struct DiagnosticFlags: u8 {
        const DUMP_DAG = 1 << 0;
        const DUMP_PRE_SCHEDULE = 1 << 1;
        const DUMP_POST_SCHEDULE = 1 << 2;
        const LOG_TRANSITIONS = 1 << 3;
    }
}

/// A sink for textual diagnostic dumps. The graph handle keeps the most recently registered
/// printer and calls it with whatever `DiagnosticFlags` the caller asked for; registering a new
/// one replaces the old one outright (last-writer-wins, matching the external interface's single
/// global debug-printer slot).
pub type Printer = Box<dyn Fn(&str) + Send + Sync>;

/// Renders the program-order DAG: one line per node naming its queue class and the resources it
/// touches, edges implied by shared resource ids rather than drawn explicitly.
pub fn dump_dag(ir: &GraphIr) -> String {
    let mut out = String::new();
    for node_id in ir.node_order() {
        let node = &ir.nodes[node_id];
        let _ = writeln!(out, "node `{}` [{:?}] program_order={}", node.name, node.queue_class, node.program_order);
        for access in &node.accesses {
            if let Some(resource_id) = access.view.resource_id() {
                let debug_name = ir.resources[resource_id]
                    .debug_name
                    .as_deref()
                    .unwrap_or("<unnamed>");
                let _ = writeln!(out, "    {} : {:?}", debug_name, access.access.flags);
            }
        }
    }
    out
}

/// Renders the graph as it stood immediately after `build()`, before scheduling: program order,
/// no queue or batch assignment yet.
pub fn dump_pre_schedule(ir: &GraphIr) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "resources: {}", ir.resources.len());
    let _ = writeln!(out, "nodes: {}", ir.nodes.len());
    let _ = writeln!(out, "schedule barriers: {:?}", ir.schedule_barriers);
    out.push_str(&dump_dag(ir));
    out
}

/// Renders the final schedule: node order, queue assignment, and the transitions synthesized for
/// it, which is what a user actually debugging a missing-barrier or queue-thrash issue wants.
pub fn dump_post_schedule(ir: &GraphIr, schedule: &Schedule, transitions: &[Transition]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "schedule ({} live nodes, {} eliminated):", schedule.order.len(), schedule.eliminated.len());
    for (position, &node_id) in schedule.order.iter().enumerate() {
        let node = &ir.nodes[node_id];
        let queue = schedule.queue_of[&node_id];
        let _ = writeln!(out, "  [{position}] `{}` on {:?}#{}", node.name, queue.queue_class, queue.queue_index);
    }
    let _ = writeln!(out, "transitions ({}):", transitions.len());
    for t in transitions {
        let debug_name = ir.resources[t.resource_id]
            .debug_name
            .as_deref()
            .unwrap_or("<unnamed>");
        let _ = writeln!(
            out,
            "  {} : {:?} -> {:?}{}",
            debug_name,
            t.before.flags,
            t.after.flags,
            if t.discard { " (discard)" } else { "" }
        );
    }
    out
}

pub fn dump_batches(batches: &[CommandBatch]) -> String {
    let mut out = String::new();
    for (i, batch) in batches.iter().enumerate() {
        let _ = writeln!(out, "batch {i}: {:?}#{} ({} nodes)", batch.queue.queue_class, batch.queue.queue_index, batch.nodes.len());
    }
    out
}

/// A cheap-to-compute summary of one build's shape, handed back to the caller alongside the
/// update result so a host application can track graph growth without parsing a text dump.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct GraphStats {
    pub node_count: u32,
    pub resource_count: u32,
    pub transition_count: u32,
    pub batch_count: u32,
    pub fence_count: u32,
}

pub fn compute_stats(
    ir: &GraphIr,
    schedule: &Schedule,
    transitions: &[Transition],
    batches: &[CommandBatch],
    fence_count: u32,
) -> GraphStats {
    GraphStats {
        node_count: schedule.order.len() as u32,
        resource_count: ir.resources.len() as u32,
        transition_count: transitions.len() as u32,
        batch_count: batches.len() as u32,
        fence_count,
    }
}

/// Emits one `log::debug!` line per requested dump, routed through the `log` facade like the
/// rest of the crate so a host application's chosen logger backend decides where it lands.
pub fn trace_diagnostics(
    flags: DiagnosticFlags,
    ir: &GraphIr,
    schedule: Option<&Schedule>,
    transitions: &[Transition],
) {
    if flags.contains(DiagnosticFlags::DUMP_PRE_SCHEDULE) {
        log::debug!("pre-schedule dump:\n{}", dump_pre_schedule(ir));
    }
    if flags.contains(DiagnosticFlags::DUMP_DAG) {
        log::debug!("dag dump:\n{}", dump_dag(ir));
    }
    if let (true, Some(schedule)) = (flags.contains(DiagnosticFlags::DUMP_POST_SCHEDULE), schedule) {
        log::debug!("post-schedule dump:\n{}", dump_post_schedule(ir, schedule, transitions));
    }
    if flags.contains(DiagnosticFlags::LOG_TRANSITIONS) {
        for t in transitions {
            log::trace!(
                "transition on {:?}: {:?} -> {:?}{}",
                t.resource_id,
                t.before.flags,
                t.after.flags,
                if t.discard { " (discard)" } else { "" }
            );
        }
    }
}
