//! Device/RenderGraph handle: ties the builder, lifetime analysis, scheduler, memory planner,
//! barrier synthesizer, fence planner and record orchestrator into the single `update()` entry
//! point external callers drive.

use crate::access::Access;
use crate::backend::BackendHooks;
use crate::barrier::{form_batches, infer_render_passes, synthesize_transitions};
use crate::builder::{GraphBuilder, GraphIr};
use crate::diagnostics::{compute_stats, trace_diagnostics, DiagnosticFlags, GraphStats, Printer};
use crate::error::{Error, Result};
use crate::fence::plan_fences;
use crate::lifetime::{collect_access_records, compute_alias_groups, compute_live_intervals, AccessRecord};
use crate::memory::plan_memory;
use crate::node::NodeId;
use crate::record::{record_commands, ContextArena};
use crate::resource::{ResourceId, View};
use crate::scheduler::{schedule, ReorderPolicy, Schedule};
use crate::signature::EntrySignature;
use fxhash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A backend device plus the crate-wide debug printer slot and the reentrancy guard every
/// `update()` call takes. One `Device` may back several `RenderGraph`s (e.g. one per swapchain),
/// all sharing the same backend and diagnostics configuration.
pub struct Device {
    backend: Arc<dyn BackendHooks>,
    printer: Mutex<Option<Printer>>,
    diagnostic_flags: Mutex<DiagnosticFlags>,
    updating: AtomicBool,
}

impl Device {
    pub fn new(backend: Arc<dyn BackendHooks>) -> Device {
        Device {
            backend,
            printer: Mutex::new(None),
            diagnostic_flags: Mutex::new(DiagnosticFlags::empty()),
            updating: AtomicBool::new(false),
        }
    }

    /// Registers the printer that will receive every textual diagnostic dump from now on.
    /// Replaces whatever printer was previously registered — there is exactly one slot, last
    /// writer wins, matching the external interface's single global debug-printer contract.
    pub fn set_printer(&self, printer: Printer) {
        *self.printer.lock().expect("printer mutex poisoned") = Some(printer);
    }

    pub fn clear_printer(&self) {
        *self.printer.lock().expect("printer mutex poisoned") = None;
    }

    pub fn set_diagnostic_flags(&self, flags: DiagnosticFlags) {
        *self.diagnostic_flags.lock().expect("diagnostic flags mutex poisoned") = flags;
    }

    fn emit(&self, text: &str) {
        if let Some(printer) = self.printer.lock().expect("printer mutex poisoned").as_ref() {
            printer(text);
        }
    }

    /// Acquires the reentrancy guard for the duration of one `update()`. A node callback that
    /// tries to call back into `update()` on the same device finds the guard already held and
    /// gets `Unspecified` rather than deadlocking or corrupting in-progress builder state.
    fn enter(&self) -> Result<ReentrancyGuard<'_>> {
        if self
            .updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::unspecified(
                "update() called reentrantly on a device already mid-update",
            ));
        }
        Ok(ReentrancyGuard { device: self })
    }
}

struct ReentrancyGuard<'a> {
    device: &'a Device,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        self.device.updating.store(false, Ordering::Release);
    }
}

pub type EntryCallback = Arc<dyn Fn(&mut GraphBuilder) -> Result<()> + Send + Sync>;

/// Cross-frame state for persistent, graph-owned resources, correlated by debug name since a
/// resource's `ResourceId` is rebuilt fresh every `update`. Holds exactly what the persistent
/// round-trip invariant needs: the access each such resource ended its last live frame in.
#[derive(Default)]
struct PersistentFrameState {
    last_frame_index: Option<u64>,
    end_of_frame_access: FxHashMap<Box<str>, Access>,
}

/// One declarative render graph: an entry signature, the callback that builds nodes against it,
/// and the reorder policy the scheduler should apply. Built fresh every `update()` call — no
/// graph-IR state survives between updates except what the caller re-supplies as
/// arguments/resources; the one exception is `persistent_state`, which exists precisely to carry
/// persistent/temporal resources' access across the frame boundary the data model requires.
pub struct RenderGraph {
    device: Arc<Device>,
    signature: EntrySignature,
    entry: EntryCallback,
    reorder_policy: ReorderPolicy,
    arena: ContextArena,
    persistent_state: Mutex<PersistentFrameState>,
}

impl RenderGraph {
    pub fn new(device: Arc<Device>, signature: EntrySignature, entry: EntryCallback) -> RenderGraph {
        RenderGraph {
            device,
            signature,
            entry,
            reorder_policy: ReorderPolicy::ProgramOrder,
            arena: ContextArena::new(),
            persistent_state: Mutex::new(PersistentFrameState::default()),
        }
    }

    pub fn set_reorder_policy(&mut self, policy: ReorderPolicy) {
        self.reorder_policy = policy;
    }

    /// Validates `args`/`resources` against the signature, invokes the entry callback to build a
    /// fresh graph IR, runs it through lifetime analysis, scheduling, memory planning, barrier
    /// synthesis, fence planning and recording, and returns a summary of what ran.
    ///
    /// `frame_index` identifies this call in the host's frame sequence; `completed_frame_index`
    /// is the most recent frame the backend has finished executing. Together they let persistent
    /// and temporal resources round-trip correctly across calls: the first touch of a persistent
    /// resource this frame picks up the access it ended its last live frame in (see
    /// `prior_frame_access`) instead of assuming undefined contents.
    pub fn update(
        &self,
        frame_index: u64,
        completed_frame_index: u64,
        args: &[&[u8]],
        resources: &[View],
    ) -> Result<GraphStats> {
        let _guard = self.device.enter()?;

        if completed_frame_index > frame_index {
            return Err(Error::invalid_arguments(format!(
                "completed_frame_index ({}) cannot be ahead of frame_index ({})",
                completed_frame_index, frame_index
            )));
        }

        self.signature.validate_call(args, resources)?;

        let arg_capacity: usize = args.iter().map(|a| a.len()).sum();
        let mut builder = GraphBuilder::new(arg_capacity);

        let mut resource_cursor = 0usize;
        for (index, param) in self.signature.params.iter().enumerate() {
            if param.is_resource() {
                if let Some(view) = resources.get(resource_cursor) {
                    if let Some(resource_id) = view.resource_id() {
                        builder.bind_entry_param_resource(index, resource_id);
                    }
                    builder.bind_entry_param_view(index, *view);
                }
                resource_cursor += 1;
            } else if let Some(bytes) = args.get(index) {
                let arg_index = builder.allocate_data(bytes);
                builder.bind_entry_param_arg(index, arg_index);
            }
        }

        (self.entry)(&mut builder)?;
        let ir = builder.build()?;

        let records = collect_access_records(&ir);
        let sched = schedule(&ir, &records, self.reorder_policy);
        let intervals = compute_live_intervals(&records, &sched.order);
        let alias_groups = compute_alias_groups(&ir, &intervals);

        let resource_refs: fxhash::FxHashMap<_, _> = ir.resources.iter().map(|(id, r)| (id, r)).collect();
        let _memory_plan = plan_memory(&resource_refs, &alias_groups, &|_desc| 256);

        let prior_frame_access = self.prior_frame_access(&ir);
        let transitions = synthesize_transitions(&ir, &sched, &records, &prior_frame_access);
        let batches = form_batches(&ir, &sched);
        let pass_hooks = infer_render_passes(&ir, &sched);
        let fences = plan_fences(&batches, &transitions);

        let flags = *self.device.diagnostic_flags.lock().expect("diagnostic flags mutex poisoned");
        if !flags.is_empty() {
            trace_diagnostics(flags, &ir, Some(&sched), &transitions);
            if flags.contains(DiagnosticFlags::DUMP_POST_SCHEDULE) {
                self.device.emit(&crate::diagnostics::dump_post_schedule(&ir, &sched, &transitions));
            }
        }

        record_commands(
            &ir,
            &batches,
            &transitions,
            &pass_hooks,
            &fences,
            self.device.backend.as_ref(),
            &self.arena,
        )?;

        self.record_persistent_end_of_frame_access(&ir, &records, &sched, frame_index);

        Ok(compute_stats(&ir, &sched, &transitions, &batches, fences.fence_count))
    }

    /// Builds the map `synthesize_transitions` consults for each persistent, graph-owned
    /// resource's first touch this frame: its end-of-frame access from the last `update` that
    /// scheduled it live, correlated by debug name. A persistent resource with no debug name has
    /// no way to be recognized as "the same resource" across the rebuild, so it falls back to an
    /// undefined-origin, discard-eligible first touch like any ordinary transient.
    fn prior_frame_access(&self, ir: &GraphIr) -> FxHashMap<ResourceId, Access> {
        let state = self.persistent_state.lock().expect("persistent frame state mutex poisoned");
        let mut prior = FxHashMap::default();
        for (id, resource) in ir.resources.iter() {
            if resource.external || !resource.desc.is_persistent() {
                continue;
            }
            if let Some(name) = &resource.debug_name {
                if let Some(&access) = state.end_of_frame_access.get(name) {
                    prior.insert(id, access);
                }
            }
        }
        prior
    }

    /// Records, for every persistent graph-owned resource that was live this frame, the access of
    /// its last scheduled touch, so the next `update` can carry it forward as that resource's
    /// assumed start-of-frame access — the persistent round-trip invariant.
    fn record_persistent_end_of_frame_access(
        &self,
        ir: &GraphIr,
        records: &[AccessRecord],
        sched: &Schedule,
        frame_index: u64,
    ) {
        let position_of: FxHashMap<NodeId, usize> =
            sched.order.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut last_access: FxHashMap<ResourceId, (usize, Access)> = FxHashMap::default();
        for record in records {
            let Some(&pos) = position_of.get(&record.node_id) else {
                continue; // node was eliminated by dead-code elimination
            };
            last_access
                .entry(record.resource_id)
                .and_modify(|(best_pos, access)| {
                    if pos > *best_pos {
                        *best_pos = pos;
                        *access = record.access;
                    }
                })
                .or_insert((pos, record.access));
        }

        let mut state = self.persistent_state.lock().expect("persistent frame state mutex poisoned");
        for (id, (_, access)) in last_access {
            let resource = &ir.resources[id];
            if resource.external || !resource.desc.is_persistent() {
                continue;
            }
            match &resource.debug_name {
                Some(name) => {
                    state.end_of_frame_access.insert(name.clone(), access);
                }
                None => log::warn!(
                    "persistent resource {:?} has no debug name; its end-of-frame access cannot \
                     round-trip to the next update",
                    id,
                ),
            }
        }
        state.last_frame_index = Some(frame_index);
    }
}
