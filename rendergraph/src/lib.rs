//! Render-graph runtime: a host application declares its per-frame work as a graph of typed
//! nodes over typed resources, and this crate works out the rest — which transient resources can
//! share memory, what transitions and fences the scheduled order actually needs, and how to drive
//! a `BackendHooks` implementation to record it.
//!
//! The frame is rebuilt from scratch on every `update()`: a host re-declares the whole graph each
//! time rather than mutating a persistent one, so there is no incremental-builder state to get out
//! of sync. The one deliberate exception is persistent/temporal resources: `update()` takes a
//! `frame_index`/`completed_frame_index` pair and [`device::RenderGraph`] carries each such
//! resource's end-of-frame access across the call boundary, so a frame that reads `temporal(0)` of
//! a resource another frame wrote sees that write rather than an undefined first touch. (see
//! https://ourmachinery.com/post/a-modern-rendering-architecture/ for the frame-graph lineage this
//! design comes from.)
//!
//! Pipeline, in order: [`builder`] produces an immutable [`builder::GraphIr`] from one entry
//! callback invocation; [`lifetime`] flattens its accesses into a timeline and computes live
//! intervals and alias groups against the final [`scheduler::Schedule`]; [`memory`] assigns
//! placement offsets within each alias group; [`barrier`] synthesizes transitions, infers
//! render-pass boundaries, and groups the schedule into per-queue [`barrier::CommandBatch`]es;
//! [`fence`] allocates cross-queue synchronization; [`record`] drives the backend through it all.

pub mod access;
pub mod backend;
pub mod barrier;
pub mod builder;
pub mod builtins;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod fence;
pub mod format;
pub mod lifetime;
pub mod memory;
pub mod node;
pub mod record;
pub mod resource;
pub mod scheduler;
pub mod signature;
pub mod visualizer;

pub use access::{Access, AccessFlags, Semantic, ShaderStageFlags};
pub use backend::{BackendHooks, CommandEncoder};
pub use builder::{GraphBuilder, GraphIr, ParamBinding};
pub use device::{Device, EntryCallback, RenderGraph};
pub use diagnostics::{DiagnosticFlags, GraphStats};
pub use error::{Error, ErrorKind, Result};
pub use node::{NodeId, QueueClass, SubgraphFlags, SubgraphId};
pub use resource::{ResourceDesc, ResourceFlags, ResourceId, View};
pub use scheduler::ReorderPolicy;
pub use signature::{EntrySignature, ParamDesc, ParamFlags};
