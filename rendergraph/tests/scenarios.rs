//! Integration tests exercising the six concrete scenarios the runtime is expected to handle
//! end to end: a single-node draw, an MSAA resolve, async compute with a cross-queue fence,
//! temporal history, aliased transients, and multithreaded batch recording.

use rendergraph::access::{Access, AccessFlags, ShaderStageFlags};
use rendergraph::backend::{BackendHooks, CommandEncoder};
use rendergraph::builder::{GraphBuilder, ParamBinding};
use rendergraph::device::{Device, RenderGraph};
use rendergraph::error::Result;
use rendergraph::fence::FenceId;
use rendergraph::format::Format;
use rendergraph::memory::{plan_memory, resource_byte_size};
use rendergraph::node::QueueClass;
use rendergraph::resource::{BufferView, ComponentMapping, ImageView, ResourceDesc, ResourceFlags, View};
use rendergraph::scheduler::QueueAssignment;
use rendergraph::signature::EntrySignature;
use std::sync::{Arc, Mutex};

struct TestEncoder;
impl CommandEncoder for TestEncoder {}

/// A backend that records every hook call into a log instead of touching any real device, so
/// tests can assert on the exact sequence the orchestrator drove it through.
#[derive(Default)]
struct RecordingBackend {
    calls: Mutex<Vec<String>>,
}

impl RecordingBackend {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl BackendHooks for RecordingBackend {
    fn create_resource(
        &self,
        _id: rendergraph::resource::ResourceId,
        _desc: &ResourceDesc,
        _placement: Option<rendergraph::memory::Placement>,
    ) -> Result<()> {
        Ok(())
    }
    fn destroy_resource(&self, _id: rendergraph::resource::ResourceId) -> Result<()> {
        Ok(())
    }
    fn begin_command_encoder(&self, queue: QueueAssignment) -> Result<Box<dyn CommandEncoder>> {
        self.calls.lock().unwrap().push(format!("begin({:?})", queue.queue_class));
        Ok(Box::new(TestEncoder))
    }
    fn end_command_encoder(&self, _encoder: Box<dyn CommandEncoder>) -> Result<()> {
        self.calls.lock().unwrap().push("end".into());
        Ok(())
    }
    fn record_transition(
        &self,
        _encoder: &mut dyn CommandEncoder,
        _resource: rendergraph::resource::ResourceId,
        _range: rendergraph::resource::SubresourceRange,
        before: Access,
        after: Access,
        discard: bool,
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("transition({:?} -> {:?}, discard={})", before.flags, after.flags, discard));
        Ok(())
    }
    fn begin_render_pass(&self, _encoder: &mut dyn CommandEncoder, _attachments: &[View]) -> Result<()> {
        self.calls.lock().unwrap().push("begin_render_pass".into());
        Ok(())
    }
    fn resume_render_pass(&self, _encoder: &mut dyn CommandEncoder) -> Result<()> {
        self.calls.lock().unwrap().push("resume_render_pass".into());
        Ok(())
    }
    fn end_render_pass(&self, _encoder: &mut dyn CommandEncoder) -> Result<()> {
        self.calls.lock().unwrap().push("end_render_pass".into());
        Ok(())
    }
    fn clear(&self, _encoder: &mut dyn CommandEncoder, _target: View, _value: [f32; 4]) -> Result<()> {
        self.calls.lock().unwrap().push("clear".into());
        Ok(())
    }
    fn copy(&self, _encoder: &mut dyn CommandEncoder, _src: View, _dst: View) -> Result<()> {
        self.calls.lock().unwrap().push("copy".into());
        Ok(())
    }
    fn resolve_multisample(&self, _encoder: &mut dyn CommandEncoder, _src: View, _dst: View, _format: Format) -> Result<()> {
        self.calls.lock().unwrap().push("resolve".into());
        Ok(())
    }
    fn signal_fence(&self, _queue: QueueAssignment, fence: FenceId, value: u64) -> Result<()> {
        self.calls.lock().unwrap().push(format!("signal({:?}, {})", fence, value));
        Ok(())
    }
    fn wait_fence(&self, _queue: QueueAssignment, fence: FenceId, value: u64) -> Result<()> {
        self.calls.lock().unwrap().push(format!("wait({:?}, {})", fence, value));
        Ok(())
    }
    fn submit(&self, _queue: QueueAssignment, _encoders: Vec<Box<dyn CommandEncoder>>) -> Result<()> {
        self.calls.lock().unwrap().push("submit".into());
        Ok(())
    }
}

fn rt_view(resource: rendergraph::resource::ResourceId) -> View {
    View::Image(ImageView {
        resource,
        view_format: Format::R8g8b8a8Unorm,
        range: rendergraph::resource::SubresourceRange {
            base_mip: 0,
            mip_count: 1,
            base_array_layer: 0,
            array_count: 1,
            aspect_mask: rendergraph::format::AspectMask::COLOR,
        },
        temporal_layer: 0,
        component_mapping: ComponentMapping::default(),
        cubemap: false,
    })
}

fn empty_signature() -> EntrySignature {
    EntrySignature { name: "main", params: &[] }
}

/// S1 — Hello triangle: one render target, one draw-stand-in write, one present read. Expects a
/// single graphics batch, a discard-eliding first-touch transition, and a second transition into
/// `Present` with no fence (single queue, no cross-queue edge).
#[test]
fn s1_hello_triangle() {
    let backend = Arc::new(RecordingBackend::default());
    let device = Arc::new(Device::new(backend.clone()));
    let graph = RenderGraph::new(
        device,
        empty_signature(),
        Arc::new(|builder: &mut GraphBuilder| {
            let backbuffer = builder.declare_resource(
                ResourceDesc::image_2d(Format::R8g8b8a8Unorm, 1920, 1080, 1, 1, ResourceFlags::empty()),
                false,
            );
            let view = rt_view(backbuffer);
            builder.add_node(
                QueueClass::Graphics,
                "triangle",
                Arc::new(|_ctx| Ok(())),
                &[ParamBinding::new(view, Access::new(AccessFlags::RENDER_TARGET | AccessFlags::CLEAR))],
                true,
            )?;
            builder.add_node(
                QueueClass::Graphics,
                "present",
                Arc::new(|_ctx| Ok(())),
                &[ParamBinding::new(view, Access::new(AccessFlags::PRESENT))],
                true,
            )?;
            Ok(())
        }),
    );

    let stats = graph.update(0, 0, &[], &[]).unwrap();
    assert_eq!(stats.node_count, 2);
    assert_eq!(stats.batch_count, 1);
    assert_eq!(stats.transition_count, 2);
    assert_eq!(stats.fence_count, 0);

    let calls = backend.calls();
    assert!(calls.iter().any(|c| c.contains("discard=true")));
    assert!(calls.iter().any(|c| c.contains("RENDER_TARGET") && c.contains("PRESENT")));
}

/// S2 — MSAA resolve: a 4x multisampled render target is drawn into, then resolved down to a
/// single-sample swapchain image. Expects a `RenderTarget -> ResolveSrc` transition on the MSAA
/// target and an `Undefined -> ResolveDst` transition on the swapchain image.
#[test]
fn s2_msaa_resolve() {
    let backend = Arc::new(RecordingBackend::default());
    let device = Arc::new(Device::new(backend.clone()));
    let graph = RenderGraph::new(
        device,
        empty_signature(),
        Arc::new(|builder: &mut GraphBuilder| {
            let msaa = builder.declare_resource(
                ResourceDesc::image_2d(Format::R8g8b8a8Unorm, 1920, 1080, 1, 4, ResourceFlags::empty()),
                false,
            );
            let swapchain = builder.declare_resource(
                ResourceDesc::image_2d(Format::R8g8b8a8Unorm, 1920, 1080, 1, 1, ResourceFlags::empty()),
                false,
            );
            let msaa_view = rt_view(msaa);
            let swapchain_view = rt_view(swapchain);

            builder.add_node(
                QueueClass::Graphics,
                "draw",
                Arc::new(|_ctx| Ok(())),
                &[ParamBinding::new(msaa_view, Access::new(AccessFlags::RENDER_TARGET))],
                true,
            )?;
            rendergraph::builtins::resolve_multisample(builder, msaa_view, swapchain_view, Format::R8g8b8a8Unorm)?;
            Ok(())
        }),
    );

    let stats = graph.update(0, 0, &[], &[]).unwrap();
    assert_eq!(stats.batch_count, 1);

    let calls = backend.calls();
    assert!(calls.iter().any(|c| c.contains("RENDER_TARGET") && c.contains("RESOLVE_SRC")));
    assert!(calls.iter().any(|c| c.contains("discard=true") && c.contains("RESOLVE_DST")));
    assert!(calls.contains(&"resolve".to_string()));
}

/// S3 — Async compute: a graphics write, an async compute write to a buffer, then a second
/// graphics node reading that buffer. Expects the compute node to land on its own batch/queue and
/// a fence to bridge it back to the consuming graphics batch.
#[test]
fn s3_async_compute() {
    let backend = Arc::new(RecordingBackend::default());
    let device = Arc::new(Device::new(backend.clone()));
    let graph = RenderGraph::new(
        device,
        empty_signature(),
        Arc::new(|builder: &mut GraphBuilder| {
            let rt = builder.declare_resource(
                ResourceDesc::image_2d(Format::R8g8b8a8Unorm, 1920, 1080, 1, 1, ResourceFlags::empty()),
                false,
            );
            let buf = builder.declare_resource(ResourceDesc::buffer(4096, ResourceFlags::empty()), false);
            let rt_view_ = rt_view(rt);
            let buf_view = View::Buffer(BufferView {
                resource: buf,
                view_format: Format::Unknown,
                byte_offset: 0,
                byte_size: 4096,
                structure_stride: 0,
                temporal_layer: 0,
            });

            builder.add_node(
                QueueClass::Graphics,
                "gfx",
                Arc::new(|_ctx| Ok(())),
                &[ParamBinding::new(rt_view_, Access::new(AccessFlags::RENDER_TARGET))],
                true,
            )?;

            builder.set_async(true);
            builder.add_node(
                QueueClass::Compute,
                "compute",
                Arc::new(|_ctx| Ok(())),
                &[ParamBinding::new(buf_view, Access::new(AccessFlags::SHADER_WRITE).with_stages(ShaderStageFlags::CS))],
                true,
            )?;

            builder.add_node(
                QueueClass::Graphics,
                "gfx2",
                Arc::new(|_ctx| Ok(())),
                &[
                    ParamBinding::new(rt_view_, Access::new(AccessFlags::RENDER_TARGET)),
                    ParamBinding::new(buf_view, Access::new(AccessFlags::SHADER_READ).with_stages(ShaderStageFlags::PS)),
                ],
                true,
            )?;
            Ok(())
        }),
    );

    let stats = graph.update(0, 0, &[], &[]).unwrap();
    assert!(stats.batch_count >= 2);
    assert!(stats.fence_count >= 1, "compute -> gfx2 buffer dependency must cross a queue boundary");

    let calls = backend.calls();
    assert!(calls.iter().any(|c| c.starts_with("signal(")));
    assert!(calls.iter().any(|c| c.starts_with("wait(")));
}

/// S4 — Temporal history: a persistent resource with two temporal layers is written on frame 0 and
/// read back on frame 1. Expects the access records within a single build to carry the distinct
/// temporal layer indices, the resource to wrap out-of-range layer queries modulo its layer count,
/// and — the actual round-trip guarantee — frame 1's first touch of the resource to transition from
/// the access frame 0 left it in rather than from undefined, since they are the same persistent
/// resource correlated by debug name across the two `update()` calls.
#[test]
fn s4_temporal_history() {
    let image_desc = || ResourceDesc {
        temporal_layers: 2,
        ..ResourceDesc::image_2d(Format::R16g16b16a16Float, 512, 512, 1, 1, ResourceFlags::PERSISTENT)
    };

    // Single-build check of the temporal-layer bookkeeping the scenario exercises.
    let mut builder = GraphBuilder::new(0);
    let history = builder.declare_resource(image_desc(), false);
    let read_prev = View::Image(ImageView {
        resource: history,
        view_format: Format::R16g16b16a16Float,
        range: image_desc().full_range(),
        temporal_layer: 1,
        component_mapping: ComponentMapping::default(),
        cubemap: false,
    });
    let write_current = View::Image(ImageView {
        resource: history,
        view_format: Format::R16g16b16a16Float,
        range: image_desc().full_range(),
        temporal_layer: 0,
        component_mapping: ComponentMapping::default(),
        cubemap: false,
    });
    builder
        .add_node(
            QueueClass::Compute,
            "accumulate",
            Arc::new(|_ctx| Ok(())),
            &[
                ParamBinding::new(read_prev, Access::new(AccessFlags::SHADER_READ)),
                ParamBinding::new(write_current, Access::new(AccessFlags::SHADER_WRITE)),
            ],
            true,
        )
        .unwrap();
    let ir = builder.build().unwrap();
    let records = rendergraph::lifetime::collect_access_records(&ir);
    let temporal_layers: Vec<u32> = records.iter().map(|r| r.temporal_layer).collect();
    assert!(temporal_layers.contains(&0));
    assert!(temporal_layers.contains(&1));
    let resource = &ir.resources[history];
    assert_eq!(resource.wrap_temporal_layer(1), 1);
    assert_eq!(resource.wrap_temporal_layer(2), 0, "layer index wraps modulo temporal_layers");

    // Cross-frame round-trip: two real `update()` calls on the same `RenderGraph`. Frame 0 writes
    // the persistent resource; frame 1 only reads it. The entry callback is rebuilt from scratch
    // each call, so the only way frame 1's read can see "written, not undefined" is through the
    // cross-frame access state `RenderGraph::update` threads by the resource's debug name.
    let frame = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let frame_for_entry = frame.clone();
    let backend = Arc::new(RecordingBackend::default());
    let device = Arc::new(Device::new(backend.clone()));
    let graph = RenderGraph::new(
        device,
        empty_signature(),
        Arc::new(move |builder: &mut GraphBuilder| {
            let mut desc = ResourceDesc::image_2d(Format::R16g16b16a16Float, 512, 512, 1, 1, ResourceFlags::PERSISTENT);
            desc.temporal_layers = 2;
            let history = builder.declare_resource(desc, false);
            builder.set_resource_debug_name(history, "history");
            let view = View::Image(ImageView {
                resource: history,
                view_format: Format::R16g16b16a16Float,
                range: desc.full_range(),
                temporal_layer: 0,
                component_mapping: ComponentMapping::default(),
                cubemap: false,
            });
            let access = if frame_for_entry.load(std::sync::atomic::Ordering::SeqCst) == 0 {
                Access::new(AccessFlags::SHADER_WRITE).with_stages(ShaderStageFlags::CS)
            } else {
                Access::new(AccessFlags::SHADER_READ).with_stages(ShaderStageFlags::CS)
            };
            builder.add_node(
                QueueClass::Compute,
                "touch",
                Arc::new(|_ctx| Ok(())),
                &[ParamBinding::new(view, access)],
                true,
            )?;
            Ok(())
        }),
    );

    graph.update(0, 0, &[], &[]).unwrap();
    let calls_after_frame0 = backend.calls().len();

    frame.store(1, std::sync::atomic::Ordering::SeqCst);
    graph.update(1, 0, &[], &[]).unwrap();
    let frame1_calls = backend.calls()[calls_after_frame0..].to_vec();

    let transition = frame1_calls
        .iter()
        .find(|c| c.starts_with("transition("))
        .expect("frame 1 must transition the persistent resource on its first touch");
    assert!(
        transition.contains("SHADER_WRITE") && transition.contains("SHADER_READ") && !transition.contains("discard=true"),
        "frame 1's read must transition from frame 0's write rather than from undefined: {transition}"
    );
}

/// S5 — Aliased transients: two disjoint-lifetime transient images. Expects the memory planner to
/// place them at the same offset within the same heap, since their live intervals never overlap.
#[test]
fn s5_aliased_transients() {
    let mut builder = GraphBuilder::new(0);
    let a = builder.declare_resource(
        ResourceDesc::image_2d(Format::R8g8b8a8Unorm, 256, 256, 1, 1, ResourceFlags::empty()),
        false,
    );
    let b = builder.declare_resource(
        ResourceDesc::image_2d(Format::R8g8b8a8Unorm, 256, 256, 1, 1, ResourceFlags::empty()),
        false,
    );
    let view_a = rt_view(a);
    let view_b = rt_view(b);

    builder
        .add_node(
            QueueClass::Graphics,
            "writes a",
            Arc::new(|_ctx| Ok(())),
            &[ParamBinding::new(view_a, Access::new(AccessFlags::RENDER_TARGET))],
            true,
        )
        .unwrap();
    builder
        .add_node(
            QueueClass::Graphics,
            "writes b",
            Arc::new(|_ctx| Ok(())),
            &[ParamBinding::new(view_b, Access::new(AccessFlags::RENDER_TARGET))],
            true,
        )
        .unwrap();

    let ir = builder.build().unwrap();
    let order = ir.node_order();
    let records = rendergraph::lifetime::collect_access_records(&ir);
    let intervals = rendergraph::lifetime::compute_live_intervals(&records, &order);
    let groups = rendergraph::lifetime::compute_alias_groups(&ir, &intervals);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].resources.len(), 2);

    let resource_refs: fxhash::FxHashMap<_, _> = ir.resources.iter().map(|(id, r)| (id, r)).collect();
    let plan = plan_memory(&resource_refs, &groups, &|_desc| 256);
    let placement_a = plan.placements[&a];
    let placement_b = plan.placements[&b];
    assert_eq!(placement_a.offset, placement_b.offset, "aliased resources share the same offset");
    assert_eq!(placement_a.size, resource_byte_size(&ir.resources[a].desc));
}

/// S6 — Multithreaded record: six nodes land on a single batch; each node's callback clones its
/// `CmdCallbackContext` onto four worker threads that each allocate and read back scratch bytes
/// from the shared context arena before the node reports itself done. Expects output ordering —
/// the sequence in which nodes mark themselves recorded — to equal scheduled node order regardless
/// of how the worker threads within a node interleave.
#[test]
fn s6_multithreaded_record() {
    let backend = Arc::new(RecordingBackend::default());
    let device = Arc::new(Device::new(backend));
    let recorded = Arc::new(Mutex::new(Vec::<String>::new()));
    let recorded_for_entry = recorded.clone();
    let graph = RenderGraph::new(
        device,
        empty_signature(),
        Arc::new(move |builder: &mut GraphBuilder| {
            for i in 0..6u32 {
                let r = builder.declare_resource(ResourceDesc::buffer(64, ResourceFlags::empty()), false);
                let view = View::Buffer(BufferView {
                    resource: r,
                    view_format: Format::Unknown,
                    byte_offset: 0,
                    byte_size: 64,
                    structure_stride: 0,
                    temporal_layer: 0,
                });
                let recorded = recorded_for_entry.clone();
                builder.add_node(
                    QueueClass::Copy,
                    format!("node{i}"),
                    Arc::new(move |ctx| {
                        let name = ctx.node_name().to_string();
                        let clones: Vec<_> = (0..4u8).map(|_| ctx.clone_context().unwrap()).collect();
                        std::thread::scope(|scope| {
                            let mut handles = Vec::new();
                            for (worker, clone) in clones.into_iter().enumerate() {
                                handles.push(scope.spawn(move || {
                                    let payload = vec![worker as u8; 8];
                                    let token = clone.arena().alloc(&payload);
                                    assert_eq!(clone.arena().read(token), payload);
                                }));
                            }
                            for h in handles {
                                h.join().unwrap();
                            }
                        });
                        recorded.lock().unwrap().push(name);
                        Ok(())
                    }),
                    &[ParamBinding::new(view, Access::new(AccessFlags::COPY_DST))],
                    true,
                )?;
            }
            Ok(())
        }),
    );

    graph.update(0, 0, &[], &[]).unwrap();

    let expected: Vec<String> = (0..6u32).map(|i| format!("node{i}")).collect();
    assert_eq!(*recorded.lock().unwrap(), expected);
}
