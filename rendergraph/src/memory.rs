//! Memory Planner: heap-type selection and placement-offset assignment for transient,
//! graph-owned resources, honoring alias groups and non-overlapping live ranges.

use crate::access::AccessFlags;
use crate::lifetime::AliasGroup;
use crate::resource::{Resource, ResourceDesc, ResourceId};
use fxhash::FxHashMap;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HeapType {
    DeviceLocal,
    GpuLocalCpuVisible,
    Dedicated,
}

/// A coarse classification used only to decide which resources are worth grouping together for
/// placement reuse — the actual allocation still honors exact alignment and size.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct HeapKey {
    pub heap_type: HeapType,
    pub size_class: u32,
}

/// `log2` of the byte size, clamped, used as a bucket for "matching size class" grouping.
fn size_class(byte_size: u64) -> u32 {
    64 - byte_size.max(1).leading_zeros()
}

pub fn heap_type(desc: &ResourceDesc) -> HeapType {
    use crate::resource::ResourceFlags;
    if desc.flags.contains(ResourceFlags::PREFER_DEDICATED) {
        HeapType::Dedicated
    } else if desc.flags.contains(ResourceFlags::PREFER_GPU_LOCAL_CPU_VISIBLE) {
        HeapType::GpuLocalCpuVisible
    } else {
        HeapType::DeviceLocal
    }
}

/// Picks a heap type from `(type, flags, access-union across its lifetime)`: a resource ever
/// touched by a CPU-side access is biased towards a host-visible heap even without an explicit
/// flag, matching the spec's "access-union across its lifetime" input.
pub fn heap_type_for_access(desc: &ResourceDesc, access_union: AccessFlags) -> HeapType {
    let base = heap_type(desc);
    if base == HeapType::DeviceLocal
        && access_union.intersects(AccessFlags::CPU_READ | AccessFlags::CPU_WRITE)
    {
        HeapType::GpuLocalCpuVisible
    } else {
        base
    }
}

pub fn heap_key(desc: &ResourceDesc) -> HeapKey {
    let byte_size = match desc.kind {
        crate::resource::ResourceKind::Buffer => desc.byte_size(),
        _ => {
            (desc.width as u64)
                * (desc.height_or_size_hi.max(1) as u64)
                * (desc.depth_or_array_size.max(1) as u64)
                * (desc.format.element_size().max(1) as u64)
        }
    };
    HeapKey {
        heap_type: heap_type(desc),
        size_class: size_class(byte_size),
    }
}

/// A backend-declared minimum alignment requirement for placement within a heap.
pub type AlignmentFn<'a> = dyn Fn(&ResourceDesc) -> u64 + 'a;

#[derive(Copy, Clone, Debug)]
pub struct Placement {
    pub heap_type: HeapType,
    pub offset: u64,
    pub size: u64,
}

/// Per-resource memory placement, keyed by resource id. External resources are never placed.
pub struct MemoryPlan {
    pub placements: FxHashMap<ResourceId, Placement>,
}

pub fn resource_byte_size(desc: &ResourceDesc) -> u64 {
    match desc.kind {
        crate::resource::ResourceKind::Buffer => desc.byte_size(),
        _ => {
            (desc.width as u64)
                * (desc.height_or_size_hi.max(1) as u64)
                * (desc.depth_or_array_size.max(1) as u64)
                * (desc.format.element_size().max(1) as u64)
        }
    }
}

/// Assigns a placement offset within each alias group such that no two concurrently-live
/// resources (as already determined by `AliasGroup`, which only ever groups disjoint-lifetime
/// resources) overlap. Within a group, resources are placed back-to-back at their own size since
/// their live ranges never coexist — the offset is reused, not the space.
pub fn plan_memory(
    resources: &FxHashMap<ResourceId, &Resource>,
    alias_groups: &[AliasGroup],
    alignment_fn: &AlignmentFn,
) -> MemoryPlan {
    let mut placements = FxHashMap::default();

    for group in alias_groups {
        // Resources in a group never overlap in time, so every member starts at offset 0 of the
        // group's slot, genuinely reusing the same bytes rather than merely packing tightly.
        for &id in &group.resources {
            let Some(resource) = resources.get(&id) else {
                continue;
            };
            let align = alignment_fn(&resource.desc).max(1);
            let offset = align_up(0, align);
            let size = resource_byte_size(&resource.desc);
            placements.insert(
                id,
                Placement {
                    heap_type: heap_type(&resource.desc),
                    offset,
                    size,
                },
            );
        }
    }

    MemoryPlan { placements }
}

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) / align * align
}
