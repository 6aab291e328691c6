//! The resource/view data model: typed descriptions, identity, subresource ranges and temporal
//! layering.

use crate::format::{AspectMask, Format};
use bitflags::bitflags;
use slotmap::new_key_type;

new_key_type! {
    /// Dense id into the graph's resource arena. Reset every `update`.
    pub struct ResourceId;
}

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
    pub struct ResourceFlags: u32 {
        const CUBEMAP_COMPATIBLE = 1 << 0;
        const ROW_MAJOR = 1 << 1;
        /// Lifetime survives across frames; excluded from aliasing.
        const PERSISTENT = 1 << 2;
        const PREFER_GPU_LOCAL_CPU_VISIBLE = 1 << 3;
        const PREFER_DEDICATED = 1 << 4;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Buffer,
    Image1D,
    Image2D,
    Image3D,
}

/// Discriminated description of a resource, independent of how it will be realized on the
/// backend. For buffers, `width`/`height_or_size_hi` together form the 64-bit byte size
/// (`width` is the low 32 bits, `height_or_size_hi` the high 32 bits).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ResourceDesc {
    pub kind: ResourceKind,
    pub format: Format,
    pub width: u32,
    pub height_or_size_hi: u32,
    pub depth_or_array_size: u32,
    pub mip_levels: u32,
    pub sample_count: u32,
    pub temporal_layers: u32,
    pub flags: ResourceFlags,
}

impl ResourceDesc {
    pub fn buffer(byte_size: u64, flags: ResourceFlags) -> ResourceDesc {
        ResourceDesc {
            kind: ResourceKind::Buffer,
            format: Format::Unknown,
            width: byte_size as u32,
            height_or_size_hi: (byte_size >> 32) as u32,
            depth_or_array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            temporal_layers: 1,
            flags,
        }
    }

    pub fn image_2d(
        format: Format,
        width: u32,
        height: u32,
        mip_levels: u32,
        sample_count: u32,
        flags: ResourceFlags,
    ) -> ResourceDesc {
        ResourceDesc {
            kind: ResourceKind::Image2D,
            format,
            width,
            height_or_size_hi: height,
            depth_or_array_size: 1,
            mip_levels: mip_levels.max(1),
            sample_count: sample_count.max(1),
            temporal_layers: 1,
            flags,
        }
    }

    pub fn byte_size(&self) -> u64 {
        debug_assert_eq!(self.kind, ResourceKind::Buffer);
        (self.width as u64) | ((self.height_or_size_hi as u64) << 32)
    }

    pub fn is_persistent(&self) -> bool {
        self.flags.contains(ResourceFlags::PERSISTENT)
    }

    pub fn temporal_layers(&self) -> u32 {
        self.temporal_layers.max(1)
    }

    /// The canonical "full" subresource range covering the entire resource.
    pub fn full_range(&self) -> SubresourceRange {
        SubresourceRange {
            base_mip: 0,
            mip_count: self.mip_levels.max(1),
            base_array_layer: 0,
            array_count: self.depth_or_array_size.max(1),
            aspect_mask: self.format.aspect_mask(),
        }
    }
}

/// A rectangle in (mip, array layer, aspect) space addressing a portion of a resource.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SubresourceRange {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_array_layer: u32,
    pub array_count: u32,
    pub aspect_mask: AspectMask,
}

impl SubresourceRange {
    pub fn overlaps(&self, other: &SubresourceRange) -> bool {
        if !self.aspect_mask.intersects(other.aspect_mask) {
            return false;
        }
        let mip_overlap = self.base_mip < other.base_mip + other.mip_count
            && other.base_mip < self.base_mip + self.mip_count;
        let layer_overlap = self.base_array_layer < other.base_array_layer + other.array_count
            && other.base_array_layer < self.base_array_layer + self.array_count;
        mip_overlap && layer_overlap
    }

    /// True when `self` covers exactly the resource's full subresource range, i.e. a write to
    /// `self` overwrites the entire resource and can be treated as a full discard.
    pub fn is_full_overwrite_of(&self, full: &SubresourceRange) -> bool {
        self.base_mip == 0
            && self.mip_count >= full.mip_count
            && self.base_array_layer == 0
            && self.array_count >= full.array_count
            && self.aspect_mask.contains(full.aspect_mask)
    }
}

/// Identity of a resource: graph-owned (transient or persistent) or externally provided.
#[derive(Clone, Debug)]
pub struct Resource {
    pub id: ResourceId,
    pub desc: ResourceDesc,
    pub external: bool,
    pub debug_name: Option<Box<str>>,
}

impl Resource {
    pub fn is_persistent(&self) -> bool {
        self.external || self.desc.is_persistent()
    }

    /// Resolves a temporal layer index, wrapping modulo the resource's temporal layer count as
    /// required by the data model invariant ("out-of-range accesses wrap").
    pub fn wrap_temporal_layer(&self, layer: u32) -> u32 {
        layer % self.desc.temporal_layers()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum ComponentSwizzle {
    #[default]
    Identity,
    Zero,
    One,
    R,
    G,
    B,
    A,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct ComponentMapping {
    pub r: ComponentSwizzle,
    pub g: ComponentSwizzle,
    pub b: ComponentSwizzle,
    pub a: ComponentSwizzle,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ImageView {
    pub resource: ResourceId,
    pub view_format: Format,
    pub range: SubresourceRange,
    pub temporal_layer: u32,
    pub component_mapping: ComponentMapping,
    pub cubemap: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BufferView {
    pub resource: ResourceId,
    pub view_format: Format,
    pub byte_offset: u64,
    pub byte_size: u64,
    pub structure_stride: u32,
    pub temporal_layer: u32,
}

/// A value-typed, structurally-equal reference to a resource. The null variant is a first-class
/// value that may appear as any resource argument and binds no resource.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum View {
    #[default]
    Null,
    Image(ImageView),
    Buffer(BufferView),
}

impl View {
    pub fn resource_id(&self) -> Option<ResourceId> {
        match self {
            View::Null => None,
            View::Image(v) => Some(v.resource),
            View::Buffer(v) => Some(v.resource),
        }
    }

    pub fn temporal_layer(&self) -> u32 {
        match self {
            View::Null => 0,
            View::Image(v) => v.temporal_layer,
            View::Buffer(v) => v.temporal_layer,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, View::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporal_layer_wraps() {
        let r = Resource {
            id: ResourceId::default(),
            desc: ResourceDesc {
                temporal_layers: 2,
                ..ResourceDesc::buffer(16, ResourceFlags::empty())
            },
            external: false,
            debug_name: None,
        };
        assert_eq!(r.wrap_temporal_layer(0), 0);
        assert_eq!(r.wrap_temporal_layer(1), 1);
        assert_eq!(r.wrap_temporal_layer(2), 0);
        assert_eq!(r.wrap_temporal_layer(3), 1);
    }

    #[test]
    fn null_view_has_no_resource() {
        assert_eq!(View::Null.resource_id(), None);
    }

    #[test]
    fn disjoint_mip_ranges_do_not_overlap() {
        let a = SubresourceRange {
            base_mip: 0,
            mip_count: 1,
            base_array_layer: 0,
            array_count: 1,
            aspect_mask: AspectMask::COLOR,
        };
        let b = SubresourceRange {
            base_mip: 1,
            mip_count: 1,
            base_array_layer: 0,
            array_count: 1,
            aspect_mask: AspectMask::COLOR,
        };
        assert!(!a.overlaps(&b));
    }
}
