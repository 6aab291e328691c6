//! The access model: the enumeration of access kinds, shader stages, and the
//! merge/compatibility predicates the lifetime, barrier and scheduler stages build on.

use bitflags::bitflags;

bitflags! {
    /// Declared intent a node has on a subresource.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
    pub struct AccessFlags: u32 {
        const RENDER_TARGET     = 1 << 0;
        const DEPTH_READ        = 1 << 1;
        const DEPTH_WRITE       = 1 << 2;
        const STENCIL_READ      = 1 << 3;
        const STENCIL_WRITE     = 1 << 4;
        const SHADER_READ       = 1 << 5;
        const SHADER_WRITE      = 1 << 6;
        const COPY_SRC          = 1 << 7;
        const COPY_DST          = 1 << 8;
        const RESOLVE_SRC       = 1 << 9;
        const RESOLVE_DST       = 1 << 10;
        const PRESENT           = 1 << 11;
        const INDIRECT_ARGS     = 1 << 12;
        const VERTEX_BUFFER     = 1 << 13;
        const INDEX_BUFFER      = 1 << 14;
        const CONSTANT_BUFFER   = 1 << 15;
        const SHADING_RATE_IMAGE = 1 << 16;
        const PREDICATION       = 1 << 17;
        const STREAM_OUT        = 1 << 18;
        const RAYTRACING_AS     = 1 << 19;
        const CLEAR             = 1 << 20;
        const DISCARD_BEFORE    = 1 << 21;
        const DISCARD_AFTER     = 1 << 22;
        const CPU_READ          = 1 << 23;
        const CPU_WRITE         = 1 << 24;
        const RELAXED           = 1 << 25;

        const WRITE_BITS = Self::RENDER_TARGET.bits() | Self::DEPTH_WRITE.bits()
            | Self::STENCIL_WRITE.bits() | Self::SHADER_WRITE.bits() | Self::COPY_DST.bits()
            | Self::RESOLVE_DST.bits() | Self::STREAM_OUT.bits() | Self::CLEAR.bits()
            | Self::CPU_WRITE.bits();
        const READ_BITS = Self::DEPTH_READ.bits() | Self::STENCIL_READ.bits()
            | Self::SHADER_READ.bits() | Self::COPY_SRC.bits() | Self::RESOLVE_SRC.bits()
            | Self::PRESENT.bits() | Self::INDIRECT_ARGS.bits() | Self::VERTEX_BUFFER.bits()
            | Self::INDEX_BUFFER.bits() | Self::CONSTANT_BUFFER.bits()
            | Self::SHADING_RATE_IMAGE.bits() | Self::PREDICATION.bits()
            | Self::RAYTRACING_AS.bits() | Self::CPU_READ.bits();
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
    pub struct ShaderStageFlags: u32 {
        const VS = 1 << 0;
        const PS = 1 << 1;
        const CS = 1 << 2;
        const GS = 1 << 3;
        const HS = 1 << 4;
        const DS = 1 << 5;
        const TS = 1 << 6;
        const MS = 1 << 7;
        const RAYTRACING = 1 << 8;
    }
}

/// A typed binding slot a node declares a resource parameter for, used by diagnostics and by
/// render-pass attachment grouping.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Semantic {
    RenderTarget(u32),
    DepthStencil,
    ClearColor,
    ClearDepth,
    ClearStencil,
    Viewport,
    Scissor,
    VertexBuffer(u32),
    IndexBuffer,
    None,
}

/// A declared access: flags plus the shader stages that perform it, plus an optional semantic
/// slot used by render-pass and built-in-node inference.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Access {
    pub flags: AccessFlags,
    pub stages: ShaderStageFlags,
    pub semantic: Semantic,
}

impl Access {
    pub const fn new(flags: AccessFlags) -> Access {
        Access {
            flags,
            stages: ShaderStageFlags::empty(),
            semantic: Semantic::None,
        }
    }

    pub const fn with_stages(mut self, stages: ShaderStageFlags) -> Access {
        self.stages = stages;
        self
    }

    pub const fn with_semantic(mut self, semantic: Semantic) -> Access {
        self.semantic = semantic;
        self
    }

    pub fn is_write(&self) -> bool {
        self.flags.intersects(AccessFlags::WRITE_BITS)
    }

    pub fn is_read(&self) -> bool {
        self.flags.intersects(AccessFlags::READ_BITS)
    }

    pub fn is_relaxed(&self) -> bool {
        self.flags.contains(AccessFlags::RELAXED)
    }

    pub fn is_render_pass_scoped(&self) -> bool {
        self.flags.intersects(
            AccessFlags::RENDER_TARGET
                | AccessFlags::DEPTH_READ
                | AccessFlags::DEPTH_WRITE
                | AccessFlags::STENCIL_READ
                | AccessFlags::STENCIL_WRITE,
        )
    }

    /// True if `self` and `other` can stand side by side on the same subresource without an
    /// intervening transition: both read-only (ignoring `Relaxed`, which only affects
    /// reordering, not the access bits that must still match for compatibility) or, if both
    /// write, only when both carry `Relaxed` and declare exactly the same flags.
    pub fn compatible_with(&self, other: &Access) -> bool {
        if self.is_read() && other.is_read() && !self.is_write() && !other.is_write() {
            return true;
        }
        if self.is_relaxed() && other.is_relaxed() {
            return self.flags == other.flags;
        }
        false
    }

    /// Unions two accesses declared by different parameters of the same node on the same
    /// subresource. Returns `None` when the union is semantically invalid (e.g. combining
    /// `DEPTH_READ` and `DEPTH_WRITE` is allowed — read+write is a legal depth-test-and-write
    /// pattern — but combining a CPU-side access with a GPU-side write is not).
    pub fn union(&self, other: &Access) -> Option<Access> {
        let flags = self.flags | other.flags;
        let invalid_cpu_gpu_write = flags.intersects(AccessFlags::CPU_WRITE)
            && flags.intersects(AccessFlags::WRITE_BITS & !AccessFlags::CPU_WRITE);
        let invalid_cpu_gpu_read = flags.intersects(AccessFlags::CPU_READ)
            && flags.intersects(AccessFlags::READ_BITS & !AccessFlags::CPU_READ);
        if invalid_cpu_gpu_write || invalid_cpu_gpu_read {
            return None;
        }
        Some(Access {
            flags,
            stages: self.stages | other.stages,
            semantic: if matches!(self.semantic, Semantic::None) {
                other.semantic
            } else {
                self.semantic
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_read_is_compatible() {
        let a = Access::new(AccessFlags::SHADER_READ);
        let b = Access::new(AccessFlags::SHADER_READ | AccessFlags::VERTEX_BUFFER);
        assert!(a.compatible_with(&b));
    }

    #[test]
    fn write_write_without_relaxed_is_not_compatible() {
        let a = Access::new(AccessFlags::RENDER_TARGET);
        let b = Access::new(AccessFlags::RENDER_TARGET);
        assert!(!a.compatible_with(&b));
    }

    #[test]
    fn relaxed_same_flags_is_compatible() {
        let a = Access::new(AccessFlags::SHADER_WRITE | AccessFlags::RELAXED);
        let b = Access::new(AccessFlags::SHADER_WRITE | AccessFlags::RELAXED);
        assert!(a.compatible_with(&b));
    }

    #[test]
    fn union_rejects_cpu_gpu_write_mix() {
        let a = Access::new(AccessFlags::CPU_WRITE);
        let b = Access::new(AccessFlags::RENDER_TARGET);
        assert!(a.union(&b).is_none());
    }

    #[test]
    fn union_allows_depth_read_write() {
        let a = Access::new(AccessFlags::DEPTH_READ);
        let b = Access::new(AccessFlags::DEPTH_WRITE);
        assert!(a.union(&b).is_some());
    }
}
