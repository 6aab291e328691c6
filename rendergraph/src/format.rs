//! Closed enumeration of pixel/buffer element formats.

use bitflags::bitflags;

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct AspectMask: u8 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// A closed set of resource formats. Each variant knows its element size, aspect set, and
/// whether it is a typeless ("raw") format that a view may reinterpret.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Format {
    Unknown,
    R8Unorm,
    R8g8b8a8Unorm,
    R8g8b8a8UnormSrgb,
    R16g16b16a16Float,
    R32g32b32a32Float,
    R32Float,
    R32Uint,
    D32Float,
    D24UnormS8Uint,
    Bc1Unorm,
    TypelessR8g8b8a8,
}

impl Format {
    /// Size in bytes of a single texel (undefined/unused for typeless block formats).
    pub fn element_size(self) -> u32 {
        match self {
            Format::Unknown => 0,
            Format::R8Unorm => 1,
            Format::R8g8b8a8Unorm | Format::R8g8b8a8UnormSrgb | Format::TypelessR8g8b8a8 => 4,
            Format::R16g16b16a16Float => 8,
            Format::R32g32b32a32Float => 16,
            Format::R32Float | Format::R32Uint => 4,
            Format::D32Float => 4,
            Format::D24UnormS8Uint => 4,
            Format::Bc1Unorm => 0, // block-compressed, not addressable per-texel
        }
    }

    pub fn aspect_mask(self) -> AspectMask {
        match self {
            Format::D32Float => AspectMask::DEPTH,
            Format::D24UnormS8Uint => AspectMask::DEPTH | AspectMask::STENCIL,
            _ => AspectMask::COLOR,
        }
    }

    pub fn is_typeless(self) -> bool {
        matches!(self, Format::TypelessR8g8b8a8)
    }

    /// Whether `other` can be used as a view format over a resource declared with `self`. A
    /// typeless resource format accepts any same-size typed format; a typed resource format
    /// only accepts itself.
    pub fn compatible_view_format(self, other: Format) -> bool {
        if self == other {
            return true;
        }
        self.is_typeless() && self.element_size() == other.element_size() && !other.is_typeless()
    }

    /// Maximum sample count this format supports for multisampled render targets.
    pub fn max_sample_count(self) -> u32 {
        match self {
            Format::D32Float | Format::D24UnormS8Uint | Format::R8g8b8a8Unorm
            | Format::R8g8b8a8UnormSrgb | Format::R16g16b16a16Float => 8,
            _ => 1,
        }
    }
}

impl Default for Format {
    fn default() -> Format {
        Format::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typeless_accepts_matching_size() {
        assert!(Format::TypelessR8g8b8a8.compatible_view_format(Format::R8g8b8a8Unorm));
        assert!(Format::TypelessR8g8b8a8.compatible_view_format(Format::R8g8b8a8UnormSrgb));
    }

    #[test]
    fn typed_only_accepts_itself() {
        assert!(!Format::R8g8b8a8Unorm.compatible_view_format(Format::R8g8b8a8UnormSrgb));
    }

    #[test]
    fn depth_formats_have_depth_aspect() {
        assert!(Format::D32Float.aspect_mask().contains(AspectMask::DEPTH));
        assert!(Format::D24UnormS8Uint.aspect_mask().contains(AspectMask::STENCIL));
    }
}
