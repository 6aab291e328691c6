//! Signature reflection and argument marshalling.
//!
//! An entry (or node) signature is a fixed list of parameter descriptors produced ahead of time
//! — typically by `#[derive(EntryParams)]` from the `rendergraph-macros` crate, standing in for
//! the front-end compiler's reflection output. `update` validates a caller's argument and
//! resource slices against this signature before invoking the entry callback.

use crate::access::Access;
use crate::error::{Error, Result};
use crate::resource::View;
use std::any::TypeId;

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
    pub struct ParamFlags: u8 {
        const RESOURCE = 1 << 0;
        const OPTIONAL = 1 << 1;
        /// Set together with `RESOURCE` when the declared parameter is an image; absent (with
        /// `RESOURCE` set) means a buffer. Ignored when `RESOURCE` is not set.
        const IMAGE_RESOURCE = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug)]
pub struct TypeInfo {
    pub size: usize,
    pub type_id: fn() -> TypeId,
}

#[derive(Clone, Debug)]
pub struct ParamDesc {
    pub name: &'static str,
    pub type_info: TypeInfo,
    pub array_size: u32,
    pub flags: ParamFlags,
    pub access: Access,
}

impl ParamDesc {
    pub fn is_resource(&self) -> bool {
        self.flags.contains(ParamFlags::RESOURCE)
    }

    pub fn is_optional(&self) -> bool {
        self.flags.contains(ParamFlags::OPTIONAL)
    }

    /// Whether this resource parameter is declared as an image (`false` means buffer). Only
    /// meaningful when `is_resource()` is true.
    pub fn is_image_resource(&self) -> bool {
        self.flags.contains(ParamFlags::IMAGE_RESOURCE)
    }
}

/// Fixed list of parameter descriptors for one entry point or node.
#[derive(Clone, Debug)]
pub struct EntrySignature {
    pub name: &'static str,
    pub params: &'static [ParamDesc],
}

impl EntrySignature {
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn param(&self, index: usize) -> Result<&'static ParamDesc> {
        self.params
            .get(index)
            .ok_or_else(|| Error::index_out_of_bounds(format!(
                "parameter index {} out of bounds for signature `{}` with {} parameters",
                index, self.name, self.params.len()
            )))
    }

    /// Validates argument/resource slice lengths against the signature, per the `update`
    /// contract: `InvalidArguments` on a length mismatch.
    pub fn validate_call(&self, args: &[&[u8]], resources: &[View]) -> Result<()> {
        let resource_param_count = self.params.iter().filter(|p| p.is_resource()).count();
        if args.len() != self.params.len() {
            return Err(Error::invalid_arguments(format!(
                "signature `{}` expects {} arguments, got {}",
                self.name,
                self.params.len(),
                args.len()
            )));
        }
        if resources.len() != resource_param_count {
            return Err(Error::invalid_arguments(format!(
                "signature `{}` expects {} resource arguments, got {}",
                self.name,
                resource_param_count,
                resources.len()
            )));
        }
        let mut resource_index = 0usize;
        for (i, (param, arg)) in self.params.iter().zip(args.iter()).enumerate() {
            if param.is_resource() {
                if let Some(view) = resources.get(resource_index) {
                    let actual_is_image = match view {
                        View::Image(_) => Some(true),
                        View::Buffer(_) => Some(false),
                        View::Null => None,
                    };
                    if let Some(actual_is_image) = actual_is_image {
                        if actual_is_image != param.is_image_resource() {
                            return Err(Error::type_mismatch(format!(
                                "parameter {} (`{}`) declares a {} resource but was bound a {} view",
                                i,
                                param.name,
                                if param.is_image_resource() { "image" } else { "buffer" },
                                if actual_is_image { "image" } else { "buffer" },
                            )));
                        }
                    }
                }
                resource_index += 1;
            } else if arg.len() != param.type_info.size * param.array_size.max(1) as usize {
                return Err(Error::type_mismatch(format!(
                    "parameter {} (`{}`) expects {} bytes, got {}",
                    i,
                    param.name,
                    param.type_info.size * param.array_size.max(1) as usize,
                    arg.len()
                )));
            }
        }
        Ok(())
    }
}

/// A bump allocator holding a copy of one graph build's argument bytes, so node callbacks can
/// access stable pointers for the duration of the build. Pre-sized from the signature's total
/// argument size before the entry callback runs so it never reallocates mid-build.
pub struct ArgBuffer {
    bytes: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl ArgBuffer {
    pub fn with_capacity(capacity: usize) -> ArgBuffer {
        ArgBuffer {
            bytes: Vec::with_capacity(capacity),
            offsets: Vec::new(),
        }
    }

    /// Copies `data` into the buffer and returns a stable index that `get` can use to retrieve
    /// it later in the build.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let start = self.bytes.len();
        debug_assert!(
            self.bytes.capacity() >= start + data.len(),
            "ArgBuffer must be pre-sized before the entry callback runs"
        );
        self.bytes.extend_from_slice(data);
        self.offsets.push((start, data.len()));
        self.offsets.len() - 1
    }

    pub fn get(&self, index: usize) -> &[u8] {
        let (start, len) = self.offsets[index];
        &self.bytes[start..start + len]
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.offsets.clear();
    }
}
