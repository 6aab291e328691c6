//! Built-in Node Catalog: `Clear`, `Copy` and `ResolveMultisample` are ordinary nodes that
//! dispatch straight to the matching `BackendHooks` method — they carry no special-cased
//! scheduling behavior, only pre-wired callbacks and access declarations.

use crate::access::{Access, AccessFlags};
use crate::builder::{GraphBuilder, ParamBinding};
use crate::error::Result;
use crate::format::Format;
use crate::node::{NodeId, QueueClass};
use crate::resource::View;
use std::sync::Arc;

/// Appends a node that clears `target` to `color`. The access is declared `RENDER_TARGET |
/// CLEAR`, so a full-resource clear is eligible for the same discard elision as any other
/// full-overwrite write.
pub fn clear(builder: &mut GraphBuilder, target: View, color: [f32; 4]) -> Result<NodeId> {
    let params = [ParamBinding::new(
        target,
        Access::new(AccessFlags::RENDER_TARGET | AccessFlags::CLEAR),
    )];
    builder.add_node(
        QueueClass::Graphics,
        "clear",
        Arc::new(move |ctx| {
            let view = ctx.resource(0)?;
            ctx.backend().clear(ctx.encoder_mut(), view, color)
        }),
        &params,
        true,
    )
}

/// Appends a node that copies `src` into `dst`, declared on the copy queue class so the
/// scheduler is free to place it on a dedicated copy queue when one is available.
pub fn copy(builder: &mut GraphBuilder, src: View, dst: View) -> Result<NodeId> {
    let params = [
        ParamBinding::new(src, Access::new(AccessFlags::COPY_SRC)),
        ParamBinding::new(dst, Access::new(AccessFlags::COPY_DST)),
    ];
    builder.add_node(
        QueueClass::Copy,
        "copy",
        Arc::new(|ctx| {
            let src = ctx.resource(0)?;
            let dst = ctx.resource(1)?;
            ctx.backend().copy(ctx.encoder_mut(), src, dst)
        }),
        &params,
        true,
    )
}

/// Appends a node that resolves a multisampled `src` into a single-sample `dst` of the given
/// format, declared `RESOLVE_SRC`/`RESOLVE_DST` so the barrier synthesizer treats it like any
/// other render-pass-scoped transition pair.
pub fn resolve_multisample(
    builder: &mut GraphBuilder,
    src: View,
    dst: View,
    format: Format,
) -> Result<NodeId> {
    let params = [
        ParamBinding::new(src, Access::new(AccessFlags::RESOLVE_SRC)),
        ParamBinding::new(dst, Access::new(AccessFlags::RESOLVE_DST)),
    ];
    builder.add_node(
        QueueClass::Graphics,
        "resolve_multisample",
        Arc::new(move |ctx| {
            let src = ctx.resource(0)?;
            let dst = ctx.resource(1)?;
            ctx.backend().resolve_multisample(ctx.encoder_mut(), src, dst, format)
        }),
        &params,
        true,
    )
}
