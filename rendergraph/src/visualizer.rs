//! Visualizer Update Feed: serializes one build's resources, nodes, transitions and batches into
//! a compact little-endian binary stream a separate inspector tool can consume incrementally.

use crate::barrier::{CommandBatch, Transition};
use crate::builder::GraphIr;
use crate::node::NodeId;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

const FORMAT_VERSION: u32 = 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
enum RecordTag {
    FrameHeader = 0,
    Resource = 1,
    Node = 2,
    Transition = 3,
    Batch = 4,
    FrameFooter = 5,
}

/// Writes one frame's worth of graph state. Every record is length-prefixed so a consumer that
/// doesn't understand a newer tag can still skip over it, keeping the feed forward-compatible
/// with visualizer versions older than the producing runtime.
pub fn write_frame(
    out: &mut impl Write,
    frame_index: u64,
    ir: &GraphIr,
    batches: &[CommandBatch],
    transitions: &[Transition],
) -> io::Result<()> {
    write_record(out, RecordTag::FrameHeader, |body| {
        body.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        body.write_u64::<LittleEndian>(frame_index)?;
        body.write_u32::<LittleEndian>(ir.resources.len() as u32)?;
        body.write_u32::<LittleEndian>(ir.nodes.len() as u32)
    })?;

    for (id, resource) in ir.resources.iter() {
        write_record(out, RecordTag::Resource, |body| {
            write_node_id_bits(body, slotmap::Key::data(&id).as_ffi())?;
            body.write_u8(resource.external as u8)?;
            body.write_u8(resource.desc.kind as u8)?;
            let name = resource.debug_name.as_deref().unwrap_or("");
            write_str(body, name)
        })?;
    }

    for node_id in ir.node_order() {
        let node = &ir.nodes[node_id];
        write_record(out, RecordTag::Node, |body| {
            write_node_id_bits(body, slotmap::Key::data(&node_id).as_ffi())?;
            body.write_u32::<LittleEndian>(node.program_order)?;
            body.write_u8(node.queue_class as u8)?;
            write_str(body, &node.name)
        })?;
    }

    for transition in transitions {
        write_record(out, RecordTag::Transition, |body| {
            write_node_id_bits(body, slotmap::Key::data(&transition.resource_id).as_ffi())?;
            write_node_id_bits(body, slotmap::Key::data(&transition.after_node).as_ffi())?;
            body.write_u8(transition.discard as u8)?;
            body.write_u32::<LittleEndian>(transition.before.flags.bits())?;
            body.write_u32::<LittleEndian>(transition.after.flags.bits())
        })?;
    }

    for (batch_index, batch) in batches.iter().enumerate() {
        write_record(out, RecordTag::Batch, |body| {
            body.write_u32::<LittleEndian>(batch_index as u32)?;
            body.write_u8(batch.queue.queue_class as u8)?;
            body.write_u32::<LittleEndian>(batch.queue.queue_index)?;
            body.write_u32::<LittleEndian>(batch.nodes.len() as u32)?;
            for &node_id in &batch.nodes {
                write_node_id_bits(body, slotmap::Key::data(&node_id).as_ffi())?;
            }
            Ok(())
        })?;
    }

    write_record(out, RecordTag::FrameFooter, |_| Ok(()))
}

fn write_node_id_bits(out: &mut impl Write, bits: u64) -> io::Result<()> {
    out.write_u64::<LittleEndian>(bits)
}

fn write_str(out: &mut impl Write, s: &str) -> io::Result<()> {
    out.write_u16::<LittleEndian>(s.len() as u16)?;
    out.write_all(s.as_bytes())
}

fn write_record(
    out: &mut impl Write,
    tag: RecordTag,
    body_fn: impl FnOnce(&mut Vec<u8>) -> io::Result<()>,
) -> io::Result<()> {
    let mut body = Vec::new();
    body_fn(&mut body)?;
    out.write_u8(tag as u8)?;
    out.write_u32::<LittleEndian>(body.len() as u32)?;
    out.write_all(&body)
}

/// Only present so the visualizer's own consumer-side offline tools (fed with the byte feed
/// above) can associate a node id back to the slot map that produced it, without linking against
/// `slotmap` themselves.
pub fn node_id_bits(id: NodeId) -> u64 {
    slotmap::Key::data(&id).as_ffi()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;

    #[test]
    fn frame_round_trips_through_a_buffer() {
        let b = GraphBuilder::new(0);
        let ir = b.build().unwrap();
        let mut buf = Vec::new();
        write_frame(&mut buf, 0, &ir, &[], &[]).unwrap();
        assert!(!buf.is_empty());
        assert_eq!(buf[0], RecordTag::FrameHeader as u8);
    }
}
