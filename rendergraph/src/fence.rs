//! Fence Planner: allocates cross-queue synchronization fence slots between command batches that
//! have a data dependency crossing a queue boundary.

use crate::barrier::{CommandBatch, Transition};
use crate::node::NodeId;
use fxhash::FxHashMap;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FenceId(pub u32);

#[derive(Clone, Debug)]
pub struct FenceWait {
    pub fence: FenceId,
    /// The value this batch must wait for before it may begin.
    pub value: u64,
}

#[derive(Clone, Debug)]
pub struct FenceSignal {
    pub fence: FenceId,
    pub value: u64,
}

pub struct FencePlan {
    /// One slot per command batch, indexed the same as the `Vec<CommandBatch>` passed in.
    pub waits: Vec<Vec<FenceWait>>,
    pub signals: Vec<Vec<FenceSignal>>,
    pub fence_count: u32,
}

/// Assigns one fence per distinct (producer queue, consumer queue) pair observed across a
/// transition boundary and gives each a monotonically increasing signal value per batch that
/// signals it — the minimal planning a multi-queue backend needs to insert real GPU fences.
pub fn plan_fences(
    batches: &[CommandBatch],
    transitions: &[Transition],
) -> FencePlan {
    let batch_of: FxHashMap<NodeId, usize> = batches
        .iter()
        .enumerate()
        .flat_map(|(i, b)| b.nodes.iter().map(move |&n| (n, i)))
        .collect();

    let mut fence_of_pair: FxHashMap<(usize, usize), FenceId> = FxHashMap::default();
    let mut next_fence = 0u32;
    let mut signal_value: FxHashMap<usize, u64> = FxHashMap::default();

    let mut waits: Vec<Vec<FenceWait>> = vec![Vec::new(); batches.len()];
    let mut signals: Vec<Vec<FenceSignal>> = vec![Vec::new(); batches.len()];

    for transition in transitions {
        let Some(before_node) = transition.before_node else {
            continue;
        };
        let (Some(&producer_batch), Some(&consumer_batch)) =
            (batch_of.get(&before_node), batch_of.get(&transition.after_node))
        else {
            continue;
        };
        if producer_batch == consumer_batch {
            continue;
        }
        if batches[producer_batch].queue == batches[consumer_batch].queue {
            continue; // same queue, same batch chain: program order already guarantees visibility
        }

        let fence = *fence_of_pair
            .entry((producer_batch, consumer_batch))
            .or_insert_with(|| {
                let id = FenceId(next_fence);
                next_fence += 1;
                id
            });

        let value = *signal_value
            .entry(producer_batch)
            .and_modify(|v| *v += 1)
            .or_insert(1);

        if !signals[producer_batch].iter().any(|s| s.fence == fence && s.value == value) {
            signals[producer_batch].push(FenceSignal { fence, value });
        }
        if !waits[consumer_batch].iter().any(|w| w.fence == fence && w.value >= value) {
            waits[consumer_batch].retain(|w| w.fence != fence);
            waits[consumer_batch].push(FenceWait { fence, value });
        }
    }

    FencePlan {
        waits,
        signals,
        fence_count: next_fence,
    }
}
