//! # Batching
//!
//! Turns a sorted list of drawables into instanced draws. Batching never
//! reorders: it only merges neighbours, so the bucket sort performed during
//! cull is what puts compatible drawables next to each other.
//!
//! - [`partition_batches`]: split a list into maximal runs of batchable neighbours
//! - [`render_batch`]: one `BindDescriptors` plus `DrawInstanced` per
//!   [`MAX_INSTANCES`] drawables of a run
//! - [`render_batched_nodes`]: both of the above with the backend's policy

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{utils, GpuMat4, GpuVec4};
use crate::render::{CommandSink, RenderCommand, RenderSystem};
use crate::scene::{Camera, NodeGraph, NodeKey};

/// Maximum instances submitted by a single draw
pub const MAX_INSTANCES: usize = 2000;

/// Per-instance record uploaded with an instanced draw
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// Object to world
    pub model: GpuMat4,
    /// Object to clip, for the camera issuing the draw
    pub model_view_projection: GpuMat4,
    /// Custom slots copied from the node's material data
    pub custom: [GpuVec4; 4],
}

/// Split `items` into maximal contiguous runs of batchable neighbours
///
/// `can_batch(prev, next)` is asked for every adjacent pair. The runs cover
/// `items` in order; an empty input yields no runs.
pub fn partition_batches<T, F>(items: &[T], mut can_batch: F) -> Vec<Range<usize>>
where
    F: FnMut(&T, &T) -> bool,
{
    let mut batches = Vec::new();
    if items.is_empty() {
        return batches;
    }

    let mut start = 0;
    for i in 1..items.len() {
        if !can_batch(&items[i - 1], &items[i]) {
            batches.push(start..i);
            start = i;
        }
    }
    batches.push(start..items.len());
    batches
}

/// Emit the draws for one batch of drawables
///
/// Nodes without a mesh are skipped. The first drawable's descriptors and
/// mesh are used for the whole batch.
pub fn render_batch(camera: &Camera, graph: &NodeGraph, nodes: &[NodeKey], sink: &mut dyn CommandSink) {
    let view_projection = camera.projection_matrix() * camera.view_matrix();
    let drawables: Vec<_> = nodes
        .iter()
        .filter_map(|&key| graph.get(key))
        .filter(|node| node.mesh().is_some())
        .collect();

    for chunk in drawables.chunks(MAX_INSTANCES) {
        let first = chunk[0];
        let Some(mesh) = first.mesh() else { continue };

        let instances: Vec<InstanceData> = chunk
            .iter()
            .map(|node| {
                let model = node.world_transform();
                InstanceData {
                    model: utils::mat4_to_gpu(model),
                    model_view_projection: utils::mat4_to_gpu(&(view_projection * model)),
                    custom: *node.material_data().customs(),
                }
            })
            .collect();

        sink.submit(RenderCommand::BindDescriptors(first.material_data().clone()));
        sink.submit(RenderCommand::DrawInstanced {
            mesh: mesh.clone(),
            instance_count: instances.len(),
            instances,
        });
    }
}

/// Batch an already sorted node list using the backend's batching policy
pub fn render_batched_nodes(
    camera: &Camera,
    graph: &NodeGraph,
    render: &dyn RenderSystem,
    nodes: &[NodeKey],
    sink: &mut dyn CommandSink,
) {
    let batches = partition_batches(nodes, |&a, &b| match (graph.get(a), graph.get(b)) {
        (Some(a), Some(b)) => render.can_batch(a.material_data(), b.material_data()),
        _ => false,
    });

    log::trace!("{} drawables in {} batches", nodes.len(), batches.len());
    for range in batches {
        render_batch(camera, graph, &nodes[range], sink);
    }
}
