//! # Render Techniques
//!
//! A technique is the pass structure a camera renders its buckets with. It is
//! a plain function so cameras can swap it per frame (post-processing quads,
//! debug overlays) without any trait objects.

use std::sync::Arc;

use crate::foundation::math::{utils, Mat4};
use crate::render::{
    render_batched_nodes, CommandSink, InstanceData, RenderCommand, RenderSystem, MAX_INSTANCES,
};
use crate::resources::{ResourceError, ResourceManager};
use crate::scene::{sort_by_camera_distance, Camera, NodeGraph};

/// Name of the uniform block every pass binds the camera constants to
pub const CAMERA_CONSTANTS_BLOCK: &str = "cameraConstants";

/// Per-pass tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TechniqueOptions {
    /// Sort the blending pass far to near before batching
    pub sort_transparent_back_to_front: bool,
}

/// Everything a technique may touch while recording one camera
pub struct RenderContext<'a> {
    /// Camera being rendered, buckets already filled and sorted
    pub camera: &'a Camera,
    /// Graph the camera's buckets point into
    pub graph: &'a NodeGraph,
    /// Backend, for the batching policy
    pub render: &'a dyn RenderSystem,
    /// Pipeline state lookups
    pub resources: &'a mut ResourceManager,
    /// Command destination
    pub sink: &'a mut dyn CommandSink,
}

/// Technique entry point
pub type RenderTechniqueFn = fn(&mut RenderContext<'_>) -> Result<(), ResourceError>;

/// Z pre-pass, opaque pass, then blending pass
///
/// Buckets are visited in state-name order in every pass. The z pre-pass
/// binds the `<state>-z` variant of each opaque bucket's state.
pub fn default_render_technique(ctx: &mut RenderContext<'_>) -> Result<(), ResourceError> {
    let camera = ctx.camera;
    ctx.sink.submit(RenderCommand::SetFramebuffer(camera.framebuffer()));
    ctx.sink.submit(RenderCommand::SetViewport(camera.viewport()));
    ctx.sink.submit(RenderCommand::Clear {
        mode: camera.clear_mode(),
        color: camera.clear_color(),
        depth: camera.clear_depth(),
    });

    for bucket in camera.state_buckets().values() {
        if bucket.nodes.is_empty() || bucket.state.blending {
            continue;
        }
        let z_state = ctx.resources.state(&bucket.state.z_pass_name())?;
        ctx.sink.submit(RenderCommand::BindState(z_state));
        bind_camera_constants(ctx);
        render_batched_nodes(camera, ctx.graph, ctx.render, &bucket.nodes, ctx.sink);
    }

    for bucket in camera.state_buckets().values() {
        if bucket.nodes.is_empty() || bucket.state.blending {
            continue;
        }
        ctx.sink.submit(RenderCommand::BindState(bucket.state.clone()));
        bind_camera_constants(ctx);
        render_batched_nodes(camera, ctx.graph, ctx.render, &bucket.nodes, ctx.sink);
    }

    for bucket in camera.state_buckets().values() {
        if bucket.nodes.is_empty() || !bucket.state.blending {
            continue;
        }
        ctx.sink.submit(RenderCommand::BindState(bucket.state.clone()));
        bind_camera_constants(ctx);

        if camera.technique_options().sort_transparent_back_to_front {
            let mut nodes = bucket.nodes.clone();
            sort_by_camera_distance(ctx.graph, &mut nodes, &camera.position(ctx.graph));
            nodes.reverse();
            render_batched_nodes(camera, ctx.graph, ctx.render, &nodes, ctx.sink);
        } else {
            render_batched_nodes(camera, ctx.graph, ctx.render, &bucket.nodes, ctx.sink);
        }
    }

    Ok(())
}

/// Draw the world bounds of every bucketed node as line cubes
pub fn aabb_render_technique(ctx: &mut RenderContext<'_>) -> Result<(), ResourceError> {
    let camera = ctx.camera;
    let state = ctx.resources.state("aabb")?;
    let mesh = ctx.resources.aabb_mesh();
    ctx.sink.submit(RenderCommand::BindState(state));
    bind_camera_constants(ctx);

    let view_projection = camera.projection_matrix() * camera.view_matrix();
    for bucket in camera.state_buckets().values() {
        let nodes: Vec<_> = bucket.nodes.iter().filter_map(|&key| ctx.graph.get(key)).collect();
        for chunk in nodes.chunks(MAX_INSTANCES) {
            let instances: Vec<InstanceData> = chunk
                .iter()
                .map(|node| {
                    let bounds = node.world_bounds();
                    let size = bounds.size();
                    let model = Mat4::new_translation(&bounds.center()) * Mat4::new_nonuniform_scaling(&size);
                    InstanceData {
                        model: utils::mat4_to_gpu(&model),
                        model_view_projection: utils::mat4_to_gpu(&(view_projection * model)),
                        custom: [[0.0; 4]; 4],
                    }
                })
                .collect();

            ctx.sink.submit(RenderCommand::DrawInstanced {
                mesh: Arc::clone(&mesh),
                instance_count: instances.len(),
                instances,
            });
        }
    }

    Ok(())
}

/// Default technique followed by bounding boxes
pub fn debug_render_technique(ctx: &mut RenderContext<'_>) -> Result<(), ResourceError> {
    default_render_technique(ctx)?;
    aabb_render_technique(ctx)
}

fn bind_camera_constants(ctx: &mut RenderContext<'_>) {
    ctx.sink.submit(RenderCommand::BindUniformBuffer {
        name: CAMERA_CONSTANTS_BLOCK.to_string(),
        buffer: ctx.camera.constants().buffer(),
    });
}
