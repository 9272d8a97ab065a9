//! Cascaded shadow maps
//!
//! [`ShadowMap`] renders one orthographic depth pass per camera cascade. The
//! light is treated as directional: it has no orientation, its position only
//! defines a view ray looking at the world origin with +Y up.

use crate::foundation::math::{utils, Mat4, Vec3, Vec4};
use crate::render::{
    render_batched_nodes, CommandSink, FramebufferHandle, RenderCommand, RenderError, RenderSystem,
    TextureDescriptor, TextureHandle, CAMERA_CONSTANTS_BLOCK,
};
use crate::resources::{ResourceError, ResourceManager};
use crate::scene::{Camera, LightBlock, NodeGraph, Projection, Shadower, NUM_CASCADES};

/// Sampler name a cascade's shadow texture is bound under
pub fn shadow_texture_name(cascade: usize) -> String {
    format!("shadowTex{cascade}")
}

/// Maps clip space `[-1, 1]` to texture space `[0, 1]`
fn bias_matrix() -> Mat4 {
    Mat4::from_columns(&[
        Vec4::new(0.5, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 0.5, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 0.5, 0.0),
        Vec4::new(0.5, 0.5, 0.5, 1.0),
    ])
}

/// Cascaded shadow map shadower
pub struct ShadowMap {
    size: u32,
    cameras: Vec<Camera>,
    framebuffers: Vec<FramebufferHandle>,
    textures: Vec<TextureHandle>,
}

impl ShadowMap {
    /// Allocate one framebuffer, RG32F texture and orthographic camera per cascade
    pub fn new(size: u32, render: &mut dyn RenderSystem) -> Result<Self, RenderError> {
        let mut cameras = Vec::with_capacity(NUM_CASCADES);
        let mut framebuffers = Vec::with_capacity(NUM_CASCADES);
        let mut textures = Vec::with_capacity(NUM_CASCADES);

        for _ in 0..NUM_CASCADES {
            let framebuffer = render.new_framebuffer()?;
            let texture = render.new_texture(&TextureDescriptor::shadow_target(size), None)?;
            render.set_color_attachment(framebuffer, 0, texture)?;

            let mut camera = Camera::new("ShadowCamera", Projection::Orthographic, render)?;
            camera.set_framebuffer(Some(framebuffer));
            camera.set_viewport([0.0, 0.0, size as f32, size as f32]);
            camera.set_auto_reshape(false);
            camera.set_render_technique(None);

            cameras.push(camera);
            framebuffers.push(framebuffer);
            textures.push(texture);
        }

        log::debug!("Created {}x{} shadow map with {} cascades", size, size, NUM_CASCADES);
        Ok(Self {
            size,
            cameras,
            framebuffers,
            textures,
        })
    }

    /// Shadow map resolution in texels
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Orthographic camera used for a cascade
    pub fn cascade_camera(&self, cascade: usize) -> &Camera {
        &self.cameras[cascade]
    }

    /// Release the backend resources
    pub fn destroy(self, render: &mut dyn RenderSystem) {
        for texture in self.textures {
            render.destroy_texture(texture);
        }
        for framebuffer in self.framebuffers {
            render.destroy_framebuffer(framebuffer);
        }
    }

    /// Texel-snapped light-space projection for a light-space box
    ///
    /// Flooring the extents to whole texels keeps shadow edges from
    /// shimmering as the camera moves.
    pub fn snapped_projection(&self, min: &Vec3, max: &Vec3) -> Mat4 {
        let units_per_texel = (max - min) / f64::from(self.size);
        let snap = |v: f64, unit: f64| (v / unit).floor() * unit;

        utils::orthographic(
            snap(min.x, units_per_texel.x),
            snap(max.x, units_per_texel.x),
            snap(min.y, units_per_texel.y),
            snap(max.y, units_per_texel.y),
            -max.z,
            -min.z,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn render_cascade(
        &mut self,
        cascade: usize,
        block: &mut LightBlock,
        camera: &Camera,
        graph: &mut NodeGraph,
        render: &dyn RenderSystem,
        resources: &mut ResourceManager,
        sink: &mut dyn CommandSink,
    ) -> Result<(), ResourceError> {
        let light_position = Vec3::new(
            f64::from(block.position[0]),
            f64::from(block.position[1]),
            f64::from(block.position[2]),
        );
        let view = utils::look_at(&light_position, &Vec3::zeros(), &Vec3::y());

        let light_bounds = camera.cascade_aabb(cascade).transformed(&view);
        let projection = self.snapped_projection(&light_bounds.min(), &light_bounds.max());
        let bias_view_projection = bias_matrix() * projection * view;

        block.z_cuts[cascade] = [camera.cascade_z_cut(cascade) as f32, 0.0, 0.0, 0.0];
        block.vp_matrix[cascade] = utils::mat4_to_gpu(&bias_view_projection);

        let shadow_camera = &mut self.cameras[cascade];
        shadow_camera.set_view_matrix(view);
        shadow_camera.set_projection_matrix(projection);
        shadow_camera.constants_mut().set_data(&projection, &view, &[], sink);

        sink.submit(RenderCommand::SetFramebuffer(shadow_camera.framebuffer()));
        sink.submit(RenderCommand::SetViewport(shadow_camera.viewport()));
        sink.submit(RenderCommand::Clear {
            mode: shadow_camera.clear_mode(),
            color: shadow_camera.clear_color(),
            depth: shadow_camera.clear_depth(),
        });

        let texture_name = shadow_texture_name(cascade);
        for bucket in camera.state_buckets().values() {
            if bucket.state.blending {
                continue;
            }

            for &key in &bucket.nodes {
                if let Some(node) = graph.get_mut(key) {
                    node.material_data_mut().set_texture(texture_name.clone(), self.textures[cascade]);
                }
            }

            sink.submit(RenderCommand::BindState(resources.state("shadow")?));
            sink.submit(RenderCommand::BindUniformBuffer {
                name: CAMERA_CONSTANTS_BLOCK.to_string(),
                buffer: shadow_camera.constants().buffer(),
            });
            render_batched_nodes(shadow_camera, graph, render, &bucket.nodes, sink);
        }

        Ok(())
    }
}

impl Shadower for ShadowMap {
    fn textures(&self) -> &[TextureHandle] {
        &self.textures
    }

    fn render(
        &mut self,
        block: &mut LightBlock,
        camera: &Camera,
        graph: &mut NodeGraph,
        render: &dyn RenderSystem,
        resources: &mut ResourceManager,
        sink: &mut dyn CommandSink,
    ) -> Result<(), ResourceError> {
        for cascade in 0..NUM_CASCADES {
            self.render_cascade(cascade, block, camera, graph, render, resources, sink)?;
        }
        Ok(())
    }
}
