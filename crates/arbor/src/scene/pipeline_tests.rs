//! Whole-frame tests: update, cull and draw over small scenes

use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;

use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::foundation::math::Vec3;
use crate::physics::NullPhysicsSystem;
use crate::platform::InputState;
use crate::render::{
    aabb_render_technique, debug_render_technique, shadow_texture_name, Mesh, PipelineState, PrimitiveType,
    RenderCommand, ShadowMap, TechniqueOptions, MAX_LIGHTS,
};
use crate::resources::{MemoryResourceSystem, ResourceError, ResourceKind, ResourceManager};
use crate::scene::{
    Aabb, AlwaysPassCuller, Camera, Light, Node, NodeGraph, NodeKey, Projection, Scene, SceneError, SceneManager,
    SharedShadower, NUM_CASCADES,
};
use crate::testing::RecordingRenderSystem;

fn cube_mesh() -> Arc<Mesh> {
    let mut positions = Vec::new();
    for &x in &[-1.0, 1.0] {
        for &y in &[-1.0, 1.0] {
            for &z in &[-1.0, 1.0] {
                positions.push([x, y, z]);
            }
        }
    }
    Arc::new(Mesh::new("cube", PrimitiveType::Triangles, positions, vec![0, 1, 2, 1, 3, 2]))
}

fn resources() -> ResourceManager {
    let system = MemoryResourceSystem::new()
        .with(ResourceKind::State, "phong-z", "(program_name: \"depth\", color_mask: false)")
        .with(ResourceKind::State, "shadow", "(program_name: \"shadow\")")
        .with(ResourceKind::State, "aabb", "(program_name: \"lines\", depth_write: false)");
    ResourceManager::new(Box::new(system))
}

fn main_camera(render: &mut RecordingRenderSystem) -> Camera {
    let mut camera = Camera::new("main", Projection::Perspective, render).unwrap();
    camera.set_viewport([0.0, 0.0, 800.0, 600.0]);
    camera.set_vertical_fov(60.0);
    camera.set_clip_distance(1.0, 100.0);
    camera
}

/// A scene with a camera at z = 10 looking down -z
fn scene_with_camera(render: &mut RecordingRenderSystem) -> Scene {
    let mut scene = Scene::new("test");
    let root = scene.root();
    let mount = scene.add_camera(root, main_camera(render)).unwrap();
    scene.graph_mut().translate(mount, &Vec3::new(0.0, 0.0, 10.0)).unwrap();
    scene
}

fn add_drawable(graph: &mut NodeGraph, parent: NodeKey, name: &str, mesh: &Arc<Mesh>, state: &Arc<PipelineState>) -> NodeKey {
    let key = graph.create(name);
    graph.set_mesh(key, Some(Arc::clone(mesh))).unwrap();
    graph.get_mut(key).unwrap().set_state(Some(Arc::clone(state)));
    graph.add_child(parent, key).unwrap();
    key
}

fn run_frame(scene: &mut Scene) {
    scene.update(0.016, &mut NullPhysicsSystem::new(), &InputState::default());
    scene.cull([800.0, 600.0]);
}

fn draw(scene: &mut Scene, render: &RecordingRenderSystem, resources: &mut ResourceManager) -> Result<Vec<RenderCommand>, SceneError> {
    let mut commands = Vec::new();
    scene.draw(render, resources, &mut commands)?;
    Ok(commands)
}

fn bound_state_names(commands: &[RenderCommand]) -> Vec<String> {
    commands
        .iter()
        .filter_map(|c| match c {
            RenderCommand::BindState(state) => Some(state.name.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_visible_node_lands_in_one_bucket() {
    let mut render = RecordingRenderSystem::new();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    let cube = add_drawable(scene.graph_mut(), root, "cube", &cube_mesh(), &phong);

    run_frame(&mut scene);

    let camera = scene.camera("main").unwrap();
    assert_eq!(camera.state_buckets().len(), 1);
    assert_eq!(camera.state_buckets()["phong"].nodes, vec![cube]);
    assert_eq!(camera.visible_opaque_nodes(), &[cube]);
}

#[test]
fn test_node_behind_camera_is_culled() {
    let mut render = RecordingRenderSystem::new();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    let behind = add_drawable(scene.graph_mut(), root, "behind", &cube_mesh(), &phong);
    scene.graph_mut().translate(behind, &Vec3::new(0.0, 0.0, 50.0)).unwrap();

    run_frame(&mut scene);

    assert!(scene.camera("main").unwrap().state_buckets().is_empty());
}

#[test]
fn test_culled_parent_prunes_visible_children() {
    let mut render = RecordingRenderSystem::new();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));

    let group = scene.graph_mut().create("group");
    scene.graph_mut().add_child(root, group).unwrap();
    scene
        .graph_mut()
        .get_mut(group)
        .unwrap()
        .set_bounds_callback(Some(Arc::new(|_: &Node| Aabb::new(Vec3::repeat(500.0), Vec3::repeat(501.0)))));
    let inner = add_drawable(scene.graph_mut(), group, "inner", &cube_mesh(), &phong);

    run_frame(&mut scene);

    assert!(scene.camera("main").unwrap().state_buckets().is_empty());
    // the child itself is in view
    let frustum = *scene.camera("main").unwrap().frustum();
    assert!(scene.graph().get(inner).unwrap().world_bounds().in_frustum(&frustum));
}

#[test]
fn test_inactive_subtree_is_skipped() {
    let mut render = RecordingRenderSystem::new();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    let group = scene.graph_mut().create("group");
    scene.graph_mut().add_child(root, group).unwrap();
    add_drawable(scene.graph_mut(), group, "inner", &cube_mesh(), &phong);
    scene.graph_mut().get_mut(group).unwrap().set_active(false);

    run_frame(&mut scene);

    assert!(scene.camera("main").unwrap().state_buckets().is_empty());
}

#[test]
fn test_technique_pass_order() {
    let mut render = RecordingRenderSystem::new();
    let mut resources = resources();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let mesh = cube_mesh();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    let glass = Arc::new(PipelineState::new("glass", "phong").with_blending());
    add_drawable(scene.graph_mut(), root, "cube", &mesh, &phong);
    add_drawable(scene.graph_mut(), root, "window", &mesh, &glass);

    run_frame(&mut scene);
    let commands = draw(&mut scene, &render, &mut resources).unwrap();

    let kinds: Vec<_> = commands.iter().map(RenderCommand::kind).collect();
    assert_eq!(&kinds[..4], &["UpdateUniformBuffer", "SetFramebuffer", "SetViewport", "Clear"]);
    assert_eq!(bound_state_names(&commands), vec!["phong-z", "phong", "glass"]);

    let draws = kinds.iter().filter(|&&k| k == "DrawInstanced").count();
    assert_eq!(draws, 3);
}

#[test]
fn test_identical_nodes_share_one_instanced_draw() {
    let mut render = RecordingRenderSystem::new();
    let mut resources = resources();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let mesh = cube_mesh();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    let left = add_drawable(scene.graph_mut(), root, "left", &mesh, &phong);
    let right = add_drawable(scene.graph_mut(), root, "right", &mesh, &phong);
    scene.graph_mut().translate(left, &Vec3::new(-2.0, 0.0, 0.0)).unwrap();
    scene.graph_mut().translate(right, &Vec3::new(2.0, 0.0, 0.0)).unwrap();

    run_frame(&mut scene);
    let commands = draw(&mut scene, &render, &mut resources).unwrap();

    let counts: Vec<usize> = commands
        .iter()
        .filter_map(|c| match c {
            RenderCommand::DrawInstanced { instance_count, .. } => Some(*instance_count),
            _ => None,
        })
        .collect();
    // z pre-pass and opaque pass
    assert_eq!(counts, vec![2, 2]);
}

#[test]
fn test_missing_state_fails_the_frame() {
    let mut render = RecordingRenderSystem::new();
    let mut resources = ResourceManager::new(Box::new(MemoryResourceSystem::new()));
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    add_drawable(scene.graph_mut(), root, "cube", &cube_mesh(), &phong);

    run_frame(&mut scene);
    let result = draw(&mut scene, &render, &mut resources);

    assert_eq!(
        result.unwrap_err(),
        SceneError::Resource(ResourceError::NotFound {
            kind: ResourceKind::State,
            name: "phong-z".to_string(),
        })
    );
}

#[test]
fn test_lights_over_the_cap_are_dropped() {
    let mut render = RecordingRenderSystem::new();
    let mut resources = resources();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    for i in 0..MAX_LIGHTS + 4 {
        let light = scene.graph_mut().create(format!("light{i}"));
        scene.graph_mut().set_light(light, Some(Light::new([1.0; 4]))).unwrap();
        scene.graph_mut().add_child(root, light).unwrap();
    }

    run_frame(&mut scene);
    assert_eq!(scene.lights().len(), MAX_LIGHTS + 4);

    draw(&mut scene, &render, &mut resources).unwrap();
    let block = scene.camera("main").unwrap().constants().block();
    assert_eq!(block.light_count, [MAX_LIGHTS as f32; 4]);
}

#[test]
fn test_light_position_follows_its_node() {
    let mut render = RecordingRenderSystem::new();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let light = scene.graph_mut().create("sun");
    scene.graph_mut().set_light(light, Some(Light::new([1.0; 4]))).unwrap();
    scene.graph_mut().add_child(root, light).unwrap();
    scene.graph_mut().translate(light, &Vec3::new(3.0, 4.0, 5.0)).unwrap();

    run_frame(&mut scene);

    let block = scene.graph().get(light).unwrap().light().unwrap().block;
    assert_eq!(&block.position[..3], &[3.0, 4.0, 5.0]);
}

#[test]
fn test_shadow_pass_renders_every_cascade() {
    let mut render = RecordingRenderSystem::new();
    let mut resources = resources();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    let cube = add_drawable(scene.graph_mut(), root, "cube", &cube_mesh(), &phong);

    let shadow_map = ShadowMap::new(256, &mut render).unwrap();
    let shadower: SharedShadower = Arc::new(Mutex::new(shadow_map));
    let light = scene.graph_mut().create("sun");
    scene
        .graph_mut()
        .set_light(light, Some(Light::new([1.0; 4]).with_shadower(shadower)))
        .unwrap();
    scene.graph_mut().add_child(root, light).unwrap();
    scene.graph_mut().translate(light, &Vec3::new(10.0, 20.0, 10.0)).unwrap();

    run_frame(&mut scene);
    let commands = draw(&mut scene, &render, &mut resources).unwrap();

    let states = bound_state_names(&commands);
    assert_eq!(&states[..NUM_CASCADES], &["shadow", "shadow", "shadow"]);
    assert_eq!(&states[NUM_CASCADES..], &["phong-z", "phong"]);

    let material = scene.graph().get(cube).unwrap().material_data();
    for cascade in 0..NUM_CASCADES {
        assert!(material.texture(&shadow_texture_name(cascade)).is_some());
    }

    let block = scene.graph().get(light).unwrap().light().unwrap().block;
    assert_relative_eq!(block.z_cuts[NUM_CASCADES - 1][0], 100.0);
    assert!(block.z_cuts[0][0] < block.z_cuts[1][0]);
}

#[test]
fn test_auto_frustum_fits_scene_bounds() {
    let mut render = RecordingRenderSystem::new();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    add_drawable(scene.graph_mut(), root, "cube", &cube_mesh(), &phong);
    scene.camera_mut("main").unwrap().set_auto_frustum(true);

    run_frame(&mut scene);

    let radius = 12f64.sqrt() / 2.0;
    let clip = scene.camera("main").unwrap().clip_distance();
    assert_relative_eq!(clip.x, 10.0 - radius, epsilon = 1e-9);
    assert_relative_eq!(clip.y, 10.0 + radius, epsilon = 1e-9);
}

#[test]
fn test_cameras_run_in_render_order() {
    let mut render = RecordingRenderSystem::new();
    let mut scene = Scene::new("ordered");
    let root = scene.root();

    let mut overlay = Camera::new("overlay", Projection::Orthographic, &mut render).unwrap();
    overlay.set_render_order(2);
    scene.add_camera(root, overlay).unwrap();
    scene.add_camera(root, main_camera(&mut render)).unwrap();

    let names: Vec<_> = scene.cameras().iter().map(Camera::name).collect();
    assert_eq!(names, vec!["main", "overlay"]);
    assert_eq!(scene.camera("main").unwrap().scene_root(), Some(root));
}

#[test]
fn test_manager_updates_front_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut manager = SceneManager::new();

    for name in ["first", "second", "third"] {
        let mut scene = Scene::new(name);
        let root = scene.root();
        let log = Arc::clone(&order);
        scene
            .graph_mut()
            .get_mut(root)
            .unwrap()
            .set_update_component(Some(Arc::new(move |_: &mut NodeGraph, _: NodeKey, _: f64| {
                log.lock().unwrap().push(name);
            })));
        manager.push_scene(scene);
    }
    manager.front_scene_mut().unwrap().set_active(false);

    manager.update(0.016, &mut NullPhysicsSystem::new(), &InputState::default());

    assert_eq!(*order.lock().unwrap(), vec!["second", "first"]);
}

#[test]
fn test_run_frame_reports_failed_commands() {
    let mut camera_render = RecordingRenderSystem::new();
    let mut scene = scene_with_camera(&mut camera_render);
    scene.camera_mut("main").unwrap().set_auto_reshape(true);
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    add_drawable(scene.graph_mut(), root, "cube", &cube_mesh(), &phong);

    let mut render = RecordingRenderSystem::new();
    render.reject_kind("Clear");
    let system = MemoryResourceSystem::new().with(ResourceKind::State, "phong-z", "(program_name: \"depth\")");
    let mut ctx = EngineContext::headless(Box::new(render), Box::new(system), EngineConfig::default());

    let mut manager = SceneManager::new();
    manager.push_scene(scene);

    assert_eq!(manager.run_frame(&mut ctx, 1.0 / 60.0), Ok(1));
    let camera = manager.front_scene().unwrap().camera("main").unwrap();
    assert_eq!(camera.viewport(), [0.0, 0.0, 1280.0, 720.0]);
}

#[test]
fn test_always_pass_subtree_ignores_the_frustum() {
    let mut render = RecordingRenderSystem::new();
    let mut scene = scene_with_camera(&mut render);
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    let overlay = add_drawable(scene.graph_mut(), root, "overlay", &cube_mesh(), &phong);
    scene.graph_mut().translate(overlay, &Vec3::new(0.0, 0.0, 50.0)).unwrap();
    scene.graph_mut().get_mut(overlay).unwrap().set_cull_component(Some(Arc::new(AlwaysPassCuller)));
    let badge = add_drawable(scene.graph_mut(), overlay, "badge", &cube_mesh(), &phong);
    scene.graph_mut().get_mut(badge).unwrap().set_cull_component(Some(Arc::new(AlwaysPassCuller)));

    run_frame(&mut scene);

    let camera = scene.camera("main").unwrap();
    let frustum = *camera.frustum();
    assert!(!scene.graph().get(overlay).unwrap().world_bounds().in_frustum(&frustum));
    assert_eq!(camera.state_buckets()["phong"].nodes, vec![overlay, badge]);
}

fn blending_instance_depths(sort_back_to_front: bool) -> Vec<f32> {
    let mut render = RecordingRenderSystem::new();
    let mut resources = resources();
    let mut scene = scene_with_camera(&mut render);
    scene.camera_mut("main").unwrap().set_technique_options(TechniqueOptions {
        sort_transparent_back_to_front: sort_back_to_front,
    });
    let root = scene.root();
    let mesh = cube_mesh();
    let glass = Arc::new(PipelineState::new("glass", "phong").with_blending());
    let near = add_drawable(scene.graph_mut(), root, "near", &mesh, &glass);
    let far = add_drawable(scene.graph_mut(), root, "far", &mesh, &glass);
    scene.graph_mut().translate(near, &Vec3::new(0.0, 0.0, 2.0)).unwrap();
    scene.graph_mut().translate(far, &Vec3::new(0.0, 0.0, -20.0)).unwrap();

    run_frame(&mut scene);
    let commands = draw(&mut scene, &render, &mut resources).unwrap();

    commands
        .iter()
        .filter_map(|c| match c {
            RenderCommand::DrawInstanced { instances, .. } => Some(instances.iter().map(|i| i.model[3][2]).collect::<Vec<_>>()),
            _ => None,
        })
        .flatten()
        .collect()
}

#[test]
fn test_blending_pass_keeps_bucket_order_by_default() {
    assert_eq!(blending_instance_depths(false), vec![2.0, -20.0]);
}

#[test]
fn test_blending_pass_sorts_back_to_front_when_enabled() {
    assert_eq!(blending_instance_depths(true), vec![-20.0, 2.0]);
}

#[test]
fn test_aabb_technique_draws_world_bounds() {
    let mut render = RecordingRenderSystem::new();
    let mut resources = resources();
    let mut scene = scene_with_camera(&mut render);
    scene.camera_mut("main").unwrap().set_render_technique(Some(aabb_render_technique));
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    let cube = add_drawable(scene.graph_mut(), root, "cube", &cube_mesh(), &phong);
    scene.graph_mut().translate(cube, &Vec3::new(3.0, 0.0, 0.0)).unwrap();

    run_frame(&mut scene);
    let commands = draw(&mut scene, &render, &mut resources).unwrap();

    assert_eq!(bound_state_names(&commands), vec!["aabb"]);
    let instances: Vec<_> = commands
        .iter()
        .filter_map(|c| match c {
            RenderCommand::DrawInstanced { mesh, instances, .. } => {
                assert_eq!(mesh.name(), "AABB");
                Some(instances.clone())
            }
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(instances.len(), 1);
    // unit cube scaled to the 2x2x2 bounds, centred on the node
    assert_eq!(instances[0].model[0][0], 2.0);
    assert_eq!(instances[0].model[3][0], 3.0);
}

#[test]
fn test_debug_technique_appends_bounds_after_shading() {
    let mut render = RecordingRenderSystem::new();
    let mut resources = resources();
    let mut scene = scene_with_camera(&mut render);
    scene.camera_mut("main").unwrap().set_render_technique(Some(debug_render_technique));
    let root = scene.root();
    let phong = Arc::new(PipelineState::new("phong", "phong"));
    add_drawable(scene.graph_mut(), root, "cube", &cube_mesh(), &phong);

    run_frame(&mut scene);
    let commands = draw(&mut scene, &render, &mut resources).unwrap();

    assert_eq!(bound_state_names(&commands), vec!["phong-z", "phong", "aabb"]);
    let draws = commands.iter().filter(|c| c.kind() == "DrawInstanced").count();
    assert_eq!(draws, 3);
}
