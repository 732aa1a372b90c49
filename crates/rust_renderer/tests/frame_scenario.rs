//! Frame-level tests driving the renderer through the recording context

use std::cell::RefCell;
use std::rc::Rc;

use rust_renderer::foundation::logging;
use rust_renderer::prelude::*;
use rust_renderer::render::chunker::GroupKind;
use rust_renderer::render::gpu::{BufferTarget, ClearFlags, GpuCapabilities, GpuCommand, PrimitiveMode};
use rust_renderer::render::plugin::PluginFrame;
use rust_renderer::render::registry::RegistrationState;
use rust_renderer::scene::node::LineMode;

fn renderer() -> Renderer<RecordingContext> {
    logging::try_init_for_tests();
    let mut renderer = Renderer::new(RecordingContext::new(), RendererConfig::default()).unwrap();
    renderer.set_size(640, 480);
    renderer
}

fn camera() -> Camera {
    Camera::perspective(60.0, 640.0 / 480.0, 0.1, 100.0)
}

/// Four triangles over a 3x2 vertex grid
fn strip() -> Geometry {
    let vertices = vec![
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
    ];
    let faces = vec![
        Face::triangle(0, 1, 4),
        Face::triangle(0, 4, 3),
        Face::triangle(1, 2, 5),
        Face::triangle(1, 5, 4),
    ];
    let mut geometry = Geometry::from_parts(vertices, faces);
    geometry.compute_face_normals();
    geometry
}

fn in_front(z: f32) -> Vec3 {
    Vec3::new(0.0, 0.0, -z)
}

#[test]
fn test_single_mesh_frame() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let geometry = strip().into_shared();
    let geometry_id = geometry.borrow().id();
    let node = scene.add(
        SceneNode::mesh(geometry.clone(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)),
    );
    renderer.context_mut().clear_commands();

    renderer.render(&mut scene, &mut camera, None, false).unwrap();

    let buffers = renderer.registry().geometry((geometry_id, GroupKind::Faces)).unwrap();
    assert_eq!(buffers.groups.len(), 1);
    assert_eq!(buffers.groups[0].face_count(), 4);

    // positions, normals, triangle indices, wireframe indices
    assert_eq!(renderer.context().buffer_uploads(), 4);
    assert_eq!(
        renderer.context().draw_calls(),
        vec![&GpuCommand::DrawElements { mode: PrimitiveMode::Triangles, count: 12, offset: 0 }]
    );

    let info = renderer.info();
    assert_eq!(info.render.calls, 1);
    assert_eq!(info.render.faces, 4);
    assert_eq!(info.render.vertices, 12);
    assert_eq!(info.memory.programs, 1);
    assert_eq!(info.memory.geometries, 1);

    let object_id = scene.get(node).unwrap().object_id().unwrap();
    assert_eq!(renderer.registry().state(object_id), RegistrationState::Active);
}

#[test]
fn test_clean_geometry_is_not_uploaded_again() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let geometry = strip().into_shared();
    scene.add(SceneNode::mesh(geometry.clone(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)));

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    renderer.context_mut().clear_commands();
    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(renderer.context().buffer_uploads(), 0);
    assert_eq!(renderer.context().draw_calls().len(), 1);

    geometry.borrow_mut().vertices_mut()[0].y = -0.5;
    renderer.context_mut().clear_commands();
    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert!(renderer.context().buffer_uploads() >= 1);
    let index_uploads = renderer
        .context()
        .count(|c| matches!(c, GpuCommand::UploadBuffer { target: BufferTarget::ElementArray, .. }));
    assert_eq!(index_uploads, 0);
}

#[test]
fn test_equal_materials_share_one_program() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let geometry = strip().into_shared();
    let first = Material::basic(Color::WHITE).into_shared();
    let second = Material::basic(Color::rgb(1.0, 0.0, 0.0)).into_shared();
    let lit = Material::lambert(Color::WHITE).into_shared();
    for (i, material) in [&first, &second, &lit].into_iter().enumerate() {
        scene.add(SceneNode::mesh(geometry.clone(), material.clone()).with_position(in_front(4.0 + i as f32)));
    }

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(renderer.info().memory.programs, 2);
    assert_eq!(renderer.info().render.calls, 3);

    renderer.dispose_material(&first);
    assert_eq!(renderer.info().memory.programs, 2);
    renderer.dispose_material(&second);
    assert_eq!(renderer.info().memory.programs, 1);
}

#[test]
fn test_link_failure_skips_only_that_material() {
    let mut renderer = renderer();
    renderer.context_mut().fail_link_when("BROKEN");
    let mut scene = Scene::new();
    let mut camera = camera();
    let geometry = strip().into_shared();
    let template = Rc::new(ShaderTemplate::new("// BROKEN\nattribute vec3 position;", "void main() {}"));
    scene.add(SceneNode::mesh(geometry.clone(), Material::shader(template).into_shared()).with_position(in_front(4.0)));
    scene.add(SceneNode::mesh(geometry, Material::basic(Color::WHITE).into_shared()).with_position(in_front(6.0)));

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(renderer.context().count(|c| matches!(c, GpuCommand::LinkFailed)), 1);
    assert_eq!(renderer.context().draw_calls().len(), 1);

    renderer.context_mut().clear_commands();
    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(renderer.context().count(|c| matches!(c, GpuCommand::LinkFailed)), 0);
    assert_eq!(renderer.context().draw_calls().len(), 1);
}

#[test]
fn test_removed_node_releases_its_buffers() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let node = scene.add(
        SceneNode::mesh(strip().into_shared(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)),
    );
    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    let object_id = scene.get(node).unwrap().object_id().unwrap();

    let _removed = scene.remove(node);
    renderer.context_mut().clear_commands();
    renderer.render(&mut scene, &mut camera, None, false).unwrap();

    assert_eq!(renderer.registry().state(object_id), RegistrationState::Unregistered);
    assert_eq!(renderer.info().memory.geometries, 0);
    assert_eq!(renderer.context().count(|c| matches!(c, GpuCommand::DeleteBuffer(_))), 4);
    assert!(renderer.context().draw_calls().is_empty());
}

#[test]
fn test_structural_change_skips_the_object() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let geometry = strip().into_shared();
    scene.add(SceneNode::mesh(geometry.clone(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)));
    renderer.render(&mut scene, &mut camera, None, false).unwrap();

    {
        let mut geometry = geometry.borrow_mut();
        geometry.faces.push(Face::triangle(2, 5, 4));
        geometry.mark_dirty(DirtyFlags::ELEMENTS);
    }
    renderer.context_mut().clear_commands();
    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert!(renderer.context().draw_calls().is_empty());
}

#[test]
fn test_override_material_draws_wireframe() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    scene.add(
        SceneNode::mesh(strip().into_shared(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)),
    );
    scene.override_material = Some(Material::basic(Color::WHITE).with_wireframe(true).into_shared());

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(
        renderer.context().draw_calls(),
        vec![&GpuCommand::DrawElements { mode: PrimitiveMode::Lines, count: 24, offset: 0 }]
    );
}

#[test]
fn test_lines_and_points_draw_arrays() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let path = Geometry::from_parts(vec![in_front(5.0), in_front(6.0), in_front(7.0)], Vec::new()).into_shared();
    scene.add(SceneNode::line(path.clone(), Material::line_basic(Color::WHITE).into_shared(), LineMode::Strip));
    scene.add(SceneNode::points(path, Material::points(Color::WHITE, 2.0).into_shared()));

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    let draws = renderer.context().draw_calls();
    assert!(draws.contains(&&GpuCommand::DrawArrays { mode: PrimitiveMode::LineStrip, first: 0, count: 3 }));
    assert!(draws.contains(&&GpuCommand::DrawArrays { mode: PrimitiveMode::Points, first: 0, count: 3 }));
    assert_eq!(renderer.info().render.points, 3);
}

struct Marker {
    name: &'static str,
    first: u32,
    calls: Rc<RefCell<Vec<&'static str>>>,
}

impl RenderPlugin for Marker {
    fn name(&self) -> &str {
        self.name
    }

    fn render(&mut self, frame: &mut PluginFrame<'_>) {
        self.calls.borrow_mut().push(self.name);
        frame.ctx.draw_arrays(PrimitiveMode::Points, self.first, 1);
    }
}

#[test]
fn test_plugins_run_around_the_render_list() {
    let mut renderer = renderer();
    let calls = Rc::new(RefCell::new(Vec::new()));
    renderer.add_pre_plugin(Box::new(Marker { name: "pre", first: 100, calls: calls.clone() }));
    renderer.add_post_plugin(Box::new(Marker { name: "post", first: 200, calls: calls.clone() }));
    let mut scene = Scene::new();
    let mut camera = camera();
    scene.add(
        SceneNode::mesh(strip().into_shared(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)),
    );

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(*calls.borrow(), vec!["pre", "post"]);
    let draws = renderer.context().draw_calls();
    assert_eq!(draws.len(), 3);
    assert!(matches!(draws[0], GpuCommand::DrawArrays { first: 100, .. }));
    assert!(matches!(draws[1], GpuCommand::DrawElements { .. }));
    assert!(matches!(draws[2], GpuCommand::DrawArrays { first: 200, .. }));
}

#[test]
fn test_render_target_is_bound_and_failures_surface() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();

    let mut target = RenderTarget::new(128, 128);
    renderer.render(&mut scene, &mut camera, Some(&mut target), true).unwrap();
    assert!(renderer.context().count(|c| matches!(c, GpuCommand::BindFramebuffer(Some(_)))) >= 1);

    let mut broken = RenderTarget::new(0, 0);
    let result = renderer.render(&mut scene, &mut camera, Some(&mut broken), true);
    assert!(matches!(result, Err(RenderError::RenderTargetFailed { .. })));
}

#[test]
fn test_unusable_contexts_are_rejected() {
    let lost = Renderer::new(RecordingContext::lost(), RendererConfig::default());
    assert!(matches!(lost, Err(RenderError::InitializationFailed(_))));

    let weak = RecordingContext::with_capabilities(GpuCapabilities {
        max_vertex_attributes: 2,
        ..Default::default()
    });
    let weak = Renderer::new(weak, RendererConfig::default());
    assert!(matches!(weak, Err(RenderError::MissingCapability(_))));
}

#[test]
fn test_adding_fog_relinks_and_releases_the_old_program() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    scene.add(
        SceneNode::mesh(strip().into_shared(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)),
    );
    renderer.render(&mut scene, &mut camera, None, false).unwrap();

    scene.fog = Some(Fog::Exp2 { color: Color::BLACK, density: 0.1 });
    renderer.context_mut().clear_commands();
    renderer.render(&mut scene, &mut camera, None, false).unwrap();

    assert_eq!(renderer.context().count(|c| matches!(c, GpuCommand::CreateProgram(_))), 1);
    assert_eq!(renderer.context().count(|c| matches!(c, GpuCommand::DeleteProgram(_))), 1);
    assert_eq!(renderer.info().memory.programs, 1);
}

#[test]
fn test_surface_settings_reach_the_context() {
    let mut renderer = renderer();
    renderer.config_mut().auto_clear = false;
    let mut scene = Scene::new();
    let mut camera = camera();

    renderer.set_viewport(10, 20, 300, 200);
    renderer.set_scissor(Some((0, 0, 50, 50)));
    renderer.set_clear_color(Color::rgb(0.25, 0.5, 0.75), 0.5);
    let commands = renderer.context().commands();
    assert!(commands.contains(&GpuCommand::Viewport(10, 20, 300, 200)));
    assert!(commands.contains(&GpuCommand::Scissor(Some((0, 0, 50, 50)))));
    assert!(commands.contains(&GpuCommand::ClearColor([0.25, 0.5, 0.75, 0.5])));
    assert_eq!(renderer.viewport(), (10, 20, 300, 200));

    renderer.context_mut().clear_commands();
    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(renderer.context().count(|c| matches!(c, GpuCommand::Clear(_))), 0);

    renderer.render(&mut scene, &mut camera, None, true).unwrap();
    assert!(renderer.context().commands().contains(&GpuCommand::Clear(ClearFlags::all())));
}

#[test]
fn test_mesh_and_line_sharing_a_geometry_both_receive_edits() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let geometry = strip().into_shared();
    scene.add(SceneNode::mesh(geometry.clone(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)));
    scene.add(
        SceneNode::line(geometry.clone(), Material::line_basic(Color::WHITE).into_shared(), LineMode::Strip)
            .with_position(in_front(5.0)),
    );
    renderer.render(&mut scene, &mut camera, None, false).unwrap();

    geometry.borrow_mut().vertices_mut()[0].y = 0.5;
    renderer.context_mut().clear_commands();
    renderer.render(&mut scene, &mut camera, None, false).unwrap();

    // one position buffer per buffer set: faces and vertex stream
    let position_uploads = renderer
        .context()
        .count(|c| matches!(c, GpuCommand::UploadBuffer { target: BufferTarget::Array, .. }));
    assert_eq!(position_uploads, 2);
    assert!(geometry.borrow().dirty().is_empty());
}

#[test]
fn test_buffers_stay_bound_across_materials_sharing_a_program() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let geometry = strip().into_shared();
    scene.add(SceneNode::mesh(geometry.clone(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)));
    scene.add(
        SceneNode::mesh(geometry, Material::basic(Color::rgb(1.0, 0.0, 0.0)).into_shared())
            .with_position(in_front(5.0)),
    );
    renderer.render(&mut scene, &mut camera, None, false).unwrap();

    renderer.context_mut().clear_commands();
    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(renderer.context().draw_calls().len(), 2);
    assert_eq!(renderer.info().memory.programs, 1);
    assert_eq!(renderer.context().count(|c| matches!(c, GpuCommand::BindIndexBuffer(_))), 1);
}

#[test]
fn test_wireframe_material_rebinds_the_line_indices() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let geometry = strip().into_shared();
    scene.add(SceneNode::mesh(geometry.clone(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)));
    scene.add(
        SceneNode::mesh(geometry, Material::basic(Color::WHITE).with_wireframe(true).into_shared())
            .with_position(in_front(5.0)),
    );

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(renderer.context().count(|c| matches!(c, GpuCommand::BindIndexBuffer(_))), 2);
    let draws = renderer.context().draw_calls();
    assert!(draws.contains(&&GpuCommand::DrawElements { mode: PrimitiveMode::Lines, count: 24, offset: 0 }));
    assert!(draws.contains(&&GpuCommand::DrawElements { mode: PrimitiveMode::Triangles, count: 12, offset: 0 }));
}

#[test]
fn test_culled_objects_are_not_uploaded() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let node = scene.add(
        SceneNode::mesh(strip().into_shared(), Material::basic(Color::WHITE).into_shared())
            .with_position(Vec3::new(0.0, 0.0, 10.0)),
    );
    let object_id = scene.get(node).unwrap().object_id().unwrap();
    renderer.context_mut().clear_commands();

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(renderer.context().buffer_uploads(), 0);
    assert_eq!(renderer.registry().state(object_id), RegistrationState::Initialized);

    scene.get_mut(node).unwrap().set_position(in_front(5.0));
    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(renderer.context().buffer_uploads(), 4);
    assert_eq!(renderer.registry().state(object_id), RegistrationState::Active);
}

#[test]
fn test_quads_are_counted_as_two_faces() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut camera = camera();
    let mut quad = Geometry::from_parts(
        vec![Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0), Vec3::new(-1.0, 1.0, 0.0)],
        vec![Face::quad(0, 1, 2, 3)],
    );
    quad.compute_face_normals();
    scene.add(SceneNode::mesh(quad.into_shared(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)));

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    assert_eq!(renderer.info().render.faces, 2);
    assert_eq!(renderer.info().render.vertices, 4);
}

/// Leaves depth testing off and blending on, then draws a marker
struct StateChanger;

impl RenderPlugin for StateChanger {
    fn name(&self) -> &str {
        "state-changer"
    }

    fn render(&mut self, frame: &mut PluginFrame<'_>) {
        frame.ctx.set_depth_test(false);
        frame.ctx.set_blend_enabled(true);
        frame.ctx.draw_arrays(PrimitiveMode::Points, 100, 1);
    }
}

fn commands_after_plugin(renderer: &Renderer<RecordingContext>) -> Vec<GpuCommand> {
    let commands = renderer.context().commands();
    let marker = commands
        .iter()
        .position(|c| matches!(c, GpuCommand::DrawArrays { first: 100, .. }))
        .unwrap();
    commands[marker + 1..].to_vec()
}

#[test]
fn test_main_list_reapplies_state_after_a_plugin() {
    let mut renderer = renderer();
    renderer.add_pre_plugin(Box::new(StateChanger));
    let mut scene = Scene::new();
    let mut camera = camera();
    scene.add(
        SceneNode::mesh(strip().into_shared(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)),
    );

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    let after = commands_after_plugin(&renderer);
    assert!(after.contains(&GpuCommand::DepthTest(true)));
    assert!(after.contains(&GpuCommand::BlendEnabled(false)));
}

#[test]
fn test_override_pass_reapplies_state_after_a_plugin() {
    let mut renderer = renderer();
    renderer.add_pre_plugin(Box::new(StateChanger));
    let mut scene = Scene::new();
    let mut camera = camera();
    scene.add(
        SceneNode::mesh(strip().into_shared(), Material::basic(Color::WHITE).into_shared()).with_position(in_front(5.0)),
    );
    scene.override_material = Some(Material::basic(Color::WHITE).with_blending(Blending::NoBlending).into_shared());

    renderer.render(&mut scene, &mut camera, None, false).unwrap();
    let after = commands_after_plugin(&renderer);
    assert!(after.contains(&GpuCommand::DepthTest(true)));
    assert!(after.contains(&GpuCommand::BlendEnabled(false)));
    assert!(after.iter().any(|c| matches!(c, GpuCommand::DrawElements { .. })));
}
