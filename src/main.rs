use std::cell::Cell;
use std::env;
use std::f32::consts::PI;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use log::error;
use pollster::block_on;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use pbr_viewer::{
    FrameDriver, Light, MaterialPreset, MeshData, OrbitCamera, Renderer, SceneObject, Transform,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let demo = demo_objects();
    let lights = demo_lights();

    if options.summary_only || options.export_materials.is_some() {
        print_summary(&demo, &lights);
        if let Some(path) = &options.export_materials {
            export_materials(&demo, path)?;
            println!("Exported {} material records to {path}", demo.len());
        }
        return Ok(());
    }

    run_interactive(&demo, lights)
}

fn run_interactive(demo: &[DemoObject], lights: Vec<Light>) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("PBR Material Viewer")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .context("failed to create window")?,
    );

    let mut renderer = block_on(Renderer::new(Arc::clone(&window)))?;

    // One GPU mesh per shape; objects share handles into the registry.
    let plane = renderer.upload_mesh(&Shape::Plane.mesh_data(), "plane");
    let cube = renderer.upload_mesh(&Shape::Cube.mesh_data(), "cube");
    let sphere = renderer.upload_mesh(&Shape::Sphere.mesh_data(), "sphere");

    let camera = OrbitCamera::new(6.0, renderer.aspect());
    let mut driver = FrameDriver::new(renderer, camera);
    for object in demo {
        let handle = match object.shape {
            Shape::Plane => plane,
            Shape::Cube => cube,
            Shape::Sphere => sphere,
        };
        driver.scene_mut().add_object(
            SceneObject::new(object.name, handle, object.preset.material())
                .with_transform(object.transform),
        );
    }
    *driver.lights_mut() = lights;

    let mut app = App {
        driver,
        dragging: false,
        last_cursor: None,
        last_title_refresh: Instant::now(),
    };
    let fatal = Rc::new(Cell::new(false));
    let fatal_flag = Rc::clone(&fatal);

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            match event {
                Event::WindowEvent { window_id, event }
                    if window_id == app.driver.renderer().window_id() =>
                {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::Resized(size) => app.driver.resize(size),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state == ElementState::Pressed
                                && event.logical_key == Key::Named(NamedKey::Escape)
                            {
                                elwt.exit();
                            }
                        }
                        WindowEvent::MouseInput {
                            state,
                            button: MouseButton::Left,
                            ..
                        } => {
                            app.dragging = state == ElementState::Pressed;
                            if !app.dragging {
                                app.last_cursor = None;
                            }
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            app.handle_cursor(position);
                        }
                        WindowEvent::MouseWheel { delta, .. } => {
                            let amount = match delta {
                                MouseScrollDelta::LineDelta(_, y) => y * 0.5,
                                MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
                            };
                            app.driver.camera_mut().dolly(-amount);
                        }
                        WindowEvent::RedrawRequested => {
                            if let Err(err) = app.driver.frame() {
                                error!("rendering aborted: {err:?}");
                                fatal_flag.set(true);
                                elwt.exit();
                            }
                            app.refresh_title();
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    app.driver.renderer().window().request_redraw();
                }
                _ => {}
            }
        })
        .context("event loop failed")?;

    if fatal.get() {
        return Err(anyhow!("rendering aborted by a fatal GPU error"));
    }
    Ok(())
}

struct App {
    driver: FrameDriver,
    dragging: bool,
    last_cursor: Option<PhysicalPosition<f64>>,
    last_title_refresh: Instant,
}

impl App {
    fn handle_cursor(&mut self, position: PhysicalPosition<f64>) {
        if self.dragging {
            if let Some(last) = self.last_cursor {
                let dx = (position.x - last.x) as f32;
                let dy = (position.y - last.y) as f32;
                self.driver.camera_mut().orbit(dx * 0.005, dy * 0.005);
            }
            self.last_cursor = Some(position);
        }
    }

    /// Once-per-second telemetry poll feeding the window title.
    fn refresh_title(&mut self) {
        if self.last_title_refresh.elapsed() < Duration::from_secs(1) {
            return;
        }
        self.last_title_refresh = Instant::now();
        let telemetry = self.driver.telemetry();
        self.driver.renderer().window().set_title(&format!(
            "PBR Material Viewer | {:.0} fps | distance {:.1}",
            telemetry.fps, telemetry.camera_distance
        ));
    }
}

struct CliOptions {
    summary_only: bool,
    export_materials: Option<String>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut summary_only = false;
        let mut export_materials = None;
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--export-materials" => {
                    export_materials = Some(args.next().ok_or_else(|| {
                        anyhow!("--export-materials requires a file path")
                    })?);
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: pbr-viewer [--summary-only] \
                         [--export-materials PATH]"
                    ));
                }
            }
        }
        Ok(Self {
            summary_only,
            export_materials,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Plane,
    Cube,
    Sphere,
}

impl Shape {
    fn name(&self) -> &'static str {
        match self {
            Shape::Plane => "plane",
            Shape::Cube => "cube",
            Shape::Sphere => "sphere",
        }
    }

    fn mesh_data(&self) -> MeshData {
        match self {
            Shape::Plane => plane_mesh(4.0),
            Shape::Cube => cube_mesh(),
            Shape::Sphere => sphere_mesh(48, 24),
        }
    }
}

struct DemoObject {
    name: &'static str,
    shape: Shape,
    preset: MaterialPreset,
    transform: Transform,
}

fn demo_objects() -> Vec<DemoObject> {
    vec![
        DemoObject {
            name: "ground",
            shape: Shape::Plane,
            preset: MaterialPreset::Rubber,
            transform: Transform::default(),
        },
        DemoObject {
            name: "gold-sphere",
            shape: Shape::Sphere,
            preset: MaterialPreset::Gold,
            transform: Transform {
                position: Vec3::new(-1.1, 0.5, 0.0),
                angular_velocity: Vec3::new(0.0, 0.4, 0.0),
                ..Transform::default()
            },
        },
        DemoObject {
            name: "plastic-cube",
            shape: Shape::Cube,
            preset: MaterialPreset::RedPlastic,
            transform: Transform {
                position: Vec3::new(1.1, 0.5, 0.0),
                angular_velocity: Vec3::new(0.0, 0.6, 0.0),
                ..Transform::default()
            },
        },
        DemoObject {
            name: "copper-sphere",
            shape: Shape::Sphere,
            preset: MaterialPreset::Copper,
            transform: Transform {
                position: Vec3::new(0.0, 0.35, 1.5),
                scale: Vec3::splat(0.7),
                angular_velocity: Vec3::new(0.0, -0.3, 0.0),
                ..Transform::default()
            },
        },
    ]
}

fn demo_lights() -> Vec<Light> {
    vec![
        Light::directional(Vec3::new(-0.4, -1.0, -0.3), Vec3::new(1.0, 0.96, 0.9), 3.0),
        Light::point(Vec3::new(2.0, 3.0, -2.0), Vec3::new(0.9, 0.6, 0.3), 40.0, 20.0),
        Light::spot(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::NEG_Y,
            Vec3::new(0.6, 0.7, 1.0),
            60.0,
            25.0,
            20.0,
            35.0,
        ),
    ]
}

fn print_summary(demo: &[DemoObject], lights: &[Light]) {
    println!("Scene contains {} objects ({} lights)", demo.len(), lights.len());
    for object in demo {
        let mesh = object.shape.mesh_data();
        println!(
            " - {} ({}, {}): {} triangles",
            object.name,
            object.shape.name(),
            object.preset.name(),
            mesh.triangle_count()
        );
    }
    println!("Lights:");
    for light in lights {
        println!(" - {:?} intensity {:.1}", light.kind, light.intensity);
    }
}

fn export_materials(demo: &[DemoObject], path: &str) -> Result<()> {
    let records: Vec<_> = demo
        .iter()
        .map(|object| object.preset.material().record(object.name))
        .collect();
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {path}"))?;
    Ok(())
}

/// Appends one quad: `center` plus the four signed combinations of the
/// half-extent axes. Winding is counter-clockwise seen from along
/// `u_axis x v_axis`.
fn push_quad(vertices: &mut Vec<f32>, indices: &mut Vec<u16>, center: Vec3, u_axis: Vec3, v_axis: Vec3) {
    let normal = u_axis.cross(v_axis).normalize();
    let base = (vertices.len() / 8) as u16;
    for (su, sv) in [(-1.0f32, -1.0f32), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
        let position = center + u_axis * su + v_axis * sv;
        vertices.extend_from_slice(&[
            position.x,
            position.y,
            position.z,
            normal.x,
            normal.y,
            normal.z,
            (su + 1.0) * 0.5,
            (sv + 1.0) * 0.5,
        ]);
    }
    indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

fn plane_mesh(half_extent: f32) -> MeshData {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    push_quad(
        &mut vertices,
        &mut indices,
        Vec3::ZERO,
        Vec3::X * half_extent,
        Vec3::NEG_Z * half_extent,
    );
    MeshData::new(vertices, indices).expect("plane mesh is well formed")
}

fn cube_mesh() -> MeshData {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let h = 0.5;
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];
    for (normal, u_axis, v_axis) in faces {
        push_quad(
            &mut vertices,
            &mut indices,
            normal * h,
            u_axis * h,
            v_axis * h,
        );
    }
    MeshData::new(vertices, indices).expect("cube mesh is well formed")
}

fn sphere_mesh(sectors: u16, rings: u16) -> MeshData {
    let radius = 0.5;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let phi = PI * f32::from(ring) / f32::from(rings);
        let y = phi.cos();
        let ring_radius = phi.sin();
        for sector in 0..=sectors {
            let theta = 2.0 * PI * f32::from(sector) / f32::from(sectors);
            let x = ring_radius * theta.cos();
            let z = ring_radius * theta.sin();
            vertices.extend_from_slice(&[
                x * radius,
                y * radius,
                z * radius,
                x,
                y,
                z,
                f32::from(sector) / f32::from(sectors),
                f32::from(ring) / f32::from(rings),
            ]);
        }
    }

    for ring in 0..rings {
        for sector in 0..sectors {
            let a = ring * (sectors + 1) + sector;
            let b = a + sectors + 1;
            indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }

    MeshData::new(vertices, indices).expect("sphere mesh is well formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_meshes_satisfy_the_data_contract() {
        for shape in [Shape::Plane, Shape::Cube, Shape::Sphere] {
            let mesh = shape.mesh_data();
            assert!(mesh.triangle_count() > 0, "{}", shape.name());
        }
    }

    #[test]
    fn sphere_normals_are_unit_length() {
        let mesh = sphere_mesh(12, 6);
        for vertex in mesh.vertices.chunks_exact(8) {
            let normal = Vec3::new(vertex[3], vertex[4], vertex[5]);
            assert!((normal.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn demo_lights_fit_the_shader_light_cap() {
        assert!(demo_lights().len() <= pbr_viewer::MAX_LIGHTS);
    }
}
