use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use thiserror::Error;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::light::{IblSettings, Light, MAX_LIGHTS};
use crate::mesh::{GpuMesh, MeshData, MeshHandle, MeshRegistry, VERTEX_STRIDE};
use crate::scene::{normal_matrix, SceneGraph};
use crate::uniforms::UniformBinder;

const SHADER_SOURCE: &str = include_str!("shader.wgsl");

const GLOBAL_GROUP: u32 = 0;
const OBJECT_GROUP: u32 = 1;

/// Initialization failures are fatal: rendering with a partial program is
/// never attempted. The diagnostic carries a line-numbered source dump.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("shading program failed to parse: {diagnostic}\n{source_dump}")]
    ShaderParse {
        diagnostic: String,
        source_dump: String,
    },
    #[error("shading program failed validation: {diagnostic}\n{source_dump}")]
    ShaderValidation {
        diagnostic: String,
        source_dump: String,
    },
}

/// Per-frame global shading parameters, passed explicitly into the draw
/// step rather than read from ambient state.
#[derive(Debug, Clone)]
pub struct FrameContext<'a> {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub lights: &'a [Light],
    pub ibl: IblSettings,
}

/// GPU renderer: owns the surface, the single shading pipeline, the
/// reflected uniform binder and the mesh registry.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    pipeline: wgpu::RenderPipeline,
    binder: UniformBinder,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    object_block_size: u64,
    registry: MeshRegistry,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window. Shader
    /// compile/link problems and missing GPU capabilities abort here.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("viewer-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let module = validate_shader(SHADER_SOURCE)?;
        let binder = UniformBinder::from_module(&module);
        let global_block_size = binder
            .block_size(GLOBAL_GROUP, 0)
            .context("shading program declares no global uniform block")?;
        let object_block_size = binder
            .block_size(OBJECT_GROUP, 0)
            .context("shading program declares no per-object uniform block")?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("viewer-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let global_layout = uniform_layout(&device, "global-bind-layout", global_block_size);
        let object_layout = uniform_layout(&device, "object-bind-layout", object_block_size);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("viewer-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniforms"),
            size: global_block_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("viewer-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: (3 * std::mem::size_of::<f32>()) as u64,
                            shader_location: 1,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x2,
                            offset: (6 * std::mem::size_of::<f32>()) as u64,
                            shader_location: 2,
                        },
                    ],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            pipeline,
            binder,
            global_buffer,
            global_bind_group,
            object_layout,
            object_block_size,
            registry: MeshRegistry::new(),
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    /// Uploads validated mesh data and returns a shareable handle.
    pub fn upload_mesh(&mut self, data: &MeshData, label: &str) -> MeshHandle {
        self.registry.insert(GpuMesh::upload(&self.device, data, label))
    }

    /// Explicit mesh lifecycle access (disposal, teardown).
    pub fn meshes_mut(&mut self) -> &mut MeshRegistry {
        &mut self.registry
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Draws the scene. Global uniforms (camera, lights, IBL) are bound
    /// exactly once, strictly before any per-object state; each object
    /// then gets its own uniform snapshot so no state aliases across
    /// draws.
    pub fn render(
        &mut self,
        scene: &SceneGraph,
        frame: &FrameContext<'_>,
    ) -> Result<(), wgpu::SurfaceError> {
        self.bind_globals(frame);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewer-encoder"),
            });

        // Snapshot per-object uniforms into dedicated buffers before the
        // pass opens; object i+1 can never bleed into the draw of i.
        let mut draws = Vec::with_capacity(scene.len());
        for object in scene.objects() {
            if self.registry.get(object.mesh).is_none() {
                continue;
            }
            let model = object.model_matrix();
            self.binder.set("model", model);
            self.binder.set("normal_matrix", normal_matrix(model));
            self.binder.set("albedo", object.material.albedo);
            self.binder.set("metallic", object.material.metallic);
            self.binder.set("roughness", object.material.roughness);
            self.binder.set("ao", object.material.ao);

            let contents = self
                .binder
                .block_bytes(OBJECT_GROUP, 0)
                .expect("object block exists after init");
            debug_assert_eq!(contents.len() as u64, self.object_block_size);
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("object-uniforms"),
                    contents,
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("object-bind-group"),
                layout: &self.object_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            draws.push((object.mesh, bind_group));
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.015,
                            g: 0.015,
                            b: 0.02,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.global_bind_group, &[]);

            for (handle, bind_group) in &draws {
                let Some(mesh) = self.registry.get(*handle) else {
                    continue;
                };
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint16);
                pass.set_bind_group(1, bind_group, &[]);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Stages and uploads the frame-global uniforms: camera, the light
    /// array clamped to [`MAX_LIGHTS`], and the IBL settings.
    fn bind_globals(&mut self, frame: &FrameContext<'_>) {
        self.binder.set("view", frame.view);
        self.binder.set("projection", frame.projection);
        self.binder.set("camera_position", frame.camera_position);

        let count = frame.lights.len().min(MAX_LIGHTS);
        self.binder.set("num_lights", count as i32);
        for (i, light) in frame.lights.iter().take(MAX_LIGHTS).enumerate() {
            self.binder.set(&format!("lights[{i}].kind"), light.kind as i32);
            self.binder.set(&format!("lights[{i}].position"), light.position);
            self.binder.set(
                &format!("lights[{i}].direction"),
                light.direction.normalize_or_zero(),
            );
            self.binder.set(&format!("lights[{i}].color"), light.color);
            self.binder.set(&format!("lights[{i}].intensity"), light.intensity);
            self.binder.set(&format!("lights[{i}].range"), light.range);
            self.binder.set(
                &format!("lights[{i}].inner_cone_cos"),
                light.inner_cone_deg.to_radians().cos(),
            );
            self.binder.set(
                &format!("lights[{i}].outer_cone_cos"),
                light.outer_cone_deg.to_radians().cos(),
            );
        }

        self.binder.set("use_ibl", frame.ibl.enabled);
        self.binder.set("ibl_intensity", frame.ibl.intensity);
        self.binder.set("ambient_color", frame.ibl.ambient_color);

        let bytes = self
            .binder
            .block_bytes(GLOBAL_GROUP, 0)
            .expect("global block exists after init");
        self.queue.write_buffer(&self.global_buffer, 0, bytes);
    }
}

fn uniform_layout(device: &wgpu::Device, label: &str, size: u64) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: std::num::NonZeroU64::new(size),
            },
            count: None,
        }],
    })
}

/// Parses and validates the WGSL source, turning failures into fatal,
/// line-annotated diagnostics.
fn validate_shader(source: &str) -> Result<naga::Module, InitError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| InitError::ShaderParse {
        diagnostic: err.emit_to_string(source),
        source_dump: numbered_source(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|err| InitError::ShaderValidation {
        diagnostic: format!("{err:?}"),
        source_dump: numbered_source(source),
    })?;

    Ok(module)
}

fn numbered_source(source: &str) -> String {
    let mut dump = String::new();
    for (number, line) in source.lines().enumerate() {
        let _ = writeln!(dump, "{:4} | {line}", number + 1);
    }
    dump
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_shader_parses_and_validates() {
        let module = validate_shader(SHADER_SOURCE).expect("bundled shader is valid");
        let binder = UniformBinder::from_module(&module);
        assert!(binder.contains("view"));
        assert!(binder.contains("model"));
        assert!(binder.contains(&format!("lights[{}].kind", MAX_LIGHTS - 1)));
    }

    #[test]
    fn broken_shader_yields_a_line_annotated_diagnostic() {
        let err = validate_shader("fn nope( -> {").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("failed to parse"));
        assert!(message.contains("   1 | fn nope( -> {"));
    }
}
