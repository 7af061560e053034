//! Real-time physically based material viewer.
//!
//! The crate is split into a CPU data model (materials, lights, camera,
//! scene graph), a reference implementation of the shading math used by
//! the tests, and a wgpu renderer driven by a reflected uniform binder.
//! Host integration (windowing, input translation, the editing UI) stays
//! in the binary so the library remains testable without a GPU.

pub mod brdf;
pub mod camera;
pub mod driver;
pub mod light;
pub mod material;
pub mod mesh;
pub mod renderer;
pub mod scene;
pub mod uniforms;

pub use camera::OrbitCamera;
pub use driver::{FrameDriver, Telemetry};
pub use light::{EnvironmentPreset, IblSettings, Light, LightKind, MAX_LIGHTS};
pub use material::{Material, MaterialPreset, MaterialRecord};
pub use mesh::{MeshData, MeshHandle, MeshRegistry};
pub use renderer::{FrameContext, InitError, Renderer};
pub use scene::{SceneGraph, SceneObject, Transform};
pub use uniforms::{UniformBinder, UniformValue};
