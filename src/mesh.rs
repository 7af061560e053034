use anyhow::{anyhow, Result};
use log::error;
use wgpu::util::DeviceExt;

/// Floats per vertex: `position.xyz`, `normal.xyz`, `uv`.
pub const VERTEX_STRIDE: usize = 8;

/// CPU-side geometry in the renderer's wire format: interleaved
/// `position:3, normal:3, uv:2` vertices and a 16-bit triangle list.
///
/// Meshes are immutable once built; shape tessellation lives with the
/// host, this type only enforces the data contract.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u16>,
}

impl MeshData {
    /// Validates the vertex layout and index list against the contract.
    pub fn new(vertices: Vec<f32>, indices: Vec<u16>) -> Result<Self> {
        if vertices.is_empty() || vertices.len() % VERTEX_STRIDE != 0 {
            return Err(anyhow!(
                "vertex array length {} is not a multiple of the {VERTEX_STRIDE}-float stride",
                vertices.len()
            ));
        }
        if indices.is_empty() || indices.len() % 3 != 0 {
            return Err(anyhow!(
                "index count {} does not describe a triangle list",
                indices.len()
            ));
        }
        let vertex_count = vertices.len() / VERTEX_STRIDE;
        if let Some(bad) = indices.iter().find(|&&i| usize::from(i) >= vertex_count) {
            return Err(anyhow!(
                "index {bad} is out of bounds for {vertex_count} vertices"
            ));
        }
        Ok(Self { vertices, indices })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// GPU-resident mesh buffers. Built once, drawn many times.
#[derive(Debug)]
pub struct GpuMesh {
    pub(crate) vertex: wgpu::Buffer,
    pub(crate) index: wgpu::Buffer,
    pub(crate) index_count: u32,
}

impl GpuMesh {
    pub(crate) fn upload(device: &wgpu::Device, data: &MeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: data.indices.len() as u32,
        }
    }
}

/// Non-owning reference into the [`MeshRegistry`]. Many scene objects may
/// hold the same handle; none of them can mutate the mesh through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(usize);

impl MeshHandle {
    pub(crate) fn from_raw(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Arena of GPU meshes owned by the renderer. Disposal is explicit and
/// invalidates every outstanding handle to the slot; draws of a disposed
/// handle are skipped with an error log rather than aborting the frame.
#[derive(Debug, Default)]
pub struct MeshRegistry {
    slots: Vec<Option<GpuMesh>>,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, mesh: GpuMesh) -> MeshHandle {
        self.slots.push(Some(mesh));
        MeshHandle::from_raw(self.slots.len() - 1)
    }

    pub(crate) fn get(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        match self.slots.get(handle.index()) {
            Some(Some(mesh)) => Some(mesh),
            _ => {
                error!(
                    "mesh handle {} refers to a disposed or unknown mesh",
                    handle.index()
                );
                None
            }
        }
    }

    /// Releases the GPU buffers behind the handle. Further draws through
    /// any copy of the handle are invalid and will be skipped.
    pub fn dispose(&mut self, handle: MeshHandle) {
        if let Some(slot) = self.slots.get_mut(handle.index()) {
            slot.take();
        }
    }

    /// Drops every mesh at scene teardown.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Vec<f32>, Vec<u16>) {
        let vertices = vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0,
        ];
        (vertices, vec![0, 1, 2])
    }

    #[test]
    fn accepts_a_valid_triangle() {
        let (vertices, indices) = triangle();
        let mesh = MeshData::new(vertices, indices).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn rejects_misaligned_vertex_data() {
        let (mut vertices, indices) = triangle();
        vertices.pop();
        assert!(MeshData::new(vertices, indices).is_err());
    }

    #[test]
    fn rejects_out_of_bounds_indices() {
        let (vertices, _) = triangle();
        assert!(MeshData::new(vertices, vec![0, 1, 7]).is_err());
    }

    #[test]
    fn rejects_non_triangle_index_counts() {
        let (vertices, _) = triangle();
        assert!(MeshData::new(vertices, vec![0, 1]).is_err());
    }
}
