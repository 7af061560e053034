//! Name-indexed uniform binding over the shading program's uniform
//! blocks.
//!
//! The binder reflects the parsed WGSL module once at initialization and
//! records every uniform block member (arrays flattened per element) by
//! name, byte offset and declared type. Frame code then binds values by
//! name without ever hand-computing std140-style offsets; when the host
//! and the shader drift apart, an unknown name degrades to a logged
//! no-op instead of an error.

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use log::{error, warn};
use naga::{AddressSpace, ArraySize, Module, ScalarKind, TypeInner, VectorSize};

/// Declared type of a uniform block member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    F32,
    I32,
    U32,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

/// Host-side value accepted by [`UniformBinder::set`]. The `From`
/// conversions let call sites pass scalars, arrays, or glam types
/// interchangeably.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Uint(u32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        Self::Uint(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<Mat3> for UniformValue {
    fn from(v: Mat3) -> Self {
        Self::Mat3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        Self::Vec2(Vec2::from_array(v))
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        Self::Vec3(Vec3::from_array(v))
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Vec4(Vec4::from_array(v))
    }
}

/// Reflection record for one flattened member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformEntry {
    pub ty: UniformType,
    pub offset: u32,
    pub group: u32,
    pub binding: u32,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    block: usize,
    offset: u32,
    ty: UniformType,
}

#[derive(Debug)]
struct Block {
    group: u32,
    binding: u32,
    data: Vec<u8>,
}

/// Reflected uniform table plus CPU shadow storage for every uniform
/// block. Built once per shading program.
#[derive(Debug)]
pub struct UniformBinder {
    entries: HashMap<String, Slot>,
    blocks: Vec<Block>,
}

impl UniformBinder {
    /// Enumerates every `var<uniform>` block of the module.
    pub fn from_module(module: &Module) -> Self {
        let mut binder = Self {
            entries: HashMap::new(),
            blocks: Vec::new(),
        };

        for (_, var) in module.global_variables.iter() {
            if var.space != AddressSpace::Uniform {
                continue;
            }
            let Some(res) = &var.binding else { continue };
            let ty = &module.types[var.ty];
            let TypeInner::Struct { members, span } = &ty.inner else {
                warn!(
                    "uniform {:?} at group {} binding {} is not a struct; skipping",
                    var.name, res.group, res.binding
                );
                continue;
            };

            let block = binder.blocks.len();
            binder.blocks.push(Block {
                group: res.group,
                binding: res.binding,
                data: vec![0u8; *span as usize],
            });
            for member in members {
                let name = member.name.clone().unwrap_or_default();
                binder.flatten(module, block, &name, member.ty, member.offset);
            }
        }

        binder
    }

    fn flatten(
        &mut self,
        module: &Module,
        block: usize,
        name: &str,
        ty: naga::Handle<naga::Type>,
        offset: u32,
    ) {
        match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => {
                for member in members {
                    let child = member.name.as_deref().unwrap_or_default();
                    self.flatten(
                        module,
                        block,
                        &format!("{name}.{child}"),
                        member.ty,
                        offset + member.offset,
                    );
                }
            }
            TypeInner::Array {
                base,
                size: ArraySize::Constant(count),
                stride,
            } => {
                for i in 0..count.get() {
                    self.flatten(module, block, &format!("{name}[{i}]"), *base, offset + i * stride);
                }
            }
            inner => {
                let Some(tag) = scalar_type_tag(inner) else {
                    warn!("uniform member {name} has an unsupported type; skipping");
                    return;
                };
                if self
                    .entries
                    .insert(name.to_string(), Slot { block, offset, ty: tag })
                    .is_some()
                {
                    warn!("uniform member {name} is declared in more than one block");
                }
            }
        }
    }

    /// Binds a value by name. Unknown names are tolerated with a warning;
    /// a value whose shape does not match the declared type is logged and
    /// skipped. Neither case disturbs previously bound data.
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        let Some(slot) = self.entries.get(name).copied() else {
            warn!("uniform {name} is not active in the shading program; ignoring");
            return;
        };

        let offset = slot.offset as usize;
        let data = &mut self.blocks[slot.block].data;
        match (slot.ty, value) {
            (UniformType::F32, UniformValue::Float(v)) => write_pod(data, offset, &v),
            (UniformType::F32, UniformValue::Int(v)) => write_pod(data, offset, &(v as f32)),
            (UniformType::I32, UniformValue::Int(v)) => write_pod(data, offset, &v),
            (UniformType::I32, UniformValue::Uint(v)) => write_pod(data, offset, &(v as i32)),
            (UniformType::I32, UniformValue::Bool(v)) => write_pod(data, offset, &(v as i32)),
            (UniformType::U32, UniformValue::Uint(v)) => write_pod(data, offset, &v),
            (UniformType::U32, UniformValue::Int(v)) if v >= 0 => {
                write_pod(data, offset, &(v as u32))
            }
            (UniformType::U32, UniformValue::Bool(v)) => write_pod(data, offset, &(v as u32)),
            (UniformType::Vec2, UniformValue::Vec2(v)) => write_pod(data, offset, &v.to_array()),
            (UniformType::Vec3, UniformValue::Vec3(v)) => write_pod(data, offset, &v.to_array()),
            (UniformType::Vec4, UniformValue::Vec4(v)) => write_pod(data, offset, &v.to_array()),
            (UniformType::Mat3, UniformValue::Mat3(v)) => {
                // Column-major with 16-byte column stride per WGSL
                // uniform layout rules.
                for (i, column) in [v.x_axis, v.y_axis, v.z_axis].into_iter().enumerate() {
                    write_pod(data, offset + i * 16, &column.to_array());
                }
            }
            (UniformType::Mat4, UniformValue::Mat4(v)) => {
                write_pod(data, offset, &v.to_cols_array())
            }
            (expected, received) => {
                error!(
                    "uniform {name}: declared {expected:?} but received {received:?}; \
                     skipping this binding"
                );
            }
        }
    }

    /// Reflection entry for a member, if the name is active.
    pub fn entry(&self, name: &str) -> Option<UniformEntry> {
        let slot = self.entries.get(name)?;
        let block = &self.blocks[slot.block];
        Some(UniformEntry {
            ty: slot.ty,
            offset: slot.offset,
            group: block.group,
            binding: block.binding,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Current shadow contents of a block, ready for a buffer upload.
    pub fn block_bytes(&self, group: u32, binding: u32) -> Option<&[u8]> {
        self.blocks
            .iter()
            .find(|block| block.group == group && block.binding == binding)
            .map(|block| block.data.as_slice())
    }

    pub fn block_size(&self, group: u32, binding: u32) -> Option<u64> {
        self.block_bytes(group, binding).map(|bytes| bytes.len() as u64)
    }
}

fn scalar_type_tag(inner: &TypeInner) -> Option<UniformType> {
    match inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float => Some(UniformType::F32),
            ScalarKind::Sint => Some(UniformType::I32),
            ScalarKind::Uint => Some(UniformType::U32),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => {
            Some(match size {
                VectorSize::Bi => UniformType::Vec2,
                VectorSize::Tri => UniformType::Vec3,
                VectorSize::Quad => UniformType::Vec4,
            })
        }
        TypeInner::Matrix { columns, rows, .. } => match (columns, rows) {
            (VectorSize::Tri, VectorSize::Tri) => Some(UniformType::Mat3),
            (VectorSize::Quad, VectorSize::Quad) => Some(UniformType::Mat4),
            _ => None,
        },
        _ => None,
    }
}

fn write_pod<T: bytemuck::NoUninit>(data: &mut [u8], offset: usize, value: &T) {
    let bytes = bytemuck::bytes_of(value);
    data[offset..offset + bytes.len()].copy_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHADER: &str = include_str!("shader.wgsl");

    fn binder() -> UniformBinder {
        let module = naga::front::wgsl::parse_str(SHADER).expect("shader parses");
        UniformBinder::from_module(&module)
    }

    fn read_f32(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn reflects_global_block_members_with_layout_offsets() {
        let binder = binder();
        let view = binder.entry("view").unwrap();
        assert_eq!(view.ty, UniformType::Mat4);
        assert_eq!(view.offset, 0);
        assert_eq!((view.group, view.binding), (0, 0));

        let projection = binder.entry("projection").unwrap();
        assert_eq!(projection.offset, 64);

        let camera = binder.entry("camera_position").unwrap();
        assert_eq!(camera.ty, UniformType::Vec3);
        assert_eq!(camera.offset, 128);

        let count = binder.entry("num_lights").unwrap();
        assert_eq!(count.ty, UniformType::I32);
        assert_eq!(count.offset, 140);
    }

    #[test]
    fn flattens_the_light_array_per_element() {
        let binder = binder();
        let first = binder.entry("lights[0].position").unwrap();
        let second = binder.entry("lights[1].position").unwrap();
        let stride = second.offset - first.offset;
        assert_eq!(stride % 16, 0);

        let last = binder.entry("lights[7].outer_cone_cos").unwrap();
        assert_eq!(last.ty, UniformType::F32);
        assert_eq!(last.offset, first.offset + 7 * stride + 52);
        assert!(!binder.contains("lights[8].position"));
    }

    #[test]
    fn reflects_the_object_block() {
        let binder = binder();
        let model = binder.entry("model").unwrap();
        assert_eq!((model.group, model.binding), (1, 0));
        assert_eq!(model.ty, UniformType::Mat4);
        let normal = binder.entry("normal_matrix").unwrap();
        assert_eq!(normal.ty, UniformType::Mat3);
        assert_eq!(binder.entry("metallic").unwrap().ty, UniformType::F32);
    }

    #[test]
    fn unknown_name_is_a_no_op_that_preserves_bound_data() {
        let mut binder = binder();
        binder.set("camera_position", Vec3::new(1.0, 2.0, 3.0));
        let before = binder.block_bytes(0, 0).unwrap().to_vec();

        binder.set("u_definitely_not_here", 1.0f32);
        assert_eq!(binder.block_bytes(0, 0).unwrap(), &before[..]);
    }

    #[test]
    fn type_mismatch_is_logged_and_skipped() {
        let mut binder = binder();
        binder.set("view", Mat4::IDENTITY);
        let before = binder.block_bytes(0, 0).unwrap().to_vec();

        // A vec3 cannot fill a mat4 slot; the write must not happen.
        binder.set("view", Vec3::ONE);
        assert_eq!(binder.block_bytes(0, 0).unwrap(), &before[..]);
    }

    #[test]
    fn mat3_columns_land_on_sixteen_byte_stride() {
        let mut binder = binder();
        let base = binder.entry("normal_matrix").unwrap().offset as usize;
        let m = Mat3::from_cols(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(7.0, 8.0, 9.0),
        );
        binder.set("normal_matrix", m);
        let bytes = binder.block_bytes(1, 0).unwrap();
        let col = |i: usize| -> [f32; 3] {
            let start = base + i * 16;
            [
                read_f32(bytes, start),
                read_f32(bytes, start + 4),
                read_f32(bytes, start + 8),
            ]
        };
        assert_eq!(col(0), [1.0, 2.0, 3.0]);
        assert_eq!(col(1), [4.0, 5.0, 6.0]);
        assert_eq!(col(2), [7.0, 8.0, 9.0]);
    }

    #[test]
    fn bool_values_bind_into_integer_slots() {
        let mut binder = binder();
        let entry = binder.entry("use_ibl").unwrap();
        assert_eq!(entry.ty, UniformType::U32);
        binder.set("use_ibl", true);
        let bytes = binder.block_bytes(0, 0).unwrap();
        assert_eq!(read_u32(bytes, entry.offset as usize), 1);
    }

    #[test]
    fn array_like_values_convert_to_vectors() {
        let mut binder = binder();
        binder.set("ambient_color", [0.1f32, 0.2, 0.3]);
        let entry = binder.entry("ambient_color").unwrap();
        let bytes = binder.block_bytes(0, 0).unwrap();
        let offset = entry.offset as usize;
        assert_eq!(read_f32(bytes, offset), 0.1);
        assert_eq!(read_f32(bytes, offset + 4), 0.2);
        assert_eq!(read_f32(bytes, offset + 8), 0.3);
    }
}
