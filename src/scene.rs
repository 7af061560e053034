use glam::{Mat3, Mat4, Vec3};

use crate::material::Material;
use crate::mesh::MeshHandle;

/// Local transform plus the angular velocity that drives the idle
/// animation. Rotation is in Euler radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            angular_velocity: Vec3::ZERO,
        }
    }
}

impl Transform {
    /// Model matrix composed as `T * Rx * Ry * Rz * S`.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_z(self.rotation.z)
            * Mat4::from_scale(self.scale)
    }
}

/// One drawable: a shared mesh handle, an owned material copy and a
/// transform. The material is copied on insertion so edits to one object
/// can never leak into another mid-frame.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub mesh: MeshHandle,
    pub material: Material,
    pub transform: Transform,
    model: Mat4,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, mesh: MeshHandle, material: Material) -> Self {
        let transform = Transform::default();
        Self {
            name: name.into(),
            mesh,
            material,
            model: transform.model_matrix(),
            transform,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self.model = transform.model_matrix();
        self
    }

    /// Cached model matrix, valid for the transform as of the last
    /// update or explicit refresh.
    pub fn model_matrix(&self) -> Mat4 {
        self.model
    }

    /// Recomputes the cached model matrix after a transform edit.
    pub fn refresh_model_matrix(&mut self) {
        self.model = self.transform.model_matrix();
    }
}

/// Normal matrix for a model matrix: `transpose(inverse(upper3x3))`,
/// required for correct normals under non-uniform scale.
pub fn normal_matrix(model: Mat4) -> Mat3 {
    Mat3::from_mat4(model).inverse().transpose()
}

/// Ordered collection of scene objects; iteration order is draw order.
#[derive(Debug, Default)]
pub struct SceneGraph {
    objects: Vec<SceneObject>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [SceneObject] {
        &mut self.objects
    }

    /// Advances the idle animation by `dt` seconds and recomputes every
    /// model matrix.
    pub fn update(&mut self, dt: f32) {
        for object in &mut self.objects {
            object.transform.rotation += object.transform.angular_velocity * dt;
            object.refresh_model_matrix();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn handle() -> MeshHandle {
        // Graph tests never dereference the handle against a registry.
        MeshHandle::from_raw(0)
    }

    #[test]
    fn model_matrix_composes_translation_rotation_scale_in_order() {
        let transform = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            scale: Vec3::splat(2.0),
            angular_velocity: Vec3::ZERO,
        };
        let model = transform.model_matrix();
        // Unit X scaled to 2, rotated 90 degrees about Y (X -> -Z), then
        // translated by (1, 2, 3).
        let mapped = model * Vec4::new(1.0, 0.0, 0.0, 1.0);
        let expected = Vec4::new(1.0, 2.0, 1.0, 1.0);
        assert!((mapped - expected).length() < 1e-5);
    }

    #[test]
    fn update_advances_rotation_by_angular_velocity() {
        let mut graph = SceneGraph::new();
        let mut object = SceneObject::new("spinner", handle(), Material::default());
        object.transform.angular_velocity = Vec3::new(0.0, 1.5, 0.0);
        graph.add_object(object);

        graph.update(2.0);
        let object = &graph.objects()[0];
        assert!((object.transform.rotation.y - 3.0).abs() < 1e-6);
        // The cached matrix was refreshed alongside.
        assert_eq!(object.model_matrix(), object.transform.model_matrix());
    }

    #[test]
    fn normal_matrix_counteracts_non_uniform_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = (normal_matrix(model) * Vec3::new(1.0, 1.0, 0.0).normalize()).normalize();
        // Under a pure x-stretch a 45-degree normal must lean toward Y
        // after correction, not stay at 45 degrees.
        assert!(n.y > n.x);
    }

    #[test]
    fn clear_empties_the_graph() {
        let mut graph = SceneGraph::new();
        graph.add_object(SceneObject::new("a", handle(), Material::default()));
        assert_eq!(graph.len(), 1);
        graph.clear();
        assert!(graph.is_empty());
    }
}
