use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};

/// Margin keeping the elevation strictly inside +-pi/2 so the view basis
/// never collapses onto the up axis.
const ELEVATION_MARGIN: f32 = 0.01;

/// Orbit camera: position is always derived from `(azimuth, elevation,
/// radius)` around `target`, never stored independently.
///
/// Every mutator recomputes the view matrix before returning, so callers
/// can never observe a matrix stale relative to the orbit state.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    azimuth: f32,
    elevation: f32,
    radius: f32,
    target: Vec3,
    up: Vec3,
    min_radius: f32,
    max_radius: f32,
    fov_y_deg: f32,
    aspect: f32,
    near: f32,
    far: f32,
    view: Mat4,
    projection: Mat4,
}

impl OrbitCamera {
    pub fn new(radius: f32, aspect: f32) -> Self {
        let mut camera = Self {
            azimuth: FRAC_PI_2,
            elevation: 0.35,
            radius,
            target: Vec3::ZERO,
            up: Vec3::Y,
            min_radius: 1.0,
            max_radius: 50.0,
            fov_y_deg: 45.0,
            aspect: aspect.max(0.01),
            near: 0.1,
            far: 200.0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.radius = camera.radius.clamp(camera.min_radius, camera.max_radius);
        camera.recompute_view();
        camera.recompute_projection();
        camera
    }

    /// World-space camera position derived from the orbit state.
    pub fn position(&self) -> Vec3 {
        self.target
            + self.radius
                * Vec3::new(
                    self.elevation.cos() * self.azimuth.cos(),
                    self.elevation.sin(),
                    self.elevation.cos() * self.azimuth.sin(),
                )
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Rotates around the target by the given deltas (radians).
    pub fn orbit(&mut self, delta_azimuth: f32, delta_elevation: f32) {
        self.azimuth += delta_azimuth;
        self.elevation = (self.elevation + delta_elevation).clamp(
            -FRAC_PI_2 + ELEVATION_MARGIN,
            FRAC_PI_2 - ELEVATION_MARGIN,
        );
        self.recompute_view();
    }

    /// Moves toward or away from the target; the radius stays clamped.
    pub fn dolly(&mut self, delta_radius: f32) {
        self.set_radius(self.radius + delta_radius);
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.clamp(self.min_radius, self.max_radius);
        self.recompute_view();
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.recompute_view();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect.max(0.01);
        self.recompute_projection();
    }

    pub fn set_fov_y_deg(&mut self, fov_y_deg: f32) {
        self.fov_y_deg = fov_y_deg.clamp(10.0, 120.0);
        self.recompute_projection();
    }

    fn recompute_view(&mut self) {
        self.view = Mat4::look_at_rh(self.position(), self.target, self.up);
    }

    fn recompute_projection(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_is_derived_from_orbit_state() {
        let mut camera = OrbitCamera::new(5.0, 1.0);
        camera.set_target(Vec3::ZERO);
        camera.orbit(-camera.azimuth(), -camera.elevation());
        // azimuth 0, elevation 0: position sits on +X at the radius.
        let position = camera.position();
        assert!((position - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn radius_clamps_and_view_reflects_the_clamped_value() {
        let mut camera = OrbitCamera::new(5.0, 1.0);
        camera.set_radius(0.0);
        assert_eq!(camera.radius(), 1.0);

        // The view matrix must already reflect the clamped radius: the
        // camera-space distance to the target equals the clamped radius.
        let target_in_view = camera.view().transform_point3(camera.target());
        assert!((target_in_view.length() - 1.0).abs() < 1e-4);

        camera.set_radius(1000.0);
        assert_eq!(camera.radius(), 50.0);
    }

    #[test]
    fn elevation_never_reaches_the_poles() {
        let mut camera = OrbitCamera::new(5.0, 1.0);
        camera.orbit(0.0, 10.0);
        assert!(camera.elevation() < FRAC_PI_2);
        camera.orbit(0.0, -20.0);
        assert!(camera.elevation() > -FRAC_PI_2);
    }

    #[test]
    fn every_mutation_recomputes_the_view_synchronously() {
        let mut camera = OrbitCamera::new(5.0, 1.0);
        let before = camera.view();
        camera.orbit(0.5, 0.0);
        assert_ne!(camera.view(), before);

        let before = camera.view();
        camera.set_target(Vec3::new(1.0, 0.0, 0.0));
        assert_ne!(camera.view(), before);
    }
}
