use glam::Vec3;

/// Maximum number of lights the shading program accepts per frame.
/// Longer lists are clamped at bind time, never rejected.
pub const MAX_LIGHTS: usize = 8;

/// Discriminant shared with the shading program (`lights[i].kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

/// Typed light descriptor. Fields irrelevant to a kind (e.g. `position`
/// for a directional light) are carried but ignored by the shading core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    /// Normalized before use; meaningless for point lights.
    pub direction: Vec3,
    /// Linear color.
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub inner_cone_deg: f32,
    pub outer_cone_deg: f32,
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize_or_zero(),
            color: color.max(Vec3::ZERO),
            intensity: intensity.max(0.0),
            range: 10.0,
            inner_cone_deg: 0.0,
            outer_cone_deg: 0.0,
        }
    }

    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: Vec3::NEG_Y,
            color: color.max(Vec3::ZERO),
            intensity: intensity.max(0.0),
            range: range.max(f32::EPSILON),
            inner_cone_deg: 0.0,
            outer_cone_deg: 0.0,
        }
    }

    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
        inner_cone_deg: f32,
        outer_cone_deg: f32,
    ) -> Self {
        let outer = outer_cone_deg.clamp(0.0, 90.0);
        Self {
            kind: LightKind::Spot,
            position,
            direction: direction.normalize_or_zero(),
            color: color.max(Vec3::ZERO),
            intensity: intensity.max(0.0),
            range: range.max(f32::EPSILON),
            inner_cone_deg: inner_cone_deg.clamp(0.0, outer),
            outer_cone_deg: outer,
        }
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.max(0.0);
    }

    pub fn set_range(&mut self, range: f32) {
        self.range = range.max(f32::EPSILON);
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction.normalize_or_zero();
    }

    /// Sets the spot cone, keeping `inner <= outer`.
    pub fn set_cone(&mut self, inner_deg: f32, outer_deg: f32) {
        self.outer_cone_deg = outer_deg.clamp(0.0, 90.0);
        self.inner_cone_deg = inner_deg.clamp(0.0, self.outer_cone_deg);
    }
}

/// Global image-based lighting settings shared by every draw in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IblSettings {
    pub enabled: bool,
    pub intensity: f32,
    /// Flat ambient used when the procedural sky is disabled.
    pub ambient_color: Vec3,
}

impl Default for IblSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 1.0,
            ambient_color: Vec3::splat(0.03),
        }
    }
}

impl IblSettings {
    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.max(0.0);
    }

    pub fn set_ambient_color(&mut self, color: Vec3) {
        self.ambient_color = color.clamp(Vec3::ZERO, Vec3::ONE);
    }

    pub fn apply_preset(&mut self, preset: EnvironmentPreset) {
        let (intensity, ambient) = preset.values();
        self.set_intensity(intensity);
        self.set_ambient_color(ambient);
    }
}

/// Environment presets the editor can apply in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentPreset {
    Studio,
    Sunset,
    Night,
}

impl EnvironmentPreset {
    pub fn name(&self) -> &'static str {
        match self {
            EnvironmentPreset::Studio => "studio",
            EnvironmentPreset::Sunset => "sunset",
            EnvironmentPreset::Night => "night",
        }
    }

    fn values(&self) -> (f32, Vec3) {
        match self {
            EnvironmentPreset::Studio => (1.0, Vec3::splat(0.03)),
            EnvironmentPreset::Sunset => (0.8, Vec3::new(0.05, 0.03, 0.02)),
            EnvironmentPreset::Night => (0.25, Vec3::new(0.01, 0.01, 0.02)),
        }
    }
}
