use std::time::{SystemTime, UNIX_EPOCH};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Lower bound applied to roughness so the geometry term denominator
/// never degenerates.
pub const MIN_ROUGHNESS: f32 = 0.01;

/// Surface parameters in the metallic/roughness workflow.
///
/// All fields are kept in-range by the write boundary (constructors,
/// setters, presets); the shading core assumes in-contract values.
/// Materials are plain values: each scene object owns its own copy, so
/// editing one object can never alias another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Linear-space base color.
    pub albedo: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::splat(0.8),
            metallic: 0.0,
            roughness: 0.5,
            ao: 1.0,
        }
    }
}

impl Material {
    /// Builds a material, clamping every field into its declared range.
    pub fn new(albedo: Vec3, metallic: f32, roughness: f32, ao: f32) -> Self {
        Self {
            albedo: albedo.clamp(Vec3::ZERO, Vec3::ONE),
            metallic: metallic.clamp(0.0, 1.0),
            roughness: roughness.clamp(MIN_ROUGHNESS, 1.0),
            ao: ao.clamp(0.0, 1.0),
        }
    }

    /// Builds a material from an sRGB-authored base color.
    pub fn from_srgb(albedo_srgb: Vec3, metallic: f32, roughness: f32, ao: f32) -> Self {
        Self::new(srgb_to_linear(albedo_srgb), metallic, roughness, ao)
    }

    pub fn set_albedo(&mut self, albedo: Vec3) {
        self.albedo = albedo.clamp(Vec3::ZERO, Vec3::ONE);
    }

    pub fn set_metallic(&mut self, metallic: f32) {
        self.metallic = metallic.clamp(0.0, 1.0);
    }

    pub fn set_roughness(&mut self, roughness: f32) {
        self.roughness = roughness.clamp(MIN_ROUGHNESS, 1.0);
    }

    pub fn set_ao(&mut self, ao: f32) {
        self.ao = ao.clamp(0.0, 1.0);
    }

    /// Replaces every field with the preset's values.
    pub fn apply_preset(&mut self, preset: MaterialPreset) {
        *self = preset.material();
    }

    /// Snapshot of the current values for the export collaborator.
    pub fn record(&self, name: &str) -> MaterialRecord {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        MaterialRecord {
            name: name.to_string(),
            albedo: self.albedo.to_array(),
            metallic: self.metallic,
            roughness: self.roughness,
            ao: self.ao,
            timestamp,
        }
    }
}

/// Flat record handed to the export collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub name: String,
    pub albedo: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
    pub timestamp: u64,
}

/// Named starting points for the editor; albedo is authored in sRGB and
/// decoded to linear on application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialPreset {
    Gold,
    Silver,
    Copper,
    RedPlastic,
    Rubber,
    Chrome,
}

impl MaterialPreset {
    pub const ALL: [MaterialPreset; 6] = [
        MaterialPreset::Gold,
        MaterialPreset::Silver,
        MaterialPreset::Copper,
        MaterialPreset::RedPlastic,
        MaterialPreset::Rubber,
        MaterialPreset::Chrome,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MaterialPreset::Gold => "gold",
            MaterialPreset::Silver => "silver",
            MaterialPreset::Copper => "copper",
            MaterialPreset::RedPlastic => "red-plastic",
            MaterialPreset::Rubber => "rubber",
            MaterialPreset::Chrome => "chrome",
        }
    }

    pub fn material(&self) -> Material {
        match self {
            MaterialPreset::Gold => {
                Material::new(Vec3::new(1.0, 0.8, 0.1), 1.0, 0.1, 1.0)
            }
            MaterialPreset::Silver => {
                Material::new(Vec3::new(0.95, 0.93, 0.88), 1.0, 0.15, 1.0)
            }
            MaterialPreset::Copper => {
                Material::new(Vec3::new(0.95, 0.64, 0.54), 1.0, 0.25, 1.0)
            }
            MaterialPreset::RedPlastic => {
                Material::from_srgb(Vec3::new(0.8, 0.05, 0.05), 0.0, 0.35, 1.0)
            }
            MaterialPreset::Rubber => {
                Material::from_srgb(Vec3::new(0.1, 0.1, 0.1), 0.0, 0.9, 1.0)
            }
            MaterialPreset::Chrome => {
                Material::new(Vec3::new(0.9, 0.9, 0.9), 1.0, MIN_ROUGHNESS, 1.0)
            }
        }
    }
}

/// Decodes an sRGB color to linear space, component-wise.
pub fn srgb_to_linear(srgb: Vec3) -> Vec3 {
    fn channel(c: f32) -> f32 {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }
    Vec3::new(channel(srgb.x), channel(srgb.y), channel(srgb.z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_clamps_every_field() {
        let material = Material::new(Vec3::new(-1.0, 2.0, 0.5), 1.5, 0.0, -0.2);
        assert_eq!(material.albedo, Vec3::new(0.0, 1.0, 0.5));
        assert_eq!(material.metallic, 1.0);
        assert_eq!(material.roughness, MIN_ROUGHNESS);
        assert_eq!(material.ao, 0.0);
    }

    #[test]
    fn roughness_is_always_floored_above_zero() {
        let mut material = Material::default();
        material.set_roughness(0.0);
        assert!(material.roughness > 0.0);
        material.set_roughness(-5.0);
        assert!(material.roughness > 0.0);
        for preset in MaterialPreset::ALL {
            assert!(preset.material().roughness > 0.0, "{}", preset.name());
        }
    }

    #[test]
    fn preset_application_is_idempotent() {
        let mut material = Material::default();
        material.apply_preset(MaterialPreset::Gold);
        let first = material;
        material.apply_preset(MaterialPreset::Gold);
        assert_eq!(material, first);
    }

    #[test]
    fn gold_preset_matches_authored_values() {
        let gold = MaterialPreset::Gold.material();
        assert_eq!(gold.albedo, Vec3::new(1.0, 0.8, 0.1));
        assert_eq!(gold.metallic, 1.0);
        assert!((gold.roughness - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn srgb_decode_endpoints() {
        assert_eq!(srgb_to_linear(Vec3::ZERO), Vec3::ZERO);
        let white = srgb_to_linear(Vec3::ONE);
        assert!((white - Vec3::ONE).length() < 1e-5);
        // Mid grey decodes below its encoded value.
        assert!(srgb_to_linear(Vec3::splat(0.5)).x < 0.5);
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = MaterialPreset::Copper.material().record("copper-ball");
        let json = serde_json::to_string(&record).unwrap();
        let back: MaterialRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
