//! Reference implementation of the shading core.
//!
//! This module mirrors `shader.wgsl` term for term: the Cook-Torrance
//! BRDF, the per-kind attenuation models, the procedural image-based
//! ambient approximation and the final tonemap. The WGSL copy is what the
//! GPU runs; this copy is what the tests exercise, so the two must stay
//! in lockstep whenever either changes.

use std::f32::consts::PI;

use glam::Vec3;

use crate::light::{IblSettings, Light, LightKind, MAX_LIGHTS};
use crate::material::Material;

/// Lights whose combined attenuation falls below this contribute nothing
/// and are skipped before any BRDF work.
pub const ATTENUATION_CUTOFF: f32 = 0.001;

/// Guards the specular denominator at grazing angles.
const SPECULAR_EPS: f32 = 1e-4;

/// Hermite interpolation between two edges; the edges may be reversed,
/// which yields the descending ramp the attenuation models rely on.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// GGX / Trowbridge-Reitz normal distribution, `a = roughness^2`.
pub fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * d * d)
}

fn geometry_schlick_ggx(n_dot_x: f32, k: f32) -> f32 {
    n_dot_x / (n_dot_x * (1.0 - k) + k)
}

/// Smith geometry term with the Schlick-GGX approximation per direction,
/// `k = (roughness + 1)^2 / 8` (direct-lighting remap).
pub fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let k = (roughness + 1.0) * (roughness + 1.0) / 8.0;
    geometry_schlick_ggx(n_dot_v, k) * geometry_schlick_ggx(n_dot_l, k)
}

/// Schlick's Fresnel approximation.
pub fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

/// Roughness-aware Fresnel used by the ambient term.
pub fn fresnel_schlick_roughness(cos_theta: f32, f0: Vec3, roughness: f32) -> Vec3 {
    let max_reflectance = Vec3::splat(1.0 - roughness).max(f0);
    f0 + (max_reflectance - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

/// Base reflectance: 0.04 for dielectrics, albedo for conductors.
pub fn base_reflectance(material: &Material) -> Vec3 {
    Vec3::splat(0.04).lerp(material.albedo, material.metallic)
}

/// Direction toward the light and the combined attenuation (intensity,
/// distance falloff and cone falloff). Returns `None` once the
/// contribution drops below [`ATTENUATION_CUTOFF`].
pub fn light_sample(light: &Light, world_pos: Vec3) -> Option<(Vec3, f32)> {
    let (l_dir, mut attenuation) = match light.kind {
        LightKind::Directional => (-light.direction.normalize_or_zero(), light.intensity),
        LightKind::Point | LightKind::Spot => {
            let to_light = light.position - world_pos;
            let distance = to_light.length();
            if distance <= f32::EPSILON {
                return None;
            }
            let falloff = light.intensity / (distance * distance)
                * smoothstep(light.range, light.range * 0.5, distance);
            (to_light / distance, falloff)
        }
    };

    if light.kind == LightKind::Spot {
        let cos_theta = l_dir.dot(-light.direction.normalize_or_zero());
        attenuation *= smoothstep(
            light.outer_cone_deg.to_radians().cos(),
            light.inner_cone_deg.to_radians().cos(),
            cos_theta,
        );
    }

    (attenuation >= ATTENUATION_CUTOFF).then_some((l_dir, attenuation))
}

/// Cook-Torrance evaluation for one light direction. Returns the diffuse
/// and specular reflectance separately; neither is scaled by radiance or
/// `N.L` yet.
pub fn cook_torrance(material: &Material, n: Vec3, v: Vec3, l: Vec3) -> (Vec3, Vec3) {
    let h = (v + l).normalize_or_zero();
    let n_dot_v = n.dot(v).max(0.0);
    let n_dot_l = n.dot(l).max(0.0);
    let n_dot_h = n.dot(h).max(0.0);
    let h_dot_v = h.dot(v).max(0.0);

    let f0 = base_reflectance(material);
    let d = distribution_ggx(n_dot_h, material.roughness);
    let g = geometry_smith(n_dot_v, n_dot_l, material.roughness);
    let f = fresnel_schlick(h_dot_v, f0);

    let specular = d * g * f / (4.0 * n_dot_v * n_dot_l + SPECULAR_EPS);
    // Energy conservation: whatever reflects specularly is removed from
    // the diffuse channel, and metals carry no diffuse at all.
    let diffuse = (Vec3::ONE - f) * (1.0 - material.metallic) * material.albedo / PI;
    (diffuse, specular)
}

/// Procedural sky: a vertical gradient standing in for a captured
/// environment map. Mirrored exactly in `shader.wgsl`.
pub fn sky_color(dir: Vec3) -> Vec3 {
    let zenith = Vec3::new(0.35, 0.55, 0.9);
    let horizon = Vec3::new(0.9, 0.85, 0.8);
    let ground = Vec3::new(0.25, 0.22, 0.2);
    let sky = horizon.lerp(zenith, dir.y.max(0.0).sqrt());
    ground.lerp(sky, smoothstep(-0.15, 0.25, dir.y))
}

/// Coarse irradiance estimate: three sky samples (surface normal, up,
/// down) blended to approximate the hemispherical integral. The weights
/// are empirical tuning, preserved as-is for visual parity.
pub fn sky_irradiance(n: Vec3) -> Vec3 {
    sky_color(n) * 0.6 + sky_color(Vec3::Y) * 0.25 + sky_color(Vec3::NEG_Y) * 0.15
}

/// Ambient term: procedural-sky IBL when enabled, flat fallback otherwise.
pub fn ambient_term(material: &Material, n: Vec3, v: Vec3, ibl: &IblSettings) -> Vec3 {
    if !ibl.enabled {
        return ibl.ambient_color * material.albedo * material.ao;
    }

    let n_dot_v = n.dot(v).max(0.0);
    let f0 = base_reflectance(material);
    let f = fresnel_schlick_roughness(n_dot_v, f0, material.roughness);
    let k_d = (Vec3::ONE - f) * (1.0 - material.metallic);

    let diffuse = k_d * sky_irradiance(n) * material.albedo;
    let reflection = (-v).reflect(n);
    // The (1 - roughness * 0.7) falloff is empirical, not physical;
    // kept identical to the shader.
    let specular = f * sky_color(reflection) * (1.0 - material.roughness * 0.7);

    (diffuse + specular) * material.ao * ibl.intensity
}

/// Reinhard tonemap followed by gamma encoding, component-wise.
pub fn tonemap(linear: Vec3) -> Vec3 {
    let compressed = linear / (linear + Vec3::ONE);
    compressed.powf(1.0 / 2.2)
}

/// Outgoing radiance from direct lighting only, before tonemapping.
pub fn direct_radiance(
    material: &Material,
    n: Vec3,
    world_pos: Vec3,
    camera_pos: Vec3,
    lights: &[Light],
) -> Vec3 {
    let v = (camera_pos - world_pos).normalize_or_zero();
    let mut lo = Vec3::ZERO;
    for light in lights.iter().take(MAX_LIGHTS) {
        let Some((l, attenuation)) = light_sample(light, world_pos) else {
            continue;
        };
        let n_dot_l = n.dot(l).max(0.0);
        if n_dot_l <= 0.0 {
            continue;
        }
        let (diffuse, specular) = cook_torrance(material, n, v, l);
        lo += (diffuse + specular) * light.color * attenuation * n_dot_l;
    }
    lo
}

/// Full per-pixel evaluation: direct lighting plus ambient, tonemapped
/// and gamma encoded. Pure function of its inputs, exactly like the
/// fragment shader.
pub fn shade(
    material: &Material,
    n: Vec3,
    world_pos: Vec3,
    camera_pos: Vec3,
    lights: &[Light],
    ibl: &IblSettings,
) -> Vec3 {
    let n = n.normalize_or_zero();
    let v = (camera_pos - world_pos).normalize_or_zero();
    let lo = direct_radiance(material, n, world_pos, camera_pos, lights);
    let ambient = ambient_term(material, n, v, ibl);
    tonemap(ambient + lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialPreset;

    const EPS: f32 = 1e-5;

    fn ibl_off() -> IblSettings {
        IblSettings {
            enabled: false,
            intensity: 1.0,
            ambient_color: Vec3::ZERO,
        }
    }

    #[test]
    fn base_reflectance_endpoints() {
        let mut material = Material::new(Vec3::new(0.6, 0.3, 0.2), 0.0, 0.5, 1.0);
        assert!((base_reflectance(&material) - Vec3::splat(0.04)).length() < EPS);
        material.set_metallic(1.0);
        assert!((base_reflectance(&material) - material.albedo).length() < EPS);
    }

    #[test]
    fn fresnel_at_normal_incidence_returns_f0() {
        let f0 = Vec3::new(0.2, 0.5, 0.9);
        assert!((fresnel_schlick(1.0, f0) - f0).length() < EPS);
    }

    #[test]
    fn geometry_term_survives_floored_roughness() {
        // Roughness is floored at the write boundary, so the k denominator
        // in the Schlick-GGX term can never be zero.
        let material = Material::new(Vec3::ONE, 0.0, 0.0, 1.0);
        let g = geometry_smith(1.0, 1.0, material.roughness);
        assert!(g.is_finite());
        assert!(g > 0.0);
    }

    #[test]
    fn fully_metallic_surfaces_have_no_diffuse() {
        let material = Material::new(Vec3::new(1.0, 0.8, 0.1), 1.0, 0.3, 1.0);
        let n = Vec3::Y;
        let v = Vec3::new(0.3, 1.0, 0.2).normalize();
        let l = Vec3::new(-0.4, 1.0, 0.1).normalize();
        let (diffuse, _) = cook_torrance(&material, n, v, l);
        assert_eq!(diffuse, Vec3::ZERO);

        // The ambient diffuse channel vanishes as well.
        let ambient = ambient_term(&material, n, v, &IblSettings::default());
        let f = fresnel_schlick_roughness(n.dot(v).max(0.0), material.albedo, material.roughness);
        let expected_specular =
            f * sky_color((-v).reflect(n)) * (1.0 - material.roughness * 0.7);
        assert!((ambient - expected_specular).length() < EPS);
    }

    #[test]
    fn point_attenuation_fades_smoothly_to_range() {
        let light = Light::point(Vec3::ZERO, Vec3::ONE, 4.0, 10.0);
        // At the range boundary the contribution is gone entirely.
        assert!(light_sample(&light, Vec3::new(10.0, 0.0, 0.0)).is_none());
        // Inside half range the inverse-square law holds unmodified.
        let (_, near) = light_sample(&light, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        assert!((near - 4.0 / 4.0).abs() < EPS);
        // Past half range the smoothstep regime pulls it below 1/d^2.
        let (_, faded) = light_sample(&light, Vec3::new(7.0, 0.0, 0.0)).unwrap();
        assert!(faded < 4.0 / 49.0);
    }

    #[test]
    fn spot_contributes_nothing_outside_the_outer_cone() {
        let spot = Light::spot(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::NEG_Y,
            Vec3::ONE,
            10.0,
            20.0,
            15.0,
            30.0,
        );
        // Directly below: inside the inner cone, full contribution.
        assert!(light_sample(&spot, Vec3::new(0.0, 0.0, 0.0)).is_some());
        // Far off axis (45 degrees): outside the outer cone.
        assert!(light_sample(&spot, Vec3::new(5.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn dim_lights_are_skipped_entirely() {
        let light = Light::point(Vec3::ZERO, Vec3::ONE, 1e-4, 100.0);
        assert!(light_sample(&light, Vec3::new(1.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn gold_under_one_directional_light_is_pure_specular() {
        let gold = MaterialPreset::Gold.material();
        let n = Vec3::Y;
        let world_pos = Vec3::ZERO;
        let camera_pos = Vec3::new(0.0, 4.0, 0.0);
        let sun = Light::directional(Vec3::NEG_Y, Vec3::ONE, 3.0);

        let lo = direct_radiance(&gold, n, world_pos, camera_pos, &[sun]);
        let v = (camera_pos - world_pos).normalize();
        let (diffuse, specular) = cook_torrance(&gold, n, v, Vec3::Y);
        assert_eq!(diffuse, Vec3::ZERO);
        let expected = specular * sun.color * sun.intensity * 1.0;
        assert!((lo - expected).length() < 1e-4);

        let shaded = shade(&gold, n, world_pos, camera_pos, &[sun], &ibl_off());
        for channel in shaded.to_array() {
            assert!((0.0..=1.0).contains(&channel));
        }
    }

    #[test]
    fn no_lights_and_no_ibl_reduces_to_flat_ambient() {
        let material = Material::new(Vec3::new(0.5, 0.4, 0.3), 0.2, 0.6, 0.8);
        let ibl = IblSettings {
            enabled: false,
            intensity: 1.0,
            ambient_color: Vec3::new(0.2, 0.1, 0.05),
        };
        let shaded = shade(
            &material,
            Vec3::Y,
            Vec3::ZERO,
            Vec3::new(0.0, 2.0, 2.0),
            &[],
            &ibl,
        );
        let expected = tonemap(ibl.ambient_color * material.albedo * material.ao);
        assert!((shaded - expected).length() < EPS);
    }

    #[test]
    fn only_the_first_eight_lights_contribute() {
        let material = Material::default();
        let sun = Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0);
        let eight = vec![sun; MAX_LIGHTS];
        let nine = vec![sun; MAX_LIGHTS + 1];
        let camera = Vec3::new(0.0, 3.0, 3.0);
        let a = direct_radiance(&material, Vec3::Y, Vec3::ZERO, camera, &eight);
        let b = direct_radiance(&material, Vec3::Y, Vec3::ZERO, camera, &nine);
        assert!((a - b).length() < EPS);
    }

    #[test]
    fn tonemap_output_stays_displayable() {
        for value in [Vec3::ZERO, Vec3::ONE, Vec3::splat(100.0), Vec3::splat(1e6)] {
            let mapped = tonemap(value);
            for channel in mapped.to_array() {
                assert!((0.0..=1.0).contains(&channel));
            }
        }
        assert_eq!(tonemap(Vec3::ZERO), Vec3::ZERO);
    }
}
