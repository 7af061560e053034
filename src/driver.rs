use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use glam::Vec3;
use log::{info, warn};
use winit::dpi::PhysicalSize;

use crate::camera::OrbitCamera;
use crate::light::{IblSettings, Light};
use crate::renderer::{FrameContext, Renderer};
use crate::scene::SceneGraph;

/// Delta time is clamped so a long stall (debugger, suspended laptop)
/// does not catapult the animation.
const MAX_DELTA: Duration = Duration::from_millis(250);

/// Read-only frame statistics for the once-per-second UI poll.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Telemetry {
    pub fps: f32,
    pub frame_count: u64,
    pub camera_distance: f32,
    pub camera_position: Vec3,
}

/// Monotonic frame clock: delta time plus a one-second FPS window.
#[derive(Debug)]
pub(crate) struct FrameClock {
    last_frame: Instant,
    window_start: Instant,
    frames_in_window: u32,
    fps: f32,
    frame_count: u64,
}

impl FrameClock {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            window_start: now,
            frames_in_window: 0,
            fps: 0.0,
            frame_count: 0,
        }
    }

    fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let dt = now.duration_since(self.last_frame).min(MAX_DELTA);
        self.last_frame = now;
        self.frame_count += 1;
        self.frames_in_window += 1;

        let window = now.duration_since(self.window_start);
        if window >= Duration::from_secs(1) {
            self.fps = self.frames_in_window as f32 / window.as_secs_f32();
            self.frames_in_window = 0;
            self.window_start = now;
        }

        dt.as_secs_f32()
    }
}

/// Orchestrates one frame: advance time, update the scene, bind globals,
/// draw every object. Also the error boundary for per-frame GPU work:
/// nothing a single frame does can halt the loop short of the device
/// running out of memory.
pub struct FrameDriver {
    renderer: Renderer,
    scene: SceneGraph,
    camera: OrbitCamera,
    lights: Vec<Light>,
    ibl: IblSettings,
    clock: FrameClock,
}

impl FrameDriver {
    pub fn new(renderer: Renderer, camera: OrbitCamera) -> Self {
        Self {
            renderer,
            scene: SceneGraph::new(),
            camera,
            lights: Vec::new(),
            ibl: IblSettings::default(),
            clock: FrameClock::new(),
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut Vec<Light> {
        &mut self.lights
    }

    pub fn ibl(&self) -> &IblSettings {
        &self.ibl
    }

    pub fn ibl_mut(&mut self) -> &mut IblSettings {
        &mut self.ibl
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            fps: self.clock.fps,
            frame_count: self.clock.frame_count,
            camera_distance: self.camera.radius(),
            camera_position: self.camera.position(),
        }
    }

    /// Propagates a window resize to the swap chain and the projection.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.renderer.resize(new_size);
        if new_size.height > 0 {
            self.camera
                .set_aspect(new_size.width as f32 / new_size.height as f32);
        }
    }

    /// Runs one Update + Draw cycle. Recoverable surface errors are
    /// handled here and the next frame proceeds normally.
    pub fn frame(&mut self) -> Result<()> {
        let dt = self.clock.tick();
        self.scene.update(dt);

        let frame = FrameContext {
            view: self.camera.view(),
            projection: self.camera.projection(),
            camera_position: self.camera.position(),
            lights: &self.lights,
            ibl: self.ibl,
        };

        match self.renderer.render(&self.scene, &frame) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                info!("surface lost or outdated; reconfiguring");
                let size = self.renderer.window().inner_size();
                self.renderer.resize(size);
                Ok(())
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; skipping this frame");
                Ok(())
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow!("GPU is out of memory")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_time_is_clamped_against_stalls() {
        let mut clock = FrameClock::new();
        let start = clock.last_frame;
        let dt = clock.tick_at(start + Duration::from_secs(30));
        assert!((dt - MAX_DELTA.as_secs_f32()).abs() < 1e-6);
    }

    #[test]
    fn fps_settles_after_a_full_window() {
        let mut clock = FrameClock::new();
        let start = clock.last_frame;
        // 60 frames over exactly one second.
        for i in 1..=60u32 {
            clock.tick_at(start + Duration::from_millis(u64::from(i) * 1000 / 60));
        }
        assert!((clock.fps - 60.0).abs() < 2.0);
        assert_eq!(clock.frame_count, 60);
    }

    #[test]
    fn fps_stays_zero_before_the_first_window_closes() {
        let mut clock = FrameClock::new();
        let start = clock.last_frame;
        clock.tick_at(start + Duration::from_millis(16));
        assert_eq!(clock.fps, 0.0);
    }
}
