//! Window management with winit for real-time preview

// Input state tracks multiple mouse buttons independently
// Lifetime annotation is clearer explicit
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::elidable_lifetime_names)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use marcher_core::host::background_image;
use marcher_core::sdf::scene_bounds;
use marcher_core::{Camera, Raymarcher, RenderSettings, SceneFile};
use tracing::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition},
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::raymarcher::{GpuRaymarcher, init_with_surface};
use crate::watch::SceneWatcher;

/// Configuration for the preview window
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Scene to show; the demo scene when absent
    pub scene_path: Option<PathBuf>,
    /// Reload the scene whenever its file changes
    pub watch: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Marcher Preview".to_string(),
            width: 1280,
            height: 720,
            scene_path: None,
            watch: false,
        }
    }
}

/// Input state for camera control
#[derive(Debug, Default)]
struct InputState {
    mouse_left: bool,
    mouse_right: bool,
    mouse_middle: bool,
    last_mouse_pos: Option<PhysicalPosition<f64>>,
    shift_held: bool,
}

/// Frames presented during the last second
#[derive(Debug, Default)]
struct FpsCounter {
    frame_times: VecDeque<Instant>,
}

impl FpsCounter {
    fn tick(&mut self) -> usize {
        let now = Instant::now();
        self.frame_times.push_back(now);
        while let Some(front) = self.frame_times.front() {
            if now.duration_since(*front).as_secs_f32() > 1.0 {
                self.frame_times.pop_front();
            } else {
                break;
            }
        }
        self.frame_times.len()
    }
}

/// Application state for the preview window
struct PreviewApp<'a> {
    config: WindowConfig,
    scene: SceneFile,
    host: Raymarcher,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'a>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    gpu: Option<GpuRaymarcher>,
    uploaded_revision: Option<u64>,
    /// Size and color of the background currently uploaded as the source
    uploaded_background: Option<((u32, u32), [f32; 4])>,
    camera: Camera,
    input: InputState,
    fps: FpsCounter,
    last_title_update: Instant,
    /// Last reload attempt failed; shown in the title until the next success
    reload_failed: bool,
    watcher: Option<SceneWatcher>,
    instance: wgpu::Instance,
}

impl<'a> PreviewApp<'a> {
    fn new(config: WindowConfig, scene: SceneFile, host: Raymarcher) -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let aspect = config.width as f32 / config.height.max(1) as f32;
        let camera = scene.camera(aspect);

        let watcher = match (&config.scene_path, config.watch) {
            (Some(path), true) => match SceneWatcher::new(None) {
                Ok(mut watcher) => match watcher.watch(path) {
                    Ok(()) => Some(watcher),
                    Err(e) => {
                        warn!("{e}");
                        None
                    }
                },
                Err(e) => {
                    warn!("{e}");
                    None
                }
            },
            _ => None,
        };

        Self {
            config,
            scene,
            host,
            window: None,
            surface: None,
            surface_config: None,
            gpu: None,
            uploaded_revision: None,
            uploaded_background: None,
            camera,
            input: InputState::default(),
            fps: FpsCounter::default(),
            last_title_update: Instant::now(),
            reload_failed: false,
            watcher,
            instance,
        }
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            if let (Some(config), Some(surface), Some(gpu)) =
                (&mut self.surface_config, &self.surface, &self.gpu)
            {
                // Surfaces past the texture limit fail validation
                let max = gpu.max_texture_dimension();
                config.width = new_size.width.min(max);
                config.height = new_size.height.min(max);
                surface.configure(gpu.device(), config);

                // Update camera aspect ratio
                self.camera.aspect = config.width as f32 / config.height as f32;
            }
        }
    }

    fn handle_mouse_motion(&mut self, position: PhysicalPosition<f64>) {
        if let Some(last_pos) = self.input.last_mouse_pos {
            let dx = (position.x - last_pos.x) as f32 * 0.005;
            let dy = (position.y - last_pos.y) as f32 * 0.005;

            if self.input.mouse_right || (self.input.mouse_left && self.input.shift_held) {
                self.camera.pan(-dx * 2.0, dy * 2.0);
            } else if self.input.mouse_left {
                self.camera.orbit(dx, dy);
            } else if self.input.mouse_middle {
                self.camera.zoom(dy * 5.0);
            }
        }
        self.input.last_mouse_pos = Some(position);
    }

    fn handle_scroll(&mut self, delta: MouseScrollDelta) {
        let scroll = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
        };
        self.camera.zoom(scroll * 0.5);
    }

    fn reload_scene(&mut self) {
        let Some(path) = self.config.scene_path.clone() else {
            return;
        };

        let reloaded = SceneFile::load(&path).and_then(|scene| {
            let host = scene.clone().into_raymarcher()?;
            Ok((scene, host))
        });
        match reloaded {
            Ok((scene, host)) => {
                info!(path = %path.display(), "Reloaded scene");
                self.scene = scene;
                self.host = host;
                self.uploaded_revision = None;
                self.uploaded_background = None;
                self.reload_failed = false;
            }
            Err(e) => {
                error!("Failed to reload scene: {e}");
                self.reload_failed = true;
            }
        }
    }

    fn check_watcher(&mut self) {
        let modified = self
            .watcher
            .as_ref()
            .is_some_and(SceneWatcher::take_modified);
        if modified {
            self.reload_scene();
        }
    }

    fn frame_scene(&mut self) {
        if let Some(bounds) = scene_bounds(self.host.buffer().primitives()) {
            self.camera.frame_bounds(&bounds, 0.3);
        }
    }

    fn reset_camera(&mut self) {
        self.camera = self.scene.camera(self.camera.aspect);
    }

    fn handle_key(&mut self, key: &Key, event_loop: &ActiveEventLoop) {
        match key {
            Key::Named(NamedKey::Escape) => event_loop.exit(),
            Key::Character(c) => match c.as_str() {
                "r" | "R" if self.input.shift_held => self.reload_scene(),
                "r" | "R" => self.reset_camera(),
                "f" | "F" => self.frame_scene(),
                other => toggle_setting(&mut self.host.settings, other),
            },
            _ => {}
        }
    }

    fn update_title(&mut self, fps: usize) {
        if self.last_title_update.elapsed().as_secs_f32() < 0.5 {
            return;
        }
        self.last_title_update = Instant::now();

        let Some(window) = &self.window else {
            return;
        };
        let settings = &self.host.settings;
        window.set_title(&format!(
            "{} - {} FPS - normals {:?}, shadows {:?}{}{}",
            self.config.title,
            fps,
            settings.normals,
            settings.shadows,
            if settings.debug_steps { ", debug steps" } else { "" },
            if self.reload_failed { " - ERROR" } else { "" },
        ));
    }

    fn render(&mut self) {
        self.host.late_update();

        let (Some(surface), Some(gpu), Some(config)) =
            (&self.surface, &mut self.gpu, &self.surface_config)
        else {
            return;
        };

        gpu.set_settings(&self.host.settings);
        let revision = self.host.buffer().revision();
        if self.uploaded_revision != Some(revision) {
            gpu.upload(self.host.buffer());
            self.uploaded_revision = Some(revision);
        }

        let size = (config.width, config.height);
        let background = self.host.settings.background;
        if self.uploaded_background != Some((size, background)) {
            if let Err(e) = gpu.set_source_image(&background_image(size.0, size.1, background)) {
                warn!("{e}");
                return;
            }
            self.uploaded_background = Some((size, background));
        }

        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(gpu.device(), config);
                return;
            }
            Err(e) => {
                warn!("Surface error: {e:?}");
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        gpu.update_camera(&self.camera, [config.width as f32, config.height as f32]);
        if let Err(e) = gpu.render(&view) {
            warn!("Render failed: {e}");
        }
        output.present();

        let fps = self.fps.tick();
        self.update_title(fps);
    }
}

/// Number keys cycle or toggle the render settings
fn toggle_setting(settings: &mut RenderSettings, key: &str) {
    match key {
        "1" => settings.normals = settings.normals.next(),
        "2" => settings.shadows = settings.shadows.next(),
        "3" => settings.debug_steps = !settings.debug_steps,
        "4" => settings.ambient_occlusion = !settings.ambient_occlusion,
        "5" => settings.ambient = !settings.ambient,
        "6" => settings.specular = !settings.specular,
        _ => {}
    }
}

impl ApplicationHandler for PreviewApp<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let surface = match self.instance.create_surface(window.clone()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to create surface: {e}");
                event_loop.exit();
                return;
            }
        };

        let (device, queue, format) =
            match pollster::block_on(init_with_surface(&self.instance, &surface)) {
                Ok(r) => r,
                Err(e) => {
                    error!("Failed to initialize GPU: {e}");
                    event_loop.exit();
                    return;
                }
            };

        let size = window.inner_size();
        let max = device.limits().max_texture_dimension_2d;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.clamp(1, max),
            height: size.height.clamp(1, max),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let gpu = GpuRaymarcher::new(device, queue, format, &self.host.settings);

        self.camera.aspect = surface_config.width as f32 / surface_config.height as f32;

        self.window = Some(window);
        self.surface = Some(surface);
        self.surface_config = Some(surface_config);
        self.gpu = Some(gpu);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.resize(new_size);
            }
            WindowEvent::RedrawRequested => {
                self.check_watcher();
                self.render();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.input.mouse_left = pressed,
                    MouseButton::Right => self.input.mouse_right = pressed,
                    MouseButton::Middle => self.input.mouse_middle = pressed,
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_mouse_motion(position);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.handle_scroll(delta);
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.input.shift_held = modifiers.state().shift_key();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    self.handle_key(&event.logical_key, event_loop);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Run the preview window
///
/// Loads `config.scene_path` when given, the demo scene otherwise.
pub fn run_preview(config: WindowConfig) -> anyhow::Result<()> {
    let scene = match &config.scene_path {
        Some(path) => SceneFile::load(path)?,
        None => SceneFile::demo(),
    };
    let host = scene.clone().into_raymarcher()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = PreviewApp::new(config, scene, host);
    event_loop.run_app(&mut app)?;

    Ok(())
}

/// Preview controls help text
pub fn controls_help() -> &'static str {
    "
Preview Controls:
  Left Mouse Drag   - Orbit camera around target
  Right Mouse Drag  - Pan camera
  Middle Mouse Drag - Zoom camera
  Scroll Wheel      - Zoom camera
  Shift + Left Drag - Pan camera (alternative)
  R                 - Reset camera to the scene camera
  Shift + R         - Reload scene file
  F                 - Frame all primitives
  1                 - Cycle normal estimator
  2                 - Cycle shadow mode
  3                 - Toggle debug steps
  4                 - Toggle ambient occlusion
  5                 - Toggle ambient light
  6                 - Toggle specular highlights
  Escape            - Close preview
"
}
