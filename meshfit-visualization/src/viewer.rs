//! Interactive mesh viewer
//!
//! Left drag orbits, right drag pans, the wheel zooms. `R` resets the
//! camera, `B` toggles the bounding box and `Esc` closes the window.

use crate::camera::Camera;
use crate::renderer::Renderer;
use crate::scene::{Scene, ViewOptions};
use meshfit_core::{Error, Result, TriangleMesh};
use std::sync::Arc;
use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::WindowBuilder,
};

const ORBIT_SPEED: f32 = 0.01;
const ZOOM_SPEED: f32 = 0.1;

/// Keyboard commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    ResetCamera,
    ToggleBoundingBox,
    Quit,
}

/// Map a key press to a viewer command
pub fn key_action(key: &Key) -> Option<ViewerAction> {
    match key {
        Key::Named(NamedKey::Escape) => Some(ViewerAction::Quit),
        Key::Character(c) => match c.as_str() {
            "r" | "R" => Some(ViewerAction::ResetCamera),
            "b" | "B" => Some(ViewerAction::ToggleBoundingBox),
            _ => None,
        },
        _ => None,
    }
}

/// Camera and toggles driven by window input
#[derive(Debug, Clone)]
pub struct ViewerState {
    pub camera: Camera,
    pub show_bbox: bool,
    left_pressed: bool,
    right_pressed: bool,
    last_mouse_pos: Option<PhysicalPosition<f64>>,
    viewport_height: f32,
}

impl ViewerState {
    pub fn new(scene: &Scene, options: &ViewOptions) -> Self {
        let mut camera = Camera::default();
        let (center, radius) = scene.framing();
        camera.fit_to_bounds(center, radius);
        Self {
            camera,
            show_bbox: options.show_bbox && !scene.bbox.is_empty(),
            left_pressed: false,
            right_pressed: false,
            last_mouse_pos: None,
            viewport_height: options.window_size.1.max(1) as f32,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.camera.aspect_ratio = width as f32 / height as f32;
            self.viewport_height = height as f32;
        }
    }

    /// Returns false when the viewer should close
    pub fn apply(&mut self, action: ViewerAction) -> bool {
        match action {
            ViewerAction::ResetCamera => {
                self.camera.reset();
                log::debug!("camera reset");
            }
            ViewerAction::ToggleBoundingBox => {
                self.show_bbox = !self.show_bbox;
                log::debug!("bounding box {}", if self.show_bbox { "shown" } else { "hidden" });
            }
            ViewerAction::Quit => return false,
        }
        true
    }

    pub fn mouse_button(&mut self, button: MouseButton, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        match button {
            MouseButton::Left => self.left_pressed = pressed,
            MouseButton::Right => self.right_pressed = pressed,
            _ => {}
        }
    }

    /// Returns true when the camera moved
    pub fn cursor_moved(&mut self, position: PhysicalPosition<f64>) -> bool {
        let moved = match self.last_mouse_pos {
            Some(last) => {
                let dx = (position.x - last.x) as f32;
                let dy = (position.y - last.y) as f32;
                if self.left_pressed {
                    self.camera.orbit(dx * ORBIT_SPEED, dy * ORBIT_SPEED);
                    true
                } else if self.right_pressed {
                    self.camera.pan(dx / self.viewport_height, dy / self.viewport_height);
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        self.last_mouse_pos = Some(position);
        moved
    }

    pub fn scroll(&mut self, delta: MouseScrollDelta) {
        let lines = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
        };
        self.camera.zoom(lines * ZOOM_SPEED);
    }
}

/// Interactive 3D viewer for a single mesh
pub struct Viewer {
    scene: Scene,
    options: ViewOptions,
}

impl Viewer {
    /// Create a new viewer
    pub fn new(mesh: &TriangleMesh, options: ViewOptions) -> Self {
        let scene = Scene::from_mesh(mesh, &options);
        log::debug!(
            "scene: {} triangles in {} batches, {} bbox lines",
            scene.triangle_count(),
            scene.batches.len(),
            scene.bbox.len() / 2
        );
        Self { scene, options }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Open the window and block until it is closed
    pub fn run(self) -> Result<()> {
        let event_loop = EventLoop::new()
            .map_err(|e| Error::Visualization(format!("Failed to create event loop: {}", e)))?;
        let (width, height) = self.options.window_size;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(self.options.title.as_str())
                .with_inner_size(LogicalSize::new(width as f64, height as f64))
                .build(&event_loop)
                .map_err(|e| Error::Visualization(format!("Failed to create window: {}", e)))?,
        );

        let mut renderer = pollster::block_on(Renderer::new(
            window.clone(),
            &self.scene,
            self.options.background_color,
        ))?;

        let mut state = ViewerState::new(&self.scene, &self.options);
        let size = window.inner_size();
        state.set_viewport(size.width, size.height);

        log::info!("Viewer open: drag to orbit (left) or pan (right), wheel to zoom, R reset, B box, Esc quit");

        let mut failure: Option<Error> = None;
        event_loop
            .run(|event, target| {
                target.set_control_flow(ControlFlow::Wait);

                let Event::WindowEvent { event, window_id } = event else { return };
                if window_id != window.id() {
                    return;
                }
                match event {
                    WindowEvent::CloseRequested => target.exit(),
                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                        state.set_viewport(new_size.width, new_size.height);
                        window.request_redraw();
                    }
                    WindowEvent::MouseInput { state: button_state, button, .. } => {
                        state.mouse_button(button, button_state);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        if state.cursor_moved(position) {
                            window.request_redraw();
                        }
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        state.scroll(delta);
                        window.request_redraw();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state != ElementState::Pressed || event.repeat {
                            return;
                        }
                        if let Some(action) = key_action(&event.logical_key) {
                            if !state.apply(action) {
                                target.exit();
                            }
                            window.request_redraw();
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        renderer.update_camera(&state.camera);
                        if let Err(e) = renderer.render(state.show_bbox) {
                            log::error!("Render error: {}", e);
                            failure = Some(e);
                            target.exit();
                        }
                    }
                    _ => {}
                }
            })
            .map_err(|e| Error::Visualization(format!("Event loop error: {}", e)))?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
