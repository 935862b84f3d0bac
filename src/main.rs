use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use glam::Vec2;

mod mesh;
mod net;
mod pipeline;
mod renderer;
mod ui;

use mesh::{LoadEvent, MeshLoader};
use net::{GenerateEngine, GenerationRequest, ImageAsset, ServiceConfig};
use pipeline::{SubmitState, ViewPhase, ViewState};
use renderer::{Camera, GpuState, generate_grid_vertices};
use ui::{UiActions, UiState, apply_theme, draw_help_overlay, draw_side_panel, draw_viewport_message};

#[derive(Default)]
struct InputState {
    orbiting: bool,
    panning: bool,
    mouse_delta: Vec2,
}

struct App {
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    egui_state: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
    egui_ctx: egui::Context,

    camera: Camera,
    engine: GenerateEngine,
    loader: MeshLoader,
    submit: SubmitState,
    view: ViewState,
    ui_state: UiState,
    input: InputState,

    grid_uploaded: bool,
}

impl App {
    fn new() -> Self {
        Self {
            window: None,
            gpu: None,
            egui_state: None,
            egui_renderer: None,
            egui_ctx: egui::Context::default(),

            camera: Camera::default(),
            engine: GenerateEngine::new(),
            loader: MeshLoader::new(),
            submit: SubmitState::Idle,
            view: ViewState::new(),
            ui_state: UiState::default(),
            input: InputState::default(),

            grid_uploaded: false,
        }
    }

    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            base_url: self.ui_state.base_url.clone(),
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) {
        let gpu = pollster::block_on(GpuState::new(window.clone()));

        let egui_state = egui_winit::State::new(
            self.egui_ctx.clone(),
            self.egui_ctx.viewport_id(),
            &window,
            Some(window.scale_factor() as f32),
            None,
            Some(2048),
        );

        let egui_renderer =
            egui_wgpu::Renderer::new(&gpu.device, gpu.config.format, None, 1, false);

        apply_theme(&self.egui_ctx);

        self.window = Some(window);
        self.gpu = Some(gpu);
        self.egui_state = Some(egui_state);
        self.egui_renderer = Some(egui_renderer);
    }

    /// Drain engine and loader completions. A settled generation hands its
    /// file straight to the loader; a committed mesh goes to the GPU and the
    /// camera returns home.
    fn update(&mut self) {
        while let Some((id, result)) = self.engine.try_recv_result() {
            match self.submit.settle(id, result) {
                Some(generated) => {
                    let config = self.service_config();
                    let url = config.resolve(&generated.file_url);
                    let load_id = self.loader.request(&url, generated.file_type);
                    self.view.begin_load(load_id, generated.file_type);
                    if let Some(gpu) = &mut self.gpu {
                        gpu.mesh_buffers.clear_mesh();
                    }
                }
                None => {
                    // Either a failure or a superseded completion. On failure
                    // the previous model stays cleared rather than lingering
                    // under an error banner.
                    if matches!(self.submit, SubmitState::Failed(_)) {
                        self.view.reset();
                        if let Some(gpu) = &mut self.gpu {
                            gpu.mesh_buffers.clear_mesh();
                        }
                    }
                }
            }
        }

        while let Some(event) = self.loader.try_recv_event() {
            match event {
                LoadEvent::Decoding { id } => self.view.note_decoding(id),
                LoadEvent::Finished { id, result } => {
                    self.view.settle(id, result);
                }
            }
        }

        if self.view.take_dirty() {
            let mut uploaded = true;
            if let (Some(gpu), Some(geometry)) = (&mut self.gpu, self.view.geometry()) {
                uploaded = gpu.mesh_buffers.upload_mesh(&gpu.queue, geometry);
                if uploaded {
                    self.camera.reset();
                }
            }
            if !uploaded {
                self.view.fail("model is too large to display");
            }
        }

        if self.input.orbiting {
            self.camera.orbit(self.input.mouse_delta);
        } else if self.input.panning {
            self.camera.pan(self.input.mouse_delta);
        }
        self.input.mouse_delta = Vec2::ZERO;

        if self.ui_state.show_grid && !self.grid_uploaded {
            if let Some(gpu) = &mut self.gpu {
                let grid_verts = generate_grid_vertices(250.0, 20);
                gpu.mesh_buffers.upload_grid(&gpu.queue, &grid_verts);
                self.grid_uploaded = true;
            }
        }
    }

    fn handle_ui_actions(&mut self, actions: UiActions) {
        if let Some(path) = actions.image_picked {
            match ImageAsset::read_from(&path) {
                Ok(image) => {
                    log::info!("selected heightmap {}", image.file_name);
                    self.ui_state.image = Some(image);
                }
                Err(e) => {
                    log::warn!("could not read {}: {e}", path.display());
                    self.submit = SubmitState::Failed(format!("could not read image: {e}"));
                }
            }
        }

        if actions.clear_image {
            self.ui_state.image = None;
        }

        if actions.submit {
            if let Some(image) = self.ui_state.image.clone() {
                let request = GenerationRequest {
                    image,
                    params: self.ui_state.parameters(),
                };
                let config = self.service_config();
                match self.engine.submit(&config, request) {
                    Ok(id) => self.submit.begin(id),
                    Err(e) => self.submit.reject(&e),
                }
            } else {
                self.submit = SubmitState::Failed("no image selected".to_string());
            }
        }

        if actions.reset_camera {
            self.camera.reset();
        }
    }

    fn render(&mut self) {
        let (Some(window), Some(egui_state)) = (&self.window, &mut self.egui_state) else {
            return;
        };

        let raw_input = egui_state.take_egui_input(window);

        let mut ui_actions = UiActions::default();

        let worker_error = self
            .engine
            .last_error()
            .or_else(|| self.loader.last_error());

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            ui_actions = draw_side_panel(
                ctx,
                &mut self.ui_state,
                &self.submit,
                &self.view,
                &worker_error,
            );

            if self.view.geometry().is_none() {
                let message = match self.view.phase() {
                    ViewPhase::Fetching { .. } | ViewPhase::Decoding { .. } => "Loading model...",
                    _ if self.submit.is_submitting() => "Generating model...",
                    _ => "No model yet",
                };
                draw_viewport_message(ctx, message);
            }

            if self.ui_state.show_help {
                draw_help_overlay(ctx);
            }
        });

        self.handle_ui_actions(ui_actions);

        let Some(gpu) = &mut self.gpu else { return };
        let Some(window) = &self.window else { return };
        let Some(egui_state) = &mut self.egui_state else {
            return;
        };
        let Some(egui_renderer) = &mut self.egui_renderer else {
            return;
        };

        egui_state.handle_platform_output(window, full_output.platform_output);

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.resize(gpu.size);
                return;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                panic!("Out of GPU memory");
            }
            Err(wgpu::SurfaceError::Timeout) => {
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        gpu.update_camera(&self.camera);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, delta) in full_output.textures_delta.set {
            egui_renderer.update_texture(&gpu.device, &gpu.queue, id, &delta);
        }

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Main Encoder"),
            });

        egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        if self.ui_state.show_grid {
            gpu.render_grid(&view, &mut encoder, true);
        } else {
            gpu.clear_scene(&view, &mut encoder);
        }
        gpu.render_mesh(&view, &mut encoder);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut render_pass = render_pass.forget_lifetime();
            egui_renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        for id in full_output.textures_delta.free {
            egui_renderer.free_texture(&id);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        window.request_redraw();
    }

    fn set_cursor_grabbed(&self, grabbed: bool) {
        if let Some(window) = &self.window {
            if grabbed {
                let _ = window.set_cursor_grab(winit::window::CursorGrabMode::Confined);
                window.set_cursor_visible(false);
            } else {
                let _ = window.set_cursor_grab(winit::window::CursorGrabMode::None);
                window.set_cursor_visible(true);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window_attrs = Window::default_attributes()
            .with_title("Relief Forge")
            .with_inner_size(PhysicalSize::new(1600, 900));

        let window = Arc::new(event_loop.create_window(window_attrs).unwrap());
        self.init_gpu(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(egui_state) = &mut self.egui_state {
            if let Some(window) = &self.window {
                let response = egui_state.on_window_event(window, &event);
                if response.consumed {
                    return;
                }
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.engine.stop();
                self.loader.stop();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size);
                    self.camera
                        .set_aspect(size.width as f32, size.height as f32);
                }
            }

            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state,
                ..
            } => {
                self.input.orbiting = state == ElementState::Pressed;
                self.set_cursor_grabbed(self.input.orbiting);
            }

            WindowEvent::MouseInput {
                button: MouseButton::Middle,
                state,
                ..
            } => {
                self.input.panning = state == ElementState::Pressed;
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    winit::event::MouseScrollDelta::LineDelta(_, y) => y,
                    winit::event::MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.camera.zoom(scroll);
            }

            WindowEvent::RedrawRequested => {
                self.update();
                self.render();
            }

            _ => {}
        }
    }

    fn device_event(&mut self, _: &ActiveEventLoop, _: winit::event::DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.input.orbiting || self.input.panning {
                self.input.mouse_delta.x += delta.0 as f32;
                self.input.mouse_delta.y += delta.1 as f32;
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() {
    env_logger::init();

    let event_loop = EventLoop::new().unwrap();
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app).unwrap();
}
