use egui::{Color32, Context, RichText, ScrollArea, Ui};

use crate::net::ServiceConfig;
use crate::pipeline::{SubmitState, ViewPhase, ViewState};
use crate::ui::state::UiState;
use crate::ui::theme::*;

#[derive(Default)]
pub struct UiActions {
    pub submit: bool,
    pub image_picked: Option<std::path::PathBuf>,
    pub clear_image: bool,
    pub reset_camera: bool,
}

pub fn draw_side_panel(
    ctx: &Context,
    state: &mut UiState,
    submit: &SubmitState,
    view: &ViewState,
    worker_error: &Option<String>,
) -> UiActions {
    let mut actions = UiActions::default();

    egui::SidePanel::right("control_panel")
        .min_width(320.0)
        .max_width(420.0)
        .default_width(340.0)
        .frame(egui::Frame::default().fill(BG_PANEL).inner_margin(16.0))
        .show(ctx, |ui| {
            ScrollArea::vertical().show(ui, |ui| {
                ui.heading(RichText::new("RELIEF FORGE").strong());
                ui.add_space(4.0);
                ui.label(
                    RichText::new("Heightmap to printable relief")
                        .color(TEXT_MUTED)
                        .size(11.0),
                );
                ui.add_space(16.0);

                section_header(ui, "SERVICE");
                ui.add(
                    egui::TextEdit::singleline(&mut state.base_url)
                        .desired_width(ui.available_width())
                        .font(egui::FontId::new(12.0, egui::FontFamily::Monospace)),
                );
                ui.add_space(16.0);

                section_header(ui, "HEIGHTMAP");
                image_controls(ui, state, &mut actions);
                ui.add_space(16.0);
                ui.separator();
                ui.add_space(12.0);

                section_header(ui, "BLOCK");
                parameter_grid(ui, state);
                ui.add_space(12.0);

                section_header(ui, "EXTRUSION");
                extrusion_controls(ui, state);
                ui.add_space(16.0);

                generate_button(ui, state, submit, &mut actions);
                ui.add_space(16.0);
                ui.separator();
                ui.add_space(12.0);

                status_panel(ui, state, submit, view, worker_error);
                ui.add_space(16.0);

                section_header(ui, "VIEW");
                ui.horizontal(|ui| {
                    ui.checkbox(&mut state.show_grid, "Grid");
                    ui.checkbox(&mut state.show_help, "Help");
                    if ui.button("Reset Camera").clicked() {
                        actions.reset_camera = true;
                    }
                });
            });
        });

    actions
}

fn section_header(ui: &mut Ui, text: &str) {
    ui.label(RichText::new(text).color(TEXT_MUTED).size(11.0).strong());
    ui.add_space(4.0);
}

fn image_controls(ui: &mut Ui, state: &mut UiState, actions: &mut UiActions) {
    ui.horizontal(|ui| {
        if ui.button("Choose PNG...").clicked() {
            actions.image_picked = rfd::FileDialog::new()
                .add_filter("PNG image", &["png"])
                .pick_file();
        }
        if state.image.is_some() && ui.button("Clear").clicked() {
            actions.clear_image = true;
        }
    });
    ui.add_space(4.0);
    match &state.image {
        Some(image) => {
            ui.label(
                RichText::new(format!(
                    "{} ({:.1} KB)",
                    image.file_name,
                    image.bytes.len() as f64 / 1024.0
                ))
                .color(TEXT_PRIMARY)
                .size(11.0),
            );
        }
        None => {
            ui.label(
                RichText::new("No image selected")
                    .color(TEXT_MUTED)
                    .size(11.0)
                    .italics(),
            );
        }
    }
}

fn parameter_grid(ui: &mut Ui, state: &mut UiState) {
    egui::Grid::new("block_params")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Width");
            ui.add(
                egui::DragValue::new(&mut state.block_width)
                    .speed(1.0)
                    .range(1.0..=1000.0)
                    .suffix(" mm"),
            );
            ui.end_row();

            ui.label("Length");
            ui.add(
                egui::DragValue::new(&mut state.block_length)
                    .speed(1.0)
                    .range(1.0..=1000.0)
                    .suffix(" mm"),
            );
            ui.end_row();

            ui.label("Thickness");
            ui.add(
                egui::DragValue::new(&mut state.block_thickness)
                    .speed(0.5)
                    .range(0.1..=500.0)
                    .suffix(" mm"),
            );
            ui.end_row();

            ui.label("Relief depth");
            ui.add(
                egui::DragValue::new(&mut state.depth)
                    .speed(0.5)
                    .range(0.1..=500.0)
                    .suffix(" mm"),
            );
            ui.end_row();

            ui.label("Base height");
            ui.add(
                egui::DragValue::new(&mut state.base_height)
                    .speed(0.5)
                    .range(0.0..=500.0)
                    .suffix(" mm"),
            );
            ui.end_row();
        });
}

fn extrusion_controls(ui: &mut Ui, state: &mut UiState) {
    use crate::net::ExtrusionMode;

    ui.horizontal(|ui| {
        ui.label("Mode:");
        if ui
            .selectable_label(state.mode == ExtrusionMode::Protrude, "Protrude")
            .clicked()
        {
            state.mode = ExtrusionMode::Protrude;
        }
        if ui
            .selectable_label(state.mode == ExtrusionMode::Carve, "Carve")
            .clicked()
        {
            state.mode = ExtrusionMode::Carve;
        }
    });
    ui.checkbox(&mut state.invert, "Invert heightmap");
}

fn generate_button(ui: &mut Ui, state: &UiState, submit: &SubmitState, actions: &mut UiActions) {
    let busy = submit.is_submitting();
    let ready = state.image.is_some() && !busy;

    let (text, fill, text_color) = if busy {
        ("Generating...", BG_WIDGET, ACCENT_ORANGE)
    } else {
        ("Generate", ACCENT_GREEN, BG_PURE_BLACK)
    };

    let button = egui::Button::new(RichText::new(text).color(text_color))
        .fill(fill)
        .min_size(egui::vec2(ui.available_width(), 32.0));

    if ui.add_enabled(ready, button).clicked() {
        actions.submit = true;
    }
}

fn status_panel(
    ui: &mut Ui,
    state: &UiState,
    submit: &SubmitState,
    view: &ViewState,
    worker_error: &Option<String>,
) {
    section_header(ui, "STATUS");

    // Worker-side report, for when the state machines have nothing to say
    // about it yet.
    let already_shown = matches!(submit, SubmitState::Failed(_))
        || matches!(view.phase(), ViewPhase::Failed(_));
    if let Some(message) = worker_error {
        if !already_shown {
            ui.label(RichText::new(message).color(ACCENT_ORANGE).size(11.0));
            ui.add_space(4.0);
        }
    }

    match submit {
        SubmitState::Idle => {
            ui.label(RichText::new("Waiting for input").color(TEXT_MUTED).size(11.0));
        }
        SubmitState::Submitting { .. } => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(RichText::new("Generating model...").color(ACCENT_ORANGE).size(11.0));
            });
        }
        SubmitState::Failed(message) => {
            error_frame(ui, message);
        }
        SubmitState::Ready(result) => {
            match view.phase() {
                ViewPhase::Fetching { .. } => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(RichText::new("Downloading mesh...").color(ACCENT_BLUE).size(11.0));
                    });
                }
                ViewPhase::Decoding { .. } => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(RichText::new("Decoding mesh...").color(ACCENT_BLUE).size(11.0));
                    });
                }
                ViewPhase::Failed(message) => {
                    error_frame(ui, message);
                }
                ViewPhase::Ready { .. } | ViewPhase::Idle => {
                    ui.label(
                        RichText::new(format!("Model ready ({})", result.file_type))
                            .color(ACCENT_GREEN)
                            .size(11.0),
                    );
                }
            }

            let config = ServiceConfig {
                base_url: state.base_url.clone(),
            };
            ui.add_space(4.0);
            ui.hyperlink_to(
                format!("Download .{}", result.file_type),
                config.resolve(&result.file_url),
            );

            if let Some(geometry) = view.geometry() {
                ui.add_space(8.0);
                mesh_stats(ui, geometry, view.format());
            }
        }
    }
}

fn error_frame(ui: &mut Ui, message: &str) {
    egui::Frame::default()
        .fill(Color32::from_rgb(40, 15, 15))
        .stroke(egui::Stroke::new(1.0, ACCENT_RED))
        .rounding(4.0)
        .inner_margin(8.0)
        .show(ui, |ui| {
            ui.label(RichText::new(message).color(ACCENT_RED).size(11.0));
        });
}

fn mesh_stats(ui: &mut Ui, geometry: &crate::mesh::Geometry, format: Option<crate::mesh::MeshFormat>) {
    egui::Frame::default()
        .fill(BG_WIDGET)
        .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
        .rounding(6.0)
        .inner_margin(12.0)
        .show(ui, |ui| {
            ui.style_mut().override_font_id =
                Some(egui::FontId::new(11.0, egui::FontFamily::Monospace));

            egui::Grid::new("mesh_stats")
                .num_columns(2)
                .spacing([20.0, 4.0])
                .show(ui, |ui| {
                    if let Some(format) = format {
                        ui.label(RichText::new("Format").color(TEXT_MUTED));
                        ui.label(RichText::new(format.to_string()).color(TEXT_PRIMARY));
                        ui.end_row();
                    }

                    ui.label(RichText::new("Vertices").color(TEXT_MUTED));
                    ui.label(
                        RichText::new(fmt_num(geometry.vertex_count())).color(TEXT_PRIMARY),
                    );
                    ui.end_row();

                    ui.label(RichText::new("Triangles").color(TEXT_MUTED));
                    ui.label(
                        RichText::new(fmt_num(geometry.triangle_count())).color(TEXT_PRIMARY),
                    );
                    ui.end_row();

                    ui.label(RichText::new("Colors").color(TEXT_MUTED));
                    ui.label(
                        RichText::new(if geometry.has_colors() { "per-vertex" } else { "flat" })
                            .color(if geometry.has_colors() {
                                ACCENT_TEAL
                            } else {
                                TEXT_PRIMARY
                            }),
                    );
                    ui.end_row();
                });
        });
}

pub fn draw_help_overlay(ctx: &Context) {
    egui::Area::new(egui::Id::new("help_overlay"))
        .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(12.0, -12.0))
        .show(ctx, |ui| {
            egui::Frame::default()
                .fill(Color32::from_black_alpha(180))
                .rounding(6.0)
                .inner_margin(10.0)
                .show(ui, |ui| {
                    ui.style_mut().override_font_id =
                        Some(egui::FontId::new(11.0, egui::FontFamily::Monospace));
                    ui.label(
                        RichText::new("RMB+Drag - Orbit | MMB+Drag - Pan | Scroll - Zoom")
                            .color(TEXT_MUTED),
                    );
                });
        });
}

/// Centered overlay for the empty and in-flight viewport states.
pub fn draw_viewport_message(ctx: &Context, text: &str) {
    egui::Area::new(egui::Id::new("viewport_message"))
        .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .show(ctx, |ui| {
            ui.label(RichText::new(text).color(TEXT_MUTED).size(16.0));
        });
}

fn fmt_num(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}
