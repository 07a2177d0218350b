use std::path::PathBuf;
use std::sync::{Arc, mpsc};

use crate::canvas::{DisplayRect, Point, SelectionShape};
use crate::components::history::{HistoryAction, HistoryMode, HistoryPanel};
use crate::components::prompt::{PromptAction, PromptDialog};
use crate::components::tools::{BRUSH_SIZE_RANGE, Tool};
use crate::io::{self, FileHandler, LoadResult};
use crate::ops::edit_service::{EchoEditService, EditError, EditResponse, EditService, service_for_endpoint};
use crate::project::{EditorCommand, Outcome, Project};
use crate::settings::AppSettings;
use crate::{log_err, log_info, log_warn};

/// Outline color for selection overlays.
const OVERLAY_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 0, 0);
/// Translucent fill for brush strokes and eraser strokes.
const BRUSH_FILL: egui::Color32 = egui::Color32::from_rgba_premultiplied(90, 0, 0, 90);
const ERASER_FILL: egui::Color32 = egui::Color32::from_rgba_premultiplied(90, 90, 90, 90);

/// Reply delivered from a background edit request.
pub struct EditReply {
    pub token: u64,
    pub reply: Result<EditResponse, EditError>,
}

pub struct MaskFEApp {
    project: Project,
    settings: AppSettings,
    file_handler: FileHandler,

    // UI Components
    history_panel: HistoryPanel,
    prompt_dialog: PromptDialog,
    show_settings: bool,
    /// Editable copy of the settings shown in the settings window.
    settings_draft: AppSettings,

    service: Arc<dyn EditService>,

    // Canvas texture
    texture: Option<egui::TextureHandle>,
    texture_dirty: bool,
    /// Screen rect of the displayed canvas from the last frame.
    canvas_rect: Option<egui::Rect>,

    // Background work
    io_sender: mpsc::Sender<LoadResult>,
    io_receiver: mpsc::Receiver<LoadResult>,
    edit_sender: mpsc::Sender<EditReply>,
    edit_receiver: mpsc::Receiver<EditReply>,
    loading: bool,

    /// Message for the status line (export results etc.).
    status: Option<String>,
    last_title: String,
    pending_startup_files: Vec<PathBuf>,
}

impl MaskFEApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, startup_files: Vec<PathBuf>) -> Self {
        let settings = AppSettings::load();
        let service = build_service(&settings.edit_endpoint);
        let (io_sender, io_receiver) = mpsc::channel();
        let (edit_sender, edit_receiver) = mpsc::channel();
        log_info!("Edit service: {}", service.name());

        Self {
            project: Project::new(&settings),
            settings_draft: settings.clone(),
            settings,
            file_handler: FileHandler::default(),
            history_panel: HistoryPanel::default(),
            prompt_dialog: PromptDialog::default(),
            show_settings: false,
            service,
            texture: None,
            texture_dirty: true,
            canvas_rect: None,
            io_sender,
            io_receiver,
            edit_sender,
            edit_receiver,
            loading: false,
            status: None,
            last_title: String::new(),
            pending_startup_files: startup_files,
        }
    }

    // ========================================================================
    // COMMAND PLUMBING
    // ========================================================================

    /// Dispatch a command and keep the texture and dialog in sync with the result.
    fn run(&mut self, command: EditorCommand) -> bool {
        let touches_raster = !matches!(
            command,
            EditorCommand::PointerDown(_)
                | EditorCommand::PointerMove(_)
                | EditorCommand::SetPrompt(_)
                | EditorCommand::SetNegativePrompt(_)
                | EditorCommand::SetBrushSize(_)
                | EditorCommand::SetTool(_)
        );
        let had_pending = self.project.pending.is_some();
        let outcome = self.project.dispatch(command);
        self.after_outcome(&outcome, touches_raster, had_pending);
        outcome.is_applied()
    }

    fn after_outcome(&mut self, outcome: &Outcome, touches_raster: bool, had_pending: bool) {
        match outcome {
            Outcome::Applied if touches_raster => self.texture_dirty = true,
            Outcome::Failed(e) => self.status = Some(e.to_string()),
            _ => {}
        }
        if !had_pending && self.project.pending.is_some() {
            self.prompt_dialog.open();
        }
    }

    fn open_path(&mut self, path: PathBuf) {
        let generation = self.project.begin_load();
        let (max_w, max_h) = self.project.size_cap();
        log_info!("Loading {} (generation {})", path.display(), generation);
        io::spawn_load(path, generation, max_w, max_h, self.io_sender.clone());
        self.loading = true;
        self.status = None;
    }

    fn open_dialog(&mut self) {
        if let Some(path) = self.file_handler.pick_image_path() {
            self.open_path(path);
        }
    }

    fn download(&mut self) {
        let Some(raster) = self.project.raster().cloned() else { return };
        self.save_raster(&raster, &self.project.export_name());
    }

    fn download_version(&mut self, index: usize) {
        let Some(raster) = self.project.history.get(index).map(|v| v.raster.clone()) else { return };
        self.save_raster(&raster, &io::export_file_name(Some(index)));
    }

    /// Save the open proposal's selection mask (white = selected).
    fn download_mask(&mut self) {
        let Some(mask) = self.project.pending_mask() else { return };
        self.save_raster(&mask, "mask.png");
    }

    fn save_raster(&mut self, raster: &image::RgbaImage, default_name: &str) {
        let Some(path) = self.file_handler.pick_save_path(default_name) else { return };
        match self.file_handler.export(raster, &path) {
            Ok(()) => {
                log_info!("Exported {}", path.display());
                self.status = Some(format!("Saved {}", path.display()));
            }
            Err(e) => {
                log_err!("Export failed: {}", e);
                self.status = Some(format!("Export failed: {}", e));
            }
        }
    }

    fn new_image(&mut self) {
        self.project.close_image();
        self.file_handler.current_path = None;
        self.texture = None;
        self.texture_dirty = true;
        self.loading = false;
        self.status = None;
    }

    /// Hand the active proposal to the edit service on a worker thread.
    fn submit_edit(&mut self) {
        match self.project.begin_edit() {
            Ok(Some(ticket)) => {
                let service = Arc::clone(&self.service);
                let sender = self.edit_sender.clone();
                rayon::spawn(move || {
                    let reply = service.edit(&ticket.request);
                    let _ = sender.send(EditReply {
                        token: ticket.token,
                        reply,
                    });
                });
            }
            Ok(None) => {}
            Err(e) => {
                log_err!("Could not prepare edit: {}", e);
                self.status = Some(e.to_string());
            }
        }
    }

    fn apply_settings(&mut self) {
        self.settings = self.settings_draft.clone();
        self.settings.save();
        self.service = build_service(&self.settings.edit_endpoint);
        self.project.set_size_cap(self.settings.max_width, self.settings.max_height);
        self.run(EditorCommand::SetHistoryMode(self.settings.history_mode));
        self.run(EditorCommand::SetAutoEdit(self.settings.auto_edit));
        log_info!("Settings applied; edit service: {}", self.service.name());
    }

    // ========================================================================
    // BACKGROUND RESULTS
    // ========================================================================

    fn poll_background(&mut self) {
        while let Ok(done) = self.io_receiver.try_recv() {
            let path = done.path.clone();
            let outcome = self.project.finish_load(done.generation, Some(done.path), done.result);
            match outcome {
                Outcome::Applied => {
                    self.file_handler.current_path = Some(path);
                    self.texture_dirty = true;
                    self.loading = false;
                }
                Outcome::Failed(e) => {
                    self.status = Some(e.to_string());
                    self.loading = false;
                }
                Outcome::Ignored => {}
            }
        }
        while let Ok(done) = self.edit_receiver.try_recv() {
            let outcome = self.project.finish_edit(done.token, done.reply);
            self.after_outcome(&outcome, true, true);
        }
    }

    // ========================================================================
    // TEXTURE
    // ========================================================================

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if !self.texture_dirty && self.texture.is_some() {
            return;
        }
        let Some(raster) = self.project.raster() else {
            self.texture = None;
            return;
        };
        let size = [raster.width() as usize, raster.height() as usize];
        let image = egui::ColorImage::from_rgba_unmultiplied(size, raster.as_raw());
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => self.texture = Some(ctx.load_texture("canvas", image, egui::TextureOptions::LINEAR)),
        }
        self.texture_dirty = false;
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn show_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            if ui.button("📂 Open").clicked() {
                self.open_dialog();
            }
            ui.separator();

            for &tool in Tool::all() {
                if ui.selectable_label(self.project.tool == tool, tool.label()).clicked() {
                    self.run(EditorCommand::SetTool(tool));
                }
            }
            if self.project.tool.uses_brush() {
                let mut size = self.project.brush_size;
                let slider = egui::Slider::new(&mut size, BRUSH_SIZE_RANGE).text("Brush size");
                if ui.add(slider).changed() {
                    self.run(EditorCommand::SetBrushSize(size));
                    self.settings.brush_radius = self.project.brush_size / 2.0;
                    self.settings.save();
                }
            }
            ui.separator();

            let mut auto_edit = self.project.auto_edit;
            if ui.checkbox(&mut auto_edit, "Auto-Edit").on_hover_text("Fill and prompt as soon as a selection completes").changed() {
                self.run(EditorCommand::SetAutoEdit(auto_edit));
                self.settings.auto_edit = auto_edit;
                self.settings_draft.auto_edit = auto_edit;
                self.settings.save();
            }
            if !self.project.auto_edit {
                let can_fill = self.project.has_selecting_shape() && self.project.pending.is_none();
                if ui.add_enabled(can_fill, egui::Button::new("✂ Edit Selection")).clicked() {
                    self.run(EditorCommand::EditSelection);
                }
            }
            let has_selection = !self.project.completed.is_empty() || self.project.pending.is_some();
            if ui.add_enabled(has_selection, egui::Button::new("🗑 Clear")).clicked() {
                self.run(EditorCommand::ClearSelections);
            }
            ui.separator();

            let has_image = self.project.has_image();
            if ui.add_enabled(has_image, egui::Button::new("💾 Download")).clicked() {
                self.download();
            }
            let has_proposal = self.project.pending.is_some();
            if ui.add_enabled(has_proposal, egui::Button::new("🎭 Download Mask")).clicked() {
                self.download_mask();
            }
            if ui.add_enabled(has_image, egui::Button::new("🆕 New Image")).clicked() {
                self.new_image();
            }
            ui.separator();
            if ui.button("⚙ Settings").clicked() {
                self.settings_draft = self.settings.clone();
                self.show_settings = true;
            }
        });
    }

    fn show_bottom_panel(&mut self, ui: &mut egui::Ui) {
        let busy = self.project.is_busy();
        let editing_selection = self.project.pending.is_some();

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.label("Describe your edit");
                let mut prompt = self.project.prompt.clone();
                let edit = egui::TextEdit::multiline(&mut prompt)
                    .desired_rows(2)
                    .desired_width(ui.available_width() * 0.6)
                    .hint_text("Describe your edit... e.g. \"Replace the sky with a sunset\"");
                if ui.add_enabled(!editing_selection && !busy, edit).changed() {
                    self.run(EditorCommand::SetPrompt(prompt));
                }

                let mut negative = self.project.negative_prompt.clone();
                let neg_edit = egui::TextEdit::singleline(&mut negative)
                    .desired_width(ui.available_width() * 0.6)
                    .hint_text("Negative prompt (optional)");
                if ui.add_enabled(!busy, neg_edit).changed() {
                    self.run(EditorCommand::SetNegativePrompt(negative));
                }
            });

            let can_generate = !editing_selection && self.project.can_accept();
            if ui.add_enabled(can_generate, egui::Button::new("✨ Generate Edit")).clicked() {
                self.submit_edit();
            }
            if busy {
                ui.spinner();
                ui.label("Generating...");
            }
        });

        let message = self.project.last_error.clone().or_else(|| self.status.clone());
        if let Some(message) = message {
            ui.colored_label(ui.visuals().warn_fg_color, message);
        }
        ui.add_space(4.0);
    }

    fn show_upload_prompt(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() * 0.3);
            ui.heading("Upload an Image");
            ui.label("Drag and drop an image here, or click to browse");
            ui.weak("Supports: JPEG, PNG, GIF, BMP, WebP (max 10MB)");
            ui.add_space(8.0);
            if self.loading {
                ui.spinner();
            } else if ui.button("📂 Browse").clicked() {
                self.open_dialog();
            }
        });
    }

    fn show_canvas(&mut self, ui: &mut egui::Ui) {
        let Some((native_w, native_h)) = self.project.canvas.as_ref().map(|c| (c.width, c.height)) else {
            self.canvas_rect = None;
            self.show_upload_prompt(ui);
            return;
        };
        self.ensure_texture(ui.ctx());

        // Fit inside the panel without upscaling.
        let avail = ui.available_rect_before_wrap();
        let (w, h) = (native_w as f32, native_h as f32);
        let scale = (avail.width() / w).min(avail.height() / h).clamp(0.01, 1.0);
        let image_rect = egui::Rect::from_center_size(avail.center(), egui::vec2(w * scale, h * scale));
        let response = ui.allocate_rect(image_rect, egui::Sense::drag());
        self.canvas_rect = Some(image_rect);
        self.project.set_display(Some(DisplayRect::new(
            image_rect.left(),
            image_rect.top(),
            image_rect.width(),
            image_rect.height(),
        )));

        let painter = ui.painter_at(avail);
        if let Some(texture) = &self.texture {
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            painter.image(texture.id(), image_rect, uv, egui::Color32::WHITE);
        }

        self.handle_pointer(ui, &response, image_rect);
        self.paint_overlays(&painter, image_rect);

        if self.project.tool.captures_paths() && self.project.pending.is_none() && response.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Crosshair);
        }
    }

    /// Pointer events mapped onto session commands, one command per event.
    fn handle_pointer(&mut self, ui: &egui::Ui, response: &egui::Response, image_rect: egui::Rect) {
        let events = ui.input(|i| i.events.clone());
        let commands = pointer_commands(&events, image_rect, response.hovered(), self.project.is_drawing());
        for command in commands {
            self.run(command);
        }
    }

    fn paint_overlays(&self, painter: &egui::Painter, image_rect: egui::Rect) {
        let Some(canvas) = self.project.canvas.as_ref() else { return };
        let scale = image_rect.width() / canvas.width.max(1) as f32;
        let to_screen = |p: &Point| {
            let s = canvas.canvas_to_screen(*p);
            egui::pos2(s.x, s.y)
        };
        let dashed = egui::Stroke::new(2.0, OVERLAY_COLOR);

        for shape in &self.project.completed {
            match shape {
                SelectionShape::Lasso(points) => {
                    let mut pts: Vec<egui::Pos2> = points.iter().map(to_screen).collect();
                    if let Some(first) = pts.first().copied() {
                        pts.push(first);
                    }
                    painter.extend(egui::Shape::dashed_line(&pts, dashed, 5.0, 5.0));
                }
                SelectionShape::Stroke { points, radius } => {
                    paint_brush(painter, points.iter().map(to_screen).collect(), radius * scale, BRUSH_FILL);
                }
                SelectionShape::Erase { points, radius } => {
                    paint_brush(painter, points.iter().map(to_screen).collect(), radius * scale, ERASER_FILL);
                }
            }
        }

        let live = &self.project.capture.points;
        let tool = self.project.tool;
        if live.len() > 1 || (tool.uses_brush() && !live.is_empty()) {
            let pts: Vec<egui::Pos2> = live.iter().map(to_screen).collect();
            if tool.uses_brush() {
                let fill = if tool == Tool::Eraser { ERASER_FILL } else { BRUSH_FILL };
                paint_brush(painter, pts, self.project.brush_size / 2.0 * scale, fill);
            } else {
                painter.extend(egui::Shape::dashed_line(&pts, dashed, 5.0, 5.0));
            }
        }

        let count = self.project.selecting_shape_count();
        if count > 0 {
            let text = format!("{} area{} selected", count, if count == 1 { "" } else { "s" });
            let pos = image_rect.left_top() + egui::vec2(8.0, 8.0);
            let galley = painter.layout_no_wrap(text, egui::FontId::proportional(13.0), egui::Color32::WHITE);
            let badge = egui::Rect::from_min_size(pos, galley.size()).expand(4.0);
            painter.rect_filled(badge, 4.0, egui::Color32::from_rgb(37, 99, 235));
            painter.galley(pos, galley);
        }
    }

    fn show_prompt_dialog(&mut self, ctx: &egui::Context) {
        let (Some(image_rect), Some(local)) = (self.canvas_rect, self.project.dialog_position()) else { return };
        let Some(pending) = self.project.pending.as_ref() else { return };
        let mut text = pending.prompt_text.clone();
        let before = text.clone();
        let busy = self.project.is_busy();
        let screen_pos = image_rect.min + egui::vec2(local.x, local.y);

        let action = self.prompt_dialog.show(ctx, screen_pos, &mut text, busy);
        if text != before {
            self.run(EditorCommand::SetPrompt(text));
        }
        match action {
            PromptAction::Accept => self.submit_edit(),
            PromptAction::Reject => {
                self.run(EditorCommand::Reject);
            }
            PromptAction::None => {}
        }
    }

    fn show_settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        let mut apply = false;
        egui::Window::new("Settings")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                let draft = &mut self.settings_draft;
                egui::Grid::new("settings_grid").num_columns(2).spacing([12.0, 6.0]).show(ui, |ui| {
                    ui.label("Auto-Edit");
                    ui.checkbox(&mut draft.auto_edit, "Fill as soon as a selection completes");
                    ui.end_row();

                    ui.label("History");
                    egui::ComboBox::from_id_source("history_mode")
                        .selected_text(draft.history_mode.label())
                        .show_ui(ui, |ui| {
                            for mode in [HistoryMode::Linear, HistoryMode::Branching] {
                                ui.selectable_value(&mut draft.history_mode, mode, mode.label());
                            }
                        });
                    ui.end_row();

                    ui.label("Max size");
                    ui.horizontal(|ui| {
                        ui.add(egui::DragValue::new(&mut draft.max_width).clamp_range(1..=8192).suffix(" px"));
                        ui.label("×");
                        ui.add(egui::DragValue::new(&mut draft.max_height).clamp_range(1..=8192).suffix(" px"));
                    });
                    ui.end_row();

                    ui.label("Edit endpoint");
                    ui.add(egui::TextEdit::singleline(&mut draft.edit_endpoint).hint_text("empty = echo"));
                    ui.end_row();

                    ui.label("Negative prompt");
                    ui.text_edit_singleline(&mut draft.negative_prompt);
                    ui.end_row();
                });
                ui.add_space(6.0);
                ui.weak("Size changes apply to the next image you open.");
                if ui.button("Apply").clicked() {
                    apply = true;
                }
            });
        if apply {
            self.apply_settings();
            open = false;
        }
        self.show_settings = open;
    }
}

impl eframe::App for MaskFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let title = format!("MaskFE - {}", self.project.display_title());
        if title != self.last_title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.last_title = title;
        }

        if let Some(path) = take_startup_file(&mut self.pending_startup_files) {
            self.open_path(path);
        }

        let dropped: Vec<PathBuf> = ctx.input(|i| i.raw.dropped_files.iter().filter_map(|f| f.path.clone()).collect());
        if let Some(path) = dropped.into_iter().next() {
            self.open_path(path);
        }

        self.poll_background();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.show_toolbar(ui);
            ui.add_space(4.0);
        });

        egui::SidePanel::right("history")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                match self.history_panel.show(ui, &self.project.history) {
                    Some(HistoryAction::Navigate(index)) => {
                        self.run(EditorCommand::Navigate(index));
                    }
                    Some(HistoryAction::Download(index)) => self.download_version(index),
                    None => {}
                }
            });

        if self.project.has_image() {
            egui::TopBottomPanel::bottom("prompt_panel").show(ctx, |ui| self.show_bottom_panel(ui));
        }

        egui::CentralPanel::default().show(ctx, |ui| self.show_canvas(ui));

        if self.project.pending.is_some() {
            self.show_prompt_dialog(ctx);
        }
        if self.show_settings {
            self.show_settings_window(ctx);
        }

        if self.loading || self.project.is_busy() {
            ctx.request_repaint();
        }
    }
}

fn build_service(endpoint: &str) -> Arc<dyn EditService> {
    match service_for_endpoint(endpoint) {
        Ok(service) => Arc::from(service),
        Err(e) => {
            log_err!("Edit service unavailable ({}); falling back to echo", e);
            Arc::new(EchoEditService)
        }
    }
}

fn paint_brush(painter: &egui::Painter, points: Vec<egui::Pos2>, radius: f32, fill: egui::Color32) {
    match points.as_slice() {
        [] => {}
        [only] => {
            painter.circle_filled(*only, radius, fill);
        }
        _ => {
            painter.add(egui::Shape::line(points, egui::Stroke::new(radius * 2.0, fill)));
        }
    }
}

/// Files passed on the command line: only the last one is opened.
fn take_startup_file(files: &mut Vec<PathBuf>) -> Option<PathBuf> {
    let path = files.pop()?;
    if !files.is_empty() {
        let ignored: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        log_warn!("Opening {} only; ignoring {}", path.display(), ignored.join(", "));
        files.clear();
    }
    Some(path)
}

/// Translate one frame's raw input events into pointer commands.
///
/// A press starts a path only over the canvas. Every move while drawing
/// becomes one `PointerMove`; leaving the canvas, a release anywhere, or the
/// pointer leaving the window ends the path.
fn pointer_commands(events: &[egui::Event], canvas: egui::Rect, hovered: bool, mut drawing: bool) -> Vec<EditorCommand> {
    let to_point = |p: egui::Pos2| Point::new(p.x, p.y);
    let mut commands = Vec::new();
    for event in events {
        match event {
            egui::Event::PointerButton {
                pos,
                button: egui::PointerButton::Primary,
                pressed: true,
                ..
            } => {
                if !drawing && hovered && canvas.contains(*pos) {
                    commands.push(EditorCommand::PointerDown(to_point(*pos)));
                    drawing = true;
                }
            }
            egui::Event::PointerButton {
                button: egui::PointerButton::Primary,
                pressed: false,
                ..
            }
            | egui::Event::PointerGone => {
                if drawing {
                    commands.push(EditorCommand::PointerUp);
                    drawing = false;
                }
            }
            egui::Event::PointerMoved(pos) if drawing => {
                if canvas.contains(*pos) {
                    commands.push(EditorCommand::PointerMove(to_point(*pos)));
                } else {
                    commands.push(EditorCommand::PointerUp);
                    drawing = false;
                }
            }
            _ => {}
        }
    }
    commands
}
