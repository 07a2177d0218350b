use image::RgbaImage;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::canvas::{CanvasState, DisplayRect, Point, SelectionShape};
use crate::components::history::{HistoryMode, VersionHistory};
use crate::components::prompt::{PendingEdit, dialog_position};
use crate::components::tools::{BRUSH_SIZE_RANGE, PathCapture, StrokeEnd, Tool};
use crate::io::{self, LoadError};
use crate::ops::edit_service::{EditError, EditRequest, EditResponse, EditService};
use crate::ops::fill::{fill_shapes, mask_to_rgba, region_mask};
use crate::settings::AppSettings;
use crate::{log_err, log_info, log_warn};

// ============================================================================
// COMMANDS & OUTCOMES
// ============================================================================

/// Every state change of an editing session goes through one of these.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorCommand {
    /// Pointer pressed on the canvas, in display coordinates.
    PointerDown(Point),
    /// Pointer moved, in display coordinates.
    PointerMove(Point),
    /// Pointer released, left the canvas, or was released anywhere in the window.
    PointerUp,
    /// Add an already finished shape in raster coordinates (CLI, scripted input).
    AddShape(SelectionShape),
    SetTool(Tool),
    /// Brush width in raster pixels.
    SetBrushSize(f32),
    SetAutoEdit(bool),
    SetHistoryMode(HistoryMode),
    /// Fill the completed selections now (manual mode).
    EditSelection,
    SetPrompt(String),
    SetNegativePrompt(String),
    /// Commit the current raster locally, without an edit service.
    Accept,
    Reject,
    ClearSelections,
    Navigate(usize),
}

#[derive(Debug)]
pub enum SessionError {
    Load(LoadError),
    Edit(EditError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Load(e) => write!(f, "{}", e),
            SessionError::Edit(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<LoadError> for SessionError {
    fn from(e: LoadError) -> Self {
        SessionError::Load(e)
    }
}

impl From<EditError> for SessionError {
    fn from(e: EditError) -> Self {
        SessionError::Edit(e)
    }
}

/// What a command did.
#[derive(Debug)]
pub enum Outcome {
    /// The session changed.
    Applied,
    /// Not valid in the current state; nothing changed.
    Ignored,
    /// Attempted and failed; the session is as it was before.
    Failed(SessionError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Outcome::Ignored)
    }
}

/// An edit request handed out by [`Project::begin_edit`]. The reply must be
/// returned with the same token; replies for superseded tokens are dropped.
#[derive(Clone, Debug)]
pub struct EditTicket {
    pub token: u64,
    pub request: EditRequest,
}

// ============================================================================
// PROJECT - one editing session
// ============================================================================

/// Single open image with its selections, pending proposal and versions.
pub struct Project {
    pub id: Uuid,
    /// Display name (derived from path or "Untitled")
    pub name: String,
    /// `None` until an image has been opened from disk.
    pub path: Option<PathBuf>,
    /// `None` until an image is loaded.
    pub canvas: Option<CanvasState>,
    pub history: VersionHistory,
    pub tool: Tool,
    /// Brush width in raster pixels.
    pub brush_size: f32,
    pub auto_edit: bool,
    pub capture: PathCapture,
    /// Finished shapes waiting to be filled, in precedence order.
    pub completed: Vec<SelectionShape>,
    pub pending: Option<PendingEdit>,
    /// Whole-image prompt, used when no selection is pending.
    pub prompt: String,
    pub negative_prompt: String,
    /// Message from the last failed operation, cleared by the next command.
    pub last_error: Option<String>,
    max_width: u32,
    max_height: u32,
    load_generation: u64,
    edit_counter: u64,
    /// Edit request awaiting a reply.
    in_flight: Option<InFlight>,
}

/// Token and prompt of the submitted request; the prompt is what gets
/// recorded on the committed version, even if the text changes meanwhile.
struct InFlight {
    token: u64,
    prompt: String,
}

impl Default for Project {
    fn default() -> Self {
        Self::new(&AppSettings::default())
    }
}

impl Project {
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Untitled".to_string(),
            path: None,
            canvas: None,
            history: VersionHistory::new(settings.history_mode),
            tool: Tool::default(),
            brush_size: settings.brush_size(),
            auto_edit: settings.auto_edit,
            capture: PathCapture::default(),
            completed: Vec::new(),
            pending: None,
            prompt: String::new(),
            negative_prompt: settings.negative_prompt.clone(),
            last_error: None,
            max_width: settings.max_width,
            max_height: settings.max_height,
            load_generation: 0,
            edit_counter: 0,
            in_flight: None,
        }
    }

    pub fn update_name_from_path(&mut self) {
        self.name = match &self.path {
            Some(path) => path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            None => "Untitled".to_string(),
        };
    }

    /// Title bar text: name plus the version being viewed.
    pub fn display_title(&self) -> String {
        match self.history.current_index() {
            Some(i) if self.history.len() > 1 => format!("{} (v{}/{})", self.name, i, self.history.len() - 1),
            _ => self.name.clone(),
        }
    }

    // ---- Queries -----------------------------------------------------------

    pub fn has_image(&self) -> bool {
        self.canvas.is_some()
    }

    pub fn raster(&self) -> Option<&RgbaImage> {
        self.canvas.as_ref().map(|c| &c.raster)
    }

    pub fn is_drawing(&self) -> bool {
        self.capture.is_drawing()
    }

    /// An edit request has been handed out and not yet answered.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Prompt the next accept will use: the pending dialog's text when a
    /// proposal is open, otherwise the whole-image prompt.
    pub fn active_prompt(&self) -> &str {
        match &self.pending {
            Some(p) => &p.prompt_text,
            None => &self.prompt,
        }
    }

    pub fn can_accept(&self) -> bool {
        self.has_image() && !self.is_busy() && !self.active_prompt().trim().is_empty()
    }

    /// Auto-edit is on, at least one selecting (non-eraser) shape is
    /// finished, and no proposal is open.
    pub fn should_auto_fill(&self) -> bool {
        self.auto_edit && self.has_selecting_shape() && self.pending.is_none() && self.has_image()
    }

    /// Whether the completed shapes would select anything once filled.
    pub fn has_selecting_shape(&self) -> bool {
        self.completed.iter().any(|s| !s.is_erase())
    }

    /// Number of finished shapes that add to the selection.
    pub fn selecting_shape_count(&self) -> usize {
        self.completed.iter().filter(|s| !s.is_erase()).count()
    }

    /// Service mask (opaque white = selected) for the open proposal.
    pub fn pending_mask(&self) -> Option<RgbaImage> {
        let pending = self.pending.as_ref()?;
        let canvas = self.canvas.as_ref()?;
        Some(mask_to_rgba(&region_mask(canvas.width, canvas.height, &pending.gray_regions)))
    }

    /// Prompt dialog top-left relative to the displayed canvas box.
    pub fn dialog_position(&self) -> Option<Point> {
        let pending = self.pending.as_ref()?;
        let canvas = self.canvas.as_ref()?;
        let display = canvas.display?;
        Some(dialog_position(pending.anchor, display, canvas.width, canvas.height))
    }

    pub fn set_display(&mut self, display: Option<DisplayRect>) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.display = display;
        }
    }

    /// Download name for the raster currently shown.
    pub fn export_name(&self) -> String {
        io::export_file_name(self.history.current_index())
    }

    pub fn set_size_cap(&mut self, max_width: u32, max_height: u32) {
        self.max_width = max_width.max(1);
        self.max_height = max_height.max(1);
    }

    // ---- Command dispatch --------------------------------------------------

    pub fn dispatch(&mut self, command: EditorCommand) -> Outcome {
        if !matches!(command, EditorCommand::PointerMove(_)) {
            self.last_error = None;
        }
        let outcome = match command {
            EditorCommand::PointerDown(screen) => self.pointer_down(screen),
            EditorCommand::PointerMove(screen) => self.pointer_move(screen),
            EditorCommand::PointerUp => self.pointer_up(),
            EditorCommand::AddShape(shape) => self.add_shape(shape),
            EditorCommand::SetTool(tool) => {
                self.capture.cancel();
                self.tool = tool;
                Outcome::Applied
            }
            EditorCommand::SetBrushSize(size) => {
                self.brush_size = size.clamp(*BRUSH_SIZE_RANGE.start(), *BRUSH_SIZE_RANGE.end());
                Outcome::Applied
            }
            EditorCommand::SetAutoEdit(enabled) => {
                self.auto_edit = enabled;
                Outcome::Applied
            }
            EditorCommand::SetHistoryMode(mode) => {
                self.history.set_mode(mode);
                Outcome::Applied
            }
            EditorCommand::EditSelection => {
                if self.fill_selection() {
                    Outcome::Applied
                } else {
                    Outcome::Ignored
                }
            }
            EditorCommand::SetPrompt(text) => {
                match self.pending.as_mut() {
                    Some(pending) => pending.prompt_text = text,
                    None => self.prompt = text,
                }
                Outcome::Applied
            }
            EditorCommand::SetNegativePrompt(text) => {
                self.negative_prompt = text;
                Outcome::Applied
            }
            EditorCommand::Accept => self.accept_local(),
            EditorCommand::Reject => self.reject(),
            EditorCommand::ClearSelections => self.clear_selections(),
            EditorCommand::Navigate(index) => self.navigate(index),
        };

        if self.should_auto_fill() {
            self.fill_selection();
        }
        outcome
    }

    fn pointer_down(&mut self, screen: Point) -> Outcome {
        if self.pending.is_some() || !self.tool.captures_paths() {
            return Outcome::Ignored;
        }
        let Some(canvas) = self.canvas.as_ref() else { return Outcome::Ignored };
        let pos = canvas.screen_to_canvas(screen);
        self.capture.begin(self.tool, pos);
        Outcome::Applied
    }

    fn pointer_move(&mut self, screen: Point) -> Outcome {
        if !self.capture.is_drawing() {
            return Outcome::Ignored;
        }
        let Some(canvas) = self.canvas.as_ref() else { return Outcome::Ignored };
        let pos = canvas.screen_to_canvas(screen);
        self.capture.extend(pos);
        Outcome::Applied
    }

    fn pointer_up(&mut self) -> Outcome {
        match self.capture.finish(self.brush_size / 2.0) {
            StrokeEnd::Completed(shape) => {
                log_info!("Selection completed ({} points)", shape.points().len());
                self.completed.push(shape);
                Outcome::Applied
            }
            StrokeEnd::Discarded => Outcome::Applied,
            StrokeEnd::NotDrawing => Outcome::Ignored,
        }
    }

    fn add_shape(&mut self, shape: SelectionShape) -> Outcome {
        if self.pending.is_some() || !self.has_image() || !shape.is_fillable() {
            return Outcome::Ignored;
        }
        self.completed.push(shape);
        Outcome::Applied
    }

    /// Gray out the completed shapes and open a proposal anchored on the
    /// first selecting one. No-op while a proposal is already open or when
    /// only eraser strokes are waiting.
    fn fill_selection(&mut self) -> bool {
        if self.pending.is_some() || !self.has_selecting_shape() {
            return false;
        }
        let Some(canvas) = self.canvas.as_mut() else { return false };
        let shapes = std::mem::take(&mut self.completed);
        let result = fill_shapes(&canvas.raster, &shapes);
        let anchor = shapes
            .iter()
            .find(|s| !s.is_erase())
            .map(SelectionShape::centroid)
            .unwrap_or(Point::ORIGIN);
        let pending = PendingEdit::new(result.regions, anchor);
        log_info!(
            "Filled {} shape(s), {} pixel(s) selected",
            shapes.len(),
            pending.selected_pixel_count()
        );
        canvas.set_raster(result.raster);
        self.pending = Some(pending);
        true
    }

    fn accept_local(&mut self) -> Outcome {
        if !self.can_accept() {
            return Outcome::Ignored;
        }
        let Some(raster) = self.raster().cloned() else { return Outcome::Ignored };
        let prompt = self.active_prompt().trim().to_string();
        self.commit(raster, prompt)
    }

    fn commit(&mut self, raster: RgbaImage, prompt: String) -> Outcome {
        let Some(canvas) = self.canvas.as_mut() else { return Outcome::Ignored };
        let negative = Some(self.negative_prompt.trim().to_string()).filter(|s| !s.is_empty());
        let index = self.history.commit(raster.clone(), Some(prompt.clone()), negative);
        canvas.set_raster(raster);
        self.pending = None;
        self.completed.clear();
        self.capture.cancel();
        self.prompt.clear();
        self.in_flight = None;
        log_info!("Committed version {} of {}: \"{}\"", index, self.history.len(), prompt);
        Outcome::Applied
    }

    fn reject(&mut self) -> Outcome {
        if self.pending.take().is_none() {
            return Outcome::Ignored;
        }
        self.restore_current();
        self.completed.clear();
        self.capture.cancel();
        self.in_flight = None;
        log_info!("Proposal rejected; restored version {:?}", self.history.current_index());
        Outcome::Applied
    }

    fn clear_selections(&mut self) -> Outcome {
        self.capture.cancel();
        self.completed.clear();
        if self.pending.take().is_some() {
            self.restore_current();
            self.in_flight = None;
        }
        Outcome::Applied
    }

    fn navigate(&mut self, index: usize) -> Outcome {
        let Some(canvas) = self.canvas.as_mut() else { return Outcome::Ignored };
        let Some(raster) = self.history.navigate(index) else { return Outcome::Ignored };
        canvas.set_raster(raster.clone());
        self.capture.cancel();
        self.completed.clear();
        self.pending = None;
        self.in_flight = None;
        log_info!("Navigated to version {}", index);
        Outcome::Applied
    }

    /// Put the raster of the current version back on the canvas.
    fn restore_current(&mut self) {
        if let (Some(canvas), Some(version)) = (self.canvas.as_mut(), self.history.current()) {
            canvas.set_raster(version.raster.clone());
        }
    }

    // ---- Edit service ------------------------------------------------------

    /// Package the active proposal for the edit service and mark it in flight.
    ///
    /// `Ok(None)` when there is nothing to submit (no image, empty prompt, or
    /// a request already in flight). Without a pending selection the whole
    /// image is masked.
    pub fn begin_edit(&mut self) -> Result<Option<EditTicket>, EditError> {
        if !self.can_accept() {
            return Ok(None);
        }
        let Some(canvas) = self.canvas.as_ref() else { return Ok(None) };
        let original = self.history.current().map(|v| &v.raster).unwrap_or(&canvas.raster);
        let mask = self
            .pending_mask()
            .unwrap_or_else(|| RgbaImage::from_pixel(canvas.width, canvas.height, image::Rgba([255, 255, 255, 255])));
        let encode = |img: &RgbaImage| io::to_data_uri(img).map_err(|e| EditError::Encode(e.to_string()));
        let request = EditRequest {
            original_image: encode(original)?,
            mask_image: encode(&mask)?,
            prompt: self.active_prompt().trim().to_string(),
            negative_prompt: Some(self.negative_prompt.trim().to_string()).filter(|s| !s.is_empty()),
        };
        self.edit_counter += 1;
        self.in_flight = Some(InFlight {
            token: self.edit_counter,
            prompt: request.prompt.clone(),
        });
        log_info!("Submitting edit #{}: \"{}\"", self.edit_counter, request.prompt);
        Ok(Some(EditTicket {
            token: self.edit_counter,
            request,
        }))
    }

    /// Apply the edit service's reply to the request identified by `token`.
    ///
    /// On success the returned image becomes the new version. On failure the
    /// proposal stays open and History and the canvas are unchanged.
    pub fn finish_edit(&mut self, token: u64, reply: Result<EditResponse, EditError>) -> Outcome {
        let prompt = match self.in_flight.take() {
            Some(flight) if flight.token == token => flight.prompt,
            other => {
                self.in_flight = other;
                log_warn!("Dropping reply for superseded edit #{}", token);
                return Outcome::Ignored;
            }
        };
        let decoded = reply.and_then(EditResponse::into_edited_image).and_then(|uri| {
            io::from_data_uri(&uri).map_err(|e| EditError::Decode(e.to_string()))
        });
        match decoded {
            Ok(raster) => {
                let raster = self.match_canvas_size(raster);
                self.commit(raster, prompt)
            }
            Err(e) => {
                log_err!("Edit #{} failed: {}", token, e);
                self.last_error = Some(e.to_string());
                Outcome::Failed(SessionError::Edit(e))
            }
        }
    }

    /// Submit and wait for the reply on the calling thread.
    pub fn accept_with(&mut self, service: &dyn EditService) -> Outcome {
        self.last_error = None;
        let ticket = match self.begin_edit() {
            Ok(Some(ticket)) => ticket,
            Ok(None) => return Outcome::Ignored,
            Err(e) => {
                log_err!("Could not prepare edit: {}", e);
                self.last_error = Some(e.to_string());
                return Outcome::Failed(SessionError::Edit(e));
            }
        };
        let reply = service.edit(&ticket.request);
        self.finish_edit(ticket.token, reply)
    }

    /// Every version shares the canvas size; a service may answer at another resolution.
    fn match_canvas_size(&self, raster: RgbaImage) -> RgbaImage {
        match &self.canvas {
            Some(c) if raster.dimensions() != (c.width, c.height) => {
                image::imageops::resize(&raster, c.width, c.height, FilterType::Triangle)
            }
            _ => raster,
        }
    }

    // ---- Loading -----------------------------------------------------------

    /// Issue a new load generation; any load started earlier becomes stale.
    pub fn begin_load(&mut self) -> u64 {
        self.load_generation += 1;
        self.load_generation
    }

    pub fn size_cap(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    /// Apply a finished load if it is still the latest one issued.
    pub fn finish_load(
        &mut self,
        generation: u64,
        path: Option<PathBuf>,
        result: Result<RgbaImage, LoadError>,
    ) -> Outcome {
        if generation != self.load_generation {
            log_info!("Ignoring superseded load (generation {} < {})", generation, self.load_generation);
            return Outcome::Ignored;
        }
        self.last_error = None;
        match result {
            Ok(raster) => {
                self.open_raster(raster, path);
                Outcome::Applied
            }
            Err(e) => {
                log_err!("Failed to load image: {}", e);
                self.last_error = Some(e.to_string());
                Outcome::Failed(SessionError::Load(e))
            }
        }
    }

    /// Load `path` on the calling thread.
    pub fn load_file(&mut self, path: &Path) -> Outcome {
        let generation = self.begin_load();
        let result = io::load_image_sync(path, self.max_width, self.max_height);
        self.finish_load(generation, Some(path.to_path_buf()), result)
    }

    /// Start a fresh session on `raster`: previous history, selections and
    /// proposal are discarded and the raster becomes version 0.
    pub fn open_raster(&mut self, raster: RgbaImage, path: Option<PathBuf>) {
        let display = self.canvas.as_ref().and_then(|c| c.display);
        let (w, h) = raster.dimensions();
        self.reset_session();
        self.history.record_initial(raster.clone());
        let mut canvas = CanvasState::new(raster);
        canvas.display = display;
        self.canvas = Some(canvas);
        self.path = path;
        self.update_name_from_path();
        log_info!("Opened {} ({}x{})", self.name, w, h);
    }

    /// Drop the image and everything derived from it ("New Image").
    pub fn close_image(&mut self) {
        self.begin_load();
        self.reset_session();
        self.canvas = None;
        self.path = None;
        self.update_name_from_path();
    }

    fn reset_session(&mut self) {
        self.history.reset();
        self.capture.cancel();
        self.completed.clear();
        self.pending = None;
        self.prompt.clear();
        self.in_flight = None;
        self.tool = Tool::Lasso;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn project_with_image(w: u32, h: u32) -> Project {
        let mut p = Project::default();
        p.open_raster(RgbaImage::from_pixel(w, h, Rgba([10, 200, 30, 255])), None);
        p.set_display(Some(DisplayRect::new(100.0, 50.0, w as f32 / 2.0, h as f32 / 2.0)));
        p
    }

    fn drag(p: &mut Project, screen_points: &[(f32, f32)]) {
        let mut it = screen_points.iter();
        if let Some(&(x, y)) = it.next() {
            p.dispatch(EditorCommand::PointerDown(Point::new(x, y)));
        }
        for &(x, y) in it {
            p.dispatch(EditorCommand::PointerMove(Point::new(x, y)));
        }
        p.dispatch(EditorCommand::PointerUp);
    }

    #[test]
    fn pointer_events_are_mapped_to_raster_space() {
        let mut p = project_with_image(200, 100);
        p.auto_edit = false;
        drag(&mut p, &[(110.0, 55.0), (150.0, 55.0), (130.0, 90.0)]);
        assert_eq!(p.completed.len(), 1);
        assert_eq!(
            p.completed[0].points(),
            &[Point::new(20.0, 10.0), Point::new(100.0, 10.0), Point::new(60.0, 80.0)]
        );
    }

    #[test]
    fn select_tool_ignores_pointer() {
        let mut p = project_with_image(40, 40);
        p.dispatch(EditorCommand::SetTool(Tool::Select));
        assert!(p.dispatch(EditorCommand::PointerDown(Point::new(105.0, 55.0))).is_ignored());
        assert!(!p.is_drawing());
    }

    #[test]
    fn pointer_is_ignored_while_proposal_open() {
        let mut p = project_with_image(40, 40);
        drag(&mut p, &[(100.0, 50.0), (115.0, 50.0), (115.0, 65.0)]);
        assert!(p.pending.is_some());
        assert!(p.dispatch(EditorCommand::PointerDown(Point::new(101.0, 51.0))).is_ignored());
        assert!(p.completed.is_empty());
    }

    #[test]
    fn manual_mode_waits_for_edit_selection() {
        let mut p = project_with_image(40, 40);
        p.dispatch(EditorCommand::SetAutoEdit(false));
        drag(&mut p, &[(100.0, 50.0), (115.0, 50.0), (115.0, 65.0)]);
        assert!(!p.should_auto_fill());
        assert!(p.pending.is_none());
        assert!(p.dispatch(EditorCommand::EditSelection).is_applied());
        assert!(p.pending.is_some());
        assert!(p.completed.is_empty());
        assert!(p.dispatch(EditorCommand::EditSelection).is_ignored());
    }

    #[test]
    fn empty_prompt_blocks_accept() {
        let mut p = project_with_image(40, 40);
        drag(&mut p, &[(100.0, 50.0), (115.0, 50.0), (115.0, 65.0)]);
        p.dispatch(EditorCommand::SetPrompt("   ".into()));
        assert!(p.dispatch(EditorCommand::Accept).is_ignored());
        assert_eq!(p.history.len(), 1);
        assert!(p.pending.is_some());
    }

    #[test]
    fn stale_edit_reply_is_dropped() {
        let mut p = project_with_image(40, 40);
        drag(&mut p, &[(100.0, 50.0), (115.0, 50.0), (115.0, 65.0)]);
        p.dispatch(EditorCommand::SetPrompt("sky".into()));
        let ticket = p.begin_edit().unwrap().unwrap();
        assert!(p.is_busy());
        p.dispatch(EditorCommand::Reject);
        let reply = EditResponse {
            success: true,
            edited_image: Some(ticket.request.original_image.clone()),
            error: None,
        };
        assert!(p.finish_edit(ticket.token, Ok(reply)).is_ignored());
        assert_eq!(p.history.len(), 1);
    }

    #[test]
    fn dialog_position_follows_anchor() {
        let mut p = project_with_image(800, 600);
        p.set_display(Some(DisplayRect::new(0.0, 0.0, 800.0, 600.0)));
        p.dispatch(EditorCommand::AddShape(SelectionShape::Lasso(vec![
            Point::new(300.0, 200.0),
            Point::new(500.0, 200.0),
            Point::new(500.0, 400.0),
            Point::new(300.0, 400.0),
        ])));
        assert_eq!(p.dialog_position(), Some(Point::new(250.0, 245.0)));
    }

    #[test]
    fn service_commit_records_submitted_prompt() {
        let mut p = project_with_image(40, 40);
        drag(&mut p, &[(100.0, 50.0), (115.0, 50.0), (115.0, 65.0)]);
        p.dispatch(EditorCommand::SetPrompt("sky".into()));
        let ticket = p.begin_edit().unwrap().unwrap();
        p.dispatch(EditorCommand::SetPrompt("typed while waiting".into()));
        let reply = EditResponse {
            success: true,
            edited_image: Some(ticket.request.original_image.clone()),
            error: None,
        };
        assert!(p.finish_edit(ticket.token, Ok(reply)).is_applied());
        assert_eq!(p.history.current().and_then(|v| v.prompt.clone()), Some("sky".to_string()));
    }

    #[test]
    fn eraser_alone_does_not_open_proposal() {
        let mut p = project_with_image(40, 40);
        p.dispatch(EditorCommand::SetTool(Tool::Eraser));
        drag(&mut p, &[(105.0, 55.0), (110.0, 55.0)]);
        assert_eq!(p.completed.len(), 1);
        assert!(p.pending.is_none());
        assert!(p.dispatch(EditorCommand::EditSelection).is_ignored());
    }

    #[test]
    fn eraser_stroke_is_cut_from_selection() {
        let mut p = project_with_image(40, 40);
        p.dispatch(EditorCommand::SetAutoEdit(false));
        p.dispatch(EditorCommand::SetBrushSize(4.0));
        p.dispatch(EditorCommand::AddShape(SelectionShape::Lasso(vec![
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 20.0),
            Point::new(0.0, 20.0),
        ])));
        p.dispatch(EditorCommand::SetTool(Tool::Eraser));
        // Display is half size at (100, 50): raster (10, 10) is screen (105, 55).
        drag(&mut p, &[(105.0, 55.0)]);
        assert_eq!(p.selecting_shape_count(), 1);
        assert!(p.dispatch(EditorCommand::EditSelection).is_applied());

        let pending = p.pending.as_ref().unwrap();
        assert_eq!(pending.anchor, Point::new(10.0, 10.0));
        assert!(!pending.gray_regions[0].contains(10, 10));
        assert!(pending.gray_regions[0].contains(2, 2));
        let mask = p.pending_mask().unwrap();
        assert_eq!(mask.get_pixel(10, 10), &Rgba([0, 0, 0, 0]));
        assert_eq!(mask.get_pixel(2, 2), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn brush_size_is_clamped() {
        let mut p = Project::default();
        p.dispatch(EditorCommand::SetBrushSize(500.0));
        assert_eq!(p.brush_size, 50.0);
        p.dispatch(EditorCommand::SetBrushSize(0.0));
        assert_eq!(p.brush_size, 1.0);
    }
}
