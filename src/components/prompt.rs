use crate::canvas::{DisplayRect, Point};
use crate::ops::fill::Region;

/// Prompt dialog footprint in display pixels.
pub const DIALOG_WIDTH: f32 = 300.0;
pub const DIALOG_HEIGHT: f32 = 110.0;
/// Minimum gap between the dialog and the canvas edge.
pub const DIALOG_MARGIN: f32 = 5.0;

// ============================================================================
// PENDING EDIT
// ============================================================================

/// A gray-filled preview waiting for the user to accept or reject it.
#[derive(Clone)]
pub struct PendingEdit {
    /// One region per shape that was filled, in selection order.
    pub gray_regions: Vec<Region>,
    pub prompt_text: String,
    /// Centroid of the first filled shape, in raster coordinates.
    pub anchor: Point,
}

impl PendingEdit {
    pub fn new(gray_regions: Vec<Region>, anchor: Point) -> Self {
        Self {
            gray_regions,
            prompt_text: String::new(),
            anchor,
        }
    }

    pub fn has_prompt(&self) -> bool {
        !self.prompt_text.trim().is_empty()
    }

    pub fn selected_pixel_count(&self) -> usize {
        self.gray_regions.iter().map(Region::len).sum()
    }
}

/// Top-left corner for the prompt dialog, relative to the displayed canvas box.
///
/// The dialog is centred on the anchor (mapped to display space) and then
/// pushed back inside the box with a small margin. When the box is smaller
/// than the dialog the margin wins and the dialog hugs the top-left corner.
pub fn dialog_position(anchor: Point, display: DisplayRect, native_w: u32, native_h: u32) -> Point {
    let scale_x = if native_w > 0 { display.width / native_w as f32 } else { 1.0 };
    let scale_y = if native_h > 0 { display.height / native_h as f32 } else { 1.0 };
    let target_x = anchor.x * scale_x - DIALOG_WIDTH / 2.0;
    let target_y = anchor.y * scale_y - DIALOG_HEIGHT / 2.0;
    Point {
        x: target_x
            .min(display.width - DIALOG_WIDTH - DIALOG_MARGIN)
            .max(DIALOG_MARGIN),
        y: target_y
            .min(display.height - DIALOG_HEIGHT - DIALOG_MARGIN)
            .max(DIALOG_MARGIN),
    }
}

// ============================================================================
// PROMPT DIALOG - floating text box anchored over the selection
// ============================================================================

/// What the user did with the dialog this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptAction {
    None,
    Accept,
    Reject,
}

#[derive(Default)]
pub struct PromptDialog {
    /// Set when the dialog appears; suppresses the outside-click check for
    /// that first frame and grabs keyboard focus.
    just_opened: bool,
}

impl PromptDialog {
    pub fn open(&mut self) {
        self.just_opened = true;
    }

    /// Draw the dialog at `screen_pos` (top-left, screen space).
    ///
    /// Enter without Shift accepts, Shift+Enter inserts a newline, Escape or
    /// a click anywhere outside the dialog rejects. `busy` disables both
    /// buttons while an edit request is in flight.
    pub fn show(&mut self, ctx: &egui::Context, screen_pos: egui::Pos2, text: &mut String, busy: bool) -> PromptAction {
        let mut action = PromptAction::None;

        let area = egui::Area::new(egui::Id::new("prompt_dialog"))
            .order(egui::Order::Foreground)
            .fixed_pos(screen_pos)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_width(DIALOG_WIDTH - 16.0);
                    ui.strong("✏ Describe Your Edit");
                    ui.add_space(4.0);

                    // Take plain Enter before the multiline editor turns it into a newline.
                    let enter = !busy && ui.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Enter));
                    let edit = ui.add_enabled(
                        !busy,
                        egui::TextEdit::multiline(text)
                            .desired_rows(2)
                            .desired_width(f32::INFINITY)
                            .hint_text("e.g., Replace with a blue sky..."),
                    );
                    if self.just_opened {
                        edit.request_focus();
                    }

                    ui.add_space(4.0);
                    ui.horizontal(|ui| {
                        if ui.add_enabled(!busy, egui::Button::new("✖ Cancel")).clicked() {
                            action = PromptAction::Reject;
                        }
                        let can_apply = !busy && !text.trim().is_empty();
                        if ui.add_enabled(can_apply, egui::Button::new("✔ Apply")).clicked() {
                            action = PromptAction::Accept;
                        }
                        if busy {
                            ui.spinner();
                        }
                    });

                    if enter && !text.trim().is_empty() {
                        action = PromptAction::Accept;
                    }
                });
            });

        if !busy && action == PromptAction::None {
            let escape = ctx.input(|i| i.key_pressed(egui::Key::Escape));
            if escape || (!self.just_opened && area.response.clicked_elsewhere()) {
                action = PromptAction::Reject;
            }
        }
        self.just_opened = false;
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialog_centres_on_anchor_when_room() {
        let display = DisplayRect::new(0.0, 0.0, 800.0, 600.0);
        let pos = dialog_position(Point::new(400.0, 300.0), display, 800, 600);
        assert_eq!(pos, Point::new(250.0, 245.0));
    }

    #[test]
    fn dialog_is_clamped_inside_canvas() {
        let display = DisplayRect::new(0.0, 0.0, 400.0, 300.0);
        let top_left = dialog_position(Point::new(0.0, 0.0), display, 800, 600);
        assert_eq!(top_left, Point::new(DIALOG_MARGIN, DIALOG_MARGIN));
        let bottom_right = dialog_position(Point::new(800.0, 600.0), display, 800, 600);
        assert_eq!(bottom_right, Point::new(400.0 - 300.0 - 5.0, 300.0 - 110.0 - 5.0));
    }

    #[test]
    fn tiny_canvas_pins_dialog_to_margin() {
        let display = DisplayRect::new(0.0, 0.0, 100.0, 80.0);
        let pos = dialog_position(Point::new(50.0, 40.0), display, 100, 80);
        assert_eq!(pos, Point::new(DIALOG_MARGIN, DIALOG_MARGIN));
    }
}
