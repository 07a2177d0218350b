use image::RgbaImage;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// ============================================================================
// VERSION
// ============================================================================

/// A committed raster snapshot.
#[derive(Clone)]
pub struct Version {
    pub id: Uuid,
    pub raster: RgbaImage,
    /// Prompt that produced this version; `None` for the original image.
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    /// Seconds since the unix epoch.
    pub created_at: u64,
    /// Index of the version this one was committed from.
    pub parent: Option<usize>,
}

impl Version {
    fn new(raster: RgbaImage, prompt: Option<String>, negative_prompt: Option<String>, parent: Option<usize>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id: Uuid::new_v4(),
            raster,
            prompt,
            negative_prompt,
            created_at,
            parent,
        }
    }

    pub fn memory_size(&self) -> usize {
        self.raster.as_raw().len()
    }
}

// ============================================================================
// HISTORY STORE
// ============================================================================

/// How commits from a non-head position treat the versions after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HistoryMode {
    /// Classic undo list: committing drops everything after the pointer.
    #[default]
    Linear,
    /// Every version is kept; new commits append and remember their parent.
    Branching,
}

impl HistoryMode {
    pub fn label(&self) -> &'static str {
        match self {
            HistoryMode::Linear => "Linear",
            HistoryMode::Branching => "Branching",
        }
    }

    pub fn as_config_str(&self) -> &'static str {
        match self {
            HistoryMode::Linear => "linear",
            HistoryMode::Branching => "branching",
        }
    }

    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "linear" => Some(HistoryMode::Linear),
            "branching" => Some(HistoryMode::Branching),
            _ => None,
        }
    }
}

/// Ordered raster snapshots plus a current-position pointer.
///
/// `versions[0]` is always the original image. `current` is `None` exactly
/// when the list is empty.
#[derive(Default)]
pub struct VersionHistory {
    versions: Vec<Version>,
    current: Option<usize>,
    mode: HistoryMode,
    /// Running memory total across all stored rasters.
    total_memory: usize,
}

impl VersionHistory {
    pub fn new(mode: HistoryMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: HistoryMode) {
        self.mode = mode;
    }

    /// Capture the freshly loaded image as version 0. Ignored when the
    /// history already holds anything.
    pub fn record_initial(&mut self, raster: RgbaImage) -> bool {
        if !self.versions.is_empty() {
            return false;
        }
        let version = Version::new(raster, None, None, None);
        self.total_memory += version.memory_size();
        self.versions.push(version);
        self.current = Some(0);
        true
    }

    /// Append a new version after the current one and move the pointer to it.
    /// Returns the new current index.
    pub fn commit(&mut self, raster: RgbaImage, prompt: Option<String>, negative_prompt: Option<String>) -> usize {
        let parent = self.current;
        if self.mode == HistoryMode::Linear {
            let keep = self.current.map_or(0, |c| c + 1);
            for dropped in self.versions.drain(keep..) {
                self.total_memory = self.total_memory.saturating_sub(dropped.memory_size());
            }
        }
        let version = Version::new(raster, prompt, negative_prompt, parent);
        self.total_memory += version.memory_size();
        self.versions.push(version);
        let index = self.versions.len() - 1;
        self.current = Some(index);
        index
    }

    /// Move the pointer to `index` and return the raster to display.
    /// Out-of-range indices are ignored. Never changes the list.
    pub fn navigate(&mut self, index: usize) -> Option<&RgbaImage> {
        if index >= self.versions.len() {
            return None;
        }
        self.current = Some(index);
        Some(&self.versions[index].raster)
    }

    pub fn reset(&mut self) {
        self.versions.clear();
        self.current = None;
        self.total_memory = 0;
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&Version> {
        self.current.and_then(|i| self.versions.get(i))
    }

    pub fn get(&self, index: usize) -> Option<&Version> {
        self.versions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter()
    }

    /// Get the current memory usage of the history (O(1) via cached total)
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Display label for the version at `index`.
    pub fn label(&self, index: usize) -> String {
        format!("Version {}", index)
    }
}

// ============================================================================
// HISTORY PANEL - UI for the version list
// ============================================================================

/// What the user asked for in the history panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryAction {
    Navigate(usize),
    /// Save this version's raster as `edited-image-v{n}.png`.
    Download(usize),
}

#[derive(Default)]
pub struct HistoryPanel {
    show_memory_info: bool,
}

impl HistoryPanel {
    /// Draw the version list. Row clicks navigate (the caller routes them
    /// through the session so the canvas updates too); the 💾 button saves
    /// that version.
    pub fn show(&mut self, ui: &mut egui::Ui, history: &VersionHistory) -> Option<HistoryAction> {
        ui.horizontal(|ui| {
            ui.strong("Version History");
            if ui.small_button("ℹ").on_hover_text("Show memory info").clicked() {
                self.show_memory_info = !self.show_memory_info;
            }
        });

        if self.show_memory_info {
            let mem_mb = history.memory_usage() as f64 / (1024.0 * 1024.0);
            ui.label(format!("Memory: {:.2} MB · {}", mem_mb, history.mode().label()));
        }

        let mut clicked = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            if history.is_empty() {
                ui.weak("No versions yet");
                return;
            }
            for (i, version) in history.iter().enumerate() {
                let is_current = history.current_index() == Some(i);
                let mut text = history.label(i);
                if i == 0 {
                    text.push_str("  [Original]");
                }
                if let Some(parent) = version.parent
                    && history.mode() == HistoryMode::Branching
                    && parent + 1 != i
                {
                    text.push_str(&format!("  ← v{}", parent));
                }
                if is_current {
                    text = format!("▶ {}", text);
                }
                ui.horizontal(|ui| {
                    if ui.small_button("💾").on_hover_text("Download this version").clicked() {
                        clicked = Some(HistoryAction::Download(i));
                    }
                    let response = ui.selectable_label(is_current, text);
                    let response = match &version.prompt {
                        Some(prompt) => response.on_hover_text(prompt.as_str()),
                        None => response,
                    };
                    if response.clicked() {
                        clicked = Some(HistoryAction::Navigate(i));
                    }
                });
            }
        });
        clicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 4, Rgba([v, v, v, 255]))
    }

    fn history_with(n: usize) -> VersionHistory {
        let mut h = VersionHistory::new(HistoryMode::Linear);
        h.record_initial(solid(0));
        for i in 1..n {
            h.commit(solid(i as u8), Some(format!("edit {i}")), None);
        }
        h
    }

    #[test]
    fn starts_empty_with_no_pointer() {
        let h = VersionHistory::default();
        assert!(h.is_empty());
        assert_eq!(h.current_index(), None);
    }

    #[test]
    fn record_initial_only_once() {
        let mut h = VersionHistory::default();
        assert!(h.record_initial(solid(1)));
        assert!(!h.record_initial(solid(2)));
        assert_eq!(h.len(), 1);
        assert_eq!(h.get(0).map(|v| v.raster.get_pixel(0, 0).0[0]), Some(1));
    }

    #[test]
    fn commit_from_middle_truncates_future() {
        let mut h = history_with(5);
        let dropped: Vec<Uuid> = (2..5).filter_map(|i| h.get(i).map(|v| v.id)).collect();
        h.navigate(1);
        let idx = h.commit(solid(99), Some("new".into()), None);
        assert_eq!(idx, 2);
        assert_eq!(h.len(), 3);
        assert_eq!(h.current_index(), Some(2));
        assert!(h.iter().all(|v| !dropped.contains(&v.id)));
        assert_eq!(h.memory_usage(), 3 * 4 * 4 * 4);
    }

    #[test]
    fn navigate_is_non_destructive() {
        let mut h = history_with(4);
        for _ in 0..3 {
            assert!(h.navigate(1).is_some());
            assert_eq!(h.len(), 4);
        }
        assert!(h.navigate(10).is_none());
        assert_eq!(h.current_index(), Some(1));
        assert_eq!(h.len(), 4);
    }

    #[test]
    fn branching_mode_keeps_every_version() {
        let mut h = VersionHistory::new(HistoryMode::Branching);
        h.record_initial(solid(0));
        h.commit(solid(1), None, None);
        h.navigate(0);
        let idx = h.commit(solid(2), None, None);
        assert_eq!(idx, 2);
        assert_eq!(h.len(), 3);
        assert_eq!(h.get(2).and_then(|v| v.parent), Some(0));
        assert_eq!(h.get(1).and_then(|v| v.parent), Some(0));
    }

    #[test]
    fn reset_clears_everything() {
        let mut h = history_with(3);
        h.reset();
        assert!(h.is_empty());
        assert_eq!(h.current_index(), None);
        assert_eq!(h.memory_usage(), 0);
    }
}
