use std::path::{Path, PathBuf};

use crate::canvas::{MAX_CANVAS_HEIGHT, MAX_CANVAS_WIDTH};
use crate::components::history::HistoryMode;
use crate::components::tools::{BRUSH_SIZE_RANGE, DEFAULT_BRUSH_SIZE};

// ============================================================================
// APP SETTINGS
// ============================================================================

/// User preferences persisted between sessions as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Fill and open the prompt dialog as soon as a selection completes.
    pub auto_edit: bool,
    pub history_mode: HistoryMode,
    /// Loaded images are downscaled to fit within these bounds.
    pub max_width: u32,
    pub max_height: u32,
    /// Brush radius in raster pixels (half the brush width).
    pub brush_radius: f32,
    /// Edit service URL; empty uses the local echo service.
    pub edit_endpoint: String,
    /// Pre-filled negative prompt.
    pub negative_prompt: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_edit: true,
            history_mode: HistoryMode::Linear,
            max_width: MAX_CANVAS_WIDTH,
            max_height: MAX_CANVAS_HEIGHT,
            brush_radius: DEFAULT_BRUSH_SIZE / 2.0,
            edit_endpoint: String::new(),
            negative_prompt: String::new(),
        }
    }
}

impl AppSettings {
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("maskfe");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("maskfe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            let config_dir = PathBuf::from(appdata).join("MaskFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("maskfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("MaskFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("maskfe_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join("maskfe_settings.cfg")))
        }
    }

    /// Brush width shown on the toolbar slider.
    pub fn brush_size(&self) -> f32 {
        (self.brush_radius * 2.0).clamp(*BRUSH_SIZE_RANGE.start(), *BRUSH_SIZE_RANGE.end())
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "auto_edit={}\n\
             history_mode={}\n\
             max_width={}\n\
             max_height={}\n\
             brush_radius={}\n\
             edit_endpoint={}\n\
             negative_prompt={}\n",
            self.auto_edit,
            self.history_mode.as_config_str(),
            self.max_width,
            self.max_height,
            self.brush_radius,
            self.edit_endpoint.trim(),
            self.negative_prompt.replace('\n', " "),
        )
    }

    /// Lenient parse: unknown keys are skipped and bad values keep their default.
    pub fn parse(content: &str) -> Self {
        let defaults = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "auto_edit" => {
                    s.auto_edit = match val {
                        "true" => true,
                        "false" => false,
                        _ => defaults.auto_edit,
                    };
                }
                "history_mode" => {
                    s.history_mode = HistoryMode::from_config_str(val).unwrap_or(defaults.history_mode);
                }
                "max_width" => {
                    s.max_width = val.parse().ok().filter(|v| *v > 0).unwrap_or(defaults.max_width);
                }
                "max_height" => {
                    s.max_height = val.parse().ok().filter(|v| *v > 0).unwrap_or(defaults.max_height);
                }
                "brush_radius" => {
                    s.brush_radius = val
                        .parse::<f32>()
                        .ok()
                        .filter(|r| r.is_finite() && *r > 0.0)
                        .unwrap_or(defaults.brush_radius);
                }
                "edit_endpoint" => {
                    s.edit_endpoint = val.to_string();
                }
                "negative_prompt" => {
                    s.negative_prompt = val.to_string();
                }
                _ => {}
            }
        }
        s
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            crate::log_warn!("Failed to save settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_config_string())
    }

    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };
        Self::parse(&content)
    }
}
