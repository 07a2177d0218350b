use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ColorType, ImageEncoder, ImageError, RgbaImage};
use rfd::FileDialog;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::canvas::fit_within;

/// Upload extensions accepted by the editor (lowercase).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Check if a file extension is an accepted upload format.
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error type for image loading
#[derive(Debug)]
pub enum LoadError {
    UnsupportedType(String),
    TooLarge(u64),
    Io(std::io::Error),
    Decode(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::UnsupportedType(ext) if ext.is_empty() => {
                write!(f, "Unsupported file type (no extension)")
            }
            LoadError::UnsupportedType(ext) => write!(f, "Unsupported file type: .{}", ext),
            LoadError::TooLarge(size) => write!(
                f,
                "File is too large ({:.1} MB, limit is {} MB)",
                *size as f64 / (1024.0 * 1024.0),
                MAX_UPLOAD_BYTES / (1024 * 1024)
            ),
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::Decode(e) => write!(f, "Could not decode image: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<ImageError> for LoadError {
    fn from(e: ImageError) -> Self {
        LoadError::Decode(e.to_string())
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Reject files the editor won't open before spending time decoding them.
pub fn validate_upload(path: &Path) -> Result<(), LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !is_supported_extension(&ext) {
        return Err(LoadError::UnsupportedType(ext));
    }
    let size = std::fs::metadata(path)?.len();
    if size > MAX_UPLOAD_BYTES {
        return Err(LoadError::TooLarge(size));
    }
    Ok(())
}

/// Proportionally shrink `img` to fit `max_w × max_h`; smaller images pass through.
pub fn cap_raster(img: RgbaImage, max_w: u32, max_h: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    let (tw, th) = fit_within(w, h, max_w, max_h);
    if (tw, th) == (w, h) {
        return img;
    }
    image::imageops::resize(&img, tw, th, FilterType::Triangle)
}

/// Decode an in-memory image to RGBA8 and apply the size cap.
pub fn decode_capped(bytes: &[u8], max_w: u32, max_h: u32) -> Result<RgbaImage, LoadError> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    Ok(cap_raster(img, max_w, max_h))
}

/// Validate, decode and size-cap an image file on the calling thread.
pub fn load_image_sync(path: &Path, max_w: u32, max_h: u32) -> Result<RgbaImage, LoadError> {
    validate_upload(path)?;
    let img = image::open(path)?.to_rgba8();
    Ok(cap_raster(img, max_w, max_h))
}

/// Result delivered from a background load.
pub struct LoadResult {
    /// Generation issued when the load started; stale results are dropped by the session.
    pub generation: u64,
    pub path: PathBuf,
    pub result: Result<RgbaImage, LoadError>,
}

/// Decode `path` on the rayon pool and send exactly one [`LoadResult`].
pub fn spawn_load(path: PathBuf, generation: u64, max_w: u32, max_h: u32, sender: mpsc::Sender<LoadResult>) {
    rayon::spawn(move || {
        let result = load_image_sync(&path, max_w, max_h);
        // Receiver gone means the window closed; nothing left to do.
        let _ = sender.send(LoadResult {
            generation,
            path,
            result,
        });
    });
}

// ============================================================================
// ENCODING / EXPORT
// ============================================================================

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgba8)?;
    Ok(bytes)
}

/// `data:image/png;base64,...` form of `img`.
pub fn to_data_uri(img: &RgbaImage) -> Result<String, ImageError> {
    let png = encode_png(img)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Decode a base64 image data URI of any image MIME type.
pub fn from_data_uri(uri: &str) -> Result<RgbaImage, LoadError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| LoadError::Decode("not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| LoadError::Decode("data URI has no payload".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(LoadError::Decode("data URI is not base64-encoded".to_string()));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| LoadError::Decode(e.to_string()))?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

/// Download name for the current raster; `version` is the history index.
pub fn export_file_name(version: Option<usize>) -> String {
    match version {
        Some(v) => format!("edited-image-v{}.png", v),
        None => "edited-image.png".to_string(),
    }
}

pub fn save_png(img: &RgbaImage, path: &Path) -> Result<(), ImageError> {
    let bytes = encode_png(img)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

// ============================================================================
// FILE HANDLER - native dialogs
// ============================================================================

#[derive(Default)]
pub struct FileHandler {
    /// File the current session was opened from.
    pub current_path: Option<PathBuf>,
    /// Folder of the last successful export, reused as the next starting point.
    pub last_export_dir: Option<PathBuf>,
}

impl FileHandler {
    /// Show native file dialog to pick an image to open (without loading it)
    pub fn pick_image_path(&self) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .add_filter("Images", SUPPORTED_EXTENSIONS)
            .add_filter("All Files", &["*"]);
        if let Some(dir) = self.current_path.as_deref().and_then(Path::parent) {
            dialog = dialog.set_directory(dir);
        }
        dialog.pick_file()
    }

    /// Ask where to save an export, pre-filled with `default_name`.
    pub fn pick_save_path(&self, default_name: &str) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .add_filter("PNG Image", &["png"])
            .set_file_name(default_name);
        if let Some(dir) = &self.last_export_dir {
            dialog = dialog.set_directory(dir);
        }
        dialog.save_file()
    }

    pub fn export(&mut self, img: &RgbaImage, path: &Path) -> Result<(), ImageError> {
        save_png(img, path)?;
        self.last_export_dir = path.parent().map(Path::to_path_buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 128])
            }
        })
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(is_supported_extension("PNG"));
        assert!(is_supported_extension("jpeg"));
        assert!(!is_supported_extension("tiff"));
        assert!(!is_supported_extension(""));
    }

    #[test]
    fn validate_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert!(matches!(validate_upload(&path), Err(LoadError::UnsupportedType(ext)) if ext == "txt"));
    }

    #[test]
    fn validate_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_UPLOAD_BYTES + 1).unwrap();
        assert!(matches!(validate_upload(&path), Err(LoadError::TooLarge(_))));
    }

    #[test]
    fn garbage_png_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(load_image_sync(&path, 800, 600), Err(LoadError::Decode(_))));
    }

    #[test]
    fn load_caps_large_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        save_png(&checker(1000, 1000), &path).unwrap();
        let img = load_image_sync(&path, 800, 600).unwrap();
        assert_eq!(img.dimensions(), (600, 600));

        let small = dir.path().join("small.png");
        save_png(&checker(40, 30), &small).unwrap();
        assert_eq!(load_image_sync(&small, 800, 600).unwrap(), checker(40, 30));
    }

    #[test]
    fn data_uri_preserves_pixels() {
        let img = checker(7, 5);
        let uri = to_data_uri(&img).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(from_data_uri(&uri).unwrap(), img);
    }

    #[test]
    fn malformed_data_uris_are_rejected() {
        assert!(from_data_uri("image/png;base64,AAAA").is_err());
        assert!(from_data_uri("data:image/png;base64").is_err());
        assert!(from_data_uri("data:image/png,rawtext").is_err());
        assert!(from_data_uri("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn export_names() {
        assert_eq!(export_file_name(None), "edited-image.png");
        assert_eq!(export_file_name(Some(3)), "edited-image-v3.png");
    }

    #[test]
    fn spawn_load_reports_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        save_png(&checker(4, 4), &path).unwrap();
        let (tx, rx) = mpsc::channel();
        spawn_load(path.clone(), 42, 800, 600, tx);
        let done = rx.recv().unwrap();
        assert_eq!(done.generation, 42);
        assert_eq!(done.path, path);
        assert_eq!(done.result.unwrap().dimensions(), (4, 4));
    }
}
