// ============================================================================
// MaskFE CLI: headless masked edits via command-line arguments
// ============================================================================
//
// Usage examples:
//   maskfe -i photo.png --lasso "10,10 90,10 50,90" --prompt "a red balloon"
//   maskfe -i photo.jpg --brush "20,20 60,40" --brush-radius 8 -p "remove" -o out.png
//   maskfe -i photo.png --lasso "0,0 80,0 80,80 0,80" --erase "40,0 40,80" -p "two boxes"
//   maskfe -i shots/*.jpg --lasso "0,0 100,0 100,100" -p "blue sky" --output-dir out/
//   maskfe -i photo.png --lasso "..." -p "..." --endpoint http://localhost:5173/api/edit
//
// No GUI is opened in CLI mode. Each file runs through the same session the
// desktop app uses: load (size-capped), add shapes, fill, commit, export.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{Point, SelectionShape};
use crate::io::save_png;
use crate::ops::edit_service::{EditService, service_for_endpoint};
use crate::ops::fill::{mask_to_rgba, region_mask};
use crate::project::{EditorCommand, Outcome, Project};
use crate::settings::AppSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MaskFE headless masked image editor.
#[derive(Parser, Debug)]
#[command(
    name = "maskfe",
    about = "MaskFE headless masked image editor",
    long_about = "Select regions of an image with lasso polygons or brush strokes, gray\n\
                  them out, and send the image, mask and prompt to an edit service\n\
                  without opening the GUI. Coordinates are raster pixels after the\n\
                  image has been fitted into the configured size cap (800x600 by default).\n\n\
                  Example:\n  \
                  maskfe -i photo.png --lasso \"10,10 90,10 50,90\" --prompt \"a red balloon\""
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Lasso polygon as space-separated "x,y" pairs (at least 3). Repeatable.
    #[arg(long, value_name = "POINTS")]
    pub lasso: Vec<String>,

    /// Brush stroke as space-separated "x,y" pairs (at least 1). Repeatable.
    /// Brush strokes take precedence after all lasso polygons.
    #[arg(long, value_name = "POINTS")]
    pub brush: Vec<String>,

    /// Eraser stroke as space-separated "x,y" pairs (at least 1). Repeatable.
    /// Pixels under an eraser stroke are removed from every selection.
    #[arg(long, value_name = "POINTS")]
    pub erase: Vec<String>,

    /// Brush and eraser radius in raster pixels. Defaults to the saved setting.
    #[arg(long, value_name = "PX")]
    pub brush_radius: Option<f32>,

    /// Edit prompt. Without any shape the whole image is edited.
    #[arg(short, long)]
    pub prompt: String,

    /// Negative prompt sent along with the edit.
    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// Edit service URL, or "echo" for the local echo service.
    /// Defaults to the saved setting.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Skip the edit service and commit the gray-filled preview as is.
    #[arg(long, conflicts_with = "endpoint")]
    pub no_service: bool,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Also write the selection mask (white = selected) as PNG. Single-file input only.
    #[arg(long, value_name = "FILE")]
    pub mask_out: Option<PathBuf>,

    /// Print progress and log lines to the terminal.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    if args.verbose {
        crate::logger::set_echo(true);
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && (args.output.is_some() || args.mask_out.is_some()) && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output/--mask-out only accept a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    for warning in batch_warnings(&args, inputs.len()) {
        eprintln!("warning: {}", warning);
    }

    let settings = AppSettings::load();

    let radius = args.brush_radius.unwrap_or(settings.brush_radius);
    let shapes = match build_shapes(&args.lasso, &args.brush, &args.erase, radius) {
        Ok(shapes) => shapes,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let service: Option<Box<dyn EditService>> = if args.no_service {
        None
    } else {
        let endpoint = args.endpoint.as_deref().unwrap_or(&settings.edit_endpoint);
        match service_for_endpoint(endpoint) {
            Ok(service) => Some(service),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let mut project = Project::new(&settings);
        if let Some(neg) = &args.negative_prompt {
            project.negative_prompt = neg.clone();
        }

        let job = Job {
            input: input_path,
            shapes: &shapes,
            prompt: &args.prompt,
            service: service.as_deref(),
            mask_out: if multi { None } else { args.mask_out.as_deref() },
        };
        let result = run_one(&mut project, &job).and_then(|()| {
            let output_path = build_output_path(
                input_path,
                if multi { None } else { args.output.as_deref() },
                args.output_dir.as_deref(),
                &project.export_name(),
            )
            .ok_or_else(|| format!("cannot determine output path for '{}'", input_path.display()))?;
            let raster = project.raster().ok_or("nothing to export")?;
            save_png(raster, &output_path).map_err(|e| format!("save failed: {}", e))?;
            Ok(output_path)
        });

        match result {
            Ok(output_path) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

struct Job<'a> {
    input: &'a Path,
    shapes: &'a [SelectionShape],
    prompt: &'a str,
    /// `None` commits the gray preview without calling a service.
    service: Option<&'a dyn EditService>,
    mask_out: Option<&'a Path>,
}

fn run_one(project: &mut Project, job: &Job<'_>) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    if let Outcome::Failed(e) = project.load_file(job.input) {
        return Err(format!("load failed: {}", e));
    }

    // -- Step 2: Select and fill -----------------------------------------
    project.dispatch(EditorCommand::SetAutoEdit(false));
    for (i, shape) in job.shapes.iter().enumerate() {
        if project.dispatch(EditorCommand::AddShape(shape.clone())).is_ignored() {
            crate::log_warn!("Shape {} ignored for {}", i + 1, job.input.display());
        }
    }
    project.dispatch(EditorCommand::EditSelection);

    if let Some(mask_path) = job.mask_out {
        let mask = project.pending_mask().unwrap_or_else(|| {
            let (w, h) = project.raster().map(|r| r.dimensions()).unwrap_or((0, 0));
            mask_to_rgba(&region_mask(w, h, &[]))
        });
        save_png(&mask, mask_path).map_err(|e| format!("mask save failed: {}", e))?;
    }

    // -- Step 3: Commit --------------------------------------------------
    project.dispatch(EditorCommand::SetPrompt(job.prompt.to_string()));
    let outcome = match job.service {
        Some(service) => project.accept_with(service),
        None => project.dispatch(EditorCommand::Accept),
    };
    match outcome {
        Outcome::Applied => Ok(()),
        Outcome::Ignored => Err("nothing to commit (is the prompt empty?)".to_string()),
        Outcome::Failed(e) => Err(format!("edit failed: {}", e)),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated list of files.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Parse `"x,y x,y ..."` into raster points.
pub fn parse_points(arg: &str) -> Result<Vec<Point>, String> {
    arg.split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("expected x,y but got '{}'", pair))?;
            let x: f32 = x.trim().parse().map_err(|_| format!("bad x coordinate in '{}'", pair))?;
            let y: f32 = y.trim().parse().map_err(|_| format!("bad y coordinate in '{}'", pair))?;
            if !x.is_finite() || !y.is_finite() {
                return Err(format!("coordinates must be finite in '{}'", pair));
            }
            Ok(Point::new(x, y))
        })
        .collect()
}

/// Single-file options that a batch run with `--output-dir` drops.
fn batch_warnings(args: &CliArgs, input_count: usize) -> Vec<String> {
    if input_count < 2 || args.output_dir.is_none() {
        return Vec::new();
    }
    let mut warnings = Vec::new();
    if let Some(out) = &args.output {
        warnings.push(format!(
            "--output '{}' ignored for {} input files; writing into --output-dir",
            out.display(),
            input_count
        ));
    }
    if let Some(mask) = &args.mask_out {
        warnings.push(format!("--mask-out '{}' ignored for {} input files", mask.display(), input_count));
    }
    warnings
}

/// Lasso polygons first, then brush strokes, then eraser strokes, each in
/// command-line order. Eraser strokes cut every selection regardless of order.
fn build_shapes(
    lassos: &[String],
    brushes: &[String],
    erasers: &[String],
    radius: f32,
) -> Result<Vec<SelectionShape>, String> {
    let mut shapes = Vec::with_capacity(lassos.len() + brushes.len() + erasers.len());
    for arg in lassos {
        let points = parse_points(arg)?;
        if points.len() < 3 {
            return Err(format!("--lasso needs at least 3 points, got {}", points.len()));
        }
        shapes.push(SelectionShape::Lasso(points));
    }
    for arg in brushes {
        let points = parse_points(arg)?;
        if points.is_empty() {
            return Err("--brush needs at least 1 point".to_string());
        }
        if !(radius > 0.0) {
            return Err(format!("--brush-radius must be positive, got {}", radius));
        }
        shapes.push(SelectionShape::Stroke { points, radius });
    }
    for arg in erasers {
        let points = parse_points(arg)?;
        if points.is_empty() {
            return Err("--erase needs at least 1 point".to_string());
        }
        if !(radius > 0.0) {
            return Err(format!("--brush-radius must be positive, got {}", radius));
        }
        shapes.push(SelectionShape::Erase { points, radius });
    }
    Ok(shapes)
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, `<stem>-<export name>`)
/// 3. Fallback: next to the input as `<stem>-<export name>`
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>, export_name: &str) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let file_name = format!("{}-{}", stem, export_name);
    match output_dir {
        Some(dir) => Some(dir.join(file_name)),
        None => Some(input.parent().unwrap_or(Path::new(".")).join(file_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_point_lists() {
        let pts = parse_points(" 10,10  90,10 50.5,90 ").unwrap();
        assert_eq!(pts, vec![Point::new(10.0, 10.0), Point::new(90.0, 10.0), Point::new(50.5, 90.0)]);
        assert!(parse_points("10;10").is_err());
        assert!(parse_points("a,1").is_err());
        assert!(parse_points("1,inf").is_err());
        assert!(parse_points("").unwrap().is_empty());
    }

    #[test]
    fn short_lasso_is_rejected() {
        assert!(build_shapes(&["1,1 2,2".to_string()], &[], &[], 10.0).is_err());
        assert!(build_shapes(&[], &["1,1".to_string()], &[], 0.0).is_err());
        assert!(build_shapes(&[], &[], &["".to_string()], 3.0).is_err());
    }

    #[test]
    fn lassos_come_before_brushes() {
        let shapes = build_shapes(
            &["0,0 4,0 4,4".to_string()],
            &["1,1".to_string()],
            &["2,2 3,3".to_string()],
            3.0,
        )
        .unwrap();
        assert!(matches!(shapes[0], SelectionShape::Lasso(_)));
        assert!(matches!(shapes[1], SelectionShape::Stroke { radius, .. } if radius == 3.0));
        assert!(matches!(&shapes[2], SelectionShape::Erase { points, .. } if points.len() == 2));
    }

    #[test]
    fn output_path_rules() {
        let input = Path::new("shots/photo.jpg");
        let name = crate::io::export_file_name(Some(1));
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), None, &name),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), &name),
            Some(PathBuf::from("out/photo-edited-image-v1.png"))
        );
        assert_eq!(
            build_output_path(input, None, None, &name),
            Some(PathBuf::from("shots/photo-edited-image-v1.png"))
        );
    }

    #[test]
    fn cli_args_parse() {
        let args = CliArgs::try_parse_from([
            "maskfe", "-i", "a.png", "--lasso", "0,0 5,0 5,5", "--lasso", "1,1 2,1 2,2", "-p", "sky",
        ])
        .unwrap();
        assert_eq!(args.lasso.len(), 2);
        assert_eq!(args.prompt, "sky");
        assert!(!args.no_service);
    }

    #[test]
    fn batch_with_output_dir_warns_about_single_file_options() {
        let args = CliArgs::try_parse_from([
            "maskfe", "-i", "a.png", "b.png", "-p", "sky", "-o", "x.png", "--mask-out", "m.png", "--output-dir", "out",
        ])
        .unwrap();
        let warnings = batch_warnings(&args, 2);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("--output 'x.png'"));
        assert!(warnings[1].contains("--mask-out 'm.png'"));
        assert!(batch_warnings(&args, 1).is_empty());
    }
}
