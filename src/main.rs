use std::path::PathBuf;

use maskfe::app::MaskFEApp;
use maskfe::cli;
use maskfe::logger;

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        logger::init();
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS { 0 } else { 1 });
    }

    // -- GUI mode --------------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    // Positional arguments are images to open ("Open with MaskFE").
    let startup_files: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("MaskFE"),
        ..Default::default()
    };

    eframe::run_native(
        "MaskFE",
        options,
        Box::new(move |cc| Box::new(MaskFEApp::new(cc, startup_files))),
    )
}
