use std::process::ExitCode;

use conservation::app::{ConservationApp, DISPLAY_SCALE};
use conservation::engine::EngineConfig;
use conservation::{cli, logger};

use eframe::egui;

fn main() -> ExitCode {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        return cli::run(args);
    }

    // -- GUI mode --------------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    // Window sized to the canvas plus the control strip below it.
    let config = EngineConfig::default();
    let canvas = (config.width * DISPLAY_SCALE) as f32;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([canvas + 24.0, canvas + 320.0])
            .with_title("Conservation"),
        ..Default::default()
    };

    match eframe::run_native(
        "Conservation",
        options,
        Box::new(|cc| Box::new(ConservationApp::new(cc))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: failed to start the window: {}", e);
            ExitCode::FAILURE
        }
    }
}
