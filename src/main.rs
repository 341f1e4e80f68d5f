mod args;

use android_adb_scheduler::adb::{EmulatorCommands, EmulatorDriver, EmulatorLauncher, RustAdb};
use android_adb_scheduler::config::{AppConfig, TomlProfileStore};
use android_adb_scheduler::queue::{QueueServices, TaskQueueCoordinator};
use android_adb_scheduler::slots::EmulatorSlotController;
use android_adb_scheduler::status::StatusBoard;
use android_adb_scheduler::task::TaskRegistry;
use android_adb_scheduler::vision::{MatchPool, TemplateLibrary, TemplateVision};
use args::{Args, Command};
use clap::Parser;
use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

type CliResult = Result<(), Box<dyn Error>>;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    let result = match args.command() {
        Command::Run { timeout } => run(&args.config, timeout).await,
        Command::Devices => devices().await,
        Command::Screenshot { emulator, output } => screenshot(&emulator, &output).await,
    };
    if let Err(e) = result {
        log::error!("❌ {e}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

async fn run(config_path: &Path, timeout: Option<u64>) -> CliResult {
    let config = AppConfig::load(config_path).await?;
    let settings = &config.scheduler;
    log::info!(
        "🚀 android-adb-scheduler v{} ({} profiles, {} emulator slots)",
        env!("APP_VERSION_DISPLAY"),
        config.profiles.len(),
        settings.max_emulator_slots
    );

    let launcher = EmulatorLauncher::new(config.emulator.clone(), config.emulator_instances());
    let library = Arc::new(TemplateLibrary::new(settings.templates_dir.clone()));
    let status = match &settings.state_file {
        Some(path) => StatusBoard::with_state_file(path.clone()).await,
        None => StatusBoard::new(),
    };
    let services = QueueServices {
        slots: Arc::new(EmulatorSlotController::new(settings.max_emulator_slots)),
        registry: Arc::new(TaskRegistry::default()),
        driver: Arc::new(RustAdb::new(launcher)),
        vision: Arc::new(TemplateVision::new(library, MatchPool::per_cpu())),
        store: Arc::new(TomlProfileStore::new(config_path.to_path_buf())),
        status: Arc::new(status),
        game_package: settings.game_package.clone(),
    };

    let coordinator =
        TaskQueueCoordinator::new(services, Duration::from_millis(settings.start_stagger_ms));
    coordinator.start_queues(config.profiles.clone()).await;
    wait_for_shutdown(timeout).await;
    coordinator.stop_queues().await;
    Ok(())
}

async fn wait_for_shutdown(timeout: Option<u64>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("❌ Could not listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("🛑 Ctrl-C received, stopping");
    };
    match timeout {
        Some(secs) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    log::info!("⏰ Timeout of {secs}s reached, stopping");
                }
            }
        }
        None => ctrl_c.await,
    }
}

async fn devices() -> CliResult {
    let devices = RustAdb::list_devices().await?;
    if devices.is_empty() {
        println!("❌ No devices found");
    }
    for device in devices {
        let state = if device.online { "online" } else { "offline" };
        println!("📱 {} ({state})", device.name);
    }
    Ok(())
}

async fn screenshot(emulator: &str, output: &Path) -> CliResult {
    let driver = RustAdb::new(EmulatorLauncher::new(EmulatorCommands::default(), HashMap::new()));
    println!("📸 Capturing {emulator}...");
    let capture = driver.capture_screenshot(emulator).await?;
    tokio::fs::write(output, &capture.bytes).await?;
    println!(
        "✅ Screenshot ({}ms) saved to {}",
        capture.duration_ms,
        output.display()
    );
    Ok(())
}
