use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "android-adb-scheduler",
    version = env!("APP_VERSION_DISPLAY"),
    about = "🤖 Scheduled game automation across Android emulator profiles",
    after_help = concat!("© ", env!("APP_BUILD_YEAR"), " Vigor Solutions")
)]
pub struct Args {
    /// Scheduler configuration file
    #[arg(long, short, global = true, default_value = android_adb_scheduler::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start every enabled profile queue (default)
    Run {
        /// Auto-exit after N seconds (for testing)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// List devices known to the adb server
    Devices,
    /// Take a screenshot and save it to a file
    Screenshot {
        /// adb serial of the emulator
        #[arg(long, short)]
        emulator: String,
        #[arg(long, short, default_value = "cli-screenshot.png")]
        output: PathBuf,
    },
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run { timeout: None })
    }
}
