mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use vboxcli_vbox::{Facade, VBoxManage};

#[derive(Parser)]
#[command(name = "vboxcli")]
#[command(about = "Terminal browser and controller for VirtualBox machines")]
#[command(version)]
struct Cli {
    /// Path to the VBoxManage executable (defaults to $VBOXCLI_VBOXMANAGE or PATH lookup)
    #[arg(long, global = true)]
    vboxmanage: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive machine browser (default)
    Ui,
    /// Print the group tree with every group expanded
    List,
    /// Print the details of one machine
    Show {
        /// Machine name or UUID
        machine: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, None | Some(Commands::Ui));
    let _log_guard = init_logging(interactive);

    let hypervisor = VBoxManage::locate(cli.vboxmanage);
    let mut facade = Facade::connect(hypervisor)
        .await
        .context("Failed to connect to VirtualBox")?;
    tracing::info!(version = facade.version(), "connected to VirtualBox");

    match cli.command {
        None | Some(Commands::Ui) => commands::tui(facade).await?,
        Some(Commands::List) => commands::list(&mut facade).await?,
        Some(Commands::Show { machine }) => commands::show(&mut facade, &machine).await?,
    }

    Ok(())
}

fn vboxcli_log_dir() -> anyhow::Result<PathBuf> {
    let state_dir = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .ok_or_else(|| anyhow::anyhow!("state directory not found"))?;
    Ok(state_dir.join("vboxcli").join("logs"))
}

/// Log to a file; without one, drop logs while the TUI owns the terminal.
fn init_logging(interactive: bool) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if let Ok(log_dir) = vboxcli_log_dir()
        && std::fs::create_dir_all(&log_dir).is_ok()
    {
        let log_path = log_dir.join("vboxcli.log");
        if std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .is_ok()
        {
            let file_appender = rolling::never(&log_dir, "vboxcli.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(non_blocking)
                .init();
            return Some(guard);
        }
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false);
    if interactive {
        builder.with_writer(std::io::sink).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    None
}
