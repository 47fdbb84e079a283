use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use termpdf_render::{open_provider, Backend};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod menu;
mod viewer;

use menu::Menu;

#[derive(Debug, Parser)]
#[command(
    name = "termpdf",
    version,
    about = "Read the text of PDF files page by page in the terminal"
)]
struct Args {
    /// Directory scanned for PDF files
    #[arg(short = 'd', long = "dir", default_value = ".")]
    dir: PathBuf,

    /// Library used to extract page text
    #[arg(short = 'b', long = "backend", value_enum, default_value_t = BackendArg::Auto)]
    backend: BackendArg,

    /// Log file (defaults to the platform data directory)
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Auto,
    Pdfium,
    Lopdf,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => Backend::Auto,
            BackendArg::Pdfium => Backend::Pdfium,
            BackendArg::Lopdf => Backend::Lopdf,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log_file.as_deref())?;
    info!(dir = %args.dir.display(), backend = ?args.backend, "starting termpdf");

    let provider = open_provider(args.backend.into())?;
    let stdin = io::stdin();
    let mut menu = Menu::new(stdin.lock(), io::stdout(), args.dir);
    menu.run(|path| viewer::view_document(provider.as_ref(), path))?;

    info!("exiting");
    Ok(())
}

/// Logs go to a file so they never interleave with the full-screen view.
/// When no log file can be opened, only warnings reach stderr.
fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    match file_appender(log_file) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let env_filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()
                .map_err(|err| anyhow!(err))?;
            Ok(Some(guard))
        }
        Err(err) => {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_filter(LevelFilter::WARN),
                )
                .try_init()
                .map_err(|err| anyhow!(err))?;
            warn!(?err, "file logging unavailable");
            Ok(None)
        }
    }
}

fn file_appender(log_file: Option<&Path>) -> Result<RollingFileAppender> {
    let path = match log_file {
        Some(path) => path.to_path_buf(),
        None => ProjectDirs::from("net", "termpdf", "termpdf")
            .ok_or_else(|| anyhow!("no home directory to place logs in"))?
            .data_local_dir()
            .join("logs")
            .join("termpdf.log"),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log path {:?} has no file name", path))?
        .to_string_lossy()
        .into_owned();
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {:?}", dir))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .with_context(|| format!("failed to open log file {:?}", path))
}
