use bz2io::config::DriverConfig;
use bz2io::file::{ConfigOption, ConfigValue, FileHandle, OpenFlags, Transfer};
use bz2io::registry::{self, Registry};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "bz2io", about = "Transparent BZIP2 streams over the file driver chain")]
struct Cli {
    /// Driver configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a file; prefix a name with BZ: or BZ1:..BZ9: to (de)compress
    Copy {
        src: String,
        dst: String,
    },
    /// Write a file's (decompressed) contents to stdout
    Cat {
        name: String,
    },
    /// Read a tagged file to the end and report stream statistics as JSON
    Info {
        name: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => DriverConfig::load(path)?,
        None       => DriverConfig::default(),
    };
    let reg = registry::init(config)?;
    let result = run(&reg, cli.command);
    registry::teardown();
    result
}

fn run(reg: &Arc<Registry>, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {

        // ── Copy ─────────────────────────────────────────────────────────────
        Commands::Copy { src, dst } => {
            let n = reg.copy(&src, &dst)?;
            println!("{src} -> {dst}: {n} bytes");
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { name } => {
            let mut file = reg.open(&name, OpenFlags::read())?;
            let mut out  = std::io::stdout().lock();
            let mut buf  = vec![0u8; registry::COPY_CHUNK_SIZE];
            loop {
                match file.read(&mut buf, -1)? {
                    Transfer::EndOfStream | Transfer::Bytes(0) => break,
                    Transfer::Bytes(n) => out.write_all(&buf[..n])?,
                }
            }
            out.flush()?;
            file.close()?;
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { name } => {
            let mut file   = reg.open(&name, OpenFlags::read())?;
            let mut hasher = blake3::Hasher::new();
            let mut buf    = vec![0u8; registry::COPY_CHUNK_SIZE];
            loop {
                match file.read(&mut buf, -1)? {
                    Transfer::EndOfStream | Transfer::Bytes(0) => break,
                    Transfer::Bytes(n) => { hasher.update(&buf[..n]); }
                }
            }
            let report = serde_json::json!({
                "io_name":    text_option(file.as_mut(), ConfigOption::IoName),
                "state":      file.configure(ConfigOption::State).ok().and_then(|v| v.as_int()),
                "eof":        file.eof(),
                "statistics": match file.configure(ConfigOption::Statistics) {
                    Ok(ConfigValue::Json(v)) => v,
                    _                        => serde_json::Value::Null,
                },
                "blake3":     hex::encode(hasher.finalize().as_bytes()),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            file.close()?;
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn text_option(file: &mut dyn FileHandle, option: ConfigOption) -> Option<String> {
    file.configure(option).ok().and_then(|v| v.as_text().map(str::to_owned))
}
