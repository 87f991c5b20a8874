//! Host-side tool for inspecting and editing a lab node configuration store.
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use labnode_config::api::SectionApi;
use labnode_config::audit;
use labnode_config::document::JsonCodec;
use labnode_config::model::Config;
use labnode_config::record;
use labnode_config::section::{ConfigSection, SectionGroup};
use labnode_config::serializer::SectionSerializer;
use labnode_config::settings::StoreSettings;
use labnode_config::storage::DiskFs;
use labnode_config::store::{ConfigStore, VerificationOutcome};

/// Inspect, edit and verify lab node configuration files.
#[derive(Parser, Debug)]
#[command(name = "labnode-config")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store directory (overrides `data_dir` from settings)
    #[arg(short = 'd', long = "dir", global = true, env = "LABNODE_DIR")]
    dir: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the boot-time load chain and report where each group came from
    Load,

    /// Print one section group (interface, io, virtual) or `all`
    Get {
        group: String,
    },

    /// Apply a JSON document to a section group, verifying the write
    Apply {
        group: SectionGroup,
        /// Input file, or `-` for stdin
        input: PathBuf,
    },

    /// Replace the peer list from a `{"peers": [...]}` document
    Peers {
        /// Input file, or `-` for stdin
        input: PathBuf,
    },

    /// Re-read every group file and compare it with the loaded state
    Verify,

    /// Show channel changes between two full configuration documents
    Diff { before: PathBuf, after: PathBuf },

    /// Wrap a configuration document in a checksummed record envelope
    Seal {
        group: SectionGroup,
        input: PathBuf,
        /// Output file (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the record envelope of a file, if any
    Inspect { file: PathBuf },

    /// Print the save journal
    Journal,

    /// Print the effective settings as TOML
    Settings,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = StoreSettings::load_from(cli.config.as_deref())
        .context("Failed to load settings")?;

    match cli.command {
        Commands::Load => {
            let mut store = open_store(cli.dir, settings)?;
            let report = store.load_all();
            for load in &report.groups {
                let source = load
                    .source
                    .map_or_else(|| "defaults".to_string(), |s| s.to_string());
                println!("{:<10} {:<10} {:?}", load.group.label(), source, load.heal);
            }
            if report.legacy_removed {
                println!("legacy config migrated and removed");
            }
            if report.diagnostics > 0 {
                println!("{} diagnostics (run with RUST_LOG=warn)", report.diagnostics);
            }
        }
        Commands::Get { group } => {
            let mut store = open_store(cli.dir, settings)?;
            store.load_all();
            let api = SectionApi::new(store);
            let response = if group.eq_ignore_ascii_case("all") {
                api.get_all()
            } else {
                let group: SectionGroup = group.parse().map_err(anyhow::Error::msg)?;
                api.get_section(group)
            };
            print_response(response.status, &response.body)?;
        }
        Commands::Apply { group, input } => {
            let body = read_input(&input)?;
            let mut store = open_store(cli.dir, settings)?;
            store.load_all();
            let mut api = SectionApi::new(store);
            let response = api.post_section(group, &body);
            print_response(response.status, &response.body)?;
            if response.restart_required {
                println!("node restart required");
            }
            if !response.is_success() {
                bail!("{} update rejected with status {}", group, response.status);
            }
        }
        Commands::Peers { input } => {
            let body = read_input(&input)?;
            let mut store = open_store(cli.dir, settings)?;
            store.load_all();
            let mut api = SectionApi::new(store);
            let response = api.post_peers(&body);
            print_response(response.status, &response.body)?;
            if !response.is_success() {
                bail!("peer update rejected with status {}", response.status);
            }
        }
        Commands::Verify => {
            let mut store = open_store(cli.dir, settings)?;
            store.load_all();
            let expected = store.config().clone();
            match store.verify(&expected, ConfigSection::ALL) {
                VerificationOutcome::Verified => println!("verified"),
                VerificationOutcome::Failed { reason, detail } => {
                    bail!("verification failed ({}): {}", reason, detail)
                }
            }
        }
        Commands::Diff { before, after } => {
            let serializer = SectionSerializer::new(JsonCodec::default(), settings.planner());
            let base = Config::factory(&settings.factory_node_id());
            let decode = |path: &Path| -> Result<Config> {
                let text = read_input(path)?;
                let decoded = serializer
                    .deserialize(&text, ConfigSection::ALL, &base)
                    .with_context(|| format!("Failed to decode {}", path.display()))?;
                Ok(decoded.config)
            };
            let changes = audit::diff(&decode(&before)?, &decode(&after)?);
            if changes.is_empty() {
                println!("no channel changes");
            }
            for line in changes {
                println!("{}", line);
            }
        }
        Commands::Seal {
            group,
            input,
            output,
        } => {
            let payload = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            if record::decode_header(&payload)?.is_some() {
                bail!("{} already carries a record envelope", input.display());
            }
            let sealed = record::seal(group.sections(), &payload)?;
            let target = output.unwrap_or(input);
            fs::write(&target, &sealed)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            println!(
                "sealed {} bytes as {} (crc {:08X})",
                payload.len(),
                target.display(),
                record::compute_checksum(&payload)
            );
        }
        Commands::Inspect { file } => {
            let bytes =
                fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            match record::decode_header(&bytes)? {
                None => println!("{}: bare payload, {} bytes", file.display(), bytes.len()),
                Some(header) => {
                    println!("version:  {}", header.version);
                    println!("sections: {}", header.sections);
                    println!("length:   {}", header.payload_length);
                    println!("checksum: {:08X}", header.checksum);
                    match record::open(&bytes) {
                        Ok(_) => println!("checksum ok"),
                        Err(e) => bail!("{}", e),
                    }
                }
            }
        }
        Commands::Settings => {
            let text = toml::to_string_pretty(&settings).context("Failed to render settings")?;
            print!("{}", text);
        }
        Commands::Journal => {
            let mut store = open_store(cli.dir, settings)?;
            for line in store.journal_lines() {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn open_store(dir: Option<PathBuf>, settings: StoreSettings) -> Result<ConfigStore<DiskFs>> {
    let root = dir.unwrap_or_else(|| settings.data_dir.clone());
    let fs = DiskFs::open(&root)
        .with_context(|| format!("Failed to open store directory {}", root.display()))?;
    Ok(ConfigStore::new(fs, settings))
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_response(status: u16, body: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(body).context("Failed to render response")?;
    println!("{} {}", status, text);
    Ok(())
}
