use anyhow::{Context, Result};
use clap::Parser;
use screw_encoder::screw_features::CapabilityRegistry;
use screw_encoder::{EncodeOptions, Screw};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

mod report;

use report::EncodingStats;

#[derive(Parser)]
#[command(name = "screw")]
#[command(about = "Encode text as JavaScript built from ! ( ) + [ ]", long_about = None)]
#[command(version)]
struct Cli {
    /// File to encode (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Encode this text instead of a file
    #[arg(short = 'e', long = "eval", conflicts_with = "input")]
    text: Option<String>,

    /// Write the encoding to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Comma separated capabilities of the target engine
    #[arg(short, long = "features", value_delimiter = ',')]
    features: Vec<String>,

    /// Treat the input as code and produce an expression that runs it
    #[arg(short, long)]
    wrap: bool,

    /// Search for shorter group boundaries
    #[arg(long)]
    optimize: bool,

    /// Maximum number of terms in one flat `+` chain
    #[arg(long)]
    group_threshold: Option<usize>,

    /// TOML file with encoding options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print size and nesting statistics as JSON on stderr
    #[arg(long)]
    stats: bool,

    /// List known capabilities and exit
    #[arg(long)]
    list_features: bool,

    /// Print the capability list as JSON
    #[arg(long, requires = "list_features")]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    if cli.list_features {
        return list_features(cli.json);
    }

    let options = build_options(&cli)?;
    let input = read_input(&cli)?;
    log::debug!(
        "Encoding {} characters with capabilities [{}]",
        input.chars().count(),
        options.capabilities.join(", ")
    );

    let started = Instant::now();
    let mut screw = Screw::new();
    let output = screw.encode(&input, &options)?;
    let elapsed = started.elapsed();

    match &cli.output {
        Some(path) => {
            fs::write(path, &output)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {} characters to {}", output.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{output}")?;
        }
    }

    if cli.stats {
        let stats = EncodingStats::measure(&input, &output, elapsed);
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}

/// Merge the config file (if any) with command line flags; flags win
fn build_options(cli: &Cli) -> Result<EncodeOptions> {
    let mut options = match &cli.config {
        Some(path) => load_options(path)?,
        None => EncodeOptions::default(),
    };

    if !cli.features.is_empty() {
        options.capabilities = cli
            .features
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }
    if cli.wrap {
        options.wrap_for_evaluation = true;
    }
    if cli.optimize {
        options.config.optimize = true;
    }
    if let Some(threshold) = cli.group_threshold {
        options.config.group_threshold = threshold;
    }

    options
        .config
        .validate()
        .map_err(|message| anyhow::anyhow!("Invalid configuration: {message}"))?;
    Ok(options)
}

fn load_options(path: &Path) -> Result<EncodeOptions> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}

fn read_input(cli: &Cli) -> Result<String> {
    if let Some(text) = &cli.text {
        return Ok(text.clone());
    }
    if let Some(path) = &cli.input {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read input from {}", path.display()));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read input from stdin")?;
    Ok(buffer)
}

fn list_features(json: bool) -> Result<()> {
    let registry = CapabilityRegistry::builtin();
    if json {
        let infos: Vec<_> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        print!("{}", report::render_feature_table(registry));
    }
    Ok(())
}
