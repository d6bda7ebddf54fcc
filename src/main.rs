//! Weaver CLI: compiles a diagram definition into a spec and writes the
//! result as JSON.
//!
//! Grounded on the teacher's `src/bin/server.rs`/`src/bin/client.rs` for
//! the binary-entrypoint shape, replacing their manual `env::args` flag
//! parsing with `clap`-derive since this tool is a one-shot flag-driven
//! command (original specification §6), not an interactive REPL — the
//! teacher's REPL `src/main.rs` has no counterpart here.

use clap::Parser;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use weaver::compile::{compile_sankey_definition, ColorRequest, CompileOptions};
use weaver::config::WeaverConfig;
use weaver::spec::{Aggregation, MeasureSpec};

/// Compile a Sankey diagram definition into a spec JSON document.
#[derive(Parser, Debug)]
#[command(name = "weaver", version, about)]
struct Cli {
    /// Path to the diagram definition JSON file.
    definition: PathBuf,

    /// Path to write the compiled spec JSON. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Measure column to aggregate, formatted `column` or `column:sum|mean`.
    /// May be repeated; defaults to a single `value:sum` measure.
    #[arg(long = "measure")]
    measures: Vec<String>,

    /// Measure column used for link width. Defaults to the first measure.
    #[arg(long = "link-width")]
    link_width: Option<String>,

    /// Attribute to color links by (`type`, `source`, `target`, `time`, or
    /// a measure column).
    #[arg(long = "link-color")]
    link_color: Option<String>,

    /// Palette name for the link color (categorical or sequential).
    #[arg(long = "palette-name")]
    palette_name: Option<String>,

    /// Explicit categorical color mapping: inline JSON object or a path to
    /// a JSON file containing one.
    #[arg(long = "color-mapping")]
    color_mapping: Option<String>,

    /// Disable implicit Elsewhere waypoint nodes (stub mode; see original
    /// specification §9's Open Question on elsewhere-bundle insertion).
    #[arg(long)]
    no_elsewhere_waypoints: bool,

    /// Gzip the written spec JSON.
    #[arg(long, conflicts_with = "no_gzip")]
    gzip: bool,

    /// Force plain (non-gzipped) output, overriding config defaults.
    #[arg(long)]
    no_gzip: bool,
}

fn parse_measure(raw: &str) -> MeasureSpec {
    match raw.split_once(':') {
        Some((column, "mean")) => MeasureSpec {
            column: column.to_string(),
            aggregation: Aggregation::Mean,
        },
        Some((column, _)) => MeasureSpec {
            column: column.to_string(),
            aggregation: Aggregation::Sum,
        },
        None => MeasureSpec {
            column: raw.to_string(),
            aggregation: Aggregation::Sum,
        },
    }
}

fn load_color_mapping(raw: &str) -> anyhow::Result<std::collections::BTreeMap<String, String>> {
    let text = if std::path::Path::new(raw).exists() {
        std::fs::read_to_string(raw)?
    } else {
        raw.to_string()
    };
    Ok(serde_json::from_str(&text)?)
}

fn build_options(cli: &Cli, config: &WeaverConfig) -> anyhow::Result<CompileOptions> {
    let measures = if cli.measures.is_empty() {
        vec![MeasureSpec {
            column: "value".to_string(),
            aggregation: Aggregation::Sum,
        }]
    } else {
        cli.measures.iter().map(|m| parse_measure(m)).collect()
    };

    let link_color = match &cli.link_color {
        None => None,
        Some(attribute) => {
            let mapping = cli
                .color_mapping
                .as_deref()
                .map(load_color_mapping)
                .transpose()?;
            Some(ColorRequest::Categorical {
                attribute: attribute.clone(),
                palette_name: cli
                    .palette_name
                    .clone()
                    .or_else(|| Some(config.display.default_palette.clone())),
                mapping,
                default: None,
            })
        }
    };

    let elsewhere_mode = if cli.no_elsewhere_waypoints {
        weaver::augment::ElsewhereMode::Stub
    } else {
        weaver::augment::ElsewhereMode::Waypointed
    };

    Ok(CompileOptions {
        measures,
        link_width: cli.link_width.clone(),
        link_color,
        elsewhere_mode,
    })
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = WeaverConfig::load().unwrap_or_default();

    let definition_json = std::fs::read_to_string(&cli.definition)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", cli.definition.display()))?;
    let definition: weaver::sankey_definition::SankeyDefinition =
        serde_json::from_str(&definition_json)?;

    let options = build_options(&cli, &config)?;
    let spec = compile_sankey_definition(&definition, options, None)?;
    let json = serde_json::to_vec_pretty(&spec)?;

    let gzip = cli.gzip || (!cli.no_gzip && config.output.gzip);
    let bytes = if gzip {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        encoder.finish()?
    } else {
        json
    };

    match &cli.output {
        Some(path) => std::fs::write(path, bytes)?,
        None => std::io::stdout().write_all(&bytes)?,
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("WEAVER_LOG"))
        .try_init()
        .ok();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(compile_err) = e.downcast_ref::<weaver::error::CompileError>() {
                eprintln!("error: {compile_err}");
                ExitCode::from(1)
            } else {
                eprintln!("error: {e}");
                ExitCode::from(2)
            }
        }
    }
}
