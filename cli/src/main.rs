use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use yamlgraph_core::{
    Document, EventReader, Serializer, SerializerSettings, TypeCatalog, TypeKey, Value,
};

#[derive(Parser)]
#[command(name = "yamlgraph")]
#[command(about = "Resolve anchors and aliases in document event streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deserialize an event stream into an object graph and report on it
    Resolve {
        /// Input event stream (JSON array of events)
        input: PathBuf,

        #[command(flatten)]
        pass: PassArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = ResolveFormat::Summary)]
        format: ResolveFormat,
    },

    /// Deserialize an event stream and serialize it again with synthetic anchors
    Normalize {
        /// Input event stream (JSON array of events)
        input: PathBuf,

        /// Output event stream file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        pass: PassArgs,

        /// Write shared objects once per reference instead of anchoring them
        #[arg(long)]
        no_anchors: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct PassArgs {
    /// Type catalog file (JSON array of type declarations)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Serializer settings file (JSON, kebab-case keys)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Expected type of the document root
    #[arg(long = "type", default_value = "any")]
    root_type: String,

    /// Max nesting depth (overrides the settings file)
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum ResolveFormat {
    Summary,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    Pretty,
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Resolve {
            input,
            pass,
            format,
        } => {
            let (settings, catalog) = load_pass(&pass)?;
            let root_type = TypeKey::new(pass.root_type);
            let document = deserialize(&input, settings, catalog, &root_type)?;

            match format {
                ResolveFormat::Summary => {
                    let mut out = io::stdout().lock();
                    write_summary(&mut out, &document).context("Failed to write summary")?;
                }
                ResolveFormat::Json => write_json(&document, None, OutputFormat::Pretty)?,
            }
        }
        Commands::Normalize {
            input,
            output,
            pass,
            no_anchors,
            format,
        } => {
            let (settings, catalog) = load_pass(&pass)?;
            let root_type = TypeKey::new(pass.root_type);
            let document = deserialize(&input, settings.clone(), catalog.clone(), &root_type)?;

            let writer = Serializer::with_catalog(
                SerializerSettings {
                    track_anchors: !no_anchors,
                    ..settings
                },
                catalog,
            );
            let events = writer
                .serialize_to_events(&document.graph, &document.root, &root_type)
                .map_err(|e| anyhow::Error::from(e).context("Serialization failed"))?;

            write_json(&events, output.as_ref(), format)?;
        }
    }

    Ok(())
}

fn load_pass(pass: &PassArgs) -> Result<(SerializerSettings, TypeCatalog)> {
    let mut settings = match &pass.settings {
        Some(path) => {
            let text = read_file(path, "settings")?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse settings from: {}", path.display()))?
        }
        None => SerializerSettings::default(),
    };
    if let Some(max_depth) = pass.max_depth {
        settings.max_depth = max_depth;
    }

    let catalog = match &pass.catalog {
        Some(path) => {
            let text = read_file(path, "catalog")?;
            TypeCatalog::from_json(&text)
                .with_context(|| format!("Failed to parse catalog from: {}", path.display()))?
        }
        None => TypeCatalog::new(),
    };

    Ok((settings, catalog))
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to open {what} file: {}", path.display()))
}

/// Aliases in the input are always resolved; `track-anchors` only affects
/// what gets written.
fn deserialize(
    input: &Path,
    settings: SerializerSettings,
    catalog: TypeCatalog,
    root_type: &TypeKey,
) -> Result<Document> {
    let text = read_file(input, "input")?;
    let mut reader = EventReader::from_json(&text)
        .with_context(|| format!("Failed to parse events from: {}", input.display()))?;

    let serializer = Serializer::with_catalog(
        SerializerSettings {
            track_anchors: true,
            ..settings
        },
        catalog,
    );
    serializer
        .deserialize(&mut reader, root_type)
        .map_err(|e| anyhow::Error::from(e).context("Deserialization failed"))
}

fn write_summary(out: &mut impl Write, document: &Document) -> io::Result<()> {
    writeln!(out, "objects: {}", document.graph.len())?;
    writeln!(out, "anchors: {}", document.stats.anchors)?;
    writeln!(out, "late bindings: {}", document.stats.late_bindings)?;
    match &document.root {
        Value::Ref(_) => match document.root_object() {
            Some(object) => writeln!(out, "root: {}", object.type_key),
            None => writeln!(out, "root: <dangling>"),
        },
        scalar => {
            let ty = scalar.scalar_type().unwrap_or(TypeKey::ANY);
            writeln!(out, "root: {ty} (scalar)")
        }
    }
}

fn write_json<T: serde::Serialize>(
    val: &T,
    path: Option<&PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let mut writer: Box<dyn Write> = if let Some(p) = path {
        let file = File::create(p)
            .with_context(|| format!("Failed to create output file: {}", p.display()))?;
        Box::new(BufWriter::new(file))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    match format {
        OutputFormat::Pretty => {
            serde_json::to_writer_pretty(&mut writer, val).context("Failed to write JSON")?;
        }
        OutputFormat::Compact => {
            serde_json::to_writer(&mut writer, val).context("Failed to write JSON")?;
        }
    }

    writeln!(writer).context("Failed to write trailing newline")?;
    writer.flush().context("Failed to flush output")?;

    Ok(())
}
