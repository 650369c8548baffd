//! Typify CLI - instrument JavaScript sources for runtime contract checking

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn, Level};
use walkdir::WalkDir;

use typify_instrument::{
    collect_directives, is_instrumentable, DirectiveKind, InstrumentConfig, InstrumentError,
    Instrumenter, Stats,
};
use typify_parser::parse_file;

#[derive(Parser)]
#[command(name = "typify")]
#[command(about = "Comment-driven contract instrumentation for JavaScript", long_about = None)]
struct Cli {
    /// More log output (repeat for more)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Instrument files or directory trees
    Instrument {
        /// Input files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Output directory; a single input is written to stdout without it
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// Write a source map next to each output file
        #[arg(long)]
        source_map: bool,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Dotted path of the runtime checker
        #[arg(long)]
        checker: Option<String>,
        /// Fail on malformed directives
        #[arg(long)]
        strict: bool,
        /// Include node_modules and test directories
        #[arg(long)]
        all: bool,
    },
    /// Parse a file and output the AST as JSON
    Parse {
        /// Input file
        file: PathBuf,
        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },
    /// List the typify directives of a file as JSON
    Directives {
        /// Input file
        file: PathBuf,
    },
}

/// A source file to instrument and where its output goes, relative to the
/// output directory
struct Input {
    path: PathBuf,
    relative: PathBuf,
}

/// One line of the `directives` listing
#[derive(Serialize)]
struct ListedDirective<'a> {
    #[serde(flatten)]
    kind: &'a DirectiveKind,
    /// Byte range of the comment in the file
    start: usize,
    end: usize,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Instrument {
            paths,
            out_dir,
            source_map,
            config,
            checker,
            strict,
            all,
        } => {
            let mut config = load_config(config.as_deref());
            if let Some(checker) = checker {
                config.checker = checker;
            }
            if strict {
                config.strict_directives = true;
            }
            cmd_instrument(&paths, out_dir.as_deref(), source_map, config, all)
        }
        Commands::Parse { file, pretty } => cmd_parse(&file, pretty),
        Commands::Directives { file } => cmd_directives(&file),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> InstrumentConfig {
    let Some(path) = path else {
        return InstrumentConfig::default();
    };
    let text = read_source(path);
    match serde_json::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error in config {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn read_source(file: &Path) -> String {
    match fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", file.display(), e);
            std::process::exit(1);
        }
    }
}

/// Expand the command line paths into source files. Directories contribute
/// their `.js` files, minus excluded directories unless `all` is set.
fn collect_inputs(paths: &[PathBuf], all: bool) -> Result<Vec<Input>, String> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_file() {
            let relative = path.file_name().map(PathBuf::from).unwrap_or_else(|| path.clone());
            inputs.push(Input {
                path: path.clone(),
                relative,
            });
            continue;
        }
        if !path.is_dir() {
            return Err(format!("{}: no such file or directory", path.display()));
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|e| e.to_string())?;
            let file = entry.path();
            if !entry.file_type().is_file() || file.extension().and_then(|e| e.to_str()) != Some("js") {
                continue;
            }
            let relative = file.strip_prefix(path).unwrap_or(file).to_path_buf();
            if !all && !is_instrumentable(&relative) {
                debug!(file = %file.display(), "skipping excluded file");
                continue;
            }
            inputs.push(Input {
                path: file.to_path_buf(),
                relative,
            });
        }
    }
    Ok(inputs)
}

fn cmd_instrument(
    paths: &[PathBuf],
    out_dir: Option<&Path>,
    source_map: bool,
    mut config: InstrumentConfig,
    all: bool,
) {
    let inputs = match collect_inputs(paths, all) {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if out_dir.is_none() && inputs.len() > 1 {
        eprintln!("Error: {} input files need --out-dir", inputs.len());
        std::process::exit(1);
    }
    if source_map && out_dir.is_none() {
        warn!("--source-map needs --out-dir; no map written");
    }
    config.source_map = source_map && out_dir.is_some();

    let stats = Arc::new(Stats::new());
    let instrumenter = match Instrumenter::new(config, stats.clone()) {
        Ok(instrumenter) => instrumenter,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut all_ok = true;
    for input in &inputs {
        let source = read_source(&input.path);
        let name = input.path.to_string_lossy().to_string();

        let result = match instrumenter.instrument(&source, &name) {
            Ok(result) => result,
            Err(e) => {
                report_instrument_error(&source, &name, &e);
                all_ok = false;
                continue;
            }
        };
        for warning in &result.warnings {
            report(
                &source,
                &name,
                ReportKind::Warning,
                &warning.error.to_string(),
                warning.range.clone(),
            );
        }

        let Some(out_dir) = out_dir else {
            println!("{}", result.code);
            continue;
        };
        let out_path = out_dir.join(&input.relative);
        if let Err(e) = write_output(&out_path, &result.code) {
            eprintln!("Error writing {}: {}", out_path.display(), e);
            all_ok = false;
            continue;
        }
        info!(file = %out_path.display(), "wrote");

        if let Some(map) = &result.source_map {
            let map_path = PathBuf::from(format!("{}.map", out_path.display()));
            if let Err(e) = write_output(&map_path, map) {
                eprintln!("Error writing {}: {}", map_path.display(), e);
                all_ok = false;
            }
        }
    }

    eprintln!("{}", stats);

    if !all_ok {
        std::process::exit(1);
    }
}

fn write_output(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{contents}\n"))
}

fn cmd_parse(file: &Path, pretty: bool) {
    let source = read_source(file);
    let name = file.to_string_lossy().to_string();

    match parse_file(&source, &name) {
        Ok(parsed) => {
            let json = if pretty {
                serde_json::to_string_pretty(&parsed.script)
            } else {
                serde_json::to_string(&parsed.script)
            };
            match json {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error serializing AST: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            report(&source, &name, ReportKind::Error, &e.to_string(), e.span());
            std::process::exit(1);
        }
    }
}

fn cmd_directives(file: &Path) {
    let source = read_source(file);
    let name = file.to_string_lossy().to_string();

    let parsed = match parse_file(&source, &name) {
        Ok(parsed) => parsed,
        Err(e) => {
            report(&source, &name, ReportKind::Error, &e.to_string(), e.span());
            std::process::exit(1);
        }
    };
    let context = &parsed.context;

    let (directives, errors) = collect_directives(&context.comments());
    for error in &errors {
        let range = context.range(error.span());
        report(&source, &name, ReportKind::Warning, &error.to_string(), range);
    }
    let listed: Vec<ListedDirective> = directives
        .iter()
        .map(|directive| {
            let range = context.range(directive.span);
            ListedDirective {
                kind: &directive.kind,
                start: range.start,
                end: range.end,
            }
        })
        .collect();
    match serde_json::to_string_pretty(&listed) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing directives: {}", e);
            std::process::exit(1);
        }
    }
}

fn report_instrument_error(source: &str, file: &str, error: &InstrumentError) {
    match error {
        InstrumentError::Parse(e) => report(source, file, ReportKind::Error, &e.to_string(), e.span()),
        InstrumentError::Directive { error, range } => {
            report(source, file, ReportKind::Error, &error.to_string(), range.clone())
        }
        InstrumentError::Pattern(_) | InstrumentError::Codegen(_) => eprintln!("Error: {}", error),
    }
}

/// Render a labelled diagnostic for the byte range `span` of `source`
fn report(source: &str, file: &str, kind: ReportKind, message: &str, span: Range<usize>) {
    // Report positions count characters, ranges count bytes
    let to_char = |offset: usize| source.get(..offset).map_or(offset, |s| s.chars().count());
    let range = to_char(span.start)..to_char(span.end);
    let color = match kind {
        ReportKind::Warning => Color::Yellow,
        _ => Color::Red,
    };

    let printed = Report::build(kind, file.to_string(), range.start)
        .with_message(message)
        .with_label(
            Label::new((file.to_string(), range))
                .with_message(message)
                .with_color(color),
        )
        .finish()
        .eprint((file.to_string(), Source::from(source)));
    if printed.is_err() {
        eprintln!("{}: {}", file, message);
    }
}
