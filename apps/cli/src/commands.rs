//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docgraph_core::{GraphProgress, Session, build_docset};
use docgraph_markdown::PipelineKind;
use docgraph_shared::{AppConfig, Diagnostic, FileId, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docgraph: resolve a documentation source tree into a TOC graph.
#[derive(Parser)]
#[command(
    name = "docgraph",
    version,
    about = "Resolve markdown docsets: includes, links, xrefs, monikers, and TOC graphs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Pipelines selectable from the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum RenderKind {
    Document,
    Plain,
    Inline,
}

impl From<RenderKind> for PipelineKind {
    fn from(kind: RenderKind) -> Self {
        match kind {
            RenderKind::Document => PipelineKind::Document,
            RenderKind::Plain => PipelineKind::Plain,
            RenderKind::Inline => PipelineKind::Inline,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the TOC graph of a docset and print it as JSON.
    Graph {
        /// Docset root directory.
        root: PathBuf,

        /// Worker count (overrides build.concurrency).
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Load one TOC file with monikers and print it as JSON.
    Toc {
        /// Docset root directory.
        root: PathBuf,

        /// TOC path relative to the root.
        file: String,
    },

    /// Render one markdown file to HTML.
    Render {
        /// Docset root directory.
        root: PathBuf,

        /// Markdown path relative to the root.
        file: String,

        /// Pipeline to render with.
        #[arg(short, long, default_value = "document")]
        kind: RenderKind,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write docgraph.toml with defaults.
    Init {
        /// Docset root directory.
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Show resolved configuration.
    Show {
        /// Docset root directory.
        #[arg(default_value = ".")]
        root: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docgraph=info",
        1 => "docgraph=debug",
        _ => "docgraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Graph { root, concurrency } => cmd_graph(&root, concurrency).await,
        Command::Toc { root, file } => cmd_toc(&root, &file),
        Command::Render { root, file, kind } => cmd_render(&root, &file, kind),
        Command::Config { action } => match action {
            ConfigAction::Init { root } => cmd_config_init(&root),
            ConfigAction::Show { root } => cmd_config_show(&root),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_graph(root: &Path, concurrency: Option<usize>) -> Result<()> {
    let session = Session::open(root)?;
    let mut config = session.graph_config();
    if let Some(concurrency) = concurrency {
        if concurrency == 0 {
            return Err(eyre!("--concurrency must be at least 1"));
        }
        config.concurrency = concurrency;
    }

    info!(root = %root.display(), concurrency = config.concurrency, "building toc graph");

    let reporter = CliProgress::new();
    let report = build_docset(&session, config, &reporter).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    print_diagnostics(report.diagnostics());
    eprintln!(
        "  {} TOCs, {} errors in {:.1}s",
        report.graph.len(),
        report.error_count(),
        report.elapsed.as_secs_f64()
    );

    match report.error_count() {
        0 => Ok(()),
        n => Err(eyre!("build finished with {n} error(s)")),
    }
}

fn cmd_toc(root: &Path, file: &str) -> Result<()> {
    let session = Session::open(root)?;
    let file = FileId::new(file);
    if !session.docset().contains(&file) {
        return Err(eyre!("'{file}' is not part of the docset at {}", root.display()));
    }

    let result = session.load_toc(&file, true);
    println!("{}", serde_json::to_string_pretty(&result)?);
    print_diagnostics(result.errors.iter());
    Ok(())
}

fn cmd_render(root: &Path, file: &str, kind: RenderKind) -> Result<()> {
    let session = Session::open(root)?;
    let output = session.render(&FileId::new(file), kind.into())?;

    if let Some(title) = &output.title {
        info!(%title, "rendered");
    }
    println!("{}", output.html);
    print_diagnostics(output.diagnostics.iter());
    Ok(())
}

fn cmd_config_init(root: &Path) -> Result<()> {
    let path = init_config(root)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(root: &Path) -> Result<()> {
    let config: AppConfig = load_config(root)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_diagnostics<'a>(diagnostics: impl Iterator<Item = &'a Diagnostic>) {
    for diagnostic in diagnostics {
        eprintln!("{diagnostic}");
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl GraphProgress for CliProgress {
    fn started(&self, total: usize) {
        self.spinner.set_message(format!("Loading {total} TOC files"));
    }

    fn toc_loaded(&self, file: &FileId, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Loaded [{current}/{total}] {file}"));
    }

    fn finished(&self, tocs: usize, diagnostics: usize) {
        self.spinner
            .set_message(format!("{tocs} TOCs, {diagnostics} diagnostics"));
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}
