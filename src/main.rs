use clap::{Parser, Subcommand};
use ebook_builder::dataset::{FetchError, HttpFetcher};
use ebook_builder::pipeline::{self, BuildContext, Stage};
use ebook_builder::render::CommandRenderer;
use ebook_builder::{config, output};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ebook-builder")]
#[command(about = "Build the technology catalog ebook from two spreadsheets")]
#[command(long_about = "\
Build the technology catalog ebook from two spreadsheets

Each row of the technologies sheet becomes one page, grouped under its
category. HTML fragments in the content directory provide the cover,
introduction, per-category and per-technology layouts, and closing pages.
The assembled HTML is rendered to PDF with wkhtmltopdf.

Project structure:

  ebook.toml                   # Optional config (run 'ebook-builder gen-config')
  conteudos/
  ├── capa.html                # Cover
  ├── introducao.html          # Introduction
  ├── instrucoes.html          # Reading instructions
  ├── categoria_template.html  # {categoria} {descricao_categoria}
  ├── tecnologia_template.html # One placeholder per column + {links_formatados}
  ├── recursos.html            # {lista_recursos}
  ├── conclusao.html           # Conclusion
  ├── contracapa.html          # Back cover
  └── style.css                # Linked from the assembled HTML
  imagens/                     # Images named in the 'imagem' column
  .tmp/ebook.html              # Assembled document (recreated every run)
  ebook.pdf                    # Output (deleted at the start of every run)

Log verbosity can be tuned with EBOOK_LOG (e.g. EBOOK_LOG=debug).")]
#[command(version)]
struct Cli {
    /// Project root containing the content and image directories
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file, relative to the project root unless absolute
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Show debug logs
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors; suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: clean → fetch → assemble → render PDF
    Build,
    /// Run the pipeline without rendering; leaves the assembled HTML
    Html,
    /// Validate fragments and datasets without writing anything
    Check,
    /// Delete the PDF and recreate the temporary directory
    Clean,
    /// Print a stock ebook.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let quiet = cli.quiet;
    match cli.command {
        Command::Build => {
            let ctx = load_context(cli)?;
            let root = &ctx.workspace.root;
            let fetcher = fetcher(&ctx)?;
            let renderer = CommandRenderer::from_config(&ctx.config.renderer);
            let report = pipeline::build(&ctx, &fetcher, Some(&renderer), &progress(quiet, root))?;
            if !quiet {
                output::print_build_report(&report, root);
                println!("==> Build complete: {}", report_target(&report, root));
            }
        }
        Command::Html => {
            let ctx = load_context(cli)?;
            let root = &ctx.workspace.root;
            let report = pipeline::build(&ctx, &fetcher(&ctx)?, None, &progress(quiet, root))?;
            if !quiet {
                output::print_build_report(&report, root);
            }
        }
        Command::Check => {
            let ctx = load_context(cli)?;
            let root = &ctx.workspace.root;
            let summary = pipeline::check(&ctx, &fetcher(&ctx)?, &progress(quiet, root))?;
            if !quiet {
                output::print_summary(&summary, root);
                println!("==> Content is valid");
            }
        }
        Command::Clean => {
            let ctx = load_context(cli)?;
            progress(quiet, &ctx.workspace.root)(Stage::Clean);
            ctx.workspace.prepare()?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_context(cli: &Cli) -> Result<BuildContext, pipeline::BuildError> {
    BuildContext::load(&cli.root, &config_path(&cli.root, &cli.config))
}

fn fetcher(ctx: &BuildContext) -> Result<HttpFetcher, FetchError> {
    HttpFetcher::new(Duration::from_secs(ctx.config.sources.timeout_secs))
}

/// Stage printer; silent under `--quiet`.
fn progress(quiet: bool, root: &Path) -> impl Fn(Stage) + '_ {
    move |stage| {
        if !quiet {
            output::print_stage(&stage, root);
        }
    }
}

/// Resolve the `--config` flag against the project root.
fn config_path(root: &Path, config: &Path) -> PathBuf {
    if config.is_absolute() {
        config.to_path_buf()
    } else {
        root.join(config)
    }
}

fn report_target(report: &pipeline::BuildReport, root: &Path) -> String {
    let path = report.pdf.as_deref().unwrap_or(&report.html);
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// Logs go to stderr; `EBOOK_LOG` overrides the level chosen by the flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("EBOOK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
