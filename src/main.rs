use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use phpantom_docs::batch::{self, BatchOptions};
use phpantom_docs::{Config, ConfigLayer, DocBuilder, DocError, DocblockParser};

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "PHPANTOM_DOCS_LOG";

#[derive(Parser)]
#[command(name = "phpantom-docs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build a resolved documentation model for the classes of a PHP project")]
struct Cli {
    /// Project root (the directory holding composer.json).
    #[arg(value_name = "DIR", default_value = ".")]
    project: PathBuf,

    /// Print the view of one class as JSON instead of writing the whole project.
    #[arg(short, long, value_name = "CLASS")]
    class: Option<String>,

    /// Namespace whose classes are documented.
    #[arg(long, value_name = "NAMESPACE")]
    root_namespace: Option<String>,

    /// Directory holding the root namespace's sources, relative to the project.
    #[arg(long, value_name = "DIR")]
    root_path: Option<PathBuf>,

    /// URL the generated pages are published under.
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Namespace to leave out; may be repeated.
    #[arg(long = "exclude", value_name = "NAMESPACE")]
    exclude: Vec<String>,

    /// Output directory, relative to the project.
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Number of classes built in parallel.
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Per-class time budget in seconds.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Log at debug level unless PHPANTOM_DOCS_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            root_namespace: self.root_namespace.clone(),
            root_path: self.root_path.clone(),
            base_url: self.base_url.clone(),
            output_dir: self.output.clone(),
            exclude: (!self.exclude.is_empty()).then(|| self.exclude.clone()),
            timeout_secs: self.timeout,
            workers: self.workers,
            ..ConfigLayer::default()
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "phpantom_docs=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, DocError> {
    let config = Config::load(&cli.project, cli.overrides())?;
    let context = config.link_context();
    let index = Arc::new(batch::index_project(&config));

    if let Some(class) = &cli.class {
        let parser = DocblockParser;
        let builder = DocBuilder::new(&*index, &parser);
        let view = builder.build_class_view(class, &context)?;
        for issue in builder.take_degradations() {
            eprintln!("warning: {issue}");
        }
        let json = serde_json::to_string_pretty(&view)
            .map_err(|err| DocError::Config(format!("cannot serialize view: {err}")))?;
        println!("{json}");
        return Ok(ExitCode::SUCCESS);
    }

    let classes = batch::documented_classes(&index, &context);
    let report = batch::run_batch(
        Arc::clone(&index),
        classes,
        context.clone(),
        BatchOptions::from_config(&config),
    )
    .await;

    let out = config.output_root();
    let written = report.write_to(&out, &context.root_namespace)?;
    eprintln!(
        "{} classes documented, {} failed, {} files written to {}",
        report.views.len(),
        report.failures.len(),
        written.len(),
        out.display()
    );
    for (class, issues) in &report.degradations {
        for issue in issues {
            eprintln!("warning: {class}: {issue}");
        }
    }
    for (class, err) in &report.failures {
        eprintln!("error: {class}: {err}");
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
