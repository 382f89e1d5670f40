use anyhow::{anyhow, Context, Result};
use clap::{App, Arg, ArgMatches};
use log::{error, info};
use nbpress::config::{Config, Options, Site};
use nbpress::convert::{Format, NotebookConverter};
use nbpress::export::export;
use nbpress::publish::Publisher;
use std::path::Path;

const DEFAULT_ROOT: &str = "notebooks";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = App::new("nbpress")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Publishes folders of Jupyter notebooks to WordPress")
        .arg(
            Arg::with_name("root")
                .help("The directory of notebook folders to publish")
                .index(1)
                .default_value(DEFAULT_ROOT),
        )
        .arg(
            Arg::with_name("kind")
                .short("k")
                .long("kind")
                .takes_value(true)
                .possible_values(&["pages", "posts"])
                .help("Publish folders as parent pages or as post categories"),
        )
        .arg(
            Arg::with_name("status")
                .short("s")
                .long("status")
                .takes_value(true)
                .help("The status for published items (e.g. publish, draft)"),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .takes_value(true)
                .possible_values(&["html", "markdown"])
                .help("The format of published bodies"),
        )
        .arg(
            Arg::with_name("recursive")
                .short("r")
                .long("recursive")
                .help("Publish nested folders beneath their enclosing folder"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .value_name("FILE")
                .help("The project file (defaults to the nearest nbpress.yaml)"),
        )
        .arg(
            Arg::with_name("export")
                .long("export")
                .takes_value(true)
                .value_name("DIR")
                .help("Convert notebooks to markdown files in DIR instead of publishing"),
        )
        .get_matches();

    match run(&matches) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether every item succeeded. Fatal problems are returned as
/// errors before any item is processed.
fn run(matches: &ArgMatches) -> Result<bool> {
    let root = Path::new(matches.value_of("root").unwrap_or(DEFAULT_ROOT));

    if let Some(out) = matches.value_of("export") {
        let converter = NotebookConverter::new(Format::Markdown);
        let results = export(&converter, root, Path::new(out))?;
        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!(
            "Exported {} notebooks ({} failed)",
            results.len() - failed,
            failed
        );
        return Ok(failed == 0);
    }

    let site = Site::from_env().context("initializing publisher")?;
    let options = options(matches, root)?;
    info!("Publisher initialized for {}", site.url);
    let publisher = Publisher::new(&Config { site, options })?;

    let report = publisher.traverse(root)?;
    for outcome in report.failed() {
        if let Err(err) = &outcome.result {
            error!("{}: {}", outcome.path.display(), err);
        }
    }
    info!(
        "Publishing finished: {} created, {} updated, {} failed",
        report.created(),
        report.updated(),
        report.failed().count()
    );
    Ok(report.is_success())
}

/// Loads the project file and applies command-line overrides.
fn options(matches: &ArgMatches, root: &Path) -> Result<Options> {
    let mut options = match matches.value_of("config") {
        Some(path) => Options::from_project_file(Path::new(path))?,
        None => Options::from_directory(root)?,
    };
    if let Some(kind) = matches.value_of("kind") {
        options.mode = kind.parse()?;
    }
    if let Some(status) = matches.value_of("status") {
        options.status = status.to_owned();
    }
    if let Some(format) = matches.value_of("format") {
        options.format = format.parse().map_err(|e: String| anyhow!(e))?;
    }
    if matches.is_present("recursive") {
        options.recursive = true;
    }
    Ok(options)
}
