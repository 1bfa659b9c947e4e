//! Command-line interface for xsd-model

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use xsd_model::{ResolveOptions, ResolvedSchema, SchemaManager};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xsd-model")]
#[command(author, version, about = "Resolve XML Schema sets into a definition graph", long_about = None)]
struct Cli {
    /// Log resolution progress (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a schema set and write the encoded definition graph
    Resolve {
        /// Path or URL of the entry schema document
        #[arg(value_name = "SCHEMA")]
        schema: String,

        /// Top-level element to use as root (prefix:local or local)
        #[arg(short, long)]
        root_element: Option<String>,

        /// Extra namespace binding, registered before the documents' own
        #[arg(short, long = "namespace", value_name = "PREFIX=URI")]
        namespaces: Vec<String>,

        /// Directory a relative SCHEMA is resolved against
        #[arg(short, long)]
        base_path: Option<PathBuf>,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Resolve on a worker thread with a large stack
        #[arg(short, long)]
        worker: bool,
    },

    /// Resolve a schema set and print a summary
    Inspect {
        /// Path or URL of the entry schema document
        #[arg(value_name = "SCHEMA")]
        schema: String,

        /// Top-level element to use as root (prefix:local or local)
        #[arg(short, long)]
        root_element: Option<String>,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Resolve {
            schema,
            root_element,
            namespaces,
            base_path,
            pretty,
            output,
            worker,
        } => cmd_resolve(schema, root_element, namespaces, base_path, pretty, output, worker),
        Commands::Inspect {
            schema,
            root_element,
        } => cmd_inspect(schema, root_element),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn setup_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("xsd_model=debug,info"),
        _ => EnvFilter::new("xsd_model=trace,debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(feature = "cli")]
fn parse_binding(binding: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    match binding.split_once('=') {
        Some((prefix, uri)) => Ok((prefix.to_string(), uri.to_string())),
        None => Err(format!("Invalid namespace binding '{}', expected PREFIX=URI", binding).into()),
    }
}

#[cfg(feature = "cli")]
fn cmd_resolve(
    schema: String,
    root_element: Option<String>,
    namespaces: Vec<String>,
    base_path: Option<PathBuf>,
    pretty: bool,
    output: Option<PathBuf>,
    worker: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = ResolveOptions::new();
    if let Some(name) = root_element {
        options = options.with_root_element(name);
    }
    if let Some(path) = base_path {
        options = options.with_base_path(path);
    }
    for binding in &namespaces {
        let (prefix, uri) = parse_binding(binding)?;
        options = options.with_namespace(prefix, uri);
    }

    let manager = SchemaManager::new(options);
    let resolved = if worker {
        manager.resolve_in_worker(&schema)?
    } else {
        manager.resolve(&schema)?
    };

    let json = if pretty {
        resolved.to_json_pretty()?
    } else {
        resolved.to_json()?
    };

    match output {
        Some(path) => fs::write(&path, json)?,
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_inspect(schema: String, root_element: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = ResolveOptions::new();
    if let Some(name) = root_element {
        options = options.with_root_element(name);
    }
    let resolved = SchemaManager::new(options).resolve_in_worker(&schema)?;
    print_summary(&resolved);
    Ok(())
}

#[cfg(feature = "cli")]
fn print_summary(schema: &ResolvedSchema) {
    println!("xsd-model v{}", xsd_model::VERSION);
    println!();
    println!("Namespaces:");
    for (index, binding) in schema.namespaces().iter().enumerate() {
        let prefix = if binding.prefix.is_empty() { "-" } else { binding.prefix.as_str() };
        let uri = if binding.uri.is_empty() { "(none)" } else { binding.uri.as_str() };
        println!("  {:>3}  {:<12} {}", index, prefix, uri);
    }
    println!();

    let root = &schema[schema.root()];
    println!("Top-level elements:");
    let top: Vec<_> = match root.kind {
        xsd_model::DefinitionKind::SchemaRoot => root.children.clone(),
        _ => vec![schema.root()],
    };
    for id in top {
        let def = &schema[id];
        let name = def.indexed_name().map(|n| n.to_string()).unwrap_or_default();
        println!(
            "  {:<30} children: {:<4} attributes: {}",
            name,
            def.children.len(),
            def.attributes.len()
        );
    }
    println!();
    println!("Definitions: {}", schema.len());
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
