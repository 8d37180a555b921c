mod config;
mod host;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use engine::{
    DefaultEvaluator, DocumentMetadata, HostQuery, Pipeline, PipelineOptions, SystemQuery, Value,
};
use regen::{Extractor, Markers, PatchOp, diagnostic, frontmatter, patch_ops};

use config::Config;
use host::FileHost;

const SUBCOMMANDS: &[&str] = &["run", "scan", "help"];

#[derive(Parser)]
#[command(
    name = "regen",
    version,
    about = "Regenerate directive blocks in text documents"
)]
struct Cli {
    /// Disable colored diagnostic output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate every directive block in a file and rewrite it in place
    Run(RunArgs),

    /// List the directive blocks in a file without evaluating anything
    Scan(ScanArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Document to process
    file: String,

    /// Namespace token of the directive markers
    #[arg(long)]
    namespace: Option<String>,

    /// Print the planned edit operations instead of writing the file
    #[arg(long)]
    dry_run: bool,

    /// Skip the `last update` metadata stamp
    #[arg(long)]
    no_stamp: bool,

    /// Extra binding available to expressions, as name=value. Repeatable.
    #[arg(short, long)]
    bind: Vec<String>,

    /// Suppress the summary notification
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Document to scan
    file: String,

    /// Namespace token of the directive markers
    #[arg(long)]
    namespace: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Backwards compatibility: if the first positional arg is not a known
    // subcommand, inject "run" so `regen file.md` works like `regen run file.md`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(first_pos) = args.iter().skip(1).find(|a| !a.starts_with('-')) {
        let first_pos = first_pos.clone();
        if !SUBCOMMANDS.contains(&first_pos.as_str()) {
            let pos = args.iter().position(|a| *a == first_pos).unwrap();
            args.insert(pos, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    match cli.command {
        Command::Run(run_args) => do_run(run_args),
        Command::Scan(scan_args) => do_scan(scan_args, cli.no_color),
    }
}

fn do_run(args: RunArgs) {
    let source = read_document(&args.file);
    let config = load_config(&args.file);

    let markers = Markers::new(
        args.namespace
            .or(config.namespace.clone())
            .unwrap_or_else(|| Markers::default().namespace().to_string()),
    );
    let options = PipelineOptions {
        stamp_metadata: !args.no_stamp && config.stamp_metadata.unwrap_or(true),
        ignore_key: config
            .ignore_key
            .clone()
            .unwrap_or_else(|| PipelineOptions::default().ignore_key),
    };

    let mut bindings: HashMap<String, Value> = config.binding_values();
    for bind in &args.bind {
        let Some((name, value)) = bind.split_once('=') else {
            eprintln!("error: --bind expects name=value, got '{}'", bind);
            process::exit(2);
        };
        bindings.insert(name.trim().to_string(), parse_binding(value));
    }

    let metadata = DocumentMetadata {
        path: Some(PathBuf::from(&args.file)),
        frontmatter: frontmatter::frontmatter(&source),
    };

    let host = Rc::new(FileHost::new(&source, args.quiet));
    let query: Rc<dyn HostQuery> = Rc::new(SystemQuery);
    let pipeline = Pipeline::new(markers, options);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: cannot start runtime: {}", e);
            process::exit(1);
        }
    };
    let local = tokio::task::LocalSet::new();

    // The batch runs to completion synchronously; deferred sections settle
    // on the local task set, and we wait for all of them before writing the
    // file back out.
    let report = runtime.block_on(local.run_until(async {
        let mut report =
            pipeline.run_batch(&host, &DefaultEvaluator, &query, &metadata, &bindings);
        for task in report.settle_tasks.drain(..) {
            let _ = task.await;
        }
        report
    }));

    let new_text = host.text();
    if new_text != source {
        if args.dry_run {
            print_ops(&source, &new_text);
        } else if let Err(e) = std::fs::write(&args.file, &new_text) {
            eprintln!("error: cannot write '{}': {}", args.file, e);
            process::exit(1);
        }
    }

    if report.failed > 0 {
        process::exit(1);
    }
}

fn do_scan(args: ScanArgs, no_color: bool) {
    let source = read_document(&args.file);
    let config = load_config(&args.file);

    let markers = Markers::new(
        args.namespace
            .or(config.namespace)
            .unwrap_or_else(|| Markers::default().namespace().to_string()),
    );

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let (sections, _) = Extractor::new(markers).extract(&source);
    if sections.is_empty() {
        println!("no directive blocks found");
        return;
    }

    for section in &sections {
        let state = if section.is_closed() { "closed" } else { "open" };
        let label = if section.label.is_empty() {
            "(empty)"
        } else {
            section.label.lines().next().unwrap_or("")
        };
        println!("#{} {} [{}]", section.id, label, state);
        if let Some(script) = &section.script {
            println!("    script: {}", script.language);
        }
        if let Some(metadata) = &section.closing_metadata {
            for (key, value) in metadata.iter() {
                println!("    {}: {}", key, value);
            }
        }
    }

    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    for diagnostic in diagnostic::section_diagnostics(&sections, file_id) {
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
    }
}

fn read_document(path: &str) -> String {
    match std::fs::read_to_string(path) {
        // CRLF documents are normalized; the rewrite goes back out with \n.
        Ok(text) => text.replace("\r\n", "\n"),
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path, e);
            process::exit(1);
        }
    }
}

fn load_config(target: &str) -> Config {
    match Config::load(Path::new(target)) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {}", message);
            process::exit(1);
        }
    }
}

fn print_ops(old: &str, new: &str) {
    for op in patch_ops(old, new) {
        match op {
            PatchOp::Insert { at, text } => {
                println!("insert {}:{} {:?}", at.line, at.column, text);
            }
            PatchOp::Delete { from, to } => {
                println!(
                    "delete {}:{}..{}:{}",
                    from.line, from.column, to.line, to.column
                );
            }
        }
    }
}

/// Parse a --bind value: numbers become numbers, "true"/"false" become
/// booleans, everything else is a string.
fn parse_binding(s: &str) -> Value {
    if let Ok(n) = s.parse::<f64>() {
        return Value::Number(n);
    }
    match s {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => Value::String(s.to_string()),
    }
}
