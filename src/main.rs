use clap::Parser;
use formula_exec::{is_pure_value, Dispatcher, EvaluatorRegistry, ExecMode, Options};
use serde_json::Value;
use std::sync::Arc;
use tracing::Level;

/// Evaluate a data-binding value against a JSON data context.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Value to evaluate, e.g. "${name}", "=1+1" or "js:data.a + 1".
    value: String,
    /// Data context as a JSON document.
    #[arg(long, default_value = "{}")]
    data: String,
    /// Execution-mode hint: `true`/`false` toggles evaluation mode, any
    /// other word names an evaluator to run directly.
    #[arg(long)]
    mode: Option<String>,
    /// JSON file with dispatcher options, e.g. {"eval_mode": false}.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
    /// Parse `value` as JSON instead of treating it as a string.
    #[arg(long)]
    json_value: bool,
    /// Only report whether the value bypasses evaluation.
    #[arg(long)]
    pure: bool,
    /// Log evaluation details to stderr.
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    // Parse CLI arguments.
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let data: Value = match serde_json::from_str(&args.data) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Invalid data JSON: {e}");
            std::process::exit(1);
        }
    };

    let value = if args.json_value {
        match serde_json::from_str(&args.value) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Invalid value JSON: {e}");
                std::process::exit(1);
            }
        }
    } else {
        Value::String(args.value.clone())
    };

    if args.pure {
        println!("{}", is_pure_value(&value));
        return;
    }

    let options = match args.config.as_ref().map(std::fs::read_to_string) {
        None => Options::default(),
        Some(Ok(text)) => match Options::from_json(&text) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("Invalid config: {e}");
                std::process::exit(1);
            }
        },
        Some(Err(e)) => {
            eprintln!("Cannot read config: {e}");
            std::process::exit(1);
        }
    };

    let mode = match args.mode.as_deref() {
        None => ExecMode::Default,
        Some("true") => ExecMode::Eval(true),
        Some("false") => ExecMode::Eval(false),
        Some(name) => ExecMode::Evaluator(name.to_string()),
    };

    let dispatcher = Dispatcher::with_options(Arc::new(EvaluatorRegistry::with_builtins()), options);
    let out = dispatcher.dispatch(&value, &data, mode);

    match serde_json::to_string_pretty(&out) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("Cannot serialize result: {e}");
            std::process::exit(1);
        }
    }
}
