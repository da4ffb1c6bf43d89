use std::path::Path;
use std::process;

use exval_core::{load, Heap, Options, Serializer};
use tracing::debug;

use crate::config::read_config;
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_stringify(
    file: &Path,
    preserve_names: bool,
    config: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let settings = match read_config(config) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let mut options = settings.apply(Options::default());
    if preserve_names {
        options = options.preserve_callable_names(true);
    }

    let json = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(_) => {
            let msg = format!("error: graph document not found: {}", file.display());
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let mut heap = Heap::new();
    let root = match load(&mut heap, &json) {
        Ok(v) => v,
        Err(e) => {
            report_error(&format!("error: {}: {}", file.display(), e), output, quiet);
            process::exit(1);
        }
    };
    debug!(objects = heap.len(), "graph document loaded");

    let serializer = Serializer::configure(&heap, options);
    match serializer.stringify(&heap, &root) {
        Ok(source) => match output {
            OutputFormat::Text => println!("{}", source),
            OutputFormat::Json => {
                let json = serde_json::json!({ "source": source });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_default()
                );
            }
        },
        Err(e) => {
            if !quiet {
                match output {
                    OutputFormat::Json => {
                        let json = serde_json::json!({
                            "error": e.to_string(),
                            "kind": e.kind(),
                        });
                        eprintln!(
                            "{}",
                            serde_json::to_string_pretty(&json).unwrap_or_default()
                        );
                    }
                    OutputFormat::Text => eprintln!("error: {}", e),
                }
            }
            process::exit(1);
        }
    }
}
