use std::path::Path;
use std::process;

use exval_core::{Heap, Options, Serializer};

use crate::config::read_config;
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_paths(
    filter: Option<&str>,
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

    let heap = Heap::new();
    let serializer = Serializer::configure(&heap, settings.apply(Options::default()));
    let paths: Vec<String> = serializer
        .paths()
        .iter()
        .map(|(_, path)| path)
        .filter(|path| filter.map_or(true, |f| path.contains(f)))
        .collect();

    match output {
        OutputFormat::Text => {
            for path in &paths {
                println!("{}", path);
            }
            if !quiet {
                eprintln!("{} canonical paths", paths.len());
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "count": paths.len(),
                "paths": paths,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}
