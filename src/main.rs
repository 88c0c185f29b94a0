//! # Folio CLI
//!
//! Usage:
//!   folio [-b|--show-bounding-box] [-o out.pdf] [--page-size letter|a4|legal]
//!         [--dump-layout layout.json] FILE...
//!
//! All input documents are rendered into one PDF. Set `RUST_LOG=debug` to
//! see measured sizes and gravity offsets.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use folio::model::PageSize;
use folio::{RenderOptions, Renderer};

const USAGE: &str = "usage: folio [-b|--show-bounding-box] [-o out.pdf] \
                     [--page-size letter|a4|legal] [--dump-layout layout.json] FILE...";

struct Args {
    options: RenderOptions,
    output: PathBuf,
    dump_layout: Option<PathBuf>,
    inputs: Vec<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args {
        options: RenderOptions::default(),
        output: PathBuf::from("out.pdf"),
        dump_layout: None,
        inputs: Vec::new(),
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-b" | "--show-bounding-box" => parsed.options.show_bounding_boxes = true,
            "-o" | "--output" => {
                let value = iter.next().ok_or("-o needs a file name")?;
                parsed.output = PathBuf::from(value);
            }
            "--page-size" => {
                let value = iter.next().ok_or("--page-size needs a value")?;
                parsed.options.page_size = PageSize::from_name(value)
                    .ok_or_else(|| format!("unknown page size '{}'", value))?;
            }
            "--dump-layout" => {
                let value = iter.next().ok_or("--dump-layout needs a file name")?;
                parsed.dump_layout = Some(PathBuf::from(value));
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option '{}'", flag)),
            input => parsed.inputs.push(PathBuf::from(input)),
        }
    }

    if parsed.inputs.is_empty() {
        return Err("no input files".to_string());
    }
    Ok(parsed)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let raw: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            process::exit(1);
        }
    };

    let mut renderer = Renderer::new(args.options);
    let mut failed = false;
    for input in &args.inputs {
        if let Err(e) = renderer.add_file(input) {
            log::error!("{}: {}", input.display(), e);
            failed = true;
        }
    }

    if let Some(path) = &args.dump_layout {
        let written = serde_json::to_string_pretty(&renderer.layout_info())
            .map_err(folio::FolioError::from)
            .and_then(|json| fs::write(path, json).map_err(folio::FolioError::from));
        match written {
            Ok(()) => log::info!("Layout written to {}", path.display()),
            Err(e) => {
                log::error!("{}: {}", path.display(), e);
                failed = true;
            }
        }
    }

    let output = match renderer.finish() {
        Ok(output) => output,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };
    if let Err(e) = fs::write(&args.output, &output.pdf) {
        log::error!("{}: {}", args.output.display(), e);
        process::exit(1);
    }
    log::info!(
        "Wrote {} bytes to {}",
        output.pdf.len(),
        args.output.display()
    );

    if failed || !output.failures.is_empty() {
        process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let parsed = parse_args(&args(&["doc.xml"])).unwrap();
        assert_eq!(parsed.output, PathBuf::from("out.pdf"));
        assert!(!parsed.options.show_bounding_boxes);
        assert_eq!(parsed.options.page_size, PageSize::Letter);
        assert_eq!(parsed.inputs, vec![PathBuf::from("doc.xml")]);
    }

    #[test]
    fn test_all_flags() {
        let parsed = parse_args(&args(&[
            "-b",
            "-o",
            "report.pdf",
            "--page-size",
            "a4",
            "--dump-layout",
            "layout.json",
            "a.xml",
            "b.xml",
        ]))
        .unwrap();
        assert!(parsed.options.show_bounding_boxes);
        assert_eq!(parsed.output, PathBuf::from("report.pdf"));
        assert_eq!(parsed.options.page_size, PageSize::A4);
        assert_eq!(parsed.dump_layout, Some(PathBuf::from("layout.json")));
        assert_eq!(parsed.inputs.len(), 2);
    }

    #[test]
    fn test_errors() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["-o"])).is_err());
        assert!(parse_args(&args(&["--page-size", "tabloid", "a.xml"])).is_err());
        assert!(parse_args(&args(&["--frobnicate", "a.xml"])).is_err());
    }
}
