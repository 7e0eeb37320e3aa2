use clap::{Parser, Subcommand};
use std::path::Path;

#[derive(Parser)]
#[command(name = "l2j")]
#[command(about = "l2j — Liquid to Jinja2 template converter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a Liquid template to Jinja2
    Convert {
        /// Input Liquid template file
        path: String,

        /// Print the converted template to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// Check a Liquid template for errors without writing output
    Check {
        /// Input Liquid template file
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Convert { path, stdout } => cmd_convert(&path, stdout),
        Command::Check { path } => cmd_check(&path),
    }
}

fn read_source(path: &str) -> String {
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn report_diagnostics(diagnostics: &[l2j_codegen::Diagnostic]) -> ! {
    for diagnostic in diagnostics {
        eprintln!("{diagnostic}");
    }
    std::process::exit(1);
}

fn cmd_convert(path: &str, to_stdout: bool) {
    let source = read_source(path);

    let jinja = match l2j_codegen::convert(&source) {
        Ok(jinja) => jinja,
        Err(e) => report_diagnostics(&e.diagnostics),
    };

    if to_stdout {
        print!("{jinja}");
        return;
    }

    // Write output next to the source
    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let dir = Path::new(path).parent().unwrap_or(Path::new("."));
    let out_path = dir.join(format!("{stem}.j2"));

    if let Err(e) = std::fs::write(&out_path, &jinja) {
        eprintln!("Error writing {}: {e}", out_path.display());
        std::process::exit(1);
    }

    eprintln!("Converted: {}", out_path.display());
}

fn cmd_check(path: &str) {
    let source = read_source(path);

    // Parse first so structural problems surface even when generation
    // would also fail
    let parsed = match l2j_parser::Parser::parse(&source) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let mut diagnostics = parsed.diagnostics;
    if let Err(e) = l2j_codegen::generate(&parsed.document) {
        diagnostics.extend(e.diagnostics);
    }
    if !diagnostics.is_empty() {
        report_diagnostics(&diagnostics);
    }

    eprintln!("OK: {path}");
}
