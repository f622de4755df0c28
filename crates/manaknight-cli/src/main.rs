//! mkc - Manaknight compiler command line
//!
//! `mkc <input> [-o <out.js>] [-a <openapi.json>] [-f] [-c] [-v]`
//!
//! Exit code 0 on success, non-zero on any diagnostic. Each diagnostic
//! prints as `Error E####: <message> at <file>:<line>:<column>`; `-v`
//! additionally renders source-annotated reports.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::Parser;

use manaknight::diag::Diagnostic;
use manaknight::{compile, default_output_path, format_source, CompileOptions};

#[derive(Parser)]
#[command(name = "mkc")]
#[command(about = "Manaknight compiler", long_about = None)]
struct Cli {
    /// Entry source file
    input: PathBuf,

    /// Output path for the emitted JavaScript (default: input with .js)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Emit an OpenAPI document alongside the JavaScript
    #[arg(short = 'a', long = "openapi")]
    openapi: Option<PathBuf>,

    /// Print the canonical formatting of the input to stdout
    #[arg(short = 'f', long = "format")]
    format: bool,

    /// Type-check without emitting
    #[arg(short = 'c', long = "check")]
    check: bool,

    /// Verbose: pass logs and annotated error reports
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Anything after `--` is ignored
    #[arg(last = true, hide = true)]
    _ignored: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.format {
        return cmd_format(&cli);
    }
    cmd_compile(&cli)
}

fn cmd_format(cli: &Cli) -> ExitCode {
    let file = cli.input.display().to_string();
    let source = match fs::read_to_string(&cli.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {}", file, e);
            return ExitCode::FAILURE;
        }
    };

    match format_source(&file, &source) {
        Ok(formatted) => {
            print!("{}", formatted);
            ExitCode::SUCCESS
        }
        Err(diagnostics) => {
            report_diagnostics(&diagnostics, cli.verbose);
            ExitCode::FAILURE
        }
    }
}

fn cmd_compile(cli: &Cli) -> ExitCode {
    let options = CompileOptions {
        check_only: cli.check,
        openapi: cli.openapi.is_some(),
    };

    if cli.verbose {
        eprintln!("compiling {}", cli.input.display());
    }

    let output = compile(&cli.input, &options);

    if !output.diagnostics.is_empty() {
        report_diagnostics(&output.diagnostics, cli.verbose);
        return ExitCode::FAILURE;
    }

    if cli.check {
        if cli.verbose {
            eprintln!("check passed");
        }
        return ExitCode::SUCCESS;
    }

    let js = output.js.expect("clean compile produces output");
    let out_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    if let Err(e) = fs::write(&out_path, &js) {
        eprintln!("Error writing {}: {}", out_path.display(), e);
        return ExitCode::FAILURE;
    }
    if cli.verbose {
        eprintln!("wrote {}", out_path.display());
    }

    if let Some(openapi_path) = &cli.openapi {
        let doc = output.openapi.expect("openapi requested");
        let json = serde_json::to_string_pretty(&doc).expect("document serializes");
        if let Err(e) = fs::write(openapi_path, json) {
            eprintln!("Error writing {}: {}", openapi_path.display(), e);
            return ExitCode::FAILURE;
        }
        if cli.verbose {
            eprintln!("wrote {}", openapi_path.display());
        }
    }

    ExitCode::SUCCESS
}

fn report_diagnostics(diagnostics: &[Diagnostic], verbose: bool) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic.render());
    }
    if verbose {
        for diagnostic in diagnostics {
            render_annotated(diagnostic);
        }
    }
}

/// Pretty source-annotated report for one diagnostic, when the file is
/// still readable.
fn render_annotated(diagnostic: &Diagnostic) {
    let source = match fs::read_to_string(&diagnostic.file) {
        Ok(source) => source,
        Err(_) => return,
    };
    let offset = offset_of(&source, diagnostic.line, diagnostic.column);
    let _ = Report::build(ReportKind::Error, diagnostic.file.clone(), offset)
        .with_code(diagnostic.code.to_string())
        .with_message(&diagnostic.message)
        .with_label(
            Label::new((diagnostic.file.clone(), offset..offset + 1))
                .with_message(&diagnostic.message)
                .with_color(Color::Red),
        )
        .finish()
        .eprint((diagnostic.file.clone(), Source::from(source)));
}

fn offset_of(source: &str, line: u32, column: u32) -> usize {
    let mut current_line = 1;
    let mut offset = 0;
    for l in source.split_inclusive('\n') {
        if current_line == line {
            let column_offset: usize = l
                .chars()
                .take(column.saturating_sub(1) as usize)
                .map(|c| c.len_utf8())
                .sum();
            return offset + column_offset;
        }
        offset += l.len();
        current_line += 1;
    }
    offset.saturating_sub(1)
}
