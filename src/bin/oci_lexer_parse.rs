//! Command-line interface for oci-lexer-parser
//! Reads policy statements (or dynamic-group matching rules) from a file or stdin and prints the normalized tree.
//!
//! Usage:
//!   oci-lexer-parse `<file>` [--pretty | --jsonl | --yaml]   - Parse policy statements
//!   oci-lexer-parse --dg `<file>`                          - Parse dynamic-group matching rules
//!   oci-lexer-parse --chunked `<file>`                     - Parse a large policy file one statement chunk at a time
//!   oci-lexer-parse --symbols `<file>`                     - Print the DEFINE symbol table
//!
//! Exit codes: 0 on success, 1 when report mode saw syntax errors or parsing failed, 2 on usage errors.
//! Set `OCI_LEXER_PARSER_LOG` (e.g. `debug`) to see parser logs on stderr.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use oci_lexer_parser::oci::ast::{StatementKind, StatementsPayload};
use oci_lexer_parser::oci::chunking::{chunk_policy_lines, parse_policy_chunks};
use oci_lexer_parser::oci::config::{Loader, OutputConfig, OutputFormat, ParserConfig};
use oci_lexer_parser::oci::lexing::{lexemes, tokenize_policy, tokenize_rule};
use oci_lexer_parser::oci::source::strip_comments;
use oci_lexer_parser::oci::{
    build_symbols, parse_dynamic_group_matching_rules, parse_policy_statements, Diagnostics,
    ErrorMode, ParseError, ParseOutput, ReturnFilter,
};

const LOG_ENV: &str = "OCI_LEXER_PARSER_LOG";

#[derive(Parser, Debug)]
#[command(name = "oci-lexer-parse", version)]
#[command(about = "Parse OCI IAM policy statements and dynamic-group matching rules to JSON")]
struct Args {
    /// Input file; reads stdin when omitted or `-`
    file: Option<PathBuf>,

    /// Resolve DEFINE aliases where possible
    #[arg(long)]
    define_subs: bool,

    /// Place NAME into the values of bare `IN TENANCY` locations
    #[arg(long, value_name = "NAME")]
    default_tenancy_alias: Option<String>,

    /// Identity domain for group subjects without a `Domain/` prefix
    #[arg(long, value_name = "NAME")]
    default_identity_domain: Option<String>,

    /// Syntax error handling: raise, report or ignore [default: report]
    #[arg(long, value_name = "MODE")]
    error_mode: Option<ErrorMode>,

    /// Include source spans on statements, rules and condition nodes
    #[arg(long)]
    include_spans: bool,

    /// Flatten nested groups of the same mode
    #[arg(long)]
    nested_simplify: bool,

    /// Parse dynamic-group matching rules instead of policy statements
    #[arg(long = "dynamic-group", visible_alias = "dg")]
    dynamic_group: bool,

    /// Parse policy statements (the default)
    #[arg(long)]
    policy: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Emit one JSON object per statement or rule, one per line
    #[arg(long, conflicts_with = "yaml")]
    jsonl: bool,

    /// Emit YAML instead of JSON
    #[arg(long)]
    yaml: bool,

    /// Split the input at statement starts and parse chunk by chunk
    #[arg(long)]
    chunked: bool,

    /// Print the symbol table built from DEFINE statements and exit
    #[arg(long)]
    symbols: bool,

    /// Write diagnostics JSON to this path
    #[arg(long, value_name = "PATH")]
    diagnostics_file: Option<PathBuf>,

    /// TOML file layered over the built-in defaults
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the token stream instead of parsing
    #[arg(long)]
    tokens: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    if let Err(message) = check_modes(&args) {
        eprintln!("{message}");
        return ExitCode::from(2);
    }

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn check_modes(args: &Args) -> Result<(), &'static str> {
    if args.dynamic_group && args.policy {
        return Err("Choose only one of --dynamic-group or --policy.");
    }
    if args.dynamic_group && args.chunked {
        return Err("--chunked is not supported with --dynamic-group.");
    }
    if args.dynamic_group && args.symbols {
        return Err("--symbols is not supported with --dynamic-group.");
    }
    Ok(())
}

fn run(args: &Args) -> Result<ExitCode, ParseError> {
    let config = load_config(args)?;
    let source = read_source(args.file.as_deref())?;

    if args.tokens {
        return print_tokens(&source, args.dynamic_group, &config.output);
    }
    if args.dynamic_group {
        return run_rules(&source, &config, args);
    }
    if args.chunked {
        return run_chunked(&source, &config, args);
    }
    run_policy(&source, &config, args)
}

/// Built-in defaults, then `--config`, then flags. Flags only ever switch
/// options on.
fn load_config(args: &Args) -> Result<ParserConfig, ParseError> {
    let mut loader = Loader::new();
    if let Some(path) = &args.config {
        loader = loader.with_file(path);
    }

    let format = if args.jsonl {
        Some("jsonl")
    } else if args.yaml {
        Some("yaml")
    } else {
        None
    };

    let mut config = loader
        .set_override_option("policy.define_subs", args.define_subs.then_some(true))?
        .set_override_option("policy.include_spans", args.include_spans.then_some(true))?
        .set_override_option("rules.include_spans", args.include_spans.then_some(true))?
        .set_override_option("policy.nested_simplify", args.nested_simplify.then_some(true))?
        .set_override_option("rules.nested_simplify", args.nested_simplify.then_some(true))?
        .set_override_option("policy.default_tenancy_alias", args.default_tenancy_alias.clone())?
        .set_override_option(
            "policy.default_identity_domain",
            args.default_identity_domain.clone(),
        )?
        .set_override_option("output.pretty", args.pretty.then_some(true))?
        .set_override_option("output.format", format)?
        .build()?;

    if let Some(mode) = args.error_mode {
        config.policy.error_mode = mode;
        config.rules.error_mode = mode;
    }
    Ok(config)
}

fn read_source(file: Option<&Path>) -> Result<String, ParseError> {
    match file {
        Some(path) if path != Path::new("-") => Ok(fs::read_to_string(path)?),
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

fn run_policy(source: &str, config: &ParserConfig, args: &Args) -> Result<ExitCode, ParseError> {
    let mut options = config.policy.clone();
    if args.symbols {
        options.return_filter = Some(ReturnFilter::kind(StatementKind::Define.as_str()));
    }

    let out = parse_policy_statements(strip_bom(source), &options)?;
    let mut stdout = io::stdout().lock();

    if args.symbols {
        write_document(&mut stdout, &build_symbols(&out.payload.statements), &config.output)?;
        return Ok(ExitCode::SUCCESS);
    }

    emit(&mut stdout, &out, &out.payload.statements, &config.output)?;
    Ok(finish(out.diagnostics.as_ref(), args.diagnostics_file.as_deref()))
}

fn run_rules(source: &str, config: &ParserConfig, args: &Args) -> Result<ExitCode, ParseError> {
    let out = parse_dynamic_group_matching_rules(strip_bom(source), &config.rules)?;
    let mut stdout = io::stdout().lock();
    emit(&mut stdout, &out, &out.payload.rules, &config.output)?;
    Ok(finish(out.diagnostics.as_ref(), args.diagnostics_file.as_deref()))
}

/// JSONL output is written as each chunk finishes; the other formats are
/// written once at the end.
fn run_chunked(source: &str, config: &ParserConfig, args: &Args) -> Result<ExitCode, ParseError> {
    let chunks = chunk_policy_lines(source.split_inclusive('\n')).strip_bom();
    let streaming = config.output.format == OutputFormat::Jsonl && !args.symbols;
    let mut stdout = io::stdout().lock();

    let out = parse_policy_chunks(chunks, &config.policy, args.symbols, |statements| {
        if streaming {
            write_lines(&mut stdout, statements)?;
        }
        Ok(())
    })?;

    if args.symbols {
        write_document(&mut stdout, &build_symbols(&out.defines), &config.output)?;
        return Ok(ExitCode::SUCCESS);
    }

    let output = ParseOutput {
        payload: StatementsPayload::new(out.statements),
        diagnostics: out.diagnostics,
    };
    if !streaming {
        write_document(&mut stdout, &output, &config.output)?;
    }
    Ok(finish(output.diagnostics.as_ref(), args.diagnostics_file.as_deref()))
}

fn print_tokens(source: &str, dynamic_group: bool, output: &OutputConfig) -> Result<ExitCode, ParseError> {
    let cleaned = strip_comments(strip_bom(source));
    let tokens = if dynamic_group {
        lexemes(&cleaned, &tokenize_rule(&cleaned))
    } else {
        lexemes(&cleaned, &tokenize_policy(&cleaned))
    };
    emit(&mut io::stdout().lock(), &tokens, &tokens, output)?;
    Ok(ExitCode::SUCCESS)
}

/// Write `items` one per line for JSONL, otherwise `document` as a whole.
fn emit<W, T, I>(out: &mut W, document: &T, items: &[I], output: &OutputConfig) -> Result<(), ParseError>
where
    W: Write,
    T: Serialize,
    I: Serialize,
{
    match output.format {
        OutputFormat::Jsonl => write_lines(out, items),
        OutputFormat::Json | OutputFormat::Yaml => write_document(out, document, output),
    }
}

fn write_lines<W: Write, I: Serialize>(out: &mut W, items: &[I]) -> Result<(), ParseError> {
    for item in items {
        serde_json::to_writer(&mut *out, item)?;
        writeln!(out)?;
    }
    Ok(())
}

/// JSONL has no document form; it falls back to compact JSON.
fn write_document<W: Write, T: Serialize>(
    out: &mut W,
    document: &T,
    output: &OutputConfig,
) -> Result<(), ParseError> {
    match output.format {
        OutputFormat::Yaml => serde_yaml::to_writer(&mut *out, document)?,
        OutputFormat::Json if output.pretty => {
            serde_json::to_writer_pretty(&mut *out, document)?;
            writeln!(out)?;
        }
        OutputFormat::Json | OutputFormat::Jsonl => {
            serde_json::to_writer(&mut *out, document)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Exit code for a finished run. Only report mode carries diagnostics, and
/// only report mode fails on them.
fn finish(diagnostics: Option<&Diagnostics>, file: Option<&Path>) -> ExitCode {
    let Some(diagnostics) = diagnostics else {
        return ExitCode::SUCCESS;
    };
    if let Some(path) = file {
        write_diagnostics(path, diagnostics);
    }
    if diagnostics.error_count > 0 {
        eprintln!("{} syntax error(s) detected", diagnostics.error_count);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn write_diagnostics(path: &Path, diagnostics: &Diagnostics) {
    let written = serde_json::to_string_pretty(diagnostics)
        .map_err(ParseError::from)
        .and_then(|json| fs::write(path, json).map_err(ParseError::from));
    if let Err(err) = written {
        eprintln!("Failed to write diagnostics file: {err}");
    }
}
