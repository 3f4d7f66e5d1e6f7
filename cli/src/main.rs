use std::path::Path;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use rand::SeedableRng;
use rand::rngs::StdRng;

use grader::checker::Outcome;
use grader::registry::InstanceRegistry;
use quizmd::ParsedDocument;
use quizmd::bank::QuizBank;
use quizmd::segment::Segment;

const SUBCOMMANDS: &[&str] = &["render", "check", "bank", "help"];

#[derive(Parser)]
#[command(name = "quizmd", version, about = "Parameterized quiz documents")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a document, instantiating every quiz block
    Render(RenderArgs),

    /// Grade a submission against one quiz in a document
    Check(CheckArgs),

    /// Emit a markdown document from a JSON or TOML quiz bank
    Bank(BankArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Document containing `:::quiz` blocks
    file: String,

    /// Seed for variable generation (omit for fresh randomness)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Parse only, don't instantiate (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// List the quiz blocks in the document and exit
    #[arg(long)]
    list: bool,

    /// Include canonical answers in the output
    #[arg(short, long)]
    answers: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Document containing `:::quiz` blocks
    file: String,

    /// The submitted answer
    answer: String,

    /// Which quiz block to grade (0-based, document order)
    #[arg(short, long, default_value_t = 0)]
    index: usize,

    /// Seed used when the instance was rendered
    #[arg(short, long, default_value_t = 0)]
    seed: u64,
}

#[derive(clap::Args)]
struct BankArgs {
    /// Quiz bank file (.json or .toml)
    file: String,

    /// Write markdown here instead of stdout
    #[arg(short, long)]
    output: Option<String>,
}

fn main() {
    // Backwards compatibility: if the first positional arg is not a known
    // subcommand, inject "render" so `quizmd file.md` works like
    // `quizmd render file.md`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(first_pos) = args.iter().skip(1).find(|a| !a.starts_with('-')) {
        let first_pos = first_pos.clone();
        if !SUBCOMMANDS.contains(&first_pos.as_str()) {
            let pos = args.iter().position(|a| *a == first_pos).unwrap();
            args.insert(pos, "render".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    match cli.command {
        Command::Render(render_args) => do_render(render_args, cli.no_color),
        Command::Check(check_args) => do_check(check_args, cli.no_color),
        Command::Bank(bank_args) => do_bank(bank_args),
    }
}

/// Read and parse a document, emitting a diagnostic per broken block.
/// Returns the document and how many blocks failed.
fn load_document(file: &str, no_color: bool) -> (ParsedDocument, SimpleFiles<String, String>, usize) {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", file, e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(file.to_string(), source.clone());
    let document = quizmd::parser::Parser::new(source, file_id).parse();

    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let mut broken = 0;
    for error in document.errors() {
        broken += 1;
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
    }

    (document, files, broken)
}

fn do_render(args: RenderArgs, no_color: bool) {
    let (document, _files, broken) = load_document(&args.file, no_color);

    if args.check {
        if broken > 0 {
            process::exit(1);
        }
        eprintln!("ok: {} parsed successfully", args.file);
        return;
    }

    if args.list {
        for (idx, record) in document.records().enumerate() {
            let vars: Vec<&str> = record.variables.iter().map(|v| v.name.as_str()).collect();
            println!("{}: {} (vars: {})", idx, record.question, vars.join(", "));
        }
        return;
    }

    let registry = InstanceRegistry::default();
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    for segment in &document.segments {
        match segment {
            Segment::Text { content, .. } => print!("{}", content),
            Segment::Quiz { record, .. } => {
                match registry.instantiate(Arc::new(record.clone()), &mut rng) {
                    Ok((id, instance)) => {
                        println!("[quiz #{}]", id);
                        println!("{}", instance.question);
                        if let Some(hint) = &instance.hint {
                            println!("> hint: {}", hint);
                        }
                        if args.answers {
                            println!("> answer: {}", instance.canonical_answer);
                        }
                    }
                    // One bad instance never takes down the document.
                    Err(e) => {
                        eprintln!("error: {}: {}", args.file, e);
                        println!("[quiz unavailable: {}]", e);
                    }
                }
            }
            Segment::Broken { error, .. } => {
                println!("[quiz block error: {}]", error);
            }
        }
    }

    if broken > 0 {
        process::exit(1);
    }
}

fn do_check(args: CheckArgs, no_color: bool) {
    let (document, _files, _broken) = load_document(&args.file, no_color);

    let record = match document.records().nth(args.index) {
        Some(r) => Arc::new(r.clone()),
        None => {
            eprintln!(
                "error: '{}' has {} quiz block(s), index {} is out of range",
                args.file,
                document.records().count(),
                args.index
            );
            process::exit(1);
        }
    };

    let registry = InstanceRegistry::default();
    let (id, instance) = match registry.instantiate_seeded(record, args.seed) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("error: could not instantiate quiz: {}", e);
            process::exit(1);
        }
    };

    eprintln!("question: {}", instance.question);

    let verdict = match registry.check_with_rng(id, &args.answer, &mut StdRng::seed_from_u64(args.seed)) {
        Ok(Some(verdict)) => verdict,
        Ok(None) => {
            eprintln!("error: verdict superseded by a newer submission");
            process::exit(2);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };

    match verdict.outcome {
        Outcome::Correct => println!("correct"),
        Outcome::Incorrect => {
            match verdict.detail {
                Some(detail) => println!("incorrect ({})", detail),
                None => println!("incorrect"),
            }
            process::exit(1);
        }
        Outcome::Error => {
            println!(
                "error: {}",
                verdict.detail.unwrap_or_else(|| "submission could not be judged".to_string())
            );
            process::exit(2);
        }
    }
}

fn do_bank(args: BankArgs) {
    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    let is_toml = Path::new(&args.file)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let bank: QuizBank = if is_toml {
        match toml::from_str(&source) {
            Ok(bank) => bank,
            Err(e) => {
                eprintln!("error: '{}' is not a valid TOML quiz bank: {}", args.file, e);
                process::exit(1);
            }
        }
    } else {
        match serde_json::from_str(&source) {
            Ok(bank) => bank,
            Err(e) => {
                eprintln!("error: '{}' is not a valid JSON quiz bank: {}", args.file, e);
                process::exit(1);
            }
        }
    };

    let markdown = bank.to_markdown();
    match args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, markdown) {
                eprintln!("error: cannot write '{}': {}", path, e);
                process::exit(1);
            }
        }
        None => print!("{}", markdown),
    }
}
