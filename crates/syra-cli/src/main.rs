//! `syra`: run, query, and explore SYRA programs.
//!
//! Program files are sequences of atoms. `(= lhs rhs)` facts and plain
//! atoms are asserted; a `(! expr)` form evaluates `expr` and prints every
//! result.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use syra_runtime::{Answer, Atom, Engine, EngineConfig};

#[derive(Parser)]
#[command(name = "syra", about = "Symbolic reasoning runtime", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a program file, asserting facts and evaluating `(! ...)` forms.
    Run {
        file: PathBuf,
        /// Depth budget for evaluations.
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Interactive read-eval loop.
    Repl,
    /// Load a file and run one pattern query against it.
    Query { file: PathBuf, pattern: String },
}

fn engine() -> Result<Engine> {
    Engine::new(EngineConfig::default()).context("failed to initialize engine")
}

/// True for `(! expr)` forms, which the CLI evaluates instead of asserting.
fn bang_body(engine: &Engine, atom: &Atom) -> Option<Atom> {
    let children = atom.children()?;
    match children {
        [head, body] if *head == engine.space().sym("!") => Some(body.clone()),
        _ => None,
    }
}

fn print_results(results: &[Atom]) {
    for result in results {
        println!("{result}");
    }
}

fn print_answers(answers: &[Answer]) {
    if answers.is_empty() {
        println!("no matches");
        return;
    }
    for answer in answers {
        print!("{}", answer.atom);
        let mut bindings: Vec<String> = answer
            .bindings
            .iter()
            .map(|(var, _)| format!("{var} = {}", answer.bindings.resolve(var)))
            .collect();
        bindings.sort();
        if !bindings.is_empty() {
            print!("  [{}]", bindings.join(", "));
        }
        println!();
    }
}

fn load_file(engine: &Engine, file: &PathBuf, depth: Option<usize>) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let atoms = engine
        .parse_all(&text)
        .with_context(|| format!("parse error in {}", file.display()))?;
    for atom in atoms {
        match bang_body(engine, &atom) {
            Some(body) => {
                let results = match depth {
                    Some(depth) => engine.eval_with_depth(&body, depth),
                    None => engine.eval(&body),
                };
                print_results(&results);
            }
            None => {
                engine.add(&atom);
            }
        }
    }
    Ok(())
}

fn repl(engine: &Engine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("syra repl: atoms are asserted, (! expr) evaluates, ? pattern queries, :q quits");
    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == ":q" {
            break;
        }
        if let Some(pattern) = line.strip_prefix('?') {
            match engine.parse_one(pattern) {
                Ok(pattern) => print_answers(&engine.query(&pattern)),
                Err(error) => eprintln!("parse error: {error}"),
            }
            continue;
        }
        match engine.parse_one(line) {
            Ok(atom) => match bang_body(engine, &atom) {
                Some(body) => print_results(&engine.eval(&body)),
                None => {
                    engine.add(&atom);
                    println!("added {atom}");
                }
            },
            Err(error) => eprintln!("parse error: {error}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let engine = engine()?;

    match cli.command {
        Command::Run { file, depth } => load_file(&engine, &file, depth)?,
        Command::Repl => repl(&engine)?,
        Command::Query { file, pattern } => {
            load_file(&engine, &file, None)?;
            let pattern = engine
                .parse_one(&pattern)
                .context("invalid query pattern")?;
            print_answers(&engine.query(&pattern));
        }
    }
    Ok(())
}
