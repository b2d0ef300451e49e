//! HumanLogica CLI (spec.md §6 "CLI surface"; SPEC_FULL.md §4.13). A thin
//! front end over the public pipeline in `lib.rs`: run a file, `--check`
//! it without executing, dump its `--tokens` or `--ast`, or fall into a
//! REPL when no file is given.

use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use humanlogica::error::HumanLogicaError;
use humanlogica::repl::Repl;
use humanlogica::style::{ColorMode, Style};

#[derive(Parser)]
#[command(name = "humanlogica")]
#[command(about = "Mary kernel and Logica compile-and-run pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Logica source file to run. Omitted: launch the REPL.
    file: Option<PathBuf>,

    /// Lex, parse, and axiom-check without executing; print OK or the error.
    #[arg(long, conflicts_with_all = ["tokens", "ast"])]
    check: bool,

    /// Print the token stream and exit.
    #[arg(long, conflicts_with_all = ["check", "ast"])]
    tokens: bool,

    /// Print the AST shape and exit.
    #[arg(long, conflicts_with_all = ["check", "tokens"])]
    ast: bool,

    /// Control ANSI color in diagnostics.
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    color: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let colorize = ColorMode::parse(&cli.color)
        .unwrap_or(ColorMode::Auto)
        .enabled(io::stderr().is_terminal());

    let Some(path) = cli.file.clone() else {
        run_repl();
        return ExitCode::SUCCESS;
    };

    let source = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "{}: {}: {e}",
                Style::bold_red("error", colorize),
                path.display()
            );
            return ExitCode::FAILURE;
        }
    };

    if cli.tokens {
        cmd_tokens(&source, colorize)
    } else if cli.ast {
        cmd_ast(&source, colorize)
    } else if cli.check {
        cmd_check(&source, colorize)
    } else {
        cmd_run(&source, colorize)
    }
}

fn cmd_tokens(source: &str, colorize: bool) -> ExitCode {
    match humanlogica::tokenize(source) {
        Ok(tokens) => {
            for t in tokens {
                println!("{:>4}:{:<3} {}", t.pos.line, t.pos.col, t.kind);
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e, colorize),
    }
}

fn cmd_ast(source: &str, colorize: bool) -> ExitCode {
    match humanlogica::parse(source) {
        Ok(program) => {
            println!("{program:#?}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e, colorize),
    }
}

fn cmd_check(source: &str, colorize: bool) -> ExitCode {
    match humanlogica::check(source) {
        Ok(_) => {
            println!("{}", Style::green("OK", colorize));
            ExitCode::SUCCESS
        }
        Err(e) => fail(e, colorize),
    }
}

fn cmd_run(source: &str, colorize: bool) -> ExitCode {
    match humanlogica::run(source) {
        Ok(outcome) => {
            for line in outcome.output {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e, colorize),
    }
}

fn fail(err: HumanLogicaError, colorize: bool) -> ExitCode {
    eprintln!("{}", Style::bold_red(&err.to_string(), colorize));
    ExitCode::FAILURE
}

/// Reads snippets terminated by a blank line (or EOF) and runs each against
/// one persistent kernel, so speakers and their partitions carry over from
/// one prompt to the next (spec.md §6 "launch REPL"; see `repl.rs`).
fn run_repl() {
    println!("HumanLogica REPL — blank line runs the snippet, ':quit' exits.");
    let mut repl = Repl::new();
    let mut buffer = String::new();
    let stdin = io::stdin();
    loop {
        print!("{}", if buffer.is_empty() { "lg> " } else { "... " });
        let _ = io::stdout().flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            println!();
            break;
        }
        let trimmed = line.trim_end_matches('\n');

        if buffer.is_empty() && matches!(trimmed, ":quit" | ":exit") {
            break;
        }
        if trimmed.is_empty() {
            if buffer.is_empty() {
                continue;
            }
            match repl.execute(&buffer) {
                Ok(output) => output.iter().for_each(|l| println!("{l}")),
                Err(e) => eprintln!("{e}"),
            }
            buffer.clear();
            continue;
        }

        buffer.push_str(trimmed);
        buffer.push('\n');
    }
}
