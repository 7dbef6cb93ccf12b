mod debug_report;

use std::io::{self, IsTerminal, Read};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};
use translit::{Options, Transliterator};

const LOG_ENV: &str = "TRANSLIT_LOG";

/// Used when no `--rules` file is given.
const DEMO_RULES: &str = "
# Greek-ish keyboard: digraphs resolve once the next key arrives.
psch > Y ;
ps > y ;
ch > x ;
a > A ;
";

fn main() {
    init_tracing();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let (id, source) = match &config.rules_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(source) => (path.clone(), source),
            Err(err) => {
                eprintln!("error: failed to read rules from '{path}': {err}");
                std::process::exit(2);
            }
        },
        None => ("demo".to_string(), DEMO_RULES.to_string()),
    };

    let translit = match Transliterator::from_notation(id, &source) {
        Ok(t) => t.with_options(config.options.clone()),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    if config.keyboard {
        debug_report::print_keyboard(&translit, &config.input, config.color);
    } else {
        let run = translit.transliterate_str_with_metrics(&config.input);
        debug_report::print_run(&translit, &config.input, &run, config.color);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();
}

struct CliConfig {
    input: String,
    rules_path: Option<String>,
    keyboard: bool,
    color: bool,
    options: Options,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut input: Option<String> = None;
    let mut rules_path: Option<String> = None;
    let mut keyboard = false;
    let mut color = io::stdout().is_terminal();
    let mut options = Options::default();
    let mut args = std::env::args().skip(1).peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("translit {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "-k" | "--keyboard" => keyboard = true,
            "--rules" | "-r" => {
                let value = args.next().ok_or_else(|| "error: --rules expects a file".to_string())?;
                rules_path = Some(value);
            }
            "--step-budget" => {
                let value = args.next().ok_or_else(|| "error: --step-budget expects a value".to_string())?;
                options.step_budget_factor = parse_budget(&value)?;
            }
            "--input" | "-i" => {
                let value = args.next().ok_or_else(|| "error: --input expects a value".to_string())?;
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(value);
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.is_empty() {
                    if input.is_some() {
                        return Err("error: input provided multiple times".to_string());
                    }
                    input = Some(rest);
                }
                break;
            }
            _ if arg.starts_with("--rules=") => {
                rules_path = Some(arg.trim_start_matches("--rules=").to_string());
            }
            _ if arg.starts_with("--step-budget=") => {
                options.step_budget_factor = parse_budget(arg.trim_start_matches("--step-budget="))?;
            }
            _ if arg.starts_with("--input=") => {
                let value = arg.trim_start_matches("--input=");
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(value.to_string());
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(rest);
                break;
            }
        }
    }

    let input = match input {
        Some(value) => value,
        None if !io::stdin().is_terminal() => read_stdin_input()?,
        None => return Err(format!("error: no input provided\n\n{}", help_text())),
    };

    Ok(CliConfig { input, rules_path, keyboard, color, options })
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    // A trailing newline from `echo` is not part of the text.
    if buffer.ends_with('\n') {
        buffer.pop();
        if buffer.ends_with('\r') {
            buffer.pop();
        }
    }
    Ok(buffer)
}

fn parse_budget(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("error: invalid --step-budget '{value}' (expected a positive integer)")),
    }
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "translit {version}

Rule-based incremental transliteration CLI.

Usage:
  translit [OPTIONS] [--] <input...>
  translit [OPTIONS] --input <text>

Options:
  -r, --rules <file>         Rule file in `ante {{ key }} post > out|put ;` notation.
                             Default: a small built-in demo set.
  -i, --input <text>         Input text. If omitted, reads remaining args
                             or stdin when it is not a terminal.
  -k, --keyboard             Feed the input one character at a time and show
                             the buffer after each keystroke.
  --step-budget <n>          Steps without progress before giving up (default {budget}).
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  {log_env}               Log filter (e.g. `debug`, `translit=trace`). Default: warn.

Exit codes:
  0  Success.
  1  Rules failed to compile.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        budget = Options::default().step_budget_factor,
        log_env = LOG_ENV,
    )
}
