mod debug_report;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use parsechain::ops::registry;
use parsechain::{Context, Error, Options, Value, extract_verbose_with, extract_with};
use std::error::Error as _;
use std::io::{self, IsTerminal, Read};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PARSECHAIN_LOG";

fn main() {
    init_logging();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let html = match read_html(config.file.as_deref()) {
        Ok(html) => html,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let options = Options {
        separator: config.separator.clone(),
        context: config.now.map(Context::at),
        ..Options::default()
    };
    if let Err(err) = run(&config, &html, &options) {
        report_error(&err);
        std::process::exit(1);
    }
}

fn run(config: &CliConfig, html: &str, options: &Options) -> Result<(), Error> {
    if config.nodes || config.trace {
        let res = extract_verbose_with(html, &config.expr, options)?;
        print_json(&res.value)?;
        let sections = debug_report::Sections { nodes: config.nodes, trace: config.trace };
        debug_report::print_run(&res, sections, options, config.color);
    } else {
        let res = extract_with(html, &config.expr, options)?;
        print_json(&res.value)?;
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(&value.to_json())?);
    Ok(())
}

fn report_error(err: &Error) {
    eprintln!("error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

struct CliConfig {
    expr: String,
    file: Option<String>,
    separator: String,
    now: Option<NaiveDateTime>,
    nodes: bool,
    trace: bool,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut expr: Option<String> = None;
    let mut file: Option<String> = None;
    let mut separator = Options::default().separator;
    let mut now: Option<NaiveDateTime> = None;
    let mut nodes = false;
    let mut trace = false;
    let mut color = io::stderr().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("parsechain {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--list-ops" => {
                print_operations();
                std::process::exit(0);
            }
            "--now" => {
                let value = args.next().ok_or_else(|| "error: --now expects a value".to_string())?;
                now = Some(parse_now(&value)?);
            }
            _ if arg.starts_with("--now=") => {
                now = Some(parse_now(arg.trim_start_matches("--now="))?);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--nodes" => nodes = true,
            "--trace" => trace = true,
            "--separator" => {
                separator = args.next().ok_or_else(|| "error: --separator expects a value".to_string())?;
            }
            "--file" | "-f" => {
                let value = args.next().ok_or_else(|| "error: --file expects a value".to_string())?;
                set_once(&mut file, value, "file")?;
            }
            "--expr" | "-e" => {
                let value = args.next().ok_or_else(|| "error: --expr expects a value".to_string())?;
                set_once(&mut expr, value, "expression")?;
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    set_once(&mut expr, rest, "expression")?;
                }
                break;
            }
            _ if arg.starts_with("--separator=") => {
                separator = arg.trim_start_matches("--separator=").to_string();
            }
            _ if arg.starts_with("--file=") => {
                set_once(&mut file, arg.trim_start_matches("--file=").to_string(), "file")?;
            }
            _ if arg.starts_with("--expr=") => {
                set_once(&mut expr, arg.trim_start_matches("--expr=").to_string(), "expression")?;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                set_once(&mut expr, rest, "expression")?;
                break;
            }
        }
    }

    let expr = match expr {
        Some(expr) if !expr.trim().is_empty() => expr,
        _ => return Err(format!("error: no chain expression provided\n\n{}", help_text())),
    };

    Ok(CliConfig { expr, file, separator, now, nodes, trace, color })
}

fn parse_now(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d").map(|day| day.and_time(NaiveTime::MIN)))
        .map_err(|_| format!("error: --now expects YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS, got '{value}'"))
}

fn print_operations() {
    for name in registry().names() {
        let Ok(op) = registry().get(name) else { continue };
        let lifted = if op.is_list_aware() { "  (lifted over node lists)" } else { "" };
        println!("{}{lifted}", op.signature());
    }
}

fn set_once(slot: &mut Option<String>, value: String, what: &str) -> Result<(), String> {
    if slot.is_some() {
        return Err(format!("error: {what} provided multiple times"));
    }
    *slot = Some(value);
    Ok(())
}

fn read_html(file: Option<&str>) -> Result<String, String> {
    match file {
        Some("-") | None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
            Ok(buffer)
        }
        Some(path) => std::fs::read_to_string(path).map_err(|err| format!("error: failed to read '{path}': {err}")),
    }
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "parsechain {version}

Apply a chain expression to an HTML document and print the result as JSON.

Usage:
  parsechain [OPTIONS] [--] <expr...>
  parsechain [OPTIONS] --expr <expr>

Examples:
  parsechain -f page.html \"css('h1').text.trim\"
  curl -s https://example.org | parsechain --nodes \"multi({{'title': C.css('title').text}})\"

Options:
  -e, --expr <expr>          Chain expression, e.g. css('li').map(text).
  -f, --file <path>          HTML file to read. Default: stdin.
  --nodes                    Also print the source nodes of each output path.
  --trace                    Also print per-link timings and outputs.
  --separator <sep>          Separator for output paths. Default: {separator}
  --now <date>               Reference time for relative dates (YYYY-MM-DD[THH:MM:SS]).
  --list-ops                 List the available operations and exit.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

The JSON result goes to stdout; reports and logs go to stderr.
Set {log_env}=debug to log link failures.

Exit codes:
  0  Success.
  1  The chain failed to parse or to apply.
  2  Invalid arguments or unreadable input.
",
        version = env!("CARGO_PKG_VERSION"),
        separator = Options::default().separator,
        log_env = LOG_ENV,
    )
}
