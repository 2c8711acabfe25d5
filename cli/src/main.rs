mod harness;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgGroup, Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::Level;

use assist::{AssistConfig, AssistError, AssistSession};
use blockdoc::loader::{LoadWarning, load_markdown};
use blockdoc::{Document, MergeMode};

#[derive(Parser)]
#[command(name = "assist", version, about = "Apply assistant replies to block documents")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More log output on stderr. Repeatable.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of ./assist.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge a reply into a markdown report
    Apply(ApplyArgs),

    /// Print the blocks a reply parses into
    Parse(ParseArgs),

    /// Run .test.md scenario files
    Test(TestArgs),
}

#[derive(clap::Args)]
#[command(group(ArgGroup::new("target").required(true).args(["select", "blocks"])))]
struct ApplyArgs {
    /// Markdown report to edit
    file: String,

    /// File holding the assistant reply
    #[arg(short, long)]
    reply: String,

    /// replace, insert or append (defaults to the config)
    #[arg(short, long)]
    mode: Option<MergeMode>,

    /// Text span as BLOCK:OFFSET..BLOCK:OFFSET (char offsets)
    #[arg(long)]
    select: Option<String>,

    /// Comma separated block indices
    #[arg(long)]
    blocks: Option<String>,

    /// Print the resulting blocks instead of markdown
    #[arg(long)]
    dump: bool,
}

#[derive(clap::Args)]
struct ParseArgs {
    /// File holding the assistant reply
    file: String,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only scenarios in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AssistConfig::load(path),
        None => AssistConfig::discover(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    init_logging(cli.verbose, &config.log_level, cli.no_color);

    match cli.command {
        Command::Apply(args) => do_apply(args, config, cli.no_color),
        Command::Parse(args) => do_parse(args),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: u8, configured: &str, no_color: bool) {
    let level = match verbose {
        0 => configured.parse::<Level>().unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(!no_color)
        .try_init();
}

fn read_or_exit(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path, e);
            process::exit(1);
        }
    }
}

fn do_apply(args: ApplyArgs, config: AssistConfig, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = read_or_exit(&args.file);
    let reply = read_or_exit(&args.reply);

    let target = match (&args.select, &args.blocks) {
        (Some(select), _) => harness::parse_select(select),
        (None, Some(blocks)) => harness::parse_blocks(blocks),
        (None, None) => Err("nothing selected".to_string()),
    };
    let target = match target {
        Ok(target) => target,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };

    // Set up codespan file database
    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let (mut doc, warnings) = load_markdown(&source, file_id);
    let writer = StandardStream::stderr(color_choice);
    emit_warnings(&writer, &files, &warnings);

    let mode = args.mode.unwrap_or(config.default_mode);
    let mut session = AssistSession::with_config(config);
    session.set_mode(mode);

    match harness::round_trip(&mut doc, &mut session, &target, &reply) {
        Ok(report) => {
            if let Some(warning) = AssistError::degradation(&report) {
                eprintln!("warning: {}", warning);
            }
        }
        Err(e) if e.is_silent() => {
            eprintln!("note: {}", e);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }

    print_document(&doc, args.dump);
}

fn do_parse(args: ParseArgs) {
    let reply = read_or_exit(&args.file);
    println!("{:#?}", AssistSession::parse_reply(&reply));
}

fn print_document(doc: &Document, dump: bool) {
    if dump {
        println!("{:#?}", doc.snapshot());
    } else {
        println!("{}", doc);
    }
}

fn emit_warnings(
    writer: &StandardStream,
    files: &SimpleFiles<String, String>,
    warnings: &[LoadWarning],
) {
    let config = term::Config::default();
    for warning in warnings {
        let diagnostic = warning.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
    }
}
