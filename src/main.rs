//! CLI entry point for `mimedecode`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use mimedecode::config::Config;
use mimedecode::model::part::{MimePart, PartPath};
use mimedecode::parser::html::{extract_links, html_to_text};
use mimedecode::EmailRecord;

#[derive(Parser)]
#[command(
    name = "mimedecode",
    version,
    about = "Decode raw RFC 5322 / MIME messages into structured records"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Message file to decode (`-` or omitted reads stdin)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a message and print a summary or the full JSON record
    Decode {
        path: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Print the message body as plain text
    Text {
        path: Option<PathBuf>,
        /// Wrap width for HTML bodies (0 disables wrapping)
        #[arg(short, long)]
        width: Option<usize>,
    },
    /// List links found in the HTML body
    Links {
        path: Option<PathBuf>,
    },
    /// Write all attachments into a directory
    Attachments {
        path: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show the effective configuration, or write a default config file
    Config {
        #[arg(long)]
        init: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = mimedecode::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        None => cmd_decode(cli.file.as_deref(), false, &config),
        Some(Commands::Decode { path, json }) => cmd_decode(path.as_deref(), json, &config),
        Some(Commands::Text { path, width }) => {
            let width = width.unwrap_or(config.output.text_width);
            cmd_text(path.as_deref(), width, &config)
        }
        Some(Commands::Links { path }) => cmd_links(path.as_deref(), &config),
        Some(Commands::Attachments { path, output }) => {
            cmd_attachments(path.as_deref(), &output, &config)
        }
        Some(Commands::Config { init }) => cmd_config(init, &config),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mimedecode::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mimedecode.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Decode a file, or stdin when no path (or `-`) is given.
fn load_record(path: Option<&Path>, config: &Config) -> anyhow::Result<EmailRecord> {
    let limits = config.limits.to_limits();
    match path {
        Some(path) if path != Path::new("-") => Ok(mimedecode::decode_file(path, &limits)?),
        _ => {
            let mut data = Vec::new();
            std::io::stdin().read_to_end(&mut data)?;
            if data.len() > limits.max_message_size {
                anyhow::bail!(mimedecode::error::DecodeError::MessageTooLarge {
                    size: data.len(),
                    limit: limits.max_message_size,
                });
            }
            Ok(mimedecode::decode_with(&data, &limits))
        }
    }
}

fn cmd_decode(path: Option<&Path>, json: bool, config: &Config) -> anyhow::Result<()> {
    let mut record = load_record(path, config)?;

    if json {
        if !config.output.include_structure {
            record.structure = None;
        }
        let out = if config.output.pretty_json {
            serde_json::to_string_pretty(&record)?
        } else {
            serde_json::to_string(&record)?
        };
        println!("{out}");
    } else {
        print_summary(&record);
    }
    Ok(())
}

fn cmd_text(path: Option<&Path>, width: usize, config: &Config) -> anyhow::Result<()> {
    let record = load_record(path, config)?;
    if record.is_html() {
        println!("{}", html_to_text(&record.body, width));
    } else {
        println!("{}", record.body.trim_end());
    }
    Ok(())
}

fn cmd_links(path: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    let record = load_record(path, config)?;
    let links = if record.is_html() {
        extract_links(&record.body)
    } else {
        Vec::new()
    };

    if links.is_empty() {
        eprintln!("  No links found.");
    }
    for link in links {
        println!("{link}");
    }
    Ok(())
}

fn cmd_attachments(path: Option<&Path>, output: &Path, config: &Config) -> anyhow::Result<()> {
    let record = load_record(path, config)?;
    if record.attachments.is_empty() {
        println!("  No attachments found.");
        return Ok(());
    }

    let paths = mimedecode::export::attachment::export_all_attachments(&record, output)?;
    println!(
        "  Extracted {} of {} attachment(s) to {}",
        paths.len(),
        record.attachment_count,
        output.display()
    );
    Ok(())
}

fn cmd_config(init: bool, config: &Config) -> anyhow::Result<()> {
    if init {
        let Some(path) = mimedecode::config::config_file_path() else {
            anyhow::bail!("No configuration directory available on this system");
        };
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }
        mimedecode::config::save_config(&Config::default(), &path)?;
        println!("  Wrote default config to {}", path.display());
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mimedecode", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print a decoded record in a human-readable layout.
fn print_summary(record: &EmailRecord) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<14} {}", "From", record.from);
    println!("  {:<14} {}", "To", record.to);
    if !record.cc.is_empty() {
        println!("  {:<14} {}", "Cc", record.cc);
    }
    println!("  {:<14} {}", "Subject", record.subject);
    if let Some(date) = record.date {
        println!("  {:<14} {}", "Date", date.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(ref id) = record.message_id {
        println!("  {:<14} {}", "Message-ID", id);
    }
    println!(
        "  {:<14} {} ({})",
        "Body",
        record.content_type,
        format_size(record.body.len(), BINARY)
    );

    if let Some(ref root) = record.structure {
        println!();
        println!("  Structure:");
        print_tree(root, &PartPath::root());
    }

    if record.has_attachments {
        println!();
        println!("  Attachments ({}):", record.attachment_count);
        for (i, att) in record.attachments.iter().enumerate() {
            println!(
                "    {:>3}  {:<40} {:<28} {:>10}",
                i + 1,
                att.display_name(i),
                att.content_type,
                format_size(att.size, BINARY)
            );
        }
    }

    if !record.warnings.is_empty() {
        println!();
        println!("  Warnings:");
        for warning in &record.warnings {
            println!("    - {warning}");
        }
    }
    println!();
}

fn print_tree(part: &MimePart, path: &PartPath) {
    let indent = "  ".repeat(path.depth());
    let label = if path.depth() == 0 {
        "root".to_string()
    } else {
        path.to_string()
    };
    let mut line = format!("    {indent}{label:<8} {}", part.content_type);
    if let Some(ref name) = part.filename {
        line.push_str(&format!(" \"{name}\""));
    }
    if part.is_attachment {
        line.push_str(" [attachment]");
    }
    println!("{line}");

    for (i, child) in part.children().iter().enumerate() {
        print_tree(child, &path.child(i));
    }
}
