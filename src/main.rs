//! CLI entry point for `attachment-relay`.

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};

use attachment_relay::config::{self, Overrides, Settings};
use attachment_relay::mailbox::imap::ImapSession;
use attachment_relay::mailbox::MailSession;
use attachment_relay::pipeline::{self, transfer::TransferOutcome, RunReport};
use attachment_relay::storage::s3::S3Store;

#[derive(Parser)]
#[command(
    name = "attachment-relay",
    version,
    about = "Upload keyword-tagged mail attachments for one day to S3"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay one day's attachments (the default)
    Run,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Args)]
struct RunArgs {
    /// Filename keyword that selects attachments and ends the encoded path
    #[arg(long, env = "KEYWORD")]
    keyword: Option<String>,

    /// Destination S3 bucket
    #[arg(long, env = "S3_BUCKET")]
    bucket: Option<String>,

    /// Mail account user
    #[arg(long, env = "IMAP_USER")]
    user: Option<String>,

    /// Mail account password
    #[arg(long, env = "IMAP_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Day to search (DD-Mon-YYYY or YYYY-MM-DD, "0" for yesterday)
    #[arg(long, env = "DATE_RECEIVED", value_name = "DATE")]
    date: Option<String>,

    /// Mailbox to scan
    #[arg(long)]
    mailbox: Option<String>,

    /// Directory for staging attachments before upload
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Decode and log destinations without writing or uploading
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => return cmd_completions(shell),
        Some(Commands::Manpage) => return cmd_manpage(),
        Some(Commands::Run) | None => {}
    }

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    cmd_run(cli.run, &config)
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &config::Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "attachment-relay.log");
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

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "attachment-relay", &mut std::io::stdout());
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

/// Relay the configured day's attachments.
fn cmd_run(args: RunArgs, config: &config::Config) -> anyhow::Result<()> {
    let overrides = Overrides {
        keyword: args.keyword,
        bucket: args.bucket,
        user: args.user,
        password: args.password,
        date: args.date,
        mailbox: args.mailbox,
        scratch_dir: args.scratch_dir,
        dry_run: args.dry_run,
    };
    let settings = Settings::resolve(config, overrides, chrono::Local::now().date_naive())?;

    tracing::info!(
        run_date = %settings.run.run_date,
        search = %settings.run.criterion,
        keyword = %settings.run.keyword,
        bucket = %settings.run.bucket,
        dry_run = settings.run.dry_run,
        "Starting attachment relay"
    );

    let store = S3Store::from_env(settings.region.as_deref())?;
    let mut session = ImapSession::connect(&settings.imap)?;

    let outcome = pipeline::run(&mut session, &store, &settings.run);
    if let Err(e) = session.logout() {
        tracing::warn!(error = %e, "IMAP logout failed");
    }
    let report = outcome?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report_table(&report);
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} attachment(s) failed to upload",
            report.failed(),
            report.attachments_selected
        );
    }
    Ok(())
}

/// Print the run report as a human-readable table.
fn print_report_table(report: &RunReport) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<22} {}", "Run date", report.run_date);
    println!("  {:<22} {}", "Search date", report.search_date);
    println!("  {:<22} {}", "Messages scanned", report.messages_scanned);
    println!("  {:<22} {}", "Attachments selected", report.attachments_selected);
    println!(
        "  {:<22} {} ({})",
        "Uploaded",
        report.uploaded(),
        format_size(report.bytes_uploaded(), BINARY)
    );
    if report.planned() > 0 {
        println!("  {:<22} {}", "Planned (dry run)", report.planned());
    }
    println!("  {:<22} {}", "Skipped", report.skipped());
    println!("  {:<22} {}", "Failed", report.failed());

    if report.records.is_empty() {
        println!();
        return;
    }

    println!();
    println!("  {:<6} {:<10} {}", "Msg", "Status", "Detail");
    println!("  {}", "-".repeat(78));
    for record in &report.records {
        let (status, detail) = match &record.outcome {
            TransferOutcome::Uploaded { key, .. } => ("uploaded", key.clone()),
            TransferOutcome::Planned { key } => ("planned", key.clone()),
            TransferOutcome::Skipped { reason } => ("skipped", reason.clone()),
            TransferOutcome::Failed { scratch, reason, .. } => (
                "failed",
                format!("{reason} (kept {})", scratch.display()),
            ),
        };
        println!("  {:<6} {:<10} {}", record.message_id.to_string(), status, detail);
    }
    println!();
}
