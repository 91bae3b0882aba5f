#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;

use actor::ActorFlags;
use civic_core::config::{UserConfig, resolve_config};
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "civic: municipal issue reporting and triage",
    long_about = None
)]
struct Cli {
    /// Output format. Defaults to pretty on a TTY and text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true)]
    json: bool,

    /// Acting identity (skips env and config resolution).
    #[arg(long, global = true)]
    actor: Option<String>,

    /// Acting role: citizen or admin.
    #[arg(long, global = true)]
    role: Option<String>,

    /// Display name recorded on reports and notes.
    #[arg(long, global = true)]
    name: Option<String>,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn actor_flags(&self) -> ActorFlags<'_> {
        ActorFlags {
            actor: self.actor.as_deref(),
            role: self.role.as_deref(),
            name: self.name.as_deref(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Project",
        about = "Initialize a civic project",
        long_about = "Create .civic/ with a default config, an empty registry and a blob directory.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    civic init\n\n    # Rewrite the default config\n    civic init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Citizen",
        about = "Report a new issue",
        long_about = "Report an issue. Priority is derived from the category and description; \
                      nearby reports of the same category are listed as possible duplicates.",
        after_help = "EXAMPLES:\n    # Report a pothole\n    civic report -t \"Pothole on MG Road\" -d \"Deep pothole near the metro\" \\\n        -c roads --lat 12.9756 --lng 77.6066\n\n    # Attach a photo\n    civic report -t \"Leak\" -d \"Pipe burst\" -c water --lat 12.97 --lng 77.59 --image leak.jpg"
    )]
    Report(cmd::report::ReportArgs),

    #[command(
        next_help_heading = "Citizen",
        about = "Upvote an issue",
        after_help = "EXAMPLES:\n    civic upvote iss-k3v9x2mq"
    )]
    Upvote(cmd::upvote::UpvoteArgs),

    #[command(
        next_help_heading = "Citizen",
        about = "Find existing reports near a point",
        after_help = "EXAMPLES:\n    civic dup -c garbage --lat 12.978 --lng 77.59"
    )]
    Dup(cmd::dup::DupArgs),

    #[command(
        next_help_heading = "Read",
        about = "List issues",
        long_about = "List issues with optional filters and sort order.",
        after_help = "EXAMPLES:\n    # Newest first\n    civic list\n\n    # Open high-priority road issues\n    civic list --category roads --priority high --status acknowledged\n\n    # My reports, most upvoted first\n    civic list --mine --sort upvotes"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one issue",
        after_help = "EXAMPLES:\n    civic show iss-k3v9x2mq\n    civic show iss-k3v9x2mq --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Dashboard statistics",
        after_help = "EXAMPLES:\n    civic stats\n    civic stats --json"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Read",
        about = "SLA deadline report",
        after_help = "EXAMPLES:\n    # Everything with a deadline that is still open\n    civic sla\n\n    # Only overdue and nearly-due issues\n    civic sla --attention"
    )]
    Sla(cmd::sla::SlaArgs),

    #[command(
        next_help_heading = "Admin",
        about = "Change issue status",
        long_about = "Move issues along the lifecycle. With one id, assignment fields \
                      (department, officer, SLA, resolution notes) are applied in the same update.",
        after_help = "EXAMPLES:\n    # Acknowledge and assign with a 3 day SLA\n    civic transition iss-k3v9x2mq --to acknowledged --department \"Water Board\" --sla \"3 Days\"\n\n    # Resolve several issues at once\n    civic transition iss-a iss-b --to resolved -c \"Cleared in drive\""
    )]
    Transition(cmd::transition::TransitionArgs),

    #[command(
        next_help_heading = "Admin",
        about = "Escalate an issue to an outside authority",
        after_help = "EXAMPLES:\n    civic escalate iss-k3v9x2mq --to \"State PWD\" -r \"Needs heavy machinery\" --reference PWD-2291"
    )]
    Escalate(cmd::escalate::EscalateArgs),

    #[command(
        next_help_heading = "Admin",
        about = "Add an administrative note",
        after_help = "EXAMPLES:\n    civic note iss-k3v9x2mq \"Contractor on site Monday\""
    )]
    Note(cmd::note::NoteArgs),

    #[command(
        next_help_heading = "Project",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    civic completions bash\n    civic completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(quiet: bool) {
    let filter = EnvFilter::try_from_env("CIVIC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if quiet {
            "error"
        } else if env::var("DEBUG").is_ok() {
            "civic=debug,civic_core=debug,info"
        } else {
            "warn"
        })
    });

    let format = env::var("CIVIC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

/// Resolve the output mode and user config. Config problems fall back to
/// defaults so errors can still be rendered.
fn resolve_environment(cli: &Cli, cwd: &Path) -> (OutputMode, UserConfig) {
    match resolve_config(cwd, cli.json) {
        Ok(effective) => (
            cli.format
                .unwrap_or_else(|| OutputMode::from_resolved(&effective.resolved_output)),
            effective.user,
        ),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "ignoring unreadable config");
            let fallback = if cli.json { OutputMode::Json } else { OutputMode::Text };
            (cli.format.unwrap_or(fallback), UserConfig::default())
        }
    }
}

fn run(cli: &Cli, output: OutputMode, user: &UserConfig, cwd: &Path) -> anyhow::Result<()> {
    let flags = cli.actor_flags();
    let session = || actor::require_session(flags, user);

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, cwd),
        Commands::Report(args) => cmd::report::run_report(args, &session()?, output, cwd),
        Commands::Upvote(args) => cmd::upvote::run_upvote(args, &session()?, output, cwd),
        Commands::Dup(args) => cmd::dup::run_dup(args, output, cwd),
        Commands::List(args) => {
            cmd::list::run_list(args, actor::resolve_actor(flags, user), output, cwd)
        }
        Commands::Show(args) => cmd::show::run_show(args, output, cwd),
        Commands::Stats(args) => cmd::stats::run_stats(args, output, cwd),
        Commands::Sla(args) => cmd::sla::run_sla(args, output, cwd),
        Commands::Transition(args) => {
            cmd::transition::run_transition(args, &session()?, output, cwd)
        }
        Commands::Escalate(args) => cmd::escalate::run_escalate(args, &session()?, output, cwd),
        Commands::Note(args) => cmd::note::run_note(args, &session()?, output, cwd),
        Commands::Completions(args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let cwd = match env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("error: cannot read current directory: {err}");
            return ExitCode::FAILURE;
        }
    };
    let (output, user) = resolve_environment(&cli, &cwd);

    match run(&cli, output, &user, &cwd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if render_error(output, &CliError::from_anyhow(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
