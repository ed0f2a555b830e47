use crate::app_error::AppError;
use crate::config::{self, Config};
use crate::error::JobError;
use crate::model::{Job, ListFilter};
use crate::output::{self, JobRow};
use crate::retry;
use crate::store::Store;
use crate::supervisor::{self, ChildArgs, Supervisor};
use crate::version;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Generator, generate};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::warn;

const COMMAND_PREVIEW_CHARS: usize = 40;

#[derive(Debug, Parser)]
#[command(
    name = "bj",
    version = version::VALUE,
    about = "Run shell commands in the background and keep track of them",
    styles = clap_styles()
)]
struct Cli {
    #[arg(long = "no-color", global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Start a command in the background")]
    Run(RunArgs),
    #[command(about = "Re-run a failed job as a new job")]
    Retry(RetryArgs),
    #[command(about = "List jobs, newest first")]
    List(ListArgs),
    #[command(about = "Print job ids, one per line")]
    Ids(IdsArgs),
    #[command(about = "Show the output of a job")]
    Logs(LogsArgs),
    #[command(about = "Terminate a running job and everything it started")]
    Kill(KillArgs),
    #[command(about = "Remove successful jobs and their logs")]
    Prune(PruneArgs),
    #[command(about = "Mark jobs whose process disappeared as failed")]
    Gc(GcArgs),
    Version,
    Completion(CompletionArgs),
    #[command(hide = true)]
    Complete(CompleteArgs),
    #[command(hide = true)]
    Supervise(ChildArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(
        long,
        help = "Retry failed attempts, at most N times when a value is given",
        value_name = "N",
        num_args = 0..=1,
        require_equals = true,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    retry: Option<Option<u32>>,

    #[arg(
        long,
        value_name = "SECS",
        requires = "retry",
        help = "Seconds to wait between retries"
    )]
    delay: Option<u64>,

    #[arg(
        long,
        conflicts_with = "retry",
        help = "Restart the command until it exits successfully"
    )]
    restart: bool,

    #[arg(long)]
    json: bool,

    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    command: Vec<String>,
}

#[derive(Debug, Args)]
struct RetryArgs {
    #[arg(
        long,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Job to retry (defaults to the most recent failure)"
    )]
    id: Option<u64>,

    #[arg(
        long,
        default_value_t = 1,
        help = "Attempts for the new job; 0 retries until success"
    )]
    attempts: u32,

    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 1,
        help = "Seconds to wait between attempts"
    )]
    delay: u64,

    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long)]
    running: bool,
    #[arg(long)]
    failed: bool,
    #[arg(long)]
    done: bool,
}

impl FilterArgs {
    fn filter(&self) -> ListFilter {
        ListFilter {
            running: self.running,
            failed: self.failed,
            done: self.done,
        }
    }
}

#[derive(Debug, Args)]
struct ListArgs {
    #[command(flatten)]
    filter: FilterArgs,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct IdsArgs {
    #[command(flatten)]
    filter: FilterArgs,
}

#[derive(Debug, Args)]
struct LogsArgs {
    #[arg(help = "Job id (defaults to the most recent job)")]
    id: Option<u64>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct KillArgs {
    #[arg(help = "Job id (defaults to the most recent running job)")]
    id: Option<u64>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct PruneArgs {
    #[arg(
        long = "older-than",
        value_parser = humantime::parse_duration,
        help = "Only prune jobs that finished longer ago than this (e.g. 2h, 3days)"
    )]
    older_than: Option<Duration>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct GcArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct CompleteArgs {
    id: u64,
    #[arg(allow_negative_numbers = true)]
    exit_code: i32,
}

#[derive(Debug, Args)]
struct CompletionArgs {
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

fn clap_styles() -> Styles {
    Styles::plain()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Cyan.on_default())
        .valid(AnsiColor::Cyan.on_default())
        .invalid(AnsiColor::Cyan.on_default())
        .context(AnsiColor::White.on_default())
        .context_value(AnsiColor::Cyan.on_default())
}

struct Context {
    config_dir: PathBuf,
    config: Config,
    store: Store,
}

impl Context {
    fn load() -> Result<Self, AppError> {
        let config_dir = config::config_dir().map_err(AppError::internal)?;
        let config = config::load(&config_dir).map_err(AppError::usage)?;
        let store = Store::open(&config_dir)?;

        Ok(Self {
            config_dir,
            config,
            store,
        })
    }

    // Failures here never fail the command that follows.
    fn housekeeping(&self, collect: bool) {
        if collect && let Err(err) = self.store.garbage_collect() {
            warn!(error = %err, "startup garbage collection failed");
        }

        let Some(age) = self.config.auto_prune_age() else {
            return;
        };

        if let Err(err) = self.store.prune_older_than(age) {
            warn!(error = %err, "auto-prune failed");
        }
    }

    fn supervisor(&self) -> Result<Supervisor, AppError> {
        let log_dir = self.config.log_dir_path(&self.config_dir);
        Ok(Supervisor::new(
            self.store.clone(),
            log_dir,
            supervisor::user_shell(),
        )?)
    }
}

pub fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    output::configure(cli.no_color);

    let json = match &cli.command {
        Commands::Run(args) => args.json,
        Commands::Retry(args) => args.json,
        Commands::List(args) => args.json,
        Commands::Logs(args) => args.json,
        Commands::Kill(args) => args.json,
        Commands::Prune(args) => args.json,
        Commands::Gc(args) => args.json,
        _ => false,
    };

    let result = dispatch(cli.command);
    if json && let Err(err) = &result {
        let _ = print_json(&ErrorJson {
            error: &err.to_string(),
        });
    }
    result
}

fn dispatch(command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Version => {
            println!("{}", version::VALUE);
            return Ok(());
        }
        Commands::Completion(args) => return run_completion(args),
        Commands::Supervise(args) => return run_supervise(args),
        Commands::Complete(args) => return run_complete(args),
        _ => {}
    }

    let ctx = Context::load()?;
    // `bj gc` does its own collection so it can report the count.
    ctx.housekeeping(!matches!(command, Commands::Gc(_)));

    match command {
        Commands::Run(args) => run_run(&ctx, args),
        Commands::Retry(args) => run_retry(&ctx, args),
        Commands::List(args) => run_list(&ctx, args),
        Commands::Ids(args) => run_ids(&ctx, args),
        Commands::Logs(args) => run_logs(&ctx, args),
        Commands::Kill(args) => run_kill(&ctx, args),
        Commands::Prune(args) => run_prune(&ctx, args),
        Commands::Gc(args) => run_gc(&ctx, args),
        Commands::Version
        | Commands::Completion(_)
        | Commands::Supervise(_)
        | Commands::Complete(_) => Ok(()),
    }
}

#[derive(Serialize)]
struct ErrorJson<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct StartedJson<'a> {
    id: u64,
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restart: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_job: Option<u64>,
}

fn run_run(ctx: &Context, args: RunArgs) -> Result<(), AppError> {
    let command = args.command.join(" ");
    if command.trim().is_empty() {
        return Err(AppError::usage("a command is required"));
    }

    let working_dir = std::env::current_dir()
        .map_err(|e| AppError::internal(format!("failed to get working directory: {e}")))?;
    let sup = ctx.supervisor()?;

    if args.restart {
        let id = sup
            .run_with_restart(&command, &working_dir)
            .map_err(|e| AppError::runtime(format!("failed to start job: {e}")))?;

        if args.json {
            return print_json(&StartedJson {
                id,
                command: &command,
                status: "started",
                max_attempts: None,
                delay_secs: None,
                restart: Some(true),
                original_job: None,
            });
        }

        println!(
            "{} [{}] restarting on failure: {}",
            output::success("ok"),
            output::number(&id.to_string()),
            output::command(&command)
        );
        return Ok(());
    }

    if let Some(retry) = args.retry {
        let delay_secs = args.delay.unwrap_or(1);
        let id = sup
            .run_with_retry(
                &command,
                &working_dir,
                retry,
                Duration::from_secs(delay_secs),
            )
            .map_err(|e| AppError::runtime(format!("failed to start job: {e}")))?;

        if args.json {
            return print_json(&StartedJson {
                id,
                command: &command,
                status: "started",
                max_attempts: Some(retry.unwrap_or(0)),
                delay_secs: Some(delay_secs),
                restart: None,
                original_job: None,
            });
        }

        print_retry_started(id, retry, &command);
        return Ok(());
    }

    let id = sup
        .run(&command, &working_dir)
        .map_err(|e| AppError::runtime(format!("failed to start job: {e}")))?;

    if args.json {
        return print_json(&StartedJson {
            id,
            command: &command,
            status: "started",
            max_attempts: None,
            delay_secs: None,
            restart: None,
            original_job: None,
        });
    }

    println!(
        "{} [{}] started: {}",
        output::success("ok"),
        output::number(&id.to_string()),
        output::command(&command)
    );
    Ok(())
}

fn print_retry_started(id: u64, max_attempts: Option<u32>, command: &str) {
    let plan = match max_attempts {
        None => "retrying until it succeeds".to_string(),
        Some(1) => "single attempt".to_string(),
        Some(n) => format!("up to {n} attempts"),
    };

    println!(
        "{} [{}] {}: {}",
        output::success("ok"),
        output::number(&id.to_string()),
        plan,
        output::command(command)
    );
}

fn run_retry(ctx: &Context, args: RetryArgs) -> Result<(), AppError> {
    let Some(job) = retry::select_target(&ctx.store, args.id)? else {
        if args.json {
            return Err(AppError::runtime("no failed jobs to retry"));
        }
        println!("{} {}", output::info("i"), output::muted("No failed jobs to retry."));
        return Ok(());
    };

    let max_attempts = (args.attempts > 0).then_some(args.attempts);
    let id = ctx
        .supervisor()?
        .run_with_retry(
            &job.command,
            &job.working_dir,
            max_attempts,
            Duration::from_secs(args.delay),
        )
        .map_err(|e| AppError::runtime(format!("failed to start retry: {e}")))?;

    if args.json {
        return print_json(&StartedJson {
            id,
            command: &job.command,
            status: "started",
            max_attempts: Some(args.attempts),
            delay_secs: Some(args.delay),
            restart: None,
            original_job: Some(job.id),
        });
    }

    print_retry_started(id, max_attempts, &job.command);
    Ok(())
}

fn filtered_jobs(store: &Store, filter: ListFilter) -> Result<Vec<Job>, AppError> {
    Ok(store
        .list()?
        .into_iter()
        .filter(|job| filter.matches(job))
        .collect())
}

fn run_list(ctx: &Context, args: ListArgs) -> Result<(), AppError> {
    let filter = args.filter.filter();
    let jobs = filtered_jobs(&ctx.store, filter)?;

    if args.json {
        return print_json(&jobs);
    }

    let now = OffsetDateTime::now_utc();
    let rows: Vec<JobRow> = jobs
        .iter()
        .map(|job| JobRow {
            id: job.id,
            status: job.status(now),
            start: output::relative_time(job.start_time, now),
            duration: output::format_duration(job.elapsed(now)),
            command: output::compact_command(&job.command, COMMAND_PREVIEW_CHARS),
        })
        .collect();

    output::print_jobs(io::stdout().lock(), &rows, !filter.is_empty())
        .map_err(|e| AppError::internal(format!("print jobs: {e}")))
}

fn run_ids(ctx: &Context, args: IdsArgs) -> Result<(), AppError> {
    let jobs = filtered_jobs(&ctx.store, args.filter.filter())?;

    let mut stdout = io::stdout().lock();
    for job in jobs {
        writeln!(stdout, "{}", job.id)
            .map_err(|e| AppError::internal(format!("write output: {e}")))?;
    }
    Ok(())
}

fn run_logs(ctx: &Context, args: LogsArgs) -> Result<(), AppError> {
    let job = match args.id {
        Some(id) => ctx.store.get(id)?.ok_or(JobError::NotFound(id))?,
        None => match ctx.store.latest()? {
            Some(job) => job,
            None if args.json => return Err(AppError::runtime("no jobs found")),
            None => {
                println!("{} {}", output::info("i"), output::muted("No jobs yet."));
                return Ok(());
            }
        },
    };

    if job.log_file.as_os_str().is_empty() || !job.log_file.exists() {
        return Err(AppError::runtime(format!(
            "log file {} not found",
            job.log_file.display()
        )));
    }

    if args.json {
        #[derive(Serialize)]
        struct LogsJson<'a> {
            job: &'a Job,
            content: String,
        }

        let content = fs::read(&job.log_file)
            .map_err(|e| AppError::internal(format!("read log file: {e}")))?;
        return print_json(&LogsJson {
            job: &job,
            content: String::from_utf8_lossy(&content).into_owned(),
        });
    }

    let status = Command::new(&ctx.config.viewer)
        .arg(&job.log_file)
        .status()
        .map_err(|e| AppError::runtime(format!("open log viewer {}: {e}", ctx.config.viewer)))?;

    if !status.success() {
        return Err(AppError::runtime(format!(
            "log viewer {} exited with {}",
            ctx.config.viewer,
            supervisor::exit_code(status)
        )));
    }
    Ok(())
}

fn run_kill(ctx: &Context, args: KillArgs) -> Result<(), AppError> {
    let id = match args.id {
        Some(id) => id,
        None => match ctx.store.latest_running()? {
            Some(job) => job.id,
            None if args.json => return Err(AppError::runtime("no running jobs to kill")),
            None => {
                println!(
                    "{} {}",
                    output::info("i"),
                    output::muted("No running jobs to kill.")
                );
                return Ok(());
            }
        },
    };

    let job = ctx.store.kill(id)?;

    if args.json {
        #[derive(Serialize)]
        struct KilledJson<'a> {
            id: u64,
            command: &'a str,
            status: &'static str,
        }

        return print_json(&KilledJson {
            id: job.id,
            command: &job.command,
            status: "killed",
        });
    }

    println!(
        "{} [{}] killed: {}",
        output::warning("x"),
        output::number(&job.id.to_string()),
        output::command(&job.command)
    );
    Ok(())
}

fn run_prune(ctx: &Context, args: PruneArgs) -> Result<(), AppError> {
    let pruned = match args.older_than {
        Some(age) => ctx.store.prune_older_than(age)?,
        None => ctx.store.prune()?,
    };

    if args.json {
        #[derive(Serialize)]
        struct PrunedJson {
            pruned: usize,
        }
        return print_json(&PrunedJson { pruned });
    }

    if pruned == 0 {
        println!("{} {}", output::info("i"), output::muted("Nothing to prune."));
    } else {
        println!(
            "{} pruned {} finished job(s)",
            output::success("ok"),
            output::number(&pruned.to_string())
        );
    }
    Ok(())
}

fn run_gc(ctx: &Context, args: GcArgs) -> Result<(), AppError> {
    let collected = ctx.store.garbage_collect()?;

    if args.json {
        #[derive(Serialize)]
        struct CollectedJson {
            collected: usize,
        }
        return print_json(&CollectedJson { collected });
    }

    if collected == 0 {
        println!(
            "{} {}",
            output::info("i"),
            output::muted("No orphaned jobs found.")
        );
    } else {
        println!(
            "{} marked {} orphaned job(s) as failed",
            output::warning("!"),
            output::number(&collected.to_string())
        );
    }
    Ok(())
}

fn run_complete(args: CompleteArgs) -> Result<(), AppError> {
    let config_dir = config::config_dir().map_err(AppError::internal)?;
    let store = Store::open(config_dir)?;
    supervisor::complete(&store, args.id, args.exit_code)
        .map_err(|e| AppError::runtime(format!("failed to complete job: {e}")))
}

fn run_supervise(args: ChildArgs) -> Result<(), AppError> {
    supervisor::supervise(&args)
        .map(drop)
        .map_err(|e| AppError::runtime(format!("job {}: {e}", args.job)))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)
        .map_err(|e| AppError::internal(format!("encode json: {e}")))?;
    writeln!(stdout).map_err(|e| AppError::internal(format!("write output: {e}")))
}

fn run_completion(args: CompletionArgs) -> Result<(), AppError> {
    let mut cmd = Cli::command();
    let mut stdout = io::stdout().lock();

    match args.shell {
        Shell::Bash => generate_completion(clap_complete::shells::Bash, &mut cmd, &mut stdout),
        Shell::Zsh => generate_completion(clap_complete::shells::Zsh, &mut cmd, &mut stdout),
        Shell::Fish => generate_completion(clap_complete::shells::Fish, &mut cmd, &mut stdout),
        Shell::Powershell => {
            generate_completion(clap_complete::shells::PowerShell, &mut cmd, &mut stdout)
        }
    }
    .map_err(|e| AppError::internal(format!("generate completion: {e}")))
}

fn generate_completion<G: Generator>(
    generator: G,
    cmd: &mut clap::Command,
    writer: &mut impl Write,
) -> Result<(), io::Error> {
    generate(generator, cmd, "bj", writer);
    writer.flush()
}
