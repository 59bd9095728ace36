use std::fmt;
use std::sync::Arc;

use exam_core::model::{AttemptId, ExamId, OngoingExam};
use services::config::parse_base_url;
use services::{
    ExamClientConfig, GradingOutcome, HttpExamApi, LogNotifier, Navigator, OngoingExamScanner,
    ProgressStore, RedirectDelays, ResultWaiter, ResumeOutcome, Route,
};
use storage::sqlite::SqliteStore;
use tracing_subscriber::{EnvFilter, fmt as log_fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    InvalidId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { raw } => write!(f, "invalid id: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug)]
struct UnknownExam(ExamId);

impl fmt::Display for UnknownExam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no ongoing exam with id {}", self.0)
    }
}

impl std::error::Error for UnknownExam {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- scan     [--db <sqlite_url>] [--api <url>]");
    eprintln!("  cargo run -p app -- resume   <exam-id> [--db <sqlite_url>] [--api <url>]");
    eprintln!("  cargo run -p app -- clear    <exam-id> [--attempt <attempt-id>] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- progress [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- wait     <attempt-id> [--api <url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:dev.sqlite3");
    eprintln!("  --api http://localhost:8080/api/");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_API_URL, EXAM_AUTOSAVE_SECS, EXAM_REDIRECT_DELAY_MS,");
    eprintln!("  EXAM_FALLBACK_DELAY_MS, EXAM_GRADING_TIMEOUT_SECS, EXAM_GRADING_POLL_SECS, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Scan,
    Resume { exam_id: ExamId },
    Clear {
        exam_id: ExamId,
        attempt_id: Option<AttemptId>,
    },
    Progress,
    Wait { attempt_id: AttemptId },
}

struct Args {
    command: Command,
    db_url: String,
    api_url: Option<String>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let Some(sub) = args.next() else {
            return Ok(None);
        };
        if matches!(sub.as_str(), "--help" | "-h") {
            return Ok(None);
        }

        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url);
        let mut api_url = None;
        let mut attempt_flag = None;
        let mut positional: Option<String> = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--api" => api_url = Some(require_value(&mut args, "--api")?),
                "--attempt" => {
                    attempt_flag = Some(parse_id(require_value(&mut args, "--attempt")?)?);
                }
                "--help" | "-h" => return Ok(None),
                _ if !arg.starts_with("--") && positional.is_none() => positional = Some(arg),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match sub.as_str() {
            "scan" => Command::Scan,
            "progress" => Command::Progress,
            "resume" => Command::Resume {
                exam_id: parse_id(positional.ok_or(MISSING_EXAM)?)?,
            },
            "clear" => Command::Clear {
                exam_id: parse_id(positional.ok_or(MISSING_EXAM)?)?,
                attempt_id: attempt_flag,
            },
            "wait" => Command::Wait {
                attempt_id: parse_id(positional.ok_or(ArgsError::MissingArgument {
                    name: "attempt-id",
                })?)?,
            },
            _ => return Err(ArgsError::UnknownArg(sub)),
        };

        Ok(Some(Self {
            command,
            db_url,
            api_url,
        }))
    }
}

const MISSING_EXAM: ArgsError = ArgsError::MissingArgument { name: "exam-id" };

fn parse_id<T: std::str::FromStr>(raw: String) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidId { raw })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

/// Prints routes instead of switching screens.
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&self, route: Route) {
        println!("-> {route}");
    }
}

fn print_exam(exam: &OngoingExam) {
    let attempt = exam
        .attempt_id
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    println!(
        "{}\t{}\t{}\t{}s left\t{} answered\t{}",
        exam.exam_id, exam.exam_type, attempt, exam.remaining_time, exam.progress, exam.title
    );
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            return Err(err.into());
        }
    };

    let mut config = ExamClientConfig::from_env()?;
    if let Some(raw) = &parsed.api_url {
        config.api_base_url = parse_base_url("--api", raw)?;
    }
    let api = Arc::new(HttpExamApi::new(config.api_base_url.clone()));

    if let Command::Wait { attempt_id } = &parsed.command {
        let waiter = ResultWaiter::new(api, &config);
        return match waiter.wait_for_result(attempt_id).await {
            GradingOutcome::Ready(result) => {
                match (result.score, result.total_score) {
                    (Some(score), Some(total)) => println!("graded: {score} / {total}"),
                    (Some(score), None) => println!("graded: {score}"),
                    _ => println!("graded"),
                }
                Ok(())
            }
            GradingOutcome::TimedOut { waited } => {
                println!("no result after {}s; check again later", waited.as_secs());
                Ok(())
            }
        };
    }

    // Storage setup stays in the binary so the library crates never pick a backend.
    prepare_sqlite_file(&parsed.db_url)?;
    let store = SqliteStore::open(&parsed.db_url).await?;
    tracing::debug!(db = %parsed.db_url, "exam storage ready");
    let notifier = Arc::new(LogNotifier);
    let progress = Arc::new(ProgressStore::new(Arc::clone(&store), notifier.clone()));
    let scanner = OngoingExamScanner::new(
        Arc::clone(&store),
        Arc::clone(&progress),
        api,
        notifier,
        Arc::new(PrintNavigator),
    )
    .with_delays(RedirectDelays::from_config(&config));

    match parsed.command {
        Command::Scan => {
            let exams = scanner.check_ongoing_exams().await;
            if exams.is_empty() {
                println!("no ongoing exams");
            }
            exams.iter().for_each(print_exam);
        }
        Command::Resume { exam_id } => {
            let exams = scanner.check_ongoing_exams().await;
            let exam = exams
                .iter()
                .find(|exam| exam.exam_id == exam_id)
                .ok_or(UnknownExam(exam_id))?;
            match scanner.resume_exam_with_sync(exam).await {
                ResumeOutcome::Resumed { attempt, .. } => {
                    println!("resumed attempt {:?}", attempt.exam_attempt_id);
                }
                ResumeOutcome::Fallback { reason, .. } => {
                    println!("continued with local data ({reason:?})");
                }
                ResumeOutcome::Ignored => println!("a resume is already running"),
            }
        }
        Command::Clear {
            exam_id,
            attempt_id,
        } => {
            let left = scanner.clear_exam(&exam_id, attempt_id.as_ref()).await;
            println!("cleared {exam_id}; {} ongoing exam(s) left", left.len());
        }
        Command::Progress => match progress.load_progress().await {
            Some(snapshot) => {
                println!(
                    "exam {}\tattempt {}\t{}s left\t{} answered\t{} orphaned",
                    snapshot
                        .exam_id
                        .as_ref()
                        .map_or_else(|| "-".to_string(), ToString::to_string),
                    snapshot
                        .attempt_id
                        .as_ref()
                        .map_or_else(|| "-".to_string(), ToString::to_string),
                    snapshot.remaining_time,
                    snapshot.progress(),
                    snapshot.orphaned_answers().count(),
                );
            }
            None => println!("no saved progress"),
        },
        Command::Wait { .. } => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
