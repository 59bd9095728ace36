use std::fmt;

use chrono::{DateTime, Utc};
use exam_core::model::{
    AnswerEntry, AnsweredSet, Answers, AttemptId, AttemptRecord, ExamId, ExamMetadata,
    ExamMetadataRecord, ExamProgressSnapshot, ExamType, QuestionId, SubjectId,
};
use storage::keys;
use storage::repository::KeyValueStore;
use storage::sqlite::SqliteStore;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    exam_id: ExamId,
    attempt_id: AttemptId,
    remaining_secs: u32,
    answered: u32,
    with_combo: bool,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidExamId { raw: String },
    InvalidRemaining { raw: String },
    InvalidAnswered { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidExamId { raw } => write!(f, "invalid --exam-id value: {raw}"),
            ArgsError::InvalidRemaining { raw } => write!(f, "invalid --remaining value: {raw}"),
            ArgsError::InvalidAnswered { raw } => write!(f, "invalid --answered value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("EXAM_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3?mode=rwc".into());
        let mut exam_id = ExamId::new("demo-exam");
        let mut attempt_id = AttemptId::new("demo-attempt");
        let mut remaining_secs = 1_800;
        let mut answered = 3;
        let mut with_combo = false;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--exam-id" => {
                    let value = require_value(&mut args, "--exam-id")?;
                    exam_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidExamId { raw: value.clone() })?;
                }
                "--attempt-id" => {
                    let value = require_value(&mut args, "--attempt-id")?;
                    attempt_id = AttemptId::new(value);
                }
                "--remaining" => {
                    let value = require_value(&mut args, "--remaining")?;
                    remaining_secs = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidRemaining { raw: value.clone() })?;
                }
                "--answered" => {
                    let value = require_value(&mut args, "--answered")?;
                    answered = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidAnswered { raw: value.clone() })?;
                }
                "--combo" => with_combo = true,
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            exam_id,
            attempt_id,
            remaining_secs,
            answered,
            with_combo,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3?mode=rwc)");
    eprintln!("  --exam-id <id>            Exam id of the seeded attempt (default: demo-exam)");
    eprintln!("  --attempt-id <id>         Attempt id of the seeded attempt (default: demo-attempt)");
    eprintln!("  --remaining <secs>        Seconds left on the clock (default: 1800)");
    eprintln!("  --answered <n>            Number of answered questions (default: 3)");
    eprintln!("  --combo                   Also seed an active random-combo attempt");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let store = SqliteStore::open(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut answers = Answers::new();
    let mut answered_set = AnsweredSet::new();
    for i in 1..=args.answered {
        let question = QuestionId::new(format!("q{i}"));
        answers.insert(question.clone(), AnswerEntry::choice(format!("opt-{i}")));
        answered_set.insert(question);
    }

    let snapshot = ExamProgressSnapshot {
        answers,
        answered_questions: answered_set,
        remaining_time: args.remaining_secs,
        last_saved: Some(now.timestamp_millis()),
        attempt_id: Some(args.attempt_id.clone()),
        exam_id: Some(args.exam_id.clone()),
    };
    store
        .set(keys::PROGRESS, &serde_json::to_string(&snapshot)?)
        .await?;

    let attempt = AttemptRecord::new(args.exam_id.clone(), Some(args.attempt_id.clone()))
        .with_title("Demo exam");
    store
        .set(&keys::attempt_key(&args.exam_id), &serde_json::to_string(&attempt)?)
        .await?;
    let metadata = ExamMetadataRecord {
        exam_type: ExamType::Single,
        metadata: ExamMetadata::single("demo-template"),
    };
    store
        .set(&keys::metadata_key(&args.exam_id), &serde_json::to_string(&metadata)?)
        .await?;

    if args.with_combo {
        let combo_exam = ExamId::new("demo-combo");
        let combo = AttemptRecord::new(combo_exam.clone(), Some(AttemptId::new("demo-combo-attempt")))
            .with_title("Demo mixed practice");
        store
            .set(keys::ACTIVE_ATTEMPT, &serde_json::to_string(&combo)?)
            .await?;
        let combo_meta = ExamMetadataRecord {
            exam_type: ExamType::RandomCombo,
            metadata: ExamMetadata::subjects([SubjectId::new("math"), SubjectId::new("physics")]),
        };
        store
            .set(&keys::metadata_key(&combo_exam), &serde_json::to_string(&combo_meta)?)
            .await?;
    }

    println!(
        "Seeded attempt {} for exam {} ({} answered, {}s left{}) into {}",
        args.attempt_id,
        args.exam_id,
        args.answered,
        args.remaining_secs,
        if args.with_combo { ", plus an active combo" } else { "" },
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
