mod console;

use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{
    AdviceProviderKind, AdviceSettings, AdviceSettingsDraft, QuizLimits, QuizMode,
    SessionId, SessionStateError, SettingsError, UserId,
};
use services::{AppConfig, AppServices, Clock};
use storage::question_bank::QuestionBank;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidMode { raw: String },
    InvalidUser { raw: String },
    InvalidSession { raw: String },
    InvalidNumber { name: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidMode { raw } => {
                write!(f, "invalid --mode value: {raw} (expected quick or full)")
            }
            ArgsError::InvalidUser { raw } => write!(f, "invalid user id: {raw:?}"),
            ArgsError::InvalidSession { raw } => write!(f, "invalid session id: {raw:?}"),
            ArgsError::InvalidNumber { name, raw } => {
                write!(f, "{name} must be a positive number, got {raw:?}")
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz-app run     [--db <sqlite_url>] [--questions <path>] [--user <id>] [--mode quick|full]");
    eprintln!("  quiz-app history [--db <sqlite_url>] [--questions <path>] [--user <id>] [--limit <n>] [--session <uuid>]");
    eprintln!("  quiz-app stats   [--questions <path>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://quiz.sqlite3");
    eprintln!("  --questions data/questions.json");
    eprintln!("  --user local");
    eprintln!("  --mode quick");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_QUESTIONS, QUIZ_USER_ID, QUIZ_QUICK_COUNT, QUIZ_FULL_COUNT");
    eprintln!("  QUIZ_LLM_PROVIDER (none|openai|ollama), QUIZ_AI_API_KEY or OPENAI_API_KEY,");
    eprintln!("  QUIZ_AI_BASE_URL, QUIZ_AI_MODEL, QUIZ_AI_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    History,
    Stats,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "history" => Some(Self::History),
            "stats" => Some(Self::Stats),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    questions: PathBuf,
    user_id: UserId,
    mode: QuizMode,
    history_limit: u32,
    session: Option<SessionId>,
}

impl Args {
    const DEFAULT_HISTORY_LIMIT: u32 = 10;

    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://quiz.sqlite3".into(), normalize_sqlite_url);
        let mut questions = std::env::var("QUIZ_QUESTIONS")
            .ok()
            .map_or_else(|| PathBuf::from("data/questions.json"), PathBuf::from);
        let mut user_id =
            parse_user(env_nonempty("QUIZ_USER_ID").unwrap_or_else(|| "local".into()))?;
        let mut mode = QuizMode::Quick;
        let mut history_limit = Self::DEFAULT_HISTORY_LIMIT;
        let mut session = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--questions" => {
                    questions = PathBuf::from(require_value(args, "--questions")?);
                }
                "--user" => {
                    user_id = parse_user(require_value(args, "--user")?)?;
                }
                "--mode" => {
                    let value = require_value(args, "--mode")?;
                    mode = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidMode { raw: value.clone() })?;
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    history_limit = parse_positive("--limit", &value)?;
                }
                "--session" => {
                    let value = require_value(args, "--session")?;
                    session = Some(
                        value
                            .parse()
                            .map_err(|_| ArgsError::InvalidSession { raw: value.clone() })?,
                    );
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
            questions,
            user_id,
            mode,
            history_limit,
            session,
        })
    }
}

fn parse_user(raw: String) -> Result<UserId, ArgsError> {
    UserId::new(raw.clone()).map_err(|_| ArgsError::InvalidUser { raw })
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u32, ArgsError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ArgsError::InvalidNumber {
            name,
            raw: raw.to_string(),
        })
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Environment settings that failed to parse or validate.
#[derive(Debug)]
enum ConfigError {
    Env(ArgsError),
    Invalid(quiz_core::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Env(err) => err.fmt(f),
            ConfigError::Invalid(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ArgsError> for ConfigError {
    fn from(err: ArgsError) -> Self {
        Self::Env(err)
    }
}

impl From<SessionStateError> for ConfigError {
    fn from(err: SessionStateError) -> Self {
        Self::Invalid(err.into())
    }
}

impl From<SettingsError> for ConfigError {
    fn from(err: SettingsError) -> Self {
        Self::Invalid(err.into())
    }
}

fn limits_from_env() -> Result<QuizLimits, ConfigError> {
    let quick = match env_nonempty("QUIZ_QUICK_COUNT") {
        Some(raw) => parse_positive("QUIZ_QUICK_COUNT", &raw)?,
        None => QuizLimits::DEFAULT_QUICK,
    };
    let full = match env_nonempty("QUIZ_FULL_COUNT") {
        Some(raw) => parse_positive("QUIZ_FULL_COUNT", &raw)?,
        None => QuizLimits::DEFAULT_FULL,
    };
    Ok(QuizLimits::new(quick, full)?)
}

fn advice_from_env() -> Result<AdviceSettings, ConfigError> {
    let provider: AdviceProviderKind = env_nonempty("QUIZ_LLM_PROVIDER")
        .unwrap_or_default()
        .parse()?;
    let timeout_secs = env_nonempty("QUIZ_AI_TIMEOUT_SECS")
        .map(|raw| parse_positive("QUIZ_AI_TIMEOUT_SECS", &raw).map(u64::from))
        .transpose()?;

    let settings = AdviceSettingsDraft {
        provider,
        api_key: env_nonempty("QUIZ_AI_API_KEY").or_else(|| env_nonempty("OPENAI_API_KEY")),
        model: env_nonempty("QUIZ_AI_MODEL"),
        base_url: env_nonempty("QUIZ_AI_BASE_URL"),
        timeout_secs,
    }
    .validate()?;

    if provider != settings.provider() {
        tracing::warn!(requested = %provider, "no API key configured; advice disabled");
    }
    Ok(settings)
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
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

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quiz_app=info,services=info,storage=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means a quiz run.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    if cmd == Command::Stats {
        let bank = QuestionBank::load(&parsed.questions)?;
        console::print_stats(&bank);
        return Ok(());
    }

    let config = AppConfig {
        db_url: parsed.db_url.clone(),
        questions_path: parsed.questions.clone(),
        limits: limits_from_env()?,
        advice: advice_from_env()?,
    };

    // Open + migrate SQLite at startup; the services never see file paths.
    prepare_sqlite_file(&config.db_url)?;
    let services = AppServices::new_sqlite(&config, Clock::system()).await?;

    match cmd {
        Command::Run => {
            let mut console = console::Console::stdin();
            console
                .run_quiz(&services, parsed.user_id, parsed.mode)
                .await
        }
        Command::History => match parsed.session {
            Some(session_id) => console::print_session(&services, session_id).await,
            None => console::print_history(&services, &parsed.user_id, parsed.history_limit).await,
        },
        Command::Stats => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_string());
        Args::parse(&mut iter)
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&[
            "--db",
            "sqlite://tmp/q.sqlite3",
            "--questions",
            "bank.json",
            "--user",
            "ana",
            "--mode",
            "full",
            "--limit",
            "3",
        ])
        .unwrap();
        assert_eq!(args.db_url, "sqlite://tmp/q.sqlite3");
        assert_eq!(args.questions, PathBuf::from("bank.json"));
        assert_eq!(args.user_id.as_str(), "ana");
        assert_eq!(args.mode, QuizMode::Full);
        assert_eq!(args.history_limit, 3);
        assert!(args.session.is_none());
    }

    #[test]
    fn session_flag_selects_one_attempt() {
        let id = SessionId::generate();
        let args = parse(&["--session", &id.to_string()]).unwrap();
        assert_eq!(args.session, Some(id));

        assert!(matches!(
            parse(&["--session", "yesterday"]),
            Err(ArgsError::InvalidSession { .. })
        ));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&["--mode", "marathon"]),
            Err(ArgsError::InvalidMode { .. })
        ));
        assert!(matches!(
            parse(&["--limit", "0"]),
            Err(ArgsError::InvalidNumber { name: "--limit", .. })
        ));
        assert!(matches!(
            parse(&["--db"]),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(
            parse(&["--verbose"]),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn config_errors_wrap_domain_errors() {
        let err = ConfigError::from(QuizLimits::new(0, 5).unwrap_err());
        assert!(matches!(
            err,
            ConfigError::Invalid(quiz_core::Error::SessionState(_))
        ));
        assert!(err.to_string().starts_with("invalid configuration:"));

        let err = ConfigError::from(ArgsError::InvalidNumber {
            name: "QUIZ_FULL_COUNT",
            raw: "lots".into(),
        });
        assert!(err.to_string().contains("QUIZ_FULL_COUNT"));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:quiz.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("/quiz.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
