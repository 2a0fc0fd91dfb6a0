use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use retryable::{AllowList, DEFAULT_MAX_ATTEMPTS, DenyList, Retrier, RetryConfig};
use std::fmt;
use std::io::{self, Write};
use std::process::{Command, ExitCode};
use std::time::Duration;

/// retryable - run a command until it succeeds
///
/// The command is re-run after each failure, up to the attempt budget.
/// A failure is a non-zero exit status; --retry-on and --stop-on match
/// against the command's standard error.
///
/// Examples:
///   retryable -- curl -fsS https://example.com
///   retryable -n 5 --retry-on timeout -- ./deploy.sh
#[derive(Parser, Debug)]
#[command(author, version = env!("RETRYABLE_VERSION"), about)]
struct Cli {
    /// Maximum number of attempts, including the first
    #[arg(
        long,
        short = 'n',
        env = "RETRYABLE_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    attempts: u32,

    /// Delay between attempts in milliseconds
    #[arg(long, short = 'd', env = "RETRYABLE_DELAY_MS", default_value_t = 1000)]
    delay_ms: u64,

    /// Retry only when stderr contains PATTERN (repeatable)
    #[arg(long, value_name = "PATTERN", conflicts_with = "stop_on")]
    retry_on: Vec<String>,

    /// Stop retrying when stderr contains PATTERN (repeatable)
    #[arg(long, value_name = "PATTERN")]
    stop_on: Vec<String>,

    /// Command to run, followed by its arguments
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,
}

/// Why one run of the command counts as failed.
#[derive(Debug)]
enum CommandFailure {
    Spawn { program: String, source: io::Error },
    Exit { code: Option<i32>, stderr: String },
}

impl CommandFailure {
    fn exit_code(&self) -> u8 {
        match self {
            CommandFailure::Spawn { .. } => 127,
            CommandFailure::Exit {
                code: Some(code), ..
            } => u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1),
            CommandFailure::Exit { code: None, .. } => 1,
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandFailure::Spawn { program, source } => {
                write!(f, "failed to start {}: {}", program, source)
            }
            CommandFailure::Exit {
                code: Some(code),
                stderr,
            } => write!(f, "command exited with status {}: {}", code, stderr.trim_end()),
            CommandFailure::Exit { code: None, stderr } => {
                write!(f, "command terminated by signal: {}", stderr.trim_end())
            }
        }
    }
}

impl std::error::Error for CommandFailure {}

/// Runs the command once, returning its stdout on success.
fn run_once(command: &[String]) -> Result<Vec<u8>, CommandFailure> {
    let (program, args) = command.split_first().ok_or_else(|| CommandFailure::Exit {
        code: None,
        stderr: "no command given".to_string(),
    })?;
    debug!("Running {} {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| CommandFailure::Spawn {
            program: program.clone(),
            source,
        })?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(CommandFailure::Exit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn run(cli: &Cli) -> Result<()> {
    let retrier = Retrier::new(RetryConfig::new(
        cli.attempts,
        Duration::from_millis(cli.delay_ms),
    ));
    let attempt = || run_once(&cli.command);

    let stdout = if !cli.retry_on.is_empty() {
        retrier
            .classifier(AllowList::new(cli.retry_on.iter().map(String::as_str)))
            .run(attempt)
    } else if !cli.stop_on.is_empty() {
        retrier
            .classifier(DenyList::new(cli.stop_on.iter().map(String::as_str)))
            .run(attempt)
    } else {
        retrier.run(attempt)
    }?;

    io::stdout()
        .write_all(&stdout)
        .context("Failed to write command output")?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<CommandFailure>()
                .map_or(1, CommandFailure::exit_code);
            ExitCode::from(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["retryable", "--", "true"]).unwrap();
        assert_eq!(cli.attempts, 3);
        assert_eq!(cli.delay_ms, 1000);
        assert!(cli.retry_on.is_empty());
        assert!(cli.stop_on.is_empty());
        assert_eq!(cli.command, vec!["true"]);
    }

    #[test]
    fn test_cli_command_with_hyphen_args() {
        let cli = Cli::try_parse_from(["retryable", "-n", "5", "--", "sh", "-c", "exit 1"])
            .unwrap();
        assert_eq!(cli.attempts, 5);
        assert_eq!(cli.command, vec!["sh", "-c", "exit 1"]);
    }

    #[test]
    fn test_cli_repeatable_patterns() {
        let cli = Cli::try_parse_from([
            "retryable",
            "--retry-on",
            "timeout",
            "--retry-on",
            "temporary",
            "--",
            "true",
        ])
        .unwrap();
        assert_eq!(cli.retry_on, vec!["timeout", "temporary"]);
    }

    #[test]
    fn test_cli_retry_on_conflicts_with_stop_on() {
        let result = Cli::try_parse_from([
            "retryable",
            "--retry-on",
            "a",
            "--stop-on",
            "b",
            "--",
            "true",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_zero_attempts_rejected() {
        assert!(Cli::try_parse_from(["retryable", "-n", "0", "--", "true"]).is_err());
    }

    #[test]
    fn test_cli_no_command_fails() {
        assert!(Cli::try_parse_from(["retryable"]).is_err());
    }

    #[test]
    fn test_command_failure_exit_codes() {
        let failure = CommandFailure::Exit {
            code: Some(3),
            stderr: String::new(),
        };
        assert_eq!(failure.exit_code(), 3);

        let failure = CommandFailure::Exit {
            code: Some(300),
            stderr: String::new(),
        };
        assert_eq!(failure.exit_code(), 1);

        let failure = CommandFailure::Spawn {
            program: "missing".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(failure.exit_code(), 127);
    }

    #[test]
    fn test_command_failure_display() {
        let failure = CommandFailure::Exit {
            code: Some(1),
            stderr: "temporary error\n".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "command exited with status 1: temporary error"
        );
    }

    #[test]
    fn test_run_once_missing_program() {
        let result = run_once(&["retryable-test-no-such-program".to_string()]);
        assert!(matches!(result, Err(CommandFailure::Spawn { .. })));
    }
}
