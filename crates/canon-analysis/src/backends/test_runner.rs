//! Runs a configured test command per unit and parses coverage from its output.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;

use canon_core::config::RefactorConfig;
use canon_core::errors::{ConfigError, TestRunError};
use canon_core::traits::{TestOutcome, TestRunner};
use canon_core::types::UnitRef;

/// Matches the "All files" row of an istanbul/jest text coverage table.
pub const DEFAULT_COVERAGE_REGEX: &str = r"All files[^\d]*(\d+(?:\.\d+)?)";

const UNIT_PLACEHOLDER: &str = "{unit}";
const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct CommandTestRunner {
    workdir: PathBuf,
    argv: Vec<String>,
    timeout: Duration,
    coverage: Regex,
}

impl CommandTestRunner {
    pub fn new(
        workdir: impl Into<PathBuf>,
        argv: Vec<String>,
        timeout: Duration,
        coverage_regex: &str,
    ) -> Result<Self, ConfigError> {
        if argv.is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "refactor.test_command".to_string(),
                message: "must name a program".to_string(),
            });
        }
        let coverage = Regex::new(coverage_regex).map_err(|e| ConfigError::ValidationFailed {
            field: "refactor.coverage_regex".to_string(),
            message: e.to_string(),
        })?;
        if coverage.captures_len() < 2 {
            return Err(ConfigError::ValidationFailed {
                field: "refactor.coverage_regex".to_string(),
                message: "needs a capture group for the percentage".to_string(),
            });
        }
        Ok(Self {
            workdir: workdir.into(),
            argv,
            timeout,
            coverage,
        })
    }

    pub fn from_config(workdir: impl Into<PathBuf>, config: &RefactorConfig) -> Result<Self, ConfigError> {
        Self::new(
            workdir,
            config.test_command.clone(),
            Duration::from_secs(config.effective_test_timeout_secs()),
            config.coverage_regex.as_deref().unwrap_or(DEFAULT_COVERAGE_REGEX),
        )
    }

    fn argv_for(&self, unit: &UnitRef) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| arg.replace(UNIT_PLACEHOLDER, unit.as_str()))
            .collect()
    }

    /// Last match wins; reporters print per-file rows before totals.
    pub fn parse_coverage(&self, output: &str) -> Option<f64> {
        self.coverage
            .captures_iter(output)
            .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
            .last()
    }
}

impl TestRunner for CommandTestRunner {
    fn run_tests(&self, unit: &UnitRef) -> Result<TestOutcome, TestRunError> {
        let argv = self.argv_for(unit);
        let (program, args) = argv.split_first().ok_or(TestRunError::EmptyCommand)?;
        let command_line = argv.join(" ");

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own group so a timeout can take down grandchildren holding stdout.
            command.process_group(0);
        }
        let mut child = command
            .spawn()
            .map_err(|e| TestRunError::SpawnFailed {
                command: command_line.clone(),
                message: e.to_string(),
            })?;

        let mut stdout = child.stdout.take().ok_or_else(|| TestRunError::Io {
            message: "stdout not captured".to_string(),
        })?;
        let reader = thread::spawn(move || {
            let mut buf = String::new();
            let _ = stdout.read_to_string(&mut buf);
            buf
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    kill_tree(&mut child);
                    let _ = child.wait();
                    // The reader is detached: a straggler that escaped the
                    // group may still hold the pipe open.
                    drop(reader);
                    tracing::warn!(unit = %unit, command = %command_line, "test run timed out");
                    return Err(TestRunError::Timeout {
                        unit: unit.to_string(),
                        timeout_secs: self.timeout.as_secs(),
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    kill_tree(&mut child);
                    return Err(TestRunError::Io {
                        message: e.to_string(),
                    });
                }
            }
        };

        let output = reader.join().map_err(|_| TestRunError::Io {
            message: "stdout reader panicked".to_string(),
        })?;
        let coverage = self.parse_coverage(&output);
        tracing::debug!(unit = %unit, success = status.success(), ?coverage, "tests finished");
        Ok(TestOutcome {
            pass: status.success(),
            coverage,
            timed_out: false,
        })
    }
}

/// Kills the child's whole process group, falling back to the child alone.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let killed = Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if killed {
            return;
        }
    }
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(argv: &[&str], timeout: Duration) -> CommandTestRunner {
        CommandTestRunner::new(
            std::env::temp_dir(),
            argv.iter().map(|s| s.to_string()).collect(),
            timeout,
            DEFAULT_COVERAGE_REGEX,
        )
        .unwrap()
    }

    #[test]
    fn test_parses_coverage_table() {
        let r = runner(&["true"], Duration::from_secs(5));
        let out = "File | % Stmts\n a.ts | 50 |\nAll files |   87.5 |   80 |\n";
        assert_eq!(r.parse_coverage(out), Some(87.5));
        assert_eq!(r.parse_coverage("no table"), None);
    }

    #[test]
    fn test_rejects_regex_without_group() {
        let err = CommandTestRunner::new(".", vec!["true".into()], Duration::from_secs(1), r"\d+");
        assert!(matches!(err, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn test_rejects_empty_command() {
        let err = CommandTestRunner::new(".", Vec::new(), Duration::from_secs(1), DEFAULT_COVERAGE_REGEX);
        assert!(err.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_unit_placeholder_and_exit_status() {
        let r = runner(
            &["sh", "-c", "echo 'All files | 91.2 |' && test \"$0\" = src/a.ts", "{unit}"],
            Duration::from_secs(10),
        );
        let outcome = r.run_tests(&UnitRef::new("src/a.ts")).unwrap();
        assert!(outcome.pass);
        assert_eq!(outcome.coverage, Some(91.2));

        let outcome = r.run_tests(&UnitRef::new("src/b.ts")).unwrap();
        assert!(!outcome.pass);
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_the_command() {
        let r = runner(&["sleep", "5"], Duration::from_millis(200));
        let started = Instant::now();
        let err = r.run_tests(&UnitRef::new("a.ts")).unwrap_err();
        assert!(matches!(err, TestRunError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_background_children() {
        let r = runner(&["sh", "-c", "sleep 6 & sleep 6"], Duration::from_secs(1));
        let started = Instant::now();
        let err = r.run_tests(&UnitRef::new("a.ts")).unwrap_err();
        assert!(matches!(err, TestRunError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_run_has_no_coverage() {
        let r = runner(&["true"], Duration::from_secs(5));
        let outcome = r.run_tests(&UnitRef::new("a.ts")).unwrap();
        assert!(outcome.pass);
        assert_eq!(outcome.coverage, None);
    }

    #[test]
    fn test_missing_program_is_spawn_failure() {
        let r = runner(&["definitely-not-a-real-program-canon"], Duration::from_secs(1));
        assert!(matches!(
            r.run_tests(&UnitRef::new("a.ts")),
            Err(TestRunError::SpawnFailed { .. })
        ));
    }
}
