use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

static EXPECTED_STDOUT_FILE: &str = "expected-stdout";
static EXPECTED_STDERR_FILE: &str = "expected-stderr";

struct TestCase {
    dir: PathBuf,
    name: String,
    args: String,
    expected_stdout: Option<String>,
    expected_stderr: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let workbench = build_topology_workbench()?;

    let mut test_cases = Vec::new();
    let mut test_dirs: Vec<_> = std::fs::read_dir("golden-tests/tests")
        .context("golden tests root directory not found")?
        .collect::<Result<_, _>>()?;
    test_dirs.sort_by_key(|entry| entry.path());

    for entry in test_dirs {
        let path = entry.path();

        if !path.is_dir() {
            println!(
                "skipping path `{}` because it's not a directory",
                path.display()
            );
            continue;
        }

        let args_path = path.join("args");
        let args = std::fs::read_to_string(&args_path)
            .with_context(|| format!("no `args` file found at `{}`", args_path.display()))?;

        test_cases.push(TestCase {
            name: path.display().to_string(),
            expected_stdout: read_expected(&path, EXPECTED_STDOUT_FILE)?,
            expected_stderr: read_expected(&path, EXPECTED_STDERR_FILE)?,
            dir: path,
            args,
        })
    }

    let mut errored = false;
    for test_case in test_cases {
        let name = test_case.name.clone();
        if let Err(e) = run_topology_workbench(&workbench, test_case) {
            println!("Error running golden test `{name}`");
            match e {
                TestError::Internal(e) => println!("{e:?}"),
                TestError::Compare(e) => {
                    if let Some(diff) = e.stderr_diff {
                        println!("Expected stderr differs from actual stderr:\n{diff}\n");
                    }

                    if let Some(diff) = e.stdout_diff {
                        println!("Expected stdout differs from actual stdout:\n{diff}");
                    }
                }
            }
            errored = true;
        } else {
            println!("{name}: ✅");
        }
    }

    if errored {
        bail!("one or more golden tests failed");
    }

    Ok(())
}

fn read_expected(dir: &Path, file_name: &str) -> anyhow::Result<Option<String>> {
    let path = dir.join(file_name);
    if !path.is_file() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    Ok(Some(contents))
}

enum TestError {
    Internal(anyhow::Error),
    Compare(CompareError),
}

struct CompareError {
    stdout_diff: Option<String>,
    stderr_diff: Option<String>,
}

/// Builds the workbench once, so cargo's own output never ends up in a test's stderr
fn build_topology_workbench() -> anyhow::Result<PathBuf> {
    let status = Command::new("cargo")
        .arg("build")
        .arg("--release")
        .arg("--bin")
        .arg("topology-workbench")
        .status()
        .context("failed to run cargo")?;
    if !status.success() {
        bail!("failed to build topology-workbench");
    }

    let target_dir = std::env::var_os("CARGO_TARGET_DIR").unwrap_or_else(|| "target".into());
    Ok(PathBuf::from(target_dir)
        .join("release")
        .join("topology-workbench"))
}

fn run_topology_workbench(workbench: &Path, test_case: TestCase) -> Result<(), TestError> {
    let workbench_args = test_case.args.split_whitespace();
    let command = Command::new(workbench)
        .args(workbench_args)
        // Only errors reach stderr, so failing cases can be compared too
        .env("RUST_LOG", "off")
        .env_remove("RUST_BACKTRACE")
        .env_remove("RUST_LIB_BACKTRACE")
        .output()
        .context("topology-workbench process crashed")
        .map_err(TestError::Internal)?;

    let stdout = String::from_utf8_lossy(&command.stdout);
    let stderr = String::from_utf8_lossy(&command.stderr);

    let stdout_diff = compare_or_record(
        &test_case.dir,
        EXPECTED_STDOUT_FILE,
        test_case.expected_stdout,
        &stdout,
    )?;
    let stderr_diff = compare_or_record(
        &test_case.dir,
        EXPECTED_STDERR_FILE,
        test_case.expected_stderr,
        &stderr,
    )?;

    if stdout_diff.is_some() || stderr_diff.is_some() {
        Err(TestError::Compare(CompareError {
            stdout_diff,
            stderr_diff,
        }))
    } else {
        Ok(())
    }
}

/// Returns the diff against the expected output, recording the actual output when there is no
/// expectation yet
fn compare_or_record(
    dir: &Path,
    file_name: &str,
    expected: Option<String>,
    actual: &str,
) -> Result<Option<String>, TestError> {
    match expected {
        Some(expected) if expected != actual => Ok(Some(diff::diff_to_string(&expected, actual))),
        Some(_) => Ok(None),
        None => {
            std::fs::write(dir.join(file_name), actual.as_bytes())
                .with_context(|| format!("failed to persist {file_name}"))
                .map_err(TestError::Internal)?;
            Ok(None)
        }
    }
}

mod diff {
    use console::{Style, style};
    use similar::{ChangeTag, TextDiff};
    use std::fmt::{self, Write};

    struct Line(Option<usize>);

    impl fmt::Display for Line {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self.0 {
                None => write!(f, "    "),
                Some(idx) => write!(f, "{:<4}", idx + 1),
            }
        }
    }

    pub fn diff_to_string(old: &str, new: &str) -> String {
        let mut output = String::new();
        let diff = TextDiff::from_lines(old, new);

        for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
            if idx > 0 {
                _ = writeln!(output, "{:-^1$}", "-", 80);
            }
            for op in group {
                for change in diff.iter_inline_changes(op) {
                    let (sign, s) = match change.tag() {
                        ChangeTag::Delete => ("-", Style::new().red()),
                        ChangeTag::Insert => ("+", Style::new().green()),
                        ChangeTag::Equal => (" ", Style::new().dim()),
                    };
                    _ = write!(
                        output,
                        "{}{} |{}",
                        style(Line(change.old_index())).dim(),
                        style(Line(change.new_index())).dim(),
                        s.apply_to(sign).bold(),
                    );
                    for (emphasized, value) in change.iter_strings_lossy() {
                        if emphasized {
                            _ = write!(output, "{}", s.apply_to(value).underlined().on_black());
                        } else {
                            _ = write!(output, "{}", s.apply_to(value));
                        }
                    }
                    if change.missing_newline() {
                        _ = writeln!(output);
                    }
                }
            }
        }

        output
    }
}
