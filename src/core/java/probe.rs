use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument};

pub const LABEL_TIMEOUT: &str = "timeout";
pub const LABEL_UNKNOWN: &str = "unknown";

/// Executable in `dir` that prints a version banner. `javaw` is skipped
/// since it has no console.
pub fn console_executable(dir: &Path, executables: &[String]) -> Option<PathBuf> {
    executables
        .iter()
        .filter(|name| !name.to_ascii_lowercase().starts_with("javaw"))
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Run `java -version` in `dir` and label the result `"Java N"`,
/// `"timeout"`, or `"unknown"`.
#[instrument(skip(executables))]
pub async fn probe_java_dir(dir: &Path, executables: &[String], timeout: Duration) -> String {
    let Some(java) = console_executable(dir, executables) else {
        return LABEL_UNKNOWN.to_string();
    };

    let child = Command::new(&java)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!("Version check of {:?} failed: {}", java, e);
            return LABEL_UNKNOWN.to_string();
        }
        Err(_) => return LABEL_TIMEOUT.to_string(),
    };

    // The banner goes to stderr; some wrappers print it on stdout.
    let banner = if output.stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).to_string()
    } else {
        String::from_utf8_lossy(&output.stderr).to_string()
    };

    parse_version_label(&banner).unwrap_or_else(|| LABEL_UNKNOWN.to_string())
}

/// `version "17.0.8"` -> `Java 17`, `version "1.8.0_392"` -> `Java 8`.
pub fn parse_version_label(banner: &str) -> Option<String> {
    let lower = banner.to_ascii_lowercase();
    let start = lower.find("version \"")? + "version \"".len();
    let quoted = &lower[start..];
    let version = &quoted[..quoted.find('"')?];

    let mut parts = version.split(['.', '_', '-', '+']);
    let major = leading_digits(parts.next()?)?;
    if major != "1" {
        return Some(format!("Java {major}"));
    }
    let legacy = parts.next().and_then(leading_digits).unwrap_or("8");
    Some(format!("Java {legacy}"))
}

/// Numeric major from a `"Java N"` label.
pub fn label_major(label: &str) -> Option<u32> {
    label.strip_prefix("Java ")?.parse().ok()
}

fn leading_digits(s: &str) -> Option<&str> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    (end > 0).then(|| &s[..end])
}
