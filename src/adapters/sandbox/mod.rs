//! Test sandboxes.
//!
//! Both sandboxes run the stack's test command through `sh -c` and report
//! their own breakage (spawn failure, timeout, daemon error) as an infra
//! error rather than a test failure.

mod docker;
mod local;

pub use docker::DockerSandbox;
pub use local::LocalSandbox;

use std::process::Output;

/// Exit code `docker run` uses for its own errors.
pub const DOCKER_RUN_ERROR_EXIT_CODE: i32 = 125;

/// `sh -c '<inner>'` becomes `<inner>`; anything else is returned as is.
pub fn unwrap_shell_command(command: &str) -> String {
    let trimmed = command.trim();
    let Some(rest) = trimmed.strip_prefix("sh -c ") else {
        return trimmed.to_string();
    };

    let rest = rest.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = rest
            .strip_prefix(quote)
            .and_then(|r| r.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    rest.to_string()
}

/// stdout followed by stderr, lossily decoded.
fn combined_output(output: &Output) -> String {
    let mut logs = String::from_utf8_lossy(&output.stdout).into_owned();
    logs.push_str(&String::from_utf8_lossy(&output.stderr));
    logs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_shell_command() {
        assert_eq!(unwrap_shell_command("sh -c 'npm ci && npm test'"), "npm ci && npm test");
        assert_eq!(unwrap_shell_command("sh -c \"pytest -v\""), "pytest -v");
        assert_eq!(unwrap_shell_command("sh -c pytest"), "pytest");
        assert_eq!(unwrap_shell_command("  mvn test -q "), "mvn test -q");
    }
}
