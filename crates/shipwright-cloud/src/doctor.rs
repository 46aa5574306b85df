use std::fmt;

use crate::executor::{ToolExecutor, args};
use crate::tool::Tool;

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub docker: CheckResult,
    pub aws: CheckResult,
    pub identity: CheckResult,
    pub config_file: CheckResult,
    pub templates: Vec<NamedCheck>,
}

impl DoctorReport {
    pub fn all_passed(&self) -> bool {
        self.docker.passed
            && self.aws.passed
            && self.identity.passed
            && self.config_file.passed
            && self.templates.iter().all(|t| t.result.passed)
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |f: &mut fmt::Formatter<'_>, label: &str, r: &CheckResult| {
            writeln!(f, "  [{}] {label:<18} {}", r.icon(), r.detail)
        };

        writeln!(f, "Shipwright Doctor")?;
        writeln!(f, "─────────────────")?;
        row(f, "docker", &self.docker)?;
        row(f, "aws", &self.aws)?;
        row(f, "caller identity", &self.identity)?;
        row(f, "shipwright.toml", &self.config_file)?;
        for t in &self.templates {
            row(f, &t.name, &t.result)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn ok(detail: &str) -> Self {
        Self {
            passed: true,
            detail: detail.to_owned(),
        }
    }

    pub fn fail(detail: &str) -> Self {
        Self {
            passed: false,
            detail: detail.to_owned(),
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.passed { "OK" } else { "NG" }
    }
}

#[derive(Debug, Clone)]
pub struct NamedCheck {
    pub name: String,
    pub result: CheckResult,
}

/// Run all tool checks without early return.
///
/// `expected_account` is compared against the caller identity when given.
/// Config and template checks are filled in by the caller.
pub async fn doctor<E: ToolExecutor>(executor: &E, expected_account: Option<&str>) -> DoctorReport {
    let mut report = DoctorReport::default();

    // 1. docker
    match executor
        .exec(
            Tool::Docker,
            &args(["version", "--format", "{{.Client.Version}}"]),
        )
        .await
    {
        Ok(v) => report.docker = CheckResult::ok(v.trim()),
        Err(e) => report.docker = CheckResult::fail(&e.to_string()),
    }

    // 2. aws CLI, e.g. "aws-cli/2.15.0 Python/3.11.6 Linux/6.5 exe/x86_64"
    match executor.exec(Tool::Aws, &args(["--version"])).await {
        Ok(v) => {
            let version = v.split_whitespace().next().unwrap_or(v.trim());
            report.aws = CheckResult::ok(version);
        }
        Err(e) => {
            report.aws = CheckResult::fail(&e.to_string());
            report.identity = CheckResult::fail("aws CLI unavailable");
            return report;
        }
    }

    // 3. caller identity
    match executor
        .exec(
            Tool::Aws,
            &args([
                "sts",
                "get-caller-identity",
                "--query",
                "Account",
                "--output",
                "text",
            ]),
        )
        .await
    {
        Ok(account) => {
            let account = account.trim();
            report.identity = match expected_account {
                Some(expected) if expected != account => CheckResult::fail(&format!(
                    "account {account} does not match AWS_ACCOUNT_ID {expected}"
                )),
                _ => CheckResult::ok(account),
            };
        }
        Err(e) => {
            tracing::debug!(error = %e, "caller identity lookup failed");
            report.identity = CheckResult::fail("not authenticated (run: aws configure)");
        }
    }

    report
}
