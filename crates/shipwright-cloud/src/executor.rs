use crate::tool::{Tool, ToolError};

/// Abstraction over external CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks
/// or scripted fakes.
#[allow(async_fn_in_trait)]
pub trait ToolExecutor: Send + Sync {
    /// Execute a command and capture stdout.
    async fn exec(&self, tool: Tool, args: &[String]) -> Result<String, ToolError>;

    /// Execute a command with data piped to stdin.
    async fn exec_with_stdin(
        &self,
        tool: Tool,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, ToolError>;
}

impl<T: ToolExecutor> ToolExecutor for &T {
    async fn exec(&self, tool: Tool, args: &[String]) -> Result<String, ToolError> {
        (**self).exec(tool, args).await
    }

    async fn exec_with_stdin(
        &self,
        tool: Tool,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, ToolError> {
        (**self).exec_with_stdin(tool, args, stdin_data).await
    }
}

/// Runs the real CLIs as child processes.
pub struct RealExecutor;

impl ToolExecutor for RealExecutor {
    async fn exec(&self, tool: Tool, args: &[String]) -> Result<String, ToolError> {
        use std::process::Stdio;

        tracing::debug!(%tool, ?args, "exec");

        let output = tokio::process::Command::new(tool.program())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ToolError::NotFound { tool, source: e })?;

        finish(tool, args, output)
    }

    async fn exec_with_stdin(
        &self,
        tool: Tool,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, ToolError> {
        use std::process::Stdio;
        use tokio::io::AsyncWriteExt;

        tracing::debug!(%tool, ?args, "exec with stdin");

        let mut child = tokio::process::Command::new(tool.program())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::NotFound { tool, source: e })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(stdin_data)
                .await
                .map_err(|e| ToolError::StdinWrite { tool, source: e })?;
            stdin
                .shutdown()
                .await
                .map_err(|e| ToolError::StdinWrite { tool, source: e })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ToolError::NotFound { tool, source: e })?;

        finish(tool, args, output)
    }
}

fn finish(tool: Tool, args: &[String], output: std::process::Output) -> Result<String, ToolError> {
    if output.status.success() {
        String::from_utf8(output.stdout).map_err(|e| ToolError::InvalidUtf8 { tool, source: e })
    } else {
        Err(ToolError::CommandFailed {
            tool,
            args: args.to_vec(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Owned argument vector from string literals.
pub(crate) fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}
