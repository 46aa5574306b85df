use std::fmt;

/// External command-line tools shipwright drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// Container build tool and registry client
    Docker,
    /// Registry credentials and orchestration control plane
    Aws,
}

impl Tool {
    pub fn program(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Aws => "aws",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{tool} CLI not found; is it installed and on PATH?")]
    NotFound { tool: Tool, source: std::io::Error },

    #[error("{tool} command failed: {args:?}\n{stderr}")]
    CommandFailed {
        tool: Tool,
        args: Vec<String>,
        stdout: String,
        stderr: String,
    },

    #[error("{tool} output was not valid UTF-8")]
    InvalidUtf8 {
        tool: Tool,
        source: std::string::FromUtf8Error,
    },

    #[error("failed to write to {tool} stdin")]
    StdinWrite { tool: Tool, source: std::io::Error },
}

impl ToolError {
    /// Everything the tool printed, for diagnostics.
    pub fn output(&self) -> Option<String> {
        match self {
            Self::CommandFailed { stdout, stderr, .. } => {
                let combined = [stdout.trim(), stderr.trim()]
                    .iter()
                    .filter(|s| !s.is_empty())
                    .copied()
                    .collect::<Vec<_>>()
                    .join("\n");
                Some(combined)
            }
            _ => None,
        }
    }

    /// The tool's error stream, if it ran.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
