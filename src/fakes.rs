//! Scriptable command runner for unit tests

use crate::security::command_executor::{
    CommandError, CommandOutput, CommandRunner, ExecutionContext, Invocation,
};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::sync::Mutex;

/// One invocation as the process would have seen it
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    /// Program followed by exposed arguments
    pub argv: Vec<String>,
    /// Masked rendering, as it would appear in logs
    pub display: String,
    pub stdin: Option<String>,
}

enum Outcome {
    Exit { code: i32, output: String },
    Error(fn() -> CommandError),
}

struct Rule {
    pattern: String,
    outcome: Outcome,
}

/// Records every invocation and succeeds unless a rule matches.
///
/// Rules match on the masked rendering of the invocation; the first matching
/// rule decides the outcome.
#[derive(Default)]
pub(crate) struct RecordingRunner {
    calls: Mutex<Vec<RecordedCall>>,
    rules: Vec<Rule>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invocations containing `pattern` exit with `code` and print `output`
    pub fn fail_when(mut self, pattern: &str, code: i32, output: &str) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            outcome: Outcome::Exit {
                code,
                output: output.to_string(),
            },
        });
        self
    }

    /// Invocations containing `pattern` return the error built by `error`
    pub fn error_when(mut self, pattern: &str, error: fn() -> CommandError) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            outcome: Outcome::Error(error),
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Masked renderings of every recorded call, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.display).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        ctx: &ExecutionContext,
    ) -> Result<CommandOutput, CommandError> {
        if let Some(interruption) = ctx.interruption() {
            return Err(interruption.into());
        }

        let display = invocation.to_string();
        let mut argv = vec![invocation.program().to_string()];
        argv.extend(invocation.exposed_args().into_iter().map(str::to_string));

        self.calls.lock().unwrap().push(RecordedCall {
            argv,
            display: display.clone(),
            stdin: invocation
                .stdin_payload()
                .map(|payload| payload.expose_secret().to_string()),
        });

        match self.rules.iter().find(|rule| display.contains(&rule.pattern)) {
            Some(Rule {
                outcome: Outcome::Exit { code, output },
                ..
            }) => Ok(CommandOutput {
                success: false,
                exit_code: Some(*code),
                combined: output.clone(),
            }),
            Some(Rule {
                outcome: Outcome::Error(error),
                ..
            }) => Err(error()),
            None => Ok(CommandOutput {
                success: true,
                exit_code: Some(0),
                combined: String::new(),
            }),
        }
    }
}
