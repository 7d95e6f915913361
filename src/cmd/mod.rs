pub mod aws;
pub mod command;
pub mod structs;
pub mod supabase;
pub mod turso;
pub mod vercel;

use crate::cmd::command::{CommandOutput, VendorCli, VendorInvocation};
use crate::errors::CommandError;
use retry::OperationResult;
use retry::delay::Fibonacci;

/// Runs an idempotent read against a vendor, retrying transient failures a few times.
/// Mutating calls are never retried here.
pub(crate) fn run_with_retry(cli: &dyn VendorCli, invocation: &VendorInvocation) -> Result<CommandOutput, CommandError> {
    match retry::retry(Fibonacci::from_millis(250).take(3), || match cli.run(invocation) {
        Ok(output) => OperationResult::Ok(output),
        Err(err) => {
            warn!(
                "`{}` failed, let's retry: {}",
                invocation.to_command_line(),
                err.message_safe()
            );
            OperationResult::Retry(err)
        }
    }) {
        Ok(output) => Ok(output),
        Err(retry::Error { error, .. }) => Err(error),
    }
}

/// First non empty stdout line, vendors often print a trailing banner.
pub(crate) fn first_line(output: &CommandOutput) -> Option<String> {
    output
        .stdout
        .lines()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .map(|l| l.to_string())
}

#[cfg(test)]
pub(crate) mod fake {
    use crate::cmd::command::{CommandOutput, VendorCli, VendorInvocation};
    use crate::errors::CommandError;
    use std::sync::Mutex;

    /// FakeVendorCli: answers vendor invocations by command line prefix and records every call.
    #[derive(Default)]
    pub struct FakeVendorCli {
        responses: Vec<(String, Result<CommandOutput, String>)>,
        pub calls: Mutex<Vec<VendorInvocation>>,
    }

    impl FakeVendorCli {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(mut self, command_line_prefix: &str, stdout: &str) -> Self {
            self.responses
                .push((command_line_prefix.to_string(), Ok(CommandOutput::success(stdout))));
            self
        }

        pub fn fail_on(mut self, command_line_prefix: &str, stderr: &str) -> Self {
            self.responses
                .push((command_line_prefix.to_string(), Err(stderr.to_string())));
            self
        }

        pub fn command_lines(&self) -> Vec<String> {
            self.calls
                .lock()
                .expect("poisoned lock")
                .iter()
                .map(|c| c.to_command_line())
                .collect()
        }
    }

    impl VendorCli for FakeVendorCli {
        fn run(&self, invocation: &VendorInvocation) -> Result<CommandOutput, CommandError> {
            self.calls.lock().expect("poisoned lock").push(invocation.clone());
            let command_line = invocation.to_command_line();

            match self
                .responses
                .iter()
                .find(|(prefix, _)| command_line.starts_with(prefix.as_str()))
            {
                Some((_, Ok(output))) => Ok(output.clone()),
                Some((_, Err(stderr))) => Err(CommandError::new_from_command_line(
                    format!("`{}` failed", invocation.binary),
                    invocation.binary.clone(),
                    invocation.args.clone(),
                    vec![],
                    None,
                    Some(stderr.clone()),
                )),
                None => Ok(CommandOutput::success("")),
            }
        }
    }
}
