use std::io::{BufRead, BufReader, Write};
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use crate::cmd::command::CommandError::{ExecutionError, ExitStatusError, TimeoutError};
use crate::errors;

use itertools::Itertools;
use std::time::{Duration, Instant};
use timeout_readwrite::TimeoutReader;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("Error while executing command")]
    ExecutionError(#[from] Error),

    #[error("Command terminated with a non success exit status code: {0}")]
    ExitStatusError(ExitStatus),

    #[error("Command killed due to timeout: {0}")]
    TimeoutError(String),
}

#[derive(Debug, Clone)]
pub enum AbortReason {
    Timeout(Duration),
}

pub struct CommandKiller<'a> {
    should_abort: Box<dyn Fn() -> Option<AbortReason> + 'a>,
}

impl<'a> CommandKiller<'a> {
    pub fn never() -> CommandKiller<'a> {
        CommandKiller {
            should_abort: Box::new(|| None),
        }
    }

    pub fn from_timeout(timeout: Duration) -> CommandKiller<'a> {
        let now = Instant::now();
        CommandKiller {
            should_abort: Box::new(move || {
                if now.elapsed() >= timeout {
                    return Some(AbortReason::Timeout(timeout));
                }

                None
            }),
        }
    }

    pub fn should_abort(&self) -> Option<AbortReason> {
        (self.should_abort)()
    }
}

pub struct VendorCommand {
    command: Command,
    stdin: Option<String>,
}

impl VendorCommand {
    pub fn new<P: AsRef<Path>>(binary: P, args: &[&str], envs: &[(&str, &str)]) -> VendorCommand {
        let mut command = Command::new(binary.as_ref().as_os_str());
        command.args(args);

        envs.iter().for_each(|(k, v)| {
            command.env(k, v);
        });

        VendorCommand { command, stdin: None }
    }

    /// Content written to the process stdin once spawned, for CLIs reading secrets from it.
    pub fn set_stdin(&mut self, content: &str) {
        self.stdin = Some(content.to_string());
    }

    pub fn set_current_dir<P: AsRef<Path>>(&mut self, root_dir: P) {
        self.command.current_dir(root_dir);
    }

    fn kill(cmd_handle: &mut Child) {
        let _ = cmd_handle
            .kill() //Fire
            .map(|_| cmd_handle.wait())
            .map_err(|err| error!("Cannot kill process {:?} {}", cmd_handle, err));
    }

    /// Runs the command, streaming its output lines until it exits or `abort_notifier` fires.
    pub fn exec_with_abort<STDOUT, STDERR>(
        &mut self,
        stdout_output: &mut STDOUT,
        stderr_output: &mut STDERR,
        abort_notifier: &CommandKiller,
    ) -> Result<(), CommandError>
    where
        STDOUT: FnMut(String),
        STDERR: FnMut(String),
    {
        // args may carry tokens, only the program is logged
        info!("command: {:?}", self.command.get_program());
        let mut cmd_handle = self
            .command
            .stdin(match self.stdin {
                Some(_) => Stdio::piped(),
                None => Stdio::null(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ExecutionError)?;

        if let Some(content) = &self.stdin {
            // stdin is closed when dropped at the end of this block
            let mut stdin = cmd_handle
                .stdin
                .take()
                .ok_or_else(|| ExecutionError(Error::new(ErrorKind::BrokenPipe, "Cannot get stdin for command")))?;
            stdin.write_all(content.as_bytes()).map_err(ExecutionError)?;
        }

        // Read stdout/stderr until timeout is reached
        let reader_timeout = Duration::from_secs(1);
        let stdout = cmd_handle
            .stdout
            .take()
            .ok_or_else(|| ExecutionError(Error::new(ErrorKind::BrokenPipe, "Cannot get stdout for command")))?;
        let mut stdout_reader = BufReader::new(TimeoutReader::new(stdout, reader_timeout)).lines();

        let stderr = cmd_handle
            .stderr
            .take()
            .ok_or_else(|| ExecutionError(Error::new(ErrorKind::BrokenPipe, "Cannot get stderr for command")))?;
        let mut stderr_reader = BufReader::new(TimeoutReader::new(
            stderr,
            Duration::from_secs(0), // don't block on stderr
        ))
        .lines();

        let mut stdout_closed = false;
        let mut stderr_closed = false;
        while !stdout_closed || !stderr_closed {
            if abort_notifier.should_abort().is_some() {
                break;
            }

            while !stdout_closed {
                let line = match stdout_reader.next() {
                    Some(line) => line,
                    None => {
                        stdout_closed = true;
                        break;
                    }
                };

                match line {
                    Err(ref err) if err.kind() == ErrorKind::TimedOut => break,
                    Ok(line) => stdout_output(line),
                    Err(err) => {
                        error!("Error on stdout of cmd {:?}: {:?}", self.command.get_program(), err);
                        stdout_closed = true;
                        break;
                    }
                }

                if abort_notifier.should_abort().is_some() {
                    stdout_closed = true;
                    stderr_closed = true;
                    break;
                }
            }

            while !stderr_closed {
                let line = match stderr_reader.next() {
                    Some(line) => line,
                    None => {
                        stderr_closed = true;
                        break;
                    }
                };

                match line {
                    Err(ref err) if err.kind() == ErrorKind::TimedOut => break,
                    Ok(line) => stderr_output(line),
                    Err(err) => {
                        error!("Error on stderr of cmd {:?}: {:?}", self.command.get_program(), err);
                        stderr_closed = true;
                        break;
                    }
                }

                if abort_notifier.should_abort().is_some() {
                    stdout_closed = true;
                    stderr_closed = true;
                    break;
                }
            }
        }

        // Wait for the process to exit before reaching the timeout
        // If not, we just kill it
        let exit_status;
        loop {
            match cmd_handle.try_wait() {
                Ok(Some(status)) => {
                    exit_status = status;
                    break;
                }
                Ok(None) => {
                    if let Some(AbortReason::Timeout(timeout)) = abort_notifier.should_abort() {
                        let msg = format!(
                            "Killing process {:?} due to timeout {}s reached",
                            self.command.get_program(),
                            timeout.as_secs()
                        );
                        warn!("{}", msg);
                        Self::kill(&mut cmd_handle);
                        return Err(TimeoutError(msg));
                    }
                }
                Err(err) => return Err(ExecutionError(err)),
            };

            std::thread::sleep(Duration::from_millis(100));
        }

        if !exit_status.success() {
            debug!(
                "command: {:?} terminated with error exit status {:?}",
                self.command.get_program(),
                exit_status
            );
            return Err(ExitStatusError(exit_status));
        }

        Ok(())
    }
}

/// VendorInvocation: one vendor CLI call, `(command, argv, {cwd, env, token})`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VendorInvocation {
    pub binary: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
    pub stdin: Option<String>,
    /// token: vendor token, passed through `token_env_var` so it never shows up in argv.
    pub token: Option<String>,
    pub token_env_var: Option<String>,
}

impl VendorInvocation {
    pub fn new(binary: &str, args: &[&str]) -> Self {
        VendorInvocation {
            binary: binary.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_cwd<P: AsRef<Path>>(mut self, cwd: P) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_stdin(mut self, content: &str) -> Self {
        self.stdin = Some(content.to_string());
        self
    }

    pub fn with_token(mut self, env_var: &str, token: Option<&str>) -> Self {
        if let Some(token) = token {
            self.token = Some(token.to_string());
            self.token_env_var = Some(env_var.to_string());
        }
        self
    }

    /// Every env var given to the process, token included.
    pub fn all_envs(&self) -> Vec<(String, String)> {
        let mut envs = self.envs.clone();
        if let (Some(key), Some(token)) = (&self.token_env_var, &self.token) {
            envs.push((key.clone(), token.clone()));
        }
        envs
    }

    pub fn to_command_line(&self) -> String {
        format!("{} {}", self.binary, self.args.join(" "))
    }
}

/// CommandOutput: `{exitCode, stdout, stderr}` of a finished vendor call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: &str) -> Self {
        CommandOutput {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }
}

/// VendorCli: the boundary to the external vendor command line clients.
/// Any non zero exit code or spawn failure is surfaced as a typed error carrying stderr.
pub trait VendorCli: Send + Sync {
    fn run(&self, invocation: &VendorInvocation) -> Result<CommandOutput, errors::CommandError>;
}

/// ProcessVendorCli: runs vendor CLIs as child processes, killing them once `timeout` is reached.
#[derive(Clone, Debug)]
pub struct ProcessVendorCli {
    timeout: Duration,
}

impl ProcessVendorCli {
    pub fn new(timeout: Duration) -> Self {
        ProcessVendorCli { timeout }
    }
}

impl VendorCli for ProcessVendorCli {
    fn run(&self, invocation: &VendorInvocation) -> Result<CommandOutput, errors::CommandError> {
        let args = invocation.args.iter().map(|a| a.as_str()).collect::<Vec<_>>();
        let envs = invocation.all_envs();
        let envs_ref = envs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect::<Vec<_>>();

        let mut cmd = VendorCommand::new(&invocation.binary, &args, &envs_ref);
        if let Some(cwd) = &invocation.cwd {
            cmd.set_current_dir(cwd);
        }
        if let Some(stdin) = &invocation.stdin {
            cmd.set_stdin(stdin);
        }

        let mut stdout: Vec<String> = Vec::new();
        let mut stderr: Vec<String> = Vec::new();
        let result = cmd.exec_with_abort(
            &mut |line| stdout.push(line),
            &mut |line| stderr.push(line),
            &CommandKiller::from_timeout(self.timeout),
        );

        let output = CommandOutput {
            exit_code: match &result {
                Ok(_) => Some(0),
                Err(ExitStatusError(status)) => status.code(),
                Err(_) => None,
            },
            stdout: stdout.iter().join("\n"),
            stderr: stderr.iter().join("\n"),
        };

        match result {
            Ok(_) => Ok(output),
            Err(err) => Err(errors::CommandError::new_from_command_line(
                format!("`{}` failed: {}", invocation.binary, err),
                invocation.binary.clone(),
                invocation.args.clone(),
                envs,
                Some(output.stdout).filter(|s| !s.is_empty()),
                Some(output.stderr).filter(|s| !s.is_empty()),
            )),
        }
    }
}
