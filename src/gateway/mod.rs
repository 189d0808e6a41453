//! External state gateway
//!
//! Everything that touches the outside world goes through here: running `pcs`
//! and `crm_mon`, reading the CIB from the live cluster or from a file, and
//! pushing or writing a modified CIB back. Commands are described as argv
//! vectors by the pure builders in [`crate::resource::commands`]; this module
//! only executes them.

pub mod mock;

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::cib::{CibError, ConfigDocument};
use crate::config::ToolPaths;

/// stderr signature of a push rejected because the CIB moved on meanwhile
pub const PUSH_CONFLICT_SIGNATURE: &str = "pushed configuration is older than existing one";

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A command that ran and exited non-zero, with everything it printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandFailure {
    pub fn new(command: impl Into<String>, output: CommandOutput) -> Self {
        Self {
            command: command.into(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command '{}' exited with code {}",
            self.command, self.exit_code
        )?;
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {}", stderr)?;
        }
        Ok(())
    }
}

/// Errors from running commands or moving CIB documents around
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to execute '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("External {0}")]
    CommandFailed(CommandFailure),

    #[error(
        "CIB push rejected because the cluster configuration changed concurrently; \
         retry, or set force_resource_update=true to push only the resources section: {0}"
    )]
    Conflict(CommandFailure),

    #[error("{} is not a file or doesn't exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse CIB from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: CibError,
    },
}

impl GatewayError {
    /// The failed command behind this error, if there is one
    pub fn failure(&self) -> Option<&CommandFailure> {
        match self {
            Self::CommandFailed(failure) | Self::Conflict(failure) => Some(failure),
            _ => None,
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Capability to run an external program given as argv
pub trait CommandRunner {
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput>;
}

/// Production runner backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            // killed by a signal
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// How much of the CIB a push replaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushScope {
    /// Whole document
    #[default]
    All,
    /// Only the `resources` section, leaving concurrent changes elsewhere alone
    Resources,
}

/// Where the CIB being converged lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CibTarget {
    Live,
    File(PathBuf),
}

impl CibTarget {
    pub fn file(&self) -> Option<&Path> {
        match self {
            Self::Live => None,
            Self::File(path) => Some(path),
        }
    }
}

/// Render argv as a single shell-quoted string for logs and error reports.
pub fn command_line(argv: &[String]) -> String {
    shell_words::join(argv)
}

/// `pcs cluster cib`
pub fn cib_fetch_args() -> Vec<String> {
    vec!["cluster".to_string(), "cib".to_string()]
}

/// `pcs cluster cib-push <file> [scope=resources]`
pub fn push_args(file: &Path, scope: PushScope) -> Vec<String> {
    let mut args = vec![
        "cluster".to_string(),
        "cib-push".to_string(),
        file.display().to_string(),
    ];
    if scope == PushScope::Resources {
        args.push("scope=resources".to_string());
    }
    args
}

/// Gateway to `pcs`/`crm_mon` and CIB files
pub struct Gateway<R> {
    runner: R,
    tools: ToolPaths,
}

impl<R: CommandRunner> Gateway<R> {
    pub fn new(runner: R, tools: ToolPaths) -> Self {
        Self { runner, tools }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run an argv and capture its output, whatever the exit code.
    pub fn run_external(&self, argv: Vec<String>) -> Result<(String, CommandOutput), GatewayError> {
        let command = command_line(&argv);
        debug!("Running: {}", command);
        let output = self
            .runner
            .run(&argv)
            .map_err(|source| GatewayError::Spawn {
                command: command.clone(),
                source,
            })?;
        debug!("'{}' exited with {}", command, output.exit_code);
        Ok((command, output))
    }

    /// Run `pcs` with the given arguments, whatever the exit code.
    pub fn pcs(&self, args: Vec<String>) -> Result<(String, CommandOutput), GatewayError> {
        let mut argv = vec![self.tools.pcs.clone()];
        argv.extend(args);
        self.run_external(argv)
    }

    /// Run `pcs` and turn a non-zero exit into an error.
    pub fn pcs_checked(&self, args: Vec<String>) -> Result<CommandOutput, GatewayError> {
        let (command, output) = self.pcs(args)?;
        if output.is_success() {
            Ok(output)
        } else {
            Err(GatewayError::CommandFailed(CommandFailure::new(command, output)))
        }
    }

    /// Raw output of `pcs --version`
    pub fn pcs_version(&self) -> Result<String, GatewayError> {
        self.pcs_checked(vec!["--version".to_string()])
            .map(|output| output.stdout)
    }

    /// Current cluster status document from `crm_mon`
    pub fn cluster_status(&self) -> Result<ConfigDocument, GatewayError> {
        let argv = vec![
            self.tools.crm_mon.clone(),
            "-1r".to_string(),
            "--as-xml".to_string(),
        ];
        let (command, output) = self.run_external(argv)?;
        if !output.is_success() {
            return Err(GatewayError::CommandFailed(CommandFailure::new(command, output)));
        }
        ConfigDocument::parse(&output.stdout).map_err(|source| GatewayError::Parse {
            origin: command,
            source,
        })
    }

    /// CIB of the running cluster
    pub fn fetch_live_config(&self) -> Result<ConfigDocument, GatewayError> {
        let output = self.pcs_checked(cib_fetch_args())?;
        ConfigDocument::parse(&output.stdout).map_err(|source| GatewayError::Parse {
            origin: "live cluster".to_string(),
            source,
        })
    }

    /// CIB stored in a file; the file must exist
    pub fn fetch_file_config(&self, path: &Path) -> Result<ConfigDocument, GatewayError> {
        if !path.is_file() {
            return Err(GatewayError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| GatewayError::io(path, e))?;
        ConfigDocument::parse(&content).map_err(|source| GatewayError::Parse {
            origin: path.display().to_string(),
            source,
        })
    }

    pub fn fetch(&self, target: &CibTarget) -> Result<ConfigDocument, GatewayError> {
        match target {
            CibTarget::Live => self.fetch_live_config(),
            CibTarget::File(path) => self.fetch_file_config(path),
        }
    }

    /// Push a full CIB document into the running cluster.
    ///
    /// The document is written to a temporary file that is removed when this
    /// call returns, whatever the outcome.
    pub fn push_live_config(
        &self,
        doc: &ConfigDocument,
        scope: PushScope,
    ) -> Result<(), GatewayError> {
        let mut snapshot = tempfile::Builder::new()
            .prefix("pcsctl-cib-")
            .suffix(".xml")
            .tempfile()
            .map_err(|e| GatewayError::io(&std::env::temp_dir(), e))?;
        snapshot
            .write_all(doc.to_xml_string().as_bytes())
            .and_then(|_| snapshot.flush())
            .map_err(|e| GatewayError::io(snapshot.path(), e))?;

        let (command, output) = self.pcs(push_args(snapshot.path(), scope))?;
        if output.is_success() {
            info!("Pushed CIB to cluster (scope: {:?})", scope);
            return Ok(());
        }

        let failure = CommandFailure::new(command, output);
        if failure.stderr.contains(PUSH_CONFLICT_SIGNATURE) {
            Err(GatewayError::Conflict(failure))
        } else {
            Err(GatewayError::CommandFailed(failure))
        }
    }

    /// Overwrite a CIB file with the given document.
    pub fn write_file_config(&self, doc: &ConfigDocument, path: &Path) -> Result<(), GatewayError> {
        std::fs::write(path, doc.to_xml_string()).map_err(|e| GatewayError::io(path, e))?;
        info!("Wrote CIB to {}", path.display());
        Ok(())
    }

    /// Store a document back where it came from.
    pub fn apply(
        &self,
        doc: &ConfigDocument,
        target: &CibTarget,
        scope: PushScope,
    ) -> Result<(), GatewayError> {
        match target {
            CibTarget::Live => self.push_live_config(doc, scope),
            CibTarget::File(path) => self.write_file_config(doc, path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockRunner;
    use super::*;
    use tempfile::NamedTempFile;

    const CIB: &str = "<cib><configuration><resources/></configuration></cib>\n";

    fn gateway(runner: MockRunner) -> Gateway<MockRunner> {
        Gateway::new(runner, ToolPaths::default())
    }

    #[test]
    fn test_fetch_live_config() {
        let gw = gateway(MockRunner::new().reply(CommandOutput::success(CIB)));
        let doc = gw.fetch_live_config().unwrap();
        assert!(doc.resources().is_ok());
        assert_eq!(gw.runner().executed_commands(), vec![vec!["pcs", "cluster", "cib"]]);
    }

    #[test]
    fn test_fetch_live_config_failure_keeps_output() {
        let gw = gateway(MockRunner::new().reply(CommandOutput {
            exit_code: 1,
            stdout: "partial".into(),
            stderr: "Error: unable to get cib".into(),
        }));
        let err = gw.fetch_live_config().unwrap_err();
        let failure = err.failure().unwrap();
        assert_eq!(failure.command, "pcs cluster cib");
        assert_eq!(failure.exit_code, 1);
        assert_eq!(failure.stdout, "partial");
        assert_eq!(failure.stderr, "Error: unable to get cib");
    }

    #[test]
    fn test_fetch_file_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CIB.as_bytes()).unwrap();
        let gw = gateway(MockRunner::new());
        assert!(gw.fetch_file_config(file.path()).is_ok());
        assert!(gw.runner().executed_commands().is_empty());
    }

    #[test]
    fn test_fetch_file_config_missing_or_malformed() {
        let gw = gateway(MockRunner::new());
        assert!(matches!(
            gw.fetch_file_config(Path::new("/nonexistent/cib.xml")),
            Err(GatewayError::FileNotFound(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"<cib><configuration>").unwrap();
        assert!(matches!(
            gw.fetch_file_config(file.path()),
            Err(GatewayError::Parse { .. })
        ));
    }

    #[test]
    fn test_push_uses_scope_and_cleans_up() {
        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let seen_in_handler = seen.clone();
        let gw = gateway(MockRunner::new().handle(move |argv| {
            let path = PathBuf::from(&argv[3]);
            let pushed = std::fs::read_to_string(&path).unwrap();
            *seen_in_handler.borrow_mut() = Some((path, pushed));
            CommandOutput::success("CIB updated")
        }));

        let doc = ConfigDocument::parse(CIB).unwrap();
        gw.push_live_config(&doc, PushScope::Resources).unwrap();

        let commands = gw.runner().executed_commands();
        assert_eq!(commands[0][..3], ["pcs", "cluster", "cib-push"]);
        assert_eq!(commands[0][4], "scope=resources");

        let (path, pushed) = seen.borrow_mut().take().unwrap();
        assert_eq!(pushed, CIB);
        assert!(!path.exists());
    }

    #[test]
    fn test_push_conflict_is_classified() {
        let gw = gateway(MockRunner::new().reply(CommandOutput::failure(
            1,
            "Error: Unable to push to the CIB because pushed configuration is older than existing one.",
        )));
        let doc = ConfigDocument::parse(CIB).unwrap();
        let err = gw.push_live_config(&doc, PushScope::All).unwrap_err();
        assert!(matches!(err, GatewayError::Conflict(_)));
        assert_eq!(gw.runner().executed_commands()[0].len(), 4);

        let msg = err.to_string();
        assert!(msg.starts_with("CIB push rejected because the cluster configuration changed concurrently; retry"));
        assert!(msg.contains("only the resources section: command 'pcs cluster cib-push "));
        assert!(msg.ends_with("pushed configuration is older than existing one."));
    }

    #[test]
    fn test_spawn_failure() {
        let gw = Gateway::new(
            SystemRunner,
            ToolPaths {
                pcs: "/nonexistent/bin/pcs".into(),
                crm_mon: "/nonexistent/bin/crm_mon".into(),
            },
        );
        assert!(matches!(gw.pcs_version(), Err(GatewayError::Spawn { .. })));
    }

    #[test]
    fn test_push_args() {
        let path = Path::new("/tmp/cib.xml");
        assert_eq!(push_args(path, PushScope::All), vec!["cluster", "cib-push", "/tmp/cib.xml"]);
        assert_eq!(
            push_args(path, PushScope::Resources),
            vec!["cluster", "cib-push", "/tmp/cib.xml", "scope=resources"]
        );
    }

    #[test]
    fn test_command_failure_display() {
        let failure = CommandFailure::new(
            "pcs resource delete x",
            CommandOutput::failure(1, "Error: Resource 'x' does not exist.\n"),
        );
        assert_eq!(
            failure.to_string(),
            "command 'pcs resource delete x' exited with code 1: Error: Resource 'x' does not exist."
        );
    }
}
