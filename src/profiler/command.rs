//! Workload commands: a wrapped argv or the lines of a batch script.

use super::error::{ProfilerError, Result};
use std::fs;
use std::path::Path;
use std::process::{Child, Command};

/// Shell used for script lines
const SHELL: &str = "sh";

/// One command to supervise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadCommand {
    program: String,
    args: Vec<String>,
    display: String,
}

impl WorkloadCommand {
    /// Wrap an argv, run directly without a shell
    pub fn wrap<S: AsRef<str>>(argv: &[S]) -> Result<Self> {
        let (program, args) = argv.split_first().ok_or(ProfilerError::EmptyCommand)?;
        let program = program.as_ref().to_string();
        if program.trim().is_empty() {
            return Err(ProfilerError::EmptyCommand);
        }
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        let display = std::iter::once(program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Self { program, args, display })
    }

    /// Run one line through `sh -c`
    pub fn shell(line: &str) -> Self {
        let line = line.trim().to_string();
        Self { program: SHELL.into(), args: vec!["-c".into(), line.clone()], display: line }
    }

    /// Parse script text: one command per line, blank lines and `#` comments skipped
    pub fn parse_script(text: &str) -> Vec<Self> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(Self::shell)
            .collect()
    }

    /// Read and parse a script file; a script with no commands is an error
    pub fn load_script<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| ProfilerError::Script { path: path.to_path_buf(), source })?;
        let commands = Self::parse_script(&text);
        if commands.is_empty() {
            return Err(ProfilerError::EmptyScript { path: path.to_path_buf() });
        }
        Ok(commands)
    }

    /// Human-readable command line
    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Start the command in its own process group so a timeout can kill
    /// everything it spawned.
    pub(crate) fn spawn(&self) -> Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd.spawn().map_err(|source| ProfilerError::Spawn { command: self.display.clone(), source })
    }
}

impl std::fmt::Display for WorkloadCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_wrap_splits_program_and_args() {
        let cmd = WorkloadCommand::wrap(&["python", "train.py", "--epochs", "3"]).unwrap();
        assert_eq!(cmd.program(), "python");
        assert_eq!(cmd.args(), &["train.py", "--epochs", "3"]);
        assert_eq!(cmd.display(), "python train.py --epochs 3");
    }

    #[test]
    fn test_wrap_empty_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(WorkloadCommand::wrap(&empty), Err(ProfilerError::EmptyCommand)));
        assert!(matches!(WorkloadCommand::wrap(&[" "]), Err(ProfilerError::EmptyCommand)));
    }

    #[test]
    fn test_shell_line() {
        let cmd = WorkloadCommand::shell("  echo hi && sleep 1 ");
        assert_eq!(cmd.program(), "sh");
        assert_eq!(cmd.args(), &["-c", "echo hi && sleep 1"]);
        assert_eq!(cmd.to_string(), "echo hi && sleep 1");
    }

    #[test]
    fn test_parse_script_skips_blank_and_comments() {
        let text = "# warmup\n\n./bench --size 1\n   \n  # note\n./bench --size 2\n";
        let cmds = WorkloadCommand::parse_script(text);
        let shown: Vec<&str> = cmds.iter().map(WorkloadCommand::display).collect();
        assert_eq!(shown, vec!["./bench --size 1", "./bench --size 2"]);
    }

    #[test]
    fn test_load_script_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "true\nfalse").unwrap();
        let cmds = WorkloadCommand::load_script(file.path()).unwrap();
        assert_eq!(cmds.len(), 2);
    }

    #[test]
    fn test_load_script_only_comments_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nothing here").unwrap();
        let err = WorkloadCommand::load_script(file.path()).unwrap_err();
        assert!(matches!(err, ProfilerError::EmptyScript { .. }));
    }

    #[test]
    fn test_load_missing_script_fails() {
        let err = WorkloadCommand::load_script("/nonexistent/gpusnap/script.sh").unwrap_err();
        assert!(matches!(err, ProfilerError::Script { .. }));
    }

    #[test]
    fn test_spawn_missing_program_fails() {
        let cmd = WorkloadCommand::wrap(&["/nonexistent/gpusnap-binary"]).unwrap();
        assert!(matches!(cmd.spawn(), Err(ProfilerError::Spawn { .. })));
    }
}
