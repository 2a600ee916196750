//! End-to-end tests of the `qazure` binary against the mock environment.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const CATALOG: &str = r#"
operations:
  - name: Microsoft.Quantum.SanityTests.HelloQ
    capability: BasicQuantumFunctionality
    qir: "define void @ENTRYPOINT__HelloQ() { ret void }"
"#;

const CONNECT: &str = "%azure.connect subscription=sub resourceGroup=rg \
                       workspace=WorkspaceNameWithMockProviders location=westus";

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("programs.yaml"), CATALOG).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_qazure"));
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env_remove("AZURE_QUANTUM_ENV")
            .env_remove("RUST_LOG")
            .env_remove("QAZURE_CONFIG");
        for (key, _) in std::env::vars() {
            if key.starts_with("QAZURE_") || key.starts_with("AZURE_") {
                cmd.env_remove(key);
            }
        }
        cmd
    }

    /// Run a session script on stdin.
    fn session(&self, script: &str) -> Output {
        let mut child = self
            .command()
            .args(["--environment", "mock", "--catalog"])
            .arg(self.path().join("programs.yaml"))
            .arg("run")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child.stdin.take().unwrap().write_all(script.as_bytes()).unwrap();
        child.wait_with_output().unwrap()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

mod session {
    use super::*;

    #[test]
    fn test_connect_execute_and_list() {
        let sandbox = Sandbox::new();
        let script = format!("{CONNECT}\n%azure.target ionq.mock\n%azure.execute HelloQ\n%azure.jobs\n");
        let output = sandbox.session(&script);
        let out = stdout(&output);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(out.contains("Connected to Azure Quantum workspace WorkspaceNameWithMockProviders"));
        assert!(out.contains("ionq.mock"));
        assert!(out.contains("Loaded target ionq.mock"));
        assert!(out.contains("[0]"));
        assert!(out.contains("[1]"));
        assert!(out.contains("1 job(s)"));
    }

    #[test]
    fn test_submit_then_status_and_output() {
        let sandbox = Sandbox::new();
        let script = format!(
            "{CONNECT}\n%azure.target quantinuum.mock\n%azure.submit HelloQ jobName=first\n%azure.status\n%azure.output\n"
        );
        let output = sandbox.session(&script);
        let out = stdout(&output);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(out.contains("Submitted job \"first\""));
        assert!(out.contains("Succeeded"));
        assert!(out.contains("Results of job"));
    }

    #[test]
    fn test_target_capability_override() {
        let sandbox = Sandbox::new();
        let script = format!(
            "{CONNECT}\n%azure.target quantinuum.mock\n%azure.target-capability FullComputation\n%azure.target-capability\n"
        );
        let output = sandbox.session(&script);
        let out = stdout(&output);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(out.contains("supports at most BasicMeasurementFeedback"));
        assert!(out.contains("Target capability: BasicMeasurementFeedback"));
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let sandbox = Sandbox::new();
        let output = sandbox.session("# setup\n\n%lsmagic\n");

        assert!(output.status.success());
        assert!(stdout(&output).contains("%azure.execute"));
    }

    #[test]
    fn test_target_before_connect_fails() {
        let sandbox = Sandbox::new();
        let output = sandbox.session("%azure.target ionq.mock\n");

        assert_eq!(output.status.code(), Some(1));
        assert!(stdout(&output).contains("Not connected"));
        assert!(stderr(&output).contains("1 command(s) failed"));
    }

    #[test]
    fn test_session_continues_after_failure() {
        let sandbox = Sandbox::new();
        let script = format!("%azure.bogus\n{CONNECT}\n%azure.quotas\n");
        let output = sandbox.session(&script);

        assert_eq!(output.status.code(), Some(1));
        assert!(stderr(&output).contains("Unknown command %azure.bogus"));
        assert!(stdout(&output).contains("Connected to Azure Quantum workspace"));
    }

    #[test]
    fn test_script_file_and_configured_workspace() {
        let sandbox = Sandbox::new();
        let config = sandbox.path().join("config.yaml");
        std::fs::write(
            &config,
            "workspace:\n  subscription: sub\n  resource_group: rg\n  name: WorkspaceNameWithMockProviders\n  location: westus\n",
        )
        .unwrap();
        let script = sandbox.path().join("session.txt");
        std::fs::write(&script, "%azure.target ionq.mock\n%azure.execute HelloQ\n").unwrap();

        let output = sandbox
            .command()
            .arg("--config")
            .arg(&config)
            .args(["--environment", "mock", "--catalog"])
            .arg(sandbox.path().join("programs.yaml"))
            .arg("run")
            .arg(&script)
            .arg("--connect")
            .output()
            .unwrap();

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stdout(&output).contains("[0]"));
    }
}

mod commands {
    use super::*;

    #[test]
    fn test_version() {
        let output = Sandbox::new().command().arg("version").output().unwrap();

        assert!(output.status.success());
        assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_check_redacts_storage() {
        let sandbox = Sandbox::new();
        let config = sandbox.path().join("config.yaml");
        std::fs::write(
            &config,
            "environment: mock\nworkspace:\n  storage: DefaultEndpointsProtocol=https;AccountKey=secret\n",
        )
        .unwrap();

        let output = sandbox.command().arg("--config").arg(&config).arg("check").output().unwrap();
        let out = stdout(&output);

        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(out.contains("Configuration is valid"));
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("secret"));
    }

    #[test]
    fn test_unknown_environment_is_rejected() {
        let output = Sandbox::new()
            .command()
            .args(["--environment", "staging", "check"])
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
        assert!(stderr(&output).contains("Unknown environment"));
    }
}
