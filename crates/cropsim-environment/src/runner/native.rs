// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Native process runner.
//!
//! Launches the grid generator and the crop model executables from a bin
//! directory as child processes, with the run's working directory as cwd.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::traits::*;

/// File name of the soil grid generator.
pub const GRID_GENERATOR: &str = "CreateSoilFiles.exe";

/// Configuration for the native runner.
#[derive(Debug, Clone)]
pub struct NativeRunnerConfig {
    /// Directory holding the model executables.
    pub bin_dir: PathBuf,
    /// Interpreter the grid generator is launched through (e.g. `mono`).
    pub grid_launcher: Option<String>,
}

/// Runner that spawns the model programs as local processes.
pub struct NativeRunner {
    config: NativeRunnerConfig,
}

impl NativeRunner {
    /// Create a new native runner.
    pub fn new(config: NativeRunnerConfig) -> Self {
        Self { config }
    }

    /// Path of the executable for `program`.
    pub fn executable(&self, program: Program) -> PathBuf {
        match program {
            Program::GridGenerator => self.config.bin_dir.join(GRID_GENERATOR),
            Program::CropModel(crop) => self.config.bin_dir.join(crop.executable()),
        }
    }

    /// Program and arguments to spawn for `options`.
    pub fn command_line(&self, options: &LaunchOptions) -> (String, Vec<String>) {
        let executable = self.executable(options.program).display().to_string();
        match options.program {
            Program::GridGenerator => {
                let args = vec![
                    format!("{}.lyr", options.site),
                    "/GN".to_string(),
                    options.site.clone(),
                    "/SN".to_string(),
                    options.soil.clone(),
                ];
                match &self.config.grid_launcher {
                    Some(launcher) => {
                        let mut with_exe = vec![executable];
                        with_exe.extend(args);
                        (launcher.clone(), with_exe)
                    }
                    None => (executable, args),
                }
            }
            Program::CropModel(_) => (
                executable,
                vec![options.run_file().display().to_string()],
            ),
        }
    }
}

#[async_trait]
impl Runner for NativeRunner {
    fn runner_type(&self) -> &'static str {
        "native"
    }

    async fn run(
        &self,
        options: &LaunchOptions,
        stdout: Option<mpsc::UnboundedSender<String>>,
    ) -> Result<LaunchResult> {
        let executable = self.executable(options.program);
        if !tokio::fs::try_exists(&executable).await.unwrap_or(false) {
            return Err(RunnerError::BinaryNotFound(executable.display().to_string()));
        }

        let (program, args) = self.command_line(options);
        debug!(
            run_id = options.run_id,
            program = %program,
            args = ?args,
            workdir = %options.workdir.display(),
            "Launching process"
        );

        let start = Instant::now();
        let mut child = Command::new(&program)
            .args(&args)
            .current_dir(&options.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    RunnerError::BinaryNotFound(program.clone())
                } else {
                    RunnerError::StartFailed(format!("{program}: {e}"))
                }
            })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let read_stdout = async {
            let mut count = 0u64;
            if let Some(pipe) = stdout_pipe {
                let mut segments = BufReader::new(pipe).split(b'\n');
                while let Some(segment) = segments.next_segment().await? {
                    count += 1;
                    let line = String::from_utf8_lossy(&segment)
                        .trim_end_matches('\r')
                        .to_string();
                    if let Some(tx) = &stdout {
                        // receiver gone only means nobody is watching progress
                        let _ = tx.send(line);
                    }
                }
            }
            Ok::<u64, std::io::Error>(count)
        };
        let read_stderr = async {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr_pipe {
                pipe.read_to_string(&mut buf).await?;
            }
            Ok::<String, std::io::Error>(buf)
        };

        let (lines, stderr_text, status) = tokio::join!(read_stdout, read_stderr, child.wait());
        let status = status?;
        let stdout_lines = lines?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if !status.success() {
            let exit_code = status.code().unwrap_or(-1);
            let stderr = stderr_text.unwrap_or_default().trim().to_string();
            error!(run_id = options.run_id, program = %program, exit_code, stderr = %stderr, "Process failed");
            return Err(RunnerError::ExitCode { exit_code, stderr });
        }

        info!(run_id = options.run_id, program = %program, duration_ms, "Process completed successfully");
        Ok(LaunchResult {
            stdout_lines,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropsim_core::Crop;
    use std::path::Path;

    fn runner(bin_dir: &Path, launcher: Option<&str>) -> NativeRunner {
        NativeRunner::new(NativeRunnerConfig {
            bin_dir: bin_dir.to_path_buf(),
            grid_launcher: launcher.map(str::to_string),
        })
    }

    fn options(program: Program, workdir: &Path) -> LaunchOptions {
        LaunchOptions {
            run_id: 7,
            program,
            site: "Beltsville".to_string(),
            soil: "LoamProfile".to_string(),
            workdir: workdir.to_path_buf(),
        }
    }

    #[test]
    fn test_executable_selection() {
        let runner = runner(Path::new("/opt/bin"), None);

        let expected = [
            (Crop::Maize, "maizsim"),
            (Crop::Fallow, "maizsim"),
            (Crop::Potato, "spudsim"),
            (Crop::Soybean, "glycim"),
            (Crop::Cotton, "gossym"),
        ];
        for (crop, name) in expected {
            assert_eq!(
                runner.executable(Program::CropModel(crop)),
                Path::new("/opt/bin").join(name)
            );
        }
    }

    #[test]
    fn test_grid_command_through_launcher() {
        let runner = runner(Path::new("/opt/bin"), Some("mono"));
        let (program, args) =
            runner.command_line(&options(Program::GridGenerator, Path::new("/srv/run/7")));

        assert_eq!(program, "mono");
        assert_eq!(
            args,
            [
                "/opt/bin/CreateSoilFiles.exe",
                "Beltsville.lyr",
                "/GN",
                "Beltsville",
                "/SN",
                "LoamProfile"
            ]
        );
    }

    #[test]
    fn test_crop_model_gets_absolute_run_file() {
        let runner = runner(Path::new("/opt/bin"), None);
        let (program, args) = runner.command_line(&options(
            Program::CropModel(Crop::Soybean),
            Path::new("/srv/run/7"),
        ));

        assert_eq!(program, "/opt/bin/glycim");
        assert_eq!(args, ["/srv/run/7/RunBeltsville.dat"]);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let runner = runner(bin.path(), None);

        let err = runner
            .run(&options(Program::CropModel(Crop::Maize), work.path()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::BinaryNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_lines_are_forwarded() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::write(
            bin.path().join(GRID_GENERATOR),
            "echo \"Progress 12.5\"\necho \"args $*\"\npwd > cwd.txt\n",
        )
        .unwrap();
        let runner = runner(bin.path(), Some("sh"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = runner
            .run(&options(Program::GridGenerator, work.path()), Some(tx))
            .await
            .unwrap();

        assert_eq!(result.stdout_lines, 2);
        assert_eq!(rx.recv().await.as_deref(), Some("Progress 12.5"));
        assert_eq!(
            rx.recv().await.as_deref(),
            Some("args Beltsville.lyr /GN Beltsville /SN LoamProfile")
        );
        assert!(rx.recv().await.is_none());
        assert!(work.path().join("cwd.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::write(bin.path().join(GRID_GENERATOR), "echo boom >&2\nexit 3\n").unwrap();
        let runner = runner(bin.path(), Some("sh"));

        let err = runner
            .run(&options(Program::GridGenerator, work.path()), None)
            .await
            .unwrap_err();

        match err {
            RunnerError::ExitCode { exit_code, stderr } => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
