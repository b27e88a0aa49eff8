use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::gateway::{AnalysisRequest, Recommendation};

const READ_CHUNK: usize = 8 * 1024;
const SELF_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// How to launch the external analyzer: a program, the arguments that always
/// precede the request arguments (usually the script path) and extra env vars.
#[derive(Debug, Clone)]
pub struct AnalyzerCommand {
    program: String,
    leading_args: Vec<String>,
    envs: Vec<(String, String)>,
}

/// Everything the analyzer printed. `exit_code` is `None` while the process
/// is still running or when it was killed by a signal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug)]
pub enum Completion {
    Exited(ProcessOutput),
    Killed,
}

/// The two growing output buffers of one invocation. Clones share storage,
/// so a watchdog can read what has arrived so far.
#[derive(Debug, Clone, Default)]
pub struct StreamBuffers {
    stdout: Arc<Mutex<Vec<u8>>>,
    stderr: Arc<Mutex<Vec<u8>>>,
}

impl StreamBuffers {
    pub fn snapshot(&self, exit_code: Option<i32>) -> ProcessOutput {
        ProcessOutput {
            exit_code,
            stdout: read_lossy(&self.stdout),
            stderr: read_lossy(&self.stderr),
        }
    }
}

fn read_lossy(buffer: &Mutex<Vec<u8>>) -> String {
    let bytes = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// One live analyzer process with its two stream accumulators.
pub struct Invocation {
    request_id: String,
    child: Child,
    buffers: StreamBuffers,
    stdout: JoinHandle<()>,
    stderr: JoinHandle<()>,
}

impl AnalyzerCommand {
    pub fn new(program: impl Into<String>) -> AnalyzerCommand {
        AnalyzerCommand {
            program: program.into(),
            leading_args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn leading_arg(mut self, arg: impl Into<String>) -> AnalyzerCommand {
        self.leading_args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> AnalyzerCommand {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument vector for one request, leading args included.
    pub fn args_for(&self, request: &AnalysisRequest) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend(request_args(request));
        args
    }

    /// Launches the analyzer. Stream draining starts immediately so a chatty
    /// process never blocks on a full pipe.
    pub fn spawn(&self, request: &AnalysisRequest, request_id: &str) -> io::Result<Invocation> {
        let mut child = Command::new(&self.program)
            .args(self.args_for(request))
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        log::info!(
            "[{request_id}] spawned analyzer {} (pid {:?}) for {} request",
            self.program,
            child.id(),
            request.mode().as_str()
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("analyzer stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("analyzer stderr was not captured"))?;

        let buffers = StreamBuffers::default();
        Ok(Invocation {
            request_id: request_id.to_string(),
            stdout: tokio::spawn(accumulate(
                stdout,
                Arc::clone(&buffers.stdout),
                request_id.to_string(),
                false,
            )),
            stderr: tokio::spawn(accumulate(
                stderr,
                Arc::clone(&buffers.stderr),
                request_id.to_string(),
                true,
            )),
            buffers,
            child,
        })
    }

    /// Startup probe: `<program> --version` must succeed before serving.
    pub async fn self_check(&self) -> io::Result<String> {
        let output = tokio::time::timeout(
            SELF_CHECK_TIMEOUT,
            Command::new(&self.program)
                .arg("--version")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "version check timed out"))??;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "{} --version exited with {}",
                self.program, output.status
            )));
        }

        // Older interpreters print their version on stderr.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let version = if stdout.trim().is_empty() { stderr } else { stdout };
        Ok(version.trim().to_string())
    }
}

impl Invocation {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn buffers(&self) -> StreamBuffers {
        self.buffers.clone()
    }

    /// Waits for the process to exit, or kills it once `kill` is cancelled.
    ///
    /// `Exited` is only produced after both stream accumulators have finished,
    /// so the returned output holds every chunk the process wrote.
    pub async fn wait(mut self, kill: CancellationToken) -> io::Result<Completion> {
        tokio::select! {
            status = self.child.wait() => {
                let status = status?;
                let _ = self.stdout.await;
                let _ = self.stderr.await;
                log::info!("[{}] analyzer exited with {}", self.request_id, status);
                Ok(Completion::Exited(self.buffers.snapshot(status.code())))
            }
            _ = kill.cancelled() => {
                log::warn!("[{}] killing analyzer", self.request_id);
                if let Err(e) = self.child.kill().await {
                    log::error!("[{}] failed to kill analyzer: {:#}", self.request_id, e);
                }
                // Grandchildren may still hold the pipes open.
                self.stdout.abort();
                self.stderr.abort();
                Ok(Completion::Killed)
            }
        }
    }
}

fn request_args(request: &AnalysisRequest) -> Vec<String> {
    match request {
        AnalysisRequest::Compare { urls, context } => {
            let mut args = urls.clone();
            if let Some(context) = context {
                args.push("--context".to_string());
                args.push(context.clone());
            }
            args
        }
        AnalysisRequest::Recommend(Recommendation {
            product_type,
            min_budget,
            max_budget,
            main_use,
            specific_needs,
        }) => {
            let mut args = vec![
                "--mode".to_string(),
                "recommend".to_string(),
                "--type".to_string(),
                product_type.clone(),
                "--min-budget".to_string(),
                min_budget.clone(),
                "--max-budget".to_string(),
                max_budget.clone(),
                "--use".to_string(),
                main_use.clone(),
            ];
            if let Some(needs) = specific_needs {
                args.push("--needs".to_string());
                args.push(needs.clone());
            }
            args
        }
    }
}

async fn accumulate<R>(
    mut reader: R,
    buffer: Arc<Mutex<Vec<u8>>>,
    request_id: String,
    echo: bool,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if echo {
                    log::debug!(
                        "[{request_id}] analyzer stderr: {}",
                        String::from_utf8_lossy(&chunk[..n]).trim_end()
                    );
                }
                buffer
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .extend_from_slice(&chunk[..n]);
            }
            Err(e) => {
                log::warn!("[{request_id}] error reading analyzer output: {:#}", e);
                break;
            }
        }
    }
}
