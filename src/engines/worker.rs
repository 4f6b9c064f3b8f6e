//! Persistent OCR worker processes.
//!
//! Deep-learning engines spend seconds loading their models, so we start them
//! once as a child process and talk to them over a line-based JSON protocol:
//!
//! 1. The worker prints [`READY_MARKER`] once its models are loaded.
//! 2. We write one `{"image_path": "..."}` request per line to its stdin.
//! 3. It writes one `{"code": N, "data": ...}` response per line to stdout.
//!
//! This is the protocol spoken by `PaddleOCR-json`, and our EasyOCR helper
//! script speaks it too. Any stdout line that doesn't look like JSON is logged
//! and skipped.

use std::process::Stdio;

use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines},
    process::{Child, ChildStdin, ChildStdout, Command},
};

use super::join_fragments;
use crate::{error::EngineError, prelude::*, process::forward_stderr_to_log};

/// Printed by a worker once it's ready to accept requests.
pub const READY_MARKER: &str = "OCR init completed.";

/// Response code: text was found.
const CODE_OK: u32 = 100;

/// Response code: the image contained no text.
const CODE_NO_TEXT: u32 = 101;

/// How to launch a worker.
#[derive(Clone, Debug)]
pub struct WorkerCommand {
    /// The program to run.
    pub program: PathBuf,

    /// Arguments to pass.
    pub args: Vec<String>,
}

/// A request sent to a worker.
#[derive(Serialize)]
struct WorkerRequest<'a> {
    image_path: &'a Path,
}

/// A response from a worker.
#[derive(Debug, Deserialize)]
struct WorkerResponse {
    code: u32,
    #[serde(default)]
    data: Value,
}

/// A single piece of detected text. Workers may also send bounding boxes and
/// scores, which we ignore.
#[derive(Debug, Deserialize)]
struct TextFragment {
    text: String,
}

impl WorkerResponse {
    /// Convert a response into recognized text.
    fn into_text(self) -> Result<String> {
        match self.code {
            CODE_OK => {
                let fragments = serde_json::from_value::<Vec<TextFragment>>(self.data)
                    .context("malformed text fragments in worker response")?;
                Ok(join_fragments(fragments.iter().map(|f| f.text.as_str())))
            }
            CODE_NO_TEXT => Ok(String::new()),
            code => {
                let message = match self.data {
                    Value::String(message) => message,
                    other => other.to_string(),
                };
                Err(anyhow!("worker returned code {code}: {message}"))
            }
        }
    }
}

/// Encode a request as a single line, including the trailing newline.
fn encode_request(image_path: &Path) -> Result<String> {
    let mut line = serde_json::to_string(&WorkerRequest { image_path })
        .context("cannot encode worker request")?;
    line.push('\n');
    Ok(line)
}

/// A running worker process.
struct WorkerProcess {
    /// Kept so the child is killed when we're dropped.
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl WorkerProcess {
    /// Start a worker and wait until it reports that it's ready.
    #[instrument(level = "debug", skip(command), fields(program = %command.program.display()))]
    async fn spawn(name: &str, command: &WorkerCommand) -> Result<Self> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!("cannot start {name} worker {:?}", command.program)
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("{name} worker has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("{name} worker has no stdout"))?;
        if let Some(stderr) = child.stderr.take() {
            forward_stderr_to_log(name.to_owned(), stderr);
        }

        let mut stdout = BufReader::new(stdout).lines();
        loop {
            let line = stdout
                .next_line()
                .await
                .with_context(|| format!("cannot read from {name} worker"))?;
            match line {
                Some(line) if line.contains(READY_MARKER) => break,
                Some(line) => debug!(worker = name, "{line}"),
                None => {
                    let status = child.wait().await.ok();
                    return Err(anyhow!(
                        "{name} worker exited before it was ready (status: {status:?})"
                    ));
                }
            }
        }
        debug!(worker = name, "Worker is ready");

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    /// Send one encoded request line and wait for its response.
    async fn request(&mut self, name: &str, line: &str) -> Result<WorkerResponse> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("cannot write to {name} worker"))?;
        self.stdin
            .flush()
            .await
            .with_context(|| format!("cannot flush {name} worker input"))?;

        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .with_context(|| format!("cannot read from {name} worker"))?;
            match line {
                Some(line) if line.trim_start().starts_with('{') => {
                    return serde_json::from_str(&line).with_context(|| {
                        format!("cannot parse {name} worker response: {line:?}")
                    });
                }
                Some(line) => debug!(worker = name, "{line}"),
                None => return Err(anyhow!("{name} worker exited unexpectedly")),
            }
        }
    }
}

/// A restartable worker process for one engine.
pub struct OcrWorker {
    /// The engine name, for messages.
    name: String,

    /// How to (re)start the worker.
    command: WorkerCommand,

    /// The running process, if any.
    process: Option<WorkerProcess>,

    /// False while a request is outstanding. If a request is abandoned
    /// halfway, the next response on the pipe would belong to it, so the
    /// worker must be restarted.
    in_sync: bool,
}

impl OcrWorker {
    /// Start a worker. Fails with [`EngineError::Init`] if the worker can't be
    /// started or exits before it's ready.
    pub async fn start(name: &str, command: WorkerCommand) -> Result<Self, EngineError> {
        let process = WorkerProcess::spawn(name, &command)
            .await
            .map_err(EngineError::Init)?;
        Ok(Self {
            name: name.to_owned(),
            command,
            process: Some(process),
            in_sync: true,
        })
    }

    /// Recognize the text in an image.
    pub async fn recognize(&mut self, image_path: &Path) -> Result<String, EngineError> {
        let process = self.process.as_mut().ok_or_else(|| {
            EngineError::Execution(anyhow!("{} worker is not running", self.name))
        })?;
        let line = encode_request(image_path).map_err(EngineError::Execution)?;
        // Nothing has been written yet, so a bad path leaves the worker usable.
        self.in_sync = false;
        let response = process
            .request(&self.name, &line)
            .await
            .map_err(EngineError::Execution)?;
        self.in_sync = true;
        response.into_text().map_err(EngineError::Execution)
    }

    /// Restart the worker if a request was interrupted or the process died.
    pub async fn recover(&mut self) -> Result<(), EngineError> {
        if self.in_sync && self.process.is_some() {
            return Ok(());
        }
        warn!(worker = %self.name, "Restarting worker");
        if let Some(mut old) = self.process.take() {
            if let Err(err) = old.child.kill().await {
                debug!(worker = %self.name, "Cannot kill old worker: {err}");
            }
        }
        let process = WorkerProcess::spawn(&self.name, &self.command)
            .await
            .map_err(EngineError::Init)?;
        self.process = Some(process);
        self.in_sync = true;
        Ok(())
    }
}
