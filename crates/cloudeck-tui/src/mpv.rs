//! mpv child process and its JSON IPC connection.
//!
//! One connection is split into two tasks. The writer takes [`Request`]s off a
//! channel, registers the reply slot and writes the line. The reader parses
//! every line mpv sends back: lines carrying a `request_id` resolve the slot,
//! everything else goes to the event channel as an [`MpvEvent`].
//!
//! The transport is a Unix socket on unix and a named pipe on Windows; both
//! are driven by the same generic [`attach`].
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, trace, warn};

use cloudeck_core::platform;

pub const OBS_PAUSE: u64 = 1;
pub const OBS_TIME_POS: u64 = 2;
pub const OBS_DURATION: u64 = 3;

const OBSERVED: [(u64, &str); 3] = [
    (OBS_PAUSE, "pause"),
    (OBS_TIME_POS, "time-pos"),
    (OBS_DURATION, "duration"),
];

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_INTERVAL: Duration = Duration::from_millis(100);

static REQUEST_IDS: AtomicU64 = AtomicU64::new(1);

type Reply = oneshot::Sender<anyhow::Result<Value>>;

struct Request {
    id: u64,
    line: String,
    reply: Reply,
}

/// Reply slots shared by the writer (insert) and reader (resolve).
#[derive(Clone, Default)]
struct Pending(Arc<Mutex<HashMap<u64, Reply>>>);

impl Pending {
    async fn register(&self, id: u64, reply: Reply) {
        self.0.lock().await.insert(id, reply);
    }

    async fn resolve(&self, id: u64, result: anyhow::Result<Value>) {
        match self.0.lock().await.remove(&id) {
            Some(slot) => {
                let _ = slot.send(result);
            }
            None => debug!("mpv: reply for unknown request {}", id),
        }
    }

    async fn fail_all(&self, reason: &str) {
        for (_, slot) in self.0.lock().await.drain() {
            let _ = slot.send(Err(anyhow::anyhow!("{}", reason)));
        }
    }
}

/// Something mpv sent without being asked: a property change or a
/// playback event such as `end-file`.
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// `(observer id, data)` for a property-change; missing data reads as null.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.event_name()? != "property-change" {
            return None;
        }
        let id = self.raw.get("id")?.as_u64()?;
        Some((id, self.raw.get("data").unwrap_or(&Value::Null)))
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// Why an `end-file` happened: "eof", "stop", "error" and so on.
    pub fn end_reason(&self) -> Option<&str> {
        self.raw.get("reason")?.as_str()
    }

    pub fn file_error(&self) -> Option<&str> {
        self.raw.get("file_error")?.as_str()
    }
}

/// One decoded line from the IPC stream.
#[derive(Debug)]
enum Incoming {
    Reply { id: u64, result: Result<Value, String> },
    Event(Value),
}

fn decode(line: &str) -> Option<Incoming> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            debug!("mpv: unparseable line {:?}: {}", line, e);
            return None;
        }
    };
    let Some(id) = value.get("request_id").and_then(Value::as_u64) else {
        return Some(Incoming::Event(value));
    };
    let result = match value.get("error").and_then(Value::as_str) {
        Some("success") => Ok(value),
        Some(err) => Err(err.to_string()),
        None => Err("missing error field".to_string()),
    };
    Some(Incoming::Reply { id, result })
}

/// Cloneable sender of IPC commands. Each call waits for mpv's reply.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<Request>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let id = REQUEST_IDS.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&json!({ "command": command, "request_id": id }))?;
        line.push('\n');

        let (reply, wait) = oneshot::channel();
        self.tx
            .send(Request { id, line, reply })
            .await
            .map_err(|_| anyhow::anyhow!("mpv connection is closed"))?;

        match tokio::time::timeout(REPLY_TIMEOUT, wait).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => anyhow::bail!("mpv dropped request {}", id),
            Err(_) => anyhow::bail!("mpv did not answer request {} in time", id),
        }
    }

    /// Replace whatever is playing with `target` and start it unpaused.
    pub async fn load(&self, target: &str, volume: u8) -> anyhow::Result<()> {
        debug!("mpv: load {}", target);
        self.send(json!(["loadfile", target, "replace"])).await?;
        if let Err(e) = self.set_volume(volume).await {
            warn!("mpv: volume after load failed: {}", e);
        }
        self.set_pause(false).await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await.map(drop)
    }

    pub async fn set_volume(&self, volume: u8) -> anyhow::Result<()> {
        self.set_property("volume", json!(volume.min(100))).await
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.set_property("pause", json!(paused)).await
    }

    pub async fn seek_to(&self, secs: f64) -> anyhow::Result<()> {
        self.send(json!(["seek", secs, "absolute"])).await.map(drop)
    }

    async fn set_property(&self, name: &str, value: Value) -> anyhow::Result<()> {
        self.send(json!(["set_property", name, value])).await.map(drop)
    }

    /// Subscribe to pause, position and duration. Needed on every new connection.
    pub async fn observe_all_properties(&self) {
        for (id, name) in OBSERVED {
            if let Err(e) = self.send(json!(["observe_property", id, name])).await {
                warn!("mpv: cannot observe {}: {}", name, e);
            }
        }
    }
}

/// Start the reader and writer tasks over an open IPC stream.
fn attach<S>(stream: S, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let pending = Pending::default();
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(write_requests(write_half, rx, pending.clone()));
    tokio::spawn(read_lines(BufReader::new(read_half), pending, event_tx));
    MpvHandle { tx }
}

async fn write_requests<W>(mut writer: W, mut rx: mpsc::Receiver<Request>, pending: Pending)
where
    W: AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        trace!("mpv: -> {}", req.line.trim_end());
        pending.register(req.id, req.reply).await;
        if let Err(e) = writer.write_all(req.line.as_bytes()).await {
            warn!("mpv: write failed: {}", e);
            pending.resolve(req.id, Err(e.into())).await;
            break;
        }
    }
    debug!("mpv: writer stopped");
}

async fn read_lines<R>(mut reader: BufReader<R>, pending: Pending, event_tx: mpsc::Sender<MpvEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    let reason = loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break "mpv connection closed".to_string(),
            Ok(_) => {}
            Err(e) => break format!("mpv read failed: {}", e),
        }
        match decode(&line) {
            Some(Incoming::Reply { id, result }) => {
                let result = result.map_err(|err| anyhow::anyhow!("mpv: {}", err));
                pending.resolve(id, result).await;
            }
            Some(Incoming::Event(raw)) => {
                if event_tx.send(MpvEvent { raw }).await.is_err() {
                    break "event receiver gone".to_string();
                }
            }
            None => {}
        }
    };
    debug!("mpv: reader stopped: {}", reason);
    pending.fail_all(&reason).await;
}

#[cfg(unix)]
type IpcStream = tokio::net::UnixStream;

#[cfg(windows)]
type IpcStream = tokio::net::windows::named_pipe::NamedPipeClient;

#[cfg(unix)]
async fn open_ipc(name: &str) -> std::io::Result<IpcStream> {
    tokio::net::UnixStream::connect(name).await
}

#[cfg(windows)]
async fn open_ipc(name: &str) -> std::io::Result<IpcStream> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(format!(r"\\.\pipe\{}", name))
}

fn mpv_args(volume: u8) -> Vec<String> {
    vec![
        "--no-video".to_string(),
        "--idle=yes".to_string(),
        "--keep-open=no".to_string(),
        "--quiet".to_string(),
        platform::mpv_socket_arg(),
        format!("--volume={}", volume.min(100)),
    ]
}

/// Owns the mpv process. Spawns it on demand and hands out connections.
pub struct MpvDriver {
    socket_name: String,
    child: Option<tokio::process::Child>,
    /// Volume (0-100) a freshly spawned process starts with.
    pub last_volume: u8,
}

impl MpvDriver {
    pub fn new(volume: u8) -> Self {
        Self {
            socket_name: platform::mpv_socket_name(),
            child: None,
            last_volume: volume,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("mpv: process exited ({})", status);
                false
            }
            Err(e) => {
                warn!("mpv: cannot poll process: {}", e);
                false
            }
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!("mpv: kill: {}", e);
            }
        }
    }

    /// Reconnect to the process this driver already owns.
    pub async fn try_reconnect(&mut self, event_tx: mpsc::Sender<MpvEvent>) -> Option<MpvHandle> {
        // An IPC endpoint left by some other mpv is not ours to drive.
        self.child.as_ref()?;
        match open_ipc(&self.socket_name).await {
            Ok(stream) => {
                info!("mpv: reconnected");
                Some(attach(stream, event_tx))
            }
            Err(e) => {
                debug!("mpv: reconnect failed: {}", e);
                None
            }
        }
    }

    /// Start a fresh mpv and connect to it once its IPC endpoint is up.
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        #[cfg(unix)]
        {
            let _ = tokio::fs::remove_file(&self.socket_name).await;
        }
        self.spawn()?;

        let mut last_err = None;
        for _ in 0..CONNECT_ATTEMPTS {
            tokio::time::sleep(CONNECT_INTERVAL).await;
            match open_ipc(&self.socket_name).await {
                Ok(stream) => {
                    info!("mpv: connected to {}", self.socket_name);
                    return Ok(attach(stream, event_tx));
                }
                Err(e) => last_err = Some(e),
            }
        }
        self.kill().await;
        match last_err {
            Some(e) => Err(anyhow::anyhow!("mpv IPC never came up: {}", e)),
            None => Err(anyhow::anyhow!("mpv IPC never came up")),
        }
    }

    fn spawn(&mut self) -> anyhow::Result<()> {
        let binary = platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv not found beside cloudeck or on PATH"))?;

        let log_path = platform::data_dir().join("mpv-stderr.log");
        let stderr = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map(std::process::Stdio::from)
            .unwrap_or_else(|e| {
                warn!("mpv: stderr log {:?} unavailable: {}", log_path, e);
                std::process::Stdio::null()
            });

        let child = tokio::process::Command::new(&binary)
            .args(mpv_args(self.last_volume))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()?;
        info!("mpv: started {:?} pid={:?}", binary, child.id());
        self.child = Some(child);
        Ok(())
    }
}
