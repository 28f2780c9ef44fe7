//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications for
//! state change events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::events::StateEvent;
use crate::hotkey::HotkeyCommand;
use crate::settings::SettingsHandle;
use crate::state::{ControlCommand, StatusBoard};

use super::protocol::{DaemonStatus, Notification, Request, Response, MAX_MESSAGE_LEN};

/// The parts of the daemon the control surface talks to
#[derive(Clone)]
pub struct DaemonHandles {
    pub status: Arc<StatusBoard>,
    pub settings: SettingsHandle,
    pub control: mpsc::Sender<ControlCommand>,
    pub hotkey: mpsc::Sender<HotkeyCommand>,
    pub events: broadcast::Sender<StateEvent>,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
}

/// Shared server state
struct ServerState {
    handles: DaemonHandles,
    start_time: Instant,
}

impl Server {
    /// Bind the socket, replacing a stale one
    pub fn new(socket_path: &Path, handles: DaemonHandles) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            state: Arc::new(ServerState {
                handles,
                start_time: Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, state) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Handle a single client connection
///
/// Frames are read on a separate task so a subscribed client can receive
/// notifications while no request is pending.
async fn handle_client(stream: UnixStream, state: Arc<ServerState>) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(8);

    let read_task = tokio::spawn(async move {
        if let Err(e) = read_frames(&mut reader, frame_tx).await {
            debug!(?e, "client read ended");
        }
    });

    let mut events: Option<broadcast::Receiver<StateEvent>> = None;

    let result: Result<()> = loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                let Some(frame) = frame else {
                    debug!("client disconnected");
                    break Ok(());
                };

                let response = match serde_json::from_slice::<Request>(&frame) {
                    Ok(request) => {
                        debug!(?request, "received request");
                        if request == Request::Subscribe {
                            events = Some(state.handles.events.subscribe());
                            debug!("client subscribed to notifications");
                        }
                        process_request(request, &state).await
                    }
                    Err(e) => Response::error("invalid_request", e.to_string()),
                };

                if let Err(e) = send_message(&mut writer, &response).await {
                    break Err(e);
                }
            }

            event = next_event(&mut events) => match event {
                Ok(event) => {
                    let note = Notification::Event { event };
                    if let Err(e) = send_message(&mut writer, &note).await {
                        break Err(e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    events = None;
                }
            },
        }
    };

    read_task.abort();
    result
}

/// Read length-prefixed frames until EOF or an oversized frame
async fn read_frames<R: AsyncRead + Unpin>(
    reader: &mut R,
    frames: mpsc::Sender<Vec<u8>>,
) -> Result<()> {
    let mut len_buf = [0u8; 4];

    loop {
        // Read message length (4-byte little-endian)
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_LEN {
            warn!(len, "message too large, disconnecting");
            return Ok(());
        }

        // Read message body
        let mut msg_buf = vec![0u8; len];
        reader.read_exact(&mut msg_buf).await?;

        if frames.send(msg_buf).await.is_err() {
            return Ok(());
        }
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<StateEvent>>,
) -> Result<StateEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}

/// Hand a command to the orchestrator without waiting on it
fn queue_control(handles: &DaemonHandles, command: ControlCommand) -> Response {
    match handles.control.try_send(command) {
        Ok(()) => {
            info!(?command, "control command requested via IPC");
            Response::Accepted
        }
        Err(mpsc::error::TrySendError::Full(_)) => {
            Response::error("busy", "a transition is already in progress")
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            Response::error("unavailable", "orchestrator is not running")
        }
    }
}

/// Process a request and return a response
async fn process_request(request: Request, state: &ServerState) -> Response {
    let handles = &state.handles;
    match request {
        Request::Ping => Response::Pong,

        Request::GetStatus => {
            let uptime_secs = state.start_time.elapsed().as_secs();
            Response::Status(DaemonStatus::from_snapshot(
                &handles.status.snapshot(),
                uptime_secs,
            ))
        }

        Request::Toggle => queue_control(handles, ControlCommand::Toggle),
        Request::Start => queue_control(handles, ControlCommand::Start),
        Request::Stop => queue_control(handles, ControlCommand::Stop),

        Request::RecordHotkey => match handles.hotkey.send(HotkeyCommand::BeginRecording).await {
            Ok(()) => Response::Accepted,
            Err(_) => Response::error("unavailable", "hotkey service is not running"),
        },

        Request::GetSettings => {
            let settings = handles
                .settings
                .snapshot()
                .to_pairs()
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect();
            Response::Settings { settings }
        }

        Request::SetSetting { key, value } => {
            match handles.settings.update(|s| s.set(&key, &value)) {
                Ok(()) => {
                    info!(%key, %value, "setting changed via IPC");
                    if key == "hotkey" {
                        let _ = handles.hotkey.send(HotkeyCommand::ReloadHotkey).await;
                    }
                    Response::Accepted
                }
                Err(e) => Response::error("invalid_setting", e.to_string()),
            }
        }

        Request::Subscribe => Response::Subscribed,
    }
}
