//! Embedded file-sharing server
//!
//! A warp HTTP listener serving registered files at
//! `http://<local-ip>:<port>/share/<id>`. Access control happens at request
//! time: unknown id → 404, past expiry → 410, wrong or missing password → 401.
//! File bytes stream in chunks through a tracked transfer session, observing
//! cancellation at every chunk boundary. Stopping the server tears the
//! listener down gracefully and clears the in-memory registry; the files on
//! disk are untouched.

use crate::connectivity::resolve_local_ip;
use crate::transfers::{TransferHandle, TransferSessionManager};
use lanlink_core::{
    emit, EventSender, LanlinkError, LanlinkResult, NetworkConfig, NetworkEvent, ShareId,
    SharedFileEntry, SharingError, TimeSource, TransferDirection,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use warp::http::{Response, StatusCode};
use warp::hyper::Body;
use warp::{Filter, Rejection};
use tracing::{debug, info, warn};

/// Read size between cancellation checkpoints while streaming a file
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

// ----------------------------------------------------------------------------
// Options
// ----------------------------------------------------------------------------

/// Options for `start_server`; unset fields fall back to the current config
#[derive(Debug, Clone, Default)]
pub struct ShareServerOptions {
    /// Bulk-register every file directly under this directory
    pub directory: Option<PathBuf>,
    pub port: Option<u16>,
    pub enable_qr_code: Option<bool>,
    pub enable_password: Option<bool>,
    /// Server-wide password applied to bulk-registered entries and used as
    /// the fallback for `share_file`
    pub password: Option<String>,
}

/// Options for `share_file`; unset fields fall back to the server settings
#[derive(Debug, Clone, Default)]
pub struct ShareFileOptions {
    pub custom_name: Option<String>,
    pub generate_qr_code: Option<bool>,
    pub enable_password: Option<bool>,
    pub password: Option<String>,
    /// Explicit expiry; otherwise the session timeout applies from creation
    pub expiry: Option<lanlink_core::Timestamp>,
}

// ----------------------------------------------------------------------------
// Sharing Server
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SharingSettings {
    default_port: u16,
    enable_qr: bool,
    enable_password: bool,
    max_file_size: u64,
    session_timeout: Duration,
}

impl SharingSettings {
    fn derive(config: &NetworkConfig) -> Self {
        Self {
            default_port: config.default_port,
            enable_qr: config.enable_qr_code,
            enable_password: config.enable_password_protection,
            max_file_size: config.max_file_size,
            session_timeout: config.session_timeout,
        }
    }
}

/// Effective per-run parameters, fixed at bind time
#[derive(Debug, Clone)]
struct Bound {
    ip: IpAddr,
    port: u16,
    enable_qr: bool,
    enable_password: bool,
    default_password_hash: Option<String>,
}

struct RunningServer {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Ad-hoc file server with password and expiry enforcement
pub struct SharingServer {
    events: EventSender,
    time: Arc<dyn TimeSource>,
    transfers: Arc<TransferSessionManager>,
    entries: Arc<RwLock<HashMap<ShareId, SharedFileEntry>>>,
    settings: Arc<RwLock<SharingSettings>>,
    bound: Arc<RwLock<Option<Bound>>>,
    state: Mutex<Option<RunningServer>>,
}

impl SharingServer {
    pub fn new(
        events: EventSender,
        time: Arc<dyn TimeSource>,
        transfers: Arc<TransferSessionManager>,
        config: &NetworkConfig,
    ) -> Self {
        Self {
            events,
            time,
            transfers,
            entries: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(RwLock::new(SharingSettings::derive(config))),
            bound: Arc::new(RwLock::new(None)),
            state: Mutex::new(None),
        }
    }

    /// Adopt a replaced configuration. The Coordinator stops and restarts the
    /// server around this call, so a running listener never straddles configs.
    pub fn apply_config(&self, config: &NetworkConfig) {
        *self.settings.write().expect("sharing settings poisoned") =
            SharingSettings::derive(config);
    }

    /// Bind the listener and optionally bulk-register a directory.
    ///
    /// Returns the actually bound port (relevant when the configured port is
    /// 0). Starting while already running is an error.
    pub async fn start_server(&self, options: ShareServerOptions) -> LanlinkResult<u16> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(self.fail(SharingError::AlreadyRunning.into()));
        }

        let settings = self
            .settings
            .read()
            .expect("sharing settings poisoned")
            .clone();
        let port = options.port.unwrap_or(settings.default_port);
        let enable_qr = options.enable_qr_code.unwrap_or(settings.enable_qr);
        let enable_password = options.enable_password.unwrap_or(settings.enable_password);

        let default_password_hash = match (&options.password, enable_password) {
            (Some(password), true) => Some(SharedFileEntry::hash_password(password)),
            (None, true) => {
                return Err(self.fail(LanlinkError::config_error(
                    "password protection enabled but no server password given",
                )))
            }
            _ => None,
        };

        let ctx = RequestContext {
            entries: Arc::clone(&self.entries),
            transfers: Arc::clone(&self.transfers),
            time: Arc::clone(&self.time),
            settings: Arc::clone(&self.settings),
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let (bound_addr, server) = warp::serve(share_routes(ctx))
            .try_bind_with_graceful_shutdown(addr, async {
                let _ = shutdown_rx.await;
            })
            .map_err(|e| {
                self.fail(
                    SharingError::BindFailed {
                        port,
                        reason: e.to_string(),
                    }
                    .into(),
                )
            })?;

        let handle = tokio::spawn(server);
        let ip = resolve_local_ip().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        *self.bound.write().expect("bound state poisoned") = Some(Bound {
            ip,
            port: bound_addr.port(),
            enable_qr,
            enable_password,
            default_password_hash,
        });
        *state = Some(RunningServer {
            shutdown: shutdown_tx,
            handle,
        });
        drop(state);

        if let Some(directory) = &options.directory {
            let count = self.register_directory(directory).await?;
            debug!(count, directory = %directory.display(), "directory registered");
        }

        info!(port = bound_addr.port(), "sharing server started");
        emit(&self.events, NetworkEvent::SharingServerStarted);
        Ok(bound_addr.port())
    }

    /// Gracefully stop the listener and clear the share registry.
    ///
    /// Waits for the listener to actually close, so the port is free and no
    /// observer can reach the old instance once this returns. A no-op when not
    /// running.
    pub async fn stop_server(&self) -> LanlinkResult<()> {
        let mut state = self.state.lock().await;
        let Some(running) = state.take() else {
            return Ok(());
        };

        let _ = running.shutdown.send(());
        let _ = running.handle.await;

        *self.bound.write().expect("bound state poisoned") = None;
        self.entries
            .write()
            .expect("share registry poisoned")
            .clear();

        info!("sharing server stopped");
        emit(&self.events, NetworkEvent::SharingServerStopped);
        Ok(())
    }

    /// Register one file and mint its share link
    pub async fn share_file(
        &self,
        path: &Path,
        options: ShareFileOptions,
    ) -> LanlinkResult<SharedFileEntry> {
        let Some(bound) = self.bound.read().expect("bound state poisoned").clone() else {
            return Err(self.fail(SharingError::NotRunning.into()));
        };

        let metadata = tokio::fs::metadata(path).await.map_err(|_| {
            self.fail(
                SharingError::FileUnreadable {
                    path: path.display().to_string(),
                }
                .into(),
            )
        })?;
        if !metadata.is_file() {
            return Err(self.fail(
                SharingError::FileUnreadable {
                    path: path.display().to_string(),
                }
                .into(),
            ));
        }

        let max_file_size = self
            .settings
            .read()
            .expect("sharing settings poisoned")
            .max_file_size;
        if metadata.len() > max_file_size {
            return Err(self.fail(
                SharingError::FileTooLarge {
                    size: metadata.len(),
                    max: max_file_size,
                }
                .into(),
            ));
        }

        let enable_password = options.enable_password.unwrap_or(bound.enable_password);
        let password_hash = if enable_password {
            match options
                .password
                .as_deref()
                .map(SharedFileEntry::hash_password)
                .or_else(|| bound.default_password_hash.clone())
            {
                Some(hash) => Some(hash),
                None => {
                    return Err(self.fail(LanlinkError::config_error(
                        "password protection requested but no password given",
                    )))
                }
            }
        } else {
            None
        };

        let id = ShareId::generate();
        let display_name = options.custom_name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| id.to_string())
        });
        let url = format!("http://{}:{}/share/{}", bound.ip, bound.port, id);

        let qr_png = if options.generate_qr_code.unwrap_or(bound.enable_qr) {
            Some(generate_qr_png(&url).map_err(|e| self.fail(e))?)
        } else {
            None
        };

        let entry = SharedFileEntry {
            id,
            path: path.to_path_buf(),
            display_name,
            size: metadata.len(),
            password_hash,
            expires_at: options.expiry,
            created_at: self.time.now(),
            url,
            qr_png,
        };

        self.entries
            .write()
            .expect("share registry poisoned")
            .insert(id, entry.clone());

        info!(%id, path = %path.display(), "file shared");
        emit(
            &self.events,
            NetworkEvent::FileShared {
                path: path.to_path_buf(),
            },
        );
        Ok(entry)
    }

    /// Generate (or reuse) the QR code of an existing share, returning its URL
    pub fn generate_qr_code(&self, id: ShareId) -> LanlinkResult<String> {
        let existing = {
            let entries = self.entries.read().expect("share registry poisoned");
            let Some(entry) = entries.get(&id) else {
                return Err(self.fail(SharingError::UnknownShare { id }.into()));
            };
            (entry.url.clone(), entry.qr_png.is_some())
        };

        let (url, has_qr) = existing;
        if !has_qr {
            let png = generate_qr_png(&url).map_err(|e| self.fail(e))?;
            if let Some(entry) = self
                .entries
                .write()
                .expect("share registry poisoned")
                .get_mut(&id)
            {
                entry.qr_png = Some(png);
            }
        }

        emit(&self.events, NetworkEvent::QrCodeGenerated { id });
        Ok(url)
    }

    /// Whether the listener is currently bound
    pub fn is_running(&self) -> bool {
        self.bound.read().expect("bound state poisoned").is_some()
    }

    /// Actually bound port, when running
    pub fn bound_port(&self) -> Option<u16> {
        self.bound
            .read()
            .expect("bound state poisoned")
            .as_ref()
            .map(|b| b.port)
    }

    /// Defensive copy of the share registry
    pub fn shared_files(&self) -> Vec<SharedFileEntry> {
        self.entries
            .read()
            .expect("share registry poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn share_count(&self) -> usize {
        self.entries.read().expect("share registry poisoned").len()
    }

    async fn register_directory(&self, directory: &Path) -> LanlinkResult<usize> {
        let mut read_dir = tokio::fs::read_dir(directory).await.map_err(|_| {
            self.fail(
                SharingError::FileUnreadable {
                    path: directory.display().to_string(),
                }
                .into(),
            )
        })?;

        let mut count = 0;
        loop {
            let dir_entry = match read_dir.next_entry().await {
                Ok(Some(dir_entry)) => dir_entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(directory = %directory.display(), "directory walk aborted: {e}");
                    break;
                }
            };
            let path = dir_entry.path();
            let Ok(metadata) = dir_entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            match self.share_file(&path, ShareFileOptions::default()).await {
                Ok(_) => count += 1,
                Err(e) => warn!(path = %path.display(), "skipping unsharable file: {e}"),
            }
        }
        Ok(count)
    }

    fn fail(&self, err: LanlinkError) -> LanlinkError {
        emit(
            &self.events,
            NetworkEvent::Error {
                message: err.to_string(),
            },
        );
        err
    }
}

// ----------------------------------------------------------------------------
// HTTP Surface
// ----------------------------------------------------------------------------

#[derive(Clone)]
struct RequestContext {
    entries: Arc<RwLock<HashMap<ShareId, SharedFileEntry>>>,
    transfers: Arc<TransferSessionManager>,
    time: Arc<dyn TimeSource>,
    settings: Arc<RwLock<SharingSettings>>,
}

fn with_ctx(
    ctx: RequestContext,
) -> impl Filter<Extract = (RequestContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn share_routes(
    ctx: RequestContext,
) -> impl Filter<Extract = impl warp::Reply, Error = Rejection> + Clone {
    let qrcode = warp::path!("share" / String / "qrcode")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(handle_qrcode);

    let download = warp::path!("share" / String)
        .and(warp::get())
        .and(warp::header::optional::<String>("x-share-password"))
        .and(warp::query::<HashMap<String, String>>())
        .and(with_ctx(ctx))
        .and_then(handle_download);

    qrcode.or(download)
}

/// Resolve a live entry, mapping the failure modes to their status codes
fn lookup_entry(ctx: &RequestContext, id_text: &str) -> Result<SharedFileEntry, StatusCode> {
    let id: ShareId = id_text.parse().map_err(|_| StatusCode::NOT_FOUND)?;
    let entry = {
        let entries = ctx.entries.read().expect("share registry poisoned");
        entries.get(&id).cloned()
    }
    .ok_or(StatusCode::NOT_FOUND)?;

    let session_timeout = ctx
        .settings
        .read()
        .expect("sharing settings poisoned")
        .session_timeout;
    if entry.is_expired(ctx.time.now(), session_timeout) {
        return Err(StatusCode::GONE);
    }
    Ok(entry)
}

async fn handle_download(
    id_text: String,
    header_password: Option<String>,
    query: HashMap<String, String>,
    ctx: RequestContext,
) -> Result<Response<Body>, Rejection> {
    let entry = match lookup_entry(&ctx, &id_text) {
        Ok(entry) => entry,
        Err(status) => return Ok(plain_response(status)),
    };

    let presented = header_password
        .as_deref()
        .or_else(|| query.get("password").map(String::as_str));
    if !entry.password_matches(presented) {
        return Ok(plain_response(StatusCode::UNAUTHORIZED));
    }

    // Admission control: over-limit downloads are rejected, not queued.
    let handle = match ctx
        .transfers
        .begin(TransferDirection::Download, &entry.display_name, entry.size)
    {
        Ok(handle) => handle,
        Err(_) => return Ok(plain_response(StatusCode::TOO_MANY_REQUESTS)),
    };

    let file = match tokio::fs::File::open(&entry.path).await {
        Ok(file) => file,
        Err(e) => {
            handle.fail(&e.to_string());
            return Ok(plain_response(StatusCode::INTERNAL_SERVER_ERROR));
        }
    };

    let body = Body::wrap_stream(stream_file(file, handle));
    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/octet-stream")
        .header("content-length", entry.size.to_string())
        .header(
            "content-disposition",
            format!("attachment; filename=\"{}\"", entry.display_name),
        )
        .body(body)
        .unwrap_or_else(|_| Response::new(Body::empty()));
    Ok(response)
}

async fn handle_qrcode(
    id_text: String,
    ctx: RequestContext,
) -> Result<Response<Body>, Rejection> {
    let entry = match lookup_entry(&ctx, &id_text) {
        Ok(entry) => entry,
        Err(status) => return Ok(plain_response(status)),
    };

    let png = match entry.qr_png {
        Some(png) => png,
        None => match generate_qr_png(&entry.url) {
            Ok(png) => png,
            Err(_) => return Ok(plain_response(StatusCode::INTERNAL_SERVER_ERROR)),
        },
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "image/png")
        .body(Body::from(png))
        .unwrap_or_else(|_| Response::new(Body::empty()));
    Ok(response)
}

/// Stream file bytes in chunks, observing cancellation at every boundary
fn stream_file(
    file: tokio::fs::File,
    handle: TransferHandle,
) -> impl futures::Stream<Item = Result<Vec<u8>, std::io::Error>> + Send {
    struct StreamState {
        file: tokio::fs::File,
        handle: Option<TransferHandle>,
        transferred: u64,
    }

    futures::stream::unfold(
        StreamState {
            file,
            handle: Some(handle),
            transferred: 0,
        },
        |mut state| async move {
            let handle = state.handle.take()?;
            if handle.is_cancelled() {
                handle.acknowledge_cancelled();
                return None;
            }

            let mut chunk = vec![0u8; STREAM_CHUNK_SIZE];
            match state.file.read(&mut chunk).await {
                Ok(0) => {
                    handle.complete();
                    None
                }
                Ok(n) => {
                    chunk.truncate(n);
                    state.transferred += n as u64;
                    handle.record_progress(state.transferred);
                    state.handle = Some(handle);
                    Some((Ok(chunk), state))
                }
                Err(e) => {
                    handle.fail(&e.to_string());
                    Some((Err(e), state))
                }
            }
        },
    )
}

fn plain_response(status: StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

// ----------------------------------------------------------------------------
// QR Generation
// ----------------------------------------------------------------------------

/// Render a URL into a PNG QR image (8 px per module, 4-module quiet zone)
pub(crate) fn generate_qr_png(url: &str) -> LanlinkResult<Vec<u8>> {
    use image::ImageEncoder;

    const SCALE: u32 = 8;
    const QUIET_MODULES: u32 = 4;

    let code = qrcode::QrCode::new(url.as_bytes())
        .map_err(|e| LanlinkError::config_error(format!("QR encoding failed: {e}")))?;
    let colors = code.to_colors();
    let width = code.width() as u32;
    let size = (width + QUIET_MODULES * 2) * SCALE;

    let img = image::GrayImage::from_fn(size, size, |x, y| {
        let mx = (x / SCALE) as i64 - QUIET_MODULES as i64;
        let my = (y / SCALE) as i64 - QUIET_MODULES as i64;
        let dark = mx >= 0
            && my >= 0
            && (mx as u32) < width
            && (my as u32) < width
            && colors[my as usize * width as usize + mx as usize] == qrcode::Color::Dark;
        if dark {
            image::Luma([0u8])
        } else {
            image::Luma([255u8])
        }
    });

    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(std::io::Cursor::new(&mut png))
        .write_image(img.as_raw(), size, size, image::ExtendedColorType::L8)
        .map_err(|e| LanlinkError::config_error(format!("QR rendering failed: {e}")))?;
    Ok(png)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
