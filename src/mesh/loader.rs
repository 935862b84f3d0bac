//! Fetch-and-decode worker for generated mesh files.
//!
//! The UI thread never blocks: `request` hands a job to a background thread
//! and returns the request id immediately. Every job produces exactly one
//! `Finished` event; the caller compares ids so that a stale completion can
//! never overwrite the result of a newer request.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::mesh::error::LoadError;
use crate::mesh::geometry::Geometry;
use crate::mesh::{MeshFormat, decode_ply, decode_stl};

pub enum LoadEvent {
    Decoding { id: u64 },
    Finished { id: u64, result: Result<Geometry, LoadError> },
}

struct LoadJob {
    id: u64,
    url: String,
    format: MeshFormat,
}

enum LoaderCommand {
    Load(LoadJob),
    Stop,
}

pub struct MeshLoader {
    tx_cmd: Sender<LoaderCommand>,
    rx_event: Receiver<LoadEvent>,
    last_error: Arc<Mutex<Option<String>>>,
    next_id: u64,
    thread_handle: Option<JoinHandle<()>>,
}

impl MeshLoader {
    pub fn new() -> Self {
        let (tx_cmd, rx_cmd) = channel::unbounded::<LoaderCommand>();
        let (tx_event, rx_event) = channel::unbounded::<LoadEvent>();
        let last_error = Arc::new(Mutex::new(None));
        let last_error_clone = Arc::clone(&last_error);

        let thread_handle = thread::spawn(move || {
            loader_thread(rx_cmd, tx_event, last_error_clone);
        });

        Self {
            tx_cmd,
            rx_event,
            last_error,
            next_id: 0,
            thread_handle: Some(thread_handle),
        }
    }

    /// Start fetching a mesh; returns the id its completion event will carry.
    pub fn request(&mut self, url: &str, format: MeshFormat) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        *self.last_error.lock() = None;
        let _ = self.tx_cmd.send(LoaderCommand::Load(LoadJob {
            id,
            url: url.to_string(),
            format,
        }));
        id
    }

    pub fn try_recv_event(&self) -> Option<LoadEvent> {
        self.rx_event.try_recv().ok()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn stop(&self) {
        let _ = self.tx_cmd.send(LoaderCommand::Stop);
    }
}

impl Drop for MeshLoader {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(LoaderCommand::Stop);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

fn loader_thread(
    rx_cmd: Receiver<LoaderCommand>,
    tx_event: Sender<LoadEvent>,
    last_error: Arc<Mutex<Option<String>>>,
) {
    let client = match reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            // Keep answering so no load is ever left in flight.
            let message = format!("HTTP client init failed: {e}");
            *last_error.lock() = Some(message.clone());
            loop {
                match rx_cmd.recv() {
                    Ok(LoaderCommand::Load(job)) => {
                        let event = LoadEvent::Finished {
                            id: job.id,
                            result: Err(LoadError::Fetch(message.clone())),
                        };
                        if tx_event.send(event).is_err() {
                            return;
                        }
                    }
                    Ok(LoaderCommand::Stop) | Err(_) => return,
                }
            }
        }
    };

    loop {
        let mut job = match rx_cmd.recv() {
            Ok(LoaderCommand::Load(job)) => job,
            Ok(LoaderCommand::Stop) | Err(_) => return,
        };

        // Coalesce: if newer jobs are already queued, only the latest one
        // can ever be committed, so skip straight to it.
        while let Ok(cmd) = rx_cmd.try_recv() {
            match cmd {
                LoaderCommand::Load(newer) => job = newer,
                LoaderCommand::Stop => return,
            }
        }

        let id = job.id;
        let result = fetch_and_decode(&client, &job, &tx_event);
        if let Err(e) = &result {
            log::warn!("mesh load {id} failed: {e}");
            *last_error.lock() = Some(e.to_string());
        }
        if tx_event.send(LoadEvent::Finished { id, result }).is_err() {
            return;
        }
    }
}

fn fetch_and_decode(
    client: &reqwest::blocking::Client,
    job: &LoadJob,
    tx_event: &Sender<LoadEvent>,
) -> Result<Geometry, LoadError> {
    log::info!("fetching {} mesh from {}", job.format, job.url);

    let response = client
        .get(&job.url)
        .send()
        .map_err(|e| LoadError::Fetch(e.to_string()))?;
    if !response.status().is_success() {
        return Err(LoadError::Fetch(format!(
            "server returned {}",
            response.status()
        )));
    }
    let bytes = response
        .bytes()
        .map_err(|e| LoadError::Fetch(e.to_string()))?;

    let _ = tx_event.send(LoadEvent::Decoding { id: job.id });

    let geometry = match job.format {
        MeshFormat::Stl => decode_stl(&bytes)?,
        MeshFormat::Ply => decode_ply(&bytes)?,
    };
    log::info!(
        "decoded {} triangles ({} vertices, colors: {})",
        geometry.triangle_count(),
        geometry.vertex_count(),
        geometry.has_colors()
    );
    Ok(geometry)
}
