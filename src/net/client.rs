//! Generation request orchestrator.
//!
//! A single worker thread owns the blocking HTTP client; the UI thread
//! submits snapshots through a channel and drains tagged completions each
//! frame. Validation failures (no image, non-positive dimensions) are
//! reported synchronously from `submit` and never reach the network.
//!
//! Every accepted submission carries a monotonically increasing id and the
//! worker sends exactly one completion for it, so `Submitting` always
//! terminates and stale completions are detectable by id comparison.

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::net::protocol::{
    GenerationRequest, GenerationResult, ServiceConfig, SubmitError,
};

enum GenerateCommand {
    Submit {
        id: u64,
        url: String,
        request: GenerationRequest,
    },
    Stop,
}

pub struct GenerateEngine {
    tx_cmd: Sender<GenerateCommand>,
    rx_result: Receiver<(u64, Result<GenerationResult, SubmitError>)>,
    last_error: Arc<Mutex<Option<String>>>,
    next_id: u64,
    thread_handle: Option<JoinHandle<()>>,
}

impl GenerateEngine {
    pub fn new() -> Self {
        let (tx_cmd, rx_cmd) = channel::unbounded::<GenerateCommand>();
        let (tx_result, rx_result) = channel::unbounded();
        let last_error = Arc::new(Mutex::new(None));
        let last_error_clone = Arc::clone(&last_error);

        let thread_handle = thread::spawn(move || {
            generate_thread(rx_cmd, tx_result, last_error_clone);
        });

        Self {
            tx_cmd,
            rx_result,
            last_error,
            next_id: 0,
            thread_handle: Some(thread_handle),
        }
    }

    /// Validate and enqueue one generation request against the given
    /// service. Returns the id its completion will carry; a rejected request
    /// never touches the network.
    pub fn submit(
        &mut self,
        config: &ServiceConfig,
        request: GenerationRequest,
    ) -> Result<u64, SubmitError> {
        if request.image.bytes.is_empty() {
            return Err(SubmitError::NoImage);
        }
        request.params.validate()?;

        self.next_id += 1;
        let id = self.next_id;
        *self.last_error.lock() = None;
        let _ = self.tx_cmd.send(GenerateCommand::Submit {
            id,
            url: config.generate_url(),
            request,
        });
        Ok(id)
    }

    pub fn try_recv_result(&self) -> Option<(u64, Result<GenerationResult, SubmitError>)> {
        self.rx_result.try_recv().ok()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn stop(&self) {
        let _ = self.tx_cmd.send(GenerateCommand::Stop);
    }
}

impl Drop for GenerateEngine {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(GenerateCommand::Stop);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

fn generate_thread(
    rx_cmd: Receiver<GenerateCommand>,
    tx_result: Sender<(u64, Result<GenerationResult, SubmitError>)>,
    last_error: Arc<Mutex<Option<String>>>,
) {
    let client = match reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            // Keep answering so no submission is ever left in flight.
            let message = format!("HTTP client init failed: {e}");
            *last_error.lock() = Some(message.clone());
            loop {
                match rx_cmd.recv() {
                    Ok(GenerateCommand::Submit { id, .. }) => {
                        let err = SubmitError::Network(message.clone());
                        if tx_result.send((id, Err(err))).is_err() {
                            return;
                        }
                    }
                    Ok(GenerateCommand::Stop) | Err(_) => return,
                }
            }
        }
    };
    loop {
        let (id, url, request) = match rx_cmd.recv() {
            Ok(GenerateCommand::Submit { id, url, request }) => (id, url, request),
            Ok(GenerateCommand::Stop) | Err(_) => return,
        };

        let result = perform_submit(&client, &url, request);
        if let Err(e) = &result {
            log::warn!("generation request {id} failed: {e}");
            *last_error.lock() = Some(e.to_string());
        } else {
            log::info!("generation request {id} succeeded");
        }
        if tx_result.send((id, result)).is_err() {
            return;
        }
    }
}

fn perform_submit(
    client: &reqwest::blocking::Client,
    url: &str,
    request: GenerationRequest,
) -> Result<GenerationResult, SubmitError> {
    log::info!(
        "submitting {} ({} bytes) to {url}",
        request.image.file_name,
        request.image.bytes.len()
    );

    let image = reqwest::blocking::multipart::Part::bytes(request.image.bytes)
        .file_name(request.image.file_name)
        .mime_str("image/png")
        .map_err(|e| SubmitError::Network(e.to_string()))?;

    let mut form = reqwest::blocking::multipart::Form::new().part("color_image", image);
    for (name, value) in request.params.form_fields() {
        form = form.text(name, value);
    }

    let response = client
        .post(url)
        .multipart(form)
        .send()
        .map_err(|e| SubmitError::Network(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|e| SubmitError::Network(e.to_string()))?;

    if !status.is_success() {
        // The service reports failures as {"error": "..."}; fall back to the
        // raw body when it does not.
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body);
        return Err(SubmitError::Service {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| SubmitError::MalformedResponse(e.to_string()))
}
