//! In-process doubles for unit tests

use async_trait::async_trait;
use bytes::Bytes;
use chrono::TimeDelta;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::fetcher::{Fetcher, Transport, TransportError, TransportResponse};
use crate::proxy::{self, ProxyController, ProxyError};
use crate::registry::Registry;
use crate::storage::FilterStore;

pub type EventLog = Arc<Mutex<Vec<String>>>;

enum Scripted {
    Respond(u16, Bytes),
    Fail(String),
}

/// Transport answering from a fixed url table and recording every call
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Scripted>>,
    log: EventLog,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            log: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Scripted::Respond(status, Bytes::copy_from_slice(body.as_bytes())),
        );
    }

    pub fn fail(&self, url: &str, message: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Scripted::Fail(message.to_string()));
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Urls requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("get ").map(str::to_string))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.log.lock().unwrap().push(format!("get {}", url));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = match self.routes.lock().unwrap().get(url) {
            Some(Scripted::Respond(status, body)) => Ok(TransportResponse {
                status: *status,
                body: body.clone(),
            }),
            Some(Scripted::Fail(message)) => Err(TransportError(message.clone())),
            None => Err(TransportError(format!("no route for {}", url))),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Consumer double recording `close`/`restart` calls
pub struct RecordingController {
    log: EventLog,
    failing: bool,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::sharing(Arc::new(Mutex::new(Vec::new())))
    }

    /// Record into an existing log, interleaved with transport calls
    pub fn sharing(log: EventLog) -> Self {
        Self {
            log,
            failing: false,
        }
    }

    /// Records calls but reports an error from both hooks
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Default for RecordingController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProxyController for RecordingController {
    async fn close(&self) -> proxy::Result<()> {
        self.log.lock().unwrap().push("close".to_string());
        if self.failing {
            return Err(ProxyError::Close("consumer busy".to_string()));
        }
        Ok(())
    }

    async fn restart(&self) -> proxy::Result<()> {
        self.log.lock().unwrap().push("restart".to_string());
        if self.failing {
            return Err(ProxyError::Restart("reload failed".to_string()));
        }
        Ok(())
    }
}

/// Registry over `dir` with a one-day refresh period
pub fn registry_in(dir: &Path, transport: Arc<ScriptedTransport>) -> Arc<Registry> {
    let fetcher = Arc::new(Fetcher::new(transport));
    let store = FilterStore::new(dir, "txt");
    Arc::new(Registry::new(fetcher, store, TimeDelta::hours(24)))
}
