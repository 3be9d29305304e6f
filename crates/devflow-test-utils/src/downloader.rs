//! Scripted HTTP downloads

use devflow_sync::{DownloadFailure, Downloader};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default)]
struct State {
    served: HashMap<String, Vec<u8>>,
    calls: Vec<String>,
}

/// [`Downloader`] that serves registered URLs and 404s everything else
#[derive(Debug, Clone, Default)]
pub struct FakeDownloader {
    state: Arc<Mutex<State>>,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`
    pub fn serve(&self, url: &str, body: &[u8]) {
        self.state
            .lock()
            .served
            .insert(url.to_string(), body.to_vec());
    }

    /// URLs requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }
}

impl Downloader for FakeDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadFailure> {
        let mut state = self.state.lock();
        state.calls.push(url.to_string());
        let body = state
            .served
            .get(url)
            .ok_or_else(|| DownloadFailure::new(url, "HTTP status 404 Not Found"))?;
        std::fs::write(dest, body).map_err(|e| DownloadFailure::new(url, e.to_string()))
    }
}
