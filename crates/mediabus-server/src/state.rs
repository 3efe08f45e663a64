//! Shared handler state. HttpSurface is stateless between requests; this is
//! the one clonable bundle every handler is given.

use mediabus_core::Runtime;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Runtime,
    pub hostname: String,
    pub port: u16,
}

impl AppState {
    pub fn new(runtime: Runtime, hostname: String, port: u16) -> Self {
        Self { runtime, hostname, port }
    }

    /// The directory clients currently see. `None` means the host has not
    /// chosen a shared folder yet; callers should surface `ResourceUnavailable`.
    pub fn shared_folder(&self) -> Option<std::path::PathBuf> {
        self.runtime.settings().shared_folder_path.map(std::path::PathBuf::from)
    }
}
