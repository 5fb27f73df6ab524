// --------------------------
// --- HTTP SERVER MODULE ---
// --------------------------

mod mux;
mod response;
mod server;

use crate::config::HttpdConfig;
use anyhow::Result;

pub fn start_server(config: HttpdConfig) -> Result<()> {
    server::serve(config)
}
