// -----------
// --- CLI ---
// -----------

mod daemon;
mod parser;
mod reload;
mod start;
mod status;
mod stop;

use crate::config::HttpdConfig;
use reload::reload_agent;
use start::{start_agent, start_daemon_child};
use status::agent_status;
use stop::stop_agent;

pub static TMP_DIR: &str = "/tmp/hellod";
pub static HASH_FILE: &str = "/tmp/hellod/config.hash";
pub static PID_FILE: &str = "/tmp/hellod/agent.pid";
pub static STATE_FILE: &str = "/tmp/hellod/agent.json";
pub static STDOUT_LOG: &str = "/tmp/hellod/stdout.log";
pub static STDERR_LOG: &str = "/tmp/hellod/stderr.log";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub httpd: HttpdConfig,
    pub start_daemon: bool,
}

#[derive(Debug, Clone)]
pub enum ParsedAction {
    Start(AgentConfig),
    Daemon(AgentConfig),
    Stop,
    Status,
    Reload,
}

pub fn exec() {
    if let Some(action) = parser::parse() {
        match action {
            ParsedAction::Start(config) => start_agent(config),
            ParsedAction::Daemon(config) => start_daemon_child(config),
            ParsedAction::Stop => stop_agent(),
            ParsedAction::Status => agent_status(),
            ParsedAction::Reload => reload_agent(),
        }
    }
}
