// ------------------
// --- CLI PARSER ---
// ------------------

use super::{AgentConfig, ParsedAction};
use crate::config;
use std::env::args;

const HELLOD_VSN: &str = concat!("v", env!("CARGO_PKG_VERSION"));

const HELP_TEXT: &str = concat!(
    "hellod ",
    "v",
    env!("CARGO_PKG_VERSION"),
    r#"

A hello-world HTTP responder that runs as a background agent.
Every connection gets the same fixed response; nothing is parsed.

USAGE:
    start               Start in daemon mode
    run                 Start in blocking mode
    status              Get the agent's status
    reload              Ask a running agent to re-read its configuration
    stop                Stop the agent
    version             Print version
    help                Print this help text

CONFIGURATION (environment variables):
    $HELLOD_PORT            Listening port (1-65535, default 8888)
    $HELLOD_MAX_CLIENTS     Maximum concurrent connections (1-65535, default 5)
    $HELLOD_QUEUE_DEPTH     Accept backlog depth (1-128, default 32)
    $HELLOD_CONFIG          Optional path to a JSON file overriding the above
    $HELLOD_SUPERVISOR_PID  Exit immediately if this process disappears"#
);

pub fn parse() -> Option<ParsedAction> {
    let args = args()
        .collect::<Vec<String>>()
        .iter()
        .skip(1)
        .map(|s| s.to_lowercase())
        .collect::<Vec<String>>();

    if args.is_empty() {
        return help();
    }

    if args.len() == 1 && args[0] == "help" {
        return help();
    }

    if args.len() == 1 && args[0] == "version" {
        println!("{HELLOD_VSN}");
        return None;
    }

    if args.len() == 1 && args[0] == "stop" {
        return Some(ParsedAction::Stop);
    }

    if args.len() == 1 && args[0] == "status" {
        return Some(ParsedAction::Status);
    }

    if args.len() == 1 && args[0] == "reload" {
        return Some(ParsedAction::Reload);
    }

    if args.len() == 1 && (args[0] == "run" || args[0] == "start" || args[0] == "daemon") {
        let start_daemon = args[0] == "start" || args[0] == "daemon";
        match get_agent_config(start_daemon) {
            Ok(config) => {
                if args[0] == "daemon" {
                    return Some(ParsedAction::Daemon(config));
                } else {
                    return Some(ParsedAction::Start(config));
                }
            }
            Err(e) => {
                eprintln!("failed: {e:#}");
                return None;
            }
        }
    }

    eprintln!("Unknown Command: {}", args.join(" "));
    eprintln!();
    eprintln!("{HELP_TEXT}");
    None
}

fn help() -> Option<ParsedAction> {
    println!("{HELP_TEXT}");
    None
}

fn get_agent_config(start_daemon: bool) -> anyhow::Result<AgentConfig> {
    let httpd = config::load()?;

    Ok(AgentConfig {
        httpd,
        start_daemon,
    })
}
