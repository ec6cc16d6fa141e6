//! Runs the action an intent asks for

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, trace};

use super::{classify, Intent};
use crate::actions::{ActionResult, SystemActions};
use crate::llm::GenerativeFallback;

const SEARCH_URL: &str = "https://www.google.com/search?q=";

/// What the agent speaks after a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub intent: &'static str,
    pub response: String,
    /// False only when the reply came from the generative fallback
    pub action_taken: bool,
    pub succeeded: bool,
}

/// Classifies commands and invokes at most one action per command
pub struct Dispatcher {
    actions: Arc<dyn SystemActions>,
    fallback: GenerativeFallback,
}

impl Dispatcher {
    pub fn new(actions: Arc<dyn SystemActions>, fallback: GenerativeFallback) -> Self {
        Self { actions, fallback }
    }

    /// Handle one command; `None` for commands too short to act on
    pub fn dispatch(&self, command: &str) -> Option<DispatchOutcome> {
        if command.trim().chars().count() < 2 {
            trace!(command, "ignoring short command");
            return None;
        }

        let intent = classify(command);
        let kind = intent.kind();
        debug!(intent = kind, ?intent, "classified command");

        let result = match intent {
            Intent::Generate(text) => {
                let response = self.fallback.respond(&text);
                return Some(DispatchOutcome {
                    intent: kind,
                    response,
                    action_taken: false,
                    succeeded: true,
                });
            }
            Intent::OpenTarget(target) => self.actions.open_target(&target),
            Intent::OpenWebsite(url) => self.actions.open_url(&url),
            Intent::SearchWeb(query) => self.search(&query),
            Intent::SystemInfo => self.actions.system_info(),
            Intent::Screenshot => self.actions.screenshot(),
            Intent::ListFiles(dir) => self.actions.list_files(dir.as_deref().map(Path::new)),
            Intent::VolumeControl(action) => self.actions.volume(action),
            Intent::PowerControl(action) => self.actions.power(action),
            Intent::CreateFile { name, content } => self.actions.create_file(&name, &content),
            Intent::SendKeystroke(keys) => self.actions.send_keystroke(&keys),
        };

        info!(intent = kind, succeeded = result.succeeded, "action finished");
        Some(DispatchOutcome {
            intent: kind,
            response: result.message,
            action_taken: true,
            succeeded: result.succeeded,
        })
    }

    fn search(&self, query: &str) -> ActionResult {
        let opened = self.actions.open_url(&search_url(query));
        if opened.succeeded {
            ActionResult::ok(format!("Searching for {query}"))
        } else {
            ActionResult::failed("Couldn't perform search")
        }
    }
}

/// Google search URL with `+` between encoded words
pub fn search_url(query: &str) -> String {
    let encoded: Vec<String> = query
        .split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect();
    format!("{SEARCH_URL}{}", encoded.join("+"))
}
