//! Command classification
//!
//! A command is matched against [`RULES`] in order and the first rule whose
//! predicate holds decides the intent. Predicates are case-insensitive
//! substring tests. Arguments are sliced from the original text so file and
//! folder names keep their case.
//!
//! A rule that matches but cannot extract an argument (e.g. "reopen", which
//! contains `open` but no `open `) yields [`Intent::Generate`].

mod dispatcher;

use serde::Serialize;

use crate::actions::{PowerAction, VolumeAction};

pub use dispatcher::{DispatchOutcome, Dispatcher};

/// Everything a command can ask for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", content = "argument", rename_all = "snake_case")]
pub enum Intent {
    /// Path or name of a file, folder or application
    OpenTarget(String),
    /// Absolute URL
    OpenWebsite(String),
    SearchWeb(String),
    SystemInfo,
    Screenshot,
    /// Directory to list; the working directory when absent
    ListFiles(Option<String>),
    VolumeControl(VolumeAction),
    PowerControl(PowerAction),
    CreateFile { name: String, content: String },
    SendKeystroke(Vec<String>),
    /// No rule applies; reply generatively to the full text
    Generate(String),
}

impl Intent {
    /// Stable name used in logs and events
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::OpenTarget(_) => "open_target",
            Intent::OpenWebsite(_) => "open_website",
            Intent::SearchWeb(_) => "search_web",
            Intent::SystemInfo => "system_info",
            Intent::Screenshot => "screenshot",
            Intent::ListFiles(_) => "list_files",
            Intent::VolumeControl(_) => "volume_control",
            Intent::PowerControl(_) => "power_control",
            Intent::CreateFile { .. } => "create_file",
            Intent::SendKeystroke(_) => "send_keystroke",
            Intent::Generate(_) => "generate",
        }
    }
}

/// A command with its lowercase form for matching
///
/// Lowercasing is ASCII-only so byte offsets found in `lower` are valid in
/// `original`.
struct Utterance<'a> {
    original: &'a str,
    lower: String,
}

impl<'a> Utterance<'a> {
    /// Trailing sentence punctuation from the transcriber is dropped
    fn new(original: &'a str) -> Self {
        let original = original
            .trim()
            .trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
            .trim_end();
        Self {
            original,
            lower: original.to_ascii_lowercase(),
        }
    }

    fn contains(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }

    fn contains_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.lower.contains(n))
    }

    /// Original-case text after the first occurrence of `marker`
    fn after(&self, marker: &str) -> Option<&'a str> {
        self.lower
            .find(marker)
            .map(|i| &self.original[i + marker.len()..])
    }

    /// Lowercase text after the first occurrence of `marker`
    fn lower_after(&self, marker: &str) -> Option<&str> {
        self.lower
            .find(marker)
            .map(|i| &self.lower[i + marker.len()..])
    }
}

struct Rule {
    name: &'static str,
    matches: fn(&Utterance) -> bool,
    extract: fn(&Utterance) -> Option<Intent>,
}

/// Classification rules, highest priority first
const RULES: &[Rule] = &[
    Rule {
        name: "open",
        matches: |u| u.contains("open"),
        extract: |u| non_empty(u.after("open ")?).map(|t| Intent::OpenTarget(t.to_string())),
    },
    Rule {
        name: "website",
        matches: |u| u.contains_any(&["website", "site", ".com", ".org"]),
        extract: |u| normalize_url(&u.lower).map(Intent::OpenWebsite),
    },
    Rule {
        name: "search",
        matches: |u| u.contains_any(&["search", "look up", "google"]),
        extract: extract_query,
    },
    Rule {
        name: "system_info",
        matches: |u| u.contains("system info"),
        extract: |_| Some(Intent::SystemInfo),
    },
    Rule {
        name: "screenshot",
        matches: |u| u.contains("screenshot"),
        extract: |_| Some(Intent::Screenshot),
    },
    Rule {
        name: "list_files",
        matches: |u| u.contains("list files"),
        extract: |u| {
            let dir = u.after("list files in ").and_then(non_empty);
            Some(Intent::ListFiles(dir.map(str::to_string)))
        },
    },
    Rule {
        name: "volume",
        matches: |u| u.contains("volume"),
        extract: |u| {
            let action = if u.contains_any(&["up", "increase"]) {
                VolumeAction::Up
            } else if u.contains_any(&["down", "decrease"]) {
                VolumeAction::Down
            } else if u.contains("mute") {
                VolumeAction::ToggleMute
            } else {
                VolumeAction::Unmute
            };
            Some(Intent::VolumeControl(action))
        },
    },
    Rule {
        name: "power",
        matches: |u| u.contains_any(&["shutdown", "shut down", "restart", "reboot"]),
        extract: |u| {
            let action = if u.contains_any(&["cancel", "abort"]) {
                PowerAction::Cancel
            } else if u.contains_any(&["shutdown", "shut down"]) {
                PowerAction::Shutdown
            } else {
                PowerAction::Restart
            };
            Some(Intent::PowerControl(action))
        },
    },
    Rule {
        name: "create_file",
        matches: |u| u.contains_any(&["create file", "make file"]),
        extract: extract_file,
    },
    Rule {
        name: "keystroke",
        matches: |u| u.contains_any(&["press", "keystroke"]),
        extract: extract_keys,
    },
];

/// Classify `command` into exactly one intent
pub fn classify(command: &str) -> Intent {
    let utterance = Utterance::new(command);

    RULES
        .iter()
        .find(|rule| (rule.matches)(&utterance))
        .map(|rule| {
            tracing::trace!(rule = rule.name, "rule matched");
            (rule.extract)(&utterance).unwrap_or_else(|| Intent::Generate(command.to_string()))
        })
        .unwrap_or_else(|| Intent::Generate(command.to_string()))
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

/// Turn "go to example website" style text into `https://example.com`
pub fn normalize_url(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut kept = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        match (words[i], words.get(i + 1)) {
            ("go", Some(&"to")) => i += 2,
            ("website" | "site" | "visit", _) => i += 1,
            (word, _) => {
                kept.push(word);
                i += 1;
            }
        }
    }

    let mut url = kept.concat();
    if url.is_empty() {
        return None;
    }
    if !url.contains('.') {
        url.push_str(".com");
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url.insert_str(0, "https://");
    }
    Some(url)
}

fn extract_query(u: &Utterance) -> Option<Intent> {
    let query = ["search for ", "search ", "look up ", "google "]
        .iter()
        .find_map(|marker| u.lower_after(marker))
        .unwrap_or(&u.lower);
    non_empty(query).map(|q| Intent::SearchWeb(q.to_string()))
}

fn extract_file(u: &Utterance) -> Option<Intent> {
    let rest = u.after("file ")?;
    let rest_lower = rest.to_ascii_lowercase();
    let (name, content) = match rest_lower.find(" with content ") {
        Some(i) => (&rest[..i], rest[i + " with content ".len()..].trim()),
        None => (rest, ""),
    };

    let mut name = non_empty(name)?.to_string();
    if !name.contains('.') {
        name.push_str(".txt");
    }
    Some(Intent::CreateFile {
        name,
        content: content.to_string(),
    })
}

fn extract_keys(u: &Utterance) -> Option<Intent> {
    let combo = u
        .lower_after("press ")
        .or_else(|| u.lower_after("keystroke "))
        .unwrap_or(&u.lower)
        .replace(" plus ", "+");

    let keys: Vec<String> = combo
        .split('+')
        .filter_map(non_empty)
        .map(str::to_string)
        .collect();
    (!keys.is_empty()).then_some(Intent::SendKeystroke(keys))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_keeps_original_case() {
        assert_eq!(
            classify("Open My Report.pdf"),
            Intent::OpenTarget("My Report.pdf".to_string())
        );
    }

    #[test]
    fn test_open_without_target_is_generative() {
        assert_eq!(
            classify("reopen"),
            Intent::Generate("reopen".to_string())
        );
    }

    #[test]
    fn test_open_precedes_search() {
        assert_eq!(
            classify("open google chrome"),
            Intent::OpenTarget("google chrome".to_string())
        );
    }

    #[test]
    fn test_open_precedes_website() {
        assert_eq!(
            classify("open example.com"),
            Intent::OpenTarget("example.com".to_string())
        );
    }

    #[test]
    fn test_website_normalization() {
        assert_eq!(
            classify("go to github website"),
            Intent::OpenWebsite("https://github.com".to_string())
        );
        assert_eq!(
            classify("visit rust-lang.org"),
            Intent::OpenWebsite("https://rust-lang.org".to_string())
        );
        assert_eq!(
            normalize_url("http://example.com"),
            Some("http://example.com".to_string())
        );
        assert_eq!(normalize_url("website"), None);
    }

    #[test]
    fn test_search_markers() {
        assert_eq!(
            classify("search for rust tutorials"),
            Intent::SearchWeb("rust tutorials".to_string())
        );
        assert_eq!(
            classify("Look up the weather"),
            Intent::SearchWeb("the weather".to_string())
        );
        assert_eq!(
            classify("google cats"),
            Intent::SearchWeb("cats".to_string())
        );
    }

    #[test]
    fn test_fixed_actions() {
        assert_eq!(classify("show me system info"), Intent::SystemInfo);
        assert_eq!(classify("take a screenshot"), Intent::Screenshot);
        assert_eq!(classify("list files"), Intent::ListFiles(None));
        assert_eq!(
            classify("list files in Projects"),
            Intent::ListFiles(Some("Projects".to_string()))
        );
    }

    #[test]
    fn test_volume_priority() {
        assert_eq!(
            classify("volume up and mute"),
            Intent::VolumeControl(VolumeAction::Up)
        );
        assert_eq!(
            classify("decrease the volume"),
            Intent::VolumeControl(VolumeAction::Down)
        );
        assert_eq!(
            classify("mute volume"),
            Intent::VolumeControl(VolumeAction::ToggleMute)
        );
        assert_eq!(
            classify("volume"),
            Intent::VolumeControl(VolumeAction::Unmute)
        );
    }

    #[test]
    fn test_power_sub_actions() {
        assert_eq!(
            classify("shut down the computer"),
            Intent::PowerControl(PowerAction::Shutdown)
        );
        assert_eq!(
            classify("reboot"),
            Intent::PowerControl(PowerAction::Restart)
        );
        assert_eq!(
            classify("cancel the shutdown"),
            Intent::PowerControl(PowerAction::Cancel)
        );
    }

    #[test]
    fn test_create_file_extension() {
        assert_eq!(
            classify("create file notes"),
            Intent::CreateFile {
                name: "notes.txt".to_string(),
                content: String::new()
            }
        );
        assert_eq!(
            classify("make file notes.md"),
            Intent::CreateFile {
                name: "notes.md".to_string(),
                content: String::new()
            }
        );
    }

    #[test]
    fn test_create_file_with_content() {
        assert_eq!(
            classify("create file Todo with content Buy milk"),
            Intent::CreateFile {
                name: "Todo.txt".to_string(),
                content: "Buy milk".to_string()
            }
        );
    }

    #[test]
    fn test_keystroke_combo() {
        assert_eq!(
            classify("press Ctrl+Shift+T"),
            Intent::SendKeystroke(vec![
                "ctrl".to_string(),
                "shift".to_string(),
                "t".to_string()
            ])
        );
        assert_eq!(
            classify("press alt plus tab"),
            Intent::SendKeystroke(vec!["alt".to_string(), "tab".to_string()])
        );
    }

    #[test]
    fn test_trailing_punctuation_is_ignored() {
        assert_eq!(
            classify("Open downloads."),
            Intent::OpenTarget("downloads".to_string())
        );
        assert_eq!(
            classify("Create file notes."),
            Intent::CreateFile {
                name: "notes.txt".to_string(),
                content: String::new()
            }
        );
        assert_eq!(
            classify("Press Ctrl+C."),
            Intent::SendKeystroke(vec!["ctrl".to_string(), "c".to_string()])
        );
        assert_eq!(
            classify("Search for rust lifetimes?"),
            Intent::SearchWeb("rust lifetimes".to_string())
        );
        assert_eq!(
            classify("Tell me a joke!"),
            Intent::Generate("Tell me a joke!".to_string())
        );
    }

    #[test]
    fn test_unmatched_is_generative() {
        assert_eq!(
            classify("asdkjf random talk"),
            Intent::Generate("asdkjf random talk".to_string())
        );
    }

    #[test]
    fn test_rule_order_is_pinned() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "open",
                "website",
                "search",
                "system_info",
                "screenshot",
                "list_files",
                "volume",
                "power",
                "create_file",
                "keystroke"
            ]
        );
    }
}
