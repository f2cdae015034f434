//! Classification of free-text log bodies into the markers the reconstructor
//! and the aggregators dispatch on. All pattern matching over message text
//! lives here.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

const CONTEXT_MARKER: &str = "[Assistant][call_llm] Received question:";
const CURRENT_INPUT_PREFIX: &str = "[Current input: ";

#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    Start {
        query: String,
    },
    Context {
        context_query: Option<String>,
        current_input: Option<String>,
    },
    End {
        seconds: f64,
    },
    ChatOutput {
        answer: String,
    },
    Step {
        label: String,
    },
    Unrecognized,
}

fn start_re() -> &'static Regex {
    static START_RE: OnceLock<Regex> = OnceLock::new();
    START_RE.get_or_init(|| {
        Regex::new(r"\[BPAgent\]\[inference\] Query from user .*?: .*? -- (?s:(.*))$")
            .expect("valid start marker regex")
    })
}

fn context_query_re() -> &'static Regex {
    static CONTEXT_QUERY_RE: OnceLock<Regex> = OnceLock::new();
    CONTEXT_QUERY_RE.get_or_init(|| {
        Regex::new(r"\[Context query: (.*?)\]").expect("valid context query regex")
    })
}

fn end_re() -> &'static Regex {
    static END_RE: OnceLock<Regex> = OnceLock::new();
    END_RE.get_or_init(|| {
        Regex::new(r"\[SlashGPTServer\]\[inference\] Response time: ([\d.]+)")
            .expect("valid end marker regex")
    })
}

fn chat_output_re() -> &'static Regex {
    static CHAT_OUTPUT_RE: OnceLock<Regex> = OnceLock::new();
    CHAT_OUTPUT_RE.get_or_init(|| {
        Regex::new(r"\[BPAgent\]\[run_proc\] Output for Chat:(?s:(.*))$")
            .expect("valid chat output regex")
    })
}

fn step_re() -> &'static Regex {
    static STEP_RE: OnceLock<Regex> = OnceLock::new();
    STEP_RE.get_or_init(|| {
        Regex::new(r"(?m)Running step:\s*(\S.*?)\s*$").expect("valid step marker regex")
    })
}

/// Payload between the `[Current input: ` prefix and the last `]` of the
/// body. The payload itself may contain brackets.
fn extract_current_input(body: &str) -> Option<String> {
    let start = body.find(CURRENT_INPUT_PREFIX)?;
    let last_bracket = body.rfind(']')?;
    if last_bracket <= start {
        return None;
    }

    let payload = &body[start + CURRENT_INPUT_PREFIX.len()..last_bracket];
    Some(payload.replace("\\n", "\n"))
}

pub fn is_context_marker(body: &str) -> bool {
    body.contains(CONTEXT_MARKER)
}

pub fn classify(body: &str) -> Marker {
    if let Some(cap) = start_re().captures(body) {
        let query = cap
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        return Marker::Start { query };
    }

    if is_context_marker(body) {
        let context_query = context_query_re()
            .captures(body)
            .and_then(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()));
        return Marker::Context {
            context_query,
            current_input: extract_current_input(body),
        };
    }

    if let Some(cap) = end_re().captures(body) {
        let raw = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
        return match raw.parse::<f64>() {
            Ok(seconds) if seconds.is_finite() => Marker::End { seconds },
            _ => {
                debug!("skipping malformed response time marker: {raw:?}");
                Marker::Unrecognized
            }
        };
    }

    if let Some(cap) = chat_output_re().captures(body) {
        let answer = cap
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        return Marker::ChatOutput { answer };
    }

    if let Some(cap) = step_re().captures(body) {
        if let Some(label) = cap.get(1) {
            return Marker::Step {
                label: label.as_str().to_string(),
            };
        }
    }

    Marker::Unrecognized
}
