use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

pub const RESULT_START_MARKER: &str = "RESULT_JSON_START";
pub const RESULT_END_MARKER: &str = "RESULT_JSON_END";

/// Number of trailing characters of each stream kept for diagnostics.
pub const EXCERPT_CHARS: usize = 2000;

static MARKED_PAYLOAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)RESULT_JSON_START\r?\n(.*?)\r?\nRESULT_JSON_END")
        .expect("marker pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NoMarkerFound,
    MalformedJson,
    NonZeroExit,
    Timeout,
    SpawnError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NoMarkerFound => "no_marker_found",
            FailureReason::MalformedJson => "malformed_json",
            FailureReason::NonZeroExit => "non_zero_exit",
            FailureReason::Timeout => "timeout",
            FailureReason::SpawnError => "spawn_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionFailure {
    pub reason: FailureReason,
    pub exit_code: Option<i32>,
    pub raw_output_excerpt: String,
    pub stderr_excerpt: String,
}

pub type ExtractedResult = Result<Map<String, Value>, ExtractionFailure>;

/// Outcome of a single search strategy over stdout.
#[derive(Debug, PartialEq)]
enum Probe {
    Missing,
    Parsed(Map<String, Value>),
    Malformed,
}

/// Pulls the analyzer's JSON object out of its mixed stdout.
///
/// Sentinel-delimited payloads win over a bare trailing `{...}` block. The exit
/// code never short-circuits extraction: a failing analyzer may still have
/// printed a usable result. It is attached to every failure instead.
pub fn extract(exit_code: Option<i32>, stdout: &str, stderr: &str) -> ExtractedResult {
    let probe = match marked_payload(stdout) {
        Probe::Missing => last_brace_block(stdout),
        found => found,
    };

    let reason = match probe {
        Probe::Parsed(payload) => return Ok(payload),
        Probe::Malformed => FailureReason::MalformedJson,
        Probe::Missing if matches!(exit_code, Some(code) if code != 0) => {
            FailureReason::NonZeroExit
        }
        Probe::Missing => FailureReason::NoMarkerFound,
    };

    Err(ExtractionFailure {
        reason,
        exit_code,
        raw_output_excerpt: excerpt(stdout),
        stderr_excerpt: excerpt(stderr),
    })
}

fn marked_payload(stdout: &str) -> Probe {
    match MARKED_PAYLOAD.captures(stdout) {
        Some(caps) => parse_object(caps[1].trim()),
        None => Probe::Missing,
    }
}

/// Largest `{...}` region ending at the final `}` that parses as an object.
fn last_brace_block(stdout: &str) -> Probe {
    let Some(end) = stdout.rfind('}') else {
        return Probe::Missing;
    };
    let candidate = &stdout[..=end];

    let mut saw_open = false;
    for (start, _) in candidate.match_indices('{') {
        saw_open = true;
        if let Probe::Parsed(map) = parse_object(&candidate[start..]) {
            return Probe::Parsed(map);
        }
    }

    if saw_open {
        Probe::Malformed
    } else {
        Probe::Missing
    }
}

fn parse_object(text: &str) -> Probe {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Probe::Parsed(map),
        _ => Probe::Malformed,
    }
}

/// Trailing `EXCERPT_CHARS` characters of `text`.
pub fn excerpt(text: &str) -> String {
    let count = text.chars().count();
    if count <= EXCERPT_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_block_without_open_brace_is_missing() {
        assert_eq!(last_brace_block("done }"), Probe::Missing);
    }

    #[test]
    fn brace_block_skips_leading_diagnostic_braces() {
        let probe = last_brace_block("progress {step 1}\n{\"a\": 1}");
        match probe {
            Probe::Parsed(map) => assert_eq!(map["a"], 1),
            other => panic!("expected parsed block, got {other:?}"),
        }
    }

    #[test]
    fn non_object_json_is_malformed() {
        assert_eq!(parse_object("[1, 2]"), Probe::Malformed);
        assert_eq!(parse_object("\"text\""), Probe::Malformed);
    }

    #[test]
    fn excerpt_keeps_tail_on_char_boundaries() {
        let text = format!("{}{}", "é".repeat(10), "x".repeat(EXCERPT_CHARS));
        let cut = excerpt(&text);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS);
        assert!(cut.chars().all(|c| c == 'x'));
    }
}
