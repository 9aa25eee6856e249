//! Line parser
//!
//! Turns one raw text line into zero or more [`Sample`]s.
//!
//! Grammar:
//! - the line is trimmed and split on commas and whitespace, empty tokens
//!   are discarded
//! - a token starting with `(` opens a group: the numeral after `(` is the
//!   shared X, following tokens are Y values until one ends in `)`
//! - any other token is a bare Y value with no X
//!
//! Malformed tokens never fail the line; they are skipped and reported as
//! [`ParseDiagnostic`]s. A line yielding no samples is free text.

use serde::Serialize;
use tracing::warn;

use crate::types::Sample;

// ============================================================================
// Diagnostics
// ============================================================================

/// Where in the grammar a token failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The numeral after an opening `(`
    GroupX,
    /// A Y value inside a group
    GroupValue,
    /// The numeral before a closing `)`
    GroupClose,
    /// A standalone value outside any group
    BareValue,
}

/// A token that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseDiagnostic {
    pub token: String,
    pub kind: DiagnosticKind,
}

impl std::fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self.kind {
            DiagnosticKind::GroupX => "group X",
            DiagnosticKind::GroupValue => "group value",
            DiagnosticKind::GroupClose => "closing ')' value",
            DiagnosticKind::BareValue => "value",
        };
        write!(f, "Unable to parse {what}: \"{}\"", self.token)
    }
}

/// Samples plus the diagnostics raised while producing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLine {
    pub samples: Vec<Sample>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// What a line turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    Data(Vec<Sample>),
    /// Not telemetry; the trimmed line is kept for the log
    Text(String),
}

// ============================================================================
// Parsing
// ============================================================================

/// Finite decimal numbers only; `nan` and `inf` are rejected.
fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a line, returning samples and diagnostics without logging.
pub fn parse_line_detailed(line: &str) -> ParsedLine {
    let mut parsed = ParsedLine::default();
    let tokens: Vec<&str> = line
        .trim()
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        i += 1;

        let Some(rest) = token.strip_prefix('(') else {
            match parse_number(token) {
                Some(y) => parsed.samples.push(Sample::new(y)),
                None => parsed.diagnose(token, DiagnosticKind::BareValue),
            }
            continue;
        };

        let Some(x) = parse_number(rest) else {
            parsed.diagnose(token, DiagnosticKind::GroupX);
            continue;
        };

        while i < tokens.len() {
            let token = tokens[i];
            i += 1;
            if let Some(value) = token.strip_suffix(')') {
                // A bare ")" just closes the group.
                if !value.is_empty() {
                    match parse_number(value) {
                        Some(y) => parsed.samples.push(Sample::with_x(x, y)),
                        None => parsed.diagnose(token, DiagnosticKind::GroupClose),
                    }
                }
                break;
            }
            match parse_number(token) {
                Some(y) => parsed.samples.push(Sample::with_x(x, y)),
                None => parsed.diagnose(token, DiagnosticKind::GroupValue),
            }
        }
    }

    parsed
}

impl ParsedLine {
    fn diagnose(&mut self, token: &str, kind: DiagnosticKind) {
        self.diagnostics.push(ParseDiagnostic {
            token: token.to_string(),
            kind,
        });
    }
}

/// Parse a line into samples, logging each skipped token.
pub fn parse_line(line: &str) -> Vec<Sample> {
    let parsed = parse_line_detailed(line);
    for diagnostic in &parsed.diagnostics {
        warn!("[LineParser] {} from \"{}\"", diagnostic, line.trim());
    }
    parsed.samples
}

/// Decide whether a line is telemetry or free text.
pub fn classify_line(line: &str) -> LineEvent {
    let samples = parse_line(line);
    if samples.is_empty() {
        LineEvent::Text(line.trim().to_string())
    } else {
        LineEvent::Data(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy(samples: &[Sample]) -> Vec<(Option<f64>, f64)> {
        samples.iter().map(|s| (s.x, s.y)).collect()
    }

    #[test]
    fn bare_values_have_no_x() {
        let samples = parse_line("1, 2, 3");
        assert_eq!(xy(&samples), vec![(None, 1.0), (None, 2.0), (None, 3.0)]);
    }

    #[test]
    fn single_pair() {
        assert_eq!(xy(&parse_line("(5,10)")), vec![(Some(5.0), 10.0)]);
    }

    #[test]
    fn group_shares_x() {
        assert_eq!(
            xy(&parse_line("(1,2,3)")),
            vec![(Some(1.0), 2.0), (Some(1.0), 3.0)]
        );
    }

    #[test]
    fn whitespace_and_commas_mix() {
        let samples = parse_line("  (0.5, 1.5)\t(0.5 ,-2)  7  ");
        assert_eq!(
            xy(&samples),
            vec![(Some(0.5), 1.5), (Some(0.5), -2.0), (None, 7.0)]
        );
    }

    #[test]
    fn text_line_has_no_samples() {
        let parsed = parse_line_detailed("abc");
        assert!(parsed.samples.is_empty());
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::BareValue);
        assert_eq!(classify_line("  abc "), LineEvent::Text("abc".into()));
    }

    #[test]
    fn bad_tokens_are_skipped() {
        let parsed = parse_line_detailed("1, x, 3");
        assert_eq!(xy(&parsed.samples), vec![(None, 1.0), (None, 3.0)]);
        assert_eq!(parsed.diagnostics[0].token, "x");
    }

    #[test]
    fn bad_value_inside_group_is_skipped() {
        let parsed = parse_line_detailed("(1, a, 2)");
        assert_eq!(xy(&parsed.samples), vec![(Some(1.0), 2.0)]);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::GroupValue);
    }

    #[test]
    fn lone_close_paren_is_silent_but_bad_close_numeral_is_reported() {
        // Asymmetric on purpose: ")" closes quietly, "q)" is a diagnostic.
        let lone = parse_line_detailed("(1, 2 )");
        assert_eq!(xy(&lone.samples), vec![(Some(1.0), 2.0)]);
        assert!(lone.diagnostics.is_empty());

        let bad = parse_line_detailed("(1, 2, q)");
        assert_eq!(xy(&bad.samples), vec![(Some(1.0), 2.0)]);
        assert_eq!(bad.diagnostics.len(), 1);
        assert_eq!(bad.diagnostics[0].kind, DiagnosticKind::GroupClose);
    }

    #[test]
    fn bad_group_x_falls_back_to_bare_values() {
        let parsed = parse_line_detailed("(t, 4, 5)");
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::GroupX);
        // "4" is bare; "5)" is not a number outside a group.
        assert_eq!(xy(&parsed.samples), vec![(None, 4.0)]);
    }

    #[test]
    fn unterminated_group_runs_to_end_of_line() {
        assert_eq!(
            xy(&parse_line("(2, 3 4")),
            vec![(Some(2.0), 3.0), (Some(2.0), 4.0)]
        );
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let parsed = parse_line_detailed("NaN inf 1");
        assert_eq!(xy(&parsed.samples), vec![(None, 1.0)]);
        assert_eq!(parsed.diagnostics.len(), 2);
    }

    #[test]
    fn empty_line_is_text() {
        assert_eq!(classify_line("   "), LineEvent::Text(String::new()));
    }

    #[test]
    fn parsing_is_deterministic() {
        let line = "(1.5,2,3) 4, (6, 7)";
        assert_eq!(parse_line_detailed(line), parse_line_detailed(line));
    }
}
