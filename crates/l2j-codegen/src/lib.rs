//! Liquid → Jinja2 Converter
//!
//! Ties the pipeline together: scan and parse the Liquid source, then walk
//! the AST and the mapping table to emit Jinja2 text.
//!
//! ```text
//! Liquid source → Parser → Document AST → generate() → Jinja2 source
//! ```
//!
//! The public result is all-or-nothing: either the converted text, or an
//! ordered list of diagnostics. Fatal problems (lex errors, malformed
//! expressions, unbalanced blocks) stop the pipeline where they are found;
//! unsupported tags and unknown filters are collected across the whole
//! input so a single failure reports every occurrence. Output text is never
//! mixed with error markers.

pub mod filters;
pub mod jinja;

use l2j_parser::{ParseError, ParseErrorKind, Parser};

pub use l2j_parser::{Diagnostic, DiagnosticKind, Document};

/// Conversion failure: the ordered diagnostics from every stage that ran.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertError {
    pub diagnostics: Vec<Diagnostic>,
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ConvertError {}

impl ConvertError {
    /// Human-readable summary: the first fatal diagnostic if one exists,
    /// otherwise all collected diagnostics joined.
    pub fn summary(&self) -> String {
        if let Some(fatal) = self.diagnostics.iter().find(|d| d.kind.is_fatal()) {
            return fatal.to_string();
        }
        self.diagnostics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Convert Liquid template source to Jinja2 source.
///
/// Pure function of the input: no shared state, safe to call from any
/// number of threads at once. Empty input converts to empty output.
pub fn convert(source: &str) -> Result<String, ConvertError> {
    let parsed = Parser::parse(source).map_err(fatal)?;
    let mut diagnostics = parsed.diagnostics;
    let text = jinja::generate(&parsed.document, &mut diagnostics);

    if diagnostics.is_empty() {
        Ok(text)
    } else {
        Err(ConvertError { diagnostics })
    }
}

/// Generate Jinja2 source from an already-parsed document.
pub fn generate(document: &Document) -> Result<String, ConvertError> {
    let mut diagnostics = Vec::new();
    let text = jinja::generate(document, &mut diagnostics);

    if diagnostics.is_empty() {
        Ok(text)
    } else {
        Err(ConvertError { diagnostics })
    }
}

fn fatal(error: ParseError) -> ConvertError {
    let kind = match error.kind {
        ParseErrorKind::Lex => DiagnosticKind::Lex,
        ParseErrorKind::Syntax => DiagnosticKind::Parse,
        ParseErrorKind::UnbalancedBlock => DiagnosticKind::UnbalancedBlock,
    };
    ConvertError {
        diagnostics: vec![Diagnostic {
            kind,
            message: error.message,
            line: error.line,
            column: error.column,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Pipeline basics
    // =========================================================================

    #[test]
    fn test_empty_input() {
        assert_eq!(convert("").unwrap(), "");
    }

    #[test]
    fn test_tagless_input_round_trips() {
        let source = "<html>\n  <body>plain { text } here</body>\n</html>\n";
        assert_eq!(convert(source).unwrap(), source);
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let source = "{% assign n = 'abc' %}{{ n | upcase }}";
        assert_eq!(convert(source).unwrap(), convert(source).unwrap());
    }

    // =========================================================================
    // End-to-end conversions
    // =========================================================================

    #[test]
    fn test_assign_and_upcase() {
        assert_eq!(
            convert("{% assign n = 'abc' %}{{ n | upcase }}").unwrap(),
            "{% set n = 'abc' %}{{ n | upper }}"
        );
    }

    #[test]
    fn test_unless_empty() {
        assert_eq!(
            convert("{% unless x == empty %}yes{% endunless %}").unwrap(),
            "{% if not (x | length == 0) %}yes{% endif %}"
        );
    }

    #[test]
    fn test_case_chain() {
        assert_eq!(
            convert("{% case c %}{% when 'a' %}A{% when 'b' %}B{% else %}Z{% endcase %}")
                .unwrap(),
            "{% if c == 'a' %}A{% elif c == 'b' %}B{% else %}Z{% endif %}"
        );
    }

    #[test]
    fn test_generated_blocks_stay_balanced() {
        let out = convert(
            "{% if a %}{% for x in xs %}{{ x }}{% endfor %}{% else %}{% unless b %}v{% endunless %}{% endif %}",
        )
        .unwrap();
        assert_eq!(out.matches("{% if").count(), 2);
        assert_eq!(out.matches("{% endif %}").count(), 2);
        assert_eq!(out.matches("{% for").count(), 1);
        assert_eq!(out.matches("{% endfor %}").count(), 1);
    }

    #[test]
    fn test_product_example_converts() {
        let source = r#"{% assign user_name = 'John Doe' %}
{% assign age = 25 %}
{% assign products = 'apple,banana,orange' | split: ',' %}

{% comment %}Welcome message with user details{% endcomment %}
{% if user_name contains 'John' %}
  <h1>Hello {{ user_name | upcase }}!</h1>
  <p>You are {{ age }} years old.</p>
{% else %}
  <h1>Welcome, Guest!</h1>
{% endif %}

{% unless products == empty %}
  <ul>
  {% for product in products %}
    <li>{{ product | capitalize | truncate: 15 }}</li>
  {% endfor %}
  </ul>
{% endunless %}

{% case user_name %}
  {% when 'John Doe' %}
    <p>Premium member benefits apply!</p>
  {% else %}
    <p>Basic member benefits apply!</p>
{% endcase %}

{% capture greeting %}
  Hello {{ user_name }}, today is {{ 'now' | date: '%Y-%m-%d' }}
{% endcapture %}

{% assign discounted_price = 100 | minus: 10 %}
<p>Special price: ${{ discounted_price }}</p>"#;

        let out = convert(source).unwrap();
        assert!(out.contains("{% set user_name = 'John Doe' %}"));
        assert!(out.contains("{% set products = 'apple,banana,orange'.split(',') %}"));
        assert!(out.contains("{# Welcome message with user details #}"));
        assert!(out.contains("{% if 'John' in user_name %}"));
        assert!(out.contains("{{ user_name | upper }}"));
        assert!(out.contains("{% if not (products | length == 0) %}"));
        assert!(out.contains("{% for product in products %}"));
        assert!(out.contains("{{ product | capitalize | truncate(15) }}"));
        assert!(out.contains("{% if user_name == 'John Doe' %}"));
        assert!(out.contains("{% set greeting %}"));
        assert!(out.contains("{{ 'now' | format_datetime('yyyy-MM-dd') }}"));
        assert!(out.contains("{% endset %}"));
        assert!(out.contains("{% set discounted_price = 100 - 10 %}"));
        assert!(out.contains("<p>Special price: ${{ discounted_price }}</p>"));
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn test_unknown_tag_fails_whole_conversion() {
        let err = convert("before {% weirdtag %} after").unwrap_err();
        assert_eq!(err.diagnostics.len(), 1);
        assert_eq!(
            err.diagnostics[0].kind,
            DiagnosticKind::UnsupportedConstruct
        );
        assert!(err.diagnostics[0].message.contains("weirdtag"));
        assert_eq!(err.diagnostics[0].line, 1);
        assert_eq!(err.diagnostics[0].column, 8);
    }

    #[test]
    fn test_unterminated_tag_is_fatal() {
        let err = convert("{% if x").unwrap_err();
        assert_eq!(err.diagnostics.len(), 1);
        assert_eq!(err.diagnostics[0].kind, DiagnosticKind::Lex);
        assert!(err.summary().contains("line 1, column 1"));
    }

    #[test]
    fn test_unbalanced_block_is_fatal() {
        let err = convert("{% if x %}yes").unwrap_err();
        assert_eq!(err.diagnostics[0].kind, DiagnosticKind::UnbalancedBlock);
    }

    #[test]
    fn test_all_recoverable_diagnostics_reported_together() {
        let err =
            convert("{% weirdtag %}{{ a | money }}{% othertag %}{{ b | huh }}").unwrap_err();
        assert_eq!(err.diagnostics.len(), 4);
        let unsupported = err
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::UnsupportedConstruct)
            .count();
        let unknown = err
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::UnknownFilter)
            .count();
        assert_eq!(unsupported, 2);
        assert_eq!(unknown, 2);
        // all four show up in the joined summary
        let summary = err.summary();
        assert!(summary.contains("weirdtag"));
        assert!(summary.contains("money"));
        assert!(summary.contains("othertag"));
        assert!(summary.contains("huh"));
    }

    #[test]
    fn test_summary_prefers_fatal() {
        let err = convert("{% endif %}").unwrap_err();
        assert!(err.summary().contains("no open block"));
    }

    #[test]
    fn test_failure_produces_no_output_text() {
        // The result type itself guarantees this; assert the error side is
        // taken for a mixed good/bad input.
        assert!(convert("fine text {{ x | bogus }}").is_err());
    }
}
