//! Jinja2 emitter.
//!
//! Walks the validated document AST depth-first and re-emits it as Jinja2
//! source. Literal text passes through byte-for-byte; expressions are
//! re-serialized with precedence-aware parenthesization; tag constructs are
//! restructured per the mapping policies (`unless` → negated `if`, `case` →
//! `if`/`elif` chain, `capture` → block `set`). Filters render through the
//! table in `filters`.
//!
//! Generation is deterministic: the same AST always produces byte-identical
//! output. Unknown filters are collected as diagnostics, anchored at the
//! span of the tag that contains them.

use crate::filters::{self, FilterRule};
use l2j_lexer::Span;
use l2j_parser::ast::{
    Accessor, BinaryOp, Document, ExprKind, Expression, FilterCall, Node,
};
use l2j_parser::{Diagnostic, DiagnosticKind};

// Jinja operator precedence levels used when re-serializing expressions.
// Anything at ATOM level never needs parentheses.
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_CMP: u8 = 4;
const PREC_ATOM: u8 = 5;

/// Generate Jinja2 source from a document AST, pushing any unknown-filter
/// diagnostics into `diagnostics`.
pub fn generate(doc: &Document, diagnostics: &mut Vec<Diagnostic>) -> String {
    let mut generator = JinjaGenerator {
        out: String::new(),
        diagnostics,
    };
    generator.nodes(&doc.nodes);
    generator.out
}

struct JinjaGenerator<'a> {
    out: String,
    diagnostics: &'a mut Vec<Diagnostic>,
}

#[derive(PartialEq, Clone, Copy)]
enum ChainState {
    /// A bare primary or a parenthesized/method-call result; any suffix may
    /// attach directly.
    Atom,
    /// Ends in a `| filter` application; infix suffixes would rebind.
    Piped,
    /// Ends in an infix operator; both pipes and further infix need parens
    /// to keep left-to-right meaning.
    Infix,
}

impl<'a> JinjaGenerator<'a> {
    fn nodes(&mut self, list: &[Node]) {
        for node in list {
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Text(text) => self.out.push_str(text),

            Node::Output { expr, span } => {
                let rendered = self.expr(expr, *span);
                self.out.push_str(&format!("{{{{ {rendered} }}}}"));
            }

            Node::Assign { name, value, span } => {
                let rendered = self.expr(value, *span);
                self.out.push_str(&format!("{{% set {name} = {rendered} %}}"));
            }

            Node::If {
                arms, else_body, ..
            } => {
                for (i, arm) in arms.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    let condition = self.expr(&arm.condition, arm.span);
                    self.out.push_str(&format!("{{% {keyword} {condition} %}}"));
                    self.nodes(&arm.body);
                }
                if let Some(body) = else_body {
                    self.out.push_str("{% else %}");
                    self.nodes(body);
                }
                self.out.push_str("{% endif %}");
            }

            Node::Unless {
                condition,
                body,
                else_body,
                span,
            } => {
                let rendered = self.expr(condition, *span);
                self.out.push_str(&format!("{{% if not ({rendered}) %}}"));
                self.nodes(body);
                if let Some(else_nodes) = else_body {
                    self.out.push_str("{% else %}");
                    self.nodes(else_nodes);
                }
                self.out.push_str("{% endif %}");
            }

            Node::Case {
                subject,
                whens,
                else_body,
                span,
            } => {
                if whens.is_empty() {
                    // No when arms: only the else body could ever render.
                    if let Some(body) = else_body {
                        self.nodes(body);
                    }
                    return;
                }
                let subject = self.expr_atom(subject, *span);
                for (i, arm) in whens.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    let mut disjuncts = Vec::with_capacity(arm.values.len());
                    for value in &arm.values {
                        let value = self.expr_atom(value, *span);
                        disjuncts.push(format!("{subject} == {value}"));
                    }
                    let condition = disjuncts.join(" or ");
                    self.out.push_str(&format!("{{% {keyword} {condition} %}}"));
                    self.nodes(&arm.body);
                }
                if let Some(body) = else_body {
                    self.out.push_str("{% else %}");
                    self.nodes(body);
                }
                self.out.push_str("{% endif %}");
            }

            Node::For {
                binding,
                iterable,
                reversed,
                limit,
                offset,
                body,
                else_body,
                span,
            } => {
                let mut iter = self.expr_atom(iterable, *span);
                match (offset, limit) {
                    (Some(from), Some(count)) => {
                        let start = self.expr(from, *span);
                        let end = self.slice_end(from, count, *span);
                        iter = format!("{iter}[{start}:{end}]");
                    }
                    (Some(from), None) => {
                        let start = self.expr(from, *span);
                        iter = format!("{iter}[{start}:]");
                    }
                    (None, Some(count)) => {
                        let end = self.expr(count, *span);
                        iter = format!("{iter}[:{end}]");
                    }
                    (None, None) => {}
                }
                if *reversed {
                    iter = format!("{iter} | reverse");
                }
                self.out.push_str(&format!("{{% for {binding} in {iter} %}}"));
                self.nodes(body);
                if let Some(else_nodes) = else_body {
                    self.out.push_str("{% else %}");
                    self.nodes(else_nodes);
                }
                self.out.push_str("{% endfor %}");
            }

            Node::Capture { name, body, .. } => {
                self.out.push_str(&format!("{{% set {name} %}}"));
                self.nodes(body);
                self.out.push_str("{% endset %}");
            }

            Node::Comment(body) => {
                let body = body.trim();
                if !body.is_empty() {
                    let defused = body.replace("#}", "# }");
                    self.out.push_str(&format!("{{# {defused} #}}"));
                }
            }
        }
    }

    /// Slice end for `offset: m limit: n` → `m + n`, folded when both are
    /// numeric literals.
    fn slice_end(&mut self, offset: &Expression, limit: &Expression, span: Span) -> String {
        if let (ExprKind::Number(a), ExprKind::Number(b)) = (&offset.kind, &limit.kind) {
            return format_number(a + b);
        }
        let start = self.expr_atom(offset, span);
        let count = self.expr_atom(limit, span);
        format!("{start} + {count}")
    }

    // =========================================================================
    // Expression re-serialization
    // =========================================================================

    fn expr(&mut self, expression: &Expression, span: Span) -> String {
        self.expr_prec(expression, span, 0)
    }

    /// Render with enough parentheses to survive the position it is spliced
    /// into: `parent` is the precedence of the surrounding operator.
    fn expr_prec(&mut self, expression: &Expression, span: Span, parent: u8) -> String {
        let (text, prec) = match &expression.kind {
            ExprKind::Number(n) => (format_number(*n), PREC_ATOM),
            ExprKind::Str(s) => (quote(s), PREC_ATOM),
            ExprKind::Bool(b) => (b.to_string(), PREC_ATOM),
            ExprKind::Nil => ("none".to_string(), PREC_ATOM),
            // A bare `empty` outside a comparison degrades to an empty
            // string; comparisons render it as a length test instead.
            ExprKind::Empty => ("''".to_string(), PREC_ATOM),
            ExprKind::Var(path) => (render_path(path), PREC_ATOM),
            ExprKind::Range { from, to } => (self.render_range(from, to, span), PREC_ATOM),
            ExprKind::Not(operand) => {
                // Anything below atom level gets parentheses; `not a == b`
                // would read as ambiguous even where Jinja resolves it.
                let inner = self.expr_prec(operand, span, PREC_ATOM);
                (format!("not {inner}"), PREC_NOT)
            }
            ExprKind::Binary { op, left, right } => self.render_binary(*op, left, right, span),
            ExprKind::FilterChain { base, filters } => {
                (self.render_chain(base, filters, span), PREC_ATOM)
            }
        };

        if prec < parent {
            format!("({text})")
        } else {
            text
        }
    }

    fn expr_atom(&mut self, expression: &Expression, span: Span) -> String {
        self.expr_prec(expression, span, PREC_ATOM)
    }

    fn render_binary(
        &mut self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        span: Span,
    ) -> (String, u8) {
        use BinaryOp::*;
        match op {
            // `a contains b` → `b in a`. Python's `in` is both the
            // membership and the substring test, so string and sequence
            // operands render identically.
            Contains => {
                let needle = self.expr_prec(right, span, PREC_ATOM);
                let haystack = self.expr_prec(left, span, PREC_ATOM);
                (format!("{needle} in {haystack}"), PREC_CMP)
            }

            // `x == empty` → `x | length == 0`: correct for both strings
            // and sequences, unlike a comparison against `''`.
            Eq | NotEq if is_empty_literal(left) || is_empty_literal(right) => {
                let other = if is_empty_literal(left) { right } else { left };
                let target = self.expr_prec(other, span, PREC_ATOM);
                let symbol = if op == Eq { "==" } else { "!=" };
                (format!("{target} | length {symbol} 0"), PREC_CMP)
            }

            Eq | NotEq | Lt | Gt | Lte | Gte => {
                let symbol = match op {
                    Eq => "==",
                    NotEq => "!=",
                    Lt => "<",
                    Gt => ">",
                    Lte => "<=",
                    _ => ">=",
                };
                let l = self.expr_prec(left, span, PREC_ATOM);
                let r = self.expr_prec(right, span, PREC_ATOM);
                (format!("{l} {symbol} {r}"), PREC_CMP)
            }

            And => {
                let l = self.expr_prec(left, span, PREC_AND);
                let r = self.expr_prec(right, span, PREC_AND + 1);
                (format!("{l} and {r}"), PREC_AND)
            }

            Or => {
                let l = self.expr_prec(left, span, PREC_OR);
                let r = self.expr_prec(right, span, PREC_OR + 1);
                (format!("{l} or {r}"), PREC_OR)
            }
        }
    }

    fn render_range(&mut self, from: &Expression, to: &Expression, span: Span) -> String {
        let start = self.expr_atom(from, span);
        // Liquid ranges are inclusive, Python's `range` is not.
        let end = match &to.kind {
            ExprKind::Number(n) => format_number(n + 1.0),
            _ => format!("{} + 1", self.expr_atom(to, span)),
        };
        format!("range({start}, {end})")
    }

    /// Render a flattened filter chain left-to-right through the mapping
    /// table, inserting parentheses whenever the next step would otherwise
    /// rebind what came before.
    fn render_chain(
        &mut self,
        base: &Expression,
        calls: &[FilterCall],
        span: Span,
    ) -> String {
        let mut text = self.expr_prec(base, span, PREC_ATOM);
        let mut state = ChainState::Atom;

        for call in calls {
            let Some(rule) = filters::lookup(&call.name) else {
                self.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::UnknownFilter,
                    message: format!("Unknown filter '{}'", call.name),
                    line: span.line,
                    column: span.column,
                });
                continue;
            };

            match rule {
                FilterRule::Pipe(target) => {
                    if state == ChainState::Infix {
                        text = format!("({text})");
                    }
                    let args = self.render_args(&call.args, span);
                    text = if args.is_empty() {
                        format!("{text} | {target}")
                    } else {
                        format!("{text} | {target}({args})")
                    };
                    state = ChainState::Piped;
                }

                FilterRule::Method(method) => {
                    if state != ChainState::Atom {
                        text = format!("({text})");
                    }
                    let args = self.render_args(&call.args, span);
                    text = format!("{text}.{method}({args})");
                    state = ChainState::Atom;
                }

                FilterRule::Infix(symbol) => {
                    let Some(arg) = self.require_arg(call, span) else {
                        continue;
                    };
                    if state != ChainState::Atom {
                        text = format!("({text})");
                    }
                    text = format!("{text} {symbol} {arg}");
                    state = ChainState::Infix;
                }

                FilterRule::PrependConcat => {
                    let Some(arg) = self.require_arg(call, span) else {
                        continue;
                    };
                    if state != ChainState::Atom {
                        text = format!("({text})");
                    }
                    text = format!("{arg} ~ {text}");
                    state = ChainState::Infix;
                }

                FilterRule::RemoveViaReplace => {
                    let Some(arg) = self.require_arg(call, span) else {
                        continue;
                    };
                    if state == ChainState::Infix {
                        text = format!("({text})");
                    }
                    text = format!("{text} | replace({arg}, '')");
                    state = ChainState::Piped;
                }

                FilterRule::DateFormat => {
                    let Some(first) = call.args.first() else {
                        self.diagnostics.push(Diagnostic {
                            kind: DiagnosticKind::UnsupportedConstruct,
                            message: "Filter 'date' requires a format string".into(),
                            line: span.line,
                            column: span.column,
                        });
                        continue;
                    };
                    let ExprKind::Str(fmt) = &first.kind else {
                        self.diagnostics.push(Diagnostic {
                            kind: DiagnosticKind::UnsupportedConstruct,
                            message: "Filter 'date' requires a literal format string".into(),
                            line: span.line,
                            column: span.column,
                        });
                        continue;
                    };
                    if state == ChainState::Infix {
                        text = format!("({text})");
                    }
                    let pattern = filters::translate_strftime(fmt);
                    text = format!("{text} | format_datetime({})", quote(&pattern));
                    state = ChainState::Piped;
                }
            }
        }

        text
    }

    fn render_args(&mut self, args: &[Expression], span: Span) -> String {
        let mut rendered = Vec::with_capacity(args.len());
        for arg in args {
            rendered.push(self.expr_atom(arg, span));
        }
        rendered.join(", ")
    }

    fn require_arg(&mut self, call: &FilterCall, span: Span) -> Option<String> {
        match call.args.first() {
            Some(arg) => Some(self.expr_atom(arg, span)),
            None => {
                self.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::UnsupportedConstruct,
                    message: format!("Filter '{}' requires an argument", call.name),
                    line: span.line,
                    column: span.column,
                });
                None
            }
        }
    }
}

// =========================================================================
// Leaf rendering helpers
// =========================================================================

fn is_empty_literal(expression: &Expression) -> bool {
    matches!(expression.kind, ExprKind::Empty)
}

/// Render a variable path, remapping Liquid's `forloop` built-ins to
/// Jinja's `loop` context.
fn render_path(path: &[Accessor]) -> String {
    let mut out = String::new();
    let mut rest = path;

    match path.first() {
        Some(Accessor::Key(first)) if first == "forloop" => {
            if let Some(Accessor::Key(field)) = path.get(1) {
                let mapped = match field.as_str() {
                    "rindex" => "revindex",
                    "rindex0" => "revindex0",
                    // index, index0, first, last, length line up 1:1
                    other => other,
                };
                out.push_str("loop.");
                out.push_str(mapped);
                rest = &path[2..];
            } else {
                out.push_str("loop");
                rest = &path[1..];
            }
        }
        Some(Accessor::Key(first)) => {
            out.push_str(first);
            rest = &path[1..];
        }
        _ => {}
    }

    for accessor in rest {
        match accessor {
            Accessor::Key(key) if is_attr_safe(key) => {
                out.push('.');
                out.push_str(key);
            }
            Accessor::Key(key) => {
                out.push('[');
                out.push_str(&quote(key));
                out.push(']');
            }
            Accessor::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }

    out
}

/// Whether a key can render as `.key` (hyphenated keys need `['key']`).
fn is_attr_safe(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote a string literal, preferring single quotes like the Jinja docs.
fn quote(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

/// Numbers print as integers when they are integral, so `25` survives the
/// f64 round trip as `25`.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use l2j_parser::Parser;

    /// Helper: parse and generate, asserting no diagnostics.
    fn gen(source: &str) -> String {
        let parsed = Parser::parse(source).unwrap();
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        let mut diagnostics = Vec::new();
        let out = generate(&parsed.document, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        out
    }

    /// Helper: parse and generate, returning the collected diagnostics.
    fn gen_diagnostics(source: &str) -> Vec<Diagnostic> {
        let parsed = Parser::parse(source).unwrap();
        let mut diagnostics = parsed.diagnostics;
        generate(&parsed.document, &mut diagnostics);
        diagnostics
    }

    // =========================================================================
    // Literal text and outputs
    // =========================================================================

    #[test]
    fn test_text_passes_through_verbatim() {
        let source = "<h1>\n  Hello &amp; welcome!\t</h1>\r\n";
        assert_eq!(gen(source), source);
    }

    #[test]
    fn test_simple_output() {
        assert_eq!(gen("{{ name }}"), "{{ name }}");
    }

    #[test]
    fn test_output_path() {
        assert_eq!(gen("{{ user.name }}"), "{{ user.name }}");
        assert_eq!(gen("{{ items[0] }}"), "{{ items[0] }}");
        assert_eq!(gen("{{ a['b'] }}"), "{{ a.b }}");
    }

    #[test]
    fn test_hyphenated_key_uses_subscript() {
        assert_eq!(gen("{{ page.main-title }}"), "{{ page['main-title'] }}");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(gen("{{ 25 }}"), "{{ 25 }}");
        assert_eq!(gen("{{ 3.5 }}"), "{{ 3.5 }}");
        assert_eq!(gen("{{ -2 }}"), "{{ -2 }}");
    }

    #[test]
    fn test_literals() {
        assert_eq!(gen("{{ true }}"), "{{ true }}");
        assert_eq!(gen("{{ nil }}"), "{{ none }}");
        assert_eq!(gen("{{ 'it\"s' }}"), "{{ 'it\"s' }}");
        assert_eq!(gen("{{ \"don't\" }}"), "{{ \"don't\" }}");
    }

    // =========================================================================
    // Assign and capture
    // =========================================================================

    #[test]
    fn test_assign() {
        assert_eq!(
            gen("{% assign n = 'abc' %}"),
            "{% set n = 'abc' %}"
        );
    }

    #[test]
    fn test_assign_with_filter_chain() {
        assert_eq!(
            gen("{% assign products = 'a,b' | split: ',' %}"),
            "{% set products = 'a,b'.split(',') %}"
        );
    }

    #[test]
    fn test_capture_becomes_block_set() {
        assert_eq!(
            gen("{% capture greeting %}Hi {{ name }}{% endcapture %}"),
            "{% set greeting %}Hi {{ name }}{% endset %}"
        );
    }

    // =========================================================================
    // Conditionals
    // =========================================================================

    #[test]
    fn test_if_elsif_else() {
        assert_eq!(
            gen("{% if a %}1{% elsif b %}2{% else %}3{% endif %}"),
            "{% if a %}1{% elif b %}2{% else %}3{% endif %}"
        );
    }

    #[test]
    fn test_unless_negates() {
        assert_eq!(
            gen("{% unless x == empty %}yes{% endunless %}"),
            "{% if not (x | length == 0) %}yes{% endif %}"
        );
    }

    #[test]
    fn test_unless_else_keeps_branches() {
        assert_eq!(
            gen("{% unless done %}pending{% else %}done{% endunless %}"),
            "{% if not (done) %}pending{% else %}done{% endif %}"
        );
    }

    #[test]
    fn test_contains_becomes_in() {
        assert_eq!(
            gen("{% if user_name contains 'John' %}x{% endif %}"),
            "{% if 'John' in user_name %}x{% endif %}"
        );
    }

    #[test]
    fn test_boolean_precedence_preserved() {
        assert_eq!(
            gen("{% if (a or b) and c %}x{% endif %}"),
            "{% if (a or b) and c %}x{% endif %}"
        );
        assert_eq!(
            gen("{% if a or b and c %}x{% endif %}"),
            "{% if a or b and c %}x{% endif %}"
        );
    }

    #[test]
    fn test_not_comparison_parenthesized() {
        assert_eq!(
            gen("{% if not (a == b) %}x{% endif %}"),
            "{% if not (a == b) %}x{% endif %}"
        );
    }

    #[test]
    fn test_empty_inequality() {
        assert_eq!(
            gen("{% if x != empty %}x{% endif %}"),
            "{% if x | length != 0 %}x{% endif %}"
        );
    }

    // =========================================================================
    // Case
    // =========================================================================

    #[test]
    fn test_case_becomes_if_elif_chain() {
        assert_eq!(
            gen("{% case c %}{% when 'a' %}A{% when 'b' %}B{% else %}Z{% endcase %}"),
            "{% if c == 'a' %}A{% elif c == 'b' %}B{% else %}Z{% endif %}"
        );
    }

    #[test]
    fn test_case_multiple_values_disjoin() {
        assert_eq!(
            gen("{% case c %}{% when 'a', 'b' %}AB{% endcase %}"),
            "{% if c == 'a' or c == 'b' %}AB{% endif %}"
        );
    }

    #[test]
    fn test_case_without_whens_renders_else_only() {
        assert_eq!(gen("{% case c %}{% else %}Z{% endcase %}"), "Z");
    }

    // =========================================================================
    // Loops
    // =========================================================================

    #[test]
    fn test_for_loop() {
        assert_eq!(
            gen("{% for p in products %}{{ p }}{% endfor %}"),
            "{% for p in products %}{{ p }}{% endfor %}"
        );
    }

    #[test]
    fn test_for_else() {
        assert_eq!(
            gen("{% for p in products %}{{ p }}{% else %}none{% endfor %}"),
            "{% for p in products %}{{ p }}{% else %}none{% endfor %}"
        );
    }

    #[test]
    fn test_for_reversed() {
        assert_eq!(
            gen("{% for p in products reversed %}x{% endfor %}"),
            "{% for p in products | reverse %}x{% endfor %}"
        );
    }

    #[test]
    fn test_for_offset_and_limit_fold() {
        assert_eq!(
            gen("{% for p in products offset: 2 limit: 3 %}x{% endfor %}"),
            "{% for p in products[2:5] %}x{% endfor %}"
        );
    }

    #[test]
    fn test_for_limit_only() {
        assert_eq!(
            gen("{% for p in products limit: 3 %}x{% endfor %}"),
            "{% for p in products[:3] %}x{% endfor %}"
        );
    }

    #[test]
    fn test_for_range() {
        assert_eq!(
            gen("{% for i in (1..5) %}{{ i }}{% endfor %}"),
            "{% for i in range(1, 6) %}{{ i }}{% endfor %}"
        );
    }

    #[test]
    fn test_for_range_variable_end() {
        assert_eq!(
            gen("{% for i in (1..n) %}x{% endfor %}"),
            "{% for i in range(1, n + 1) %}x{% endfor %}"
        );
    }

    #[test]
    fn test_forloop_builtins_remap() {
        assert_eq!(gen("{{ forloop.index }}"), "{{ loop.index }}");
        assert_eq!(gen("{{ forloop.index0 }}"), "{{ loop.index0 }}");
        assert_eq!(gen("{{ forloop.rindex }}"), "{{ loop.revindex }}");
        assert_eq!(gen("{{ forloop.first }}"), "{{ loop.first }}");
        assert_eq!(gen("{{ forloop.last }}"), "{{ loop.last }}");
        assert_eq!(gen("{{ forloop.length }}"), "{{ loop.length }}");
    }

    // =========================================================================
    // Comments
    // =========================================================================

    #[test]
    fn test_comment_becomes_jinja_comment() {
        assert_eq!(
            gen("{% comment %}Welcome message{% endcomment %}"),
            "{# Welcome message #}"
        );
    }

    #[test]
    fn test_empty_comment_emits_nothing() {
        assert_eq!(gen("a{% comment %}  {% endcomment %}b"), "ab");
    }

    #[test]
    fn test_comment_delimiter_defused() {
        assert_eq!(
            gen("{% comment %}weird #} marker{% endcomment %}"),
            "{# weird # } marker #}"
        );
    }

    // =========================================================================
    // Filters
    // =========================================================================

    #[test]
    fn test_renamed_filters() {
        assert_eq!(gen("{{ n | upcase }}"), "{{ n | upper }}");
        assert_eq!(gen("{{ n | downcase }}"), "{{ n | lower }}");
        assert_eq!(gen("{{ n | strip }}"), "{{ n | trim }}");
        assert_eq!(gen("{{ n | size }}"), "{{ n | length }}");
        assert_eq!(gen("{{ n | capitalize }}"), "{{ n | capitalize }}");
        assert_eq!(gen("{{ n | first }}"), "{{ n | first }}");
        assert_eq!(gen("{{ n | last }}"), "{{ n | last }}");
    }

    #[test]
    fn test_filters_with_args() {
        assert_eq!(gen("{{ a | join: ', ' }}"), "{{ a | join(', ') }}");
        assert_eq!(
            gen("{{ s | replace: 'a', 'b' }}"),
            "{{ s | replace('a', 'b') }}"
        );
        assert_eq!(gen("{{ s | default: 'n/a' }}"), "{{ s | default('n/a') }}");
        assert_eq!(
            gen("{{ s | truncate: 15, '...' }}"),
            "{{ s | truncate(15, '...') }}"
        );
    }

    #[test]
    fn test_method_filters() {
        assert_eq!(gen("{{ s | split: ',' }}"), "{{ s.split(',') }}");
        assert_eq!(gen("{{ s | lstrip }}"), "{{ s.lstrip() }}");
        assert_eq!(gen("{{ s | rstrip }}"), "{{ s.rstrip() }}");
    }

    #[test]
    fn test_remove_via_replace() {
        assert_eq!(gen("{{ s | remove: 'x' }}"), "{{ s | replace('x', '') }}");
    }

    #[test]
    fn test_concat_filters() {
        assert_eq!(gen("{{ s | append: '!' }}"), "{{ s ~ '!' }}");
        assert_eq!(gen("{{ s | prepend: '> ' }}"), "{{ '> ' ~ s }}");
    }

    #[test]
    fn test_arithmetic_filters() {
        assert_eq!(gen("{{ 100 | minus: 10 }}"), "{{ 100 - 10 }}");
        assert_eq!(gen("{{ n | plus: 1 }}"), "{{ n + 1 }}");
        assert_eq!(gen("{{ n | times: 2 }}"), "{{ n * 2 }}");
        assert_eq!(gen("{{ n | divided_by: 4 }}"), "{{ n / 4 }}");
    }

    #[test]
    fn test_chained_arithmetic_keeps_order() {
        assert_eq!(
            gen("{{ 100 | minus: 10 | times: 2 }}"),
            "{{ (100 - 10) * 2 }}"
        );
    }

    #[test]
    fn test_pipe_after_infix_parenthesizes() {
        assert_eq!(gen("{{ n | plus: 1 | upcase }}"), "{{ (n + 1) | upper }}");
    }

    #[test]
    fn test_method_after_pipe_parenthesizes() {
        assert_eq!(
            gen("{{ s | strip | split: ',' }}"),
            "{{ (s | trim).split(',') }}"
        );
    }

    #[test]
    fn test_chain_order_preserved() {
        assert_eq!(
            gen("{{ x | strip | upcase | truncate: 5 }}"),
            "{{ x | trim | upper | truncate(5) }}"
        );
    }

    #[test]
    fn test_date_format_translated() {
        assert_eq!(
            gen("{{ 'now' | date: '%Y-%m-%d' }}"),
            "{{ 'now' | format_datetime('yyyy-MM-dd') }}"
        );
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    #[test]
    fn test_unknown_filter_reported_with_position() {
        let diagnostics = gen_diagnostics("text\n{{ n | money }}");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnknownFilter);
        assert!(diagnostics[0].message.contains("money"));
        assert_eq!(diagnostics[0].line, 2);
        assert_eq!(diagnostics[0].column, 1);
    }

    #[test]
    fn test_all_unknown_filters_reported() {
        let diagnostics = gen_diagnostics("{{ a | foo }}{{ b | bar }}");
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_date_with_dynamic_format_reported() {
        let diagnostics = gen_diagnostics("{{ t | date: fmt }}");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::UnsupportedConstruct
        );
    }

    #[test]
    fn test_infix_filter_without_arg_reported() {
        let diagnostics = gen_diagnostics("{{ n | minus }}");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("requires an argument"));
    }
}
