//! The filter mapping table.
//!
//! One static, name-keyed table describing how each supported Liquid filter
//! is re-expressed in Jinja2. Names absent from the table are unknown
//! filters; the generator reports them instead of guessing. Keeping the
//! whole set in one `match` keeps the supported surface auditable.

/// How a Liquid filter renders in Jinja2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRule {
    /// Straight rename to a Jinja filter; arguments pass through:
    /// `upcase` → `| upper`, `join: ', '` → `| join(', ')`.
    Pipe(&'static str),

    /// Python method call on the value — used where Jinja has no builtin:
    /// `split: ','` → `.split(',')`.
    Method(&'static str),

    /// Infix operator with the argument on the right:
    /// `minus: 10` → `- 10`, `append: 'x'` → `~ 'x'`.
    Infix(&'static str),

    /// `prepend`: concatenation with the argument on the left.
    PrependConcat,

    /// `remove`: `replace(arg, '')`.
    RemoveViaReplace,

    /// `date`: strftime format translated to an LDML pattern for
    /// `format_datetime`.
    DateFormat,
}

/// Look up the rendering rule for a Liquid filter name.
pub fn lookup(name: &str) -> Option<FilterRule> {
    use FilterRule::*;
    let rule = match name {
        "upcase" => Pipe("upper"),
        "downcase" => Pipe("lower"),
        "capitalize" => Pipe("capitalize"),
        "strip" => Pipe("trim"),
        "lstrip" => Method("lstrip"),
        "rstrip" => Method("rstrip"),
        "size" => Pipe("length"),
        "first" => Pipe("first"),
        "last" => Pipe("last"),
        "join" => Pipe("join"),
        "split" => Method("split"),
        "replace" => Pipe("replace"),
        "remove" => RemoveViaReplace,
        "append" => Infix("~"),
        "prepend" => PrependConcat,
        "default" => Pipe("default"),
        "minus" => Infix("-"),
        "plus" => Infix("+"),
        "times" => Infix("*"),
        "divided_by" => Infix("/"),
        "truncate" => Pipe("truncate"),
        "date" => DateFormat,
        _ => return None,
    };
    Some(rule)
}

/// Translate a Liquid (strftime-subset) date format string into an LDML
/// pattern, character class by character class. Literal letter runs are
/// quoted, since bare letters are pattern characters in LDML. Unrecognized
/// directives pass through unchanged.
pub fn translate_strftime(fmt: &str) -> String {
    let mut out = String::new();
    let mut literal = String::new();
    let mut chars = fmt.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            literal.push(ch);
            continue;
        }

        let mut no_pad = false;
        let mut directive = chars.next();
        if directive == Some('-') {
            no_pad = true;
            directive = chars.next();
        }

        let mapped = match directive {
            Some('Y') => Some("yyyy"),
            Some('y') => Some("yy"),
            Some('m') => Some(if no_pad { "M" } else { "MM" }),
            Some('d') => Some(if no_pad { "d" } else { "dd" }),
            Some('H') => Some(if no_pad { "H" } else { "HH" }),
            Some('I') => Some(if no_pad { "h" } else { "hh" }),
            Some('M') => Some("mm"),
            Some('S') => Some("ss"),
            Some('p') => Some("a"),
            Some('a') => Some("EEE"),
            Some('A') => Some("EEEE"),
            Some('b') | Some('h') => Some("MMM"),
            Some('B') => Some("MMMM"),
            Some('j') => Some("DDD"),
            Some('Z') => Some("zzz"),
            Some('z') => Some("Z"),
            Some('%') => {
                literal.push('%');
                continue;
            }
            _ => None,
        };

        match mapped {
            Some(pattern) => {
                flush_literal(&mut out, &mut literal);
                out.push_str(pattern);
            }
            None => {
                literal.push('%');
                if no_pad {
                    literal.push('-');
                }
                if let Some(c) = directive {
                    literal.push(c);
                }
            }
        }
    }

    flush_literal(&mut out, &mut literal);
    out
}

fn flush_literal(out: &mut String, literal: &mut String) {
    if literal.is_empty() {
        return;
    }
    if literal.chars().any(|c| c.is_ascii_alphabetic()) {
        out.push('\'');
        out.push_str(&literal.replace('\'', "''"));
        out.push('\'');
    } else {
        out.push_str(literal);
    }
    literal.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Table coverage
    // =========================================================================

    #[test]
    fn test_every_supported_filter_has_a_rule() {
        let supported = [
            "upcase",
            "downcase",
            "capitalize",
            "strip",
            "lstrip",
            "rstrip",
            "size",
            "first",
            "last",
            "join",
            "split",
            "replace",
            "remove",
            "append",
            "prepend",
            "default",
            "minus",
            "plus",
            "times",
            "divided_by",
            "truncate",
            "date",
        ];
        for name in supported {
            assert!(lookup(name).is_some(), "missing rule for '{name}'");
        }
    }

    #[test]
    fn test_unknown_names_have_no_rule() {
        assert_eq!(lookup("money"), None);
        assert_eq!(lookup("upper"), None); // Jinja name, not a Liquid one
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn test_rename_targets() {
        assert_eq!(lookup("upcase"), Some(FilterRule::Pipe("upper")));
        assert_eq!(lookup("size"), Some(FilterRule::Pipe("length")));
        assert_eq!(lookup("strip"), Some(FilterRule::Pipe("trim")));
    }

    #[test]
    fn test_arithmetic_is_infix() {
        assert_eq!(lookup("minus"), Some(FilterRule::Infix("-")));
        assert_eq!(lookup("divided_by"), Some(FilterRule::Infix("/")));
    }

    // =========================================================================
    // Date format translation
    // =========================================================================

    #[test]
    fn test_iso_date() {
        assert_eq!(translate_strftime("%Y-%m-%d"), "yyyy-MM-dd");
    }

    #[test]
    fn test_time_fields() {
        assert_eq!(translate_strftime("%H:%M:%S"), "HH:mm:ss");
        assert_eq!(translate_strftime("%I:%M %p"), "hh:mm a");
    }

    #[test]
    fn test_names_and_weekdays() {
        assert_eq!(translate_strftime("%A, %B %d"), "EEEE, MMMM dd");
        assert_eq!(translate_strftime("%a %b"), "EEE MMM");
    }

    #[test]
    fn test_no_pad_variants() {
        assert_eq!(translate_strftime("%-m/%-d/%Y"), "M/d/yyyy");
    }

    #[test]
    fn test_literal_letters_are_quoted() {
        assert_eq!(translate_strftime("%Y at %H"), "yyyy' at 'HH");
    }

    #[test]
    fn test_percent_escape() {
        assert_eq!(translate_strftime("100%%"), "100%");
    }

    #[test]
    fn test_unknown_directive_passes_through() {
        assert_eq!(translate_strftime("%Y %Q"), "yyyy' %Q'");
    }
}
