//! Keeps `$…$` and `$$…$$` spans away from the Markdown parser.
//!
//! Markdown happily turns `a_{1}` into emphasis or eats a `*` inside a
//! formula. Before conversion every math span is swapped for an inert
//! placeholder token, and after conversion the tokens are swapped back so
//! the formula reaches the browser (and KaTeX) byte-for-byte.

use std::sync::LazyLock;

use regex::{Captures, Regex};

const DISPLAY_TOKEN: &str = "DISPLAYMATH";
const INLINE_TOKEN: &str = "INLINEMATH";

// `$$ … $$`, lazily, across lines.
static DISPLAY_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$\$.*?\$\$").expect("display math pattern"));

// `$ … $` on one line. The body can never start with (or contain) a `$`,
// so a leftover `$$` is never read as an empty inline span.
static INLINE_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[^$\n]+\$").expect("inline math pattern"));

static DISPLAY_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DISPLAYMATH(\d+)DISPLAYMATH").expect("display placeholder"));

static INLINE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"INLINEMATH(\d+)INLINEMATH").expect("inline placeholder"));

/// Math spans captured by [`isolate`], in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MathSpans {
    pub display: Vec<String>,
    pub inline: Vec<String>,
}

impl MathSpans {
    pub fn is_empty(&self) -> bool {
        self.display.is_empty() && self.inline.is_empty()
    }

    /// Put the captured spans back in place of their placeholders.
    ///
    /// Display placeholders are replaced first, then inline ones. A
    /// placeholder whose index has no captured span is left untouched.
    pub fn restore(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }

        let text = substitute(&DISPLAY_PLACEHOLDER, text, &self.display);
        substitute(&INLINE_PLACEHOLDER, &text, &self.inline)
    }
}

/// Text with its math replaced by placeholders, plus the spans needed to
/// undo the replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Isolated {
    pub text: String,
    pub spans: MathSpans,
}

/// Replace every math span in `text` with a positional placeholder.
///
/// Display math is taken first so that `$$x$$` is never read as two inline
/// spans. Unterminated delimiters are left alone as plain text.
pub fn isolate(text: &str) -> Isolated {
    let mut spans = MathSpans::default();

    let text = DISPLAY_MATH.replace_all(text, |caps: &Captures| {
        spans.display.push(caps[0].to_string());
        format!("{DISPLAY_TOKEN}{}{DISPLAY_TOKEN}", spans.display.len() - 1)
    });

    let text = INLINE_MATH.replace_all(&text, |caps: &Captures| {
        spans.inline.push(caps[0].to_string());
        format!("{INLINE_TOKEN}{}{INLINE_TOKEN}", spans.inline.len() - 1)
    });

    Isolated {
        text: text.into_owned(),
        spans,
    }
}

fn substitute(pattern: &Regex, text: &str, spans: &[String]) -> String {
    pattern
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| spans.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolates_inline_and_display() {
        let isolated = isolate("Inline $a+b$ here and $$c^2$$ block.");

        assert_eq!(
            isolated.text,
            "Inline INLINEMATH0INLINEMATH here and DISPLAYMATH0DISPLAYMATH block."
        );
        assert_eq!(isolated.spans.display, vec!["$$c^2$$"]);
        assert_eq!(isolated.spans.inline, vec!["$a+b$"]);
    }

    #[test]
    fn test_display_math_spans_lines() {
        let source = "Before\n$$\n\\sum_{i=0}^n x_i\n$$\nAfter $y$";
        let isolated = isolate(source);

        assert_eq!(isolated.text, "Before\nDISPLAYMATH0DISPLAYMATH\nAfter INLINEMATH0INLINEMATH");
        assert_eq!(isolated.spans.restore(&isolated.text), source);
    }

    #[test]
    fn test_inline_math_does_not_cross_lines() {
        let isolated = isolate("costs $5\nand $6 later");

        assert!(isolated.spans.is_empty());
        assert_eq!(isolated.text, "costs $5\nand $6 later");
    }

    #[test]
    fn test_unterminated_markers_pass_through() {
        for source in ["a lone $ sign", "an open $$ block\nthat never closes"] {
            let isolated = isolate(source);

            assert!(isolated.spans.is_empty(), "{source}");
            assert_eq!(isolated.text, source);
        }
    }

    #[test]
    fn test_adjacent_inline_spans() {
        let source = "$a$$b$";
        let isolated = isolate(source);

        // No closing `$$`, so both are inline.
        assert_eq!(isolated.spans.inline, vec!["$a$", "$b$"]);
        assert_eq!(isolated.spans.restore(&isolated.text), source);
    }

    #[test]
    fn test_round_trip_many_spans() {
        let mut source = String::new();
        for i in 0..15 {
            source.push_str(&format!("Term $x_{i}$ and\n$$y^{{{i}}}$$\n"));
        }
        let isolated = isolate(&source);

        assert_eq!(isolated.spans.inline.len(), 15);
        assert_eq!(isolated.spans.display.len(), 15);
        assert_eq!(isolated.spans.restore(&isolated.text), source);
    }

    #[test]
    fn test_restore_keeps_dollar_signs_literal() {
        // A `$1` in the span must not be read as a capture group reference.
        let isolated = isolate("price $1 + $2$ ok");
        assert_eq!(isolated.spans.restore(&isolated.text), "price $1 + $2$ ok");
    }

    #[test]
    fn test_unknown_placeholder_left_alone() {
        let spans = MathSpans {
            display: vec![],
            inline: vec!["$a$".to_string()],
        };

        assert_eq!(
            spans.restore("INLINEMATH0INLINEMATH INLINEMATH7INLINEMATH"),
            "$a$ INLINEMATH7INLINEMATH"
        );
    }
}
