use protocol::{ParseError, Placeholder, PlaceholderKind};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static RE_NAMESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:inline\s+)?namespace(?:\s+[\w:]+)?\s*\{").unwrap()
});
static RE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:template<[^{};\n]*>\s*)?(class|struct)\s+[^;(){}=\n\\]+\{").unwrap()
});
static RE_TYPEDEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^typedef\s+[^;\n]+;").unwrap());
static RE_TYPEDEF_SKIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"typename|iterator|_type|\(").unwrap());
static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(namespace|endnamespace|class|endclass|structclass|endstructclass)(\d{3,})")
        .unwrap()
});

/// A brace-balanced construct: `start..open` is the preamble ending in `{`
/// and `close..end` the epilogue starting with the matching `}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Construct {
    pub keyword: String,
    pub start: usize,
    pub open: usize,
    pub close: usize,
    pub end: usize,
}

impl Construct {
    pub fn preamble<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..=self.open]
    }

    pub fn epilogue<'a>(&self, text: &'a str) -> &'a str {
        &text[self.close..self.end]
    }
}

/// Find every construct whose preamble matches `preamble` and walk its
/// braces to the matching close.
///
/// The walk hops from brace to brace and gives up after `max_construct`
/// hops, so malformed input fails instead of scanning forever. When
/// `take_semicolon` is set a `;` right after the closing brace belongs to
/// the epilogue.
pub fn find_constructs(
    text: &str,
    preamble: &Regex,
    take_semicolon: bool,
    max_construct: usize,
    header: &str,
) -> Result<Vec<Construct>, ParseError> {
    let bytes = text.as_bytes();
    let mut constructs = Vec::new();

    for caps in preamble.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        let keyword = caps
            .get(1)
            .map(|k| k.as_str().to_string())
            .unwrap_or_default();
        let open = m.end() - 1;

        let mut depth = 0usize;
        let mut hops = 0usize;
        let mut close = None;
        for (offset, &b) in bytes.iter().enumerate().skip(open) {
            if b != b'{' && b != b'}' {
                continue;
            }
            hops += 1;
            if hops > max_construct {
                return Err(ParseError::MalformedConstruct {
                    header: header.to_string(),
                    offset: m.start(),
                    reason: format!("cannot find the end of the construct within {max_construct} braces"),
                });
            }
            if b == b'{' {
                depth += 1;
            } else {
                depth -= 1;
                if depth == 0 {
                    close = Some(offset);
                    break;
                }
            }
        }

        let Some(close) = close else {
            return Err(ParseError::MalformedConstruct {
                header: header.to_string(),
                offset: m.start(),
                reason: "boundary mismatch, the construct is never closed".to_string(),
            });
        };
        let mut end = close + 1;
        if take_semicolon && bytes.get(end) == Some(&b';') {
            end += 1;
        }
        constructs.push(Construct {
            keyword,
            start: m.start(),
            open,
            close,
            end,
        });
    }

    Ok(constructs)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

/// Apply non-overlapping edits in one pass, copying the gaps between them.
fn splice(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..edit.start]);
        out.push_str(&edit.replacement);
        cursor = edit.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Rewrite `typedef X Name;` lines as empty class bodies so the walker
/// registers `Name` like any other class.
pub fn convert_typedefs(text: &str) -> String {
    RE_TYPEDEF
        .replace_all(text, |caps: &regex::Captures| {
            let line = &caps[0];
            if RE_TYPEDEF_SKIP.is_match(line) {
                return line.to_string();
            }
            let name = line
                .trim_end_matches(';')
                .split_whitespace()
                .last()
                .unwrap_or("")
                .trim_start_matches(['*', '&']);
            if name.is_empty() {
                line.to_string()
            } else {
                format!("class {name} {{\n}};")
            }
        })
        .into_owned()
}

/// One element of the placeholder stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Mark(Placeholder),
    Line(&'a str),
}

/// Header text with every namespace and class boundary replaced by a
/// placeholder, plus the text each placeholder stands for.
#[derive(Debug, Clone, Default)]
pub struct Segmented {
    pub text: String,
    pub fragments: BTreeMap<Placeholder, String>,
}

impl Segmented {
    pub fn fragment(&self, placeholder: &Placeholder) -> &str {
        self.fragments
            .get(placeholder)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The text in source order, one placeholder or statement line per token.
    pub fn tokens(&self) -> Vec<Token<'_>> {
        let mut tokens = Vec::new();
        for line in self.text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_placeholder(line) {
                Some(p) => tokens.push(Token::Mark(p)),
                None => tokens.push(Token::Line(line)),
            }
        }
        tokens
    }
}

pub fn parse_placeholder(line: &str) -> Option<Placeholder> {
    let caps = RE_PLACEHOLDER.captures(line)?;
    if caps.get(0)?.as_str().len() != line.len() {
        return None;
    }
    let kind = PlaceholderKind::from_tag(&caps[1])?;
    let index = caps[2].parse().ok()?;
    Some(Placeholder { kind, index })
}

/// Replace each construct's preamble and epilogue by placeholders.
fn substitute(
    text: &str,
    constructs: &[Construct],
    first_index: usize,
    kind_of: impl Fn(&Construct) -> PlaceholderKind,
    fragments: &mut BTreeMap<Placeholder, String>,
) -> String {
    let mut edits = Vec::with_capacity(constructs.len() * 2);
    for (n, c) in constructs.iter().enumerate() {
        let kind = kind_of(c);
        let open = Placeholder {
            kind,
            index: first_index + n,
        };
        let close = Placeholder {
            kind: kind.closing(),
            index: first_index + n,
        };
        fragments.insert(open, c.preamble(text).trim().to_string());
        fragments.insert(close, c.epilogue(text).to_string());
        edits.push(Edit {
            start: c.start,
            end: c.open + 1,
            replacement: format!("{open}\n"),
        });
        edits.push(Edit {
            start: c.close,
            end: c.end,
            replacement: format!("\n{close}\n"),
        });
    }
    splice(text, edits)
}

/// Typedef conversion, then the namespace pass, then the class pass over
/// the namespace-substituted text.
pub fn segment(text: &str, max_construct: usize, header: &str) -> Result<Segmented, ParseError> {
    let source = text;
    let text = convert_typedefs(text);
    let mut fragments = BTreeMap::new();

    let mut namespaces = find_constructs(&text, &RE_NAMESPACE, false, max_construct, header)?;
    namespaces.sort_by_key(|c| c.start);
    let text = substitute(
        &text,
        &namespaces,
        0,
        |_| PlaceholderKind::Namespace,
        &mut fragments,
    );

    let mut classes = find_constructs(&text, &RE_CLASS, true, max_construct, header)?;
    classes.sort_by_key(|c| c.start);
    let text = substitute(
        &text,
        &classes,
        0,
        |c| {
            if c.keyword == "struct" {
                PlaceholderKind::StructClass
            } else {
                PlaceholderKind::Class
            }
        },
        &mut fragments,
    );

    debug!(
        "{}: {} namespaces, {} classes",
        header,
        namespaces.len(),
        classes.len()
    );
    check_braces(source, header)?;
    let segmented = Segmented { text, fragments };
    check_balance(&segmented.tokens(), header)?;
    Ok(segmented)
}

/// Every `}` must close an open `{` and every `{` must be closed. The
/// construct passes only look at braces inside a class or namespace, so a
/// stray brace elsewhere is caught here.
pub fn check_braces(text: &str, header: &str) -> Result<(), ParseError> {
    let mut open = Vec::new();
    for (offset, b) in text.bytes().enumerate() {
        match b {
            b'{' => open.push(offset),
            b'}' if open.pop().is_none() => {
                return Err(ParseError::MalformedConstruct {
                    header: header.to_string(),
                    offset,
                    reason: "closing brace without a matching open".to_string(),
                });
            }
            _ => {}
        }
    }
    match open.first() {
        Some(&offset) => Err(ParseError::MalformedConstruct {
            header: header.to_string(),
            offset,
            reason: "opening brace is never closed".to_string(),
        }),
        None => Ok(()),
    }
}

/// Checks that opening and closing placeholders nest like a stack.
pub fn check_balance(tokens: &[Token<'_>], header: &str) -> Result<(), ParseError> {
    let mut stack: Vec<Placeholder> = Vec::new();
    for token in tokens {
        let Token::Mark(p) = token else { continue };
        if p.kind.is_open() {
            stack.push(*p);
            continue;
        }
        match stack.pop() {
            Some(open) if open.kind.closing() == p.kind && open.index == p.index => {}
            _ => {
                return Err(ParseError::UnbalancedPlaceholders {
                    header: header.to_string(),
                    placeholder: p.to_string(),
                })
            }
        }
    }
    match stack.pop() {
        Some(open) => Err(ParseError::UnbalancedPlaceholders {
            header: header.to_string(),
            placeholder: open.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_nested_constructs() {
        let text = "namespace a {\nnamespace b {\nint x;\n}\n}\n";
        let found = find_constructs(text, &RE_NAMESPACE, false, 5000, "t.h").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].preamble(text), "namespace a {");
        assert_eq!(found[0].close, text.len() - 2);
        assert_eq!(found[1].preamble(text), "namespace b {");
    }

    #[test]
    fn test_class_epilogue_takes_semicolon() {
        let text = "class A {\nint x;\n};\n";
        let found = find_constructs(text, &RE_CLASS, true, 5000, "t.h").unwrap();
        assert_eq!(found[0].keyword, "class");
        assert_eq!(found[0].epilogue(text), "};");
    }

    #[test]
    fn test_never_closed_is_malformed() {
        let text = "class A {\nint x() {\n";
        let err = find_constructs(text, &RE_CLASS, true, 5000, "t.h").unwrap_err();
        assert!(matches!(err, ParseError::MalformedConstruct { offset: 0, .. }));
    }

    #[test]
    fn test_hop_bound() {
        let body = "{}".repeat(10);
        let text = format!("class A {{\n{body}\n}};\n");
        assert!(find_constructs(&text, &RE_CLASS, true, 5000, "t.h").is_ok());
        assert!(find_constructs(&text, &RE_CLASS, true, 8, "t.h").is_err());
    }

    #[test]
    fn test_stray_braces() {
        let err = check_braces("class A {\n};\n}", "t.h").unwrap_err();
        assert!(matches!(err, ParseError::MalformedConstruct { offset: 13, .. }));
        let err = check_braces("int f() {\nclass A {\n};", "t.h").unwrap_err();
        assert!(matches!(err, ParseError::MalformedConstruct { offset: 8, .. }));
        assert!(check_braces("namespace a {\n{}\n}", "t.h").is_ok());
    }

    #[test]
    fn test_typedef_conversion() {
        let text = "typedef std::vector<Track> TrackCollection;\ntypedef Foo::iterator It;\ntypedef void (*Fn)(int);";
        assert_eq!(
            convert_typedefs(text),
            "class TrackCollection {\n};\ntypedef Foo::iterator It;\ntypedef void (*Fn)(int);"
        );
    }

    #[test]
    fn test_segment_stream() {
        let text = normalize("namespace foo { class Bar : public Base { public: int x(); }; struct S { int y; }; }");
        let seg = segment(&text, 5000, "t.h").unwrap();
        let marks: Vec<String> = seg
            .tokens()
            .iter()
            .filter_map(|t| match t {
                Token::Mark(p) => Some(p.to_string()),
                Token::Line(_) => None,
            })
            .collect();
        assert_eq!(
            marks,
            vec![
                "\\namespace000",
                "\\class000",
                "\\endclass000",
                "\\structclass001",
                "\\endstructclass001",
                "\\endnamespace000",
            ]
        );
        let open = Placeholder {
            kind: PlaceholderKind::Class,
            index: 0,
        };
        assert_eq!(seg.fragment(&open), "class Bar : public Base {");
        check_balance(&seg.tokens(), "t.h").unwrap();
    }

    #[test]
    fn test_unbalanced_stream() {
        let open = Placeholder {
            kind: PlaceholderKind::Class,
            index: 0,
        };
        let close = Placeholder {
            kind: PlaceholderKind::EndNamespace,
            index: 0,
        };
        let err = check_balance(&[Token::Mark(open), Token::Mark(close)], "t.h").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnbalancedPlaceholders {
                header: "t.h".to_string(),
                placeholder: "\\endnamespace000".to_string(),
            }
        );
        assert!(check_balance(&[Token::Mark(open)], "t.h").is_err());
    }
}
