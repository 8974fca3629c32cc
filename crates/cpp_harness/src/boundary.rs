use crate::segment::{Segmented, Token};
use crate::split::{find_single_colon, matching_close, split_top_level, split_words};
use protocol::{ClassRecord, ParseError, Placeholder, PlaceholderKind};
use regex::Regex;
use std::sync::LazyLock;

static RE_SKIP_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:friend|using|typedef|enum|template|static_assert|namespace|class|struct|union)\b")
        .unwrap()
});
static RE_ACCESS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(public|protected|private)\s*:$").unwrap());

const BASE_DECORATIONS: &[&str] = &["public", "private", "protected", "virtual"];

/// What the preamble of a class says about it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassTitle {
    pub name: String,
    pub bases: Vec<String>,
    pub template_params: Vec<String>,
}

/// A class found by the walker, with the raw declarations of its public
/// section split into method and data-member fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedClass {
    pub record: ClassRecord,
    pub is_struct: bool,
    pub method_fragments: Vec<String>,
    pub member_fragments: Vec<String>,
}

/// `template<class T, typename U = int>` gives `[T, U]`.
pub fn template_params(inner: &str) -> Vec<String> {
    split_top_level(inner, ',')
        .into_iter()
        .filter_map(|param| {
            let param = split_top_level(param, '=')[0].trim();
            let name = split_words(param).last().copied()?;
            let name = name.trim_start_matches("...").trim_end_matches("...");
            if name.is_empty() || name == "class" || name == "typename" {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

/// Parse `[template<...>] class|struct [MACROS] Name [final] [: bases] {`.
pub fn class_title(preamble: &str) -> ClassTitle {
    let mut text = preamble.trim().trim_end_matches('{').trim();
    let mut params = Vec::new();

    if let Some(rest) = text.strip_prefix("template") {
        let rest = rest.trim_start();
        let offset = text.len() - rest.len();
        if rest.starts_with('<') {
            if let Some(close) = matching_close(text, offset, b'<', b'>') {
                params = template_params(&text[offset + 1..close]);
                text = text[close + 1..].trim_start();
            }
        }
    }

    let text = text
        .strip_prefix("class")
        .or_else(|| text.strip_prefix("struct"))
        .unwrap_or(text)
        .trim();

    let (head, base_list) = match find_single_colon(text) {
        Some(i) => (&text[..i], Some(&text[i + 1..])),
        None => (text, None),
    };

    let name = split_words(head)
        .into_iter()
        .filter(|w| *w != "final" && !w.starts_with("alignas"))
        .last()
        .unwrap_or("")
        .to_string();

    let bases = base_list
        .map(|list| {
            split_top_level(list, ',')
                .into_iter()
                .map(|base| {
                    split_words(base)
                        .into_iter()
                        .filter(|w| !BASE_DECORATIONS.contains(w))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .filter(|b| !b.is_empty())
                .collect()
        })
        .unwrap_or_default();

    ClassTitle {
        name,
        bases,
        template_params: params,
    }
}

/// `namespace a::b {` gives `a::b`; anonymous namespaces give `""`.
pub fn namespace_name(preamble: &str) -> String {
    let text = preamble.trim().trim_end_matches('{').trim();
    let text = text.strip_prefix("inline").unwrap_or(text).trim();
    text.strip_prefix("namespace")
        .unwrap_or(text)
        .trim()
        .to_string()
}

/// Drop a constructor initializer list: `Foo(int a) : a_(a)` gives `Foo(int a)`.
fn strip_initializer(fragment: &str) -> &str {
    let Some(open) = fragment.find('(') else {
        return fragment;
    };
    let Some(close) = matching_close(fragment, open, b'(', b')') else {
        return fragment;
    };
    let rest = &fragment[close + 1..];
    match find_single_colon(rest) {
        Some(i) if rest[..i].trim().is_empty() => &fragment[..=close],
        _ => fragment,
    }
}

#[derive(Debug, Default)]
struct Members {
    methods: Vec<String>,
    data: Vec<String>,
}

impl Members {
    fn push(&mut self, fragment: &str) {
        let fragment = fragment.trim().trim_end_matches(';').trim();
        if fragment.is_empty() || RE_SKIP_DECLARATION.is_match(fragment) {
            return;
        }
        if fragment.contains('(') {
            // function pointer members are not accessors
            if fragment.contains("(*") {
                return;
            }
            self.methods.push(strip_initializer(fragment).trim().to_string());
        } else {
            self.data.push(fragment.to_string());
        }
    }
}

/// Per-class state kept on the walker's stack.
#[derive(Debug)]
struct ClassFrame {
    title: ClassTitle,
    is_struct: bool,
    public: bool,
    body_depth: usize,
    members: Members,
}

impl ClassFrame {
    fn new(title: ClassTitle, is_struct: bool) -> Self {
        Self {
            title,
            is_struct,
            public: is_struct,
            body_depth: 0,
            members: Members::default(),
        }
    }

    /// Feed one statement line of this class's own body.
    fn line(&mut self, line: &str) {
        if self.body_depth > 0 {
            let opens = line.matches('{').count();
            let closes = line.matches('}').count();
            self.body_depth = (self.body_depth + opens).saturating_sub(closes);
            return;
        }
        if let Some(caps) = RE_ACCESS_LINE.captures(line) {
            self.public = &caps[1] == "public";
            return;
        }
        if let Some(decl) = line.strip_suffix('{') {
            self.body_depth = 1;
            if self.public {
                self.members.push(decl);
            }
            return;
        }
        if line.starts_with('}') {
            return;
        }
        if self.public {
            for decl in line.split_terminator(';') {
                self.members.push(decl);
            }
        }
    }
}

#[derive(Debug)]
struct Frame {
    open: Placeholder,
    name: String,
    class: Option<ClassFrame>,
}

/// Replay the placeholder stream, keeping a stack of enclosing namespace
/// and class names, and emit a class every time a class placeholder closes.
pub fn walk(segmented: &Segmented, header: &str) -> Result<Vec<ParsedClass>, ParseError> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut classes = Vec::new();

    for token in segmented.tokens() {
        let p = match token {
            Token::Line(line) => {
                if let Some(class) = stack.last_mut().and_then(|f| f.class.as_mut()) {
                    class.line(line);
                }
                continue;
            }
            Token::Mark(p) => p,
        };

        if p.kind.is_open() {
            let preamble = segmented.fragment(&p);
            let frame = match p.kind {
                PlaceholderKind::Namespace => Frame {
                    open: p,
                    name: namespace_name(preamble),
                    class: None,
                },
                _ => {
                    let title = class_title(preamble);
                    Frame {
                        open: p,
                        name: title.name.clone(),
                        class: Some(ClassFrame::new(
                            title,
                            p.kind == PlaceholderKind::StructClass,
                        )),
                    }
                }
            };
            stack.push(frame);
            continue;
        }

        let frame = match stack.pop() {
            Some(f) if f.open.kind.closing() == p.kind && f.open.index == p.index => f,
            _ => {
                return Err(ParseError::UnbalancedPlaceholders {
                    header: header.to_string(),
                    placeholder: p.to_string(),
                })
            }
        };

        let Some(class) = frame.class else { continue };
        let name = stack
            .iter()
            .map(|f| f.name.as_str())
            .chain(std::iter::once(frame.name.as_str()))
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join("::");
        if class.title.name.is_empty() {
            continue;
        }
        classes.push(ParsedClass {
            record: ClassRecord {
                name,
                bases: class.title.bases,
                template_params: class.title.template_params,
                header: header.to_string(),
            },
            is_struct: class.is_struct,
            method_fragments: class.members.methods,
            member_fragments: class.members.data,
        });
    }

    if let Some(frame) = stack.pop() {
        return Err(ParseError::UnbalancedPlaceholders {
            header: header.to_string(),
            placeholder: frame.open.to_string(),
        });
    }
    Ok(classes)
}
