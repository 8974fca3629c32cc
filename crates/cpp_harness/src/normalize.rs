use regex::{Captures, Regex};
use std::sync::LazyLock;

static RE_COMMENT_OR_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)/\*.*?\*/|//[^\n]*|"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'"#).unwrap()
});
static RE_PREPROCESSOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#(?:[^\n]*\\\n)*[^\n]*").unwrap());
static RE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_POINTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w>\]])\s*(\*+|&&|&)\s*").unwrap());
static RE_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,\s*").unwrap());
static RE_LT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*<\s*").unwrap());
static RE_NOT_EQUAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*!=\s*").unwrap());
static RE_ARITH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w)])\s+([+/-])\s*([\w(])").unwrap());
static RE_OPEN_PAREN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\s+").unwrap());
static RE_CLOSE_PAREN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+\)").unwrap());
static RE_ACCESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(public|protected|private)\s*:(:?)").unwrap());
static RE_CLOSE_SEMI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\}\s*;").unwrap());
static RE_OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\boperator\s+([^\w\s(][^\s(]*)\s*\(").unwrap());

/// Remove comments and blank out string and character literals.
///
/// Literals keep their quotes so a default value still shows that it was
/// there, but nothing inside them can be taken for structure.
pub fn strip_comments_and_literals(text: &str) -> String {
    RE_COMMENT_OR_LITERAL
        .replace_all(text, |caps: &Captures| {
            let m = &caps[0];
            if m.starts_with('"') {
                "\"\"".to_string()
            } else if m.starts_with('\'') {
                "''".to_string()
            } else if m.starts_with("//") {
                String::new()
            } else {
                " ".to_string()
            }
        })
        .into_owned()
}

/// Drop `#` directives, including `\` continuation lines.
pub fn strip_preprocessor(text: &str) -> String {
    RE_PREPROCESSOR.replace_all(text, "").into_owned()
}

/// Put `=` against its operands unless it is part of a comparison or a
/// compound assignment.
fn squeeze_assignments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '=' {
            let prev = out.trim_end().chars().last();
            let next = chars.get(i + 1).copied();
            let compound = matches!(
                prev,
                Some('=' | '!' | '<' | '>' | '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^')
            ) || next == Some('=');
            if !compound {
                let trimmed = out.trim_end().len();
                out.truncate(trimmed);
                out.push('=');
                i += 1;
                while i < chars.len() && chars[i] == ' ' {
                    i += 1;
                }
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Canonical spacing for one line of declaration text.
///
/// `Type *name`, `Type * name` and `Type*name` all become `Type* name`,
/// commas are followed by exactly one space, and `<`, `=` and `!=` lose
/// their surrounding blanks.
pub fn standardize_name(name: &str) -> String {
    let name = RE_SPACE.replace_all(name, " ");
    let name = RE_POINTER.replace_all(&name, "$1$2 ");
    let name = RE_COMMA.replace_all(&name, ", ");
    let name = RE_LT.replace_all(&name, "<");
    let name = RE_NOT_EQUAL.replace_all(&name, "!=");
    let name = RE_ARITH.replace_all(&name, "$1$2$3");
    let name = RE_OPEN_PAREN.replace_all(&name, "(");
    let name = RE_CLOSE_PAREN.replace_all(&name, ")");
    let name = squeeze_assignments(&name);
    name.replace("* )", "*)")
        .replace("& )", "&)")
        .replace("* >", "*>")
        .replace("& >", "&>")
        .replace("* ,", "*,")
        .replace("& ,", "&,")
        .trim()
        .to_string()
}

/// `operator ==(` becomes `operator==(`. Word operators such as
/// `operator new` and conversion operators keep their space.
pub fn standardize_op_name(name: &str) -> String {
    RE_OPERATOR.replace_all(name, "operator$1(").into_owned()
}

/// Full normalization of a header: comments, literals and directives are
/// removed, spacing is made canonical and the text is laid out one
/// statement per line, with a break after every `{`, `;` and access
/// specifier and before every `}`.
pub fn normalize(text: &str) -> String {
    let text = strip_comments_and_literals(text);
    let text = strip_preprocessor(&text);
    let text = standardize_op_name(&standardize_name(&text));

    let text = text
        .replace('{', "{\n")
        .replace(';', ";\n")
        .replace('}', "\n}\n");
    let text = RE_CLOSE_SEMI.replace_all(&text, "};");
    // `public ::ns::Base` in a base list is not an access specifier
    let text = RE_ACCESS.replace_all(&text, |caps: &Captures| {
        if caps[2].is_empty() {
            format!("{}:\n", &caps[1])
        } else {
            caps[0].to_string()
        }
    });

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_comments_stop_at_first_close() {
        let text = "int a; /* one */ int b; /* two */ int c; // tail\nint d;";
        let stripped = strip_comments_and_literals(text);
        assert!(stripped.contains("int b;"));
        assert!(stripped.contains("int c;"));
        assert!(stripped.contains("int d;"));
        assert!(!stripped.contains("one"));
        assert!(!stripped.contains("tail"));
    }

    #[test]
    fn test_literals_cannot_hide_braces() {
        let stripped = strip_comments_and_literals(r#"const char* s = "{ \" }"; char c = '}';"#);
        assert_eq!(stripped, r#"const char* s = ""; char c = '';"#);
    }

    #[test]
    fn test_directives_removed() {
        let text = "#ifndef X_H\n#define LONG(a) \\\n  (a)\nclass X {};\n#endif\n";
        assert_eq!(strip_preprocessor(text).trim(), "class X {};");
    }

    #[test]
    fn test_pointer_spacing_is_canonical() {
        assert_eq!(standardize_name("Type *name"), "Type* name");
        assert_eq!(standardize_name("Type * name"), "Type* name");
        assert_eq!(standardize_name("Type*name"), "Type* name");
        assert_eq!(standardize_name("const Foo & f"), "const Foo& f");
        assert_eq!(standardize_name("f(int* , char ** argv)"), "f(int*, char** argv)");
    }

    #[test]
    fn test_punctuation_spacing() {
        assert_eq!(standardize_name("std::map < int,int >  m"), "std::map<int, int > m");
        assert_eq!(standardize_name("double y(int q = 3)"), "double y(int q=3)");
        assert_eq!(standardize_name("bool operator == (int a)"), "bool operator == (int a)");
        assert_eq!(standardize_name("a != b"), "a!=b");
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(standardize_op_name("bool operator == (int a)"), "bool operator==(int a)");
        assert_eq!(standardize_op_name("operator double()"), "operator double()");
    }

    #[test]
    fn test_layout() {
        let text = "namespace foo { class Bar : public Base { public: int x(); } ; }";
        assert_eq!(
            normalize(text),
            "namespace foo {\nclass Bar : public Base {\npublic:\nint x();\n};\n}"
        );
    }

    #[test]
    fn test_global_scope_base_is_not_an_access_specifier() {
        let text = "class D : public ::ns::Base { public: int x(); };";
        assert_eq!(
            normalize(text),
            "class D : public ::ns::Base {\npublic:\nint x();\n};"
        );
    }
}
