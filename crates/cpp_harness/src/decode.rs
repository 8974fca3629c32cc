use crate::normalize::{standardize_name, standardize_op_name};
use crate::split::{find_single_colon, split_top_level, split_words};
use crate::types::starts_with_simple_type;
use protocol::{is_operator_name, Argument, DataMember, MethodSignature, ParseError};
use regex::Regex;
use std::sync::LazyLock;

static RE_OPEN_PAREN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([ \t]*").unwrap());
static RE_CLOSE_PAREN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+\)").unwrap());
static RE_OPEN_BRACKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[ \t]*").unwrap());
static RE_CLOSE_BRACKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+\]").unwrap());
static RE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_THROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bthrow\s*\(\s*\)").unwrap());
static RE_CALL_OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\boperator\s*\(\s*\)").unwrap());
static RE_PTR_BEFORE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\*|&)([A-Za-z])").unwrap());
static RE_CALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w*&:]+\s+)+\(\s*(?:\w+::)?\s*\*\s*(\w+)\s*\)\s*\(.*\)").unwrap()
});
static RE_CALLBACK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*(?:\w+::)?\s*\*\s*\w+\s*\)").unwrap());
static RE_PURE_OR_DEFAULTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\s*(?:0|default|delete)\b|\boverride\b|\bfinal\b").unwrap());
static RE_TIDY_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([*&\[])|<\s+").unwrap());

const THROW_MARK: &str = "throwPP";
const CALL_OPERATOR_MARK: &str = "operator@call";

const SPECIFIERS: &[&str] = &[
    "virtual",
    "static",
    "inline",
    "explicit",
    "constexpr",
    "friend",
    "extern",
];

const MEMBER_SPECIFIERS: &[&str] = &["static", "mutable", "inline", "constexpr", "volatile"];

/// `const double &` gives `const double&`, `vector< int >` gives `vector<int >`.
fn tidy_type(ty: &str) -> String {
    let ty = RE_SPACE.replace_all(ty.trim(), " ");
    RE_TIDY_TYPE
        .replace_all(&ty, |caps: &regex::Captures| match caps.get(1) {
            Some(m) => m.as_str().to_string(),
            None => "<".to_string(),
        })
        .into_owned()
}

fn strip_specifiers<'a>(words: &[&'a str]) -> Vec<&'a str> {
    words
        .iter()
        .copied()
        .skip_while(|w| SPECIFIERS.contains(w) || w.starts_with("[["))
        .collect()
}

/// Split an argument list at commas that are not nested in `()`, `[]` or
/// `<>`, so `std::map<int,int> m, double x` is two arguments.
pub fn split_arguments(args: &str) -> Vec<String> {
    split_top_level(args, ',')
        .into_iter()
        .map(|a| a.trim().to_string())
        .collect()
}

/// Last word says whether the field still carries a parameter name.
fn is_type_word(word: &str) -> bool {
    word.ends_with('*') || word.ends_with('&') || word == "const" || starts_with_simple_type(word)
}

fn decode_argument(field: &str) -> Result<Argument, ParseError> {
    let field = RE_PTR_BEFORE_NAME.replace_all(field, "$1 $2");

    let (decl, default) = match field.find('=') {
        Some(j) => {
            let value = standardize_name(field[j + 1..].trim()).replace(" (", "(");
            (field[..j].trim().to_string(), Some(value))
        }
        None => (field.trim().to_string(), None),
    };

    if let Some(caps) = RE_CALLBACK.captures(&decl) {
        let name = caps[1].to_string();
        let inner = RE_CALLBACK_NAME.replace(&decl, "CALLB_");
        let sig = decode_method(&inner)?;
        let mut ty = format!("{} (*)({})", sig.return_type, sig.arg_types().join(", "));
        if !sig.qualifier.is_empty() {
            ty.push(' ');
            ty.push_str(&sig.qualifier);
        }
        return Ok(Argument::new(ty, name, default));
    }

    let words = split_words(&decl);
    let (mut ty, mut name) = match words.as_slice() {
        [] => (String::new(), String::new()),
        [only] => (only.to_string(), String::new()),
        [first, .., last] => {
            let n = words.len();
            if is_type_word(last) || (*first == "const" && n == 2) {
                (words.join(" "), String::new())
            } else {
                (words[..n - 1].join(" "), last.to_string())
            }
        }
    };

    // `x[3]` is a name with an array suffix; the suffix belongs to the type
    if let (Some(i), Some(j)) = (name.find('['), name.rfind(']')) {
        if i < j {
            ty.push_str(&name[i..=j]);
            name.truncate(i);
        }
    }

    Ok(Argument::new(tidy_type(&ty), name, default))
}

/// Decode one method declaration into return type, name, arguments and
/// trailing qualifier.
///
/// This is a heuristic reading of the text, not a C++ parser. The argument
/// list is the first token group starting with `(` that is not inside an
/// unclosed template bracket, the qualifier is whatever follows the last
/// `)`. Fails with `UndecodableSignature` when no argument list or no name
/// can be found.
pub fn decode_method(text: &str) -> Result<MethodSignature, ParseError> {
    let method = RE_THROW.replace_all(text, THROW_MARK);
    let method = RE_CALL_OPERATOR.replace_all(&method, CALL_OPERATOR_MARK);
    let method = standardize_op_name(&standardize_name(&method));
    let method = RE_OPEN_PAREN.replace_all(&method, " (");
    let method = RE_CLOSE_PAREN.replace_all(&method, ") ");
    let method = RE_OPEN_BRACKET.replace_all(&method, " [");
    let method = RE_CLOSE_BRACKET.replace_all(&method, "] ");
    let method = RE_SPACE.replace_all(&method, " ");
    let method = method.trim();

    let Some(j) = method.rfind(')') else {
        return Err(ParseError::undecodable(text));
    };
    let declarator = method[..=j].replace(" [", "[").replace(" <", "<");
    let qualifier = method[j + 1..].replace(';', "");
    let qualifier = RE_PURE_OR_DEFAULTED.replace_all(&qualifier, "");
    let qualifier = RE_SPACE
        .replace_all(qualifier.trim(), " ")
        .replace(THROW_MARK, "throw()");

    let mut tokens: Vec<String> = declarator.split_whitespace().map(str::to_string).collect();

    let mut k = None;
    for (n, token) in tokens.iter().enumerate() {
        if !token.starts_with('(') {
            continue;
        }
        if n > 0 {
            let prev = &tokens[n - 1];
            let unclosed = prev.matches('<').count() > prev.matches('>').count();
            if !is_operator_name(prev) && unclosed {
                continue;
            }
        }
        k = Some(n);
        break;
    }
    let Some(k) = k.filter(|k| *k > 0) else {
        return Err(ParseError::undecodable(text));
    };

    tokens[k].remove(0);
    if let Some(last) = tokens.last_mut() {
        last.pop();
    }
    let args = tokens[k..].join(" ");
    let args = args.trim();

    let mut arguments = Vec::new();
    if !args.is_empty() {
        for field in split_arguments(args) {
            arguments.push(decode_argument(&field)?);
        }
    }
    let only_void = matches!(
        arguments.as_slice(),
        [only] if only.ty == "void" && only.name.is_empty() && only.default.is_none()
    );
    if only_void {
        arguments.clear();
    }

    let head: Vec<&str> = tokens[..k].iter().map(String::as_str).collect();
    let head = strip_specifiers(&head);
    let (return_type, name) = match head.iter().position(|t| is_operator_name(t)) {
        Some(q) => (head[..q].join(" "), head[q..].concat()),
        None => match head.split_last() {
            Some((name, rest)) => (rest.join(" "), name.to_string()),
            None => (String::new(), String::new()),
        },
    };
    let name = name.replace(CALL_OPERATOR_MARK, "operator()");
    if name.is_empty() {
        return Err(ParseError::undecodable(text));
    }

    Ok(MethodSignature {
        return_type: tidy_type(&return_type),
        name,
        args: arguments,
        qualifier,
    })
}

/// Decode a single data-member declarator such as `static const int kMax=3`
/// or `double x_[3]` into its type and name.
pub fn decode_data_member(text: &str) -> Result<DataMember, ParseError> {
    let text = RE_SPACE.replace_all(text.trim().trim_end_matches(';'), " ");
    let text = split_top_level(&text, '=')[0];
    let text = text.split('{').next().unwrap_or(text);
    // bit fields
    let text = match find_single_colon(text) {
        Some(i) => &text[..i],
        None => text,
    };

    let words: Vec<&str> = split_words(text)
        .into_iter()
        .skip_while(|w| MEMBER_SPECIFIERS.contains(w))
        .collect();
    let Some((last, rest)) = words.split_last() else {
        return Err(ParseError::undecodable(text));
    };
    if rest.is_empty() {
        return Err(ParseError::undecodable(text));
    }

    let mut ty = rest.join(" ");
    let mut name = last.to_string();
    while let Some(stripped) = name.strip_prefix(['*', '&']) {
        ty.push_str(&name[..1]);
        name = stripped.to_string();
    }
    if let (Some(i), Some(j)) = (name.find('['), name.rfind(']')) {
        if i < j {
            ty.push_str(&name[i..=j]);
            name.truncate(i);
        }
    }
    if name.is_empty() {
        return Err(ParseError::undecodable(text));
    }
    Ok(DataMember {
        ty: tidy_type(&ty),
        name,
    })
}

/// Decode `int a, b[2]` into one member per declarator, all sharing the
/// leading type.
pub fn decode_data_members(text: &str) -> Result<Vec<DataMember>, ParseError> {
    let parts = split_top_level(text, ',');
    let first = decode_data_member(parts[0])?;
    let base = first.ty.trim_end_matches(['*', '&']).to_string();
    let base = match base.find('[') {
        Some(i) => base[..i].to_string(),
        None => base,
    };
    let mut members = vec![first];
    for part in &parts[1..] {
        members.push(decode_data_member(&format!("{base} {}", part.trim()))?);
    }
    Ok(members)
}
