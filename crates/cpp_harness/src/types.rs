use regex::Regex;
use std::sync::LazyLock;

/// Builtin types and their ROOT-style aliases, as `(c++ spelling, alias)`.
pub const FUNDAMENTAL_TYPES: &[(&str, &str)] = &[
    ("char", "Char_t"),
    ("unsigned char", "UChar_t"),
    ("short", "Short_t"),
    ("unsigned short", "UShort_t"),
    ("int", "Int_t"),
    ("unsigned int", "UInt_t"),
    ("int", "Seek_t"),
    ("long", "Long_t"),
    ("unsigned long", "ULong_t"),
    ("float", "Float_t"),
    ("float", "Float16_t"),
    ("double", "Double_t"),
    ("double", "Double32_t"),
    ("char", "Text_t"),
    ("bool", "Bool_t"),
    ("unsigned char", "Byte_t"),
    ("short", "Version_t"),
    ("const char", "Option_t"),
    ("int", "Ssiz_t"),
    ("float", "Real_t"),
    ("long long", "Long64_t"),
    ("unsigned long long", "ULong64_t"),
    ("double", "Axis_t"),
    ("double", "Stat_t"),
    ("short", "Font_t"),
    ("short", "Style_t"),
    ("short", "Marker_t"),
    ("short", "Width_t"),
    ("short", "Color_t"),
    ("short", "SCoord_t"),
    ("double", "Coord_t"),
    ("float", "Angle_t"),
    ("float", "Size_t"),
];

const STRING_TYPES: &[&str] = &["size_t", "string", "std::string"];

fn alternatives() -> String {
    let mut names: Vec<&str> = STRING_TYPES.to_vec();
    for (spelling, alias) in FUNDAMENTAL_TYPES {
        names.push(spelling);
        names.push(alias);
    }
    // longest first so `unsigned long long` wins over `unsigned long`
    names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    names.dedup();
    names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|")
}

static RE_SIMPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^(?:{})\b", alternatives())).unwrap());

static RE_FUNDAMENTAL_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^(?:[0-9]+|void|{})", alternatives())).unwrap());

/// True when `word` starts with a fundamental type name.
pub fn starts_with_simple_type(word: &str) -> bool {
    RE_SIMPLE.is_match(word.trim())
}

/// True for types a generated accessor can hold directly: builtins, their
/// aliases and strings, optionally `const` and passed by reference.
/// Pointers are only accepted as C strings.
pub fn is_simple_type(ty: &str) -> bool {
    let ty = ty.trim();
    let core = ty.strip_prefix("const ").unwrap_or(ty).trim();
    let core = core.strip_suffix('&').unwrap_or(core).trim_end();
    if let Some(pointee) = core.strip_suffix('*') {
        return pointee.trim_end() == "char";
    }
    RE_SIMPLE.is_match(core)
}

/// Words that can never name a class: numbers, `void` and builtin types.
pub fn is_fundamental_word(word: &str) -> bool {
    RE_FUNDAMENTAL_WORD.is_match(word)
}
