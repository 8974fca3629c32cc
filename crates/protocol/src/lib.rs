use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod error;
pub use error::ParseError;

/// Width used to right-justify types in catalog listings.
pub const LISTING_TYPE_WIDTH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeaderFile {
    pub path: String,
    pub text: String,
}

impl HeaderFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlaceholderKind {
    Namespace,
    EndNamespace,
    Class,
    EndClass,
    StructClass,
    EndStructClass,
}

impl PlaceholderKind {
    pub const ALL: [PlaceholderKind; 6] = [
        PlaceholderKind::Namespace,
        PlaceholderKind::EndNamespace,
        PlaceholderKind::Class,
        PlaceholderKind::EndClass,
        PlaceholderKind::StructClass,
        PlaceholderKind::EndStructClass,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            PlaceholderKind::Namespace => "namespace",
            PlaceholderKind::EndNamespace => "endnamespace",
            PlaceholderKind::Class => "class",
            PlaceholderKind::EndClass => "endclass",
            PlaceholderKind::StructClass => "structclass",
            PlaceholderKind::EndStructClass => "endstructclass",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self,
            PlaceholderKind::Namespace | PlaceholderKind::Class | PlaceholderKind::StructClass
        )
    }

    /// The kind that closes this one. Closing kinds map to themselves.
    pub fn closing(&self) -> Self {
        match self {
            PlaceholderKind::Namespace => PlaceholderKind::EndNamespace,
            PlaceholderKind::Class => PlaceholderKind::EndClass,
            PlaceholderKind::StructClass => PlaceholderKind::EndStructClass,
            other => *other,
        }
    }
}

/// Synthetic token standing in for a brace-matched construct boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub index: usize,
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\{}{:03}", self.kind.tag(), self.index)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassRecord {
    pub name: String,
    pub bases: Vec<String>,
    pub template_params: Vec<String>,
    pub header: String,
}

impl ClassRecord {
    /// Last `::` component of the qualified name.
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }
}

pub fn short_name(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

/// `operator==` or `operator` but not `Cooperator` or `operatorCount`.
pub fn is_operator_name(token: &str) -> bool {
    token
        .strip_prefix("operator")
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Argument {
    pub ty: String,
    pub name: String,
    pub default: Option<String>,
}

impl Argument {
    pub fn new(ty: impl Into<String>, name: impl Into<String>, default: Option<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            default,
        }
    }

    /// `type name=default`, omitting the parts that are absent.
    pub fn declaration(&self) -> String {
        let mut decl = self.ty.clone();
        if !self.name.is_empty() {
            decl.push(' ');
            decl.push_str(&self.name);
        }
        if let Some(default) = &self.default {
            decl.push('=');
            decl.push_str(default);
        }
        decl
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
    Destructor,
    Operator,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodSignature {
    pub return_type: String,
    pub name: String,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub qualifier: String,
}

impl MethodSignature {
    pub fn arg_types(&self) -> Vec<&str> {
        self.args.iter().map(|a| a.ty.as_str()).collect()
    }

    pub fn arg_names(&self) -> Vec<&str> {
        self.args.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn arg_declarations(&self) -> Vec<String> {
        self.args.iter().map(Argument::declaration).collect()
    }

    /// Leading arguments that must be supplied by the caller.
    pub fn required_args(&self) -> usize {
        self.args.iter().take_while(|a| a.default.is_none()).count()
    }

    pub fn defaulted_args(&self) -> usize {
        self.args.len() - self.required_args()
    }

    pub fn kind(&self, class_name: &str) -> MethodKind {
        let short = short_name(class_name);
        let short = short.split('<').next().unwrap_or(short);
        if is_operator_name(&self.name) {
            MethodKind::Operator
        } else if self.name == short {
            MethodKind::Constructor
        } else if self.name.strip_prefix('~') == Some(short) {
            MethodKind::Destructor
        } else {
            MethodKind::Method
        }
    }

    pub fn render(&self) -> String {
        let text = format!(
            "{} {}({}) {}",
            self.return_type,
            self.name,
            self.arg_declarations().join(", "),
            self.qualifier
        );
        text.trim().to_string()
    }

    /// Key under which two signatures count as the same method.
    pub fn dedup_key(&self) -> String {
        normalize_signature(&format!(
            "{} {}({})",
            self.return_type,
            self.name,
            self.arg_types().join(", ")
        ))
    }
}

/// Collapse whitespace, squeeze `> >` into `>>` and spell out
/// `std::basic_string<char>` as `std::string`.
pub fn normalize_signature(text: &str) -> String {
    let mut out = text.split_whitespace().collect::<Vec<_>>().join(" ");
    while out.contains(" >") {
        out = out.replace(" >", ">");
    }
    out.replace(
        "std::basic_string<char, std::char_traits<char>, std::allocator<char>>",
        "std::string",
    )
    .replace("std::basic_string<char>", "std::string")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataMember {
    pub ty: String,
    pub name: String,
}

/// What the reflection oracle knows about one class.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassInfo {
    #[serde(default)]
    pub methods: Vec<MethodSignature>,
    #[serde(default)]
    pub data_members: Vec<DataMember>,
    #[serde(default)]
    pub bases: Vec<String>,
}

/// A method kept in a class catalog, possibly a chained compound accessor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessMethod {
    pub owner: String,
    pub return_type: String,
    pub name: String,
    pub signature: String,
    pub call: String,
    pub required_args: usize,
    pub defaulted_args: usize,
}

impl AccessMethod {
    pub fn listing_line(&self) -> String {
        format!(
            "{:>width$}  {}",
            self.return_type,
            self.signature,
            width = LISTING_TYPE_WIDTH
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessMember {
    pub owner: String,
    pub ty: String,
    pub name: String,
}

impl AccessMember {
    pub fn listing_line(&self) -> String {
        format!("{:>width$}  {}", self.ty, self.name, width = LISTING_TYPE_WIDTH)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassCatalogEntry {
    pub record: ClassRecord,
    pub methods: Vec<AccessMethod>,
    pub data_members: Vec<AccessMember>,
    pub inherited: Vec<String>,
}

impl ClassCatalogEntry {
    pub fn new(record: ClassRecord) -> Self {
        Self {
            record,
            methods: Vec::new(),
            data_members: Vec::new(),
            inherited: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.data_members.is_empty()
    }

    /// Classes that contributed methods or members, in first-seen order.
    pub fn owners(&self) -> Vec<&str> {
        let mut owners: Vec<&str> = Vec::new();
        let all = self
            .methods
            .iter()
            .map(|m| m.owner.as_str())
            .chain(self.data_members.iter().map(|d| d.owner.as_str()));
        for owner in all {
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }
        owners
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum HeaderPaths {
    One(String),
    Many(Vec<String>),
}

impl HeaderPaths {
    pub fn primary(&self) -> &str {
        match self {
            HeaderPaths::One(path) => path,
            HeaderPaths::Many(paths) => paths.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn paths(&self) -> Vec<&str> {
        match self {
            HeaderPaths::One(path) => vec![path.as_str()],
            HeaderPaths::Many(paths) => paths.iter().map(String::as_str).collect(),
        }
    }

    fn add(&mut self, path: &str) {
        if self.paths().contains(&path) {
            return;
        }
        let mut paths: Vec<String> = self.paths().into_iter().map(str::to_string).collect();
        paths.push(path.to_string());
        *self = HeaderPaths::Many(paths);
    }
}

/// Class name to header path(s), sorted by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ClassToHeaderMap {
    entries: BTreeMap<String, HeaderPaths>,
}

impl ClassToHeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// First insertion wins. Returns true if the name was new.
    pub fn insert(&mut self, name: &str, header: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries
            .insert(name.to_string(), HeaderPaths::One(header.to_string()));
        true
    }

    /// Keys derived from template primaries keep every header they appear in.
    pub fn insert_template(&mut self, name: &str, header: &str) -> bool {
        match self.entries.get_mut(name) {
            Some(paths) => {
                paths.add(header);
                false
            }
            None => self.insert(name, header),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderPaths> {
        self.entries.get(name)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(HeaderPaths::primary)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderPaths)> {
        self.entries.iter()
    }
}
