use protocol::{short_name, ClassCatalogEntry};
use regex::Regex;
use std::sync::LazyLock;

/// Name written after the timestamp on the `Created:` line.
pub const CATALOG_TOOL: &str = "headercat";

const LABEL_WIDTH: usize = 15;

static RE_METHOD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z~][\w<>:,]*\(").unwrap());
static RE_UNSAFE_FILE_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w.\-]").unwrap());

/// One line of an `AccessMethods:` or `DataMembers:` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub return_type: String,
    pub name: String,
    /// Text after the type column, `name(args)` or the member name.
    pub signature: String,
    /// Argument text for methods (`void` when empty); `None` for data members.
    pub args: Option<String>,
    pub line: String,
}

impl ListedEntry {
    pub fn is_method(&self) -> bool {
        self.args.is_some()
    }
}

/// A per-class catalog file read back from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogListing {
    pub class: String,
    pub header: String,
    pub bases: Vec<String>,
    pub entries: Vec<ListedEntry>,
}

impl CatalogListing {
    pub fn methods(&self) -> impl Iterator<Item = &ListedEntry> {
        self.entries.iter().filter(|e| e.is_method())
    }

    pub fn data_members(&self) -> impl Iterator<Item = &ListedEntry> {
        self.entries.iter().filter(|e| !e.is_method())
    }
}

/// `DataFormats/Track/interface/Track.h` becomes `DataFormats.Track.Track`.
pub fn file_stem(header: &str) -> String {
    let header = header.replace("interface/", "");
    let stem = match header.rfind('.') {
        Some(dot) if !header[dot..].contains('/') => &header[..dot],
        _ => header.as_str(),
    };
    stem.replace('/', ".")
}

pub fn catalog_file_name(header: &str, class_name: &str) -> String {
    let short = short_name(class_name.split('<').next().unwrap_or(class_name));
    let short = RE_UNSAFE_FILE_CHAR.replace_all(short, "_");
    format!("{}.{}.txt", file_stem(header), short)
}

fn label(name: &str) -> String {
    format!("{:<width$}", format!("{name}:"), width = LABEL_WIDTH)
}

pub fn render_catalog(entry: &ClassCatalogEntry, version: &str, created: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}{}\n\n", label("Class"), entry.record.name));
    out.push_str(&format!("{}{}\n\n", label("Header"), entry.record.header));

    if let Some((first, rest)) = entry.inherited.split_first() {
        out.push_str(&format!("{}{}\n", label("BaseClasses"), first));
        for base in rest {
            out.push_str(&format!("{}{}\n", " ".repeat(LABEL_WIDTH), base));
        }
        out.push('\n');
    }

    out.push_str(&format!("{}{}\n", label("Version"), version));
    out.push_str(&format!("{}{}\t{}\n", label("Created"), created, CATALOG_TOOL));

    for owner in entry.owners() {
        let methods: Vec<String> = entry
            .methods
            .iter()
            .filter(|m| m.owner == owner)
            .map(|m| m.listing_line())
            .collect();
        if !methods.is_empty() {
            out.push_str(&format!("\n{}{}\n", label("AccessMethods"), owner));
            for line in methods {
                out.push_str(&format!("{line}\n"));
            }
        }
    }

    for owner in entry.owners() {
        let members: Vec<String> = entry
            .data_members
            .iter()
            .filter(|m| m.owner == owner)
            .map(|m| m.listing_line())
            .collect();
        if !members.is_empty() {
            out.push_str(&format!("\n{}{}\n", label("DataMembers"), owner));
            for line in members {
                out.push_str(&format!("{line}\n"));
            }
        }
    }

    out
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Bases,
    Methods,
    Members,
}

/// Split a listing line into its type column and the rest. The writer
/// separates them with two spaces; single spaces occur inside types.
fn split_columns(line: &str) -> Option<(&str, &str)> {
    let (ty, rest) = line.split_once("  ")?;
    Some((ty.trim(), rest.trim()))
}

fn parse_method_line(line: &str) -> Option<ListedEntry> {
    let (return_type, signature) = match split_columns(line) {
        Some(columns) => columns,
        None => {
            let start = RE_METHOD_NAME.find(line)?.start();
            (line[..start].trim(), &line[start..])
        }
    };
    let open = signature.find('(')?;
    let name = signature[..open].trim().to_string();
    let close = signature[open..].find(')').map(|c| open + c)?;
    let args = signature[open + 1..close].trim();
    Some(ListedEntry {
        return_type: return_type.to_string(),
        name,
        signature: signature.to_string(),
        args: Some(if args.is_empty() { "void" } else { args }.to_string()),
        line: line.to_string(),
    })
}

fn parse_member_line(line: &str) -> Option<ListedEntry> {
    let (ty, name) = match split_columns(line) {
        Some(columns) => columns,
        None => line.rsplit_once(' ')?,
    };
    Some(ListedEntry {
        return_type: ty.trim().to_string(),
        name: name.trim().to_string(),
        signature: name.trim().to_string(),
        args: None,
        line: line.to_string(),
    })
}

/// Read back a catalog written by [`render_catalog`]. Lines that do not look
/// like a method or member are ignored.
pub fn parse_catalog(text: &str) -> CatalogListing {
    let mut listing = CatalogListing::default();
    let mut section = Section::None;

    for raw in text.lines() {
        let line = raw.trim();
        let (token, value) = match line.split_once(char::is_whitespace) {
            Some((token, value)) => (token, value.trim()),
            None => (line, ""),
        };

        match token {
            "Class:" => {
                listing.class = value.to_string();
                section = Section::None;
            }
            "Header:" => {
                listing.header = value.to_string();
                section = Section::None;
            }
            "BaseClasses:" => {
                if !value.is_empty() {
                    listing.bases.push(value.to_string());
                }
                section = Section::Bases;
            }
            "AccessMethods:" => section = Section::Methods,
            "DataMembers:" => section = Section::Members,
            "Version:" | "Created:" => section = Section::None,
            _ if line.is_empty() => section = Section::None,
            _ => match section {
                Section::Bases => listing.bases.push(line.to_string()),
                Section::Methods => listing.entries.extend(parse_method_line(line)),
                Section::Members => listing.entries.extend(parse_member_line(line)),
                Section::None => {}
            },
        }
    }

    listing
}
