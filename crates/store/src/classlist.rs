use anyhow::{Context, Result};
use protocol::ClassToHeaderMap;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

/// Prefixes of class names too complicated to list.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "edmNew",
    "RefVector",
    "PtrVector",
    "Collection",
    "edm::Ptr",
    "edm::Ref",
    "edm::FwdRef",
    "edm::PtrVector",
    "edm::EDCollection",
    "edm::DetSet",
    "edm::AssociationMap",
    "edm::Association",
    "edm::ValueMap",
    "edm::RangeMap",
    "edm::OwnVector",
    "edm::Lazy",
    "std::vector<edm::Fwd",
    "std::vector<edm::Ref",
    "std::vector<edm::Ptr",
    "std::pair",
    "std::map",
    "std::set",
    "edm::helpers",
    "edm::refhelper",
    "TemplatedSecondary",
];

static RE_SKIP_ANYWHERE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"edm::helpers|edm::refhelper|edm::DetSet|IPTagInfo|std::pair|Point.D|PattRecoTree|TemplatedSecondary",
    )
    .unwrap()
});
static RE_VECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:std::)?vector<(.+)>$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Multiplicity {
    Collection,
    Singleton,
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Multiplicity::Collection => write!(f, "collection"),
            Multiplicity::Singleton => write!(f, "singleton"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassListEntry {
    pub package: String,
    pub class: String,
    pub multiplicity: Multiplicity,
}

/// `DataFormats/TrackReco/interface/Track.h` belongs to `DataFormats/TrackReco`.
pub fn package_of(header: &str) -> &str {
    let package = header.split("/interface").next().unwrap_or(header);
    package.rsplit("/src/").next().unwrap_or(package)
}

/// Anchored exclusion patterns: the defaults plus any extra class-name prefixes.
pub fn exclusion_pattern(extra: &[String]) -> Result<Regex> {
    let alternatives: Vec<String> = DEFAULT_EXCLUSIONS
        .iter()
        .map(|s| regex::escape(s))
        .chain(
            extra
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(regex::escape),
        )
        .collect();
    Regex::new(&format!("^(?:{})", alternatives.join("|"))).context("building exclusion list")
}

fn lookup<'a>(map: &'a ClassToHeaderMap, name: &str) -> Option<&'a str> {
    map.header(name)
        .or_else(|| map.header(name.split('<').next().unwrap_or(name).trim()))
}

/// Classes to expose downstream, one entry per package and class. A
/// `vector<T>` supersedes a plain `T`; classes without a known header are
/// dropped.
pub fn build_class_list(
    classes: &[String],
    map: &ClassToHeaderMap,
    exclude: &Regex,
) -> Vec<ClassListEntry> {
    let mut names: Vec<&str> = classes
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    names.sort();
    names.dedup();

    let mut chosen: BTreeMap<String, ClassListEntry> = BTreeMap::new();
    for name in names {
        if exclude.is_match(name) || RE_SKIP_ANYWHERE.is_match(name) {
            debug!("classlist: excluding {}", name);
            continue;
        }

        let element = RE_VECTOR
            .captures(name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim());
        let (class, multiplicity) = match element {
            Some(element) => (element, Multiplicity::Collection),
            None if name.contains("SortedCollection") => (name, Multiplicity::Collection),
            None => (name, Multiplicity::Singleton),
        };

        let Some(header) = lookup(map, class) else {
            debug!("classlist: no header for {}", name);
            continue;
        };
        if class.ends_with('*') {
            continue;
        }

        let entry = ClassListEntry {
            package: package_of(header).to_string(),
            class: class.to_string(),
            multiplicity,
        };
        match multiplicity {
            Multiplicity::Collection => {
                chosen.insert(class.to_string(), entry);
            }
            Multiplicity::Singleton => {
                chosen.entry(class.to_string()).or_insert(entry);
            }
        }
    }

    let mut entries: Vec<ClassListEntry> = chosen.into_values().collect();
    entries.sort();
    entries
}

pub fn render_class_list(entries: &[ClassListEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}\t{}\t{}\n", e.package, e.class, e.multiplicity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map() -> ClassToHeaderMap {
        let mut map = ClassToHeaderMap::new();
        map.insert("reco::Track", "DataFormats/TrackReco/interface/Track.h");
        map.insert("reco::Vertex", "DataFormats/VertexReco/interface/Vertex.h");
        map.insert("pat::Jet", "DataFormats/PatCandidates/interface/Jet.h");
        map.insert("edm::SortedCollection", "DataFormats/Common/interface/SortedCollection.h");
        map
    }

    fn classes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_package_of() {
        assert_eq!(package_of("DataFormats/TrackReco/interface/Track.h"), "DataFormats/TrackReco");
        assert_eq!(package_of("/cmssw/src/DataFormats/JetReco/interface/Jet.h"), "DataFormats/JetReco");
        assert_eq!(package_of("Flat.h"), "Flat.h");
    }

    #[test]
    fn test_vector_supersedes_singleton() -> Result<()> {
        let exclude = exclusion_pattern(&[])?;
        let entries = build_class_list(
            &classes(&["reco::Track", "std::vector<reco::Track>", "reco::Vertex"]),
            &map(),
            &exclude,
        );
        assert_eq!(
            render_class_list(&entries),
            "DataFormats/TrackReco\treco::Track\tcollection\n\
             DataFormats/VertexReco\treco::Vertex\tsingleton\n"
        );
        Ok(())
    }

    #[test]
    fn test_exclusions_and_unknown_headers() -> Result<()> {
        let exclude = exclusion_pattern(&["pat::".to_string()])?;
        let entries = build_class_list(
            &classes(&[
                "pat::Jet",
                "std::pair<int,int>",
                "edm::Ref<std::vector<reco::Track>,reco::Track>",
                "reco::Unknown",
                "edm::SortedCollection<EcalRecHit>",
            ]),
            &map(),
            &exclude,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].class, "edm::SortedCollection<EcalRecHit>");
        assert_eq!(entries[0].multiplicity, Multiplicity::Collection);
        assert_eq!(entries[0].package, "DataFormats/Common");
        Ok(())
    }
}
