use crate::compound::{expand_compound, qualified_candidates, ChainSource};
use crate::config::CatalogConfig;
use crate::filter::{classify_return, select_member, select_method, ReturnClass};
use crate::metrics::{MetricsCollector, ScanReport};
use crate::oracle::{OracleCache, ReflectionOracle};
use crate::walker::{FileWalker, HeaderPath};
use anyhow::{Context, Result};
use cpp_harness::{decode_method, CppHarness, ParsedClass};
use indexmap::IndexMap;
use protocol::{
    normalize_signature, AccessMember, AccessMethod, ClassCatalogEntry, ClassInfo, ClassRecord,
    ClassToHeaderMap, HeaderFile, ParseError,
};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use store::{CatalogListing, InheritanceGraph};
use tracing::{debug, info, warn};

/// Outcome of parsing one header.
pub struct ScannedHeader {
    pub header: String,
    pub outcome: Result<Vec<ParsedClass>, ParseError>,
}

/// Accessors of one class before inheritance and chaining, keyed so that
/// duplicates can be dropped.
#[derive(Debug, Default, Clone)]
struct Accessors {
    methods: Vec<(String, AccessMethod)>,
    members: Vec<AccessMember>,
}

/// Builds the class-to-header map and one catalog entry per class.
///
/// Headers are parsed independently (in parallel when configured) and the
/// results are merged in header-path order, so the first definition of a
/// class in that order is the one that counts. Method lists come from the
/// reflection oracle when it knows a class and from the header text
/// otherwise.
pub struct CatalogBuilder {
    config: CatalogConfig,
    harness: CppHarness,
    oracle: OracleCache,
    map: ClassToHeaderMap,
    update: bool,
    classes: BTreeMap<String, ParsedClass>,
    graph: InheritanceGraph,
    listings: BTreeMap<String, CatalogListing>,
    links: FxHashMap<String, Vec<AccessMethod>>,
    depth_reported: FxHashSet<String>,
    metrics: MetricsCollector,
}

impl CatalogBuilder {
    pub fn new(config: CatalogConfig, oracle: Box<dyn ReflectionOracle>) -> Self {
        Self {
            harness: CppHarness::new(config.harness()),
            config,
            oracle: OracleCache::new(oracle),
            map: ClassToHeaderMap::new(),
            update: false,
            classes: BTreeMap::new(),
            graph: InheritanceGraph::new(),
            listings: BTreeMap::new(),
            links: FxHashMap::default(),
            depth_reported: FxHashSet::default(),
            metrics: MetricsCollector::new(),
        }
    }

    /// Start from an existing map; scanned headers only add missing names.
    pub fn with_class_map(mut self, map: ClassToHeaderMap) -> Self {
        self.map = map;
        self.update = true;
        self
    }

    /// Catalogs of an earlier run, used for chaining through classes that
    /// are not parsed in this run.
    pub fn with_listings(mut self, listings: BTreeMap<String, CatalogListing>) -> Self {
        self.listings = listings;
        self
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn class_map(&self) -> &ClassToHeaderMap {
        &self.map
    }

    pub fn graph(&self) -> &InheritanceGraph {
        &self.graph
    }

    pub fn class(&self, name: &str) -> Option<&ParsedClass> {
        self.classes.get(name)
    }

    /// Parsed classes in name order.
    pub fn class_names(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    /// Walk every root for headers, read and parse them, and merge.
    pub fn scan_roots(&mut self, roots: &[PathBuf]) -> Result<()> {
        self.metrics.start_phase("discover");
        let mut files: Vec<HeaderPath> = Vec::new();
        for root in roots {
            let walker = FileWalker::new(root.clone(), &self.config.extensions, &self.config.exclude)
                .with_context(|| format!("configuring scan of {}", root.display()))?;
            files.extend(walker.walk()?);
        }
        self.metrics.end_phase("discover");

        self.metrics.start_phase("read");
        let mut headers = Vec::with_capacity(files.len());
        for file in files {
            match std::fs::read(&file.absolute) {
                Ok(bytes) => headers.push(HeaderFile::new(
                    file.relative,
                    String::from_utf8_lossy(&bytes).into_owned(),
                )),
                Err(err) => {
                    warn!("Cannot read {}: {}", file.relative, err);
                    self.metrics.record_header();
                    self.metrics.record_failure(&file.relative, err);
                }
            }
        }
        self.metrics.end_phase("read");

        self.scan_sources(headers);
        Ok(())
    }

    /// Parse headers already in memory and merge them into the map.
    pub fn scan_sources(&mut self, headers: Vec<HeaderFile>) {
        self.metrics.start_phase("parse");
        let scanned = self.parse_all(headers);
        self.metrics.end_phase("parse");

        self.metrics.start_phase("merge");
        self.merge(scanned);
        self.metrics.end_phase("merge");
    }

    fn parse_all(&self, mut headers: Vec<HeaderFile>) -> Vec<ScannedHeader> {
        headers.sort_by(|a, b| a.path.cmp(&b.path));
        let harness = &self.harness;
        let work = || {
            headers
                .par_iter()
                .map(|header| ScannedHeader {
                    header: header.path.clone(),
                    outcome: harness.parse_header(header),
                })
                .collect::<Vec<_>>()
        };

        match self.config.jobs {
            Some(jobs) => match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(work),
                Err(err) => {
                    warn!("Cannot start {} workers ({}), using the global pool", jobs, err);
                    work()
                }
            },
            None => work(),
        }
    }

    /// Fold parse results into the map in header-path order.
    pub fn merge(&mut self, mut scanned: Vec<ScannedHeader>) {
        scanned.sort_by(|a, b| a.header.cmp(&b.header));
        for header in scanned {
            self.metrics.record_header();
            let classes = match header.outcome {
                Ok(classes) => classes,
                Err(err) => {
                    warn!("Skipping {}: {}", header.header, err);
                    self.metrics.record_failure(&header.header, err);
                    continue;
                }
            };
            debug!("{}: {} classes", header.header, classes.len());
            self.metrics.record_classes_found(classes.len());

            for class in classes {
                self.register(&class.record);
                self.classes
                    .entry(class.record.name.clone())
                    .or_insert(class);
            }
        }

        let records: Vec<ClassRecord> = self.classes.values().map(|c| c.record.clone()).collect();
        self.graph = InheritanceGraph::build_from_records(&records);
        if self.graph.stats().is_cyclic {
            let mut cycles: Vec<Vec<String>> = records
                .iter()
                .flat_map(|r| self.graph.find_cycles_containing(&r.name))
                .collect();
            cycles.sort();
            cycles.dedup();
            for cycle in cycles {
                warn!("Inheritance cycle: {}", cycle.join(" -> "));
                self.metrics
                    .record_diagnostic(format!("inheritance cycle: {}", cycle.join(", ")));
            }
        }
        self.links.clear();
        info!("Class map holds {} names", self.map.len());
    }

    fn register(&mut self, record: &ClassRecord) {
        let name = record.name.as_str();
        let primary = name.split('<').next().unwrap_or(name).trim();
        let is_template = primary != name || !record.template_params.is_empty();

        if primary != name && !(self.update && self.map.contains(name)) {
            self.map.insert(name, &record.header);
        }
        if self.update && self.map.contains(primary) {
            return;
        }
        if is_template {
            self.map.insert_template(primary, &record.header);
        } else {
            self.map.insert(primary, &record.header);
        }
    }

    /// Cataloged name for `name` written inside `context`, trying the
    /// enclosing namespaces of `context` in turn.
    fn resolve_known(&mut self, name: &str, context: &str) -> Option<String> {
        let candidates = qualified_candidates(name, context);
        if let Some(found) = candidates.iter().find(|c| {
            self.map.contains(c) || self.classes.contains_key(*c) || self.listings.contains_key(*c)
        }) {
            return Some(found.clone());
        }
        candidates
            .into_iter()
            .find(|c| self.oracle.resolve(c).is_some())
    }

    fn record_for(&mut self, name: &str) -> Option<(ClassRecord, Option<ClassInfo>)> {
        let info = self.oracle.resolve(name);
        if let Some(class) = self.classes.get(name) {
            return Some((class.record.clone(), info));
        }
        let info = info?;
        let record = ClassRecord {
            name: name.to_string(),
            bases: info.bases.clone(),
            template_params: Vec::new(),
            header: self.map.header(name).unwrap_or_default().to_string(),
        };
        Some((record, Some(info)))
    }

    fn accessors_from_info(info: &ClassInfo, class: &str) -> Accessors {
        let mut accessors = Accessors::default();
        for sig in &info.methods {
            if let Some(method) = select_method(sig, class) {
                accessors.methods.push((sig.dedup_key(), method));
            }
        }
        accessors.members = info
            .data_members
            .iter()
            .filter_map(|m| select_member(m, class))
            .collect();
        accessors
    }

    fn accessors_from_text(&mut self, class: &str) -> Accessors {
        let mut accessors = Accessors::default();
        let Some(parsed) = self.classes.get(class) else {
            return accessors;
        };

        for fragment in &parsed.method_fragments {
            match decode_method(fragment) {
                Ok(sig) => {
                    if let Some(method) = select_method(&sig, class) {
                        accessors.methods.push((sig.dedup_key(), method));
                    }
                }
                Err(err) => {
                    debug!("{}: {}", class, err);
                    self.metrics.record_undecodable();
                }
            }
        }
        for fragment in &parsed.member_fragments {
            match self.harness.decode_data_members(fragment) {
                Ok(members) => accessors
                    .members
                    .extend(members.iter().filter_map(|m| select_member(m, class))),
                Err(err) => {
                    debug!("{}: {}", class, err);
                    self.metrics.record_undecodable();
                }
            }
        }
        accessors
    }

    /// The class's own accessors, from the oracle when it can resolve the
    /// class. `None` when neither the oracle nor the headers know it.
    fn own_accessors(&mut self, class: &str) -> Option<(Accessors, bool)> {
        if let Some(info) = self.oracle.resolve(class) {
            return Some((Self::accessors_from_info(&info, class), true));
        }
        if self.classes.contains_key(class) {
            return Some((self.accessors_from_text(class), false));
        }
        None
    }

    fn bases_of(&mut self, class: &str) -> Vec<String> {
        match self.oracle.resolve(class) {
            Some(info) => info.bases,
            None => self.graph.bases(class),
        }
    }

    /// Ancestors of `class`, nearest first, resolved against the map.
    /// Walking stops with `BaseDepthExceeded` once a chain of bases grows
    /// past the configured depth.
    fn base_chain(&mut self, class: &str) -> (Vec<String>, Option<ParseError>) {
        let max_depth = self.config.max_base_depth;
        let mut chain = Vec::new();
        let mut seen = FxHashSet::default();
        seen.insert(class.to_string());
        let mut queue = VecDeque::from([(class.to_string(), 0usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            for base in self.bases_of(&current) {
                let base = self.resolve_known(&base, &current).unwrap_or(base);
                if !seen.insert(base.clone()) {
                    continue;
                }
                if depth + 1 > max_depth {
                    return (
                        chain,
                        Some(ParseError::BaseDepthExceeded {
                            class: class.to_string(),
                            depth: max_depth,
                        }),
                    );
                }
                chain.push(base.clone());
                queue.push_back((base, depth + 1));
            }
        }

        (chain, None)
    }

    /// Own and inherited accessors of `class`, duplicates dropped, in the
    /// order they are listed: own first, then each base nearest first.
    fn collect_accessors(
        &mut self,
        class: &str,
    ) -> Option<(IndexMap<String, AccessMethod>, Vec<AccessMember>, Vec<String>)> {
        let (own, from_oracle) = self.own_accessors(class)?;
        let (bases, overrun) = self.base_chain(class);
        // entries and compound links both walk the chain; report once
        if let Some(err) = overrun.filter(|_| self.depth_reported.insert(class.to_string())) {
            warn!("{}", err);
            self.metrics.record_diagnostic(err);
        }

        let mut layers = vec![own];
        // oracle answers already include inherited members
        if !from_oracle {
            for base in &bases {
                if let Some((accessors, _)) = self.own_accessors(base) {
                    layers.push(accessors);
                }
            }
        }

        let mut methods: IndexMap<String, AccessMethod> = IndexMap::new();
        let mut members: Vec<AccessMember> = Vec::new();
        for layer in layers {
            for (key, method) in layer.methods {
                methods.entry(key).or_insert(method);
            }
            for member in layer.members {
                if !members.iter().any(|m| m.name == member.name) {
                    members.push(member);
                }
            }
        }
        Some((methods, members, bases))
    }

    fn is_listable(&mut self, ty: &str, context: &str) -> bool {
        match classify_return(ty) {
            ReturnClass::Simple => true,
            ReturnClass::Compound(name) => self.resolve_known(&name, context).is_some(),
            ReturnClass::Unusable => false,
        }
    }

    /// Catalog entry for one class. `None` when the class is unknown to both
    /// the oracle and the scanned headers; a known class with nothing usable
    /// gets an empty entry.
    pub fn build_entry(&mut self, name: &str) -> Option<ClassCatalogEntry> {
        let (record, _) = self.record_for(name)?;
        let Some((methods, members, bases)) = self.collect_accessors(name) else {
            return Some(ClassCatalogEntry::new(record));
        };

        let mut entry = ClassCatalogEntry::new(record);
        entry.inherited = bases;

        let mut keys: Vec<String> = Vec::new();
        for (key, method) in methods {
            if self.is_listable(&method.return_type, &method.owner) {
                keys.push(key);
                entry.methods.push(method);
            }
        }
        for member in members {
            if self.is_listable(&member.ty, &member.owner) {
                entry.data_members.push(member);
            }
        }

        let mut compound = 0;
        if self.config.expand_compound {
            let roots = entry.methods.clone();
            let max_depth = self.config.max_compound_depth;
            for method in expand_compound(self, name, &roots, max_depth) {
                let key = normalize_signature(&format!("{} {}", method.return_type, method.signature));
                if !keys.contains(&key) {
                    keys.push(key);
                    entry.methods.push(method);
                    compound += 1;
                }
            }
        }

        self.metrics
            .record_entry(entry.methods.len(), compound, entry.data_members.len());
        debug!(
            "{}: {} methods ({} compound), {} data members",
            name,
            entry.methods.len(),
            compound,
            entry.data_members.len()
        );
        Some(entry)
    }

    /// Entries for every parsed class in name order. Template primaries are
    /// mapped but not cataloged.
    pub fn build_all(&mut self) -> Vec<ClassCatalogEntry> {
        self.metrics.start_phase("catalog");
        let names: Vec<String> = self
            .classes
            .values()
            .filter(|c| c.record.template_params.is_empty())
            .map(|c| c.record.name.clone())
            .collect();
        let entries: Vec<ClassCatalogEntry> =
            names.iter().filter_map(|name| self.build_entry(name)).collect();
        self.metrics.end_phase("catalog");
        info!("Cataloged {} classes", entries.len());
        entries
    }

    pub fn report(&mut self) -> ScanReport {
        self.metrics.record_oracle_lookups(self.oracle.lookups());
        self.metrics.report()
    }

    fn listing_links(&self, class: &str) -> Vec<AccessMethod> {
        let Some(listing) = self.listings.get(class) else {
            return Vec::new();
        };
        let mut links = Vec::new();
        for entry in &listing.entries {
            if entry.is_method() {
                let text = format!("{} {}", entry.return_type, entry.signature);
                if let Some(method) = decode_method(&text).ok().and_then(|sig| select_method(&sig, class)) {
                    links.push(method);
                }
            } else {
                links.push(AccessMethod {
                    owner: class.to_string(),
                    return_type: entry.return_type.clone(),
                    name: entry.name.clone(),
                    signature: entry.name.clone(),
                    call: entry.name.clone(),
                    required_args: 0,
                    defaulted_args: 0,
                });
            }
        }
        links
    }
}

impl ChainSource for CatalogBuilder {
    fn resolve_class(&mut self, name: &str, context: &str) -> Option<String> {
        self.resolve_known(name, context)
    }

    fn links(&mut self, class: &str) -> Vec<AccessMethod> {
        if let Some(links) = self.links.get(class) {
            return links.clone();
        }

        let links = match self.collect_accessors(class) {
            Some((methods, members, _)) => methods
                .into_values()
                .chain(members.into_iter().map(|m| AccessMethod {
                    owner: m.owner,
                    return_type: m.ty,
                    name: m.name.clone(),
                    signature: m.name.clone(),
                    call: m.name,
                    required_args: 0,
                    defaulted_args: 0,
                }))
                .collect(),
            None => self.listing_links(class),
        };
        self.links.insert(class.to_string(), links.clone());
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{JsonOracle, NullOracle};
    use pretty_assertions::assert_eq;

    fn builder(headers: &[(&str, &str)]) -> CatalogBuilder {
        let mut builder = CatalogBuilder::new(CatalogConfig::default(), Box::new(NullOracle));
        builder.scan_sources(
            headers
                .iter()
                .map(|(path, text)| HeaderFile::new(*path, *text))
                .collect(),
        );
        builder
    }

    fn signatures(entry: &ClassCatalogEntry) -> Vec<&str> {
        entry.methods.iter().map(|m| m.signature.as_str()).collect()
    }

    #[test]
    fn test_first_definition_wins_in_path_order() {
        let builder = builder(&[
            ("b/Dup.h", "class Dup { public: int second(); };"),
            ("a/Dup.h", "class Dup { public: int first(); };"),
        ]);
        assert_eq!(builder.class_map().header("Dup"), Some("a/Dup.h"));
        assert_eq!(builder.class("Dup").unwrap().method_fragments, vec!["int first()"]);
    }

    #[test]
    fn test_template_names_accumulate_headers() {
        let builder = builder(&[
            ("x/Box.h", "template<class T> class Box { };"),
            ("y/Box.h", "template<> class Box<int> { };"),
        ]);
        let paths = builder.class_map().get("Box").unwrap().paths();
        assert_eq!(paths, vec!["x/Box.h", "y/Box.h"]);
        assert_eq!(builder.class_map().header("Box<int>"), Some("y/Box.h"));
    }

    #[test]
    fn test_update_mode_keeps_existing_names() {
        let mut existing = ClassToHeaderMap::new();
        existing.insert("A", "old/A.h");
        let mut builder = CatalogBuilder::new(CatalogConfig::default(), Box::new(NullOracle))
            .with_class_map(existing);
        builder.scan_sources(vec![
            HeaderFile::new("new/A.h", "class A { };"),
            HeaderFile::new("new/B.h", "class B { };"),
        ]);
        assert_eq!(builder.class_map().header("A"), Some("old/A.h"));
        assert_eq!(builder.class_map().header("B"), Some("new/B.h"));
    }

    #[test]
    fn test_bad_header_does_not_stop_the_run() {
        let mut builder = builder(&[
            ("bad.h", "class Broken { void f() {"),
            ("good.h", "class Good { public: int id(); };"),
        ]);
        assert!(builder.class_map().contains("Good"));
        assert!(!builder.class_map().contains("Broken"));
        let report = builder.report();
        assert_eq!(report.headers_scanned, 2);
        assert_eq!(report.headers_failed, 1);
        assert_eq!(report.failures[0].header, "bad.h");
    }

    #[test]
    fn test_namespace_qualified_bases_and_returns() {
        let mut builder = builder(&[
            (
                "reco/Track.h",
                "namespace reco { class Track : public TrackBase { public: double pt() const; const Vertex& vertex() const; }; }",
            ),
            ("reco/TrackBase.h", "namespace reco { class TrackBase { public: int charge() const; }; }"),
            ("reco/Vertex.h", "namespace reco { class Vertex { public: double z() const; }; }"),
        ]);
        let entry = builder.build_entry("reco::Track").unwrap();
        assert_eq!(entry.inherited, vec!["reco::TrackBase"]);
        assert_eq!(
            signatures(&entry),
            vec!["pt()", "vertex()", "charge()", "vertex().z()"]
        );
        assert_eq!(entry.owners(), vec!["reco::Track", "reco::TrackBase"]);
    }

    #[test]
    fn test_oracle_takes_precedence() -> Result<()> {
        let oracle = JsonOracle::from_json(
            r#"{ "Hard": { "methods": [ { "return_type": "float", "name": "eta", "args": [] } ] } }"#,
        )?;
        let mut builder = CatalogBuilder::new(CatalogConfig::default(), Box::new(oracle));
        builder.scan_sources(vec![HeaderFile::new(
            "Hard.h",
            "class Hard { public: int fromText(); };",
        )]);
        let entry = builder.build_entry("Hard").unwrap();
        assert_eq!(signatures(&entry), vec!["eta()"]);
        assert_eq!(entry.record.header, "Hard.h");

        // known to the oracle only
        let oracle = JsonOracle::from_json(r#"{ "Ghost": { "bases": ["Hard"] } }"#)?;
        let mut builder = CatalogBuilder::new(CatalogConfig::default(), Box::new(oracle));
        let ghost = builder.build_entry("Ghost").unwrap();
        assert!(ghost.is_empty());
        assert_eq!(ghost.record.header, "");
        assert!(builder.build_entry("Nobody").is_none());
        Ok(())
    }

    #[test]
    fn test_base_depth_bound() {
        let mut headers = Vec::new();
        for i in 0..25 {
            headers.push((
                format!("C{i:02}.h"),
                format!("class C{i:02} : public C{:02} {{ public: int m{i}(); }};", i + 1),
            ));
        }
        let refs: Vec<(&str, &str)> = headers.iter().map(|(p, t)| (p.as_str(), t.as_str())).collect();
        let mut builder = builder(&refs);
        assert_eq!(builder.config().max_base_depth, 20);
        let entry = builder.build_entry("C00").unwrap();
        assert_eq!(entry.inherited.len(), 20);
        let again = builder.build_entry("C00").unwrap();
        assert_eq!(again.inherited, entry.inherited);
        let report = builder.report();
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].contains("C00"));
    }

    #[test]
    fn test_unusable_class_gets_empty_entry() {
        let mut builder = builder(&[("Setter.h", "class Setter { public: void set(int v); private: int v_; };")]);
        let entry = builder.build_entry("Setter").unwrap();
        assert!(entry.is_empty());
        assert_eq!(entry.record.header, "Setter.h");
    }
}
