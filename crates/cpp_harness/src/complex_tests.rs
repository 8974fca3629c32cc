#[cfg(test)]
mod complex_tests {
    use crate::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use protocol::MethodKind;

    fn parse(path: &str, source: &str) -> Result<Vec<ParsedClass>> {
        let harness = CppHarness::default();
        Ok(harness.parse_header(&HeaderFile::new(path, source))?)
    }

    fn find<'a>(classes: &'a [ParsedClass], name: &str) -> &'a ParsedClass {
        classes
            .iter()
            .find(|c| c.record.name == name)
            .unwrap_or_else(|| panic!("{name} not found"))
    }

    #[test]
    fn test_namespace_class_round_trip() -> Result<()> {
        let source = "namespace foo { class Bar : public Base { public: int x(); double y(int q=3) const; }; }";
        let classes = parse("foo/Bar.h", source)?;

        assert_eq!(classes.len(), 1);
        let bar = &classes[0];
        assert_eq!(bar.record.name, "foo::Bar");
        assert_eq!(bar.record.bases, vec!["Base"]);
        assert_eq!(bar.record.header, "foo/Bar.h");
        assert_eq!(bar.method_fragments, vec!["int x()", "double y(int q=3) const"]);

        let x = decode_method(&bar.method_fragments[0])?;
        assert_eq!(
            (x.return_type.as_str(), x.name.as_str(), x.args.len(), x.qualifier.as_str()),
            ("int", "x", 0, "")
        );

        let y = decode_method(&bar.method_fragments[1])?;
        assert_eq!(y.return_type, "double");
        assert_eq!(y.name, "y");
        assert_eq!(y.arg_declarations(), vec!["int q=3"]);
        assert_eq!(y.arg_names(), vec!["q"]);
        assert_eq!(y.qualifier, "const");

        Ok(())
    }

    #[test]
    fn test_deeply_nested_scopes() -> Result<()> {
        let source = r#"
namespace level1 {
    namespace level2 {
        class Outer {
        public:
            struct Inner {
                float z;
            };
            Inner inner() const;
        };
    }
}

namespace level1::level2 {
    class Another { };
}
"#;
        let classes = parse("test.h", source)?;
        let names: Vec<&str> = classes.iter().map(|c| c.record.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "level1::level2::Outer::Inner",
                "level1::level2::Outer",
                "level1::level2::Another",
            ]
        );

        let inner = find(&classes, "level1::level2::Outer::Inner");
        assert!(inner.is_struct);
        assert_eq!(inner.member_fragments, vec!["float z"]);

        let outer = find(&classes, "level1::level2::Outer");
        assert_eq!(outer.method_fragments, vec!["Inner inner() const"]);
        assert!(outer.member_fragments.is_empty());

        Ok(())
    }

    #[test]
    fn test_template_class() -> Result<()> {
        let source = r#"
template <class T, typename U = int>
class Box : public BoxBase<T> {
public:
    T get() const { return value_; }
    U size() const;
private:
    T value_;
};
"#;
        let classes = parse("Box.h", source)?;
        let boxed = find(&classes, "Box");
        assert_eq!(boxed.record.template_params, vec!["T", "U"]);
        assert_eq!(boxed.record.bases, vec!["BoxBase<T>"]);
        assert_eq!(boxed.method_fragments, vec!["T get() const", "U size() const"]);
        assert!(boxed.member_fragments.is_empty());

        Ok(())
    }

    #[test]
    fn test_typedefs_become_classes() -> Result<()> {
        let source = r#"
namespace reco {
    class Track { };
    typedef std::vector<Track> TrackCollection;
    typedef TrackCollection::const_iterator track_iterator;
}
"#;
        let classes = parse("Track.h", source)?;
        let names: Vec<&str> = classes.iter().map(|c| c.record.name.as_str()).collect();
        assert_eq!(names, vec!["reco::Track", "reco::TrackCollection"]);
        Ok(())
    }

    #[test]
    fn test_realistic_header() -> Result<()> {
        let source = r#"
#ifndef DataFormats_Track_h
#define DataFormats_Track_h
/** \class reco::Track
 *  A reconstructed track { with a brace in the comment
 */
#include <vector>
#include "DataFormats/Vertex.h"

namespace reco {
  class Track : public TrackBase {
  public:
    enum Quality { loose = 0, tight = 1 };
    Track() : chi2_(0) { }
    Track(double chi2, const Point & vertex);
    virtual ~Track();
    /// chi-squared
    double chi2() const { return chi2_; }
    unsigned short found() const;
    const Vertex& vertex() const;
    bool operator==(const Track& other) const;
    static const int kMaxHits = 30;
  private:
    double chi2_;
  };
}
#endif
"#;
        let classes = parse("DataFormats/Track/interface/Track.h", source)?;
        assert_eq!(classes.len(), 1);
        let track = &classes[0];
        assert_eq!(track.record.name, "reco::Track");
        assert_eq!(track.record.bases, vec!["TrackBase"]);
        assert_eq!(
            track.method_fragments,
            vec![
                "Track()",
                "Track(double chi2, const Point& vertex)",
                "virtual ~Track()",
                "double chi2() const",
                "unsigned short found() const",
                "const Vertex& vertex() const",
                "bool operator==(const Track& other) const",
            ]
        );
        assert_eq!(track.member_fragments, vec!["static const int kMaxHits=30"]);

        let kinds: Vec<MethodKind> = track
            .method_fragments
            .iter()
            .map(|f| decode_method(f).map(|s| s.kind(&track.record.name)))
            .collect::<Result<_, _>>()?;
        assert_eq!(
            kinds,
            vec![
                MethodKind::Constructor,
                MethodKind::Constructor,
                MethodKind::Destructor,
                MethodKind::Method,
                MethodKind::Method,
                MethodKind::Method,
                MethodKind::Operator,
            ]
        );

        let members = decode_data_members(&track.member_fragments[0])?;
        assert_eq!(members[0].ty, "const int");
        assert_eq!(members[0].name, "kMaxHits");

        Ok(())
    }

    #[test]
    fn test_multiple_top_level_classes_keep_source_order() -> Result<()> {
        let source = r#"
class A { public: int id(); };
class B : public A { public: double weight(); };
struct C : B, private virtual D { int n; };
"#;
        let classes = parse("abc.h", source)?;
        let names: Vec<&str> = classes.iter().map(|c| c.record.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(find(&classes, "C").record.bases, vec!["B", "D"]);
        assert_eq!(find(&classes, "C").member_fragments, vec!["int n"]);
        Ok(())
    }
}
