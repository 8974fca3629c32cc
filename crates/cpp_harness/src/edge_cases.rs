#[cfg(test)]
mod edge_case_tests {
    use crate::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    fn names(source: &str) -> Result<Vec<String>> {
        let harness = CppHarness::default();
        let classes = harness.parse_header(&HeaderFile::new("test.h", source))?;
        Ok(classes.into_iter().map(|c| c.record.name).collect())
    }

    #[test]
    fn test_empty_header() -> Result<()> {
        assert!(names("")?.is_empty());
        assert!(names("// nothing here\n#pragma once\n")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_anonymous_namespace_not_in_path() -> Result<()> {
        let source = "namespace outer { namespace { class Hidden { }; } }";
        assert_eq!(names(source)?, vec!["outer::Hidden"]);
        Ok(())
    }

    #[test]
    fn test_global_scope_qualified_base() -> Result<()> {
        let harness = CppHarness::default();
        let source = "class D : public ::ns::Base { public: int x(); };";
        let classes = harness.parse_header(&HeaderFile::new("d.h", source))?;
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].record.name, "D");
        assert_eq!(classes[0].record.bases, vec!["::ns::Base"]);
        assert_eq!(classes[0].method_fragments, vec!["int x()"]);
        Ok(())
    }

    #[test]
    fn test_extern_c_block() -> Result<()> {
        let source = r#"extern "C" { struct CStruct { int a; }; }"#;
        let harness = CppHarness::default();
        let classes = harness.parse_header(&HeaderFile::new("c.h", source))?;
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].record.name, "CStruct");
        assert_eq!(classes[0].member_fragments, vec!["int a"]);
        Ok(())
    }

    #[test]
    fn test_forward_declarations_and_enums_skipped() -> Result<()> {
        let source = r#"
class Forward;
struct AlsoForward;
enum class Color { red, green };
enum Flavor { up, down };
"#;
        assert!(names(source)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_export_macro_and_final() -> Result<()> {
        let source = "class DLL_EXPORT Widget final : public QObject { };";
        assert_eq!(names(source)?, vec!["Widget"]);
        Ok(())
    }

    #[test]
    fn test_template_specialization_keeps_arguments() -> Result<()> {
        let source = r#"
template<typename T> class Container { };
template<> class Container<int> { public: void optimize(); };
"#;
        assert_eq!(names(source)?, vec!["Container", "Container<int>"]);
        Ok(())
    }

    #[test]
    fn test_braces_in_literals_and_comments() -> Result<()> {
        let source = r#"
class Printer {
public:
    // a stray } in a comment
    const char* open() const { return "{"; }
    char close() const { return '}'; }
    /* { */ int width();
};
"#;
        let harness = CppHarness::default();
        let classes = harness.parse_header(&HeaderFile::new("p.h", source))?;
        assert_eq!(classes.len(), 1);
        assert_eq!(
            classes[0].method_fragments,
            vec!["const char* open() const", "char close() const", "int width()"]
        );
        Ok(())
    }

    #[test]
    fn test_struct_members_default_public() -> Result<()> {
        let source = "struct Point { double x, y; private: double cache_; };";
        let harness = CppHarness::default();
        let classes = harness.parse_header(&HeaderFile::new("pt.h", source))?;
        assert_eq!(classes[0].member_fragments, vec!["double x, y"]);
        let members = decode_data_members(&classes[0].member_fragments[0])?;
        let pairs: Vec<(&str, &str)> = members
            .iter()
            .map(|m| (m.ty.as_str(), m.name.as_str()))
            .collect();
        assert_eq!(pairs, vec![("double", "x"), ("double", "y")]);
        Ok(())
    }

    #[test]
    fn test_nested_template_arguments_in_methods() -> Result<()> {
        let sig = decode_method("std::vector<std::function<void(int)> > callbacks(int n) const")?;
        assert_eq!(sig.name, "callbacks");
        assert_eq!(sig.return_type, "std::vector<std::function<void (int)> >");
        assert_eq!(sig.arg_names(), vec!["n"]);
        Ok(())
    }

    #[test]
    fn test_multiple_pointer_stars() -> Result<()> {
        let sig = decode_method("void fill(char **argv, const int* const p)")?;
        assert_eq!(sig.arg_types(), vec!["char**", "const int* const"]);
        assert_eq!(sig.arg_names(), vec!["argv", "p"]);
        Ok(())
    }

    #[test]
    fn test_default_value_with_call() -> Result<()> {
        let sig = decode_method("double mass(const std::string& name = std::string(), int n = -1) const")?;
        assert_eq!(
            sig.arg_declarations(),
            vec!["const std::string& name=std::string()", "int n=-1"]
        );
        assert_eq!(sig.required_args(), 0);
        Ok(())
    }
}
