//! Which decoded methods and members make useful accessors.

use cpp_harness::{is_fundamental_word, is_simple_type};
use protocol::{normalize_signature, AccessMember, AccessMethod, DataMember, MethodKind, MethodSignature};
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

static RE_SKIP_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:operator|__get|const_iterator|iterator|clone)").unwrap());
static RE_SKIP_SIGNATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TClass|TBuffer|TMember|operator|^__").unwrap());
static RE_RETURN_DECORATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bconst |\*$|&$|Ref$").unwrap());

/// How a return type can be exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnClass {
    Simple,
    /// A class type whose own accessors can be chained onto the call.
    Compound(String),
    Unusable,
}

pub fn is_skipped_name(name: &str) -> bool {
    RE_SKIP_NAME.is_match(name)
}

/// `T*` and `...Ref` results are chained with `->`, everything else with `.`.
pub fn compound_delimiter(return_type: &str) -> &'static str {
    let ty = return_type.trim_end();
    if ty.ends_with('*') || ty.ends_with("Ref") {
        "->"
    } else {
        "."
    }
}

/// Class name behind a return type: `const reco::Vertex&` gives `reco::Vertex`.
pub fn return_class_name(return_type: &str) -> String {
    RE_RETURN_DECORATION
        .replace_all(return_type.trim(), "")
        .trim()
        .to_string()
}

pub fn classify_return(return_type: &str) -> ReturnClass {
    let ty = return_type.trim();
    if ty.is_empty() || ty == "void" || ty.starts_with("void*") {
        return ReturnClass::Unusable;
    }
    if is_simple_type(ty) {
        return ReturnClass::Simple;
    }
    let class = return_class_name(ty);
    if class.is_empty()
        || class.ends_with('*')
        || class.ends_with('&')
        || class.contains('(')
        || is_fundamental_word(&class)
    {
        return ReturnClass::Unusable;
    }
    ReturnClass::Compound(class)
}

/// A public getter of `class` worth listing: not a constructor, destructor
/// or operator, not on the skip list, and callable with builtin arguments.
/// Unnamed arguments are called `x0, x1, ...`.
pub fn select_method(sig: &MethodSignature, class: &str) -> Option<AccessMethod> {
    if sig.kind(class) != MethodKind::Method {
        return None;
    }
    if is_skipped_name(&sig.name) {
        trace!("skip {}::{}: excluded name", class, sig.name);
        return None;
    }
    let return_type = normalize_signature(&sig.return_type);
    if matches!(classify_return(&return_type), ReturnClass::Unusable) {
        trace!("skip {}::{}: returns {}", class, sig.name, return_type);
        return None;
    }
    if let Some(arg) = sig.args.iter().find(|a| !is_simple_type(&a.ty)) {
        trace!("skip {}::{}: argument type {}", class, sig.name, arg.ty);
        return None;
    }

    let mut declarations = Vec::with_capacity(sig.args.len());
    let mut names = Vec::with_capacity(sig.args.len());
    for (index, arg) in sig.args.iter().enumerate() {
        let name = if arg.name.is_empty() {
            format!("x{index}")
        } else {
            arg.name.clone()
        };
        let mut declaration = format!("{} {}", arg.ty, name);
        if let Some(default) = &arg.default {
            declaration.push('=');
            declaration.push_str(default);
        }
        declarations.push(declaration);
        names.push(name);
    }

    let signature = normalize_signature(&format!("{}({})", sig.name, declarations.join(", ")));
    if RE_SKIP_SIGNATURE.is_match(&format!("{return_type}  {signature}")) {
        trace!("skip {}::{}: excluded signature", class, sig.name);
        return None;
    }

    Some(AccessMethod {
        owner: class.to_string(),
        return_type,
        name: sig.name.clone(),
        signature,
        call: format!("{}({})", sig.name, names.join(", ")),
        required_args: sig.required_args(),
        defaulted_args: sig.defaulted_args(),
    })
}

pub fn select_member(member: &DataMember, class: &str) -> Option<AccessMember> {
    if member.name.is_empty() || is_skipped_name(&member.name) {
        return None;
    }
    let ty = normalize_signature(&member.ty);
    if matches!(classify_return(&ty), ReturnClass::Unusable) {
        return None;
    }
    Some(AccessMember {
        owner: class.to_string(),
        ty,
        name: member.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use cpp_harness::decode_method;
    use pretty_assertions::assert_eq;

    fn select(text: &str) -> Result<Option<AccessMethod>> {
        Ok(select_method(&decode_method(text)?, "reco::Track"))
    }

    #[test]
    fn test_return_classes() {
        assert_eq!(classify_return("double"), ReturnClass::Simple);
        assert_eq!(classify_return("const std::string&"), ReturnClass::Simple);
        assert_eq!(classify_return("void"), ReturnClass::Unusable);
        assert_eq!(classify_return("void*"), ReturnClass::Unusable);
        assert_eq!(classify_return("int*"), ReturnClass::Unusable);
        assert_eq!(
            classify_return("const reco::Vertex&"),
            ReturnClass::Compound("reco::Vertex".to_string())
        );
        assert_eq!(
            classify_return("reco::TrackRef"),
            ReturnClass::Compound("reco::Track".to_string())
        );
        assert_eq!(compound_delimiter("const Hit*"), "->");
        assert_eq!(compound_delimiter("reco::TrackRef"), "->");
        assert_eq!(compound_delimiter("const reco::Vertex&"), ".");
    }

    #[test]
    fn test_defaulted_fundamental_arguments_are_kept() -> Result<()> {
        let method = select("double residual(int layer, unsigned int, float scale = 1.0) const")?
            .expect("all arguments are builtin");
        assert_eq!(method.signature, "residual(int layer, unsigned int x1, float scale=1.0)");
        assert_eq!(method.call, "residual(layer, x1, scale)");
        assert_eq!(method.required_args, 2);
        assert_eq!(method.defaulted_args, 1);
        assert_eq!(method.owner, "reco::Track");
        Ok(())
    }

    #[test]
    fn test_class_arguments_are_dropped() -> Result<()> {
        assert!(select("double distance(const reco::Vertex& v) const")?.is_none());
        assert!(select("double distance(const reco::Vertex& v = reco::Vertex()) const")?.is_none());
        Ok(())
    }

    #[test]
    fn test_excluded_names_and_kinds() -> Result<()> {
        assert!(select("Track()")?.is_none());
        assert!(select("virtual ~Track()")?.is_none());
        assert!(select("bool operator==(const Track& other) const")?.is_none());
        assert!(select("Track* clone() const")?.is_none());
        assert!(select("int iteratorCount() const")?.is_none());
        assert!(select("void setPt(double pt)")?.is_none());
        assert!(select("TClass* Class()")?.is_none());
        assert!(select("int __getId() const")?.is_none());
        Ok(())
    }

    #[test]
    fn test_basic_string_is_spelled_std_string() -> Result<()> {
        let method = select("std::basic_string<char> label() const")?.expect("string getter");
        assert_eq!(method.return_type, "std::string");
        assert_eq!(method.listing_line(), format!("{:>32}  label()", "std::string"));
        Ok(())
    }

    #[test]
    fn test_members() {
        let member = DataMember {
            ty: "double".to_string(),
            name: "chi2_".to_string(),
        };
        assert_eq!(select_member(&member, "reco::Track").map(|m| m.name), Some("chi2_".to_string()));
        let pointer = DataMember {
            ty: "void*".to_string(),
            name: "opaque".to_string(),
        };
        assert!(select_member(&pointer, "reco::Track").is_none());
    }
}
