//! Chained accessors such as `vertex().z()` discovered through methods
//! that return other cataloged classes.

use crate::filter::{classify_return, compound_delimiter, ReturnClass};
use protocol::AccessMethod;
use std::collections::VecDeque;
use tracing::trace;

/// Where the expander looks up classes and their accessors.
pub trait ChainSource {
    /// Cataloged class that `name` refers to when written inside `context`.
    fn resolve_class(&mut self, name: &str, context: &str) -> Option<String>;

    /// Accessors of `class` that a chain may continue through, including
    /// inherited ones.
    fn links(&mut self, class: &str) -> Vec<AccessMethod>;
}

/// Spellings to try for `name` used inside class `context`: the literal
/// name, then the name qualified by each enclosing scope, innermost first.
pub fn qualified_candidates(name: &str, context: &str) -> Vec<String> {
    let name = name.trim().trim_start_matches("::");
    let mut candidates = vec![name.to_string()];
    let parts: Vec<&str> = context.split("::").collect();
    for n in (1..parts.len()).rev() {
        candidates.push(format!("{}::{}", parts[..n].join("::"), name));
    }
    candidates
}

struct Chain {
    owner: String,
    return_type: String,
    signature: String,
    call: String,
    required_args: usize,
    defaulted_args: usize,
    depth: usize,
    /// Classes already walked through, the cataloged class first.
    path: Vec<String>,
}

/// Expand every root accessor that returns a class into chained accessors
/// ending in a simple type, at most `max_depth` links long. A class already
/// on the chain is not entered again.
pub fn expand_compound(
    source: &mut impl ChainSource,
    class: &str,
    roots: &[AccessMethod],
    max_depth: usize,
) -> Vec<AccessMethod> {
    let mut expanded = Vec::new();
    let mut queue: VecDeque<Chain> = roots
        .iter()
        .filter(|root| matches!(classify_return(&root.return_type), ReturnClass::Compound(_)))
        .map(|root| Chain {
            owner: root.owner.clone(),
            return_type: root.return_type.clone(),
            signature: root.signature.clone(),
            call: root.call.clone(),
            required_args: root.required_args,
            defaulted_args: root.defaulted_args,
            depth: 1,
            path: vec![class.to_string()],
        })
        .collect();

    while let Some(chain) = queue.pop_front() {
        let ReturnClass::Compound(name) = classify_return(&chain.return_type) else {
            continue;
        };
        let context = chain.path.last().map(String::as_str).unwrap_or(class);
        let Some(target) = source.resolve_class(&name, context) else {
            trace!("{}: no catalog for {}", chain.signature, name);
            continue;
        };
        if chain.path.contains(&target) {
            trace!("{}: {} already on the chain", chain.signature, target);
            continue;
        }

        let delimiter = compound_delimiter(&chain.return_type);
        for link in source.links(&target) {
            let signature = format!("{}{}{}", chain.signature, delimiter, link.signature);
            let call = format!("{}{}{}", chain.call, delimiter, link.call);
            let required_args = chain.required_args + link.required_args;
            let defaulted_args = chain.defaulted_args + link.defaulted_args;

            match classify_return(&link.return_type) {
                ReturnClass::Simple => expanded.push(AccessMethod {
                    owner: chain.owner.clone(),
                    return_type: link.return_type,
                    name: signature.clone(),
                    signature,
                    call,
                    required_args,
                    defaulted_args,
                }),
                ReturnClass::Compound(_) if chain.depth < max_depth => {
                    let mut path = chain.path.clone();
                    path.push(target.clone());
                    queue.push_back(Chain {
                        owner: chain.owner.clone(),
                        return_type: link.return_type,
                        signature,
                        call,
                        required_args,
                        defaulted_args,
                        depth: chain.depth + 1,
                        path,
                    });
                }
                _ => {}
            }
        }
    }

    expanded
}
