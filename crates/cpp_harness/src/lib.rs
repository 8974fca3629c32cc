use protocol::{DataMember, HeaderFile, MethodSignature, ParseError};
use tracing::debug;

pub mod boundary;
pub mod decode;
pub mod normalize;
pub mod segment;
pub mod split;
pub mod types;

pub use boundary::{ClassTitle, ParsedClass};
pub use decode::{decode_data_member, decode_data_members, decode_method, split_arguments};
pub use normalize::{normalize, standardize_name, standardize_op_name};
pub use segment::{Segmented, Token};
pub use types::{is_fundamental_word, is_simple_type};

#[cfg(test)]
mod complex_tests;
#[cfg(test)]
mod edge_cases;

/// Brace hops the segmenter may take while looking for the end of one
/// construct before it declares the header malformed.
pub const MAX_CONSTRUCT: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub max_construct: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_construct: MAX_CONSTRUCT,
        }
    }
}

/// Text-level C++ header reader: normalizer, segmenter, class-boundary
/// walker and signature decoder behind one handle.
#[derive(Debug, Clone, Default)]
pub struct CppHarness {
    config: HarnessConfig,
}

impl CppHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn segment(&self, header: &HeaderFile) -> Result<Segmented, ParseError> {
        let text = normalize(&header.text);
        segment::segment(&text, self.config.max_construct, &header.path)
    }

    /// Every class, struct and typedef of the header, innermost first, with
    /// fully qualified names. A malformed header fails as a whole.
    pub fn parse_header(&self, header: &HeaderFile) -> Result<Vec<ParsedClass>, ParseError> {
        let segmented = self.segment(header)?;
        let classes = boundary::walk(&segmented, &header.path)?;
        debug!("{}: {} classes", header.path, classes.len());
        Ok(classes)
    }

    pub fn decode_method(&self, text: &str) -> Result<MethodSignature, ParseError> {
        decode_method(text)
    }

    pub fn decode_data_members(&self, text: &str) -> Result<Vec<DataMember>, ParseError> {
        decode_data_members(text)
    }
}
