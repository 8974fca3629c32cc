use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("{header}: cannot find the end of the construct at offset {offset}: {reason}")]
    MalformedConstruct {
        header: String,
        offset: usize,
        reason: String,
    },

    #[error("{header}: placeholder {placeholder} has no matching partner")]
    UnbalancedPlaceholders { header: String, placeholder: String },

    #[error("cannot decode signature `{text}`")]
    UndecodableSignature { text: String },

    #[error("base class chain of {class} is deeper than {depth}")]
    BaseDepthExceeded { class: String, depth: usize },
}

impl ParseError {
    pub fn undecodable(text: &str) -> Self {
        ParseError::UndecodableSignature {
            text: text.to_string(),
        }
    }

    /// Header the failure belongs to, when one is known.
    pub fn header(&self) -> Option<&str> {
        match self {
            ParseError::MalformedConstruct { header, .. }
            | ParseError::UnbalancedPlaceholders { header, .. } => Some(header),
            _ => None,
        }
    }
}
