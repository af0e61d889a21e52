//! Serialized store contents
//!
//! The body of the data file is one [`StoreImage`], encoded as MessagePack.
//! Only statements visible at the dumped snapshot are written, so the image
//! carries no version ranges: restore stamps every statement `since = 1`.

use quadmem_core::{Quad, Term};
use serde::{Deserialize, Serialize};

use crate::error::ImageError;

/// One statement in an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStatement {
    /// Subject term
    pub subject: Term,
    /// Predicate term
    pub predicate: Term,
    /// Object term
    pub object: Term,
    /// Context, `None` for the default graph
    pub context: Option<Term>,
    /// Asserted (true) or inferred (false)
    pub explicit: bool,
}

impl ImageStatement {
    /// Build from a quad and its flag
    pub fn new(quad: Quad, explicit: bool) -> Self {
        Self {
            subject: quad.subject,
            predicate: quad.predicate,
            object: quad.object,
            context: quad.context,
            explicit,
        }
    }

    /// Split back into a quad and its flag
    pub fn into_parts(self) -> (Quad, bool) {
        (
            Quad::new(self.subject, self.predicate, self.object, self.context),
            self.explicit,
        )
    }
}

/// Everything a store persists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreImage {
    /// Prefix bindings, ordered by prefix
    pub namespaces: Vec<(String, String)>,
    /// Visible statements
    pub statements: Vec<ImageStatement>,
}

impl StoreImage {
    /// Empty image
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode to MessagePack
    pub fn encode(&self) -> Result<Vec<u8>, ImageError> {
        rmp_serde::to_vec(self).map_err(|e| ImageError::Encode(e.to_string()))
    }

    /// Decode from MessagePack
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageError> {
        rmp_serde::from_slice(bytes).map_err(|e| ImageError::Decode(e.to_string()))
    }

    /// Number of statements
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Check if the image holds no statements
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
