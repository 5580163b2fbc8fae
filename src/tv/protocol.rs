use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AmbiError;

/// Body of `GET /{api_version}/ambilight/processed`.
///
/// Only the first layer is used. Each edge maps a zone name to its color and
/// keeps the order the TV sent, which is bottom to top for the vertical edges
/// and left to right for the top edge.
#[derive(Debug, Deserialize)]
pub struct Processed {
    pub layer1: Layer,
}

#[derive(Debug, Deserialize)]
pub struct Layer {
    pub left: Edge,
    pub top: Edge,
    pub right: Edge,
}

pub type Edge = IndexMap<String, Rgb>;

/// Raw channel values as sent by the TV, not range checked.
#[derive(Debug, Deserialize, Copy, Clone, PartialEq, Eq)]
pub struct Rgb {
    pub r: i64,
    pub g: i64,
    pub b: i64,
}

impl Processed {
    pub fn from_document(document: Map<String, Value>) -> Result<Processed, AmbiError> {
        serde_json::from_value(Value::Object(document))
            .map_err(|e| AmbiError::MalformedPayload(e.to_string()))
    }
}
