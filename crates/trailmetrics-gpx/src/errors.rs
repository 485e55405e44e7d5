use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpxError {
    #[error("XML syntax error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("not a GPX document: {reason}")]
    NotGpx { reason: String },

    #[error("track point {index} invalid: {message}")]
    Point { index: usize, message: String },

    #[error("track point {index} has invalid timestamp '{value}'")]
    Timestamp { index: usize, value: String },

    #[error("failed to build track dataframe: {0}")]
    Polars(#[from] PolarsError),
}
