use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Numeric column access shared by the derivation stages. CSV inference
/// may type whole-number columns as integers, so values are cast to
/// Float64; a column that cannot be read numerically is a validation
/// failure, a missing one a MissingColumn error.
pub(crate) fn float_column(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df.column(name).map_err(|_| PipelineError::MissingColumn {
        column: name.to_string(),
    })?;
    let series = column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|_| PipelineError::Validation(format!("column '{name}' is not numeric")))?;
    Ok(series.f64()?.clone())
}
