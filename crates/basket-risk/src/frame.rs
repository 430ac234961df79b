//! Small helpers for pulling values out of collected DataFrames.

use crate::{Result, RiskError};
use polars::prelude::*;

/// First value of a float column, failing when it is null.
pub(crate) fn scalar_f64(df: &DataFrame, name: &str) -> Result<f64> {
    df.column(name)?
        .f64()?
        .get(0)
        .ok_or_else(|| RiskError::Computation(format!("{name} is null")))
}

/// First value of an integer column, failing when it is null.
pub(crate) fn scalar_i64(df: &DataFrame, name: &str) -> Result<i64> {
    df.column(name)?
        .i64()?
        .get(0)
        .ok_or_else(|| RiskError::Computation(format!("{name} is null")))
}

/// All values of a float column; nulls are an error.
pub(crate) fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let values = df.column(name)?.f64()?;
    if values.null_count() > 0 {
        return Err(RiskError::Computation(format!(
            "{name} has {} null values",
            values.null_count()
        )));
    }
    Ok(values.into_no_null_iter().collect())
}
