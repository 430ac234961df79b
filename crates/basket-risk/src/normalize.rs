//! Cross-sectional normalization expressions.
//!
//! Both helpers map a column onto `[0, 1]` so that metrics with different
//! units can be combined into one score.

use polars::prelude::*;

/// Dense percentile rank of `expr` in `[0, 1]`.
///
/// Tied values share a rank and ranks are consecutive (dense). Each rank is
/// scaled by one less than the number of distinct values,
/// `(rank - 1) / (distinct - 1)`, so the smallest value maps to 0 and the
/// largest to 1. A constant column maps to 0 everywhere.
///
/// Ranks only depend on ordering, so any strictly increasing transform of the
/// input yields identical output.
pub fn dense_percentile_rank(expr: Expr) -> Expr {
    let rank = expr
        .rank(
            RankOptions {
                method: RankMethod::Dense,
                descending: false,
            },
            None,
        )
        .cast(DataType::Float64);
    let distinct = rank.clone().max();
    ((rank - lit(1.0)) / (distinct - lit(1.0))).fill_nan(lit(0.0))
}

/// Min-max scaling of `expr` onto `[0, 1]`.
///
/// Computes `(x - min) / (max - min)`. When every value is equal the range is
/// zero and all rows take `flat_value`.
pub fn min_max_scale(expr: Expr, flat_value: f64) -> Expr {
    let min = expr.clone().min();
    let max = expr.clone().max();
    ((expr - min.clone()) / (max - min)).fill_nan(lit(flat_value))
}
