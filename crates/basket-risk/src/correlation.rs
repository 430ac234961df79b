//! Cross-symbol correlation of daily log returns.
//!
//! Pairs are aligned on the dates both symbols traded (pairwise-complete
//! observations), so a symbol with a shorter history does not shrink the
//! sample of every other pair.

use crate::{Result, metrics::SymbolAnalysis};
use chrono::NaiveDate;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Symmetric matrix of Pearson correlations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    symbols: Vec<String>,
    labels: Vec<String>,
    values: Array2<f64>,
}

impl CorrelationMatrix {
    /// Correlate the returns of `analyses`, keeping their order.
    ///
    /// The diagonal is 1. Pairs with fewer than two shared dates or a
    /// zero-variance leg are NaN.
    pub fn from_analyses<'a>(analyses: impl IntoIterator<Item = &'a SymbolAnalysis>) -> Self {
        let analyses: Vec<&SymbolAnalysis> = analyses.into_iter().collect();
        let by_date: Vec<BTreeMap<NaiveDate, f64>> = analyses
            .iter()
            .map(|a| a.returns.iter().collect())
            .collect();

        let n = analyses.len();
        let mut values = Array2::from_elem((n, n), f64::NAN);
        for i in 0..n {
            values[[i, i]] = 1.0;
            for j in (i + 1)..n {
                let (xs, ys): (Vec<f64>, Vec<f64>) = by_date[i]
                    .iter()
                    .filter_map(|(date, x)| by_date[j].get(date).map(|y| (*x, *y)))
                    .unzip();
                let rho = pearson(&xs, &ys);
                values[[i, j]] = rho;
                values[[j, i]] = rho;
            }
        }

        Self {
            symbols: analyses.iter().map(|a| a.metrics.symbol.clone()).collect(),
            labels: analyses.iter().map(|a| a.metrics.name.clone()).collect(),
            values,
        }
    }

    /// Tickers, in matrix order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Display names, in matrix order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The correlation values.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Correlation between two tickers.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        Some(self.values[[i, j]])
    }

    /// Tabular view: `symbol`, `name`, then one column per ticker.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns = vec![
            Column::new("symbol".into(), self.symbols.clone()),
            Column::new("name".into(), self.labels.clone()),
        ];
        for (j, symbol) in self.symbols.iter().enumerate() {
            columns.push(Column::new(
                symbol.as_str().into(),
                self.values.column(j).to_vec(),
            ));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Pearson correlation; NaN with fewer than two points or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return f64::NAN;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}
