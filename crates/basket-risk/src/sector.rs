//! Sector aggregates of the risk table.

use crate::{
    Result,
    frame::f64_values,
    ranking::RiskTable,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Mean statistics of the ranked symbols of one sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorSummary {
    /// Sector label
    pub sector: String,
    /// Number of ranked symbols in the sector
    pub members: usize,
    /// Mean annual return
    pub annual_return: f64,
    /// Mean annual volatility
    pub annual_volatility: f64,
    /// Mean Sharpe ratio
    pub sharpe_ratio: f64,
    /// Mean risk score
    pub risk_score: f64,
}

/// Group `table` by sector, sorted by sector name.
pub fn summarize_sectors(table: &RiskTable) -> Result<Vec<SectorSummary>> {
    if table.is_empty() {
        return Ok(Vec::new());
    }

    let summary = table
        .to_frame()?
        .lazy()
        .group_by([col("sector")])
        .agg([
            col("symbol").count().cast(DataType::Int64).alias("members"),
            col("annual_return").mean(),
            col("annual_volatility").mean(),
            col("sharpe_ratio").mean(),
            col("risk_score").mean(),
        ])
        .sort(["sector"], SortMultipleOptions::default())
        .collect()?;

    let sectors = summary.column("sector")?.str()?;
    let members = summary.column("members")?.i64()?;
    let annual_return = f64_values(&summary, "annual_return")?;
    let annual_volatility = f64_values(&summary, "annual_volatility")?;
    let sharpe_ratio = f64_values(&summary, "sharpe_ratio")?;
    let risk_score = f64_values(&summary, "risk_score")?;

    Ok(sectors
        .into_iter()
        .zip(members)
        .enumerate()
        .map(|(i, (sector, count))| SectorSummary {
            sector: sector.unwrap_or_default().to_string(),
            members: count.unwrap_or_default() as usize,
            annual_return: annual_return[i],
            annual_volatility: annual_volatility[i],
            sharpe_ratio: sharpe_ratio[i],
            risk_score: risk_score[i],
        })
        .collect())
}

/// Sector with the highest mean Sharpe ratio.
pub fn best_sector(sectors: &[SectorSummary]) -> Option<&SectorSummary> {
    sectors
        .iter()
        .filter(|s| s.sharpe_ratio.is_finite())
        .max_by(|a, b| a.sharpe_ratio.total_cmp(&b.sharpe_ratio))
}

/// Tabular view for persistence.
pub fn sectors_to_frame(sectors: &[SectorSummary]) -> Result<DataFrame> {
    Ok(df![
        "sector" => sectors.iter().map(|s| s.sector.clone()).collect::<Vec<_>>(),
        "members" => sectors.iter().map(|s| s.members as i64).collect::<Vec<_>>(),
        "annual_return" => sectors.iter().map(|s| s.annual_return).collect::<Vec<_>>(),
        "annual_volatility" => sectors.iter().map(|s| s.annual_volatility).collect::<Vec<_>>(),
        "sharpe_ratio" => sectors.iter().map(|s| s.sharpe_ratio).collect::<Vec<_>>(),
        "risk_score" => sectors.iter().map(|s| s.risk_score).collect::<Vec<_>>(),
    ]?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RiskRanker, SymbolMetrics};
    use approx::assert_abs_diff_eq;

    fn metrics(symbol: &str, sector: &str, vol: f64, ret: f64) -> SymbolMetrics {
        SymbolMetrics {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            sector: sector.to_string(),
            observations: 50,
            mean_return: ret / 252.0,
            std_return: vol / 252.0_f64.sqrt(),
            annual_return: ret,
            annual_volatility: vol,
            sharpe_ratio: ret / vol,
            skewness: 0.0,
            kurtosis: vol,
            var_95: -vol / 10.0,
            var_99: -vol / 5.0,
            max_drawdown: -vol / 2.0,
            extreme_positive: 0,
            extreme_negative: 0,
            extreme_days: 0,
            max_z_score: 0.0,
            min_z_score: 0.0,
        }
    }

    #[test]
    fn test_sector_means() {
        let table = RiskRanker::default()
            .rank(vec![
                metrics("B1", "Banking", 0.2, 0.1),
                metrics("B2", "Banking", 0.4, 0.3),
                metrics("A1", "Aviation", 0.5, 0.5),
            ])
            .unwrap();
        let sectors = summarize_sectors(&table).unwrap();
        assert_eq!(sectors.len(), 2);
        assert_eq!(sectors[0].sector, "Aviation");
        assert_eq!(sectors[0].members, 1);
        assert_eq!(sectors[1].sector, "Banking");
        assert_eq!(sectors[1].members, 2);
        assert_abs_diff_eq!(sectors[1].annual_return, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(sectors[1].annual_volatility, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(sectors[1].sharpe_ratio, (0.5 + 0.75) / 2.0, epsilon = 1e-12);

        assert_eq!(best_sector(&sectors).unwrap().sector, "Aviation");
        assert_eq!(sectors_to_frame(&sectors).unwrap().height(), 2);
    }
}
