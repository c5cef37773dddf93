//! # Expense Analytics
//!
//! A library for turning raw budget-vs-actual expense spreadsheets into the
//! data behind an interactive financial dashboard: normalized records,
//! category and account rollups, deviation classification, Pareto analysis,
//! a category-by-month heatmap, and a trend-plus-seasonality forecast.
//!
//! ## Core Concepts
//!
//! - **Raw rows**: loosely-typed spreadsheet rows keyed by their original
//!   headers; the normalizer tolerates Excel date serials, Portuguese or
//!   English month names and Brazilian number formats, and defaults every
//!   malformed field instead of failing the upload
//! - **Magnitude comparison**: expenses are often stored as negative numbers,
//!   so every budget-vs-actual comparison uses absolute magnitude, never raw
//!   sign
//! - **Display deviation**: deviations are sign-inverted for presentation so
//!   positive values read as savings and negative as overruns
//! - **Level-5 ground truth**: when a synthetic parent total is blank, it is
//!   reconstructed by summing its analytical (level-5) descendants
//!
//! Everything is a pure function over an in-memory record slice: results are
//! recomputed from scratch on every input change and nothing is mutated in
//! place.
//!
//! ## Example
//!
//! ```rust,ignore
//! use expense_analytics::*;
//!
//! let actual_rows: Vec<RawRow> = parse_sheet("realizado.xlsx");
//! let budget_rows: Vec<RawRow> = parse_sheet("orcado.xlsx");
//!
//! let mut records = normalize(&actual_rows, DataType::Actual);
//! records.extend(normalize(&budget_rows, DataType::Budget));
//!
//! let options = DashboardOptions {
//!     thresholds: ThresholdConfig::new(10.0, 20.0)?,
//!     months: vec![1, 2, 3],
//!     horizon: DEFAULT_FORECAST_HORIZON,
//! };
//!
//! let view = build_dashboard(&records, &options)?;
//! for item in &view.pareto {
//!     println!("{}: {:.1}% cumulative", item.description, item.cumulative_percent);
//! }
//! ```

pub mod aggregate;
pub mod deviation;
pub mod error;
pub mod forecast;
pub mod heatmap;
pub mod ingestion;
pub mod pareto;
pub mod period;
pub mod schema;

pub use aggregate::{
    aggregate, aggregate_comparison, monthly_totals, reconstruct_from_leaves, rollup_total,
    summary, ComparisonMode, GroupBy, ROLLUP_EPSILON,
};
pub use deviation::{classify, measure, DeviationMeasure};
pub use error::{ExpenseAnalyticsError, Result};
pub use forecast::{forecast, DEFAULT_FORECAST_HORIZON};
pub use heatmap::heatmap;
pub use ingestion::{normalize, RawRow};
pub use pareto::{pareto, PARETO_TOP_N};
pub use period::{
    filter_by_category, filter_by_period, filter_by_year, month_name, months_for_selection,
    period_label, MonthRef, PeriodPreset, MONTH_LABELS, MONTH_NAMES, PERIOD_PRESETS,
};
pub use schema::*;

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Explicit inputs for one dashboard computation. The original UI kept the
/// selected filters and thresholds in view state; here they are parameters,
/// so every computation stays a pure function of its arguments.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DashboardOptions {
    pub thresholds: ThresholdConfig,

    #[schemars(description = "Selected months (1-12); empty means no filter")]
    pub months: Vec<u32>,

    #[schemars(description = "Months to project forward")]
    pub horizon: usize,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            months: Vec::new(),
            horizon: DEFAULT_FORECAST_HORIZON,
        }
    }
}

/// Everything the rendering layer consumes, computed in one pass.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DashboardView {
    pub period_label: String,
    pub summary: ExpenseSummary,

    #[schemars(description = "Category-level deviations, worst offenders first")]
    pub category_deviations: Vec<DeviationResult>,

    #[schemars(description = "Account-level deviations, worst offenders first")]
    pub account_deviations: Vec<DeviationResult>,

    pub pareto: Vec<ParetoItem>,
    pub heatmap: Vec<HeatmapRow>,
    pub monthly_totals: Vec<MonthlyTotal>,
    pub forecast: ForecastReport,
}

/// Recomputes the full dashboard for the given records and filters. The
/// forecast always consumes the unfiltered history: projecting from a
/// two-month slice would be meaningless.
pub fn build_dashboard(records: &[ExpenseRecord], options: &DashboardOptions) -> Result<DashboardView> {
    options.thresholds.validate()?;

    info!(
        "Building dashboard over {} records, period: {}",
        records.len(),
        period_label(&options.months)
    );

    let filtered = filter_by_period(records, &options.months);
    debug!("{} records after period filter", filtered.len());

    let mut category_deviations = aggregate(&filtered, GroupBy::Category, &options.thresholds);
    sort_worst_first(&mut category_deviations);

    let mut account_deviations = aggregate(&filtered, GroupBy::Account, &options.thresholds);
    sort_worst_first(&mut account_deviations);

    let pareto_items = pareto(&account_deviations);

    Ok(DashboardView {
        period_label: period_label(&options.months),
        summary: summary(&filtered, &options.thresholds),
        category_deviations,
        account_deviations,
        pareto: pareto_items,
        heatmap: heatmap(&filtered, &options.months, &EXPENSE_CATEGORIES),
        monthly_totals: monthly_totals(&filtered),
        forecast: forecast(records, options.horizon),
    })
}

/// The common presentation convention: largest absolute deviation first.
fn sort_worst_first(results: &mut [DeviationResult]) {
    results.sort_by(|a, b| {
        b.display_deviation
            .abs()
            .total_cmp(&a.display_deviation.abs())
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        data_type: DataType,
        group_id: &str,
        account_code: &str,
        month: u32,
        amount: f64,
    ) -> ExpenseRecord {
        let category = determine_category(group_id);
        ExpenseRecord {
            id: format!("rec-{}-{}-{}", group_id, month, amount),
            data_type,
            category,
            category_name: category.display_name().to_string(),
            group_id: group_id.to_string(),
            account_code: account_code.to_string(),
            description: String::new(),
            level: 5,
            month,
            year: 2024,
            amount,
            is_variable: false,
            is_synthetic: false,
        }
    }

    #[test]
    fn test_build_dashboard_smoke() {
        let records = vec![
            record(DataType::Actual, "DESPESAS COMERCIAIS", "4.1.01", 1, -120.0),
            record(DataType::Budget, "DESPESAS COMERCIAIS", "4.1.01", 1, -100.0),
            record(DataType::Actual, "DESPESAS LOGISTICAS", "4.2.01", 2, -80.0),
            record(DataType::Budget, "DESPESAS LOGISTICAS", "4.2.01", 2, -100.0),
        ];

        let view = build_dashboard(&records, &DashboardOptions::default()).unwrap();
        assert_eq!(view.period_label, "Full Year");
        assert_eq!(view.category_deviations.len(), 2);
        assert_eq!(view.pareto.len(), 1);
        assert_eq!(view.heatmap.len(), EXPENSE_CATEGORIES.len());
        assert_eq!(view.monthly_totals.len(), 2);
        assert!(!view.forecast.points.is_empty());
    }

    #[test]
    fn test_build_dashboard_rejects_bad_thresholds() {
        let options = DashboardOptions {
            thresholds: ThresholdConfig {
                healthy_max: 30.0,
                critical_min: 20.0,
            },
            ..Default::default()
        };

        assert!(build_dashboard(&[], &options).is_err());
    }

    #[test]
    fn test_worst_first_ordering() {
        let records = vec![
            record(DataType::Actual, "DESPESAS COMERCIAIS", "4.1.01", 1, -150.0),
            record(DataType::Budget, "DESPESAS COMERCIAIS", "4.1.01", 1, -100.0),
            record(DataType::Actual, "DESPESAS LOGISTICAS", "4.2.01", 1, -105.0),
            record(DataType::Budget, "DESPESAS LOGISTICAS", "4.2.01", 1, -100.0),
        ];

        let view = build_dashboard(&records, &DashboardOptions::default()).unwrap();
        assert_eq!(view.category_deviations[0].category, Category::Commercial);
        assert_eq!(view.category_deviations[1].category, Category::Logistics);
    }
}
