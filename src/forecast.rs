use crate::period::MONTH_LABELS;
use crate::schema::{
    Category, CategoryDriver, DataType, ExpenseRecord, ForecastPoint, ForecastReport,
    SeasonalInsight,
};
use log::debug;
use std::collections::BTreeMap;

pub const DEFAULT_FORECAST_HORIZON: usize = 12;

/// Seasonal indices above this are surfaced as named risk insights.
const SEASONAL_RISK_THRESHOLD: f64 = 1.05;

/// The confidence cone widens by this fraction of the base volatility per
/// projected month.
const UNCERTAINTY_WIDENING: f64 = 0.05;

#[derive(Debug, Clone, Copy)]
struct TimelinePoint {
    year: i32,
    month: u32,
    value: f64,
}

/// Monthly realized spend totals in chronological order. Months with no data
/// are omitted, not zero-filled: the regression fits observed months only,
/// each assigned a sequential index regardless of gaps.
fn build_timeline(records: &[ExpenseRecord]) -> Vec<TimelinePoint> {
    let mut totals: BTreeMap<(i32, u32), f64> = BTreeMap::new();

    for record in records {
        if record.data_type != DataType::Actual
            || record.category == Category::Revenue
            || record.is_synthetic
        {
            continue;
        }
        if !(1..=12).contains(&record.month) {
            continue;
        }
        *totals.entry((record.year, record.month)).or_insert(0.0) += record.amount.abs();
    }

    totals
        .into_iter()
        .map(|((year, month), value)| TimelinePoint { year, month, value })
        .collect()
}

/// Ordinary least squares fit of y on x. Degenerate inputs collapse to a flat
/// line through the mean.
fn linear_regression(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    if points.is_empty() {
        return (0.0, 0.0);
    }

    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return (0.0, sum_y / n);
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    (slope, intercept)
}

/// One multiplier per calendar month: the average of `actual / trend` over
/// every historical occurrence of that month. Months never observed get 1.0.
fn seasonal_indices(timeline: &[TimelinePoint], slope: f64, intercept: f64) -> [f64; 12] {
    let mut ratios: [Vec<f64>; 12] = Default::default();

    for (t, point) in timeline.iter().enumerate() {
        let trend = slope * t as f64 + intercept;
        if trend.abs() > f64::EPSILON {
            ratios[(point.month - 1) as usize].push(point.value / trend);
        }
    }

    let mut indices = [1.0; 12];
    for (month_idx, month_ratios) in ratios.iter().enumerate() {
        if !month_ratios.is_empty() {
            indices[month_idx] = month_ratios.iter().sum::<f64>() / month_ratios.len() as f64;
        }
    }
    indices
}

/// Population standard deviation of the residuals left after removing trend
/// and seasonality, used as the base uncertainty magnitude.
fn residual_volatility(timeline: &[TimelinePoint], slope: f64, intercept: f64, indices: &[f64; 12]) -> f64 {
    if timeline.is_empty() {
        return 0.0;
    }

    let residuals: Vec<f64> = timeline
        .iter()
        .enumerate()
        .map(|(t, point)| {
            let expected = (slope * t as f64 + intercept) * indices[(point.month - 1) as usize];
            point.value - expected
        })
        .collect();

    let mean = residuals.iter().sum::<f64>() / residuals.len() as f64;
    let variance = residuals
        .iter()
        .map(|r| (r - mean) * (r - mean))
        .sum::<f64>()
        / residuals.len() as f64;
    variance.sqrt()
}

fn next_calendar_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn period_key(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

/// Per-category trend ranking. Unlike the global series, a category's missing
/// months are zero-filled on the shared time axis: per-category absence is a
/// meaningful "no spend that month" signal.
fn category_drivers(records: &[ExpenseRecord], timeline: &[TimelinePoint]) -> Vec<CategoryDriver> {
    let mut per_category: BTreeMap<&'static str, (Category, BTreeMap<(i32, u32), f64>)> =
        BTreeMap::new();

    for record in records {
        if record.data_type != DataType::Actual
            || record.category == Category::Revenue
            || record.is_synthetic
        {
            continue;
        }
        if !(1..=12).contains(&record.month) {
            continue;
        }
        let entry = per_category
            .entry(record.category.display_name())
            .or_insert_with(|| (record.category, BTreeMap::new()));
        *entry.1.entry((record.year, record.month)).or_insert(0.0) += record.amount.abs();
    }

    let mut drivers: Vec<CategoryDriver> = per_category
        .into_values()
        .map(|(category, monthly)| {
            let series: Vec<(f64, f64)> = timeline
                .iter()
                .enumerate()
                .map(|(t, point)| {
                    let value = monthly.get(&(point.year, point.month)).copied().unwrap_or(0.0);
                    (t as f64, value)
                })
                .collect();

            let (slope, _) = linear_regression(&series);
            let total_volume: f64 = series.iter().map(|(_, v)| v).sum();
            let average = if series.is_empty() {
                0.0
            } else {
                total_volume / series.len() as f64
            };
            let normalized_growth = if average == 0.0 { 0.0 } else { slope / average };

            CategoryDriver {
                category,
                category_name: category.display_name().to_string(),
                trend_slope: slope,
                total_volume,
                normalized_growth,
            }
        })
        .collect();

    // Steepest upward trend first: the "biggest future risk" ranking
    drivers.sort_by(|a, b| b.trend_slope.total_cmp(&a.trend_slope));
    drivers
}

fn seasonal_risks(indices: &[f64; 12]) -> Vec<SeasonalInsight> {
    let mut risks: Vec<SeasonalInsight> = indices
        .iter()
        .enumerate()
        .filter(|(_, &index)| index > SEASONAL_RISK_THRESHOLD)
        .map(|(month_idx, &index)| SeasonalInsight {
            month: month_idx as u32 + 1,
            month_label: MONTH_LABELS[month_idx].to_string(),
            index,
        })
        .collect();

    risks.sort_by(|a, b| b.index.total_cmp(&a.index));
    risks
}

/// Fits a linear trend plus monthly seasonal indices to realized spend and
/// projects `horizon` months forward in three scenarios. Degenerate input
/// yields an empty report, never an error.
pub fn forecast(records: &[ExpenseRecord], horizon: usize) -> ForecastReport {
    let timeline = build_timeline(records);
    if timeline.is_empty() {
        debug!("No realized expense data to forecast");
        return ForecastReport::default();
    }

    let series: Vec<(f64, f64)> = timeline
        .iter()
        .enumerate()
        .map(|(t, point)| (t as f64, point.value))
        .collect();
    let (slope, intercept) = linear_regression(&series);
    let indices = seasonal_indices(&timeline, slope, intercept);
    let volatility = residual_volatility(&timeline, slope, intercept, &indices);

    debug!(
        "Fitted trend over {} observed months: slope {:.2}, intercept {:.2}, volatility {:.2}",
        timeline.len(),
        slope,
        intercept,
        volatility
    );

    let mut points: Vec<ForecastPoint> = timeline
        .iter()
        .map(|point| ForecastPoint {
            period_key: period_key(point.year, point.month),
            month_index: point.month,
            year: point.year,
            month_label: MONTH_LABELS[(point.month - 1) as usize].to_string(),
            historical_value: Some(point.value),
            base_scenario: point.value,
            optimistic_scenario: point.value,
            pessimistic_scenario: point.value,
            is_projected: false,
        })
        .collect();

    let last = timeline[timeline.len() - 1];
    let last_t = timeline.len() - 1;
    let (mut year, mut month) = (last.year, last.month);

    let mut base_total = 0.0;
    let mut optimistic_total = 0.0;
    let mut pessimistic_total = 0.0;

    for i in 1..=horizon {
        (year, month) = next_calendar_month(year, month);

        let future_t = (last_t + i) as f64;
        let trend_value = slope * future_t + intercept;
        let base = (trend_value * indices[(month - 1) as usize]).max(0.0);

        let uncertainty = volatility * (1.0 + UNCERTAINTY_WIDENING * i as f64);
        let optimistic = (base - uncertainty).max(0.0);
        let pessimistic = (base + uncertainty).max(0.0);

        base_total += base;
        optimistic_total += optimistic;
        pessimistic_total += pessimistic;

        points.push(ForecastPoint {
            period_key: period_key(year, month),
            month_index: month,
            year,
            month_label: MONTH_LABELS[(month - 1) as usize].to_string(),
            historical_value: None,
            base_scenario: base,
            optimistic_scenario: optimistic,
            pessimistic_scenario: pessimistic,
            is_projected: true,
        });
    }

    ForecastReport {
        points,
        base_total,
        optimistic_total,
        pessimistic_total,
        drivers: category_drivers(records, &timeline),
        seasonal_insights: seasonal_risks(&indices),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(group_id: &str, data_type: DataType, year: i32, month: u32, amount: f64) -> ExpenseRecord {
        let category = crate::schema::determine_category(group_id);
        ExpenseRecord {
            id: format!("rec-{}-{}-{}", group_id, year, month),
            data_type,
            category,
            category_name: category.display_name().to_string(),
            group_id: group_id.to_string(),
            account_code: "4.9.99".to_string(),
            description: String::new(),
            level: 5,
            month,
            year,
            amount,
            is_variable: false,
            is_synthetic: false,
        }
    }

    #[test]
    fn test_linear_regression_exact_line() {
        let points: Vec<(f64, f64)> = (0..10).map(|t| (t as f64, 3.0 * t as f64 + 7.0)).collect();
        let (slope, intercept) = linear_regression(&points);
        assert!((slope - 3.0).abs() < 1e-9);
        assert!((intercept - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_regression_degenerate() {
        assert_eq!(linear_regression(&[]), (0.0, 0.0));

        let (slope, intercept) = linear_regression(&[(0.0, 42.0)]);
        assert_eq!(slope, 0.0);
        assert!((intercept - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_timeline_omits_gaps() {
        let records = vec![
            record("DESPESAS ADMINISTRATIVAS", DataType::Actual, 2024, 1, -100.0),
            record("DESPESAS ADMINISTRATIVAS", DataType::Actual, 2024, 5, -120.0),
        ];

        let timeline = build_timeline(&records);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].month, 1);
        assert_eq!(timeline[1].month, 5);
    }

    #[test]
    fn test_forecast_non_negative_under_steep_decline() {
        let records: Vec<ExpenseRecord> = (1..=12)
            .map(|m| {
                record(
                    "DESPESAS ADMINISTRATIVAS",
                    DataType::Actual,
                    2024,
                    m,
                    -(1300.0 - 100.0 * m as f64),
                )
            })
            .collect();

        let report = forecast(&records, 24);
        for point in report.points.iter().filter(|p| p.is_projected) {
            assert!(point.base_scenario >= 0.0);
            assert!(point.optimistic_scenario >= 0.0);
            assert!(point.pessimistic_scenario >= 0.0);
        }
        assert!(report.base_total >= 0.0);
        assert!(report.optimistic_total >= 0.0);
    }

    #[test]
    fn test_forecast_degenerate_inputs() {
        let empty = forecast(&[], 12);
        assert!(empty.points.is_empty());
        assert!(empty.drivers.is_empty());
        assert!(empty.seasonal_insights.is_empty());
        assert_eq!(empty.base_total, 0.0);

        let revenue_only = vec![record("ROL", DataType::Actual, 2024, 1, 9000.0)];
        let report = forecast(&revenue_only, 12);
        assert!(report.points.is_empty());
        assert!(report.drivers.is_empty());

        let budget_only = vec![record("DESPESAS ADMINISTRATIVAS", DataType::Budget, 2024, 1, -50.0)];
        assert!(forecast(&budget_only, 12).points.is_empty());
    }

    #[test]
    fn test_forecast_flat_series_projects_flat() {
        let records: Vec<ExpenseRecord> = (2023..=2024)
            .flat_map(|year| {
                (1..=12).map(move |m| {
                    record("DESPESAS ADMINISTRATIVAS", DataType::Actual, year, m, -1000.0)
                })
            })
            .collect();

        let report = forecast(&records, 12);
        let projected: Vec<&ForecastPoint> =
            report.points.iter().filter(|p| p.is_projected).collect();
        assert_eq!(projected.len(), 12);

        for point in &projected {
            assert!((point.base_scenario - 1000.0).abs() < 1.0);
        }
        assert!((report.base_total - 12_000.0).abs() < 12.0);

        // Flat data has no seasonal risk
        assert!(report.seasonal_insights.is_empty());

        // Projection rolls forward from the last historical month
        assert_eq!(projected[0].period_key, "2025-01");
        assert_eq!(projected[11].period_key, "2025-12");
    }

    #[test]
    fn test_seasonal_index_flags_december_spike() {
        let mut records = Vec::new();
        for year in 2022..=2024 {
            for m in 1..=12 {
                let amount = if m == 12 { -2000.0 } else { -1000.0 };
                records.push(record("DESPESAS COMERCIAIS", DataType::Actual, year, m, amount));
            }
        }

        let report = forecast(&records, 12);
        assert!(!report.seasonal_insights.is_empty());
        assert_eq!(report.seasonal_insights[0].month, 12);
        assert_eq!(report.seasonal_insights[0].month_label, "Dez");
        assert!(report.seasonal_insights[0].index > 1.05);
    }

    #[test]
    fn test_drivers_ranked_by_slope() {
        let mut records = Vec::new();
        for m in 1..=12 {
            // Growing logistics spend, flat admin spend
            records.push(record(
                "DESPESAS LOGISTICAS",
                DataType::Actual,
                2024,
                m,
                -(100.0 * m as f64),
            ));
            records.push(record("DESPESAS ADMINISTRATIVAS", DataType::Actual, 2024, m, -500.0));
        }

        let report = forecast(&records, 6);
        assert_eq!(report.drivers.len(), 2);
        assert_eq!(report.drivers[0].category, Category::Logistics);
        assert!(report.drivers[0].trend_slope > report.drivers[1].trend_slope);
        assert!((report.drivers[0].trend_slope - 100.0).abs() < 1e-6);
        assert!((report.drivers[0].total_volume - 7800.0).abs() < 1e-6);
        assert!(report.drivers[0].normalized_growth > 0.0);
        assert!((report.drivers[1].normalized_growth).abs() < 1e-9);
    }

    #[test]
    fn test_driver_series_zero_fills_missing_months() {
        let mut records = Vec::new();
        for m in 1..=6 {
            records.push(record("DESPESAS ADMINISTRATIVAS", DataType::Actual, 2024, m, -500.0));
        }
        // Logistics only spent in one month; its series still spans all six
        records.push(record("DESPESAS LOGISTICAS", DataType::Actual, 2024, 3, -600.0));

        let report = forecast(&records, 6);
        let logistics = report
            .drivers
            .iter()
            .find(|d| d.category == Category::Logistics)
            .unwrap();
        assert!((logistics.total_volume - 600.0).abs() < 1e-9);
        // Average over six timeline months, not one
        assert!(logistics.normalized_growth.abs() < 10.0);
    }
}
