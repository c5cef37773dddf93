use crate::deviation::{classify, measure};
use crate::period::MONTH_LABELS;
use crate::schema::{
    Category, DataType, DeviationResult, ExpenseRecord, ExpenseSummary, MonthlyTotal,
    ThresholdConfig,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parent aggregates with magnitude below this are treated as blank and
/// reconstructed from level-5 descendants.
pub const ROLLUP_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupBy {
    Category,
    Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ComparisonMode {
    BudgetVsActual,
    YearOverYear {
        baseline_year: i32,
        comparison_year: i32,
    },
}

struct Bucket {
    description: String,
    category: Category,
    account_code: Option<String>,
    level: u8,
    actual_total: f64,
    budget_total: f64,
}

impl Bucket {
    fn from_record(record: &ExpenseRecord, group_by: GroupBy) -> Self {
        let (description, account_code) = match group_by {
            GroupBy::Category => (record.category_name.clone(), None),
            GroupBy::Account => (record.description.clone(), Some(record.account_code.clone())),
        };
        Self {
            description,
            category: record.category,
            account_code,
            level: record.level,
            actual_total: 0.0,
            budget_total: 0.0,
        }
    }
}

fn bucket_key(record: &ExpenseRecord, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Category => record.category_name.clone(),
        GroupBy::Account => record.account_code.clone(),
    }
}

fn results_from_buckets(
    buckets: BTreeMap<String, Bucket>,
    thresholds: &ThresholdConfig,
) -> Vec<DeviationResult> {
    buckets
        .into_iter()
        .map(|(key, bucket)| {
            let m = measure(bucket.actual_total, bucket.budget_total);
            DeviationResult {
                key,
                description: bucket.description,
                category: bucket.category,
                account_code: bucket.account_code,
                level: bucket.level,
                budget_total: bucket.budget_total,
                actual_total: bucket.actual_total,
                display_deviation: m.display_deviation,
                performance_percent: m.performance_percent,
                status: classify(m.performance_percent, thresholds),
            }
        })
        .collect()
}

/// Groups records by category or account code and classifies each bucket's
/// budget-vs-actual deviation. Revenue is excluded unconditionally; output
/// order is unspecified.
pub fn aggregate(
    records: &[ExpenseRecord],
    group_by: GroupBy,
    thresholds: &ThresholdConfig,
) -> Vec<DeviationResult> {
    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();

    for record in records {
        if record.category == Category::Revenue {
            continue;
        }

        let bucket = buckets
            .entry(bucket_key(record, group_by))
            .or_insert_with(|| Bucket::from_record(record, group_by));

        match record.data_type {
            DataType::Actual => bucket.actual_total += record.amount,
            DataType::Budget => bucket.budget_total += record.amount,
        }
    }

    debug!("Aggregated {} records into {} buckets", records.len(), buckets.len());
    results_from_buckets(buckets, thresholds)
}

/// Same bucketing and classification, but the baseline can be another year's
/// realized data instead of the budget.
pub fn aggregate_comparison(
    records: &[ExpenseRecord],
    group_by: GroupBy,
    mode: ComparisonMode,
    thresholds: &ThresholdConfig,
) -> Vec<DeviationResult> {
    let (baseline_year, comparison_year) = match mode {
        ComparisonMode::BudgetVsActual => return aggregate(records, group_by, thresholds),
        ComparisonMode::YearOverYear {
            baseline_year,
            comparison_year,
        } => (baseline_year, comparison_year),
    };

    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();

    for record in records {
        if record.category == Category::Revenue || record.data_type != DataType::Actual {
            continue;
        }
        if record.year != baseline_year && record.year != comparison_year {
            continue;
        }

        let bucket = buckets
            .entry(bucket_key(record, group_by))
            .or_insert_with(|| Bucket::from_record(record, group_by));

        if record.year == comparison_year {
            bucket.actual_total += record.amount;
        } else {
            bucket.budget_total += record.amount;
        }
    }

    results_from_buckets(buckets, thresholds)
}

/// Rebuilds a parent-level total from its level-5 descendants: every leaf
/// whose account code equals the parent code or extends it by a dot segment.
/// Level 5 is ground truth when synthetic subtotal rows are blank or stale.
pub fn reconstruct_from_leaves(
    records: &[ExpenseRecord],
    parent_code: &str,
    category: Category,
    year: i32,
    data_type: DataType,
) -> f64 {
    let child_prefix = format!("{}.", parent_code);
    records
        .iter()
        .filter(|r| {
            r.data_type == data_type
                && r.year == year
                && r.category == category
                && r.level == 5
                && (r.account_code == parent_code || r.account_code.starts_with(&child_prefix))
        })
        .map(|r| r.amount.abs())
        .sum()
}

/// Magnitude of a parent-level aggregate, falling back to leaf reconstruction
/// when the stored value is numerically blank.
pub fn rollup_total(
    records: &[ExpenseRecord],
    parent_code: &str,
    category: Category,
    year: i32,
    data_type: DataType,
    stored_total: f64,
) -> f64 {
    if stored_total.abs() >= ROLLUP_EPSILON {
        return stored_total.abs();
    }
    debug!(
        "Stored total for {} is blank, reconstructing from level-5 descendants",
        parent_code
    );
    reconstruct_from_leaves(records, parent_code, category, year, data_type)
}

/// Headline totals for the overview: overall deviation plus the variable-cost
/// share of realized spend. Subtotal rows are skipped to avoid double counts.
pub fn summary(records: &[ExpenseRecord], thresholds: &ThresholdConfig) -> ExpenseSummary {
    let mut actual_total = 0.0;
    let mut budget_total = 0.0;
    let mut variable_actual_total = 0.0;

    for record in records {
        if record.category == Category::Revenue || record.is_synthetic {
            continue;
        }
        match record.data_type {
            DataType::Actual => {
                actual_total += record.amount.abs();
                if record.is_variable {
                    variable_actual_total += record.amount.abs();
                }
            }
            DataType::Budget => budget_total += record.amount.abs(),
        }
    }

    let m = measure(actual_total, budget_total);
    let variable_share_percent = if actual_total > 0.0 {
        variable_actual_total / actual_total * 100.0
    } else {
        0.0
    };

    ExpenseSummary {
        actual_total,
        budget_total,
        display_deviation: m.display_deviation,
        performance_percent: m.performance_percent,
        status: classify(m.performance_percent, thresholds),
        variable_actual_total,
        variable_share_percent,
    }
}

/// Chronological actual-vs-budget totals per month, for the evolution chart.
pub fn monthly_totals(records: &[ExpenseRecord]) -> Vec<MonthlyTotal> {
    let mut buckets: BTreeMap<(i32, u32), (f64, f64)> = BTreeMap::new();

    for record in records {
        if record.category == Category::Revenue || record.is_synthetic {
            continue;
        }
        if !(1..=12).contains(&record.month) {
            continue;
        }
        let entry = buckets.entry((record.year, record.month)).or_insert((0.0, 0.0));
        match record.data_type {
            DataType::Actual => entry.0 += record.amount.abs(),
            DataType::Budget => entry.1 += record.amount.abs(),
        }
    }

    buckets
        .into_iter()
        .map(|((year, month), (actual, budget))| MonthlyTotal {
            year,
            month,
            month_label: MONTH_LABELS[(month - 1) as usize].to_string(),
            actual,
            budget,
        })
        .collect()
}
