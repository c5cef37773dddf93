use crate::deviation::measure;
use crate::period::MONTH_LABELS;
use crate::schema::{Category, DataType, ExpenseRecord, HeatmapCell, HeatmapRow};

/// Builds a category-by-month matrix of actual/budget/deviation cells. Rows
/// follow the given category order (a fixed display order, not sorted by
/// magnitude). An empty month selection spans the full year.
pub fn heatmap(
    records: &[ExpenseRecord],
    months: &[u32],
    categories: &[Category],
) -> Vec<HeatmapRow> {
    let selection: Vec<u32> = if months.is_empty() {
        (1..=12).collect()
    } else {
        let mut selection: Vec<u32> = months
            .iter()
            .copied()
            .filter(|m| (1..=12).contains(m))
            .collect();
        selection.sort_unstable();
        selection.dedup();
        selection
    };

    categories
        .iter()
        .map(|&category| HeatmapRow {
            category,
            category_name: category.display_name().to_string(),
            cells: selection
                .iter()
                .map(|&month| cell(records, category, month))
                .collect(),
        })
        .collect()
}

fn cell(records: &[ExpenseRecord], category: Category, month: u32) -> HeatmapCell {
    let mut actual_total = 0.0;
    let mut budget_total = 0.0;

    for record in records {
        if record.category != category || record.month != month || record.is_synthetic {
            continue;
        }
        match record.data_type {
            DataType::Actual => actual_total += record.amount,
            DataType::Budget => budget_total += record.amount,
        }
    }

    let m = measure(actual_total, budget_total);
    HeatmapCell {
        month,
        month_label: MONTH_LABELS[(month - 1) as usize].to_string(),
        actual: m.actual_magnitude,
        budget: m.budget_magnitude,
        diff: m.display_deviation,
        percent: m.performance_percent,
    }
}
