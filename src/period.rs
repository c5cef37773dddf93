use crate::error::{ExpenseAnalyticsError, Result};
use crate::schema::{Category, ExpenseRecord};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

pub const MONTH_NAMES: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Mar\u{e7}o",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MonthRef {
    pub index: u32,
    pub label: String,
}

pub struct PeriodPreset {
    pub label: &'static str,
    pub months: &'static [u32],
}

pub const PERIOD_PRESETS: [PeriodPreset; 7] = [
    PeriodPreset {
        label: "Full Year",
        months: &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
    },
    PeriodPreset {
        label: "Q1",
        months: &[1, 2, 3],
    },
    PeriodPreset {
        label: "Q2",
        months: &[4, 5, 6],
    },
    PeriodPreset {
        label: "Q3",
        months: &[7, 8, 9],
    },
    PeriodPreset {
        label: "Q4",
        months: &[10, 11, 12],
    },
    PeriodPreset {
        label: "H1",
        months: &[1, 2, 3, 4, 5, 6],
    },
    PeriodPreset {
        label: "H2",
        months: &[7, 8, 9, 10, 11, 12],
    },
];

pub fn month_name(month: u32) -> Result<&'static str> {
    if !(1..=12).contains(&month) {
        return Err(ExpenseAnalyticsError::InvalidMonth(month));
    }
    Ok(MONTH_NAMES[(month - 1) as usize])
}

fn normalized_selection(months: &[u32]) -> Vec<u32> {
    let mut selection: Vec<u32> = months
        .iter()
        .copied()
        .filter(|m| (1..=12).contains(m))
        .collect();
    selection.sort_unstable();
    selection.dedup();
    selection
}

/// Maps a month selection to ordered, labeled month references.
pub fn months_for_selection(months: &[u32]) -> Vec<MonthRef> {
    normalized_selection(months)
        .into_iter()
        .map(|index| MonthRef {
            index,
            label: MONTH_LABELS[(index - 1) as usize].to_string(),
        })
        .collect()
}

/// Keeps records whose month is in the selection. An empty selection means
/// "no filter", not "nothing".
pub fn filter_by_period(records: &[ExpenseRecord], months: &[u32]) -> Vec<ExpenseRecord> {
    if months.is_empty() {
        return records.to_vec();
    }
    let selection = normalized_selection(months);
    records
        .iter()
        .filter(|record| selection.contains(&record.month))
        .cloned()
        .collect()
}

pub fn filter_by_year(records: &[ExpenseRecord], year: i32) -> Vec<ExpenseRecord> {
    records
        .iter()
        .filter(|record| record.year == year)
        .cloned()
        .collect()
}

pub fn filter_by_category(records: &[ExpenseRecord], category: Category) -> Vec<ExpenseRecord> {
    records
        .iter()
        .filter(|record| record.category == category)
        .cloned()
        .collect()
}

/// Canonical label for a month selection. Preset matching is order-independent
/// set equality, not subsequence.
pub fn period_label(months: &[u32]) -> String {
    let selection = normalized_selection(months);

    if selection.is_empty() {
        return PERIOD_PRESETS[0].label.to_string();
    }

    for preset in &PERIOD_PRESETS {
        if selection == preset.months {
            return preset.label.to_string();
        }
    }

    if selection.len() == 1 {
        return MONTH_NAMES[(selection[0] - 1) as usize].to_string();
    }

    if selection.len() <= 3 {
        return selection
            .iter()
            .map(|m| MONTH_LABELS[(m - 1) as usize])
            .collect::<Vec<_>>()
            .join(", ");
    }

    format!("{} months selected", selection.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn record(month: u32, year: i32) -> ExpenseRecord {
        ExpenseRecord {
            id: format!("rec-{}-{}", year, month),
            data_type: DataType::Actual,
            category: Category::Admin,
            category_name: Category::Admin.display_name().to_string(),
            group_id: "DESPESAS ADMINISTRATIVAS".to_string(),
            account_code: "4.3.01.01".to_string(),
            description: "Salarios".to_string(),
            level: 5,
            month,
            year,
            amount: -100.0,
            is_variable: false,
            is_synthetic: false,
        }
    }

    #[test]
    fn test_months_for_selection_sorts_and_labels() {
        let refs = months_for_selection(&[11, 2, 7, 2]);
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0], MonthRef { index: 2, label: "Fev".to_string() });
        assert_eq!(refs[1].label, "Jul");
        assert_eq!(refs[2].label, "Nov");
    }

    #[test]
    fn test_months_for_selection_drops_invalid() {
        let refs = months_for_selection(&[0, 5, 13]);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].index, 5);
    }

    #[test]
    fn test_filter_empty_selection_is_identity() {
        let records = vec![record(1, 2024), record(6, 2024), record(12, 2024)];
        let filtered = filter_by_period(&records, &[]);
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn test_filter_keeps_selected_months() {
        let records = vec![record(1, 2024), record(6, 2024), record(12, 2024)];
        let filtered = filter_by_period(&records, &[6, 12]);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| r.month == 6 || r.month == 12));
    }

    #[test]
    fn test_filter_by_year_and_category() {
        let records = vec![record(1, 2023), record(1, 2024)];
        assert_eq!(filter_by_year(&records, 2023).len(), 1);
        assert_eq!(filter_by_category(&records, Category::Admin).len(), 2);
        assert_eq!(filter_by_category(&records, Category::Logistics).len(), 0);
    }

    #[test]
    fn test_period_label_presets_round_trip() {
        for preset in &PERIOD_PRESETS {
            assert_eq!(period_label(preset.months), preset.label);
        }

        // Order must not matter
        assert_eq!(period_label(&[3, 1, 2]), "Q1");
        assert_eq!(period_label(&[12, 11, 10]), "Q4");
    }

    #[test]
    fn test_period_label_single_and_short_lists() {
        assert_eq!(period_label(&[5]), "Maio");
        assert_eq!(period_label(&[1, 5]), "Jan, Mai");
        assert_eq!(period_label(&[2, 5, 9]), "Fev, Mai, Set");
        assert_eq!(period_label(&[1, 2, 3, 5]), "4 months selected");
    }

    #[test]
    fn test_month_name_bounds() {
        assert_eq!(month_name(1).unwrap(), "Janeiro");
        assert_eq!(month_name(12).unwrap(), "Dezembro");
        assert!(month_name(0).is_err());
        assert!(month_name(13).is_err());
    }
}
