use crate::error::{ExpenseAnalyticsError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DataType {
    #[schemars(description = "Realized expense data for a period (REAL)")]
    Actual,

    #[schemars(description = "Planned figures for the same period, used as the deviation baseline (ORCADO)")]
    Budget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    #[schemars(description = "Sales and commercial expenses")]
    Commercial,

    #[schemars(description = "Freight, distribution and warehousing expenses")]
    Logistics,

    #[schemars(description = "Administrative and personnel expenses")]
    Admin,

    #[schemars(description = "Interest, bank fees and other financial expenses")]
    Financial,

    #[schemars(description = "Shared structure costs allocated across the operation")]
    Overhead,

    #[schemars(description = "Depreciation and amortization")]
    Depreciation,

    #[schemars(description = "Net operating revenue (ROL), analyzed separately from expense categories")]
    Revenue,

    #[schemars(description = "Rows whose structural group matches no known marker")]
    Other,
}

/// Marker substrings checked against the structural group identifier,
/// in priority order. First match wins.
const CATEGORY_MARKERS: [(&str, Category); 10] = [
    ("ROL", Category::Revenue),
    ("RECEITA", Category::Revenue),
    ("COMERCIA", Category::Commercial),
    ("LOGISTIC", Category::Logistics),
    ("LOG\u{cd}STIC", Category::Logistics),
    ("ADMIN", Category::Admin),
    ("FINANC", Category::Financial),
    ("OVERHEAD", Category::Overhead),
    ("DEPRECIA", Category::Depreciation),
    ("AMORTIZA", Category::Depreciation),
];

/// Account codes treated as variable expenses. Exact match only: a code that
/// merely extends one of these entries stays classified as fixed.
pub const VARIABLE_ACCOUNT_CODES: [&str; 6] = [
    "4.1.01.01",
    "4.1.01.02",
    "4.1.02.03",
    "4.2.01.01",
    "4.2.01.04",
    "4.3.02.01",
];

impl Category {
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Commercial => "Comercial",
            Category::Logistics => "Log\u{ed}stica",
            Category::Admin => "Administrativa",
            Category::Financial => "Financeira",
            Category::Overhead => "Overhead",
            Category::Depreciation => "Deprecia\u{e7}\u{e3}o",
            Category::Revenue => "ROL",
            Category::Other => "Outros",
        }
    }
}

/// Expense categories in their fixed display order. Revenue is deliberately
/// absent: it never mixes into expense analysis.
pub const EXPENSE_CATEGORIES: [Category; 7] = [
    Category::Commercial,
    Category::Logistics,
    Category::Admin,
    Category::Financial,
    Category::Overhead,
    Category::Depreciation,
    Category::Other,
];

pub fn determine_category(group_id: &str) -> Category {
    let upper = group_id.to_uppercase();
    for (marker, category) in CATEGORY_MARKERS {
        if upper.contains(marker) {
            return category;
        }
    }
    Category::Other
}

/// Detects subtotal rows by their structural group identifier.
pub fn is_subtotal_group(group_id: &str) -> bool {
    let upper = group_id.trim().to_uppercase();
    upper == "ST"
        || upper.starts_with("ST ")
        || upper.ends_with(" ST")
        || upper.contains("SUBTOTAL")
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExpenseRecord {
    #[schemars(description = "Synthetic identifier, unique within a session. Not semantically meaningful.")]
    pub id: String,

    #[schemars(description = "Which scenario this row belongs to")]
    pub data_type: DataType,

    #[schemars(description = "Business cost category resolved from the structural group identifier")]
    pub category: Category,

    #[schemars(description = "Display name derived 1:1 from the category")]
    pub category_name: String,

    #[schemars(description = "The structural identifier the spreadsheet used to assign hierarchy")]
    pub group_id: String,

    #[schemars(description = "Dot-segmented hierarchical account code, e.g. \"4.3.02.01\"")]
    pub account_code: String,

    pub description: String,

    #[schemars(description = "Hierarchy depth, 1 (most synthetic) to 5 (most analytical). Defaults to 5.")]
    pub level: u8,

    pub month: u32,
    pub year: i32,

    #[schemars(description = "Signed amount as stored in the source. Comparisons use absolute magnitude, never raw sign.")]
    pub amount: f64,

    #[schemars(description = "True iff the account code exactly matches the variable-expense allow-list")]
    pub is_variable: bool,

    #[schemars(description = "True iff the group marks a subtotal row or level == 1")]
    pub is_synthetic: bool,
}

impl ExpenseRecord {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExpenseRecord)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = Self::generate_json_schema();
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct ThresholdConfig {
    #[schemars(description = "Upper bound (percent) of the Healthy band")]
    pub healthy_max: f64,

    #[schemars(description = "Lower bound (percent) of the Critical band")]
    pub critical_min: f64,
}

impl ThresholdConfig {
    pub fn new(healthy_max: f64, critical_min: f64) -> Result<Self> {
        let config = Self {
            healthy_max,
            critical_min,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.healthy_max < 0.0 || self.healthy_max >= self.critical_min {
            return Err(ExpenseAnalyticsError::InvalidThresholds {
                healthy_max: self.healthy_max,
                critical_min: self.critical_min,
            });
        }
        Ok(())
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            healthy_max: 10.0,
            critical_min: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DeviationStatus {
    #[schemars(description = "Spent at or below budget")]
    Saving,

    #[schemars(description = "Overrun within the healthy band")]
    Healthy,

    #[schemars(description = "Overrun between the healthy and critical bounds")]
    Warning,

    #[schemars(description = "Overrun at or beyond the critical bound")]
    Critical,
}

/// One row per aggregation key. `display_deviation` is sign-inverted from the
/// internal performance calculation: positive reads as savings, negative as
/// overrun.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeviationResult {
    pub key: String,
    pub description: String,
    pub category: Category,
    pub account_code: Option<String>,
    pub level: u8,
    pub budget_total: f64,
    pub actual_total: f64,
    pub display_deviation: f64,
    pub performance_percent: f64,
    pub status: DeviationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ParetoItem {
    pub key: String,
    pub description: String,
    pub category: Category,

    #[schemars(description = "Overrun magnitude (always positive)")]
    pub value: f64,

    pub display_deviation: f64,
    pub share_percent: f64,
    pub cumulative_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeatmapCell {
    pub month: u32,
    pub month_label: String,
    pub actual: f64,
    pub budget: f64,
    pub diff: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeatmapRow {
    pub category: Category,
    pub category_name: String,
    pub cells: Vec<HeatmapCell>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ForecastPoint {
    #[schemars(description = "Canonical \"YYYY-MM\" key for the period")]
    pub period_key: String,

    pub month_index: u32,
    pub year: i32,
    pub month_label: String,

    #[schemars(description = "Observed monthly total; absent on projected points")]
    pub historical_value: Option<f64>,

    pub base_scenario: f64,
    pub optimistic_scenario: f64,
    pub pessimistic_scenario: f64,
    pub is_projected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryDriver {
    pub category: Category,
    pub category_name: String,

    #[schemars(description = "Fitted trend per month for this category's series")]
    pub trend_slope: f64,

    pub total_volume: f64,

    #[schemars(description = "Slope divided by average monthly volume; 0 when the average is 0")]
    pub normalized_growth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SeasonalInsight {
    pub month: u32,
    pub month_label: String,

    #[schemars(description = "Seasonal index for the month; surfaced when above 1.05")]
    pub index: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ForecastReport {
    pub points: Vec<ForecastPoint>,
    pub base_total: f64,
    pub optimistic_total: f64,
    pub pessimistic_total: f64,
    pub drivers: Vec<CategoryDriver>,
    pub seasonal_insights: Vec<SeasonalInsight>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub month_label: String,
    pub actual: f64,
    pub budget: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExpenseSummary {
    pub actual_total: f64,
    pub budget_total: f64,
    pub display_deviation: f64,
    pub performance_percent: f64,
    pub status: DeviationStatus,
    pub variable_actual_total: f64,
    pub variable_share_percent: f64,
}
