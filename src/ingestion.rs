use crate::schema::{
    determine_category, is_subtotal_group, DataType, ExpenseRecord, VARIABLE_ACCOUNT_CODES,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use log::debug;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// One spreadsheet row as handed over by the upload collaborator, keyed by
/// the original (possibly whitespace-padded) header strings.
pub type RawRow = Map<String, Value>;

/// Days between the 1900 spreadsheet serial epoch (with its leap-year bug)
/// and the Unix epoch. A different offset silently shifts every serial date.
const EXCEL_EPOCH_OFFSET_DAYS: f64 = 25569.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

const FALLBACK_YEAR: i32 = 2024;
const FALLBACK_MONTH: u32 = 1;
const DEFAULT_LEVEL: u8 = 5;

const MONTH_ALIASES: [&str; 3] = ["mes", "m\u{ea}s", "month"];
const YEAR_ALIASES: [&str; 2] = ["ano", "year"];
const AMOUNT_ALIASES: [&str; 3] = ["valor", "amount", "value"];
const ACCOUNT_ALIASES: [&str; 5] = [
    "conta",
    "conta contabil",
    "conta cont\u{e1}bil",
    "account",
    "account code",
];
const DESCRIPTION_ALIASES: [&str; 5] = [
    "descricao",
    "descri\u{e7}\u{e3}o",
    "historico",
    "hist\u{f3}rico",
    "description",
];
const GROUP_ALIASES: [&str; 4] = ["grupo", "grupo estrutural", "estrutura", "group"];
const LEVEL_ALIASES: [&str; 3] = ["nivel", "n\u{ed}vel", "level"];

const PT_MONTH_PREFIXES: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];
const EN_MONTH_PREFIXES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

static SESSION_NONCE: OnceLock<u32> = OnceLock::new();
static RECORD_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_record_id() -> String {
    let nonce = *SESSION_NONCE.get_or_init(|| rand::thread_rng().gen());
    let seq = RECORD_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("rec-{:08x}-{}", nonce, seq)
}

/// Converts raw spreadsheet rows into the uniform record model. Never fails:
/// malformed fields are logged and defaulted so one bad row cannot abort an
/// upload.
pub fn normalize(rows: &[RawRow], data_type: DataType) -> Vec<ExpenseRecord> {
    rows.iter().map(|row| normalize_row(row, data_type)).collect()
}

fn normalize_row(row: &RawRow, data_type: DataType) -> ExpenseRecord {
    let fields = trimmed_fields(row);

    let group_id = string_field(&fields, &GROUP_ALIASES).unwrap_or_default();
    let account_code = string_field(&fields, &ACCOUNT_ALIASES).unwrap_or_default();
    let description = string_field(&fields, &DESCRIPTION_ALIASES).unwrap_or_default();

    let month = parse_month(lookup(&fields, &MONTH_ALIASES));
    let year = parse_year(lookup(&fields, &YEAR_ALIASES));
    let amount = parse_amount(lookup(&fields, &AMOUNT_ALIASES));
    let level = parse_level(lookup(&fields, &LEVEL_ALIASES));

    let category = determine_category(&group_id);
    let is_variable = VARIABLE_ACCOUNT_CODES.contains(&account_code.as_str());
    let is_synthetic = is_subtotal_group(&group_id) || level == 1;

    ExpenseRecord {
        id: next_record_id(),
        data_type,
        category,
        category_name: category.display_name().to_string(),
        group_id,
        account_code,
        description,
        level,
        month,
        year,
        amount,
        is_variable,
        is_synthetic,
    }
}

/// Re-keys the row by trimmed, lowercased headers so stray spreadsheet
/// whitespace cannot hide a column.
fn trimmed_fields(row: &RawRow) -> HashMap<String, &Value> {
    row.iter()
        .map(|(key, value)| (key.trim().to_lowercase(), value))
        .collect()
}

fn lookup<'a>(fields: &'a HashMap<String, &Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| fields.get(*alias).copied())
}

fn string_field(fields: &HashMap<String, &Value>, aliases: &[&str]) -> Option<String> {
    match lookup(fields, aliases)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let millis = (serial - EXCEL_EPOCH_OFFSET_DAYS) * MILLIS_PER_DAY;
    DateTime::<Utc>::from_timestamp_millis(millis as i64).map(|dt| dt.date_naive())
}

fn parse_date_string(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

fn month_from_abbreviation(text: &str) -> Option<u32> {
    let lower = text.trim().to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    for table in [&PT_MONTH_PREFIXES, &EN_MONTH_PREFIXES] {
        if let Some(idx) = table.iter().position(|prefix| lower.starts_with(prefix)) {
            return Some(idx as u32 + 1);
        }
    }
    None
}

fn month_from_number(n: f64) -> Option<u32> {
    if (1.0..=12.0).contains(&n) && n.fract() == 0.0 {
        return Some(n as u32);
    }
    excel_serial_to_date(n).map(|date| date.month())
}

fn parse_month(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().and_then(month_from_number),
        Some(Value::String(s)) => {
            if let Ok(n) = s.trim().parse::<f64>() {
                month_from_number(n)
            } else {
                month_from_abbreviation(s)
                    .or_else(|| parse_date_string(s).map(|date| date.month()))
            }
        }
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        debug!("Could not parse month from {:?}, defaulting to {}", value, FALLBACK_MONTH);
        FALLBACK_MONTH
    })
}

fn year_from_number(n: f64) -> Option<i32> {
    if (1900.0..=2100.0).contains(&n) && n.fract() == 0.0 {
        return Some(n as i32);
    }
    excel_serial_to_date(n).map(|date| date.year())
}

fn parse_year(value: Option<&Value>) -> i32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().and_then(year_from_number),
        Some(Value::String(s)) => {
            if let Ok(n) = s.trim().parse::<f64>() {
                year_from_number(n)
            } else {
                parse_date_string(s).map(|date| date.year())
            }
        }
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        debug!("Could not parse year from {:?}, defaulting to {}", value, FALLBACK_YEAR);
        FALLBACK_YEAR
    })
}

/// Brazilian locale fallback: "1.234,56" uses "." for thousands and "," for
/// decimals.
fn parse_locale_number(text: &str) -> Option<f64> {
    let normalized = text.trim().replace('.', "").replace(',', ".");
    normalized.parse::<f64>().ok()
}

fn parse_amount(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .or_else(|| parse_locale_number(s)),
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        debug!("Could not parse amount from {:?}, defaulting to 0", value);
        0.0
    })
}

fn parse_level(value: Option<&Value>) -> u8 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match parsed {
        Some(level @ 1..=5) => level as u8,
        _ => DEFAULT_LEVEL,
    }
}
