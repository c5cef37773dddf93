use crate::schema::{DeviationResult, ParetoItem};

/// The Pareto chart only surfaces the worst offenders.
pub const PARETO_TOP_N: usize = 10;

/// Ranks budget overruns for 80/20 analysis: worst overrun first, with each
/// item's share of the charted overrun total and a running cumulative
/// percentage. An empty result is the expected outcome when nothing overran.
pub fn pareto(results: &[DeviationResult]) -> Vec<ParetoItem> {
    let mut overruns: Vec<&DeviationResult> = results
        .iter()
        .filter(|r| r.display_deviation < 0.0)
        .collect();

    overruns.sort_by(|a, b| a.display_deviation.total_cmp(&b.display_deviation));
    overruns.truncate(PARETO_TOP_N);

    let total: f64 = overruns.iter().map(|r| r.display_deviation.abs()).sum();
    if total == 0.0 {
        return Vec::new();
    }

    let mut cumulative_percent = 0.0;
    overruns
        .into_iter()
        .map(|r| {
            let value = r.display_deviation.abs();
            let share_percent = value / total * 100.0;
            cumulative_percent += share_percent;
            ParetoItem {
                key: r.key.clone(),
                description: r.description.clone(),
                category: r.category,
                value,
                display_deviation: r.display_deviation,
                share_percent,
                cumulative_percent,
            }
        })
        .collect()
}
