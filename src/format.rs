//! Text rendering of barn summaries.

use crate::models::BarnSummary;

/// Group an integer's digits in thousands with commas (`-1234567` → `-1,234,567`)
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Render one barn summary as a four-line block
pub fn render_summary(summary: &BarnSummary) -> String {
    format!(
        "📈 Kandang {code} ({breed}) – Day {age}\n\
         🐣 Live birds: {live} (CI {ci} │ Mort {mort} │ {pct:.2} %)\n\
         🌾 Feed: {feed} kg total\n\
         ⚖️ Avg BW: {abw:.2} kg │ FCR: {fcr} │ EEF: {eef}",
        code = summary.code,
        breed = summary.breed,
        age = summary.age_days,
        live = group_thousands(summary.live_birds),
        ci = group_thousands(summary.chick_in),
        mort = group_thousands(summary.mortality),
        pct = summary.mortality_pct,
        feed = group_thousands(summary.feed_total_kg),
        abw = summary.avg_body_weight_kg,
        fcr = summary.fcr,
        eef = summary.eef,
    )
}

/// Render summaries in order
pub fn render_summaries(summaries: &[BarnSummary]) -> Vec<String> {
    summaries.iter().map(render_summary).collect()
}
