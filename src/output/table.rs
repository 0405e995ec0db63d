use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::compare::deals::BestDeals;
use crate::compare::stats::RateStats;
use crate::compare::{effective_rate, value_score, PairComparison};
use crate::discount::DiscountRuleTable;
use crate::narrative::NarrativeSummary;
use crate::sources::SourceRegistry;
use crate::store::{SavedCode, SearchRecord};
use crate::types::{Offer, SourceReport, SourceStatus};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn money(value: f64) -> String {
    if value.is_finite() {
        format!("${value:.2}")
    } else {
        "-".to_string()
    }
}

pub fn render_offers_table(offers: &[Offer]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "#", "Source", "Hotel", "Brand", "Code", "Base", "Rate", "Savings", "Rating",
    ]);

    for (idx, offer) in offers.iter().enumerate() {
        let savings = if offer.variant.savings_amount > 0.0 {
            Cell::new(format!(
                "{} ({:.1}%)",
                money(offer.variant.savings_amount),
                offer.variant.savings_percentage
            ))
            .fg(Color::Green)
        } else {
            Cell::new("-")
        };
        table.add_row(Row::from(vec![
            Cell::new(idx + 1),
            Cell::new(offer.owner_slug()),
            Cell::new(&offer.hotel_name),
            Cell::new(&offer.brand),
            Cell::new(offer.variant.discount_code.as_deref().unwrap_or("-")),
            Cell::new(money(offer.base_rate)),
            Cell::new(money(effective_rate(offer))),
            savings,
            Cell::new(format!("{:.1}", offer.rating)),
        ]));
    }
    table.to_string()
}

pub fn render_stats_table(stats: &RateStats, best_case_savings: f64) -> String {
    let mut table = new_table();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Results".to_string(), stats.total_results.to_string()]);
    table.add_row(vec!["Average rate".to_string(), money(stats.average_rate)]);
    table.add_row(vec![
        "Price range".to_string(),
        format!(
            "{} - {}",
            money(stats.price_range.min),
            money(stats.price_range.max)
        ),
    ]);
    table.add_row(vec![
        "Savings (all variants)".to_string(),
        money(stats.total_savings),
    ]);
    table.add_row(vec![
        "Savings (best per hotel)".to_string(),
        money(best_case_savings),
    ]);
    table.add_row(vec![
        "Best discount".to_string(),
        format!("{:.2}%", stats.best_savings_percentage),
    ]);
    table.to_string()
}

pub fn render_deals_table(deals: &BestDeals) -> String {
    let mut table = new_table();
    table.set_header(vec!["Deal", "Hotel", "Code", "Rate", "Detail"]);
    let rows = [
        ("Cheapest", &deals.cheapest),
        ("Best savings", &deals.best_savings),
        ("Highest rated", &deals.highest_rated),
        ("Best value", &deals.best_value),
    ];
    for (label, offer) in rows {
        let Some(offer) = offer else {
            table.add_row(vec![label, "-", "-", "-", "-"]);
            continue;
        };
        let detail = match label {
            "Best savings" => format!("saves {}", money(offer.variant.savings_amount)),
            "Highest rated" => format!("{:.1} stars", offer.rating),
            "Best value" => format!("score {:.3}", value_score(offer)),
            _ => offer.owner_slug().to_string(),
        };
        table.add_row(vec![
            label.to_string(),
            offer.hotel_name.clone(),
            offer
                .variant
                .discount_code
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            money(effective_rate(offer)),
            detail,
        ]);
    }
    table.to_string()
}

pub fn render_source_reports_table(reports: &[SourceReport]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Source", "Status", "Offers", "Elapsed", "Error"]);
    for report in reports {
        let status = match report.status {
            SourceStatus::Ok => Cell::new("OK").fg(Color::Green),
            SourceStatus::Failed => Cell::new("FAILED").fg(Color::Red),
            SourceStatus::TimedOut => Cell::new("TIMED OUT").fg(Color::Yellow),
        };
        table.add_row(Row::from(vec![
            Cell::new(report.source.to_string()),
            status,
            Cell::new(report.offer_count),
            Cell::new(format!("{}ms", report.elapsed_ms)),
            Cell::new(report.error.as_deref().unwrap_or("")),
        ]));
    }
    table.to_string()
}

pub fn render_pair_table(cmp: &PairComparison) -> String {
    let mut table = new_table();
    table.set_header(vec!["", "Winner", "Difference"]);
    table.add_row(vec![
        "Cheaper".to_string(),
        cmp.cheaper.hotel_name.clone(),
        money(cmp.price_difference),
    ]);
    table.add_row(vec![
        "Higher rated".to_string(),
        cmp.higher_rated.hotel_name.clone(),
        format!("{:.1}", cmp.rating_difference),
    ]);
    table.add_row(vec![
        "Better savings".to_string(),
        cmp.better_savings.hotel_name.clone(),
        money(cmp.savings_difference),
    ]);
    table.to_string()
}

pub fn render_narrative(summary: &NarrativeSummary) -> String {
    let mut out = format!("{}\n{}\n{}", summary.summary, summary.best_deal, summary.savings);
    for rec in &summary.recommendations {
        out.push_str("\n  - ");
        out.push_str(rec);
    }
    out
}

pub fn render_history_table(records: &[SearchRecord]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "ID", "Searched", "Location", "Guests", "Codes", "Results", "Best", "Savings",
    ]);
    for r in records {
        table.add_row(vec![
            r.id.to_string(),
            r.searched_at.format("%Y-%m-%d %H:%M").to_string(),
            r.location.clone(),
            r.guests.to_string(),
            r.codes_used.len().to_string(),
            r.total_results.to_string(),
            r.best_rate.map(money).unwrap_or_else(|| "-".to_string()),
            money(r.total_savings),
        ]);
    }
    table.to_string()
}

pub fn render_codes_table(codes: &[SavedCode]) -> String {
    let mut table = new_table();
    table.set_header(vec!["ID", "Corporate", "Code", "Notes", "Added"]);
    for c in codes {
        table.add_row(vec![
            c.id.to_string(),
            c.corporate_name.clone(),
            c.code_value.clone(),
            c.notes.clone().unwrap_or_default(),
            c.created_at.format("%Y-%m-%d").to_string(),
        ]);
    }
    table.to_string()
}

pub fn render_sources_table(registry: &SourceRegistry, rules: &DiscountRuleTable) -> String {
    let mut table = new_table();
    table.set_header(vec!["Source", "Brands", "Code", "Discount", "Label", "Restricted to"]);
    for source in registry.sources() {
        let id = source.id();
        let brands = source.brands().len().to_string();
        let source_rules = rules.rules_for(&id);
        if source_rules.is_empty() {
            table.add_row(vec![
                source.name().to_string(),
                brands,
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
            ]);
            continue;
        }
        for (idx, rule) in source_rules.into_iter().enumerate() {
            let restricted = rule
                .brands
                .as_ref()
                .map(|set| set.iter().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_else(|| "all".to_string());
            table.add_row(vec![
                if idx == 0 {
                    source.name().to_string()
                } else {
                    String::new()
                },
                if idx == 0 { brands.clone() } else { String::new() },
                rule.code.clone(),
                format!("{:.0}%", rule.fraction * 100.0),
                rule.label.clone().unwrap_or_default(),
                restricted,
            ]);
        }
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use crate::compare::fixtures::{offer, owned};
    use crate::compare::stats::stats;
    use crate::output::table::{render_offers_table, render_stats_table};
    use crate::types::SourceId;

    #[test]
    fn offers_table_shows_code_and_effective_rate() {
        let offers = vec![owned(
            offer("Hilton Garden Inn Austin", "Hilton Garden Inn", 219.99, 171.59, 4.4),
            SourceId::Hilton,
        )];
        let rendered = render_offers_table(&offers);
        assert!(rendered.contains("Hilton Garden Inn Austin"));
        assert!(rendered.contains("CODE"));
        assert!(rendered.contains("$171.59"));
        assert!(rendered.contains("hilton"));
    }

    #[test]
    fn stats_table_handles_empty_input() {
        let rendered = render_stats_table(&stats(&[]), 0.0);
        assert!(rendered.contains("$0.00 - $0.00"));
    }
}
