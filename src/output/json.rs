use anyhow::Result;
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use crate::compare::stats::RateStats;
    use crate::output::json::render_json;

    #[test]
    fn renders_pretty_snake_case_fields() {
        let rendered = render_json(&RateStats::default()).expect("json");
        assert!(rendered.contains("\"best_savings_percentage\": 0.0"));
        assert!(rendered.contains('\n'));
    }
}
