use anyhow::Result;

use crate::compare::effective_rate;
use crate::store::{SavedCode, SearchRecord};
use crate::types::Offer;

pub fn offers_to_csv(offers: &[Offer]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "owner",
        "hotel_name",
        "brand",
        "discount_code",
        "base_rate",
        "effective_rate",
        "savings_amount",
        "savings_percentage",
        "rating",
        "booking_url",
    ])?;
    for offer in offers {
        let rate = effective_rate(offer);
        writer.write_record([
            offer.owner_slug().to_string(),
            offer.hotel_name.clone(),
            offer.brand.clone(),
            offer.variant.discount_code.clone().unwrap_or_default(),
            format!("{:.2}", offer.base_rate),
            if rate.is_finite() {
                format!("{rate:.2}")
            } else {
                String::new()
            },
            format!("{:.2}", offer.variant.savings_amount),
            format!("{:.2}", offer.variant.savings_percentage),
            format!("{:.1}", offer.rating),
            offer.variant.booking_url.clone(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn history_to_csv(records: &[SearchRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "searched_at",
        "location",
        "guests",
        "codes",
        "total_results",
        "best_rate",
        "total_savings",
    ])?;
    for r in records {
        writer.write_record([
            r.id.to_string(),
            r.searched_at.to_rfc3339(),
            r.location.clone(),
            r.guests.to_string(),
            r.codes_used.join(" "),
            r.total_results.to_string(),
            r.best_rate.map(|v| format!("{v:.2}")).unwrap_or_default(),
            format!("{:.2}", r.total_savings),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn codes_to_csv(codes: &[SavedCode]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["id", "corporate_name", "code_value", "notes", "created_at"])?;
    for c in codes {
        writer.write_record([
            c.id.to_string(),
            c.corporate_name.clone(),
            c.code_value.clone(),
            c.notes.clone().unwrap_or_default(),
            c.created_at.to_rfc3339(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

#[cfg(test)]
mod tests {
    use crate::compare::fixtures::{offer, owned};
    use crate::output::csv::offers_to_csv;
    use crate::types::SourceId;

    #[test]
    fn offer_rows_quote_commas() {
        let offers = vec![owned(
            offer("Marriott Austin, Downtown", "Marriott Hotels", 289.99, 255.19, 4.6),
            SourceId::Marriott,
        )];
        let csv = offers_to_csv(&offers).expect("csv");
        let mut lines = csv.lines();
        assert!(lines.next().is_some_and(|h| h.starts_with("owner,hotel_name")));
        let row = lines.next().expect("row");
        assert!(row.starts_with("marriott,\"Marriott Austin, Downtown\",Marriott Hotels,CODE,289.99,255.19"));
    }
}
