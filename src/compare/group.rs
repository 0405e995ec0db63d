use std::collections::BTreeMap;

use crate::types::{Offer, SourceId};

pub const OTHER_BUCKET: &str = "other";
pub const UNKNOWN_BRAND: &str = "Unknown";

/// One bucket per registered source (keyed by slug, present even when
/// empty) plus `other` for anything else, including untagged offers.
pub fn group_by_owner(offers: &[Offer], registered: &[SourceId]) -> BTreeMap<String, Vec<Offer>> {
    let mut grouped: BTreeMap<String, Vec<Offer>> = registered
        .iter()
        .map(|id| (id.as_slug().to_string(), Vec::new()))
        .collect();
    grouped.insert(OTHER_BUCKET.to_string(), Vec::new());

    for offer in offers {
        let bucket = match &offer.owner {
            Some(owner) if registered.contains(owner) => owner.as_slug(),
            _ => OTHER_BUCKET,
        };
        grouped
            .entry(bucket.to_string())
            .or_default()
            .push(offer.clone());
    }
    grouped
}

pub fn group_by_brand(offers: &[Offer]) -> BTreeMap<String, Vec<Offer>> {
    let mut grouped: BTreeMap<String, Vec<Offer>> = BTreeMap::new();
    for offer in offers {
        let brand = if offer.brand.is_empty() {
            UNKNOWN_BRAND
        } else {
            offer.brand.as_str()
        };
        grouped
            .entry(brand.to_string())
            .or_default()
            .push(offer.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use crate::compare::fixtures::{offer, owned};
    use crate::compare::group::{group_by_brand, group_by_owner};
    use crate::types::SourceId;

    #[test]
    fn every_offer_lands_in_exactly_one_owner_bucket() {
        let offers = vec![
            owned(offer("A", "Hampton Inn", 200.0, 170.0, 4.2), SourceId::Hilton),
            owned(offer("B", "Courtyard", 220.0, 190.0, 4.4), SourceId::Marriott),
            owned(offer("C", "Hilton Garden Inn", 180.0, 150.0, 4.1), SourceId::Hilton),
            owned(
                offer("D", "Hyatt Place", 150.0, 150.0, 4.0),
                SourceId::Custom("hyatt".to_string()),
            ),
            offer("E", "Independent", 90.0, 90.0, 3.9),
        ];
        let grouped = group_by_owner(&offers, &SourceId::BUILTIN);
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped["hilton"].len(), 2);
        assert_eq!(grouped["marriott"].len(), 1);
        assert_eq!(grouped["other"].len(), 2);
        let total: usize = grouped.values().map(Vec::len).sum();
        assert_eq!(total, offers.len());
    }

    #[test]
    fn empty_input_still_has_every_bucket() {
        let grouped = group_by_owner(&[], &SourceId::BUILTIN);
        assert_eq!(
            grouped.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["hilton", "marriott", "other"]
        );
    }

    #[test]
    fn unregistered_source_goes_to_other() {
        let offers = vec![owned(offer("A", "X", 100.0, 100.0, 4.0), SourceId::Marriott)];
        let grouped = group_by_owner(&offers, &[SourceId::Hilton]);
        assert!(grouped.get("marriott").is_none());
        assert_eq!(grouped["other"].len(), 1);
    }

    #[test]
    fn empty_brand_groups_as_unknown() {
        let offers = vec![
            offer("A", "Aloft Hotels", 100.0, 100.0, 4.0),
            offer("B", "", 100.0, 100.0, 4.0),
            offer("C", "Aloft Hotels", 100.0, 100.0, 4.0),
        ];
        let grouped = group_by_brand(&offers);
        assert_eq!(grouped["Aloft Hotels"].len(), 2);
        assert_eq!(grouped["Unknown"].len(), 1);
    }

    #[test]
    fn brand_strings_are_grouped_verbatim() {
        let offers = vec![
            offer("A", " ", 100.0, 100.0, 4.0),
            offer("B", "", 100.0, 100.0, 4.0),
            offer("C", "Aloft Hotels ", 100.0, 100.0, 4.0),
        ];
        let grouped = group_by_brand(&offers);
        assert_eq!(grouped[" "].len(), 1);
        assert_eq!(grouped["Unknown"].len(), 1);
        assert_eq!(grouped["Aloft Hotels "].len(), 1);
        assert!(grouped.get("Aloft Hotels").is_none());
    }
}
