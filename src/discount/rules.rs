use crate::discount::DiscountRule;

struct RuleSpec {
    code: &'static str,
    fraction: f64,
    label: &'static str,
    brands: &'static [&'static str],
}

const HILTON_RULES: &[RuleSpec] = &[
    RuleSpec { code: "0001398", fraction: 0.15, label: "GE", brands: &[] },
    RuleSpec { code: "0322831100", fraction: 0.12, label: "Pfizer", brands: &[] },
    RuleSpec { code: "323009803", fraction: 0.10, label: "Siemens", brands: &[] },
    RuleSpec { code: "0901452", fraction: 0.18, label: "IBM", brands: &[] },
    RuleSpec { code: "001368083", fraction: 0.18, label: "IBM (alternate)", brands: &[] },
    RuleSpec { code: "n0901452", fraction: 0.18, label: "IBM (prefixed)", brands: &[] },
    RuleSpec { code: "009122532", fraction: 0.14, label: "HP", brands: &[] },
    RuleSpec { code: "355019365", fraction: 0.13, label: "Volvo", brands: &[] },
    RuleSpec { code: "0560041604", fraction: 0.20, label: "MVP", brands: &[] },
    RuleSpec { code: "N0001231", fraction: 0.10, label: "FedEx", brands: &[] },
    RuleSpec {
        code: "N9880578",
        fraction: 0.22,
        label: "Blackstone",
        brands: &[
            "Hilton Hotels & Resorts",
            "Conrad Hotels & Resorts",
            "Waldorf Astoria Hotels & Resorts",
            "Hilton Garden Inn",
        ],
    },
    RuleSpec {
        code: "0560054725",
        fraction: 0.18,
        label: "Blackstone Homewood",
        brands: &["Homewood Suites by Hilton"],
    },
    RuleSpec {
        code: "D332376164",
        fraction: 0.16,
        label: "Blackstone DoubleTree",
        brands: &["DoubleTree by Hilton", "Hilton Hotels & Resorts"],
    },
];

// Blackstone codes are not honored by Marriott.
const MARRIOTT_RULES: &[RuleSpec] = &[
    RuleSpec { code: "0001398", fraction: 0.12, label: "GE", brands: &[] },
    RuleSpec { code: "0322831100", fraction: 0.14, label: "Pfizer", brands: &[] },
    RuleSpec { code: "323009803", fraction: 0.11, label: "Siemens", brands: &[] },
    RuleSpec { code: "402371223", fraction: 0.13, label: "Akzo Nobel", brands: &[] },
    RuleSpec { code: "0901452", fraction: 0.16, label: "IBM", brands: &[] },
    RuleSpec { code: "001368083", fraction: 0.16, label: "IBM (alternate)", brands: &[] },
    RuleSpec { code: "n0901452", fraction: 0.16, label: "IBM (prefixed)", brands: &[] },
    RuleSpec { code: "009122532", fraction: 0.12, label: "HP", brands: &[] },
    RuleSpec { code: "355019365", fraction: 0.15, label: "Volvo", brands: &[] },
    RuleSpec { code: "N0001231", fraction: 0.10, label: "FedEx", brands: &[] },
];

pub fn hilton_rules() -> Vec<DiscountRule> {
    build(HILTON_RULES)
}

pub fn marriott_rules() -> Vec<DiscountRule> {
    build(MARRIOTT_RULES)
}

fn build(specs: &[RuleSpec]) -> Vec<DiscountRule> {
    specs
        .iter()
        .map(|spec| DiscountRule {
            code: spec.code.to_string(),
            fraction: spec.fraction,
            brands: if spec.brands.is_empty() {
                None
            } else {
                Some(spec.brands.iter().map(|b| b.to_string()).collect())
            },
            label: Some(spec.label.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::discount::rules::{hilton_rules, marriott_rules};
    use crate::discount::DiscountRule;

    #[test]
    fn builtin_rules_pass_validation() {
        for rule in hilton_rules().into_iter().chain(marriott_rules()) {
            DiscountRule::new(rule.code.clone(), rule.fraction)
                .unwrap_or_else(|e| panic!("invalid builtin rule {}: {e}", rule.code));
        }
    }

    #[test]
    fn only_blackstone_codes_are_brand_restricted() {
        let restricted = hilton_rules()
            .into_iter()
            .filter(|r| r.brands.is_some())
            .map(|r| r.code)
            .collect::<Vec<_>>();
        assert_eq!(restricted, vec!["N9880578", "0560054725", "D332376164"]);
        assert!(marriott_rules().iter().all(|r| r.brands.is_none()));
    }
}
