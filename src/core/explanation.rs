use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorExplanation {
    pub what: String,
    pub why: String,
    pub cause: String,
    pub recommendation: String,
}

struct Entry {
    keys: &'static [&'static str],
    what: &'static str,
    why: &'static str,
    cause: &'static str,
    recommendation: &'static str,
}

const TABLE: &[Entry] = &[
    Entry {
        keys: &["torn", "tear", "ripped"],
        what: "The outer packaging is torn or ripped open.",
        why: "A breach in the packaging exposes the contents to dust, moisture and loss.",
        cause: "Snagging on conveyor edges, sharp objects in the load or rough manual handling.",
        recommendation: "Reject the delivery, photograph the tear and open a damage claim before repacking.",
    },
    Entry {
        keys: &["wet", "water", "waterdamage", "moisture"],
        what: "The package shows signs of water or liquid exposure.",
        why: "Moisture weakens cardboard and can damage electronics, paper and textiles inside.",
        cause: "Rain exposure during loading, leaking neighbouring parcels or condensation in transit.",
        recommendation: "Reject the delivery and quarantine the package until the contents are checked for water damage.",
    },
    Entry {
        keys: &["crushed", "crushedcorner", "crush", "crushedbox"],
        what: "The box is crushed or a corner has collapsed.",
        why: "Structural collapse means the contents absorbed a load the packaging was meant to carry.",
        cause: "Heavy items stacked on top, drops on a corner or overloaded pallets.",
        recommendation: "Reject the delivery and inspect the contents for impact damage before accepting.",
    },
    Entry {
        keys: &["dent", "dented"],
        what: "The package surface is dented.",
        why: "A dent indicates an impact that may have transferred to fragile contents.",
        cause: "Impact against another parcel, a vehicle wall or handling equipment.",
        recommendation: "Check the contents for fragile items; accept only if the inner packaging is intact.",
    },
    Entry {
        keys: &["scratch", "scratched", "scuff", "abrasion"],
        what: "The package surface is scratched or scuffed.",
        why: "Surface marks are usually cosmetic but can hide labels or barcodes.",
        cause: "Friction against rough surfaces or other parcels during sorting.",
        recommendation: "Verify the label and barcode are readable; the package can normally be delivered.",
    },
    Entry {
        keys: &["hole", "puncture", "punctured", "pierced"],
        what: "The packaging has been punctured.",
        why: "A puncture can reach the contents and allows small items to fall out.",
        cause: "Forklift tines, protruding fasteners or sharp items in the same load.",
        recommendation: "Reject the delivery and check the contents through the puncture site.",
    },
    Entry {
        keys: &["opened", "tampered", "brokenseal", "openseal"],
        what: "The seal is broken or the package appears opened.",
        why: "An opened package may have been tampered with or have missing contents.",
        cause: "Failed tape adhesion, rough handling or deliberate tampering.",
        recommendation: "Reject the delivery, weigh the package against the manifest and escalate for a security review.",
    },
];

const FALLBACK_WHAT: &str = "Not specified";
const FALLBACK_WHY: &str = "The detected damage does not match a known damage category.";
const FALLBACK_CAUSE: &str = "Not specified";
const FALLBACK_RECOMMENDATION: &str =
    "Route the package to manual inspection before deciding on delivery.";

/// Lowercases and drops everything that is not alphanumeric.
pub fn normalize_class(class_name: &str) -> String {
    class_name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn explain(class_name: &str) -> OperatorExplanation {
    let key = normalize_class(class_name);
    TABLE
        .iter()
        .find(|entry| entry.keys.contains(&key.as_str()))
        .map(|entry| OperatorExplanation {
            what: entry.what.to_string(),
            why: entry.why.to_string(),
            cause: entry.cause.to_string(),
            recommendation: entry.recommendation.to_string(),
        })
        .unwrap_or_else(OperatorExplanation::fallback)
}

impl OperatorExplanation {
    pub fn fallback() -> Self {
        Self {
            what: FALLBACK_WHAT.to_string(),
            why: FALLBACK_WHY.to_string(),
            cause: FALLBACK_CAUSE.to_string(),
            recommendation: FALLBACK_RECOMMENDATION.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.what == FALLBACK_WHAT
    }
}

/// Every class name the table knows about, one per entry.
pub fn known_classes() -> Vec<&'static str> {
    TABLE.iter().map(|entry| entry.keys[0]).collect()
}
