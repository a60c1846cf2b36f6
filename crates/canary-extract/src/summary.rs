use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Cascade stage that produced a [`Summary`].
pub enum Provenance {
    SchemaValidated,
    FreeTextParsed,
    FreeTextHeuristic,
    Error,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaValidated => "schema_validated",
            Self::FreeTextParsed => "free_text_parsed",
            Self::FreeTextHeuristic => "free_text_heuristic",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Canonical extraction result for one ticket.
///
/// An empty `problem_summary` means the ticket is out of scope for the
/// support domain; it is not an error.
pub struct Summary {
    pub problem_summary: String,
    pub suggested_solution: String,
    #[serde(default)]
    pub action_items: Vec<String>,
    pub provenance: Provenance,
}

impl Summary {
    pub fn is_degraded(&self) -> bool {
        self.provenance != Provenance::SchemaValidated
    }

    pub fn is_error(&self) -> bool {
        self.provenance == Provenance::Error
    }
}

#[cfg(test)]
mod tests {
    use super::{Provenance, Summary};

    #[test]
    fn unit_provenance_serializes_as_snake_case_label() {
        for provenance in [
            Provenance::SchemaValidated,
            Provenance::FreeTextParsed,
            Provenance::FreeTextHeuristic,
            Provenance::Error,
        ] {
            let encoded = serde_json::to_value(provenance).expect("encode");
            assert_eq!(encoded, provenance.as_str());
        }
    }

    #[test]
    fn unit_only_schema_validated_is_not_degraded() {
        let summary = Summary {
            problem_summary: "VPN down".to_string(),
            suggested_solution: "Restart the tunnel".to_string(),
            action_items: Vec::new(),
            provenance: Provenance::SchemaValidated,
        };
        assert!(!summary.is_degraded());
        let parsed = Summary {
            provenance: Provenance::FreeTextParsed,
            ..summary
        };
        assert!(parsed.is_degraded());
        assert!(!parsed.is_error());
    }
}
