use crate::adherence::AdherenceError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AdherenceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(AdherenceError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

// Declaration order is severity order: High sorts before Low.
str_enum!(RiskLevel {
    High => "high",
    Moderate => "moderate",
    Low => "low",
});

str_enum!(GapSeverity {
    Minor => "minor",
    Moderate => "moderate",
    Severe => "severe",
});

str_enum!(DefectKind {
    EmptyDrugName => "empty_drug_name",
    NonPositiveSupply => "non_positive_supply",
    UnparsableDate => "unparsable_date",
    FutureDated => "future_dated",
});

str_enum!(FlagOrder {
    FirstAppearance => "first_appearance",
    DrugName => "drug_name",
    AdherenceScore => "adherence_score",
    RiskLevel => "risk_level",
    DrugClass => "drug_class",
    LastFillDate => "last_fill_date",
});

// Written out because `str_enum!` owns the derive list.
impl Default for FlagOrder {
    fn default() -> Self {
        Self::FirstAppearance
    }
}
