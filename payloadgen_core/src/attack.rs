use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttackTypeError {
    #[error("Unknown attack type '{0}', expected one of: sniper, pitchfork, clusterbomb")]
    UnknownAttackType(String),
}

/// How the named payload lists are combined into bindings.
///
/// The coordinator only forwards this choice to the configured
/// [`StreamProducer`](crate::stream::StreamProducer); the combination itself
/// happens on the producer side.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttackType {
    /// One variable varies at a time while the others stay fixed.
    #[default]
    Sniper,
    /// All variable lists advance in lockstep.
    PitchFork,
    /// Full cross-product of all variable lists.
    ClusterBomb,
}

impl AttackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackType::Sniper => "sniper",
            AttackType::PitchFork => "pitchfork",
            AttackType::ClusterBomb => "clusterbomb",
        }
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttackType {
    type Err = AttackTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sniper" => Ok(AttackType::Sniper),
            "pitchfork" => Ok(AttackType::PitchFork),
            "clusterbomb" => Ok(AttackType::ClusterBomb),
            _ => Err(AttackTypeError::UnknownAttackType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attack_type_parses_known_names_case_insensitively() {
        assert_eq!("sniper".parse::<AttackType>(), Ok(AttackType::Sniper));
        assert_eq!("PitchFork".parse::<AttackType>(), Ok(AttackType::PitchFork));
        assert_eq!(
            " CLUSTERBOMB ".parse::<AttackType>(),
            Ok(AttackType::ClusterBomb)
        );
    }

    #[test]
    fn attack_type_rejects_unknown_name() {
        match "battering-ram".parse::<AttackType>() {
            Err(AttackTypeError::UnknownAttackType(name)) => assert_eq!(name, "battering-ram"),
            Ok(t) => panic!("Expected unknown attack type error, got {:?}", t),
        }
    }

    #[test]
    fn attack_type_display_matches_parse_names() {
        for attack in [
            AttackType::Sniper,
            AttackType::PitchFork,
            AttackType::ClusterBomb,
        ] {
            let shown = attack.to_string();
            assert_eq!(
                shown.parse::<AttackType>(),
                Ok(attack),
                "Display output '{}' should parse back to {:?}",
                shown,
                attack
            );
        }
    }

    #[test]
    fn attack_type_defaults_to_sniper() {
        assert_eq!(AttackType::default(), AttackType::Sniper);
    }
}
