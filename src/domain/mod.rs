//! Domain Types - Jackpot Groups, Fixtures, Variants, Cycles
//!
//! Rows as they live in the hosted Postgres tables. Wire names are
//! snake_case so the same structs serialise straight into PostgREST bodies.

pub mod cycle;
pub mod group;

pub use cycle::*;
pub use group::*;

use serde::{Deserialize, Serialize};

/// One match result in 1/X/2 notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pick {
    #[serde(rename = "1")]
    Home,
    #[serde(rename = "X")]
    Draw,
    #[serde(rename = "2")]
    Away,
}

impl Pick {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pick::Home => "1",
            Pick::Draw => "X",
            Pick::Away => "2",
        }
    }

    /// Lenient parse for admin-pasted data ("x" and surrounding spaces are fine)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1" => Some(Pick::Home),
            "X" | "x" => Some(Pick::Draw),
            "2" => Some(Pick::Away),
            _ => None,
        }
    }
}

impl std::fmt::Display for Pick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_wire_format() {
        assert_eq!(serde_json::to_string(&Pick::Draw).unwrap(), "\"X\"");
        let parsed: Pick = serde_json::from_str("\"2\"").unwrap();
        assert_eq!(parsed, Pick::Away);
    }

    #[test]
    fn test_pick_parse_is_lenient() {
        assert_eq!(Pick::parse(" x "), Some(Pick::Draw));
        assert_eq!(Pick::parse("1"), Some(Pick::Home));
        assert_eq!(Pick::parse("3"), None);
    }
}
