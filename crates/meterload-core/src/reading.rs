//! Raw readings and the quantities they carry

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three metered power quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantity {
    Active,
    Inductive,
    Capacitive,
}

impl Quantity {
    pub const ALL: [Quantity; 3] = [Quantity::Active, Quantity::Inductive, Quantity::Capacitive];

    pub fn name(&self) -> &'static str {
        match self {
            Quantity::Active => "active",
            Quantity::Inductive => "inductive",
            Quantity::Capacitive => "capacitive",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Quantity::Active),
            "inductive" => Ok(Quantity::Inductive),
            "capacitive" => Ok(Quantity::Capacitive),
            other => Err(format!(
                "unknown quantity '{other}', expected active, inductive or capacitive"
            )),
        }
    }
}

/// A single timestamped reading extracted from one grid row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub timestamp: NaiveDateTime,
    pub active: f64,
    pub inductive: f64,
    pub capacitive: f64,
}

impl RawReading {
    pub fn get(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::Active => self.active,
            Quantity::Inductive => self.inductive,
            Quantity::Capacitive => self.capacitive,
        }
    }
}
