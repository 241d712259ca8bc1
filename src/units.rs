use crate::schema::{ActivityCategory, ActivityRecord};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Volume,
    Mass,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Millilitre,
    Centilitre,
    Decilitre,
    Litre,
    CubicMetre,
    Gallon,
    Milligram,
    Gram,
    Kilogram,
    Tonne,
    Pound,
    Ounce,
    Second,
    Minute,
    Hour,
    Day,
}

impl Unit {
    pub fn parse(raw: &str) -> Option<Unit> {
        let cleaned = raw.trim().trim_end_matches('.').to_lowercase();

        let unit = match cleaned.as_str() {
            "ml" | "mililitro" | "mililitros" | "millilitre" | "millilitres" | "milliliter"
            | "milliliters" | "cc" => Unit::Millilitre,
            "cl" | "centilitro" | "centilitros" => Unit::Centilitre,
            "dl" | "decilitro" | "decilitros" => Unit::Decilitre,
            "l" | "lt" | "lts" | "litro" | "litros" | "litre" | "litres" | "liter" | "liters" => {
                Unit::Litre
            }
            "m3" | "m³" | "metro cubico" | "metros cubicos" => Unit::CubicMetre,
            "gal" | "galon" | "galones" | "gallon" | "gallons" => Unit::Gallon,
            "mg" | "miligramo" | "miligramos" => Unit::Milligram,
            "g" | "gr" | "grs" | "gramo" | "gramos" | "gram" | "grams" => Unit::Gram,
            "kg" | "kgs" | "kilo" | "kilos" | "kilogramo" | "kilogramos" | "kilogram"
            | "kilograms" => Unit::Kilogram,
            "t" | "tonelada" | "toneladas" | "tonne" | "tonnes" => Unit::Tonne,
            "lb" | "lbs" | "libra" | "libras" | "pound" | "pounds" => Unit::Pound,
            "oz" | "onza" | "onzas" | "ounce" | "ounces" => Unit::Ounce,
            "s" | "seg" | "segs" | "segundo" | "segundos" | "sec" | "second" | "seconds" => {
                Unit::Second
            }
            "min" | "mins" | "minuto" | "minutos" | "minute" | "minutes" => Unit::Minute,
            "h" | "hr" | "hrs" | "hora" | "horas" | "hour" | "hours" => Unit::Hour,
            "d" | "dia" | "día" | "dias" | "días" | "day" | "days" => Unit::Day,
            _ => return None,
        };

        Some(unit)
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Unit::Millilitre
            | Unit::Centilitre
            | Unit::Decilitre
            | Unit::Litre
            | Unit::CubicMetre
            | Unit::Gallon => Dimension::Volume,
            Unit::Milligram
            | Unit::Gram
            | Unit::Kilogram
            | Unit::Tonne
            | Unit::Pound
            | Unit::Ounce => Dimension::Mass,
            Unit::Second | Unit::Minute | Unit::Hour | Unit::Day => Dimension::Duration,
        }
    }

    /// Multiplier that takes a value in this unit to its dimension's base unit.
    pub fn factor_to_base(&self) -> f64 {
        match self {
            Unit::Millilitre => 1.0,
            Unit::Centilitre => 10.0,
            Unit::Decilitre => 100.0,
            Unit::Litre => 1_000.0,
            Unit::CubicMetre => 1_000_000.0,
            Unit::Gallon => 3_785.411_784,
            Unit::Milligram => 0.000_001,
            Unit::Gram => 0.001,
            Unit::Kilogram => 1.0,
            Unit::Tonne => 1_000.0,
            Unit::Pound => 0.453_592_37,
            Unit::Ounce => 0.028_349_523_125,
            Unit::Second => 1.0 / 60.0,
            Unit::Minute => 1.0,
            Unit::Hour => 60.0,
            Unit::Day => 1_440.0,
        }
    }
}

/// Converts `quantity` expressed in `unit` to the base unit of its dimension.
///
/// A missing quantity counts as zero. An unknown unit leaves the value as is.
pub fn normalize(quantity: Option<f64>, unit: &str) -> f64 {
    let value = match quantity {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(v) => {
            warn!("Ignoring invalid quantity {} ({}), counting it as 0", v, unit);
            return 0.0;
        }
        None => return 0.0,
    };

    match Unit::parse(unit) {
        Some(parsed) => value * parsed.factor_to_base(),
        None => value,
    }
}

impl ActivityRecord {
    /// The record's contribution to its category metric, in base units.
    ///
    /// Pest and general records count as one incident each.
    pub fn normalized_value(&self) -> f64 {
        let details = &self.details;
        match self.category {
            ActivityCategory::Irrigation
            | ActivityCategory::Fertilization
            | ActivityCategory::Planting
            | ActivityCategory::Harvest => {
                normalize(details.quantity, details.unit.as_deref().unwrap_or(""))
            }
            ActivityCategory::Maintenance => normalize(
                details.duration,
                details.duration_unit.as_deref().unwrap_or("min"),
            ),
            ActivityCategory::Pest | ActivityCategory::General => 1.0,
        }
    }
}
