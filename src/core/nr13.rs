//! NR-13 regulatory tables
//!
//! Classification of pressure vessels into categories I..V from the fluid
//! class and the potential group (P·V), and the maximum intervals between
//! periodic inspections for each category.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::entities::inspection::InspectionKind;

/// Fluid class as defined by NR-13 (A is the most hazardous)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FluidClass {
    /// Flammable, toxic (limit ≤ 20 ppm), hydrogen, acetylene
    A,
    /// Combustible below 200 °C, toxic (limit > 20 ppm)
    B,
    /// Steam, asphyxiating gases, compressed air
    C,
    /// Other fluids (e.g. water)
    D,
}

impl std::fmt::Display for FluidClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FluidClass::A => write!(f, "A"),
            FluidClass::B => write!(f, "B"),
            FluidClass::C => write!(f, "C"),
            FluidClass::D => write!(f, "D"),
        }
    }
}

impl std::str::FromStr for FluidClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(FluidClass::A),
            "B" => Ok(FluidClass::B),
            "C" => Ok(FluidClass::C),
            "D" => Ok(FluidClass::D),
            _ => Err(format!("Invalid fluid class: {}. Use A, B, C or D", s)),
        }
    }
}

/// Potential group derived from the product P·V (MPa·m³)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PotentialGroup(u8);

impl PotentialGroup {
    /// Classify a vessel by its pressure (MPa) and volume (m³)
    pub fn from_pressure_volume(pressure_mpa: f64, volume_m3: f64) -> Self {
        let pv = pressure_mpa * volume_m3;
        let group = if pv >= 100.0 {
            1
        } else if pv >= 30.0 {
            2
        } else if pv >= 2.5 {
            3
        } else if pv >= 1.0 {
            4
        } else {
            5
        };
        PotentialGroup(group)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for PotentialGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// NR-13 vessel category (I is the most critical)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    I,
    II,
    III,
    IV,
    V,
}

/// Rows are fluid classes A..D, columns are potential groups 1..5
const CATEGORY_TABLE: [[Category; 5]; 4] = {
    use Category::*;
    [
        [I, I, II, III, III],
        [I, II, III, IV, IV],
        [I, II, III, IV, V],
        [II, III, IV, V, V],
    ]
};

impl Category {
    /// Look up the category in the NR-13 classification table
    pub fn from_class_and_group(class: FluidClass, group: PotentialGroup) -> Self {
        let row = match class {
            FluidClass::A => 0,
            FluidClass::B => 1,
            FluidClass::C => 2,
            FluidClass::D => 3,
        };
        let col = (group.value().clamp(1, 5) - 1) as usize;
        CATEGORY_TABLE[row][col]
    }

    /// Classify directly from fluid class, pressure (MPa) and volume (m³)
    pub fn classify(class: FluidClass, pressure_mpa: f64, volume_m3: f64) -> Self {
        Self::from_class_and_group(
            class,
            PotentialGroup::from_pressure_volume(pressure_mpa, volume_m3),
        )
    }

    /// Maximum interval between external examinations, in years
    pub fn external_interval_years(&self) -> u32 {
        match self {
            Category::I => 1,
            Category::II => 2,
            Category::III => 3,
            Category::IV => 4,
            Category::V => 5,
        }
    }

    /// Maximum interval between internal examinations, in years
    pub fn internal_interval_years(&self) -> u32 {
        match self {
            Category::I => 3,
            Category::II => 4,
            Category::III => 6,
            Category::IV => 8,
            Category::V => 10,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::I => write!(f, "I"),
            Category::II => write!(f, "II"),
            Category::III => write!(f, "III"),
            Category::IV => write!(f, "IV"),
            Category::V => write!(f, "V"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "I" | "1" => Ok(Category::I),
            "II" | "2" => Ok(Category::II),
            "III" | "3" => Ok(Category::III),
            "IV" | "4" => Ok(Category::IV),
            "V" | "5" => Ok(Category::V),
            _ => Err(format!("Invalid NR-13 category: {}. Use I, II, III, IV or V", s)),
        }
    }
}

/// Default date of the next inspection after one of the given kind
///
/// Uses the NR-13 interval for the category when known, otherwise the
/// equipment's own maintenance frequency (days).
pub fn default_next_inspection(
    category: Option<Category>,
    frequency_days: Option<i64>,
    kind: InspectionKind,
    date: NaiveDate,
) -> Option<NaiveDate> {
    match category {
        Some(cat) => {
            let years = match kind {
                InspectionKind::Inicial
                | InspectionKind::PeriodicaExterna
                | InspectionKind::Extraordinaria => cat.external_interval_years(),
                InspectionKind::PeriodicaInterna | InspectionKind::TesteHidrostatico => {
                    cat.internal_interval_years()
                }
            };
            date.checked_add_months(Months::new(years * 12))
        }
        None => frequency_days
            .filter(|d| *d > 0)
            .and_then(|d| crate::core::maintenance::add_days(date, d)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_potential_group_boundaries() {
        assert_eq!(PotentialGroup::from_pressure_volume(10.0, 10.0).value(), 1);
        assert_eq!(PotentialGroup::from_pressure_volume(10.0, 9.99).value(), 2);
        assert_eq!(PotentialGroup::from_pressure_volume(3.0, 10.0).value(), 2);
        assert_eq!(PotentialGroup::from_pressure_volume(2.5, 1.0).value(), 3);
        assert_eq!(PotentialGroup::from_pressure_volume(1.0, 1.0).value(), 4);
        assert_eq!(PotentialGroup::from_pressure_volume(0.5, 1.0).value(), 5);
    }

    #[test]
    fn test_category_table() {
        let g = |n| PotentialGroup(n);
        assert_eq!(Category::from_class_and_group(FluidClass::A, g(1)), Category::I);
        assert_eq!(Category::from_class_and_group(FluidClass::A, g(5)), Category::III);
        assert_eq!(Category::from_class_and_group(FluidClass::B, g(4)), Category::IV);
        assert_eq!(Category::from_class_and_group(FluidClass::C, g(5)), Category::V);
        assert_eq!(Category::from_class_and_group(FluidClass::D, g(1)), Category::II);
        assert_eq!(Category::from_class_and_group(FluidClass::D, g(3)), Category::IV);
    }

    #[test]
    fn test_classify_compressed_air_receiver() {
        // 0.8 MPa x 2 m³ = 1.6 -> group 4, class C -> IV
        assert_eq!(Category::classify(FluidClass::C, 0.8, 2.0), Category::IV);
    }

    #[test]
    fn test_category_parse_and_display() {
        assert_eq!("iii".parse::<Category>().unwrap(), Category::III);
        assert_eq!("4".parse::<Category>().unwrap(), Category::IV);
        assert_eq!(Category::V.to_string(), "V");
        assert!("VI".parse::<Category>().is_err());
    }

    #[test]
    fn test_default_next_inspection_uses_category_interval() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let next = default_next_inspection(
            Some(Category::II),
            None,
            InspectionKind::PeriodicaExterna,
            date,
        );
        assert_eq!(next, NaiveDate::from_ymd_opt(2026, 3, 15));

        let next = default_next_inspection(
            Some(Category::II),
            None,
            InspectionKind::PeriodicaInterna,
            date,
        );
        assert_eq!(next, NaiveDate::from_ymd_opt(2028, 3, 15));
    }

    #[test]
    fn test_default_next_inspection_falls_back_to_frequency() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let next = default_next_inspection(None, Some(90), InspectionKind::Inicial, date);
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 3, 31));
        assert_eq!(
            default_next_inspection(None, None, InspectionKind::Inicial, date),
            None
        );
    }
}
