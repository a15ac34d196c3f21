//! Crop types and seasonal crop-stage calendars
//!
//! Crop stage is derived from the crop and the calendar month. The windows
//! are configuration data: the default table follows the Indian Kharif
//! (monsoon), Rabi (winter) and annual calendars, and deployments can load
//! their own table for other regions.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Crops the analyzer knows calendars for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CropType {
    Rice,
    Wheat,
    Maize,
    Cotton,
    Sugarcane,
    Soybean,
    Mustard,
    Chickpea,
    Groundnut,
}

impl CropType {
    pub const ALL: [CropType; 9] = [
        CropType::Rice,
        CropType::Wheat,
        CropType::Maize,
        CropType::Cotton,
        CropType::Sugarcane,
        CropType::Soybean,
        CropType::Mustard,
        CropType::Chickpea,
        CropType::Groundnut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CropType::Rice => "rice",
            CropType::Wheat => "wheat",
            CropType::Maize => "maize",
            CropType::Cotton => "cotton",
            CropType::Sugarcane => "sugarcane",
            CropType::Soybean => "soybean",
            CropType::Mustard => "mustard",
            CropType::Chickpea => "chickpea",
            CropType::Groundnut => "groundnut",
        }
    }
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CropType::Rice => write!(f, "Rice"),
            CropType::Wheat => write!(f, "Wheat"),
            CropType::Maize => write!(f, "Maize"),
            CropType::Cotton => write!(f, "Cotton"),
            CropType::Sugarcane => write!(f, "Sugarcane"),
            CropType::Soybean => write!(f, "Soybean"),
            CropType::Mustard => write!(f, "Mustard"),
            CropType::Chickpea => write!(f, "Chickpea"),
            CropType::Groundnut => write!(f, "Groundnut"),
        }
    }
}

impl FromStr for CropType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CropType::ALL
            .into_iter()
            .find(|crop| crop.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown crop type: {}", s))
    }
}

/// Growth phase of a crop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CropStage {
    /// Bare or freshly prepared soil before sowing
    PreSowing,
    Vegetative,
    Reproductive,
    Maturity,
}

impl CropStage {
    /// Whether the field is expected to show bare soil
    pub fn is_bare_soil(&self) -> bool {
        matches!(self, CropStage::PreSowing)
    }
}

impl fmt::Display for CropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CropStage::PreSowing => write!(f, "Pre-sowing"),
            CropStage::Vegetative => write!(f, "Vegetative"),
            CropStage::Reproductive => write!(f, "Reproductive"),
            CropStage::Maturity => write!(f, "Maturity"),
        }
    }
}

/// Cropping season a window belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    /// Monsoon season, sown June–July
    Kharif,
    /// Winter season, sown October–December
    Rabi,
    /// Summer season between Rabi harvest and monsoon
    Zaid,
    /// Year-round crops such as sugarcane
    Annual,
}

/// Inclusive range of calendar months (1–12); wraps past December when `start > end`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthRange {
    pub start: u32,
    pub end: u32,
}

impl MonthRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, month: u32) -> bool {
        if self.start <= self.end {
            (self.start..=self.end).contains(&month)
        } else {
            month >= self.start || month <= self.end
        }
    }

    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.start) && (1..=12).contains(&self.end)
    }
}

/// One row of a crop calendar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonalWindow {
    pub crop: CropType,
    pub season: Season,
    pub months: MonthRange,
    pub stage: CropStage,
}

/// Lookup table from `(crop, month)` to crop stage
///
/// The first window matching the crop and month wins. Months outside every
/// window for a crop resolve to [`CropStage::PreSowing`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CropCalendar {
    pub windows: Vec<SeasonalWindow>,
}

impl CropCalendar {
    pub fn new(windows: Vec<SeasonalWindow>) -> Result<Self, &'static str> {
        if windows.iter().any(|w| !w.months.is_valid()) {
            return Err("Crop calendar months must be between 1 and 12");
        }
        Ok(Self { windows })
    }

    /// Stage of `crop` on `date`
    pub fn stage_for(&self, crop: CropType, date: NaiveDate) -> CropStage {
        self.window_for(crop, date)
            .map(|w| w.stage)
            .unwrap_or(CropStage::PreSowing)
    }

    /// Matching window, if any
    pub fn window_for(&self, crop: CropType, date: NaiveDate) -> Option<&SeasonalWindow> {
        let month = date.month();
        self.windows
            .iter()
            .find(|w| w.crop == crop && w.months.contains(month))
    }

    /// Kharif/Rabi calendars for the major Indian field crops
    pub fn indian_default() -> Self {
        use CropStage::*;
        use CropType::*;
        use Season::*;

        let rows: [(CropType, Season, u32, u32, CropStage); 26] = [
            (Rice, Kharif, 6, 8, Vegetative),
            (Rice, Kharif, 9, 10, Reproductive),
            (Rice, Kharif, 11, 11, Maturity),
            (Maize, Kharif, 6, 7, Vegetative),
            (Maize, Kharif, 8, 9, Reproductive),
            (Maize, Kharif, 10, 10, Maturity),
            (Cotton, Kharif, 5, 7, Vegetative),
            (Cotton, Kharif, 8, 10, Reproductive),
            (Cotton, Kharif, 11, 12, Maturity),
            (Soybean, Kharif, 6, 7, Vegetative),
            (Soybean, Kharif, 8, 9, Reproductive),
            (Soybean, Kharif, 10, 10, Maturity),
            (Groundnut, Kharif, 6, 7, Vegetative),
            (Groundnut, Kharif, 8, 9, Reproductive),
            (Groundnut, Kharif, 10, 10, Maturity),
            (Wheat, Rabi, 11, 12, Vegetative),
            (Wheat, Rabi, 1, 2, Reproductive),
            (Wheat, Rabi, 3, 4, Maturity),
            (Mustard, Rabi, 10, 11, Vegetative),
            (Mustard, Rabi, 12, 1, Reproductive),
            (Mustard, Rabi, 2, 3, Maturity),
            (Chickpea, Rabi, 10, 12, Vegetative),
            (Chickpea, Rabi, 1, 2, Reproductive),
            (Chickpea, Rabi, 3, 3, Maturity),
            (Sugarcane, Annual, 2, 10, Vegetative),
            (Sugarcane, Annual, 11, 1, Maturity),
        ];

        Self {
            windows: rows
                .into_iter()
                .map(|(crop, season, start, end, stage)| SeasonalWindow {
                    crop,
                    season,
                    months: MonthRange::new(start, end),
                    stage,
                })
                .collect(),
        }
    }
}

impl Default for CropCalendar {
    fn default() -> Self {
        Self::indian_default()
    }
}
