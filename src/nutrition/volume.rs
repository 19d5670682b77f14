//! Volume and fill estimation for beverages
//!
//! Explicit numeric mentions always win. Otherwise a container prior gives a
//! capacity and the reported fill level is snapped to a coarse band.

use serde::{Deserialize, Serialize};

use super::converter::parse_quantity;
use super::keywords::{contains_phrase, tokenize};
use super::units::QuantityKind;

/// Millilitres in one nominal cup of coffee
pub const ML_PER_COFFEE_CUP: f64 = 240.0;
/// Fill fractions at or below this snap to empty
pub const EMPTY_FILL_MAX: f64 = 0.05;
/// Fill fractions at or above this snap to full
pub const FULL_FILL_MIN: f64 = 0.91;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BeverageKind {
    Water,
    Coffee,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Demitasse,
    SmallMug,
    LargeMug,
    TakeoutCup,
    Bowl,
}

impl ContainerKind {
    /// Typical capacity range in ml
    pub fn capacity_range(&self) -> (f64, f64) {
        match self {
            ContainerKind::Demitasse => (60.0, 90.0),
            ContainerKind::SmallMug => (200.0, 250.0),
            ContainerKind::LargeMug => (300.0, 400.0),
            ContainerKind::TakeoutCup => (350.0, 500.0),
            ContainerKind::Bowl => (350.0, 600.0),
        }
    }

    pub fn typical_capacity_ml(&self) -> f64 {
        let (low, high) = self.capacity_range();
        (low + high) / 2.0
    }

    /// Recognize a container from a free-text description
    pub fn from_description(text: &str) -> Option<Self> {
        let tokens = tokenize(text);
        let any = |phrases: &[&str]| phrases.iter().any(|p| contains_phrase(&tokens, p));

        if any(&["demitasse", "espresso cup", "espresso glass"]) {
            Some(ContainerKind::Demitasse)
        } else if any(&["takeout", "takeaway", "take away", "to go", "paper cup", "disposable cup"]) {
            Some(ContainerKind::TakeoutCup)
        } else if any(&["large mug", "big mug", "tall mug"]) {
            Some(ContainerKind::LargeMug)
        } else if any(&["mug", "small mug"]) {
            Some(ContainerKind::SmallMug)
        } else if any(&["bowl"]) {
            Some(ContainerKind::Bowl)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillBand {
    Empty,
    Partial,
    Full,
}

/// A snapped fill level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillLevel {
    pub band: FillBand,
    pub fraction: f64,
}

/// Snap a raw fill fraction: empty <= 5%, full >= 91%, otherwise nearest 10%
pub fn snap_fill(fraction: f64) -> FillLevel {
    let f = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 1.0 };
    if f <= EMPTY_FILL_MAX {
        FillLevel { band: FillBand::Empty, fraction: 0.0 }
    } else if f >= FULL_FILL_MIN {
        FillLevel { band: FillBand::Full, fraction: 1.0 }
    } else {
        let snapped = ((f * 10.0).round() / 10.0).clamp(0.1, 0.9);
        FillLevel { band: FillBand::Partial, fraction: snapped }
    }
}

/// Cups of coffee for a volume, to one decimal
pub fn coffee_cups(present_ml: f64) -> f64 {
    (present_ml / ML_PER_COFFEE_CUP * 10.0).round() / 10.0
}

/// What a recognition pass told us about a drink
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeverageCues {
    pub kind: BeverageKind,
    pub description: Option<String>,
    pub container: Option<String>,
    pub capacity_ml: Option<f64>,
    /// 0..=100, or a 0..=1 ratio
    pub fill_percent: Option<f64>,
    pub explicit_volume_ml: Option<f64>,
    pub explicit_cups: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSource {
    Explicit,
    ContainerPrior,
    Unknown,
}

/// Present-volume estimate for a beverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeEstimate {
    pub kind: BeverageKind,
    pub container: Option<ContainerKind>,
    pub capacity_ml: Option<f64>,
    pub fill: Option<FillLevel>,
    pub present_ml: Option<f64>,
    pub cups: Option<f64>,
    pub source: VolumeSource,
}

/// "2 cups" style count in free text
pub fn explicit_cup_count(text: &str) -> Option<f64> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.windows(2).find_map(|pair| {
        let unit = pair[1].trim_matches(|c: char| !c.is_alphabetic()).to_lowercase();
        if unit == "cup" || unit == "cups" {
            pair[0].replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
        } else {
            None
        }
    })
}

/// A metric or fl-oz volume mentioned in free text; cup counts are not volumes here
pub fn explicit_volume_ml(text: &str) -> Option<f64> {
    let without_cups: Vec<&str> = text
        .split_whitespace()
        .filter(|w| {
            let word = w.trim_matches(|c: char| !c.is_alphabetic()).to_lowercase();
            word != "cup" && word != "cups"
        })
        .collect();
    parse_quantity(&without_cups.join(" "))
        .filter(|q| q.kind == QuantityKind::Volume)
        .map(|q| q.value)
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Fill reading as a fraction; values up to 1.0 are already ratios
fn fill_fraction(fill: Option<f64>) -> Option<f64> {
    positive(fill).map(|f| if f <= 1.0 { f } else { f / 100.0 })
}

/// Estimate present volume and, for coffee, the cup count
pub fn estimate_volume(cues: &BeverageCues) -> VolumeEstimate {
    let description = cues.description.as_deref().unwrap_or("");
    let container = cues
        .container
        .as_deref()
        .and_then(ContainerKind::from_description)
        .or_else(|| ContainerKind::from_description(description));
    let capacity_ml = positive(cues.capacity_ml).or_else(|| container.map(|c| c.typical_capacity_ml()));

    let explicit_ml = positive(cues.explicit_volume_ml).or_else(|| explicit_volume_ml(description));
    let explicit_cups = positive(cues.explicit_cups).or_else(|| explicit_cup_count(description));

    let stated_ml = explicit_ml.or_else(|| explicit_cups.map(|cups| cups * ML_PER_COFFEE_CUP));

    let (present_ml, fill, source) = if let Some(ml) = stated_ml {
        let fill = capacity_ml
            .filter(|cap| *cap > 0.0)
            .map(|cap| snap_fill(ml / cap));
        (Some(ml), fill, VolumeSource::Explicit)
    } else if let Some(capacity) = capacity_ml {
        // no fill reading means the drink is assumed as served
        let fraction = fill_fraction(cues.fill_percent).unwrap_or(1.0);
        let fill = snap_fill(fraction);
        (Some(capacity * fill.fraction), Some(fill), VolumeSource::ContainerPrior)
    } else {
        (None, None, VolumeSource::Unknown)
    };

    let cups = match cues.kind {
        BeverageKind::Coffee => explicit_cups.or_else(|| present_ml.map(coffee_cups)),
        _ => None,
    };

    VolumeEstimate {
        kind: cues.kind,
        container,
        capacity_ml,
        fill,
        present_ml,
        cups,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_fill_bands() {
        assert_eq!(snap_fill(0.03).band, FillBand::Empty);
        assert_eq!(snap_fill(0.05).fraction, 0.0);
        assert_eq!(snap_fill(0.06), FillLevel { band: FillBand::Partial, fraction: 0.1 });
        assert_eq!(snap_fill(0.44).fraction, 0.4);
        assert_eq!(snap_fill(0.46).fraction, 0.5);
        assert_eq!(snap_fill(0.90).fraction, 0.9);
        assert_eq!(snap_fill(0.91), FillLevel { band: FillBand::Full, fraction: 1.0 });
        assert_eq!(snap_fill(1.7).band, FillBand::Full);
    }

    #[test]
    fn test_container_detection() {
        assert_eq!(ContainerKind::from_description("espresso cup"), Some(ContainerKind::Demitasse));
        assert_eq!(ContainerKind::from_description("a large mug of tea"), Some(ContainerKind::LargeMug));
        assert_eq!(ContainerKind::from_description("ceramic mug"), Some(ContainerKind::SmallMug));
        assert_eq!(ContainerKind::from_description("paper cup to go"), Some(ContainerKind::TakeoutCup));
        assert_eq!(ContainerKind::from_description("soup bowl"), Some(ContainerKind::Bowl));
        assert_eq!(ContainerKind::from_description("glass"), None);
    }

    #[test]
    fn test_explicit_volume_wins_over_prior() {
        let cues = BeverageCues {
            kind: BeverageKind::Coffee,
            description: Some("large mug with 300 ml of coffee".into()),
            fill_percent: Some(20.0),
            ..Default::default()
        };
        let est = estimate_volume(&cues);
        assert_eq!(est.source, VolumeSource::Explicit);
        assert_eq!(est.present_ml, Some(300.0));
        assert_eq!(est.container, Some(ContainerKind::LargeMug));
        assert_eq!(est.cups, Some(1.3));
    }

    #[test]
    fn test_container_prior_with_fill() {
        let cues = BeverageCues {
            kind: BeverageKind::Coffee,
            container: Some("small mug".into()),
            fill_percent: Some(48.0),
            ..Default::default()
        };
        let est = estimate_volume(&cues);
        assert_eq!(est.source, VolumeSource::ContainerPrior);
        assert_eq!(est.capacity_ml, Some(225.0));
        assert_eq!(est.fill.map(|f| f.band), Some(FillBand::Partial));
        assert_eq!(est.present_ml, Some(112.5));
        assert_eq!(est.cups, Some(0.5));
    }

    #[test]
    fn test_explicit_cup_count_wins_for_coffee() {
        let cues = BeverageCues {
            kind: BeverageKind::Coffee,
            description: Some("2 cups of filter coffee in a takeout cup".into()),
            ..Default::default()
        };
        let est = estimate_volume(&cues);
        assert_eq!(est.cups, Some(2.0));
        // the volume follows the stated cups, not the container prior
        assert_eq!(est.source, VolumeSource::Explicit);
        assert_eq!(est.present_ml, Some(480.0));
        assert_eq!(est.capacity_ml, Some(425.0));
        assert_eq!(est.fill.map(|f| f.band), Some(FillBand::Full));
    }

    #[test]
    fn test_fill_ratio_and_percent_agree() {
        let cues = |fill: f64| BeverageCues {
            kind: BeverageKind::Other,
            container: Some("small mug".into()),
            fill_percent: Some(fill),
            ..Default::default()
        };
        let ratio = estimate_volume(&cues(0.48));
        let percent = estimate_volume(&cues(48.0));
        assert_eq!(ratio.present_ml, Some(112.5));
        assert_eq!(ratio.present_ml, percent.present_ml);
        assert_eq!(ratio.fill, percent.fill);
    }

    #[test]
    fn test_unknown_without_cues() {
        let est = estimate_volume(&BeverageCues::default());
        assert_eq!(est.source, VolumeSource::Unknown);
        assert_eq!(est.present_ml, None);
        assert_eq!(est.cups, None);
    }

    #[test]
    fn test_coffee_cups_rounding() {
        assert_eq!(coffee_cups(240.0), 1.0);
        assert_eq!(coffee_cups(75.0), 0.3);
        assert_eq!(coffee_cups(500.0), 2.1);
    }
}
