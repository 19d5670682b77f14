//! Alternative product candidates

use serde::{Deserialize, Serialize};

/// Energy of an alternative relative to the scanned product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Lower,
    #[default]
    Similar,
    Higher,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Lower => "lower",
            Bucket::Similar => "similar",
            Bucket::Higher => "higher",
        }
    }

    /// Normalize a free-form bucket label from a recognition service.
    ///
    /// `low*`/`less` -> lower, `high*`/`more` -> higher, `sim*`/`same` -> similar
    pub fn from_label(label: &str) -> Option<Self> {
        let lower = label.trim().to_lowercase();
        if lower.starts_with("low") || lower == "less" {
            Some(Bucket::Lower)
        } else if lower.starts_with("high") || lower == "more" {
            Some(Bucket::Higher)
        } else if lower.starts_with("sim") || lower == "same" {
            Some(Bucket::Similar)
        } else {
            None
        }
    }
}

/// A substitute product suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeCandidate {
    pub brand: Option<String>,
    pub name: String,
    pub variant: Option<String>,
    pub calories_per_package_kcal: Option<f64>,
    pub bucket: Bucket,
    /// Bucket label as supplied by the source, before normalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
}

impl AlternativeCandidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            brand: None,
            name: name.into(),
            variant: None,
            calories_per_package_kcal: None,
            bucket: Bucket::Similar,
            source_label: None,
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_kcal(mut self, kcal: f64) -> Self {
        self.calories_per_package_kcal = Some(kcal);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_labels() {
        assert_eq!(Bucket::from_label("Lower"), Some(Bucket::Lower));
        assert_eq!(Bucket::from_label("low-cal"), Some(Bucket::Lower));
        assert_eq!(Bucket::from_label("less"), Some(Bucket::Lower));
        assert_eq!(Bucket::from_label("HIGHER"), Some(Bucket::Higher));
        assert_eq!(Bucket::from_label("more"), Some(Bucket::Higher));
        assert_eq!(Bucket::from_label("similar"), Some(Bucket::Similar));
        assert_eq!(Bucket::from_label("same"), Some(Bucket::Similar));
        assert_eq!(Bucket::from_label("banana"), None);
    }
}
