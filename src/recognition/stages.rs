//! Generic-food fallback chain
//!
//! An ordered list of recognition stages. Each declares when it needs to run
//! and when the chain can stop after it, so every step is testable on its own.

use super::evidence::RecognitionEvidence;
use super::services::RecognitionTask;
use crate::nutrition::KeywordTables;

/// Fewer items than this and the dedicated ingredients pass runs
pub const MIN_INGREDIENT_ITEMS: usize = 3;

pub type EvidencePredicate = fn(&RecognitionEvidence, &KeywordTables) -> bool;

#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    pub name: &'static str,
    pub task: RecognitionTask,
    /// First call of the chain; bounded by the first-attempt timeout
    pub first_attempt: bool,
    /// Checked against the merged evidence before the stage runs
    pub runs_when: EvidencePredicate,
    /// Checked after the stage's evidence is merged
    pub halts_when: EvidencePredicate,
}

/// Real title, positive energy and at least one item
pub fn is_usable(evidence: &RecognitionEvidence, keywords: &KeywordTables) -> bool {
    let titled = evidence
        .title
        .as_deref()
        .is_some_and(|t| !keywords.is_placeholder_title(t));
    let energetic = evidence.energy_kcal().is_some_and(|kcal| kcal > 0.0);
    titled && energetic && !evidence.items.is_empty()
}

pub fn needs_ingredients(evidence: &RecognitionEvidence, _keywords: &KeywordTables) -> bool {
    evidence.items.len() < MIN_INGREDIENT_ITEMS
}

fn always(_: &RecognitionEvidence, _: &KeywordTables) -> bool {
    true
}

fn never(_: &RecognitionEvidence, _: &KeywordTables) -> bool {
    false
}

pub const GENERIC_FOOD_STAGES: [StageSpec; 3] = [
    StageSpec {
        name: "combined",
        task: RecognitionTask::CombinedFoodAnalysis,
        first_attempt: true,
        runs_when: always,
        halts_when: is_usable,
    },
    StageSpec {
        name: "visual",
        task: RecognitionTask::VisualFoodAnalysis,
        first_attempt: false,
        runs_when: always,
        halts_when: never,
    },
    StageSpec {
        name: "ingredients",
        task: RecognitionTask::IngredientsOnly,
        first_attempt: false,
        runs_when: needs_ingredients,
        halts_when: never,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::evidence::EvidenceItem;

    fn evidence(title: &str, kcal: f64, items: &[&str]) -> RecognitionEvidence {
        let mut e = RecognitionEvidence {
            title: Some(title.to_string()),
            items: items
                .iter()
                .map(|n| EvidenceItem {
                    name: n.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        e.per_package.energy_kcal = Some(kcal);
        e
    }

    #[test]
    fn test_placeholder_result_is_not_usable() {
        let kw = KeywordTables::default();
        assert!(!is_usable(&evidence("Scanned meal", 0.0, &[]), &kw));
    }

    #[test]
    fn test_real_result_is_usable() {
        let kw = KeywordTables::default();
        assert!(is_usable(&evidence("Chicken curry", 650.0, &["chicken"]), &kw));
    }

    #[test]
    fn test_each_missing_part_fails_the_gate() {
        let kw = KeywordTables::default();
        assert!(!is_usable(&evidence("Chicken curry", 0.0, &["chicken"]), &kw));
        assert!(!is_usable(&evidence("Chicken curry", 650.0, &[]), &kw));
        assert!(!is_usable(&evidence("scanned MEAL", 650.0, &["chicken"]), &kw));
        let mut untitled = evidence("x", 650.0, &["chicken"]);
        untitled.title = None;
        assert!(!is_usable(&untitled, &kw));
    }

    #[test]
    fn test_ingredient_threshold() {
        let kw = KeywordTables::default();
        assert!(needs_ingredients(&evidence("Salad", 200.0, &["lettuce", "tomato"]), &kw));
        assert!(!needs_ingredients(&evidence("Salad", 200.0, &["lettuce", "tomato", "feta"]), &kw));
    }

    #[test]
    fn test_chain_shape() {
        assert!(GENERIC_FOOD_STAGES[0].first_attempt);
        assert!(GENERIC_FOOD_STAGES.iter().skip(1).all(|s| !s.first_attempt));
        assert_eq!(GENERIC_FOOD_STAGES[2].task, RecognitionTask::IngredientsOnly);
    }
}
