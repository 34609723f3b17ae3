//! Property tests for result ranking and display formatting

use nameit_eye::models::LabelStyle;
use nameit_eye::prediction::{rank_top, ClassificationResult, DISPLAYED_RESULTS};
use nameit_eye::presenter::{display_label, format_result};
use proptest::prelude::*;

fn observations() -> impl Strategy<Value = Vec<ClassificationResult>> {
    prop::collection::vec(("[a-z]{1,8}", 0.0f32..=1.0f32), 0..40).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(label, confidence)| ClassificationResult::new(label, confidence))
            .collect()
    })
}

proptest! {
    #[test]
    fn ranked_results_are_the_best_in_descending_order(input in observations()) {
        let ranked = rank_top(input.clone(), DISPLAYED_RESULTS);

        prop_assert_eq!(ranked.len(), input.len().min(DISPLAYED_RESULTS));
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].confidence >= pair[1].confidence);
        }
        if let Some(last) = ranked.last() {
            let better = input.iter().filter(|o| o.confidence > last.confidence).count();
            prop_assert!(better < ranked.len());
        }
        for result in &ranked {
            prop_assert!(input.contains(result));
        }
    }

    #[test]
    fn synset_prefix_is_stripped_up_to_first_space(prefix in "[a-z0-9]{1,10}", rest in "[a-z ,]{0,20}") {
        let label = format!("{} {}", prefix, rest);
        prop_assert_eq!(display_label(&label, LabelStyle::SynsetPrefixed), rest.as_str());
        prop_assert_eq!(display_label(&label, LabelStyle::Raw), label.as_str());
    }

    #[test]
    fn formatted_result_has_three_decimals(confidence in 0.0f32..=1.0f32) {
        let line = format_result(&ClassificationResult::new("cat", confidence), LabelStyle::Raw);
        prop_assert!(line.starts_with("cat ("));
        prop_assert!(line.ends_with("%)"));
        let percent = &line["cat (".len()..line.len() - 2];
        let (_, decimals) = percent.split_once('.').unwrap();
        prop_assert_eq!(decimals.len(), 3);
    }
}
