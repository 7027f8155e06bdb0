//! Property-based tests for reply text handling
//!
//! - Text without a tag passes through untouched
//! - A tag anywhere in a reply is stripped and reported with its label
//! - Splitting a reply into arbitrary deltas keeps the same words and display
//! - Simulated weather stays within its documented ranges

use super::display::extract_image_tag;
use super::stream::ReplyAccumulator;
use super::weather::{WeatherReport, WEATHER_CONDITION};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Prose that never contains a tag
fn arb_prose() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?'\n]{0,80}"
}

/// Label as the model writes it, e.g. `Munnar, Kerala`
fn arb_label() -> impl Strategy<Value = String> {
    ("[A-Z][a-z]{2,12}( [A-Z][a-z]{2,10})?", "[A-Z][a-z]{3,12}")
        .prop_map(|(place, state)| format!("{place}, {state}"))
}

/// Split `text` at char boundaries chosen from `cuts`
fn split_at_cuts(text: &str, cuts: &[usize]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (chars.len() + 1)).collect();
    points.push(0);
    points.push(chars.len());
    points.sort_unstable();
    points.dedup();
    points
        .windows(2)
        .map(|w| chars[w[0]..w[1]].iter().collect())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_untagged_text_unchanged(text in arb_prose()) {
        let extraction = extract_image_tag(&text);
        prop_assert!(extraction.tag.is_none());
        prop_assert_eq!(extraction.text, text);
    }

    #[test]
    fn prop_tag_is_stripped_and_reported(
        before in arb_prose(),
        label in arb_label(),
        after in arb_prose(),
    ) {
        let text = format!("{before}[IMAGE: {label}]{after}");
        let extraction = extract_image_tag(&text);

        let tag = extraction.tag.expect("tag should be found");
        prop_assert_eq!(&tag.label, &label);
        prop_assert_eq!(tag.location.as_str(), label.split(',').next().unwrap().trim());
        prop_assert!(!extraction.text.contains("[IMAGE:"));

        // Everything the user wrote around the tag survives, minus spacing
        let squash = |s: &str| s.split_whitespace().collect::<String>();
        prop_assert_eq!(squash(&extraction.text), format!("{}{}", squash(&before), squash(&after)));
    }

    #[test]
    fn prop_chunking_does_not_change_reply(
        before in arb_prose(),
        label in arb_label(),
        after in arb_prose(),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let text = format!("{before}[IMAGE: {label}]{after}");

        let mut whole = ReplyAccumulator::new("bot");
        let whole_display = whole.push(&text);
        whole.finish();

        let mut chunked = ReplyAccumulator::new("bot");
        let mut chunked_display = None;
        for delta in split_at_cuts(&text, &cuts) {
            if let Some(display) = chunked.push(&delta) {
                chunked_display = Some(display);
            }
        }
        chunked.finish();

        // Spacing next to the tag can differ with where the deltas split
        let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        prop_assert_eq!(squash(chunked.text()), squash(whole.text()));
        prop_assert!(!chunked.text().contains("[IMAGE:"));
        prop_assert_eq!(chunked_display, whole_display);
    }

    #[test]
    fn prop_weather_within_ranges(seed in any::<u64>(), location in "[A-Za-z ]{1,20}") {
        let mut rng = StdRng::seed_from_u64(seed);
        let report = WeatherReport::simulate(&location, &mut rng);

        let temperature: u32 = report.temperature.trim_end_matches("°C").parse().unwrap();
        let humidity: u32 = report.humidity.trim_end_matches('%').parse().unwrap();
        prop_assert!((20..=24).contains(&temperature));
        prop_assert!((85..=94).contains(&humidity));
        prop_assert_eq!(report.condition.as_str(), WEATHER_CONDITION);
        prop_assert_eq!(report.location, location);
    }
}
