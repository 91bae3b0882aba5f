use civic_core::classify::classify;
use civic_core::duplicates::{EARTH_RADIUS_KM, find_duplicates, haversine_km};
use civic_core::model::issue::Priority;
use civic_core::record::{self, IssueRecord, RecordTimestamp};
use proptest::prelude::*;

use generators::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn json_record_preserves_every_field(issue in arb_issue()) {
        let json = record::to_json(&issue).unwrap();
        let back = record::from_json(&json).unwrap();
        prop_assert_eq!(back, issue);
    }

    #[test]
    fn record_uses_camel_case_keys(issue in arb_issue()) {
        let value = serde_json::to_value(IssueRecord::from(&issue)).unwrap();
        prop_assert!(value.get("reportedBy").is_some());
        prop_assert!(value.get("createdAt").is_some());
        prop_assert!(value.get("reported_by").is_none());
    }

    #[test]
    fn server_token_matches_iso_string(at in arb_datetime()) {
        let token = RecordTimestamp::Server {
            seconds: at.timestamp(),
            nanoseconds: at.timestamp_subsec_nanos(),
        };
        let iso = RecordTimestamp::from(at);
        prop_assert_eq!(token.to_datetime("p", "t").unwrap(), at);
        prop_assert_eq!(iso.to_datetime("p", "t").unwrap(), at);
    }

    #[test]
    fn classify_is_total_and_deterministic(
        category in arb_category(),
        description in ".{0,80}",
    ) {
        let first = classify(category, &description);
        prop_assert_eq!(first, classify(category, &description));
        prop_assert!(matches!(first, Priority::High | Priority::Medium | Priority::Low));
    }

    #[test]
    fn haversine_is_symmetric_and_bounded(a in arb_point(), b in arb_point()) {
        let ab = haversine_km(a, b);
        let ba = haversine_km(b, a);
        prop_assert!((ab - ba).abs() < 1e-6);
        prop_assert!(ab >= 0.0);
        prop_assert!(ab <= EARTH_RADIUS_KM * std::f64::consts::PI + 1e-6);
    }

    #[test]
    fn duplicates_share_category_and_fall_inside_radius(
        issues in prop::collection::vec(arb_issue(), 0..12),
        point in arb_point(),
        category in arb_category(),
        radius_km in 0.0f64..5_000.0,
    ) {
        let found = find_duplicates(point, category, radius_km, &issues);
        for issue in &found {
            prop_assert_eq!(issue.category, category);
            prop_assert!(haversine_km(point, issue.location) <= radius_km);
        }
        let expected = issues
            .iter()
            .filter(|i| i.category == category && haversine_km(point, i.location) <= radius_km)
            .count();
        prop_assert_eq!(found.len(), expected);
    }
}
