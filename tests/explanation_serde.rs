// tests/explanation_serde.rs
use chrono::NaiveDate;
use serde_json::{json, Value};

use finexplain::types::{
    Category, Direction, DriverRecord, Explanation, MagnitudeBucket, MoveRecord, RankedDriverSet,
};
use finexplain::views::{build_views, ExplainReport};

fn sample() -> Explanation {
    Explanation {
        ticker: "AAPL".into(),
        date: NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
        movement: MoveRecord {
            pct_change: 3.0000000000000027,
            direction: Direction::Up,
            magnitude_bucket: MagnitudeBucket::Moderate,
        },
        drivers: vec![
            DriverRecord {
                text: "AAPL posts stronger-than-expected results".into(),
                category: Category::Earnings,
                sentiment: 0.458831,
                relevance_score: 0.7312345678901234,
            },
            DriverRecord {
                text: "Sector peers rally, lifting AAPL".into(),
                category: Category::Sector,
                sentiment: 0.6123724356957945,
                relevance_score: 0.1 + 0.2,
            },
        ],
        narrative: "On 2025-11-03, AAPL rose 3.00%, a moderate move.".into(),
        confidence: 0.4,
    }
}

#[test]
fn round_trip_is_field_for_field_equal() {
    let ex = sample();
    let s = serde_json::to_string(&ex).unwrap();
    let back: Explanation = serde_json::from_str(&s).unwrap();
    assert_eq!(back, ex);
}

#[test]
fn wire_field_names() {
    let v: Value = serde_json::to_value(sample()).unwrap();
    assert_eq!(v["ticker"], json!("AAPL"));
    assert_eq!(v["date"], json!("2025-11-03"));
    assert_eq!(v["move"]["direction"], json!("up"));
    assert_eq!(v["move"]["magnitude_bucket"], json!("moderate"));
    assert!(v["move"]["pct_change"].is_f64());
    assert_eq!(v["drivers"][0]["category"], json!("Earnings"));
    for key in ["text", "category", "sentiment", "relevance_score"] {
        assert!(v["drivers"][1].get(key).is_some(), "missing {key}");
    }
    assert!(v.get("narrative").is_some());
    assert!(v.get("confidence").is_some());
    assert!(v.get("movement").is_none());
}

#[test]
fn report_without_views_serializes_as_the_bare_explanation() {
    let report = ExplainReport {
        explanation: sample(),
        views: None,
    };
    assert_eq!(
        serde_json::to_string(&report).unwrap(),
        serde_json::to_string(&sample()).unwrap()
    );
}

#[test]
fn report_with_views_keeps_explanation_fields_at_top_level() {
    let ex = sample();
    let views = build_views(&ex, &RankedDriverSet::empty());
    let v: Value = serde_json::to_value(ExplainReport {
        explanation: ex,
        views: Some(views),
    })
    .unwrap();
    assert_eq!(v["ticker"], json!("AAPL"));
    assert_eq!(v["views"]["market"]["impact"], json!("notable"));
    assert_eq!(v["views"]["news"]["has_news"], json!(false));
}
