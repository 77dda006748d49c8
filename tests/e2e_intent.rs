//! End-to-end tests for phrase → intent record against the subsea fixture world.
//!
//! Each test runs `Interpreter::parse_intent` inside its own read transaction,
//! with a `ScriptedOperator` standing in for the person at the console.

use pretty_assertions::assert_eq;
use sam_rs::operator::ScriptedOperator;
use sam_rs::{Error, Interpreter, InterpreterConfig, MemoryStore, Notice, Prompt, Snapshot};

const WORLD: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/subsea_world.json");

fn interpreter() -> Interpreter<MemoryStore> {
    let world = Snapshot::from_json_file(WORLD).unwrap();
    Interpreter::with_snapshot(&world, InterpreterConfig::default()).unwrap()
}

async fn parse(phrase: &str, answers: &[&str]) -> (sam_rs::Result<sam_rs::IntentRecord>, ScriptedOperator) {
    let sam = interpreter();
    let mut operator = ScriptedOperator::new(answers.iter().copied());
    let record = sam.parse_intent(phrase, &mut operator).await;
    (record, operator)
}

fn json(record: &sam_rs::IntentRecord) -> String {
    serde_json::to_string(record).unwrap()
}

// ============================================================================
// 1. Tagged element
// ============================================================================

#[tokio::test]
async fn test_open_valve_with_tag() {
    let (record, operator) = parse("open valve MECH-VALVE-TURN-UN-IN-11", &[]).await;
    assert_eq!(
        json(&record.unwrap()),
        r#"{"command":"open","pair-1":["valve","MECH-VALVE-TURN-UN-IN-11"]}"#
    );
    assert!(operator.prompts.is_empty());
    assert!(operator.notices.is_empty());
}

#[tokio::test]
async fn test_element_type_value_as_head() {
    let (record, _) = parse("close manifold EQPT-MANIF-UNDF-FX-00-01", &[]).await;
    assert_eq!(
        json(&record.unwrap()),
        r#"{"command":"close","pair-1":["manifold","EQPT-MANIF-UNDF-FX-00-01"]}"#
    );
}

// ============================================================================
// 2. Missing tag
// ============================================================================

#[tokio::test]
async fn test_open_valve_asks_for_tag() {
    let (record, operator) = parse("open valve", &["MECH-VALVE-TURN-UN-IN-11"]).await;
    assert_eq!(operator.prompts, vec![Prompt::TagOrPreposition { element: "valve".into() }]);
    assert_eq!(operator.notices, vec![Notice::MissingTag { element: "valve".into() }]);
    assert_eq!(
        json(&record.unwrap()),
        r#"{"command":"open","pair-1":["valve","MECH-VALVE-TURN-UN-IN-11"]}"#
    );
}

// ============================================================================
// 3. Tag ambiguity
// ============================================================================

#[tokio::test]
async fn test_selection_equals_typing_the_tag() {
    let (selected, operator) = parse("open valve EQPT-MANIF-UNDF-FX-00-01", &["2"]).await;
    let Prompt::TagSelection { candidates, tag, .. } = &operator.prompts[0] else {
        panic!("expected a tag selection, got {:?}", operator.prompts);
    };
    assert_eq!(tag, "EQPT-MANIF-UNDF-FX-00-01");
    assert_eq!(candidates.len(), 3);

    let (typed, _) = parse(&format!("open valve {}", candidates[1]), &[]).await;
    assert_eq!(selected.unwrap(), typed.unwrap());
}

#[tokio::test]
async fn test_non_numeric_selection_reprompts() {
    let (record, operator) = parse("open valve EQPT-MANIF-UNDF-FX-00-01", &["first", "7", "1"]).await;
    assert!(record.is_ok());
    assert_eq!(operator.prompts.len(), 3);
    assert!(operator.notices.contains(&Notice::NotANumber { input: "first".into() }));
    assert!(operator.notices.contains(&Notice::OutOfRange { input: 7, max: 3 }));
}

#[tokio::test]
async fn test_selection_attempts_are_bounded() {
    let (record, operator) = parse("open valve EQPT-MANIF-UNDF-FX-00-01", &["a", "b", "c", "1"]).await;
    assert!(matches!(record, Err(Error::RetriesExhausted { stage: "tag selection", .. })));
    assert_eq!(operator.remaining(), 1);
}

// ============================================================================
// 4. Prepositions and rejected phrases
// ============================================================================

#[tokio::test]
async fn test_part_of_phrase() {
    let (record, _) = parse("clean surface OF rov-panel SUBS-ROVPN-UNDF-FX-HD-01", &[]).await;
    let record = record.unwrap();
    assert_eq!(
        json(&record),
        r#"{"command":"clean","element-1":"surface","prep-1":"OF","pair-1":["rov-panel","SUBS-ROVPN-UNDF-FX-HD-01"]}"#
    );
    assert_eq!(record.primary().unwrap().element, "surface");
    assert_eq!(record.paired().unwrap().tag.as_deref(), Some("SUBS-ROVPN-UNDF-FX-HD-01"));
}

#[tokio::test]
async fn test_unknown_token_asks_for_new_phrase() {
    let (record, operator) = parse("open hatch", &["plug connector CONN-ELECT-PUSH-MB-HD-01"]).await;
    assert_eq!(operator.notices, vec![Notice::UnknownToken { token: "hatch".into() }]);
    assert_eq!(operator.prompts, vec![Prompt::NewPhrase]);
    assert_eq!(record.unwrap().command(), Some("plug"));
}

#[tokio::test]
async fn test_closed_operator_ends_the_build() {
    let (record, _) = parse("open hatch", &[]).await;
    assert!(matches!(record, Err(Error::OperatorClosed)));
}

// ============================================================================
// 5. Round trip
// ============================================================================

#[tokio::test]
async fn test_tokens_reparse_to_the_same_record() {
    let phrases: [(&str, &[&str]); 3] = [
        ("open valve MECH-VALVE-TURN-UN-IN-11", &[]),
        ("open valve", &["MECH-VALVE-TURN-UN-IN-12"]),
        ("clean surface OF rov-panel SUBS-ROVPN-UNDF-FX-HD-01", &[]),
    ];
    for (phrase, answers) in phrases {
        let (record, _) = parse(phrase, answers).await;
        let record = record.unwrap();
        let (again, operator) = parse(&record.tokens().join(" "), &[]).await;
        assert_eq!(again.unwrap(), record, "round trip of {phrase:?}");
        assert!(operator.prompts.is_empty());
    }
}
