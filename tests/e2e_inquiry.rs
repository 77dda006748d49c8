//! End-to-end tests for the full situation awareness procedure.
//!
//! Phrase → intent → command profile → compliance → relation context →
//! target location, all against `fixtures/subsea_world.json`.

use pretty_assertions::assert_eq;
use sam_rs::compliance::Compliance;
use sam_rs::location::{LocationPair, TargetLocation};
use sam_rs::operator::ScriptedOperator;
use sam_rs::{Error, Interpreter, InterpreterConfig, LocationError, MemoryStore, Notice, Snapshot, SituationReport};

const WORLD: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/subsea_world.json");

fn interpreter() -> Interpreter<MemoryStore> {
    let world = Snapshot::from_json_file(WORLD).unwrap();
    Interpreter::with_snapshot(&world, InterpreterConfig::default()).unwrap()
}

async fn inquire(phrase: &str) -> (sam_rs::Result<SituationReport>, ScriptedOperator) {
    let sam = interpreter();
    let mut operator = ScriptedOperator::default();
    let report = sam.inquire(phrase, &mut operator).await;
    (report, operator)
}

// ============================================================================
// 1. Goal command on a tagged element
// ============================================================================

#[tokio::test]
async fn test_open_valve_full_report() {
    let (report, operator) = inquire("open valve MECH-VALVE-TURN-UN-IN-11").await;
    let report = report.unwrap();
    assert!(operator.notices.is_empty());

    let command = report.command.as_ref().unwrap();
    assert_eq!(command.goals, vec!["valve-operation-goal".to_string()]);
    assert!(!command.use_tool);
    assert_eq!(command.goal_location.as_deref(), Some("equipment"));

    let primary = report.primary.as_ref().unwrap();
    assert_eq!(primary.class, "valve");
    assert_eq!(primary.superclass.as_deref(), Some("mechanism"));
    assert_eq!(
        primary.compliance,
        Some(Compliance::Permitted { label: "valve".into(), goal: "valve-operation-goal".into() })
    );
    assert_eq!(
        primary.relations.triples("positioning"),
        vec!["equipment EQPT-MANIF-UNDF-FX-00-01 ▶ position".to_string()]
    );
    assert_eq!(
        primary.relations.triples("linking"),
        vec!["tool TOOL-CLAMP-MANU-AT-UN-03 ▶ link".to_string()]
    );
    assert!(report.paired.is_none());
}

#[tokio::test]
async fn test_target_is_the_equipment_location() {
    let (report, _) = inquire("open valve MECH-VALVE-TURN-UN-IN-11").await;
    let primary = report.unwrap().primary.unwrap();

    let TargetLocation::Resolved { pair, coordinates } = &primary.target else {
        panic!("expected a resolved target, got {:?}", primary.target);
    };
    assert_eq!(*pair, LocationPair::new("equipment", "EQPT-MANIF-UNDF-FX-00-01"));
    assert_eq!(coordinates.name, "manifold-site-A");
    assert_eq!(coordinates.latitude, "-22.9");
    assert_eq!(coordinates.longitude, "-40.1");

    let target_relations = primary.target_relations.unwrap();
    let mut valves = target_relations.triples("positioning");
    valves.sort();
    assert_eq!(
        valves,
        vec![
            "rov-panel SUBS-ROVPN-UNDF-FX-HD-01 ▶ positioned".to_string(),
            "valve MECH-VALVE-TURN-UN-IN-11 ▶ positioned".to_string(),
            "valve MECH-VALVE-TURN-UN-IN-12 ▶ positioned".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_report_renders_and_serializes() {
    let (report, _) = inquire("open valve MECH-VALVE-TURN-UN-IN-11").await;
    let report = report.unwrap();

    let text = report.to_string();
    assert!(text.contains("YES ▶ COMPLIANT (valve-operation-goal)"));
    assert!(text.contains("Location (TARGET) ▶ [equipment EQPT-MANIF-UNDF-FX-00-01] name: manifold-site-A"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["intent"]["command"], "open");
    assert_eq!(json["primary"]["target"]["target"], "resolved");
    assert_eq!(json["primary"]["compliance"]["verdict"], "permitted");
    assert_eq!(json["primary"]["relations"]["linking"][0], "tool TOOL-CLAMP-MANU-AT-UN-03 ▶ link");
}

// ============================================================================
// 2. Tool functions
// ============================================================================

#[tokio::test]
async fn test_tool_function_is_tool_mediated() {
    let (report, _) = inquire("apply-torque-on valve MECH-VALVE-TURN-UN-IN-11").await;
    let report = report.unwrap();
    let command = report.command.unwrap();
    assert!(command.use_tool);
    assert_eq!(command.attribute, "function");
    assert_eq!(command.tools, vec!["torque-tool".to_string()]);
    assert_eq!(report.primary.unwrap().compliance, Some(Compliance::ToolMediated));
}

// ============================================================================
// 3. Part-of phrases
// ============================================================================

#[tokio::test]
async fn test_surface_of_panel() {
    let (report, _) = inquire("clean surface OF rov-panel SUBS-ROVPN-UNDF-FX-HD-01").await;
    let report = report.unwrap();

    let primary = report.primary.unwrap();
    assert_eq!(
        primary.relations.triples("forming"),
        vec!["rov-panel SUBS-ROVPN-UNDF-FX-HD-01 ▶ whole".to_string()]
    );

    let paired = report.paired.unwrap();
    assert_eq!(
        paired.relations.triples("positioning"),
        vec!["equipment EQPT-MANIF-UNDF-FX-00-01 ▶ position".to_string()]
    );
    assert_eq!(
        paired.target.pair(),
        Some(&LocationPair::new("equipment", "EQPT-MANIF-UNDF-FX-00-01"))
    );

    let TargetLocation::Propagated { reference, coordinates } = &primary.target else {
        panic!("expected a propagated target, got {:?}", primary.target);
    };
    assert_eq!(reference, "rov-panel SUBS-ROVPN-UNDF-FX-HD-01");
    assert_eq!(coordinates.len(), 1);
    assert_eq!(coordinates[0].name, "manifold-site-A");
}

// ============================================================================
// 4. Moving elements
// ============================================================================

#[tokio::test]
async fn test_connector_has_current_location() {
    let (report, _) = inquire("plug connector CONN-ELECT-PUSH-MB-HD-01").await;
    let report = report.unwrap();

    assert_eq!(report.current_locations.len(), 1);
    assert_eq!(report.current_locations[0].name, "basket-site-B");

    let target = report.primary.unwrap().target;
    assert_eq!(target.pair(), Some(&LocationPair::new("storage", "STOR-BASKT-UNDF-MB-00-05")));
    assert_eq!(target.coordinates()[0].name, "basket-site-B");
}

// ============================================================================
// 5. Failures surface as errors from a single attempt
// ============================================================================

#[tokio::test]
async fn test_noncompliant_command_is_an_error() {
    let (report, _) = inquire("open connector CONN-ELECT-PUSH-MB-HD-01").await;
    let Err(Error::Compliance(e)) = &report else {
        panic!("expected a compliance error, got {report:?}");
    };
    assert_eq!(e.command(), "open");
    assert_eq!(e.element(), "connector");
}

#[tokio::test]
async fn test_unlocated_target_is_an_error() {
    let (report, _) = inquire("open valve MECH-VALVE-TURN-UN-IN-13").await;
    assert!(matches!(
        report,
        Err(Error::Location(LocationError::Unlocated(pair)))
            if pair == LocationPair::new("vessel", "SHIP-VESSL-UNDF-MB-00-17")
    ));
}

#[tokio::test]
async fn test_no_location_candidates_is_an_error() {
    let (report, _) = inquire("clean surface SUBS-ROVPN-UNDF-FX-HD-01").await;
    assert!(matches!(
        report,
        Err(Error::Location(LocationError::Missing { element }))
            if element == "surface SUBS-ROVPN-UNDF-FX-HD-01"
    ));
}

#[tokio::test]
async fn test_element_without_command() {
    let (report, operator) = inquire("valve MECH-VALVE-TURN-UN-IN-11 AT").await;
    let report = report.unwrap();
    assert!(report.command.is_none());
    let primary = report.primary.unwrap();
    assert!(primary.compliance.is_none());
    assert!(primary.target.pair().is_some());
    assert_eq!(operator.notices, vec![Notice::MissingCommand]);
}

// ============================================================================
// 6. Relation context of a part-of phrase
// ============================================================================

#[tokio::test]
async fn test_part_of_cross_relations_name_the_subject_by_tag() {
    use sam_rs::relations::{ContextRequest, PairedElement, RelationCollector};
    use sam_rs::resolve::TypeResolver;
    use sam_rs::{GraphStore, TxMode, TxOptions, Vocabulary};

    let store = MemoryStore::from_snapshot(&Snapshot::from_json_file(WORLD).unwrap()).unwrap();
    let tx = store.open_tx(TxMode::Read, TxOptions::default()).await.unwrap();
    let vocab = Vocabulary::default();
    let resolver = TypeResolver::new(&store, &tx, &vocab);
    let surface = resolver.element_class("surface").await.unwrap().unwrap();
    let panel = resolver.element_class("rov-panel").await.unwrap().unwrap();

    let request = ContextRequest {
        element: "surface",
        class: &surface,
        tag: None,
        paired: Some(PairedElement { element: "rov-panel", class: &panel, tag: "SUBS-ROVPN-UNDF-FX-HD-01" }),
        first_prep: Some("OF"),
    };
    let context = RelationCollector::new(&store, &tx, &vocab).collect(&request).await.unwrap();

    assert_eq!(
        context.cross_subject.triples("forming"),
        vec!["surface SUBS-ROVPN-UNDF-FX-HD-01 ▶ part".to_string()]
    );
    assert!(context.cross_paired.triples("forming").contains(&"surface SUBS-ROVPN-UNDF-FX-HD-01 ▶ part".to_string()));
}
