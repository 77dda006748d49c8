//! Phrase → intent record, with interactive tag disambiguation.
//!
//! ## State machine
//!
//! ```text
//! AwaitingPhrase ──▶ Classifying ──▶ Resolved
//!       ▲               │    ▲
//!       │  rejected /   │    │ valid selection
//!       │  trivial      ▼    │
//!       └──────── AwaitingTagCorrection ──▶ Failed
//! ```
//!
//! ## Limits
//!
//! | Loop | Counter | On exhaustion |
//! |------|---------|---------------|
//! | new phrases per build | `phrase_attempts` | `Error::RetriesExhausted` |
//! | invalid selections per ambiguity | `tag_selection_attempts` | `Error::RetriesExhausted` |

use hashbrown::HashSet;
use tracing::{debug, info, warn};

use super::record::{IntentRecord, SlotKey, SlotValue};
use crate::config::{RetryLimits, Vocabulary};
use crate::operator::{Notice, Operator, Prompt};
use crate::resolve::{Classification, TypeResolver};
use crate::storage::GraphStore;
use crate::typeql::{MatchBuilder, ThingScope, ROOT_THING};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    AwaitingPhrase,
    Classifying,
    AwaitingTagCorrection,
    Resolved,
    Failed,
}

/// Slot counters for one pass over a phrase.
#[derive(Debug, Default)]
struct Draft {
    record: IntentRecord,
    elements: u32,
    pairs: u32,
    preps: u32,
}

impl Draft {
    fn element(&mut self, token: &str) {
        self.elements += 1;
        self.record.push(SlotKey::Element(self.elements), SlotValue::Token(token.to_owned()));
    }

    fn pair(&mut self, element: &str, tag: &str) {
        self.pairs += 1;
        self.record.push(
            SlotKey::Pair(self.pairs),
            SlotValue::Pair { element: element.to_owned(), tag: tag.to_owned() },
        );
    }

    fn prep(&mut self, token: &str) {
        self.preps += 1;
        self.record.push(SlotKey::Prep(self.preps), SlotValue::Token(token.to_owned()));
    }
}

/// What the token after an element head turned out to be.
enum TagOutcome {
    /// A tag-number of the element (possibly chosen by the operator).
    Paired(String),
    /// A preposition; the element stays unpaired and the token is consumed.
    Preposition,
    /// Anything else; the element stays unpaired and the token is kept.
    NotATag,
    /// No tag-numbers exist for the element.
    Rejected,
}

pub struct IntentBuilder<'a, S: GraphStore> {
    store: &'a S,
    tx: &'a S::Tx,
    vocab: &'a Vocabulary,
    resolver: TypeResolver<'a, S>,
    limits: RetryLimits,
    state: BuildState,
}

impl<'a, S: GraphStore> IntentBuilder<'a, S> {
    pub fn new(store: &'a S, tx: &'a S::Tx, vocab: &'a Vocabulary, limits: RetryLimits) -> Self {
        Self {
            store,
            tx,
            vocab,
            resolver: TypeResolver::new(store, tx, vocab),
            limits,
            state: BuildState::AwaitingPhrase,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Build an intent record from `phrase`, asking `operator` for a new
    /// phrase whenever the current one is unusable.
    pub async fn build<O: Operator>(&mut self, phrase: &str, operator: &mut O) -> Result<IntentRecord> {
        let mut phrase = phrase.trim().to_owned();
        let mut attempts = 1;
        loop {
            self.state = BuildState::Classifying;
            info!(phrase = phrase.as_str(), attempt = attempts, "phrase intake");

            if let Some(record) = self.parse(&phrase, operator).await? {
                if record.is_valid() {
                    self.state = BuildState::Resolved;
                    info!(intent = %record, "intent resolved");
                    return Ok(record);
                }
                operator.notify(&Notice::TrivialIntent { phrase: phrase.clone() })?;
            }

            if attempts >= self.limits.phrase_attempts {
                self.state = BuildState::Failed;
                return Err(Error::RetriesExhausted { stage: "phrase", attempts });
            }
            self.state = BuildState::AwaitingPhrase;
            phrase = operator.prompt(&Prompt::NewPhrase)?;
            attempts += 1;
        }
    }

    /// One pass over the tokens. `None` when the phrase was rejected.
    async fn parse<O: Operator>(&mut self, phrase: &str, operator: &mut O) -> Result<Option<IntentRecord>> {
        let mut tokens: Vec<String> = phrase.split_whitespace().map(str::to_owned).collect();
        let mut draft = Draft::default();
        let mut asked: HashSet<usize> = HashSet::new();
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i].clone();
            let class = self.resolver.classify(&token).await?;
            debug!(token = token.as_str(), %class, "classified");

            match &class {
                Classification::Unknown => {
                    operator.notify(&Notice::UnknownToken { token })?;
                    return Ok(None);
                }
                Classification::Role { .. } => {
                    draft.prep(&token);
                    i += 1;
                    continue;
                }
                Classification::Command { .. } => {
                    draft.record.set_command(&token);
                    i += 1;
                    continue;
                }
                _ if !self.is_element_head(&class, &token) => {
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let Some(candidate) = tokens.get(i + 1).cloned() else {
                operator.notify(&Notice::MissingTag { element: token.clone() })?;
                if asked.insert(i) {
                    let answer = operator.prompt(&Prompt::TagOrPreposition { element: token.clone() })?;
                    if !answer.is_empty() {
                        tokens.extend(answer.split_whitespace().map(str::to_owned));
                        continue;
                    }
                }
                draft.element(&token);
                i += 1;
                continue;
            };

            match self.resolve_tag(&class, &token, &candidate, operator).await? {
                TagOutcome::Paired(tag) => {
                    draft.pair(&token, &tag);
                    tokens[i + 1] = tag;
                    i += 2;
                }
                TagOutcome::Preposition => {
                    draft.element(&token);
                    draft.prep(&candidate);
                    i += 2;
                }
                TagOutcome::NotATag => {
                    draft.element(&token);
                    i += 1;
                }
                TagOutcome::Rejected => return Ok(None),
            }
        }
        Ok(Some(draft.record))
    }

    /// Element heads: values of `element-type`, or types named by the token.
    fn is_element_head(&self, class: &Classification, token: &str) -> bool {
        match class {
            Classification::Attribute { label, owner: Some(_) } => *label == self.vocab.element_type,
            Classification::Attribute { label, .. } | Classification::Entity { label, .. } => label == token,
            _ => false,
        }
    }

    fn is_tag(&self, class: &Classification) -> bool {
        matches!(class, Classification::Attribute { label, .. } if *label == self.vocab.tag_number)
    }

    /// Things denoted by `head`: instances of the named type, or things
    /// carrying the head as an attribute value.
    fn head_scope(&self, class: &Classification, head: &str) -> ThingScope {
        match class {
            Classification::Entity { label, .. } => ThingScope::isa(label.as_str()),
            Classification::Attribute { label, owner: Some(_) } => {
                ThingScope::isa(ROOT_THING).has(label.as_str(), head)
            }
            _ => ThingScope::isa(head),
        }
    }

    async fn resolve_tag<O: Operator>(
        &mut self,
        class: &Classification,
        head: &str,
        candidate: &str,
        operator: &mut O,
    ) -> Result<TagOutcome> {
        let verbatim = self.resolver.classify(candidate).await?;
        let mut tag = candidate.to_owned();
        let mut is_tag = self.is_tag(&verbatim);
        if !is_tag {
            let upper = candidate.to_uppercase();
            if upper != candidate && self.is_tag(&self.resolver.classify(&upper).await?) {
                tag = upper;
                is_tag = true;
            }
        }
        if !is_tag {
            return Ok(if verbatim.is_role() { TagOutcome::Preposition } else { TagOutcome::NotATag });
        }

        let scope = self.head_scope(class, head);
        let mut invalid = 0;
        loop {
            if self.tag_exists(&scope, &tag).await? {
                self.state = BuildState::Classifying;
                return Ok(TagOutcome::Paired(tag));
            }

            operator.notify(&Notice::TagNotFound { element: head.to_owned(), tag: tag.clone() })?;
            let candidates = self.tag_candidates(&scope).await?;
            if candidates.is_empty() {
                operator.notify(&Notice::NoTagCandidates { element: head.to_owned() })?;
                return Ok(TagOutcome::Rejected);
            }

            self.state = BuildState::AwaitingTagCorrection;
            loop {
                let answer = operator.prompt(&Prompt::TagSelection {
                    element: head.to_owned(),
                    tag: tag.clone(),
                    candidates: candidates.clone(),
                })?;
                match answer.parse::<usize>() {
                    Ok(n) if (1..=candidates.len()).contains(&n) => {
                        tag = candidates[n - 1].clone();
                        break;
                    }
                    Ok(n) => operator.notify(&Notice::OutOfRange { input: n, max: candidates.len() })?,
                    Err(_) => operator.notify(&Notice::NotANumber { input: answer.clone() })?,
                }
                invalid += 1;
                warn!(element = head, answer = answer.as_str(), invalid, "invalid tag selection");
                if invalid >= self.limits.tag_selection_attempts {
                    self.state = BuildState::Failed;
                    return Err(Error::RetriesExhausted { stage: "tag selection", attempts: invalid });
                }
            }
        }
    }

    async fn tag_exists(&self, scope: &ThingScope, tag: &str) -> Result<bool> {
        let scope = scope.clone().has(self.vocab.tag_number.as_str(), tag);
        let query = MatchBuilder::new().element_scope("x", &scope).get(&["x"]);
        Ok(!self.store.match_query(self.tx, &query).await?.is_empty())
    }

    /// Every tag-number carried by things in `scope`, in answer order.
    async fn tag_candidates(&self, scope: &ThingScope) -> Result<Vec<String>> {
        let scope = scope.clone().has_var(self.vocab.tag_number.as_str(), "t");
        let query = MatchBuilder::new().element_scope("x", &scope).get(&["t"]);
        self.store.match_query(self.tx, &query).await?
            .iter()
            .map(|row| row.plain_value("t"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::ScriptedOperator;
    use crate::storage::{MemoryStore, Snapshot};
    use crate::tx::{TxMode, TxOptions};
    use pretty_assertions::assert_eq;

    const WORLD: &str = r#"{
        "schema": {
            "entities": [
                { "label": "mechanism" }, { "label": "valve", "sub": "mechanism" },
                { "label": "equipment" }, { "label": "goal" }
            ],
            "attributes": [
                { "label": "tag-number", "value_type": "string" },
                { "label": "element-type", "value_type": "string" },
                { "label": "command-type", "value_type": "string" }
            ]
        },
        "things": [
            { "id": "v1", "isa": "valve", "has": { "tag-number": "V-1" } },
            { "id": "v2", "isa": "valve", "has": { "tag-number": "V-2" } },
            { "id": "e1", "isa": "equipment", "has": { "tag-number": "E-1", "element-type": "manifold" } },
            { "id": "g1", "isa": "goal", "has": { "command-type": ["open", "close"] } }
        ]
    }"#;

    async fn build(phrase: &str, answers: &[&str]) -> (Result<IntentRecord>, ScriptedOperator, BuildState) {
        let store = MemoryStore::from_snapshot(&Snapshot::from_json_str(WORLD).unwrap()).unwrap();
        let tx = store.open_tx(TxMode::Read, TxOptions::default()).await.unwrap();
        let vocab = Vocabulary::default();
        let mut operator = ScriptedOperator::new(answers.iter().copied());
        let mut builder = IntentBuilder::new(&store, &tx, &vocab, RetryLimits::default());
        let result = builder.build(phrase, &mut operator).await;
        let state = builder.state();
        (result, operator, state)
    }

    fn json(record: &IntentRecord) -> String {
        serde_json::to_string(record).unwrap()
    }

    #[tokio::test]
    async fn test_valid_tag_pairs_with_head() {
        let (record, op, state) = build("open valve V-1", &[]).await;
        assert_eq!(json(&record.unwrap()), r#"{"command":"open","pair-1":["valve","V-1"]}"#);
        assert!(op.prompts.is_empty());
        assert_eq!(state, BuildState::Resolved);
    }

    #[tokio::test]
    async fn test_lowercase_tag_is_uppercased() {
        let (record, _, _) = build("open manifold e-1", &[]).await;
        assert_eq!(json(&record.unwrap()), r#"{"command":"open","pair-1":["manifold","E-1"]}"#);
    }

    #[tokio::test]
    async fn test_wrong_tag_offers_candidates() {
        let (record, op, _) = build("open valve E-1", &["2"]).await;
        assert_eq!(json(&record.unwrap()), r#"{"command":"open","pair-1":["valve","V-2"]}"#);
        assert_eq!(
            op.prompts,
            vec![Prompt::TagSelection {
                element: "valve".into(),
                tag: "E-1".into(),
                candidates: vec!["V-1".into(), "V-2".into()],
            }]
        );
    }

    #[tokio::test]
    async fn test_bad_selections_reprompt_then_exhaust() {
        let (record, op, _) = build("open valve E-1", &["x", "9", "1"]).await;
        assert_eq!(record.unwrap().primary().unwrap().tag.as_deref(), Some("V-1"));
        assert_eq!(op.notices.len(), 3);

        let (err, _, state) = build("open valve E-1", &["x", "0", "nine"]).await;
        assert!(matches!(err, Err(Error::RetriesExhausted { stage: "tag selection", attempts: 3 })));
        assert_eq!(state, BuildState::Failed);
    }

    #[tokio::test]
    async fn test_missing_tag_prompts_once() {
        let (record, op, _) = build("open valve", &["V-2"]).await;
        assert_eq!(json(&record.unwrap()), r#"{"command":"open","pair-1":["valve","V-2"]}"#);
        assert_eq!(op.prompts, vec![Prompt::TagOrPreposition { element: "valve".into() }]);

        let (record, _, _) = build("open valve", &[""]).await;
        assert_eq!(json(&record.unwrap()), r#"{"command":"open","element-1":"valve"}"#);
    }

    #[tokio::test]
    async fn test_preposition_after_head_is_consumed() {
        let (record, _, _) = build("close valve OF manifold E-1", &[]).await;
        assert_eq!(
            json(&record.unwrap()),
            r#"{"command":"close","element-1":"valve","prep-1":"OF","pair-1":["manifold","E-1"]}"#
        );
    }

    #[tokio::test]
    async fn test_unknown_and_trivial_phrases_are_replaced() {
        let (record, op, _) = build("open sesame", &["open", "open valve V-1"]).await;
        assert_eq!(record.unwrap().len(), 2);
        assert_eq!(op.prompts, vec![Prompt::NewPhrase, Prompt::NewPhrase]);
        assert_eq!(op.notices[0], Notice::UnknownToken { token: "sesame".into() });
        assert_eq!(op.notices[1], Notice::TrivialIntent { phrase: "open".into() });
    }

    #[tokio::test]
    async fn test_phrase_attempts_are_bounded() {
        let (err, op, _) = build("x", &["y", "z", "w", "v"]).await;
        assert!(matches!(err, Err(Error::RetriesExhausted { stage: "phrase", attempts: 5 })));
        assert_eq!(op.remaining(), 0);
    }
}
