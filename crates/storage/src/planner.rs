//! Scan planning
//!
//! A [`StatementPattern`] names the bound components of a scan. Planning
//! resolves them through the interner and picks, per requested context,
//! the shortest candidate list to drive the scan:
//!
//! 1. Any bound term that was never interned ⇒ no plan (empty result).
//! 2. Candidate lists: bound subject / predicate / object back-references,
//!    plus the context back-references when the plan targets one named
//!    context.
//! 3. The shortest list wins; with nothing bound the arena's slot table
//!    drives the scan.
//!
//! Several contexts produce one plan each. Their results are concatenated,
//! not de-duplicated, which is safe because a statement has exactly one
//! context.

use quadmem_core::{Position, Quad, StatementId, Term, ValueId};
use smallvec::SmallVec;

use crate::arena::StatementRecord;
use crate::store::StoreState;

/// Pattern of a statement scan
///
/// Unbound components match anything. `contexts` is a set: empty means any
/// context, a `None` element means the default graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementPattern {
    /// Bound subject
    pub subject: Option<Term>,
    /// Bound predicate
    pub predicate: Option<Term>,
    /// Bound object
    pub object: Option<Term>,
    /// Requested contexts (empty = all)
    pub contexts: Vec<Option<Term>>,
    /// Skip inferred statements
    pub explicit_only: bool,
}

impl StatementPattern {
    /// Pattern matching every statement
    pub fn any() -> Self {
        Self::default()
    }

    /// Pattern from optional components
    pub fn new(subject: Option<Term>, predicate: Option<Term>, object: Option<Term>) -> Self {
        Self {
            subject,
            predicate,
            object,
            ..Self::default()
        }
    }

    /// Pattern matching exactly the terms of `quad`
    pub fn for_quad(quad: &Quad) -> Self {
        Self {
            subject: Some(quad.subject.clone()),
            predicate: Some(quad.predicate.clone()),
            object: Some(quad.object.clone()),
            contexts: vec![quad.context.clone()],
            explicit_only: false,
        }
    }

    /// Bind the subject
    pub fn with_subject(mut self, subject: Term) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Bind the predicate
    pub fn with_predicate(mut self, predicate: Term) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Bind the object
    pub fn with_object(mut self, object: Term) -> Self {
        self.object = Some(object);
        self
    }

    /// Add a context to the requested set (`None` = default graph)
    pub fn in_context(mut self, context: Option<Term>) -> Self {
        self.contexts.push(context);
        self
    }

    /// Add several contexts to the requested set
    pub fn in_contexts(mut self, contexts: impl IntoIterator<Item = Option<Term>>) -> Self {
        self.contexts.extend(contexts);
        self
    }

    /// Restrict to explicit statements
    pub fn explicit_only(mut self, explicit_only: bool) -> Self {
        self.explicit_only = explicit_only;
        self
    }
}

/// Context restriction of a single plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContextFilter {
    Any,
    Default,
    Named(ValueId),
}

impl ContextFilter {
    fn accepts(self, context: Option<ValueId>) -> bool {
        match self {
            ContextFilter::Any => true,
            ContextFilter::Default => context.is_none(),
            ContextFilter::Named(id) => context == Some(id),
        }
    }
}

/// Candidate list driving a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Driver {
    /// Every arena slot
    Slots,
    /// Back-references of one value in one position
    Refs(ValueId, Position),
}

/// A resolved scan over one context restriction
#[derive(Debug, Clone)]
pub(crate) struct ScanPlan {
    subject: Option<ValueId>,
    predicate: Option<ValueId>,
    object: Option<ValueId>,
    context: ContextFilter,
    pub(crate) driver: Driver,
}

/// Outcome of looking at one candidate position
pub(crate) enum Candidate {
    Exhausted,
    Vacant,
    Entry(StatementId),
}

impl ScanPlan {
    /// Candidate at `position` of the driving list
    pub(crate) fn candidate(&self, state: &StoreState, position: usize) -> Candidate {
        match self.driver {
            Driver::Slots => {
                if position >= state.arena().capacity() {
                    Candidate::Exhausted
                } else {
                    match state.arena().slot(position) {
                        Some((id, _)) => Candidate::Entry(id),
                        None => Candidate::Vacant,
                    }
                }
            }
            Driver::Refs(value, pos) => match state.interner().refs(value, pos).get(position) {
                Some(id) => Candidate::Entry(*id),
                None => Candidate::Exhausted,
            },
        }
    }

    /// Length of the driving list
    pub(crate) fn driver_len(&self, state: &StoreState) -> usize {
        match self.driver {
            Driver::Slots => state.arena().len(),
            Driver::Refs(value, pos) => state.interner().refs(value, pos).len(),
        }
    }

    /// Check a record against the bound components
    pub(crate) fn matches(&self, record: &StatementRecord) -> bool {
        self.subject.map_or(true, |id| record.subject == id)
            && self.predicate.map_or(true, |id| record.predicate == id)
            && self.object.map_or(true, |id| record.object == id)
            && self.context.accepts(record.context)
    }
}

/// Plans for a pattern; `None` when the pattern cannot match anything
pub(crate) type Plans = SmallVec<[ScanPlan; 2]>;

/// Resolve `pattern` against the current interner state
pub(crate) fn plan(state: &StoreState, pattern: &StatementPattern) -> Option<Plans> {
    let interner = state.interner();
    let resolve = |term: &Option<Term>| -> Option<Option<ValueId>> {
        match term {
            None => Some(None),
            Some(t) => interner.lookup(t).map(Some),
        }
    };
    let subject = resolve(&pattern.subject)?;
    let predicate = resolve(&pattern.predicate)?;
    let object = resolve(&pattern.object)?;

    let filters: SmallVec<[ContextFilter; 2]> = if pattern.contexts.is_empty() {
        smallvec::smallvec![ContextFilter::Any]
    } else {
        pattern
            .contexts
            .iter()
            .filter_map(|ctx| match ctx {
                None => Some(ContextFilter::Default),
                Some(t) => interner.lookup_resource(t).map(ContextFilter::Named),
            })
            .collect()
    };
    if filters.is_empty() {
        return None;
    }

    let plans = filters
        .into_iter()
        .map(|context| {
            let mut best: Option<(usize, Driver)> = None;
            let bound = [
                (subject, Position::Subject),
                (predicate, Position::Predicate),
                (object, Position::Object),
                (
                    match context {
                        ContextFilter::Named(id) => Some(id),
                        _ => None,
                    },
                    Position::Context,
                ),
            ];
            for (value, pos) in bound {
                if let Some(value) = value {
                    let len = interner.refs(value, pos).len();
                    if best.map_or(true, |(best_len, _)| len < best_len) {
                        best = Some((len, Driver::Refs(value, pos)));
                    }
                }
            }
            ScanPlan {
                subject,
                predicate,
                object,
                context,
                driver: best.map_or(Driver::Slots, |(_, driver)| driver),
            }
        })
        .collect();
    Some(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadmem_core::Quad;

    fn iri(s: &str) -> Term {
        Term::iri(format!("http://example.org/{}", s))
    }

    fn state_with(quads: &[Quad]) -> StoreState {
        let mut state = StoreState::new();
        for quad in quads {
            state.insert_quad(quad, true, 1).unwrap();
        }
        state
    }

    #[test]
    fn test_unknown_term_yields_no_plan() {
        let state = state_with(&[Quad::triple(iri("a"), iri("p"), iri("b"))]);
        let pattern = StatementPattern::any().with_subject(iri("missing"));
        assert!(plan(&state, &pattern).is_none());
    }

    #[test]
    fn test_unbound_pattern_drives_from_slots() {
        let state = state_with(&[Quad::triple(iri("a"), iri("p"), iri("b"))]);
        let plans = plan(&state, &StatementPattern::any()).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].driver, Driver::Slots);
    }

    #[test]
    fn test_shortest_list_drives() {
        // p is shared by three statements, a only by one
        let state = state_with(&[
            Quad::triple(iri("a"), iri("p"), iri("x")),
            Quad::triple(iri("b"), iri("p"), iri("x")),
            Quad::triple(iri("c"), iri("p"), iri("x")),
        ]);
        let a = state.interner().lookup(&iri("a")).unwrap();
        let pattern = StatementPattern::any()
            .with_subject(iri("a"))
            .with_predicate(iri("p"));
        let plans = plan(&state, &pattern).unwrap();
        assert_eq!(plans[0].driver, Driver::Refs(a, Position::Subject));
        assert_eq!(plans[0].driver_len(&state), 1);
    }

    #[test]
    fn test_single_context_can_drive() {
        let g = iri("g");
        let state = state_with(&[
            Quad::triple(iri("a"), iri("p"), iri("x")),
            Quad::triple(iri("a"), iri("p"), iri("y")),
            Quad::new(iri("a"), iri("p"), iri("z"), Some(g.clone())),
        ]);
        let g_id = state.interner().lookup(&g).unwrap();
        let pattern = StatementPattern::any()
            .with_subject(iri("a"))
            .in_context(Some(g));
        let plans = plan(&state, &pattern).unwrap();
        assert_eq!(plans[0].driver, Driver::Refs(g_id, Position::Context));
    }

    #[test]
    fn test_unknown_contexts_are_dropped() {
        let g = iri("g");
        let state = state_with(&[Quad::new(iri("a"), iri("p"), iri("x"), Some(g.clone()))]);
        let pattern = StatementPattern::any()
            .in_context(Some(iri("nope")))
            .in_context(Some(g));
        assert_eq!(plan(&state, &pattern).unwrap().len(), 1);

        let none_known = StatementPattern::any().in_context(Some(iri("nope")));
        assert!(plan(&state, &none_known).is_none());
    }

    #[test]
    fn test_default_graph_context_filter() {
        assert!(ContextFilter::Default.accepts(None));
        assert!(!ContextFilter::Default.accepts(Some(ValueId::new(0))));
        assert!(ContextFilter::Any.accepts(Some(ValueId::new(0))));
        assert!(ContextFilter::Named(ValueId::new(1)).accepts(Some(ValueId::new(1))));
    }
}
