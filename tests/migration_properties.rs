//! Property tests for subscriber migration across context rebuilds.
//!
//! Whatever mix of subscriptions, duplicate subscriptions, removals and
//! rebuilds is applied, validation must reach exactly the live handlers, in
//! registration order, on the current context only.

use std::sync::{Arc, Mutex};

use calmform::form::{FormOptions, FormSession, ValidationRequestedHandler};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Subscribe,
    Duplicate(usize),
    Unsubscribe(usize),
    Reset,
    ValidationReset,
    ReplaceModel,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Subscribe),
        2 => (0usize..16).prop_map(Op::Duplicate),
        2 => (0usize..16).prop_map(Op::Unsubscribe),
        1 => Just(Op::Reset),
        1 => Just(Op::ValidationReset),
        1 => Just(Op::ReplaceModel),
    ]
}

struct Harness {
    session: FormSession<String>,
    log: Arc<Mutex<Vec<usize>>>,
    handlers: Vec<(usize, ValidationRequestedHandler<String>)>,
    expected: Vec<usize>,
}

impl Harness {
    fn new() -> Self {
        Self {
            session: FormSession::new(String::from("draft"), FormOptions::default())
                .expect("session"),
            log: Arc::new(Mutex::new(Vec::new())),
            handlers: Vec::new(),
            expected: Vec::new(),
        }
    }

    fn apply(&mut self, op: &Op) {
        let before = self.session.edit_context().expect("context");
        match op {
            Op::Subscribe => {
                let id = self.handlers.len();
                let log = self.log.clone();
                let handler = self
                    .session
                    .on_validation_requested(move |_, _| {
                        log.lock().expect("log lock").push(id);
                    })
                    .expect("subscribe");
                self.handlers.push((id, handler));
                self.expected.push(id);
            }
            Op::Duplicate(index) => {
                let Some((id, handler)) = pick(&self.handlers, *index) else {
                    return;
                };
                before
                    .subscribe_validation_requested(&handler)
                    .expect("duplicate subscribe");
                self.expected.push(id);
            }
            Op::Unsubscribe(index) => {
                let Some((id, handler)) = pick(&self.handlers, *index) else {
                    return;
                };
                let removed = before
                    .unsubscribe_validation_requested(&handler)
                    .expect("unsubscribe");
                let position = self.expected.iter().rposition(|entry| *entry == id);
                assert_eq!(removed, position.is_some());
                if let Some(position) = position {
                    self.expected.remove(position);
                }
            }
            Op::Reset => self.session.reset().expect("reset"),
            Op::ValidationReset => self
                .session
                .validation_reset()
                .expect("validation reset"),
            Op::ReplaceModel => self
                .session
                .set_model(String::from("replacement"))
                .expect("replace model"),
        }

        let after = self.session.edit_context().expect("context");
        if before.id() != after.id() {
            assert!(before.subscribers().expect("old subscribers").is_empty());
        }
    }
}

fn pick(
    handlers: &[(usize, ValidationRequestedHandler<String>)],
    index: usize,
) -> Option<(usize, ValidationRequestedHandler<String>)> {
    if handlers.is_empty() {
        return None;
    }
    handlers.get(index % handlers.len()).cloned()
}

proptest! {
    #[test]
    fn validation_reaches_live_handlers_in_order(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut harness = Harness::new();
        for op in &ops {
            harness.apply(op);
        }

        harness.log.lock().expect("log lock").clear();
        harness.session.validate().expect("validate");

        let subscribers = harness
            .session
            .edit_context()
            .expect("context")
            .subscribers()
            .expect("subscribers");
        // one strategy handler per list besides the user handlers
        prop_assert_eq!(subscribers.field_changed.len(), 1);
        prop_assert_eq!(subscribers.validation_requested.len(), harness.expected.len() + 1);
        let log = harness.log.lock().expect("log lock").clone();
        prop_assert_eq!(log, harness.expected.clone());
    }

    #[test]
    fn rebuilds_preserve_subscriber_identity(rebuilds in 1usize..8, subscriptions in 1usize..6) {
        let session: FormSession<String> =
            FormSession::new(String::new(), FormOptions::default()).expect("session");
        for _ in 0..subscriptions {
            session.on_field_changed(|_, _| {}).expect("subscribe");
            session.on_validation_state_changed(|_, _| {}).expect("subscribe");
        }
        let snapshot = session
            .edit_context()
            .expect("context")
            .subscribers()
            .expect("subscribers");

        for _ in 0..rebuilds {
            session.validation_reset().expect("rebuild");
        }

        let migrated = session
            .edit_context()
            .expect("context")
            .subscribers()
            .expect("subscribers");
        prop_assert!(migrated.same_as(&snapshot));
        prop_assert_eq!(migrated.len(), 2 + 2 * subscriptions);
    }
}
