use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tracing::trace;

use super::error::{FormResult, read_lock, write_lock};
use super::field::{FieldIdentity, FieldLens, Model};

static CONTEXT_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

/// Per-field validation messages in the order the fields were first reported.
pub type ErrorMap = IndexMap<FieldIdentity, Vec<String>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ContextId(pub u64);

impl ContextId {
    fn next() -> Self {
        Self(CONTEXT_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldChanged {
    pub field: FieldIdentity,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ValidationRequested;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ValidationStateChanged;

/// A subscriber callback. Equality is callback identity: clones of one
/// handler are the same subscriber, two handlers built from equal closures are not.
pub struct Handler<T, A> {
    callback: Arc<dyn Fn(&EditContext<T>, &A) + Send + Sync>,
}

impl<T, A> Handler<T, A> {
    pub fn new(callback: impl Fn(&EditContext<T>, &A) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(&other.callback))
    }

    fn call(&self, context: &EditContext<T>, args: &A) {
        (self.callback)(context, args)
    }
}

impl<T, A> Clone for Handler<T, A> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
        }
    }
}

impl<T, A> Debug for Handler<T, A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handler")
            .field(&Arc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

pub type FieldChangedHandler<T> = Handler<T, FieldChanged>;
pub type ValidationRequestedHandler<T> = Handler<T, ValidationRequested>;
pub type ValidationStateChangedHandler<T> = Handler<T, ValidationStateChanged>;

struct SubscriberList<T, A> {
    handlers: Vec<Handler<T, A>>,
}

impl<T, A> SubscriberList<T, A> {
    fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    fn add(&mut self, handler: Handler<T, A>) {
        self.handlers.push(handler);
    }

    // Removes the most recent registration only.
    fn remove(&mut self, handler: &Handler<T, A>) -> bool {
        match self.handlers.iter().rposition(|h| h.same(handler)) {
            Some(index) => {
                self.handlers.remove(index);
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Vec<Handler<T, A>> {
        self.handlers.clone()
    }

    fn take(&mut self) -> Vec<Handler<T, A>> {
        std::mem::take(&mut self.handlers)
    }

    fn extend(&mut self, handlers: Vec<Handler<T, A>>) {
        self.handlers.extend(handlers);
    }
}

/// Registration-ordered copy of every subscriber list of one context.
pub struct SubscriberSnapshot<T> {
    pub field_changed: Vec<FieldChangedHandler<T>>,
    pub validation_requested: Vec<ValidationRequestedHandler<T>>,
    pub validation_state_changed: Vec<ValidationStateChangedHandler<T>>,
}

impl<T> SubscriberSnapshot<T> {
    pub fn len(&self) -> usize {
        self.field_changed.len()
            + self.validation_requested.len()
            + self.validation_state_changed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same handlers in the same order, list by list.
    pub fn same_as(&self, other: &Self) -> bool {
        fn same_list<T, A>(left: &[Handler<T, A>], right: &[Handler<T, A>]) -> bool {
            left.len() == right.len() && left.iter().zip(right).all(|(l, r)| l.same(r))
        }
        same_list(&self.field_changed, &other.field_changed)
            && same_list(&self.validation_requested, &other.validation_requested)
            && same_list(
                &self.validation_state_changed,
                &other.validation_state_changed,
            )
    }
}

/// Live binding of one model: subscriber lists, validation messages and
/// modification tracking against the snapshot taken at construction.
pub struct EditContext<T> {
    id: ContextId,
    model: Model<T>,
    initial: T,
    field_changed: RwLock<SubscriberList<T, FieldChanged>>,
    validation_requested: RwLock<SubscriberList<T, ValidationRequested>>,
    validation_state_changed: RwLock<SubscriberList<T, ValidationStateChanged>>,
    messages: RwLock<ErrorMap>,
    modified: RwLock<BTreeSet<FieldIdentity>>,
    faulted: AtomicBool,
}

impl<T> EditContext<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(model: Model<T>) -> FormResult<Self> {
        let initial = model.snapshot()?;
        Ok(Self {
            id: ContextId::next(),
            model,
            initial,
            field_changed: RwLock::new(SubscriberList::new()),
            validation_requested: RwLock::new(SubscriberList::new()),
            validation_state_changed: RwLock::new(SubscriberList::new()),
            messages: RwLock::new(ErrorMap::new()),
            modified: RwLock::new(BTreeSet::new()),
            faulted: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn model(&self) -> &Model<T> {
        &self.model
    }

    /// Resolves a field of the wrapped model by name.
    pub fn field(&self, name: impl Into<Cow<'static, str>>) -> FieldIdentity {
        self.model.field(name)
    }

    pub fn field_for<L>(&self, lens: L) -> FieldIdentity
    where
        L: FieldLens<T>,
    {
        self.model.field(lens.key().as_str())
    }

    pub fn subscribe_field_changed(&self, handler: &FieldChangedHandler<T>) -> FormResult<()> {
        write_lock(&self.field_changed, "subscribing to field changes")?.add(handler.clone());
        Ok(())
    }

    pub fn unsubscribe_field_changed(&self, handler: &FieldChangedHandler<T>) -> FormResult<bool> {
        Ok(write_lock(&self.field_changed, "unsubscribing from field changes")?.remove(handler))
    }

    pub fn subscribe_validation_requested(
        &self,
        handler: &ValidationRequestedHandler<T>,
    ) -> FormResult<()> {
        write_lock(
            &self.validation_requested,
            "subscribing to validation requests",
        )?
        .add(handler.clone());
        Ok(())
    }

    pub fn unsubscribe_validation_requested(
        &self,
        handler: &ValidationRequestedHandler<T>,
    ) -> FormResult<bool> {
        Ok(write_lock(
            &self.validation_requested,
            "unsubscribing from validation requests",
        )?
        .remove(handler))
    }

    pub fn subscribe_validation_state_changed(
        &self,
        handler: &ValidationStateChangedHandler<T>,
    ) -> FormResult<()> {
        write_lock(
            &self.validation_state_changed,
            "subscribing to validation state changes",
        )?
        .add(handler.clone());
        Ok(())
    }

    pub fn unsubscribe_validation_state_changed(
        &self,
        handler: &ValidationStateChangedHandler<T>,
    ) -> FormResult<bool> {
        Ok(write_lock(
            &self.validation_state_changed,
            "unsubscribing from validation state changes",
        )?
        .remove(handler))
    }

    pub fn subscribers(&self) -> FormResult<SubscriberSnapshot<T>> {
        Ok(SubscriberSnapshot {
            field_changed: read_lock(&self.field_changed, "reading field-changed subscribers")?
                .snapshot(),
            validation_requested: read_lock(
                &self.validation_requested,
                "reading validation-requested subscribers",
            )?
            .snapshot(),
            validation_state_changed: read_lock(
                &self.validation_state_changed,
                "reading validation-state subscribers",
            )?
            .snapshot(),
        })
    }

    /// Marks `field` modified and fans the change out to field-changed subscribers.
    pub fn notify_field_changed(&self, field: &FieldIdentity) -> FormResult<()> {
        write_lock(&self.modified, "marking field modified")?.insert(field.clone());
        self.dispatch_field_changed(field)
    }

    /// Writes `value` through `lens`, then raises field-changed. The field
    /// counts as modified only while it differs from the initial snapshot.
    pub fn update_field<L>(&self, lens: L, value: L::Value) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let field = self.field_for(lens);
        let is_dirty = {
            let mut model = self.model.write()?;
            lens.set(&mut model, value);
            lens.get(&model) != lens.get(&self.initial)
        };
        {
            let mut modified = write_lock(&self.modified, "tracking field modification")?;
            if is_dirty {
                modified.insert(field.clone());
            } else {
                modified.remove(&field);
            }
        }
        self.dispatch_field_changed(&field)
    }

    pub fn notify_validation_state_changed(&self) -> FormResult<()> {
        self.dispatch(
            &self.validation_state_changed,
            &ValidationStateChanged,
            "dispatching validation-state-changed",
        )
    }

    /// Raises validation-requested, then validation-state-changed, and
    /// reports whether the message store is empty afterwards.
    ///
    /// A pass during which any handler called [`mark_validation_faulted`]
    /// is reported as invalid whatever the store holds.
    ///
    /// [`mark_validation_faulted`]: Self::mark_validation_faulted
    pub fn validate(&self) -> FormResult<bool> {
        self.faulted.store(false, Ordering::SeqCst);
        self.dispatch(
            &self.validation_requested,
            &ValidationRequested,
            "dispatching validation-requested",
        )?;
        self.notify_validation_state_changed()?;
        if self.is_validation_faulted() {
            return Ok(false);
        }
        Ok(read_lock(&self.messages, "reading validation result")?
            .values()
            .all(Vec::is_empty))
    }

    /// Records that a handler could not finish validating the model.
    pub fn mark_validation_faulted(&self) {
        self.faulted.store(true, Ordering::SeqCst);
    }

    pub fn is_validation_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    pub fn is_modified(&self) -> FormResult<bool> {
        Ok(!read_lock(&self.modified, "reading modification state")?.is_empty())
    }

    pub fn is_field_modified(&self, field: &FieldIdentity) -> FormResult<bool> {
        Ok(read_lock(&self.modified, "reading field modification state")?.contains(field))
    }

    /// Clears modification tracking for one field, or for all when `field` is `None`.
    pub fn mark_as_unmodified(&self, field: Option<&FieldIdentity>) -> FormResult<()> {
        let mut modified = write_lock(&self.modified, "clearing modification state")?;
        match field {
            Some(field) => {
                modified.remove(field);
            }
            None => modified.clear(),
        }
        Ok(())
    }

    pub fn field_messages(&self, field: &FieldIdentity) -> FormResult<Vec<String>> {
        Ok(read_lock(&self.messages, "reading field messages")?
            .get(field)
            .cloned()
            .unwrap_or_default())
    }

    pub fn validation_messages(&self) -> FormResult<Vec<String>> {
        Ok(read_lock(&self.messages, "reading validation messages")?
            .values()
            .flatten()
            .cloned()
            .collect())
    }

    pub fn error_map(&self) -> FormResult<ErrorMap> {
        Ok(read_lock(&self.messages, "reading error map")?.clone())
    }

    /// Replaces the messages of one field; an empty list removes the entry.
    pub fn set_field_messages(
        &self,
        field: FieldIdentity,
        messages: Vec<String>,
    ) -> FormResult<()> {
        let mut store = write_lock(&self.messages, "writing field messages")?;
        if messages.is_empty() {
            store.shift_remove(&field);
        } else {
            store.insert(field, messages);
        }
        Ok(())
    }

    pub fn clear_field_messages(&self, field: &FieldIdentity) -> FormResult<()> {
        write_lock(&self.messages, "clearing field messages")?.shift_remove(field);
        Ok(())
    }

    pub fn clear_messages(&self) -> FormResult<()> {
        write_lock(&self.messages, "clearing validation messages")?.clear();
        Ok(())
    }

    /// Moves every subscriber of this context onto `target`, list by list,
    /// preserving registration order. This context is left without subscribers.
    pub(crate) fn migrate_subscribers_into(&self, target: &EditContext<T>) -> FormResult<usize> {
        let moved = move_subscribers(&self.field_changed, &target.field_changed)?
            + move_subscribers(&self.validation_requested, &target.validation_requested)?
            + move_subscribers(
                &self.validation_state_changed,
                &target.validation_state_changed,
            )?;
        trace!(
            from = self.id.0,
            to = target.id.0,
            moved,
            "edit context subscribers migrated"
        );
        Ok(moved)
    }

    fn dispatch_field_changed(&self, field: &FieldIdentity) -> FormResult<()> {
        self.dispatch(
            &self.field_changed,
            &FieldChanged {
                field: field.clone(),
            },
            "dispatching field-changed",
        )
    }

    fn dispatch<A>(
        &self,
        list: &RwLock<SubscriberList<T, A>>,
        args: &A,
        event: &'static str,
    ) -> FormResult<()> {
        // Handlers run without the list lock held so they may (un)subscribe.
        let handlers = read_lock(list, event)?.snapshot();
        trace!(
            context_id = self.id.0,
            event,
            subscribers = handlers.len(),
            "edit context event"
        );
        for handler in handlers {
            handler.call(self, args);
        }
        Ok(())
    }
}

impl<T> Debug for EditContext<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditContext")
            .field("id", &self.id)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

fn move_subscribers<T, A>(
    from: &RwLock<SubscriberList<T, A>>,
    to: &RwLock<SubscriberList<T, A>>,
) -> FormResult<usize> {
    let handlers = write_lock(from, "detaching subscribers for migration")?.take();
    let count = handlers.len();
    write_lock(to, "attaching migrated subscribers")?.extend(handlers);
    Ok(count)
}
