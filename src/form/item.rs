use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use super::context::EditContext;
use super::contract::FormSessionInternal;
use super::error::{FormResult, read_lock};
use super::field::{FieldIdentity, FieldLens};
use super::locale::ValidateMessages;
use super::rules::{FieldRule, RuleError, SharedRule};
use super::session::LiveModel;

/// A registered form field: resolves its identity against the live context,
/// validates itself against its rules and displays pushed messages.
pub trait FieldItem<T>: Send + Sync {
    fn field_identity(&self, context: &EditContext<T>) -> FieldIdentity;

    fn validate_against_rules(
        &self,
        context: &EditContext<T>,
        messages: &ValidateMessages,
    ) -> FormResult<Vec<RuleError>>;

    fn display_errors(&self, messages: Vec<String>);
}

/// A registered input control that can restore its value.
pub trait ControlAccessor: Send + Sync {
    fn reset(&self);
}

/// Registration-ordered set of capability objects compared by pointer.
pub(crate) struct Registry<I: ?Sized> {
    entries: Vec<Arc<I>>,
}

impl<I: ?Sized> Registry<I> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, entry: Arc<I>) -> bool {
        if self.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub(crate) fn remove(&mut self, entry: &Arc<I>) -> bool {
        match self
            .entries
            .iter()
            .position(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(entry)))
        {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, entry: &Arc<I>) -> bool {
        self.entries
            .iter()
            .any(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(entry)))
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<I>> {
        self.entries.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(crate) fn find_item<T>(
    items: &RwLock<Registry<dyn FieldItem<T>>>,
    context: &EditContext<T>,
    field: &FieldIdentity,
) -> FormResult<Option<Arc<dyn FieldItem<T>>>> {
    Ok(read_lock(items, "looking up form item")?
        .snapshot()
        .into_iter()
        .find(|item| &item.field_identity(context) == field))
}

/// A [`FieldItem`] bound to one lens, with a label and a rule list.
pub struct FormField<T, L>
where
    L: FieldLens<T>,
{
    lens: L,
    label: String,
    rules: Vec<SharedRule<L::Value>>,
    displayed: RwLock<Vec<String>>,
    _model: PhantomData<fn(&T)>,
}

impl<T, L> FormField<T, L>
where
    T: Clone + Send + Sync + 'static,
    L: FieldLens<T>,
{
    pub fn new(lens: L) -> Self {
        Self {
            lens,
            label: lens.label().to_string(),
            rules: Vec::new(),
            displayed: RwLock::new(Vec::new()),
            _model: PhantomData,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn rule(mut self, rule: impl FieldRule<L::Value> + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn lens(&self) -> L {
        self.lens
    }

    /// Messages most recently pushed for display.
    pub fn errors(&self) -> FormResult<Vec<String>> {
        Ok(read_lock(&self.displayed, "reading displayed field errors")?.clone())
    }
}

impl<T, L> FieldItem<T> for FormField<T, L>
where
    T: Clone + Send + Sync + 'static,
    L: FieldLens<T>,
{
    fn field_identity(&self, context: &EditContext<T>) -> FieldIdentity {
        context.field_for(self.lens)
    }

    fn validate_against_rules(
        &self,
        context: &EditContext<T>,
        messages: &ValidateMessages,
    ) -> FormResult<Vec<RuleError>> {
        let value = self.lens.get(&*context.model().read()?).clone();
        Ok(self
            .rules
            .iter()
            .filter_map(|rule| rule.check(&value, &self.label, messages).err())
            .collect())
    }

    fn display_errors(&self, messages: Vec<String>) {
        match self.displayed.write() {
            Ok(mut displayed) => *displayed = messages,
            Err(poisoned) => *poisoned.into_inner() = messages,
        }
    }
}

impl<T, L> Debug for FormField<T, L>
where
    L: FieldLens<T>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormField")
            .field("field", &self.lens.key())
            .field("label", &self.label)
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

/// A [`ControlAccessor`] that writes back the value the field held when the
/// control was mounted. The write goes to the session's current model, not
/// to the one that was live at mount time.
pub struct FieldControl<T, L>
where
    L: FieldLens<T>,
{
    model: LiveModel<T>,
    lens: L,
    initial: L::Value,
}

impl<T, L> FieldControl<T, L>
where
    T: Clone + Send + Sync + 'static,
    L: FieldLens<T>,
{
    pub fn mount(form: &dyn FormSessionInternal<T>, lens: L) -> FormResult<Self> {
        let model = form.live_model();
        let initial = lens.get(&*model.current()?.read()?).clone();
        Ok(Self {
            model,
            lens,
            initial,
        })
    }

    pub fn initial(&self) -> &L::Value {
        &self.initial
    }
}

impl<T, L> ControlAccessor for FieldControl<T, L>
where
    T: Clone + Send + Sync + 'static,
    L: FieldLens<T>,
{
    fn reset(&self) {
        let value = self.initial.clone();
        let written = self
            .model
            .current()
            .and_then(|model| model.update(|target| self.lens.set(target, value)));
        if let Err(error) = written {
            tracing::warn!(field = %self.lens.key(), %error, "control reset skipped");
        }
    }
}
