use std::sync::{Arc, RwLock};

use tracing::{trace, warn};

use super::context::{
    EditContext, ErrorMap, FieldChanged, FieldChangedHandler, Handler, ValidationRequested,
    ValidationRequestedHandler,
};
use super::error::{FormResult, read_lock};
use super::field::FieldKey;
use super::item::{FieldItem, Registry, find_item};
use super::locale::ValidateMessages;
use super::session::{FormOptions, FormValidateMode};

/// Which validator owns the field-changed and validation-requested events of a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationStrategy {
    /// Model-level validation through an [`AnnotationValidator`].
    Annotation,
    /// Per-item rule validation through registered [`FieldItem`]s.
    Rule,
}

impl ValidationStrategy {
    pub fn select(options: &FormOptions) -> Self {
        if options.locale.uses_locale_validate_messages()
            || options.validate_mode != FormValidateMode::Default
        {
            Self::Rule
        } else {
            Self::Annotation
        }
    }
}

/// Whole-model validator used by [`ValidationStrategy::Annotation`].
pub trait AnnotationValidator<T>: Send + Sync {
    fn validate(&self, model: &T) -> Vec<(FieldKey, String)>;
}

impl<T, F> AnnotationValidator<T> for F
where
    F: Fn(&T) -> Vec<(FieldKey, String)> + Send + Sync,
{
    fn validate(&self, model: &T) -> Vec<(FieldKey, String)> {
        (self)(model)
    }
}

pub(crate) type SharedAnnotationValidator<T> = Arc<dyn AnnotationValidator<T>>;

/// Session state the strategy handlers read; none of it belongs to a context.
pub(crate) struct StrategyDeps<T> {
    pub(crate) items: Arc<RwLock<Registry<dyn FieldItem<T>>>>,
    pub(crate) annotations: Arc<RwLock<Option<SharedAnnotationValidator<T>>>>,
    pub(crate) messages: Arc<RwLock<ValidateMessages>>,
}

impl<T> Clone for StrategyDeps<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            annotations: self.annotations.clone(),
            messages: self.messages.clone(),
        }
    }
}

/// The pair of handlers one strategy attaches to the live context.
pub(crate) struct StrategyHandlers<T> {
    strategy: ValidationStrategy,
    field_changed: FieldChangedHandler<T>,
    validation_requested: ValidationRequestedHandler<T>,
}

impl<T> StrategyHandlers<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(strategy: ValidationStrategy, deps: StrategyDeps<T>) -> Self {
        let (field_changed, validation_requested) = match strategy {
            ValidationStrategy::Annotation => {
                let on_change = deps.clone();
                let on_request = deps;
                (
                    Handler::new(move |context: &EditContext<T>, event: &FieldChanged| {
                        report(
                            context,
                            strategy,
                            "field-changed",
                            annotation_field_changed(context, event, &on_change),
                        )
                    }),
                    Handler::new(move |context: &EditContext<T>, _: &ValidationRequested| {
                        report(
                            context,
                            strategy,
                            "validation-requested",
                            annotation_validation_requested(context, &on_request),
                        )
                    }),
                )
            }
            ValidationStrategy::Rule => {
                let on_change = deps.clone();
                let on_request = deps;
                (
                    Handler::new(move |context: &EditContext<T>, event: &FieldChanged| {
                        report(
                            context,
                            strategy,
                            "field-changed",
                            rule_field_changed(context, event, &on_change),
                        )
                    }),
                    Handler::new(move |context: &EditContext<T>, _: &ValidationRequested| {
                        report(
                            context,
                            strategy,
                            "validation-requested",
                            rule_validation_requested(context, &on_request),
                        )
                    }),
                )
            }
        };
        Self {
            strategy,
            field_changed,
            validation_requested,
        }
    }

    pub(crate) fn strategy(&self) -> ValidationStrategy {
        self.strategy
    }

    pub(crate) fn attach(&self, context: &EditContext<T>) -> FormResult<()> {
        context.subscribe_field_changed(&self.field_changed)?;
        context.subscribe_validation_requested(&self.validation_requested)
    }

    pub(crate) fn detach(&self, context: &EditContext<T>) -> FormResult<()> {
        context.unsubscribe_field_changed(&self.field_changed)?;
        context.unsubscribe_validation_requested(&self.validation_requested)?;
        Ok(())
    }

    pub(crate) fn is_attached(&self, context: &EditContext<T>) -> FormResult<bool> {
        let subscribers = context.subscribers()?;
        Ok(subscribers
            .field_changed
            .iter()
            .any(|handler| handler.same(&self.field_changed))
            && subscribers
                .validation_requested
                .iter()
                .any(|handler| handler.same(&self.validation_requested)))
    }
}

// A failed handler leaves the message store incomplete, so the pass must not read as valid.
fn report<T>(
    context: &EditContext<T>,
    strategy: ValidationStrategy,
    event: &'static str,
    result: FormResult<()>,
) where
    T: Clone + Send + Sync + 'static,
{
    if let Err(error) = result {
        warn!(
            context_id = context.id().0,
            ?strategy,
            event,
            %error,
            "validation strategy handler failed"
        );
        context.mark_validation_faulted();
    }
}

fn rule_field_changed<T>(
    context: &EditContext<T>,
    event: &FieldChanged,
    deps: &StrategyDeps<T>,
) -> FormResult<()>
where
    T: Clone + Send + Sync + 'static,
{
    context.clear_field_messages(&event.field)?;
    let Some(item) = find_item(&deps.items, context, &event.field)? else {
        trace!(field = %event.field, "no form item registered for changed field");
        return Ok(());
    };

    let messages = read_lock(&deps.messages, "reading validate messages")?.clone();
    let errors = item
        .validate_against_rules(context, &messages)?
        .into_iter()
        .map(|error| error.message)
        .collect::<Vec<_>>();
    context.set_field_messages(event.field.clone(), errors.clone())?;
    item.display_errors(errors);
    context.notify_validation_state_changed()
}

fn rule_validation_requested<T>(context: &EditContext<T>, deps: &StrategyDeps<T>) -> FormResult<()>
where
    T: Clone + Send + Sync + 'static,
{
    context.clear_messages()?;
    let messages = read_lock(&deps.messages, "reading validate messages")?.clone();
    let items = read_lock(&deps.items, "reading form items for validation")?.snapshot();

    let mut errors = ErrorMap::new();
    for item in &items {
        let result = item.validate_against_rules(context, &messages)?;
        if !result.is_empty() {
            errors.insert(
                item.field_identity(context),
                result.into_iter().map(|error| error.message).collect(),
            );
        }
    }
    display_errors(context, &items, errors)
}

fn annotation_field_changed<T>(
    context: &EditContext<T>,
    event: &FieldChanged,
    deps: &StrategyDeps<T>,
) -> FormResult<()>
where
    T: Clone + Send + Sync + 'static,
{
    let field_errors = annotation_errors(context, deps)?
        .shift_remove(&event.field)
        .unwrap_or_default();
    context.set_field_messages(event.field.clone(), field_errors.clone())?;
    if let Some(item) = find_item(&deps.items, context, &event.field)? {
        item.display_errors(field_errors);
    }
    context.notify_validation_state_changed()
}

fn annotation_validation_requested<T>(
    context: &EditContext<T>,
    deps: &StrategyDeps<T>,
) -> FormResult<()>
where
    T: Clone + Send + Sync + 'static,
{
    context.clear_messages()?;
    let errors = annotation_errors(context, deps)?;
    let items = read_lock(&deps.items, "reading form items for validation")?.snapshot();
    display_errors(context, &items, errors)
}

fn annotation_errors<T>(context: &EditContext<T>, deps: &StrategyDeps<T>) -> FormResult<ErrorMap>
where
    T: Clone + Send + Sync + 'static,
{
    let Some(validator) = read_lock(&deps.annotations, "reading annotation validator")?.clone()
    else {
        return Ok(ErrorMap::new());
    };
    let found = validator.validate(&*context.model().read()?);

    let mut errors = ErrorMap::new();
    for (key, message) in found {
        errors
            .entry(context.field(key.as_str()))
            .or_default()
            .push(message);
    }
    Ok(errors)
}

/// Stores the full mapping, then pushes each item its own list (empty when absent).
fn display_errors<T>(
    context: &EditContext<T>,
    items: &[Arc<dyn FieldItem<T>>],
    errors: ErrorMap,
) -> FormResult<()>
where
    T: Clone + Send + Sync + 'static,
{
    for (field, messages) in &errors {
        context.set_field_messages(field.clone(), messages.clone())?;
    }
    for item in items {
        let own = errors
            .get(&item.field_identity(context))
            .cloned()
            .unwrap_or_default();
        item.display_errors(own);
    }
    Ok(())
}
