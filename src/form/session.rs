use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tracing::debug;

use super::context::{
    EditContext, FieldChanged, FieldChangedHandler, Handler, ValidationRequested,
    ValidationRequestedHandler, ValidationStateChanged, ValidationStateChangedHandler,
};
use super::contract::FormSessionPublic;
use super::error::{FormError, FormResult, read_lock, write_lock};
use super::field::{FieldLens, Model};
use super::item::{ControlAccessor, FieldItem, Registry, find_item};
use super::locale::{FormLocale, ValidateMessages};
use super::strategy::{
    AnnotationValidator, SharedAnnotationValidator, StrategyDeps, StrategyHandlers,
    ValidationStrategy,
};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FormLayout {
    #[default]
    Horizontal,
    Vertical,
    Inline,
}

/// How required/optional labels are marked by the rendering layer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FormRequiredMark {
    #[default]
    Required,
    Optional,
    None,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LabelAlign {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FormValidateMode {
    #[default]
    Default,
    Rules,
    Complex,
}

/// Session configuration. Everything except `validate_mode` and
/// `locale.default_validate_messages` is passed through to the rendering layer.
#[derive(Clone, Debug, PartialEq)]
pub struct FormOptions {
    pub name: Option<String>,
    pub layout: FormLayout,
    pub required_mark: FormRequiredMark,
    pub label_align: Option<LabelAlign>,
    pub validate_mode: FormValidateMode,
    /// Hint for field editors, read through
    /// [`FormSessionInternal::validate_on_change`](super::FormSessionInternal::validate_on_change).
    /// The session itself revalidates a field on every field-changed event either way.
    pub validate_on_change: bool,
    pub locale: FormLocale,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            name: None,
            layout: FormLayout::Horizontal,
            required_mark: FormRequiredMark::Required,
            label_align: None,
            validate_mode: FormValidateMode::Default,
            validate_on_change: false,
            locale: FormLocale::default(),
        }
    }
}

pub type BoxedCallbackFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type FinishSubscriber = Arc<dyn Fn(&dyn FormSessionPublic) + Send + Sync>;

type ContextSlot<T> = RwLock<Option<Arc<EditContext<T>>>>;

/// Handle that resolves a session's current model on every access, so it
/// keeps pointing at the live model across `set_model` and rebuilds.
/// It does not keep the session alive.
pub struct LiveModel<T> {
    slot: Weak<ContextSlot<T>>,
}

impl<T> LiveModel<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Fails with [`FormError::NoContext`] once the session is disposed or dropped.
    pub fn current(&self) -> FormResult<Model<T>> {
        let slot = self.slot.upgrade().ok_or(FormError::NoContext)?;
        let context = read_lock(&slot, "resolving live model")?;
        context
            .as_ref()
            .map(|context| context.model().clone())
            .ok_or(FormError::NoContext)
    }
}

impl<T> Clone for LiveModel<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

pub(super) type FinishCallback<T> =
    Arc<dyn Fn(Arc<EditContext<T>>) -> BoxedCallbackFuture + Send + Sync>;
pub(super) type StateChangedCallback = Arc<dyn Fn() + Send + Sync>;

struct UserHandlers<T> {
    field_changed: Vec<FieldChangedHandler<T>>,
    validation_requested: Vec<ValidationRequestedHandler<T>>,
    validation_state_changed: Vec<ValidationStateChangedHandler<T>>,
}

impl<T> UserHandlers<T> {
    fn new() -> Self {
        Self {
            field_changed: Vec::new(),
            validation_requested: Vec::new(),
            validation_state_changed: Vec::new(),
        }
    }
}

/// One editing session over one model: owns the live [`EditContext`], the
/// active validation strategy and the item/control registries.
#[derive(Clone)]
pub struct FormSession<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: FormId,
    options: Arc<RwLock<FormOptions>>,
    context: Arc<ContextSlot<T>>,
    items: Arc<RwLock<Registry<dyn FieldItem<T>>>>,
    controls: Arc<RwLock<Registry<dyn ControlAccessor>>>,
    annotations: Arc<RwLock<Option<SharedAnnotationValidator<T>>>>,
    validate_messages: Arc<RwLock<ValidateMessages>>,
    strategy: Arc<RwLock<StrategyHandlers<T>>>,
    user_handlers: Arc<RwLock<UserHandlers<T>>>,
    on_finish: Arc<RwLock<Option<FinishCallback<T>>>>,
    on_finish_failed: Arc<RwLock<Option<FinishCallback<T>>>>,
    on_state_changed: Arc<RwLock<Option<StateChangedCallback>>>,
    finish_subscribers: Arc<RwLock<Vec<FinishSubscriber>>>,
}

impl<T> FormSession<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(model: impl Into<Model<T>>, options: FormOptions) -> FormResult<Self> {
        let id = FormId::next();
        let context = Arc::new(EditContext::new(model.into())?);
        let items = Arc::new(RwLock::new(Registry::new()));
        let annotations = Arc::new(RwLock::new(None));
        let validate_messages = Arc::new(RwLock::new(options.locale.validate_messages()));

        let strategy = StrategyHandlers::new(
            ValidationStrategy::select(&options),
            StrategyDeps {
                items: items.clone(),
                annotations: annotations.clone(),
                messages: validate_messages.clone(),
            },
        );
        strategy.attach(&context)?;
        debug!(
            form_id = id.0,
            context_id = context.id().0,
            strategy = ?strategy.strategy(),
            "form session initialized"
        );

        Ok(Self {
            id,
            options: Arc::new(RwLock::new(options)),
            context: Arc::new(RwLock::new(Some(context))),
            items,
            controls: Arc::new(RwLock::new(Registry::new())),
            annotations,
            validate_messages,
            strategy: Arc::new(RwLock::new(strategy)),
            user_handlers: Arc::new(RwLock::new(UserHandlers::new())),
            on_finish: Arc::new(RwLock::new(None)),
            on_finish_failed: Arc::new(RwLock::new(None)),
            on_state_changed: Arc::new(RwLock::new(None)),
            finish_subscribers: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Builds the initial model with `factory`; a factory error is fatal.
    pub fn with_factory<F, E>(factory: F, options: FormOptions) -> FormResult<Self>
    where
        F: FnOnce() -> Result<T, E>,
        E: Display,
    {
        let model = factory().map_err(|error| FormError::ModelConstruction(error.to_string()))?;
        Self::new(model, options)
    }

    pub fn id(&self) -> FormId {
        self.id
    }

    pub fn name(&self) -> FormResult<Option<String>> {
        Ok(read_lock(&self.options, "reading form name")?.name.clone())
    }

    pub fn options(&self) -> FormResult<FormOptions> {
        Ok(read_lock(&self.options, "reading form options")?.clone())
    }

    pub fn edit_context(&self) -> FormResult<Arc<EditContext<T>>> {
        read_lock(&self.context, "reading edit context")?
            .clone()
            .ok_or(FormError::NoContext)
    }

    pub fn model(&self) -> FormResult<Model<T>> {
        Ok(self.edit_context()?.model().clone())
    }

    pub fn live_model(&self) -> LiveModel<T> {
        LiveModel {
            slot: Arc::downgrade(&self.context),
        }
    }

    pub fn validate_on_change(&self) -> FormResult<bool> {
        Ok(read_lock(&self.options, "reading validate-on-change")?.validate_on_change)
    }

    pub fn active_strategy(&self) -> FormResult<ValidationStrategy> {
        Ok(read_lock(&self.strategy, "reading validation strategy")?.strategy())
    }

    pub fn use_locale_validate_message(&self) -> FormResult<bool> {
        Ok(read_lock(&self.options, "reading form locale")?
            .locale
            .uses_locale_validate_messages())
    }

    pub fn is_modified(&self) -> FormResult<bool> {
        self.edit_context()?.is_modified()
    }

    pub fn validate(&self) -> FormResult<bool> {
        self.edit_context()?.validate()
    }

    /// Replaces the model. A different identity rebuilds the context; the same one is a no-op.
    pub fn set_model(&self, model: impl Into<Model<T>>) -> FormResult<()> {
        let model = model.into();
        if self.edit_context()?.model().same(&model) {
            return Ok(());
        }
        self.rebuild_context(Some(model), "model replaced")
    }

    pub fn set_field<L>(&self, lens: L, value: L::Value) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        self.edit_context()?.update_field(lens, value)
    }

    /// Resets every control in registration order, then rebuilds the context
    /// from the current model, dropping modification tracking.
    pub fn reset(&self) -> FormResult<()> {
        let controls = read_lock(&self.controls, "reading controls for reset")?.snapshot();
        for control in &controls {
            control.reset();
        }
        self.rebuild_context(None, "reset")
    }

    /// Rebuilds the context without touching controls, clearing validation state.
    pub fn validation_reset(&self) -> FormResult<()> {
        self.rebuild_context(None, "validation reset")
    }

    pub fn add_form_item(&self, item: Arc<dyn FieldItem<T>>) -> FormResult<bool> {
        let added = write_lock(&self.items, "registering form item")?.add(item);
        debug!(form_id = self.id.0, added, "form item registered");
        Ok(added)
    }

    pub fn remove_form_item(&self, item: &Arc<dyn FieldItem<T>>) -> FormResult<bool> {
        let removed = write_lock(&self.items, "removing form item")?.remove(item);
        debug!(form_id = self.id.0, removed, "form item removed");
        Ok(removed)
    }

    pub fn form_item_count(&self) -> FormResult<usize> {
        Ok(read_lock(&self.items, "counting form items")?.len())
    }

    pub fn add_control(&self, control: Arc<dyn ControlAccessor>) -> FormResult<bool> {
        Ok(write_lock(&self.controls, "registering control")?.add(control))
    }

    pub fn remove_control(&self, control: &Arc<dyn ControlAccessor>) -> FormResult<bool> {
        Ok(write_lock(&self.controls, "removing control")?.remove(control))
    }

    pub fn control_count(&self) -> FormResult<usize> {
        Ok(read_lock(&self.controls, "counting controls")?.len())
    }

    /// Pushes externally supplied messages onto the item registered for
    /// `field`, bypassing the active strategy. Returns whether an item matched.
    pub fn set_validation_messages<I, S>(&self, field: &str, messages: I) -> FormResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let context = self.edit_context()?;
        let identity = context.field(field.to_string());
        let Some(item) = find_item(&self.items, &context, &identity)? else {
            return Ok(false);
        };

        let messages = messages.into_iter().map(Into::into).collect::<Vec<String>>();
        context.set_field_messages(identity, messages.clone())?;
        item.display_errors(messages);
        context.notify_validation_state_changed()?;
        Ok(true)
    }

    /// Replaces the configuration; re-wires strategy handlers when the selection changes.
    pub fn set_options(&self, options: FormOptions) -> FormResult<()> {
        let next = ValidationStrategy::select(&options);
        *write_lock(&self.validate_messages, "updating validate messages")? =
            options.locale.validate_messages();
        *write_lock(&self.options, "updating form options")? = options;

        let mut strategy = write_lock(&self.strategy, "switching validation strategy")?;
        let previous = strategy.strategy();
        if previous == next {
            return Ok(());
        }

        let replacement = StrategyHandlers::new(next, self.strategy_deps());
        if let Some(context) = read_lock(&self.context, "reading edit context")?.clone() {
            strategy.detach(&context)?;
            replacement.attach(&context)?;
        }
        *strategy = replacement;
        debug!(
            form_id = self.id.0,
            from = ?previous,
            to = ?next,
            "validation strategy switched"
        );
        Ok(())
    }

    pub fn set_annotation_validator(
        &self,
        validator: impl AnnotationValidator<T> + 'static,
    ) -> FormResult<()> {
        *write_lock(&self.annotations, "setting annotation validator")? = Some(Arc::new(validator));
        Ok(())
    }

    pub fn on_finish<F, Fut>(&self, callback: F) -> FormResult<()>
    where
        F: Fn(Arc<EditContext<T>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *write_lock(&self.on_finish, "setting finish callback")? = Some(box_callback(callback));
        Ok(())
    }

    pub fn on_finish_failed<F, Fut>(&self, callback: F) -> FormResult<()>
    where
        F: Fn(Arc<EditContext<T>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *write_lock(&self.on_finish_failed, "setting finish-failed callback")? =
            Some(box_callback(callback));
        Ok(())
    }

    /// Re-render signal raised after every context rebuild.
    pub fn on_state_changed(&self, callback: impl Fn() + Send + Sync + 'static) -> FormResult<()> {
        *write_lock(&self.on_state_changed, "setting state-changed callback")? =
            Some(Arc::new(callback));
        Ok(())
    }

    pub fn on_field_changed(
        &self,
        callback: impl Fn(&EditContext<T>, &FieldChanged) + Send + Sync + 'static,
    ) -> FormResult<FieldChangedHandler<T>> {
        let handler = Handler::new(callback);
        self.edit_context()?.subscribe_field_changed(&handler)?;
        write_lock(&self.user_handlers, "recording field-changed callback")?
            .field_changed
            .push(handler.clone());
        Ok(handler)
    }

    pub fn on_validation_requested(
        &self,
        callback: impl Fn(&EditContext<T>, &ValidationRequested) + Send + Sync + 'static,
    ) -> FormResult<ValidationRequestedHandler<T>> {
        let handler = Handler::new(callback);
        self.edit_context()?
            .subscribe_validation_requested(&handler)?;
        write_lock(&self.user_handlers, "recording validation-requested callback")?
            .validation_requested
            .push(handler.clone());
        Ok(handler)
    }

    pub fn on_validation_state_changed(
        &self,
        callback: impl Fn(&EditContext<T>, &ValidationStateChanged) + Send + Sync + 'static,
    ) -> FormResult<ValidationStateChangedHandler<T>> {
        let handler = Handler::new(callback);
        self.edit_context()?
            .subscribe_validation_state_changed(&handler)?;
        write_lock(&self.user_handlers, "recording validation-state callback")?
            .validation_state_changed
            .push(handler.clone());
        Ok(handler)
    }

    pub fn subscribe_finish(&self, subscriber: FinishSubscriber) -> FormResult<()> {
        write_lock(&self.finish_subscribers, "subscribing to form finish")?.push(subscriber);
        Ok(())
    }

    pub fn unsubscribe_finish(&self, subscriber: &FinishSubscriber) -> FormResult<bool> {
        let mut subscribers = write_lock(&self.finish_subscribers, "unsubscribing from form finish")?;
        match subscribers
            .iter()
            .rposition(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(subscriber)))
        {
            Some(index) => {
                subscribers.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Validates, then awaits the finish or finish-failed callback. Returns the validation result.
    pub async fn submit(&self) -> FormResult<bool> {
        let is_valid = self.validate()?;
        if is_valid {
            self.handle_valid_submit().await?;
        } else {
            self.handle_invalid_submit().await?;
        }
        debug!(form_id = self.id.0, is_valid, "form submitted");
        Ok(is_valid)
    }

    pub async fn handle_valid_submit(&self) -> FormResult<()> {
        let context = self.edit_context()?;
        let callback = read_lock(&self.on_finish, "reading finish callback")?.clone();
        if let Some(callback) = callback {
            callback(context).await;
        }

        let subscribers = read_lock(&self.finish_subscribers, "reading finish subscribers")?.clone();
        for subscriber in subscribers {
            subscriber(self as &dyn FormSessionPublic);
        }
        Ok(())
    }

    pub async fn handle_invalid_submit(&self) -> FormResult<()> {
        let context = self.edit_context()?;
        let callback = read_lock(&self.on_finish_failed, "reading finish-failed callback")?.clone();
        if let Some(callback) = callback {
            callback(context).await;
        }
        Ok(())
    }

    /// Detaches strategy and user handlers and drops the context. Calls that
    /// need the context fail with [`FormError::NoContext`] afterwards.
    pub fn dispose(&self) -> FormResult<()> {
        let Some(context) = write_lock(&self.context, "disposing edit context")?.take() else {
            return Ok(());
        };
        read_lock(&self.strategy, "detaching validation strategy")?.detach(&context)?;

        let user = read_lock(&self.user_handlers, "detaching user callbacks")?;
        for handler in &user.field_changed {
            context.unsubscribe_field_changed(handler)?;
        }
        for handler in &user.validation_requested {
            context.unsubscribe_validation_requested(handler)?;
        }
        for handler in &user.validation_state_changed {
            context.unsubscribe_validation_state_changed(handler)?;
        }
        debug!(
            form_id = self.id.0,
            context_id = context.id().0,
            "form session disposed"
        );
        Ok(())
    }

    /// Allocates a fresh context (same model unless `model` is given), moves
    /// every subscriber over in order and swaps it in. Registered items are
    /// cleared against the empty store before the re-render signal is raised.
    fn rebuild_context(&self, model: Option<Model<T>>, reason: &'static str) -> FormResult<()> {
        let next = {
            let mut slot = write_lock(&self.context, "rebuilding edit context")?;
            let previous = slot.clone().ok_or(FormError::NoContext)?;
            let model = model.unwrap_or_else(|| previous.model().clone());
            let next = Arc::new(EditContext::new(model)?);
            let migrated = previous.migrate_subscribers_into(&next)?;
            debug!(
                form_id = self.id.0,
                from = previous.id().0,
                to = next.id().0,
                migrated,
                reason,
                "edit context rebuilt"
            );
            *slot = Some(next.clone());
            next
        };

        let items = read_lock(&self.items, "reading form items after rebuild")?.snapshot();
        for item in &items {
            item.display_errors(Vec::new());
        }
        next.notify_validation_state_changed()?;
        self.notify_state_changed()
    }

    fn notify_state_changed(&self) -> FormResult<()> {
        let callback = read_lock(&self.on_state_changed, "reading state-changed callback")?.clone();
        if let Some(callback) = callback {
            callback();
        }
        Ok(())
    }

    fn strategy_deps(&self) -> StrategyDeps<T> {
        StrategyDeps {
            items: self.items.clone(),
            annotations: self.annotations.clone(),
            messages: self.validate_messages.clone(),
        }
    }
}

impl<T> FormSession<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    pub fn with_default(options: FormOptions) -> FormResult<Self> {
        Self::new(T::default(), options)
    }
}

fn box_callback<T, F, Fut>(callback: F) -> FinishCallback<T>
where
    F: Fn(Arc<EditContext<T>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |context| Box::pin(callback(context)) as BoxedCallbackFuture)
}
