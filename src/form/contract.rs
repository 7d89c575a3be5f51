use std::sync::Arc;

use super::context::EditContext;
use super::error::FormResult;
use super::item::{ControlAccessor, FieldItem};
use super::session::{FinishSubscriber, FormId, FormOptions, FormSession, LiveModel};

/// What the rendering layer and form providers see of a session.
pub trait FormSessionPublic: Send + Sync {
    fn form_id(&self) -> FormId;
    fn name(&self) -> FormResult<Option<String>>;
    fn is_modified(&self) -> FormResult<bool>;
    fn validate(&self) -> FormResult<bool>;
    fn reset(&self) -> FormResult<()>;
    fn validation_reset(&self) -> FormResult<()>;
    fn set_validation_messages(&self, field: &str, messages: Vec<String>) -> FormResult<bool>;
}

/// What field editors see of a session: registration and the live context.
pub trait FormSessionInternal<T>: Send + Sync {
    fn edit_context(&self) -> FormResult<Arc<EditContext<T>>>;
    /// Model handle that follows later `set_model` calls.
    fn live_model(&self) -> LiveModel<T>;
    fn options(&self) -> FormResult<FormOptions>;
    fn validate_on_change(&self) -> FormResult<bool>;
    fn use_locale_validate_message(&self) -> FormResult<bool>;
    fn add_form_item(&self, item: Arc<dyn FieldItem<T>>) -> FormResult<bool>;
    fn remove_form_item(&self, item: &Arc<dyn FieldItem<T>>) -> FormResult<bool>;
    fn add_control(&self, control: Arc<dyn ControlAccessor>) -> FormResult<bool>;
    fn remove_control(&self, control: &Arc<dyn ControlAccessor>) -> FormResult<bool>;
    fn subscribe_finish(&self, subscriber: FinishSubscriber) -> FormResult<()>;
    fn unsubscribe_finish(&self, subscriber: &FinishSubscriber) -> FormResult<bool>;
}

impl<T> FormSessionPublic for FormSession<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn form_id(&self) -> FormId {
        self.id()
    }

    fn name(&self) -> FormResult<Option<String>> {
        FormSession::name(self)
    }

    fn is_modified(&self) -> FormResult<bool> {
        FormSession::is_modified(self)
    }

    fn validate(&self) -> FormResult<bool> {
        FormSession::validate(self)
    }

    fn reset(&self) -> FormResult<()> {
        FormSession::reset(self)
    }

    fn validation_reset(&self) -> FormResult<()> {
        FormSession::validation_reset(self)
    }

    fn set_validation_messages(&self, field: &str, messages: Vec<String>) -> FormResult<bool> {
        FormSession::set_validation_messages(self, field, messages)
    }
}

impl<T> FormSessionInternal<T> for FormSession<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn edit_context(&self) -> FormResult<Arc<EditContext<T>>> {
        FormSession::edit_context(self)
    }

    fn live_model(&self) -> LiveModel<T> {
        FormSession::live_model(self)
    }

    fn options(&self) -> FormResult<FormOptions> {
        FormSession::options(self)
    }

    fn validate_on_change(&self) -> FormResult<bool> {
        FormSession::validate_on_change(self)
    }

    fn use_locale_validate_message(&self) -> FormResult<bool> {
        FormSession::use_locale_validate_message(self)
    }

    fn add_form_item(&self, item: Arc<dyn FieldItem<T>>) -> FormResult<bool> {
        FormSession::add_form_item(self, item)
    }

    fn remove_form_item(&self, item: &Arc<dyn FieldItem<T>>) -> FormResult<bool> {
        FormSession::remove_form_item(self, item)
    }

    fn add_control(&self, control: Arc<dyn ControlAccessor>) -> FormResult<bool> {
        FormSession::add_control(self, control)
    }

    fn remove_control(&self, control: &Arc<dyn ControlAccessor>) -> FormResult<bool> {
        FormSession::remove_control(self, control)
    }

    fn subscribe_finish(&self, subscriber: FinishSubscriber) -> FormResult<()> {
        FormSession::subscribe_finish(self, subscriber)
    }

    fn unsubscribe_finish(&self, subscriber: &FinishSubscriber) -> FormResult<bool> {
        FormSession::unsubscribe_finish(self, subscriber)
    }
}
