mod context;
mod contract;
mod error;
mod field;
mod item;
mod locale;
mod provider;
mod rules;
mod session;
mod strategy;

#[cfg(test)]
mod tests;

pub use calmform_derive::FormModel;
pub use context::{
    ContextId, EditContext, ErrorMap, FieldChanged, FieldChangedHandler, Handler,
    SubscriberSnapshot, ValidationRequested, ValidationRequestedHandler, ValidationStateChanged,
    ValidationStateChangedHandler,
};
pub use contract::{FormSessionInternal, FormSessionPublic};
pub use error::{FormError, FormResult};
pub use field::{FieldIdentity, FieldKey, FieldLens, FormModel, Model, OwnerId};
pub use item::{ControlAccessor, FieldControl, FieldItem, FormField};
pub use locale::{FormLocale, ValidateMessages};
pub use provider::{FormProvider, FormProviderFinishEvent, SharedForm};
pub use rules::{
    Custom, FieldRule, Length, Range, Required, RuleError, RuleKind, RuleValue, SharedRule, custom,
};
pub use session::{
    BoxedCallbackFuture, FinishSubscriber, FormId, FormLayout, FormOptions, FormRequiredMark,
    FormSession, FormValidateMode, LabelAlign, LiveModel,
};
pub use strategy::{AnnotationValidator, ValidationStrategy};
