pub use crate::form::{
    ControlAccessor, EditContext, FieldControl, FieldItem, FieldLens, FormError, FormField,
    FormLocale, FormModel, FormOptions, FormProvider, FormResult, FormSession,
    FormSessionPublic, FormValidateMode, Length, Model, Range, Required, ValidationStrategy,
    custom,
};
pub use crate::{I18n, Locale};
