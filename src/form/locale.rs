use crate::i18n::{I18n, Locale, format_template};

/// Message templates used by the built-in rules. Placeholders: `{label}`,
/// `{min}`, `{max}`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidateMessages {
    pub default: String,
    pub required: String,
    pub range: String,
    pub min: String,
    pub max: String,
    pub len: String,
    pub min_len: String,
    pub max_len: String,
}

impl ValidateMessages {
    pub fn from_i18n(i18n: &I18n) -> Self {
        Self {
            default: i18n.t("form.validate.default"),
            required: i18n.t("form.validate.required"),
            range: i18n.t("form.validate.range"),
            min: i18n.t("form.validate.min"),
            max: i18n.t("form.validate.max"),
            len: i18n.t("form.validate.len"),
            min_len: i18n.t("form.validate.min_len"),
            max_len: i18n.t("form.validate.max_len"),
        }
    }

    /// Templates of the catalog's default locale.
    pub fn fallback() -> Self {
        Self::from_i18n(&I18n::new(I18n::default_locale()))
    }

    pub fn format(template: &str, params: &[(&str, &str)]) -> String {
        format_template(template, params)
    }
}

/// Locale-dependent form texts. Configuring `default_validate_messages`
/// switches the session to rule-driven validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormLocale {
    pub optional_label: String,
    pub default_validate_messages: Option<ValidateMessages>,
}

impl Default for FormLocale {
    fn default() -> Self {
        Self {
            optional_label: I18n::new(I18n::default_locale()).t("form.optional"),
            default_validate_messages: None,
        }
    }
}

impl FormLocale {
    pub fn localized(locale: impl Into<Locale>) -> Self {
        let i18n = I18n::new(locale);
        Self {
            optional_label: i18n.t("form.optional"),
            default_validate_messages: Some(ValidateMessages::from_i18n(&i18n)),
        }
    }

    pub fn uses_locale_validate_messages(&self) -> bool {
        self.default_validate_messages.is_some()
    }

    /// Configured templates, or the default-locale templates when none are set.
    pub fn validate_messages(&self) -> ValidateMessages {
        self.default_validate_messages
            .clone()
            .unwrap_or_else(ValidateMessages::fallback)
    }
}
