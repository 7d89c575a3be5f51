use std::collections::HashMap;
use std::sync::OnceLock;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/calmform_i18n_generated.rs"));
}

#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub enum Locale {
    #[default]
    System,
    Tag(String),
}

impl From<String> for Locale {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("system") {
            return Self::System;
        }
        Self::Tag(value.trim().to_string())
    }
}

impl From<&str> for Locale {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

/// Read-only view over the generated message catalog for one requested locale.
#[derive(Clone, Debug)]
pub struct I18n {
    locale: Locale,
    resolved: &'static str,
}

impl Default for I18n {
    fn default() -> Self {
        Self::new(Locale::System)
    }
}

impl I18n {
    pub fn new(locale: impl Into<Locale>) -> Self {
        let locale = locale.into();
        let requested = match &locale {
            Locale::System => system_locale(),
            Locale::Tag(tag) => Some(tag.clone()),
        };
        let resolved = catalog().resolve(requested.as_deref());
        Self { locale, resolved }
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn default_locale() -> &'static str {
        catalog().default_locale
    }

    pub fn available_locales() -> Vec<&'static str> {
        let mut locales = catalog().messages.keys().copied().collect::<Vec<_>>();
        locales.sort_unstable();
        locales
    }

    pub fn resolved_locale(&self) -> &'static str {
        self.resolved
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Looks up `key`, falling back to the default locale and then to the key itself.
    pub fn t(&self, key: &str) -> String {
        self.lookup(key).unwrap_or(key).to_string()
    }

    pub fn t_with(&self, key: &str, params: &[(&str, &str)]) -> String {
        format_template(self.lookup(key).unwrap_or(key), params)
    }

    fn lookup(&self, key: &str) -> Option<&'static str> {
        let catalog = catalog();
        catalog
            .message(self.resolved, key)
            .or_else(|| catalog.message(catalog.default_locale, key))
    }
}

#[cfg(feature = "i18n")]
fn system_locale() -> Option<String> {
    sys_locale::get_locale()
}

#[cfg(not(feature = "i18n"))]
fn system_locale() -> Option<String> {
    None
}

fn catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(Catalog::load)
}

/// Generated messages per locale plus the tables requests resolve through.
struct Catalog {
    default_locale: &'static str,
    messages: HashMap<&'static str, HashMap<&'static str, &'static str>>,
    exact: HashMap<String, &'static str>,
    // `None` marks a language served by more than one locale.
    by_language: HashMap<String, Option<&'static str>>,
}

impl Catalog {
    fn load() -> Self {
        let mut messages = HashMap::new();
        let mut exact = HashMap::new();
        let mut by_language: HashMap<String, Option<&'static str>> = HashMap::new();

        for &(locale, entries) in generated::LOCALES {
            messages.insert(locale, entries.iter().copied().collect());
            let tag = LocaleTag::parse(locale);
            exact.insert(tag.canonical(), locale);
            by_language
                .entry(tag.language)
                .and_modify(|slot| {
                    if *slot != Some(locale) {
                        *slot = None;
                    }
                })
                .or_insert(Some(locale));
        }
        messages.entry(generated::DEFAULT_LOCALE).or_default();
        exact
            .entry(LocaleTag::parse(generated::DEFAULT_LOCALE).canonical())
            .or_insert(generated::DEFAULT_LOCALE);

        Self {
            default_locale: generated::DEFAULT_LOCALE,
            messages,
            exact,
            by_language,
        }
    }

    fn resolve(&self, requested: Option<&str>) -> &'static str {
        let Some(tag) = requested.map(LocaleTag::parse) else {
            return self.default_locale;
        };
        self.exact
            .get(&tag.canonical())
            .copied()
            .or_else(|| self.by_language.get(&tag.language).copied().flatten())
            .unwrap_or(self.default_locale)
    }

    fn message(&self, locale: &str, key: &str) -> Option<&'static str> {
        self.messages.get(locale)?.get(key).copied()
    }
}

/// A locale request reduced to lowercase subtags, so `zh_CN.UTF-8` and
/// `zh-cn` compare equal. Encoding and `@modifier` suffixes are dropped.
struct LocaleTag {
    language: String,
    region: Vec<String>,
}

impl LocaleTag {
    fn parse(raw: &str) -> Self {
        let core = raw.trim().split(['.', '@']).next().unwrap_or_default();
        let mut subtags = core
            .split(['-', '_'])
            .filter(|subtag| !subtag.is_empty())
            .map(str::to_ascii_lowercase);
        Self {
            language: subtags.next().unwrap_or_default(),
            region: subtags.collect(),
        }
    }

    fn canonical(&self) -> String {
        let mut tag = self.language.clone();
        for subtag in &self.region {
            tag.push('-');
            tag.push_str(subtag);
        }
        tag
    }
}

/// Substitutes `{name}` placeholders; unknown or unterminated placeholders are kept verbatim.
pub fn format_template(template: &str, params: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            output.push_str(&rest[open..]);
            return output;
        };
        let name = &after[..close];
        match params.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => output.push_str(value),
            None => output.push_str(&rest[open..=open + close + 1]),
        }
        rest = &after[close + 1..];
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::{I18n, format_template};

    #[test]
    fn missing_key_shows_key() {
        let i18n = I18n::new("en-US");
        assert_eq!(i18n.t("form.validate.unknown"), "form.validate.unknown");
    }

    #[test]
    fn supports_locale_tag_normalization() {
        let i18n = I18n::new("zh_CN.UTF-8");
        assert_eq!(i18n.resolved_locale(), "zh-CN");
        assert_eq!(i18n.t("form.optional"), "（可选）");
    }

    #[test]
    fn language_only_tag_falls_back_to_regional_catalog() {
        assert_eq!(I18n::new("de").resolved_locale(), "de-DE");
        assert_eq!(I18n::new("fr-FR").resolved_locale(), I18n::default_locale());
    }

    #[test]
    fn supports_placeholder_interpolation() {
        let i18n = I18n::new("en-US");
        assert_eq!(
            i18n.t_with("form.validate.required", &[("label", "Name")]),
            "Name is required"
        );
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        assert_eq!(
            format_template("{label} in {unit", &[("label", "Age")]),
            "Age in {unit"
        );
        assert_eq!(format_template("{missing}!", &[]), "{missing}!");
    }
}
