use std::fmt::Display;
use std::sync::Arc;

use rust_decimal::Decimal;

use super::locale::ValidateMessages;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleKind {
    Required,
    Range,
    Length,
    Custom,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuleError {
    pub kind: RuleKind,
    pub message: String,
}

impl RuleError {
    pub fn new(kind: RuleKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Decides what a `Required` rule treats as "no value".
pub trait RuleValue {
    fn is_blank(&self) -> bool;
}

impl RuleValue for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl RuleValue for &'static str {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl<V: RuleValue> RuleValue for Option<V> {
    fn is_blank(&self) -> bool {
        self.as_ref().is_none_or(RuleValue::is_blank)
    }
}

impl<V> RuleValue for Vec<V> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

macro_rules! never_blank {
    ($($ty:ty),* $(,)?) => {
        $(impl RuleValue for $ty {
            fn is_blank(&self) -> bool {
                false
            }
        })*
    };
}

never_blank!(
    bool, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64, Decimal
);

pub trait FieldRule<V>: Send + Sync {
    fn check(&self, value: &V, label: &str, messages: &ValidateMessages) -> Result<(), RuleError>;
}

pub type SharedRule<V> = Arc<dyn FieldRule<V>>;

fn render(custom: Option<&str>, template: &str, params: &[(&str, &str)]) -> String {
    ValidateMessages::format(custom.unwrap_or(template), params)
}

#[derive(Clone, Debug, Default)]
pub struct Required {
    message: Option<String>,
}

impl Required {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<V: RuleValue> FieldRule<V> for Required {
    fn check(&self, value: &V, label: &str, messages: &ValidateMessages) -> Result<(), RuleError> {
        if !value.is_blank() {
            return Ok(());
        }
        Err(RuleError::new(
            RuleKind::Required,
            render(
                self.message.as_deref(),
                &messages.required,
                &[("label", label)],
            ),
        ))
    }
}

/// Inclusive bounds on an ordered value.
#[derive(Clone, Debug)]
pub struct Range<V> {
    min: Option<V>,
    max: Option<V>,
    message: Option<String>,
}

impl<V> Range<V> {
    pub fn between(min: V, max: V) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            message: None,
        }
    }

    pub fn at_least(min: V) -> Self {
        Self {
            min: Some(min),
            max: None,
            message: None,
        }
    }

    pub fn at_most(max: V) -> Self {
        Self {
            min: None,
            max: Some(max),
            message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<V> FieldRule<V> for Range<V>
where
    V: PartialOrd + Display + Send + Sync,
{
    fn check(&self, value: &V, label: &str, messages: &ValidateMessages) -> Result<(), RuleError> {
        let below = self.min.as_ref().is_some_and(|min| value < min);
        let above = self.max.as_ref().is_some_and(|max| value > max);
        if !below && !above {
            return Ok(());
        }

        let min = self.min.as_ref().map(ToString::to_string).unwrap_or_default();
        let max = self.max.as_ref().map(ToString::to_string).unwrap_or_default();
        let template = match (&self.min, &self.max) {
            (Some(_), Some(_)) => &messages.range,
            (Some(_), None) => &messages.min,
            _ => &messages.max,
        };
        Err(RuleError::new(
            RuleKind::Range,
            render(
                self.message.as_deref(),
                template,
                &[("label", label), ("min", &min), ("max", &max)],
            ),
        ))
    }
}

/// Character-count bounds on text. Empty text passes; pair with `Required`.
#[derive(Clone, Debug, Default)]
pub struct Length {
    min: Option<usize>,
    max: Option<usize>,
    message: Option<String>,
}

impl Length {
    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            message: None,
        }
    }

    pub fn at_least(min: usize) -> Self {
        Self {
            min: Some(min),
            ..Self::default()
        }
    }

    pub fn at_most(max: usize) -> Self {
        Self {
            max: Some(max),
            ..Self::default()
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<V: AsRef<str>> FieldRule<V> for Length {
    fn check(&self, value: &V, label: &str, messages: &ValidateMessages) -> Result<(), RuleError> {
        let text = value.as_ref();
        if text.is_empty() {
            return Ok(());
        }
        let count = text.chars().count();
        let too_short = self.min.is_some_and(|min| count < min);
        let too_long = self.max.is_some_and(|max| count > max);
        if !too_short && !too_long {
            return Ok(());
        }

        let min = self.min.map(|min| min.to_string()).unwrap_or_default();
        let max = self.max.map(|max| max.to_string()).unwrap_or_default();
        let template = match (self.min, self.max) {
            (Some(_), Some(_)) => &messages.len,
            (Some(_), None) => &messages.min_len,
            _ => &messages.max_len,
        };
        Err(RuleError::new(
            RuleKind::Length,
            render(
                self.message.as_deref(),
                template,
                &[("label", label), ("min", &min), ("max", &max)],
            ),
        ))
    }
}

pub struct Custom<F> {
    check: F,
}

/// Wraps a predicate returning an error template (`{label}` is substituted).
pub fn custom<V, F>(check: F) -> Custom<F>
where
    F: Fn(&V) -> Result<(), String> + Send + Sync,
{
    Custom { check }
}

impl<V, F> FieldRule<V> for Custom<F>
where
    F: Fn(&V) -> Result<(), String> + Send + Sync,
{
    fn check(&self, value: &V, label: &str, _messages: &ValidateMessages) -> Result<(), RuleError> {
        (self.check)(value).map_err(|template| {
            RuleError::new(
                RuleKind::Custom,
                ValidateMessages::format(&template, &[("label", label)]),
            )
        })
    }
}
