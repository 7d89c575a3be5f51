pub mod form;
pub mod i18n;
pub mod prelude;

pub use i18n::{I18n, Locale};
