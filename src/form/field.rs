use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::{FormResult, read_lock, write_lock};

static OWNER_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

/// Identity of an object that owns bindable fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OwnerId(pub u64);

impl OwnerId {
    pub fn next() -> Self {
        Self(OWNER_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// `(owner, field name)` pair used as the key of every error mapping.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldIdentity {
    owner: OwnerId,
    name: Cow<'static, str>,
}

impl FieldIdentity {
    pub fn new(owner: OwnerId, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for FieldIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.owner.0)
    }
}

/// The edited model: a shared, lock-guarded value with a stable owner identity.
///
/// Two handles are the same model exactly when they share an [`OwnerId`];
/// field values are never compared.
pub struct Model<T> {
    owner: OwnerId,
    value: Arc<RwLock<T>>,
}

impl<T> Model<T> {
    pub fn new(value: T) -> Self {
        Self {
            owner: OwnerId::next(),
            value: Arc::new(RwLock::new(value)),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn same(&self, other: &Self) -> bool {
        self.owner == other.owner
    }

    pub fn field(&self, name: impl Into<Cow<'static, str>>) -> FieldIdentity {
        FieldIdentity::new(self.owner, name)
    }

    pub fn read(&self) -> FormResult<RwLockReadGuard<'_, T>> {
        read_lock(&self.value, "reading form model")
    }

    pub fn write(&self) -> FormResult<RwLockWriteGuard<'_, T>> {
        write_lock(&self.value, "writing form model")
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> FormResult<R> {
        Ok(f(&mut *self.write()?))
    }
}

impl<T: Clone> Model<T> {
    pub fn snapshot(&self) -> FormResult<T> {
        Ok(self.read()?.clone())
    }
}

impl<T> Clone for Model<T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner,
            value: self.value.clone(),
        }
    }
}

impl<T> PartialEq for Model<T> {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl<T> Eq for Model<T> {}

impl<T> Debug for Model<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model").field("owner", &self.owner).finish()
    }
}

impl<T> From<T> for Model<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

pub trait FieldLens<T>: Copy + Send + Sync + 'static {
    type Value: Clone + PartialEq + Send + Sync + 'static;

    fn key(self) -> FieldKey;

    fn label(self) -> &'static str {
        self.key().as_str()
    }

    fn get<'a>(self, model: &'a T) -> &'a Self::Value;
    fn set(self, model: &mut T, value: Self::Value);
}

pub trait FormModel: Clone + Send + Sync + 'static {
    type Fields;

    const FIELD_NAMES: &'static [&'static str];

    fn fields() -> Self::Fields;
}
