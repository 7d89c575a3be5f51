use std::sync::{Arc, RwLock, Weak};

use tracing::{debug, warn};

use super::contract::FormSessionPublic;
use super::error::{FormResult, read_lock, write_lock};
use super::session::{FinishSubscriber, FormId, FormSession};

pub type SharedForm = Arc<dyn FormSessionPublic>;

/// Raised by a [`FormProvider`] when one of its forms submits successfully.
#[derive(Clone)]
pub struct FormProviderFinishEvent {
    pub form_id: FormId,
    pub form_name: Option<String>,
    pub forms: Vec<SharedForm>,
}

type FinishListener = Arc<dyn Fn(&FormProviderFinishEvent) + Send + Sync>;

struct ProviderEntry {
    form: SharedForm,
    subscription: FinishSubscriber,
    unsubscribe: Box<dyn Fn(&FinishSubscriber) -> FormResult<bool> + Send + Sync>,
}

/// Groups the sessions of one page so a finished form can be observed in
/// the context of its siblings.
#[derive(Clone, Default)]
pub struct FormProvider {
    entries: Arc<RwLock<Vec<ProviderEntry>>>,
    on_form_finish: Arc<RwLock<Option<FinishListener>>>,
}

impl FormProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_form_finish(
        &self,
        listener: impl Fn(&FormProviderFinishEvent) + Send + Sync + 'static,
    ) -> FormResult<()> {
        *write_lock(&self.on_form_finish, "setting provider finish listener")? =
            Some(Arc::new(listener));
        Ok(())
    }

    pub fn add_form<T>(&self, session: &FormSession<T>) -> FormResult<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries: Weak<RwLock<Vec<ProviderEntry>>> = Arc::downgrade(&self.entries);
        let listener = Arc::downgrade(&self.on_form_finish);
        let subscription: FinishSubscriber = Arc::new(move |form: &dyn FormSessionPublic| {
            if let Err(error) = raise_finish(&entries, &listener, form) {
                warn!(form_id = form.form_id().0, %error, "provider finish dispatch failed");
            }
        });
        session.subscribe_finish(subscription.clone())?;

        let owner = session.clone();
        write_lock(&self.entries, "adding form to provider")?.push(ProviderEntry {
            form: Arc::new(session.clone()),
            subscription,
            unsubscribe: Box::new(move |handle: &FinishSubscriber| {
                owner.unsubscribe_finish(handle)
            }),
        });
        debug!(form_id = session.id().0, "form added to provider");
        Ok(())
    }

    pub fn remove_form(&self, form_id: FormId) -> FormResult<bool> {
        let mut entries = write_lock(&self.entries, "removing form from provider")?;
        let Some(index) = entries
            .iter()
            .position(|entry| entry.form.form_id() == form_id)
        else {
            return Ok(false);
        };
        let entry = entries.remove(index);
        drop(entries);
        (entry.unsubscribe)(&entry.subscription)?;
        Ok(true)
    }

    pub fn forms(&self) -> FormResult<Vec<SharedForm>> {
        Ok(read_lock(&self.entries, "listing provider forms")?
            .iter()
            .map(|entry| entry.form.clone())
            .collect())
    }

    pub fn form(&self, name: &str) -> FormResult<Option<SharedForm>> {
        for form in self.forms()? {
            if form.name()?.as_deref() == Some(name) {
                return Ok(Some(form));
            }
        }
        Ok(None)
    }
}

fn raise_finish(
    entries: &Weak<RwLock<Vec<ProviderEntry>>>,
    listener: &Weak<RwLock<Option<FinishListener>>>,
    form: &dyn FormSessionPublic,
) -> FormResult<()> {
    let (Some(entries), Some(listener)) = (entries.upgrade(), listener.upgrade()) else {
        return Ok(());
    };
    let Some(listener) = read_lock(&listener, "reading provider finish listener")?.clone() else {
        return Ok(());
    };
    let forms = read_lock(&entries, "listing provider forms")?
        .iter()
        .map(|entry| entry.form.clone())
        .collect();
    listener(&FormProviderFinishEvent {
        form_id: form.form_id(),
        form_name: form.name()?,
        forms,
    });
    Ok(())
}
