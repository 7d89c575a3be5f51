use super::*;
use futures::executor::block_on;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[allow(dead_code)]
#[derive(Clone, Debug, Default, PartialEq, FormModel)]
struct Signup {
    #[form(label = "Name")]
    name: String,
    #[form(label = "Age")]
    age: u32,
    #[form(label = "Email")]
    email: String,
    #[form(label = "Deposit")]
    deposit: Decimal,
}

fn invalid_signup() -> Signup {
    Signup {
        name: String::new(),
        age: 200,
        email: "ada@example.com".to_string(),
        deposit: Decimal::new(2500, 2),
    }
}

fn valid_signup() -> Signup {
    Signup {
        name: "Ada".to_string(),
        age: 36,
        ..invalid_signup()
    }
}

fn rules_options() -> FormOptions {
    FormOptions {
        validate_mode: FormValidateMode::Rules,
        ..FormOptions::default()
    }
}

fn session(model: Signup, options: FormOptions) -> FormSession<Signup> {
    FormSession::new(model, options).expect("form session must build")
}

fn name_field() -> Arc<FormField<Signup, SignupNameLens>> {
    Arc::new(FormField::new(Signup::fields().name()).rule(Required::new()))
}

fn age_field() -> Arc<FormField<Signup, SignupAgeLens>> {
    Arc::new(FormField::new(Signup::fields().age()).rule(Range::between(0u32, 120)))
}

fn email_field() -> Arc<FormField<Signup, SignupEmailLens>> {
    Arc::new(FormField::new(Signup::fields().email()))
}

fn annotation_rules(model: &Signup) -> Vec<(FieldKey, String)> {
    let mut errors = Vec::new();
    if model.name.trim().is_empty() {
        errors.push((FieldKey::new("name"), "Name is required".to_string()));
    }
    if model.age > 120 {
        errors.push((FieldKey::new("age"), "Age is out of range".to_string()));
    }
    errors
}

struct RecordingControl {
    tag: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl ControlAccessor for RecordingControl {
    fn reset(&self) {
        self.log.lock().expect("log lock").push(self.tag);
    }
}

#[test]
fn derive_generates_labelled_lenses() {
    let fields = Signup::fields();
    assert_eq!(fields.name().key().as_str(), "name");
    assert_eq!(fields.name().label(), "Name");
    assert_eq!(Signup::FIELD_NAMES, &["name", "age", "email", "deposit"]);

    let mut model = invalid_signup();
    fields.age().set(&mut model, 41);
    assert_eq!(*fields.age().get(&model), 41);
}

#[test]
fn rule_strategy_collects_one_entry_per_invalid_field() {
    let session = session(invalid_signup(), rules_options());
    assert_eq!(
        session.active_strategy().expect("strategy"),
        ValidationStrategy::Rule
    );
    let name = name_field();
    let age = age_field();
    assert!(session.add_form_item(name.clone()).expect("register name"));
    assert!(session.add_form_item(age.clone()).expect("register age"));

    assert!(!session.validate().expect("validate"));

    let errors = session
        .edit_context()
        .expect("context")
        .error_map()
        .expect("error map");
    assert_eq!(errors.len(), 2);
    assert!(errors.values().all(|messages| messages.len() == 1));
    assert_eq!(
        name.errors().expect("name errors"),
        vec!["Name is required".to_string()]
    );
    assert_eq!(
        age.errors().expect("age errors"),
        vec!["Age must be between 0 and 120".to_string()]
    );
}

#[test]
fn rule_field_change_revalidates_only_the_changed_field() {
    let session = session(invalid_signup(), rules_options());
    let name = name_field();
    let age = age_field();
    session.add_form_item(name.clone()).expect("register name");
    session.add_form_item(age.clone()).expect("register age");
    session.validate().expect("validate");

    session
        .set_field(Signup::fields().name(), "Ada".to_string())
        .expect("edit name");

    let context = session.edit_context().expect("context");
    let errors = context.error_map().expect("error map");
    assert_eq!(errors.len(), 1);
    assert_eq!(
        context
            .field_messages(&context.field_for(Signup::fields().age()))
            .expect("age messages"),
        vec!["Age must be between 0 and 120".to_string()]
    );
    assert!(name.errors().expect("name errors").is_empty());
    assert_eq!(age.errors().expect("age errors").len(), 1);
}

#[test]
fn replacing_the_model_migrates_every_handler() {
    let session = session(valid_signup(), FormOptions::default());
    let calls = Arc::new(Mutex::new(Vec::new()));
    for tag in ["name editor", "age editor", "email editor"] {
        let calls = calls.clone();
        session
            .on_validation_requested(move |context, _| {
                calls
                    .lock()
                    .expect("calls lock")
                    .push((tag, context.id()));
            })
            .expect("subscribe");
    }
    let before = session.edit_context().expect("context before");

    session.set_model(invalid_signup()).expect("replace model");

    let after = session.edit_context().expect("context after");
    assert_ne!(before.id(), after.id());
    assert!(before.subscribers().expect("old subscribers").is_empty());

    session.validate().expect("validate");
    assert_eq!(
        *calls.lock().expect("calls lock"),
        vec![
            ("name editor", after.id()),
            ("age editor", after.id()),
            ("email editor", after.id()),
        ]
    );
}

#[test]
fn external_messages_reach_the_item_under_either_strategy() {
    for options in [FormOptions::default(), rules_options()] {
        let session = session(valid_signup(), options);
        let email = email_field();
        session.add_form_item(email.clone()).expect("register email");

        assert!(
            session
                .set_validation_messages("email", ["already in use"])
                .expect("set messages")
        );
        assert_eq!(
            email.errors().expect("email errors"),
            vec!["already in use".to_string()]
        );
        assert!(
            !session
                .set_validation_messages("nickname", ["unknown"])
                .expect("unknown field")
        );
    }
}

#[test]
fn invalid_annotation_submit_only_runs_finish_failed() {
    let session = session(invalid_signup(), FormOptions::default());
    assert_eq!(
        session.active_strategy().expect("strategy"),
        ValidationStrategy::Annotation
    );
    session
        .set_annotation_validator(annotation_rules)
        .expect("validator");

    let finished = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    {
        let finished = finished.clone();
        session
            .on_finish(move |_| {
                let finished = finished.clone();
                async move {
                    finished.fetch_add(1, Ordering::SeqCst);
                }
            })
            .expect("on finish");
    }
    {
        let failed = failed.clone();
        session
            .on_finish_failed(move |context| {
                let failed = failed.clone();
                async move {
                    assert_eq!(context.validation_messages().expect("messages").len(), 2);
                    failed.fetch_add(1, Ordering::SeqCst);
                }
            })
            .expect("on finish failed");
    }

    assert!(!block_on(session.submit()).expect("submit"));
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    assert_eq!(failed.load(Ordering::SeqCst), 1);
}

#[test]
fn valid_submit_runs_finish_before_subscribers() {
    let session = session(valid_signup(), rules_options());
    session.add_form_item(name_field()).expect("register name");
    let order = Arc::new(Mutex::new(Vec::new()));
    {
        let order = order.clone();
        session
            .on_finish(move |_| {
                let order = order.clone();
                async move {
                    order.lock().expect("order lock").push("finish");
                }
            })
            .expect("on finish");
    }
    let subscriber: FinishSubscriber = {
        let order = order.clone();
        Arc::new(move |_: &dyn FormSessionPublic| {
            order.lock().expect("order lock").push("subscriber");
        })
    };
    session
        .subscribe_finish(subscriber.clone())
        .expect("subscribe finish");

    assert!(block_on(session.submit()).expect("submit"));
    assert_eq!(*order.lock().expect("order lock"), vec!["finish", "subscriber"]);

    assert!(session.unsubscribe_finish(&subscriber).expect("unsubscribe"));
    assert!(!session.unsubscribe_finish(&subscriber).expect("unsubscribe twice"));
}

#[test]
fn exactly_one_strategy_is_attached_across_option_changes() {
    let session = session(valid_signup(), FormOptions::default());
    let attached = |session: &FormSession<Signup>| {
        let subscribers = session
            .edit_context()
            .expect("context")
            .subscribers()
            .expect("subscribers");
        (
            subscribers.field_changed.len(),
            subscribers.validation_requested.len(),
        )
    };
    assert_eq!(attached(&session), (1, 1));

    session.set_options(rules_options()).expect("switch to rules");
    assert_eq!(
        session.active_strategy().expect("strategy"),
        ValidationStrategy::Rule
    );
    assert_eq!(attached(&session), (1, 1));

    session
        .set_options(FormOptions {
            validate_mode: FormValidateMode::Complex,
            ..FormOptions::default()
        })
        .expect("same strategy");
    assert_eq!(attached(&session), (1, 1));

    session
        .set_options(FormOptions::default())
        .expect("switch back");
    assert_eq!(
        session.active_strategy().expect("strategy"),
        ValidationStrategy::Annotation
    );
    assert_eq!(attached(&session), (1, 1));
}

#[test]
fn annotation_field_change_keeps_other_fields_messages() {
    let session = session(invalid_signup(), FormOptions::default());
    session
        .set_annotation_validator(annotation_rules)
        .expect("validator");
    let name = name_field();
    session.add_form_item(name.clone()).expect("register name");
    assert!(!session.validate().expect("validate"));
    assert_eq!(
        name.errors().expect("name errors"),
        vec!["Name is required".to_string()]
    );

    session
        .set_field(Signup::fields().name(), "Ada".to_string())
        .expect("edit name");

    let context = session.edit_context().expect("context");
    assert_eq!(
        context.validation_messages().expect("messages"),
        vec!["Age is out of range".to_string()]
    );
    assert!(name.errors().expect("name errors").is_empty());
}

#[test]
fn locale_messages_select_rule_strategy_and_localize_errors() {
    let session = session(
        Signup {
            deposit: Decimal::new(500, 2),
            ..invalid_signup()
        },
        FormOptions {
            locale: FormLocale::localized("zh-CN"),
            ..FormOptions::default()
        },
    );
    assert!(session.use_locale_validate_message().expect("locale flag"));
    assert_eq!(
        session.active_strategy().expect("strategy"),
        ValidationStrategy::Rule
    );
    let name = name_field();
    let deposit = Arc::new(
        FormField::<Signup, _>::new(Signup::fields().deposit())
            .rule(Range::at_least(Decimal::new(1000, 2))),
    );
    session.add_form_item(name.clone()).expect("register name");
    session
        .add_form_item(deposit.clone())
        .expect("register deposit");

    assert!(!session.validate().expect("validate"));
    assert_eq!(
        name.errors().expect("name errors"),
        vec!["请输入Name".to_string()]
    );
    assert_eq!(
        deposit.errors().expect("deposit errors"),
        vec!["Deposit最小值为10.00".to_string()]
    );
}

#[test]
fn registration_ignores_duplicates_and_unknown_removals() {
    let session = session(valid_signup(), rules_options());
    let email: Arc<dyn FieldItem<Signup>> = email_field();
    let stranger: Arc<dyn FieldItem<Signup>> = email_field();

    assert!(session.add_form_item(email.clone()).expect("first add"));
    assert!(!session.add_form_item(email.clone()).expect("duplicate add"));
    assert_eq!(session.form_item_count().expect("count"), 1);

    assert!(!session.remove_form_item(&stranger).expect("unknown removal"));
    assert!(session.remove_form_item(&email).expect("removal"));
    assert!(!session.remove_form_item(&email).expect("second removal"));
    assert_eq!(session.form_item_count().expect("count"), 0);

    let log = Arc::new(Mutex::new(Vec::new()));
    let control: Arc<dyn ControlAccessor> = Arc::new(RecordingControl {
        tag: "only",
        log: log.clone(),
    });
    assert!(!session.remove_control(&control).expect("unknown control"));
    assert!(session.add_control(control.clone()).expect("add control"));
    assert_eq!(session.control_count().expect("control count"), 1);
}

fn mount_editor<L>(
    form: &dyn FormSessionInternal<Signup>,
    lens: L,
) -> (Arc<dyn FieldItem<Signup>>, Arc<dyn ControlAccessor>)
where
    L: FieldLens<Signup>,
    L::Value: RuleValue,
{
    let item: Arc<dyn FieldItem<Signup>> =
        Arc::new(FormField::<Signup, L>::new(lens).rule(Required::new()));
    let control: Arc<dyn ControlAccessor> =
        Arc::new(FieldControl::<Signup, L>::mount(form, lens).expect("mount control"));
    form.add_form_item(item.clone()).expect("register item");
    form.add_control(control.clone()).expect("register control");
    (item, control)
}

#[test]
fn field_editor_mounts_through_the_internal_contract() {
    let session = session(valid_signup(), rules_options());
    let (item, control) = mount_editor(&session, Signup::fields().email());
    assert_eq!(session.form_item_count().expect("items"), 1);
    assert_eq!(session.control_count().expect("controls"), 1);

    session
        .set_field(Signup::fields().email(), String::new())
        .expect("clear email");
    let context = session.edit_context().expect("context");
    assert_eq!(
        context
            .field_messages(&item.field_identity(&context))
            .expect("email messages"),
        vec!["Email is required".to_string()]
    );

    session.reset().expect("reset");
    assert_eq!(
        session.model().expect("model").snapshot().expect("snapshot").email,
        "ada@example.com"
    );

    let form: &dyn FormSessionInternal<Signup> = &session;
    assert!(form.remove_form_item(&item).expect("unmount item"));
    assert!(form.remove_control(&control).expect("unmount control"));
    assert!(!form.remove_control(&control).expect("unmount twice"));
}

#[test]
fn reset_restores_controls_in_order_then_rebuilds() {
    let session = session(valid_signup(), rules_options());
    let log = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second"] {
        session
            .add_control(Arc::new(RecordingControl {
                tag,
                log: log.clone(),
            }))
            .expect("add control");
    }
    {
        let log = log.clone();
        session
            .on_state_changed(move || log.lock().expect("log lock").push("rebuilt"))
            .expect("state callback");
    }
    let name_control = FieldControl::<Signup, _>::mount(&session, Signup::fields().name())
        .expect("mount control");
    assert_eq!(name_control.initial(), "Ada");
    session
        .add_control(Arc::new(name_control))
        .expect("add name control");

    session
        .set_field(Signup::fields().name(), "Grace".to_string())
        .expect("edit name");
    assert!(session.is_modified().expect("modified"));
    let before = session.edit_context().expect("context").id();

    session.reset().expect("reset");

    assert_eq!(
        *log.lock().expect("log lock"),
        vec!["first", "second", "rebuilt"]
    );
    let context = session.edit_context().expect("context");
    assert_ne!(context.id(), before);
    assert!(!session.is_modified().expect("modified"));
    assert_eq!(context.model().read().expect("model").name, "Ada");
}

#[test]
fn control_reset_writes_into_the_current_model() {
    let session = session(valid_signup(), FormOptions::default());
    let control: Arc<dyn ControlAccessor> = Arc::new(
        FieldControl::<Signup, _>::mount(&session, Signup::fields().name())
            .expect("mount control"),
    );
    session.add_control(control.clone()).expect("add control");
    session
        .set_field(Signup::fields().name(), "Old edit".to_string())
        .expect("edit first model");
    let discarded = session.model().expect("model");

    session
        .set_model(Signup {
            name: "Zed".to_string(),
            ..valid_signup()
        })
        .expect("swap model");
    session
        .set_field(Signup::fields().name(), "Changed".to_string())
        .expect("edit live model");
    session.reset().expect("reset");

    assert_eq!(
        session.model().expect("model").snapshot().expect("snapshot").name,
        "Ada"
    );
    assert_eq!(discarded.snapshot().expect("snapshot").name, "Old edit");

    session.dispose().expect("dispose");
    // no live model left; the reset is skipped
    control.reset();
    assert_eq!(discarded.snapshot().expect("snapshot").name, "Old edit");
}

#[test]
fn reset_clears_displayed_errors() {
    let session = session(invalid_signup(), rules_options());
    let name = name_field();
    session.add_form_item(name.clone()).expect("register name");
    assert!(!session.validate().expect("validate"));
    assert!(!name.errors().expect("name errors").is_empty());

    session.reset().expect("reset");

    assert!(name.errors().expect("name errors").is_empty());
    assert!(
        session
            .edit_context()
            .expect("context")
            .error_map()
            .expect("error map")
            .is_empty()
    );
}

#[test]
fn validation_reset_clears_messages_and_keeps_handlers() {
    let session = session(invalid_signup(), rules_options());
    let name = name_field();
    session.add_form_item(name.clone()).expect("register name");
    let changes = Arc::new(AtomicUsize::new(0));
    {
        let changes = changes.clone();
        session
            .on_field_changed(move |_, _| {
                changes.fetch_add(1, Ordering::SeqCst);
            })
            .expect("field callback");
    }
    let state_changes = Arc::new(AtomicUsize::new(0));
    {
        let state_changes = state_changes.clone();
        session
            .on_validation_state_changed(move |_, _| {
                state_changes.fetch_add(1, Ordering::SeqCst);
            })
            .expect("state callback");
    }
    session.validate().expect("validate");
    assert_eq!(
        name.errors().expect("name errors"),
        vec!["Name is required".to_string()]
    );
    let raised = state_changes.load(Ordering::SeqCst);

    session.validation_reset().expect("validation reset");

    assert!(name.errors().expect("name errors").is_empty());
    assert_eq!(state_changes.load(Ordering::SeqCst), raised + 1);
    let context = session.edit_context().expect("context");
    assert!(context.error_map().expect("error map").is_empty());
    assert_eq!(context.model().read().expect("model").age, 200);

    session
        .set_field(Signup::fields().name(), String::from("  "))
        .expect("edit name");
    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert_eq!(
        name.errors().expect("name errors"),
        vec!["Name is required".to_string()]
    );
}

#[test]
fn unreadable_model_fails_submit() {
    let session = session(valid_signup(), FormOptions::default());
    session
        .set_annotation_validator(annotation_rules)
        .expect("validator");
    session.add_form_item(name_field()).expect("register name");
    let finished = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    {
        let finished = finished.clone();
        session
            .on_finish(move |_| {
                let finished = finished.clone();
                async move {
                    finished.fetch_add(1, Ordering::SeqCst);
                }
            })
            .expect("on finish");
    }
    {
        let failed = failed.clone();
        session
            .on_finish_failed(move |_| {
                let failed = failed.clone();
                async move {
                    failed.fetch_add(1, Ordering::SeqCst);
                }
            })
            .expect("on finish failed");
    }

    let model = session.model().expect("model");
    let crashed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        model.update(|signup| {
            if !signup.name.is_empty() {
                panic!("editor crashed while holding the model");
            }
        })
    }));
    assert!(crashed.is_err());

    assert!(!block_on(session.submit()).expect("submit"));
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    assert_eq!(failed.load(Ordering::SeqCst), 1);
    assert!(
        session
            .edit_context()
            .expect("context")
            .is_validation_faulted()
    );
}

#[test]
fn validate_on_change_reaches_field_editors() {
    let session = session(
        valid_signup(),
        FormOptions {
            validate_on_change: true,
            ..FormOptions::default()
        },
    );
    let form: &dyn FormSessionInternal<Signup> = &session;
    assert!(form.validate_on_change().expect("flag"));

    session
        .set_options(FormOptions::default())
        .expect("options");
    assert!(!form.validate_on_change().expect("flag"));
}

#[test]
fn setting_the_same_model_keeps_the_context() {
    let session = session(valid_signup(), FormOptions::default());
    let rebuilds = Arc::new(AtomicUsize::new(0));
    {
        let rebuilds = rebuilds.clone();
        session
            .on_state_changed(move || {
                rebuilds.fetch_add(1, Ordering::SeqCst);
            })
            .expect("state callback");
    }
    let model = session.model().expect("model");
    let before = session.edit_context().expect("context").id();

    session.set_model(model.clone()).expect("same model");
    assert_eq!(session.edit_context().expect("context").id(), before);
    assert_eq!(rebuilds.load(Ordering::SeqCst), 0);

    session
        .set_model(Model::new(valid_signup()))
        .expect("equal but distinct model");
    assert_ne!(session.edit_context().expect("context").id(), before);
    assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
}

#[test]
fn dispose_detaches_handlers_and_drops_the_context() {
    let session = session(valid_signup(), FormOptions::default());
    session
        .on_validation_state_changed(|_, _| {})
        .expect("state callback");
    let context = session.edit_context().expect("context");
    assert_eq!(context.subscribers().expect("subscribers").len(), 3);

    session.dispose().expect("dispose");

    assert!(context.subscribers().expect("subscribers").is_empty());
    assert_eq!(session.validate(), Err(FormError::NoContext));
    assert_eq!(
        session.set_model(valid_signup()),
        Err(FormError::NoContext)
    );
    assert!(session.dispose().is_ok());
}

#[test]
fn construction_variants() {
    let failure = FormSession::<Signup>::with_factory(
        || Err::<Signup, _>("profile service offline"),
        FormOptions::default(),
    );
    match failure.err() {
        Some(FormError::ModelConstruction(message)) => {
            assert_eq!(message, "profile service offline")
        }
        other => panic!("unexpected factory result: {other:?}"),
    }

    let built =
        FormSession::with_factory(|| Ok::<_, String>(valid_signup()), FormOptions::default())
            .expect("factory session");
    assert_eq!(built.model().expect("model").snapshot().expect("snapshot"), valid_signup());

    let defaulted = FormSession::<Signup>::with_default(FormOptions::default())
        .expect("default session");
    assert_eq!(
        defaulted.model().expect("model").snapshot().expect("snapshot"),
        Signup::default()
    );
    assert_ne!(built.id(), defaulted.id());
}

#[test]
fn provider_reports_finished_form_with_its_siblings() {
    let provider = FormProvider::new();
    let login = session(
        valid_signup(),
        FormOptions {
            name: Some("login".to_string()),
            ..FormOptions::default()
        },
    );
    let profile = session(
        valid_signup(),
        FormOptions {
            name: Some("profile".to_string()),
            ..FormOptions::default()
        },
    );
    provider.add_form(&login).expect("add login");
    provider.add_form(&profile).expect("add profile");

    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = events.clone();
        provider
            .on_form_finish(move |event| {
                events
                    .lock()
                    .expect("events lock")
                    .push((event.form_name.clone(), event.forms.len()));
            })
            .expect("provider listener");
    }

    assert!(block_on(login.submit()).expect("submit login"));
    assert_eq!(
        *events.lock().expect("events lock"),
        vec![(Some("login".to_string()), 2)]
    );
    let found = provider
        .form("profile")
        .expect("lookup")
        .expect("profile registered");
    assert_eq!(found.form_id(), profile.id());

    assert!(provider.remove_form(login.id()).expect("remove login"));
    assert!(!provider.remove_form(login.id()).expect("remove twice"));
    block_on(login.submit()).expect("submit detached login");
    assert_eq!(events.lock().expect("events lock").len(), 1);
}
