use calmform::form::{FieldLens, FormModel};

#[derive(Clone, calmform::form::FormModel)]
struct DemoForm {
    #[form(label = "Email address")]
    email: String,
    display_name: String,
}

fn main() {
    let fields = DemoForm::fields();
    let lens = fields.email();
    let mut model = DemoForm {
        email: "a@calm.form".to_string(),
        display_name: "Ada".to_string(),
    };
    lens.set(&mut model, "b@calm.form".to_string());
    assert_eq!(lens.key().as_str(), "email");
    assert_eq!(lens.label(), "Email address");
    assert_eq!(lens.get(&model), "b@calm.form");
    assert_eq!(fields.display_name().label(), "display_name");
    assert_eq!(DemoForm::FIELD_NAMES, &["email", "display_name"]);
    let _: DemoFormDisplayNameLens = fields.display_name();
}
