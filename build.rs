use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_LOCALE: &str = "en-US";

fn main() {
    let locales_dir = Path::new("locales");
    println!("cargo:rerun-if-changed={}", locales_dir.display());

    let mut files = fs::read_dir(locales_dir)
        .expect("locales directory must exist")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect::<Vec<PathBuf>>();
    files.sort();

    let mut generated = String::new();
    writeln!(generated, "pub(super) const DEFAULT_LOCALE: &str = {DEFAULT_LOCALE:?};").ok();
    generated.push_str("pub(super) static LOCALES: &[(&str, &[(&str, &str)])] = &[\n");

    for path in files {
        println!("cargo:rerun-if-changed={}", path.display());
        let locale = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .expect("locale file name must be valid utf-8")
            .to_string();
        let source = fs::read_to_string(&path).expect("locale file must be readable");
        let table: toml::Table = toml::from_str(&source)
            .unwrap_or_else(|error| panic!("invalid locale file {}: {error}", path.display()));

        let mut entries = Vec::new();
        flatten("", &table, &mut entries);
        entries.sort();

        writeln!(generated, "    ({locale:?}, &[").ok();
        for (key, value) in entries {
            writeln!(generated, "        ({key:?}, {value:?}),").ok();
        }
        generated.push_str("    ]),\n");
    }
    generated.push_str("];\n");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::write(out_dir.join("calmform_i18n_generated.rs"), generated)
        .expect("generated i18n catalog must be writable");
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut Vec<(String, String)>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten(&path, nested, out),
            toml::Value::String(text) => out.push((path, text.clone())),
            other => out.push((path, other.to_string())),
        }
    }
}
