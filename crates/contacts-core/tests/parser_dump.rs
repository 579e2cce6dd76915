//! Response dumps for the fixture corpus.
//!
//! Each file under `fixtures/corpus/<kind>/` is fed to the parser through the
//! source named by `<kind>` (`path`, `upload` or `inline`), and the response
//! JSON is compared with `fixtures/expected/<kind>/<name>.json`.
//! `UPDATE_EXPECTED=1` rewrites the expected files from the current output.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use contacts_core::{
    ContactSource, InlineSource, ParserConfig, PathSource, UploadSource, parse_source,
};
use serde_json::Value;
use similar::TextDiff;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy)]
enum SourceKind {
    Path,
    Upload,
    Inline,
}

impl SourceKind {
    fn from_dir(name: &str) -> Option<Self> {
        match name {
            "path" => Some(SourceKind::Path),
            "upload" => Some(SourceKind::Upload),
            "inline" => Some(SourceKind::Inline),
            _ => None,
        }
    }

    fn open(self, file: &Path) -> Box<dyn ContactSource> {
        match self {
            SourceKind::Path => Box::new(PathSource::new(file)),
            SourceKind::Upload => {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                Box::new(UploadSource::new(name, read_bytes(file)))
            }
            SourceKind::Inline => {
                let text = String::from_utf8(read_bytes(file))
                    .unwrap_or_else(|e| panic!("{} is not UTF-8: {e}", file.display()));
                Box::new(InlineSource::new(text))
            }
        }
    }
}

struct Fixture {
    kind: SourceKind,
    xml: PathBuf,
    expected: PathBuf,
}

enum Outcome {
    Matched,
    Updated,
    Failed(String),
}

fn fixtures_root() -> PathBuf {
    // CARGO_MANIFEST_DIR = crates/contacts-core
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("crate lives two levels below the workspace root")
        .join("fixtures")
}

fn read_bytes(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()))
}

fn update_requested() -> bool {
    env::var("UPDATE_EXPECTED")
        .is_ok_and(|v| !matches!(v.trim().to_lowercase().as_str(), "" | "0" | "false"))
}

fn collect_fixtures(root: &Path) -> Vec<Fixture> {
    let corpus = root.join("corpus");
    assert!(corpus.is_dir(), "corpus not found at {}", corpus.display());

    WalkDir::new(&corpus)
        .min_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "xml"))
        .map(|entry| {
            let rel = entry
                .path()
                .strip_prefix(&corpus)
                .expect("walked paths stay under the corpus");
            let dir = rel
                .components()
                .next()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .unwrap_or_default();
            let kind = SourceKind::from_dir(&dir).unwrap_or_else(|| {
                panic!(
                    "{}: corpus subdirectory must be path, upload or inline",
                    rel.display()
                )
            });
            Fixture {
                kind,
                xml: entry.path().to_path_buf(),
                expected: root.join("expected").join(rel).with_extension("json"),
            }
        })
        .collect()
}

/// Sorted keys, no nulls, trailing newline.
fn canonical(value: &Value) -> String {
    fn strip_nulls(value: &Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
            Value::Object(map) => {
                let mut entries: Vec<_> = map
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), strip_nulls(v)))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Value::Object(entries.into_iter().collect())
            }
            other => other.clone(),
        }
    }
    let mut out = serde_json::to_string_pretty(&strip_nulls(value)).expect("render json");
    out.push('\n');
    out
}

fn unified_diff(expected: &str, actual: &str) -> String {
    TextDiff::from_lines(expected, actual)
        .unified_diff()
        .header("expected", "actual")
        .to_string()
}

fn check(fixture: &Fixture, config: &ParserConfig, update: bool) -> Outcome {
    let source = fixture.kind.open(&fixture.xml);
    let response = parse_source(source.as_ref(), config);
    let actual = canonical(&serde_json::to_value(&response).expect("response -> json"));

    let expected = fs::read_to_string(&fixture.expected).ok().map(|raw| {
        let value: Value = serde_json::from_str(&raw)
            .unwrap_or_else(|e| panic!("{} is not JSON: {e}", fixture.expected.display()));
        canonical(&value)
    });

    match expected {
        Some(expected) if expected == actual => Outcome::Matched,
        _ if update => {
            if let Some(parent) = fixture.expected.parent() {
                fs::create_dir_all(parent).expect("create expected dir");
            }
            fs::write(&fixture.expected, &actual).expect("write expected json");
            Outcome::Updated
        }
        None => Outcome::Failed(format!(
            "{} ({:?}): no expected output at {}",
            fixture.xml.display(),
            fixture.kind,
            fixture.expected.display()
        )),
        Some(expected) => Outcome::Failed(format!(
            "{} ({:?}):\n{}",
            fixture.xml.display(),
            fixture.kind,
            unified_diff(&expected, &actual)
        )),
    }
}

#[test]
fn responses_match_expected_dumps() {
    let fixtures = collect_fixtures(&fixtures_root());
    assert!(!fixtures.is_empty(), "fixture corpus is empty");

    let config = ParserConfig::default();
    let update = update_requested();
    let mut updated = 0;
    let mut failures = Vec::new();

    for fixture in &fixtures {
        match check(fixture, &config, update) {
            Outcome::Matched => {}
            Outcome::Updated => updated += 1,
            Outcome::Failed(report) => failures.push(report),
        }
    }

    if updated > 0 {
        eprintln!("rewrote {updated} expected dump(s)");
    }
    assert!(
        failures.is_empty(),
        "{} of {} fixtures differ (UPDATE_EXPECTED=1 rewrites them):\n\n{}",
        failures.len(),
        fixtures.len(),
        failures.join("\n---\n")
    );
}
