//! Template expansion for manifests and the project descriptor itself.
//!
//! Two passes: first `$(NAME)` operating-system environment substitution
//! (deliberately distinct from `$NAME`/`${NAME}`, which are left untouched
//! for the manifest's own consumers), then `tera` (jinja-style) expansion
//! with a fixed built-in function set and strict missing-variable behaviour.
//!
//! `import` recurses into another template file relative to the *importer's*
//! directory. Nested imports need to know "where am I right now", which is
//! process-wide, single-threaded state: a stack of directories, pushed on
//! entry and popped on every exit path (including errors) via RAII. Nothing
//! in this module spawns a thread, and the graph walker never expands two
//! templates concurrently (see the crate-level walker docs), so a
//! `thread_local` stack is sufficient and avoids exposing shared mutable
//! state to callers who might be tempted to parallelize.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use failure::{Backtrace, Context, Fail, ResultExt};
use regex::Regex;
use sha2::{Digest, Sha256};
use tera::{Tera, Value};

pub type Variables = BTreeMap<String, String>;

#[derive(Debug)]
pub struct TemplateError {
    inner: Context<TErrKind>,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum TErrKind {
    #[fail(display = "cannot read template file {:?}", _0)]
    UnreadableFile(PathBuf),
    #[fail(display = "template {:?} references an undeclared variable", _0)]
    MissingVariable(String),
    #[fail(display = "cannot parse or execute template {:?}", _0)]
    ExecuteFailure(String),
}

impl Fail for TemplateError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }
    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}
impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}
impl From<TErrKind> for TemplateError {
    fn from(kind: TErrKind) -> TemplateError {
        TemplateError { inner: Context::new(kind) }
    }
}
impl From<Context<TErrKind>> for TemplateError {
    fn from(inner: Context<TErrKind>) -> TemplateError {
        TemplateError { inner }
    }
}

pub type Result<T> = std::result::Result<T, failure::Error>;

thread_local! {
    static DIR_STACK: RefCell<Vec<PathBuf>> = RefCell::new(Vec::new());
}

/// Pushes `dir` onto the current-directory stack and pops it on drop,
/// including on early return via `?`.
struct DirGuard;

impl DirGuard {
    fn push(dir: &Path) -> DirGuard {
        DIR_STACK.with(|s| s.borrow_mut().push(dir.to_path_buf()));
        DirGuard
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        DIR_STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

fn current_dir() -> PathBuf {
    DIR_STACK.with(|s| s.borrow().last().cloned().unwrap_or_else(|| PathBuf::from(".")))
}

fn resolve(relpath: &str) -> PathBuf {
    let p = Path::new(relpath);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        current_dir().join(p)
    }
}

lazy_static::lazy_static! {
    static ref ENV_VAR_RE: Regex = Regex::new(r"\$\(([^)]+)\)").unwrap();
}

/// Expand `$(NAME)` references against the process environment.
/// `$NAME` and `${NAME}` are untouched.
pub fn expand_env(s: &str) -> String {
    ENV_VAR_RE
        .replace_all(s, |caps: &regex::Captures| env::var(&caps[1]).unwrap_or_default())
        .into_owned()
}

fn tera_value_to_map_string(v: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Value::Object(map) = v {
        for (k, val) in map {
            let s = match val {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.insert(k.clone(), s);
        }
    }
    out
}

fn map_string_to_tera_value(vars: &Variables) -> Value {
    let mut map = tera::Map::new();
    for (k, v) in vars {
        map.insert(k.clone(), Value::String(v.clone()));
    }
    Value::Object(map)
}

fn build_tera(name: &str, content: &str) -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template(name, content)
        .context(TErrKind::ExecuteFailure(name.to_string()))?;
    register_builtins(&mut tera);
    Ok(tera)
}

fn register_builtins(tera: &mut Tera) {
    tera.register_function(
        "loadFile",
        Box::new(|args: &std::collections::HashMap<String, Value>| -> tera::Result<Value> {
            let relpath = args
                .get("relpath")
                .and_then(Value::as_str)
                .ok_or_else(|| tera::Error::msg("loadFile requires a relpath argument"))?;
            let path = resolve(relpath);
            let content = fs::read_to_string(&path)
                .map_err(|e| tera::Error::msg(format!("cannot read {:?}: {}", path, e)))?;
            Ok(Value::String(content))
        }),
    );

    tera.register_function(
        "hash",
        Box::new(|args: &std::collections::HashMap<String, Value>| -> tera::Result<Value> {
            let relpath = args
                .get("relpath")
                .and_then(Value::as_str)
                .ok_or_else(|| tera::Error::msg("hash requires a relpath argument"))?;
            let path = resolve(relpath);
            let bytes = fs::read(&path)
                .map_err(|e| tera::Error::msg(format!("cannot read {:?}: {}", path, e)))?;
            let mut hasher = Sha256::new();
            hasher.input(&bytes);
            let digest = hasher.result();
            Ok(Value::String(hex_encode(&digest)))
        }),
    );

    tera.register_function(
        "base64",
        Box::new(|args: &std::collections::HashMap<String, Value>| -> tera::Result<Value> {
            let text = args
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| tera::Error::msg("base64 requires a text argument"))?;
            Ok(Value::String(base64::encode(text.as_bytes())))
        }),
    );

    tera.register_function(
        "indent",
        Box::new(|args: &std::collections::HashMap<String, Value>| -> tera::Result<Value> {
            let n = args
                .get("n")
                .and_then(Value::as_u64)
                .ok_or_else(|| tera::Error::msg("indent requires a numeric n argument"))?;
            let text = args
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| tera::Error::msg("indent requires a text argument"))?;
            let pad = " ".repeat(n as usize);
            let out = text
                .lines()
                .map(|l| format!("{}{}", pad, l))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Value::String(out))
        }),
    );

    tera.register_function(
        "import",
        Box::new(|args: &std::collections::HashMap<String, Value>| -> tera::Result<Value> {
            let relpath = args
                .get("relpath")
                .and_then(Value::as_str)
                .ok_or_else(|| tera::Error::msg("import requires a relpath argument"))?;
            let vars = args.get("vars").map(tera_value_to_map_string).unwrap_or_default();
            let path = resolve(relpath);
            let rendered = execute_template_file(&path, &vars)
                .map_err(|e| tera::Error::msg(format!("import of {:?} failed: {}", path, e)))?;
            Ok(Value::String(rendered))
        }),
    );

    tera.register_filter(
        "trim",
        Box::new(|value: &Value, _args: &std::collections::HashMap<String, Value>| -> tera::Result<Value> {
            let s = value.as_str().ok_or_else(|| tera::Error::msg("trim expects a string"))?;
            Ok(Value::String(s.trim().to_string()))
        }),
    );

    tera.register_filter(
        "asGenericMap",
        Box::new(|value: &Value, _args: &std::collections::HashMap<String, Value>| -> tera::Result<Value> {
            Ok(value.clone())
        }),
    );

    tera.register_filter(
        "asMapString",
        Box::new(|value: &Value, _args: &std::collections::HashMap<String, Value>| -> tera::Result<Value> {
            let map = tera_value_to_map_string(value);
            Ok(map_string_to_tera_value(&map))
        }),
    );
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Expand `content` (already read) against `context_dir` and `vars`. Used both
/// as the top-level entry point and internally by nested `import` calls.
pub fn execute_template_content(context_dir: &Path, name: &str, content: &str, vars: &Variables) -> Result<String> {
    let _guard = DirGuard::push(context_dir);
    let expanded_env = expand_env(content);
    let tera = build_tera(name, &expanded_env)?;
    let mut ctx = tera::Context::new();
    for (k, v) in vars {
        ctx.insert(k, v);
    }
    tera.render(name, &ctx).map_err(|e| {
        if e.to_string().contains("not found in context") {
            failure::Error::from(TemplateError::from(TErrKind::MissingVariable(name.to_string())))
        } else {
            failure::Error::from(TemplateError::from(TErrKind::ExecuteFailure(name.to_string()))).context(e.to_string()).into()
        }
    })
}

/// Read `path` from disk and expand it, pushing its parent directory as the
/// new current directory for the duration of the render.
pub fn execute_template_file(path: &Path, vars: &Variables) -> Result<String> {
    let content = fs::read_to_string(path)
        .map_err(|_| failure::Error::from(TemplateError::from(TErrKind::UnreadableFile(path.to_path_buf()))))?;
    let context_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path.to_string_lossy().into_owned();
    execute_template_content(context_dir, &name, &content, vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn expands_env_only_dollar_paren() {
        env::set_var("DRYDOCK_TEST_VAR", "hello");
        assert_eq!(expand_env("x=$(DRYDOCK_TEST_VAR)"), "x=hello");
        assert_eq!(expand_env("x=$DRYDOCK_TEST_VAR"), "x=$DRYDOCK_TEST_VAR");
        assert_eq!(expand_env("x=${DRYDOCK_TEST_VAR}"), "x=${DRYDOCK_TEST_VAR}");
    }

    #[test]
    fn missing_variable_is_fatal() {
        let vars: Variables = BTreeMap::new();
        let dir = tempdir().unwrap();
        let err = execute_template_content(dir.path(), "t", "{{ name }}", &vars);
        assert!(err.is_err());
    }

    #[test]
    fn renders_declared_variable() {
        let mut vars: Variables = BTreeMap::new();
        vars.insert("name".to_string(), "world".to_string());
        let dir = tempdir().unwrap();
        let out = execute_template_content(dir.path(), "t", "hello {{ name }}", &vars).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn indent_reindents_each_line() {
        let mut vars: Variables = BTreeMap::new();
        vars.insert("text".to_string(), "a\nb".to_string());
        let dir = tempdir().unwrap();
        let out = execute_template_content(dir.path(), "t", "{{ indent(n=2, text=text) }}", &vars).unwrap();
        assert_eq!(out, "  a\n  b");
    }

    #[test]
    fn import_resolves_relative_to_importer_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("child.tmpl"), "child says {{ who }}").unwrap();
        let parent_tmpl = "{{ import(relpath=\"nested/child.tmpl\", vars=vars) }}";
        let mut vars: Variables = BTreeMap::new();
        vars.insert("who".to_string(), "parent".to_string());
        let out = execute_template_content(dir.path(), "parent", parent_tmpl, &vars).unwrap();
        assert_eq!(out, "child says parent");
    }
}
