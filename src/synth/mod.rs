//! Worker program synthesis
//!
//! Turns a [`ThreadSpec`] into the self-contained script a worker runs:
//!
//! 1. split dependencies into inlined local functions and remote scripts,
//!    resolving remote paths against the origin of the host location
//! 2. minify the user function and every local dependency
//! 3. fill the [`BootstrapTemplate`]
//! 4. minify the assembled program

pub mod function;
pub mod location;
pub mod template;

pub use function::{Dependency, FunctionKind, ScriptFunction, ThreadSpec};
pub use location::WorkerLocation;
pub use template::BootstrapTemplate;

use url::Url;

use crate::minifier::minify;
use crate::resolver::absolute;
use crate::thread::{ThreadError, ThreadResult};

/// MIME type of synthesized programs
pub const PROGRAM_CONTENT_TYPE: &str = "application/javascript";

/// A synthesized worker program. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerProgram {
    text: String,
    imports: Vec<String>,
}

impl WorkerProgram {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Absolute URLs the program imports on startup
    pub fn imports(&self) -> &[String] {
        &self.imports
    }
}

/// Build the worker program for `spec`
pub fn synthesize(
    spec: &ThreadSpec,
    thread_id: &str,
    location: &WorkerLocation,
) -> ThreadResult<WorkerProgram> {
    let origin = location.origin();
    let mut imports = Vec::new();
    let mut functions = Vec::new();

    for dependency in &spec.dependencies {
        match dependency {
            Dependency::Remote(path) => imports.push(resolve_remote(path, &origin)),
            Dependency::Local(function) if function.is_named_declaration() => {
                functions.push(minify(function.source())?);
            }
            Dependency::Local(_) => {
                return Err(ThreadError::Construction(
                    "could not load required function, a local dependency must be a named function declaration"
                        .to_string(),
                ));
            }
        }
    }

    let code = minify(spec.function.source())?;

    let mut template = BootstrapTemplate::new(&code)
        .location(location)
        .thread_id(thread_id);
    for url in &imports {
        template = template.import(url.as_str());
    }
    for source in &functions {
        template = template.function(source);
    }

    let text = minify(&template.render()?)?;
    Ok(WorkerProgram { text, imports })
}

/// Absolute URLs are kept, everything else is resolved against `origin`.
fn resolve_remote(path: &str, origin: &str) -> String {
    match Url::parse(path) {
        Ok(url) => url.to_string(),
        Err(_) => absolute(path, Some(origin)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::{Context, Source};

    fn location() -> WorkerLocation {
        WorkerLocation::from(&Url::parse("https://example.com/app/index.html").unwrap())
    }

    fn function(source: &str) -> ScriptFunction {
        ScriptFunction::parse(source).unwrap()
    }

    #[test]
    fn test_remote_paths_resolve_against_origin() {
        let spec = ThreadSpec::new(function("x => x"))
            .require("lib/../vendor/./a.js")
            .require("/b.js")
            .require("https://cdn.example.org/c.js");
        let program = synthesize(&spec, "thread#1", &location()).unwrap();

        assert_eq!(
            program.imports(),
            &[
                "https://example.com/vendor/a.js".to_string(),
                "https://example.com/b.js".to_string(),
                "https://cdn.example.org/c.js".to_string(),
            ]
        );
        assert!(program.text().contains(
            r#"importScripts("https://example.com/vendor/a.js","https://example.com/b.js","https://cdn.example.org/c.js")"#
        ));
    }

    #[test]
    fn test_local_dependencies_are_inlined_minified() {
        let spec = ThreadSpec::new(function("x => helper(x)"))
            .require(function("function helper(value) {\n    return value + 1;\n}"));
        let program = synthesize(&spec, "thread#1", &location()).unwrap();
        assert!(program.text().contains("function helper(value){return value+1}"));
    }

    #[test]
    fn test_anonymous_local_dependency_is_rejected() {
        let spec = ThreadSpec::new(function("x => x")).require(function("function () { return 1; }"));
        assert!(matches!(
            synthesize(&spec, "thread#1", &location()),
            Err(ThreadError::Construction(_))
        ));

        let spec = ThreadSpec::new(function("x => x")).require(function("y => y + 1"));
        assert!(matches!(
            synthesize(&spec, "thread#1", &location()),
            Err(ThreadError::Construction(_))
        ));
    }

    #[test]
    fn test_unterminated_literal_is_a_minify_error() {
        let spec = ThreadSpec::new(function("function (x) { return 'open; }"));
        assert!(matches!(
            synthesize(&spec, "thread#1", &location()),
            Err(ThreadError::Minify(_))
        ));
    }

    #[test]
    fn test_program_is_minified() {
        let spec = ThreadSpec::new(function("function (x) {\n    return x * 2;\n}"));
        let program = synthesize(&spec, "thread#1", &location()).unwrap();
        assert!(program.text().contains("(function(x){return x*2}).call(target,e.data)"));
        assert_eq!(minify(program.text()).unwrap(), program.text());
    }

    #[test]
    fn test_program_is_valid_javascript() {
        let spec = ThreadSpec::new(function("function (x) { return [x, this.threadId]; }"))
            .require(function("function helper() { return true; }"));
        let program = synthesize(&spec, "thread#1", &location()).unwrap();

        // Parse only: wrapping in a function keeps the listener from being installed.
        let mut context = Context::default();
        let check = format!("(function () {{ return 1; {} }})", program.text());
        assert!(context.eval(Source::from_bytes(check.as_bytes())).is_ok());
    }
}
