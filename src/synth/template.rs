//! Bootstrap template wrapped around every user function
//!
//! The rendered program runs once when the worker starts. It imports remote
//! dependencies, declares local ones, publishes `self.location` and installs
//! a `message` listener that calls the user function for every payload:
//!
//! - `this.send(data)` inside the function posts a progress frame
//! - `this.require(paths)` imports more scripts, resolved like remote dependencies
//! - `this.threadId` is the id of the owning thread
//! - the return value (or the value a returned promise resolves to) is posted
//!   as the completion frame; a rejected promise fails the worker like an
//!   uncaught error

use crate::resolver::ABSOLUTE_JS;
use crate::thread::frame::FrameKind;
use crate::thread::{ThreadError, ThreadResult};

use super::location::WorkerLocation;

/// Typed slots of the bootstrap program
#[derive(Debug, Clone)]
pub struct BootstrapTemplate<'a> {
    code: &'a str,
    imports: Vec<String>,
    functions: Vec<&'a str>,
    location: Option<&'a WorkerLocation>,
    thread_id: &'a str,
}

impl<'a> BootstrapTemplate<'a> {
    /// Start a template around the (already minified) user function
    pub fn new(code: &'a str) -> Self {
        Self {
            code,
            imports: Vec::new(),
            functions: Vec::new(),
            location: None,
            thread_id: "",
        }
    }

    /// Absolute URL loaded with `importScripts` before anything else
    pub fn import(mut self, url: impl Into<String>) -> Self {
        self.imports.push(url.into());
        self
    }

    /// Function declaration inlined ahead of the listener
    pub fn function(mut self, source: &'a str) -> Self {
        self.functions.push(source);
        self
    }

    pub fn location(mut self, location: &'a WorkerLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn thread_id(mut self, thread_id: &'a str) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn render(&self) -> ThreadResult<String> {
        let location = self
            .location
            .ok_or_else(|| ThreadError::Construction("missing worker location".to_string()))?;

        let imports = if self.imports.is_empty() {
            String::new()
        } else {
            let urls = self
                .imports
                .iter()
                .map(|url| json_string(url))
                .collect::<ThreadResult<Vec<_>>>()?;
            format!("importScripts({});\n", urls.join(","))
        };

        let functions = if self.functions.is_empty() {
            String::new()
        } else {
            format!("{}\n", self.functions.join("\n"))
        };

        let location_json = serde_json::to_string(location)
            .map_err(|e| ThreadError::Construction(format!("invalid location: {}", e)))?;

        Ok(format!(
            r#"(function () {{
{imports}{functions}{absolute}
this.location = new (function WorkerLocation(l) {{
    for (var k in l) {{
        this[k] = l[k];
    }}
}})({location});

this.addEventListener("message", function (e) {{
    var target = e.target,
        self = this;

    delete target.onmessage;
    delete target.onerror;

    target.send = function (data) {{
        self.postMessage([{progress}, data]);
    }};
    target.require = function (files) {{
        files = typeof files === "string" ? [files] : files;
        files = files instanceof Array ? files.slice() : [];

        if (files.length === 0) {{
            return;
        }}

        for (var i = 0; i < files.length; ++i) {{
            files[i] = __strand_absolute(files[i], {origin});
        }}

        self.importScripts.apply(self, files);
    }};
    target.threadId = {thread_id};

    var ret = ({code}).call(target, e.data);

    if (ret !== null && typeof ret === "object" && typeof ret.then === "function") {{
        ret.then(function (value) {{
            self.postMessage([{completion}, value]);
        }}, function (reason) {{
            __strand_fail(reason instanceof Error ? String(reason) : "Uncaught (in promise) " + String(reason));
        }});
    }} else {{
        self.postMessage([{completion}, ret]);
    }}
}}, false);
}}).call(self);
"#,
            imports = imports,
            functions = functions,
            absolute = ABSOLUTE_JS.trim(),
            location = location_json,
            progress = FrameKind::Progress.tag(),
            completion = FrameKind::Completion.tag(),
            origin = json_string(&location.origin())?,
            thread_id = json_string(self.thread_id)?,
            code = self.code,
        ))
    }
}

/// JSON string literal, which is also a valid JavaScript string literal
fn json_string(value: &str) -> ThreadResult<String> {
    serde_json::to_string(value)
        .map_err(|e| ThreadError::Construction(format!("could not embed {:?}: {}", value, e)))
}
