//! Go source rendering for interpose.
//!
//! Turns a [`ProxyModel`] into the text of a generated Go file. The output is
//! already in the layout `gofmt` produces (tab indentation, aligned struct
//! fields and keyed literals, imports sorted by path), so running `gofmt` over
//! it is a no-op.
//!
//! For a target type `T` wrapped in the default proxy style the file declares:
//!
//! - `TProxy`, holding the original `*T` and the invocation handler
//! - `TInvocationHandler`, the handler function type
//! - `TMethod`, the descriptor passed to the handler
//! - `TDecodeError` and `_TDecode`, which recover typed values from `[]any`
//! - `NewTProxy`, the constructor
//! - one wrapper method per method of `T`

use std::collections::{BTreeMap, BTreeSet};

use interpose_types::{DecodeSlot, ImportSpec, MethodModel, ProxyModel};

/// First line of every generated file.
pub const HEADER: &str = "// Code generated by interpose. DO NOT EDIT.";

/// Fields of the wrapper struct. A method with one of these names would clash.
const WRAPPER_FIELDS: [&str; 2] = ["original", "invocationHandler"];

// ============================================================================
// Errors
// ============================================================================

/// Reasons a model cannot be rendered into compilable Go.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("method {method}: {reason}")]
    Method { method: String, reason: String },

    #[error("generated name `{name}` is already declared in package {package}")]
    NameTaken { name: String, package: String },

    #[error("import alias `{alias}` refers to both {first:?} and {second:?}")]
    ImportConflict {
        alias: String,
        first: String,
        second: String,
    },
}

/// Result type for rendering.
pub type Result<T> = std::result::Result<T, RenderError>;

// ============================================================================
// Generated Names
// ============================================================================

/// Package-level identifiers declared by the generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedNames {
    pub wrapper: String,
    pub method: String,
    pub handler: String,
    pub decode_error: String,
    pub decode: String,
    pub constructor: String,
}

impl GeneratedNames {
    pub fn for_model(model: &ProxyModel) -> Self {
        let target = &model.type_name;
        Self {
            wrapper: model.wrapper_name.clone(),
            method: format!("{}Method", target),
            handler: format!("{}InvocationHandler", target),
            decode_error: format!("{}DecodeError", target),
            decode: format!("_{}Decode", target),
            constructor: format!("New{}", model.wrapper_name),
        }
    }

    pub fn all(&self) -> [&str; 6] {
        [
            self.wrapper.as_str(),
            self.method.as_str(),
            self.handler.as_str(),
            self.decode_error.as_str(),
            self.decode.as_str(),
            self.constructor.as_str(),
        ]
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the complete generated file for `model`.
pub fn render(model: &ProxyModel) -> Result<String> {
    let names = GeneratedNames::for_model(model);
    validate(model, &names)?;
    let imports = file_imports(model)?;

    let mut out = GoWriter::default();
    render_preamble(&mut out, model, &imports);
    render_support(&mut out, model, &names);

    for method in &model.methods {
        out.blank();
        if method.passthrough {
            render_passthrough(&mut out, method, &names);
        } else {
            render_intercepted(&mut out, method, &names);
        }
    }

    log::debug!(
        "rendered {} for {} ({} methods, {} imports)",
        names.wrapper,
        model.type_name,
        model.methods.len(),
        imports.len()
    );

    Ok(out.finish())
}

fn validate(model: &ProxyModel, names: &GeneratedNames) -> Result<()> {
    for name in names.all() {
        if model.package_names.contains(name) {
            return Err(RenderError::NameTaken {
                name: name.to_string(),
                package: model.package.clone(),
            });
        }
    }

    for method in &model.methods {
        let fail = |reason: String| RenderError::Method {
            method: method.name.clone(),
            reason,
        };

        if method.name.is_empty() {
            return Err(fail("method has no name".to_string()));
        }
        if WRAPPER_FIELDS.contains(&method.name.as_str()) {
            return Err(fail(format!(
                "name collides with the `{}` field of {}",
                method.name, names.wrapper
            )));
        }

        let last = method.params.len().saturating_sub(1);
        for (position, param) in method.params.iter().enumerate() {
            if param.variadic && position != last {
                return Err(fail(format!(
                    "variadic parameter `{}` is not the last parameter",
                    param.name
                )));
            }
            if let Some(generated) = names.all().into_iter().find(|n| *n == param.name) {
                return Err(fail(format!(
                    "parameter `{}` shadows the generated `{}`",
                    param.name, generated
                )));
            }
        }
    }

    Ok(())
}

/// Imports of the generated file: those the signatures need plus `fmt`.
///
/// Dot imports bind no name, so any number of them may coexist.
fn file_imports(model: &ProxyModel) -> Result<Vec<ImportSpec>> {
    let mut by_alias: BTreeMap<&str, &ImportSpec> = BTreeMap::new();
    let mut sorted = BTreeSet::new();
    let fmt = ImportSpec::new("fmt", "fmt");

    for spec in model.imports.iter().chain([&fmt]) {
        if spec.alias == "." {
            sorted.insert(spec.clone());
            continue;
        }
        match by_alias.get(spec.alias.as_str()) {
            Some(seen) if seen.path != spec.path => {
                return Err(RenderError::ImportConflict {
                    alias: spec.alias.clone(),
                    first: seen.path.clone(),
                    second: spec.path.clone(),
                });
            }
            _ => {
                by_alias.insert(&spec.alias, spec);
            }
        }
    }

    sorted.extend(by_alias.into_values().cloned());
    Ok(sorted.into_iter().collect())
}

fn render_preamble(out: &mut GoWriter, model: &ProxyModel, imports: &[ImportSpec]) {
    out.line(HEADER);
    out.blank();
    out.line(format!("package {}", model.package));
    out.blank();
    out.open("import (");
    for spec in imports {
        out.line(spec.line());
    }
    out.close(")");
}

/// Wrapper struct, handler type, descriptor, decode helper and constructor.
fn render_support(out: &mut GoWriter, model: &ProxyModel, names: &GeneratedNames) {
    let target = &model.type_name;
    let handler_signature = format!(
        "func(method {}, args []any, invoke func(args []any) []any) []any",
        names.method
    );

    out.blank();
    out.line(format!(
        "// {} wraps a *{} and routes its method calls through a {}.",
        names.wrapper, target, names.handler
    ));
    out.open(format!("type {} struct {{", names.wrapper));
    out.aligned(&[
        ("original", format!("*{}", target)),
        ("invocationHandler", names.handler.clone()),
    ]);
    out.close("}");

    out.blank();
    out.line(format!(
        "// {} intercepts a call to method. args holds the call's arguments in",
        names.handler
    ));
    out.line("// declaration order; invoke runs the original method and returns its results.");
    out.line(format!("type {} {}", names.handler, handler_signature));

    out.blank();
    out.line(format!(
        "// {} describes an intercepted method of {}.",
        names.method, target
    ));
    out.open(format!("type {} struct {{", names.method));
    out.aligned(&[("name", "string".to_string()), ("receiver", "string".to_string())]);
    out.close("}");

    let accessors = [
        ("Name", "the name of the method", "m.name".to_string()),
        (
            "Receiver",
            "the receiver type the method is declared on",
            "m.receiver".to_string(),
        ),
        (
            "Package",
            "the package the method is declared in",
            go_string(&model.package),
        ),
    ];
    for (accessor, doc, value) in accessors {
        out.blank();
        out.line(format!("// {} returns {}.", accessor, doc));
        out.open(format!(
            "func (m {}) {}() string {{",
            names.method, accessor
        ));
        out.line(format!("return {}", value));
        out.close("}");
    }

    out.blank();
    out.line(format!(
        "// {} is the panic value raised when a slot of an argument or result",
        names.decode_error
    ));
    out.line("// list does not hold a value of the declared type.");
    out.open(format!("type {} struct {{", names.decode_error));
    out.aligned(&[
        ("Method", "string".to_string()),
        ("Position", "int".to_string()),
        ("Want", "string".to_string()),
        ("Got", "any".to_string()),
    ]);
    out.close("}");

    out.blank();
    out.open(format!("func (e *{}) Error() string {{", names.decode_error));
    out.line(
        "return fmt.Sprintf(\"%s: slot %d holds %T, want %s\", e.Method, e.Position, e.Got, e.Want)",
    );
    out.close("}");

    out.blank();
    out.open(format!(
        "func {}[V any](method string, values []any, position int, want string) V {{",
        names.decode
    ));
    out.open("if position >= len(values) {");
    out.line(format!(
        "panic(&{}{{Method: method, Position: position, Want: want}})",
        names.decode_error
    ));
    out.close("}");
    out.open("if values[position] == nil {");
    out.line("var zero V");
    out.line("return zero");
    out.close("}");
    out.line("value, ok := values[position].(V)");
    out.open("if !ok {");
    out.line(format!(
        "panic(&{}{{Method: method, Position: position, Want: want, Got: values[position]}})",
        names.decode_error
    ));
    out.close("}");
    out.line("return value");
    out.close("}");

    out.blank();
    out.line(format!(
        "// {} wraps original. A nil invocationHandler forwards every call unchanged.",
        names.constructor
    ));
    out.open(format!(
        "func {}(original *{}, invocationHandler {}) *{} {{",
        names.constructor, target, names.handler, names.wrapper
    ));
    out.open("if invocationHandler == nil {");
    out.open(format!("invocationHandler = {} {{", handler_signature));
    out.line("return invoke(args)");
    out.close("}");
    out.close("}");
    out.open(format!("return &{}{{", names.wrapper));
    out.aligned(&[
        ("original:", "original,".to_string()),
        ("invocationHandler:", "invocationHandler,".to_string()),
    ]);
    out.close("}");
    out.close("}");
}

fn method_header(method: &MethodModel, names: &GeneratedNames) -> String {
    let results = method.result_signature();
    let space = if results.is_empty() { "" } else { " " };
    format!(
        "func (proxy *{}) {}({}){}{} {{",
        names.wrapper,
        method.name,
        method.param_signature(),
        space,
        results
    )
}

fn render_passthrough(out: &mut GoWriter, method: &MethodModel, names: &GeneratedNames) {
    let call = format!(
        "proxy.original.{}({})",
        method.name,
        method.forwarded_arguments()
    );

    out.open(method_header(method, names));
    if method.has_results() {
        out.line(format!("return {}", call));
    } else {
        out.line(call);
    }
    out.close("}");
}

fn render_intercepted(out: &mut GoWriter, method: &MethodModel, names: &GeneratedNames) {
    let decode = |list: &str, slot: &DecodeSlot| {
        format!(
            "{}[{}]({}, {}, {}, {}){}",
            names.decode,
            slot.ty,
            go_string(&method.name),
            list,
            slot.position,
            go_string(&slot.ty),
            if slot.spread { "..." } else { "" }
        )
    };

    let decoded_args: Vec<String> = method
        .argument_slots()
        .iter()
        .map(|slot| decode("args", slot))
        .collect();
    let call = format!("proxy.original.{}({})", method.name, decoded_args.join(", "));

    out.open(method_header(method, names));
    out.line(format!(
        "method := {}{{name: {}, receiver: {}}}",
        names.method,
        go_string(&method.name),
        go_string(&method.receiver)
    ));
    out.line(format!("args := []any{{{}}}", method.param_names().join(", ")));

    out.open("invoke := func(args []any) []any {");
    if method.has_results() {
        let results: Vec<String> = (0..method.results.len())
            .map(|i| format!("result{}", i))
            .collect();
        out.line(format!("{} := {}", results.join(", "), call));
        out.line(format!("return []any{{{}}}", results.join(", ")));
    } else {
        out.line(call);
        out.line("return []any{}");
    }
    out.close("}");

    if method.has_results() {
        out.line("results := proxy.invocationHandler(method, args, invoke)");
        let decoded: Vec<String> = method
            .result_slots()
            .iter()
            .map(|slot| decode("results", slot))
            .collect();
        out.line(format!("return {}", decoded.join(", ")));
    } else {
        out.line("proxy.invocationHandler(method, args, invoke)");
    }
    out.close("}");
}

/// Go string literal for `s`.
fn go_string(s: &str) -> String {
    format!("{:?}", s)
}

// ============================================================================
// Writer
// ============================================================================

/// Line-oriented buffer that indents with tabs, as gofmt does.
#[derive(Debug, Default)]
struct GoWriter {
    buf: String,
    indent: usize,
}

impl GoWriter {
    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.buf.push('\t');
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Write `text` and indent the lines that follow.
    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    /// Dedent and write `text`.
    fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// Two-column lines with the second column aligned using spaces.
    fn aligned(&mut self, rows: &[(&str, String)]) {
        let width = rows
            .iter()
            .map(|(left, _)| left.chars().count())
            .max()
            .unwrap_or(0);
        for (left, right) in rows {
            self.line(format!("{:<width$} {}", left, right, width = width));
        }
    }

    fn finish(self) -> String {
        self.buf
    }
}
