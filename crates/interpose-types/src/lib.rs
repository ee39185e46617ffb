//! Shared types for the interpose proxy generator.
//!
//! This crate defines the intermediate model passed between the analysis
//! stage (`interpose-extract`) and the renderer (`interpose-render`): the
//! generation request, structural type expressions, import tables and the
//! per-method model that drives emission.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// ============================================================================
// Generation Request
// ============================================================================

/// Naming style of the generated wrapper type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WrapperStyle {
    /// `<Type>Proxy`, written to `<Type>_proxy_gen.go`
    #[default]
    Proxy,
    /// `<Type>Decorator`, written to `<Type>_decorator_gen.go`
    Decorator,
}

impl WrapperStyle {
    pub fn suffix(self) -> &'static str {
        match self {
            WrapperStyle::Proxy => "Proxy",
            WrapperStyle::Decorator => "Decorator",
        }
    }

    /// Name of the wrapper type generated for `type_name`.
    pub fn wrapper_name(self, type_name: &str) -> String {
        format!("{}{}", type_name, self.suffix())
    }

    /// Conventional file name the generated source is written to.
    pub fn file_name(self, type_name: &str) -> String {
        format!("{}_{}_gen.go", type_name, self.suffix().to_lowercase())
    }
}

/// Everything the core needs to know about one generation run.
///
/// Built once at the top level (the CLI, or a test) and passed by reference
/// into the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationConfig {
    /// The type whose method set is wrapped
    pub type_name: String,
    /// Methods forwarded directly, bypassing the invocation handler
    pub passthrough: BTreeSet<String>,
    /// Package the target lives in. When unset, the package of the file
    /// declaring the target type is used.
    pub package: Option<String>,
    pub style: WrapperStyle,
}

impl GenerationConfig {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    pub fn with_passthrough<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.passthrough.extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_style(mut self, style: WrapperStyle) -> Self {
        self.style = style;
        self
    }

    pub fn is_passthrough(&self, method_name: &str) -> bool {
        self.passthrough.contains(method_name)
    }
}

/// Split a comma-separated method list, dropping blanks.
pub fn parse_method_list(csv: &str) -> BTreeSet<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One Go source file handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// File name, used for ordering and in diagnostics
    pub name: String,
    pub contents: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

// ============================================================================
// Type Expressions
// ============================================================================

/// Direction of a channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    /// `chan T`
    Both,
    /// `chan<- T`
    Send,
    /// `<-chan T`
    Recv,
}

/// Structural form of a Go type expression.
///
/// This is a closed set: the lowering from syntax nodes maps anything it does
/// not recognise to [`TypeExpr::Unknown`], which the reconstructor refuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// `int`, `MyStruct`, `any`
    Ident(String),
    /// `pkg.Name`
    Qualified { package: String, name: String },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    /// `[N]T`, with the length kept as written
    Array { len: String, elem: Box<TypeExpr> },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    /// `interface{}`
    EmptyInterface,
    /// `struct{}`
    EmptyStruct,
    Func {
        params: Vec<TypeExpr>,
        variadic: bool,
        results: Vec<TypeExpr>,
    },
    /// `List[int]`
    Generic {
        base: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
    /// Any other syntax node kind
    Unknown { kind: String },
}

// ============================================================================
// Imports
// ============================================================================

/// A single import as it will be re-emitted.
///
/// Ordering is by path, then alias, which is the order gofmt keeps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImportSpec {
    pub path: String,
    pub alias: String,
}

impl ImportSpec {
    pub fn new(alias: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: alias.into(),
        }
    }

    /// The `alias "path"` line used inside an import block.
    pub fn line(&self) -> String {
        format!("{} {:?}", self.alias, self.path)
    }
}

/// Imports of one source file, keyed by local alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportTable {
    entries: BTreeMap<String, ImportSpec>,
}

impl ImportTable {
    /// Insert an import; a later entry with the same alias replaces the earlier one.
    pub fn insert(&mut self, spec: ImportSpec) {
        self.entries.insert(spec.alias.clone(), spec);
    }

    pub fn get(&self, alias: &str) -> Option<&ImportSpec> {
        self.entries.get(alias)
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImportSpec> {
        self.entries.values()
    }
}

// ============================================================================
// Declarations and Methods
// ============================================================================

/// What kind of type declaration the target is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Struct,
    Interface,
    /// `type T = U`
    Alias,
    /// `type T int`, `type T func()`, ...
    Defined,
}

/// The located declaration of the target type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeDeclaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// File the declaration was found in
    pub file: String,
    /// 1-based line of the declaration
    pub line: usize,
    /// Declared with type parameters (`type Box[T any] ...`)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub generic: bool,
}

/// A parameter of an extracted method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// Canonical type; for a variadic parameter this is the element type
    pub ty: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub variadic: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            variadic: false,
        }
    }

    pub fn variadic(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            variadic: true,
            ..Self::new(name, ty)
        }
    }

    /// Type of the value as it travels through the argument list.
    pub fn slot_type(&self) -> String {
        if self.variadic {
            format!("[]{}", self.ty)
        } else {
            self.ty.clone()
        }
    }

    /// `name type` or `name ...type`.
    pub fn declaration(&self) -> String {
        if self.variadic {
            format!("{} ...{}", self.name, self.ty)
        } else {
            format!("{} {}", self.name, self.ty)
        }
    }

    /// How the parameter is passed on to another call.
    pub fn forwarded(&self) -> String {
        if self.variadic {
            format!("{}...", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// "Recover slot `position` of an ordered value list as `ty`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeSlot {
    pub position: usize,
    pub ty: String,
    /// The decoded value is spread into a variadic call (`v...`)
    pub spread: bool,
}

/// Intermediate description of one method of the target type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodModel {
    pub name: String,
    /// `T` or `*T`
    pub receiver: String,
    pub params: Vec<Param>,
    /// Canonical result types in declared order
    pub results: Vec<String>,
    pub passthrough: bool,
}

impl MethodModel {
    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    /// `x int, label string`
    pub fn param_signature(&self) -> String {
        self.params
            .iter()
            .map(Param::declaration)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Empty, a single type, or a parenthesized list.
    pub fn result_signature(&self) -> String {
        match self.results.len() {
            0 => String::new(),
            1 => self.results[0].clone(),
            _ => format!("({})", self.results.join(", ")),
        }
    }

    /// Argument list for a direct call to the original method.
    pub fn forwarded_arguments(&self) -> String {
        self.params
            .iter()
            .map(Param::forwarded)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Slots to decode from the argument list when invoking the original.
    pub fn argument_slots(&self) -> Vec<DecodeSlot> {
        self.params
            .iter()
            .enumerate()
            .map(|(position, p)| DecodeSlot {
                position,
                ty: p.slot_type(),
                spread: p.variadic,
            })
            .collect()
    }

    /// Slots to decode from the handler's returned list.
    pub fn result_slots(&self) -> Vec<DecodeSlot> {
        self.results
            .iter()
            .enumerate()
            .map(|(position, ty)| DecodeSlot {
                position,
                ty: ty.clone(),
                spread: false,
            })
            .collect()
    }

    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }
}

/// Everything the renderer needs to emit the wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyModel {
    pub package: String,
    pub type_name: String,
    pub wrapper_name: String,
    pub style: WrapperStyle,
    pub declaration: TypeDeclaration,
    pub methods: Vec<MethodModel>,
    /// Sorted, deduplicated imports needed by the method signatures
    pub imports: Vec<ImportSpec>,
    /// Top-level names already declared in the package
    #[serde(skip)]
    pub package_names: BTreeSet<String>,
}
