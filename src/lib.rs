//! # Interpose - Interception Proxies for Go Types
//!
//! Go has no runtime dynamic proxies, so interception (logging, tracing,
//! retries, metrics) has to be generated ahead of time. Interpose reads the Go
//! files of a package, collects every method of a target type and emits a
//! wrapper that routes each call through a single invocation handler.
//!
//! ## Quick Start
//!
//! Add a directive next to the type and run `go generate`:
//!
//! ```text
//! //go:generate interpose --type MyService --passthrough-methods Flush
//! ```
//!
//! This writes `MyService_proxy_gen.go`, which can be used like this:
//!
//! ```text
//! proxy := NewMyServiceProxy(service, func(method MyServiceMethod, args []any, invoke func([]any) []any) []any {
//!     start := time.Now()
//!     results := invoke(args)
//!     log.Printf("%s took %s", method.Name(), time.Since(start))
//!     return results
//! })
//! ```
//!
//! ## Library Use
//!
//! ```ignore
//! use interpose::{GenerationConfig, Generator, SourceFile};
//!
//! let config = GenerationConfig::new("MyService").with_passthrough(["Flush"]);
//! let generated = Generator::new(config)?.generate(&[SourceFile::new("myservice.go", text)])?;
//! println!("{}", generated.source);
//! ```
//!
//! ## Architecture
//!
//! - **[`interpose_types`]**: the model shared by every stage
//! - **[`interpose_extract`]**: tree-sitter analysis of Go source
//! - **[`interpose_render`]**: emission of the wrapper source
//! - **[`interpose_generator`]**: the pipeline and its error type
//! - **`interpose-cli`**: the `interpose` binary run by `go generate`
//!
//! ## Generated API
//!
//! For a target type `T` the generated file declares:
//!
//! - `TProxy` (or `TDecorator`) with one method per method of `T`
//! - `TInvocationHandler`, called with a `TMethod` descriptor, the arguments
//!   as `[]any` and an `invoke` function that runs the original method
//! - `TMethod` with `Name()`, `Receiver()` and `Package()`
//! - `NewTProxy(original *T, handler)`, where a nil handler forwards unchanged
//!
//! Methods listed as passthrough call the original directly.

pub use interpose_extract;
pub use interpose_render;

// Re-export the pipeline
pub use interpose_generator::{Error, GeneratedProxy, Generator, Result, generate};

// Re-export the model
pub use interpose_types::{
    DeclarationKind, GenerationConfig, ImportSpec, MethodModel, Param, ProxyModel, SourceFile,
    TypeDeclaration, WrapperStyle, parse_method_list,
};
