//! Proxy generation pipeline for Go types.
//!
//! This crate ties the analysis and rendering stages together. Given the
//! contents of the Go files of one package and a [`GenerationConfig`], it
//! locates the target type, collects its method set across every file,
//! resolves the imports the method signatures need and renders the wrapper.
//!
//! # Example
//!
//! ```ignore
//! use interpose_generator::Generator;
//! use interpose_types::{GenerationConfig, SourceFile};
//!
//! let config = GenerationConfig::new("MyService").with_passthrough(["Flush"]);
//! let generator = Generator::new(config)?;
//!
//! let files = vec![SourceFile::new("myservice.go", source)];
//! let generated = generator.generate(&files)?;
//! generated.write_to(Path::new("."))?;
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use interpose_extract::{
    ExtractError, ParsedFile, build_import_table, check_syntax, extract_methods,
    locate_declaration, parse_file, resolve_dot_imports, resolve_imports, top_level_names,
};
use interpose_render::{HEADER, RenderError, render};
use interpose_types::{GenerationConfig, ImportSpec, ProxyModel, SourceFile, TypeDeclaration};

/// Errors that can occur during a generation run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to load the Go grammar: {0}")]
    Grammar(String),

    #[error("{file}:{line}: {reason}")]
    Parse {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("Type {type_name} is not declared in any scanned file")]
    DeclarationNotFound { type_name: String },

    #[error("{file}:{line}: type {type_name} has type parameters, which cannot be wrapped")]
    GenericTarget {
        type_name: String,
        file: String,
        line: usize,
    },

    #[error("{file}: package `{qualifier}` is used but not imported")]
    UnresolvedImport { file: String, qualifier: String },

    #[error("{file}: method {method}: cannot reconstruct a type of kind `{kind}`")]
    UnreconstructableType {
        file: String,
        method: String,
        kind: String,
    },

    #[error("Failed to render wrapper: {0}")]
    Render(#[from] RenderError),

    #[error("Generated source does not parse: {reason}")]
    Format {
        reason: String,
        /// The rendered text, kept for diagnosis
        text: String,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ExtractError> for Error {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Grammar(reason) => Error::Grammar(reason),
            ExtractError::Syntax { file, line, reason } => Error::Parse { file, line, reason },
            ExtractError::UnreconstructableType { file, method, kind } => {
                Error::UnreconstructableType { file, method, kind }
            }
            ExtractError::UnresolvedQualifier { file, qualifier } => {
                Error::UnresolvedImport { file, qualifier }
            }
        }
    }
}

/// Result type for generation.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Generated Output
// ============================================================================

/// The result of a successful run.
#[derive(Debug, Clone)]
pub struct GeneratedProxy {
    /// Conventional file name, e.g. `MyService_proxy_gen.go`
    pub file_name: String,
    /// Generated Go source
    pub source: String,
    /// Model the source was rendered from
    pub model: ProxyModel,
}

impl GeneratedProxy {
    /// Write the generated source into `dir` under its conventional name.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        self.write_file(&path)?;
        Ok(path)
    }

    /// Write the generated source to `path`.
    ///
    /// The text goes to a temporary sibling first and is renamed into place,
    /// so a failed write never leaves a truncated file behind.
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name.clone());
        let staging = path.with_file_name(format!(".{}.tmp", name));

        let output_error = |source| Error::Output {
            path: path.to_path_buf(),
            source,
        };
        std::fs::write(&staging, &self.source).map_err(output_error)?;
        if let Err(source) = std::fs::rename(&staging, path) {
            let _ = std::fs::remove_file(&staging);
            return Err(output_error(source));
        }

        log::info!("wrote {}", path.display());
        Ok(())
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Runs the pipeline for one validated [`GenerationConfig`].
#[derive(Debug, Clone)]
pub struct Generator {
    config: GenerationConfig,
}

impl Generator {
    /// Validate `config` and build a generator. Nothing is read here.
    pub fn new(config: GenerationConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Analyse `files` and build the model the wrapper is rendered from.
    ///
    /// Files are processed in file name order whatever order they are given
    /// in. A syntax error in any file fails the whole run.
    pub fn analyze(&self, files: &[SourceFile]) -> Result<ProxyModel> {
        let type_name = &self.config.type_name;

        let mut sources: Vec<&SourceFile> = files
            .iter()
            .filter(|file| {
                let generated = file.contents.starts_with(HEADER);
                if generated {
                    log::debug!("skipping generated file {}", file.name);
                }
                !generated
            })
            .collect();
        sources.sort_by(|a, b| a.name.cmp(&b.name));

        let parsed = sources
            .into_iter()
            .map(parse_file)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let (declaration, package) = self.locate(&parsed)?;
        log::debug!(
            "found {} in {}:{} (package {})",
            type_name,
            declaration.file,
            declaration.line,
            package
        );
        if declaration.generic {
            return Err(Error::GenericTarget {
                type_name: type_name.clone(),
                file: declaration.file,
                line: declaration.line,
            });
        }

        let mut methods = Vec::new();
        let mut imports = BTreeSet::new();
        let mut package_names = BTreeSet::new();
        let mut unqualified = Vec::new();

        for file in &parsed {
            if file.package() != Some(package.as_str()) {
                log::debug!(
                    "skipping {}: package {} is not {}",
                    file.name(),
                    file.package().unwrap_or("<none>"),
                    package
                );
                continue;
            }

            let table = build_import_table(file);
            let extracted = extract_methods(file, type_name, &self.config.passthrough, &table)?;
            imports.extend(resolve_imports(file.name(), &extracted.qualifiers, &table)?);
            methods.extend(extracted.methods);
            package_names.extend(top_level_names(file));
            unqualified.push((table, extracted.identifiers));
        }

        // Only known once every file has contributed its declarations
        for (table, identifiers) in &unqualified {
            imports.extend(resolve_dot_imports(identifiers, table, &package_names));
        }

        for name in &self.config.passthrough {
            if !methods.iter().any(|m| &m.name == name) {
                log::warn!("passthrough method {} is not a method of {}", name, type_name);
            }
        }

        Ok(ProxyModel {
            package,
            type_name: type_name.clone(),
            wrapper_name: self.config.style.wrapper_name(type_name),
            style: self.config.style,
            declaration,
            methods,
            imports: imports.into_iter().collect::<Vec<ImportSpec>>(),
            package_names,
        })
    }

    /// Analyse `files` and render the wrapper source.
    ///
    /// The rendered text is parsed again before it is returned; text that
    /// does not parse is reported as [`Error::Format`] and never handed out.
    pub fn generate(&self, files: &[SourceFile]) -> Result<GeneratedProxy> {
        let model = self.analyze(files)?;
        let source = render(&model)?;
        let file_name = self.config.style.file_name(&model.type_name);

        if let Err(err) = check_syntax(&file_name, &source) {
            return Err(Error::Format {
                reason: err.to_string(),
                text: source,
            });
        }

        log::info!(
            "generated {} for {}.{} ({} methods)",
            model.wrapper_name,
            model.package,
            model.type_name,
            model.methods.len()
        );

        Ok(GeneratedProxy {
            file_name,
            source,
            model,
        })
    }

    /// Find the target declaration and the package it belongs to.
    fn locate(&self, parsed: &[ParsedFile]) -> Result<(TypeDeclaration, String)> {
        let wanted = self.config.package.as_deref();

        for file in parsed {
            if wanted.is_some_and(|p| file.package() != Some(p)) {
                continue;
            }
            let Some(declaration) = locate_declaration(file, &self.config.type_name) else {
                continue;
            };

            let package = match (wanted, file.package()) {
                (Some(p), _) | (None, Some(p)) => p.to_string(),
                (None, None) => {
                    return Err(Error::Parse {
                        file: file.name().to_string(),
                        line: 1,
                        reason: "missing package clause".to_string(),
                    });
                }
            };
            return Ok((declaration, package));
        }

        Err(Error::DeclarationNotFound {
            type_name: self.config.type_name.clone(),
        })
    }
}

/// Generate a wrapper in one call.
pub fn generate(config: GenerationConfig, files: &[SourceFile]) -> Result<GeneratedProxy> {
    Generator::new(config)?.generate(files)
}

fn validate_config(config: &GenerationConfig) -> Result<()> {
    if config.type_name.is_empty() {
        return Err(Error::Configuration("a type name is required".to_string()));
    }
    if !is_identifier(&config.type_name) {
        return Err(Error::Configuration(format!(
            "`{}` is not a valid type name",
            config.type_name
        )));
    }
    if let Some(bad) = config.passthrough.iter().find(|m| !is_identifier(m)) {
        return Err(Error::Configuration(format!(
            "`{}` is not a valid method name",
            bad
        )));
    }
    if let Some(package) = config.package.as_deref().filter(|p| !is_identifier(p)) {
        return Err(Error::Configuration(format!(
            "`{}` is not a valid package name",
            package
        )));
    }
    Ok(())
}

/// Go identifier, excluding the blank identifier.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    s != "_" && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use interpose_types::{DeclarationKind, WrapperStyle};

    const MY_SERVICE: &str = include_str!("../../../example/myservice.go");

    fn files() -> Vec<SourceFile> {
        vec![SourceFile::new("myservice.go", MY_SERVICE)]
    }

    fn generator(config: GenerationConfig) -> Generator {
        Generator::new(config).unwrap()
    }

    #[test]
    fn test_configuration_is_validated_first() {
        for config in [
            GenerationConfig::new(""),
            GenerationConfig::new("My Service"),
            GenerationConfig::new("_"),
            GenerationConfig::new("MyService").with_passthrough(["Flush()"]),
            GenerationConfig::new("MyService").with_package("my-service"),
        ] {
            let err = Generator::new(config).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
        }

        assert!(Generator::new(GenerationConfig::new("MyService")).is_ok());
        assert!(Generator::new(GenerationConfig::new("_internal")).is_ok());
    }

    #[test]
    fn test_generates_example_service() {
        let config = GenerationConfig::new("MyService").with_passthrough(["Flush"]);
        let generated = generator(config).generate(&files()).unwrap();

        assert_eq!(generated.file_name, "MyService_proxy_gen.go");
        assert_eq!(generated.model.package, "myservice");
        assert_eq!(generated.model.methods.len(), 9);
        assert_eq!(generated.model.declaration.kind, DeclarationKind::Struct);

        let imports: Vec<_> = generated.model.imports.iter().map(ImportSpec::line).collect();
        assert_eq!(
            imports,
            vec![
                "context \"context\"",
                "xml \"encoding/xml\"",
                "uuid \"github.com/google/uuid\"",
                "alias \"net/http/httptest\"",
            ]
        );

        let source = &generated.source;
        assert!(source.starts_with(HEADER));
        assert!(source.contains("\tfmt \"fmt\"\n"));
        assert!(!source.contains("\"strings\""));
        assert!(source.contains("func (proxy *MyServiceProxy) Flush() error {\n\treturn proxy.original.Flush()\n}"));
        assert!(source.contains("func (proxy *MyServiceProxy) reset() {"));
        assert!(source.contains("method := MyServiceMethod{name: \"Describe\", receiver: \"MyService\"}"));
        assert!(source.contains(
            "func (proxy *MyServiceProxy) Subscribe(topic string, sink chan<- string) (<-chan struct{}, func()) {"
        ));
        assert!(!source.contains("Helper"));
    }

    #[test]
    fn test_scenario_ping_and_compute() {
        let generated = generator(GenerationConfig::new("MyService"))
            .generate(&files())
            .unwrap();
        let source = &generated.source;

        assert!(source.contains(
            "func (proxy *MyServiceProxy) Ping() {\n\tmethod := MyServiceMethod{name: \"Ping\", receiver: \"*MyService\"}\n\targs := []any{}\n"
        ));
        assert!(source.contains("\targs := []any{x, label}\n"));
        assert!(source.contains(
            "return _MyServiceDecode[int](\"Compute\", results, 0, \"int\"), _MyServiceDecode[error](\"Compute\", results, 1, \"error\")"
        ));
        // without a passthrough set, Flush is intercepted too
        assert!(source.contains("method := MyServiceMethod{name: \"Flush\", receiver: \"*MyService\"}"));
    }

    #[test]
    fn test_qualified_parameter_brings_its_import() {
        let source = r#"package store

import (
	"context"
	"example.com/pkg"
)

type Store struct{}

func (s *Store) Load(thing *pkg.Thing) {}

func (s *Store) Background() context.Context { return context.Background() }
"#;
        let model = generator(GenerationConfig::new("Store").with_passthrough(["Background"]))
            .analyze(&[SourceFile::new("store.go", source)])
            .unwrap();

        assert_eq!(
            model.imports,
            vec![
                ImportSpec::new("context", "context"),
                ImportSpec::new("pkg", "example.com/pkg"),
            ]
        );
    }

    #[test]
    fn test_versioned_import_paths() {
        let source = r#"package store

import (
	"github.com/redis/go-redis/v9"
	"gopkg.in/yaml.v3"
	"golang.org/x/sys/unix"
)

type Store struct{}

func (s *Store) Use(c *redis.Client, node *yaml.Node) {}

func (s *Store) Raw() [unix.SizeofPtr]byte { return [unix.SizeofPtr]byte{} }
"#;
        let generated = generator(GenerationConfig::new("Store"))
            .generate(&[SourceFile::new("store.go", source)])
            .unwrap();

        assert_eq!(
            generated.model.imports,
            vec![
                ImportSpec::new("redis", "github.com/redis/go-redis/v9"),
                ImportSpec::new("unix", "golang.org/x/sys/unix"),
                ImportSpec::new("yaml", "gopkg.in/yaml.v3"),
            ]
        );
        assert!(generated.source.contains("\tredis \"github.com/redis/go-redis/v9\"\n"));
        assert!(generated.source.contains("_StoreDecode[*redis.Client]("));
    }

    #[test]
    fn test_unimported_qualifier_fails() {
        let source = "package store\n\ntype Store struct{}\n\nfunc (s *Store) Use(c *redis.Client) {}\n";
        let err = generator(GenerationConfig::new("Store"))
            .generate(&[SourceFile::new("store.go", source)])
            .unwrap_err();

        match err {
            Error::UnresolvedImport { file, qualifier } => {
                assert_eq!(file, "store.go");
                assert_eq!(qualifier, "redis");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_param_named_like_its_type() {
        let source = r#"package store

type config struct{}

type Store struct{}

func (s *Store) Apply(config config) {}
"#;
        let generated = generator(GenerationConfig::new("Store"))
            .generate(&[SourceFile::new("store.go", source)])
            .unwrap();

        assert!(generated.source.contains("func (proxy *StoreProxy) Apply(arg0 config) {"));
        assert!(generated.source.contains("\targs := []any{arg0}\n"));
        assert!(generated.source.contains("_StoreDecode[config](\"Apply\", args, 0, \"config\")"));
    }

    #[test]
    fn test_generic_target_is_rejected() {
        let source = r#"package box

type Box[T any] struct {
	v T
}

func (b *Box[T]) Get() T { return b.v }
"#;
        let err = generator(GenerationConfig::new("Box"))
            .generate(&[SourceFile::new("box.go", source)])
            .unwrap_err();

        match err {
            Error::GenericTarget { type_name, file, line } => {
                assert_eq!(type_name, "Box");
                assert_eq!(file, "box.go");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_dot_import_is_carried_when_used() {
        let files = vec![
            SourceFile::new(
                "a_store.go",
                "package store\n\nimport . \"strings\"\n\ntype Store struct{}\n\nfunc (s *Store) Build() *Builder { return nil }\n",
            ),
            SourceFile::new(
                "b_keys.go",
                "package store\n\nimport . \"sort\"\n\ntype Key string\n\nfunc (s *Store) Get(k Key) string { return string(k) }\n\nvar _ = Strings\n",
            ),
        ];

        let model = generator(GenerationConfig::new("Store")).analyze(&files).unwrap();
        assert_eq!(model.imports, vec![ImportSpec::new(".", "strings")]);
    }

    #[test]
    fn test_methods_across_files_in_name_order() {
        let files = vec![
            SourceFile::new(
                "b_extra.go",
                "package store\n\nfunc (s *Store) Close() error { return nil }\n",
            ),
            SourceFile::new(
                "store_external_test.go",
                "package store_test\n\ntype Store struct{}\n\nfunc (s *Store) Fake() {}\n",
            ),
            SourceFile::new(
                "a_store.go",
                "package store\n\ntype Store struct{}\n\nfunc (s Store) Len() int { return 0 }\n",
            ),
        ];

        let model = generator(GenerationConfig::new("Store")).analyze(&files).unwrap();
        let names: Vec<_> = model.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Len", "Close"]);
        assert_eq!(model.declaration.file, "a_store.go");
        assert_eq!(model.package, "store");
    }

    #[test]
    fn test_configured_package_selects_declaration() {
        let files = vec![
            SourceFile::new("a.go", "package store\n\ntype Store struct{}\n\nfunc (s *Store) Real() {}\n"),
            SourceFile::new("b_test.go", "package store_test\n\ntype Store struct{}\n\nfunc (s *Store) Fake() {}\n"),
        ];

        let model = generator(GenerationConfig::new("Store").with_package("store_test"))
            .analyze(&files)
            .unwrap();
        assert_eq!(model.methods[0].name, "Fake");

        let err = generator(GenerationConfig::new("Store").with_package("other"))
            .analyze(&files)
            .unwrap_err();
        assert!(matches!(err, Error::DeclarationNotFound { .. }));
    }

    #[test]
    fn test_missing_declaration() {
        let err = generator(GenerationConfig::new("Cache"))
            .generate(&files())
            .unwrap_err();
        assert_eq!(err.to_string(), "Type Cache is not declared in any scanned file");
    }

    #[test]
    fn test_parse_error_aborts_the_run() {
        let files = vec![
            SourceFile::new("myservice.go", MY_SERVICE),
            SourceFile::new("broken.go", "package myservice\n\nfunc (s *MyService) Oops( {\n"),
        ];

        match generator(GenerationConfig::new("MyService")).generate(&files).unwrap_err() {
            Error::Parse { file, .. } => assert_eq!(file, "broken.go"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unreconstructable_type_aborts_the_run() {
        let source = "package p\n\ntype T struct{}\n\nfunc (t *T) Visit(v struct{ n int }) {}\n";
        let err = generator(GenerationConfig::new("T"))
            .generate(&[SourceFile::new("t.go", source)])
            .unwrap_err();

        match err {
            Error::UnreconstructableType { method, kind, .. } => {
                assert_eq!(method, "Visit");
                assert_eq!(kind, "struct_type");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_generated_name_collision() {
        let files = vec![
            SourceFile::new("myservice.go", MY_SERVICE),
            SourceFile::new(
                "proxy.go",
                "package myservice\n\nfunc NewMyServiceProxy() {}\n",
            ),
        ];

        let err = generator(GenerationConfig::new("MyService"))
            .generate(&files)
            .unwrap_err();
        assert!(matches!(err, Error::Render(RenderError::NameTaken { .. })));
    }

    #[test]
    fn test_previous_output_is_ignored() {
        let generator = generator(GenerationConfig::new("MyService").with_passthrough(["Flush"]));
        let first = generator.generate(&files()).unwrap();

        let mut again = files();
        again.push(SourceFile::new(first.file_name.clone(), first.source.clone()));
        let second = generator.generate(&again).unwrap();

        assert_eq!(first.source, second.source);
    }

    #[test]
    fn test_decorator_style() {
        let config = GenerationConfig::new("MyService").with_style(WrapperStyle::Decorator);
        let generated = generator(config).generate(&files()).unwrap();

        assert_eq!(generated.file_name, "MyService_decorator_gen.go");
        assert!(generated.source.contains("type MyServiceDecorator struct {"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let mut reversed = vec![
            SourceFile::new("b.go", "package p\n\nfunc (t *T) B() {}\n"),
            SourceFile::new("a.go", "package p\n\ntype T struct{}\n\nfunc (t *T) A() {}\n"),
        ];
        let generator = generator(GenerationConfig::new("T"));
        let first = generator.generate(&reversed).unwrap();
        reversed.reverse();
        let second = generator.generate(&reversed).unwrap();

        assert_eq!(first.source, second.source);
        assert!(first.source.find(") A()").unwrap() < first.source.find(") B()").unwrap());
    }

    #[test]
    fn test_write_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let generated = generator(GenerationConfig::new("MyService"))
            .generate(&files())
            .unwrap();

        let path = generated.write_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("MyService_proxy_gen.go"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), generated.source);
        assert!(!dir.path().join(".MyService_proxy_gen.go.tmp").exists());

        let missing = dir.path().join("missing");
        assert!(matches!(
            generated.write_to(&missing).unwrap_err(),
            Error::Output { .. }
        ));
    }
}
