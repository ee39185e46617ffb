//! Import table construction and resolution.

use std::collections::BTreeSet;

use interpose_types::{ImportSpec, ImportTable};
use tree_sitter::Node;

use crate::{ExtractError, ParsedFile, Result, content_children};

/// Identifiers of the universe block. These never come from a dot import.
const PREDECLARED: &[&str] = &[
    "any", "bool", "byte", "comparable", "complex64", "complex128", "error", "float32",
    "float64", "int", "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8",
    "uint16", "uint32", "uint64", "uintptr", "true", "false", "iota", "nil", "append", "cap",
    "clear", "close", "complex", "copy", "delete", "imag", "len", "make", "max", "min", "new",
    "panic", "print", "println", "real", "recover",
];

pub fn is_predeclared(name: &str) -> bool {
    PREDECLARED.contains(&name)
}

/// Package name an import gets when no alias is written.
///
/// This is the name `goimports` assumes: the last path segment, or the one
/// before it when the last is a major version (`/v9`), without a `go-`
/// prefix and cut at the first character that cannot appear in an
/// identifier (`yaml.v3` is `yaml`).
pub fn default_alias(path: &str) -> &str {
    let mut segments = path.rsplit('/');
    let mut name = segments.next().unwrap_or(path);

    let is_version = name
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
    if is_version {
        if let Some(parent) = segments.next() {
            name = parent;
        }
    }

    let name = name.strip_prefix("go-").unwrap_or(name);
    match name.find(|c: char| !(c.is_alphanumeric() || c == '_')) {
        Some(end) => &name[..end],
        None => name,
    }
}

/// Build the alias -> import mapping of one file.
pub fn build_import_table(file: &ParsedFile) -> ImportTable {
    let mut table = ImportTable::default();

    for decl in content_children(file.root()) {
        if decl.kind() != "import_declaration" {
            continue;
        }

        for child in content_children(decl) {
            match child.kind() {
                "import_spec" => add_import(file, child, &mut table),
                "import_spec_list" => {
                    for spec in content_children(child) {
                        if spec.kind() == "import_spec" {
                            add_import(file, spec, &mut table);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    table
}

fn add_import(file: &ParsedFile, spec: Node<'_>, table: &mut ImportTable) {
    let Some(path) = spec.child_by_field_name("path") else {
        return;
    };
    let path = file.text(path).trim_matches(|c| c == '"' || c == '`');

    let alias = match spec.child_by_field_name("name") {
        Some(name) => file.text(name),
        None => default_alias(path),
    };

    log::trace!("{}: import {} -> {}", file.name(), alias, path);
    table.insert(ImportSpec::new(alias, path));
}

/// Imports needed for the given package qualifiers of `file`.
///
/// A qualifier with no matching import fails: the wrapper would refer to a
/// package it cannot import.
pub fn resolve_imports(
    file: &str,
    qualifiers: &BTreeSet<String>,
    table: &ImportTable,
) -> Result<BTreeSet<ImportSpec>> {
    qualifiers
        .iter()
        .map(|qualifier| {
            table
                .get(qualifier)
                .cloned()
                .ok_or_else(|| ExtractError::UnresolvedQualifier {
                    file: file.to_string(),
                    qualifier: qualifier.clone(),
                })
        })
        .collect()
}

/// Dot imports of a file whose signatures use unqualified names that are
/// neither declared in the package nor predeclared.
///
/// Such names can only come from a dot import. Which one is not known
/// without type information, so every dot import of the file is carried.
pub fn resolve_dot_imports(
    identifiers: &BTreeSet<String>,
    table: &ImportTable,
    declared: &BTreeSet<String>,
) -> Vec<ImportSpec> {
    let foreign = identifiers
        .iter()
        .find(|name| !declared.contains(*name) && !is_predeclared(name));
    let Some(foreign) = foreign else {
        return Vec::new();
    };

    let dots: Vec<ImportSpec> = table.iter().filter(|s| s.alias == ".").cloned().collect();
    if !dots.is_empty() {
        log::debug!("`{}` is not declared in the package, carrying dot imports", foreign);
    }
    dots
}
