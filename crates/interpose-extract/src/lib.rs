//! Go source analysis for interpose.
//!
//! Parses Go files with tree-sitter and extracts what the renderer needs:
//!
//! - the import table of each file ([`build_import_table`])
//! - the declaration of the target type ([`locate_declaration`])
//! - the methods declared on the target type ([`extract_methods`])
//! - canonical text for every parameter and result type ([`reconstruct`])
//! - the imports those types refer to ([`resolve_imports`],
//!   [`resolve_dot_imports`])
//!
//! Every stage is a pure function of a [`ParsedFile`]; nothing here touches
//! the file system.

mod imports;
mod locate;
mod methods;
mod types;

pub use imports::{
    build_import_table, default_alias, is_predeclared, resolve_dot_imports, resolve_imports,
};
pub use locate::{locate_declaration, top_level_names};
pub use methods::{ExtractedMethods, extract_methods};
pub use types::{
    Unreconstructable, collect_identifiers, collect_qualifiers, lower_type, reconstruct,
};

use interpose_types::SourceFile;
use tree_sitter::{Node, Parser, Tree};

/// Errors produced while analysing Go source.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to load the Go grammar: {0}")]
    Grammar(String),

    #[error("{file}:{line}: syntax error: {reason}")]
    Syntax {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("{file}: method {method}: cannot reconstruct a type of kind `{kind}`")]
    UnreconstructableType {
        file: String,
        method: String,
        kind: String,
    },

    #[error("{file}: package `{qualifier}` is used but not imported")]
    UnresolvedQualifier { file: String, qualifier: String },
}

/// Result type for extraction.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// A Go source file together with its syntax tree.
pub struct ParsedFile {
    name: String,
    source: String,
    tree: Tree,
    package: Option<String>,
}

impl ParsedFile {
    /// File name as given by the caller.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name in the `package` clause, if the file has one.
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub(crate) fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub(crate) fn text(&self, node: Node<'_>) -> &str {
        &self.source[node.byte_range()]
    }
}

impl std::fmt::Debug for ParsedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedFile")
            .field("name", &self.name)
            .field("package", &self.package)
            .finish_non_exhaustive()
    }
}

fn new_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| ExtractError::Grammar(e.to_string()))?;
    Ok(parser)
}

fn parse_tree(name: &str, text: &str) -> Result<Tree> {
    let tree = new_parser()?
        .parse(text, None)
        .ok_or_else(|| ExtractError::Syntax {
            file: name.to_string(),
            line: 1,
            reason: "parser produced no tree".to_string(),
        })?;

    if let Some(node) = first_error(tree.root_node()) {
        return Err(ExtractError::Syntax {
            file: name.to_string(),
            line: node.start_position().row + 1,
            reason: describe_error(text, node),
        });
    }

    Ok(tree)
}

/// Parse one source file. Any syntax error fails the whole file.
pub fn parse_file(file: &SourceFile) -> Result<ParsedFile> {
    let tree = parse_tree(&file.name, &file.contents)?;

    let package = {
        let root = tree.root_node();
        let mut cursor = root.walk();
        let clause = root
            .named_children(&mut cursor)
            .find(|n| n.kind() == "package_clause");
        clause
            .and_then(|c| c.named_child(0))
            .map(|ident| file.contents[ident.byte_range()].to_string())
    };

    log::debug!(
        "parsed {} (package {})",
        file.name,
        package.as_deref().unwrap_or("<none>")
    );

    Ok(ParsedFile {
        name: file.name.clone(),
        source: file.contents.clone(),
        tree,
        package,
    })
}

/// Check that generated text parses as Go.
pub fn check_syntax(name: &str, text: &str) -> Result<()> {
    parse_tree(name, text).map(|_| ())
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn describe_error(text: &str, node: Node<'_>) -> String {
    if node.is_missing() {
        return format!("missing `{}`", node.kind());
    }

    let snippet: String = text[node.byte_range()]
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(24)
        .collect();
    format!("unexpected `{}`", snippet.trim())
}

/// Named children of `node`, skipping comments.
pub(crate) fn content_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    children
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reads_package() {
        let file = test_support::parse("package billing\n\ntype Invoice struct{}\n");
        assert_eq!(file.name(), "test.go");
        assert_eq!(file.package(), Some("billing"));
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let source = "package billing\n\nfunc (s *Invoice) Total( int {\n}\n";
        let err = parse_file(&SourceFile::new("broken.go", source)).unwrap_err();

        match err {
            ExtractError::Syntax { file, line, .. } => {
                assert_eq!(file, "broken.go");
                assert_eq!(line, 3);
            }
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_check_syntax() {
        assert!(check_syntax("ok.go", "package x\n\nfunc f() {}\n").is_ok());
        assert!(check_syntax("bad.go", "package x\n\nfunc f( {}\n").is_err());
    }
}
