//! Top-level declaration lookup.

use std::collections::BTreeSet;

use interpose_types::{DeclarationKind, TypeDeclaration};
use tree_sitter::Node;

use crate::{ParsedFile, content_children};

/// `type_spec` and `type_alias` nodes of every top-level `type` declaration.
fn type_specs(file: &ParsedFile) -> Vec<Node<'_>> {
    content_children(file.root())
        .into_iter()
        .filter(|decl| decl.kind() == "type_declaration")
        .flat_map(content_children)
        .filter(|spec| matches!(spec.kind(), "type_spec" | "type_alias"))
        .collect()
}

/// Find the top-level declaration of `type_name`, stopping at the first match.
pub fn locate_declaration(file: &ParsedFile, type_name: &str) -> Option<TypeDeclaration> {
    type_specs(file).into_iter().find_map(|spec| {
        let name = spec.child_by_field_name("name")?;
        if file.text(name) != type_name {
            return None;
        }

        let kind = if spec.kind() == "type_alias" {
            DeclarationKind::Alias
        } else {
            match spec.child_by_field_name("type").map(|t| t.kind()) {
                Some("struct_type") => DeclarationKind::Struct,
                Some("interface_type") => DeclarationKind::Interface,
                _ => DeclarationKind::Defined,
            }
        };

        Some(TypeDeclaration {
            name: type_name.to_string(),
            kind,
            file: file.name().to_string(),
            line: spec.start_position().row + 1,
            generic: spec.child_by_field_name("type_parameters").is_some(),
        })
    })
}

/// Every name declared at package level in this file: types, functions,
/// variables and constants. Methods are not package-level names.
pub fn top_level_names(file: &ParsedFile) -> BTreeSet<String> {
    let mut names = BTreeSet::new();

    for decl in content_children(file.root()) {
        match decl.kind() {
            "function_declaration" => {
                if let Some(name) = decl.child_by_field_name("name") {
                    names.insert(file.text(name).to_string());
                }
            }
            "type_declaration" | "var_declaration" | "const_declaration" => {
                collect_spec_names(file, decl, &mut names);
            }
            _ => {}
        }
    }

    names
}

fn collect_spec_names(file: &ParsedFile, node: Node<'_>, names: &mut BTreeSet<String>) {
    for child in content_children(node) {
        match child.kind() {
            "type_spec" | "type_alias" | "var_spec" | "const_spec" => {
                let mut cursor = child.walk();
                for name in child.children_by_field_name("name", &mut cursor) {
                    names.insert(file.text(name).to_string());
                }
            }
            // `var ( ... )` groups its specs in a list node
            "var_spec_list" => collect_spec_names(file, child, names),
            _ => {}
        }
    }
}
