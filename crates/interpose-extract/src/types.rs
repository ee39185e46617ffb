//! Lowering of type syntax into [`TypeExpr`] and reconstruction of its
//! canonical text.

use std::collections::BTreeSet;

use interpose_types::{ChanDir, TypeExpr};
use tree_sitter::Node;

use crate::{ParsedFile, content_children};

/// A type expression with no canonical textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unreconstructable {
    /// Syntax node kind that could not be handled
    pub kind: String,
}

/// Lower a type node into its structural form.
pub fn lower_type(file: &ParsedFile, node: Node<'_>) -> TypeExpr {
    let unknown = || TypeExpr::Unknown {
        kind: node.kind().to_string(),
    };
    let field = |name: &str| node.child_by_field_name(name);

    match node.kind() {
        "type_identifier" => TypeExpr::Ident(file.text(node).to_string()),

        "qualified_type" => match (field("package"), field("name")) {
            (Some(package), Some(name)) => TypeExpr::Qualified {
                package: file.text(package).to_string(),
                name: file.text(name).to_string(),
            },
            _ => unknown(),
        },

        "pointer_type" => match content_children(node).first() {
            Some(&inner) => TypeExpr::Pointer(Box::new(lower_type(file, inner))),
            None => unknown(),
        },

        "slice_type" => match field("element") {
            Some(elem) => TypeExpr::Slice(Box::new(lower_type(file, elem))),
            None => unknown(),
        },

        "array_type" => match (field("length"), field("element")) {
            (Some(len), Some(elem)) => TypeExpr::Array {
                len: file.text(len).split_whitespace().collect(),
                elem: Box::new(lower_type(file, elem)),
            },
            _ => unknown(),
        },

        "map_type" => match (field("key"), field("value")) {
            (Some(key), Some(value)) => TypeExpr::Map {
                key: Box::new(lower_type(file, key)),
                value: Box::new(lower_type(file, value)),
            },
            _ => unknown(),
        },

        "channel_type" => match field("value") {
            Some(value) => TypeExpr::Chan {
                dir: channel_direction(node),
                elem: Box::new(lower_type(file, value)),
            },
            None => unknown(),
        },

        "interface_type" if content_children(node).is_empty() => TypeExpr::EmptyInterface,

        "struct_type" => match content_children(node).first() {
            Some(&fields) if content_children(fields).is_empty() => TypeExpr::EmptyStruct,
            _ => unknown(),
        },

        "function_type" => {
            let (params, variadic) = match field("parameters") {
                Some(list) => lower_parameter_list(file, list),
                None => (Vec::new(), false),
            };
            let results = match field("result") {
                Some(result) if result.kind() == "parameter_list" => {
                    lower_parameter_list(file, result).0
                }
                Some(result) => vec![lower_type(file, result)],
                None => Vec::new(),
            };
            TypeExpr::Func {
                params,
                variadic,
                results,
            }
        }

        "generic_type" => match (field("type"), field("type_arguments")) {
            (Some(base), Some(arguments)) => TypeExpr::Generic {
                base: Box::new(lower_type(file, base)),
                args: content_children(arguments)
                    .into_iter()
                    .map(|arg| lower_type_argument(file, arg))
                    .collect(),
            },
            _ => unknown(),
        },

        "parenthesized_type" => match content_children(node).first() {
            Some(&inner) => lower_type(file, inner),
            None => unknown(),
        },

        _ => unknown(),
    }
}

fn lower_type_argument(file: &ParsedFile, node: Node<'_>) -> TypeExpr {
    if node.kind() != "type_elem" {
        return lower_type(file, node);
    }

    // Unions such as `int | string` only appear in constraints.
    match content_children(node).as_slice() {
        [single] => lower_type(file, *single),
        _ => TypeExpr::Unknown {
            kind: "type_elem".to_string(),
        },
    }
}

/// Types of a parameter list, one entry per declared name. The flag is set
/// when the list ends in a variadic parameter.
fn lower_parameter_list(file: &ParsedFile, list: Node<'_>) -> (Vec<TypeExpr>, bool) {
    let mut types = Vec::new();
    let mut variadic = false;

    for decl in content_children(list) {
        let Some(ty) = decl.child_by_field_name("type") else {
            continue;
        };
        let ty = lower_type(file, ty);

        if decl.kind() == "variadic_parameter_declaration" {
            variadic = true;
            types.push(ty);
            continue;
        }

        let mut cursor = decl.walk();
        let names = decl.children_by_field_name("name", &mut cursor).count();
        for _ in 0..names.max(1) {
            types.push(ty.clone());
        }
    }

    (types, variadic)
}

fn channel_direction(node: Node<'_>) -> ChanDir {
    let mut cursor = node.walk();
    let tokens: Vec<&str> = node
        .children(&mut cursor)
        .filter(|n| !n.is_named())
        .map(|n| n.kind())
        .collect();

    match tokens.as_slice() {
        ["<-", ..] => ChanDir::Recv,
        [_, "<-", ..] => ChanDir::Send,
        _ => ChanDir::Both,
    }
}

/// Canonical text of a type expression.
pub fn reconstruct(ty: &TypeExpr) -> Result<String, Unreconstructable> {
    Ok(match ty {
        TypeExpr::Ident(name) => name.clone(),
        TypeExpr::Qualified { package, name } => format!("{}.{}", package, name),
        TypeExpr::Pointer(inner) => format!("*{}", reconstruct(inner)?),
        TypeExpr::Slice(elem) => format!("[]{}", reconstruct(elem)?),
        TypeExpr::Array { len, elem } => format!("[{}]{}", len, reconstruct(elem)?),
        TypeExpr::Map { key, value } => {
            format!("map[{}]{}", reconstruct(key)?, reconstruct(value)?)
        }
        TypeExpr::Chan { dir, elem } => {
            let elem = reconstruct(elem)?;
            match dir {
                ChanDir::Both => format!("chan {}", elem),
                ChanDir::Send => format!("chan<- {}", elem),
                ChanDir::Recv => format!("<-chan {}", elem),
            }
        }
        TypeExpr::EmptyInterface => "any".to_string(),
        TypeExpr::EmptyStruct => "struct{}".to_string(),
        TypeExpr::Func {
            params,
            variadic,
            results,
        } => {
            let mut params = reconstruct_all(params)?;
            if *variadic {
                if let Some(last) = params.last_mut() {
                    last.insert_str(0, "...");
                }
            }
            let results = reconstruct_all(results)?;
            match results.len() {
                0 => format!("func({})", params.join(", ")),
                1 => format!("func({}) {}", params.join(", "), results[0]),
                _ => format!("func({}) ({})", params.join(", "), results.join(", ")),
            }
        }
        TypeExpr::Generic { base, args } => {
            format!("{}[{}]", reconstruct(base)?, reconstruct_all(args)?.join(", "))
        }
        TypeExpr::Unknown { kind } => return Err(Unreconstructable { kind: kind.clone() }),
    })
}

fn reconstruct_all(types: &[TypeExpr]) -> Result<Vec<String>, Unreconstructable> {
    types.iter().map(reconstruct).collect()
}

/// Add every package qualifier used anywhere inside `ty` to `out`.
pub fn collect_qualifiers(ty: &TypeExpr, out: &mut BTreeSet<String>) {
    match ty {
        TypeExpr::Qualified { package, .. } => {
            out.insert(package.clone());
        }
        TypeExpr::Array { len, elem } => {
            for (package, _) in length_operands(len).filter_map(|op| op.split_once('.')) {
                out.insert(package.to_string());
            }
            collect_qualifiers(elem, out);
        }
        _ => children(ty).for_each(|t| collect_qualifiers(t, out)),
    }
}

/// Add every unqualified identifier used inside `ty` to `out`: type names
/// and the constants of array lengths.
pub fn collect_identifiers(ty: &TypeExpr, out: &mut BTreeSet<String>) {
    match ty {
        TypeExpr::Ident(name) => {
            out.insert(name.clone());
        }
        TypeExpr::Array { len, elem } => {
            for name in length_operands(len).filter(|op| !op.contains('.')) {
                out.insert(name.to_string());
            }
            collect_identifiers(elem, out);
        }
        _ => children(ty).for_each(|t| collect_identifiers(t, out)),
    }
}

fn children(ty: &TypeExpr) -> Box<dyn Iterator<Item = &TypeExpr> + '_> {
    match ty {
        TypeExpr::Pointer(inner) | TypeExpr::Slice(inner) => Box::new(std::iter::once(&**inner)),
        TypeExpr::Array { elem, .. } | TypeExpr::Chan { elem, .. } => {
            Box::new(std::iter::once(&**elem))
        }
        TypeExpr::Map { key, value } => Box::new([&**key, &**value].into_iter()),
        TypeExpr::Func {
            params, results, ..
        } => Box::new(params.iter().chain(results)),
        TypeExpr::Generic { base, args } => Box::new(std::iter::once(&**base).chain(args)),
        TypeExpr::Ident(_)
        | TypeExpr::Qualified { .. }
        | TypeExpr::EmptyInterface
        | TypeExpr::EmptyStruct
        | TypeExpr::Unknown { .. } => Box::new(std::iter::empty()),
    }
}

/// Named operands of an array length expression, such as `N` and
/// `pkg.Size` in `N*pkg.Size`. Numeric literals are skipped.
fn length_operands(len: &str) -> impl Iterator<Item = &str> {
    len.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .filter(|op| op.starts_with(|c: char| c.is_alphabetic() || c == '_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::parse;

    /// Lower the type of the first parameter of `func f(v <ty>)`.
    fn lower(ty: &str) -> TypeExpr {
        let file = parse(&format!("package p\n\nfunc f(v {ty}) {{}}\n"));
        let root = file.root();
        let func = content_children(root)
            .into_iter()
            .find(|n| n.kind() == "function_declaration")
            .unwrap();
        let params = func.child_by_field_name("parameters").unwrap();
        let decl = content_children(params)[0];
        lower_type(&file, decl.child_by_field_name("type").unwrap())
    }

    fn text(ty: &str) -> String {
        reconstruct(&lower(ty)).unwrap()
    }

    #[test]
    fn test_simple_shapes() {
        assert_eq!(text("int"), "int");
        assert_eq!(text("context.Context"), "context.Context");
        assert_eq!(text("*http.Request"), "*http.Request");
        assert_eq!(text("[]string"), "[]string");
        assert_eq!(text("map[string][]*big.Int"), "map[string][]*big.Int");
        assert_eq!(text("interface{}"), "any");
        assert_eq!(text("any"), "any");
    }

    #[test]
    fn test_normalizes_spacing() {
        assert_eq!(text("map[ string ]  *  Node"), "map[string]*Node");
        assert_eq!(text("[ 4 ]byte"), "[4]byte");
        assert_eq!(text("(*Node)"), "*Node");
    }

    #[test]
    fn test_channels() {
        assert_eq!(text("chan int"), "chan int");
        assert_eq!(text("chan<- Event"), "chan<- Event");
        assert_eq!(text("<-chan struct{}"), "<-chan struct{}");
    }

    #[test]
    fn test_function_types() {
        assert_eq!(text("func()"), "func()");
        assert_eq!(text("func(a, b int) error"), "func(int, int) error");
        assert_eq!(
            text("func(string, ...any) (int, error)"),
            "func(string, ...any) (int, error)"
        );
    }

    #[test]
    fn test_generic_instantiation() {
        assert_eq!(
            text("atomic.Pointer[Config]"),
            "atomic.Pointer[Config]"
        );
        assert_eq!(text("Pair[string, int]"), "Pair[string, int]");
    }

    #[test]
    fn test_unknown_shapes_abort() {
        let err = reconstruct(&lower("interface{ Close() error }")).unwrap_err();
        assert_eq!(err.kind, "interface_type");

        let err = reconstruct(&lower("struct{ a int }")).unwrap_err();
        assert_eq!(err.kind, "struct_type");

        let nested = TypeExpr::Slice(Box::new(TypeExpr::Unknown {
            kind: "negated_type".to_string(),
        }));
        assert_eq!(reconstruct(&nested).unwrap_err().kind, "negated_type");
    }

    #[test]
    fn test_collects_nested_qualifiers() {
        let mut out = BTreeSet::new();
        collect_qualifiers(
            &lower("map[uuid.UUID][]*http.Request"),
            &mut out,
        );
        collect_qualifiers(&lower("func(context.Context) error"), &mut out);
        collect_qualifiers(&lower("string"), &mut out);

        collect_qualifiers(&lower("[2*unix.SizeofInt]byte"), &mut out);

        let found: Vec<_> = out.into_iter().collect();
        assert_eq!(found, vec!["context", "http", "unix", "uuid"]);
    }

    #[test]
    fn test_collects_identifiers() {
        let mut out = BTreeSet::new();
        collect_identifiers(&lower("map[Key][]*config"), &mut out);
        collect_identifiers(&lower("func(context.Context, [Size]byte) error"), &mut out);
        collect_identifiers(&lower("[16]rune"), &mut out);

        let found: Vec<_> = out.into_iter().collect();
        assert_eq!(found, vec!["Key", "Size", "byte", "config", "error", "rune"]);
    }
}
