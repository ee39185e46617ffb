//! Method set extraction.

use std::collections::BTreeSet;

use interpose_types::{ImportTable, MethodModel, Param, TypeExpr};
use tree_sitter::Node;

use crate::types::{collect_identifiers, collect_qualifiers, lower_type, reconstruct};
use crate::{ExtractError, ParsedFile, Result, content_children};

/// Identifiers the generated method bodies declare or refer to. A parameter
/// named like one of these would shadow it, so it is renamed.
const RESERVED_NAMES: &[&str] = &["proxy", "method", "args", "results", "invoke", "fmt", "any"];

/// Methods found in one file, plus the names their signatures refer to.
#[derive(Debug, Clone, Default)]
pub struct ExtractedMethods {
    pub methods: Vec<MethodModel>,
    /// Package qualifiers, such as `context` in `context.Context`
    pub qualifiers: BTreeSet<String>,
    /// Unqualified type and constant names
    pub identifiers: BTreeSet<String>,
}

/// One entry of a parameter list before naming is settled.
struct RawParam {
    name: Option<String>,
    ty: TypeExpr,
    variadic: bool,
}

/// Extract, in declaration order, every method whose receiver base type is
/// `type_name`, pointer or value receiver alike.
pub fn extract_methods(
    file: &ParsedFile,
    type_name: &str,
    passthrough: &BTreeSet<String>,
    imports: &ImportTable,
) -> Result<ExtractedMethods> {
    let mut extracted = ExtractedMethods::default();

    for decl in content_children(file.root()) {
        if decl.kind() != "method_declaration" {
            continue;
        }
        let Some((base, pointer)) = receiver_base(file, decl) else {
            continue;
        };
        if base != type_name {
            continue;
        }
        let Some(name) = decl.child_by_field_name("name") else {
            continue;
        };
        let name = file.text(name).to_string();

        let params = match decl.child_by_field_name("parameters") {
            Some(list) => raw_params(file, list),
            None => Vec::new(),
        };
        let results: Vec<TypeExpr> = match decl.child_by_field_name("result") {
            Some(list) if list.kind() == "parameter_list" => raw_params(file, list)
                .into_iter()
                .map(|p| p.ty)
                .collect(),
            Some(ty) => vec![lower_type(file, ty)],
            None => Vec::new(),
        };

        let mut in_signature = BTreeSet::new();
        for ty in params.iter().map(|p| &p.ty).chain(&results) {
            collect_qualifiers(ty, &mut in_signature);
            collect_identifiers(ty, &mut in_signature);
            collect_qualifiers(ty, &mut extracted.qualifiers);
            collect_identifiers(ty, &mut extracted.identifiers);
        }

        let canonical = |ty: &TypeExpr| {
            reconstruct(ty).map_err(|e| ExtractError::UnreconstructableType {
                file: file.name().to_string(),
                method: name.clone(),
                kind: e.kind,
            })
        };

        let names = settle_param_names(&params, imports, &in_signature);
        let params = params
            .iter()
            .zip(names)
            .map(|(raw, name)| {
                Ok(Param {
                    name,
                    ty: canonical(&raw.ty)?,
                    variadic: raw.variadic,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let results = results.iter().map(canonical).collect::<Result<Vec<_>>>()?;

        let method = MethodModel {
            passthrough: passthrough.contains(&name),
            receiver: if pointer {
                format!("*{}", base)
            } else {
                base.to_string()
            },
            name,
            params,
            results,
        };

        log::debug!(
            "{}: found ({}) {}({}) {}{}",
            file.name(),
            method.receiver,
            method.name,
            method.param_signature(),
            method.result_signature(),
            if method.passthrough { " [passthrough]" } else { "" }
        );
        extracted.methods.push(method);
    }

    Ok(extracted)
}

/// Base identifier of a method's receiver type and whether it is a pointer.
/// Generic receivers (`Box[T]`) have no plain identifier and yield `None`.
fn receiver_base<'f>(file: &'f ParsedFile, decl: Node<'_>) -> Option<(&'f str, bool)> {
    let receiver = decl.child_by_field_name("receiver")?;
    let param = content_children(receiver).into_iter().next()?;
    let mut ty = unparenthesize(param.child_by_field_name("type")?);

    let pointer = ty.kind() == "pointer_type";
    if pointer {
        ty = unparenthesize(content_children(ty).into_iter().next()?);
    }

    (ty.kind() == "type_identifier").then(|| (file.text(ty), pointer))
}

fn unparenthesize(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_type" {
        match content_children(node).into_iter().next() {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

fn raw_params(file: &ParsedFile, list: Node<'_>) -> Vec<RawParam> {
    let mut params = Vec::new();

    for decl in content_children(list) {
        let Some(ty) = decl.child_by_field_name("type") else {
            continue;
        };
        let ty = lower_type(file, ty);
        let variadic = decl.kind() == "variadic_parameter_declaration";

        let mut cursor = decl.walk();
        let names: Vec<String> = decl
            .children_by_field_name("name", &mut cursor)
            .map(|n| file.text(n).to_string())
            .collect();

        if names.is_empty() {
            params.push(RawParam {
                name: None,
                ty,
                variadic,
            });
            continue;
        }

        for name in names {
            params.push(RawParam {
                name: Some(name),
                ty: ty.clone(),
                variadic,
            });
        }
    }

    params
}

/// Names the wrapper uses for each parameter. Unnamed, blank and shadowing
/// parameters become `argN`, where N is the position.
///
/// A parameter shadows when it is named like something the wrapper body
/// refers to: a reserved name, an import, or any name used in the method's
/// own types (`config config`).
fn settle_param_names(
    params: &[RawParam],
    imports: &ImportTable,
    in_signature: &BTreeSet<String>,
) -> Vec<String> {
    let usable = |name: &str| {
        name != "_"
            && !RESERVED_NAMES.contains(&name)
            && !imports.contains_alias(name)
            && !in_signature.contains(name)
    };

    let mut taken: BTreeSet<String> = params
        .iter()
        .filter_map(|p| p.name.as_deref())
        .filter(|name| usable(*name))
        .map(str::to_string)
        .collect();

    params
        .iter()
        .enumerate()
        .map(|(position, p)| match p.name.as_deref() {
            Some(name) if usable(name) => name.to_string(),
            _ => {
                let mut name = format!("arg{}", position);
                while taken.contains(&name) {
                    name.push('_');
                }
                taken.insert(name.clone());
                name
            }
        })
        .collect()
}
