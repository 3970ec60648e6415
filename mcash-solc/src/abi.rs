//! Orders ABI entries by the order their functions are declared in the source.
//!
//! solc emits the ABI sorted alphabetically, while tooling built on top of the artifacts expects
//! functions in declaration order.

use crate::utils::non_empty_object;
use serde_json::Value;
use std::collections::HashMap;

/// Function name -> position of its declaration in the contract
pub type FunctionIndexes = HashMap<String, usize>;

/// Reorders the `abi` of `contract`.
///
/// Entries that are not declared functions (constructor, fallback, events) keep their order and
/// come first, followed by the functions in declaration order. Overloads share one position and
/// keep their relative order. The legacy AST is used if present and not `{}`, the compact `ast`
/// otherwise;
/// without a matching contract the ABI is returned unchanged.
pub fn order_abi(
    abi: Vec<Value>,
    contract: &str,
    legacy_ast: Option<&Value>,
    ast: Option<&Value>,
) -> Vec<Value> {
    let indexes = match (non_empty_object(legacy_ast), non_empty_object(ast)) {
        (Some(legacy), _) => legacy_function_indexes(legacy, contract),
        (None, Some(ast)) => function_indexes(ast, contract),
        (None, None) => None,
    };
    match indexes {
        Some(indexes) if !indexes.is_empty() => order_by(abi, &indexes),
        _ => abi,
    }
}

/// Moves every entry named in `indexes` behind the unnamed ones, sorted by its index
pub fn order_by(abi: Vec<Value>, indexes: &FunctionIndexes) -> Vec<Value> {
    let position = |entry: &Value| {
        entry.get("name").and_then(Value::as_str).and_then(|name| indexes.get(name)).copied()
    };
    let (mut functions, mut ordered): (Vec<_>, Vec<_>) =
        abi.into_iter().partition(|entry| position(entry).is_some());
    // `sort_by_key` is stable, overloads keep their relative order
    functions.sort_by_key(|entry| position(entry));
    ordered.append(&mut functions);
    ordered
}

/// Function positions of `contract` in a legacy AST, `children` / `name` / `attributes.name`
pub fn legacy_function_indexes(legacy_ast: &Value, contract: &str) -> Option<FunctionIndexes> {
    let definition = legacy_ast.get("children")?.as_array()?.iter().find(|node| {
        node["name"] == "ContractDefinition" && node["attributes"]["name"] == contract
    })?;
    let names = definition
        .get("children")?
        .as_array()?
        .iter()
        .filter(|node| node["name"] == "FunctionDefinition")
        .filter_map(|node| node["attributes"]["name"].as_str());
    Some(index(names))
}

/// Function positions of `contract` in a compact AST, `nodes` / `nodeType` / `name`
pub fn function_indexes(ast: &Value, contract: &str) -> Option<FunctionIndexes> {
    let definition = ast.get("nodes")?.as_array()?.iter().find(|node| {
        node["nodeType"] == "ContractDefinition" && node["name"] == contract
    })?;
    let names = definition
        .get("nodes")?
        .as_array()?
        .iter()
        .filter(|node| node["nodeType"] == "FunctionDefinition")
        .filter_map(|node| node["name"].as_str());
    Some(index(names))
}

// later declarations of the same name win
fn index<'a>(names: impl Iterator<Item = &'a str>) -> FunctionIndexes {
    names.enumerate().map(|(idx, name)| (name.to_string(), idx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn names(abi: &[Value]) -> Vec<&str> {
        abi.iter().map(|entry| entry["name"].as_str().unwrap_or(entry["type"].as_str().unwrap())).collect()
    }

    fn legacy_ast() -> Value {
        json!({
            "name": "SourceUnit",
            "children": [
                {"name": "PragmaDirective", "attributes": {"literals": ["solidity", "^", "0.4", ".25"]}},
                {
                    "name": "ContractDefinition",
                    "attributes": {"name": "Other"},
                    "children": [{"name": "FunctionDefinition", "attributes": {"name": "z"}}]
                },
                {
                    "name": "ContractDefinition",
                    "attributes": {"name": "Token"},
                    "children": [
                        {"name": "VariableDeclaration", "attributes": {"name": "owner"}},
                        {"name": "FunctionDefinition", "attributes": {"name": "c"}},
                        {"name": "EventDefinition", "attributes": {"name": "Transfer"}},
                        {"name": "FunctionDefinition", "attributes": {"name": "a"}},
                        {"name": "FunctionDefinition", "attributes": {"name": "b"}}
                    ]
                }
            ]
        })
    }

    fn alphabetic_abi() -> Vec<Value> {
        vec![
            json!({"type": "function", "name": "a", "inputs": []}),
            json!({"type": "function", "name": "b", "inputs": []}),
            json!({"type": "function", "name": "c", "inputs": []}),
            json!({"type": "constructor", "inputs": []}),
            json!({"type": "event", "name": "Transfer", "inputs": []}),
        ]
    }

    #[test]
    fn orders_functions_by_declaration() {
        let abi = order_abi(alphabetic_abi(), "Token", Some(&legacy_ast()), None);
        assert_eq!(names(&abi), vec!["constructor", "Transfer", "c", "a", "b"]);
    }

    #[test]
    fn declaration_order_survives_any_abi_order() {
        let mut abi = alphabetic_abi();
        abi.reverse();
        let abi = order_abi(abi, "Token", Some(&legacy_ast()), None);
        assert_eq!(names(&abi), vec!["Transfer", "constructor", "c", "a", "b"]);
    }

    #[test]
    fn empty_legacy_ast_falls_back_to_compact_ast() {
        let ast = json!({
            "nodeType": "SourceUnit",
            "nodes": [{
                "nodeType": "ContractDefinition",
                "name": "Token",
                "nodes": [
                    {"nodeType": "FunctionDefinition", "name": "b"},
                    {"nodeType": "FunctionDefinition", "name": "c"},
                    {"nodeType": "FunctionDefinition", "name": "a"}
                ]
            }]
        });
        let abi = order_abi(alphabetic_abi(), "Token", Some(&json!({})), Some(&ast));
        assert_eq!(names(&abi), vec!["constructor", "Transfer", "b", "c", "a"]);
    }

    #[test]
    fn unknown_contract_keeps_abi() {
        let abi = order_abi(alphabetic_abi(), "Missing", Some(&legacy_ast()), None);
        assert_eq!(abi, alphabetic_abi());
        assert_eq!(order_abi(alphabetic_abi(), "Token", None, None), alphabetic_abi());
    }

    #[test]
    fn falls_back_to_compact_ast() {
        let ast = json!({
            "nodeType": "SourceUnit",
            "nodes": [{
                "nodeType": "ContractDefinition",
                "name": "Token",
                "nodes": [
                    {"nodeType": "FunctionDefinition", "name": "b"},
                    {"nodeType": "FunctionDefinition", "name": "a"},
                    {"nodeType": "FunctionDefinition", "name": "c"}
                ]
            }]
        });
        let abi = order_abi(alphabetic_abi(), "Token", None, Some(&ast));
        assert_eq!(names(&abi), vec!["constructor", "Transfer", "b", "a", "c"]);
    }

    #[test]
    fn overloads_move_together() {
        let ast = json!({
            "children": [{
                "name": "ContractDefinition",
                "attributes": {"name": "Token"},
                "children": [
                    {"name": "FunctionDefinition", "attributes": {"name": "transfer"}},
                    {"name": "FunctionDefinition", "attributes": {"name": "approve"}},
                    {"name": "FunctionDefinition", "attributes": {"name": "transfer"}}
                ]
            }]
        });
        let abi = vec![
            json!({"type": "function", "name": "approve", "inputs": []}),
            json!({"type": "function", "name": "transfer", "inputs": [{"type": "address"}]}),
            json!({"type": "function", "name": "transfer", "inputs": []}),
        ];
        let ordered = order_abi(abi.clone(), "Token", Some(&ast), None);
        // the last declaration of `transfer` defines its position
        assert_eq!(ordered, vec![abi[0].clone(), abi[1].clone(), abi[2].clone()]);
    }
}
