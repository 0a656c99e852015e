/// `use` statement and namespace extraction.
///
/// This module handles parsing PHP `use` statements from the AST, building
/// a mapping of short (imported) names to their fully-qualified
/// equivalents.  Aliases are stored lower-cased because PHP class names
/// are case-insensitive.
use std::collections::HashMap;

use mago_syntax::ast::*;

use crate::util::short_name;

/// Collect the class imports among `statements`.
///
/// Namespace bodies are not entered: each namespace block gets its own
/// import table when its classes are extracted.
pub(crate) fn extract_use_map<'a>(
    statements: impl Iterator<Item = &'a Statement<'a>>,
) -> HashMap<String, String> {
    let mut use_map = HashMap::new();
    for statement in statements {
        if let Statement::Use(use_stmt) = statement {
            extract_use_items(&use_stmt.items, &mut use_map);
        }
    }
    use_map
}

/// Extract individual use items from a `UseItems` node.
fn extract_use_items(items: &UseItems, use_map: &mut HashMap<String, String>) {
    match items {
        UseItems::Sequence(seq) => {
            // `use Foo\Bar;` or `use Foo\Bar, Baz\Qux;`
            for item in seq.items.iter() {
                register_use_item(item, None, use_map);
            }
        }
        UseItems::TypedSequence(seq) => {
            // Function and const imports never name a type.
            if seq.r#type.is_function() || seq.r#type.is_const() {
                return;
            }
            for item in seq.items.iter() {
                register_use_item(item, None, use_map);
            }
        }
        UseItems::TypedList(list) => {
            if list.r#type.is_function() || list.r#type.is_const() {
                return;
            }
            let prefix = list.namespace.value();
            for item in list.items.iter() {
                register_use_item(item, Some(prefix), use_map);
            }
        }
        UseItems::MixedList(list) => {
            // `use Foo\{Bar, function baz, const QUX};`
            let prefix = list.namespace.value();
            for maybe_typed in list.items.iter() {
                if let Some(ref t) = maybe_typed.r#type
                    && (t.is_function() || t.is_const())
                {
                    continue;
                }
                register_use_item(&maybe_typed.item, Some(prefix), use_map);
            }
        }
    }
}

/// Register a single `UseItem` into the use_map.
///
/// If `group_prefix` is `Some`, the item name is relative to that prefix
/// (e.g. for `use Foo\{Bar}`, prefix is `"Foo"` and item name is `"Bar"`,
/// giving FQN `"Foo\Bar"`).
fn register_use_item(
    item: &UseItem,
    group_prefix: Option<&str>,
    use_map: &mut HashMap<String, String>,
) {
    let item_name = item.name.value();
    let item_name = item_name.strip_prefix('\\').unwrap_or(item_name);
    let prefix = group_prefix.map(|p| p.trim_matches('\\'));

    let fqn = match prefix {
        Some(prefix) => format!("{}\\{}", prefix, item_name),
        None => item_name.to_string(),
    };

    let alias_name = match item.alias {
        Some(ref alias) => alias.identifier.value.to_string(),
        None => short_name(&fqn).to_string(),
    };

    use_map.insert(alias_name.to_ascii_lowercase(), fqn);
}
