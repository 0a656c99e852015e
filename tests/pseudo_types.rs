mod common;

use common::{build_view, index_sources};
use phpantom_docs::types::TypeKind;
use phpantom_docs::view::join_types;

/// Every vocabulary entry of the pseudo-type table and the builtins it
/// must produce, in order.
const TABLE: &[(&str, &[&str])] = &[
    ("integer", &["int"]),
    ("positive-int", &["int"]),
    ("negative-int", &["int"]),
    ("double", &["float"]),
    ("numeric-string", &["string"]),
    ("literal-string", &["string"]),
    ("trait-string", &["string"]),
    ("interface-string", &["string"]),
    ("class-string", &["string"]),
    ("html-escaped-string", &["string"]),
    ("lowercase-string", &["string"]),
    ("non-empty-string", &["string"]),
    ("scalar", &["int", "float", "string", "bool"]),
    ("number", &["int", "float"]),
    ("numeric", &["int", "float", "string"]),
    ("array-key", &["string", "int"]),
    ("mixed", &[]),
    ("void", &["null"]),
];

/// A class with one property per table entry, named `p0`, `p1`, ...
fn table_source() -> String {
    let mut source = String::from("<?php namespace App;\nclass Base {}\nclass Sample extends Base {\n");
    for (i, (annotation, _)) in TABLE.iter().enumerate() {
        source.push_str(&format!("    /** @var {annotation} */\n    public $p{i};\n"));
    }
    source.push_str("    /** @var self */\n    public $own;\n");
    source.push_str("    /** @var static */\n    public $late;\n");
    source.push_str("    /** @var parent */\n    public $base;\n");
    source.push_str("}\n");
    source
}

#[test]
fn test_every_table_entry_maps_to_its_builtins() {
    let source = table_source();
    let index = index_sources(&[("Sample.php", &source)]);
    let view = build_view(&index, "App\\Sample");

    for (i, (annotation, expected)) in TABLE.iter().enumerate() {
        let property = view
            .property(&format!("p{i}"))
            .unwrap_or_else(|| panic!("missing property for `{annotation}`"));
        let names: Vec<&str> = property.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(&names, expected, "`{annotation}`");
        assert!(
            property.types.iter().all(|t| !t.nullable && !t.is_collection),
            "`{annotation}` must map to plain builtins"
        );
    }
}

#[test]
fn test_void_is_the_null_type() {
    let source = table_source();
    let index = index_sources(&[("Sample.php", &source)]);
    let view = build_view(&index, "App\\Sample");
    let void = TABLE.iter().position(|(a, _)| *a == "void").unwrap();
    let property = view.property(&format!("p{void}")).unwrap();
    assert_eq!(property.types[0].kind, TypeKind::Null);
}

#[test]
fn test_self_static_and_parent_resolve_to_classes() {
    let source = table_source();
    let index = index_sources(&[("Sample.php", &source)]);
    let view = build_view(&index, "App\\Sample");

    for (property, class_name) in [("own", "App\\Sample"), ("late", "App\\Sample"), ("base", "App\\Base")] {
        let types = &view.property(property).unwrap().types;
        assert_eq!(types.len(), 1, "{property}");
        assert_eq!(types[0].kind, TypeKind::Object);
        assert_eq!(types[0].class_name.as_deref(), Some(class_name), "{property}");
    }
}

#[test]
fn test_generic_forms() {
    let index = index_sources(&[(
        "Generics.php",
        concat!(
            "<?php namespace App;\n",
            "class Generics {\n",
            "    /** @var int<0, max> */\n",
            "    public $range;\n",
            "    /** @var class-string<Generics> */\n",
            "    public $class;\n",
            "    /** @var array<string, int> */\n",
            "    public $counts;\n",
            "    /** @var array<Generics> */\n",
            "    public $values;\n",
            "    /** @var array{id: int, name: string} */\n",
            "    public $row;\n",
            "    /** @var list{int, int} */\n",
            "    public $pair;\n",
            "    /** @var iterable<int, Generics> */\n",
            "    public $stream;\n",
            "}\n",
        ),
    )]);
    let view = build_view(&index, "App\\Generics");
    let rendered = |name: &str| {
        let property = view.property(name).unwrap();
        join_types(&property.types, property.separator)
    };

    assert_eq!(rendered("range"), "int");
    assert_eq!(rendered("class"), "string");
    assert_eq!(rendered("counts"), "array<string, int>");
    assert_eq!(rendered("values"), "array<Generics>");
    assert_eq!(rendered("row"), "array<string, int, string>");
    assert_eq!(rendered("pair"), "array<int, int>");
    assert_eq!(rendered("stream"), "iterable<int, Generics>");

    let range = &view.property("range").unwrap().types[0];
    assert!(!range.is_collection);
}
