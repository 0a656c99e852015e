mod common;

use common::{build_view, context, index_sources};
use phpantom_docs::types::{ClassLikeKind, Separator, TypeKind, Visibility};
use phpantom_docs::view::join_types;
use phpantom_docs::{DocBuilder, DocError, DocblockParser};

// ─── End-to-end ─────────────────────────────────────────────────────────────

const BOOK: &str = concat!(
    "<?php\n",
    "namespace App;\n",
    "\n",
    "/**\n",
    " * A book in the catalogue.\n",
    " *\n",
    " * Books are immutable once published.\n",
    " */\n",
    "class Book\n",
    "{\n",
    "    public ?string $name;\n",
    "\n",
    "    /** @var string[] */\n",
    "    public array $tags = [];\n",
    "}\n",
);

#[test]
fn test_native_nullable_property() {
    let index = index_sources(&[("Book.php", BOOK)]);
    let view = build_view(&index, "App\\Book");

    let name = view.property("name").expect("name property");
    assert_eq!(name.types.len(), 1);
    assert_eq!(name.types[0].name, "string");
    assert_eq!(name.types[0].kind, TypeKind::Builtin);
    assert!(name.types[0].nullable);
    assert_eq!(name.types[0].link, None);
}

#[test]
fn test_annotated_array_property() {
    let index = index_sources(&[("Book.php", BOOK)]);
    let view = build_view(&index, "App\\Book");

    let tags = view.property("tags").expect("tags property");
    assert_eq!(tags.types.len(), 1);
    let array = &tags.types[0];
    assert_eq!(array.kind, TypeKind::Array);
    assert!(array.is_collection);
    assert_eq!(array.value_types.len(), 1);
    assert_eq!(array.value_types[0].name, "string");
    assert_eq!(tags.default_value.as_deref(), Some("[]"));
}

#[test]
fn test_class_summary_and_description() {
    let index = index_sources(&[("Book.php", BOOK)]);
    let view = build_view(&index, "App\\Book");

    assert_eq!(view.name, "App\\Book");
    assert_eq!(view.short_name, "Book");
    assert_eq!(view.namespace.as_deref(), Some("App"));
    assert_eq!(view.kind, ClassLikeKind::Class);
    assert_eq!(view.summary, "A book in the catalogue.");
    assert_eq!(view.description, "Books are immutable once published.");
    assert_eq!(view.link.as_deref(), Some("https://docs.example.com/api/Book"));
}

#[test]
fn test_unknown_class_is_a_hard_error() {
    let index = index_sources(&[("Book.php", BOOK)]);
    let builder = DocBuilder::new(&index, &DocblockParser);
    let err = builder.build_class_view("App\\Missing", &context()).unwrap_err();
    assert!(matches!(err, DocError::UnknownSymbol { ref name } if name == "App\\Missing"));
}

// ─── Testable properties ────────────────────────────────────────────────────

#[test]
fn test_build_is_idempotent() {
    let index = index_sources(&[
        ("Book.php", BOOK),
        (
            "Novel.php",
            "<?php namespace App; /** @see Book */ class Novel extends Book { public function pages(): int { return 1; } }",
        ),
    ]);
    let builder = DocBuilder::new(&index, &DocblockParser);
    let first = builder.build_class_view("App\\Novel", &context()).unwrap();
    let second = builder.build_class_view("App\\Novel", &context()).unwrap();
    assert_eq!(first, second);

    // A fresh builder agrees with the memoized one.
    assert_eq!(first, build_view(&index, "App\\Novel"));
}

#[test]
fn test_nullable_forms_render_identically() {
    let index = index_sources(&[(
        "Shelf.php",
        concat!(
            "<?php namespace App;\n",
            "class Shelf {\n",
            "    /** @var Book|null */\n",
            "    public $first;\n",
            "    /** @var ?Book */\n",
            "    public $second;\n",
            "    /** @var null|Book */\n",
            "    public $third;\n",
            "}\n",
        ),
    )]);
    let view = build_view(&index, "App\\Shelf");
    let first = &view.property("first").unwrap().types;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].name, "Book");
    assert!(first[0].nullable);
    assert_eq!(first, &view.property("second").unwrap().types);
    assert_eq!(first, &view.property("third").unwrap().types);
}

#[test]
fn test_annotation_replaces_native_type_entirely() {
    let index = index_sources(&[(
        "Loan.php",
        concat!(
            "<?php namespace App;\n",
            "use DateTimeInterface;\n",
            "class Loan {\n",
            "    /** @var positive-int */\n",
            "    public int $days = 14;\n",
            "    /** @var \\DateTimeImmutable */\n",
            "    public ?DateTimeInterface $due = null;\n",
            "    /** @var Book&\\Countable */\n",
            "    public object $item;\n",
            "}\n",
        ),
    )]);
    let view = build_view(&index, "App\\Loan");

    let days = &view.property("days").unwrap().types;
    assert_eq!(join_types(days, Separator::Union), "int");

    let due = &view.property("due").unwrap().types;
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].class_name.as_deref(), Some("DateTimeImmutable"));
    assert!(!due[0].nullable);
    assert_eq!(
        due[0].link.as_deref(),
        Some("https://www.php.net/manual/en/class.datetimeimmutable.php")
    );

    let item = view.property("item").unwrap();
    assert_eq!(item.separator, Separator::Intersection);
    assert_eq!(join_types(&item.types, item.separator), "Book&Countable");
}

#[test]
fn test_malformed_annotation_falls_back_to_native_type() {
    let index = index_sources(&[(
        "Broken.php",
        "<?php namespace App; class Broken { /** @var array<int */ public ?int $count = null; }",
    )]);
    let builder = DocBuilder::new(&index, &DocblockParser);
    let view = builder.build_class_view("App\\Broken", &context()).unwrap();

    let count = &view.property("count").unwrap().types;
    assert_eq!(join_types(count, Separator::Union), "?int");
    assert!(builder.degradations().iter().any(|d| matches!(
        d,
        phpantom_docs::Degradation::MalformedAnnotation { owner, .. } if owner == "App\\Broken::$count"
    )));
}

// ─── Methods ────────────────────────────────────────────────────────────────

#[test]
fn test_method_parameters_returns_and_throws() {
    let index = index_sources(&[(
        "Library.php",
        concat!(
            "<?php namespace App;\n",
            "class Library {\n",
            "    /**\n",
            "     * Lend a book.\n",
            "     *\n",
            "     * @param Book $book The book to lend.\n",
            "     * @param int $days How long.\n",
            "     * @return list<Loan> The open loans.\n",
            "     * @throws \\RuntimeException When the book is already out.\n",
            "     * @deprecated\n",
            "     */\n",
            "    public function lend(Book $book, int $days = 14, string ...$notes): array {}\n",
            "\n",
            "    private function audit(): void {}\n",
            "}\n",
        ),
    )]);
    let view = build_view(&index, "App\\Library");

    assert!(view.method("audit").is_none());
    let lend = view.method("lend").expect("lend method");
    assert_eq!(lend.summary, "Lend a book.");
    assert!(lend.deprecated);
    assert_eq!(lend.visibility, Visibility::Public);

    assert_eq!(lend.parameters.len(), 3);
    assert_eq!(lend.parameters[0].name, "book");
    assert_eq!(lend.parameters[0].description, "The book to lend.");
    // `App\Book` is not indexed here, so it has no page to link to.
    assert_eq!(lend.parameters[0].types[0].class_name.as_deref(), Some("App\\Book"));
    assert_eq!(lend.parameters[0].types[0].link, None);
    assert_eq!(lend.parameters[1].default_value.as_deref(), Some("14"));
    assert!(lend.parameters[1].is_optional);
    assert!(lend.parameters[2].is_variadic);

    assert_eq!(join_types(&lend.return_types, lend.return_separator), "array<int, Loan>");
    assert_eq!(lend.return_description, "The open loans.");

    assert_eq!(lend.throws.len(), 1);
    assert_eq!(lend.throws[0].types[0].name, "RuntimeException");
    assert_eq!(lend.throws[0].description, "When the book is already out.");
}

#[test]
fn test_promoted_constructor_properties() {
    let index = index_sources(&[(
        "Member.php",
        concat!(
            "<?php namespace App;\n",
            "class Member {\n",
            "    /**\n",
            "     * @param non-empty-string $email Contact address.\n",
            "     * @param list<string> $roles\n",
            "     */\n",
            "    public function __construct(\n",
            "        public readonly string $email,\n",
            "        protected array $roles = [],\n",
            "    ) {}\n",
            "}\n",
        ),
    )]);
    let view = build_view(&index, "App\\Member");

    let email = view.property("email").expect("promoted email");
    assert!(email.is_promoted);
    assert!(email.is_readonly);
    assert_eq!(email.summary, "Contact address.");

    let roles = view.property("roles").expect("promoted roles");
    assert_eq!(join_types(&roles.types, roles.separator), "array<int, string>");
    assert_eq!(roles.default_value.as_deref(), Some("[]"));

    let constructor = view.constructor.as_ref().expect("constructor");
    assert_eq!(constructor.parameters.len(), 2);
    assert!(view.method("__construct").is_none());
}

// ─── Class-likes ────────────────────────────────────────────────────────────

#[test]
fn test_enum_cases_and_backing_type() {
    let index = index_sources(&[(
        "Status.php",
        concat!(
            "<?php namespace App;\n",
            "enum Status: string {\n",
            "    /** On the shelf. */\n",
            "    case Available = 'available';\n",
            "    case Lent = 'lent';\n",
            "    const DEFAULT = self::Available;\n",
            "}\n",
        ),
    )]);
    let view = build_view(&index, "App\\Status");

    assert_eq!(view.kind, ClassLikeKind::Enum);
    assert_eq!(join_types(&view.backing_types, Separator::Union), "string");
    let available = view.constant("Available").expect("case");
    assert!(available.is_case);
    assert_eq!(available.value.as_deref(), Some("'available'"));
    assert_eq!(available.summary, "On the shelf.");
    assert!(!view.constant("DEFAULT").unwrap().is_case);
}

#[test]
fn test_attribute_classes_and_interfaces() {
    let index = index_sources(&[
        (
            "Route.php",
            "<?php namespace App; use Attribute; #[Attribute] final class Route {}",
        ),
        (
            "Lendable.php",
            "<?php namespace App; interface Lendable extends \\Countable { public function lend(): void; }",
        ),
    ]);
    let route = build_view(&index, "App\\Route");
    assert_eq!(route.kind, ClassLikeKind::Attribute);
    assert!(route.is_final);

    let lendable = build_view(&index, "App\\Lendable");
    assert_eq!(lendable.kind, ClassLikeKind::Interface);
    assert_eq!(lendable.interfaces[0].name, "Countable");
    assert!(lendable.method("lend").unwrap().is_abstract);
}

#[test]
fn test_views_serialize_for_renderers() {
    let index = index_sources(&[("Book.php", BOOK)]);
    let view = build_view(&index, "App\\Book");
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["shortName"], "Book");
    assert_eq!(json["properties"][1]["types"][0]["isCollection"], true);
    assert_eq!(json["properties"][1]["types"][0]["valueTypes"][0]["name"], "string");
    assert!(json.get("parentClass").is_none());
}
