//! Documentation model builder for PHP projects.
//!
//! Given a fully-qualified class name, the crate produces a [`ClassView`]:
//! an immutable, renderer-agnostic description of the class with every
//! docblock type unified against its native declaration, inherit markers
//! resolved along the class hierarchy, and links attached to every class
//! reference.
//!
//! The pipeline, bottom-up:
//!
//! - [`parser`] reads PHP source into [`types::ClassSymbol`]s.
//! - [`introspection`] indexes them and answers queries with trait and
//!   inherited members merged in.
//! - [`docblock`] parses comments and their pseudo-types.
//! - [`unify`] turns a native/annotation type pair into [`types::TypeRef`]s.
//! - [`inheritance`] resolves inherit markers and decides which members
//!   are documented.
//! - [`links`] decides where each class reference points.
//! - [`builder`] assembles the [`ClassView`].
//!
//! [`batch`] and [`config`] drive whole-project runs for the CLI.

pub mod batch;
pub mod builder;
pub mod composer;
pub mod config;
pub mod docblock;
pub mod error;
pub mod inheritance;
pub mod introspection;
pub mod links;
pub mod parser;
pub mod types;
pub mod unify;
pub mod util;
pub mod view;

pub use builder::{DocBuilder, build_class_view};
pub use config::{Config, ConfigLayer};
pub use docblock::{AnnotationParser, DocblockParser};
pub use error::{Degradation, DocError};
pub use introspection::{IntrospectionProvider, SymbolIndex};
pub use links::LinkContext;
pub use view::{ClassView, ConstantView, MethodView, ParameterView, PropertyView, ThrowsView, TypeView};
