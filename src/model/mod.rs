//! Definition graph of a schema set
//!
//! Schema documents are loaded by the [`SchemaManager`], turned into
//! definitions by a per-document builder and linked by the resolver into a
//! [`ResolvedSchema`].

// Graph types
pub mod definition;
pub mod kinds;
pub mod builtins;

// Loading and resolution
pub mod document;
mod builder;
mod resolver;
pub mod manager;

// Finished graph
pub mod schema;
pub mod instance;
mod encoding;

// Re-exports
pub use definition::{
    ChoiceGroup, DefId, Definition, DefinitionArena, DefinitionKind, MergeOrder, ModelScope,
    Occurs, SymbolSpace, TypeRef,
};
pub use document::{FormDefault, ImportDecl, SchemaDocument};
pub use instance::{InstanceDefinition, InstanceName};
pub use kinds::DeclarationKind;
pub use manager::{ResolveOptions, SchemaManager};
pub use schema::ResolvedSchema;
