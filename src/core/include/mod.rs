//! Include parameter handling: parsing relation paths and building the
//! eager-load tree

pub mod parser;
pub mod tree;

pub use parser::{IncludeOptions, RelationPath, parse_include, parse_include_value};
pub use tree::{RelationNode, RelationPlan, RelationTree, build_relation_tree};
