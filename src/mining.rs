pub mod filter;
pub mod patterns;
pub mod relationships;

pub use filter::{FileFilter, IgnorePatterns};
pub use patterns::{ChangePattern, FrequentItemset, PatternMiner, min_support_count, pattern_name};
pub use relationships::{
    FileRelationship, ModuleGroup, RelationshipStrength, build_module_groups, build_relationships,
};
