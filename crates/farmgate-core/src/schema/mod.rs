mod parser;
pub mod types;
pub mod validation;

pub use parser::{ParseError, parse_schema};
pub use validation::{
    BreakingChange, SchemaLimits, ValidationError, detect_breaking_changes, validate_references,
    validate_schema_limits,
};

use types::Schema;

/// The harvest-tracking authorization model.
pub const HARVEST_SCHEMA: &str = include_str!("../../schemas/harvest.zed");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid schema: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parses and validates schema text. The same text always yields the same
/// `Schema`.
pub fn compile(input: &str) -> Result<Schema, SchemaError> {
    let schema = parse_schema(input)?;
    validate_references(&schema).map_err(SchemaError::Invalid)?;
    Ok(schema)
}
