use thiserror::Error;

use crate::analysis::semantic::SemanticError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at offset {offset}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{} parse error(s)", .0.len())]
    Parse(Vec<ParseError>),

    #[error("{} semantic error(s)", .0.len())]
    Semantic(Vec<SemanticError>),

    #[error("failed to format Jasmin output")]
    Format(#[from] std::fmt::Error),
}
