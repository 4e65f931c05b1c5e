pub mod descriptor;
pub mod generator;
pub mod graph;
pub mod liveness;
pub mod regalloc;
#[cfg(test)]
pub mod vm;

use tracing::debug;

use crate::analysis::semantic;
use crate::analysis::symbols::SymbolTable;
use crate::backend::regalloc::RegAllocError;
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::frontend::{ast, parser};
use crate::ir::{self, ClassUnit};
use crate::opt;

/// Result of compiling one class.
#[derive(Debug)]
pub struct Compilation {
    pub unit: ClassUnit,
    pub assembly: String,
    /// Methods that fell back to one register per variable.
    pub diagnostics: Vec<RegAllocError>,
}

pub fn compile_source(source: &str, config: &CompilerConfig) -> Result<Compilation, CompileError> {
    let program = parser::parse(source).map_err(CompileError::Parse)?;
    compile(&program, config)
}

pub fn compile(program: &ast::Program, config: &CompilerConfig) -> Result<Compilation, CompileError> {
    let table = SymbolTable::build(program);
    semantic::check(program, &table).map_err(CompileError::Semantic)?;

    let program = if config.optimize {
        opt::optimize(program)
    } else {
        program.clone()
    };

    let mut unit = ir::lower::lower(&program, &table);
    debug!("Lowered class '{}' with {} method(s)", unit.name, unit.methods.len());

    let diagnostics = regalloc::allocate(&mut unit, config.register_allocation);
    let assembly = generator::generate(&unit)?;

    Ok(Compilation {
        unit,
        assembly,
        diagnostics,
    })
}
