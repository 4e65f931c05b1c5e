pub mod fold;
pub mod propagate;

use tracing::debug;

use crate::frontend::ast::{MethodDecl, Program};

/// Alternates constant propagation and folding over every method until neither changes anything.
pub fn optimize(program: &Program) -> Program {
    let mut optimized = program.clone();
    optimized.class.methods = program.class.methods.iter().map(optimize_method).collect();
    optimized
}

fn optimize_method(method: &MethodDecl) -> MethodDecl {
    let mut current = method.clone();
    let mut rounds = 0;

    loop {
        rounds += 1;
        let body: Vec<_> = propagate::propagate_method(&current)
            .iter()
            .map(fold::fold_stmt)
            .collect();

        if body == current.body {
            break;
        }
        current.body = body;
    }

    debug!("Optimized '{}' in {} round(s)", method.name, rounds);
    current
}
