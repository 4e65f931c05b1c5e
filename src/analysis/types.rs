use crate::analysis::symbols::{MethodSignature, SymbolTable};
use crate::frontend::ast::{Expr, Type};

/// Static type of `expr` inside `method`.
///
/// Returns `None` when the type depends on a method the class does not declare
/// (an imported class, or a method inherited from an unknown superclass); callers
/// infer those from context.
pub fn expr_type(table: &SymbolTable, method: &MethodSignature, expr: &Expr) -> Option<Type> {
    match expr {
        Expr::IntLit(_) | Expr::Length(_) => Some(Type::Int),
        Expr::BoolLit(_) | Expr::Not(_) => Some(Type::Boolean),
        Expr::This => Some(Type::Class(table.class_name.clone())),

        Expr::Var(name) => match table.resolve(method, name) {
            Some(resolved) => Some(resolved.ty().clone()),
            None if table.is_imported(name) => Some(Type::Class(name.clone())),
            None => None,
        },

        Expr::Binary { op, .. } => Some(op.result_type()),

        Expr::Index { array, .. } => match expr_type(table, method, array) {
            Some(Type::Array(elem)) => Some(*elem),
            _ => Some(Type::Int),
        },

        Expr::Call { receiver, method: name, .. } => {
            let receiver_type = expr_type(table, method, receiver)?;
            if !table.is_current_class(&receiver_type) {
                return None;
            }
            table.method(name).map(|m| m.return_type.clone())
        }

        Expr::NewArray(_) | Expr::ArrayInit(_) => Some(Type::int_array()),
        Expr::NewObject(class) => Some(Type::Class(class.clone())),
    }
}
