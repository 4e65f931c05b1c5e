use crate::analysis::symbols::{MethodSignature, SymbolTable};
use crate::analysis::types::expr_type;
use crate::frontend::ast;
use crate::frontend::ast::{Expr, Stmt, Type};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("Undefined variable '{var_name}' in method '{method_name}'")]
    UndefinedVariable {
        method_name: String,
        var_name: String,
    },

    #[error("Undefined method '{callee}' called from '{method_name}'")]
    UndefinedMethod {
        method_name: String,
        callee: String,
    },

    #[error("Method '{callee}' expects {expected} argument(s) but {actual} provided, called from '{method_name}'")]
    ArityMismatch {
        method_name: String,
        callee: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate method definition '{method_name}'")]
    DuplicateMethod {
        method_name: String,
    },

    #[error("Vararg parameter must be the last parameter of '{method_name}'")]
    VarargNotLast {
        method_name: String,
    },

    #[error("'this' cannot be used in static method '{method_name}'")]
    ThisInStatic {
        method_name: String,
    },

    #[error("Method '{method_name}' must end with a return statement")]
    MissingReturn {
        method_name: String,
    },

    #[error("Unknown type '{type_name}' in '{context}'")]
    UnknownType {
        type_name: String,
        context: String,
    },
}

/// Validates the facts the lowering relies on: every name resolves, calls on the
/// current class target declared methods with the right arity, and varargs are last.
pub fn check(program: &ast::Program, table: &SymbolTable) -> Result<(), Vec<SemanticError>> {
    let mut errors = Vec::new();
    let mut seen_methods: HashSet<&str> = HashSet::new();

    for field in &program.class.fields {
        check_type(&field.ty, &program.class.name, table, &mut errors);
    }

    for method in &program.class.methods {
        if !seen_methods.insert(&method.name) {
            errors.push(SemanticError::DuplicateMethod {
                method_name: method.name.clone(),
            });
        }
        check_method(method, table, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_type(ty: &Type, context: &str, table: &SymbolTable, errors: &mut Vec<SemanticError>) {
    match ty {
        Type::Array(elem) => check_type(elem, context, table, errors),
        Type::Class(name) => {
            let known = *name == table.class_name
                || table.superclass.as_deref() == Some(name.as_str())
                || table.is_imported(name);
            if !known {
                errors.push(SemanticError::UnknownType {
                    type_name: name.clone(),
                    context: context.to_string(),
                });
            }
        }
        _ => {}
    }
}

fn check_method(method: &ast::MethodDecl, table: &SymbolTable, errors: &mut Vec<SemanticError>) {
    let Some(signature) = table.method(&method.name) else {
        return;
    };

    let last = method.params.len().saturating_sub(1);
    if method.params.iter().enumerate().any(|(i, p)| p.is_vararg && i != last) {
        errors.push(SemanticError::VarargNotLast {
            method_name: method.name.clone(),
        });
    }

    for param in &method.params {
        check_type(&param.ty, &method.name, table, errors);
    }
    for local in &method.locals {
        check_type(&local.ty, &method.name, table, errors);
    }

    for stmt in &method.body {
        check_statement(stmt, signature, table, errors);
    }

    if method.return_type != Type::Void && !matches!(method.body.last(), Some(Stmt::Return(_))) {
        errors.push(SemanticError::MissingReturn {
            method_name: method.name.clone(),
        });
    }
}

fn check_statement(
    stmt: &Stmt,
    method: &MethodSignature,
    table: &SymbolTable,
    errors: &mut Vec<SemanticError>,
) {
    match stmt {
        Stmt::Block(stmts) => {
            for s in stmts {
                check_statement(s, method, table, errors);
            }
        }

        Stmt::If { cond, then_branch, else_branch } => {
            check_expr(cond, method, table, errors);
            check_statement(then_branch, method, table, errors);
            if let Some(else_branch) = else_branch {
                check_statement(else_branch, method, table, errors);
            }
        }

        Stmt::While { cond, body } => {
            check_expr(cond, method, table, errors);
            check_statement(body, method, table, errors);
        }

        Stmt::Expr(expr) => check_expr(expr, method, table, errors),

        Stmt::Assign { target, value } => {
            check_name(target, method, table, errors);
            check_expr(value, method, table, errors);
        }

        Stmt::ArrayAssign { target, index, value } => {
            check_name(target, method, table, errors);
            check_expr(index, method, table, errors);
            check_expr(value, method, table, errors);
        }

        Stmt::Return(expr) => {
            if let Some(expr) = expr {
                check_expr(expr, method, table, errors);
            }
        }
    }
}

fn check_name(name: &str, method: &MethodSignature, table: &SymbolTable, errors: &mut Vec<SemanticError>) {
    if table.resolve(method, name).is_none() {
        errors.push(SemanticError::UndefinedVariable {
            method_name: method.name.clone(),
            var_name: name.to_string(),
        });
    }
}

fn check_expr(expr: &Expr, method: &MethodSignature, table: &SymbolTable, errors: &mut Vec<SemanticError>) {
    match expr {
        Expr::IntLit(_) | Expr::BoolLit(_) | Expr::NewObject(_) => {}

        Expr::This => {
            if method.is_static {
                errors.push(SemanticError::ThisInStatic {
                    method_name: method.name.clone(),
                });
            }
        }

        Expr::Var(name) => check_name(name, method, table, errors),

        Expr::Binary { left, right, .. } => {
            check_expr(left, method, table, errors);
            check_expr(right, method, table, errors);
        }

        Expr::Not(operand) | Expr::Length(operand) | Expr::NewArray(operand) => {
            check_expr(operand, method, table, errors);
        }

        Expr::Index { array, index } => {
            check_expr(array, method, table, errors);
            check_expr(index, method, table, errors);
        }

        Expr::ArrayInit(elements) => {
            for e in elements {
                check_expr(e, method, table, errors);
            }
        }

        Expr::Call { receiver, method: callee, args } => {
            match receiver.as_ref() {
                // imported class as the target of a static call
                Expr::Var(name) if table.is_imported(name) && table.resolve(method, name).is_none() => {}
                _ => check_expr(receiver, method, table, errors),
            }
            for arg in args {
                check_expr(arg, method, table, errors);
            }

            let on_current_class = expr_type(table, method, receiver)
                .is_some_and(|ty| table.is_current_class(&ty));
            if !on_current_class {
                return;
            }

            match table.method(callee) {
                None if !table.has_superclass() => {
                    errors.push(SemanticError::UndefinedMethod {
                        method_name: method.name.clone(),
                        callee: callee.clone(),
                    });
                }
                None => {}
                Some(signature) => {
                    let arity_ok = if signature.is_vararg {
                        args.len() >= signature.fixed_arity()
                    } else {
                        args.len() == signature.params.len()
                    };
                    if !arity_ok {
                        errors.push(SemanticError::ArityMismatch {
                            method_name: method.name.clone(),
                            callee: callee.clone(),
                            expected: signature.params.len(),
                            actual: args.len(),
                        });
                    }
                }
            }
        }
    }
}
