use std::collections::{HashMap, HashSet};

use crate::frontend::ast::{Expr, MethodDecl, Stmt};

/// Local name -> literal it is known to hold at the current point.
type Constants = HashMap<String, Expr>;

/// Replaces reads of locals that provably hold a literal with that literal.
pub fn propagate_method(method: &MethodDecl) -> Vec<Stmt> {
    let locals: HashSet<&str> = method.locals.iter().map(|l| l.name.as_str()).collect();
    let mut env = Constants::new();
    method
        .body
        .iter()
        .map(|stmt| propagate_stmt(stmt, &locals, &mut env))
        .collect()
}

fn propagate_stmt(stmt: &Stmt, locals: &HashSet<&str>, env: &mut Constants) -> Stmt {
    match stmt {
        Stmt::Block(stmts) => Stmt::Block(stmts.iter().map(|s| propagate_stmt(s, locals, env)).collect()),

        Stmt::Assign { target, value } => {
            let value = substitute(value, env);
            if locals.contains(target.as_str()) && is_literal(&value) {
                env.insert(target.clone(), value.clone());
            } else {
                env.remove(target);
            }
            Stmt::Assign { target: target.clone(), value }
        }

        Stmt::ArrayAssign { target, index, value } => Stmt::ArrayAssign {
            target: target.clone(),
            index: substitute(index, env),
            value: substitute(value, env),
        },

        Stmt::Expr(expr) => Stmt::Expr(substitute(expr, env)),
        Stmt::Return(expr) => Stmt::Return(expr.as_ref().map(|e| substitute(e, env))),

        Stmt::If { cond, then_branch, else_branch } => {
            let cond = substitute(cond, env);

            let mut then_env = env.clone();
            let then_branch = propagate_stmt(then_branch, locals, &mut then_env);
            let mut else_env = env.clone();
            let else_branch = else_branch
                .as_ref()
                .map(|s| Box::new(propagate_stmt(s, locals, &mut else_env)));

            // keep only facts both paths agree on
            then_env.retain(|name, value| else_env.get(name) == Some(value));
            *env = then_env;

            Stmt::If {
                cond,
                then_branch: Box::new(then_branch),
                else_branch,
            }
        }

        Stmt::While { cond, body } => {
            let mut assigned = HashSet::new();
            assigned_names(body, &mut assigned);
            env.retain(|name, _| !assigned.contains(name));

            let cond = substitute(cond, env);
            let mut body_env = env.clone();
            let body = propagate_stmt(body, locals, &mut body_env);

            Stmt::While {
                cond,
                body: Box::new(body),
            }
        }
    }
}

fn assigned_names(stmt: &Stmt, out: &mut HashSet<String>) {
    match stmt {
        Stmt::Block(stmts) => stmts.iter().for_each(|s| assigned_names(s, out)),
        Stmt::Assign { target, .. } => {
            out.insert(target.clone());
        }
        Stmt::If { then_branch, else_branch, .. } => {
            assigned_names(then_branch, out);
            if let Some(else_branch) = else_branch {
                assigned_names(else_branch, out);
            }
        }
        Stmt::While { body, .. } => assigned_names(body, out),
        Stmt::ArrayAssign { .. } | Stmt::Expr(_) | Stmt::Return(_) => {}
    }
}

fn is_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::IntLit(_) | Expr::BoolLit(_))
}

fn substitute(expr: &Expr, env: &Constants) -> Expr {
    match expr {
        Expr::Var(name) => env.get(name).cloned().unwrap_or_else(|| expr.clone()),
        Expr::Binary { op, left, right } => Expr::binary(*op, substitute(left, env), substitute(right, env)),
        Expr::Not(operand) => Expr::Not(Box::new(substitute(operand, env))),
        Expr::Index { array, index } => Expr::Index {
            array: Box::new(substitute(array, env)),
            index: Box::new(substitute(index, env)),
        },
        Expr::Length(array) => Expr::Length(Box::new(substitute(array, env))),
        Expr::NewArray(size) => Expr::NewArray(Box::new(substitute(size, env))),
        Expr::ArrayInit(elements) => Expr::ArrayInit(elements.iter().map(|e| substitute(e, env)).collect()),
        Expr::Call { receiver, method, args } => Expr::Call {
            receiver: Box::new(substitute(receiver, env)),
            method: method.clone(),
            args: args.iter().map(|a| substitute(a, env)).collect(),
        },
        Expr::IntLit(_) | Expr::BoolLit(_) | Expr::This | Expr::NewObject(_) => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::BinaryOp;
    use crate::frontend::parser::parse;

    fn propagated(source: &str) -> Vec<Stmt> {
        let program = parse(source).unwrap();
        propagate_method(&program.class.methods[0])
    }

    #[test]
    fn test_straight_line_propagation() {
        let body = propagated("class A { int f(int p) { int a; a = 3; p = a + p; return a; } }");

        assert_eq!(
            body[1],
            Stmt::Assign {
                target: "p".to_string(),
                value: Expr::binary(BinaryOp::Add, Expr::IntLit(3), Expr::var("p")),
            }
        );
        assert_eq!(body[2], Stmt::Return(Some(Expr::IntLit(3))));
    }

    #[test]
    fn test_if_merges_conservatively() {
        let body = propagated(
            "class A {
                 int f(boolean c) {
                     int a; int b;
                     a = 1; b = 1;
                     if (c) { a = 2; } else { b = 1; }
                     return a + b;
                 }
             }",
        );

        assert_eq!(
            body[3],
            Stmt::Return(Some(Expr::binary(BinaryOp::Add, Expr::var("a"), Expr::IntLit(1))))
        );
    }

    #[test]
    fn test_loop_assignments_invalidate() {
        let body = propagated(
            "class A {
                 int f() {
                     int i; int n;
                     i = 0; n = 10;
                     while (i < n) { i = i + 1; }
                     return i;
                 }
             }",
        );

        assert_eq!(
            body[2],
            Stmt::While {
                cond: Expr::binary(BinaryOp::Lt, Expr::var("i"), Expr::IntLit(10)),
                body: Box::new(Stmt::Block(vec![Stmt::Assign {
                    target: "i".to_string(),
                    value: Expr::binary(BinaryOp::Add, Expr::var("i"), Expr::IntLit(1)),
                }])),
            }
        );
        assert_eq!(body[3], Stmt::Return(Some(Expr::var("i"))));
    }
}
