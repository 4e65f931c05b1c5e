use crate::frontend::ast::{BinaryOp, Expr, Stmt};

/// Folds operators whose operands are all literals. Arithmetic wraps like the JVM.
pub fn fold_expr(expr: &Expr) -> Expr {
    match expr {
        Expr::Binary { op, left, right } => {
            let left = fold_expr(left);
            let right = fold_expr(right);
            match (op, &left, &right) {
                (BinaryOp::Add, Expr::IntLit(a), Expr::IntLit(b)) => Expr::IntLit(a.wrapping_add(*b)),
                (BinaryOp::Sub, Expr::IntLit(a), Expr::IntLit(b)) => Expr::IntLit(a.wrapping_sub(*b)),
                (BinaryOp::Mul, Expr::IntLit(a), Expr::IntLit(b)) => Expr::IntLit(a.wrapping_mul(*b)),
                (BinaryOp::Div, Expr::IntLit(a), Expr::IntLit(b)) if *b != 0 => Expr::IntLit(a.wrapping_div(*b)),
                (BinaryOp::Lt, Expr::IntLit(a), Expr::IntLit(b)) => Expr::BoolLit(a < b),
                (BinaryOp::And, Expr::BoolLit(a), Expr::BoolLit(b)) => Expr::BoolLit(*a && *b),
                _ => Expr::binary(*op, left, right),
            }
        }

        Expr::Not(operand) => match fold_expr(operand) {
            Expr::BoolLit(value) => Expr::BoolLit(!value),
            other => Expr::Not(Box::new(other)),
        },

        Expr::Index { array, index } => Expr::Index {
            array: Box::new(fold_expr(array)),
            index: Box::new(fold_expr(index)),
        },
        Expr::Length(array) => Expr::Length(Box::new(fold_expr(array))),
        Expr::NewArray(size) => Expr::NewArray(Box::new(fold_expr(size))),
        Expr::ArrayInit(elements) => Expr::ArrayInit(elements.iter().map(fold_expr).collect()),
        Expr::Call { receiver, method, args } => Expr::Call {
            receiver: Box::new(fold_expr(receiver)),
            method: method.clone(),
            args: args.iter().map(fold_expr).collect(),
        },

        Expr::IntLit(_) | Expr::BoolLit(_) | Expr::This | Expr::Var(_) | Expr::NewObject(_) => expr.clone(),
    }
}

pub fn fold_stmt(stmt: &Stmt) -> Stmt {
    match stmt {
        Stmt::Block(stmts) => Stmt::Block(stmts.iter().map(fold_stmt).collect()),
        Stmt::If { cond, then_branch, else_branch } => Stmt::If {
            cond: fold_expr(cond),
            then_branch: Box::new(fold_stmt(then_branch)),
            else_branch: else_branch.as_ref().map(|s| Box::new(fold_stmt(s))),
        },
        Stmt::While { cond, body } => Stmt::While {
            cond: fold_expr(cond),
            body: Box::new(fold_stmt(body)),
        },
        Stmt::Expr(expr) => Stmt::Expr(fold_expr(expr)),
        Stmt::Assign { target, value } => Stmt::Assign {
            target: target.clone(),
            value: fold_expr(value),
        },
        Stmt::ArrayAssign { target, index, value } => Stmt::ArrayAssign {
            target: target.clone(),
            index: fold_expr(index),
            value: fold_expr(value),
        },
        Stmt::Return(expr) => Stmt::Return(expr.as_ref().map(fold_expr)),
    }
}
