use crate::analysis::symbols::Resolved;
use crate::frontend::ast::{Expr, Stmt};
use crate::ir::{Instruction, Operand, Type};

use super::expr::{lower_expression, lower_rvalue};
use super::Context;

pub(super) fn lower_statement(ctx: &mut Context, stmt: &Stmt) {
    match stmt {
        Stmt::Block(stmts) => {
            for s in stmts {
                lower_statement(ctx, s);
            }
        }

        Stmt::Expr(expr) => {
            match lower_rvalue(ctx, expr, Some(&Type::Void)) {
                Instruction::Load(_) => {}
                call @ Instruction::Call(_) => ctx.emit_instr(call),
                rvalue => {
                    ctx.assign_temp(rvalue, Type::Int);
                }
            }
        }

        Stmt::Assign { target, value } => match ctx.table.resolve(ctx.signature, target) {
            Some(Resolved::Field(ty)) => {
                let value = lower_expression(ctx, value, Some(&ty));
                ctx.emit_instr(Instruction::PutField {
                    field: target.clone(),
                    ty,
                    value,
                });
            }
            Some(resolved) => {
                let ty = resolved.ty().clone();
                let rhs = lower_rvalue(ctx, value, Some(&ty));
                ctx.emit_instr(Instruction::assign(Operand::Variable { name: target.clone(), ty }, rhs));
            }
            None => panic!("assignment to unresolved name '{}'", target),
        },

        Stmt::ArrayAssign { target, index, value } => {
            let base = lower_expression(ctx, &Expr::Var(target.clone()), None);
            let index = lower_expression(ctx, index, Some(&Type::Int));
            let elem = match base.ty() {
                Type::Array(elem) => *elem,
                _ => Type::Int,
            };
            let rhs = lower_rvalue(ctx, value, Some(&elem));
            let dest = Operand::ArrayElement {
                base: Box::new(base),
                index: Box::new(index),
            };
            ctx.emit_instr(Instruction::assign(dest, rhs));
        }

        Stmt::If { cond, then_branch, else_branch } => {
            let cond = lower_expression(ctx, cond, Some(&Type::Boolean));
            let id = ctx.new_label_id();
            let then_label = format!("if_then_{}", id);
            let end_label = format!("if_end_{}", id);

            ctx.emit_instr(Instruction::CondBranch {
                cond,
                label: then_label.clone(),
            });
            if let Some(else_branch) = else_branch {
                lower_statement(ctx, else_branch);
            }
            ctx.emit_jump(end_label.clone());

            ctx.place_label(&then_label);
            lower_statement(ctx, then_branch);
            ctx.place_label(&end_label);
        }

        Stmt::While { cond, body } => {
            let id = ctx.new_label_id();
            let cond_label = format!("while_cond_{}", id);
            let body_label = format!("while_body_{}", id);
            let end_label = format!("while_end_{}", id);

            ctx.place_label(&cond_label);
            let cond = lower_expression(ctx, cond, Some(&Type::Boolean));
            ctx.emit_instr(Instruction::CondBranch {
                cond,
                label: body_label.clone(),
            });
            ctx.emit_jump(end_label.clone());

            ctx.place_label(&body_label);
            lower_statement(ctx, body);
            ctx.emit_jump(cond_label);
            ctx.place_label(&end_label);
        }

        Stmt::Return(None) => ctx.emit_instr(Instruction::Return(None)),

        Stmt::Return(Some(expr)) => {
            let return_type = ctx.signature.return_type.clone();
            let value = lower_expression(ctx, expr, Some(&return_type));
            ctx.emit_instr(Instruction::Return(Some(value)));
        }
    }
}
