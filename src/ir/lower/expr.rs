use crate::analysis::symbols::Resolved;
use crate::frontend::ast::{BinaryOp, Expr};
use crate::ir::{Call, CallKind, Callee, Instruction, Operand, Type, UnaryOp};

use super::call::lower_call;
use super::Context;

/// Lowers `expr` to an operand, emitting whatever instructions compute it.
/// Literals and plain variables emit nothing.
pub(super) fn lower_expression(ctx: &mut Context, expr: &Expr, expected: Option<&Type>) -> Operand {
    match lower_rvalue(ctx, expr, expected) {
        Instruction::Load(operand) if operand.is_simple() => operand,
        rvalue => {
            let fallback = expected.cloned().unwrap_or(Type::Int);
            ctx.assign_temp(rvalue, fallback)
        }
    }
}

/// Lowers `expr` to the final instruction producing its value, without storing it.
pub(super) fn lower_rvalue(ctx: &mut Context, expr: &Expr, expected: Option<&Type>) -> Instruction {
    match expr {
        Expr::IntLit(value) => Instruction::Load(Operand::int(*value)),
        Expr::BoolLit(value) => Instruction::Load(Operand::boolean(*value)),
        Expr::This => Instruction::Load(ctx.receiver()),

        Expr::Var(name) => match ctx.table.resolve(ctx.signature, name) {
            Some(Resolved::Field(ty)) => Instruction::GetField { field: name.clone(), ty },
            Some(resolved) => Instruction::Load(Operand::Variable {
                name: name.clone(),
                ty: resolved.ty().clone(),
            }),
            None => panic!("unresolved name '{}' in '{}'", name, ctx.signature.name),
        },

        Expr::Binary { op: BinaryOp::And, left, right } if !is_plain(ctx, right) => {
            lower_short_circuit(ctx, left, right)
        }

        Expr::Binary { op, left, right } => {
            let operand_type = op.operand_type();
            let left = lower_expression(ctx, left, Some(&operand_type));
            let right = lower_expression(ctx, right, Some(&operand_type));
            Instruction::BinaryOp { op: *op, left, right }
        }

        Expr::Not(operand) => {
            let operand = lower_expression(ctx, operand, Some(&Type::Boolean));
            Instruction::UnaryOp { op: UnaryOp::Not, operand }
        }

        Expr::Index { array, index } => {
            let base = lower_expression(ctx, array, Some(&Type::int_array()));
            let index = lower_expression(ctx, index, Some(&Type::Int));
            Instruction::Load(Operand::ArrayElement {
                base: Box::new(base),
                index: Box::new(index),
            })
        }

        Expr::ArrayInit(elements) => {
            let array = ctx.assign_temp(
                Instruction::Call(Call {
                    kind: CallKind::NewArray,
                    callee: Callee::None,
                    method: None,
                    args: vec![Operand::int(elements.len() as i32)],
                    return_type: Type::int_array(),
                }),
                Type::int_array(),
            );

            for (i, element) in elements.iter().enumerate() {
                let value = lower_rvalue(ctx, element, Some(&Type::Int));
                let dest = Operand::ArrayElement {
                    base: Box::new(array.clone()),
                    index: Box::new(Operand::int(i as i32)),
                };
                ctx.emit_instr(Instruction::assign(dest, value));
            }

            Instruction::Load(array)
        }

        Expr::Call { .. } | Expr::NewArray(_) | Expr::Length(_) | Expr::NewObject(_) => {
            lower_call(ctx, expr, expected)
        }
    }
}

/// Literals and locals can be evaluated eagerly without observable effects.
fn is_plain(ctx: &Context, expr: &Expr) -> bool {
    match expr {
        Expr::IntLit(_) | Expr::BoolLit(_) => true,
        Expr::Var(name) => matches!(
            ctx.table.resolve(ctx.signature, name),
            Some(Resolved::Local(_) | Resolved::Param(_))
        ),
        _ => false,
    }
}

/*
 *     if (left) goto and_true_N
 *     result := false
 *     goto and_end_N
 * and_true_N:
 *     result := right
 * and_end_N:
 */
fn lower_short_circuit(ctx: &mut Context, left: &Expr, right: &Expr) -> Instruction {
    let left = lower_expression(ctx, left, Some(&Type::Boolean));
    let id = ctx.new_label_id();
    let true_label = format!("and_true_{}", id);
    let end_label = format!("and_end_{}", id);
    let result = ctx.new_synthetic("and", id, Type::Boolean);

    ctx.emit_instr(Instruction::CondBranch {
        cond: left,
        label: true_label.clone(),
    });
    ctx.emit_instr(Instruction::assign(
        result.clone(),
        Instruction::Load(Operand::boolean(false)),
    ));
    ctx.emit_instr(Instruction::Goto(end_label.clone()));

    ctx.place_label(&true_label);
    let right = lower_rvalue(ctx, right, Some(&Type::Boolean));
    ctx.emit_instr(Instruction::assign(result.clone(), right));
    ctx.place_label(&end_label);

    Instruction::Load(result)
}
