use crate::analysis::symbols::{MethodSignature, SymbolTable};
use crate::analysis::types::expr_type;
use crate::frontend::ast::Expr;
use crate::ir::{Call, CallKind, Callee, Instruction, Type};

use super::expr::lower_expression;
use super::Context;

pub(super) fn lower_call(ctx: &mut Context, expr: &Expr, expected: Option<&Type>) -> Instruction {
    match expr {
        Expr::NewArray(size) => {
            let size = lower_expression(ctx, size, Some(&Type::Int));
            Instruction::Call(Call {
                kind: CallKind::NewArray,
                callee: Callee::None,
                method: None,
                args: vec![size],
                return_type: Type::int_array(),
            })
        }

        Expr::Length(array) => {
            let array = lower_expression(ctx, array, Some(&Type::int_array()));
            Instruction::Call(Call {
                kind: CallKind::ArrayLength,
                callee: Callee::Object(array),
                method: None,
                args: vec![],
                return_type: Type::Int,
            })
        }

        Expr::NewObject(class) => {
            let ty = Type::Class(class.clone());
            let object = ctx.assign_temp(
                Instruction::Call(Call {
                    kind: CallKind::New,
                    callee: Callee::Class(class.clone()),
                    method: None,
                    args: vec![],
                    return_type: ty.clone(),
                }),
                ty,
            );
            ctx.emit_instr(Instruction::Call(Call {
                kind: CallKind::Special,
                callee: Callee::Object(object.clone()),
                method: Some("<init>".to_string()),
                args: vec![],
                return_type: Type::Void,
            }));
            Instruction::Load(object)
        }

        Expr::Call { receiver, method, args } => lower_invocation(ctx, receiver, method, args, expected),

        _ => unreachable!("not a call expression: {:?}", expr),
    }
}

fn lower_invocation(
    ctx: &mut Context,
    receiver: &Expr,
    method: &str,
    args: &[Expr],
    expected: Option<&Type>,
) -> Instruction {
    let table = ctx.table;
    let caller = ctx.signature;

    let (kind, callee, receiver_type) = match receiver {
        Expr::Var(name) if table.resolve(caller, name).is_none() && table.is_imported(name) => {
            (CallKind::Static, Callee::Class(name.clone()), None)
        }
        _ => {
            let object = lower_expression(ctx, receiver, None);
            let ty = object.ty();
            (CallKind::Virtual, Callee::Object(object), Some(ty))
        }
    };

    let signature = receiver_type
        .filter(|ty| table.is_current_class(ty))
        .and_then(|_| table.method(method));

    let args = match signature {
        Some(callee_signature) => pack_varargs(table, caller, callee_signature, args),
        None => args.to_vec(),
    };

    let args = args
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            let param_type = signature.and_then(|s| s.params.get(i)).map(|p| p.ty.clone());
            lower_expression(ctx, arg, param_type.as_ref())
        })
        .collect();

    let return_type = match signature {
        Some(s) => s.return_type.clone(),
        None => expected.cloned().unwrap_or(Type::Int),
    };

    Instruction::Call(Call {
        kind,
        callee,
        method: Some(method.to_string()),
        args,
        return_type,
    })
}

/// Packs the trailing arguments of a vararg call into one array initializer.
///
/// A call that already passes a single array in the vararg position is left alone.
pub(super) fn pack_varargs(
    table: &SymbolTable,
    caller: &MethodSignature,
    callee: &MethodSignature,
    args: &[Expr],
) -> Vec<Expr> {
    if !callee.is_vararg {
        return args.to_vec();
    }

    let fixed = callee.fixed_arity();
    if args.len() == fixed + 1 {
        let passes_array = expr_type(table, caller, &args[fixed]).is_some_and(|ty| ty.is_array());
        if passes_array {
            return args.to_vec();
        }
    }

    let mut packed: Vec<Expr> = args.iter().take(fixed).cloned().collect();
    packed.push(Expr::ArrayInit(args.iter().skip(fixed).cloned().collect()));
    packed
}
