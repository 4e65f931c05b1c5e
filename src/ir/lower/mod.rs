mod call;
mod expr;
mod stmt;

use std::collections::BTreeMap;

use tracing::debug;

use crate::analysis::symbols::{MethodSignature, SymbolTable};
use crate::frontend::ast;
use crate::ir::{ClassUnit, Instruction, Method, Operand, Type, VarKind, VarTable};


/// Temporary and label ids handed out while lowering one method.
#[derive(Debug, Default)]
pub struct Counters {
    next_temp: usize,
    next_label: usize,
}

impl Counters {
    pub fn temp(&mut self) -> usize {
        let id = self.next_temp;
        self.next_temp += 1;
        id
    }

    pub fn label(&mut self) -> usize {
        let id = self.next_label;
        self.next_label += 1;
        id
    }
}

struct Context<'a> {
    table: &'a SymbolTable,
    signature: &'a MethodSignature,
    instructions: Vec<Instruction>,
    labels: BTreeMap<String, usize>,
    vars: VarTable,
    counters: Counters,
    first_slot: usize,
}

impl<'a> Context<'a> {
    fn new(table: &'a SymbolTable, signature: &'a MethodSignature) -> Self {
        let first_slot = if signature.is_static { 0 } else { 1 };
        let mut vars = VarTable::new();
        for param in &signature.params {
            vars.declare(&param.name, param.ty.clone(), VarKind::Param, first_slot);
        }
        for local in &signature.locals {
            vars.declare(&local.name, local.ty.clone(), VarKind::Local, first_slot);
        }

        Self {
            table,
            signature,
            instructions: Vec::new(),
            labels: BTreeMap::new(),
            vars,
            counters: Counters::default(),
            first_slot,
        }
    }

    fn emit_instr(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    /// Emits `goto`, unless the previous instruction already leaves and nothing jumps here.
    fn emit_jump(&mut self, label: String) {
        let here = self.instructions.len();
        let unreachable = matches!(
            self.instructions.last(),
            Some(Instruction::Return(_) | Instruction::Goto(_))
        ) && !self.labels.values().any(|&at| at == here);

        if !unreachable {
            self.emit_instr(Instruction::Goto(label));
        }
    }

    fn place_label(&mut self, label: &str) {
        self.labels.insert(label.to_string(), self.instructions.len());
    }

    fn new_label_id(&mut self) -> usize {
        self.counters.label()
    }

    fn new_temp(&mut self, ty: Type) -> Operand {
        let id = self.counters.temp();
        let operand = Operand::Temporary { id, ty: ty.clone() };
        if let Some(name) = operand.slot_name() {
            self.vars.declare(&name, ty, VarKind::Synthetic, self.first_slot);
        }
        operand
    }

    /// A compiler-introduced variable that may be assigned on more than one path.
    fn new_synthetic(&mut self, prefix: &str, id: usize, ty: Type) -> Operand {
        let name = format!("${}{}", prefix, id);
        self.vars.declare(&name, ty.clone(), VarKind::Synthetic, self.first_slot);
        Operand::Variable { name, ty }
    }

    fn assign_temp(&mut self, rvalue: Instruction, fallback: Type) -> Operand {
        let ty = match rvalue.result_type() {
            Type::Void => fallback,
            ty => ty,
        };
        let temp = self.new_temp(ty);
        self.emit_instr(Instruction::assign(temp.clone(), rvalue));
        temp
    }

    fn receiver(&self) -> Operand {
        Operand::receiver(&self.table.class_name)
    }
}

pub fn lower(program: &ast::Program, table: &SymbolTable) -> ClassUnit {
    let methods = program
        .class
        .methods
        .iter()
        .filter_map(|decl| {
            let signature = table.methods.iter().find(|m| m.name == decl.name)?;
            Some(lower_method(decl, signature, table))
        })
        .collect();

    ClassUnit {
        name: table.class_name.clone(),
        superclass: table.superclass.clone(),
        imports: table.imports.clone(),
        fields: table.fields.iter().map(|f| (f.name.clone(), f.ty.clone())).collect(),
        methods,
    }
}

fn lower_method(decl: &ast::MethodDecl, signature: &MethodSignature, table: &SymbolTable) -> Method {
    let mut ctx = Context::new(table, signature);

    for stmt in &decl.body {
        stmt::lower_statement(&mut ctx, stmt);
    }

    if decl.return_type == Type::Void {
        let end = ctx.instructions.len();
        let ends_in_return = matches!(ctx.instructions.last(), Some(Instruction::Return(_)));
        if !ends_in_return || ctx.labels.values().any(|&at| at == end) {
            ctx.emit_instr(Instruction::Return(None));
        }
    }

    debug!(
        "Lowered '{}': {} instruction(s), {} variable(s)",
        decl.name,
        ctx.instructions.len(),
        ctx.vars.len()
    );

    Method {
        name: decl.name.clone(),
        is_public: decl.is_public,
        is_static: decl.is_static,
        params: decl.params.iter().map(|p| (p.name.clone(), p.ty.clone())).collect(),
        return_type: decl.return_type.clone(),
        instructions: ctx.instructions,
        labels: ctx.labels,
        vars: ctx.vars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse;
    use crate::ir::{BinaryOp, CallKind, Callee};

    fn lower_source(source: &str) -> ClassUnit {
        let program = parse(source).unwrap();
        let table = SymbolTable::build(&program);
        lower(&program, &table)
    }

    fn method<'a>(unit: &'a ClassUnit, name: &str) -> &'a Method {
        unit.methods.iter().find(|m| m.name == name).unwrap()
    }

    #[test]
    fn test_assignment_writes_directly_into_target() {
        let unit = lower_source("class A { int f(int a) { int b; b = a + 1; return b; } }");
        let f = method(&unit, "f");

        assert_eq!(
            f.instructions,
            vec![
                Instruction::assign(
                    Operand::variable("b", Type::Int),
                    Instruction::BinaryOp {
                        op: BinaryOp::Add,
                        left: Operand::variable("a", Type::Int),
                        right: Operand::int(1),
                    },
                ),
                Instruction::Return(Some(Operand::variable("b", Type::Int))),
            ]
        );
        assert_eq!(f.vars.len(), 2);
        assert_eq!(f.vars.register("a"), Some(1));
        assert_eq!(f.vars.register("b"), Some(2));
    }

    #[test]
    fn test_nested_expression_uses_temporaries() {
        let unit = lower_source("class A { int f(int a) { return (a + 1) * 2; } }");
        let f = method(&unit, "f");

        assert_eq!(f.instructions.len(), 3);
        assert_eq!(f.vars.get("$t0").map(|v| v.kind), Some(VarKind::Synthetic));
        assert_eq!(f.vars.register("$t1"), Some(3));
        assert_eq!(
            f.instructions[2],
            Instruction::Return(Some(Operand::Temporary { id: 1, ty: Type::Int }))
        );
    }

    #[test]
    fn test_fields_use_get_and_put() {
        let unit = lower_source("class A { int x; int f() { x = x + 1; return x; } }");
        let f = method(&unit, "f");

        assert!(matches!(
            &f.instructions[0],
            Instruction::Assign { rhs, .. } if matches!(**rhs, Instruction::GetField { .. })
        ));
        assert!(matches!(&f.instructions[2], Instruction::PutField { field, .. } if field == "x"));
    }

    #[test]
    fn test_void_method_gets_explicit_return() {
        let unit = lower_source(
            "class A { void f(boolean c) { if (c) { return; } else { } } void g() { } }",
        );

        let f = method(&unit, "f");
        assert_eq!(f.instructions.last(), Some(&Instruction::Return(None)));
        let end = f.instructions.len() - 1;
        assert_eq!(f.label_target("if_end_0"), Some(end));

        let g = method(&unit, "g");
        assert_eq!(g.instructions, vec![Instruction::Return(None)]);
    }

    #[test]
    fn test_while_labels() {
        let unit = lower_source(
            "class A { int f(int n) { int i; i = 0; while (i < n) { i = i + 1; } return i; } }",
        );
        let f = method(&unit, "f");

        let names: Vec<&str> = f.labels.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["while_body_0", "while_cond_0", "while_end_0"]);
        assert_eq!(f.label_target("while_cond_0"), Some(1));
        assert!(matches!(
            f.instructions.iter().rev().nth(1),
            Some(Instruction::Goto(label)) if label == "while_cond_0"
        ));
    }

    #[test]
    fn test_short_circuit_diamond_for_calls() {
        let unit = lower_source(
            "class A {
                 boolean g() { return true; }
                 boolean f(boolean a) { boolean r; r = a && this.g(); return r; }
             }",
        );
        let f = method(&unit, "f");

        assert!(f.vars.get("$and0").is_some());
        assert_eq!(f.label_target("and_true_0"), Some(3));
        assert!(matches!(
            &f.instructions[0],
            Instruction::CondBranch { label, .. } if label == "and_true_0"
        ));
        assert!(f.instructions.iter().any(|i| matches!(
            i,
            Instruction::Assign { rhs, .. } if matches!(**rhs, Instruction::Call(_))
        )));
    }

    #[test]
    fn test_eager_and_for_plain_operands() {
        let unit = lower_source("class A { boolean f(boolean a, boolean b) { return a && b; } }");
        let f = method(&unit, "f");

        assert!(f.labels.is_empty());
        assert!(matches!(
            &f.instructions[0],
            Instruction::Assign { rhs, .. }
                if matches!(**rhs, Instruction::BinaryOp { op: BinaryOp::And, .. })
        ));
    }

    #[test]
    fn test_call_dispatch() {
        let unit = lower_source(
            "import io;
             class A {
                 int g() { return 1; }
                 public static void main(String[] args) {
                     int x;
                     io.println(new A().g());
                     x = io.read();
                 }
             }",
        );
        let main = method(&unit, "main");

        let calls: Vec<&crate::ir::Call> = main
            .instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::Call(call) => Some(call),
                Instruction::Assign { rhs, .. } => match rhs.as_ref() {
                    Instruction::Call(call) => Some(call),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        let kinds: Vec<CallKind> = calls.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CallKind::New,
                CallKind::Special,
                CallKind::Virtual,
                CallKind::Static,
                CallKind::Static
            ]
        );
        assert_eq!(calls[3].callee, Callee::Class("io".to_string()));
        assert_eq!(calls[3].return_type, Type::Void);
        assert_eq!(calls[4].return_type, Type::Int);
    }

    #[test]
    fn test_array_initializer() {
        let unit = lower_source("class A { int[] f() { return [1, 2]; } }");
        let f = method(&unit, "f");

        assert!(matches!(
            &f.instructions[0],
            Instruction::Assign { rhs, .. }
                if matches!(rhs.as_ref(), Instruction::Call(c) if c.kind == CallKind::NewArray)
        ));
        assert!(matches!(
            &f.instructions[2],
            Instruction::Assign { dest: Operand::ArrayElement { index, .. }, .. }
                if **index == Operand::int(1)
        ));
        assert_eq!(f.instructions.len(), 4);
    }

    #[test]
    fn test_counters_reset_per_method() {
        let unit = lower_source(
            "class A {
                 int f(int a) { return a * 2 + 1; }
                 int g(int a) { return a * 3 + 1; }
             }",
        );
        assert!(method(&unit, "f").vars.get("$t0").is_some());
        assert!(method(&unit, "g").vars.get("$t0").is_some());
    }
}
