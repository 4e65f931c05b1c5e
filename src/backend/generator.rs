use std::collections::HashSet;
use std::fmt::Write;

use tracing::debug;

use crate::backend::descriptor::{class_path, method_descriptor, type_descriptor};
use crate::ir::{
    BinaryOp, Call, CallKind, Callee, ClassUnit, Instruction, Method, Operand, Type, UnaryOp, RECEIVER,
};

/// Running and maximum operand-stack depth of the method being emitted.
#[derive(Debug, Default)]
struct StackTracker {
    depth: usize,
    max: usize,
}

impl StackTracker {
    fn push(&mut self, n: usize) {
        self.depth += n;
        self.max = self.max.max(self.depth);
    }

    fn pop(&mut self, n: usize) {
        assert!(self.depth >= n, "operand stack underflow: popping {} at depth {}", n, self.depth);
        self.depth -= n;
    }
}

pub fn generate(unit: &ClassUnit) -> Result<String, std::fmt::Error> {
    let mut output = String::new();
    let superclass = unit
        .superclass
        .as_deref()
        .map(|name| class_path(name, &unit.imports))
        .unwrap_or_else(|| "java/lang/Object".to_string());

    /*
     * .class public A
     * .super java/lang/Object
     */
    writeln!(output, ".class public {}", unit.name)?;
    writeln!(output, ".super {}", superclass)?;
    for (name, ty) in &unit.fields {
        writeln!(output, ".field public {} {}", name, type_descriptor(ty, &unit.imports))?;
    }

    writeln!(output)?;
    writeln!(output, ".method public <init>()V")?;
    writeln!(output, "    aload_0")?;
    writeln!(output, "    invokespecial {}/<init>()V", superclass)?;
    writeln!(output, "    return")?;
    writeln!(output, ".end method")?;

    // Comparison labels are unique across the whole class.
    let mut next_label = 0;
    for method in &unit.methods {
        let mut emitter = MethodEmitter {
            unit,
            method,
            body: String::new(),
            stack: StackTracker::default(),
            next_label: &mut next_label,
        };
        emitter.emit_body()?;
        let MethodEmitter { body, stack, .. } = emitter;

        writeln!(output)?;
        write_header(&mut output, unit, method)?;
        writeln!(output, "    .limit stack {}", stack.max)?;
        writeln!(output, "    .limit locals {}", locals_limit(method))?;
        output.push_str(&body);
        writeln!(output, ".end method")?;

        debug!("Emitted '{}' (stack {}, locals {})", method.name, stack.max, locals_limit(method));
    }

    Ok(output)
}

fn write_header(output: &mut String, unit: &ClassUnit, method: &Method) -> std::fmt::Result {
    write!(output, ".method ")?;
    if method.is_public {
        write!(output, "public ")?;
    }
    if method.is_static {
        write!(output, "static ")?;
    }
    let descriptor = method_descriptor(
        method.params.iter().map(|(_, ty)| ty),
        &method.return_type,
        &unit.imports,
    );
    writeln!(output, "{}{}", method.name, descriptor)
}

/// Distinct register slots in use, plus the receiver slot for instance methods.
pub fn locals_limit(method: &Method) -> usize {
    let registers: HashSet<usize> = method.vars.iter().map(|v| v.register).collect();
    let highest = registers.iter().max().map_or(0, |r| r + 1);
    (registers.len() + method.receiver_slots()).max(highest)
}

/// Opcode prefix for loads and stores on elements of `array`.
fn array_prefix(array: &Operand) -> &'static str {
    match array.ty() {
        Type::Array(element) => match *element {
            Type::Int => "i",
            Type::Boolean => "b",
            _ => "a",
        },
        _ => "i",
    }
}

struct MethodEmitter<'a> {
    unit: &'a ClassUnit,
    method: &'a Method,
    body: String,
    stack: StackTracker,
    next_label: &'a mut usize,
}

impl MethodEmitter<'_> {
    fn emit_body(&mut self) -> std::fmt::Result {
        let method = self.method;
        for (i, instr) in method.instructions.iter().enumerate() {
            for label in method.labels_at(i) {
                writeln!(self.body, "{}:", label)?;
            }
            self.emit_instruction(instr)?;
        }
        for label in method.labels_at(method.instructions.len()) {
            writeln!(self.body, "{}:", label)?;
        }
        Ok(())
    }

    fn line(&mut self, text: &str) -> std::fmt::Result {
        writeln!(self.body, "    {}", text)
    }

    fn fresh_label_id(&mut self) -> usize {
        let id = *self.next_label;
        *self.next_label += 1;
        id
    }

    fn register(&self, operand: &Operand) -> usize {
        let Some(name) = operand.slot_name() else {
            panic!("operand {} has no register", operand);
        };
        if name == RECEIVER {
            return 0;
        }
        match self.method.vars.register(&name) {
            Some(register) => register,
            None => panic!("'{}' missing from the variable table of '{}'", name, self.method.name),
        }
    }

    fn emit_instruction(&mut self, instr: &Instruction) -> std::fmt::Result {
        match instr {
            Instruction::Assign { dest, rhs } => self.emit_assign(dest, rhs),

            Instruction::Call(call) => {
                self.emit_call(call)?;
                if call.return_type != Type::Void && call.kind != CallKind::Special {
                    self.line("pop")?;
                    self.stack.pop(1);
                }
                Ok(())
            }

            Instruction::PutField { field, ty, value } => {
                self.line("aload_0")?;
                self.stack.push(1);
                self.load(value)?;
                let owner = self.unit.name.clone();
                let descriptor = type_descriptor(ty, &self.unit.imports);
                writeln!(self.body, "    putfield {}/{} {}", owner, field, descriptor)?;
                self.stack.pop(2);
                Ok(())
            }

            Instruction::Goto(label) => writeln!(self.body, "    goto {}", label),

            Instruction::CondBranch { cond, label } => {
                self.load(cond)?;
                writeln!(self.body, "    ifne {}", label)?;
                self.stack.pop(1);
                Ok(())
            }

            Instruction::Return(Some(value)) => {
                self.load(value)?;
                let op = if self.method.return_type.is_primitive() { "ireturn" } else { "areturn" };
                self.line(op)?;
                self.stack.pop(1);
                Ok(())
            }

            Instruction::Return(None) => self.line("return"),

            other => panic!("instruction '{}' cannot stand alone", other),
        }
    }

    fn emit_assign(&mut self, dest: &Operand, rhs: &Instruction) -> std::fmt::Result {
        match dest {
            Operand::ArrayElement { base, index } => {
                self.load(base)?;
                self.load(index)?;
                self.emit_rvalue(rhs)?;
                writeln!(self.body, "    {}astore", array_prefix(base))?;
                self.stack.pop(3);
                Ok(())
            }

            Operand::Variable { .. } | Operand::Temporary { .. } => {
                if let Some(increment) = self.increment(dest, rhs) {
                    let register = self.register(dest);
                    return writeln!(self.body, "    iinc {} {}", register, increment);
                }
                self.emit_rvalue(rhs)?;
                self.store(dest)
            }

            Operand::Literal { .. } => panic!("cannot assign to literal {}", dest),
        }
    }

    /// `d := d + k`, `d := k + d` and `d := d - k` with `k` in signed-byte range.
    fn increment(&self, dest: &Operand, rhs: &Instruction) -> Option<i32> {
        let Instruction::BinaryOp { op, left, right } = rhs else {
            return None;
        };
        let (variable, constant) = match (op, left, right) {
            (BinaryOp::Add, var, Operand::Literal { value, .. }) => (var, *value),
            (BinaryOp::Add, Operand::Literal { value, .. }, var) => (var, *value),
            (BinaryOp::Sub, var, Operand::Literal { value, .. }) => (var, value.checked_neg()?),
            _ => return None,
        };
        if !matches!(variable, Operand::Variable { .. } | Operand::Temporary { .. }) {
            return None;
        }
        if variable.slot_name().as_deref() == Some(RECEIVER) || dest.ty() != Type::Int {
            return None;
        }
        let fits = i8::try_from(constant).is_ok();
        (fits && self.register(variable) == self.register(dest)).then_some(constant)
    }

    /// Pushes exactly one value.
    fn emit_rvalue(&mut self, rhs: &Instruction) -> std::fmt::Result {
        match rhs {
            Instruction::Load(operand) => self.load(operand),

            Instruction::BinaryOp { op, left, right } => self.emit_binary(*op, left, right),

            Instruction::UnaryOp { op: UnaryOp::Not, operand } => {
                self.load(operand)?;
                let id = self.fresh_label_id();
                writeln!(self.body, "    ifeq not_{}_true", id)?;
                self.stack.pop(1);
                self.emit_boolean_diamond(&format!("not_{}_true", id), &format!("not_{}_end", id), 0)
            }

            Instruction::GetField { field, ty } => {
                self.line("aload_0")?;
                self.stack.push(1);
                let owner = self.unit.name.clone();
                let descriptor = type_descriptor(ty, &self.unit.imports);
                writeln!(self.body, "    getfield {}/{} {}", owner, field, descriptor)
            }

            Instruction::Call(call) => self.emit_call(call),

            other => panic!("'{}' does not produce a value", other),
        }
    }

    fn emit_binary(&mut self, op: BinaryOp, left: &Operand, right: &Operand) -> std::fmt::Result {
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                self.load(left)?;
                self.load(right)?;
                let mnemonic = match op {
                    BinaryOp::Add => "iadd",
                    BinaryOp::Sub => "isub",
                    BinaryOp::Mul => "imul",
                    _ => "idiv",
                };
                self.line(mnemonic)?;
                self.stack.pop(1);
                Ok(())
            }

            BinaryOp::Lt => {
                self.load(left)?;
                self.load(right)?;
                self.line("isub")?;
                self.stack.pop(1);
                let id = self.fresh_label_id();
                writeln!(self.body, "    iflt cmp_{}_true", id)?;
                self.stack.pop(1);
                self.emit_boolean_diamond(&format!("cmp_{}_true", id), &format!("cmp_{}_end", id), 0)
            }

            BinaryOp::And => {
                let id = self.fresh_label_id();
                let false_label = format!("and_{}_false", id);
                self.load(left)?;
                writeln!(self.body, "    ifeq {}", false_label)?;
                self.stack.pop(1);
                self.load(right)?;
                writeln!(self.body, "    ifeq {}", false_label)?;
                self.stack.pop(1);
                self.emit_boolean_diamond(&false_label, &format!("and_{}_end", id), 1)
            }
        }
    }

    /*
     *     iconst_<fallthrough>
     *     goto end
     * jump_target:
     *     iconst_<1 - fallthrough>
     * end:
     */
    fn emit_boolean_diamond(&mut self, jump_target: &str, end: &str, fallthrough: i32) -> std::fmt::Result {
        self.push_int(fallthrough)?;
        writeln!(self.body, "    goto {}", end)?;
        self.stack.pop(1);
        writeln!(self.body, "{}:", jump_target)?;
        self.push_int(1 - fallthrough)?;
        writeln!(self.body, "{}:", end)
    }

    fn emit_call(&mut self, call: &Call) -> std::fmt::Result {
        let unit = self.unit;
        let imports = &unit.imports;
        match call.kind {
            CallKind::New => {
                let Callee::Class(class) = &call.callee else {
                    panic!("allocation without a class");
                };
                writeln!(self.body, "    new {}", class_path(class, imports))?;
                self.line("dup")?;
                self.stack.push(2);
                Ok(())
            }

            CallKind::NewArray => {
                for arg in &call.args {
                    self.load(arg)?;
                }
                self.line("newarray int")?;
                self.stack.pop(call.args.len());
                self.stack.push(1);
                Ok(())
            }

            CallKind::ArrayLength => {
                let Callee::Object(array) = &call.callee else {
                    panic!("arraylength without an array");
                };
                self.load(array)?;
                self.line("arraylength")
            }

            CallKind::Special => {
                let Callee::Object(object) = &call.callee else {
                    panic!("invokespecial without an object");
                };
                self.load(object)?;
                let owner = self.owner_of(object);
                writeln!(self.body, "    invokespecial {}/<init>()V", owner)?;
                self.stack.pop(1);
                // the duplicate left by `new`
                self.line("pop")?;
                self.stack.pop(1);
                Ok(())
            }

            CallKind::Virtual | CallKind::Static => {
                let method = call.method.as_deref().unwrap_or_default();
                let owner = match &call.callee {
                    Callee::Object(object) => {
                        self.load(object)?;
                        self.owner_of(object)
                    }
                    Callee::Class(class) => class_path(class, imports),
                    Callee::None => panic!("invocation of '{}' without a callee", method),
                };
                for arg in &call.args {
                    self.load(arg)?;
                }

                let descriptor = self.call_descriptor(call, &owner, method);
                let mnemonic = if call.kind == CallKind::Static { "invokestatic" } else { "invokevirtual" };
                writeln!(self.body, "    {} {}/{}{}", mnemonic, owner, method, descriptor)?;

                let receiver = usize::from(call.kind == CallKind::Virtual);
                self.stack.pop(receiver + call.args.len());
                if call.return_type != Type::Void {
                    self.stack.push(1);
                }
                Ok(())
            }
        }
    }

    fn owner_of(&self, object: &Operand) -> String {
        match object.ty() {
            Type::Class(name) => class_path(&name, &self.unit.imports),
            _ => self.unit.name.clone(),
        }
    }

    /// Declared signature for methods of this class, else argument and return types.
    fn call_descriptor(&self, call: &Call, owner: &str, method: &str) -> String {
        let imports = &self.unit.imports;
        if owner == self.unit.name {
            if let Some(target) = self.unit.methods.iter().find(|m| m.name == method) {
                return method_descriptor(target.params.iter().map(|(_, ty)| ty), &target.return_type, imports);
            }
        }
        let arg_types: Vec<Type> = call.args.iter().map(Operand::ty).collect();
        method_descriptor(arg_types.iter(), &call.return_type, imports)
    }

    fn load(&mut self, operand: &Operand) -> std::fmt::Result {
        match operand {
            Operand::Literal { value, .. } => self.push_int(*value),

            Operand::ArrayElement { base, index } => {
                self.load(base)?;
                self.load(index)?;
                writeln!(self.body, "    {}aload", array_prefix(base))?;
                self.stack.pop(1);
                Ok(())
            }

            Operand::Variable { .. } | Operand::Temporary { .. } => {
                let prefix = if operand.ty().is_primitive() { "i" } else { "a" };
                let register = self.register(operand);
                self.stack.push(1);
                if register < 4 {
                    writeln!(self.body, "    {}load_{}", prefix, register)
                } else {
                    writeln!(self.body, "    {}load {}", prefix, register)
                }
            }
        }
    }

    fn store(&mut self, operand: &Operand) -> std::fmt::Result {
        let prefix = if operand.ty().is_primitive() { "i" } else { "a" };
        let register = self.register(operand);
        self.stack.pop(1);
        if register < 4 {
            writeln!(self.body, "    {}store_{}", prefix, register)
        } else {
            writeln!(self.body, "    {}store {}", prefix, register)
        }
    }

    fn push_int(&mut self, value: i32) -> std::fmt::Result {
        self.stack.push(1);
        match value {
            -1 => self.line("iconst_m1"),
            0..=5 => writeln!(self.body, "    iconst_{}", value),
            -128..=127 => writeln!(self.body, "    bipush {}", value),
            -32768..=32767 => writeln!(self.body, "    sipush {}", value),
            _ => writeln!(self.body, "    ldc {}", value),
        }
    }
}
