pub mod cfg;
pub mod lower;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub use crate::frontend::ast::{BinaryOp, Type};

pub const RECEIVER: &str = "this";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal { value: i32, ty: Type },
    Variable { name: String, ty: Type },
    Temporary { id: usize, ty: Type },
    ArrayElement { base: Box<Operand>, index: Box<Operand> },
}

impl Operand {
    pub fn int(value: i32) -> Self {
        Operand::Literal { value, ty: Type::Int }
    }

    pub fn boolean(value: bool) -> Self {
        Operand::Literal { value: value as i32, ty: Type::Boolean }
    }

    pub fn variable(name: &str, ty: Type) -> Self {
        Operand::Variable { name: name.to_string(), ty }
    }

    pub fn receiver(class_name: &str) -> Self {
        Operand::variable(RECEIVER, Type::Class(class_name.to_string()))
    }

    pub fn ty(&self) -> Type {
        match self {
            Operand::Literal { ty, .. }
            | Operand::Variable { ty, .. }
            | Operand::Temporary { ty, .. } => ty.clone(),
            Operand::ArrayElement { base, .. } => match base.ty() {
                Type::Array(elem) => *elem,
                _ => Type::Int,
            },
        }
    }

    /// Name of the storage slot behind a variable or temporary.
    pub fn slot_name(&self) -> Option<String> {
        match self {
            Operand::Variable { name, .. } => Some(name.clone()),
            Operand::Temporary { id, .. } => Some(temp_name(*id)),
            _ => None,
        }
    }

    /// Literals, variables and temporaries can be pushed with a single instruction.
    pub fn is_simple(&self) -> bool {
        !matches!(self, Operand::ArrayElement { .. })
    }
}

pub fn temp_name(id: usize) -> String {
    format!("$t{}", id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Virtual,
    Static,
    Special,
    New,
    NewArray,
    ArrayLength,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// An object reference (receiver of virtual/special calls, array of `length`).
    Object(Operand),
    /// A class name (static owner, or the class being allocated).
    Class(String),
    /// No callee (`new int[n]`).
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub callee: Callee,
    pub method: Option<String>,
    pub args: Vec<Operand>,
    pub return_type: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Assign { dest: Operand, rhs: Box<Instruction> },
    BinaryOp { op: BinaryOp, left: Operand, right: Operand },
    UnaryOp { op: UnaryOp, operand: Operand },
    Load(Operand),
    Call(Call),
    GetField { field: String, ty: Type },
    PutField { field: String, ty: Type, value: Operand },
    Goto(String),
    /// Jumps to `label` when `cond` is true.
    CondBranch { cond: Operand, label: String },
    Return(Option<Operand>),
}

impl Instruction {
    pub fn assign(dest: Operand, rhs: Instruction) -> Self {
        Instruction::Assign { dest, rhs: Box::new(rhs) }
    }

    /// Type of the value the instruction leaves behind, `Void` for none.
    pub fn result_type(&self) -> Type {
        match self {
            Instruction::BinaryOp { op, .. } => op.result_type(),
            Instruction::UnaryOp { .. } => Type::Boolean,
            Instruction::Load(operand) => operand.ty(),
            Instruction::Call(call) => call.return_type.clone(),
            Instruction::GetField { ty, .. } => ty.clone(),
            _ => Type::Void,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Param,
    Local,
    /// Introduced by lowering: temporaries and short-circuit results.
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDescriptor {
    pub name: String,
    pub ty: Type,
    pub kind: VarKind,
    pub register: usize,
}

/// A method's variables in declaration order with their register slots.
#[derive(Debug, Clone, Default)]
pub struct VarTable {
    entries: Vec<VarDescriptor>,
    index: HashMap<String, usize>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` with the next free slot after `first_slot` in declaration order.
    pub fn declare(&mut self, name: &str, ty: Type, kind: VarKind, first_slot: usize) -> usize {
        if let Some(&i) = self.index.get(name) {
            return self.entries[i].register;
        }
        let register = first_slot + self.entries.len();
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(VarDescriptor {
            name: name.to_string(),
            ty,
            kind,
            register,
        });
        register
    }

    pub fn get(&self, name: &str) -> Option<&VarDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn register(&self, name: &str) -> Option<usize> {
        self.get(name).map(|v| v.register)
    }

    pub fn set_register(&mut self, name: &str, register: usize) {
        if let Some(&i) = self.index.get(name) {
            self.entries[i].register = register;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &VarDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub is_public: bool,
    pub is_static: bool,
    pub params: Vec<(String, Type)>,
    pub return_type: Type,
    pub instructions: Vec<Instruction>,
    /// Label name -> index of the instruction it precedes (`instructions.len()` for the end).
    pub labels: BTreeMap<String, usize>,
    pub vars: VarTable,
}

impl Method {
    /// First slot after the receiver and the parameters.
    pub fn first_free_register(&self) -> usize {
        self.receiver_slots() + self.params.len()
    }

    pub fn receiver_slots(&self) -> usize {
        if self.is_static {
            0
        } else {
            1
        }
    }

    pub fn labels_at(&self, index: usize) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .filter(move |(_, &at)| at == index)
            .map(|(name, _)| name.as_str())
    }

    pub fn label_target(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }
}

#[derive(Debug, Clone)]
pub struct ClassUnit {
    pub name: String,
    pub superclass: Option<String>,
    pub imports: Vec<String>,
    pub fields: Vec<(String, Type)>,
    pub methods: Vec<Method>,
}

/*
 * OLLIR-flavoured printing, used by `--dump-ir` and debug logs:
 *   b.i32 :=.i32 a.i32 +.i32 1.i32;
 */
struct Suffix<'a>(&'a Type);

impl fmt::Display for Suffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Type::Int => write!(f, ".i32"),
            Type::Boolean => write!(f, ".bool"),
            Type::Void => write!(f, ".V"),
            Type::String => write!(f, ".String"),
            Type::Class(name) => write!(f, ".{}", name),
            Type::Array(elem) => write!(f, ".array{}", Suffix(elem)),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal { value, ty } => write!(f, "{}{}", value, Suffix(ty)),
            Operand::Variable { name, ty } => write!(f, "{}{}", name, Suffix(ty)),
            Operand::Temporary { id, ty } => write!(f, "{}{}", temp_name(*id), Suffix(ty)),
            Operand::ArrayElement { base, index } => {
                write!(f, "{}[{}]{}", base, index, Suffix(&self.ty()))
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Assign { dest, rhs } => {
                write!(f, "{} :={} {}", dest, Suffix(&dest.ty()), rhs)
            }
            Instruction::BinaryOp { op, left, right } => {
                write!(f, "{} {}{} {}", left, op, Suffix(&op.result_type()), right)
            }
            Instruction::UnaryOp { op: UnaryOp::Not, operand } => write!(f, "!.bool {}", operand),
            Instruction::Load(operand) => write!(f, "{}", operand),
            Instruction::Call(call) => {
                let kind = match call.kind {
                    CallKind::Virtual => "invokevirtual",
                    CallKind::Static => "invokestatic",
                    CallKind::Special => "invokespecial",
                    CallKind::New => "new",
                    CallKind::NewArray => "new",
                    CallKind::ArrayLength => "arraylength",
                };
                write!(f, "{}(", kind)?;
                match &call.callee {
                    Callee::Object(operand) => write!(f, "{}", operand)?,
                    Callee::Class(name) => write!(f, "{}", name)?,
                    Callee::None => write!(f, "array")?,
                }
                if let Some(method) = &call.method {
                    write!(f, ", \"{}\"", method)?;
                }
                for arg in &call.args {
                    write!(f, ", {}", arg)?;
                }
                write!(f, "){}", Suffix(&call.return_type))
            }
            Instruction::GetField { field, ty } => {
                write!(f, "getfield(this, {}{}){}", field, Suffix(ty), Suffix(ty))
            }
            Instruction::PutField { field, ty, value } => {
                write!(f, "putfield(this, {}{}, {}).V", field, Suffix(ty), value)
            }
            Instruction::Goto(label) => write!(f, "goto {}", label),
            Instruction::CondBranch { cond, label } => write!(f, "if ({}) goto {}", cond, label),
            Instruction::Return(Some(operand)) => {
                write!(f, "ret{} {}", Suffix(&operand.ty()), operand)
            }
            Instruction::Return(None) => write!(f, "ret.V"),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".method ")?;
        if self.is_public {
            write!(f, "public ")?;
        }
        if self.is_static {
            write!(f, "static ")?;
        }
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, ty)| format!("{}{}", name, Suffix(ty)))
            .collect();
        writeln!(f, "{}({}){} {{", self.name, params.join(", "), Suffix(&self.return_type))?;

        for (i, instr) in self.instructions.iter().enumerate() {
            for label in self.labels_at(i) {
                writeln!(f, "{}:", label)?;
            }
            writeln!(f, "    {};", instr)?;
        }
        for label in self.labels_at(self.instructions.len()) {
            writeln!(f, "{}:", label)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for ClassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for import in &self.imports {
            writeln!(f, "import {};", import)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(superclass) = &self.superclass {
            write!(f, " extends {}", superclass)?;
        }
        writeln!(f, " {{")?;
        for (name, ty) in &self.fields {
            writeln!(f, ".field public {}{};", name, Suffix(ty))?;
        }
        for method in &self.methods {
            writeln!(f)?;
            write!(f, "{}", method)?;
        }
        writeln!(f, "}}")
    }
}
