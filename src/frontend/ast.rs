use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Boolean,
    Void,
    String,
    Class(String),
    Array(Box<Type>),
}

impl Type {
    pub fn int_array() -> Self {
        Type::Array(Box::new(Type::Int))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    /// Int and boolean values live in the `i` opcode family, everything else is a reference.
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Int | Type::Boolean)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Boolean => write!(f, "boolean"),
            Type::Void => write!(f, "void"),
            Type::String => write!(f, "String"),
            Type::Class(name) => write!(f, "{}", name),
            Type::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub imports: Vec<Import>,
    pub class: ClassDecl,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub path: Vec<String>,      // `import io.Console;` -> ["io", "Console"]
}

impl Import {
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<MethodDecl>,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,           // `int... xs` is stored as `int[]`
    pub is_vararg: bool,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub is_public: bool,
    pub is_static: bool,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub locals: Vec<VarDecl>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Expr(Expr),
    Assign {
        target: String,
        value: Expr,
    },
    ArrayAssign {
        target: String,
        index: Expr,
        value: Expr,
    },
    Return(Option<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    And,
}

impl BinaryOp {
    /// Type both operands are expected to have.
    pub fn operand_type(self) -> Type {
        match self {
            BinaryOp::And => Type::Boolean,
            _ => Type::Int,
        }
    }

    pub fn result_type(self) -> Type {
        match self {
            BinaryOp::Lt | BinaryOp::And => Type::Boolean,
            _ => Type::Int,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::And => "&&",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    IntLit(i32),
    BoolLit(bool),
    This,
    Var(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Length(Box<Expr>),
    Call {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    NewArray(Box<Expr>),
    NewObject(String),
    ArrayInit(Vec<Expr>),
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }
}
