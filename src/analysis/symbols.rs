use crate::frontend::ast;
use crate::frontend::ast::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Symbol>,
    pub locals: Vec<Symbol>,
    pub is_static: bool,
    pub is_vararg: bool,
}

impl MethodSignature {
    /// Number of parameters that are not part of a trailing vararg.
    pub fn fixed_arity(&self) -> usize {
        if self.is_vararg {
            self.params.len() - 1
        } else {
            self.params.len()
        }
    }
}

/// Where a name used inside a method body lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Local(Type),
    Param(Type),
    Field(Type),
}

impl Resolved {
    pub fn ty(&self) -> &Type {
        match self {
            Resolved::Local(ty) | Resolved::Param(ty) | Resolved::Field(ty) => ty,
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self, Resolved::Field(_))
    }
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    pub class_name: String,
    pub superclass: Option<String>,
    pub imports: Vec<String>,       // dotted paths, in declaration order
    pub fields: Vec<Symbol>,
    pub methods: Vec<MethodSignature>,
}

impl SymbolTable {
    pub fn build(program: &ast::Program) -> Self {
        let class = &program.class;

        let methods = class
            .methods
            .iter()
            .map(|method| MethodSignature {
                name: method.name.clone(),
                return_type: method.return_type.clone(),
                params: method
                    .params
                    .iter()
                    .map(|p| Symbol { name: p.name.clone(), ty: p.ty.clone() })
                    .collect(),
                locals: method
                    .locals
                    .iter()
                    .map(|l| Symbol { name: l.name.clone(), ty: l.ty.clone() })
                    .collect(),
                is_static: method.is_static,
                is_vararg: method.params.last().is_some_and(|p| p.is_vararg),
            })
            .collect();

        Self {
            class_name: class.name.clone(),
            superclass: class.superclass.clone(),
            imports: program.imports.iter().map(ast::Import::dotted).collect(),
            fields: class
                .fields
                .iter()
                .map(|f| Symbol { name: f.name.clone(), ty: f.ty.clone() })
                .collect(),
            methods,
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Symbol> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_superclass(&self) -> bool {
        self.superclass.is_some()
    }

    /// Locals shadow parameters, which shadow fields. Fields are invisible from static methods.
    pub fn resolve(&self, method: &MethodSignature, name: &str) -> Option<Resolved> {
        if let Some(local) = method.locals.iter().find(|s| s.name == name) {
            return Some(Resolved::Local(local.ty.clone()));
        }
        if let Some(param) = method.params.iter().find(|s| s.name == name) {
            return Some(Resolved::Param(param.ty.clone()));
        }
        if method.is_static {
            return None;
        }
        self.field(name).map(|f| Resolved::Field(f.ty.clone()))
    }

    /// Full dotted path of the import whose last segment is `simple_name`.
    pub fn import_path(&self, simple_name: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|path| path.rsplit('.').next() == Some(simple_name))
            .map(String::as_str)
    }

    pub fn is_imported(&self, simple_name: &str) -> bool {
        self.import_path(simple_name).is_some()
    }

    pub fn is_current_class(&self, ty: &Type) -> bool {
        matches!(ty, Type::Class(name) if *name == self.class_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse;

    fn table(source: &str) -> SymbolTable {
        SymbolTable::build(&parse(source).unwrap())
    }

    #[test]
    fn test_resolution_order() {
        let table = table(
            "class A {
                 int x; boolean y; int z;
                 int f(boolean x) { int y; return 0; }
                 static int g() { return 0; }
             }",
        );
        let f = table.method("f").unwrap();

        assert_eq!(table.resolve(f, "y"), Some(Resolved::Local(Type::Int)));
        assert_eq!(table.resolve(f, "x"), Some(Resolved::Param(Type::Boolean)));
        assert_eq!(table.resolve(f, "z"), Some(Resolved::Field(Type::Int)));
        assert_eq!(table.resolve(f, "w"), None);

        let g = table.method("g").unwrap();
        assert_eq!(table.resolve(g, "z"), None);
    }

    #[test]
    fn test_import_lookup_by_last_segment() {
        let table = table("import a.b.Console; import io; class A { }");

        assert_eq!(table.import_path("Console"), Some("a.b.Console"));
        assert!(table.is_imported("io"));
        assert!(!table.is_imported("b"));
    }

    #[test]
    fn test_vararg_signature() {
        let table = table("class A { int f(int a, int... rest) { return a; } }");
        let f = table.method("f").unwrap();

        assert!(f.is_vararg);
        assert_eq!(f.fixed_arity(), 1);
    }
}
