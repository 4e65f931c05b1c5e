use crate::error::ParseError;
use crate::frontend::ast;
use crate::frontend::ast::{BinaryOp, Expr, Stmt, Type};
use chumsky::prelude::*;
use chumsky::Parser;

const KEYWORDS: [&str; 16] = [
    "import", "class", "extends", "public", "static", "int", "boolean", "void",
    "if", "else", "while", "return", "new", "this", "true", "false",
];

#[derive(Clone)]
enum Postfix {
    Index(Expr),
    Length,
    Call(String, Vec<Expr>),
}

pub fn parse(source_code: &str) -> Result<ast::Program, Vec<ParseError>> {
    let source = blank_comments(source_code);

    let result = parser()
        .parse(source.as_str())
        .into_result()
        .map_err(|errs| {
            errs.into_iter()
                .map(|e| ParseError {
                    offset: e.span().start,
                    message: e.to_string(),
                })
                .collect()
        });
    result
}

/*
 * Replaces `// ...` and `/* ... */` comments with spaces so the grammar
 * only has to deal with whitespace. Newlines survive, so offsets reported
 * by the parser still point into the original text.
 */
fn blank_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                out.push_str("  ");
                chars.next();
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    out.push(' ');
                    chars.next();
                }
            }

            ('/', Some('*')) => {
                out.push_str("  ");
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    out.push(if next == '\n' { '\n' } else { ' ' });
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }

            _ => out.push(c),
        }
    }

    out
}

fn parser<'src>() -> impl Parser<'src, &'src str, ast::Program, extra::Err<Rich<'src, char>>> {
    // All of our 'atoms' (identifiers, keywords, symbols)
    // are '.padded()' to ignore whitespace around them.
    let ident = text::ident()
        .filter(|s: &&str| !KEYWORDS.contains(s))
        .map(|s: &str| s.to_string())
        .padded();

    let comma = just(',').padded();
    let semicolon = just(';').padded();

    /*
     * Type Parser
     * int | boolean | void | String | ClassName, optionally followed by []
     */
    let base_type = choice((
        text::keyword("int").to(Type::Int),
        text::keyword("boolean").to(Type::Boolean),
        text::keyword("void").to(Type::Void),
        text::keyword("String").to(Type::String),
        ident.clone().map(Type::Class),
    ))
    .padded();

    let ty = base_type
        .then(just('[').padded().then(just(']').padded()).or_not())
        .map(|(ty, brackets)| match brackets {
            Some(_) => Type::Array(Box::new(ty)),
            None => ty,
        });

    /*
     * Expression Parser
     * Precedence, loosest first: && < + - * / ! postfix
     */
    let expr = recursive(|expr| {
        let args = expr
            .clone()
            .separated_by(comma.clone())
            .allow_trailing()
            .collect::<Vec<Expr>>()
            .delimited_by(just('(').padded(), just(')').padded());

        let int_lit = text::int(10).try_map(|digits: &str, span| {
            digits
                .parse::<i32>()
                .map(Expr::IntLit)
                .map_err(|_| Rich::custom(span, format!("integer literal {} is out of range", digits)))
        });

        let new_array = text::keyword("new")
            .padded()
            .ignore_then(text::keyword("int").padded())
            .ignore_then(
                expr.clone()
                    .delimited_by(just('[').padded(), just(']').padded()),
            )
            .map(|size| Expr::NewArray(Box::new(size)));

        let new_object = text::keyword("new")
            .padded()
            .ignore_then(ident.clone())
            .then_ignore(just('(').padded())
            .then_ignore(just(')').padded())
            .map(Expr::NewObject);

        let array_init = expr
            .clone()
            .separated_by(comma.clone())
            .collect::<Vec<Expr>>()
            .delimited_by(just('[').padded(), just(']').padded())
            .map(Expr::ArrayInit);

        let atom = choice((
            int_lit,
            text::keyword("true").to(Expr::BoolLit(true)),
            text::keyword("false").to(Expr::BoolLit(false)),
            text::keyword("this").to(Expr::This),
            new_array,
            new_object,
            array_init,
            expr.clone()
                .delimited_by(just('(').padded(), just(')').padded()),
            ident.clone().map(Expr::Var),
        ))
        .padded()
        .boxed();

        let postfix = choice((
            expr.clone()
                .delimited_by(just('[').padded(), just(']').padded())
                .map(Postfix::Index),
            just('.')
                .padded()
                .ignore_then(ident.clone())
                .then(args)
                .map(|(name, args)| Postfix::Call(name, args)),
            just('.')
                .padded()
                .ignore_then(text::keyword("length").padded())
                .to(Postfix::Length),
        ));

        let postfixed = atom.foldl(postfix.repeated(), |expr, op| match op {
            Postfix::Index(index) => Expr::Index {
                array: Box::new(expr),
                index: Box::new(index),
            },
            Postfix::Length => Expr::Length(Box::new(expr)),
            Postfix::Call(method, args) => Expr::Call {
                receiver: Box::new(expr),
                method,
                args,
            },
        });

        let unary = just('!')
            .padded()
            .repeated()
            .foldr(postfixed, |_, operand| Expr::Not(Box::new(operand)))
            .boxed();

        let product = unary.clone().foldl(
            choice((just('*').to(BinaryOp::Mul), just('/').to(BinaryOp::Div)))
                .padded()
                .then(unary)
                .repeated(),
            |left, (op, right)| Expr::binary(op, left, right),
        );

        let sum = product.clone().foldl(
            choice((just('+').to(BinaryOp::Add), just('-').to(BinaryOp::Sub)))
                .padded()
                .then(product)
                .repeated(),
            |left, (op, right)| Expr::binary(op, left, right),
        );

        let relation = sum.clone().foldl(
            just('<').padded().to(BinaryOp::Lt).then(sum).repeated(),
            |left, (op, right)| Expr::binary(op, left, right),
        );

        relation.clone().foldl(
            just("&&").padded().to(BinaryOp::And).then(relation).repeated(),
            |left, (op, right)| Expr::binary(op, left, right),
        )
    });

    /*
     * Statement Parser
     * A statement is a Block, If, While, Return, Assign, ArrayAssign or Expr
     */
    let statement = recursive(|statement| {
        let block = statement
            .clone()
            .repeated()
            .collect::<Vec<Stmt>>()
            .delimited_by(just('{').padded(), just('}').padded())
            .map(Stmt::Block);

        let condition = expr
            .clone()
            .delimited_by(just('(').padded(), just(')').padded());

        let if_stmt = text::keyword("if")
            .padded()
            .ignore_then(condition.clone())
            .then(statement.clone())
            .then(
                text::keyword("else")
                    .padded()
                    .ignore_then(statement.clone())
                    .or_not(),
            )
            .map(|((cond, then_branch), else_branch)| Stmt::If {
                cond,
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            });

        let while_stmt = text::keyword("while")
            .padded()
            .ignore_then(condition)
            .then(statement.clone())
            .map(|(cond, body)| Stmt::While {
                cond,
                body: Box::new(body),
            });

        let return_stmt = text::keyword("return")
            .padded()
            .ignore_then(expr.clone().or_not())
            .then_ignore(semicolon.clone())
            .map(Stmt::Return);

        let assign_stmt = ident
            .clone()
            .then_ignore(just('=').padded())
            .then(expr.clone())
            .then_ignore(semicolon.clone())
            .map(|(target, value)| Stmt::Assign { target, value });

        let array_assign_stmt = ident
            .clone()
            .then(
                expr.clone()
                    .delimited_by(just('[').padded(), just(']').padded()),
            )
            .then_ignore(just('=').padded())
            .then(expr.clone())
            .then_ignore(semicolon.clone())
            .map(|((target, index), value)| Stmt::ArrayAssign {
                target,
                index,
                value,
            });

        let expr_stmt = expr
            .clone()
            .then_ignore(semicolon.clone())
            .map(Stmt::Expr);

        choice((
            block,
            if_stmt,
            while_stmt,
            return_stmt,
            assign_stmt,
            array_assign_stmt,
            expr_stmt,
        ))
        .boxed()
    });

    let var_decl = ty
        .clone()
        .then(ident.clone())
        .then_ignore(semicolon.clone())
        .map(|(ty, name)| ast::VarDecl { name, ty });

    /*
     * Method Parser
     * '[public] [static] type name(type a, int... rest) {
     *      declarations
     *      statements
     *  }'
     */
    let param = ty
        .clone()
        .then(just("...").padded().or_not())
        .then(ident.clone())
        .map(|((ty, dots), name)| match dots {
            Some(_) => ast::Param {
                name,
                ty: Type::Array(Box::new(ty)),
                is_vararg: true,
            },
            None => ast::Param {
                name,
                ty,
                is_vararg: false,
            },
        });

    let method = text::keyword("public")
        .padded()
        .or_not()
        .then(text::keyword("static").padded().or_not())
        .then(ty)
        .then(ident.clone())
        .then(
            param
                .separated_by(comma)
                .collect::<Vec<ast::Param>>()
                .delimited_by(just('(').padded(), just(')').padded()),
        )
        .then_ignore(just('{').padded())
        .then(var_decl.clone().repeated().collect::<Vec<ast::VarDecl>>())
        .then(statement.repeated().collect::<Vec<Stmt>>())
        .then_ignore(just('}').padded())
        .map(
            |((((((public, is_static), return_type), name), params), locals), body)| {
                ast::MethodDecl {
                    name,
                    is_public: public.is_some(),
                    is_static: is_static.is_some(),
                    return_type,
                    params,
                    locals,
                    body,
                }
            },
        );

    /* Program Parser: imports first, then exactly one class */
    let import = text::keyword("import")
        .padded()
        .ignore_then(
            ident
                .clone()
                .separated_by(just('.').padded())
                .at_least(1)
                .collect::<Vec<String>>(),
        )
        .then_ignore(semicolon)
        .map(|path| ast::Import { path });

    let class = text::keyword("public")
        .padded()
        .or_not()
        .ignore_then(text::keyword("class").padded())
        .ignore_then(ident.clone())
        .then(
            text::keyword("extends")
                .padded()
                .ignore_then(ident)
                .or_not(),
        )
        .then_ignore(just('{').padded())
        .then(var_decl.repeated().collect::<Vec<ast::VarDecl>>())
        .then(method.repeated().collect::<Vec<ast::MethodDecl>>())
        .then_ignore(just('}').padded())
        .map(|(((name, superclass), fields), methods)| ast::ClassDecl {
            name,
            superclass,
            fields,
            methods,
        });

    import
        .repeated()
        .collect::<Vec<ast::Import>>()
        .then(class)
        .padded()
        .then_ignore(end())
        .map(|(imports, class)| ast::Program { imports, class })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_class_with_imports() {
        let program = parse(
            "import io; import java.util.List;
             class Foo extends Bar {
                 int count;
                 public int get(int a) { return a; }
             }",
        )
        .unwrap();

        assert_eq!(program.imports.len(), 2);
        assert_eq!(program.imports[1].dotted(), "java.util.List");
        assert_eq!(program.class.name, "Foo");
        assert_eq!(program.class.superclass.as_deref(), Some("Bar"));
        assert_eq!(program.class.fields[0].name, "count");
        assert_eq!(program.class.methods[0].params[0].ty, Type::Int);
    }

    #[test]
    fn test_parse_main_and_varargs() {
        let program = parse(
            "class A {
                 public static void main(String[] args) { }
                 int sum(int... xs) { return xs.length; }
             }",
        )
        .unwrap();

        let main = &program.class.methods[0];
        assert!(main.is_static);
        assert_eq!(main.params[0].ty, Type::Array(Box::new(Type::String)));

        let sum = &program.class.methods[1];
        assert!(!sum.is_public);
        assert!(sum.params[0].is_vararg);
        assert_eq!(sum.params[0].ty, Type::int_array());
        assert_eq!(
            sum.body[0],
            Stmt::Return(Some(Expr::Length(Box::new(Expr::var("xs")))))
        );
    }

    #[test]
    fn test_precedence() {
        let program = parse(
            "class A { boolean f(int a, int b) { return a + b * 2 < 3 && !true; } }",
        )
        .unwrap();

        let expected = Expr::binary(
            BinaryOp::And,
            Expr::binary(
                BinaryOp::Lt,
                Expr::binary(
                    BinaryOp::Add,
                    Expr::var("a"),
                    Expr::binary(BinaryOp::Mul, Expr::var("b"), Expr::IntLit(2)),
                ),
                Expr::IntLit(3),
            ),
            Expr::Not(Box::new(Expr::BoolLit(true))),
        );
        assert_eq!(program.class.methods[0].body[0], Stmt::Return(Some(expected)));
    }

    #[test]
    fn test_declarations_then_statements() {
        let program = parse(
            "class A {
                 int f() {
                     int[] xs; A other; int i;
                     xs = new int[3];
                     xs[0] = 1;
                     other = new A();
                     while (i < 3) { i = i + 1; }
                     if (i < 2) other.f(); else { }
                     return xs[0];
                 }
             }",
        )
        .unwrap();

        let method = &program.class.methods[0];
        assert_eq!(method.locals.len(), 3);
        assert_eq!(method.locals[1].ty, Type::Class("A".to_string()));
        assert_eq!(method.body.len(), 6);
        assert!(matches!(method.body[1], Stmt::ArrayAssign { .. }));
        assert!(matches!(method.body[3], Stmt::While { .. }));
    }

    #[test]
    fn test_comments_are_ignored() {
        let program = parse(
            "// leading comment
             class A { /* block
                          comment */ int x; }",
        )
        .unwrap();
        assert_eq!(program.class.fields.len(), 1);
    }

    #[test]
    fn test_integer_literal_range() {
        let program = parse("class A { int f() { return 2147483647; } }").unwrap();
        assert_eq!(
            program.class.methods[0].body[0],
            Stmt::Return(Some(Expr::IntLit(i32::MAX)))
        );

        let errors = parse("class A { int f() { return 2147483648; } }").unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_reports_errors() {
        let errors = parse("class A { int f( { }").unwrap_err();
        assert!(!errors.is_empty());
    }
}
