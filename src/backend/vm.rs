//! Minimal interpreter for the Jasmin text produced by the generator.
//!
//! Enforces the declared `.limit stack` and `.limit locals` on every access, so tests
//! can check both program results and the emitter's bookkeeping.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Ref(usize),
    Null,
}

impl Value {
    pub fn int(self) -> i32 {
        match self {
            Value::Int(v) => v,
            other => panic!("expected int, found {:?}", other),
        }
    }

    fn reference(self) -> usize {
        match self {
            Value::Ref(r) => r,
            other => panic!("expected reference, found {:?}", other),
        }
    }
}

#[derive(Debug)]
enum HeapObject {
    Array(Vec<i32>),
    Object(HashMap<String, Value>),
}

#[derive(Debug)]
struct MethodCode {
    is_static: bool,
    stack_limit: usize,
    locals_limit: usize,
    code: Vec<Vec<String>>,
    labels: HashMap<String, usize>,
}

pub struct Vm {
    class_name: String,
    methods: HashMap<String, MethodCode>,
    heap: Vec<HeapObject>,
    /// `Owner/name` of every call that left the class, in order.
    pub external_calls: Vec<String>,
    /// Value returned by external non-void calls.
    pub external_result: i32,
    /// Deepest operand stack observed in any frame.
    pub max_depth: usize,
}

impl Vm {
    pub fn load(jasmin: &str) -> Self {
        let mut class_name = String::new();
        let mut methods = HashMap::new();
        let mut current: Option<(String, MethodCode)> = None;

        for raw in jasmin.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();

            if line.starts_with(".class") {
                class_name = tokens.last().cloned().unwrap();
            } else if line.starts_with(".method") {
                let signature = tokens.last().unwrap();
                let name = signature[..signature.find('(').unwrap()].to_string();
                let code = MethodCode {
                    is_static: tokens.iter().any(|t| t == "static"),
                    stack_limit: 0,
                    locals_limit: 0,
                    code: Vec::new(),
                    labels: HashMap::new(),
                };
                current = Some((name, code));
            } else if line.starts_with(".end method") {
                let (name, code) = current.take().unwrap();
                methods.insert(name, code);
            } else if line.starts_with(".limit") {
                let (_, code) = current.as_mut().unwrap();
                let value: usize = tokens[2].parse().unwrap();
                if tokens[1] == "stack" {
                    code.stack_limit = value;
                } else {
                    code.locals_limit = value;
                }
            } else if let Some(label) = line.strip_suffix(':') {
                let (_, code) = current.as_mut().unwrap();
                code.labels.insert(label.to_string(), code.code.len());
            } else if let Some((_, code)) = current.as_mut() {
                code.code.push(tokens);
            }
        }

        Self {
            class_name,
            methods,
            heap: Vec::new(),
            external_calls: Vec::new(),
            external_result: 1,
            max_depth: 0,
        }
    }

    pub fn new_object(&mut self) -> Value {
        self.heap.push(HeapObject::Object(HashMap::new()));
        Value::Ref(self.heap.len() - 1)
    }

    pub fn new_array(&mut self, values: Vec<i32>) -> Value {
        self.heap.push(HeapObject::Array(values));
        Value::Ref(self.heap.len() - 1)
    }

    pub fn array(&self, value: Value) -> &[i32] {
        match &self.heap[value.reference()] {
            HeapObject::Array(values) => values,
            other => panic!("expected array, found {:?}", other),
        }
    }

    pub fn field(&self, object: Value, name: &str) -> Value {
        match &self.heap[object.reference()] {
            HeapObject::Object(fields) => fields.get(name).copied().unwrap_or(Value::Int(0)),
            other => panic!("expected object, found {:?}", other),
        }
    }

    /// Runs `name` with `this` (for instance methods) and `args`.
    pub fn invoke(&mut self, name: &str, this: Option<Value>, args: &[Value]) -> Option<Value> {
        let method = self
            .methods
            .get(name)
            .unwrap_or_else(|| panic!("no method '{}'", name));
        let (stack_limit, locals_limit, is_static) = (method.stack_limit, method.locals_limit, method.is_static);

        let mut locals = vec![Value::Int(0); locals_limit];
        let mut slot = 0;
        if !is_static {
            locals[0] = this.expect("instance method needs a receiver");
            slot = 1;
        }
        for arg in args {
            locals[slot] = *arg;
            slot += 1;
        }

        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;

        loop {
            let instr = self.methods[name].code[pc].clone();
            pc += 1;
            let op = instr[0].as_str();

            match op {
                "iconst_m1" => stack.push(Value::Int(-1)),
                _ if op.starts_with("iconst_") => stack.push(Value::Int(op[7..].parse().unwrap())),
                "bipush" | "sipush" | "ldc" => stack.push(Value::Int(instr[1].parse().unwrap())),

                _ if op.starts_with("iload") || op.starts_with("aload") => {
                    let index = local_index(&instr);
                    assert!(index < locals_limit, "local {} beyond limit {}", index, locals_limit);
                    stack.push(locals[index]);
                }
                _ if op.starts_with("istore") || op.starts_with("astore") => {
                    let index = local_index(&instr);
                    assert!(index < locals_limit, "local {} beyond limit {}", index, locals_limit);
                    locals[index] = stack.pop().unwrap();
                }
                "iinc" => {
                    let index: usize = instr[1].parse().unwrap();
                    let delta: i32 = instr[2].parse().unwrap();
                    locals[index] = Value::Int(locals[index].int().wrapping_add(delta));
                }

                "iadd" | "isub" | "imul" | "idiv" => {
                    let b = stack.pop().unwrap().int();
                    let a = stack.pop().unwrap().int();
                    stack.push(Value::Int(match op {
                        "iadd" => a.wrapping_add(b),
                        "isub" => a.wrapping_sub(b),
                        "imul" => a.wrapping_mul(b),
                        _ => a.wrapping_div(b),
                    }));
                }

                "ifeq" | "ifne" | "iflt" => {
                    let v = stack.pop().unwrap().int();
                    let taken = match op {
                        "ifeq" => v == 0,
                        "ifne" => v != 0,
                        _ => v < 0,
                    };
                    if taken {
                        pc = self.methods[name].labels[&instr[1]];
                    }
                }
                "goto" => pc = self.methods[name].labels[&instr[1]],

                "ireturn" | "areturn" => return stack.pop(),
                "return" => return None,

                "pop" => {
                    stack.pop().unwrap();
                }
                "dup" => {
                    let top = *stack.last().unwrap();
                    stack.push(top);
                }

                "new" => {
                    let object = self.new_object();
                    stack.push(object);
                }
                "newarray" => {
                    let size = stack.pop().unwrap().int();
                    let array = self.new_array(vec![0; size as usize]);
                    stack.push(array);
                }
                "arraylength" => {
                    let array = stack.pop().unwrap();
                    stack.push(Value::Int(self.array(array).len() as i32));
                }
                "iaload" | "baload" => {
                    let index = stack.pop().unwrap().int() as usize;
                    let array = stack.pop().unwrap();
                    stack.push(Value::Int(self.array(array)[index]));
                }
                "iastore" | "bastore" => {
                    let value = stack.pop().unwrap().int();
                    let index = stack.pop().unwrap().int() as usize;
                    let array = stack.pop().unwrap();
                    match &mut self.heap[array.reference()] {
                        HeapObject::Array(values) => values[index] = value,
                        other => panic!("iastore into {:?}", other),
                    }
                }

                "getfield" => {
                    let object = stack.pop().unwrap();
                    let field = member_name(&instr[1]);
                    stack.push(self.field(object, &field));
                }
                "putfield" => {
                    let value = stack.pop().unwrap();
                    let object = stack.pop().unwrap();
                    let field = member_name(&instr[1]);
                    match &mut self.heap[object.reference()] {
                        HeapObject::Object(fields) => {
                            fields.insert(field, value);
                        }
                        other => panic!("putfield into {:?}", other),
                    }
                }

                "invokespecial" => {
                    stack.pop().unwrap();
                }
                "invokevirtual" | "invokestatic" => {
                    let target = &instr[1];
                    let paren = target.find('(').unwrap();
                    let (path, descriptor) = target.split_at(paren);
                    let (owner, method) = path.rsplit_once('/').unwrap();
                    let arg_count = count_params(descriptor);
                    let returns = !descriptor.ends_with(")V");

                    let args = stack.split_off(stack.len() - arg_count);
                    let receiver = if op == "invokevirtual" { stack.pop() } else { None };

                    let result = if owner == self.class_name {
                        self.invoke(method, receiver, &args)
                    } else {
                        self.external_calls.push(path.to_string());
                        returns.then_some(Value::Int(self.external_result))
                    };
                    if let Some(value) = result.filter(|_| returns) {
                        stack.push(value);
                    }
                }

                other => panic!("unsupported instruction '{}'", other),
            }

            assert!(
                stack.len() <= stack_limit,
                "stack depth {} exceeds .limit stack {} in '{}'",
                stack.len(),
                stack_limit,
                name
            );
            self.max_depth = self.max_depth.max(stack.len());
        }
    }
}

fn local_index(instr: &[String]) -> usize {
    match instr[0].split_once('_') {
        Some((_, n)) => n.parse().unwrap(),
        None => instr[1].parse().unwrap(),
    }
}

fn member_name(path: &str) -> String {
    path.rsplit('/').next().unwrap().to_string()
}

/// Number of parameters in a method descriptor such as `(I[ZLa/B;)V`.
fn count_params(descriptor: &str) -> usize {
    let inner = &descriptor[1..descriptor.find(')').unwrap()];
    let mut chars = inner.chars();
    let mut count = 0;
    while let Some(c) = chars.next() {
        match c {
            '[' => continue,
            'L' => {
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                }
                count += 1;
            }
            _ => count += 1,
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_params() {
        assert_eq!(count_params("()V"), 0);
        assert_eq!(count_params("(I[ZLa/b/C;[[I)I"), 4);
    }

    #[test]
    fn test_runs_hand_written_method() {
        let jasmin = ".class public A
.super java/lang/Object
.method public static f(I)I
    .limit stack 2
    .limit locals 1
loop:
    iload_0
    bipush 10
    isub
    iflt more
    iload_0
    ireturn
more:
    iinc 0 3
    goto loop
.end method
";
        let mut vm = Vm::load(jasmin);
        assert_eq!(vm.invoke("f", None, &[Value::Int(1)]), Some(Value::Int(10)));
        assert_eq!(vm.max_depth, 2);
    }
}
