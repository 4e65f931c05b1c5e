use crate::ir::{Instruction, Method};

pub type NodeId = usize;

/// Instruction-level control-flow graph of one method.
///
/// Node 0 is BEGIN, instruction `i` is node `i + 1` and the last node is END.
#[derive(Debug, Clone)]
pub struct CFG {
    successors: Vec<Vec<NodeId>>,
    predecessors: Vec<Vec<NodeId>>,
}

impl CFG {
    pub const BEGIN: NodeId = 0;

    pub fn build(method: &Method) -> Self {
        let count = method.instructions.len();
        let end = count + 1;
        let mut successors = vec![Vec::new(); count + 2];

        successors[Self::BEGIN].push(if count == 0 { end } else { 1 });

        for (i, instr) in method.instructions.iter().enumerate() {
            let node = i + 1;
            let next = node + 1;
            let target = |label: &str| match method.label_target(label) {
                Some(index) => index + 1,
                None => panic!("branch to undefined label '{}' in '{}'", label, method.name),
            };

            successors[node] = match instr {
                Instruction::Goto(label) => vec![target(label)],
                Instruction::CondBranch { label, .. } => {
                    let t = target(label);
                    if t == next { vec![t] } else { vec![t, next] }
                }
                Instruction::Return(_) => vec![end],
                _ => vec![next],
            };
        }

        let mut predecessors = vec![Vec::new(); count + 2];
        for (node, succs) in successors.iter().enumerate() {
            for &s in succs {
                predecessors[s].push(node);
            }
        }

        Self { successors, predecessors }
    }

    pub fn end(&self) -> NodeId {
        self.successors.len() - 1
    }

    pub fn node_count(&self) -> usize {
        self.successors.len()
    }

    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        &self.successors[node]
    }

    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        &self.predecessors[node]
    }

    /// Instruction index behind `node`, `None` for the sentinels.
    pub fn instruction_index(&self, node: NodeId) -> Option<usize> {
        if node == Self::BEGIN || node == self.end() {
            None
        } else {
            Some(node - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Operand, Type, VarTable};
    use std::collections::BTreeMap;

    fn method(instructions: Vec<Instruction>, labels: &[(&str, usize)]) -> Method {
        Method {
            name: "f".to_string(),
            is_public: true,
            is_static: false,
            params: vec![],
            return_type: Type::Void,
            instructions,
            labels: labels
                .iter()
                .map(|(name, at)| (name.to_string(), *at))
                .collect::<BTreeMap<_, _>>(),
            vars: VarTable::new(),
        }
    }

    #[test]
    fn test_branch_successors() {
        // 0: if (c) goto done; 1: goto top; done: 2: ret
        let m = method(
            vec![
                Instruction::CondBranch {
                    cond: Operand::variable("c", Type::Boolean),
                    label: "done".to_string(),
                },
                Instruction::Goto("top".to_string()),
                Instruction::Return(None),
            ],
            &[("top", 0), ("done", 2)],
        );
        let cfg = CFG::build(&m);

        assert_eq!(cfg.node_count(), 5);
        assert_eq!(cfg.successors(CFG::BEGIN), &[1]);
        assert_eq!(cfg.successors(1), &[3, 2]);
        assert_eq!(cfg.successors(2), &[1]);
        assert_eq!(cfg.successors(3), &[cfg.end()]);
        assert_eq!(cfg.predecessors(1), &[0, 2]);
        assert_eq!(cfg.instruction_index(3), Some(2));
        assert_eq!(cfg.instruction_index(cfg.end()), None);
    }

    #[test]
    fn test_label_at_method_end_reaches_end() {
        let m = method(vec![Instruction::Goto("out".to_string())], &[("out", 1)]);
        let cfg = CFG::build(&m);

        assert_eq!(cfg.successors(1), &[cfg.end()]);
    }
}
