use std::collections::{HashMap, HashSet, VecDeque};

use crate::ir::cfg::{NodeId, CFG};
use crate::ir::{Callee, Instruction, Method, Operand, RECEIVER};

#[derive(Debug, Clone, Default)]
pub struct NodeLiveness {
    pub live_in: HashSet<String>,      // Variables live on entry to this node
    pub live_out: HashSet<String>,     // Variables live on exit from this node
    pub use_set: HashSet<String>,      // Variables read by this node
    pub def_set: HashSet<String>,      // Variable written by this node
}

pub type LivenessResult = HashMap<NodeId, NodeLiveness>;

pub fn analyse(method: &Method, cfg: &CFG) -> LivenessResult {
    let mut result: LivenessResult = HashMap::new();

    for node in 0..cfg.node_count() {
        let mut liveness = NodeLiveness::default();
        if let Some(index) = cfg.instruction_index(node) {
            let instr = &method.instructions[index];
            collect_uses(instr, &mut liveness.use_set);
            if let Some(name) = defined_name(instr) {
                liveness.def_set.insert(name);
            }
        }
        result.insert(node, liveness);
    }

    // Backward problem: visiting nodes last-first converges quickly on straight-line code.
    let mut worklist: VecDeque<NodeId> = (0..cfg.node_count()).rev().collect();
    let mut queued: HashSet<NodeId> = worklist.iter().copied().collect();

    while let Some(node) = worklist.pop_front() {
        queued.remove(&node);

        let mut new_live_out: HashSet<String> = HashSet::new();
        for succ in cfg.successors(node) {
            if let Some(succ_liveness) = result.get(succ) {
                new_live_out.extend(succ_liveness.live_in.iter().cloned());
            }
        }

        let Some(liveness) = result.get_mut(&node) else {
            continue;
        };
        let new_live_in: HashSet<String> = liveness
            .use_set
            .iter()
            .chain(new_live_out.difference(&liveness.def_set))
            .cloned()
            .collect();

        liveness.live_out = new_live_out;
        if new_live_in != liveness.live_in {
            liveness.live_in = new_live_in;
            for &pred in cfg.predecessors(node) {
                if queued.insert(pred) {
                    worklist.push_back(pred);
                }
            }
        }
    }

    result
}

/// The variable or temporary an instruction assigns, if any.
pub fn defined_name(instr: &Instruction) -> Option<String> {
    match instr {
        Instruction::Assign { dest, .. } => match dest {
            Operand::ArrayElement { .. } => None,
            other => other.slot_name().filter(|name| name != RECEIVER),
        },
        _ => None,
    }
}

fn collect_uses(instr: &Instruction, uses: &mut HashSet<String>) {
    match instr {
        Instruction::Assign { dest, rhs } => {
            if let Operand::ArrayElement { base, index } = dest {
                operand_uses(base, uses);
                operand_uses(index, uses);
            }
            collect_uses(rhs, uses);
        }
        Instruction::BinaryOp { left, right, .. } => {
            operand_uses(left, uses);
            operand_uses(right, uses);
        }
        Instruction::UnaryOp { operand, .. } | Instruction::Load(operand) => operand_uses(operand, uses),
        Instruction::Call(call) => {
            if let Callee::Object(object) = &call.callee {
                operand_uses(object, uses);
            }
            for arg in &call.args {
                operand_uses(arg, uses);
            }
        }
        Instruction::PutField { value, .. } => operand_uses(value, uses),
        Instruction::CondBranch { cond, .. } => operand_uses(cond, uses),
        Instruction::Return(Some(value)) => operand_uses(value, uses),
        Instruction::GetField { .. } | Instruction::Goto(_) | Instruction::Return(None) => {}
    }
}

fn operand_uses(operand: &Operand, uses: &mut HashSet<String>) {
    match operand {
        Operand::Literal { .. } => {}
        Operand::ArrayElement { base, index } => {
            operand_uses(base, uses);
            operand_uses(index, uses);
        }
        other => {
            if let Some(name) = other.slot_name().filter(|name| name != RECEIVER) {
                uses.insert(name);
            }
        }
    }
}
