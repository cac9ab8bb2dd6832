//! Peephole passes over the parsed program.
//!
//! Four passes run in a fixed order: merge runs of `>`/`<` and `+`/`-`,
//! fold `[-]`-shaped loops into a single store, drop loops that open
//! the program (the tape starts zeroed, so they never run), and finally
//! rebuild the jump indices that the earlier passes invalidated.
//! Every pass is total over parser output and the whole pipeline is
//! idempotent.

use crate::ir::{Inst, Program};

/// Runs every pass in order.
pub fn optimize(program: Program) -> Program {
    let mut program = merge_runs(program);
    program = fold_zero_loops(program);
    program = strip_dead_prologue(program);
    relink_jumps(&mut program);
    program
}

/// Sums neighboring instructions of the same pointer- or value-moving
/// kind into the last emitted entry, dropping entries that cancel out
/// to zero.
fn merge_runs(program: Program) -> Program {
    use Inst::*;

    let mut result: Program = Vec::with_capacity(program.len());

    for inst in program {
        match (result.last_mut(), inst) {
            (Some(MovePtr(x)), MovePtr(y)) => *x += y,
            (Some(AddVal(x)), AddVal(y)) => *x += y,
            _ => {
                result.push(inst);
                continue;
            }
        }
        if matches!(result.last(), Some(MovePtr(0) | AddVal(0))) {
            result.pop();
        }
    }

    result
}

/// Replaces each `LoopBegin, AddVal(±1), LoopEnd` triple with `SetZero`.
///
/// Recognition is deliberately conservative: any other loop body, and
/// any `AddVal` amount other than ±1, is left alone. Scanning resumes
/// after a replaced triple, which is all it takes for the pass to be
/// precise (a `SetZero` can never complete another triple).
fn fold_zero_loops(program: Program) -> Program {
    use Inst::*;

    let mut result: Program = Vec::with_capacity(program.len());
    let mut i = 0;

    while i < program.len() {
        match program[i..] {
            [LoopBegin(_), AddVal(1 | -1), LoopEnd(_), ..] => {
                result.push(SetZero);
                i += 3;
            }
            _ => {
                result.push(program[i]);
                i += 1;
            }
        }
    }

    result
}

/// Discards every loop sitting at the very start of the program. All
/// cells are zero when execution begins, so those loops are never
/// entered.
fn strip_dead_prologue(program: Program) -> Program {
    use Inst::*;

    let mut i = 0;
    while let Some(LoopBegin(_)) = program.get(i) {
        let mut depth = 1;
        i += 1;
        while i < program.len() && depth > 0 {
            match program[i] {
                LoopBegin(_) => depth += 1,
                LoopEnd(_) => depth -= 1,
                _ => {}
            }
            i += 1;
        }
    }

    program[i..].to_vec()
}

/// Rebuilds the mutual jump indices after positions have shifted.
fn relink_jumps(program: &mut Program) {
    use Inst::*;

    let mut stack: Vec<usize> = Vec::new();
    for i in 0..program.len() {
        match program[i] {
            LoopBegin(_) => stack.push(i),
            LoopEnd(_) => {
                let open = stack
                    .pop()
                    .expect("unbalanced brackets survived parsing");
                program[i] = LoopEnd(open);
                program[open] = LoopBegin(i);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse;
    use Inst::*;

    /// The program invariants the back ends lean on.
    fn assert_invariants(program: &[Inst]) {
        // no mergeable neighbors, no zero amounts
        for pair in program.windows(2) {
            assert!(
                !matches!(pair, [MovePtr(_), MovePtr(_)] | [AddVal(_), AddVal(_)]),
                "unmerged run: {:?}",
                pair
            );
        }
        assert!(!program.contains(&AddVal(0)));
        assert!(!program.contains(&MovePtr(0)));

        // no loop opens the program
        assert!(!matches!(program.first(), Some(LoopBegin(_))));

        // no zero-loop triple survives
        for w in program.windows(3) {
            assert!(!matches!(
                w,
                [LoopBegin(_), AddVal(1 | -1), LoopEnd(_)]
            ));
        }

        // brackets balanced and mutually indexed
        let mut stack = Vec::new();
        for (i, inst) in program.iter().enumerate() {
            match *inst {
                LoopBegin(_) => stack.push(i),
                LoopEnd(open) => {
                    assert_eq!(stack.pop(), Some(open));
                    assert_eq!(program[open], LoopBegin(i));
                }
                _ => {}
            }
        }
        assert!(stack.is_empty());
    }

    fn optimized(source: &[u8]) -> Program {
        optimize(parse(source).unwrap())
    }

    #[test]
    fn merges_runs_of_like_instructions() {
        assert_eq!(optimized(b"+++>>>--"), vec![AddVal(3), MovePtr(3), AddVal(-2)]);
    }

    #[test]
    fn runs_that_cancel_out_disappear() {
        assert_eq!(optimized(b"+-><"), vec![]);
        assert_eq!(optimized(b".+-."), vec![Output, Output]);
    }

    #[test]
    fn merging_does_not_cross_brackets() {
        // the AddVals on either side of the loop must stay separate
        let program = optimized(b"+.+[,]+");
        assert_eq!(
            program,
            vec![
                AddVal(1),
                Output,
                AddVal(1),
                LoopBegin(5),
                Input,
                LoopEnd(3),
                AddVal(1)
            ]
        );
    }

    #[test]
    fn folds_zero_loops_of_both_signs() {
        assert_eq!(optimized(b"+[-]"), vec![AddVal(1), SetZero]);
        assert_eq!(optimized(b"+[+]"), vec![AddVal(1), SetZero]);
    }

    #[test]
    fn leaves_fatter_loop_bodies_alone() {
        // `[--]` halves-to-zero only for even cells; it must not fold
        let program = optimized(b"+[--]");
        assert_eq!(
            program,
            vec![AddVal(1), LoopBegin(3), AddVal(-2), LoopEnd(1)]
        );
    }

    #[test]
    fn strips_loops_at_the_start_of_the_program() {
        assert_eq!(optimized(b"[>>>>>>>>>]"), vec![]);
        assert_eq!(optimized(b"[.][,[.]]."), vec![Output]);
    }

    #[test]
    fn dead_prologue_stops_at_the_first_real_instruction() {
        let program = optimized(b"[.]+[.]");
        assert_eq!(
            program,
            vec![AddVal(1), LoopBegin(3), Output, LoopEnd(1)]
        );
    }

    #[test]
    fn relinks_jumps_after_shifting() {
        // merging shrinks the body, so the original indices are stale
        let program = optimized(b"+[>>><<<-]");
        assert_eq!(
            program,
            vec![AddVal(1), LoopBegin(3), AddVal(-1), LoopEnd(1)]
        );
    }

    #[test]
    fn is_idempotent() {
        for source in [
            &b"+++[>++[>+<-]<-]>>."[..],
            b"[-][+]+[,.]",
            b"++++++++[>++++++++<-]>+.",
        ] {
            let once = optimized(source);
            let twice = optimize(once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn output_satisfies_the_program_invariants() {
        for source in [
            &b"+++[>++[>+<-]<-]>>."[..],
            b"[-]+[,.]",
            b"+-",
            b"[][][]+[[]]",
            b"++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.",
        ] {
            assert_invariants(&optimized(source));
        }
    }
}
