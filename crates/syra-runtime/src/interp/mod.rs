//! Pattern-directed rewriting interpreter.
//!
//! Evaluation of an atom yields zero-or-more results under a bounded depth
//! budget and per-path cycle detection. For expressions, three strategies
//! are tried in order (rule rewriting, grounded-function application,
//! structural fallback), each potentially multi-valued; ambiguity is
//! surfaced to the caller, not silently resolved.

mod builtins;

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::engine::EngineSymbols;
use crate::metrics::MetricsCollector;
use crate::space::AtomSpace;
use syra_core::{substitute, unify, Atom, AtomId, Bindings, RuntimeError};

/// Evaluation budget. Depth is the sole cancellation mechanism for runaway
/// rewriting; bounding wall-clock work is a configuration concern.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Maximum recursion depth per evaluation.
    pub max_depth: usize,
    /// Cap on collected results per evaluation step.
    pub max_results: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_results: 32,
        }
    }
}

impl EvalConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("max_depth must be greater than zero".into());
        }
        if self.max_results == 0 {
            return Err("max_results must be greater than zero".into());
        }
        Ok(())
    }
}

/// A grounded host function. Returning `None` means "no applicable result":
/// a domain violation such as divide by zero or a bad argument shape
/// declines to fire rather than raising.
pub type GroundedFn = Arc<dyn Fn(&AtomSpace, &[Atom]) -> Option<Atom> + Send + Sync>;

/// The rewriting interpreter. Cheap to share behind an `Arc`; all state is
/// in the space and the function registry.
pub struct Interpreter {
    space: Arc<AtomSpace>,
    symbols: Arc<EngineSymbols>,
    metrics: Arc<MetricsCollector>,
    functions: DashMap<String, GroundedFn>,
    config: EvalConfig,
}

impl Interpreter {
    pub fn new(
        space: Arc<AtomSpace>,
        symbols: Arc<EngineSymbols>,
        metrics: Arc<MetricsCollector>,
        config: EvalConfig,
    ) -> Result<Self, RuntimeError> {
        config.validate().map_err(RuntimeError::Config)?;
        let interp = Self {
            space,
            symbols,
            metrics,
            functions: DashMap::new(),
            config,
        };
        builtins::register(&interp);
        Ok(interp)
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Register (or replace) a grounded function under a head-symbol name.
    pub fn register_function(&self, name: &str, f: GroundedFn) {
        self.functions.insert(name.to_string(), f);
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Evaluate with the default depth budget.
    ///
    /// Drops the original expression from the result set when at least one
    /// different result exists, otherwise returns exactly the original;
    /// callers can always distinguish progress from a stall.
    pub fn eval(&self, atom: &Atom) -> Vec<Atom> {
        self.eval_with_depth(atom, self.config.max_depth)
    }

    pub fn eval_with_depth(&self, atom: &Atom, depth: usize) -> Vec<Atom> {
        let raw = self.eval_depth(atom, depth, &HashSet::new());
        let progressed: Vec<Atom> = raw.into_iter().filter(|r| r != atom).collect();
        if progressed.is_empty() {
            vec![atom.clone()]
        } else {
            progressed
        }
    }

    /// Single-result evaluation: the raw result set ranked by the belief
    /// score of each result atom in the space (unknown atoms rank zero).
    pub fn eval_best(&self, atom: &Atom) -> Atom {
        let results = self.eval(atom);
        let mut best: Option<(f64, Atom)> = None;
        for result in results {
            let score = self
                .space
                .value(&result)
                .map(|v| v.belief.score())
                .unwrap_or(0.0);
            match &best {
                Some((top, _)) if *top >= score => {}
                _ => best = Some((score, result)),
            }
        }
        best.map(|(_, atom)| atom)
            .unwrap_or_else(|| atom.clone())
    }

    /// Core recursive evaluation. `visited` is the set of atoms on *this*
    /// evaluation path; it is cloned at each branch so sibling derivations
    /// do not poison each other.
    fn eval_depth(&self, atom: &Atom, depth: usize, visited: &HashSet<AtomId>) -> Vec<Atom> {
        if depth == 0 || !atom.is_expression() {
            return vec![atom.clone()];
        }
        if visited.contains(&atom.id()) {
            return vec![atom.clone()];
        }
        let mut visited = visited.clone();
        visited.insert(atom.id());

        // Strategy 1: rule rewriting.
        let results = self.rewrite(atom, depth, &visited);
        if !results.is_empty() {
            return results;
        }

        // Strategy 2: grounded-function application, only when rewriting
        // produced nothing and the head is a registered function.
        if let Some(results) = self.apply_grounded(atom, depth, &visited) {
            return results;
        }

        // Strategy 3: structural fallback. Always yields something, which
        // makes evaluation total.
        self.structural(atom, depth, &visited)
    }

    /// Query `(= pattern template)` facts and rewrite through every match.
    fn rewrite(&self, atom: &Atom, depth: usize, visited: &HashSet<AtomId>) -> Vec<Atom> {
        let rule_pattern = self.space.expr(vec![
            self.symbols.eq.clone(),
            self.symbols.rule_lhs.clone(),
            self.symbols.rule_rhs.clone(),
        ]);
        self.metrics.record_query();

        let mut results: Vec<Atom> = Vec::new();
        let mut seen: HashSet<AtomId> = HashSet::new();

        for rule in self.space.query(&rule_pattern) {
            let lhs = rule.bindings.resolve(&self.symbols.rule_lhs);
            let rhs = rule.bindings.resolve(&self.symbols.rule_rhs);
            let Some(bindings) = unify(atom, &lhs, &Bindings::new()) else {
                continue;
            };
            let rewritten = substitute(self.space.interner(), &rhs, &bindings);
            self.metrics.record_rewrite();
            tracing::trace!(from = %atom, to = %rewritten, "rule rewrite");

            for result in self.eval_depth(&rewritten, depth - 1, visited) {
                if seen.insert(result.id()) {
                    results.push(result);
                }
                if results.len() >= self.config.max_results {
                    return results;
                }
            }
        }
        results
    }

    /// Eagerly evaluate arguments and call the registered head function.
    ///
    /// A call fires only if every argument evaluates to exactly one
    /// unambiguous result. `None` from the function (a domain fault) means
    /// non-firing, which falls through to the structural strategy.
    fn apply_grounded(
        &self,
        atom: &Atom,
        depth: usize,
        visited: &HashSet<AtomId>,
    ) -> Option<Vec<Atom>> {
        let children = atom.children()?;
        let name = children.first()?.symbol_name()?;
        let function = self.functions.get(name)?.clone();

        let mut args = Vec::with_capacity(children.len().saturating_sub(1));
        for child in &children[1..] {
            let mut evaluated = self.eval_depth(child, depth - 1, visited);
            if evaluated.len() != 1 {
                // Ambiguous or empty argument blocks the call.
                return None;
            }
            args.push(evaluated.remove(0));
        }

        self.metrics.record_grounded_call();
        let output = function(&self.space, &args)?;
        Some(self.eval_depth(&output, depth - 1, visited))
    }

    /// Evaluate head and children independently; if anything changed, the
    /// rebuilt expression is the sole result, else the original.
    fn structural(&self, atom: &Atom, depth: usize, visited: &HashSet<AtomId>) -> Vec<Atom> {
        let children = match atom.children() {
            Some(children) if !children.is_empty() => children,
            _ => return vec![atom.clone()],
        };

        let mut changed = false;
        let rebuilt: Vec<Atom> = children
            .iter()
            .map(|child| {
                let mut results = self.eval_depth(child, depth - 1, visited);
                if results.len() == 1 {
                    let result = results.remove(0);
                    if result != *child {
                        changed = true;
                    }
                    result
                } else {
                    // An ambiguous child keeps its original form here; the
                    // ambiguity stays reachable through direct evaluation.
                    child.clone()
                }
            })
            .collect();

        if changed {
            vec![self.space.expr(rebuilt)]
        } else {
            vec![atom.clone()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSymbols;
    use crate::space::SpaceConfig;
    use syra_core::parse_one;

    fn interpreter() -> (Arc<AtomSpace>, Interpreter) {
        let space = Arc::new(AtomSpace::new(SpaceConfig::default()).unwrap());
        let symbols = Arc::new(EngineSymbols::new(&space));
        let metrics = Arc::new(MetricsCollector::new());
        let interp =
            Interpreter::new(Arc::clone(&space), symbols, metrics, EvalConfig::default()).unwrap();
        (space, interp)
    }

    fn load(space: &AtomSpace, texts: &[&str]) {
        for text in texts {
            let atom = parse_one(space.interner(), text).unwrap();
            space.add(&atom);
        }
    }

    #[test]
    fn non_expressions_evaluate_to_themselves() {
        let (space, interp) = interpreter();
        for atom in [space.sym("a"), space.var("x"), space.int(7)] {
            assert_eq!(interp.eval(&atom), vec![atom.clone()]);
        }
    }

    #[test]
    fn peano_addition_rewrites_to_normal_form() {
        let (space, interp) = interpreter();
        load(
            &space,
            &["(= (Add Z $n) $n)", "(= (Add (S $m) $n) (S (Add $m $n)))"],
        );
        let input = parse_one(space.interner(), "(Add (S (S Z)) (S Z))").unwrap();
        let expected = parse_one(space.interner(), "(S (S (S Z)))").unwrap();
        assert_eq!(interp.eval(&input), vec![expected]);
    }

    #[test]
    fn ambiguous_rules_surface_all_results() {
        let (space, interp) = interpreter();
        load(&space, &["(= (coin) heads)", "(= (coin) tails)"]);
        let input = parse_one(space.interner(), "(coin)").unwrap();
        let results = interp.eval(&input);
        assert_eq!(results.len(), 2);
        assert!(results.contains(&space.sym("heads")));
        assert!(results.contains(&space.sym("tails")));
    }

    #[test]
    fn eval_is_total_on_unknown_expressions() {
        let (space, interp) = interpreter();
        let input = parse_one(space.interner(), "(no rules here)").unwrap();
        assert_eq!(interp.eval(&input), vec![input.clone()]);
    }

    #[test]
    fn self_referential_rule_terminates() {
        let (space, interp) = interpreter();
        load(&space, &["(= (loop) (loop))"]);
        let input = parse_one(space.interner(), "(loop)").unwrap();
        assert_eq!(interp.eval(&input), vec![input.clone()]);
    }

    #[test]
    fn mutual_recursion_terminates() {
        let (space, interp) = interpreter();
        load(&space, &["(= (ping) (pong))", "(= (pong) (ping))"]);
        let input = parse_one(space.interner(), "(ping)").unwrap();
        // The two-cycle folds back onto the input: no normal form exists,
        // so evaluation reports a stall instead of looping.
        let results = interp.eval(&input);
        assert_eq!(results, vec![input.clone()]);
    }

    #[test]
    fn depth_budget_bounds_rewriting() {
        let (space, interp) = interpreter();
        load(&space, &["(= (count $n) (count (S $n)))"]);
        let input = parse_one(space.interner(), "(count Z)").unwrap();
        // Must terminate; the exact stall point depends on the budget.
        let results = interp.eval_with_depth(&input, 8);
        assert!(!results.is_empty());
    }

    #[test]
    fn grounded_arithmetic_applies() {
        let (space, interp) = interpreter();
        let input = parse_one(space.interner(), "(+ 1 2)").unwrap();
        assert_eq!(interp.eval(&input), vec![space.int(3)]);

        let nested = parse_one(space.interner(), "(* (+ 1 2) 4)").unwrap();
        assert_eq!(interp.eval(&nested), vec![space.int(12)]);
    }

    #[test]
    fn rules_take_precedence_over_grounded_functions() {
        let (space, interp) = interpreter();
        load(&space, &["(= (+ 1 2) overridden)"]);
        let input = parse_one(space.interner(), "(+ 1 2)").unwrap();
        assert_eq!(interp.eval(&input), vec![space.sym("overridden")]);
    }

    #[test]
    fn division_fault_falls_back_structurally() {
        let (space, interp) = interpreter();
        let input = parse_one(space.interner(), "(/ 4 0)").unwrap();
        assert_eq!(interp.eval(&input), vec![input.clone()]);
    }

    #[test]
    fn structural_fallback_rebuilds_changed_children() {
        let (space, interp) = interpreter();
        load(&space, &["(= (two) 2)"]);
        let input = parse_one(space.interner(), "(pair (two) (two))").unwrap();
        let expected = parse_one(space.interner(), "(pair 2 2)").unwrap();
        assert_eq!(interp.eval(&input), vec![expected]);
    }

    #[test]
    fn no_progress_result_implies_nothing_applied() {
        let (space, interp) = interpreter();
        let input = parse_one(space.interner(), "(opaque term)").unwrap();
        let results = interp.eval(&input);
        assert_eq!(results, vec![input]);
        // Totality plus the progress contract: a single result equal to the
        // input is exactly the stalled case.
    }

    #[test]
    fn eval_best_ranks_by_belief_score() {
        let (space, interp) = interpreter();
        load(&space, &["(= (coin) heads)", "(= (coin) tails)"]);
        let heads = space.sym("heads");
        let tails = space.sym("tails");
        space.add(&heads);
        space.add(&tails);
        space.update_value(&heads, |v| v.belief = syra_core::Belief::new(0.2, 1.0));
        space.update_value(&tails, |v| v.belief = syra_core::Belief::new(0.9, 5.0));

        let input = parse_one(space.interner(), "(coin)").unwrap();
        assert_eq!(interp.eval_best(&input), tails);
    }

    #[test]
    fn registered_functions_can_decline() {
        let (space, interp) = interpreter();
        interp.register_function(
            "pick-positive",
            Arc::new(|space, args| {
                let value = args.first()?.grounded_value()?.as_int()?;
                if value > 0 {
                    Some(space.int(value))
                } else {
                    None
                }
            }),
        );
        let hit = parse_one(space.interner(), "(pick-positive 3)").unwrap();
        assert_eq!(interp.eval(&hit), vec![space.int(3)]);

        let miss = parse_one(space.interner(), "(pick-positive -3)").unwrap();
        assert_eq!(interp.eval(&miss), vec![miss.clone()]);
    }
}
