//! Built-in grounded arithmetic and comparison functions.
//!
//! All of these decline (`None`) on wrong arity, non-numeric arguments, or
//! domain violations such as division by zero; the interpreter then falls
//! through to its structural strategy.

use std::sync::Arc;

use crate::interp::Interpreter;
use crate::space::AtomSpace;
use syra_core::{Atom, GroundedValue};

pub(crate) fn register(interp: &Interpreter) {
    interp.register_function("+", Arc::new(|s, a| binary(s, a, i64::checked_add, |x, y| x + y)));
    interp.register_function("-", Arc::new(|s, a| binary(s, a, i64::checked_sub, |x, y| x - y)));
    interp.register_function("*", Arc::new(|s, a| binary(s, a, i64::checked_mul, |x, y| x * y)));
    interp.register_function("/", Arc::new(divide));
    interp.register_function("<", Arc::new(|s, a| compare(s, a, |x, y| x < y)));
    interp.register_function(">", Arc::new(|s, a| compare(s, a, |x, y| x > y)));
    interp.register_function("==", Arc::new(equals));
}

fn pair(args: &[Atom]) -> Option<(&GroundedValue, &GroundedValue)> {
    match args {
        [a, b] => Some((a.grounded_value()?, b.grounded_value()?)),
        _ => None,
    }
}

fn binary(
    space: &AtomSpace,
    args: &[Atom],
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Option<Atom> {
    match pair(args)? {
        (GroundedValue::Int(x), GroundedValue::Int(y)) => int_op(*x, *y).map(|r| space.int(r)),
        (a, b) => {
            let result = float_op(a.as_f64()?, b.as_f64()?);
            result.is_finite().then(|| space.float(result))
        }
    }
}

fn divide(space: &AtomSpace, args: &[Atom]) -> Option<Atom> {
    match pair(args)? {
        // checked_div also covers i64::MIN / -1.
        (GroundedValue::Int(x), GroundedValue::Int(y)) => {
            x.checked_div(*y).map(|r| space.int(r))
        }
        (a, b) => {
            let denominator = b.as_f64()?;
            if denominator == 0.0 {
                return None;
            }
            let result = a.as_f64()? / denominator;
            result.is_finite().then(|| space.float(result))
        }
    }
}

fn compare(space: &AtomSpace, args: &[Atom], op: impl Fn(f64, f64) -> bool) -> Option<Atom> {
    let (a, b) = pair(args)?;
    Some(space.boolean(op(a.as_f64()?, b.as_f64()?)))
}

fn equals(space: &AtomSpace, args: &[Atom]) -> Option<Atom> {
    match args {
        // Interned identity makes this structural equality for any shapes.
        [a, b] => Some(space.boolean(a == b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSymbols;
    use crate::interp::EvalConfig;
    use crate::metrics::MetricsCollector;
    use crate::space::SpaceConfig;
    use syra_core::parse_one;

    fn interp() -> (Arc<AtomSpace>, Interpreter) {
        let space = Arc::new(AtomSpace::new(SpaceConfig::default()).unwrap());
        let symbols = Arc::new(EngineSymbols::new(&space));
        let interp = Interpreter::new(
            Arc::clone(&space),
            symbols,
            Arc::new(MetricsCollector::new()),
            EvalConfig::default(),
        )
        .unwrap();
        (space, interp)
    }

    fn eval_text(space: &AtomSpace, interp: &Interpreter, text: &str) -> Vec<Atom> {
        interp.eval(&parse_one(space.interner(), text).unwrap())
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        let (space, interp) = interp();
        assert_eq!(eval_text(&space, &interp, "(+ 2 3)"), vec![space.int(5)]);
        assert_eq!(eval_text(&space, &interp, "(- 2 3)"), vec![space.int(-1)]);
        assert_eq!(eval_text(&space, &interp, "(/ 7 2)"), vec![space.int(3)]);
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let (space, interp) = interp();
        assert_eq!(
            eval_text(&space, &interp, "(* 2 1.5)"),
            vec![space.float(3.0)]
        );
    }

    #[test]
    fn comparisons_yield_booleans() {
        let (space, interp) = interp();
        assert_eq!(
            eval_text(&space, &interp, "(< 1 2)"),
            vec![space.boolean(true)]
        );
        assert_eq!(
            eval_text(&space, &interp, "(> 1 2)"),
            vec![space.boolean(false)]
        );
        assert_eq!(
            eval_text(&space, &interp, "(== foo foo)"),
            vec![space.boolean(true)]
        );
        assert_eq!(
            eval_text(&space, &interp, "(== foo bar)"),
            vec![space.boolean(false)]
        );
    }

    #[test]
    fn domain_violations_do_not_fire() {
        let (space, interp) = interp();
        // Division by zero, integer and float.
        let int_div = parse_one(space.interner(), "(/ 4 0)").unwrap();
        assert_eq!(interp.eval(&int_div), vec![int_div.clone()]);
        let float_div = parse_one(space.interner(), "(/ 4.0 0.0)").unwrap();
        assert_eq!(interp.eval(&float_div), vec![float_div.clone()]);
        // Non-numeric operands.
        let bad = parse_one(space.interner(), "(+ foo 1)").unwrap();
        assert_eq!(interp.eval(&bad), vec![bad.clone()]);
        // Integer overflow declines rather than wrapping.
        let overflow = space.expr(vec![space.sym("+"), space.int(i64::MAX), space.int(1)]);
        assert_eq!(interp.eval(&overflow), vec![overflow.clone()]);
    }
}
