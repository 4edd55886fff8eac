//! Unification and substitution over atoms.
//!
//! Both are pure with respect to the store: `unify` only reads atoms and
//! produces bindings, `substitute` re-interns rebuilt expressions through
//! the interner it is given.

use std::collections::HashSet;

use crate::atom::{Atom, AtomKind, Interner};
use crate::bindings::Bindings;

/// Unify `a` against `b` under existing bindings.
///
/// Returns the extended bindings on success, `None` on mismatch; failure is
/// a normal negative result, never an error. Uses an explicit worklist so
/// deeply nested expressions cannot overflow the stack.
pub fn unify(a: &Atom, b: &Atom, bindings: &Bindings) -> Option<Bindings> {
    let mut out = bindings.clone();
    let mut work: Vec<(Atom, Atom)> = vec![(a.clone(), b.clone())];

    while let Some((x, y)) = work.pop() {
        // Resolving first means an already-bound variable is unified against
        // its existing binding instead of being overwritten.
        let x = out.resolve(&x);
        let y = out.resolve(&y);
        if x == y {
            continue;
        }
        match (x.kind(), y.kind()) {
            (AtomKind::Variable(_), _) => bind(&mut out, x, y)?,
            (_, AtomKind::Variable(_)) => bind(&mut out, y, x)?,
            (AtomKind::Expression(xs), AtomKind::Expression(ys)) => {
                if xs.len() != ys.len() {
                    return None;
                }
                for (cx, cy) in xs.iter().zip(ys.iter()) {
                    work.push((cx.clone(), cy.clone()));
                }
            }
            // Symbols and grounded atoms are interned: different ids means
            // different terms. Mixed shapes never unify.
            _ => return None,
        }
    }

    Some(out)
}

fn bind(bindings: &mut Bindings, var: Atom, value: Atom) -> Option<()> {
    if occurs(&var, &value, bindings) {
        return None;
    }
    bindings.insert(var, value);
    Some(())
}

/// Occurs check: does `atom`, resolved transitively through `bindings`,
/// contain `var`? Rejecting this keeps every binding finite.
fn occurs(var: &Atom, atom: &Atom, bindings: &Bindings) -> bool {
    let mut stack = vec![atom.clone()];
    let mut seen: HashSet<u64> = HashSet::new();

    while let Some(candidate) = stack.pop() {
        let candidate = bindings.resolve(&candidate);
        if candidate == *var {
            return true;
        }
        if !seen.insert(candidate.id()) {
            continue;
        }
        if let AtomKind::Expression(children) = candidate.kind() {
            stack.extend(children.iter().cloned());
        }
    }
    false
}

/// Rebuild `atom` with bound variables replaced.
///
/// Variables resolve transitively through chains; expressions are only
/// re-interned when a child actually changed, so fully ground terms come
/// back as the same canonical atom.
pub fn substitute(interner: &Interner, atom: &Atom, bindings: &Bindings) -> Atom {
    match atom.kind() {
        AtomKind::Variable(_) => {
            let resolved = bindings.resolve(atom);
            if resolved == *atom {
                resolved
            } else {
                // The binding's value may itself contain further variables.
                // The occurs check guarantees the binding graph is acyclic,
                // so this recursion terminates.
                substitute(interner, &resolved, bindings)
            }
        }
        AtomKind::Expression(children) => {
            let mut changed = false;
            let rebuilt: Vec<Atom> = children
                .iter()
                .map(|child| {
                    let sub = substitute(interner, child, bindings);
                    if sub != *child {
                        changed = true;
                    }
                    sub
                })
                .collect();
            if changed {
                interner.expression(rebuilt)
            } else {
                atom.clone()
            }
        }
        _ => atom.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Interner;

    fn expr(interner: &Interner, parts: Vec<Atom>) -> Atom {
        interner.expression(parts)
    }

    #[test]
    fn unify_binds_variables_both_ways() {
        let i = Interner::new();
        let x = i.variable("x");
        let a = i.symbol("a");

        let left = unify(&x, &a, &Bindings::new()).unwrap();
        assert_eq!(left.resolve(&x), a);

        let right = unify(&a, &x, &Bindings::new()).unwrap();
        assert_eq!(right.resolve(&x), a);
    }

    #[test]
    fn unify_expressions_pairwise() {
        let i = Interner::new();
        let pattern = expr(
            &i,
            vec![i.symbol("Color"), i.variable("f"), i.symbol("Red")],
        );
        let fact = expr(
            &i,
            vec![i.symbol("Color"), i.symbol("Apple"), i.symbol("Red")],
        );

        let bindings = unify(&pattern, &fact, &Bindings::new()).unwrap();
        assert_eq!(bindings.resolve(&i.variable("f")), i.symbol("Apple"));
    }

    #[test]
    fn unify_rejects_arity_and_shape_mismatches() {
        let i = Interner::new();
        let two = expr(&i, vec![i.symbol("f"), i.symbol("a")]);
        let three = expr(&i, vec![i.symbol("f"), i.symbol("a"), i.symbol("b")]);
        assert!(unify(&two, &three, &Bindings::new()).is_none());
        assert!(unify(&i.symbol("a"), &i.symbol("b"), &Bindings::new()).is_none());
        assert!(unify(&i.symbol("a"), &two, &Bindings::new()).is_none());
        assert!(unify(&i.int(1), &i.int(2), &Bindings::new()).is_none());
    }

    #[test]
    fn occurs_check_rejects_infinite_terms() {
        let i = Interner::new();
        let x = i.variable("x");
        let fx = expr(&i, vec![i.symbol("f"), x.clone()]);
        assert!(unify(&x, &fx, &Bindings::new()).is_none());
        assert!(unify(&fx, &x, &Bindings::new()).is_none());
    }

    #[test]
    fn occurs_check_sees_through_bindings() {
        let i = Interner::new();
        let x = i.variable("x");
        let y = i.variable("y");
        let fy = expr(&i, vec![i.symbol("f"), y.clone()]);

        // x := (f $y), then y := x would make x infinite.
        let bindings = unify(&x, &fy, &Bindings::new()).unwrap();
        assert!(unify(&y, &x, &bindings).is_none());
    }

    #[test]
    fn bound_variable_re_unifies_against_existing_binding() {
        let i = Interner::new();
        let x = i.variable("x");
        let pattern = expr(&i, vec![i.symbol("p"), x.clone(), x.clone()]);

        let same = expr(&i, vec![i.symbol("p"), i.symbol("a"), i.symbol("a")]);
        assert!(unify(&pattern, &same, &Bindings::new()).is_some());

        let diff = expr(&i, vec![i.symbol("p"), i.symbol("a"), i.symbol("b")]);
        assert!(unify(&pattern, &diff, &Bindings::new()).is_none());
    }

    #[test]
    fn unification_soundness() {
        // If unify(p, i, {}) = B then substitute(p, B) == substitute(i, B).
        let i = Interner::new();
        let pattern = expr(
            &i,
            vec![
                i.symbol("pair"),
                i.variable("a"),
                expr(&i, vec![i.symbol("g"), i.variable("b")]),
            ],
        );
        let instance = expr(
            &i,
            vec![
                i.symbol("pair"),
                expr(&i, vec![i.symbol("g"), i.variable("c")]),
                i.variable("a"),
            ],
        );

        let bindings = unify(&pattern, &instance, &Bindings::new()).unwrap();
        assert_eq!(
            substitute(&i, &pattern, &bindings),
            substitute(&i, &instance, &bindings)
        );
    }

    #[test]
    fn unify_handles_deep_terms_without_overflow() {
        let i = Interner::new();
        // Different leaves keep every level structurally distinct, forcing
        // the worklist to descend all 50k levels.
        let mut a = i.symbol("Z");
        let mut b = i.variable("z");
        for _ in 0..50_000 {
            a = expr(&i, vec![i.symbol("S"), a]);
            b = expr(&i, vec![i.symbol("S"), b]);
        }
        let bindings = unify(&a, &b, &Bindings::new()).unwrap();
        assert_eq!(bindings.resolve(&i.variable("z")), i.symbol("Z"));
    }

    #[test]
    fn substitute_reuses_unchanged_subtrees() {
        let i = Interner::new();
        let ground = expr(&i, vec![i.symbol("f"), i.symbol("a")]);
        let bindings = unify(&i.variable("x"), &i.symbol("q"), &Bindings::new()).unwrap();
        // No variables inside: the identical canonical atom comes back.
        assert_eq!(substitute(&i, &ground, &bindings), ground);
    }

    #[test]
    fn substitute_resolves_variable_chains() {
        let i = Interner::new();
        let x = i.variable("x");
        let y = i.variable("y");

        let b1 = unify(&x, &y, &Bindings::new()).unwrap();
        let b2 = unify(&y, &i.symbol("done"), &b1).unwrap();

        let term = expr(&i, vec![i.symbol("wrap"), x]);
        assert_eq!(
            substitute(&i, &term, &b2),
            expr(&i, vec![i.symbol("wrap"), i.symbol("done")])
        );
    }
}
