//! Component ranks.
//!
//! Each component of a path gets a dense 0-based rank counted over components
//! only; separators and out-of-bound positions get `-1`. Two encodings of the
//! same ranking are built side by side. The fold threads one accumulator per
//! position. The running sum adds up per-position 0/1 indicators. The declared
//! `component-idx` function is pinned to the fold.

use itertools::Itertools as _;
use z3::{
    ast::{self, forall_const, Ast, Bool, Int},
    Context,
    FuncDecl,
    Solver,
    Sort,
};

use super::{path::PathEncoding, string_val};

#[derive(Debug)]
pub struct ComponentIndex<'ctx> {
    ctx:           &'ctx Context,
    clauses:       Vec<Bool<'ctx>>,
    accs:          Vec<Int<'ctx>>,
    ranks:         Vec<Int<'ctx>>,
    sum_ranks:     Vec<Int<'ctx>>,
    strings:       Vec<ast::String<'ctx>>,
    component_idx: FuncDecl<'ctx>,
}

impl<'ctx> ComponentIndex<'ctx> {
    pub fn encode(ctx: &'ctx Context, path: &PathEncoding<'ctx>) -> Self {
        let name = path.name();
        let n = path.n_segments();
        let zero = Int::from_i64(ctx, 0);
        let one = Int::from_i64(ctx, 1);
        let minus_one = Int::from_i64(ctx, -1);
        let mut clauses = Vec::new();
        let mut accs: Vec<Int> = Vec::with_capacity(n);
        let mut ranks = Vec::with_capacity(n);
        let mut indicators = Vec::with_capacity(n);
        let mut sum_ranks = Vec::with_capacity(n);

        for i in 0..n {
            let is_component = path.is_component(i);

            // Fold: acc_i = acc_{i-1} + [component at i].
            let acc = Int::new_const(ctx, format!("{name}--component-idx--acc-{i}"));
            let prev = accs.last().unwrap_or(&zero);

            clauses.push(acc._eq(&is_component.ite(&Int::add(ctx, &[prev, &one]), prev)));

            let rank = Int::new_const(ctx, format!("{name}--component-idx-{i}"));

            clauses.push(rank._eq(&is_component.ite(&Int::sub(ctx, &[&acc, &one]), &minus_one)));

            // Running sum of indicators.
            let indicator = Int::fresh_const(ctx, "component-idx--indicator");

            clauses.push(is_component.ite(&indicator._eq(&one), &indicator._eq(&zero)));
            indicators.push(indicator);

            let sum = Int::add(ctx, &indicators.iter().collect_vec());

            sum_ranks.push(is_component.ite(&Int::sub(ctx, &[&sum, &one]), &minus_one));
            accs.push(acc);
            ranks.push(rank);
        }

        let component_idx = FuncDecl::new(
            ctx,
            format!("{name}--component-idx"),
            &[&Sort::int(ctx)],
            &Sort::int(ctx),
        );

        // component-idx(p) = rank_p inside the array, -1 everywhere else.
        let some_pos = Int::fresh_const(ctx, "component-idx--");
        let body = ranks
            .iter()
            .enumerate()
            .rev()
            .fold(minus_one.clone(), |acc, (i, rank)| {
                some_pos
                    ._eq(&Int::from_u64(ctx, i as u64))
                    .ite(rank, &acc)
            });

        clauses.push(forall_const(
            ctx,
            &[&some_pos],
            &[],
            &component_idx
                .apply(&[&some_pos])
                .as_int()
                .unwrap()
                ._eq(&body),
        ));

        Self {
            ctx,
            clauses,
            accs,
            ranks,
            sum_ranks,
            strings: (0..n).map(|i| path.string(i).clone()).collect(),
            component_idx,
        }
    }

    pub fn assert(&self, solver: &Solver<'ctx>) {
        self.clauses.iter().for_each(|clause| {
            solver.assert(clause);
        });
    }

    /// `component-idx(pos)`.
    pub fn component_idx(&self, pos: &Int<'ctx>) -> Int<'ctx> {
        self.component_idx.apply(&[pos]).as_int().unwrap()
    }

    /// Rank of position `i` by the fold.
    pub fn rank(&self, i: usize) -> &Int<'ctx> {
        &self.ranks[i]
    }

    /// The two encodings disagree somewhere.
    pub fn disagree(&self) -> Bool<'ctx> {
        Bool::or(
            self.ctx,
            &self
                .ranks
                .iter()
                .zip(self.sum_ranks.iter())
                .map(|(rank, sum_rank)| rank._eq(sum_rank).not())
                .collect_vec(),
        )
    }

    /// Number of components in the path.
    pub fn count(&self) -> &Int<'ctx> {
        self.accs.last().unwrap()
    }

    pub fn has_component(&self, k: usize) -> Bool<'ctx> {
        self.count().gt(&Int::from_u64(self.ctx, k as u64))
    }

    pub fn at_least(&self, n: usize) -> Bool<'ctx> {
        self.count().ge(&Int::from_u64(self.ctx, n as u64))
    }

    /// Position `i` is the last component: its rank is at least every other
    /// rank.
    pub fn is_last_component(&self, i: usize) -> Bool<'ctx> {
        let rank = &self.ranks[i];
        let mut clauses = vec![rank.ge(&Int::from_i64(self.ctx, 0))];

        clauses.extend(self.ranks.iter().map(|other| rank.ge(other)));

        Bool::and(self.ctx, &clauses)
    }

    /// Name of the `k`-th component, or the empty string if there is none.
    pub fn component_name(&self, k: usize) -> ast::String<'ctx> {
        let k = Int::from_u64(self.ctx, k as u64);

        self.ranks
            .iter()
            .zip(self.strings.iter())
            .rev()
            .fold(string_val(self.ctx, ""), |acc, (rank, string)| {
                rank._eq(&k).ite(string, &acc)
            })
    }
}
