//! Step-by-step resolution of the path parameter against the encoded tree.
//!
//! Resolution threads an optional file through the path's components, left to
//! right, starting from the file behind `param-fd`. Separators are transparent.
//! A step on a name the current directory does not contain, or on an
//! already-failed state, yields `none`, unless the name being resolved is
//! `..`: such a step is left unconstrained. Parent traversal is not modeled.

use z3::{
    ast::{Ast, Bool, Dynamic},
    Context,
    Solver,
};

use crate::{
    slang::{fs::FsEncoding, index::ComponentIndex, string_val},
    Types,
};

pub const PARENT_DIR: &str = "..";

#[derive(Debug)]
pub struct Resolution<'ctx> {
    ctx:      &'ctx Context,
    clauses:  Vec<Bool<'ctx>>,
    param_fd: Dynamic<'ctx>,

    /// `states[k]` is the state before resolving component `k`.
    states: Vec<Dynamic<'ctx>>,
}

impl<'ctx> Resolution<'ctx> {
    pub fn encode(
        ctx: &'ctx Context,
        types: &Types<'ctx>,
        fs: &FsEncoding<'ctx>,
        index: &ComponentIndex<'ctx>,
        n_steps: usize,
    ) -> Self {
        let option_file = types.option_file();
        let param_fd = Dynamic::new_const(ctx, "param-fd", &types.fd);
        let start = types.file().fresh_const(ctx, "resolve--start--");
        let states = (0..=n_steps)
            .map(|k| option_file.new_const(ctx, format!("resolve--state-{k}")))
            .collect::<Vec<_>>();
        let dotdot = string_val(ctx, PARENT_DIR);
        let mut clauses = vec![
            // Ensure the fd param is chosen from the set of declared fds.
            fs.fd_in_set(&param_fd),
            fs.maps_to(&param_fd, &start),
            states[0]._eq(&option_file.some(&start)),
        ];

        for k in 0..n_steps {
            let curr = &states[k];
            let next = &states[k + 1];
            let name = index.component_name(k);
            let exists = index.has_component(k);
            let parent = option_file.inner(curr);
            let hit = Bool::and(
                ctx,
                &[option_file.is_some(curr), fs.has_entry(&parent, &name)],
            );

            clauses.push(Bool::and(ctx, &[&exists, &hit]).implies(&Bool::and(
                ctx,
                &[
                    option_file.is_some(next),
                    fs.entry(&parent, &name, &option_file.inner(next)),
                ],
            )));
            clauses.push(
                Bool::and(ctx, &[exists.clone(), hit.not(), name._eq(&dotdot).not()])
                    .implies(&option_file.is_none(next)),
            );
            clauses.push(exists.not().implies(&next._eq(curr)));
        }

        tracing::debug!(steps = n_steps, "Encoded path resolution.");

        Self {
            ctx,
            clauses,
            param_fd,
            states,
        }
    }

    pub fn assert(&self, solver: &Solver<'ctx>) {
        self.clauses.iter().for_each(|clause| {
            solver.assert(clause);
        });
    }

    pub fn param_fd(&self) -> &Dynamic<'ctx> {
        &self.param_fd
    }

    pub fn n_steps(&self) -> usize {
        self.states.len() - 1
    }

    /// State before resolving component `k`. `state(0)` is the start.
    pub fn state(&self, k: usize) -> &Dynamic<'ctx> {
        &self.states[k]
    }

    pub fn states(&self) -> impl Iterator<Item = &Dynamic<'ctx>> {
        self.states.iter()
    }

    /// State after the last component.
    pub fn result(&self) -> &Dynamic<'ctx> {
        self.states.last().unwrap()
    }

    pub fn resolves(&self, types: &Types<'ctx>) -> Bool<'ctx> {
        types.option_file().is_some(self.result())
    }

    pub fn fails(&self, types: &Types<'ctx>) -> Bool<'ctx> {
        types.option_file().is_none(self.result())
    }

    /// Resolution started from the fd named `fd`.
    pub fn starts_from(&self, fs: &FsEncoding<'ctx>, fd: &str) -> Bool<'ctx> {
        match fs.fd(fd) {
            | Some(decl) => self.param_fd._eq(&decl.fd),
            | None => Bool::from_bool(self.ctx, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use z3::{Config, SatResult};

    use super::*;
    use crate::{
        slang::{
            fs::FsEncoder,
            path::{PathEncoding, PathParam},
        },
        tree::{DirEntry, Directory, File, RegularFile},
    };

    struct Fixture<'ctx> {
        types:      Types<'ctx>,
        solver:     Solver<'ctx>,
        fs:         FsEncoding<'ctx>,
        path:       PathEncoding<'ctx>,
        resolution: Resolution<'ctx>,
    }

    fn tree() -> File {
        File::Directory(Directory {
            opened:  Some("root".to_owned()),
            entries: vec![
                DirEntry {
                    name: "f".to_owned(),
                    file: File::RegularFile(RegularFile {}),
                },
                DirEntry {
                    name: "d".to_owned(),
                    file: File::Directory(Directory {
                        opened:  Some("root/d".to_owned()),
                        entries: vec![DirEntry {
                            name: "g".to_owned(),
                            file: File::RegularFile(RegularFile {}),
                        }],
                    }),
                },
            ],
        })
    }

    fn setup(ctx: &Context) -> Fixture<'_> {
        let types = Types::new(ctx);
        let solver = Solver::new(ctx);
        let fs = FsEncoder::new(ctx, &solver, &types).encode(&tree());
        let path = PathParam::new("path".to_owned(), 6)
            .with_max_component_len(Some(2))
            .encode(ctx, &types.segment());
        let index = ComponentIndex::encode(ctx, &path);
        let resolution = Resolution::encode(ctx, &types, &fs, &index, 6);

        path.assert(&solver);
        index.assert(&solver);
        resolution.assert(&solver);

        Fixture {
            types,
            solver,
            fs,
            path,
            resolution,
        }
    }

    fn pin(fx: &Fixture, components: &[&str]) {
        fx.solver.assert(&fx.path.has_len(components.len() * 2 - 1));

        for (k, component) in components.iter().enumerate() {
            fx.solver.assert(&fx.path.component_eq(k * 2, component));
        }
    }

    #[test]
    fn existing_file_resolves() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fx = setup(&ctx);

        pin(&fx, &["d", "g"]);
        fx.solver.assert(&fx.resolution.starts_from(&fx.fs, "root"));

        assert_eq!(fx.solver.check(), SatResult::Sat);

        let model = fx.solver.get_model().unwrap();
        let option_file = fx.types.option_file();

        assert!(model
            .eval(&option_file.is_some(fx.resolution.result()), true)
            .unwrap()
            .as_bool()
            .unwrap());
        assert!(model
            .eval(
                &option_file
                    .inner(fx.resolution.result())
                    ._eq(&fx.fs.files[3]),
                true,
            )
            .unwrap()
            .as_bool()
            .unwrap());

        fx.solver.assert(&fx.resolution.fails(&fx.types));

        assert_eq!(fx.solver.check(), SatResult::Unsat);
    }

    #[test]
    fn missing_entry_fails() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fx = setup(&ctx);

        pin(&fx, &["x"]);
        fx.solver.assert(&fx.resolution.resolves(&fx.types));

        assert_eq!(fx.solver.check(), SatResult::Unsat);
    }

    #[test]
    fn start_fd_matters() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fx = setup(&ctx);

        // `f` lives under `root`, not under `root/d`.
        pin(&fx, &["f"]);
        fx.solver.push();
        fx.solver.assert(&fx.resolution.starts_from(&fx.fs, "root/d"));
        fx.solver.assert(&fx.resolution.resolves(&fx.types));
        assert_eq!(fx.solver.check(), SatResult::Unsat);
        fx.solver.pop(1);

        fx.solver.push();
        fx.solver.assert(&fx.resolution.starts_from(&fx.fs, "root"));
        fx.solver.assert(&fx.resolution.resolves(&fx.types));
        assert_eq!(fx.solver.check(), SatResult::Sat);
        fx.solver.pop(1);

        fx.solver.assert(&fx.resolution.starts_from(&fx.fs, "nope"));
        assert_eq!(fx.solver.check(), SatResult::Unsat);
    }

    #[test]
    fn failure_absorbs() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fx = setup(&ctx);

        pin(&fx, &["x", "f"]);
        fx.solver.assert(&fx.resolution.starts_from(&fx.fs, "root"));
        fx.solver.assert(&fx.resolution.resolves(&fx.types));

        assert_eq!(fx.solver.check(), SatResult::Unsat);
    }

    #[test]
    fn parent_dir_is_unconstrained() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fx = setup(&ctx);

        pin(&fx, &["x", ".."]);
        fx.solver.assert(&fx.resolution.starts_from(&fx.fs, "root"));

        for outcome in [
            fx.resolution.resolves(&fx.types),
            fx.resolution.fails(&fx.types),
        ] {
            fx.solver.push();
            fx.solver.assert(&outcome);
            assert_eq!(fx.solver.check(), SatResult::Sat);
            fx.solver.pop(1);
        }

        // The hole is at the `..` step only. The miss before it still fails.
        fx.solver.assert(&fx.types.option_file().is_some(fx.resolution.state(1)));

        assert_eq!(fx.solver.check(), SatResult::Unsat);
    }

    #[test]
    fn state_carries_past_last_component() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let fx = setup(&ctx);

        pin(&fx, &["d"]);
        fx.solver.assert(&fx.resolution.starts_from(&fx.fs, "root"));

        assert_eq!(fx.solver.check(), SatResult::Sat);

        let model = fx.solver.get_model().unwrap();
        let d = fx.types.option_file().some(&fx.fs.files[2]);

        for k in 1..=fx.resolution.n_steps() {
            assert!(model
                .eval(&fx.resolution.state(k)._eq(&d), true)
                .unwrap()
                .as_bool()
                .unwrap());
        }
    }
}
