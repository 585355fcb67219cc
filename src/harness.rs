//! Scenario harness.
//!
//! Every scenario runs in its own solver frame and states the verdict it
//! expects. A negative scenario asserts something the model must rule out; a
//! positive one asserts a shape the model must still admit. Any other verdict
//! means the model is wrong and stops the run.

use std::fmt;

use itertools::Itertools as _;
use z3::{
    ast::{forall_const, Ast, Bool, Int},
    Context,
    Model,
    Params,
    SatResult,
    Solver,
};

use crate::{
    config::{Expectation, SynthConfig},
    error::HarnessError,
    resolve::{Resolution, PARENT_DIR},
    slang::{fs::FsEncoder, index::ComponentIndex, path::PathParam, string_val},
    tree::File,
    witness::Witness,
    Encoding,
    Types,
};

/// Solver frame that lives as long as the guard.
#[derive(Debug)]
pub struct Scope<'s, 'ctx> {
    solver: &'s Solver<'ctx>,
}

impl<'s, 'ctx> Scope<'s, 'ctx> {
    pub fn new(solver: &'s Solver<'ctx>) -> Self {
        solver.push();

        Self { solver }
    }
}

impl Drop for Scope<'_, '_> {
    fn drop(&mut self) {
        self.solver.pop(1);
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Expect {
    Sat,
    Unsat,
}

impl Expect {
    pub fn result(self) -> SatResult {
        match self {
            | Expect::Sat => SatResult::Sat,
            | Expect::Unsat => SatResult::Unsat,
        }
    }
}

type Constraints<'ctx> = Box<dyn Fn(&Encoding<'ctx>) -> Vec<Bool<'ctx>> + 'ctx>;

pub struct Scenario<'ctx> {
    pub name:   String,
    pub expect: Expect,

    constraints: Constraints<'ctx>,
}

impl<'ctx> Scenario<'ctx> {
    pub fn new(
        name: impl Into<String>,
        expect: Expect,
        constraints: impl Fn(&Encoding<'ctx>) -> Vec<Bool<'ctx>> + 'ctx,
    ) -> Self {
        Self {
            name: name.into(),
            expect,
            constraints: Box::new(constraints),
        }
    }

    pub fn negative(
        name: impl Into<String>,
        constraints: impl Fn(&Encoding<'ctx>) -> Vec<Bool<'ctx>> + 'ctx,
    ) -> Self {
        Self::new(name, Expect::Unsat, constraints)
    }

    pub fn positive(
        name: impl Into<String>,
        constraints: impl Fn(&Encoding<'ctx>) -> Vec<Bool<'ctx>> + 'ctx,
    ) -> Self {
        Self::new(name, Expect::Sat, constraints)
    }
}

impl fmt::Debug for Scenario<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("expect", &self.expect)
            .finish_non_exhaustive()
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ScenarioReport {
    pub name:   String,
    pub expect: Expect,
    pub result: SatResult,
}

#[derive(Debug)]
pub struct Harness<'ctx> {
    solver:   Solver<'ctx>,
    encoding: Encoding<'ctx>,
    config:   SynthConfig,
}

impl<'ctx> Harness<'ctx> {
    pub fn new(
        ctx: &'ctx Context,
        tree: &File,
        config: &SynthConfig,
    ) -> Result<Self, HarnessError> {
        config.validate()?;

        let solver = Solver::new(ctx);
        let mut params = Params::new(ctx);

        params.set_bool("randomize", false);
        params.set_u32("smt.random_seed", config.random_seed);
        solver.set_params(&params);

        let types = Types::new(ctx);
        let fs = FsEncoder::new(ctx, &solver, &types).encode(tree);

        if fs.fds.is_empty() {
            return Err(HarnessError::NoDescriptors);
        }

        let path = PathParam::new("param-path".to_owned(), config.max_segments)
            .with_max_component_len(config.max_component_len)
            .encode(ctx, &types.segment());
        let index = ComponentIndex::encode(ctx, &path);
        // Components alternate with separators and the path is shorter than
        // the segment array, so there are at most half as many components.
        let resolution = Resolution::encode(ctx, &types, &fs, &index, config.max_segments / 2);

        path.assert(&solver);
        index.assert(&solver);
        resolution.assert(&solver);

        Ok(Self {
            solver,
            encoding: Encoding {
                ctx,
                types,
                fs,
                path,
                index,
                resolution,
            },
            config: config.clone(),
        })
    }

    pub fn solver(&self) -> &Solver<'ctx> {
        &self.solver
    }

    pub fn encoding(&self) -> &Encoding<'ctx> {
        &self.encoding
    }

    /// Runs one scenario in its own frame.
    pub fn check(&self, scenario: &Scenario<'ctx>) -> Result<ScenarioReport, HarnessError> {
        let _scope = Scope::new(&self.solver);

        for clause in (scenario.constraints)(&self.encoding) {
            self.solver.assert(&clause);
        }

        let result = self.solver.check();

        if result != scenario.expect.result() {
            let model = match result {
                | SatResult::Sat => self.solver.get_model().map(|model| model.to_string()),
                | _ => None,
            };

            tracing::error!(
                scenario = %scenario.name,
                expected = ?scenario.expect,
                got = ?result,
                model = model.as_deref().unwrap_or("-"),
                "Scenario verdict mismatch."
            );

            return Err(HarnessError::ScenarioViolation {
                name: scenario.name.clone(),
                expected: scenario.expect.result(),
                got: result,
                model,
            });
        }

        tracing::info!(scenario = %scenario.name, ?result, "Scenario passed.");

        Ok(ScenarioReport {
            name: scenario.name.clone(),
            expect: scenario.expect,
            result,
        })
    }

    pub fn run_scenarios(
        &self,
        scenarios: &[Scenario<'ctx>],
    ) -> Result<Vec<ScenarioReport>, HarnessError> {
        scenarios
            .iter()
            .map(|scenario| self.check(scenario))
            .collect()
    }

    /// Built-in scenarios: negatives first, then positives.
    pub fn scenarios(&self) -> Vec<Scenario<'ctx>> {
        let mut scenarios = negative_scenarios();

        scenarios.extend(positive_scenarios());

        // Only meaningful if some opened directory has a name the path can
        // spell under the component length cap.
        let spellable = self.encoding.fs.edges.iter().any(|edge| {
            self.encoding
                .fs
                .fds
                .iter()
                .any(|decl| decl.file_idx == edge.parent_idx)
                && self
                    .config
                    .max_component_len
                    .map_or(true, |max| edge.name.chars().count() <= max)
        });

        if spellable {
            scenarios.push(Scenario::positive("entry-resolves", |enc| {
                vec![
                    enc.index.has_component(0),
                    enc.resolution.resolves(&enc.types),
                    enc.types
                        .option_file()
                        .is_some(enc.resolution.state(1)),
                ]
            }));
        }

        scenarios
    }

    /// Asserts the synthesis goal on the unscoped context and solves.
    pub fn synthesize(&self) -> Result<Model<'ctx>, HarnessError> {
        let enc = &self.encoding;

        self.solver
            .assert(&enc.index.at_least(self.config.min_components));

        if let Some(path_len) = self.config.path_len {
            self.solver.assert(&enc.path.has_len(path_len));
        }

        match self.config.expect {
            | Expectation::Any => (),
            | Expectation::Resolves => self.solver.assert(&enc.resolution.resolves(&enc.types)),
            | Expectation::Fails => self.solver.assert(&enc.resolution.fails(&enc.types)),
        }

        let result = self.solver.check();

        tracing::info!(?result, "Synthesis query done.");

        match result {
            | SatResult::Sat => self.solver.get_model().ok_or(HarnessError::MissingModel),
            | _ => Err(HarnessError::SynthesisFailed { result }),
        }
    }

    /// Scenarios (unless skipped), synthesis and decoding.
    pub fn run(&self) -> Result<Witness, HarnessError> {
        if !self.config.skip_scenarios {
            let reports = self.run_scenarios(&self.scenarios())?;

            tracing::info!(count = reports.len(), "All scenarios passed.");
        }

        let model = self.synthesize()?;

        Witness::decode(&self.encoding, &model)
    }
}

pub fn negative_scenarios<'ctx>() -> Vec<Scenario<'ctx>> {
    vec![
        Scenario::negative("absolute-path", |enc| {
            vec![enc.types.segment().is_separator(enc.path.segment(0))]
        }),
        Scenario::negative("adjacent-components", |enc| {
            vec![
                enc.path.len().ge(&Int::from_u64(enc.ctx, 2)),
                enc.path.component_eq(0, "a"),
                enc.path.component_eq(1, "d"),
            ]
        }),
        Scenario::negative("adjacent-separators", |enc| {
            vec![
                enc.path.is_separator(1).clone(),
                enc.path.is_separator(2).clone(),
            ]
        }),
        Scenario::negative("component-with-separator", |enc| {
            vec![enc.path.component_eq(0, "a/")]
        }),
        Scenario::negative("rank-encodings-disagree", |enc| vec![enc.index.disagree()]),
        // The first component misses under the first fd and the second is
        // `..`. The hole at the `..` step must not let the miss itself
        // succeed.
        Scenario::negative("miss-then-parent-dir", |enc| {
            let fd = &enc.fs.fds[0];
            let first = enc.index.component_name(0);
            let some_file = enc.types.file().fresh_const(enc.ctx, "scenario--");

            vec![
                enc.resolution.param_fd()._eq(&fd.fd),
                enc.index.has_component(1),
                forall_const(
                    enc.ctx,
                    &[&some_file],
                    &[],
                    &enc.fs.entry(&fd.file, &first, &some_file).not(),
                ),
                first._eq(&string_val(enc.ctx, PARENT_DIR)).not(),
                enc.index
                    .component_name(1)
                    ._eq(&string_val(enc.ctx, PARENT_DIR)),
                enc.types
                    .option_file()
                    .is_some(enc.resolution.state(1)),
            ]
        }),
        Scenario::negative("failure-absorbs", |enc| {
            let option_file = enc.types.option_file();
            let dotdot = string_val(enc.ctx, PARENT_DIR);

            vec![Bool::or(
                enc.ctx,
                &(0..enc.resolution.n_steps())
                    .map(|k| {
                        Bool::and(
                            enc.ctx,
                            &[
                                option_file.is_none(enc.resolution.state(k)),
                                enc.index.has_component(k),
                                enc.index.component_name(k)._eq(&dotdot).not(),
                                option_file.is_some(enc.resolution.state(k + 1)),
                            ],
                        )
                    })
                    .collect_vec(),
            )]
        }),
    ]
}

pub fn positive_scenarios<'ctx>() -> Vec<Scenario<'ctx>> {
    vec![Scenario::positive("component-idx", |enc| {
        let idx = |pos: i64, rank: i64| {
            enc.index
                .component_idx(&Int::from_i64(enc.ctx, pos))
                ._eq(&Int::from_i64(enc.ctx, rank))
        };

        vec![
            enc.path.has_len(3),
            enc.path.component_eq(0, "a"),
            enc.path.is_separator(1).clone(),
            enc.path.component_eq(2, "b"),
            idx(0, 0),
            idx(1, -1),
            idx(2, 1),
        ]
    })]
}

#[cfg(test)]
mod tests {
    use z3::Config;

    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn scope_pops_on_drop() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);

        {
            let _scope = Scope::new(&solver);

            solver.assert(&Bool::from_bool(&ctx, false));
            assert_eq!(solver.check(), SatResult::Unsat);
        }

        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn builtin_scenarios_pass() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let harness = Harness::new(&ctx, &File::example(), &SynthConfig::default()).unwrap();
        let scenarios = harness.scenarios();
        let reports = harness.run_scenarios(&scenarios).unwrap();

        assert_eq!(reports.len(), scenarios.len());
        assert!(reports.iter().any(|report| report.name == "entry-resolves"));
        assert!(reports
            .iter()
            .all(|report| report.result == report.expect.result()));
    }

    #[test]
    fn violation_is_reported_and_frame_restored() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let harness = Harness::new(&ctx, &File::example(), &SynthConfig::default()).unwrap();
        // A perfectly valid path, wrongly expected to be impossible.
        let wrong = Scenario::negative("valid-path", |enc| vec![enc.path.component_eq(0, "f")]);
        let err = harness.check(&wrong).unwrap_err();

        match err {
            | HarnessError::ScenarioViolation {
                name,
                expected,
                got,
                model,
            } => {
                assert_eq!(name, "valid-path");
                assert_eq!(expected, SatResult::Unsat);
                assert_eq!(got, SatResult::Sat);
                assert!(model.is_some());
            },
            | err => panic!("unexpected error {err}"),
        }

        // Left-over assertions would make this unsat.
        let other = Scenario::positive("other-name", |enc| vec![enc.path.component_eq(0, "d")]);

        assert!(harness.check(&other).is_ok());
    }

    #[test]
    fn positive_violation_has_no_model() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let harness = Harness::new(&ctx, &File::example(), &SynthConfig::default()).unwrap();
        let wrong = Scenario::positive("empty-component", |enc| {
            vec![enc.path.component_eq(0, "")]
        });

        assert!(matches!(
            harness.check(&wrong),
            Err(HarnessError::ScenarioViolation { model: None, .. })
        ));
    }

    #[test]
    fn no_descriptors() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let tree = File::Directory(crate::tree::Directory {
            opened:  None,
            entries: vec![],
        });

        assert!(matches!(
            Harness::new(&ctx, &tree, &SynthConfig::default()),
            Err(HarnessError::NoDescriptors)
        ));
    }

    #[test]
    fn undersized_config_is_rejected() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        for max_segments in [0, 2] {
            let config = SynthConfig {
                max_segments,
                path_len: None,
                ..Default::default()
            };

            assert!(matches!(
                Harness::new(&ctx, &File::example(), &config),
                Err(HarnessError::Config(ConfigError::TooFewSegments(n))) if n == max_segments
            ));
        }

        let config = SynthConfig {
            max_component_len: Some(0),
            ..Default::default()
        };

        assert!(matches!(
            Harness::new(&ctx, &File::example(), &config),
            Err(HarnessError::Config(ConfigError::ZeroComponentLen))
        ));
    }

    #[test]
    fn over_constrained_synthesis_fails() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        // Four components can't fit in three segments.
        let config = SynthConfig {
            min_components: 4,
            path_len: Some(3),
            ..Default::default()
        };
        let harness = Harness::new(&ctx, &File::example(), &config).unwrap();

        assert!(matches!(
            harness.synthesize(),
            Err(HarnessError::SynthesisFailed {
                result: SatResult::Unsat
            })
        ));
    }
}
