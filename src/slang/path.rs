use z3::{
    ast::{self, Ast, Bool, Int},
    Context,
    DatatypeSort,
    Solver,
};

use super::string_val;

#[derive(Debug)]
pub struct SegmentType<'a, 'ctx>(&'a DatatypeSort<'ctx>);

impl<'a, 'ctx> From<&'a DatatypeSort<'ctx>> for SegmentType<'a, 'ctx> {
    fn from(value: &'a DatatypeSort<'ctx>) -> Self {
        Self(value)
    }
}

impl<'a, 'ctx> SegmentType<'a, 'ctx> {
    pub fn new_const(&self, ctx: &'ctx Context, name: String) -> ast::Dynamic<'ctx> {
        ast::Dynamic::new_const(ctx, name, &self.0.sort)
    }

    pub fn is_separator(&self, segment: &dyn Ast<'ctx>) -> ast::Bool<'ctx> {
        self.0.variants[0]
            .tester
            .apply(&[segment])
            .as_bool()
            .unwrap()
    }

    pub fn is_component(&self, segment: &dyn Ast<'ctx>) -> ast::Bool<'ctx> {
        self.0.variants[1]
            .tester
            .apply(&[segment])
            .as_bool()
            .unwrap()
    }

    pub fn component_string(&self, segment: &dyn Ast<'ctx>) -> ast::String<'ctx> {
        self.0.variants[1].accessors[0]
            .apply(&[segment])
            .as_string()
            .unwrap()
    }

    pub fn separator(&self) -> ast::Dynamic<'ctx> {
        self.0.variants[0].constructor.apply(&[])
    }

    pub fn component(&self, string: &ast::String<'ctx>) -> ast::Dynamic<'ctx> {
        self.0.variants[1].constructor.apply(&[string])
    }
}

/// A relative path parameter of bounded length.
///
/// The path is laid out as `n_segments` segment constants. Its logical length
/// is a separate integer strictly between zero and `n_segments`; positions at
/// or past it hold the empty component.
#[derive(Clone, Debug)]
pub struct PathParam {
    name:              String,
    n_segments:        usize,
    max_component_len: Option<usize>,
}

impl PathParam {
    pub fn new(name: String, n_segments: usize) -> Self {
        Self {
            name,
            n_segments,
            max_component_len: None,
        }
    }

    /// Caps the length of every component string. Only narrows the search.
    pub fn with_max_component_len(mut self, max_component_len: Option<usize>) -> Self {
        self.max_component_len = max_component_len;
        self
    }

    pub fn encode<'ctx>(
        &self,
        ctx: &'ctx Context,
        segment_type: &SegmentType<'_, 'ctx>,
    ) -> PathEncoding<'ctx> {
        let mut clauses = Vec::new();
        let mut segments: Vec<ast::Dynamic> = Vec::with_capacity(self.n_segments);
        let mut components = Vec::with_capacity(self.n_segments);
        let mut separators = Vec::with_capacity(self.n_segments);
        let mut strings = Vec::with_capacity(self.n_segments);
        let len = Int::new_const(ctx, format!("{}--len", self.name));
        let absent = segment_type.component(&string_val(ctx, ""));
        let slash = string_val(ctx, "/");

        // Path must be non-empty and shorter than the segment array.
        clauses.push(len.gt(&Int::from_u64(ctx, 0)));
        clauses.push(len.lt(&Int::from_u64(ctx, self.n_segments as u64)));

        for i in 0..self.n_segments {
            let segment = segment_type.new_const(ctx, format!("{}--segment-{i}", self.name));
            let in_bound = Int::from_u64(ctx, i as u64).lt(&len);
            let string = segment_type.component_string(&segment);
            let mut well_formed = vec![
                string.length().gt(&Int::from_u64(ctx, 0)),
                string.contains(&slash).not(),
            ];

            if let Some(max) = self.max_component_len {
                well_formed.push(string.length().le(&Int::from_u64(ctx, max as u64)));
            }

            clauses.push(in_bound.not().implies(&segment._eq(&absent)));
            clauses.push(
                Bool::and(ctx, &[&in_bound, &segment_type.is_component(&segment)])
                    .implies(&Bool::and(ctx, &well_formed)),
            );

            // The first segment must be a component.
            if i == 0 {
                clauses.push(segment_type.is_component(&segment));
            }

            // Adjacent segments can't both be components or separators.
            if let Some(prev) = segments.last() {
                clauses.push(in_bound.implies(&Bool::and(
                    ctx,
                    &[
                        Bool::and(
                            ctx,
                            &[
                                segment_type.is_component(prev),
                                segment_type.is_component(&segment),
                            ],
                        )
                        .not(),
                        Bool::and(
                            ctx,
                            &[
                                segment_type.is_separator(prev),
                                segment_type.is_separator(&segment),
                            ],
                        )
                        .not(),
                    ],
                )));
            }

            components.push(Bool::and(
                ctx,
                &[&in_bound, &segment_type.is_component(&segment)],
            ));
            separators.push(Bool::and(
                ctx,
                &[&in_bound, &segment_type.is_separator(&segment)],
            ));
            strings.push(string);
            segments.push(segment);
        }

        PathEncoding {
            ctx,
            name: self.name.clone(),
            clauses,
            segments,
            len,
            components,
            separators,
            strings,
        }
    }
}

#[derive(Debug)]
pub struct PathEncoding<'ctx> {
    ctx:        &'ctx Context,
    name:       String,
    clauses:    Vec<Bool<'ctx>>,
    segments:   Vec<ast::Dynamic<'ctx>>,
    len:        Int<'ctx>,
    components: Vec<Bool<'ctx>>,
    separators: Vec<Bool<'ctx>>,
    strings:    Vec<ast::String<'ctx>>,
}

impl<'ctx> PathEncoding<'ctx> {
    pub fn assert(&self, solver: &Solver<'ctx>) {
        self.clauses.iter().for_each(|clause| {
            solver.assert(clause);
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn segment(&self, i: usize) -> &ast::Dynamic<'ctx> {
        &self.segments[i]
    }

    /// Logical length of the path.
    pub fn len(&self) -> &Int<'ctx> {
        &self.len
    }

    /// Position `i` is within the path and holds a component.
    pub fn is_component(&self, i: usize) -> &Bool<'ctx> {
        &self.components[i]
    }

    /// Position `i` is within the path and holds a separator.
    pub fn is_separator(&self, i: usize) -> &Bool<'ctx> {
        &self.separators[i]
    }

    /// Component string at position `i`. Unspecified for separators.
    pub fn string(&self, i: usize) -> &ast::String<'ctx> {
        &self.strings[i]
    }

    /// Pins position `i` to component `name`.
    pub fn component_eq(&self, i: usize, name: &str) -> Bool<'ctx> {
        Bool::and(
            self.ctx,
            &[
                self.components[i].clone(),
                self.strings[i]._eq(&string_val(self.ctx, name)),
            ],
        )
    }

    pub fn has_len(&self, len: usize) -> Bool<'ctx> {
        self.len._eq(&Int::from_u64(self.ctx, len as u64))
    }
}
