use z3::{
    ast::{self, Ast},
    Context,
    DatatypeSort,
};

pub mod fs;
pub mod index;
pub mod path;

#[derive(Debug)]
pub struct OptionType<'a, 'ctx>(&'a DatatypeSort<'ctx>);

impl<'a, 'ctx> From<&'a DatatypeSort<'ctx>> for OptionType<'a, 'ctx> {
    fn from(value: &'a DatatypeSort<'ctx>) -> Self {
        Self(value)
    }
}

impl<'a, 'ctx> OptionType<'a, 'ctx> {
    pub fn is_none(&self, x: &dyn Ast<'ctx>) -> ast::Bool<'ctx> {
        self.0.variants[0].tester.apply(&[x]).as_bool().unwrap()
    }

    pub fn is_some(&self, x: &dyn Ast<'ctx>) -> ast::Bool<'ctx> {
        self.0.variants[1].tester.apply(&[x]).as_bool().unwrap()
    }

    pub fn inner(&self, x: &dyn Ast<'ctx>) -> ast::Dynamic<'ctx> {
        self.0.variants[1].accessors[0].apply(&[x])
    }

    pub fn none(&self) -> ast::Dynamic<'ctx> {
        self.0.variants[0].constructor.apply(&[])
    }

    pub fn some(&self, x: &dyn Ast<'ctx>) -> ast::Dynamic<'ctx> {
        self.0.variants[1].constructor.apply(&[x])
    }

    pub fn new_const(&self, ctx: &'ctx Context, name: String) -> ast::Dynamic<'ctx> {
        ast::Dynamic::new_const(ctx, name, &self.0.sort)
    }
}

/// String literal. Callers only pass validated names, which never hold NUL.
pub(crate) fn string_val<'ctx>(ctx: &'ctx Context, s: &str) -> ast::String<'ctx> {
    ast::String::from_str(ctx, s).unwrap()
}
