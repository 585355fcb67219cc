pub mod config;
pub mod error;
pub mod harness;
pub mod resolve;
pub mod slang;
pub mod tree;
pub mod witness;

use z3::{Context, DatatypeAccessor, DatatypeBuilder, DatatypeSort, Sort, Symbol};

pub use self::{
    config::{Expectation, SynthConfig},
    error::{ConfigError, HarnessError, TreeError},
    harness::{Expect, Harness, Scenario, ScenarioReport, Scope},
    witness::{DecodedSegment, Witness},
};
use self::{
    resolve::Resolution,
    slang::{
        fs::{FileType, FsEncoding},
        index::ComponentIndex,
        path::{PathEncoding, SegmentType},
        OptionType,
    },
};

/// Every sort the model is built from, declared once per context.
#[derive(Debug)]
pub struct Types<'ctx> {
    pub fd:          Sort<'ctx>,
    pub file:        DatatypeSort<'ctx>,
    pub option_file: DatatypeSort<'ctx>,
    pub segment:     DatatypeSort<'ctx>,
}

impl<'ctx> Types<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        let fd = Sort::uninterpreted(ctx, Symbol::String("fd".to_string()));
        let file = DatatypeBuilder::new(ctx, "file")
            .variant(
                "regular-file",
                vec![("regular-file--id", DatatypeAccessor::Sort(Sort::int(ctx)))],
            )
            .variant(
                "directory",
                vec![("directory--id", DatatypeAccessor::Sort(Sort::int(ctx)))],
            )
            .finish();
        let option_file = DatatypeBuilder::new(ctx, "option-file")
            .variant("none", vec![])
            .variant(
                "some",
                vec![("inner", DatatypeAccessor::Sort(file.sort.clone()))],
            )
            .finish();
        let segment = DatatypeBuilder::new(ctx, "segment")
            .variant("separator", vec![])
            .variant(
                "component",
                vec![("string", DatatypeAccessor::Sort(Sort::string(ctx)))],
            )
            .finish();

        Self {
            fd,
            file,
            option_file,
            segment,
        }
    }

    pub fn file(&self) -> FileType<'_, 'ctx> {
        FileType::from(&self.file)
    }

    pub fn option_file(&self) -> OptionType<'_, 'ctx> {
        OptionType::from(&self.option_file)
    }

    pub fn segment(&self) -> SegmentType<'_, 'ctx> {
        SegmentType::from(&self.segment)
    }
}

/// The complete symbolic model: tree, path, component ranks and resolution,
/// all sharing one context.
#[derive(Debug)]
pub struct Encoding<'ctx> {
    pub ctx:        &'ctx Context,
    pub types:      Types<'ctx>,
    pub fs:         FsEncoding<'ctx>,
    pub path:       PathEncoding<'ctx>,
    pub index:      ComponentIndex<'ctx>,
    pub resolution: Resolution<'ctx>,
}
