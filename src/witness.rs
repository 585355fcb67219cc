use std::fmt;

use itertools::Itertools as _;
use serde::Serialize;
use z3::{ast::Ast, Model};

use crate::{error::HarnessError, Encoding};

pub const SEPARATOR: char = '/';

#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub enum DecodedSegment {
    Separator,
    Component(String),
}

/// A concrete path and start fd read off a satisfying model.
#[derive(Serialize, Clone, Debug)]
pub struct Witness {
    pub path:          String,
    pub fd:            String,
    pub segments:      Vec<DecodedSegment>,
    pub component_idx: Vec<i64>,

    /// Whether the model resolves the path to a file.
    pub resolves: bool,

    /// Raw resolution states, start first.
    pub resolution: Vec<String>,
}

impl Witness {
    pub fn decode(enc: &Encoding<'_>, model: &Model<'_>) -> Result<Self, HarnessError> {
        let segment_type = enc.types.segment();
        let len = model
            .eval(enc.path.len(), true)
            .and_then(|len| len.as_u64())
            .ok_or_else(|| undecodable(enc.path.len()))?;
        let mut path = String::new();
        let mut segments = Vec::with_capacity(len as usize);

        for i in 0..len as usize {
            let segment = enc.path.segment(i);
            let is_separator = model
                .eval(&segment_type.is_separator(segment), true)
                .and_then(|b| b.as_bool())
                .ok_or_else(|| undecodable(segment))?;

            if is_separator {
                path.push(SEPARATOR);
                segments.push(DecodedSegment::Separator);
            } else {
                let string = segment_type.component_string(segment);
                let component = model
                    .eval(&string, true)
                    .and_then(|s| s.as_string())
                    .ok_or_else(|| undecodable(&string))?;

                path.push_str(&component);
                segments.push(DecodedSegment::Component(component));
            }
        }

        let fd = enc
            .fs
            .fds
            .iter()
            .find(|decl| {
                model
                    .eval(&enc.resolution.param_fd()._eq(&decl.fd), true)
                    .and_then(|b| b.as_bool())
                    .unwrap_or(false)
            })
            .map(|decl| decl.name.clone())
            .ok_or_else(|| undecodable(enc.resolution.param_fd()))?;
        let component_idx = (0..enc.path.n_segments())
            .map(|i| {
                let rank = enc.index.rank(i);

                model
                    .eval(rank, true)
                    .and_then(|rank| rank.as_i64())
                    .ok_or_else(|| undecodable(rank))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let resolves = model
            .eval(&enc.resolution.resolves(&enc.types), true)
            .and_then(|b| b.as_bool())
            .ok_or_else(|| undecodable(enc.resolution.result()))?;
        let resolution = enc
            .resolution
            .states()
            .map(|state| {
                model
                    .eval(state, true)
                    .map(|state| state.to_string())
                    .unwrap_or_else(|| state.to_string())
            })
            .collect_vec();

        Ok(Self {
            path,
            fd,
            segments,
            component_idx,
            resolves,
            resolution,
        })
    }

    pub fn components(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                | DecodedSegment::Separator => None,
                | DecodedSegment::Component(name) => Some(name.as_str()),
            })
            .collect()
    }
}

fn undecodable(term: &dyn fmt::Display) -> HarnessError {
    HarnessError::Undecodable(term.to_string())
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "path {}", self.path)?;
        writeln!(f, "  fd chosen: {}", self.fd)?;
        writeln!(f, "  resolves: {}", self.resolves)?;

        for (segment, idx) in self.segments.iter().zip(&self.component_idx) {
            if let DecodedSegment::Component(name) = segment {
                writeln!(f, "  {name} -> {idx}")?;
            }
        }

        write!(f, "  states: [{}]", self.resolution.iter().join(", "))
    }
}
