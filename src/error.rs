use z3::SatResult;

#[derive(thiserror::Error, Debug)]
pub enum TreeError {
    #[error("unexpected file type `{0}`")]
    UnknownFileType(String),

    #[error("opened directory at `{path}` has no `opened_id`")]
    MissingOpenedId { path: String },

    #[error("fd `{0}` is declared more than once")]
    DuplicateOpenedId(String),

    #[error("directory `{path}` has more than one entry named `{name}`")]
    DuplicateEntry { path: String, name: String },

    #[error("invalid entry name `{name}` in directory `{path}`")]
    InvalidEntryName { path: String, name: String },

    #[error("regular file at `{path}` can't be opened as an fd")]
    OpenedRegularFile { path: String },

    #[error("`{0}` is neither JSON nor YAML")]
    UnknownFormat(String),

    #[error("failed to parse tree description")]
    Parse(#[from] serde_json::Error),

    #[error("failed to parse tree description")]
    ParseYaml(#[from] serde_yml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("max-segments must be at least 4, got {0}")]
    TooFewSegments(usize),

    #[error("path-len {path_len} must be in 1..{max_segments}")]
    PathLenOutOfRange { path_len: usize, max_segments: usize },

    #[error("max-component-len must be positive")]
    ZeroComponentLen,

    #[error("`{0}` is neither JSON nor YAML")]
    UnknownFormat(String),

    #[error("failed to parse config")]
    Parse(#[from] serde_json::Error),

    #[error("failed to parse config")]
    ParseYaml(#[from] serde_yml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("scenario `{name}` expected {expected:?}, got {got:?}")]
    ScenarioViolation {
        name:     String,
        expected: SatResult,
        got:      SatResult,
        model:    Option<String>,
    },

    #[error("synthesis query returned {result:?}")]
    SynthesisFailed { result: SatResult },

    #[error("no fd is declared by the tree, resolution has no start")]
    NoDescriptors,

    #[error("solver reported sat but produced no model")]
    MissingModel,

    #[error("model has no value for `{0}`")]
    Undecodable(String),

    #[error("invalid synthesis config")]
    Config(#[from] ConfigError),
}
