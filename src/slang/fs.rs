use itertools::Itertools as _;
use z3::{
    ast::{self, forall_const, Ast, Bool, Dynamic, Int},
    Context,
    DatatypeSort,
    FuncDecl,
    Solver,
    Sort,
};

use super::string_val;
use crate::{
    tree::{Directory, File},
    Types,
};

#[derive(Debug)]
pub struct FileType<'a, 'ctx>(&'a DatatypeSort<'ctx>);

impl<'a, 'ctx> From<&'a DatatypeSort<'ctx>> for FileType<'a, 'ctx> {
    fn from(value: &'a DatatypeSort<'ctx>) -> Self {
        Self(value)
    }
}

impl<'a, 'ctx> FileType<'a, 'ctx> {
    pub fn is_regular_file(&self, file: &dyn Ast<'ctx>) -> Bool<'ctx> {
        self.0.variants[0].tester.apply(&[file]).as_bool().unwrap()
    }

    pub fn is_directory(&self, file: &dyn Ast<'ctx>) -> Bool<'ctx> {
        self.0.variants[1].tester.apply(&[file]).as_bool().unwrap()
    }

    /// Identity of a file, whichever variant it is.
    pub fn id(&self, file: &dyn Ast<'ctx>) -> Int<'ctx> {
        self.is_regular_file(file).ite(
            &self.0.variants[0].accessors[0].apply(&[file]).as_int().unwrap(),
            &self.0.variants[1].accessors[0].apply(&[file]).as_int().unwrap(),
        )
    }

    pub fn fresh_const(&self, ctx: &'ctx Context, prefix: &str) -> Dynamic<'ctx> {
        Dynamic::fresh_const(ctx, prefix, &self.0.sort)
    }
}

/// A `(parent, name, child)` tuple of the entries relation.
#[derive(Debug)]
pub struct DirEdge<'ctx> {
    pub parent:     Dynamic<'ctx>,
    pub parent_idx: usize,
    pub name:       String,
    pub child:      Dynamic<'ctx>,
}

/// An fd opened on one of the encoded directories.
#[derive(Debug)]
pub struct FdDecl<'ctx> {
    pub name:     String,
    pub fd:       Dynamic<'ctx>,
    pub file:     Dynamic<'ctx>,
    pub file_idx: usize,
}

#[derive(Debug)]
pub struct FsEncoder<'a, 'ctx> {
    ctx:    &'ctx Context,
    solver: &'a Solver<'ctx>,
    types:  &'a Types<'ctx>,

    /// Maps directories to the entries they contain through their filenames.
    entries: FuncDecl<'ctx>,

    /// Maps fds to files.
    fd_map: FuncDecl<'ctx>,
}

impl<'a, 'ctx> FsEncoder<'a, 'ctx> {
    pub fn new(ctx: &'ctx Context, solver: &'a Solver<'ctx>, types: &'a Types<'ctx>) -> Self {
        let entries = FuncDecl::new(
            ctx,
            "entries",
            &[&types.file.sort, &Sort::string(ctx), &types.file.sort],
            &Sort::bool(ctx),
        );
        let fd_map = FuncDecl::new(
            ctx,
            "fd-map",
            &[&types.fd, &types.file.sort],
            &Sort::bool(ctx),
        );

        Self {
            ctx,
            solver,
            types,
            entries,
            fd_map,
        }
    }

    pub fn encode(self, root: &File) -> FsEncoding<'ctx> {
        let mut files = Vec::new();
        let mut edges = Vec::new();
        let mut fds = Vec::new();

        self.encode_file(root, &mut files, &mut edges, &mut fds);
        self.encode_entries(&edges);
        self.encode_fd_map(&fds);

        tracing::debug!(
            files = files.len(),
            entries = edges.len(),
            fds = fds.len(),
            "Encoded file tree."
        );

        FsEncoding {
            ctx: self.ctx,
            files,
            edges,
            fds,
            entries: self.entries,
            fd_map: self.fd_map,
        }
    }

    fn encode_file(
        &self,
        file: &File,
        files: &mut Vec<Dynamic<'ctx>>,
        edges: &mut Vec<DirEdge<'ctx>>,
        fds: &mut Vec<FdDecl<'ctx>>,
    ) -> usize {
        let file_type = self.types.file();
        let idx = files.len();
        let f = file_type.fresh_const(self.ctx, "fs--file--");

        files.push(f.clone());

        match file {
            | File::RegularFile(_) => {
                self.solver.assert(&file_type.is_regular_file(&f));
            },
            | File::Directory(Directory { opened, .. }) => {
                self.solver.assert(&file_type.is_directory(&f));

                if let Some(name) = opened {
                    fds.push(FdDecl {
                        name:     name.clone(),
                        fd:       Dynamic::new_const(self.ctx, name.as_str(), &self.types.fd),
                        file:     f.clone(),
                        file_idx: idx,
                    });
                }
            },
        }

        self.solver
            .assert(&file_type.id(&f)._eq(&Int::from_u64(self.ctx, idx as u64)));

        if let File::Directory(directory) = file {
            for entry in directory.entries.iter() {
                let child_idx = self.encode_file(&entry.file, files, edges, fds);

                edges.push(DirEdge {
                    parent: f.clone(),
                    parent_idx: idx,
                    name: entry.name.clone(),
                    child: files[child_idx].clone(),
                });
            }
        }

        idx
    }

    fn encode_entries(&self, edges: &[DirEdge<'ctx>]) {
        let ctx = self.ctx;
        let file_type = self.types.file();
        let some_dir = file_type.fresh_const(ctx, "fs--");
        let some_file = file_type.fresh_const(ctx, "fs--");
        let some_filename = ast::String::fresh_const(ctx, "fs--");
        let clauses = edges
            .iter()
            .map(|edge| {
                Bool::and(
                    ctx,
                    &[
                        some_dir._eq(&edge.parent),
                        some_filename._eq(&string_val(ctx, &edge.name)),
                        some_file._eq(&edge.child),
                    ],
                )
            })
            .collect_vec();
        let holds = self
            .entries
            .apply(&[&some_dir, &some_filename, &some_file])
            .as_bool()
            .unwrap();

        self.solver.assert(&forall_const(
            ctx,
            &[&some_dir, &some_filename, &some_file],
            &[],
            &holds._eq(&Bool::or(ctx, &clauses)),
        ));
    }

    fn encode_fd_map(&self, fds: &[FdDecl<'ctx>]) {
        let ctx = self.ctx;
        let some_fd = Dynamic::fresh_const(ctx, "fs--", &self.types.fd);
        let some_file = self.types.file().fresh_const(ctx, "fs--");
        let clauses = fds
            .iter()
            .map(|decl| Bool::and(ctx, &[some_fd._eq(&decl.fd), some_file._eq(&decl.file)]))
            .collect_vec();
        let holds = self
            .fd_map
            .apply(&[&some_fd, &some_file])
            .as_bool()
            .unwrap();

        // Fds are free constants, nothing else keeps them apart.
        for (a, b) in fds.iter().tuple_combinations() {
            self.solver.assert(&a.fd._eq(&b.fd).not());
        }

        self.solver.assert(&forall_const(
            ctx,
            &[&some_fd, &some_file],
            &[],
            &holds._eq(&Bool::or(ctx, &clauses)),
        ));
    }
}

#[derive(Debug)]
pub struct FsEncoding<'ctx> {
    ctx: &'ctx Context,

    /// Every encoded file in pre-order. Index 0 is the root.
    pub files: Vec<Dynamic<'ctx>>,
    pub edges: Vec<DirEdge<'ctx>>,
    pub fds:   Vec<FdDecl<'ctx>>,

    pub entries: FuncDecl<'ctx>,
    pub fd_map:  FuncDecl<'ctx>,
}

impl<'ctx> FsEncoding<'ctx> {
    pub fn root(&self) -> &Dynamic<'ctx> {
        &self.files[0]
    }

    pub fn fd(&self, name: &str) -> Option<&FdDecl<'ctx>> {
        self.fds.iter().find(|decl| decl.name == name)
    }

    pub fn entry(
        &self,
        parent: &dyn Ast<'ctx>,
        name: &ast::String<'ctx>,
        child: &dyn Ast<'ctx>,
    ) -> Bool<'ctx> {
        self.entries
            .apply(&[parent, name, child])
            .as_bool()
            .unwrap()
    }

    pub fn maps_to(&self, fd: &dyn Ast<'ctx>, file: &dyn Ast<'ctx>) -> Bool<'ctx> {
        self.fd_map.apply(&[fd, file]).as_bool().unwrap()
    }

    /// Whether `parent` has an entry called `name`. Equivalent to
    /// `exists child. entries(parent, name, child)` under the closed-world
    /// axiom, but quantifier-free.
    pub fn has_entry(&self, parent: &Dynamic<'ctx>, name: &ast::String<'ctx>) -> Bool<'ctx> {
        Bool::or(
            self.ctx,
            &self
                .edges
                .iter()
                .map(|edge| {
                    Bool::and(
                        self.ctx,
                        &[
                            parent._eq(&edge.parent),
                            name._eq(&string_val(self.ctx, &edge.name)),
                        ],
                    )
                })
                .collect_vec(),
        )
    }

    /// `fd` is one of the declared fds.
    pub fn fd_in_set(&self, fd: &Dynamic<'ctx>) -> Bool<'ctx> {
        Bool::or(
            self.ctx,
            &self.fds.iter().map(|decl| fd._eq(&decl.fd)).collect_vec(),
        )
    }
}
