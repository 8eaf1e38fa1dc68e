//! Treebank and match collections
//!
//! A [`Treebank`] streams Penn-bracketed trees out of a string, a file, or a
//! set of files; a [`MatchSet`] runs one compiled pattern over all of them.
//!
//! Unreadable files and malformed trees are logged and skipped.

use crate::pattern::TregexPattern;
use crate::penn::PennTreeReader;
use crate::tree::{NodeId, Tree};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Tracing target for treebank iteration.
const TREEBANK_TARGET: &str = "tregex::iterators";

/// Where a treebank reads its trees from
#[derive(Debug, Clone)]
enum TreeSource {
    /// Bracketed text held in memory
    String(String),
    /// One file
    File(PathBuf),
    /// Several files, read in order
    Files(Vec<PathBuf>),
}

/// Trees from bracketed text or treebank files
///
/// # Examples
///
/// ```no_run
/// use tregex::Treebank;
///
/// for tree in Treebank::from_glob("wsj/**/*.mrg").unwrap() {
///     println!("{} nodes", tree.len());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Treebank {
    source: TreeSource,
}

impl Treebank {
    /// Trees held in a string
    pub fn from_string(text: &str) -> Self {
        Self {
            source: TreeSource::String(text.to_string()),
        }
    }

    /// Trees in one file (gzip-compressed if it ends in `.gz`)
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self {
            source: TreeSource::File(path.as_ref().to_path_buf()),
        }
    }

    /// Trees in every file matching a glob, taking the files in sorted order
    pub fn from_glob(pattern: &str) -> Result<Self, glob::PatternError> {
        let mut file_paths: Vec<PathBuf> = glob::glob(pattern)?.filter_map(Result::ok).collect();
        file_paths.sort();
        Ok(Self::from_paths(file_paths))
    }

    /// Trees in the given files, in the given order
    pub fn from_paths(file_paths: Vec<PathBuf>) -> Self {
        Self {
            source: TreeSource::Files(file_paths),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = Arc<Tree>>> {
        self.clone().into_iter()
    }
}

impl IntoIterator for Treebank {
    type Item = Arc<Tree>;
    type IntoIter = Box<dyn Iterator<Item = Self::Item>>;

    fn into_iter(self) -> Self::IntoIter {
        match self.source {
            TreeSource::String(text) => Box::new(valid_trees(PennTreeReader::from_str(&text), None)),
            TreeSource::File(path) => open_file_trees(path),
            TreeSource::Files(paths) => Box::new(paths.into_iter().flat_map(open_file_trees)),
        }
    }
}

/// One match of a pattern: the matched node plus everything it bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeMatch {
    pub root: NodeId,
    /// Named nodes, sorted by name
    pub nodes: Vec<(String, NodeId)>,
    /// Variable groups, in binding order
    pub variables: Vec<(String, String)>,
}

impl TreeMatch {
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, node)| node)
    }

    pub fn variable(&self, var: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(v, _)| v == var)
            .map(|(_, value)| value.as_str())
    }
}

/// Every match of `pattern` in `tree`, in the order `find` reports them
pub fn find_all(pattern: &TregexPattern, tree: &Tree) -> Vec<TreeMatch> {
    let mut matcher = pattern.matcher(tree);
    let mut matches = Vec::new();
    while matcher.find() {
        let Some(root) = matcher.get_match() else {
            continue;
        };
        let nodes = matcher
            .get_node_names()
            .into_iter()
            .filter_map(|name| Some((name.to_string(), matcher.get_node(name)?)))
            .collect();
        let variables = matcher
            .variables()
            .iter()
            .map(|(var, value)| (var.to_string(), value.to_string()))
            .collect();
        matches.push(TreeMatch {
            root,
            nodes,
            variables,
        });
    }
    matches
}

/// Every match of a pattern over a treebank, paired with its tree
///
/// # Examples
///
/// ```no_run
/// use tregex::{MatchSet, TregexPattern, Treebank};
///
/// let pattern = TregexPattern::compile("NP < (NN=noun $- JJ)").unwrap();
/// let treebank = Treebank::from_file("trees.mrg");
/// for (tree, m) in MatchSet::new(&treebank, &pattern) {
///     let noun = m.node("noun").unwrap();
///     println!("{}", tree.display(noun));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MatchSet {
    tree_bank: Treebank,
    pattern: TregexPattern,
}

impl MatchSet {
    pub fn new(tree_bank: &Treebank, pattern: &TregexPattern) -> Self {
        Self {
            tree_bank: tree_bank.clone(),
            pattern: pattern.clone(),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = (Arc<Tree>, TreeMatch)>> {
        self.clone().into_iter()
    }
}

impl IntoIterator for MatchSet {
    type Item = (Arc<Tree>, TreeMatch);
    type IntoIter = Box<dyn Iterator<Item = Self::Item>>;

    fn into_iter(self) -> Self::IntoIter {
        let pattern = self.pattern;
        let iter = self.tree_bank.into_iter().flat_map(move |tree| {
            let matches = find_all(&pattern, &tree);
            matches.into_iter().map(move |m| (Arc::clone(&tree), m))
        });
        Box::new(iter)
    }
}

/// Drop malformed trees, logging each one
fn valid_trees<R: std::io::BufRead>(
    reader: PennTreeReader<R>,
    path: Option<PathBuf>,
) -> impl Iterator<Item = Arc<Tree>> {
    reader.filter_map(move |result| match result {
        Ok(tree) => Some(Arc::new(tree)),
        Err(err) => {
            warn!(target: TREEBANK_TARGET, path = ?path, error = %err, "skipping malformed tree");
            None
        }
    })
}

/// Open a file and return an iterator over its trees, or nothing if the
/// file cannot be opened
fn open_file_trees(path: PathBuf) -> Box<dyn Iterator<Item = Arc<Tree>>> {
    match PennTreeReader::from_file(&path) {
        Ok(reader) => Box::new(valid_trees(reader, Some(path))),
        Err(err) => {
            warn!(target: TREEBANK_TARGET, path = %path.display(), error = %err, "failed to open treebank file");
            Box::new(std::iter::empty())
        }
    }
}
