//! Tregex: tree pattern matching for labeled ordered trees
//!
//! A toolkit for querying constituency parses (Penn treebank bracketing) with
//! the Tregex pattern language: node descriptions joined by dominance,
//! precedence, sisterhood and head relations, with named nodes,
//! backreferences and regex variable groups.
//!
//! ```
//! use tregex::{Tree, TregexPattern};
//!
//! let tree = Tree::from_penn("(S (NP (NNP John)) (VP (VBD saw) (NP (NNP Mary))))").unwrap();
//! let pattern = TregexPattern::compile("VP < (NP=obj < NNP)").unwrap();
//! let mut matcher = pattern.matcher(&tree);
//! assert!(matcher.find());
//! assert_eq!(tree.display(matcher.get_node("obj").unwrap()).to_string(), "(NP (NNP Mary))");
//! ```

pub mod category; // Basic-category functions for `@` descriptions
pub mod compiler; // Macro expansion and compilation
pub mod head_finder; // Head rules for the head relations
pub mod iterators; // Treebank and match collections
pub mod matcher; // Backtracking search
pub mod parser; // Pattern language parser
pub mod pattern; // Pattern AST
pub mod penn; // Penn treebank reader
pub mod relation; // Node relations
pub mod tree; // Arena trees
pub mod variables; // Variable group bindings

pub use category::{BasicCategory, PennBasicCategory};
pub use compiler::{MacroEncoding, MacroError, TregexParseError, TregexPatternCompiler};
pub use head_finder::{CollinsHeadFinder, HeadFinder};
pub use iterators::{MatchSet, TreeMatch, Treebank, find_all};
pub use matcher::{MatcherError, TregexMatcher};
pub use parser::PatternError;
pub use pattern::{CoordinationPattern, DescriptionMode, DescriptionPattern, PatternNode, TregexPattern};
pub use penn::{PennError, PennTreeReader};
pub use relation::{Relation, RelationError};
pub use tree::{Node, NodeId, Tree};
pub use variables::VariableStrings;

/// Compile a pattern with the default compiler
pub fn compile(pattern: &str) -> Result<TregexPattern, TregexParseError> {
    TregexPattern::compile(pattern)
}

/// Compile a pattern, logging and discarding any error
pub fn safe_compile(pattern: &str) -> Option<TregexPattern> {
    TregexPattern::safe_compile(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTENCE: &str = "(ROOT (S (NP (DT The) (JJ quick) (NN fox)) \
                            (VP (VBD jumped) (PP (IN over) (NP (DT the) (NN dog)))) (. .)))";

    fn all_matches(pattern: &str, tree: &Tree) -> Vec<String> {
        let pattern = TregexPattern::compile(pattern).unwrap();
        find_all(&pattern, tree)
            .into_iter()
            .map(|m| tree.display(m.root).to_string())
            .collect()
    }

    #[test]
    fn test_end_to_end_search() {
        let tree = Tree::from_penn(SENTENCE).unwrap();
        assert_eq!(all_matches("NP < NN", &tree), vec![
            "(NP (DT The) (JJ quick) (NN fox))",
            "(NP (DT the) (NN dog))"
        ]);
        assert_eq!(all_matches("NP !>> VP", &tree), vec![
            "(NP (DT The) (JJ quick) (NN fox))"
        ]);
        assert_eq!(all_matches("PP <- (NP <- NN)", &tree).len(), 1);
        assert_eq!(all_matches("/^NN/ , JJ", &tree), vec!["(NN fox)"]);
    }

    #[test]
    fn test_reexports_compose() {
        let mut compiler = TregexPatternCompiler::new();
        compiler.add_macro("DET", "DT").unwrap();
        let pattern = compiler.compile("NP < DET=det").unwrap();
        let treebank = Treebank::from_string(SENTENCE);
        let dets: Vec<_> = MatchSet::new(&treebank, &pattern)
            .into_iter()
            .map(|(tree, m)| tree.display(m.node("det").unwrap()).to_string())
            .collect();
        assert_eq!(dets, vec!["(DT The)", "(DT the)"]);
    }

    #[test]
    fn test_crate_level_compile() {
        assert_eq!(compile("NP <1 DT").unwrap().pattern(), "NP <1 DT");
        assert!(compile("NP <").is_err());
        assert!(safe_compile("NP <").is_none());
        assert!(safe_compile("__ !< __").is_some());
    }
}
