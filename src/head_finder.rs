//! Head finding
//!
//! Head relations (`<#`, `>#`, `<<#`, `>>#`) ask a [`HeadFinder`] which child
//! of a phrase is its head. The default [`CollinsHeadFinder`] implements the
//! head table from Collins (1999) over Penn treebank categories.

use crate::category::{BasicCategory, PennBasicCategory};
use crate::tree::{NodeId, Tree};
use rustc_hash::FxHashMap;

/// Head selection strategy, shared by every matcher built from a pattern
pub trait HeadFinder: Send + Sync {
    /// The head child of `node`, or `None` for a leaf
    fn determine_head(&self, tree: &Tree, node: NodeId) -> Option<NodeId>;
}

impl<F> HeadFinder for F
where
    F: Fn(&Tree, NodeId) -> Option<NodeId> + Send + Sync,
{
    fn determine_head(&self, tree: &Tree, node: NodeId) -> Option<NodeId> {
        self(tree, node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// For each category in turn, the leftmost child with that category
    Left,
    /// For each category in turn, the rightmost child with that category
    Right,
    /// The leftmost child with any of the categories
    LeftDis,
    /// The rightmost child with any of the categories
    RightDis,
}

type RuleTable = &'static [(&'static str, &'static [(Direction, &'static [&'static str])])];

use Direction::{Left, LeftDis, Right, RightDis};

const COLLINS_RULES: RuleTable = &[
    (
        "ADJP",
        &[(
            Left,
            &[
                "NNS", "QP", "NN", "$", "ADVP", "JJ", "VBN", "VBG", "ADJP", "JJR", "NP", "JJS",
                "DT", "FW", "RBR", "RBS", "SBAR", "RB",
            ],
        )],
    ),
    (
        "ADVP",
        &[(
            Right,
            &["RB", "RBR", "RBS", "FW", "ADVP", "TO", "CD", "JJR", "JJ", "IN", "NP", "JJS", "NN"],
        )],
    ),
    ("CONJP", &[(Right, &["CC", "RB", "IN"])]),
    ("FRAG", &[(Right, &[])]),
    ("INTJ", &[(Left, &[])]),
    ("LST", &[(Right, &["LS", ":"])]),
    (
        "NAC",
        &[(
            Left,
            &[
                "NN", "NNS", "NNP", "NNPS", "NP", "NAC", "EX", "$", "CD", "QP", "PRP", "VBG", "JJ",
                "JJS", "JJR", "ADJP", "FW",
            ],
        )],
    ),
    (
        "NP",
        &[
            (RightDis, &["NN", "NNP", "NNPS", "NNS", "NX", "POS", "JJR"]),
            (Left, &["NP"]),
            (RightDis, &["$", "ADJP", "PRN"]),
            (Right, &["CD"]),
            (RightDis, &["JJ", "JJS", "RB", "QP"]),
        ],
    ),
    ("NX", &[(Left, &[])]),
    ("PP", &[(Right, &["IN", "TO", "VBG", "VBN", "RP", "FW"])]),
    ("PRN", &[(Left, &[])]),
    ("PRT", &[(Right, &["RP"])]),
    (
        "QP",
        &[(
            Left,
            &["$", "IN", "NNS", "NN", "JJ", "RB", "DT", "CD", "NCD", "QP", "JJR", "JJS"],
        )],
    ),
    ("RRC", &[(Right, &["VP", "NP", "ADVP", "ADJP", "PP"])]),
    ("S", &[(Left, &["TO", "IN", "VP", "S", "SBAR", "ADJP", "UCP", "NP"])]),
    (
        "SBAR",
        &[(
            Left,
            &["WHNP", "WHPP", "WHADVP", "WHADJP", "IN", "DT", "S", "SQ", "SINV", "SBAR", "FRAG"],
        )],
    ),
    ("SBARQ", &[(Left, &["SQ", "S", "SINV", "SBARQ", "FRAG"])]),
    (
        "SINV",
        &[(Left, &["VBZ", "VBD", "VBP", "VB", "MD", "VP", "S", "SINV", "ADJP", "NP"])],
    ),
    ("SQ", &[(Left, &["VBZ", "VBD", "VBP", "VB", "MD", "VP", "SQ"])]),
    ("UCP", &[(Right, &[])]),
    (
        "VP",
        &[(
            Left,
            &[
                "TO", "VBD", "VBN", "MD", "VBZ", "VB", "VBG", "VBP", "VP", "ADJP", "NN", "NNS",
                "NP",
            ],
        )],
    ),
    ("WHADJP", &[(Left, &["CC", "WRB", "JJ", "ADJP"])]),
    ("WHADVP", &[(Right, &["CC", "WRB"])]),
    ("WHNP", &[(Left, &["WDT", "WP", "WP$", "WHADJP", "WHPP", "WHNP"])]),
    ("WHPP", &[(Right, &["IN", "TO", "FW"])]),
    ("X", &[(Right, &[])]),
    ("ROOT", &[(Left, &["S", "SQ", "SINV", "SBARQ", "FRAG"])]),
];

const PUNCTUATION_TAGS: &[&str] = &["''", "``", "-LRB-", "-RRB-", ".", ":", ","];

/// Collins (1999) head rules for the Penn treebank
pub struct CollinsHeadFinder {
    rules: FxHashMap<&'static str, &'static [(Direction, &'static [&'static str])]>,
    category: PennBasicCategory,
}

impl CollinsHeadFinder {
    pub fn new() -> Self {
        Self {
            rules: COLLINS_RULES.iter().copied().collect(),
            category: PennBasicCategory,
        }
    }

    fn category_of<'t>(&self, tree: &'t Tree, node: NodeId) -> std::borrow::Cow<'t, str> {
        self.category.basic_category(tree.label(node).unwrap_or(""))
    }

    /// Apply one rule to the children; `last_resort` falls back to the
    /// outermost child in the rule's direction.
    fn traverse(
        &self,
        tree: &Tree,
        kids: &[NodeId],
        direction: Direction,
        categories: &[&str],
        last_resort: bool,
    ) -> Option<usize> {
        let cats: Vec<_> = kids.iter().map(|&k| self.category_of(tree, k)).collect();
        let found = match direction {
            Left => categories
                .iter()
                .find_map(|c| cats.iter().position(|k| k == c)),
            Right => categories
                .iter()
                .find_map(|c| cats.iter().rposition(|k| k == c)),
            LeftDis => cats.iter().position(|k| categories.contains(&&**k)),
            RightDis => cats.iter().rposition(|k| categories.contains(&&**k)),
        };
        match found {
            Some(idx) => Some(idx),
            None if last_resort => match direction {
                Left | LeftDis => Some(0),
                Right | RightDis => Some(kids.len() - 1),
            },
            None => None,
        }
    }

    /// A head preceded by a coordinator moves to the conjunct before it
    fn fix_coordination(&self, tree: &Tree, kids: &[NodeId], head: usize) -> usize {
        if head < 2 {
            return head;
        }
        let prev = self.category_of(tree, kids[head - 1]);
        if prev != "CC" && prev != "CONJP" {
            return head;
        }
        let mut idx = head as isize - 2;
        while idx >= 0 {
            let kid = kids[idx as usize];
            let is_punct = tree.is_preterminal(kid)
                && PUNCTUATION_TAGS.contains(&tree.label(kid).unwrap_or(""));
            if !is_punct {
                break;
            }
            idx -= 1;
        }
        if idx >= 0 { idx as usize } else { head }
    }
}

impl Default for CollinsHeadFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadFinder for CollinsHeadFinder {
    fn determine_head(&self, tree: &Tree, node: NodeId) -> Option<NodeId> {
        let kids = tree.children(node);
        match kids.len() {
            0 => return None,
            1 => return Some(kids[0]),
            _ => {}
        }
        let mother = self.category_of(tree, node);
        let Some(rules) = self.rules.get(&*mother) else {
            return Some(kids[0]);
        };
        let head = rules
            .iter()
            .enumerate()
            .find_map(|(i, (direction, categories))| {
                self.traverse(tree, kids, *direction, categories, i == rules.len() - 1)
            })?;
        Some(kids[self.fix_coordination(tree, kids, head)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head_label(tree: &Tree, node: NodeId) -> Option<&str> {
        CollinsHeadFinder::new()
            .determine_head(tree, node)
            .and_then(|h| tree.label(h))
    }

    #[test]
    fn test_np_heads() {
        let tree = Tree::from_penn(
            "(NP (NP (NN work) (NNS practices)) (PP (IN in) (NP (NNP Brazil))))",
        )
        .unwrap();
        assert_eq!(head_label(&tree, 0), Some("NP"));
        assert_eq!(head_label(&tree, 1), Some("NNS"));
        assert_eq!(head_label(&tree, 6), Some("IN"));
    }

    #[test]
    fn test_clause_heads() {
        let tree = Tree::from_penn(
            "(ROOT (S (NP-SBJ (PRP it)) (VP (VBZ is) (ADJP (JJ easy))) (. .)))",
        )
        .unwrap();
        assert_eq!(head_label(&tree, 0), Some("S"));
        assert_eq!(head_label(&tree, 1), Some("VP"));
        let vp = tree.children(1)[1];
        assert_eq!(head_label(&tree, vp), Some("VBZ"));
    }

    #[test]
    fn test_leaf_unary_and_unknown() {
        let tree = Tree::from_penn("(XYZ (A a) (B b))").unwrap();
        assert_eq!(head_label(&tree, 0), Some("A"));
        assert_eq!(head_label(&tree, 1), Some("a"));
        assert_eq!(head_label(&tree, 2), None);
    }

    #[test]
    fn test_coordination_adjustment() {
        // UCP takes its last child; the CC before it moves the head left
        let tree = Tree::from_penn("(UCP (NP (NN cats)) (CC and) (ADJP (JJ happy)))").unwrap();
        let hf = CollinsHeadFinder::new();
        let head = hf.determine_head(&tree, 0).unwrap();
        assert_eq!(tree.label(head), Some("NP"));
    }

    #[test]
    fn test_closure_head_finder() {
        let tree = Tree::from_penn("(NP (DT the) (NN dog))").unwrap();
        let leftmost = |tree: &Tree, node: NodeId| tree.first_child(node);
        let head = leftmost.determine_head(&tree, 0);
        assert_eq!(head.and_then(|h| tree.label(h)), Some("DT"));
    }
}
