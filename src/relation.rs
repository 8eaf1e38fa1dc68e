//! Tree relations
//!
//! A relation names how a candidate node is positioned relative to an anchor
//! node: dominance, precedence, sisterhood, headship and so on. Matching
//! never tests relations pairwise; instead each relation enumerates its
//! candidates lazily through a [`RelationSearch`], in a fixed order that the
//! backtracking matcher can resume after every candidate.

use crate::category::BasicCategory;
use crate::head_finder::HeadFinder;
use crate::matcher::MatchContext;
use crate::tree::NodeId;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// Error type for relations that cannot be constructed
#[derive(Debug, Error)]
pub enum RelationError {
    #[error("Unrecognized relation: {0}")]
    UnknownRelation(String),

    #[error("Error -- no such thing as zeroth child!")]
    ZeroChildIndex,

    #[error("Invalid child index: {0}")]
    BadIndex(String),

    #[error("Invalid relation argument {arg}: {source}")]
    BadArgument {
        arg: String,
        #[source]
        source: regex::Error,
    },
}

/// A head finder attached to a head relation. Two strategies are equal only
/// if they are the same instance.
#[derive(Clone)]
pub struct HeadStrategy(pub(crate) Arc<dyn HeadFinder>);

impl PartialEq for HeadStrategy {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for HeadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HeadStrategy")
    }
}

/// The node test carried by an unbroken-category relation, e.g. `!@JJ` in
/// `.+(!@JJ)`
#[derive(Clone)]
pub struct CategoryChain {
    arg: String,
    pattern: Regex,
    negated: bool,
    basic_category: Option<Arc<dyn BasicCategory>>,
}

impl CategoryChain {
    pub fn new(arg: &str, basic_category: &Arc<dyn BasicCategory>) -> Result<Self, RelationError> {
        let (negated, rest) = match arg.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, arg),
        };
        let (basic_category, rest) = match rest.strip_prefix('@') {
            Some(rest) => (Some(Arc::clone(basic_category)), rest),
            None => (None, rest),
        };
        let source = if rest.len() >= 2 && rest.starts_with('/') && rest.ends_with('/') {
            rest[1..rest.len() - 1].replace("\\/", "/")
        } else if rest == "__" {
            "^.*$".to_string()
        } else {
            format!("^(?:{})$", rest)
        };
        let pattern = Regex::new(&source).map_err(|source| RelationError::BadArgument {
            arg: arg.to_string(),
            source,
        })?;
        Ok(Self {
            arg: arg.to_string(),
            pattern,
            negated,
            basic_category,
        })
    }

    /// Whether a chain may pass through a node with this label
    pub fn matches(&self, label: Option<&str>) -> bool {
        match label {
            // A missing label matches no positive pattern but every negated one
            None => self.negated,
            Some(label) => {
                let found = match &self.basic_category {
                    Some(bc) => self.pattern.is_match(&bc.basic_category(label)),
                    None => self.pattern.is_match(label),
                };
                found != self.negated
            }
        }
    }
}

impl PartialEq for CategoryChain {
    fn eq(&self, other: &Self) -> bool {
        self.arg == other.arg
    }
}

impl fmt::Debug for CategoryChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CategoryChain").field(&self.arg).finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    /// Internal relation of the root description: the anchor itself
    Root,
    /// `==`
    Equals,
    /// `:`, a segment boundary that searches the whole tree
    PatternSplitter,
    /// `<<`
    Dominates,
    /// `>>`
    DominatedBy,
    /// `<`
    ParentOf,
    /// `>`
    ChildOf,
    /// `..`
    Precedes,
    /// `.`
    ImmediatelyPrecedes,
    /// `,,`
    Follows,
    /// `,`
    ImmediatelyFollows,
    /// `<<,`
    HasLeftmostDescendant,
    /// `<<-`
    HasRightmostDescendant,
    /// `>>,`
    LeftmostDescendantOf,
    /// `>>-`
    RightmostDescendantOf,
    /// `$`
    SisterOf,
    /// `$++`
    LeftSisterOf,
    /// `$--`
    RightSisterOf,
    /// `$+`
    ImmediateLeftSisterOf,
    /// `$-`
    ImmediateRightSisterOf,
    /// `>:`
    OnlyChildOf,
    /// `<:`
    HasOnlyChild,
    /// `<<:`
    UnaryPathAncestorOf,
    /// `>>:`
    UnaryPathDescendantOf,
    /// `<=`
    ParentEquals,
    /// `<i`, negative `i` counts from the last child
    HasIthChild(i32),
    /// `>i`
    IthChildOf(i32),
    /// `>>#`
    Heads(HeadStrategy),
    /// `<<#`
    HeadedBy(HeadStrategy),
    /// `>#`
    ImmediatelyHeads(HeadStrategy),
    /// `<#`
    ImmediatelyHeadedBy(HeadStrategy),
    /// `<+(C)`
    UnbrokenCategoryDominates(CategoryChain),
    /// `>+(C)`
    UnbrokenCategoryIsDominatedBy(CategoryChain),
    /// `.+(C)`
    UnbrokenCategoryPrecedes(CategoryChain),
    /// `,+(C)`
    UnbrokenCategoryFollows(CategoryChain),
}

impl Eq for Relation {}

impl Hash for Relation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Strategy objects are left out; equal relations still hash equally.
        self.to_string().hash(state);
    }
}

impl Relation {
    /// Look up a relation written without an argument
    pub fn from_symbol(symbol: &str, head_finder: &Arc<dyn HeadFinder>) -> Result<Self, RelationError> {
        let head = || HeadStrategy(Arc::clone(head_finder));
        let relation = match symbol {
            "==" => Relation::Equals,
            ":" => Relation::PatternSplitter,
            "<<" => Relation::Dominates,
            ">>" => Relation::DominatedBy,
            "<" => Relation::ParentOf,
            ">" => Relation::ChildOf,
            ".." => Relation::Precedes,
            "." => Relation::ImmediatelyPrecedes,
            ",," => Relation::Follows,
            "," => Relation::ImmediatelyFollows,
            "<<," => Relation::HasLeftmostDescendant,
            "<<-" | "<<`" => Relation::HasRightmostDescendant,
            ">>," => Relation::LeftmostDescendantOf,
            ">>-" | ">>`" => Relation::RightmostDescendantOf,
            "$" => Relation::SisterOf,
            "$++" | "$.." => Relation::LeftSisterOf,
            "$--" | "$,," => Relation::RightSisterOf,
            "$+" | "$." => Relation::ImmediateLeftSisterOf,
            "$-" | "$," => Relation::ImmediateRightSisterOf,
            ">:" => Relation::OnlyChildOf,
            "<:" => Relation::HasOnlyChild,
            "<<:" => Relation::UnaryPathAncestorOf,
            ">>:" => Relation::UnaryPathDescendantOf,
            "<=" => Relation::ParentEquals,
            "<," => Relation::HasIthChild(1),
            "<-" | "<`" => Relation::HasIthChild(-1),
            ">," => Relation::IthChildOf(1),
            ">-" | ">`" => Relation::IthChildOf(-1),
            ">>#" => Relation::Heads(head()),
            "<<#" => Relation::HeadedBy(head()),
            ">#" => Relation::ImmediatelyHeads(head()),
            "<#" => Relation::ImmediatelyHeadedBy(head()),
            _ => return Err(RelationError::UnknownRelation(symbol.to_string())),
        };
        Ok(relation)
    }

    /// Look up a relation that takes an argument: `<` / `>` with a child
    /// index, or one of the unbroken-category relations with a node test
    pub fn with_argument(
        symbol: &str,
        arg: &str,
        basic_category: &Arc<dyn BasicCategory>,
    ) -> Result<Self, RelationError> {
        match symbol {
            "<" | ">" => {
                let index: i32 = arg
                    .parse()
                    .map_err(|_| RelationError::BadIndex(arg.to_string()))?;
                if symbol == "<" {
                    Self::has_ith_child(index)
                } else {
                    Self::ith_child_of(index)
                }
            }
            "<+" => Ok(Relation::UnbrokenCategoryDominates(CategoryChain::new(arg, basic_category)?)),
            ">+" => Ok(Relation::UnbrokenCategoryIsDominatedBy(CategoryChain::new(arg, basic_category)?)),
            ".+" => Ok(Relation::UnbrokenCategoryPrecedes(CategoryChain::new(arg, basic_category)?)),
            ",+" => Ok(Relation::UnbrokenCategoryFollows(CategoryChain::new(arg, basic_category)?)),
            _ => Err(RelationError::UnknownRelation(format!("{}({})", symbol, arg))),
        }
    }

    pub fn has_ith_child(index: i32) -> Result<Self, RelationError> {
        if index == 0 {
            return Err(RelationError::ZeroChildIndex);
        }
        Ok(Relation::HasIthChild(index))
    }

    pub fn ith_child_of(index: i32) -> Result<Self, RelationError> {
        if index == 0 {
            return Err(RelationError::ZeroChildIndex);
        }
        Ok(Relation::IthChildOf(index))
    }

    /// Start enumerating the candidates related to `anchor`
    pub(crate) fn search<'r>(&'r self, anchor: NodeId, ctx: &MatchContext<'_>) -> RelationSearch<'r> {
        let tree = ctx.tree;
        let state = match self {
            Relation::Root | Relation::Equals => SearchState::Once(Some(anchor)),
            Relation::PatternSplitter => SearchState::Stack {
                stack: vec![ctx.root],
                expand: Expand::All,
            },
            Relation::Dominates => SearchState::Stack {
                stack: tree.children(anchor).iter().rev().copied().collect(),
                expand: Expand::All,
            },
            Relation::UnbrokenCategoryDominates(_) => SearchState::Stack {
                stack: tree.children(anchor).iter().rev().copied().collect(),
                expand: Expand::Chain,
            },
            Relation::DominatedBy => SearchState::Walk {
                next: ctx.parent(anchor),
                step: Step::Parent,
            },
            Relation::ParentOf => SearchState::Children {
                parent: anchor,
                index: 0,
                skip: None,
                include_parent: false,
            },
            Relation::ParentEquals => SearchState::Children {
                parent: anchor,
                index: 0,
                skip: None,
                include_parent: true,
            },
            Relation::ChildOf => SearchState::Once(ctx.parent(anchor)),
            Relation::Precedes => SearchState::Stack {
                stack: horizontal_frontier(anchor, ctx, true),
                expand: Expand::All,
            },
            Relation::Follows => SearchState::Stack {
                stack: horizontal_frontier(anchor, ctx, false),
                expand: Expand::All,
            },
            Relation::ImmediatelyPrecedes => SearchState::Walk {
                next: adjacent_subtree(anchor, ctx, true),
                step: Step::FirstChild,
            },
            Relation::ImmediatelyFollows => SearchState::Walk {
                next: adjacent_subtree(anchor, ctx, false),
                step: Step::LastChild,
            },
            Relation::HasLeftmostDescendant => SearchState::Walk {
                next: tree.first_child(anchor),
                step: Step::FirstChild,
            },
            Relation::HasRightmostDescendant => SearchState::Walk {
                next: tree.last_child(anchor),
                step: Step::LastChild,
            },
            Relation::LeftmostDescendantOf => SearchState::Walk {
                next: Step::FirstChildUp.apply(anchor, self, ctx),
                step: Step::FirstChildUp,
            },
            Relation::RightmostDescendantOf => SearchState::Walk {
                next: Step::LastChildUp.apply(anchor, self, ctx),
                step: Step::LastChildUp,
            },
            Relation::SisterOf => match ctx.parent(anchor) {
                Some(parent) => SearchState::Children {
                    parent,
                    index: 0,
                    skip: Some(anchor),
                    include_parent: false,
                },
                None => SearchState::Once(None),
            },
            Relation::LeftSisterOf => match ctx.parent(anchor) {
                Some(parent) => SearchState::SistersFromRight {
                    parent,
                    remaining: tree.num_children(parent),
                    stop: anchor,
                },
                None => SearchState::Once(None),
            },
            Relation::RightSisterOf => match ctx.parent(anchor) {
                Some(parent) => SearchState::SistersFromLeft {
                    parent,
                    index: 0,
                    stop: anchor,
                },
                None => SearchState::Once(None),
            },
            Relation::ImmediateLeftSisterOf => SearchState::Once(sister_at(anchor, ctx, 1)),
            Relation::ImmediateRightSisterOf => SearchState::Once(sister_at(anchor, ctx, -1)),
            Relation::OnlyChildOf => SearchState::Once(
                ctx.parent(anchor)
                    .filter(|&parent| tree.num_children(parent) == 1),
            ),
            Relation::HasOnlyChild => SearchState::Once(only_child(anchor, ctx)),
            Relation::UnaryPathAncestorOf => SearchState::Walk {
                next: only_child(anchor, ctx),
                step: Step::OnlyChild,
            },
            Relation::UnaryPathDescendantOf => SearchState::Walk {
                next: Step::UnaryParent.apply(anchor, self, ctx),
                step: Step::UnaryParent,
            },
            Relation::HasIthChild(index) => SearchState::Once(ith_child(anchor, *index, ctx)),
            Relation::IthChildOf(index) => SearchState::Once(
                ctx.parent(anchor)
                    .filter(|&parent| ith_child(parent, *index, ctx) == Some(anchor)),
            ),
            Relation::Heads(_) => SearchState::Walk {
                next: Step::HeadUp.apply(anchor, self, ctx),
                step: Step::HeadUp,
            },
            Relation::HeadedBy(_) => SearchState::Walk {
                next: Step::HeadDown.apply(anchor, self, ctx),
                step: Step::HeadDown,
            },
            Relation::ImmediatelyHeads(_) => SearchState::Once(
                ctx.parent(anchor)
                    .filter(|&parent| self.head(parent, ctx) == Some(anchor)),
            ),
            Relation::ImmediatelyHeadedBy(_) => SearchState::Once(self.head(anchor, ctx)),
            Relation::UnbrokenCategoryIsDominatedBy(_) => SearchState::Walk {
                next: ctx.parent(anchor),
                step: Step::ChainUp,
            },
            Relation::UnbrokenCategoryPrecedes(chain) => {
                let mut stack = Vec::new();
                let mut seen = FxHashSet::default();
                collect_chain(anchor, chain, ctx, true, &mut stack, &mut seen);
                SearchState::Stack {
                    stack,
                    expand: Expand::None,
                }
            }
            Relation::UnbrokenCategoryFollows(chain) => {
                let mut stack = Vec::new();
                let mut seen = FxHashSet::default();
                collect_chain(anchor, chain, ctx, false, &mut stack, &mut seen);
                SearchState::Stack {
                    stack,
                    expand: Expand::None,
                }
            }
        };
        RelationSearch {
            relation: self,
            state,
        }
    }

    /// Head of `node` under this relation, unless the matcher overrides the
    /// head finder
    fn head(&self, node: NodeId, ctx: &MatchContext<'_>) -> Option<NodeId> {
        if ctx.tree.is_leaf(node) {
            return None;
        }
        match (ctx.head_finder, self) {
            (Some(finder), _) => finder.determine_head(ctx.tree, node),
            (
                None,
                Relation::Heads(strategy)
                | Relation::HeadedBy(strategy)
                | Relation::ImmediatelyHeads(strategy)
                | Relation::ImmediatelyHeadedBy(strategy),
            ) => strategy.0.determine_head(ctx.tree, node),
            (None, _) => None,
        }
    }

    fn chain(&self) -> Option<&CategoryChain> {
        match self {
            Relation::UnbrokenCategoryDominates(chain)
            | Relation::UnbrokenCategoryIsDominatedBy(chain)
            | Relation::UnbrokenCategoryPrecedes(chain)
            | Relation::UnbrokenCategoryFollows(chain) => Some(chain),
            _ => None,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Relation::Root => "Root",
            Relation::Equals => "==",
            Relation::PatternSplitter => ":",
            Relation::Dominates => "<<",
            Relation::DominatedBy => ">>",
            Relation::ParentOf => "<",
            Relation::ChildOf => ">",
            Relation::Precedes => "..",
            Relation::ImmediatelyPrecedes => ".",
            Relation::Follows => ",,",
            Relation::ImmediatelyFollows => ",",
            Relation::HasLeftmostDescendant => "<<,",
            Relation::HasRightmostDescendant => "<<-",
            Relation::LeftmostDescendantOf => ">>,",
            Relation::RightmostDescendantOf => ">>-",
            Relation::SisterOf => "$",
            Relation::LeftSisterOf => "$++",
            Relation::RightSisterOf => "$--",
            Relation::ImmediateLeftSisterOf => "$+",
            Relation::ImmediateRightSisterOf => "$-",
            Relation::OnlyChildOf => ">:",
            Relation::HasOnlyChild => "<:",
            Relation::UnaryPathAncestorOf => "<<:",
            Relation::UnaryPathDescendantOf => ">>:",
            Relation::ParentEquals => "<=",
            Relation::Heads(_) => ">>#",
            Relation::HeadedBy(_) => "<<#",
            Relation::ImmediatelyHeads(_) => ">#",
            Relation::ImmediatelyHeadedBy(_) => "<#",
            Relation::HasIthChild(i) => return write!(f, "<{}", i),
            Relation::IthChildOf(i) => return write!(f, ">{}", i),
            Relation::UnbrokenCategoryDominates(c) => return write!(f, "<+({})", c.arg),
            Relation::UnbrokenCategoryIsDominatedBy(c) => return write!(f, ">+({})", c.arg),
            Relation::UnbrokenCategoryPrecedes(c) => return write!(f, ".+({})", c.arg),
            Relation::UnbrokenCategoryFollows(c) => return write!(f, ",+({})", c.arg),
        };
        f.write_str(symbol)
    }
}

/// `i`-th child of `node` (1-based, negative counts from the end)
fn ith_child(node: NodeId, index: i32, ctx: &MatchContext<'_>) -> Option<NodeId> {
    let kids = ctx.tree.children(node);
    let n = kids.len() as i64;
    let index = index as i64;
    if n < index.abs() {
        return None;
    }
    let pos = if index > 0 { index - 1 } else { n + index };
    kids.get(pos as usize).copied()
}

fn only_child(node: NodeId, ctx: &MatchContext<'_>) -> Option<NodeId> {
    match ctx.tree.children(node) {
        [only] => Some(*only),
        _ => None,
    }
}

/// The sister `offset` positions away from `node`
fn sister_at(node: NodeId, ctx: &MatchContext<'_>, offset: isize) -> Option<NodeId> {
    let parent = ctx.parent(node)?;
    let pos = ctx.tree.child_index(parent, node)? as isize + offset;
    if pos < 0 {
        return None;
    }
    ctx.tree.children(parent).get(pos as usize).copied()
}

/// Sisters of `node` and of each of its ancestors on one side, in stack order
/// (the nearest sister ends up on top)
fn horizontal_frontier(node: NodeId, ctx: &MatchContext<'_>, rightward: bool) -> Vec<NodeId> {
    let mut stack = Vec::new();
    let mut current = node;
    while let Some(parent) = ctx.parent(current) {
        let kids = ctx.tree.children(parent);
        let pos = kids.iter().position(|&k| k == current).unwrap_or(kids.len());
        if rightward {
            stack.extend(kids[pos + 1..].iter().rev().copied());
        } else {
            stack.extend(kids[..pos].iter().copied());
        }
        current = parent;
    }
    stack
}

/// The subtree immediately to the right (or left) of `node`: climb while
/// `node` is on the edge, then step to the adjacent sister
fn adjacent_subtree(node: NodeId, ctx: &MatchContext<'_>, rightward: bool) -> Option<NodeId> {
    let mut current = node;
    loop {
        let parent = ctx.parent(current)?;
        let edge = if rightward {
            ctx.tree.last_child(parent)
        } else {
            ctx.tree.first_child(parent)
        };
        if edge != Some(current) {
            return sister_at(current, ctx, if rightward { 1 } else { -1 });
        }
        current = parent;
    }
}

/// Collect the nodes reachable from `node` through an unbroken chain of
/// adjacent nodes whose labels satisfy `chain`
fn collect_chain(
    node: NodeId,
    chain: &CategoryChain,
    ctx: &MatchContext<'_>,
    rightward: bool,
    stack: &mut Vec<NodeId>,
    seen: &mut FxHashSet<NodeId>,
) {
    let tree = ctx.tree;
    let mut current = node;
    let mut next = None;
    while let Some(parent) = ctx.parent(current) {
        let kids = tree.children(parent);
        let Some(pos) = kids.iter().position(|&k| k == current) else {
            return;
        };
        let on_edge = if rightward { pos + 1 == kids.len() } else { pos == 0 };
        if !on_edge {
            let adjacent = if rightward { pos + 1 } else { pos - 1 };
            next = Some(kids[adjacent]);
            break;
        }
        if parent == ctx.root {
            break;
        }
        current = parent;
    }
    while let Some(candidate) = next {
        if seen.insert(candidate) {
            stack.push(candidate);
        }
        if chain.matches(tree.label(candidate)) {
            collect_chain(candidate, chain, ctx, rightward, stack, seen);
        }
        next = if rightward {
            tree.first_child(candidate)
        } else {
            tree.last_child(candidate)
        };
    }
}

/// How a walk moves from one candidate to the next
#[derive(Debug, Clone, Copy)]
enum Step {
    Parent,
    FirstChild,
    LastChild,
    /// To the parent, while the current node is its first child
    FirstChildUp,
    /// To the parent, while the current node is its last child
    LastChildUp,
    OnlyChild,
    /// To the parent, while the parent has exactly one child
    UnaryParent,
    HeadDown,
    /// To the parent, while the current node is its head
    HeadUp,
    /// To the parent, while the current node satisfies the category chain
    ChainUp,
}

impl Step {
    fn apply(self, node: NodeId, relation: &Relation, ctx: &MatchContext<'_>) -> Option<NodeId> {
        let tree = ctx.tree;
        match self {
            Step::Parent => ctx.parent(node),
            Step::FirstChild => tree.first_child(node),
            Step::LastChild => tree.last_child(node),
            Step::FirstChildUp => ctx
                .parent(node)
                .filter(|&parent| tree.first_child(parent) == Some(node)),
            Step::LastChildUp => ctx
                .parent(node)
                .filter(|&parent| tree.last_child(parent) == Some(node)),
            Step::OnlyChild => only_child(node, ctx),
            Step::UnaryParent => ctx
                .parent(node)
                .filter(|&parent| tree.num_children(parent) == 1),
            Step::HeadDown => relation.head(node, ctx),
            Step::HeadUp => ctx
                .parent(node)
                .filter(|&parent| relation.head(parent, ctx) == Some(node)),
            Step::ChainUp => {
                let chain = relation.chain()?;
                if chain.matches(tree.label(node)) {
                    ctx.parent(node)
                } else {
                    None
                }
            }
        }
    }
}

/// Which nodes a stack search pushes after popping a candidate
#[derive(Debug, Clone, Copy)]
enum Expand {
    /// Every child (preorder traversal)
    All,
    /// Children of candidates that satisfy the category chain
    Chain,
    /// Nothing; the stack was filled up front
    None,
}

#[derive(Debug, Clone)]
enum SearchState {
    /// At most one candidate
    Once(Option<NodeId>),
    /// A chain of candidates, each computed from the previous one
    Walk { next: Option<NodeId>, step: Step },
    /// Children of `parent` left to right, optionally preceded by the parent
    /// itself and skipping one node
    Children {
        parent: NodeId,
        index: usize,
        skip: Option<NodeId>,
        include_parent: bool,
    },
    /// Children of `parent` from the right, up to `stop`
    SistersFromRight {
        parent: NodeId,
        remaining: usize,
        stop: NodeId,
    },
    /// Children of `parent` from the left, up to `stop`
    SistersFromLeft {
        parent: NodeId,
        index: usize,
        stop: NodeId,
    },
    Stack { stack: Vec<NodeId>, expand: Expand },
    Done,
}

/// A lazy, resumable enumeration of the candidates of one relation
#[derive(Debug, Clone)]
pub(crate) struct RelationSearch<'r> {
    relation: &'r Relation,
    state: SearchState,
}

impl RelationSearch<'_> {
    pub(crate) fn next(&mut self, ctx: &MatchContext<'_>) -> Option<NodeId> {
        let tree = ctx.tree;
        match &mut self.state {
            SearchState::Once(next) => next.take(),
            SearchState::Walk { next, step } => {
                let current = (*next)?;
                *next = step.apply(current, self.relation, ctx);
                Some(current)
            }
            SearchState::Children {
                parent,
                index,
                skip,
                include_parent,
            } => {
                if *include_parent {
                    *include_parent = false;
                    return Some(*parent);
                }
                let kids = tree.children(*parent);
                while let Some(&kid) = kids.get(*index) {
                    *index += 1;
                    if Some(kid) != *skip {
                        return Some(kid);
                    }
                }
                None
            }
            SearchState::SistersFromRight {
                parent,
                remaining,
                stop,
            } => {
                if *remaining == 0 {
                    return None;
                }
                *remaining -= 1;
                let kid = tree.children(*parent)[*remaining];
                if kid == *stop {
                    self.state = SearchState::Done;
                    return None;
                }
                Some(kid)
            }
            SearchState::SistersFromLeft {
                parent,
                index,
                stop,
            } => {
                let kid = *tree.children(*parent).get(*index)?;
                if kid == *stop {
                    self.state = SearchState::Done;
                    return None;
                }
                *index += 1;
                Some(kid)
            }
            SearchState::Stack { stack, expand } => {
                let node = stack.pop()?;
                let push = match expand {
                    Expand::All => true,
                    Expand::Chain => self
                        .relation
                        .chain()
                        .is_some_and(|chain| chain.matches(tree.label(node))),
                    Expand::None => false,
                };
                if push {
                    stack.extend(tree.children(node).iter().rev().copied());
                }
                Some(node)
            }
            SearchState::Done => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::PennBasicCategory;
    use crate::head_finder::CollinsHeadFinder;
    use crate::tree::Tree;

    fn head_finder() -> Arc<dyn HeadFinder> {
        Arc::new(CollinsHeadFinder::new())
    }

    fn basic_category() -> Arc<dyn BasicCategory> {
        Arc::new(PennBasicCategory)
    }

    /// Labels of every candidate of `relation` for the first node labeled `anchor`
    fn candidates(relation: &Relation, tree: &Tree, anchor: &str) -> Vec<String> {
        let ctx = MatchContext::new(tree, tree.root_id.unwrap(), None);
        let node = tree
            .preorder(tree.root_id.unwrap())
            .find(|&n| tree.label(n) == Some(anchor))
            .unwrap();
        let mut search = relation.search(node, &ctx);
        let mut labels = Vec::new();
        while let Some(candidate) = search.next(&ctx) {
            labels.push(tree.display(candidate).to_string());
        }
        labels
    }

    fn rel(symbol: &str) -> Relation {
        Relation::from_symbol(symbol, &head_finder()).unwrap()
    }

    #[test]
    fn test_dominance_order() {
        let tree = Tree::from_penn("(A (B (C c)) (D d))").unwrap();
        assert_eq!(
            candidates(&rel("<<"), &tree, "A"),
            vec!["(B (C c))", "(C c)", "c", "(D d)", "d"]
        );
        assert_eq!(candidates(&rel(">>"), &tree, "C"), vec!["(B (C c))", "(A (B (C c)) (D d))"]);
        assert_eq!(candidates(&rel("<"), &tree, "A"), vec!["(B (C c))", "(D d)"]);
        assert_eq!(candidates(&rel(">"), &tree, "D"), vec!["(A (B (C c)) (D d))"]);
        assert!(candidates(&rel(">"), &tree, "A").is_empty());
    }

    #[test]
    fn test_precedence_order() {
        let tree = Tree::from_penn("(S (A (a 1)) (B (b 2)) (C (c 3)))").unwrap();
        assert_eq!(
            candidates(&rel(".."), &tree, "a"),
            vec!["(B (b 2))", "(b 2)", "2", "(C (c 3))", "(c 3)", "3"]
        );
        assert_eq!(candidates(&rel(","), &tree, "C"), vec!["(B (b 2))", "(b 2)", "2"]);
        assert_eq!(candidates(&rel("."), &tree, "1"), vec!["(B (b 2))", "(b 2)", "2"]);
        assert_eq!(candidates(&rel(",,"), &tree, "C")[0], "(B (b 2))");
        assert!(candidates(&rel("."), &tree, "C").is_empty());
    }

    #[test]
    fn test_sisters() {
        let tree = Tree::from_penn("(S (A 1) (B 2) (C 3) (D 4))").unwrap();
        assert_eq!(candidates(&rel("$"), &tree, "B"), vec!["(A 1)", "(C 3)", "(D 4)"]);
        assert_eq!(candidates(&rel("$++"), &tree, "B"), vec!["(D 4)", "(C 3)"]);
        assert_eq!(candidates(&rel("$--"), &tree, "C"), vec!["(A 1)", "(B 2)"]);
        assert_eq!(candidates(&rel("$+"), &tree, "B"), vec!["(C 3)"]);
        assert_eq!(candidates(&rel("$-"), &tree, "B"), vec!["(A 1)"]);
        assert!(candidates(&rel("$-"), &tree, "A").is_empty());
        assert!(candidates(&rel("$"), &tree, "S").is_empty());
    }

    #[test]
    fn test_ith_child() {
        let tree = Tree::from_penn("(S (A 1) (B 2) (C 3))").unwrap();
        let second = Relation::has_ith_child(2).unwrap();
        let last = Relation::has_ith_child(-1).unwrap();
        assert_eq!(candidates(&second, &tree, "S"), vec!["(B 2)"]);
        assert_eq!(candidates(&last, &tree, "S"), vec!["(C 3)"]);
        assert!(candidates(&Relation::has_ith_child(4).unwrap(), &tree, "S").is_empty());
        assert_eq!(candidates(&Relation::ith_child_of(-3).unwrap(), &tree, "A").len(), 1);
        assert!(matches!(Relation::has_ith_child(0), Err(RelationError::ZeroChildIndex)));
        assert!(matches!(Relation::ith_child_of(0), Err(RelationError::ZeroChildIndex)));
    }

    #[test]
    fn test_unary_and_edges() {
        let tree = Tree::from_penn("(A (B (C (D d))) (E e))").unwrap();
        assert_eq!(candidates(&rel("<<:"), &tree, "B"), vec!["(C (D d))", "(D d)", "d"]);
        assert_eq!(candidates(&rel(">>:"), &tree, "D"), vec!["(C (D d))", "(B (C (D d)))"]);
        assert_eq!(candidates(&rel("<<,"), &tree, "A"), vec!["(B (C (D d)))", "(C (D d))", "(D d)", "d"]);
        assert_eq!(candidates(&rel("<<-"), &tree, "A"), vec!["(E e)", "e"]);
        assert_eq!(candidates(&rel(">>-"), &tree, "e").len(), 2);
        assert_eq!(candidates(&rel("<="), &tree, "B"), vec!["(B (C (D d)))", "(C (D d))"]);
    }

    #[test]
    fn test_head_relations() {
        let tree = Tree::from_penn("(NP (NP (NN work) (NNS practices)) (PP (IN in)))").unwrap();
        let headed_by = candidates(&rel("<<#"), &tree, "NP");
        assert_eq!(headed_by, vec!["(NP (NN work) (NNS practices))", "(NNS practices)", "practices"]);
        assert_eq!(candidates(&rel("<#"), &tree, "NP").len(), 1);
        assert_eq!(candidates(&rel(">>#"), &tree, "practices").len(), 3);
    }

    #[test]
    fn test_unbroken_category() {
        let bc = basic_category();
        let tree = Tree::from_penn("(a (foo (bar (bar (baz)))))").unwrap();
        let dominates = Relation::with_argument("<+", "bar", &bc).unwrap();
        assert_eq!(
            candidates(&dominates, &tree, "foo"),
            vec!["(bar (bar baz))", "(bar baz)", "baz"]
        );

        let tree = Tree::from_penn("(NP (DT the) (JJ-SIZE large) (JJ-COLOUR green) (NNS houses))").unwrap();
        let precedes = Relation::with_argument(".+", "@JJ", &bc).unwrap();
        let labels = candidates(&precedes, &tree, "DT");
        assert!(labels.contains(&"(NNS houses)".to_string()));
        let follows = Relation::with_argument(",+", "@JJ", &bc).unwrap();
        assert!(candidates(&follows, &tree, "NNS").contains(&"(DT the)".to_string()));
    }

    #[test]
    fn test_relation_equality_and_display() {
        let hf = head_finder();
        assert_eq!(Relation::from_symbol("$..", &hf).unwrap(), Relation::LeftSisterOf);
        assert_eq!(Relation::from_symbol("<,", &hf).unwrap().to_string(), "<1");
        assert_eq!(
            Relation::from_symbol("<#", &hf).unwrap(),
            Relation::from_symbol("<#", &hf).unwrap()
        );
        assert_ne!(
            Relation::from_symbol("<#", &hf).unwrap(),
            Relation::from_symbol("<#", &head_finder()).unwrap()
        );
        assert!(matches!(
            Relation::from_symbol("<<<", &hf),
            Err(RelationError::UnknownRelation(_))
        ));
        let bc = basic_category();
        assert_eq!(Relation::with_argument(".+", "!@JJ", &bc).unwrap().to_string(), ".+(!@JJ)");
    }
}
