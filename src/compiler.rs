//! Pattern compiler
//!
//! A [`TregexPatternCompiler`] holds what a pattern is compiled against: the
//! basic-category function behind `@`, the head finder behind the head
//! relations, and a list of macros. Macros are plain regex substitutions over
//! the pattern text, applied in registration order before parsing, so they
//! can rewrite any fragment regardless of where it sits in the pattern.

use regex::Regex;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{debug, warn};

use crate::category::{BasicCategory, PennBasicCategory};
use crate::head_finder::{CollinsHeadFinder, HeadFinder};
use crate::parser::{PatternError, parse_pattern};
use crate::pattern::TregexPattern;

/// Tracing target for pattern compilation.
const COMPILER_TARGET: &str = "tregex::compiler";

static GROUP_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$|\$(\d+)").expect("group reference pattern"));

static DEFAULT_COMPILER: LazyLock<TregexPatternCompiler> = LazyLock::new(TregexPatternCompiler::new);

/// Rewrite `$N` as `${N}` so trailing letters are not read as part of a
/// group name
fn delimit_group_references(replacement: &str) -> String {
    GROUP_REFERENCE
        .replace_all(replacement, |caps: &regex::Captures| match caps.get(1) {
            Some(number) => format!("${{{}}}", number.as_str()),
            None => "$$".to_string(),
        })
        .into_owned()
}

/// The compiler behind [`TregexPattern::compile`]
pub(crate) fn default_compiler() -> &'static TregexPatternCompiler {
    &DEFAULT_COMPILER
}

/// A pattern that failed to compile
#[derive(Debug, Error)]
#[error("Could not parse pattern {pattern:?}: {source}")]
pub struct TregexParseError {
    /// Pattern text after macro expansion
    pub pattern: String,
    #[source]
    pub source: PatternError,
}

/// Error type for macro registration and macro files
#[derive(Debug, Error)]
pub enum MacroError {
    #[error("Macro error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Macro error: line {line_num}: expected original<TAB>replacement, got {line:?}")]
    MalformedLine { line_num: usize, line: String },

    #[error("Macro error: bad macro pattern {original}: {source}")]
    Regex {
        original: String,
        #[source]
        source: regex::Error,
    },
}

/// Character encoding of a macro file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MacroEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl MacroEncoding {
    fn decode(self, bytes: Vec<u8>) -> Result<String, MacroError> {
        match self {
            MacroEncoding::Utf8 => String::from_utf8(bytes).map_err(|err| {
                MacroError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
            }),
            MacroEncoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

/// Compiles pattern text into [`TregexPattern`]s
///
/// ```
/// use tregex::TregexPatternCompiler;
///
/// let mut compiler = TregexPatternCompiler::new();
/// compiler.add_macro("@NOMINAL", "/^NN|^NP/").unwrap();
/// let pattern = compiler.compile("VP < @NOMINAL").unwrap();
/// assert_eq!(pattern.pattern(), "VP < /^NN|^NP/");
/// ```
#[derive(Clone)]
pub struct TregexPatternCompiler {
    basic_category: Arc<dyn BasicCategory>,
    head_finder: Arc<dyn HeadFinder>,
    macros: Vec<(Regex, String)>,
}

impl fmt::Debug for TregexPatternCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let macros: Vec<_> = self
            .macros
            .iter()
            .map(|(original, replacement)| (original.as_str(), replacement.as_str()))
            .collect();
        f.debug_struct("TregexPatternCompiler")
            .field("macros", &macros)
            .finish_non_exhaustive()
    }
}

impl Default for TregexPatternCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TregexPatternCompiler {
    /// Penn treebank basic categories and Collins head rules, no macros
    pub fn new() -> Self {
        Self {
            basic_category: Arc::new(PennBasicCategory),
            head_finder: Arc::new(CollinsHeadFinder::new()),
            macros: Vec::new(),
        }
    }

    pub fn with_head_finder(mut self, head_finder: impl HeadFinder + 'static) -> Self {
        self.head_finder = Arc::new(head_finder);
        self
    }

    pub fn with_basic_category(mut self, basic_category: impl BasicCategory + 'static) -> Self {
        self.basic_category = Arc::new(basic_category);
        self
    }

    /// Register a macro: every match of the regex `original` in a pattern is
    /// replaced by `replacement` (which may refer to groups as `$1`).
    ///
    /// A numbered reference ends at its last digit, so `$1a` is group 1
    /// followed by `a`. Use `${name}` for named groups and `$$` for a literal
    /// dollar sign.
    pub fn add_macro(&mut self, original: &str, replacement: &str) -> Result<(), MacroError> {
        let regex = Regex::new(original).map_err(|source| MacroError::Regex {
            original: original.to_string(),
            source,
        })?;
        debug!(target: COMPILER_TARGET, original, replacement, "registered macro");
        self.macros.push((regex, delimit_group_references(replacement)));
        Ok(())
    }

    /// Load macros from a UTF-8 file of `original<TAB>replacement` lines.
    /// Returns the number of macros added.
    pub fn load_macros(&mut self, path: impl AsRef<Path>) -> Result<usize, MacroError> {
        self.load_macros_with_encoding(path, MacroEncoding::Utf8)
    }

    /// Load macros from a file in the given encoding. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn load_macros_with_encoding(
        &mut self,
        path: impl AsRef<Path>,
        encoding: MacroEncoding,
    ) -> Result<usize, MacroError> {
        let path = path.as_ref();
        let text = encoding.decode(fs::read(path)?)?;
        let mut added = 0;
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = || MacroError::MalformedLine {
                line_num: i + 1,
                line: line.to_string(),
            };
            let tab = memchr::memchr(b'\t', line.as_bytes()).ok_or_else(malformed)?;
            let (original, replacement) = (&line[..tab], &line[tab + 1..]);
            if memchr::memchr(b'\t', replacement.as_bytes()).is_some() {
                return Err(malformed());
            }
            self.add_macro(original, replacement)?;
            added += 1;
        }
        debug!(target: COMPILER_TARGET, path = %path.display(), added, "loaded macro file");
        Ok(added)
    }

    /// Expand macros, then parse
    pub fn compile(&self, pattern: &str) -> Result<TregexPattern, TregexParseError> {
        let mut text = pattern.to_string();
        for (original, replacement) in &self.macros {
            text = original.replace_all(&text, replacement.as_str()).into_owned();
        }
        match parse_pattern(&text, &self.basic_category, &self.head_finder) {
            Ok((root, known_variables)) => Ok(TregexPattern::new(root, &text, known_variables)),
            Err(source) => Err(TregexParseError {
                pattern: text,
                source,
            }),
        }
    }

    /// Like [`compile`](Self::compile), but logs a failure and returns `None`
    pub fn safe_compile(&self, pattern: &str) -> Option<TregexPattern> {
        match self.compile(pattern) {
            Ok(compiled) => Some(compiled),
            Err(err) => {
                warn!(target: COMPILER_TARGET, pattern, error = %err, "could not compile pattern");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeId, Tree};
    use std::io::Write;

    fn count_matches(pattern: &TregexPattern, tree: &str) -> usize {
        let tree = Tree::from_penn(tree).unwrap();
        let mut matcher = pattern.matcher(&tree);
        let mut count = 0;
        while matcher.find() {
            count += 1;
        }
        count
    }

    #[test]
    fn test_macro_expansion() {
        let mut compiler = TregexPatternCompiler::new();
        compiler.add_macro("FOO", "BAR").unwrap();
        let expanded = compiler.compile("FOO < X").unwrap();
        let direct = TregexPatternCompiler::new().compile("BAR < X").unwrap();
        assert_eq!(expanded.pattern(), "BAR < X");
        assert_eq!(expanded.to_string(), direct.to_string());
        assert_eq!(count_matches(&expanded, "(BAR (X 1))"), 1);
    }

    #[test]
    fn test_macros_apply_in_order_and_ignore_nesting() {
        let mut compiler = TregexPatternCompiler::new();
        compiler.add_macro("@VERB", "@VB").unwrap();
        compiler.add_macro(r"@VB\b", "/^VB/").unwrap();
        compiler.add_macro(r"NUM(\d)", "<$1").unwrap();
        let pattern = compiler.compile("VP NUM1 (@VERB $+ (NP NUM1 @VB))").unwrap();
        assert_eq!(pattern.pattern(), "VP <1 (/^VB/ $+ (NP <1 /^VB/))");
    }

    #[test]
    fn test_macro_group_followed_by_letters() {
        let mut compiler = TregexPatternCompiler::new();
        compiler.add_macro(r"TAG(\d)", "X$1a").unwrap();
        let pattern = compiler.compile("TAG1 < TAG2").unwrap();
        assert_eq!(pattern.pattern(), "X1a < X2a");
        assert_eq!(count_matches(&pattern, "(X1a (X2a b))"), 1);

        assert_eq!(delimit_group_references("$1a ${2}b $$3"), "${1}a ${2}b $$3");
    }

    #[test]
    fn test_load_macros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macros.txt");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "# nominal heads\n\nNOMINAL\t/^NN/\nCLAUSE\t/^S/\n").unwrap();
        drop(file);

        let mut compiler = TregexPatternCompiler::new();
        assert_eq!(compiler.load_macros(&path).unwrap(), 2);
        let pattern = compiler.compile("CLAUSE < (NP < NOMINAL)").unwrap();
        assert_eq!(pattern.pattern(), "/^S/ < (NP < /^NN/)");
        assert_eq!(count_matches(&pattern, "(SBAR (S (NP (NNS dogs))))"), 1);
    }

    #[test]
    fn test_load_latin1_macros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macros.latin1");
        fs::write(&path, b"caf\xe9\tCAFE\n").unwrap();

        let mut compiler = TregexPatternCompiler::new();
        assert!(compiler.load_macros(&path).is_err());
        assert_eq!(
            compiler
                .load_macros_with_encoding(&path, MacroEncoding::Latin1)
                .unwrap(),
            1
        );
        assert_eq!(compiler.compile("café < X").unwrap().pattern(), "CAFE < X");
    }

    #[test]
    fn test_macro_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, "GOOD\tBETTER\nno tab here\n").unwrap();

        let mut compiler = TregexPatternCompiler::new();
        assert!(matches!(
            compiler.load_macros(&path),
            Err(MacroError::MalformedLine { line_num: 2, .. })
        ));
        assert!(matches!(
            compiler.load_macros(dir.path().join("missing.txt")),
            Err(MacroError::Io(_))
        ));
        assert!(matches!(compiler.add_macro("(", "X"), Err(MacroError::Regex { .. })));
    }

    #[test]
    fn test_compile_errors() {
        let compiler = TregexPatternCompiler::new();
        let err = compiler.compile("A <0 B").unwrap_err();
        assert_eq!(err.pattern, "A <0 B");
        assert!(err.to_string().contains("zeroth child"));
        assert!(compiler.safe_compile("A < (B").is_none());
        assert!(compiler.safe_compile("A < B").is_some());
        assert!(TregexPattern::safe_compile("A !?< B").is_none());
    }

    #[test]
    fn test_custom_basic_category() {
        let compiler = TregexPatternCompiler::new().with_basic_category(|label: &str| label.to_lowercase());
        let pattern = compiler.compile("@np < @nn").unwrap();
        assert_eq!(count_matches(&pattern, "(NP (NN dog))"), 1);

        let pattern = TregexPattern::compile("@np < @nn").unwrap();
        assert_eq!(count_matches(&pattern, "(NP (NN dog))"), 0);
    }

    #[test]
    fn test_custom_head_finder() {
        let rightmost = |tree: &Tree, node: NodeId| tree.last_child(node);
        let compiler = TregexPatternCompiler::new().with_head_finder(rightmost);
        let pattern = compiler.compile("VP <# NP").unwrap();
        assert_eq!(count_matches(&pattern, "(VP (VBD saw) (NP (NN it)))"), 1);

        let pattern = TregexPattern::compile("VP <# NP").unwrap();
        assert_eq!(count_matches(&pattern, "(VP (VBD saw) (NP (NN it)))"), 0);
    }
}
