//! Penn treebank bracket parsing
//!
//! Reads trees written as `(S (NP (DT the) (NN dog)) (VP (VBZ runs)))`.
//! A tree may span several lines and several trees may share a line.
//! Files ending in `.gz` are decompressed on the fly.

use crate::tree::{NodeId, Tree};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Lines, Read};
use std::path::Path;
use thiserror::Error;

/// Error during bracket parsing
#[derive(Debug, Error)]
#[error("Parse error at line {line_num}: {message}")]
pub struct PennError {
    pub line_num: usize,
    pub message: String,
}

impl PennError {
    fn new(line_num: usize, message: impl Into<String>) -> Self {
        Self {
            line_num,
            message: message.into(),
        }
    }
}

/// Penn treebank reader that iterates over trees
pub struct PennTreeReader<R: BufRead> {
    lines: Lines<R>,
    line_num: usize,
    /// Unconsumed text carried over from previous lines
    buffer: String,
    /// Line on which the text in `buffer` starts
    buffer_line: usize,
}

impl<R: BufRead> PennTreeReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
            buffer: String::new(),
            buffer_line: 1,
        }
    }

    /// Append the next input line to the buffer. Returns false at EOF.
    fn fill(&mut self) -> Result<bool, PennError> {
        match self.lines.next() {
            None => Ok(false),
            Some(Err(e)) => Err(PennError::new(self.line_num + 1, e.to_string())),
            Some(Ok(line)) => {
                self.line_num += 1;
                if self.buffer.trim().is_empty() {
                    self.buffer.clear();
                    self.buffer_line = self.line_num;
                }
                self.buffer.push_str(&line);
                self.buffer.push('\n');
                Ok(true)
            }
        }
    }
}

impl PennTreeReader<BufReader<Box<dyn Read + Send>>> {
    /// Create a reader from a file path (gzip-compressed if it ends in `.gz`)
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let source: Box<dyn Read + Send> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Self::new(BufReader::new(source)))
    }
}

impl PennTreeReader<BufReader<Cursor<String>>> {
    /// Create a reader from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Self {
        Self::new(BufReader::new(Cursor::new(text.to_string())))
    }
}

impl<R: BufRead> Iterator for PennTreeReader<R> {
    type Item = Result<Tree, PennError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = self.buffer.len() - self.buffer.trim_start().len();
            if start == self.buffer.len() {
                // Nothing but whitespace buffered
                match self.fill() {
                    Ok(true) => continue,
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e)),
                }
            }
            if !self.buffer[start..].starts_with('(') {
                let err = PennError::new(self.buffer_line, "expected '(' at start of tree");
                self.buffer.clear();
                return Some(Err(err));
            }
            match find_tree_end(&self.buffer.as_bytes()[start..]) {
                Some(len) => {
                    let end = start + len;
                    let result = parse_tree(&self.buffer[start..end], self.buffer_line);
                    let consumed_lines = self.buffer[..end].matches('\n').count();
                    self.buffer.drain(..end);
                    self.buffer_line += consumed_lines;
                    return Some(result);
                }
                None => match self.fill() {
                    Ok(true) => continue,
                    Ok(false) => {
                        let err = PennError::new(self.buffer_line, "unbalanced brackets at end of input");
                        self.buffer.clear();
                        return Some(Err(err));
                    }
                    Err(e) => return Some(Err(e)),
                },
            }
        }
    }
}

/// Length of the first balanced bracket group in `bytes`, if it is complete
fn find_tree_end(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = 0;
    while let Some(offset) = memchr::memchr2(b'(', b')', &bytes[pos..]) {
        pos += offset;
        if bytes[pos] == b'(' {
            depth += 1;
        } else {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(pos + 1);
            }
        }
        pos += 1;
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Open,
    Close,
    Atom(&'a str),
}

/// Split bracketed text into brackets and atoms
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'(' => {
                tokens.push(Token::Open);
                pos += 1;
            }
            b')' => {
                tokens.push(Token::Close);
                pos += 1;
            }
            b if b.is_ascii_whitespace() => pos += 1,
            _ => {
                let start = pos;
                while pos < bytes.len()
                    && !matches!(bytes[pos], b'(' | b')')
                    && !bytes[pos].is_ascii_whitespace()
                {
                    pos += 1;
                }
                tokens.push(Token::Atom(&text[start..pos]));
            }
        }
    }
    tokens
}

/// Parse the text of exactly one bracketed tree
fn parse_tree(text: &str, line_num: usize) -> Result<Tree, PennError> {
    let tokens = tokenize(text);
    let mut tree = Tree::new();
    let mut stack: Vec<NodeId> = Vec::new();
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        if tree.root_id.is_some() && stack.is_empty() {
            return Err(PennError::new(line_num, "text after end of tree"));
        }
        match *token {
            Token::Open => {
                let label = match iter.peek() {
                    Some(Token::Atom(label)) => {
                        iter.next();
                        Some(*label)
                    }
                    _ => None,
                };
                let node = tree.add_node(label);
                if let Some(&parent) = stack.last() {
                    tree.set_parent(node, parent);
                }
                stack.push(node);
            }
            Token::Close => {
                if stack.pop().is_none() {
                    return Err(PennError::new(line_num, "unexpected ')'"));
                }
            }
            Token::Atom(word) => {
                let Some(&parent) = stack.last() else {
                    return Err(PennError::new(line_num, format!("unexpected atom '{}'", word)));
                };
                tree.add_child(parent, word);
            }
        }
    }

    if !stack.is_empty() {
        return Err(PennError::new(line_num, "unbalanced brackets"));
    }
    if tree.is_empty() {
        return Err(PennError::new(line_num, "empty tree"));
    }
    Ok(tree)
}

impl Tree {
    /// Parse a single tree in Penn bracket notation
    pub fn from_penn(text: &str) -> Result<Tree, PennError> {
        let mut reader = PennTreeReader::from_str(text);
        let tree = reader
            .next()
            .unwrap_or_else(|| Err(PennError::new(1, "empty tree")))?;
        match reader.next() {
            None => Ok(tree),
            Some(_) => Err(PennError::new(1, "more than one tree in input")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_simple_tree() {
        let tree = Tree::from_penn("(S (NP (DT the) (NN dog)) (VP (VBZ runs)))").unwrap();

        assert_eq!(tree.len(), 9);
        assert_eq!(tree.root_id, Some(0));
        assert_eq!(tree.label(0), Some("S"));
        assert_eq!(tree.leaves(0).len(), 3);
        assert_eq!(tree.to_string(), "(S (NP (DT the) (NN dog)) (VP (VBZ runs)))");
    }

    #[test]
    fn test_parse_unlabeled_root() {
        let tree = Tree::from_penn("( (S (NP John) (VP runs)))").unwrap();
        assert_eq!(tree.label(0), None);
        assert_eq!(tree.label(1), Some("S"));
        assert_eq!(tree.num_children(0), 1);
    }

    #[test]
    fn test_parse_label_only_leaf() {
        let tree = Tree::from_penn("(A (B 1) (C))").unwrap();
        let c = tree.children(0)[1];
        assert_eq!(tree.label(c), Some("C"));
        assert!(tree.is_leaf(c));
        assert_eq!(tree.to_string(), "(A (B 1) C)");
    }

    #[test]
    fn test_multiline_and_multiple_trees() {
        let text = "(S\n  (NP John)\n  (VP runs))\n\n(A (B 1)) (A (C 2))\n";
        let trees: Vec<_> = PennTreeReader::from_str(text)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(trees.len(), 3);
        assert_eq!(trees[0].to_string(), "(S (NP John) (VP runs))");
        assert_eq!(trees[2].to_string(), "(A (C 2))");
    }

    #[test]
    fn test_errors_report_lines() {
        let mut reader = PennTreeReader::from_str("(A (B 1))\n\n(A (B 1)\n");
        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.line_num, 3);
        assert!(reader.next().is_none());

        assert!(Tree::from_penn("A (B 1)").is_err());
        assert!(Tree::from_penn("(A (B 1)))").is_err());
        assert!(Tree::from_penn("").is_err());
    }

    #[test]
    fn test_read_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trees.mrg.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        write!(encoder, "(A (B 1))\n(A (C 2))\n").unwrap();
        encoder.finish().unwrap();

        let trees: Vec<_> = PennTreeReader::from_file(&path)
            .unwrap()
            .filter_map(Result::ok)
            .collect();
        assert_eq!(trees.len(), 2);
    }
}
