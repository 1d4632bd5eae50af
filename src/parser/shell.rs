//! Grammar-aware shell command parsing
//!
//! Decomposes a shell command string into the ordered list of sub-command
//! invocations using the tree-sitter bash grammar, so pipelines, `&&`/`;`
//! lists and subshells each contribute their own invocation and quoted
//! strings survive as single tokens.
//!
//! A command the grammar cannot parse is **unparseable** and must be denied
//! by default: [`parse_command`] returns an error rather than guessing.

use std::sync::{Mutex, OnceLock};

use thiserror::Error;

/// Lazy-initialized tree-sitter bash parser (wrapped in Mutex for mutation)
static BASH_PARSER: OnceLock<Mutex<tree_sitter::Parser>> = OnceLock::new();

fn bash_parser() -> &'static Mutex<tree_sitter::Parser> {
    BASH_PARSER.get_or_init(|| {
        let mut parser = tree_sitter::Parser::new();
        let lang: tree_sitter::Language = tree_sitter_bash::LANGUAGE.into();
        parser
            .set_language(&lang)
            .expect("Failed to load bash grammar");
        Mutex::new(parser)
    })
}

/// Why a command string could not be decomposed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The grammar produced error/missing nodes
    #[error("unparseable command: {0}")]
    Unparseable(String),
    /// Nothing to execute
    #[error("empty command")]
    Empty,
}

/// One shell-level sub-command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// The program name as written (first token)
    pub program: String,
    /// Argument tokens, quotes stripped but contents intact
    pub args: Vec<String>,
}

impl CommandInvocation {
    /// The `program arg arg ...` form used for rule and block-list matching
    pub fn signature(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Parse a command string into its ordered sub-command invocations
pub fn parse_command(command: &str) -> Result<Vec<CommandInvocation>, ParseError> {
    if command.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let guard = bash_parser();
    let mut parser = guard
        .lock()
        .map_err(|e| ParseError::Unparseable(format!("parser unavailable: {e}")))?;

    let tree = parser
        .parse(command, None)
        .ok_or_else(|| ParseError::Unparseable("no parse tree".into()))?;
    let root = tree.root_node();

    if root.has_error() {
        return Err(ParseError::Unparseable(
            "shell grammar rejected the command".into(),
        ));
    }

    let mut invocations = Vec::new();
    collect_commands(root, command, &mut invocations);

    if invocations.is_empty() {
        // Parsed, but nothing invokable (e.g. a bare comment or assignment)
        return Err(ParseError::Unparseable("no command invocations".into()));
    }

    Ok(invocations)
}

/// Walk the AST collecting every `command` node, in source order
///
/// Pipelines, lists, subshells, redirected statements and command
/// substitutions all contain nested `command` nodes; recursing everywhere
/// is deliberately conservative, so `echo $(rm -rf x)` surfaces `rm` too.
fn collect_commands(node: tree_sitter::Node, source: &str, out: &mut Vec<CommandInvocation>) {
    if node.kind() == "command" {
        if let Some(invocation) = extract_invocation(node, source) {
            out.push(invocation);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_commands(child, source, out);
    }
}

/// Extract program and argument tokens from a `command` node
fn extract_invocation(node: tree_sitter::Node, source: &str) -> Option<CommandInvocation> {
    let mut program = None;
    let mut args = Vec::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "command_name" => {
                program = token_text(child, source);
            }
            "word" | "string" | "raw_string" | "number" | "concatenation"
            | "simple_expansion" | "expansion" | "command_substitution" => {
                if let Some(text) = token_text(child, source) {
                    if !text.is_empty() {
                        args.push(text);
                    }
                }
            }
            // Redirects, heredocs and variable assignments are not
            // arguments for policy purposes
            _ => {}
        }
    }

    program.map(|program| CommandInvocation { program, args })
}

/// The policy-relevant text of a token node
///
/// Quote characters are stripped so `"hello world"` and `'hello world'`
/// become the single token `hello world`; concatenations keep their pieces
/// joined; expansions and substitutions keep their raw source form.
fn token_text(node: tree_sitter::Node, source: &str) -> Option<String> {
    match node.kind() {
        "command_name" | "concatenation" => {
            let mut cursor = node.walk();
            let mut text = String::new();
            for child in node.children(&mut cursor) {
                if let Some(piece) = token_text(child, source) {
                    text.push_str(&piece);
                }
            }
            if text.is_empty() {
                raw_text(node, source)
            } else {
                Some(text)
            }
        }
        "string" => raw_text(node, source).map(|t| strip_quotes(&t, '"')),
        "raw_string" => raw_text(node, source).map(|t| strip_quotes(&t, '\'')),
        _ => raw_text(node, source),
    }
}

fn raw_text(node: tree_sitter::Node, source: &str) -> Option<String> {
    node.utf8_text(source.as_bytes())
        .ok()
        .map(|t| t.to_string())
}

fn strip_quotes(text: &str, quote: char) -> String {
    text.strip_prefix(quote)
        .and_then(|t| t.strip_suffix(quote))
        .unwrap_or(text)
        .to_string()
}
