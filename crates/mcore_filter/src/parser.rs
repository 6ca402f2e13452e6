//! Block-structured rule-file grammar, ported from `scorep_filter_parser.c`.
//!
//! ```text
//! SCOREP_FILE_NAMES_BEGIN
//!   EXCLUDE *generated*.c
//!   INCLUDE foo.c
//! SCOREP_FILE_NAMES_END
//!
//! SCOREP_REGION_NAMES_BEGIN
//!   EXCLUDE MANGLED _Z3fooi
//!   INCLUDE DEMANGLED bar
//! SCOREP_REGION_NAMES_END
//! ```
//!
//! `MANGLED`/`DEMANGLED` are sticky modifiers: once seen inside a region block they apply to
//! every subsequent pattern on that side (`EXCLUDE`/`INCLUDE`) until the block ends or the other
//! modifier appears, exactly like the source's `SCOREP_FILTER_PARSE_MANGLED` bit folded into the
//! parser's mode value — this port tracks it as a separate `bool` instead of a bit combined into
//! the state enum, since Rust's enum-plus-field is the idiomatic stand-in for "a state with an
//! orthogonal sticky flag."
//!
//! Lines are `#`-comment-stripped and whitespace-tokenized with backslash-escaping, matching the
//! source's hand-rolled line scanner: a backslash suppresses comment-cutting or token-splitting
//! on the character that follows, but (faithfully, not a bug) is not itself stripped from the
//! resulting token.

use crate::matching::Filter;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: unexpected token '{token}'")]
    UnexpectedToken { line: usize, token: String },
    #[error("line {line}: escaping line breaks is not supported")]
    EscapedLineBreak { line: usize },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mode {
    Start,
    Files,
    FilesExclude,
    FilesInclude,
    Regions,
    RegionsExclude,
    RegionsInclude,
}

struct ParserState {
    mode: Mode,
    mangled: bool,
    filter: Filter,
}

impl ParserState {
    fn new() -> Self {
        Self { mode: Mode::Start, mangled: false, filter: Filter::new() }
    }

    fn process_token(&mut self, line: usize, token: &str) -> Result<(), ParseError> {
        if token.is_empty() {
            return Ok(());
        }

        let unexpected = || ParseError::UnexpectedToken { line, token: token.to_owned() };

        match token {
            "SCOREP_FILE_NAMES_BEGIN" => {
                if self.mode == Mode::Start {
                    self.mode = Mode::Files;
                    Ok(())
                } else {
                    Err(unexpected())
                }
            }
            "SCOREP_FILE_NAMES_END" => {
                if matches!(self.mode, Mode::Files | Mode::FilesExclude | Mode::FilesInclude) {
                    self.mode = Mode::Start;
                    Ok(())
                } else {
                    Err(unexpected())
                }
            }
            "SCOREP_REGION_NAMES_BEGIN" => {
                if self.mode == Mode::Start {
                    self.mode = Mode::Regions;
                    Ok(())
                } else {
                    Err(unexpected())
                }
            }
            "SCOREP_REGION_NAMES_END" => {
                if matches!(self.mode, Mode::Regions | Mode::RegionsExclude | Mode::RegionsInclude) {
                    self.mode = Mode::Start;
                    self.mangled = false;
                    Ok(())
                } else {
                    Err(unexpected())
                }
            }
            "EXCLUDE" => match self.mode {
                Mode::Files | Mode::FilesExclude | Mode::FilesInclude => {
                    self.mode = Mode::FilesExclude;
                    Ok(())
                }
                Mode::Regions | Mode::RegionsExclude | Mode::RegionsInclude => {
                    self.mode = Mode::RegionsExclude;
                    Ok(())
                }
                _ => Err(unexpected()),
            },
            "INCLUDE" => match self.mode {
                Mode::Files | Mode::FilesExclude | Mode::FilesInclude => {
                    self.mode = Mode::FilesInclude;
                    Ok(())
                }
                Mode::Regions | Mode::RegionsExclude | Mode::RegionsInclude => {
                    self.mode = Mode::RegionsInclude;
                    Ok(())
                }
                _ => Err(unexpected()),
            },
            "MANGLED" => match self.mode {
                Mode::RegionsExclude | Mode::RegionsInclude => {
                    self.mangled = true;
                    Ok(())
                }
                _ => Err(unexpected()),
            },
            "DEMANGLED" => match self.mode {
                Mode::RegionsExclude | Mode::RegionsInclude => {
                    self.mangled = false;
                    Ok(())
                }
                _ => Err(unexpected()),
            },
            pattern => match self.mode {
                Mode::FilesExclude => {
                    self.filter.add_file_exclude_rule(pattern);
                    Ok(())
                }
                Mode::FilesInclude => {
                    self.filter.add_file_include_rule(pattern);
                    Ok(())
                }
                Mode::RegionsExclude => {
                    self.filter.add_function_rule(pattern, true, self.mangled);
                    Ok(())
                }
                Mode::RegionsInclude => {
                    self.filter.add_function_rule(pattern, false, self.mangled);
                    Ok(())
                }
                _ => Err(unexpected()),
            },
        }
    }
}

fn strip_comment(line: &str) -> &str {
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '#' => return &line[..idx],
            _ => {}
        }
    }
    line
}

fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in line.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            ' ' | '\t' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// `SCOREP_Filter_ParseFile`/`process_token`'s line loop, over an in-memory string rather than a
/// file handle — I/O is the caller's concern, this only parses rule-file text.
pub fn parse(contents: &str) -> Result<Filter, ParseError> {
    let mut state = ParserState::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line_number = idx + 1;
        let stripped = strip_comment(raw_line);
        if stripped.ends_with('\\') {
            return Err(ParseError::EscapedLineBreak { line: line_number });
        }
        for token in tokenize(stripped) {
            state.process_token(line_number, &token)?;
        }
    }

    Ok(state.filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_block_grammar_from_the_module_doc_example() {
        let filter = parse(
            "SCOREP_FILE_NAMES_BEGIN\n\
             EXCLUDE *generated*.c\n\
             INCLUDE foo.c\n\
             SCOREP_FILE_NAMES_END\n\
             \n\
             SCOREP_REGION_NAMES_BEGIN\n\
             EXCLUDE MANGLED _Z3fooi\n\
             INCLUDE DEMANGLED bar\n\
             SCOREP_REGION_NAMES_END\n",
        )
        .unwrap();

        assert_eq!(filter.file_rules().len(), 2);
        assert!(filter.file_rules()[0].is_exclude);
        assert!(!filter.file_rules()[1].is_exclude);

        assert_eq!(filter.function_rules().len(), 2);
        assert!(filter.function_rules()[0].is_mangled);
        assert!(!filter.function_rules()[1].is_mangled);
    }

    #[test]
    fn comments_are_stripped() {
        let filter = parse(
            "SCOREP_FILE_NAMES_BEGIN\n\
             EXCLUDE *.c # comment here\n\
             SCOREP_FILE_NAMES_END\n",
        )
        .unwrap();
        assert_eq!(filter.file_rules()[0].pattern, "*.c");
    }

    #[test]
    fn mangled_is_sticky_across_multiple_patterns() {
        let filter = parse(
            "SCOREP_REGION_NAMES_BEGIN\n\
             EXCLUDE MANGLED _Z3fooi _Z3bari\n\
             SCOREP_REGION_NAMES_END\n",
        )
        .unwrap();
        assert!(filter.function_rules().iter().all(|r| r.is_mangled));
    }

    #[test]
    fn a_block_end_without_a_matching_begin_is_a_syntax_error() {
        assert!(matches!(parse("SCOREP_FILE_NAMES_END\n"), Err(ParseError::UnexpectedToken { .. })));
    }

    #[test]
    fn mangled_outside_a_region_block_is_a_syntax_error() {
        assert!(matches!(parse("MANGLED\n"), Err(ParseError::UnexpectedToken { .. })));
    }

    #[test]
    fn an_escaped_trailing_backslash_is_rejected() {
        assert!(matches!(parse("SCOREP_FILE_NAMES_BEGIN\nfoo\\\n"), Err(ParseError::EscapedLineBreak { .. })));
    }
}
