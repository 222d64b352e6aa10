use tracing::trace;

use super::{
    token::{KEYWORDS, MAX_INTEGER, SYMBOLS},
    Token, TokenKind,
};
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct Lexer {
    tokens: Vec<Token>,
    current: String,
    index: usize,
    line: usize,
}

/// Blanks out `//` and `/* */` comments, keeping newlines so that token
/// lines still match the source. Comment markers inside a string literal
/// are left alone.
fn strip_comments(s: &str) -> Result<String> {
    let chars: Vec<_> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut index = 0;
    let mut line = 1;
    let mut in_string = false;

    while index < chars.len() {
        let c = chars[index];
        let next = chars.get(index + 1).copied();

        if c == '\n' {
            in_string = false;
            line += 1;
            out.push(c);
            index += 1;
        } else if in_string {
            in_string = c != '"';
            out.push(c);
            index += 1;
        } else if c == '"' {
            in_string = true;
            out.push(c);
            index += 1;
        } else if c == '/' && next == Some('/') {
            while index < chars.len() && chars[index] != '\n' {
                out.push(' ');
                index += 1;
            }
        } else if c == '/' && next == Some('*') {
            let start_line = line;
            out.push_str("  ");
            index += 2;
            loop {
                match chars.get(index) {
                    None => return Err(Error::lex(start_line, "unterminated block comment")),
                    Some('*') if chars.get(index + 1) == Some(&'/') => {
                        out.push_str("  ");
                        index += 2;
                        break;
                    }
                    Some('\n') => {
                        line += 1;
                        out.push('\n');
                        index += 1;
                    }
                    Some(_) => {
                        out.push(' ');
                        index += 1;
                    }
                }
            }
        } else {
            out.push(c);
            index += 1;
        }
    }

    Ok(out)
}

impl Lexer {
    fn new() -> Self {
        Self {
            tokens: vec![],
            current: String::new(),
            index: 0,
            line: 1,
        }
    }

    fn new_token(&mut self, kind: TokenKind, s: &str) {
        self.tokens.push(Token::new(kind, s, self.line));
    }

    /// Classifies the pending word: keyword, symbol, integer, identifier.
    fn finish_token(&mut self) -> Result<()> {
        if self.current.is_empty() {
            return Ok(());
        }
        let s = std::mem::take(&mut self.current);

        if KEYWORDS.contains(s.as_str()) {
            self.new_token(TokenKind::Keyword, &s);
        } else if s.chars().count() == 1 && s.chars().all(|c| SYMBOLS.contains(&c)) {
            self.new_token(TokenKind::Symbol, &s);
        } else if s.chars().all(|c| c.is_ascii_digit()) {
            match s.parse::<u16>() {
                Ok(value) if value <= MAX_INTEGER => {
                    self.new_token(TokenKind::IntegerConstant, &value.to_string())
                }
                _ => {
                    return Err(Error::lex(
                        self.line,
                        format!("integer constant {s} is out of range 0..={MAX_INTEGER}"),
                    ))
                }
            }
        } else if is_identifier(&s) {
            self.new_token(TokenKind::Identifier, &s);
        } else {
            return Err(Error::lex(self.line, format!("can't tokenize `{s}`")));
        }

        Ok(())
    }

    fn parse_string(&mut self, chars: &[char]) -> Result<()> {
        let s: String = chars[self.index + 1..]
            .iter()
            .take_while(|&&c| c != '"' && c != '\n')
            .collect();
        let end = self.index + 1 + s.chars().count();

        if chars.get(end) != Some(&'"') {
            return Err(Error::lex(self.line, "unterminated string constant"));
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii()) {
            return Err(Error::lex(
                self.line,
                format!("character {c:?} in string constant is not ASCII"),
            ));
        }
        if s.len() > usize::from(MAX_INTEGER) {
            return Err(Error::lex(
                self.line,
                format!("string constant is longer than {MAX_INTEGER} characters"),
            ));
        }

        self.new_token(TokenKind::StringConstant, &s);
        self.index = end + 1;
        Ok(())
    }

    fn _tokenize(&mut self, s: &str) -> Result<()> {
        let chars: Vec<_> = s.chars().collect();

        while self.index < chars.len() {
            let c = chars[self.index];

            if c == '\n' {
                self.finish_token()?;
                self.line += 1;
                self.index += 1;
            } else if c.is_whitespace() {
                self.finish_token()?;
                self.index += 1;
            } else if SYMBOLS.contains(&c) {
                self.finish_token()?;
                self.new_token(TokenKind::Symbol, &c.to_string());
                self.index += 1;
            } else if c == '"' {
                self.finish_token()?;
                self.parse_string(&chars)?;
            } else {
                self.current.push(c);
                self.index += 1;
            }
        }

        self.finish_token()
    }

    pub fn tokenize(s: &str) -> Result<Vec<Token>> {
        let source = strip_comments(s)?;
        let mut lexer = Lexer::new();
        lexer._tokenize(&source)?;
        trace!(count = lexer.tokens.len(), "tokenized source");

        Ok(lexer.tokens)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn kinds_and_lexemes(source: &str) -> Vec<(TokenKind, String)> {
        Lexer::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.lexeme))
            .collect()
    }

    #[test]
    fn classifies_every_token_kind() {
        let tokens = kinds_and_lexemes("let x = \"hi there\" + 42;");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Keyword, "let".to_string()),
                (TokenKind::Identifier, "x".to_string()),
                (TokenKind::Symbol, "=".to_string()),
                (TokenKind::StringConstant, "hi there".to_string()),
                (TokenKind::Symbol, "+".to_string()),
                (TokenKind::IntegerConstant, "42".to_string()),
                (TokenKind::Symbol, ";".to_string()),
            ]
        );
    }

    #[test]
    fn symbols_split_identifiers() {
        let tokens = kinds_and_lexemes("Output.printInt(a[i]);");
        let lexemes: Vec<_> = tokens.iter().map(|(_, l)| l.as_str()).collect();
        assert_eq!(
            lexemes,
            vec!["Output", ".", "printInt", "(", "a", "[", "i", "]", ")", ";"]
        );
    }

    #[test]
    fn strips_comments_but_not_inside_strings() {
        let source = "
// line comment
/* block
   comment */ do f(\"a // b /* c */\"); /** doc */
";
        let tokens = kinds_and_lexemes(source);
        assert_eq!(tokens[0], (TokenKind::Keyword, "do".to_string()));
        assert_eq!(
            tokens[3],
            (TokenKind::StringConstant, "a // b /* c */".to_string())
        );
        assert_eq!(tokens.len(), 6);
    }

    #[test]
    fn tracks_lines_across_comments() {
        let tokens = Lexer::tokenize("/* one\ntwo */\nclass\n\nMain").unwrap();
        assert_eq!(tokens[0].line, 3);
        assert_eq!(tokens[1].line, 5);
    }

    #[test]
    fn keyword_prefix_is_an_identifier() {
        let tokens = kinds_and_lexemes("classy do_it");
        assert_eq!(tokens[0], (TokenKind::Identifier, "classy".to_string()));
        assert_eq!(tokens[1], (TokenKind::Identifier, "do_it".to_string()));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert_matches!(
            Lexer::tokenize("let s = \"oops;\nreturn;"),
            Err(Error::Lex { line: 1, .. })
        );
        assert_matches!(Lexer::tokenize("\"oops"), Err(Error::Lex { .. }));
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        assert_matches!(
            Lexer::tokenize("class /* never closed"),
            Err(Error::Lex { line: 1, .. })
        );
    }

    #[test]
    fn rejects_out_of_range_integers() {
        assert!(Lexer::tokenize("32767").is_ok());
        assert_matches!(Lexer::tokenize("32768"), Err(Error::Lex { .. }));
    }

    #[test]
    fn rejects_malformed_words() {
        assert_matches!(Lexer::tokenize("let 9lives = 1;"), Err(Error::Lex { .. }));
        assert_matches!(Lexer::tokenize("let a$ = 1;"), Err(Error::Lex { .. }));
    }

    #[test]
    fn string_constants_are_ascii_only() {
        assert_matches!(
            Lexer::tokenize("do f(\n\"caf\u{e9}\");"),
            Err(Error::Lex { line: 2, message }) if message.contains("'\u{e9}'")
        );
        assert_matches!(Lexer::tokenize("\"\u{1F600}\""), Err(Error::Lex { .. }));
    }

    #[test]
    fn string_constant_length_is_bounded() {
        let fits = format!("\"{}\"", "a".repeat(usize::from(MAX_INTEGER)));
        assert_eq!(Lexer::tokenize(&fits).unwrap()[0].lexeme.len(), 32767);

        let too_long = format!("\"{}\"", "a".repeat(usize::from(MAX_INTEGER) + 1));
        assert_matches!(Lexer::tokenize(&too_long), Err(Error::Lex { .. }));
    }
}
