use unicode_segmentation::UnicodeSegmentation;

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Tok {
    Number(f64),
    Ident(String),
    Hash,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) struct SpannedTok {
    pub(super) tok: Tok,
    pub(super) line: u32,
    pub(super) column: u32,
    /// Width in grapheme clusters, for positions past the final token.
    pub(super) width: u32,
}

/// Split an expression into tokens, recording every problem instead of
/// failing. Columns count grapheme clusters, zero-based within the line.
pub(super) fn tokenize(input: &str) -> (Vec<SpannedTok>, Vec<String>) {
    let graphemes: Vec<&str> = input.graphemes(true).collect();
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut line: u32 = 1;
    let mut column: u32 = 0;
    let mut idx = 0;
    while idx < graphemes.len() {
        let grapheme = graphemes[idx];
        if grapheme == "\n" || grapheme == "\r\n" || grapheme == "\r" {
            line += 1;
            column = 0;
            idx += 1;
            continue;
        }
        if grapheme.chars().all(char::is_whitespace) {
            column += 1;
            idx += 1;
            continue;
        }
        let start_line = line;
        let start_column = column;
        let single = match grapheme {
            "#" => Some(Tok::Hash),
            "(" => Some(Tok::LParen),
            ")" => Some(Tok::RParen),
            "," => Some(Tok::Comma),
            "+" => Some(Tok::Plus),
            "-" => Some(Tok::Minus),
            "*" => Some(Tok::Star),
            "/" => Some(Tok::Slash),
            _ => None,
        };
        if let Some(tok) = single {
            tokens.push(SpannedTok { tok, line: start_line, column: start_column, width: 1 });
            column += 1;
            idx += 1;
            continue;
        }
        if starts_number(grapheme) {
            let mut text = String::new();
            while idx < graphemes.len()
                && (starts_number(graphemes[idx]) || graphemes[idx] == ".")
            {
                text.push_str(graphemes[idx]);
                column += 1;
                idx += 1;
            }
            match text.parse::<f64>() {
                Ok(value) => tokens.push(SpannedTok {
                    tok: Tok::Number(value),
                    line: start_line,
                    column: start_column,
                    width: column - start_column,
                }),
                Err(_) => {
                    errors.push(format!("line {start_line}:{start_column} invalid number '{text}'"))
                }
            }
            continue;
        }
        if starts_ident(grapheme) {
            let mut text = String::new();
            while idx < graphemes.len() && continues_ident(graphemes[idx]) {
                text.push_str(graphemes[idx]);
                column += 1;
                idx += 1;
            }
            tokens.push(SpannedTok {
                tok: Tok::Ident(text),
                line: start_line,
                column: start_column,
                width: column - start_column,
            });
            continue;
        }
        errors.push(format!("line {line}:{column} unexpected character '{grapheme}'"));
        column += 1;
        idx += 1;
    }
    (tokens, errors)
}

fn starts_number(grapheme: &str) -> bool {
    grapheme.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn starts_ident(grapheme: &str) -> bool {
    grapheme.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
}

// Flattened ids are dotted paths, so '.' continues an identifier.
fn continues_ident(grapheme: &str) -> bool {
    grapheme.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_carry_positions() {
        let (tokens, errors) = tokenize("#(P0) + 2");
        assert!(errors.is_empty());
        let kinds: Vec<&Tok> = tokens.iter().map(|t| &t.tok).collect();
        assert_eq!(
            kinds,
            vec![
                &Tok::Hash,
                &Tok::LParen,
                &Tok::Ident("P0".into()),
                &Tok::RParen,
                &Tok::Plus,
                &Tok::Number(2.0),
            ]
        );
        assert_eq!((tokens[0].line, tokens[0].column), (1, 0));
        assert_eq!((tokens[4].line, tokens[4].column), (1, 6));
        assert_eq!((tokens[5].line, tokens[5].column), (1, 8));
    }

    #[test]
    fn dotted_identifiers_lex_as_one_token() {
        let (tokens, errors) = tokenize("#(root.child.P0)");
        assert!(errors.is_empty());
        assert_eq!(tokens[2].tok, Tok::Ident("root.child.P0".into()));
    }

    #[test]
    fn unexpected_characters_are_collected() {
        let (tokens, errors) = tokenize("1 $ 2 %");
        assert_eq!(tokens.len(), 2);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "line 1:2 unexpected character '$'");
        assert_eq!(errors[1], "line 1:6 unexpected character '%'");
    }

    #[test]
    fn line_numbers_advance_on_newlines() {
        let (_, errors) = tokenize("1 +\n$");
        assert_eq!(errors, vec!["line 2:0 unexpected character '$'"]);
    }

    #[test]
    fn malformed_number_is_an_error() {
        let (tokens, errors) = tokenize("1.2.3");
        assert!(tokens.is_empty());
        assert_eq!(errors, vec!["line 1:0 invalid number '1.2.3'"]);
    }
}
