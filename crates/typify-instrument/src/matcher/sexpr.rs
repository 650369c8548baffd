//! Reader for pattern s-expressions

use crate::PatternError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SExpr {
    Symbol { name: String, offset: usize },
    List { items: Vec<SExpr>, offset: usize },
}

impl SExpr {
    pub(crate) fn offset(&self) -> usize {
        match self {
            SExpr::Symbol { offset, .. } | SExpr::List { offset, .. } => *offset,
        }
    }
}

/// Read exactly one s-expression from `text`
pub(crate) fn read(text: &str) -> Result<SExpr, PatternError> {
    let mut reader = Reader { text, pos: 0 };
    reader.skip_whitespace();
    if reader.at_end() {
        return Err(PatternError::Empty);
    }

    let expr = reader.expr()?;
    reader.skip_whitespace();
    if !reader.at_end() {
        return Err(PatternError::TrailingInput { offset: reader.pos });
    }
    Ok(expr)
}

struct Reader<'a> {
    text: &'a str,
    pos: usize,
}

impl Reader<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn expr(&mut self) -> Result<SExpr, PatternError> {
        let offset = self.pos;
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_whitespace();
                    match self.peek() {
                        None => return Err(PatternError::UnclosedList { offset }),
                        Some(')') => {
                            self.pos += 1;
                            return Ok(SExpr::List { items, offset });
                        }
                        Some(_) => items.push(self.expr()?),
                    }
                }
            }
            Some(')') => Err(PatternError::UnexpectedClose { offset }),
            _ => {
                let rest = &self.text[self.pos..];
                let len = rest
                    .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                    .unwrap_or(rest.len());
                self.pos += len;
                Ok(SExpr::Symbol {
                    name: rest[..len].to_string(),
                    offset,
                })
            }
        }
    }
}
