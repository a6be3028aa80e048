use std::collections::HashMap;

use regex::Regex;

use fixturegen_core::FieldValue;

use crate::errors::GenerationError;

/// Row-scoped field values visible to template substitution. Built per row,
/// discarded with it; there is no cross-row state.
pub type FieldMap = HashMap<String, FieldValue>;

/// Resolve `{name}` placeholders against `fields` and, when at least one
/// substitution occurred, reduce the result with the expression language.
///
/// Raw text without a known placeholder passes through verbatim, including
/// any `{unknown}` tokens it may contain; no expression parsing happens on
/// untouched text.
pub fn evaluate(raw: &str, fields: &FieldMap) -> Result<FieldValue, GenerationError> {
    let pattern = Regex::new(r"\{([A-Za-z0-9_]+)\}")
        .map_err(|err| GenerationError::Expression(err.to_string()))?;

    let mut substituted = false;
    let replaced = pattern.replace_all(raw, |caps: &regex::Captures<'_>| {
        match fields.get(&caps[1]) {
            Some(value) => {
                substituted = true;
                value.render()
            }
            None => caps[0].to_string(),
        }
    });

    if !substituted {
        return Ok(FieldValue::Text(raw.to_string()));
    }

    evaluate_expression(&replaced)
        .map(FieldValue::number)
        .map_err(|err| GenerationError::Expression(format!("'{raw}': {err}")))
}

/// Reduce an arithmetic/boolean expression to a single number. Comparisons
/// yield `1` / `0`.
fn evaluate_expression(source: &str) -> Result<f64, String> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, cursor: 0 };
    let value = parser.comparison()?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(format!("unexpected trailing {token:?}")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err("expected '=='".to_string());
                }
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err("expected '!='".to_string());
                }
                tokens.push(Token::Ne);
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            _ if ch.is_ascii_digit() || ch == '.' => {
                let mut literal = String::new();
                while let Some(&digit) = chars.peek() {
                    if digit.is_ascii_digit() || digit == '.' {
                        literal.push(digit);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{literal}'"))?;
                tokens.push(Token::Number(value));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.cursor).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn comparison(&mut self) -> Result<f64, String> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(token @ (Token::Eq | Token::Ne | Token::Lt | Token::Le | Token::Gt | Token::Ge)) => {
                self.advance();
                token
            }
            _ => return Ok(left),
        };
        let right = self.additive()?;
        let pass = match op {
            Token::Eq => (left - right).abs() < f64::EPSILON,
            Token::Ne => (left - right).abs() >= f64::EPSILON,
            Token::Lt => left < right,
            Token::Le => left <= right,
            Token::Gt => left > right,
            Token::Ge => left >= right,
            _ => false,
        };
        Ok(if pass { 1.0 } else { 0.0 })
    }

    fn additive(&mut self) -> Result<f64, String> {
        let mut value = self.multiplicative()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Plus => {
                    self.advance();
                    value += self.multiplicative()?;
                }
                Token::Minus => {
                    self.advance();
                    value -= self.multiplicative()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn multiplicative(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Star => {
                    self.advance();
                    value *= self.unary()?;
                }
                Token::Slash => {
                    self.advance();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, String> {
        match self.advance() {
            Some(Token::Minus) => Ok(-self.unary()?),
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.comparison()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("unbalanced parenthesis".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), FieldValue::Text(value.to_string())))
            .collect()
    }

    #[test]
    fn substituted_expressions_are_reduced() {
        let value = evaluate("{price}*2", &fields(&[("price", "10")])).expect("evaluate");
        assert_eq!(value, FieldValue::Int(20));
    }

    #[test]
    fn plain_text_passes_through() {
        let value = evaluate("hello", &FieldMap::new()).expect("evaluate");
        assert_eq!(value, FieldValue::Text("hello".to_string()));
    }

    #[test]
    fn unknown_placeholders_stay_literal() {
        let value = evaluate("code-{missing}", &FieldMap::new()).expect("evaluate");
        assert_eq!(value, FieldValue::Text("code-{missing}".to_string()));
    }

    #[test]
    fn precedence_and_parentheses_hold() {
        let map = fields(&[("a", "2"), ("b", "3"), ("c", "4")]);
        assert_eq!(evaluate("{a}+{b}*{c}", &map).unwrap(), FieldValue::Int(14));
        assert_eq!(
            evaluate("({a}+{b})*{c}", &map).unwrap(),
            FieldValue::Int(20)
        );
        assert_eq!(evaluate("-{a}+{b}", &map).unwrap(), FieldValue::Int(1));
    }

    #[test]
    fn comparisons_reduce_to_zero_or_one() {
        let map = fields(&[("stock", "5"), ("sold", "7")]);
        assert_eq!(evaluate("{stock}<{sold}", &map).unwrap(), FieldValue::Int(1));
        assert_eq!(
            evaluate("{stock}=={sold}", &map).unwrap(),
            FieldValue::Int(0)
        );
    }

    #[test]
    fn fractional_results_stay_floats() {
        let map = fields(&[("price", "42")]);
        assert_eq!(
            evaluate("{price}*0.4", &map).unwrap(),
            FieldValue::Float(16.8)
        );
    }

    #[test]
    fn malformed_expressions_fail() {
        let map = fields(&[("price", "10")]);
        assert!(matches!(
            evaluate("{price}*", &map),
            Err(GenerationError::Expression(_))
        ));
        assert!(matches!(
            evaluate("{price}/0", &map),
            Err(GenerationError::Expression(_))
        ));
    }
}
