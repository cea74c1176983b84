//! Arithmetic expression handler.
//!
//! A restricted recursive-descent evaluator: numbers, `+ - * / % ^`,
//! parentheses, unary plus/minus. Deliberately not a general-purpose
//! expression engine; the math prefix must never reach code execution.

use super::{CommandError, CommandReply};

/// Evaluate the expression and format the reply.
pub fn run(expr: &str) -> Result<CommandReply, CommandError> {
    let value = eval(expr).map_err(CommandError::Evaluation)?;
    Ok(CommandReply::Text(format!("Result: {}", format_value(value))))
}

/// Render integral results without a trailing `.0`.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Evaluate a math expression string.
pub fn eval(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut pos = 0;
    let result = parse_expr(&tokens, &mut pos)?;
    if pos < tokens.len() {
        return Err(format!("unexpected token: {:?}", tokens[pos]));
    }
    if result.is_nan() || result.is_infinite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(result)
}

#[derive(Debug, Clone)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("invalid number: {num_str}"))?;
                tokens.push(Token::Number(num));
            }
            c => return Err(format!("unexpected character: '{c}'")),
        }
    }
    Ok(tokens)
}

/// Parse addition and subtraction (lowest precedence).
fn parse_expr(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    let mut left = parse_term(tokens, pos)?;
    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Plus => {
                *pos += 1;
                left += parse_term(tokens, pos)?;
            }
            Token::Minus => {
                *pos += 1;
                left -= parse_term(tokens, pos)?;
            }
            _ => break,
        }
    }
    Ok(left)
}

/// Parse multiplication, division, modulo.
fn parse_term(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    let mut left = parse_power(tokens, pos)?;
    while *pos < tokens.len() {
        match &tokens[*pos] {
            Token::Star => {
                *pos += 1;
                left *= parse_power(tokens, pos)?;
            }
            Token::Slash => {
                *pos += 1;
                let right = parse_power(tokens, pos)?;
                if right == 0.0 {
                    return Err("division by zero".to_string());
                }
                left /= right;
            }
            Token::Percent => {
                *pos += 1;
                let right = parse_power(tokens, pos)?;
                if right == 0.0 {
                    return Err("modulo by zero".to_string());
                }
                left %= right;
            }
            _ => break,
        }
    }
    Ok(left)
}

/// Parse exponentiation (right-associative).
fn parse_power(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    let base = parse_unary(tokens, pos)?;
    if *pos < tokens.len() {
        if let Token::Caret = &tokens[*pos] {
            *pos += 1;
            let exp = parse_power(tokens, pos)?; // right-associative
            return Ok(base.powf(exp));
        }
    }
    Ok(base)
}

/// Parse unary minus and primary expressions.
fn parse_unary(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    if *pos < tokens.len() {
        if let Token::Minus = &tokens[*pos] {
            *pos += 1;
            let val = parse_unary(tokens, pos)?;
            return Ok(-val);
        }
        // Allow unary plus
        if let Token::Plus = &tokens[*pos] {
            *pos += 1;
            return parse_unary(tokens, pos);
        }
    }
    parse_primary(tokens, pos)
}

/// Parse numbers and parenthesized expressions.
fn parse_primary(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    if *pos >= tokens.len() {
        return Err("unexpected end of expression".to_string());
    }
    match &tokens[*pos] {
        Token::Number(n) => {
            let val = *n;
            *pos += 1;
            Ok(val)
        }
        Token::LParen => {
            *pos += 1;
            let val = parse_expr(tokens, pos)?;
            if *pos >= tokens.len() {
                return Err("missing closing parenthesis".to_string());
            }
            match &tokens[*pos] {
                Token::RParen => {
                    *pos += 1;
                    Ok(val)
                }
                _ => Err("expected closing parenthesis".to_string()),
            }
        }
        t => Err(format!("unexpected token: {t:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(eval("2 + 3").unwrap(), 5.0);
        assert_eq!(eval("2+2").unwrap(), 4.0);
        assert_eq!(eval("10 - 4").unwrap(), 6.0);
        assert_eq!(eval("6 * 7").unwrap(), 42.0);
        assert_eq!(eval("15 / 3").unwrap(), 5.0);
        assert_eq!(eval("17 % 5").unwrap(), 2.0);
    }

    #[test]
    fn test_precedence_and_parens() {
        assert_eq!(eval("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(eval("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(eval("(10 - 2) ^ 2").unwrap(), 64.0);
    }

    #[test]
    fn test_power_right_associative() {
        // 2 ^ 3 ^ 2 = 2 ^ 9 = 512, not 64
        assert_eq!(eval("2 ^ 3 ^ 2").unwrap(), 512.0);
    }

    #[test]
    fn test_unary() {
        assert_eq!(eval("-5 + 3").unwrap(), -2.0);
        assert_eq!(eval("+5").unwrap(), 5.0);
        assert_eq!(eval("-(2 + 3)").unwrap(), -5.0);
    }

    #[test]
    fn test_decimals() {
        assert_eq!(eval("1.5 * 2").unwrap(), 3.0);
        assert!((eval("0.1 + 0.2").unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_errors() {
        assert!(eval("(").is_err());
        assert!(eval("").is_err());
        assert!(eval("2 +").is_err());
        assert!(eval("1 / 0").is_err());
        assert!(eval("10 % 0").is_err());
        assert!(eval("2 2").is_err());
        assert!(eval("1..2").is_err());
    }

    #[test]
    fn test_no_code_execution_syntax() {
        // Anything beyond arithmetic is a tokenizer error, not evaluated.
        assert!(eval("process.exit(1)").is_err());
        assert!(eval("a + 1").is_err());
        assert!(eval("1; 2").is_err());
    }

    #[test]
    fn test_run_formats_reply() {
        match run("2+2").unwrap() {
            CommandReply::Text(text) => assert_eq!(text, "Result: 4"),
            other => panic!("expected text reply, got {other:?}"),
        }
        match run("1.5+1").unwrap() {
            CommandReply::Text(text) => assert_eq!(text, "Result: 2.5"),
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    #[test]
    fn test_run_malformed_is_evaluation_error() {
        assert!(matches!(run("("), Err(CommandError::Evaluation(_))));
    }
}
