//! Constant-expression evaluation for `#if` and `#elif`.
//!
//! Recursive descent over the (already macro-expanded) token chain, valued
//! in `i64` with C's integer operator precedence. The ternary operator is
//! deliberately absent; `?` and `:` are rejected like any other stray
//! token.

use crate::chain::{TokenChain, TokenId};
use crate::token::{LiteralValue, Operator, TokenKind};

use super::{LexResult, Lexer};

/// A char constant's value: its bytes read little-endian, keeping the tail
/// when there are more than eight.
fn char_value(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    if bytes.len() <= 8 {
        buf[..bytes.len()].copy_from_slice(bytes);
    } else {
        buf.copy_from_slice(&bytes[bytes.len() - 8..]);
    }
    i64::from_le_bytes(buf)
}

impl Lexer {
    /// Evaluates the whole pending chain as one expression.
    pub(super) fn eval_pending(&mut self) -> LexResult<i64> {
        let chain = std::mem::take(&mut self.tokens);
        let mut cursor = chain.first();
        let end = chain.head();
        let result = self.eval_logic_or(&chain, &mut cursor, end);
        self.tokens = chain;
        result
    }

    /// At each binary level: `None` ends the level, `Some(op)` continues
    /// it, and a non-operator token is malformed input.
    fn binary_op(
        &mut self,
        chain: &TokenChain,
        cursor: TokenId,
        end: TokenId,
        accepted: &[Operator],
    ) -> LexResult<Option<Operator>> {
        if cursor == end {
            return Ok(None);
        }
        match chain.get(cursor).kind {
            TokenKind::Operator(op) => Ok(accepted.contains(&op).then_some(op)),
            _ => Err(self.error("Invalid preprocessor expression token")),
        }
    }

    fn eval_logic_or(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        let mut lhs = self.eval_logic_and(chain, cursor, end)?;
        while self
            .binary_op(chain, *cursor, end, &[Operator::LOr])?
            .is_some()
        {
            *cursor = chain.next(*cursor);
            let rhs = self.eval_logic_and(chain, cursor, end)?;
            lhs = (lhs != 0 || rhs != 0) as i64;
        }
        Ok(lhs)
    }

    fn eval_logic_and(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        let mut lhs = self.eval_bit_or(chain, cursor, end)?;
        while self
            .binary_op(chain, *cursor, end, &[Operator::LAnd])?
            .is_some()
        {
            *cursor = chain.next(*cursor);
            let rhs = self.eval_bit_or(chain, cursor, end)?;
            lhs = (lhs != 0 && rhs != 0) as i64;
        }
        Ok(lhs)
    }

    fn eval_bit_or(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        let mut lhs = self.eval_bit_xor(chain, cursor, end)?;
        while self
            .binary_op(chain, *cursor, end, &[Operator::BOr])?
            .is_some()
        {
            *cursor = chain.next(*cursor);
            lhs |= self.eval_bit_xor(chain, cursor, end)?;
        }
        Ok(lhs)
    }

    fn eval_bit_xor(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        let mut lhs = self.eval_bit_and(chain, cursor, end)?;
        while self
            .binary_op(chain, *cursor, end, &[Operator::BXor])?
            .is_some()
        {
            *cursor = chain.next(*cursor);
            lhs ^= self.eval_bit_and(chain, cursor, end)?;
        }
        Ok(lhs)
    }

    fn eval_bit_and(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        let mut lhs = self.eval_equality(chain, cursor, end)?;
        while self
            .binary_op(chain, *cursor, end, &[Operator::BAnd])?
            .is_some()
        {
            *cursor = chain.next(*cursor);
            lhs &= self.eval_equality(chain, cursor, end)?;
        }
        Ok(lhs)
    }

    fn eval_equality(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        let mut lhs = self.eval_relational(chain, cursor, end)?;
        while let Some(op) =
            self.binary_op(chain, *cursor, end, &[Operator::Eq, Operator::Neq])?
        {
            *cursor = chain.next(*cursor);
            let rhs = self.eval_relational(chain, cursor, end)?;
            lhs = match op {
                Operator::Eq => (lhs == rhs) as i64,
                _ => (lhs != rhs) as i64,
            };
        }
        Ok(lhs)
    }

    fn eval_relational(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        let mut lhs = self.eval_shift(chain, cursor, end)?;
        while let Some(op) = self.binary_op(
            chain,
            *cursor,
            end,
            &[Operator::Gt, Operator::Geq, Operator::Lt, Operator::Leq],
        )? {
            *cursor = chain.next(*cursor);
            let rhs = self.eval_shift(chain, cursor, end)?;
            lhs = match op {
                Operator::Gt => (lhs > rhs) as i64,
                Operator::Geq => (lhs >= rhs) as i64,
                Operator::Lt => (lhs < rhs) as i64,
                _ => (lhs <= rhs) as i64,
            };
        }
        Ok(lhs)
    }

    fn eval_shift(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        let mut lhs = self.eval_additive(chain, cursor, end)?;
        while let Some(op) =
            self.binary_op(chain, *cursor, end, &[Operator::Shl, Operator::Shr])?
        {
            *cursor = chain.next(*cursor);
            let rhs = self.eval_additive(chain, cursor, end)?;
            lhs = match op {
                Operator::Shl => lhs.wrapping_shl(rhs as u32),
                _ => lhs.wrapping_shr(rhs as u32),
            };
        }
        Ok(lhs)
    }

    fn eval_additive(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        let mut lhs = self.eval_term(chain, cursor, end)?;
        while let Some(op) =
            self.binary_op(chain, *cursor, end, &[Operator::Plus, Operator::Minus])?
        {
            *cursor = chain.next(*cursor);
            let rhs = self.eval_term(chain, cursor, end)?;
            lhs = match op {
                Operator::Plus => lhs.wrapping_add(rhs),
                _ => lhs.wrapping_sub(rhs),
            };
        }
        Ok(lhs)
    }

    fn eval_term(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        let mut lhs = self.eval_factor(chain, cursor, end)?;
        while let Some(op) = self.binary_op(
            chain,
            *cursor,
            end,
            &[Operator::Star, Operator::Slash, Operator::Percent],
        )? {
            *cursor = chain.next(*cursor);
            let rhs = self.eval_factor(chain, cursor, end)?;
            lhs = match op {
                Operator::Star => lhs.wrapping_mul(rhs),
                Operator::Slash => {
                    if rhs == 0 {
                        return Err(self.error("Division by zero in preprocessor expression"));
                    }
                    lhs.wrapping_div(rhs)
                }
                _ => {
                    if rhs == 0 {
                        return Err(self.error("Remainder by zero in preprocessor expression"));
                    }
                    lhs.wrapping_rem(rhs)
                }
            };
        }
        Ok(lhs)
    }

    /// Operands: integer and char literals, parenthesised expressions,
    /// unary `+ - ~ !`, and leftover identifiers (undefined object-like
    /// macros are zero by the standard).
    fn eval_factor(
        &mut self,
        chain: &TokenChain,
        cursor: &mut TokenId,
        end: TokenId,
    ) -> LexResult<i64> {
        if *cursor == end {
            return Err(self.error("Expected value in expression"));
        }
        match &chain.get(*cursor).kind {
            TokenKind::Ident(name) => {
                let next = chain.next(*cursor);
                if next != end && chain.get(next).is_operator(Operator::LParen) {
                    let name = name.clone();
                    return Err(
                        self.error(format!("Function-like macro '{name}' is not defined"))
                    );
                }
                *cursor = next;
                Ok(0)
            }

            TokenKind::Literal(lit) => {
                let value = match &lit.value {
                    LiteralValue::Int(v) | LiteralValue::Long(v) | LiteralValue::LongLong(v) => *v,
                    LiteralValue::UInt(v)
                    | LiteralValue::ULong(v)
                    | LiteralValue::ULongLong(v) => *v as i64,
                    LiteralValue::Float(_)
                    | LiteralValue::Double(_)
                    | LiteralValue::LongDouble(_) => {
                        return Err(self.error("Floating-point in preprocessor expression"));
                    }
                    LiteralValue::Char(bytes) => char_value(bytes),
                    LiteralValue::Str(_) => {
                        return Err(
                            self.error("Invalid token at start of a preprocessor expression")
                        );
                    }
                };
                *cursor = chain.next(*cursor);
                Ok(value)
            }

            TokenKind::Eof | TokenKind::Keyword(_) => {
                Err(self.error("Invalid preprocessor expression token"))
            }

            TokenKind::Operator(op) => {
                let op = *op;
                *cursor = chain.next(*cursor);
                if op == Operator::LParen {
                    let value = self.eval_logic_or(chain, cursor, end)?;
                    if *cursor == end || !chain.get(*cursor).is_operator(Operator::RParen) {
                        return Err(self.error("Expected ')' in preprocessor expression"));
                    }
                    *cursor = chain.next(*cursor);
                    return Ok(value);
                }
                let value = self.eval_factor(chain, cursor, end)?;
                match op {
                    Operator::Plus => Ok(value),
                    Operator::Minus => Ok(value.wrapping_neg()),
                    Operator::BInv => Ok(!value),
                    Operator::LNot => Ok((value == 0) as i64),
                    _ => Err(self.error("Invalid token at start of a preprocessor expression")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_value_little_endian() {
        assert_eq!(char_value(b"a"), 0x61);
        assert_eq!(char_value(b"ab"), 0x6261);
        assert_eq!(char_value(&[0xff]), 0xff);
    }

    #[test]
    fn test_char_value_tail_aligned() {
        // more than eight bytes: the tail wins
        let bytes = b"0123456789";
        assert_eq!(char_value(bytes), i64::from_le_bytes(*b"23456789"));
    }
}
