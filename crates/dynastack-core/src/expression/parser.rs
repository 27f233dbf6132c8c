//! Recursive-descent parser for DynamoDB expressions.
//!
//! Supports condition/filter/key-condition expressions, update expressions, and
//! projection expressions. Keywords and function names are matched
//! case-insensitively; attribute names are case-sensitive.

use super::ast::{
    AddAction, AttributePath, CompareOp, DeleteAction, Expr, FunctionName, LogicalOp, Operand,
    PathElement, SetAction, SetValue, UpdateExpr, UpdateOperand,
};
use super::error::{ExpressionError, ExpressionKind};
use super::lexer::{Token, TokenStream};
use super::reserved::is_reserved;

/// Maximum number of operands on the right of `IN`.
const MAX_IN_OPERANDS: usize = 100;

/// Largest expression accepted, in bytes.
pub const MAX_EXPRESSION_SIZE: usize = 4096;

/// Deepest nesting of parentheses, `NOT` and update functions.
pub const MAX_NESTING_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Recursive-descent parser over one expression.
struct Parser<'a> {
    stream: TokenStream<'a>,
    pos: usize,
    depth: usize,
    kind: ExpressionKind,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, kind: ExpressionKind) -> Result<Self, ExpressionError> {
        if input.len() > MAX_EXPRESSION_SIZE {
            return Err(ExpressionError::TooLarge {
                kind,
                size: input.len(),
            });
        }
        let stream = TokenStream::new(input);
        if stream.is_empty() {
            return Err(ExpressionError::Empty { kind });
        }
        Ok(Self {
            stream,
            pos: 0,
            depth: 0,
            kind,
        })
    }

    /// Step one level deeper into a nested construct.
    fn descend(&mut self) -> Result<(), ExpressionError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ExpressionError::TooDeeplyNested {
                kind: self.kind,
                max: MAX_NESTING_DEPTH,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn peek(&self) -> &Token {
        self.stream.token(self.pos)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.stream.token(self.pos + offset)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.stream.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn syntax_error(&self) -> ExpressionError {
        ExpressionError::Syntax {
            kind: self.kind,
            token: self.stream.text(self.pos),
            near: self.stream.near(self.pos),
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.syntax_error())
        }
    }

    fn expect_end(&self) -> Result<(), ExpressionError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.syntax_error())
        }
    }

    /// Returns `true` if the parser sits on `name(`.
    fn at_call(&self) -> bool {
        matches!(self.peek(), Token::Identifier(_)) && *self.peek_at(1) == Token::LParen
    }

    /// Identify the function at the cursor without consuming it.
    fn call_name(&self) -> Result<FunctionName, ExpressionError> {
        let text = self.stream.text(self.pos);
        FunctionName::from_name(&text).ok_or(ExpressionError::InvalidFunction {
            kind: self.kind,
            function: text,
        })
    }

    fn check_arity(&self, function: FunctionName, count: usize) -> Result<(), ExpressionError> {
        if function.arity() == count {
            Ok(())
        } else {
            Err(ExpressionError::InvalidOperandCount {
                kind: self.kind,
                function: function.to_string(),
                count,
            })
        }
    }

    fn misuse(&self, function: FunctionName) -> ExpressionError {
        ExpressionError::FunctionMisuse {
            kind: self.kind,
            function: function.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Condition expression parsing (precedence climbing)
// ---------------------------------------------------------------------------

impl Parser<'_> {
    /// Parse a full condition expression (OR is lowest precedence).
    fn parse_or_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and_expr()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_not_expr()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ExpressionError> {
        if matches!(self.peek(), Token::Not) {
            self.advance();
            self.descend()?;
            let expr = self.parse_not_expr()?;
            self.ascend();
            return Ok(Expr::Not(Box::new(expr)));
        }
        self.parse_primary_expr()
    }

    /// Parse comparisons, BETWEEN, IN, boolean functions and parenthesized groups.
    fn parse_primary_expr(&mut self) -> Result<Expr, ExpressionError> {
        if matches!(self.peek(), Token::LParen) {
            self.advance();
            self.descend()?;
            let expr = self.parse_or_expr()?;
            self.expect(&Token::RParen)?;
            self.ascend();
            return Ok(expr);
        }

        if self.at_call() {
            let function = self.call_name()?;
            if function.is_condition() {
                return self.parse_function_expr(function);
            }
        }

        let operand = self.parse_operand()?;
        self.parse_postfix_expr(operand)
    }

    fn parse_function_expr(&mut self, name: FunctionName) -> Result<Expr, ExpressionError> {
        self.advance(); // name
        self.advance(); // '('
        let args = self.parse_operand_list()?;
        self.check_arity(name, args.len())?;
        if !matches!(args.first(), Some(Operand::Path(_))) {
            return Err(ExpressionError::RequiresDocumentPath {
                kind: self.kind,
                function: name.to_string(),
            });
        }
        if self.peek().is_comparator() || matches!(self.peek(), Token::Between | Token::In) {
            return Err(self.misuse(name));
        }
        Ok(Expr::Function { name, args })
    }

    /// Parse operands up to and including the closing `)`.
    fn parse_operand_list(&mut self) -> Result<Vec<Operand>, ExpressionError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Token::RParen) {
            self.advance();
            return Ok(args);
        }
        args.push(self.parse_operand()?);
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            args.push(self.parse_operand()?);
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    /// After parsing a left operand, parse comparison, BETWEEN, or IN.
    fn parse_postfix_expr(&mut self, left: Operand) -> Result<Expr, ExpressionError> {
        let op = match self.peek() {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            Token::Between => {
                self.advance();
                let low = self.parse_operand()?;
                self.expect(&Token::And)?;
                let high = self.parse_operand()?;
                return Ok(Expr::Between {
                    value: left,
                    low,
                    high,
                });
            }
            Token::In => {
                self.advance();
                self.expect(&Token::LParen)?;
                let list = self.parse_operand_list()?;
                if list.is_empty() {
                    return Err(self.syntax_error());
                }
                if list.len() > MAX_IN_OPERANDS {
                    return Err(ExpressionError::TooManyInOperands {
                        kind: self.kind,
                        count: list.len(),
                    });
                }
                return Ok(Expr::In { value: left, list });
            }
            _ => {
                return Err(if matches!(left, Operand::Size(_)) {
                    self.misuse(FunctionName::Size)
                } else {
                    self.syntax_error()
                });
            }
        };
        self.advance();
        let right = self.parse_operand()?;
        Ok(Expr::Compare { left, op, right })
    }

    /// Parse an operand: a value reference, a `size(path)` call, or an attribute path.
    fn parse_operand(&mut self) -> Result<Operand, ExpressionError> {
        match self.peek() {
            Token::ValuePlaceholder(name) => {
                let name = name.clone();
                self.advance();
                Ok(Operand::Value(name))
            }
            Token::Identifier(_) if self.at_call() => {
                let function = self.call_name()?;
                if function != FunctionName::Size {
                    return Err(self.misuse(function));
                }
                self.advance();
                self.advance();
                let mut args = self.parse_operand_list()?;
                self.check_arity(function, args.len())?;
                match args.pop() {
                    Some(Operand::Path(path)) => Ok(Operand::Size(path)),
                    _ => Err(ExpressionError::RequiresDocumentPath {
                        kind: self.kind,
                        function: function.to_string(),
                    }),
                }
            }
            Token::Identifier(_) | Token::NamePlaceholder(_) => {
                Ok(Operand::Path(self.parse_attribute_path()?))
            }
            _ => Err(self.syntax_error()),
        }
    }
}

// ---------------------------------------------------------------------------
// Path parsing
// ---------------------------------------------------------------------------

impl Parser<'_> {
    /// Parse an attribute path like `info.rating`, `#name`, `myList[0].value`.
    fn parse_attribute_path(&mut self) -> Result<AttributePath, ExpressionError> {
        let mut elements = vec![self.parse_path_name()?];
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    elements.push(self.parse_path_name()?);
                }
                Token::LBracket => {
                    self.advance();
                    let Token::Number(digits) = self.peek() else {
                        return Err(self.syntax_error());
                    };
                    let idx = digits.parse().map_err(|_| self.syntax_error())?;
                    self.advance();
                    self.expect(&Token::RBracket)?;
                    elements.push(PathElement::Index(idx));
                }
                _ => break,
            }
        }
        Ok(AttributePath { elements })
    }

    fn parse_path_name(&mut self) -> Result<PathElement, ExpressionError> {
        let projection = self.kind == ExpressionKind::Projection;
        match self.peek() {
            Token::Identifier(name) => {
                if projection && is_reserved(name) {
                    return Err(ExpressionError::ReservedKeyword {
                        kind: self.kind,
                        name: name.clone(),
                    });
                }
                let name = name.clone();
                self.advance();
                Ok(PathElement::Attribute(name))
            }
            Token::NamePlaceholder(name) => {
                let name = name.clone();
                self.advance();
                Ok(PathElement::Placeholder(name))
            }
            Token::Number(_) if projection => {
                Err(ExpressionError::NameStartsWithNumber { kind: self.kind })
            }
            tok if projection && is_keyword(tok) => Err(ExpressionError::ReservedKeyword {
                kind: self.kind,
                name: self.stream.text(self.pos),
            }),
            _ => Err(self.syntax_error()),
        }
    }
}

fn is_keyword(tok: &Token) -> bool {
    matches!(
        tok,
        Token::And
            | Token::Or
            | Token::Not
            | Token::Between
            | Token::In
            | Token::Set
            | Token::Remove
            | Token::Add
            | Token::Delete
    )
}

fn is_name_like(tok: &Token) -> bool {
    matches!(
        tok,
        Token::Identifier(_) | Token::NamePlaceholder(_) | Token::Number(_)
    ) || is_keyword(tok)
}

// ---------------------------------------------------------------------------
// Update expression parsing
// ---------------------------------------------------------------------------

/// Update clause names, in the order they are applied.
const CLAUSES: [&str; 4] = ["SET", "REMOVE", "ADD", "DELETE"];

impl Parser<'_> {
    /// Parse a complete update expression (SET, REMOVE, ADD, DELETE clauses).
    fn parse_update_expr(&mut self) -> Result<UpdateExpr, ExpressionError> {
        let mut update = UpdateExpr::default();
        let mut seen = [false; 4];

        while !self.at_end() {
            let clause = match self.peek() {
                Token::Set => 0,
                Token::Remove => 1,
                Token::Add => 2,
                Token::Delete => 3,
                _ => return Err(self.syntax_error()),
            };
            if seen[clause] {
                return Err(ExpressionError::DuplicateClause {
                    kind: self.kind,
                    clause: CLAUSES[clause],
                });
            }
            seen[clause] = true;
            self.advance();

            loop {
                match clause {
                    0 => {
                        let action = self.parse_set_action()?;
                        update.set_actions.push(action);
                    }
                    1 => {
                        let path = self.parse_attribute_path()?;
                        update.remove_paths.push(path);
                    }
                    2 => {
                        let path = self.parse_attribute_path()?;
                        let value = self.parse_value_placeholder()?;
                        update.add_actions.push(AddAction { path, value });
                    }
                    _ => {
                        let path = self.parse_attribute_path()?;
                        let value = self.parse_value_placeholder()?;
                        update.delete_actions.push(DeleteAction { path, value });
                    }
                }
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        Ok(update)
    }

    fn parse_set_action(&mut self) -> Result<SetAction, ExpressionError> {
        let path = self.parse_attribute_path()?;
        self.expect(&Token::Eq)?;
        let first = self.parse_update_operand()?;
        let value = match self.peek() {
            Token::Plus => {
                self.advance();
                SetValue::Plus(first, self.parse_update_operand()?)
            }
            Token::Minus => {
                self.advance();
                SetValue::Minus(first, self.parse_update_operand()?)
            }
            _ => SetValue::Operand(first),
        };
        Ok(SetAction { path, value })
    }

    fn parse_update_operand(&mut self) -> Result<UpdateOperand, ExpressionError> {
        match self.peek() {
            Token::ValuePlaceholder(name) => {
                let name = name.clone();
                self.advance();
                Ok(UpdateOperand::Value(name))
            }
            Token::Identifier(_) if self.at_call() => self.parse_update_function(),
            Token::Identifier(_) | Token::NamePlaceholder(_) => {
                Ok(UpdateOperand::Path(self.parse_attribute_path()?))
            }
            _ => Err(self.syntax_error()),
        }
    }

    fn parse_update_function(&mut self) -> Result<UpdateOperand, ExpressionError> {
        let function = self.call_name()?;
        if !matches!(function, FunctionName::IfNotExists | FunctionName::ListAppend) {
            return Err(self.misuse(function));
        }
        self.advance();
        self.advance();
        self.descend()?;

        let mut args = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            args.push(self.parse_update_operand()?);
            while matches!(self.peek(), Token::Comma) {
                self.advance();
                args.push(self.parse_update_operand()?);
            }
        }
        self.expect(&Token::RParen)?;
        self.ascend();
        self.check_arity(function, args.len())?;

        let mut args = args.into_iter();
        match (function, args.next(), args.next()) {
            (FunctionName::IfNotExists, Some(UpdateOperand::Path(path)), Some(fallback)) => {
                Ok(UpdateOperand::IfNotExists(path, Box::new(fallback)))
            }
            (FunctionName::ListAppend, Some(a), Some(b)) => {
                Ok(UpdateOperand::ListAppend(Box::new(a), Box::new(b)))
            }
            _ => Err(ExpressionError::RequiresDocumentPath {
                kind: self.kind,
                function: function.to_string(),
            }),
        }
    }

    fn parse_value_placeholder(&mut self) -> Result<String, ExpressionError> {
        match self.peek() {
            Token::ValuePlaceholder(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.syntax_error()),
        }
    }
}

// ---------------------------------------------------------------------------
// Projection expression parsing
// ---------------------------------------------------------------------------

impl Parser<'_> {
    /// Parse a projection expression: comma-separated attribute paths.
    fn parse_projection_expr(&mut self) -> Result<Vec<AttributePath>, ExpressionError> {
        let mut paths = vec![self.parse_attribute_path()?];
        loop {
            match self.peek() {
                Token::Eof => return Ok(paths),
                Token::Comma => {
                    self.advance();
                    paths.push(self.parse_attribute_path()?);
                }
                tok if is_name_like(tok) && self.stream.preceded_by_whitespace(self.pos) => {
                    return Err(ExpressionError::NameContainsWhiteSpace { kind: self.kind });
                }
                _ => return Err(self.syntax_error()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a condition, filter, or key-condition expression.
///
/// # Errors
///
/// Returns `ExpressionError` if the expression is empty or syntactically invalid.
pub fn parse_condition(input: &str, kind: ExpressionKind) -> Result<Expr, ExpressionError> {
    let mut parser = Parser::new(input, kind)?;
    let expr = parser.parse_or_expr()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse an update expression (SET / REMOVE / ADD / DELETE).
///
/// # Errors
///
/// Returns `ExpressionError` if the expression is empty or syntactically invalid.
pub fn parse_update(input: &str) -> Result<UpdateExpr, ExpressionError> {
    let mut parser = Parser::new(input, ExpressionKind::Update)?;
    parser.parse_update_expr()
}

/// Parse a projection expression (comma-separated attribute paths).
///
/// # Errors
///
/// Returns `ExpressionError` if the expression is empty, syntactically
/// invalid, or names a reserved word.
pub fn parse_projection(input: &str) -> Result<Vec<AttributePath>, ExpressionError> {
    let mut parser = Parser::new(input, ExpressionKind::Projection)?;
    parser.parse_projection_expr()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(input: &str) -> Expr {
        parse_condition(input, ExpressionKind::Condition).unwrap()
    }

    fn condition_err(input: &str) -> String {
        parse_condition(input, ExpressionKind::Condition)
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn test_should_parse_simple_comparison() {
        match &condition("#name = :val") {
            Expr::Compare { left, op, right } => {
                assert!(matches!(left, Operand::Path(_)));
                assert_eq!(*op, CompareOp::Eq);
                assert!(matches!(right, Operand::Value(v) if v == ":val"));
            }
            other => panic!("expected Compare, got {other:?}"),
        }
    }

    #[test]
    fn test_should_bind_and_tighter_than_or() {
        match &condition("a = :a OR b = :b AND c = :c") {
            Expr::Logical { op, right, .. } => {
                assert_eq!(*op, LogicalOp::Or);
                assert!(matches!(
                    right.as_ref(),
                    Expr::Logical {
                        op: LogicalOp::And,
                        ..
                    }
                ));
            }
            other => panic!("expected Logical OR, got {other:?}"),
        }
    }

    #[test]
    fn test_should_parse_between_and_in() {
        assert!(matches!(
            condition("#age BETWEEN :low AND :high"),
            Expr::Between { .. }
        ));
        match condition("#status IN (:v1, :v2, :v3)") {
            Expr::In { list, .. } => assert_eq!(list.len(), 3),
            other => panic!("expected In, got {other:?}"),
        }
    }

    #[test]
    fn test_should_parse_functions_case_insensitively() {
        match condition("Attribute_Exists(#name) AND NOT begins_with(a.b[2], :p)") {
            Expr::Logical { left, right, .. } => {
                assert!(matches!(
                    left.as_ref(),
                    Expr::Function {
                        name: FunctionName::AttributeExists,
                        ..
                    }
                ));
                assert!(matches!(right.as_ref(), Expr::Not(_)));
            }
            other => panic!("expected Logical, got {other:?}"),
        }
    }

    #[test]
    fn test_should_parse_size_as_operand() {
        match condition("size(#name) > :val") {
            Expr::Compare { left, op, .. } => {
                assert!(matches!(left, Operand::Size(_)));
                assert_eq!(op, CompareOp::Gt);
            }
            other => panic!("expected Compare, got {other:?}"),
        }
    }

    #[test]
    fn test_should_reject_misused_functions() {
        assert_eq!(
            condition_err("size(a)"),
            "Invalid ConditionExpression: The function is not allowed to be used this way in an expression; function: size"
        );
        assert_eq!(
            condition_err("a = begins_with(b, :c)"),
            "Invalid ConditionExpression: The function is not allowed to be used this way in an expression; function: begins_with"
        );
        assert_eq!(
            condition_err("bogus(a)"),
            "Invalid ConditionExpression: Invalid function name; function: bogus"
        );
        assert_eq!(
            condition_err("attribute_exists(a, b)"),
            "Invalid ConditionExpression: Incorrect number of operands for operator or function; operator or function: attribute_exists, number of operands: 2"
        );
    }

    #[test]
    fn test_should_reject_digits_outside_brackets() {
        assert_eq!(
            condition_err("a = 1"),
            "Invalid ConditionExpression: Syntax error; token: \"1\", near: \"= 1\""
        );
        assert!(matches!(
            parse_condition("", ExpressionKind::Filter),
            Err(ExpressionError::Empty {
                kind: ExpressionKind::Filter
            })
        ));
    }

    #[test]
    fn test_should_report_update_syntax_errors_with_window() {
        let err = parse_update("SET MyStr = myNum + 1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid UpdateExpression: Syntax error; token: \"1\", near: \"+ 1\""
        );
        let err = parse_update("SET MyStr = myNum Mystr2 myNum2").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid UpdateExpression: Syntax error; token: \"Mystr2\", near: \"myNum Mystr2 myNum2\""
        );
        let err = parse_update("SET MyStr = my Num").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid UpdateExpression: Syntax error; token: \"Num\", near: \"my Num\""
        );
    }

    #[test]
    fn test_should_reject_deeply_nested_conditions() {
        let nested = |depth: usize| {
            format!("{}a = :v{}", "(".repeat(depth), ")".repeat(depth))
        };
        assert!(parse_condition(&nested(MAX_NESTING_DEPTH), ExpressionKind::Filter).is_ok());

        let err = parse_condition(&nested(1000), ExpressionKind::Filter).unwrap_err();
        assert!(matches!(
            err,
            ExpressionError::TooDeeplyNested {
                kind: ExpressionKind::Filter,
                ..
            }
        ));

        let nots = format!("{}a = :v", "NOT ".repeat(MAX_NESTING_DEPTH + 1));
        assert!(matches!(
            parse_condition(&nots, ExpressionKind::Condition),
            Err(ExpressionError::TooDeeplyNested { .. })
        ));
    }

    #[test]
    fn test_should_reject_deeply_nested_update_functions() {
        let depth = MAX_NESTING_DEPTH + 1;
        let expr = format!(
            "SET a = {}:v{}",
            "list_append(:l, ".repeat(depth),
            ")".repeat(depth)
        );
        assert!(matches!(
            parse_update(&expr),
            Err(ExpressionError::TooDeeplyNested {
                kind: ExpressionKind::Update,
                ..
            })
        ));
        assert!(parse_update("SET a = list_append(if_not_exists(a, :e), :l)").is_ok());
    }

    #[test]
    fn test_should_reject_oversized_expressions() {
        let clauses = vec!["attr_name = :value"; 300].join(" AND ");
        assert!(clauses.len() > MAX_EXPRESSION_SIZE);
        let err = parse_condition(&clauses, ExpressionKind::Condition).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Invalid ConditionExpression: Expression size has exceeded the maximum allowed \
                 size; expression size: {}",
                clauses.len()
            )
        );
    }

    #[test]
    fn test_should_parse_all_update_clauses() {
        let update = parse_update(
            "SET a = :v, b = if_not_exists(b, :z) + :one, c = list_append(c, :l) REMOVE d, e[1] ADD f :n DELETE g :s",
        )
        .unwrap();
        assert_eq!(update.set_actions.len(), 3);
        assert!(matches!(update.set_actions[1].value, SetValue::Plus(..)));
        assert_eq!(update.remove_paths.len(), 2);
        assert_eq!(update.add_actions[0].value, ":n");
        assert_eq!(update.delete_actions[0].value, ":s");
    }

    #[test]
    fn test_should_reject_repeated_clauses() {
        let err = parse_update("SET a = :a SET b = :b").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid UpdateExpression: The \"SET\" section can only be used once in an update expression;"
        );
    }

    #[test]
    fn test_should_require_commas_between_actions() {
        let err = parse_update("SET a = :a b = :b").unwrap_err();
        assert!(matches!(err, ExpressionError::Syntax { ref token, .. } if token == "b"));
        assert!(matches!(
            parse_update("   "),
            Err(ExpressionError::Empty { .. })
        ));
    }

    #[test]
    fn test_should_parse_projection_paths() {
        let paths = parse_projection("id, #n, info.rating, l[3]").unwrap();
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[2].elements.len(), 2);
        assert!(matches!(paths[3].elements[1], PathElement::Index(3)));
    }

    #[test]
    fn test_should_report_projection_name_problems() {
        let msg = |input: &str| parse_projection(input).unwrap_err().to_string();
        assert_eq!(
            msg("name"),
            "Invalid ProjectionExpression: Attribute name is a reserved keyword; reserved keyword: name"
        );
        assert_eq!(
            msg("not_a_keyword, name"),
            "Invalid ProjectionExpression: Attribute name is a reserved keyword; reserved keyword: name"
        );
        assert_eq!(
            msg("3ame"),
            "Invalid ProjectionExpression: Attribute name starts with a number"
        );
        assert_eq!(
            msg("not_a_keyword, na me"),
            "Invalid ProjectionExpression: Attribute name contains white space"
        );
    }
}
