//! Query Parser
//!
//! Parses query text into a [`Query`] by recursive descent over the tokens
//! produced by the tokenizer.
//!
//! # Supported Syntax
//!
//! ```text
//! [COLUMN 'label', ...]
//! [FORMAT property[;property...], ...]
//! SELECT * | expression, ...
//! FROM type [AS alias], ...
//! [WHERE field = 'value' [AND ...]]
//! [GROUP BY field, ...]
//! [ORDER BY field [ASC|DESC], ...]
//! [LIMIT n]
//! ```
//!
//! where an expression is `field [AS alias]` or `AGG(field) [AS alias]`, and
//! `*` is accepted only as `COUNT(*)`.

use crate::query::ast::*;
use crate::query::error::{QueryError, QueryResult};
use crate::query::tokenizer::{tokenize, Token, TokenKind};

const KEYWORDS: &[&str] = &[
    "COLUMN", "FORMAT", "SELECT", "FROM", "WHERE", "AND", "GROUP", "ORDER", "BY", "LIMIT", "AS",
    "ASC", "DESC",
];

const UNSUPPORTED_COMPARATORS: &[&str] = &[
    "<", ">", "<=", ">=", "!", "!=", "<>", "==", "LIKE", "IN", "BETWEEN", "IS", "NOT",
];

const JOINS: &[&str] = &["JOIN", "INNER", "LEFT", "RIGHT", "OUTER", "CROSS", "FULL"];

/// Parse query text into a Query AST
pub fn parse_query(text: &str) -> QueryResult<Query> {
    QueryParser::new(text)?.parse()
}

/// Parse a query or a `SHOW` command
pub fn parse_command(text: &str) -> QueryResult<Command> {
    let mut parser = QueryParser::new(text)?;
    if !parser.accept_keyword("SHOW") {
        return parser.parse().map(Command::Query);
    }

    let command = if parser.accept_keyword("EVENTS") {
        Command::ShowEvents
    } else if parser.accept_keyword("FIELDS") {
        Command::ShowFields(parser.name("event type")?)
    } else {
        return Err(parser.error("expected EVENTS or FIELDS after SHOW"));
    };
    parser.end()?;
    Ok(command)
}

/// Recursive descent parser over query tokens
#[derive(Debug)]
pub struct QueryParser {
    tokens: Vec<Token>,
    index: usize,
    length: usize,
}

impl QueryParser {
    /// Tokenize query text
    pub fn new(text: &str) -> QueryResult<Self> {
        Ok(Self {
            tokens: tokenize(text)?,
            index: 0,
            length: text.chars().count(),
        })
    }

    /// Parse all tokens as one query
    pub fn parse(&mut self) -> QueryResult<Query> {
        let mut query = Query::default();

        if self.accept_keyword("COLUMN") {
            query.column = self.list(Self::column)?;
        }
        if self.accept_keyword("FORMAT") {
            query.format = self.list(Self::formatter)?;
        }

        self.expect_keyword("SELECT")?;
        if self.peek().is_some_and(|t| t.word() == Some("*")) {
            self.shift();
        } else {
            query.select = self.list(Self::expression)?;
        }

        self.expect_keyword("FROM")?;
        query.from = self.list(Self::source)?;
        self.reject_join()?;

        if self.accept_keyword("WHERE") {
            query.conditions.push(self.condition()?);
            while self.accept_keyword("AND") {
                query.conditions.push(self.condition()?);
            }
            if self.peek().is_some_and(|t| t.is_keyword("OR")) {
                return Err(self.error("OR is not supported, conditions can only be combined with AND"));
            }
        }

        if self.accept_keyword("GROUP") {
            self.expect_keyword("BY")?;
            query.group_by = self.list(|p| p.name("field"))?;
        }

        if self.accept_keyword("HAVING") {
            return Err(self.error_at_previous("HAVING is not supported"));
        }

        if self.accept_keyword("ORDER") {
            self.expect_keyword("BY")?;
            query.order_by = self.list(Self::order_element)?;
        }

        if self.accept_keyword("LIMIT") {
            query.limit = Some(self.limit()?);
        }

        self.end()?;
        Ok(query)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.index + offset)
    }

    fn shift(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.length)
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::syntax(message, self.position())
    }

    fn error_at_previous(&self, message: impl Into<String>) -> QueryError {
        let position = self
            .index
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.position)
            .unwrap_or(0);
        QueryError::syntax(message, position)
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(token) => format!("'{}'", token.text()),
            None => "end of query".to_string(),
        }
    }

    fn accept_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
            self.index += 1;
            return true;
        }
        false
    }

    fn expect_keyword(&mut self, keyword: &str) -> QueryResult<()> {
        if self.accept_keyword(keyword) {
            return Ok(());
        }
        Err(self.error(format!("expected {}, found {}", keyword, self.found())))
    }

    fn accept_separator(&mut self, separator: char) -> bool {
        if self.peek().is_some_and(|t| t.is_separator(separator)) {
            self.index += 1;
            return true;
        }
        false
    }

    fn expect_separator(&mut self, separator: char) -> QueryResult<()> {
        if self.accept_separator(separator) {
            return Ok(());
        }
        Err(self.error(format!("expected '{}', found {}", separator, self.found())))
    }

    fn end(&mut self) -> QueryResult<()> {
        self.accept_separator(';');
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error(format!("unexpected {}", self.found()))),
        }
    }

    /// Comma separated list of at least one element
    fn list<T>(&mut self, mut element: impl FnMut(&mut Self) -> QueryResult<T>) -> QueryResult<Vec<T>> {
        let mut items = vec![element(self)?];
        while self.accept_separator(',') {
            items.push(element(self)?);
        }
        Ok(items)
    }

    /// A symbolic name that is not a keyword
    fn name(&mut self, what: &str) -> QueryResult<String> {
        let word = self
            .peek()
            .and_then(Token::word)
            .filter(|w| !is_keyword(w) && *w != "*")
            .map(str::to_string);
        match word {
            Some(word) => {
                self.shift();
                Ok(word)
            }
            None => Err(self.error(format!("expected {}, found {}", what, self.found()))),
        }
    }

    fn alias(&mut self) -> QueryResult<Option<String>> {
        if !self.accept_keyword("AS") {
            return Ok(None);
        }
        let position = self.position();
        let alias = self.name("alias")?;
        if !alias.chars().all(char::is_alphabetic) {
            return Err(QueryError::syntax(
                format!("alias '{}' can only contain letters", alias),
                position,
            ));
        }
        Ok(Some(alias))
    }

    fn column(&mut self) -> QueryResult<String> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Quoted(text)) => {
                let text = text.clone();
                self.shift();
                Ok(text)
            }
            _ => Err(self.error(format!("expected quoted column label, found {}", self.found()))),
        }
    }

    fn formatter(&mut self) -> QueryResult<Formatter> {
        let mut properties = vec![self.property()?];
        while self.accept_separator(';') {
            properties.push(self.property()?);
        }
        Ok(Formatter::new(properties))
    }

    fn property(&mut self) -> QueryResult<Property> {
        let property = self.peek().and_then(Token::word).and_then(Property::parse);
        match property {
            Some(property) => {
                self.shift();
                Ok(property)
            }
            None => Err(self.error(format!("unknown format property {}", self.found()))),
        }
    }

    fn expression(&mut self) -> QueryResult<Expression> {
        if self.peek_at(1).is_some_and(|t| t.is_separator('(')) {
            return self.aggregate();
        }
        if self.peek().is_some_and(|t| t.word() == Some("*")) {
            return Err(self.error("'*' must be used alone or as COUNT(*)"));
        }
        let mut expression = Expression::field(self.name("field")?);
        expression.alias = self.alias()?;
        Ok(expression)
    }

    fn aggregate(&mut self) -> QueryResult<Expression> {
        let position = self.position();
        let name = self.shift().map(|t| t.text()).unwrap_or_default();
        let aggregator = Aggregator::from_query_name(&name).ok_or_else(|| {
            QueryError::syntax(format!("unknown aggregation function '{}'", name), position)
        })?;
        self.expect_separator('(')?;

        let field = if self.peek().is_some_and(|t| t.word() == Some("*")) {
            if aggregator != Aggregator::Count {
                return Err(self.error(format!("'*' is only allowed in COUNT(*), not in {}", aggregator)));
            }
            self.shift();
            "*".to_string()
        } else {
            self.name("field")?
        };
        self.expect_separator(')')?;

        let mut expression = Expression::aggregate(aggregator, field);
        expression.alias = self.alias()?;
        Ok(expression)
    }

    fn source(&mut self) -> QueryResult<Source> {
        if self.peek().is_some_and(|t| t.is_separator('(')) {
            return Err(self.error("subqueries are not supported"));
        }
        let mut source = Source::new(self.name("event type")?);
        source.alias = self.alias()?;
        Ok(source)
    }

    fn reject_join(&self) -> QueryResult<()> {
        match self.peek().and_then(Token::word) {
            Some(word) if JOINS.iter().any(|j| j.eq_ignore_ascii_case(word)) => {
                Err(self.error("JOIN is not supported, list event types separated by commas"))
            }
            _ => Ok(()),
        }
    }

    fn condition(&mut self) -> QueryResult<Condition> {
        let position = self.position();
        let field = self.name("field")?;
        if let Some(operator) = ["<", ">", "!"].iter().find(|op| field.contains(*op)) {
            return Err(QueryError::syntax(
                format!("comparator '{}' is not supported, only '=' can be used", operator),
                position,
            ));
        }

        if !self.accept_separator('=') {
            let message = match self.peek().and_then(Token::word) {
                Some(word) if is_comparator(word) => format!(
                    "comparator '{}' is not supported, only '=' can be used",
                    word
                ),
                _ => format!("expected '=', found {}", self.found()),
            };
            return Err(self.error(message));
        }

        let value = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Quoted(text)) => text.clone(),
            Some(TokenKind::Word(word)) if !is_keyword(word) => word.clone(),
            _ => return Err(self.error(format!("expected value, found {}", self.found()))),
        };
        self.shift();
        Ok(Condition::new(field, value))
    }

    fn order_element(&mut self) -> QueryResult<OrderElement> {
        let name = self.name("field")?;
        let order = if self.accept_keyword("ASC") {
            SortOrder::Ascending
        } else if self.accept_keyword("DESC") {
            SortOrder::Descending
        } else {
            SortOrder::None
        };
        Ok(OrderElement::new(name, order))
    }

    fn limit(&mut self) -> QueryResult<usize> {
        let limit = self
            .peek()
            .and_then(Token::word)
            .and_then(|w| w.parse::<usize>().ok());
        match limit {
            Some(limit) => {
                self.shift();
                Ok(limit)
            }
            None => Err(self.error(format!(
                "expected a non-negative integer after LIMIT, found {}",
                self.found()
            ))),
        }
    }
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn is_comparator(word: &str) -> bool {
    UNSUPPORTED_COMPARATORS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(word))
}
