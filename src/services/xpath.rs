// src/services/xpath.rs

//! XPath subset evaluated over a parsed HTML document.
//!
//! Supported: absolute and relative location paths, `//`, `.`, `..`, the
//! `child`, `descendant`, `descendant-or-self`, `self` and `parent` axes,
//! name and `*` node tests, unions with `|`, and predicates built from
//! positions (`[2]`, `[last()]`, `[position()=2]`), attribute tests
//! (`[@id]`, `[@id='x']`, `[@id!='x']`), `text()` and `.` comparisons,
//! `contains()`, `starts-with()`, `not()`, `and` and `or`.
//!
//! A path may end in `text()`, which selects the text nodes of the matched
//! elements instead of the elements. Attribute selections are rejected when
//! the expression is compiled.

use scraper::{ElementRef, Html};

use crate::error::{AppError, Result};

/// A compiled XPath expression.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    paths: Vec<Vec<Step>>,
    text: bool,
}

impl XPath {
    /// Compile an expression.
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source).map_err(|e| AppError::selector(source, e))?;
        let (paths, text) = Parser::new(tokens)
            .union()
            .map_err(|e| AppError::selector(source, e))?;
        Ok(Self {
            source: source.to_string(),
            paths,
            text,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the expression ends in `text()`.
    pub fn selects_text(&self) -> bool {
        self.text
    }

    /// Every matching element, in document order and without duplicates.
    ///
    /// For a `text()` expression these are the elements whose text nodes
    /// are selected.
    pub fn select<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let index = DomIndex::build(document);
        let hits = self.hits(&index);

        hits.iter()
            .enumerate()
            .filter(|(_, hit)| **hit)
            .map(|(i, _)| index.nodes[i])
            .collect()
    }

    /// The selected text nodes in document order.
    ///
    /// Only a `text()` expression selects text; any other yields nothing.
    pub fn select_text(&self, document: &Html) -> Vec<String> {
        if !self.text {
            return Vec::new();
        }
        let index = DomIndex::build(document);
        let hits = self.hits(&index);

        let mut out = Vec::new();
        if !index.nodes.is_empty() {
            index.collect_text(0, &hits, &mut out);
        }
        out
    }

    fn hits(&self, index: &DomIndex<'_>) -> Vec<bool> {
        let mut hits = vec![false; index.nodes.len()];

        for path in &self.paths {
            let mut context = vec![Node::Document];
            for step in path {
                context = index.apply(step, &context);
            }
            for node in context {
                if let Node::Element(i) = node {
                    hits[i] = true;
                }
            }
        }
        hits
    }
}

// --- Syntax ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfNode,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    /// `node()`: elements and the document itself
    Node,
    /// `*`
    Element,
    Name(String),
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

impl Step {
    fn new(axis: Axis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: Vec::new(),
        }
    }

    /// The implicit step behind `//`.
    fn descendant_or_self() -> Self {
        Self::new(Axis::DescendantOrSelf, NodeTest::Node)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    Last,
    Exists(Operand),
    Compare {
        left: Operand,
        negate: bool,
        right: Operand,
    },
    Contains(Operand, Operand),
    StartsWith(Operand, Operand),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Attribute(String),
    /// `text()`: the element's own text nodes
    Text,
    /// `.`: all descendant text
    StringValue,
    Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Eq,
    NotEq,
    Star,
    Dot,
    DotDot,
    ColonColon,
    Name(String),
    Literal(String),
    Number(usize),
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ':' if next == Some(':') => {
                tokens.push(Token::ColonColon);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '[' | ']' | '(' | ')' | '@' | ',' | '|' | '=' | '*' => {
                tokens.push(match c {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '@' => Token::At,
                    ',' => Token::Comma,
                    '|' => Token::Pipe,
                    '=' => Token::Eq,
                    _ => Token::Star,
                });
                i += 1;
            }
            '\'' | '"' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| format!("unterminated string literal at offset {i}"))?;
                tokens.push(Token::Literal(chars[i + 1..i + 1 + close].iter().collect()));
                i += close + 2;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let n = digits
                    .parse()
                    .map_err(|_| format!("number out of range: {digits}"))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '-' | '_' | '.'))
                {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}' at offset {i}")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_second(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> std::result::Result<(), String> {
        match self.advance() {
            Some(found) if found == token => Ok(()),
            found => Err(format!("expected {token:?}, found {found:?}")),
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(name)) if name == keyword)
    }

    fn at_call(&self, function: &str) -> bool {
        self.at_keyword(function) && self.peek_second() == Some(&Token::LParen)
    }

    /// Location paths of a union and whether they select text.
    fn union(mut self) -> std::result::Result<(Vec<Vec<Step>>, bool), String> {
        if self.tokens.is_empty() {
            return Err("empty expression".into());
        }
        let (first, text) = self.path()?;
        let mut paths = vec![first];
        while self.eat(&Token::Pipe) {
            let (path, path_text) = self.path()?;
            if path_text != text {
                return Err("text() and element paths cannot be mixed in a union".into());
            }
            paths.push(path);
        }
        match self.peek() {
            None => Ok((paths, text)),
            Some(token) => Err(format!("unexpected {token:?}")),
        }
    }

    fn path(&mut self) -> std::result::Result<(Vec<Step>, bool), String> {
        let mut steps = Vec::new();
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                // A lone "/" selects the document itself.
                if matches!(self.peek(), None | Some(Token::Pipe)) {
                    return Ok((steps, false));
                }
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
            }
            Some(Token::LParen) => return Err("grouped expressions are not supported".into()),
            _ => {}
        }

        if self.text_step()? {
            return Ok((steps, true));
        }
        steps.push(self.step()?);
        loop {
            match self.peek() {
                Some(Token::Slash) => self.pos += 1,
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(Step::descendant_or_self());
                }
                _ => break,
            }
            if self.text_step()? {
                return Ok((steps, true));
            }
            steps.push(self.step()?);
        }
        Ok((steps, false))
    }

    /// Consume a `text()` step. It has to be the last step of its path.
    fn text_step(&mut self) -> std::result::Result<bool, String> {
        if !self.at_call("text") {
            return Ok(false);
        }
        self.pos += 2;
        self.expect(Token::RParen)?;
        match self.peek() {
            None | Some(Token::Pipe) => Ok(true),
            Some(token) => Err(format!("text() must be the last step, found {token:?}")),
        }
    }

    fn step(&mut self) -> std::result::Result<Step, String> {
        let mut step = match self.advance() {
            Some(Token::Dot) => return Ok(Step::new(Axis::SelfNode, NodeTest::Node)),
            Some(Token::DotDot) => return Ok(Step::new(Axis::Parent, NodeTest::Node)),
            Some(Token::Star) => Step::new(Axis::Child, NodeTest::Element),
            Some(Token::Name(name)) if self.peek() == Some(&Token::ColonColon) => {
                self.pos += 1;
                let axis = match name.as_str() {
                    "child" => Axis::Child,
                    "descendant" => Axis::Descendant,
                    "descendant-or-self" => Axis::DescendantOrSelf,
                    "self" => Axis::SelfNode,
                    "parent" => Axis::Parent,
                    other => return Err(format!("unsupported axis '{other}'")),
                };
                Step::new(axis, self.node_test()?)
            }
            Some(Token::Name(_)) if self.peek() == Some(&Token::LParen) => {
                self.pos -= 1;
                Step::new(Axis::Child, self.node_test()?)
            }
            Some(Token::Name(name)) => Step::new(Axis::Child, NodeTest::Name(name.to_lowercase())),
            Some(Token::At) => {
                return Err("attribute selection is not supported; select the element".into());
            }
            found => return Err(format!("expected a location step, found {found:?}")),
        };

        while self.eat(&Token::LBracket) {
            step.predicates.push(self.or_expr()?);
            self.expect(Token::RBracket)?;
        }
        Ok(step)
    }

    fn node_test(&mut self) -> std::result::Result<NodeTest, String> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Element),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                self.expect(Token::RParen)?;
                match name.as_str() {
                    "node" => Ok(NodeTest::Node),
                    other => Err(format!("unsupported node test '{other}()'")),
                }
            }
            Some(Token::Name(name)) => Ok(NodeTest::Name(name.to_lowercase())),
            found => Err(format!("expected a node test, found {found:?}")),
        }
    }

    fn or_expr(&mut self) -> std::result::Result<Predicate, String> {
        let mut left = self.and_expr()?;
        while self.at_keyword("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> std::result::Result<Predicate, String> {
        let mut left = self.unary()?;
        while self.at_keyword("and") {
            self.pos += 1;
            let right = self.unary()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> std::result::Result<Predicate, String> {
        if let Some(Token::Number(n)) = self.peek() {
            let n = *n;
            self.pos += 1;
            return Ok(Predicate::Position(n));
        }
        if self.eat(&Token::LParen) {
            let inner = self.or_expr()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        if self.at_call("not") {
            self.pos += 2;
            let inner = self.or_expr()?;
            self.expect(Token::RParen)?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        if self.at_call("last") {
            self.pos += 2;
            self.expect(Token::RParen)?;
            return Ok(Predicate::Last);
        }
        if self.at_call("position") {
            self.pos += 2;
            self.expect(Token::RParen)?;
            self.expect(Token::Eq)?;
            return match self.advance() {
                Some(Token::Number(n)) => Ok(Predicate::Position(n)),
                Some(Token::Name(name)) if name == "last" => {
                    self.expect(Token::LParen)?;
                    self.expect(Token::RParen)?;
                    Ok(Predicate::Last)
                }
                found => Err(format!("expected a position, found {found:?}")),
            };
        }
        for function in ["contains", "starts-with"] {
            if self.at_call(function) {
                self.pos += 2;
                let haystack = self.operand()?;
                self.expect(Token::Comma)?;
                let needle = self.operand()?;
                self.expect(Token::RParen)?;
                return Ok(if function == "contains" {
                    Predicate::Contains(haystack, needle)
                } else {
                    Predicate::StartsWith(haystack, needle)
                });
            }
        }

        let left = self.operand()?;
        if self.eat(&Token::Eq) {
            let right = self.operand()?;
            return Ok(Predicate::Compare {
                left,
                negate: false,
                right,
            });
        }
        if self.eat(&Token::NotEq) {
            let right = self.operand()?;
            return Ok(Predicate::Compare {
                left,
                negate: true,
                right,
            });
        }
        Ok(Predicate::Exists(left))
    }

    fn operand(&mut self) -> std::result::Result<Operand, String> {
        match self.advance() {
            Some(Token::At) => match self.advance() {
                Some(Token::Name(name)) => Ok(Operand::Attribute(name.to_lowercase())),
                found => Err(format!("expected an attribute name, found {found:?}")),
            },
            Some(Token::Name(name)) if name == "text" => {
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                Ok(Operand::Text)
            }
            Some(Token::Dot) => Ok(Operand::StringValue),
            Some(Token::Literal(s)) => Ok(Operand::Literal(s)),
            Some(Token::Number(n)) => Ok(Operand::Literal(n.to_string())),
            found => Err(format!("expected an operand, found {found:?}")),
        }
    }
}

// --- Evaluation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Document,
    Element(usize),
}

/// Elements of a document numbered in document (pre-)order.
///
/// The subtree of element `i` is exactly the range `i..end[i]`.
struct DomIndex<'a> {
    nodes: Vec<ElementRef<'a>>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    end: Vec<usize>,
}

impl<'a> DomIndex<'a> {
    fn build(document: &'a Html) -> Self {
        let mut index = Self {
            nodes: Vec::new(),
            parent: Vec::new(),
            children: Vec::new(),
            end: Vec::new(),
        };

        let mut stack = vec![(document.root_element(), None)];
        while let Some((element, parent)) = stack.pop() {
            let id = index.nodes.len();
            index.nodes.push(element);
            index.parent.push(parent);
            index.children.push(Vec::new());
            if let Some(p) = parent {
                index.children[p].push(id);
            }

            let kids: Vec<_> = element.children().filter_map(ElementRef::wrap).collect();
            stack.extend(kids.into_iter().rev().map(|child| (child, Some(id))));
        }

        let count = index.nodes.len();
        index.end = (1..=count).collect();
        for i in (0..count).rev() {
            if let Some(&last) = index.children[i].last() {
                index.end[i] = index.end[last];
            }
        }
        index
    }

    /// Push the text nodes under element `i` in document order, keeping
    /// those whose parent is marked in `hits`.
    fn collect_text(&self, i: usize, hits: &[bool], out: &mut Vec<String>) {
        let mut kids = self.children[i].iter();
        for child in self.nodes[i].children() {
            if let Some(text) = child.value().as_text() {
                if hits[i] {
                    out.push(String::from(&*text.text));
                }
            } else if ElementRef::wrap(child).is_some() {
                if let Some(&k) = kids.next() {
                    self.collect_text(k, hits, out);
                }
            }
        }
    }

    fn apply(&self, step: &Step, context: &[Node]) -> Vec<Node> {
        let mut seen_document = false;
        let mut seen = vec![false; self.nodes.len()];
        let mut out = Vec::new();

        for &ctx in context {
            let candidates: Vec<Node> = self
                .axis(ctx, step.axis)
                .into_iter()
                .filter(|&node| self.passes(node, &step.test))
                .collect();
            let selected = step
                .predicates
                .iter()
                .fold(candidates, |nodes, predicate| self.filter(nodes, predicate));

            for node in selected {
                let fresh = match node {
                    Node::Document => !std::mem::replace(&mut seen_document, true),
                    Node::Element(i) => !std::mem::replace(&mut seen[i], true),
                };
                if fresh {
                    out.push(node);
                }
            }
        }
        out
    }

    fn axis(&self, ctx: Node, axis: Axis) -> Vec<Node> {
        let all = 0..self.nodes.len();
        match (axis, ctx) {
            (Axis::Child, Node::Document) => all.take(1).map(Node::Element).collect(),
            (Axis::Child, Node::Element(i)) => {
                self.children[i].iter().copied().map(Node::Element).collect()
            }
            (Axis::Descendant, Node::Document) => all.map(Node::Element).collect(),
            (Axis::Descendant, Node::Element(i)) => {
                (i + 1..self.end[i]).map(Node::Element).collect()
            }
            (Axis::DescendantOrSelf, Node::Document) => std::iter::once(Node::Document)
                .chain(all.map(Node::Element))
                .collect(),
            (Axis::DescendantOrSelf, Node::Element(i)) => {
                (i..self.end[i]).map(Node::Element).collect()
            }
            (Axis::SelfNode, node) => vec![node],
            (Axis::Parent, Node::Document) => Vec::new(),
            (Axis::Parent, Node::Element(i)) => {
                vec![self.parent[i].map_or(Node::Document, Node::Element)]
            }
        }
    }

    fn passes(&self, node: Node, test: &NodeTest) -> bool {
        match (test, node) {
            (NodeTest::Node, _) => true,
            (_, Node::Document) => false,
            (NodeTest::Element, Node::Element(_)) => true,
            (NodeTest::Name(name), Node::Element(i)) => {
                self.nodes[i].value().name() == name.as_str()
            }
        }
    }

    fn filter(&self, nodes: Vec<Node>, predicate: &Predicate) -> Vec<Node> {
        let size = nodes.len();
        nodes
            .into_iter()
            .enumerate()
            .filter(|&(i, node)| self.eval(predicate, node, i + 1, size))
            .map(|(_, node)| node)
            .collect()
    }

    fn eval(&self, predicate: &Predicate, node: Node, position: usize, size: usize) -> bool {
        match predicate {
            Predicate::Position(n) => position == *n,
            Predicate::Last => position == size,
            Predicate::Exists(operand) => self.resolve(operand, node).is_some(),
            Predicate::Compare {
                left,
                negate,
                right,
            } => match (self.resolve(left, node), self.resolve(right, node)) {
                (Some(a), Some(b)) => (a == b) != *negate,
                _ => false,
            },
            Predicate::Contains(haystack, needle) => {
                match (self.resolve(haystack, node), self.resolve(needle, node)) {
                    (Some(h), Some(n)) => h.contains(&n),
                    _ => false,
                }
            }
            Predicate::StartsWith(haystack, prefix) => {
                match (self.resolve(haystack, node), self.resolve(prefix, node)) {
                    (Some(h), Some(p)) => h.starts_with(&p),
                    _ => false,
                }
            }
            Predicate::Not(inner) => !self.eval(inner, node, position, size),
            Predicate::And(a, b) => {
                self.eval(a, node, position, size) && self.eval(b, node, position, size)
            }
            Predicate::Or(a, b) => {
                self.eval(a, node, position, size) || self.eval(b, node, position, size)
            }
        }
    }

    fn resolve(&self, operand: &Operand, node: Node) -> Option<String> {
        if let Operand::Literal(s) = operand {
            return Some(s.clone());
        }
        let Node::Element(i) = node else {
            return None;
        };
        let element = self.nodes[i];

        match operand {
            Operand::Attribute(name) => element.value().attr(name).map(str::to_string),
            Operand::Text => {
                let own: Vec<&str> = element
                    .children()
                    .filter_map(|child| child.value().as_text())
                    .map(|text| &*text.text)
                    .collect();
                (!own.is_empty()).then(|| own.concat())
            }
            Operand::StringValue => Some(element.text().collect()),
            Operand::Literal(_) => None,
        }
    }
}
