// Recursive-descent grammar over the token stream. One token of lookahead
// everywhere; operator precedence by nested parse functions.

use lang_ast::surface::{
    BinOp, Case, Decl, Exp, FloatSuffix, IntSuffix, Lit, Param, Pat, Predicate, Root, Type,
};
use lang_ast::{Ident, Span, UnaryOp};
use logos::Logos;
use smol_str::SmolStr;

use crate::token::Token;
use crate::ParseError;

pub fn parse(source: &str) -> Result<Root, ParseError> {
    let mut toks = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(tok) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start as u32, range.end as u32);
        match tok {
            Ok(t) => toks.push((t, span)),
            Err(()) => return Err(ParseError::new("unrecognized token", span)),
        }
    }
    let mut p = Parser {
        source,
        toks,
        pos: 0,
    };
    let mut decls = Vec::new();
    while !p.at_eof() {
        decls.push(p.decl()?);
    }
    Ok(Root { decls })
}

struct Parser<'a> {
    source: &'a str,
    toks: Vec<(Token, Span)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    // ==========================================================================
    // Token plumbing
    // ==========================================================================

    fn at_eof(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn peek(&self) -> Option<Token> {
        self.toks.get(self.pos).map(|(t, _)| *t)
    }

    fn peek2(&self) -> Option<Token> {
        self.toks.get(self.pos + 1).map(|(t, _)| *t)
    }

    fn cur_span(&self) -> Span {
        self.toks
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or_else(|| self.eof_span())
    }

    fn eof_span(&self) -> Span {
        let end = self.source.len() as u32;
        Span::new(end, end)
    }

    fn prev_span(&self) -> Span {
        self.toks
            .get(self.pos.saturating_sub(1))
            .map(|(_, s)| *s)
            .unwrap_or(Span::DUMMY)
    }

    fn bump(&mut self) -> Option<(Token, Span)> {
        let out = self.toks.get(self.pos).copied();
        if out.is_some() {
            self.pos += 1;
        }
        out
    }

    fn text(&self, span: Span) -> &'a str {
        &self.source[span.start as usize..span.end as usize]
    }

    fn eat(&mut self, tok: Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token, what: &str) -> Result<Span, ParseError> {
        match self.bump() {
            Some((t, span)) if t == tok => Ok(span),
            Some((_, span)) => Err(ParseError::new(format!("expected {what}"), span)),
            None => Err(ParseError::new(
                format!("expected {what}, found end of input"),
                self.eof_span(),
            )),
        }
    }

    fn ident(&mut self, what: &str) -> Result<Ident, ParseError> {
        let span = self.expect(Token::Ident, what)?;
        Ok(Ident::new(self.text(span), span))
    }

    /// `A::B::c`
    fn path(&mut self, what: &str) -> Result<Vec<Ident>, ParseError> {
        let mut out = vec![self.ident(what)?];
        while self.eat(Token::ColonColon) {
            out.push(self.ident(what)?);
        }
        Ok(out)
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    fn decl(&mut self) -> Result<Decl, ParseError> {
        match self.peek() {
            Some(Token::Ns) => self.namespace(),
            Some(Token::At) | Some(Token::Def) => self.def(),
            Some(Token::Enum) => self.enum_decl(),
            Some(Token::Rel) => self.relation(false),
            Some(Token::Lat) => self.relation(true),
            Some(Token::Index) => self.index(),
            Some(Token::Law) => self.law(),
            Some(Token::Let) => self.bounded_lattice(),
            Some(Token::Ident) | Some(Token::True) | Some(Token::False) => self.constraint(),
            _ => Err(ParseError::new("expected a declaration", self.cur_span())),
        }
    }

    fn namespace(&mut self) -> Result<Decl, ParseError> {
        let start = self.cur_span();
        self.expect(Token::Ns, "`ns`")?;
        let name = self.path("a namespace name")?;
        self.expect(Token::LBrace, "`{`")?;
        let mut decls = Vec::new();
        while self.peek() != Some(Token::RBrace) {
            if self.at_eof() {
                return Err(ParseError::new("unclosed namespace", start));
            }
            decls.push(self.decl()?);
        }
        let end = self.expect(Token::RBrace, "`}`")?;
        Ok(Decl::Namespace {
            name,
            decls,
            span: start.merge(end),
        })
    }

    fn def(&mut self) -> Result<Decl, ParseError> {
        let start = self.cur_span();
        let mut anns = Vec::new();
        while self.eat(Token::At) {
            anns.push(self.ident("an annotation name")?);
        }
        self.expect(Token::Def, "`def`")?;
        let ident = self.ident("a definition name")?;
        let params = self.params()?;
        self.expect(Token::Colon, "`:` before the return type")?;
        let ret_ty = self.ty()?;
        self.expect(Token::Assign, "`=`")?;
        let body = self.exp()?;
        let span = start.merge(body.span());
        Ok(Decl::Def {
            ident,
            anns,
            params,
            ret_ty,
            body,
            span,
        })
    }

    fn params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect(Token::LParen, "`(`")?;
        let mut out = Vec::new();
        if self.peek() != Some(Token::RParen) {
            loop {
                let ident = self.ident("a parameter name")?;
                self.expect(Token::Colon, "`:` before the parameter type")?;
                let ty = self.ty()?;
                out.push(Param { ident, ty });
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "`)`")?;
        Ok(out)
    }

    fn enum_decl(&mut self) -> Result<Decl, ParseError> {
        let start = self.cur_span();
        self.expect(Token::Enum, "`enum`")?;
        let ident = self.ident("an enum name")?;
        self.expect(Token::LBrace, "`{`")?;
        let mut cases = Vec::new();
        while self.eat(Token::Case) {
            let tag = self.ident("a tag name")?;
            let ty = if self.eat(Token::LParen) {
                let ty = self.ty()?;
                self.expect(Token::RParen, "`)`")?;
                Some(ty)
            } else {
                None
            };
            cases.push(Case { tag, ty });
            self.eat(Token::Comma);
        }
        let end = self.expect(Token::RBrace, "`}`")?;
        Ok(Decl::Enum {
            ident,
            cases,
            span: start.merge(end),
        })
    }

    fn relation(&mut self, is_lattice: bool) -> Result<Decl, ParseError> {
        let start = self.cur_span();
        self.bump();
        let ident = self.ident("a table name")?;
        self.expect(Token::LParen, "`(`")?;
        let mut attrs = Vec::new();
        if self.peek() != Some(Token::RParen) {
            loop {
                let attr = self.ident("an attribute name")?;
                self.expect(Token::Colon, "`:` before the attribute type")?;
                let ty = self.ty()?;
                attrs.push((attr, ty));
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(Token::RParen, "`)`")?;
        let span = start.merge(end);
        Ok(if is_lattice {
            Decl::Lattice { ident, attrs, span }
        } else {
            Decl::Relation { ident, attrs, span }
        })
    }

    fn index(&mut self) -> Result<Decl, ParseError> {
        let start = self.cur_span();
        self.expect(Token::Index, "`index`")?;
        let table = self.ident("a table name")?;
        self.expect(Token::LParen, "`(`")?;
        let mut keys = Vec::new();
        if self.peek() != Some(Token::RParen) {
            loop {
                self.expect(Token::LBracket, "`[`")?;
                let mut key = Vec::new();
                if self.peek() != Some(Token::RBracket) {
                    loop {
                        key.push(self.ident("an attribute name")?);
                        if !self.eat(Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RBracket, "`]`")?;
                keys.push(key);
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(Token::RParen, "`)`")?;
        Ok(Decl::Index {
            table,
            keys,
            span: start.merge(end),
        })
    }

    fn law(&mut self) -> Result<Decl, ParseError> {
        let start = self.cur_span();
        self.expect(Token::Law, "`law`")?;
        let ident = self.ident("a law name")?;
        let params = self.params()?;
        self.expect(Token::Assign, "`=`")?;
        let body = self.exp()?;
        let span = start.merge(body.span());
        Ok(Decl::Law {
            ident,
            params,
            body,
            span,
        })
    }

    /// `let T<> = (bot, top, leq, lub, glb)`
    fn bounded_lattice(&mut self) -> Result<Decl, ParseError> {
        let start = self.cur_span();
        self.expect(Token::Let, "`let`")?;
        let ty = self.ty()?;
        self.expect(Token::LtGt, "`<>`")?;
        self.expect(Token::Assign, "`=`")?;
        self.expect(Token::LParen, "`(`")?;
        let mut elms = Vec::new();
        if self.peek() != Some(Token::RParen) {
            loop {
                elms.push(self.exp()?);
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(Token::RParen, "`)`")?;
        Ok(Decl::BoundedLattice {
            ty,
            elms,
            span: start.merge(end),
        })
    }

    /// A fact `P(…).` or rule `P(…) :- B₁, …, Bₙ.`
    fn constraint(&mut self) -> Result<Decl, ParseError> {
        let start = self.cur_span();
        let head = self.predicate()?;
        if self.eat(Token::Dot) {
            let span = start.merge(self.prev_span());
            return Ok(Decl::Fact { head, span });
        }
        self.expect(Token::ColonMinus, "`.` or `:-`")?;
        let mut body = vec![self.predicate()?];
        while self.eat(Token::Comma) {
            body.push(self.predicate()?);
        }
        let end = self.expect(Token::Dot, "`.` after the rule body")?;
        Ok(Decl::Rule {
            head,
            body,
            span: start.merge(end),
        })
    }

    fn predicate(&mut self) -> Result<Predicate, ParseError> {
        match self.peek() {
            Some(Token::True) => {
                let (_, span) = self.bump().expect("peeked");
                Ok(Predicate::True(span))
            }
            Some(Token::False) => {
                let (_, span) = self.bump().expect("peeked");
                Ok(Predicate::False(span))
            }
            Some(Token::Ident) => {
                let name = self.ident("a predicate name")?;
                match self.peek() {
                    Some(Token::LParen) => {
                        self.bump();
                        let mut terms = Vec::new();
                        if self.peek() != Some(Token::RParen) {
                            loop {
                                terms.push(self.exp()?);
                                if !self.eat(Token::Comma) {
                                    break;
                                }
                            }
                        }
                        let end = self.expect(Token::RParen, "`)`")?;
                        Ok(Predicate::Ambient {
                            span: name.span.merge(end),
                            name,
                            terms,
                        })
                    }
                    Some(Token::Assign) => {
                        self.bump();
                        let exp = self.exp()?;
                        Ok(Predicate::Alias {
                            span: name.span.merge(exp.span()),
                            ident: name,
                            exp,
                        })
                    }
                    Some(Token::BangEq) => {
                        self.bump();
                        let rhs = self.ident("a variable")?;
                        Ok(Predicate::NotEqual {
                            span: name.span.merge(rhs.span),
                            lhs: name,
                            rhs,
                        })
                    }
                    Some(Token::BackArrow) => {
                        self.bump();
                        let exp = self.exp()?;
                        Ok(Predicate::Loop {
                            span: name.span.merge(exp.span()),
                            ident: name,
                            exp,
                        })
                    }
                    _ => Err(ParseError::new(
                        "expected `(`, `=`, `!=`, or `<-` after the predicate name",
                        self.cur_span(),
                    )),
                }
            }
            _ => Err(ParseError::new("expected a predicate", self.cur_span())),
        }
    }

    // ==========================================================================
    // Types
    // ==========================================================================

    fn ty(&mut self) -> Result<Type, ParseError> {
        match self.peek() {
            Some(Token::LParen) => {
                self.bump();
                let mut tys = Vec::new();
                if self.peek() != Some(Token::RParen) {
                    loop {
                        tys.push(self.ty()?);
                        if !self.eat(Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen, "`)`")?;
                if self.eat(Token::Arrow) {
                    let ret = self.ty()?;
                    return Ok(Type::Lambda(tys, Box::new(ret)));
                }
                Ok(match tys.len() {
                    0 => Type::Unit,
                    1 => tys.pop().expect("len checked"),
                    _ => Type::Tuple(tys),
                })
            }
            Some(Token::Hash) => {
                self.bump();
                let path = self.path("a native type name")?;
                Ok(Type::Native(path))
            }
            Some(Token::Ident) => {
                let path = self.path("a type name")?;
                if path.len() == 1 {
                    if let Some(builtin) = builtin_ty(&path[0].text) {
                        return Ok(builtin);
                    }
                }
                if self.eat(Token::LBracket) {
                    let mut args = Vec::new();
                    if self.peek() != Some(Token::RBracket) {
                        loop {
                            args.push(self.ty()?);
                            if !self.eat(Token::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(Token::RBracket, "`]`")?;
                    return Ok(Type::Parametric(path, args));
                }
                Ok(Type::Named(path))
            }
            _ => Err(ParseError::new("expected a type", self.cur_span())),
        }
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    fn exp(&mut self) -> Result<Exp, ParseError> {
        self.exp_or()
    }

    fn exp_or(&mut self) -> Result<Exp, ParseError> {
        let mut lhs = self.exp_and()?;
        while self.peek() == Some(Token::OrOr) {
            self.bump();
            let rhs = self.exp_and()?;
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn exp_and(&mut self) -> Result<Exp, ParseError> {
        let mut lhs = self.exp_cmp()?;
        while self.peek() == Some(Token::AndAnd) {
            self.bump();
            let rhs = self.exp_cmp()?;
            lhs = binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Comparison operators and backtick infix; single application, no
    /// chaining.
    fn exp_cmp(&mut self) -> Result<Exp, ParseError> {
        let lhs = self.exp_lat()?;
        let op = match self.peek() {
            Some(Token::EqEq) => Some(BinOp::Eq),
            Some(Token::BangEq) => Some(BinOp::NotEq),
            Some(Token::Lt) => Some(BinOp::Lt),
            Some(Token::Le) => Some(BinOp::Le),
            Some(Token::Gt) => Some(BinOp::Gt),
            Some(Token::Ge) => Some(BinOp::Ge),
            Some(Token::Backtick) => {
                self.bump();
                let path = self.path("an infix function name")?;
                self.expect(Token::Backtick, "closing backtick")?;
                let rhs = self.exp_lat()?;
                let span = lhs.span().merge(rhs.span());
                return Ok(Exp::Infix {
                    lhs: Box::new(lhs),
                    path,
                    rhs: Box::new(rhs),
                    span,
                });
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.bump();
                let rhs = self.exp_lat()?;
                Ok(binary(op, lhs, rhs))
            }
            None => Ok(lhs),
        }
    }

    fn exp_lat(&mut self) -> Result<Exp, ParseError> {
        let mut lhs = self.exp_add()?;
        loop {
            let op = match self.peek() {
                Some(Token::SqSubsetEq) => BinOp::Leq,
                Some(Token::SqCup) => BinOp::Lub,
                Some(Token::SqCap) => BinOp::Glb,
                Some(Token::Nabla) => BinOp::Widen,
                Some(Token::Delta) => BinOp::Narrow,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.exp_add()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn exp_add(&mut self) -> Result<Exp, ParseError> {
        let mut lhs = self.exp_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.exp_mul()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn exp_mul(&mut self) -> Result<Exp, ParseError> {
        let mut lhs = self.exp_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.exp_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn exp_unary(&mut self) -> Result<Exp, ParseError> {
        let op = match self.peek() {
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Minus),
            Some(Token::Plus) => Some(UnaryOp::Plus),
            _ => None,
        };
        match op {
            Some(op) => {
                let (_, start) = self.bump().expect("peeked");
                let exp = self.exp_unary()?;
                let span = start.merge(exp.span());
                Ok(Exp::Unary {
                    op,
                    exp: Box::new(exp),
                    span,
                })
            }
            None => self.exp_postfix(),
        }
    }

    /// Postfix call chains: `f(a)(b)`.
    fn exp_postfix(&mut self) -> Result<Exp, ParseError> {
        let mut exp = self.exp_atom()?;
        while self.peek() == Some(Token::LParen) {
            self.bump();
            let mut args = Vec::new();
            if self.peek() != Some(Token::RParen) {
                loop {
                    args.push(self.exp()?);
                    if !self.eat(Token::Comma) {
                        break;
                    }
                }
            }
            let end = self.expect(Token::RParen, "`)`")?;
            let span = exp.span().merge(end);
            exp = Exp::Apply {
                fun: Box::new(exp),
                args,
                span,
            };
        }
        Ok(exp)
    }

    fn exp_atom(&mut self) -> Result<Exp, ParseError> {
        match self.peek() {
            Some(Token::Int) => {
                let (_, span) = self.bump().expect("peeked");
                let raw = self.text(span);
                let (digits, suffix) = split_int_suffix(raw);
                Ok(Exp::Lit(Lit::Int {
                    text: SmolStr::new(digits),
                    suffix,
                    span,
                }))
            }
            Some(Token::Float) => {
                let (_, span) = self.bump().expect("peeked");
                let raw = self.text(span);
                let (digits, suffix) = split_float_suffix(raw);
                Ok(Exp::Lit(Lit::Float {
                    text: SmolStr::new(digits),
                    suffix,
                    span,
                }))
            }
            Some(Token::Str) => {
                let (_, span) = self.bump().expect("peeked");
                let raw = self.text(span);
                let inner = unescape(&raw[1..raw.len() - 1]);
                Ok(Exp::Lit(Lit::Str(SmolStr::new(inner), span)))
            }
            Some(Token::Char) => {
                let (_, span) = self.bump().expect("peeked");
                let raw = self.text(span);
                let inner = unescape(&raw[1..raw.len() - 1]);
                let c = inner
                    .chars()
                    .next()
                    .ok_or_else(|| ParseError::new("empty character literal", span))?;
                Ok(Exp::Lit(Lit::Char(c, span)))
            }
            Some(Token::True) => {
                let (_, span) = self.bump().expect("peeked");
                Ok(Exp::Lit(Lit::Bool(true, span)))
            }
            Some(Token::False) => {
                let (_, span) = self.bump().expect("peeked");
                Ok(Exp::Lit(Lit::Bool(false, span)))
            }
            Some(Token::BotSym) => {
                let (_, span) = self.bump().expect("peeked");
                Ok(Exp::Bot(span))
            }
            Some(Token::TopSym) => {
                let (_, span) = self.bump().expect("peeked");
                Ok(Exp::Top(span))
            }
            Some(Token::ErrorKw) => {
                let (_, span) = self.bump().expect("peeked");
                Ok(Exp::Error(span))
            }
            Some(Token::NoneKw) => {
                let (_, span) = self.bump().expect("peeked");
                Ok(Exp::OptLit { elm: None, span })
            }
            Some(Token::SomeKw) => {
                let (_, start) = self.bump().expect("peeked");
                self.expect(Token::LParen, "`(`")?;
                let elm = self.exp()?;
                let end = self.expect(Token::RParen, "`)`")?;
                Ok(Exp::OptLit {
                    elm: Some(Box::new(elm)),
                    span: start.merge(end),
                })
            }
            Some(Token::Ident) => self.exp_var_or_tag(),
            Some(Token::LParen) => self.exp_parens(),
            Some(Token::LBracket) => {
                let (elms, span) = self.exp_list(Token::LBracket, Token::RBracket)?;
                Ok(Exp::ListLit { elms, span })
            }
            Some(Token::HashBracket) => {
                let (elms, span) = self.exp_list(Token::HashBracket, Token::RBracket)?;
                Ok(Exp::VecLit { elms, span })
            }
            Some(Token::HashBrace) => {
                let (elms, span) = self.exp_list(Token::HashBrace, Token::RBrace)?;
                Ok(Exp::SetLit { elms, span })
            }
            Some(Token::AtBrace) => self.exp_map(),
            Some(Token::Fn) => self.exp_lambda(),
            Some(Token::If) => self.exp_if(),
            Some(Token::Let) => self.exp_let(),
            Some(Token::Match) => self.exp_match(),
            Some(Token::Exists) => self.exp_quant(true),
            Some(Token::Forall) => self.exp_quant(false),
            _ => Err(ParseError::new("expected an expression", self.cur_span())),
        }
    }

    fn exp_var_or_tag(&mut self) -> Result<Exp, ParseError> {
        let start = self.cur_span();
        let path = self.path("a name")?;
        if path.len() == 1 && path[0].text == "_" {
            return Ok(Exp::Wild(start));
        }
        // `Sign.Pos` or `A::Sign.Pos(e)` — a dot after the path selects a tag.
        if self.peek() == Some(Token::Dot) && self.peek2() == Some(Token::Ident) {
            self.bump();
            let tag = self.ident("a tag name")?;
            let payload = if self.eat(Token::LParen) {
                let payload = self.exp()?;
                self.expect(Token::RParen, "`)`")?;
                Some(Box::new(payload))
            } else {
                None
            };
            let span = start.merge(self.prev_span());
            return Ok(Exp::Tag {
                enum_path: Some(path),
                tag,
                payload,
                span,
            });
        }
        let span = start.merge(self.prev_span());
        Ok(Exp::Var { path, span })
    }

    /// `(…)`: unit, a parenthesized expression, an ascription, or a tuple.
    fn exp_parens(&mut self) -> Result<Exp, ParseError> {
        let start = self.expect(Token::LParen, "`(`")?;
        if self.peek() == Some(Token::RParen) {
            let end = self.expect(Token::RParen, "`)`")?;
            return Ok(Exp::Lit(Lit::Unit(start.merge(end))));
        }
        let first = self.exp()?;
        if self.eat(Token::Colon) {
            let ty = self.ty()?;
            let end = self.expect(Token::RParen, "`)`")?;
            return Ok(Exp::Ascribe {
                exp: Box::new(first),
                ty,
                span: start.merge(end),
            });
        }
        let mut elms = vec![first];
        while self.eat(Token::Comma) {
            elms.push(self.exp()?);
        }
        let end = self.expect(Token::RParen, "`)`")?;
        Ok(Exp::Tuple {
            elms,
            span: start.merge(end),
        })
    }

    fn exp_list(&mut self, open: Token, close: Token) -> Result<(Vec<Exp>, Span), ParseError> {
        let start = self.expect(open, "an opening bracket")?;
        let mut elms = Vec::new();
        if self.peek() != Some(close) {
            loop {
                elms.push(self.exp()?);
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(close, "a closing bracket")?;
        Ok((elms, start.merge(end)))
    }

    fn exp_map(&mut self) -> Result<Exp, ParseError> {
        let start = self.expect(Token::AtBrace, "`@{`")?;
        let mut elms = Vec::new();
        if self.peek() != Some(Token::RBrace) {
            loop {
                let key = self.exp()?;
                self.expect(Token::FatArrow, "`=>`")?;
                let value = self.exp()?;
                elms.push((key, value));
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(Token::RBrace, "`}`")?;
        Ok(Exp::MapLit {
            elms,
            span: start.merge(end),
        })
    }

    fn exp_lambda(&mut self) -> Result<Exp, ParseError> {
        let start = self.expect(Token::Fn, "`fn`")?;
        self.expect(Token::LParen, "`(`")?;
        let mut params = Vec::new();
        if self.peek() != Some(Token::RParen) {
            loop {
                params.push(self.ident("a parameter name")?);
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "`)`")?;
        self.expect(Token::Arrow, "`->`")?;
        let body = self.exp()?;
        let span = start.merge(body.span());
        Ok(Exp::Lambda {
            params,
            body: Box::new(body),
            span,
        })
    }

    fn exp_if(&mut self) -> Result<Exp, ParseError> {
        let start = self.expect(Token::If, "`if`")?;
        self.expect(Token::LParen, "`(`")?;
        let cond = self.exp()?;
        self.expect(Token::RParen, "`)`")?;
        let then_body = self.exp()?;
        self.expect(Token::Else, "`else`")?;
        let else_body = self.exp()?;
        let span = start.merge(else_body.span());
        Ok(Exp::IfThenElse {
            cond: Box::new(cond),
            then_body: Box::new(then_body),
            else_body: Box::new(else_body),
            span,
        })
    }

    fn exp_let(&mut self) -> Result<Exp, ParseError> {
        let start = self.expect(Token::Let, "`let`")?;
        let pat = self.pat()?;
        self.expect(Token::Assign, "`=`")?;
        let value = self.exp()?;
        self.expect(Token::Semi, "`;` after the bound value")?;
        let body = self.exp()?;
        let span = start.merge(body.span());
        Ok(Exp::LetMatch {
            pat,
            value: Box::new(value),
            body: Box::new(body),
            span,
        })
    }

    fn exp_match(&mut self) -> Result<Exp, ParseError> {
        let start = self.expect(Token::Match, "`match`")?;
        let scrutinee = self.exp()?;
        self.expect(Token::LBrace, "`{`")?;
        let mut arms = Vec::new();
        while self.eat(Token::Case) {
            let pat = self.pat()?;
            self.expect(Token::FatArrow, "`=>`")?;
            let body = self.exp()?;
            arms.push((pat, body));
            self.eat(Token::Comma);
        }
        let end = self.expect(Token::RBrace, "`}`")?;
        Ok(Exp::Match {
            scrutinee: Box::new(scrutinee),
            arms,
            span: start.merge(end),
        })
    }

    fn exp_quant(&mut self, existential: bool) -> Result<Exp, ParseError> {
        let start = self.cur_span();
        self.bump();
        let params = self.params()?;
        self.expect(Token::Dot, "`.` after the quantifier parameters")?;
        let body = self.exp()?;
        let span = start.merge(body.span());
        Ok(if existential {
            Exp::Exists {
                params,
                body: Box::new(body),
                span,
            }
        } else {
            Exp::Forall {
                params,
                body: Box::new(body),
                span,
            }
        })
    }

    // ==========================================================================
    // Patterns
    // ==========================================================================

    fn pat(&mut self) -> Result<Pat, ParseError> {
        match self.peek() {
            Some(Token::Int) => {
                let (_, span) = self.bump().expect("peeked");
                let raw = self.text(span);
                let (digits, suffix) = split_int_suffix(raw);
                Ok(Pat::Lit(Lit::Int {
                    text: SmolStr::new(digits),
                    suffix,
                    span,
                }))
            }
            Some(Token::Str) => {
                let (_, span) = self.bump().expect("peeked");
                let raw = self.text(span);
                Ok(Pat::Lit(Lit::Str(
                    SmolStr::new(unescape(&raw[1..raw.len() - 1])),
                    span,
                )))
            }
            Some(Token::True) => {
                let (_, span) = self.bump().expect("peeked");
                Ok(Pat::Lit(Lit::Bool(true, span)))
            }
            Some(Token::False) => {
                let (_, span) = self.bump().expect("peeked");
                Ok(Pat::Lit(Lit::Bool(false, span)))
            }
            Some(Token::LParen) => {
                let start = self.expect(Token::LParen, "`(`")?;
                if self.peek() == Some(Token::RParen) {
                    let end = self.expect(Token::RParen, "`)`")?;
                    return Ok(Pat::Lit(Lit::Unit(start.merge(end))));
                }
                let mut pats = vec![self.pat()?];
                while self.eat(Token::Comma) {
                    pats.push(self.pat()?);
                }
                let end = self.expect(Token::RParen, "`)`")?;
                if pats.len() == 1 {
                    return Ok(pats.pop().expect("len checked"));
                }
                Ok(Pat::Tuple(pats, start.merge(end)))
            }
            Some(Token::Ident) => {
                let start = self.cur_span();
                let path = self.path("a pattern")?;
                if path.len() == 1 && path[0].text == "_" {
                    return Ok(Pat::Wild(start));
                }
                // `Sign.Pos(p)` — explicit enum path.
                if self.peek() == Some(Token::Dot) && self.peek2() == Some(Token::Ident) {
                    self.bump();
                    let tag = self.ident("a tag name")?;
                    let pat = if self.eat(Token::LParen) {
                        let inner = self.pat()?;
                        self.expect(Token::RParen, "`)`")?;
                        Some(Box::new(inner))
                    } else {
                        None
                    };
                    let span = start.merge(self.prev_span());
                    return Ok(Pat::Tag {
                        enum_path: Some(path),
                        tag,
                        pat,
                        span,
                    });
                }
                // A capitalized single segment is a bare tag; anything else
                // binds a variable.
                let leading_upper = path[0]
                    .text
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_uppercase());
                if path.len() == 1 && !leading_upper {
                    return Ok(Pat::Var(path.into_iter().next().expect("len checked")));
                }
                let mut path = path;
                let tag = path.pop().expect("non-empty path");
                let enum_path = if path.is_empty() { None } else { Some(path) };
                let pat = if self.eat(Token::LParen) {
                    let inner = self.pat()?;
                    self.expect(Token::RParen, "`)`")?;
                    Some(Box::new(inner))
                } else {
                    None
                };
                let span = start.merge(self.prev_span());
                Ok(Pat::Tag {
                    enum_path,
                    tag,
                    pat,
                    span,
                })
            }
            _ => Err(ParseError::new("expected a pattern", self.cur_span())),
        }
    }
}

fn binary(op: BinOp, lhs: Exp, rhs: Exp) -> Exp {
    let span = lhs.span().merge(rhs.span());
    Exp::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        span,
    }
}

fn builtin_ty(name: &str) -> Option<Type> {
    Some(match name {
        "Unit" => Type::Unit,
        "Bool" => Type::Bool,
        "Char" => Type::Char,
        "Int8" => Type::Int8,
        "Int16" => Type::Int16,
        "Int32" => Type::Int32,
        "Int64" => Type::Int64,
        "BigInt" => Type::BigInt,
        "Float32" => Type::Float32,
        "Float64" => Type::Float64,
        "Str" => Type::Str,
        _ => return None,
    })
}

fn split_int_suffix(raw: &str) -> (&str, IntSuffix) {
    for (suffix, kind) in [
        ("i8", IntSuffix::I8),
        ("i16", IntSuffix::I16),
        ("i32", IntSuffix::I32),
        ("i64", IntSuffix::I64),
        ("ii", IntSuffix::Big),
    ] {
        if let Some(digits) = raw.strip_suffix(suffix) {
            return (digits, kind);
        }
    }
    (raw, IntSuffix::I32)
}

fn split_float_suffix(raw: &str) -> (&str, FloatSuffix) {
    if let Some(digits) = raw.strip_suffix("f32") {
        return (digits, FloatSuffix::F32);
    }
    if let Some(digits) = raw.strip_suffix("f64") {
        return (digits, FloatSuffix::F64);
    }
    (raw, FloatSuffix::F64)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
