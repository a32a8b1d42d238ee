// Token definitions for the reference surface syntax. The lattice operators
// have first-class Unicode tokens; anything ASCII reaches the same functions
// through backtick-infix application.

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum Token {
    // Keywords
    #[token("ns")]
    Ns,
    #[token("def")]
    Def,
    #[token("enum")]
    Enum,
    #[token("case")]
    Case,
    #[token("rel")]
    Rel,
    #[token("lat")]
    Lat,
    #[token("index")]
    Index,
    #[token("law")]
    Law,
    #[token("let")]
    Let,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("match")]
    Match,
    #[token("fn")]
    Fn,
    #[token("exists")]
    Exists,
    #[token("forall")]
    Forall,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("None")]
    NoneKw,
    #[token("Some")]
    SomeKw,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("#{")]
    HashBrace,
    #[token("#[")]
    HashBracket,
    #[token("@{")]
    AtBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token("::")]
    ColonColon,
    #[token(".")]
    Dot,
    #[token(":-")]
    ColonMinus,
    #[token("@")]
    At,
    #[token("=")]
    Assign,
    #[token("=>")]
    FatArrow,
    #[token("->")]
    Arrow,
    #[token("<-")]
    BackArrow,
    #[token("<>")]
    LtGt,
    #[token("`")]
    Backtick,
    #[token("#")]
    Hash,
    #[token("???")]
    ErrorKw,

    // Operators
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("⊑")]
    SqSubsetEq,
    #[token("⊔")]
    SqCup,
    #[token("⊓")]
    SqCap,
    #[token("▽")]
    Nabla,
    #[token("△")]
    Delta,
    #[token("⊥")]
    BotSym,
    #[token("⊤")]
    TopSym,

    // Literals and identifiers
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9][0-9_]*(i8|i16|i32|i64|ii)?")]
    Int,
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*(f32|f64)?")]
    Float,
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,
    #[regex(r"'([^'\\]|\\.)'")]
    Char,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Token::lexer(src).map(|t| t.expect("lexes")).collect()
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            lex("def defx ns"),
            vec![Token::Def, Token::Ident, Token::Ns]
        );
    }

    #[test]
    fn numeric_suffixes_stay_in_one_token() {
        assert_eq!(lex("42i8 42ii 3.14f32"), vec![Token::Int, Token::Int, Token::Float]);
    }

    #[test]
    fn lattice_operators() {
        assert_eq!(
            lex("⊑ ⊔ ⊓ ▽ △ ⊥ ⊤"),
            vec![
                Token::SqSubsetEq,
                Token::SqCup,
                Token::SqCap,
                Token::Nabla,
                Token::Delta,
                Token::BotSym,
                Token::TopSym,
            ]
        );
    }

    #[test]
    fn rule_punctuation() {
        assert_eq!(
            lex("P(x) :- Q(x)."),
            vec![
                Token::Ident,
                Token::LParen,
                Token::Ident,
                Token::RParen,
                Token::ColonMinus,
                Token::Ident,
                Token::LParen,
                Token::Ident,
                Token::RParen,
                Token::Dot,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(lex("a // c\n b /* c */ c"), vec![Token::Ident; 3]);
    }
}
