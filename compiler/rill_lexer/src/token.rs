//! Token kinds, semantic values, and the token record.

use crate::span::Span;
use crate::trivia::ParsedTrivia;

/// The kind of a lexed token.
///
/// Grouped by role: bookkeeping kinds, tags, names and literals, string
/// machinery, keywords, casts, operators, delimiters. New variants may be
/// added as the language grows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TokenKind {
    // === Bookkeeping ===
    /// Not yet lexed, or unrecognizable input kept for recovery.
    Unknown,
    /// End of the (possibly artificial) buffer range.
    EndOfFile,
    /// A lexical error in parse mode; the value carries the message.
    Error,
    /// Zero-width token at the code-completion anchor.
    CodeCompletion,
    /// A `//` or `/* */` comment, in return-comments-as-tokens mode.
    Comment,
    /// A `///` or `/** */` comment, in return-comments-as-tokens mode.
    DocComment,

    // === Tags ===
    /// `<?php`
    OpenTag,
    /// `?>`
    CloseTag,

    // === Names and literals ===
    /// `$name`; value is the name without `$`.
    Variable,
    /// A bare label used as a name; value is the text.
    IdentifierString,
    /// The variable name between `${` and `}`; value is the text.
    StringVarname,
    /// A numeric index inside a string variable offset; value is raw text.
    NumString,
    /// Signed 64-bit integer literal.
    IntegerLiteral,
    /// Double literal.
    DoubleLiteral,
    /// Single-quoted or anchor-free double-quoted string; value is the
    /// unescaped body.
    StringLiteral,
    /// A run of interpolated-string or heredoc body text.
    EncapsedAndWhitespace,

    // === String machinery ===
    /// A `"` that opens or closes an interpolated double-quoted string.
    DoubleQuote,
    /// A `` ` `` that opens or closes a backquoted command string.
    Backquote,
    /// `<<<LABEL` heredoc/nowdoc header, including its newline.
    StartHeredoc,
    /// The closing label line of a heredoc/nowdoc.
    EndHeredoc,
    /// `${` opening a brace-enclosed variable interpolation.
    DollarOpenCurlyBraces,
    /// The `{` of a `{$…}` interpolation.
    CurlyOpen,

    // === Keywords ===
    /// `abstract`
    Abstract,
    /// `and`
    LogicalAnd,
    /// `array`
    Array,
    /// `as`
    As,
    /// `break`
    Break,
    /// `callable`
    Callable,
    /// `case`
    Case,
    /// `catch`
    Catch,
    /// `class`
    Class,
    /// `clone`
    Clone,
    /// `const`
    Const,
    /// `continue`
    Continue,
    /// `declare`
    Declare,
    /// `default`
    Default,
    /// `do`
    Do,
    /// `echo`
    Echo,
    /// `else`
    Else,
    /// `elseif`
    Elseif,
    /// `empty`
    Empty,
    /// `enddeclare`
    Enddeclare,
    /// `endfor`
    Endfor,
    /// `endforeach`
    Endforeach,
    /// `endif`
    Endif,
    /// `endswitch`
    Endswitch,
    /// `endwhile`
    Endwhile,
    /// `eval`
    Eval,
    /// `exit` or `die`
    Exit,
    /// `extends`
    Extends,
    /// `final`
    Final,
    /// `finally`
    Finally,
    /// `fn`
    Fn,
    /// `for`
    For,
    /// `foreach`
    Foreach,
    /// `function`
    Function,
    /// `global`
    Global,
    /// `goto`
    Goto,
    /// `if`
    If,
    /// `implements`
    Implements,
    /// `include`
    Include,
    /// `include_once`
    IncludeOnce,
    /// `instanceof`
    Instanceof,
    /// `insteadof`
    Insteadof,
    /// `interface`
    Interface,
    /// `isset`
    Isset,
    /// `list`
    List,
    /// `namespace`
    Namespace,
    /// `new`
    New,
    /// `or`
    LogicalOr,
    /// `print`
    Print,
    /// `private`
    Private,
    /// `protected`
    Protected,
    /// `public`
    Public,
    /// `require`
    Require,
    /// `require_once`
    RequireOnce,
    /// `return`
    Return,
    /// `static`
    Static,
    /// `switch`
    Switch,
    /// `throw`
    Throw,
    /// `trait`
    Trait,
    /// `try`
    Try,
    /// `unset`
    Unset,
    /// `use`
    Use,
    /// `var`
    Var,
    /// `while`
    While,
    /// `xor`
    LogicalXor,
    /// `yield`
    Yield,
    /// `__class__`
    MagicClass,
    /// `__dir__`
    MagicDir,
    /// `__file__`
    MagicFile,
    /// `__function__`
    MagicFunction,
    /// `__line__`
    MagicLine,
    /// `__method__`
    MagicMethod,
    /// `__namespace__`
    MagicNamespace,
    /// `__trait__`
    MagicTrait,

    // === Casts ===
    /// `(int)` / `(integer)`
    IntCast,
    /// `(float)` / `(double)` / `(real)`
    DoubleCast,
    /// `(string)` / `(binary)`
    StringCast,
    /// `(array)`
    ArrayCast,
    /// `(object)`
    ObjectCast,
    /// `(bool)` / `(boolean)`
    BoolCast,
    /// `(unset)`
    UnsetCast,

    // === Operators ===
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `=`
    Equals,
    /// `+=`
    PlusEqual,
    /// `-=`
    MinusEqual,
    /// `*=`
    MulEqual,
    /// `/=`
    DivEqual,
    /// `.=`
    ConcatEqual,
    /// `%=`
    ModEqual,
    /// `**=`
    PowEqual,
    /// `&=`
    AndEqual,
    /// `|=`
    OrEqual,
    /// `^=`
    XorEqual,
    /// `<<=`
    ShiftLeftEqual,
    /// `>>=`
    ShiftRightEqual,
    /// `??=`
    CoalesceEqual,
    /// `&&`
    BooleanAnd,
    /// `||`
    BooleanOr,
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `!`
    Exclamation,
    /// `==`
    IsEqual,
    /// `!=` or `<>`
    IsNotEqual,
    /// `===`
    IsIdentical,
    /// `!==`
    IsNotIdentical,
    /// `<`
    Smaller,
    /// `<=`
    IsSmallerOrEqual,
    /// `>`
    Greater,
    /// `>=`
    IsGreaterOrEqual,
    /// `<=>`
    Spaceship,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `++`
    Inc,
    /// `--`
    Dec,
    /// `->`
    ObjectOperator,
    /// `=>`
    DoubleArrow,
    /// `::`
    DoubleColon,
    /// `??`
    Coalesce,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `...`
    Ellipsis,
    /// `@`
    At,
    /// `$`
    Dollar,
    /// `\`
    Backslash,

    // === Delimiters ===
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
}

impl TokenKind {
    /// A human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::EndOfFile => "end of file",
            Self::Error => "error",
            Self::CodeCompletion => "code completion",
            Self::Comment => "comment",
            Self::DocComment => "doc comment",
            Self::OpenTag => "open tag",
            Self::CloseTag => "close tag",
            Self::Variable => "variable",
            Self::IdentifierString => "identifier",
            Self::StringVarname => "variable name",
            Self::NumString => "number",
            Self::IntegerLiteral => "integer literal",
            Self::DoubleLiteral => "double literal",
            Self::StringLiteral => "string literal",
            Self::EncapsedAndWhitespace => "string content",
            Self::DoubleQuote => "`\"`",
            Self::Backquote => "backquote",
            Self::StartHeredoc => "heredoc start",
            Self::EndHeredoc => "heredoc end",
            Self::DollarOpenCurlyBraces => "`${`",
            Self::CurlyOpen => "`{$`",
            Self::IntCast => "`(int)`",
            Self::DoubleCast => "`(float)`",
            Self::StringCast => "`(string)`",
            Self::ArrayCast => "`(array)`",
            Self::ObjectCast => "`(object)`",
            Self::BoolCast => "`(bool)`",
            Self::UnsetCast => "`(unset)`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Mul => "`*`",
            Self::Div => "`/`",
            Self::Mod => "`%`",
            Self::Pow => "`**`",
            Self::Equals => "`=`",
            Self::PlusEqual => "`+=`",
            Self::MinusEqual => "`-=`",
            Self::MulEqual => "`*=`",
            Self::DivEqual => "`/=`",
            Self::ConcatEqual => "`.=`",
            Self::ModEqual => "`%=`",
            Self::PowEqual => "`**=`",
            Self::AndEqual => "`&=`",
            Self::OrEqual => "`|=`",
            Self::XorEqual => "`^=`",
            Self::ShiftLeftEqual => "`<<=`",
            Self::ShiftRightEqual => "`>>=`",
            Self::CoalesceEqual => "`??=`",
            Self::BooleanAnd => "`&&`",
            Self::BooleanOr => "`||`",
            Self::Ampersand => "`&`",
            Self::Pipe => "`|`",
            Self::Caret => "`^`",
            Self::Tilde => "`~`",
            Self::Exclamation => "`!`",
            Self::IsEqual => "`==`",
            Self::IsNotEqual => "`!=`",
            Self::IsIdentical => "`===`",
            Self::IsNotIdentical => "`!==`",
            Self::Smaller => "`<`",
            Self::IsSmallerOrEqual => "`<=`",
            Self::Greater => "`>`",
            Self::IsGreaterOrEqual => "`>=`",
            Self::Spaceship => "`<=>`",
            Self::ShiftLeft => "`<<`",
            Self::ShiftRight => "`>>`",
            Self::Inc => "`++`",
            Self::Dec => "`--`",
            Self::ObjectOperator => "`->`",
            Self::DoubleArrow => "`=>`",
            Self::DoubleColon => "`::`",
            Self::Coalesce => "`??`",
            Self::Question => "`?`",
            Self::Colon => "`:`",
            Self::Dot => "`.`",
            Self::Ellipsis => "`...`",
            Self::At => "`@`",
            Self::Dollar => "`$`",
            Self::Backslash => "`\\`",
            Self::LeftParen => "`(`",
            Self::RightParen => "`)`",
            Self::LeftBracket => "`[`",
            Self::RightBracket => "`]`",
            Self::LeftBrace => "`{`",
            Self::RightBrace => "`}`",
            Self::Comma => "`,`",
            Self::Semicolon => "`;`",
            // Keywords read as their lexeme.
            other => keyword_name(other),
        }
    }
}

fn keyword_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Abstract => "`abstract`",
        TokenKind::LogicalAnd => "`and`",
        TokenKind::Array => "`array`",
        TokenKind::As => "`as`",
        TokenKind::Break => "`break`",
        TokenKind::Callable => "`callable`",
        TokenKind::Case => "`case`",
        TokenKind::Catch => "`catch`",
        TokenKind::Class => "`class`",
        TokenKind::Clone => "`clone`",
        TokenKind::Const => "`const`",
        TokenKind::Continue => "`continue`",
        TokenKind::Declare => "`declare`",
        TokenKind::Default => "`default`",
        TokenKind::Do => "`do`",
        TokenKind::Echo => "`echo`",
        TokenKind::Else => "`else`",
        TokenKind::Elseif => "`elseif`",
        TokenKind::Empty => "`empty`",
        TokenKind::Enddeclare => "`enddeclare`",
        TokenKind::Endfor => "`endfor`",
        TokenKind::Endforeach => "`endforeach`",
        TokenKind::Endif => "`endif`",
        TokenKind::Endswitch => "`endswitch`",
        TokenKind::Endwhile => "`endwhile`",
        TokenKind::Eval => "`eval`",
        TokenKind::Exit => "`exit`",
        TokenKind::Extends => "`extends`",
        TokenKind::Final => "`final`",
        TokenKind::Finally => "`finally`",
        TokenKind::Fn => "`fn`",
        TokenKind::For => "`for`",
        TokenKind::Foreach => "`foreach`",
        TokenKind::Function => "`function`",
        TokenKind::Global => "`global`",
        TokenKind::Goto => "`goto`",
        TokenKind::If => "`if`",
        TokenKind::Implements => "`implements`",
        TokenKind::Include => "`include`",
        TokenKind::IncludeOnce => "`include_once`",
        TokenKind::Instanceof => "`instanceof`",
        TokenKind::Insteadof => "`insteadof`",
        TokenKind::Interface => "`interface`",
        TokenKind::Isset => "`isset`",
        TokenKind::List => "`list`",
        TokenKind::Namespace => "`namespace`",
        TokenKind::New => "`new`",
        TokenKind::LogicalOr => "`or`",
        TokenKind::Print => "`print`",
        TokenKind::Private => "`private`",
        TokenKind::Protected => "`protected`",
        TokenKind::Public => "`public`",
        TokenKind::Require => "`require`",
        TokenKind::RequireOnce => "`require_once`",
        TokenKind::Return => "`return`",
        TokenKind::Static => "`static`",
        TokenKind::Switch => "`switch`",
        TokenKind::Throw => "`throw`",
        TokenKind::Trait => "`trait`",
        TokenKind::Try => "`try`",
        TokenKind::Unset => "`unset`",
        TokenKind::Use => "`use`",
        TokenKind::Var => "`var`",
        TokenKind::While => "`while`",
        TokenKind::LogicalXor => "`xor`",
        TokenKind::Yield => "`yield`",
        TokenKind::MagicClass => "`__class__`",
        TokenKind::MagicDir => "`__dir__`",
        TokenKind::MagicFile => "`__file__`",
        TokenKind::MagicFunction => "`__function__`",
        TokenKind::MagicLine => "`__line__`",
        TokenKind::MagicMethod => "`__method__`",
        TokenKind::MagicNamespace => "`__namespace__`",
        TokenKind::MagicTrait => "`__trait__`",
        _ => "token",
    }
}

/// Semantic value attached to a token.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TokenValue {
    /// No semantic value.
    #[default]
    None,
    /// Signed 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Double(f64),
    /// A byte string (string values are bytes: `\xFF` yields a raw byte).
    Str(Box<[u8]>),
}

impl TokenValue {
    /// The integer value, if present.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The double value, if present.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// The string value, if present.
    pub fn as_str_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// A lexed token with attached trivia.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Token {
    kind: TokenKind,
    span: Span,
    value: TokenValue,
    leading_trivia: ParsedTrivia,
    trailing_trivia: ParsedTrivia,
    at_start_of_line: bool,
    invalid_lex_value: bool,
    needs_overflow_correction: bool,
    /// Length from the first attached comment to the token text; 0 when no
    /// comment is attached.
    comment_length: u32,
}

impl Default for TokenKind {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Token {
    /// The token's kind.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Returns `true` if the kind matches.
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// The token's source span (trivia excluded).
    pub fn span(&self) -> Span {
        self.span
    }

    /// Length of the token text in bytes.
    pub fn len(&self) -> u32 {
        self.span.len()
    }

    /// Returns `true` for zero-length tokens (only `EndOfFile` and
    /// `CodeCompletion`).
    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    /// The semantic value.
    pub fn value(&self) -> &TokenValue {
        &self.value
    }

    /// Leading trivia, in source order.
    pub fn leading_trivia(&self) -> &ParsedTrivia {
        &self.leading_trivia
    }

    /// Trailing trivia, in source order.
    pub fn trailing_trivia(&self) -> &ParsedTrivia {
        &self.trailing_trivia
    }

    /// Returns `true` if this token is the first on its line.
    pub fn is_at_start_of_line(&self) -> bool {
        self.at_start_of_line
    }

    /// Returns `true` if the literal's value could not be lexed and no
    /// semantic value was stored.
    pub fn has_invalid_lex_value(&self) -> bool {
        self.invalid_lex_value
    }

    /// Returns `true` if this literal is the magnitude of `i64::MIN` and
    /// the parser should fold the preceding unary minus into it.
    pub fn needs_overflow_correction(&self) -> bool {
        self.needs_overflow_correction
    }

    /// Span from the first attached comment to the token start, when
    /// comment attachment recorded one.
    pub fn comment_range(&self) -> Option<Span> {
        if self.comment_length == 0 {
            None
        } else {
            Some(Span::new(self.span.start - self.comment_length, self.span.start))
        }
    }

    pub(crate) fn set_token(&mut self, kind: TokenKind, span: Span, comment_length: u32) {
        self.kind = kind;
        self.span = span;
        self.comment_length = comment_length;
    }

    pub(crate) fn set_kind(&mut self, kind: TokenKind) {
        self.kind = kind;
    }

    pub(crate) fn set_value(&mut self, value: TokenValue) {
        self.value = value;
    }

    pub(crate) fn reset_value(&mut self) {
        self.value = TokenValue::None;
        self.invalid_lex_value = false;
        self.needs_overflow_correction = false;
    }

    pub(crate) fn set_at_start_of_line(&mut self, v: bool) {
        self.at_start_of_line = v;
    }

    pub(crate) fn set_invalid_lex_value(&mut self, v: bool) {
        self.invalid_lex_value = v;
    }

    pub(crate) fn set_needs_overflow_correction(&mut self, v: bool) {
        self.needs_overflow_correction = v;
    }

    pub(crate) fn set_leading_trivia(&mut self, trivia: ParsedTrivia) {
        self.leading_trivia = trivia;
    }

    pub(crate) fn set_trailing_trivia(&mut self, trivia: ParsedTrivia) {
        self.trailing_trivia = trivia;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trivia::TriviaKind;

    #[test]
    fn default_token_is_unknown() {
        let token = Token::default();
        assert!(token.is(TokenKind::Unknown));
        assert!(token.is_empty());
        assert_eq!(*token.value(), TokenValue::None);
    }

    #[test]
    fn set_token_records_span_and_kind() {
        let mut token = Token::default();
        token.set_token(TokenKind::Variable, Span::new(4, 6), 0);
        assert!(token.is(TokenKind::Variable));
        assert_eq!(token.len(), 2);
        assert_eq!(token.comment_range(), None);
    }

    #[test]
    fn comment_range_points_before_token() {
        let mut token = Token::default();
        token.set_token(TokenKind::If, Span::new(10, 12), 8);
        assert_eq!(token.comment_range(), Some(Span::new(2, 10)));
    }

    #[test]
    fn value_accessors() {
        assert_eq!(TokenValue::Int(7).as_int(), Some(7));
        assert_eq!(TokenValue::Double(1.5).as_double(), Some(1.5));
        assert_eq!(
            TokenValue::Str(Box::from(*b"ok")).as_str_bytes(),
            Some(b"ok".as_slice())
        );
        assert_eq!(TokenValue::None.as_int(), None);
    }

    #[test]
    fn reset_value_clears_flags() {
        let mut token = Token::default();
        token.set_value(TokenValue::Int(3));
        token.set_invalid_lex_value(true);
        token.set_needs_overflow_correction(true);
        token.reset_value();
        assert_eq!(*token.value(), TokenValue::None);
        assert!(!token.has_invalid_lex_value());
        assert!(!token.needs_overflow_correction());
    }

    #[test]
    fn trivia_attachment() {
        let mut token = Token::default();
        let mut leading = ParsedTrivia::new();
        leading.append_or_squash(TriviaKind::Newline, 1);
        token.set_leading_trivia(leading);
        token.set_at_start_of_line(true);
        assert!(token.leading_trivia().contains_newline());
        assert!(token.is_at_start_of_line());
        assert!(token.trailing_trivia().is_empty());
    }

    #[test]
    fn kind_names() {
        assert_eq!(TokenKind::ObjectOperator.name(), "`->`");
        assert_eq!(TokenKind::Echo.name(), "`echo`");
        assert_eq!(TokenKind::EndOfFile.name(), "end of file");
        assert_eq!(TokenKind::EncapsedAndWhitespace.name(), "string content");
    }
}
