//! End-to-end lexing scenarios and the universal invariants.

use crate::{
    tokenize, tokenize_all, BufferId, Lexer, LexerOptions, SourceManager, Token, TokenKind,
    TokenValue, TriviaKind,
};

fn manager(source: &[u8]) -> (SourceManager, BufferId) {
    let mut sm = SourceManager::new();
    let id = sm.add_buffer(source);
    (sm, id)
}

fn kinds(source: &[u8]) -> Vec<TokenKind> {
    kinds_with(source, LexerOptions::default())
}

fn kinds_with(source: &[u8], opts: LexerOptions) -> Vec<TokenKind> {
    let (sm, id) = manager(source);
    tokenize(&sm, id, opts).iter().map(Token::kind).collect()
}

fn tokens_with(source: &[u8], opts: LexerOptions) -> Vec<Token> {
    let (sm, id) = manager(source);
    tokenize(&sm, id, opts)
}

fn heredoc_opts() -> LexerOptions {
    LexerOptions {
        check_heredoc_indentation: true,
        ..LexerOptions::default()
    }
}

fn all_tokens_with_trivia(source: &[u8]) -> Vec<Token> {
    let (sm, id) = manager(source);
    let mut out = Vec::new();
    tokenize_all(&sm, id, heredoc_opts().with_trivia(), |_, token| out.push(token.clone()));
    out
}

/// Reassemble the source from trivia and token spans.
fn render(tokens: &[Token], source: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for token in tokens {
        token.leading_trivia().write_bytes(&mut out);
        let span = token.span();
        out.extend_from_slice(&source[span.start as usize..span.end as usize]);
        token.trailing_trivia().write_bytes(&mut out);
    }
    out
}

fn str_value(token: &Token) -> &[u8] {
    token.value().as_str_bytes().expect("expected a string value")
}

// === End-to-end scenarios ===

#[test]
fn scenario_open_tag_assignment() {
    let source = b"<?php $x = 1;";
    assert_eq!(
        kinds(source),
        [
            TokenKind::OpenTag,
            TokenKind::Variable,
            TokenKind::Equals,
            TokenKind::IntegerLiteral,
            TokenKind::Semicolon,
        ]
    );
    let tokens = tokens_with(source, LexerOptions::default());
    assert_eq!(str_value(&tokens[1]), b"x");
    assert_eq!(tokens[3].value().as_int(), Some(1));
}

#[test]
fn scenario_hex_overflow_to_double() {
    let tokens = tokens_with(b"0xFFFFFFFFFFFFFFFF", LexerOptions::default());
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is(TokenKind::DoubleLiteral));
    assert_eq!(tokens[0].value().as_double(), Some(1.844_674_407_370_955_2e19));
    assert!(!tokens[0].needs_overflow_correction());
}

#[test]
fn scenario_min_i64_overflow_correction() {
    let tokens = tokens_with(b"-9223372036854775808", LexerOptions::default());
    assert_eq!(tokens[0].kind(), TokenKind::Minus);
    assert_eq!(tokens[1].kind(), TokenKind::DoubleLiteral);
    assert!(tokens[1].needs_overflow_correction());
    assert_eq!(tokens[1].value().as_double(), Some(2f64.powi(63)));
}

#[test]
fn hex_min_i64_overflow_correction() {
    let tokens = tokens_with(b"-0x8000000000000000", LexerOptions::default());
    assert_eq!(tokens[1].kind(), TokenKind::DoubleLiteral);
    assert!(tokens[1].needs_overflow_correction());
}

#[test]
fn overflow_without_minus_has_no_correction() {
    let tokens = tokens_with(b"9223372036854775808", LexerOptions::default());
    assert_eq!(tokens[0].kind(), TokenKind::DoubleLiteral);
    assert!(!tokens[0].needs_overflow_correction());
}

#[test]
fn scenario_heredoc_with_interpolation() {
    let source = b"<<<EOT\n  hello $name\n  EOT\n";
    let tokens = tokens_with(source, heredoc_opts());
    let token_kinds: Vec<TokenKind> = tokens.iter().map(Token::kind).collect();
    assert_eq!(
        token_kinds,
        [
            TokenKind::StartHeredoc,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::Variable,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::EndHeredoc,
        ]
    );
    // The measured two-space indentation is stripped from the body.
    assert_eq!(str_value(&tokens[1]), b"hello ");
    assert_eq!(str_value(&tokens[2]), b"name");
    assert_eq!(str_value(&tokens[3]), b"\n");
    // The end marker consumes its indentation plus the label.
    assert_eq!(tokens[4].len(), 5);
}

#[test]
fn scenario_nowdoc_mixed_closing_indentation() {
    // Body indented with spaces, closing label with a tab.
    let source = b"<<<'EOT'\n  body\n\tEOT\n";
    let (sm, id) = manager(source);
    let mut lexer = Lexer::new(&sm, id, heredoc_opts());
    let mut token_kinds = Vec::new();
    loop {
        let token = lexer.lex_one();
        token_kinds.push(token.kind());
        if token.is(TokenKind::EndOfFile) {
            break;
        }
    }
    assert_eq!(
        token_kinds,
        [
            TokenKind::StartHeredoc,
            TokenKind::Error,
            TokenKind::EndHeredoc,
            TokenKind::EndOfFile,
        ]
    );
    assert!(lexer.is_lex_exception_occurred());
    assert_eq!(
        lexer.current_exception_message(),
        Some("Invalid indentation - tabs and spaces cannot be mixed")
    );
}

#[test]
fn scenario_single_quote_escapes() {
    let tokens = tokens_with(br"'a\'b'", LexerOptions::default());
    assert!(tokens[0].is(TokenKind::StringLiteral));
    assert_eq!(str_value(&tokens[0]), b"a'b");

    let tokens = tokens_with(br"'a\nb'", LexerOptions::default());
    assert_eq!(str_value(&tokens[0]), br"a\nb");
}

// === Boundary behaviors ===

#[test]
fn empty_buffer_yields_single_eof() {
    let (sm, id) = manager(b"");
    let lexer = Lexer::new(&sm, id, LexerOptions::default().with_trivia());
    let token = lexer.peek_next_token();
    assert!(token.is(TokenKind::EndOfFile));
    assert!(token.is_empty());
    assert!(token.leading_trivia().is_empty());
    assert!(token.is_at_start_of_line());
}

#[test]
fn bom_only_buffer_yields_eof_with_garbage_trivia() {
    let (sm, id) = manager(b"\xEF\xBB\xBF");
    let lexer = Lexer::new(&sm, id, LexerOptions::default().with_trivia());
    let token = lexer.peek_next_token();
    assert!(token.is(TokenKind::EndOfFile));
    let pieces = token.leading_trivia().pieces();
    assert_eq!(pieces.len(), 1);
    assert_eq!(pieces[0].kind(), TriviaKind::GarbageText);
    assert_eq!(pieces[0].len(), 3);
}

#[test]
fn unterminated_string_yields_one_recovery_token() {
    let tokens = tokens_with(b"'abc", LexerOptions::default());
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is(TokenKind::EncapsedAndWhitespace));
    assert_eq!(str_value(&tokens[0]), b"abc");
}

#[test]
fn unterminated_heredoc_recovers() {
    let tokens = tokens_with(b"<<<EOT\nabc", heredoc_opts());
    let token_kinds: Vec<TokenKind> = tokens.iter().map(Token::kind).collect();
    assert_eq!(token_kinds, [TokenKind::StartHeredoc, TokenKind::EncapsedAndWhitespace]);
    assert_eq!(str_value(&tokens[1]), b"abc");
}

// === Numbers ===

#[test]
fn integer_forms() {
    let tokens = tokens_with(b"42 0777 0x1A 0b101", LexerOptions::default());
    assert_eq!(tokens[0].value().as_int(), Some(42));
    assert_eq!(tokens[1].value().as_int(), Some(511));
    assert_eq!(tokens[2].value().as_int(), Some(26));
    assert_eq!(tokens[3].value().as_int(), Some(5));
}

#[test]
fn double_forms() {
    let tokens = tokens_with(b"1.5 .5 1. 2.5e10 1e3", LexerOptions::default());
    for token in &tokens {
        assert!(token.is(TokenKind::DoubleLiteral), "got {:?}", token.kind());
    }
    assert_eq!(tokens[0].value().as_double(), Some(1.5));
    assert_eq!(tokens[1].value().as_double(), Some(0.5));
    assert_eq!(tokens[2].value().as_double(), Some(1.0));
    assert_eq!(tokens[3].value().as_double(), Some(2.5e10));
    assert_eq!(tokens[4].value().as_double(), Some(1000.0));
}

#[test]
fn exponent_without_digits_is_not_a_double() {
    let token_kinds = kinds(b"1e");
    assert_eq!(token_kinds, [TokenKind::IntegerLiteral, TokenKind::IdentifierString]);
}

#[test]
fn invalid_octal_sets_invalid_lex_value() {
    let (sm, id) = manager(b"019");
    let mut lexer = Lexer::new(&sm, id, LexerOptions::default());
    let token = lexer.lex_one();
    assert!(token.is(TokenKind::IntegerLiteral));
    assert!(token.has_invalid_lex_value());
    assert_eq!(token.value(), &TokenValue::None);
    assert!(lexer.is_lex_exception_occurred());
    assert_eq!(lexer.current_exception_message(), Some("Invalid numeric literal"));
}

#[test]
fn invalid_octal_in_parse_mode_is_error_token() {
    let opts = LexerOptions {
        parse_mode: true,
        ..LexerOptions::default()
    };
    let tokens = tokens_with(b"019", opts);
    assert!(tokens[0].is(TokenKind::Error));
    assert_eq!(str_value(&tokens[0]), b"Invalid numeric literal");
}

#[test]
fn binary_stops_at_invalid_digit() {
    let tokens = tokens_with(b"0b012", LexerOptions::default());
    assert_eq!(tokens[0].value().as_int(), Some(1));
    assert_eq!(tokens[1].value().as_int(), Some(2));
}

// === Strings and interpolation ===

#[test]
fn complete_double_quoted_string() {
    let tokens = tokens_with(br#""say \"hi\"\n""#, LexerOptions::default());
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is(TokenKind::StringLiteral));
    assert_eq!(str_value(&tokens[0]), b"say \"hi\"\n");
}

#[test]
fn interpolated_double_quoted_string() {
    let tokens = tokens_with(br#""a $b c""#, LexerOptions::default());
    let token_kinds: Vec<TokenKind> = tokens.iter().map(Token::kind).collect();
    assert_eq!(
        token_kinds,
        [
            TokenKind::DoubleQuote,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::Variable,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::DoubleQuote,
        ]
    );
    assert_eq!(str_value(&tokens[1]), b"a ");
    assert_eq!(str_value(&tokens[2]), b"b");
    assert_eq!(str_value(&tokens[3]), b" c");
}

#[test]
fn dollar_open_curly_interpolation() {
    let token_kinds = kinds(br#""${x}""#);
    assert_eq!(
        token_kinds,
        [
            TokenKind::DoubleQuote,
            TokenKind::DollarOpenCurlyBraces,
            TokenKind::StringVarname,
            TokenKind::RightBrace,
            TokenKind::DoubleQuote,
        ]
    );
}

#[test]
fn curly_open_interpolation() {
    let token_kinds = kinds(br#""{$x}""#);
    assert_eq!(
        token_kinds,
        [
            TokenKind::DoubleQuote,
            TokenKind::CurlyOpen,
            TokenKind::Variable,
            TokenKind::RightBrace,
            TokenKind::DoubleQuote,
        ]
    );
}

#[test]
fn variable_offset_in_string() {
    let token_kinds = kinds(br#""$a[0]""#);
    assert_eq!(
        token_kinds,
        [
            TokenKind::DoubleQuote,
            TokenKind::Variable,
            TokenKind::LeftBracket,
            TokenKind::NumString,
            TokenKind::RightBracket,
            TokenKind::DoubleQuote,
        ]
    );
}

#[test]
fn property_access_in_string() {
    let token_kinds = kinds(br#""$a->b c""#);
    assert_eq!(
        token_kinds,
        [
            TokenKind::DoubleQuote,
            TokenKind::Variable,
            TokenKind::ObjectOperator,
            TokenKind::IdentifierString,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::DoubleQuote,
        ]
    );
}

#[test]
fn lone_dollar_is_string_text() {
    let tokens = tokens_with(br#""a $ b""#, LexerOptions::default());
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is(TokenKind::StringLiteral));
    assert_eq!(str_value(&tokens[0]), b"a $ b");
}

#[test]
fn backquoted_command() {
    let tokens = tokens_with(b"`ls $dir`", LexerOptions::default());
    let token_kinds: Vec<TokenKind> = tokens.iter().map(Token::kind).collect();
    assert_eq!(
        token_kinds,
        [
            TokenKind::Backquote,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::Variable,
            TokenKind::Backquote,
        ]
    );
    assert_eq!(str_value(&tokens[1]), b"ls ");
}

#[test]
fn binary_string_prefix() {
    let tokens = tokens_with(br"b'x'", LexerOptions::default());
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is(TokenKind::StringLiteral));
    assert_eq!(str_value(&tokens[0]), b"x");
    assert_eq!(tokens[0].len(), 4);

    // An interpolated b"…" keeps the prefix inside the quote token.
    let tokens = tokens_with(br#"b"$x""#, LexerOptions::default());
    assert!(tokens[0].is(TokenKind::DoubleQuote));
    assert_eq!(tokens[0].len(), 2);

    // The prefix is case-insensitive.
    let tokens = tokens_with(br"B'x'", LexerOptions::default());
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is(TokenKind::StringLiteral));
    assert_eq!(str_value(&tokens[0]), b"x");

    let tokens = tokens_with(br#"B"y""#, LexerOptions::default());
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is(TokenKind::StringLiteral));
    assert_eq!(str_value(&tokens[0]), b"y");
    assert_eq!(tokens[0].len(), 4);

    let token_kinds = kinds_with(b"B<<<EOT\nhi\nEOT\n", heredoc_opts());
    assert_eq!(
        token_kinds,
        [
            TokenKind::StartHeredoc,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::EndHeredoc,
        ]
    );
}

#[test]
fn code_point_escape_error_in_parse_mode() {
    let opts = LexerOptions {
        parse_mode: true,
        ..LexerOptions::default()
    };
    let tokens = tokens_with(br#""\u{zz}""#, opts);
    assert!(tokens[0].is(TokenKind::Error));
}

// === Heredoc details ===

#[test]
fn empty_heredoc() {
    let tokens = tokens_with(b"<<<EOT\nEOT\n", heredoc_opts());
    let token_kinds: Vec<TokenKind> = tokens.iter().map(Token::kind).collect();
    assert_eq!(
        token_kinds,
        [
            TokenKind::StartHeredoc,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::EndHeredoc,
        ]
    );
    assert!(tokens[1].is_empty());
    assert_eq!(str_value(&tokens[1]), b"");
}

#[test]
fn nowdoc_does_not_interpolate() {
    let tokens = tokens_with(b"<<<'EOT'\n$x\nEOT\n", heredoc_opts());
    let token_kinds: Vec<TokenKind> = tokens.iter().map(Token::kind).collect();
    assert_eq!(
        token_kinds,
        [
            TokenKind::StartHeredoc,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::EndHeredoc,
        ]
    );
    assert_eq!(str_value(&tokens[1]), b"$x\n");
}

#[test]
fn quoted_heredoc_label() {
    let token_kinds = kinds_with(b"<<<\"EOT\"\nhi\nEOT\n", heredoc_opts());
    assert_eq!(
        token_kinds,
        [
            TokenKind::StartHeredoc,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::EndHeredoc,
        ]
    );
}

#[test]
fn heredoc_label_prefix_is_body_text() {
    // EOTX is not the end marker EOT.
    let tokens = tokens_with(b"<<<EOT\nEOTX\nEOT\n", heredoc_opts());
    assert_eq!(str_value(&tokens[1]), b"EOTX\n");
    assert!(tokens[2].is(TokenKind::EndHeredoc));
}

#[test]
fn nested_heredoc_in_interpolation() {
    let source = b"<<<A\n{$x}\nA\n";
    let token_kinds = kinds_with(source, heredoc_opts());
    assert_eq!(
        token_kinds,
        [
            TokenKind::StartHeredoc,
            TokenKind::CurlyOpen,
            TokenKind::Variable,
            TokenKind::RightBrace,
            TokenKind::EncapsedAndWhitespace,
            TokenKind::EndHeredoc,
        ]
    );
}

#[test]
fn heredoc_without_indentation_check_keeps_raw_body() {
    let tokens = tokens_with(b"<<<EOT\n  x\n  EOT\n", LexerOptions::default());
    assert_eq!(str_value(&tokens[1]), b"  x\n");
}

#[test]
fn shift_operators_are_not_heredoc() {
    assert_eq!(kinds(b"1 << 2"), [
        TokenKind::IntegerLiteral,
        TokenKind::ShiftLeft,
        TokenKind::IntegerLiteral,
    ]);
    assert_eq!(kinds(b"$a <<= 2"), [
        TokenKind::Variable,
        TokenKind::ShiftLeftEqual,
        TokenKind::IntegerLiteral,
    ]);
}

// === Keywords, casts, operators ===

#[test]
fn keywords_are_case_insensitive() {
    assert_eq!(kinds(b"echo ECHO Echo"), [TokenKind::Echo; 3]);
    assert_eq!(kinds(b"If elseIf ELSE"), [
        TokenKind::If,
        TokenKind::Elseif,
        TokenKind::Else,
    ]);
}

#[test]
fn identifiers_carry_their_text() {
    let tokens = tokens_with(b"foo_bar", LexerOptions::default());
    assert!(tokens[0].is(TokenKind::IdentifierString));
    assert_eq!(str_value(&tokens[0]), b"foo_bar");
}

#[test]
fn non_ascii_identifiers() {
    let tokens = tokens_with("中文名".as_bytes(), LexerOptions::default());
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is(TokenKind::IdentifierString));
}

#[test]
fn casts() {
    assert_eq!(kinds(b"(int)"), [TokenKind::IntCast]);
    assert_eq!(kinds(b"( string )"), [TokenKind::StringCast]);
    assert_eq!(kinds(b"(boolean)"), [TokenKind::BoolCast]);
    assert_eq!(
        kinds(b"(foo)"),
        [TokenKind::LeftParen, TokenKind::IdentifierString, TokenKind::RightParen]
    );
}

#[test]
fn compound_operators() {
    assert_eq!(kinds(b"<=>"), [TokenKind::Spaceship]);
    assert_eq!(kinds(b"**="), [TokenKind::PowEqual]);
    assert_eq!(kinds(b"??="), [TokenKind::CoalesceEqual]);
    assert_eq!(kinds(b"==="), [TokenKind::IsIdentical]);
    assert_eq!(kinds(b"!=="), [TokenKind::IsNotIdentical]);
    assert_eq!(kinds(b"<>"), [TokenKind::IsNotEqual]);
    assert_eq!(kinds(b"..."), [TokenKind::Ellipsis]);
    assert_eq!(kinds(b"?>"), [TokenKind::CloseTag]);
    assert_eq!(kinds(b"::"), [TokenKind::DoubleColon]);
}

#[test]
fn property_access_in_scripting() {
    assert_eq!(
        kinds(b"$a->b"),
        [TokenKind::Variable, TokenKind::ObjectOperator, TokenKind::IdentifierString]
    );
    // Whitespace is allowed around `->` in script code.
    assert_eq!(
        kinds(b"$a -> b"),
        [TokenKind::Variable, TokenKind::ObjectOperator, TokenKind::IdentifierString]
    );
}

// === Comments and trivia ===

#[test]
fn comments_fold_into_trivia_by_default() {
    let source = b"// note\n$x";
    let tokens = all_tokens_with_trivia(source);
    assert_eq!(tokens[0].kind(), TokenKind::Variable);
    let pieces = tokens[0].leading_trivia().pieces();
    assert_eq!(pieces[0].kind(), TriviaKind::LineComment);
    assert_eq!(pieces[0].text_bytes(), Some(b"// note".as_slice()));
    assert_eq!(pieces[1].kind(), TriviaKind::Newline);
}

#[test]
fn doc_comments_classified() {
    let tokens = all_tokens_with_trivia(b"/// doc\n/** block */\n$x");
    let pieces = tokens[0].leading_trivia().pieces();
    assert_eq!(pieces[0].kind(), TriviaKind::DocLineComment);
    assert_eq!(pieces[2].kind(), TriviaKind::DocBlockComment);
}

#[test]
fn comments_as_tokens() {
    let opts = LexerOptions::default().keep_comments();
    assert_eq!(
        kinds_with(b"// a\n/* b */ $x", opts),
        [TokenKind::Comment, TokenKind::Comment, TokenKind::Variable]
    );
    assert_eq!(
        kinds_with(b"/// a\n$x", opts),
        [TokenKind::DocComment, TokenKind::Variable]
    );
}

#[test]
fn comment_attachment_records_range() {
    let opts = LexerOptions {
        comment_retention: crate::CommentRetentionMode::AttachToNext,
        ..LexerOptions::default()
    };
    let (sm, id) = manager(b"/* c */ $x");
    let lexer = Lexer::new(&sm, id, opts);
    let token = lexer.peek_next_token();
    assert!(token.is(TokenKind::Variable));
    let range = token.comment_range().expect("comment range");
    assert_eq!(range.start, 0);
    assert_eq!(range.end, 8);
}

#[test]
fn trailing_trivia_stops_at_newline() {
    let tokens = all_tokens_with_trivia(b"$x  \n  $y");
    // The spaces after $x trail it; the newline leads $y.
    assert_eq!(tokens[0].trailing_trivia().len(), 2);
    assert!(tokens[1].leading_trivia().contains_newline());
    assert!(tokens[1].is_at_start_of_line());
}

#[test]
fn hashbang_is_garbage_trivia() {
    let tokens = all_tokens_with_trivia(b"#!/usr/bin/rill\n$x");
    assert_eq!(tokens[0].kind(), TokenKind::Variable);
    let pieces = tokens[0].leading_trivia().pieces();
    assert_eq!(pieces[0].kind(), TriviaKind::GarbageText);
    assert_eq!(pieces[0].text_bytes(), Some(b"#!/usr/bin/rill".as_slice()));
}

#[test]
fn embedded_null_is_diagnosed_garbage() {
    let source = b"a\0b";
    let (sm, id) = manager(source);
    let mut diags = Vec::new();
    let mut lexer = Lexer::new(&sm, id, LexerOptions::default().with_trivia())
        .with_diagnostic_handler(Box::new(|loc, diag| diags.push((loc, diag.clone()))));
    // Construction primed the first token before the handler existed;
    // re-prime so the diagnostics are observed.
    lexer.reset_to_offset(0);
    let first = lexer.lex_one();
    assert_eq!(first.kind(), TokenKind::IdentifierString);
    // The null byte trails the first token as garbage.
    let pieces = first.trailing_trivia().pieces();
    assert_eq!(pieces[0].kind(), TriviaKind::GarbageText);
    assert_eq!(lexer.lex_one().kind(), TokenKind::IdentifierString);
    drop(lexer);
    assert!(matches!(diags[0].1, crate::LexDiag::EmbeddedNull));
    assert_eq!(diags[0].0, sm.loc_for_offset(id, 1));
}

#[test]
fn confusable_character_diagnosed_with_suggestion() {
    let source = "a \u{2014} b".as_bytes(); // em dash
    let (sm, id) = manager(source);
    let mut diags = Vec::new();
    let mut lexer = Lexer::new(&sm, id, LexerOptions::default())
        .with_diagnostic_handler(Box::new(|_, diag| diags.push(diag.clone())));
    lexer.reset_to_offset(0);
    while !lexer.lex_one().is(TokenKind::EndOfFile) {}
    drop(lexer);
    assert!(diags
        .iter()
        .any(|d| matches!(d, crate::LexDiag::InvalidCharacter { .. })));
    assert!(diags.iter().any(|d| matches!(
        d,
        crate::LexDiag::ConfusableCharacter { suggestion: '-', .. }
    )));
}

#[test]
fn exception_handler_receives_message_and_code() {
    let (sm, id) = manager(b"019");
    let mut seen = Vec::new();
    let mut lexer = Lexer::new(&sm, id, LexerOptions::default())
        .with_exception_handler(Box::new(|msg, code| seen.push((msg.to_owned(), code))));
    lexer.reset_to_offset(0);
    drop(lexer);
    assert_eq!(seen, [("Invalid numeric literal".to_owned(), 1)]);
}

#[test]
fn identifier_and_operator_classification() {
    assert!(Lexer::is_identifier(b"foo_1"));
    assert!(Lexer::is_identifier("h\u{e9}llo".as_bytes()));
    assert!(!Lexer::is_identifier(b"1foo"));
    assert!(!Lexer::is_identifier(b""));
    assert!(Lexer::is_operator(b"<=>"));
    assert!(Lexer::is_operator(b"!"));
    assert!(!Lexer::is_operator(b"a+"));
    assert!(!Lexer::is_operator(b""));
}

#[test]
fn lex_one_with_trivia_hands_back_lists() {
    let (sm, id) = manager(b"  $x ");
    let mut lexer = Lexer::new(&sm, id, LexerOptions::default().with_trivia());
    let (token, leading, trailing) = lexer.lex_one_with_trivia();
    assert!(token.is(TokenKind::Variable));
    assert_eq!(leading.len(), 2);
    assert_eq!(trailing.len(), 1);
}

#[test]
fn code_completion_anchor_token() {
    let opts = LexerOptions {
        code_completion_offset: Some(2),
        ..LexerOptions::default()
    };
    assert_eq!(
        kinds_with(b"ab\0cd", opts),
        [
            TokenKind::IdentifierString,
            TokenKind::CodeCompletion,
            TokenKind::IdentifierString,
        ]
    );
}

// === State save/restore and lookahead ===

#[test]
fn peek_does_not_advance() {
    let (sm, id) = manager(b"$a $b");
    let mut lexer = Lexer::new(&sm, id, LexerOptions::default());
    assert_eq!(lexer.peek_next_token().kind(), TokenKind::Variable);
    assert_eq!(lexer.peek_next_token().kind(), TokenKind::Variable);
    let first = lexer.lex_one();
    assert_eq!(str_value(&first), b"a");
}

#[test]
fn save_restore_is_idempotent() {
    let (sm, id) = manager(b"<?php $x = 1 + 2; echo \"v $x\";");
    let opts = LexerOptions::default().with_trivia();
    let mut lexer = Lexer::new(&sm, id, opts);
    lexer.lex_one();
    lexer.lex_one();

    let state = lexer.save_state();
    let mut first_run = Vec::new();
    loop {
        let token = lexer.lex_one();
        let done = token.is(TokenKind::EndOfFile);
        first_run.push(token);
        if done {
            break;
        }
    }

    lexer.restore_state(&state, false);
    let mut second_run = Vec::new();
    loop {
        let token = lexer.lex_one();
        let done = token.is(TokenKind::EndOfFile);
        second_run.push(token);
        if done {
            break;
        }
    }
    assert_eq!(first_run, second_run);
}

#[test]
fn save_restore_across_heredoc() {
    let (sm, id) = manager(b"<<<EOT\n  a $v\n  EOT\n;");
    let mut lexer = Lexer::new(&sm, id, heredoc_opts());
    let state = lexer.save_state();
    let first: Vec<TokenKind> = std::iter::from_fn(|| {
        let t = lexer.lex_one();
        (!t.is(TokenKind::EndOfFile)).then_some(t.kind())
    })
    .collect();
    lexer.restore_state(&state, false);
    let second: Vec<TokenKind> = std::iter::from_fn(|| {
        let t = lexer.lex_one();
        (!t.is(TokenKind::EndOfFile)).then_some(t.kind())
    })
    .collect();
    assert_eq!(first, second);
}

#[test]
fn reset_to_offset_relexes() {
    let (sm, id) = manager(b"$a $b $c");
    let mut lexer = Lexer::new(&sm, id, LexerOptions::default());
    lexer.lex_one();
    lexer.lex_one();
    lexer.reset_to_offset(0);
    assert_eq!(str_value(lexer.peek_next_token()), b"a");
}

#[test]
fn sub_range_lexing_stops_at_artificial_end() {
    let (sm, id) = manager(b"$a $b $c");
    // Lex only "$b".
    let mut lexer = Lexer::with_range(&sm, id, LexerOptions::default(), 3, 5);
    let token = lexer.lex_one();
    assert_eq!(str_value(&token), b"b");
    assert!(lexer.lex_one().is(TokenKind::EndOfFile));
}

// === Location queries ===

#[test]
fn token_at_location() {
    let source = b"echo $name;";
    let (sm, id) = manager(source);
    let loc = sm.loc_for_offset(id, 5);
    let token = crate::get_token_at_location(&sm, loc);
    assert!(token.is(TokenKind::Variable));
    assert_eq!(crate::get_loc_for_end_of_token(&sm, loc), loc.advanced_by(5));
}

#[test]
fn loc_for_start_of_token_rescans_line() {
    let source = b"$a = 123;";
    let (sm, id) = manager(source);
    // Offset inside "123".
    let loc = crate::get_loc_for_start_of_token(&sm, id, 6);
    assert_eq!(sm.offset_of_loc(loc, id), 5);
    // Offset on whitespace comes back unchanged.
    let ws = crate::get_loc_for_start_of_token(&sm, id, 2);
    assert_eq!(sm.offset_of_loc(ws, id), 2);
}

#[test]
fn line_start_end_and_indentation() {
    let source = b"$a;\n    $b;\n";
    let (sm, id) = manager(source);
    let loc_b = sm.loc_for_offset(id, 8);
    assert_eq!(sm.offset_of_loc(crate::get_loc_for_start_of_line(&sm, loc_b), id), 4);
    assert_eq!(sm.offset_of_loc(crate::get_loc_for_end_of_line(&sm, loc_b), id), 12);
    assert_eq!(crate::get_indentation_for_line(&sm, loc_b), b"    ");
}

#[test]
fn line_numbers_advance() {
    let (sm, id) = manager(b"$a\n$b\r\n$c");
    let mut lexer = Lexer::new(&sm, id, LexerOptions::default());
    assert_eq!(lexer.line_number(), 1);
    lexer.lex_one();
    lexer.lex_one();
    lexer.lex_one();
    assert_eq!(lexer.line_number(), 3);
}

// === Universal invariants ===

fn check_invariants(source: &[u8]) {
    let (sm, id) = manager(source);
    let mut tokens = Vec::new();
    tokenize_all(&sm, id, heredoc_opts().with_trivia(), |_, t| tokens.push(t.clone()));

    // Round-trip: trivia + spans reproduce the source exactly.
    assert_eq!(
        render(&tokens, source),
        source,
        "round-trip failed for {source:?}"
    );

    // No lost bytes.
    let total: u32 = tokens
        .iter()
        .map(|t| t.leading_trivia().len() + t.len() + t.trailing_trivia().len())
        .sum();
    assert_eq!(total as usize, source.len());

    // Monotonic, non-empty spans (except EOF and special zero-width kinds).
    let mut prev_start = 0;
    for token in &tokens {
        assert!(token.span().start >= prev_start);
        prev_start = token.span().start;
        if !matches!(
            token.kind(),
            TokenKind::EndOfFile | TokenKind::CodeCompletion | TokenKind::EncapsedAndWhitespace
        ) {
            assert!(!token.is_empty(), "empty {:?}", token.kind());
        }
    }

    // At-start-of-line agrees with the leading trivia.
    let content_start = sm.buffer(id).bom_len();
    for token in &tokens {
        let mut bytes = Vec::new();
        token.leading_trivia().write_bytes(&mut bytes);
        let has_newline = bytes.iter().any(|&b| b == b'\n' || b == b'\r');
        if has_newline || token.span().start == content_start {
            assert!(token.is_at_start_of_line(), "{:?}", token.kind());
        }
        if token.is_at_start_of_line() {
            assert!(has_newline || token.span().start == content_start);
        }
    }
}

#[test]
fn invariants_on_representative_sources() {
    let sources: &[&[u8]] = &[
        b"",
        b"<?php echo 1 + 2;\n",
        b"\xEF\xBB\xBF$x = 'a';\n",
        b"#!/usr/bin/rill\n$x;\n",
        b"$s = \"a $b {$c} ${d} e\";\n",
        b"<<<EOT\n  text $v\n  EOT\nmore();\n",
        b"<<<'RAW'\nno $interp\nRAW\n",
        b"// comment\n/* block\n   spans */ final\n",
        b"'unterminated",
        b"\"also $unterminated",
        b"<<<EOT\nnever closed",
        b"$a\0$b",
        b"a\xFFb",
        b"0xFFFFFFFFFFFFFFFF 019 1.5e300 0b11\n",
        b"  \t \x0B\x0C mixed\r\nws\r",
        b"`cmd $arg`;",
    ];
    for source in sources {
        check_invariants(source);
    }
}

mod proptest_invariants {
    use super::check_invariants;
    use proptest::prelude::*;

    const SNIPPETS: &[&str] = &[
        "$x", " ", "\t", "\n", "\r\n", ";", "echo ", "1", "0x1F", "019", "1.5", "'s'", "\"d\"",
        "\"a $b\"", "\"{$v}\"", "${", "{$", "}", "`c`", "<<<EOT\nx\nEOT\n", "<<<'N'\ny\nN\n",
        "// c\n", "/* b */", "->", "prop", "++", "<=>", "(int)", "(", ")", "[", "]", "\\", "@",
        "?>", "<?php ", "..", "...", "\u{201C}", "\u{2014}",
    ];

    proptest! {
        #[test]
        fn roundtrip_on_printable_ascii(s in "[ -~\t\r\n]{0,120}") {
            check_invariants(s.as_bytes());
        }

        #[test]
        fn roundtrip_on_snippet_soup(indices in proptest::collection::vec(0usize..SNIPPETS.len(), 0..24)) {
            let mut source = String::new();
            for i in indices {
                source.push_str(SNIPPETS[i]);
            }
            check_invariants(source.as_bytes());
        }

        #[test]
        fn roundtrip_on_raw_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..80)) {
            check_invariants(&bytes);
        }
    }
}
