use pl01::parser::lexer::{Keyword, Operator, Scanner, TokenKind, tokenize};

#[test]
fn declaration_line_token_sequence() {
    let mut scanner = Scanner::new("const a01 = 100, bAAb = $66;\n\n{comment}");
    let expected = vec![
        TokenKind::Keyword(Keyword::Const),
        TokenKind::Identifier("a01".to_string()),
        TokenKind::Operator(Operator::Equal),
        TokenKind::Integer(100),
        TokenKind::Char(','),
        TokenKind::Identifier("baab".to_string()),
        TokenKind::Operator(Operator::Equal),
        TokenKind::Integer(0x66),
        TokenKind::Char(';'),
        TokenKind::End,
    ];

    for kind in expected {
        assert_eq!(scanner.next_token().kind, kind);
    }
    assert_eq!(scanner.error_count(), 0);
    assert_eq!(scanner.current_line(), 3);
}

#[test]
fn glued_literals_are_errors() {
    for source in ["0ea", "0123"] {
        let mut scanner = Scanner::new(source);
        assert_eq!(scanner.next_token().kind, TokenKind::Error, "{}", source);
        assert_eq!(scanner.error_count(), 1);
    }
}

#[test]
fn unknown_operator_run_is_an_error() {
    let mut scanner = Scanner::new("::=");
    assert_eq!(scanner.next_token().kind, TokenKind::Error);
    assert_eq!(scanner.next_token().kind, TokenKind::End);
    assert_eq!(scanner.diagnostics()[0].to_string(), "lexer (line 1): error: unknown operator");
}

#[test]
fn reset_clears_line_and_errors() {
    let mut scanner = Scanner::new("0ea\n\n\n");
    while scanner.next_token().kind != TokenKind::End {}
    assert_eq!(scanner.error_count(), 1);
    assert_eq!(scanner.current_line(), 4);

    scanner.reset("x");
    assert_eq!(scanner.error_count(), 0);
    assert_eq!(scanner.current_line(), 1);
    assert_eq!(scanner.next_token().kind, TokenKind::Identifier("x".to_string()));
}

#[test]
fn crlf_is_one_line_break() {
    let tokens = tokenize("a\r\nb\rc\nd");
    let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
    assert_eq!(lines, vec![1, 2, 3, 4, 4]);
}

#[test]
fn identifiers_are_case_folded() {
    let tokens = tokenize("BEGIN Foo END");
    assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Begin));
    assert_eq!(tokens[1].kind, TokenKind::Identifier("foo".to_string()));
    assert_eq!(tokens[2].kind, TokenKind::Keyword(Keyword::End));
}
