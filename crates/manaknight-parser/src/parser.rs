//! Recursive descent parser implementation
//!
//! The parser is total: every top-level construct either yields a
//! well-formed node or records one diagnostic and resynchronizes at the
//! next `}` or declaration keyword, so a single run reports as many
//! independent problems as possible.

use manaknight_ast::*;
use manaknight_diag::{Diagnostic, ErrorCode, SourceMap};
use manaknight_lexer::{Token, TokenKind};

use crate::ParseError;

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    map: &'a SourceMap,
    diagnostics: Vec<Diagnostic>,
    next_id: u32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: Vec<Token>, map: &'a SourceMap) -> Self {
        Self::with_id_base(source, tokens, map, 0)
    }

    /// Start node id numbering at `id_base` so ids stay unique when the
    /// resolver merges several parsed files into one program.
    pub fn with_id_base(source: &'a str, tokens: Vec<Token>, map: &'a SourceMap, id_base: u32) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            map,
            diagnostics: Vec::new(),
            next_id: id_base,
        }
    }

    // === Utilities ===

    fn current(&self) -> Token {
        self.tokens
            .get(self.pos)
            .copied()
            .unwrap_or_else(|| *self.tokens.last().expect("tokens always end with Eof"))
    }

    fn peek(&self) -> TokenKind {
        self.current().kind
    }

    fn peek_ahead(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn consume(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected(
                kind.describe(),
                self.peek(),
                self.current().span,
            ))
        }
    }

    fn text(&self, token: Token) -> &'a str {
        token.text(self.source)
    }

    fn span(&self) -> Span {
        self.current().span
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn report(&mut self, error: ParseError) {
        let (line, column) = self.map.position(error.span().start);
        self.diagnostics.push(Diagnostic::new(
            error.code(),
            error.to_string(),
            self.map.file(),
            line,
            column,
        ));
    }

    fn report_code(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let (line, column) = self.map.position(span.start);
        self.diagnostics
            .push(Diagnostic::new(code, message, self.map.file(), line, column));
    }

    /// Skip forward to the next synchronization point: a closing brace
    /// (consumed) or the start of the next top-level construct.
    fn synchronize(&mut self) {
        loop {
            match self.peek() {
                TokenKind::Eof => return,
                TokenKind::RBrace => {
                    self.advance();
                    return;
                }
                TokenKind::Fn
                | TokenKind::Function
                | TokenKind::Api
                | TokenKind::Module
                | TokenKind::Type
                | TokenKind::Effect
                | TokenKind::Import => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Statement-level resynchronization inside a block.
    fn synchronize_in_block(&mut self) {
        loop {
            match self.peek() {
                TokenKind::Eof | TokenKind::RBrace | TokenKind::Let | TokenKind::If
                | TokenKind::Match => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // === Program ===

    pub fn parse_program(mut self) -> (Program, Vec<Diagnostic>, u32) {
        let start = self.span();
        self.skip_version_header();

        let mut modules = Vec::new();
        let mut routes = Vec::new();
        let mut loose_decls = Vec::new();
        let mut loose_exports = Vec::new();

        while !self.at(TokenKind::Eof) {
            match self.peek() {
                TokenKind::Module => match self.parse_module() {
                    Ok(module) => modules.push(module),
                    Err(e) => {
                        self.report(e);
                        self.synchronize();
                    }
                },
                TokenKind::Api => match self.parse_api_route() {
                    Ok(route) => routes.push(route),
                    Err(e) => {
                        self.report(e);
                        self.synchronize();
                    }
                },
                TokenKind::Export => match self.parse_export_list() {
                    Ok(names) => loose_exports.extend(names),
                    Err(e) => {
                        self.report(e);
                        self.synchronize();
                    }
                },
                TokenKind::Fn
                | TokenKind::Function
                | TokenKind::Type
                | TokenKind::Effect
                | TokenKind::Import => match self.parse_declaration() {
                    Ok(decl) => loose_decls.push(decl),
                    Err(e) => {
                        self.report(e);
                        self.synchronize();
                    }
                },
                // The lexer already reported bad tokens; just skip them.
                TokenKind::Error => {
                    self.advance();
                }
                _ => {
                    let err = ParseError::ExpectedDeclaration { span: self.span() };
                    self.report(err);
                    self.advance();
                    self.synchronize();
                }
            }
        }

        if !loose_decls.is_empty() || !loose_exports.is_empty() || modules.is_empty() {
            let span = loose_decls
                .first()
                .map(|d: &Declaration| d.span)
                .unwrap_or_else(Span::dummy);
            modules.insert(
                0,
                Module {
                    name: "main".to_string(),
                    decls: loose_decls,
                    exports: loose_exports,
                    implicit: true,
                    file: self.map.file().to_string(),
                    span,
                },
            );
        }

        let end = self.span();
        let program = Program {
            modules,
            routes,
            span: start.merge(end),
        };
        (program, self.diagnostics, self.next_id)
    }

    /// Optional `language v1.0` header at the top of a file.
    fn skip_version_header(&mut self) {
        if self.at(TokenKind::Ident) && self.text(self.current()) == "language" {
            self.advance();
            if self.at(TokenKind::Ident) {
                self.advance();
                if self.at(TokenKind::Dot) && self.peek_ahead(1) == TokenKind::Int {
                    self.advance();
                    self.advance();
                }
            }
        }
    }

    // === Declarations ===

    fn parse_module(&mut self) -> Result<Module, ParseError> {
        let start = self.span();
        self.consume(TokenKind::Module)?;
        let name = self.parse_qualified_name()?;
        self.consume(TokenKind::LBrace)?;

        let mut decls = Vec::new();
        let mut exports = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if self.at(TokenKind::Export) {
                match self.parse_export_list() {
                    Ok(names) => exports.extend(names),
                    Err(e) => {
                        self.report(e);
                        self.synchronize();
                    }
                }
            } else {
                match self.parse_declaration() {
                    Ok(decl) => decls.push(decl),
                    Err(e) => {
                        self.report(e);
                        self.synchronize();
                    }
                }
            }
        }

        self.consume(TokenKind::RBrace)?;
        let end = self.span();

        Ok(Module {
            name,
            decls,
            exports,
            implicit: false,
            file: self.map.file().to_string(),
            span: start.merge(end),
        })
    }

    fn parse_export_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.consume(TokenKind::Export)?;
        self.consume(TokenKind::LBrace)?;
        let mut names = Vec::new();
        while self.at(TokenKind::Ident) {
            let token = self.advance();
            names.push(self.text(token).to_string());
            if self.at(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.consume(TokenKind::RBrace)?;
        Ok(names)
    }

    fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        let start = self.span();
        let kind = match self.peek() {
            TokenKind::Fn | TokenKind::Function => {
                DeclarationKind::Function(self.parse_function_decl()?)
            }
            TokenKind::Type => DeclarationKind::Type(self.parse_type_decl()?),
            TokenKind::Effect => DeclarationKind::Effect(self.parse_effect_decl()?),
            TokenKind::Import => DeclarationKind::Import(self.parse_import_decl()?),
            _ => return Err(ParseError::ExpectedDeclaration { span: start }),
        };
        let end = self.span();
        Ok(Declaration {
            kind,
            span: start.merge(end),
        })
    }

    fn parse_function_decl(&mut self) -> Result<FunctionDecl, ParseError> {
        let start = self.span();
        // `fn` and `function` are interchangeable
        self.advance();
        let name_token = self.consume(TokenKind::Ident)?;
        let name = self.text(name_token).to_string();

        self.consume(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.consume(TokenKind::RParen)?;

        // `-> T` is canonical; `: T` is accepted. Absent means Unit.
        let return_type = if self.at(TokenKind::Arrow) || self.at(TokenKind::Colon) {
            self.advance();
            self.parse_type()?
        } else {
            Type::primitive(PrimitiveType::Unit, self.span())
        };

        let effects = self.parse_uses_clause()?;
        let body = self.parse_block()?;

        if body.statements.is_empty() && body.tail.is_none() {
            self.report_code(
                ErrorCode::E1006,
                format!("function `{}` has an empty body", name),
                body.span,
            );
        }

        let end = self.span();
        Ok(FunctionDecl {
            name,
            params,
            return_type,
            effects,
            body,
            span: start.merge(end),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Parameter>, ParseError> {
        let mut params = Vec::new();
        if self.at(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let start = self.span();
            let name_token = self.consume(TokenKind::Ident)?;
            let name = self.text(name_token).to_string();
            self.consume(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            let end = self.span();
            params.push(Parameter {
                name,
                ty,
                span: start.merge(end),
            });

            if self.at(TokenKind::Comma) {
                let comma = self.advance();
                if self.at(TokenKind::RParen) {
                    return Err(ParseError::TrailingComma { span: comma.span });
                }
            } else {
                break;
            }
        }
        Ok(params)
    }

    fn parse_uses_clause(&mut self) -> Result<Vec<EffectName>, ParseError> {
        if !self.at(TokenKind::Uses) {
            return Ok(Vec::new());
        }
        self.advance();
        self.consume(TokenKind::LBrace)?;
        let mut effects = Vec::new();
        while self.at(TokenKind::Ident) {
            let token = self.advance();
            effects.push(EffectName {
                name: self.text(token).to_string(),
                span: token.span,
            });
            if self.at(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.consume(TokenKind::RBrace)?;
        Ok(effects)
    }

    fn parse_type_decl(&mut self) -> Result<TypeDecl, ParseError> {
        let start = self.span();
        self.consume(TokenKind::Type)?;
        let name_token = self.consume(TokenKind::Ident)?;
        let name = self.text(name_token).to_string();

        let type_params = if self.at(TokenKind::Lt) {
            self.advance();
            let mut params = Vec::new();
            while self.at(TokenKind::Ident) {
                let t = self.advance();
                params.push(self.text(t).to_string());
                if self.at(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.consume(TokenKind::Gt)?;
            params
        } else {
            Vec::new()
        };

        self.consume(TokenKind::Eq)?;

        let body = if self.at(TokenKind::LBrace) {
            // Record: `type User = { name: String, age: Int }`
            self.advance();
            let fields = self.parse_field_decls()?;
            self.consume(TokenKind::RBrace)?;
            TypeBody::Record(fields)
        } else {
            // Union: `type Shape = Circle(radius: Int) | Square(side: Int)`
            let mut variants = vec![self.parse_variant_decl()?];
            while self.at(TokenKind::Pipe) {
                self.advance();
                variants.push(self.parse_variant_decl()?);
            }
            TypeBody::Union(variants)
        };

        let end = self.span();
        Ok(TypeDecl {
            name,
            type_params,
            body,
            span: start.merge(end),
        })
    }

    fn parse_field_decls(&mut self) -> Result<Vec<FieldDecl>, ParseError> {
        let mut fields = Vec::new();
        while self.at(TokenKind::Ident) {
            let start = self.span();
            let name_token = self.advance();
            let name = self.text(name_token).to_string();
            self.consume(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            let end = self.span();
            fields.push(FieldDecl {
                name,
                ty,
                span: start.merge(end),
            });
            if self.at(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(fields)
    }

    fn parse_variant_decl(&mut self) -> Result<VariantDecl, ParseError> {
        let start = self.span();
        let name_token = self.consume(TokenKind::Ident)?;
        let name = self.text(name_token).to_string();
        let fields = if self.at(TokenKind::LParen) {
            self.advance();
            let fields = self.parse_field_decls()?;
            self.consume(TokenKind::RParen)?;
            fields
        } else {
            Vec::new()
        };
        let end = self.span();
        Ok(VariantDecl {
            name,
            fields,
            span: start.merge(end),
        })
    }

    fn parse_effect_decl(&mut self) -> Result<EffectDecl, ParseError> {
        let start = self.span();
        self.consume(TokenKind::Effect)?;
        let name_token = self.consume(TokenKind::Ident)?;
        Ok(EffectDecl {
            name: self.text(name_token).to_string(),
            span: start.merge(name_token.span),
        })
    }

    fn parse_import_decl(&mut self) -> Result<ImportDecl, ParseError> {
        let start = self.span();
        self.consume(TokenKind::Import)?;
        let path = self.parse_qualified_name()?;
        let alias = if self.at(TokenKind::As) {
            self.advance();
            let token = self.consume(TokenKind::Ident)?;
            Some(self.text(token).to_string())
        } else {
            None
        };
        let end = self.span();
        Ok(ImportDecl {
            path,
            alias,
            span: start.merge(end),
        })
    }

    fn parse_qualified_name(&mut self) -> Result<String, ParseError> {
        let token = self.consume(TokenKind::Ident)?;
        let mut name = self.text(token).to_string();
        while self.at(TokenKind::Dot) && self.peek_ahead(1) == TokenKind::Ident {
            self.advance();
            let part = self.advance();
            name.push('.');
            name.push_str(self.text(part));
        }
        Ok(name)
    }

    // === API routes ===

    fn parse_api_route(&mut self) -> Result<ApiRoute, ParseError> {
        let start = self.span();
        self.consume(TokenKind::Api)?;

        let method_token = self.consume(TokenKind::Ident)?;
        let method_text = self.text(method_token).to_string();
        let method = match HttpMethod::from_str(&method_text) {
            Some(m) => m,
            None => {
                self.report_code(
                    ErrorCode::E6001,
                    format!("invalid HTTP method `{}`", method_text),
                    method_token.span,
                );
                HttpMethod::Get
            }
        };

        let path_token = self.consume(TokenKind::String)?;
        let path = path_token.string_value(self.source);
        self.validate_route_path(&path, path_token.span);

        self.consume(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.consume(TokenKind::RParen)?;

        for param in &params {
            if !matches!(param.ty.kind, TypeKind::Primitive(_)) {
                self.report_code(
                    ErrorCode::E6004,
                    format!("route parameter `{}` must have a primitive type", param.name),
                    param.span,
                );
            }
        }

        let return_type = if self.at(TokenKind::Arrow) || self.at(TokenKind::Colon) {
            self.advance();
            self.parse_type()?
        } else {
            self.report_code(
                ErrorCode::E6003,
                format!("route `{}` has no response type", path),
                self.span(),
            );
            Type::primitive(PrimitiveType::Unit, self.span())
        };

        let effects = self.parse_uses_clause()?;
        let body = self.parse_block()?;

        if body.statements.is_empty() && body.tail.is_none() {
            self.report_code(
                ErrorCode::E1006,
                format!("route `{}` has an empty body", path),
                body.span,
            );
        }

        let end = self.span();
        Ok(ApiRoute {
            method,
            path,
            params,
            return_type,
            effects,
            body,
            file: self.map.file().to_string(),
            span: start.merge(end),
        })
    }

    fn validate_route_path(&mut self, path: &str, span: Span) {
        if !path.starts_with('/') {
            self.report_code(
                ErrorCode::E6002,
                format!("route path `{}` must start with '/'", path),
                span,
            );
            return;
        }
        if path == "/" {
            return;
        }
        for segment in path[1..].split('/') {
            if segment.is_empty() {
                self.report_code(
                    ErrorCode::E6002,
                    format!("route path `{}` contains an empty segment", path),
                    span,
                );
                return;
            }
        }
    }

    // === Blocks and statements ===

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.span();
        let id = self.fresh_id();
        self.consume(TokenKind::LBrace)?;

        let mut statements: Vec<Statement> = Vec::new();
        let mut tail: Option<Box<Expr>> = None;

        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            while self.at(TokenKind::Semicolon) {
                self.advance();
            }
            if self.at(TokenKind::RBrace) {
                break;
            }

            let stmt = match self.parse_statement() {
                Ok(stmt) => stmt,
                Err(e) => {
                    self.report(e);
                    self.synchronize_in_block();
                    continue;
                }
            };
            while self.at(TokenKind::Semicolon) {
                self.advance();
            }

            if self.at(TokenKind::RBrace) {
                // The final expression-shaped statement is the block's value.
                match self.into_tail_expr(stmt) {
                    Ok(expr) => tail = Some(Box::new(expr)),
                    Err(stmt) => statements.push(stmt),
                }
                break;
            }
            statements.push(stmt);
        }

        self.consume(TokenKind::RBrace)?;
        let end = self.span();
        Ok(Block {
            id,
            statements,
            tail,
            span: start.merge(end),
        })
    }

    /// Convert a trailing statement into the block's tail expression when
    /// it is expression-shaped; `let` stays a statement.
    fn into_tail_expr(&mut self, stmt: Statement) -> Result<Expr, Statement> {
        match stmt.kind {
            StatementKind::Expr(e) => Ok(e),
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => Ok(Expr {
                id: self.fresh_id(),
                kind: ExprKind::If {
                    condition: Box::new(condition),
                    then_branch,
                    else_branch,
                },
                span: stmt.span,
            }),
            StatementKind::Match { scrutinee, arms } => Ok(Expr {
                id: self.fresh_id(),
                kind: ExprKind::Match {
                    scrutinee: Box::new(scrutinee),
                    arms,
                },
                span: stmt.span,
            }),
            kind @ StatementKind::Let { .. } => Err(Statement {
                kind,
                span: stmt.span,
            }),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let start = self.span();
        let kind = match self.peek() {
            TokenKind::Let => {
                self.advance();
                let name_token = self.consume(TokenKind::Ident)?;
                let name = self.text(name_token).to_string();
                let ty = if self.at(TokenKind::Colon) {
                    self.advance();
                    Some(self.parse_type()?)
                } else {
                    None
                };
                self.consume(TokenKind::Eq)?;
                let value = self.parse_expr()?;
                StatementKind::Let { name, ty, value }
            }
            TokenKind::If => {
                self.advance();
                let condition = self.parse_expr()?;
                let then_branch = self.parse_block()?;
                // `else` is mandatory, in statement position too
                self.consume(TokenKind::Else)?;
                let else_branch = self.parse_block()?;
                StatementKind::If {
                    condition,
                    then_branch,
                    else_branch,
                }
            }
            TokenKind::Match => {
                let (scrutinee, arms) = self.parse_match_body()?;
                StatementKind::Match { scrutinee, arms }
            }
            _ => StatementKind::Expr(self.parse_expr()?),
        };
        let end = self.span();
        Ok(Statement {
            kind,
            span: start.merge(end),
        })
    }

    fn parse_match_body(&mut self) -> Result<(Expr, Vec<MatchArm>), ParseError> {
        self.consume(TokenKind::Match)?;
        let scrutinee = self.parse_expr()?;
        self.consume(TokenKind::LBrace)?;
        let mut arms = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let arm_start = self.span();
            let pattern = self.parse_pattern()?;
            self.consume(TokenKind::FatArrow)?;
            let body = self.parse_expr()?;
            let end = self.span();
            arms.push(MatchArm {
                pattern,
                body,
                span: arm_start.merge(end),
            });
            while self.at(TokenKind::Comma) || self.at(TokenKind::Semicolon) {
                self.advance();
            }
        }
        self.consume(TokenKind::RBrace)?;
        Ok((scrutinee, arms))
    }

    // === Patterns ===

    fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        let start = self.span();
        let token = self.consume(TokenKind::Ident)?;
        let name = self.text(token).to_string();

        if name == "_" {
            return Ok(Pattern {
                kind: PatternKind::Wildcard,
                span: token.span,
            });
        }

        let is_constructor = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        if !is_constructor {
            return Ok(Pattern {
                kind: PatternKind::Binding(name),
                span: token.span,
            });
        }

        let fields = if self.at(TokenKind::LParen) {
            self.advance();
            let mut fields = Vec::new();
            while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
                fields.push(self.parse_pattern()?);
                if self.at(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.consume(TokenKind::RParen)?;
            fields
        } else {
            Vec::new()
        };

        let end = self.span();
        Ok(Pattern {
            kind: PatternKind::Constructor { name, fields },
            span: start.merge(end),
        })
    }

    // === Types ===

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        let start = self.span();
        match self.peek() {
            TokenKind::LParen => {
                // Function type: `(Int, String) -> Bool uses { http }`
                self.advance();
                let mut params = Vec::new();
                while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
                    params.push(self.parse_type()?);
                    if self.at(TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.consume(TokenKind::RParen)?;
                self.consume(TokenKind::Arrow)?;
                let ret = self.parse_type()?;
                let effects = self
                    .parse_uses_clause()?
                    .into_iter()
                    .map(|e| e.name)
                    .collect();
                let end = self.span();
                Ok(Type {
                    kind: TypeKind::Function {
                        params,
                        ret: Box::new(ret),
                        effects,
                    },
                    span: start.merge(end),
                })
            }
            TokenKind::Ident => {
                let name = self.parse_qualified_name()?;
                if let Some(p) = PrimitiveType::from_name(&name) {
                    return Ok(Type {
                        kind: TypeKind::Primitive(p),
                        span: start,
                    });
                }
                if self.at(TokenKind::Lt) {
                    self.advance();
                    let mut args = vec![self.parse_type()?];
                    while self.at(TokenKind::Comma) {
                        self.advance();
                        args.push(self.parse_type()?);
                    }
                    self.consume(TokenKind::Gt)?;
                    let end = self.span();
                    return Ok(Type {
                        kind: TypeKind::Generic { name, args },
                        span: start.merge(end),
                    });
                }
                Ok(Type {
                    kind: TypeKind::Named(name),
                    span: start,
                })
            }
            _ => Err(ParseError::InvalidType { span: start }),
        }
    }

    // === Expressions ===
    //
    // Precedence, tightest to loosest: call, unary, `* / %`, `+ -`,
    // comparisons (non-associative), `&&`, `||`, pipe `|>`, and the
    // composite forms (if / match / lambda) at the loosest level.

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            TokenKind::If => self.parse_if_expr(),
            TokenKind::Match => {
                let start = self.span();
                let (scrutinee, arms) = self.parse_match_body()?;
                let end = self.span();
                Ok(Expr {
                    id: self.fresh_id(),
                    kind: ExprKind::Match {
                        scrutinee: Box::new(scrutinee),
                        arms,
                    },
                    span: start.merge(end),
                })
            }
            TokenKind::Fn | TokenKind::Function => self.parse_lambda(),
            _ => self.parse_pipe_expr(),
        }
    }

    fn parse_if_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        self.consume(TokenKind::If)?;
        let condition = self.parse_expr()?;
        let then_branch = self.parse_block()?;
        self.consume(TokenKind::Else)?;
        let else_branch = self.parse_block()?;
        let end = self.span();
        Ok(Expr {
            id: self.fresh_id(),
            kind: ExprKind::If {
                condition: Box::new(condition),
                then_branch,
                else_branch,
            },
            span: start.merge(end),
        })
    }

    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        self.advance(); // fn
        self.consume(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.consume(TokenKind::RParen)?;
        self.consume(TokenKind::FatArrow)?;
        let body = self.parse_expr()?;
        let end = self.span();
        let params = params
            .into_iter()
            .map(|p| LambdaParam {
                name: p.name,
                ty: p.ty,
                span: p.span,
            })
            .collect();
        Ok(Expr {
            id: self.fresh_id(),
            kind: ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            span: start.merge(end),
        })
    }

    fn parse_pipe_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_or_expr()?;
        while self.at(TokenKind::PipeRight) {
            self.advance();
            let right = self.parse_or_expr()?;
            let span = left.span.merge(right.span);
            left = Expr {
                id: self.fresh_id(),
                kind: ExprKind::Pipe {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(left)
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.at(TokenKind::OrOr) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = self.binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_cmp_expr()?;
        while self.at(TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_cmp_expr()?;
            left = self.binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_add_expr()?;
        let op = match self.peek() {
            TokenKind::EqEq => Some(BinaryOp::Eq),
            TokenKind::Ne => Some(BinaryOp::Ne),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Le => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Ge => Some(BinaryOp::Ge),
            _ => None,
        };
        // Comparisons are non-associative: at most one per level.
        if let Some(op) = op {
            self.advance();
            let right = self.parse_add_expr()?;
            return Ok(self.binary(op, left, right));
        }
        Ok(left)
    }

    fn parse_add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul_expr()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_mul_expr()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary_expr()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        let op = match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary_expr()?;
            let span = start.merge(operand.span);
            return Ok(Expr {
                id: self.fresh_id(),
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expr()?;
        while self.at(TokenKind::LParen) {
            self.advance();
            let mut args = Vec::new();
            while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
                args.push(self.parse_expr()?);
                if self.at(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.consume(TokenKind::RParen)?;
            let span = expr.span.merge(self.span());
            expr = Expr {
                id: self.fresh_id(),
                kind: ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                span,
            };
        }
        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        match self.peek() {
            TokenKind::Int => {
                let token = self.advance();
                Ok(Expr {
                    id: self.fresh_id(),
                    kind: ExprKind::Literal(Literal::Int(token.int_value(self.source))),
                    span: token.span,
                })
            }
            TokenKind::String => {
                let token = self.advance();
                Ok(Expr {
                    id: self.fresh_id(),
                    kind: ExprKind::Literal(Literal::String(token.string_value(self.source))),
                    span: token.span,
                })
            }
            TokenKind::True | TokenKind::False => {
                let token = self.advance();
                Ok(Expr {
                    id: self.fresh_id(),
                    kind: ExprKind::Literal(Literal::Bool(token.kind == TokenKind::True)),
                    span: token.span,
                })
            }
            TokenKind::LParen => {
                self.advance();
                if self.at(TokenKind::RParen) {
                    let close = self.advance();
                    return Ok(Expr {
                        id: self.fresh_id(),
                        kind: ExprKind::Literal(Literal::Unit),
                        span: start.merge(close.span),
                    });
                }
                let inner = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                let span = block.span;
                Ok(Expr {
                    id: self.fresh_id(),
                    kind: ExprKind::Block(block),
                    span,
                })
            }
            TokenKind::Ident => {
                let name = self.parse_qualified_name()?;
                let last = name.rsplit('.').next().unwrap_or(&name);
                let is_constructor = last.chars().next().is_some_and(|c| c.is_ascii_uppercase());
                if is_constructor {
                    let args = if self.at(TokenKind::LParen) {
                        self.advance();
                        let args = self.parse_ctor_args()?;
                        self.consume(TokenKind::RParen)?;
                        args
                    } else {
                        Vec::new()
                    };
                    let end = self.span();
                    return Ok(Expr {
                        id: self.fresh_id(),
                        kind: ExprKind::Ctor { name, args },
                        span: start.merge(end),
                    });
                }
                Ok(Expr {
                    id: self.fresh_id(),
                    kind: ExprKind::Ident(name),
                    span: start,
                })
            }
            _ => Err(ParseError::InvalidExpression { span: start }),
        }
    }

    fn parse_ctor_args(&mut self) -> Result<Vec<CtorArg>, ParseError> {
        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
            let start = self.span();
            let name = if self.at(TokenKind::Ident) && self.peek_ahead(1) == TokenKind::Colon {
                let token = self.advance();
                self.advance(); // colon
                Some(self.text(token).to_string())
            } else {
                None
            };
            let value = self.parse_expr()?;
            let end = self.span();
            args.push(CtorArg {
                name,
                value,
                span: start.merge(end),
            });
            if self.at(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let span = left.span.merge(right.span);
        Expr {
            id: self.fresh_id(),
            kind: ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        }
    }
}
