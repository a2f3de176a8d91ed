//! Declaration parsing: declaration specifiers, declarators,
//! struct/union/enum specifiers, parameter lists, initializers, and type
//! names.
//!
//! Declarators collect their modifiers innermost first ("declaration
//! mimics use"); the semantic resolver composes the final type by
//! folding the chain in reverse.

use log::trace;
use thin_vec::ThinVec;

use crate::diagnostic::ParseError;
use crate::token::{KeywordKind, TokenKind};

use super::Parser;
use super::tree::{
    Decln, DeclnSpecs, Declr, EnumSpec, Enumerator, InitDeclr, Initializer, ParamDecln,
    StorageClassSpec, StructDecln, StructOrUnionSpec, TypeModifier, TypeName, TypeQual, TypeSpec,
};

impl Parser {
    /// declaration: declaration-specifiers init-declarator-list? `;`
    ///
    /// Typedef names are registered in the parser's scope set as soon as
    /// the declaration parses, so later tokens resolve the
    /// typedef-vs-expression ambiguity correctly.
    pub(crate) fn parse_decln(&mut self) -> Result<Decln, ParseError> {
        let specs = self.parse_decln_specs()?;

        if self.eat_token(&TokenKind::Semicolon)? {
            // e.g. `struct Foo { int a; };` with no declarators
            return Ok(Decln {
                specs,
                declrs: ThinVec::new(),
            });
        }

        let mut declrs = ThinVec::new();
        loop {
            let declr = self.parse_declr()?;
            let mut init = None;
            if self.eat_token(&TokenKind::Equal)? {
                init = Some(self.parse_initializer()?);
            }
            declrs.push(InitDeclr { declr, init });
            if !self.eat_token(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect_punct(TokenKind::Semicolon)?;

        for init_declr in &declrs {
            if let Some(name) = init_declr.declr.name {
                if specs.is_typedef() {
                    self.add_typedef_name(name);
                } else {
                    self.shadow_typedef_name(name);
                }
            }
        }

        Ok(Decln { specs, declrs })
    }

    /// declaration-specifiers: (storage-class-specifier | type-specifier
    /// | type-qualifier)+
    ///
    /// Fails (for backtracking) if nothing at all was consumed.
    pub(crate) fn parse_decln_specs(&mut self) -> Result<DeclnSpecs, ParseError> {
        let mut specs = DeclnSpecs::default();

        loop {
            let token = self.current_token()?;
            match token.kind {
                TokenKind::Keyword(k) => match k {
                    KeywordKind::Auto => {
                        self.eat();
                        specs.storage.push(StorageClassSpec::Auto);
                    }
                    KeywordKind::Register => {
                        self.eat();
                        specs.storage.push(StorageClassSpec::Register);
                    }
                    KeywordKind::Static => {
                        self.eat();
                        specs.storage.push(StorageClassSpec::Static);
                    }
                    KeywordKind::Extern => {
                        self.eat();
                        specs.storage.push(StorageClassSpec::Extern);
                    }
                    KeywordKind::Typedef => {
                        self.eat();
                        specs.storage.push(StorageClassSpec::Typedef);
                    }
                    KeywordKind::Const => {
                        self.eat();
                        specs.quals.push(TypeQual::Const);
                    }
                    KeywordKind::Volatile => {
                        self.eat();
                        specs.quals.push(TypeQual::Volatile);
                    }
                    KeywordKind::Void => {
                        self.eat();
                        specs.type_specs.push(TypeSpec::Void);
                    }
                    KeywordKind::Char => {
                        self.eat();
                        specs.type_specs.push(TypeSpec::Char);
                    }
                    KeywordKind::Short => {
                        self.eat();
                        specs.type_specs.push(TypeSpec::Short);
                    }
                    KeywordKind::Int => {
                        self.eat();
                        specs.type_specs.push(TypeSpec::Int);
                    }
                    KeywordKind::Long => {
                        self.eat();
                        specs.type_specs.push(TypeSpec::Long);
                    }
                    KeywordKind::Float => {
                        self.eat();
                        specs.type_specs.push(TypeSpec::Float);
                    }
                    KeywordKind::Double => {
                        self.eat();
                        specs.type_specs.push(TypeSpec::Double);
                    }
                    KeywordKind::Signed => {
                        self.eat();
                        specs.type_specs.push(TypeSpec::Signed);
                    }
                    KeywordKind::Unsigned => {
                        self.eat();
                        specs.type_specs.push(TypeSpec::Unsigned);
                    }
                    KeywordKind::Struct => {
                        self.eat();
                        let spec = self.parse_struct_or_union_spec()?;
                        specs.type_specs.push(TypeSpec::Struct(spec));
                    }
                    KeywordKind::Union => {
                        self.eat();
                        let spec = self.parse_struct_or_union_spec()?;
                        specs.type_specs.push(TypeSpec::Union(spec));
                    }
                    KeywordKind::Enum => {
                        self.eat();
                        let spec = self.parse_enum_spec()?;
                        specs.type_specs.push(TypeSpec::Enum(spec));
                    }
                    _ => break,
                },
                TokenKind::Identifier(name)
                    if specs.type_specs.is_empty() && self.is_typedef_name(name) =>
                {
                    self.eat();
                    specs.type_specs.push(TypeSpec::TypedefName(name));
                }
                _ => break,
            }
        }

        if specs.storage.is_empty() && specs.type_specs.is_empty() && specs.quals.is_empty() {
            return Err(self.unexpected("declaration specifiers"));
        }
        Ok(specs)
    }

    /// True if the current token can begin declaration specifiers. Used
    /// to disambiguate `(declarator)` grouping from `(parameter-list)`.
    pub(crate) fn starts_decln_specs(&self) -> bool {
        match self.current_kind() {
            Ok(TokenKind::Keyword(k)) => matches!(
                k,
                KeywordKind::Auto
                    | KeywordKind::Register
                    | KeywordKind::Static
                    | KeywordKind::Extern
                    | KeywordKind::Typedef
                    | KeywordKind::Const
                    | KeywordKind::Volatile
                    | KeywordKind::Void
                    | KeywordKind::Char
                    | KeywordKind::Short
                    | KeywordKind::Int
                    | KeywordKind::Long
                    | KeywordKind::Float
                    | KeywordKind::Double
                    | KeywordKind::Signed
                    | KeywordKind::Unsigned
                    | KeywordKind::Struct
                    | KeywordKind::Union
                    | KeywordKind::Enum
            ),
            Ok(TokenKind::Identifier(name)) => self.is_typedef_name(name),
            _ => false,
        }
    }

    /// declarator: pointer* direct-declarator suffix*
    ///
    /// Also parses abstract declarators (no name); callers that require a
    /// name check for one afterwards.
    pub(crate) fn parse_declr(&mut self) -> Result<Declr, ParseError> {
        // pointers, in source order
        let mut pointers: Vec<ThinVec<TypeQual>> = Vec::new();
        while self.eat_token(&TokenKind::Star)? {
            let mut quals = ThinVec::new();
            loop {
                if self.eat_token(&TokenKind::Keyword(KeywordKind::Const))? {
                    quals.push(TypeQual::Const);
                } else if self.eat_token(&TokenKind::Keyword(KeywordKind::Volatile))? {
                    quals.push(TypeQual::Volatile);
                } else {
                    break;
                }
            }
            pointers.push(quals);
        }

        // direct declarator: name, grouped declarator, or nothing (abstract)
        let mut name = None;
        let mut modifiers: ThinVec<TypeModifier> = ThinVec::new();
        match self.current_kind()? {
            TokenKind::Identifier(id) => {
                self.eat();
                name = Some(id);
            }
            TokenKind::LeftParen => {
                // `(` here is either a grouped declarator or the start of a
                // parameter list for an omitted name; a parameter list begins
                // with `)` or declaration specifiers.
                let saved = self.position;
                self.eat();
                let is_param_list = self.current_kind()? == TokenKind::RightParen
                    || self.starts_decln_specs();
                self.position = saved;
                if !is_param_list {
                    self.eat(); // consume '('
                    let inner = self.parse_declr()?;
                    self.expect_punct(TokenKind::RightParen)?;
                    name = inner.name;
                    modifiers = inner.modifiers;
                }
            }
            _ => {}
        }

        // suffixes: arrays and parameter lists, in source order
        loop {
            match self.current_kind()? {
                TokenKind::LeftBracket => {
                    self.eat();
                    if self.eat_token(&TokenKind::RightBracket)? {
                        modifiers.push(TypeModifier::Array(None));
                    } else {
                        let size = self.parse_constant_expr()?;
                        self.expect_punct(TokenKind::RightBracket)?;
                        modifiers.push(TypeModifier::Array(Some(size)));
                    }
                }
                TokenKind::LeftParen => {
                    self.eat();
                    let (params, is_variadic) = self.parse_param_list()?;
                    modifiers.push(TypeModifier::Function(params, is_variadic));
                }
                _ => break,
            }
        }

        // pointers sit outside every suffix; the rightmost `*` binds
        // closest to the name
        for quals in pointers.into_iter().rev() {
            modifiers.push(TypeModifier::Pointer(quals));
        }

        Ok(Declr { name, modifiers })
    }

    /// parameter-type-list after the opening `(`: zero or more parameter
    /// declarations, optionally ending in `...`. The closing `)` is
    /// consumed. `(void)` means an empty parameter list.
    fn parse_param_list(&mut self) -> Result<(ThinVec<ParamDecln>, bool), ParseError> {
        let mut params = ThinVec::new();
        let mut is_variadic = false;

        if self.eat_token(&TokenKind::RightParen)? {
            return Ok((params, is_variadic));
        }
        loop {
            if self.eat_token(&TokenKind::Ellipsis)? {
                is_variadic = true;
                self.expect_punct(TokenKind::RightParen)?;
                return Ok((params, is_variadic));
            }
            let specs = self.parse_decln_specs()?;
            let declr = self.parse_declr()?;
            params.push(ParamDecln { specs, declr });
            if !self.eat_token(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect_punct(TokenKind::RightParen)?;

        // `(void)` declares no parameters at all
        if params.len() == 1 {
            let only = &params[0];
            if only.declr.is_abstract()
                && only.declr.modifiers.is_empty()
                && only.specs.type_specs.len() == 1
                && only.specs.type_specs[0] == TypeSpec::Void
            {
                params = ThinVec::new();
            }
        }

        Ok((params, is_variadic))
    }

    /// type-name: specifier-qualifier-list abstract-declarator?
    ///
    /// Fails if the declarator names anything: that is what lets
    /// `(x)(y)` backtrack out of the cast alternative when `x` is a
    /// variable.
    pub(crate) fn parse_type_name(&mut self) -> Result<TypeName, ParseError> {
        let specs = self.parse_decln_specs()?;
        let declr = self.parse_declr()?;
        if declr.name.is_some() {
            return Err(self.unexpected("abstract declarator"));
        }
        Ok(TypeName { specs, declr })
    }

    /// struct-or-union-specifier, after the keyword has been consumed:
    /// a tag, a braced member list, or both.
    fn parse_struct_or_union_spec(&mut self) -> Result<StructOrUnionSpec, ParseError> {
        let tag = self.maybe_name()?;

        if self.current_kind()? != TokenKind::LeftBrace {
            if tag.is_none() {
                return Err(self.unexpected("struct tag or '{'"));
            }
            return Ok(StructOrUnionSpec { tag, members: None });
        }
        self.eat(); // consume '{'

        let mut members = Vec::new();
        while !self.eat_token(&TokenKind::RightBrace)? {
            members.push(self.parse_struct_decln()?);
        }
        trace!(
            "parse_struct_or_union_spec: tag {:?}, {} member declarations",
            tag,
            members.len()
        );
        Ok(StructOrUnionSpec {
            tag,
            members: Some(members),
        })
    }

    /// struct-declaration: specifier-qualifier-list declarator-list `;`
    fn parse_struct_decln(&mut self) -> Result<StructDecln, ParseError> {
        let specs = self.parse_decln_specs()?;
        let mut declrs = ThinVec::new();
        loop {
            declrs.push(self.parse_declr()?);
            if !self.eat_token(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect_punct(TokenKind::Semicolon)?;
        Ok(StructDecln { specs, declrs })
    }

    /// enum-specifier, after the keyword: tag, enumerator list, or both.
    /// A trailing comma before the closing brace is tolerated.
    fn parse_enum_spec(&mut self) -> Result<EnumSpec, ParseError> {
        let tag = self.maybe_name()?;

        if self.current_kind()? != TokenKind::LeftBrace {
            if tag.is_none() {
                return Err(self.unexpected("enum tag or '{'"));
            }
            return Ok(EnumSpec {
                tag,
                enumerators: None,
            });
        }
        self.eat(); // consume '{'

        let mut enumerators = ThinVec::new();
        while !self.eat_token(&TokenKind::RightBrace)? {
            let name = self.expect_name()?;
            let mut init = None;
            if self.eat_token(&TokenKind::Equal)? {
                init = Some(self.parse_constant_expr()?);
            }
            enumerators.push(Enumerator { name, init });
            if !self.eat_token(&TokenKind::Comma)? {
                self.expect_punct(TokenKind::RightBrace)?;
                break;
            }
        }
        Ok(EnumSpec {
            tag,
            enumerators: Some(enumerators),
        })
    }

    /// initializer: assignment-expression | `{` initializer-list `,`? `}`
    pub(crate) fn parse_initializer(&mut self) -> Result<Initializer, ParseError> {
        if self.eat_token(&TokenKind::LeftBrace)? {
            let mut items = ThinVec::new();
            while !self.eat_token(&TokenKind::RightBrace)? {
                items.push(self.parse_initializer()?);
                if !self.eat_token(&TokenKind::Comma)? {
                    self.expect_punct(TokenKind::RightBrace)?;
                    break;
                }
            }
            Ok(Initializer::List(items))
        } else {
            Ok(Initializer::Expr(self.parse_assignment_expr()?))
        }
    }
}
