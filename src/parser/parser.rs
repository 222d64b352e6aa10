use tracing::debug;

use crate::{
    analyzer::{Kind, SubroutineKind, SymbolTable},
    codegen::{ArithmeticOp, Codegen, Instruction, Segment},
    error::{Error, Result},
    lexer::{Token, TokenKind},
};

use super::{BinOpKind, Expr, KeywordConstant, UnaryOpKind, MAX_NESTING};

/// Recursive-descent translator for one class. Declarations feed the symbol
/// table as they are read and every statement is emitted as soon as it has
/// been parsed.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    symbol_table: SymbolTable,
    codegen: Codegen,
    subroutine_name: String,
    return_type: String,
    /// Terms currently open while scanning an expression.
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            symbol_table: SymbolTable::new(),
            codegen: Codegen::new(),
            subroutine_name: String::new(),
            return_type: String::new(),
            depth: 0,
        }
    }

    pub fn parse(mut self) -> Result<Vec<Instruction>> {
        self.parse_class()?;
        Ok(self.codegen.finish())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn is_eof(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn unexpected(&self, expected: &str) -> Error {
        let (found, line) = match self.peek() {
            Some(t) => (t.to_string(), t.line),
            None => (
                "end of input".to_string(),
                self.tokens.last().map_or(1, |t| t.line),
            ),
        };
        Error::Syntax {
            expected: expected.to_string(),
            found,
            line,
        }
    }

    fn at_symbol(&self, symbol: char) -> bool {
        self.peek().is_some_and(|t| t.is_symbol(symbol))
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn consume_symbol(&mut self, symbol: char) -> bool {
        if !self.at_symbol(symbol) {
            return false;
        }
        self.index += 1;
        true
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if !self.at_keyword(keyword) {
            return false;
        }
        self.index += 1;
        true
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<()> {
        if self.consume_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{symbol}'")))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{keyword}'")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => {
                let name = t.lexeme.clone();
                self.index += 1;
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// class = "class" ident "{" class_var_dec* subroutine_dec* "}"
    fn parse_class(&mut self) -> Result<()> {
        self.expect_keyword("class")?;
        let name = self.expect_ident("class name")?;
        self.codegen.begin_class(&name);
        debug!(class = %name, "compiling class");

        self.expect_symbol('{')?;
        while self.at_keyword("static") || self.at_keyword("field") {
            self.parse_class_var_dec()?;
        }
        while self.at_subroutine_keyword() {
            self.parse_subroutine_dec()?;
        }
        self.expect_symbol('}')?;

        if !self.is_eof() {
            return Err(self.unexpected("end of input"));
        }
        Ok(())
    }

    fn at_subroutine_keyword(&self) -> bool {
        self.peek().is_some_and(|t| {
            t.kind == TokenKind::Keyword && SubroutineKind::from_keyword(&t.lexeme).is_some()
        })
    }

    /// type = "int" | "char" | "boolean" | ident
    fn parse_type(&mut self) -> Result<String> {
        match self.peek() {
            Some(t)
                if t.kind == TokenKind::Identifier
                    || t.is_keyword("int")
                    || t.is_keyword("char")
                    || t.is_keyword("boolean") =>
            {
                let ty = t.lexeme.clone();
                self.index += 1;
                Ok(ty)
            }
            _ => Err(self.unexpected("type")),
        }
    }

    /// Reads `ident ("," ident)* ";"`, defining each name in order.
    fn parse_var_names(&mut self, ty: &str, kind: Kind) -> Result<()> {
        loop {
            let name = self.expect_ident("variable name")?;
            self.symbol_table.define(&name, ty, kind)?;
            if !self.consume_symbol(',') {
                break;
            }
        }
        self.expect_symbol(';')
    }

    /// class_var_dec = ("static" | "field") type ident ("," ident)* ";"
    fn parse_class_var_dec(&mut self) -> Result<()> {
        let kind = if self.consume_keyword("static") {
            Kind::Static
        } else {
            self.expect_keyword("field")?;
            Kind::Field
        };
        let ty = self.parse_type()?;
        self.parse_var_names(&ty, kind)
    }

    /// subroutine_dec = ("constructor" | "function" | "method") (type | "void") ident
    ///                  "(" parameter_list ")" subroutine_body
    fn parse_subroutine_dec(&mut self) -> Result<()> {
        let kind = match self.peek() {
            Some(t) if t.kind == TokenKind::Keyword => SubroutineKind::from_keyword(&t.lexeme),
            _ => None,
        }
        .ok_or_else(|| self.unexpected("subroutine declaration"))?;
        self.index += 1;

        self.return_type = if self.consume_keyword("void") {
            "void".to_string()
        } else {
            self.parse_type()?
        };
        self.subroutine_name = self.expect_ident("subroutine name")?;
        self.symbol_table
            .start_subroutine(self.codegen.class_name(), kind);

        self.expect_symbol('(')?;
        self.parse_parameter_list()?;
        self.expect_symbol(')')?;
        self.parse_subroutine_body(kind)
    }

    /// parameter_list = (type ident ("," type ident)*)?
    fn parse_parameter_list(&mut self) -> Result<()> {
        if self.at_symbol(')') {
            return Ok(());
        }
        loop {
            let ty = self.parse_type()?;
            let name = self.expect_ident("parameter name")?;
            self.symbol_table.define(&name, &ty, Kind::Argument)?;
            if !self.consume_symbol(',') {
                return Ok(());
            }
        }
    }

    /// subroutine_body = "{" var_dec* statements "}"
    ///
    /// The function header needs the local count, so it is written only
    /// once every `var` declaration has been read.
    fn parse_subroutine_body(&mut self, kind: SubroutineKind) -> Result<()> {
        self.expect_symbol('{')?;
        while self.at_keyword("var") {
            self.parse_var_dec()?;
        }

        let locals = usize::from(self.symbol_table.count(Kind::Local)?);
        debug!(
            subroutine = %self.subroutine_name,
            ?kind,
            locals,
            "compiling subroutine"
        );
        self.codegen.write_function(&self.subroutine_name, locals);
        match kind {
            SubroutineKind::Constructor => {
                let fields = self.symbol_table.count(Kind::Field)?;
                self.codegen.write_push(Segment::Constant, fields);
                self.codegen.write_call("Memory.alloc", 1);
                self.codegen.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Method => {
                self.codegen.write_push(Segment::Argument, 0);
                self.codegen.write_pop(Segment::Pointer, 0);
            }
            SubroutineKind::Function => (),
        }

        self.parse_statements()?;
        self.expect_symbol('}')
    }

    /// var_dec = "var" type ident ("," ident)* ";"
    fn parse_var_dec(&mut self) -> Result<()> {
        self.expect_keyword("var")?;
        let ty = self.parse_type()?;
        self.parse_var_names(&ty, Kind::Local)
    }

    /// statements = (let | if | while | do | return)*
    fn parse_statements(&mut self) -> Result<()> {
        loop {
            if self.at_keyword("let") {
                self.parse_let()?;
            } else if self.at_keyword("if") {
                self.parse_if()?;
            } else if self.at_keyword("while") {
                self.parse_while()?;
            } else if self.at_keyword("do") {
                self.parse_do()?;
            } else if self.at_keyword("return") {
                self.parse_return()?;
            } else {
                return Ok(());
            }
        }
    }

    /// "{" statements "}"
    fn parse_block(&mut self) -> Result<()> {
        self.expect_symbol('{')?;
        self.parse_statements()?;
        self.expect_symbol('}')
    }

    /// let = "let" ident ("[" expr "]")? "=" expr ";"
    fn parse_let(&mut self) -> Result<()> {
        self.expect_keyword("let")?;
        let name = self.expect_ident("variable name")?;
        let index = if self.consume_symbol('[') {
            let index = self.parse_expression()?;
            self.expect_symbol(']')?;
            Some(index)
        } else {
            None
        };
        self.expect_symbol('=')?;
        let value = self.parse_expression()?;
        self.expect_symbol(';')?;

        self.codegen.gen_expr(&value, &self.symbol_table)?;
        let target = self.symbol_table.resolve(&name)?;
        match index {
            None => self.codegen.write_pop_symbol(target),
            Some(index) => {
                // The value stays on the stack below the element address.
                self.codegen
                    .gen_element_address(target, &index, &self.symbol_table)?;
                self.codegen.write_pop(Segment::That, 0);
            }
        }
        Ok(())
    }

    /// if = "if" "(" expr ")" "{" statements "}" ("else" "{" statements "}")?
    fn parse_if(&mut self) -> Result<()> {
        self.expect_keyword("if")?;
        self.expect_symbol('(')?;
        let condition = self.parse_expression()?;
        self.expect_symbol(')')?;

        let else_label = self.codegen.new_label();
        let end_label = self.codegen.new_label();

        self.codegen.gen_expr(&condition, &self.symbol_table)?;
        self.codegen.write_arithmetic(ArithmeticOp::Not);
        self.codegen.write_if(&else_label);
        self.parse_block()?;
        self.codegen.write_goto(&end_label);
        self.codegen.write_label(&else_label);
        if self.consume_keyword("else") {
            self.parse_block()?;
        }
        self.codegen.write_label(&end_label);
        Ok(())
    }

    /// while = "while" "(" expr ")" "{" statements "}"
    fn parse_while(&mut self) -> Result<()> {
        self.expect_keyword("while")?;
        self.expect_symbol('(')?;
        let condition = self.parse_expression()?;
        self.expect_symbol(')')?;

        let top_label = self.codegen.new_label();
        let end_label = self.codegen.new_label();

        self.codegen.write_label(&top_label);
        self.codegen.gen_expr(&condition, &self.symbol_table)?;
        self.codegen.write_arithmetic(ArithmeticOp::Not);
        self.codegen.write_if(&end_label);
        self.parse_block()?;
        self.codegen.write_goto(&top_label);
        self.codegen.write_label(&end_label);
        Ok(())
    }

    /// do = "do" subroutine_call ";"
    fn parse_do(&mut self) -> Result<()> {
        self.expect_keyword("do")?;
        let start = self.index;
        self.expect_subroutine_call()?;
        let call = Expr::from_span(&self.tokens[start..self.index])?;
        self.expect_symbol(';')?;

        self.codegen.gen_expr(&call, &self.symbol_table)?;
        self.codegen.write_pop(Segment::Temp, 0);
        Ok(())
    }

    /// return = "return" expr? ";"
    fn parse_return(&mut self) -> Result<()> {
        self.expect_keyword("return")?;
        let value = if self.at_symbol(';') {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_symbol(';')?;

        let is_void = self.return_type == "void";
        match value {
            Some(_) if is_void => {
                return Err(self.type_mismatch("a void subroutine cannot return a value".into()))
            }
            None if !is_void => {
                let message = format!("expected a return value of type `{}`", self.return_type);
                return Err(self.type_mismatch(message));
            }
            Some(value) => self.codegen.gen_expr(&value, &self.symbol_table)?,
            None => self.codegen.write_push(Segment::Constant, 0),
        }
        self.codegen.write_return();
        Ok(())
    }

    fn type_mismatch(&self, message: String) -> Error {
        Error::TypeMismatch {
            subroutine: format!("{}.{}", self.codegen.class_name(), self.subroutine_name),
            message,
        }
    }

    /// Parses one expression and builds its tree from the tokens it spans.
    fn parse_expression(&mut self) -> Result<Expr> {
        let start = self.index;
        self.expect_expression()?;
        Expr::from_span(&self.tokens[start..self.index])
    }

    /// expr = term (op term)*
    fn expect_expression(&mut self) -> Result<()> {
        self.expect_term()?;
        while self
            .peek()
            .and_then(Token::symbol)
            .and_then(BinOpKind::from_symbol)
            .is_some()
        {
            self.index += 1;
            self.expect_term()?;
        }
        Ok(())
    }

    fn expect_term(&mut self) -> Result<()> {
        if self.depth > MAX_NESTING {
            let line = self.peek().map_or(1, |t| t.line);
            return Err(Error::NestingTooDeep { line });
        }
        self.depth += 1;
        let result = self.expect_term_inner();
        self.depth -= 1;
        result
    }

    /// term = integer | string | keyword_constant
    ///      | ident | ident "[" expr "]" | subroutine_call
    ///      | "(" expr ")"
    ///      | unary_op term
    fn expect_term_inner(&mut self) -> Result<()> {
        let (kind, symbol, keyword_constant) = match self.peek() {
            Some(t) => (
                t.kind,
                t.symbol(),
                KeywordConstant::from_keyword(&t.lexeme).is_some(),
            ),
            None => return Err(self.unexpected("term")),
        };

        match kind {
            TokenKind::IntegerConstant | TokenKind::StringConstant => self.index += 1,
            TokenKind::Keyword if keyword_constant => self.index += 1,
            TokenKind::Identifier => {
                let next = self.tokens.get(self.index + 1);
                if next.is_some_and(|t| t.is_symbol('(') || t.is_symbol('.')) {
                    self.expect_subroutine_call()?;
                } else if next.is_some_and(|t| t.is_symbol('[')) {
                    self.index += 2;
                    self.expect_expression()?;
                    self.expect_symbol(']')?;
                } else {
                    self.index += 1;
                }
            }
            TokenKind::Symbol if symbol == Some('(') => {
                self.index += 1;
                self.expect_expression()?;
                self.expect_symbol(')')?;
            }
            TokenKind::Symbol if symbol.and_then(UnaryOpKind::from_symbol).is_some() => {
                self.index += 1;
                self.expect_term()?;
            }
            _ => return Err(self.unexpected("term")),
        }
        Ok(())
    }

    /// subroutine_call = ident ("." ident)? "(" (expr ("," expr)*)? ")"
    fn expect_subroutine_call(&mut self) -> Result<()> {
        self.expect_ident("subroutine name")?;
        if self.consume_symbol('.') {
            self.expect_ident("subroutine name")?;
        }
        self.expect_symbol('(')?;
        if !self.at_symbol(')') {
            self.expect_expression()?;
            while self.consume_symbol(',') {
                self.expect_expression()?;
            }
        }
        self.expect_symbol(')')
    }
}
