//! Script AST and its JSON decoder.
//!
//! The decoder walks a `serde_json::Value` by hand so that every node keeps
//! the JSON path it was read from (`$.body[2].expression.arguments[0]`).
//! Errors raised later by lowering point back at the offending node this way.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AstError {
    #[error("malformed AST JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported node `{node}` at {path}")]
    UnsupportedNode { node: String, path: String },

    #[error("malformed node at {path}: {message}")]
    Malformed { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expr),
    VariableDeclaration {
        kind: DeclarationKind,
        declarations: Vec<Declarator>,
    },
    If {
        test: Expr,
        consequent: Vec<Statement>,
        alternate: Option<Vec<Statement>>,
    },
}

/// `var` and `const` lower identically; the kind is kept for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Const,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub id: Pattern,
    pub init: Option<Expr>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Identifier(String),
    /// `[a, b, c] = f(...)` for tuple-valued calls.
    Array(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Identifier(String),
    Literal(Literal),
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        computed: bool,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Object(Vec<Property>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Bool(bool),
    String(String),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "&&" | "and" => BinaryOp::And,
            "||" | "or" => BinaryOp::Or,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

impl UnaryOp {
    pub fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "-" => UnaryOp::Neg,
            "+" => UnaryOp::Plus,
            "!" | "not" => UnaryOp::Not,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
        }
    }
}

impl Expr {
    /// `a.b.c` for identifier/member chains, `None` for anything else.
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Identifier(name) => Some(name.clone()),
            ExprKind::Member {
                object,
                property,
                computed: false,
            } => {
                let ExprKind::Identifier(prop) = &property.kind else {
                    return None;
                };
                Some(format!("{}.{prop}", object.dotted_name()?))
            }
            _ => None,
        }
    }
}

// ── Decoding ──

/// Parse and decode an AST JSON document.
pub fn parse_program(json: &str) -> Result<Program, AstError> {
    let value: Value = serde_json::from_str(json)?;
    decode_program(&value)
}

pub fn decode_program(value: &Value) -> Result<Program, AstError> {
    let path = "$";
    expect_type(value, path, "Program")?;
    let body = array_field(value, path, "body")?
        .iter()
        .enumerate()
        .map(|(i, v)| statement(v, &format!("{path}.body[{i}]")))
        .collect::<Result<_, _>>()?;
    Ok(Program { body })
}

fn statement(v: &Value, path: &str) -> Result<Statement, AstError> {
    match node_type(v, path)? {
        "ExpressionStatement" => Ok(Statement::Expression(expr(
            field(v, path, "expression")?,
            &format!("{path}.expression"),
        )?)),
        "VariableDeclaration" => {
            let kind = match v.get("kind").and_then(Value::as_str) {
                Some("const") => DeclarationKind::Const,
                Some("var") | None => DeclarationKind::Var,
                Some(other) => {
                    return Err(malformed(path, format!("unknown declaration kind `{other}`")))
                }
            };
            let declarations = array_field(v, path, "declarations")?
                .iter()
                .enumerate()
                .map(|(i, d)| declarator(d, &format!("{path}.declarations[{i}]")))
                .collect::<Result<_, _>>()?;
            Ok(Statement::VariableDeclaration { kind, declarations })
        }
        "IfStatement" => {
            let test = expr(field(v, path, "test")?, &format!("{path}.test"))?;
            let consequent = block(field(v, path, "consequent")?, &format!("{path}.consequent"))?;
            let alternate = match v.get("alternate") {
                None | Some(Value::Null) => None,
                Some(alt) => Some(block(alt, &format!("{path}.alternate"))?),
            };
            Ok(Statement::If {
                test,
                consequent,
                alternate,
            })
        }
        other => Err(unsupported(other, path)),
    }
}

/// A branch body: an array of statements, a `BlockStatement`, or a single
/// statement.
fn block(v: &Value, path: &str) -> Result<Vec<Statement>, AstError> {
    if let Value::Array(items) = v {
        return items
            .iter()
            .enumerate()
            .map(|(i, s)| statement(s, &format!("{path}[{i}]")))
            .collect();
    }
    if node_type(v, path)? == "BlockStatement" {
        return block(field(v, path, "body")?, &format!("{path}.body"));
    }
    Ok(vec![statement(v, path)?])
}

fn declarator(v: &Value, path: &str) -> Result<Declarator, AstError> {
    expect_type(v, path, "VariableDeclarator")?;
    let id_path = format!("{path}.id");
    let id_value = field(v, path, "id")?;
    let id = match node_type(id_value, &id_path)? {
        "Identifier" => Pattern::Identifier(identifier_name(id_value, &id_path)?),
        "ArrayPattern" => Pattern::Array(
            array_field(id_value, &id_path, "elements")?
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    let p = format!("{id_path}.elements[{i}]");
                    expect_type(e, &p, "Identifier")?;
                    identifier_name(e, &p)
                })
                .collect::<Result<_, _>>()?,
        ),
        other => return Err(unsupported(other, &id_path)),
    };
    let init = match v.get("init") {
        None | Some(Value::Null) => None,
        Some(init) => Some(expr(init, &format!("{path}.init"))?),
    };
    Ok(Declarator {
        id,
        init,
        path: path.to_string(),
    })
}

fn expr(v: &Value, path: &str) -> Result<Expr, AstError> {
    let child = |name: &str| -> Result<Box<Expr>, AstError> {
        Ok(Box::new(expr(field(v, path, name)?, &format!("{path}.{name}"))?))
    };
    let kind = match node_type(v, path)? {
        "Identifier" => ExprKind::Identifier(identifier_name(v, path)?),
        "Literal" => ExprKind::Literal(match v.get("value") {
            None | Some(Value::Null) => Literal::Null,
            Some(Value::Bool(b)) => Literal::Bool(*b),
            Some(Value::String(s)) => Literal::String(s.clone()),
            Some(Value::Number(n)) => Literal::Number(
                n.as_f64()
                    .ok_or_else(|| malformed(path, format!("number {n} is not representable")))?,
            ),
            Some(other) => return Err(malformed(path, format!("unsupported literal {other}"))),
        }),
        "MemberExpression" => ExprKind::Member {
            object: child("object")?,
            property: child("property")?,
            computed: v.get("computed").and_then(Value::as_bool).unwrap_or(false),
        },
        "CallExpression" => ExprKind::Call {
            callee: child("callee")?,
            arguments: match v.get("arguments") {
                None | Some(Value::Null) => Vec::new(),
                Some(_) => array_field(v, path, "arguments")?
                    .iter()
                    .enumerate()
                    .map(|(i, a)| expr(a, &format!("{path}.arguments[{i}]")))
                    .collect::<Result<_, _>>()?,
            },
        },
        "ObjectExpression" => ExprKind::Object(
            array_field(v, path, "properties")?
                .iter()
                .enumerate()
                .map(|(i, p)| property(p, &format!("{path}.properties[{i}]")))
                .collect::<Result<_, _>>()?,
        ),
        node @ ("BinaryExpression" | "LogicalExpression") => {
            let op_text = string_field(v, path, "operator")?;
            let op = BinaryOp::parse(op_text)
                .ok_or_else(|| unsupported(&format!("{node} `{op_text}`"), path))?;
            ExprKind::Binary {
                op,
                left: child("left")?,
                right: child("right")?,
            }
        }
        "UnaryExpression" => {
            let op_text = string_field(v, path, "operator")?;
            let op = UnaryOp::parse(op_text)
                .ok_or_else(|| unsupported(&format!("UnaryExpression `{op_text}`"), path))?;
            ExprKind::Unary {
                op,
                argument: child("argument")?,
            }
        }
        "ConditionalExpression" => ExprKind::Conditional {
            test: child("test")?,
            consequent: child("consequent")?,
            alternate: child("alternate")?,
        },
        other => return Err(unsupported(other, path)),
    };
    Ok(Expr {
        kind,
        path: path.to_string(),
    })
}

fn property(v: &Value, path: &str) -> Result<Property, AstError> {
    expect_type(v, path, "Property")?;
    let key_path = format!("{path}.key");
    let key_value = field(v, path, "key")?;
    let key = match node_type(key_value, &key_path)? {
        "Identifier" => identifier_name(key_value, &key_path)?,
        "Literal" => match key_value.get("value") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(malformed(&key_path, "property key must be a string")),
        },
        other => return Err(unsupported(other, &key_path)),
    };
    let value = expr(field(v, path, "value")?, &format!("{path}.value"))?;
    Ok(Property { key, value })
}

// ── JSON helpers ──

fn node_type<'a>(v: &'a Value, path: &str) -> Result<&'a str, AstError> {
    v.get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(path, "missing node `type`"))
}

fn expect_type(v: &Value, path: &str, expected: &str) -> Result<(), AstError> {
    match node_type(v, path)? {
        t if t == expected => Ok(()),
        other => Err(unsupported(other, path)),
    }
}

fn field<'a>(v: &'a Value, path: &str, name: &str) -> Result<&'a Value, AstError> {
    v.get(name)
        .filter(|f| !f.is_null())
        .ok_or_else(|| malformed(path, format!("missing field `{name}`")))
}

fn array_field<'a>(v: &'a Value, path: &str, name: &str) -> Result<&'a Vec<Value>, AstError> {
    field(v, path, name)?
        .as_array()
        .ok_or_else(|| malformed(path, format!("field `{name}` must be an array")))
}

fn string_field<'a>(v: &'a Value, path: &str, name: &str) -> Result<&'a str, AstError> {
    field(v, path, name)?
        .as_str()
        .ok_or_else(|| malformed(path, format!("field `{name}` must be a string")))
}

fn identifier_name(v: &Value, path: &str) -> Result<String, AstError> {
    string_field(v, path, "name").map(str::to_string)
}

fn unsupported(node: &str, path: &str) -> AstError {
    AstError::UnsupportedNode {
        node: node.to_string(),
        path: path.to_string(),
    }
}

fn malformed(path: &str, message: impl Into<String>) -> AstError {
    AstError::Malformed {
        path: path.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ident(name: &str) -> Value {
        json!({"type": "Identifier", "name": name})
    }

    fn num(v: f64) -> Value {
        json!({"type": "Literal", "value": v, "raw": v.to_string()})
    }

    #[test]
    fn decodes_declaration_with_call() {
        let ast = json!({
            "type": "Program",
            "body": [{
                "type": "VariableDeclaration",
                "kind": "const",
                "declarations": [{
                    "type": "VariableDeclarator",
                    "id": ident("fast"),
                    "init": {
                        "type": "CallExpression",
                        "callee": {"type": "MemberExpression", "object": ident("ta"),
                                   "property": ident("sma"), "computed": false},
                        "arguments": [ident("close"), num(20.0)]
                    }
                }]
            }]
        });
        let program = decode_program(&ast).unwrap();
        let Statement::VariableDeclaration { kind, declarations } = &program.body[0] else {
            panic!("expected declaration");
        };
        assert_eq!(*kind, DeclarationKind::Const);
        assert_eq!(declarations[0].id, Pattern::Identifier("fast".into()));
        let init = declarations[0].init.as_ref().unwrap();
        let ExprKind::Call { callee, arguments } = &init.kind else {
            panic!("expected call");
        };
        assert_eq!(callee.dotted_name().as_deref(), Some("ta.sma"));
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[1].path, "$.body[0].declarations[0].init.arguments[1]");
    }

    #[test]
    fn unknown_node_reports_type_and_path() {
        let ast = json!({
            "type": "Program",
            "body": [{"type": "ExpressionStatement",
                      "expression": {"type": "ArrowFunctionExpression"}}]
        });
        match decode_program(&ast) {
            Err(AstError::UnsupportedNode { node, path }) => {
                assert_eq!(node, "ArrowFunctionExpression");
                assert_eq!(path, "$.body[0].expression");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_operator_is_unsupported() {
        let ast = json!({
            "type": "Program",
            "body": [{"type": "ExpressionStatement",
                      "expression": {"type": "BinaryExpression", "operator": "**",
                                     "left": num(1.0), "right": num(2.0)}}]
        });
        assert!(matches!(
            decode_program(&ast),
            Err(AstError::UnsupportedNode { .. })
        ));
    }

    #[test]
    fn if_accepts_single_node_and_array_branches() {
        let stmt = json!({"type": "ExpressionStatement", "expression": ident("x")});
        let ast = json!({
            "type": "Program",
            "body": [{"type": "IfStatement", "test": ident("c"),
                      "consequent": stmt, "alternate": [stmt, stmt]}]
        });
        let program = decode_program(&ast).unwrap();
        let Statement::If {
            consequent,
            alternate,
            ..
        } = &program.body[0]
        else {
            panic!("expected if");
        };
        assert_eq!(consequent.len(), 1);
        assert_eq!(alternate.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn array_pattern_and_object_arguments() {
        let ast = json!({
            "type": "Program",
            "body": [
                {"type": "VariableDeclaration", "kind": "var", "declarations": [{
                    "type": "VariableDeclarator",
                    "id": {"type": "ArrayPattern", "elements": [ident("m"), ident("u"), ident("l")]},
                    "init": {"type": "CallExpression", "callee": ident("bb"), "arguments": []}
                }]},
                {"type": "ExpressionStatement", "expression": {
                    "type": "ObjectExpression",
                    "properties": [{"type": "Property", "key": ident("title"),
                                    "value": {"type": "Literal", "value": "x", "raw": "'x'"},
                                    "kind": "init", "method": false, "shorthand": false,
                                    "computed": false}]
                }}
            ]
        });
        let program = decode_program(&ast).unwrap();
        let Statement::VariableDeclaration { declarations, .. } = &program.body[0] else {
            panic!("expected declaration");
        };
        assert_eq!(
            declarations[0].id,
            Pattern::Array(vec!["m".into(), "u".into(), "l".into()])
        );
        let Statement::Expression(e) = &program.body[1] else {
            panic!("expected expression");
        };
        let ExprKind::Object(props) = &e.kind else {
            panic!("expected object");
        };
        assert_eq!(props[0].key, "title");
    }

    #[test]
    fn invalid_json_is_reported() {
        assert!(matches!(parse_program("{"), Err(AstError::Json(_))));
    }

    #[test]
    fn missing_field_is_malformed() {
        let ast = json!({"type": "Program", "body": [{"type": "ExpressionStatement"}]});
        assert!(matches!(
            decode_program(&ast),
            Err(AstError::Malformed { .. })
        ));
    }
}
