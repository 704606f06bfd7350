//! Virtual Machine executor
//!
//! 直接解释残余程序的语法树。值采用复制语义：移植得到的序列是独立副本。

use super::errors::{RuntimeError, VMResult};
use super::frames::Frame;
use crate::frontend::parser::ast::BinOp;
use crate::middle::{ObjExpr, ObjFunction, ObjStmt, ResidualProgram};
use crate::runtime::{ops, Value};
use indexmap::IndexMap;
use tracing::debug;

/// VM 配置
#[derive(Debug, Clone)]
pub struct VMConfig {
    /// 最大调用深度
    pub max_call_depth: usize,
    /// `print` 输出时同时写到标准输出
    pub echo_output: bool,
}

impl Default for VMConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
            echo_output: false,
        }
    }
}

/// 语句执行结果
enum Flow {
    Normal,
    Return(Value),
}

/// Residual program interpreter
#[derive(Debug)]
pub struct VM<'p> {
    program: &'p ResidualProgram,
    config: VMConfig,
    globals: IndexMap<String, Value>,
    frames: Vec<Frame>,
    output: Vec<String>,
}

impl<'p> VM<'p> {
    /// 创建虚拟机
    pub fn new(program: &'p ResidualProgram) -> Self {
        Self::with_config(program, VMConfig::default())
    }

    /// 使用指定配置创建虚拟机
    pub fn with_config(
        program: &'p ResidualProgram,
        config: VMConfig,
    ) -> Self {
        Self {
            program,
            config,
            globals: IndexMap::new(),
            frames: Vec::new(),
            output: Vec::new(),
        }
    }

    /// 初始化全局变量，然后调用 `main`（如果存在）
    pub fn run(&mut self) -> VMResult<Value> {
        let program = self.program;
        for global in &program.globals {
            debug!("initializing global `{}`", global.name);
            self.frames.push(Frame::new(format!("<init {}>", global.name)));
            let value = self.eval(&global.init);
            self.frames.pop();
            self.globals.insert(global.name.clone(), value?);
        }
        if program.function("main").is_some() {
            self.call("main", Vec::new())
        } else {
            Ok(Value::Unit)
        }
    }

    /// 调用残余函数
    pub fn call(
        &mut self,
        name: &str,
        args: Vec<Value>,
    ) -> VMResult<Value> {
        let program = self.program;
        let function = program
            .function(name)
            .ok_or_else(|| RuntimeError::UndefinedFunction(name.to_string()))?;
        self.invoke(function, args)
    }

    fn invoke(
        &mut self,
        function: &ObjFunction,
        args: Vec<Value>,
    ) -> VMResult<Value> {
        if function.params.len() != args.len() {
            return Err(RuntimeError::ArgCountMismatch {
                callee: function.name.clone(),
                expected: function.params.len(),
                found: args.len(),
            });
        }
        if self.frames.len() >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow(self.config.max_call_depth));
        }
        let mut frame = Frame::new(function.name.clone());
        for (param, arg) in function.params.iter().zip(args) {
            frame.declare(&param.name, arg);
        }
        self.frames.push(frame);
        let flow = self.exec_body(&function.body);
        self.frames.pop();
        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Unit),
        }
    }

    /// `print` 输出的所有行
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// 取走输出
    pub fn into_output(self) -> Vec<String> {
        self.output
    }

    /// 全局变量的当前值
    pub fn global(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.globals.get(name)
    }

    fn frame(&self) -> VMResult<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| RuntimeError::InvalidState("no active frame".to_string()))
    }

    fn frame_mut(&mut self) -> VMResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| RuntimeError::InvalidState("no active frame".to_string()))
    }

    fn exec_body(
        &mut self,
        stmts: &[ObjStmt],
    ) -> VMResult<Flow> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_scoped(
        &mut self,
        stmts: &[ObjStmt],
    ) -> VMResult<Flow> {
        self.frame_mut()?.push_scope();
        let flow = self.exec_body(stmts);
        self.frame_mut()?.pop_scope();
        flow
    }

    fn exec(
        &mut self,
        stmt: &ObjStmt,
    ) -> VMResult<Flow> {
        match stmt {
            ObjStmt::Let { name, init } => {
                let value = self.eval(init)?;
                self.frame_mut()?.declare(name, value);
            }
            ObjStmt::Assign {
                name,
                indices,
                value,
            } => {
                let value = self.eval(value)?;
                let indices = self.eval_all(indices)?;
                self.store(name, &indices, value)?;
            }
            ObjStmt::Expr(expr) => {
                self.eval(expr)?;
            }
            ObjStmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let body = if self.eval_bool(cond)? {
                    then_body
                } else {
                    else_body
                };
                return self.exec_scoped(body);
            }
            ObjStmt::While { cond, body } => {
                while self.eval_bool(cond)? {
                    if let Flow::Return(value) = self.exec_scoped(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            ObjStmt::For {
                var,
                start,
                end,
                body,
            } => {
                let start = self.eval_int(start)?;
                let end = self.eval_int(end)?;
                for i in start..end {
                    self.frame_mut()?.push_scope();
                    self.frame_mut()?.declare(var, Value::Int(i));
                    let flow = self.exec_body(body);
                    self.frame_mut()?.pop_scope();
                    if let Flow::Return(value) = flow? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            ObjStmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Unit,
                };
                return Ok(Flow::Return(value));
            }
            ObjStmt::Block(body) => return self.exec_scoped(body),
        }
        Ok(Flow::Normal)
    }

    fn eval_int(
        &mut self,
        expr: &ObjExpr,
    ) -> VMResult<i64> {
        let value = self.eval(expr)?;
        value
            .as_int()
            .ok_or_else(|| RuntimeError::TypeError(format!("expected int, found {}", value.type_name())))
    }

    fn eval_bool(
        &mut self,
        expr: &ObjExpr,
    ) -> VMResult<bool> {
        let value = self.eval(expr)?;
        value
            .as_bool()
            .ok_or_else(|| RuntimeError::TypeError(format!("expected bool, found {}", value.type_name())))
    }

    fn eval_all(
        &mut self,
        exprs: &[ObjExpr],
    ) -> VMResult<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn eval(
        &mut self,
        expr: &ObjExpr,
    ) -> VMResult<Value> {
        match expr {
            ObjExpr::Lit(literal) => Ok(literal.to_value()),
            ObjExpr::Var(name) => self.load(name),
            ObjExpr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                Ok(ops::unary(*op, &value)?)
            }
            ObjExpr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                match (op, lhs.as_bool()) {
                    (BinOp::And, Some(false)) => return Ok(Value::Bool(false)),
                    (BinOp::Or, Some(true)) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let rhs = self.eval(rhs)?;
                Ok(ops::binary(*op, &lhs, &rhs)?)
            }
            ObjExpr::Call { callee, args } => {
                let args = self.eval_all(args)?;
                if callee == "print" {
                    self.print(&args);
                    return Ok(Value::Unit);
                }
                self.call(callee, args)
            }
            ObjExpr::Index { base, index } => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                Ok(ops::index(&base, &index)?)
            }
            ObjExpr::Method {
                receiver,
                method,
                args,
            } => {
                let mut current = self.eval(receiver)?;
                let args = self.eval_all(args)?;
                let result = ops::method(&mut current, method, args)?;
                if ops::is_mutating_method(method) {
                    if let Some((name, indices)) = place(receiver) {
                        let indices = self.eval_all(&indices)?;
                        self.store(name, &indices, current)?;
                    }
                }
                Ok(result)
            }
            ObjExpr::List { elem, items } => {
                let items = self.eval_all(items)?;
                let elem = items
                    .first()
                    .map(Value::type_desc)
                    .unwrap_or_else(|| elem.clone());
                Ok(Value::Vec { elem, items })
            }
            ObjExpr::Block { stmts, result } => {
                self.frame_mut()?.push_scope();
                let value = match self.exec_body(stmts) {
                    Ok(Flow::Normal) => self.eval(result),
                    Ok(Flow::Return(_)) => Err(RuntimeError::InvalidState(
                        "`return` inside a block expression".to_string(),
                    )),
                    Err(err) => Err(err),
                };
                self.frame_mut()?.pop_scope();
                value
            }
        }
    }

    fn print(
        &mut self,
        args: &[Value],
    ) {
        let line = args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        if self.config.echo_output {
            println!("{}", line);
        }
        self.output.push(line);
    }

    fn load(
        &self,
        name: &str,
    ) -> VMResult<Value> {
        if let Some(value) = self.frame()?.get(name) {
            return Ok(value.clone());
        }
        self.globals
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    /// `name[i][j].. = value`
    fn store(
        &mut self,
        name: &str,
        indices: &[Value],
        value: Value,
    ) -> VMResult<()> {
        let slot = match self.frames.last_mut().and_then(|frame| frame.get_mut(name)) {
            Some(slot) => slot,
            None => self
                .globals
                .get_mut(name)
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))?,
        };
        store_path(slot, indices, value)
    }
}

fn store_path(
    slot: &mut Value,
    indices: &[Value],
    value: Value,
) -> VMResult<()> {
    match indices {
        [] => {
            *slot = value;
            Ok(())
        }
        [last] => Ok(ops::set_index(slot, last, value)?),
        [first, rest @ ..] => {
            let mut inner = ops::index(slot, first)?;
            store_path(&mut inner, rest, value)?;
            Ok(ops::set_index(slot, first, inner)?)
        }
    }
}

/// Root name and index expressions of an assignable expression
fn place(expr: &ObjExpr) -> Option<(&str, Vec<ObjExpr>)> {
    match expr {
        ObjExpr::Var(name) => Some((name.as_str(), Vec::new())),
        ObjExpr::Index { base, index } => {
            let (name, mut indices) = place(base)?;
            indices.push((**index).clone());
            Some((name, indices))
        }
        _ => None,
    }
}
