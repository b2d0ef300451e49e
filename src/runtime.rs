//! C11: tree-walking runtime (spec.md §4.11). Executes an axiom-checked
//! [`Program`] directly — the compiler's job is static verification, not
//! producing a separate instruction tape to replay.
//!
//! `Context` holds everything the spec's "Environment" describes except the
//! `Mary` reference itself: a speaker-name→id map, the current speaker, a
//! function table, a scope stack, sealed keys, and a captured output buffer.
//! `Mary` is threaded through every call as an explicit `&mut Mary` parameter
//! instead of a stored field — storing it would make the `when`/`while`
//! action closures (which also need `&mut Mary`, handed to them by
//! [`Mary::submit`]/[`Mary::submit_loop`]) alias the same reference twice.
//! Threading it as a parameter keeps `Context`'s fields and the kernel
//! reference disjoint, so `RefCell<Context>` only needs to guard against
//! reentrancy within the interpreter itself, never against the kernel.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{BinOp, Expr, FnDecl, Program, Stmt, UnOp};
use crate::compiler::CompiledProgram;
use crate::error::{HumanLogicaError, RuntimeError};
use crate::kernel::evaluator::DEFAULT_LOOP_BOUND;
use crate::kernel::Mary;
use crate::token::Pos;
use crate::value::Value;

type RResult<T> = Result<T, HumanLogicaError>;

/// What a statement sequence did on its way out: ran to completion, hit an
/// explicit `return`, or hit an explicit `pass` (early success, used inside
/// `when`/`while` action bodies — see [`exec_when`]).
#[derive(Debug, Clone)]
enum Flow {
    Normal,
    Return(Value),
    Pass,
}

pub struct Context {
    speaker_id: u64,
    speaker_name: String,
    functions: BTreeMap<String, FnDecl>,
    scopes: Vec<BTreeMap<String, Value>>,
    sealed: BTreeSet<(u64, String)>,
    output: Vec<String>,
}

impl Context {
    fn new(speaker_id: u64, speaker_name: String, functions: BTreeMap<String, FnDecl>) -> Self {
        Context {
            speaker_id,
            speaker_name,
            functions,
            scopes: Vec::new(),
            sealed: BTreeSet::new(),
            output: Vec::new(),
        }
    }

    fn enter_speaker(&mut self, speaker_id: u64, speaker_name: String) {
        self.speaker_id = speaker_id;
        self.speaker_name = speaker_name;
    }

    fn find_local(&self, name: &str) -> Option<Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name).cloned())
    }

    fn assign_local(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if scope.contains_key(name) {
                scope.insert(name.to_string(), value);
                return true;
            }
        }
        false
    }
}

/// Result of running a whole program: captured `speak` output, in order.
pub struct RunOutcome {
    pub output: Vec<String>,
}

pub fn run(program: &Program, compiled: &CompiledProgram, kernel: &mut Mary) -> RResult<RunOutcome> {
    let ctx = RefCell::new(Context::new(0, String::new(), compiled.functions.clone()));

    for f in &program.fns {
        ctx.borrow_mut().functions.insert(f.name.clone(), f.clone());
    }

    for decl in &program.speakers {
        if kernel.speaker_by_name(&decl.name).is_none() {
            kernel.create_speaker(0, &decl.name).map_err(HumanLogicaError::Runtime)?;
        }
    }

    for block in &program.as_blocks {
        let speaker = kernel
            .speaker_by_name(&block.speaker)
            .ok_or_else(|| {
                HumanLogicaError::Runtime(RuntimeError::new(
                    Option::None,
                    format!("speaker '{}' not found", block.speaker),
                ))
            })?
            .clone();
        kernel.set_speaker(speaker.id).map_err(HumanLogicaError::Runtime)?;
        ctx.borrow_mut().enter_speaker(speaker.id, speaker.name.clone());
        exec_block(kernel, &ctx, &block.body)?;
    }

    Ok(RunOutcome {
        output: ctx.into_inner().output,
    })
}

fn exec_block(kernel: &mut Mary, ctx: &RefCell<Context>, stmts: &[Stmt]) -> RResult<Flow> {
    for stmt in stmts {
        match exec_stmt(kernel, ctx, stmt)? {
            Flow::Normal => {}
            flow => return Ok(flow),
        }
    }
    Ok(Flow::Normal)
}

fn exec_stmt(kernel: &mut Mary, ctx: &RefCell<Context>, stmt: &Stmt) -> RResult<Flow> {
    match stmt {
        Stmt::Let { path, value, .. } => {
            let v = eval_expr(kernel, ctx, value)?;
            exec_let(kernel, ctx, path, v)?;
            Ok(Flow::Normal)
        }
        Stmt::Speak { value, pos } => {
            let v = eval_expr(kernel, ctx, value)?;
            let speaker_id = ctx.borrow().speaker_id;
            let label = format!("speak@{}:{}:{v}", pos.line, pos.col);
            kernel.submit(speaker_id, Option::None, label, true, false, Option::None, |_| {
                let mut c = ctx.borrow_mut();
                let line = format!("  [{}] {}", c.speaker_name, v);
                c.output.push(line);
                true
            });
            Ok(Flow::Normal)
        }
        Stmt::When {
            cond,
            active,
            otherwise,
            broken,
            pos,
        } => exec_when(kernel, ctx, cond, active, otherwise, broken, *pos),
        Stmt::If {
            cond,
            then_body,
            elifs,
            else_body,
            ..
        } => exec_if(kernel, ctx, cond, then_body, elifs, else_body),
        Stmt::While { cond, max, body, pos } => exec_while(kernel, ctx, cond, max, body, *pos),
        Stmt::FnDef(f) => {
            ctx.borrow_mut().functions.insert(f.name.clone(), f.clone());
            Ok(Flow::Normal)
        }
        Stmt::Return { value, .. } => {
            let v = match value {
                Some(e) => eval_expr(kernel, ctx, e)?,
                Option::None => Value::None,
            };
            Ok(Flow::Return(v))
        }
        Stmt::Request { target, action, .. } => {
            exec_request(kernel, ctx, target, action)?;
            Ok(Flow::Normal)
        }
        Stmt::Respond { accept, .. } => {
            exec_respond(kernel, ctx, *accept)?;
            Ok(Flow::Normal)
        }
        Stmt::Inspect { target, .. } => {
            exec_inspect(kernel, ctx, target);
            Ok(Flow::Normal)
        }
        Stmt::History { target, .. } => {
            exec_history(kernel, ctx, target);
            Ok(Flow::Normal)
        }
        Stmt::Ledger { last, count, .. } => {
            exec_ledger(kernel, ctx, *last, count.as_ref())?;
            Ok(Flow::Normal)
        }
        Stmt::Verify { .. } => {
            let ok = kernel.ledger_verify();
            ctx.borrow_mut().output.push(format!("ledger verified: {ok}"));
            Ok(Flow::Normal)
        }
        Stmt::Seal { name, .. } => {
            let speaker_id = ctx.borrow().speaker_id;
            let key = strip_self_prefix(ctx, name);
            kernel.seal(speaker_id, &key);
            ctx.borrow_mut().sealed.insert((speaker_id, key));
            Ok(Flow::Normal)
        }
        Stmt::Pass { .. } => Ok(Flow::Pass),
        Stmt::Fail { reason, .. } => {
            let message = match reason {
                Some(e) => eval_expr(kernel, ctx, e)?.to_string(),
                Option::None => "explicit fail".to_string(),
            };
            let speaker_id = ctx.borrow().speaker_id;
            Err(HumanLogicaError::Runtime(kernel.log_fail(speaker_id, &message)))
        }
        Stmt::ExpressionStatement { expr, .. } => {
            eval_expr(kernel, ctx, expr)?;
            Ok(Flow::Normal)
        }
    }
}

fn strip_self_prefix(ctx: &RefCell<Context>, path: &str) -> String {
    let c = ctx.borrow();
    match path.split_once('.') {
        Some((prefix, rest)) if prefix == "self" || prefix == c.speaker_name => rest.to_string(),
        _ => path.to_string(),
    }
}

/// `let` target resolution (spec.md §4.11 "Variable resolution"): the
/// innermost local scope if the bare name is already bound there, else the
/// current speaker's partition via the kernel. Dotted paths name a speaker
/// explicitly; the compiler's A8 check guarantees that speaker is either
/// `self` or the current one by the time this runs, but the kernel's own
/// `write`/`write_to` split re-enforces it at the narrowest point regardless.
fn exec_let(kernel: &mut Mary, ctx: &RefCell<Context>, path: &str, value: Value) -> RResult<()> {
    let (speaker_id, speaker_name, has_locals) = {
        let c = ctx.borrow();
        (c.speaker_id, c.speaker_name.clone(), !c.scopes.is_empty())
    };

    if let Some((prefix, rest)) = path.split_once('.') {
        if prefix != "self" && prefix != speaker_name {
            let owner = kernel.speaker_by_name(prefix).map(|s| s.id).unwrap_or(u64::MAX);
            return Err(HumanLogicaError::Runtime(kernel.write_to(
                speaker_id, owner, rest, value,
            )));
        }
        return write_owned(kernel, ctx, speaker_id, rest, value);
    }

    if has_locals {
        let mut c = ctx.borrow_mut();
        if c.assign_local(path, value.clone()) {
            return Ok(());
        }
        c.scopes.last_mut().unwrap().insert(path.to_string(), value);
        return Ok(());
    }

    write_owned(kernel, ctx, speaker_id, path, value)
}

fn write_owned(
    kernel: &mut Mary,
    ctx: &RefCell<Context>,
    speaker_id: u64,
    key: &str,
    value: Value,
) -> RResult<()> {
    if ctx.borrow().sealed.contains(&(speaker_id, key.to_string())) {
        return Err(HumanLogicaError::Runtime(
            kernel.log_write_rejected_sealed(speaker_id, key),
        ));
    }
    kernel
        .write(speaker_id, key, value)
        .map_err(HumanLogicaError::Runtime)?;
    Ok(())
}

/// The primitive conditional (spec.md §4.5 "Core rule" / §4.11 "when
/// semantics"), routed through [`Mary::submit`] so the three-valued outcome
/// is ledgered and supersession applies across repeated evaluation of the
/// same syntactic `when` (e.g. inside a loop or a re-entered function).
fn exec_when(
    kernel: &mut Mary,
    ctx: &RefCell<Context>,
    cond: &Expr,
    active: &[Stmt],
    otherwise: &[Stmt],
    broken: &[Stmt],
    pos: Pos,
) -> RResult<Flow> {
    let speaker_id = ctx.borrow().speaker_id;
    let cond_result = eval_expr(kernel, ctx, cond);
    let (cond_met, cond_raised) = match &cond_result {
        Ok(v) => (v.is_truthy(), false),
        Err(_) => (true, true),
    };

    let mut active_outcome: Option<RResult<Flow>> = None;
    let status = kernel.submit(
        speaker_id,
        Option::None,
        format!("when_block@{}:{}", pos.line, pos.col),
        cond_met,
        false,
        Option::None,
        |k| {
            if cond_raised {
                return false;
            }
            let outcome = exec_block(k, ctx, active);
            let fulfilled = outcome.is_ok();
            active_outcome = Some(outcome);
            fulfilled
        },
    );

    match status {
        crate::value::Status::Active => active_outcome.unwrap_or(Ok(Flow::Normal)),
        crate::value::Status::Inactive => exec_block(kernel, ctx, otherwise),
        crate::value::Status::Broken => exec_block(kernel, ctx, broken),
    }
}

fn exec_if(
    kernel: &mut Mary,
    ctx: &RefCell<Context>,
    cond: &Expr,
    then_body: &[Stmt],
    elifs: &[(Expr, Vec<Stmt>)],
    else_body: &[Stmt],
) -> RResult<Flow> {
    if eval_expr(kernel, ctx, cond)?.is_truthy() {
        return exec_block(kernel, ctx, then_body);
    }
    for (elif_cond, elif_body) in elifs {
        if eval_expr(kernel, ctx, elif_cond)?.is_truthy() {
            return exec_block(kernel, ctx, elif_body);
        }
    }
    exec_block(kernel, ctx, else_body)
}

/// Loop evaluation (spec.md §4.5 "Loop evaluation"), via [`Mary::submit_loop`].
/// `cond`/`body` are re-evaluated each iteration — no AST is captured across
/// iterations — so a `break`-less loop only ends by the predicate going
/// false, an iteration raising, or hitting `max`.
fn exec_while(
    kernel: &mut Mary,
    ctx: &RefCell<Context>,
    cond: &Expr,
    max: &Expr,
    body: &[Stmt],
    pos: Pos,
) -> RResult<Flow> {
    let speaker_id = ctx.borrow().speaker_id;
    let bound = match eval_expr(kernel, ctx, max)? {
        Value::Int(n) if n > 0 => n as u32,
        Value::None => DEFAULT_LOOP_BOUND,
        _ => {
            return Err(HumanLogicaError::Runtime(kernel.log_runtime_error(
                speaker_id,
                "while_block",
                "'max' must be a positive integer",
            )))
        }
    };

    let mut predicate_err: Option<HumanLogicaError> = None;
    let mut action_outcome: Option<RResult<Flow>> = None;

    let (status, count) = kernel.submit_loop(
        speaker_id,
        format!("while_block@{}:{}", pos.line, pos.col),
        bound,
        |k| match eval_expr(k, ctx, cond) {
            Ok(v) => v.is_truthy(),
            Err(e) => {
                predicate_err = Some(e);
                false
            }
        },
        |k| {
            let outcome = exec_block(k, ctx, body);
            let fulfilled = outcome.is_ok();
            action_outcome = Some(outcome);
            fulfilled
        },
    );

    if let Some(e) = predicate_err {
        return Err(e);
    }
    match status {
        // `count >= bound` means every iteration's action succeeded and the
        // loop was cut off by A9's bound, not by the action itself raising —
        // `action_outcome` (if present) is stale from the last successful
        // iteration, so synthesize the bound error instead of returning it.
        crate::value::Status::Broken if count >= bound => {
            Err(HumanLogicaError::Runtime(RuntimeError::new(
                Some(ctx.borrow().speaker_name.clone()),
                format!("loop exceeded max {bound} iterations"),
            )))
        }
        crate::value::Status::Broken => action_outcome.unwrap_or_else(|| {
            Err(HumanLogicaError::Runtime(RuntimeError::new(
                Some(ctx.borrow().speaker_name.clone()),
                "loop iteration failed".to_string(),
            )))
        }),
        _ => Ok(Flow::Normal),
    }
}

fn exec_request(kernel: &mut Mary, ctx: &RefCell<Context>, target: &str, action: &Expr) -> RResult<()> {
    let speaker_id = ctx.borrow().speaker_id;
    let action_value = eval_expr(kernel, ctx, action)?;
    let to = match kernel.speaker_by_name(target).map(|s| s.id) {
        Some(id) => id,
        Option::None => {
            return Err(HumanLogicaError::Runtime(kernel.log_runtime_error(
                speaker_id,
                "request",
                &format!("target speaker '{target}' not found"),
            )))
        }
    };
    kernel.request(speaker_id, to, &action_value.to_string(), Option::None);
    Ok(())
}

fn exec_respond(kernel: &mut Mary, ctx: &RefCell<Context>, accept: bool) -> RResult<()> {
    let speaker_id = ctx.borrow().speaker_id;
    let pending = kernel.pending_requests(speaker_id);
    let request_id = match pending.first() {
        Some(r) => r.id,
        Option::None => {
            return Err(HumanLogicaError::Runtime(kernel.log_runtime_error(
                speaker_id,
                "respond",
                "no pending request to respond to",
            )))
        }
    };
    kernel
        .respond(request_id, speaker_id, accept, Option::None)
        .map_err(HumanLogicaError::Runtime)?;
    Ok(())
}

fn exec_inspect(kernel: &mut Mary, ctx: &RefCell<Context>, target: &str) {
    let line = match target.split_once('.') {
        Some((speaker, var)) => {
            let owner = resolve_owner(kernel, ctx, speaker);
            match kernel.inspect_variable(owner, var) {
                Some(v) => format!("{target} = {v}"),
                Option::None => format!("{target} = none"),
            }
        }
        Option::None => match kernel.speaker_by_name(target) {
            Some(s) => format!("{}: {:?} (id={})", s.name, s.status, s.id),
            Option::None => format!("{target}: no such speaker"),
        },
    };
    ctx.borrow_mut().output.push(line);
}

fn exec_history(kernel: &mut Mary, ctx: &RefCell<Context>, target: &str) {
    let first_segment = target.split('.').next().unwrap_or(target);
    let owner = resolve_owner(kernel, ctx, first_segment);
    let lines: Vec<String> = kernel
        .ledger_search(Some(owner), Option::None)
        .into_iter()
        .map(|e| kernel.render_entry(e))
        .collect();
    ctx.borrow_mut().output.extend(lines);
}

fn exec_ledger(
    kernel: &mut Mary,
    ctx: &RefCell<Context>,
    last: bool,
    count: Option<&Expr>,
) -> RResult<()> {
    let n = match count {
        Some(e) => match eval_expr(kernel, ctx, e)? {
            Value::Int(n) if n >= 0 => n as usize,
            _ => kernel.ledger_count(),
        },
        Option::None => kernel.ledger_count(),
    };
    let entries = if last {
        kernel.ledger_last(n)
    } else {
        let to = n.saturating_sub(1) as u64;
        kernel.ledger_read(0, to)
    };
    let lines: Vec<String> = entries.into_iter().map(|e| kernel.render_entry(e)).collect();
    ctx.borrow_mut().output.extend(lines);
    Ok(())
}

fn resolve_owner(kernel: &Mary, ctx: &RefCell<Context>, name: &str) -> u64 {
    let c = ctx.borrow();
    if name == "self" || name == c.speaker_name {
        return c.speaker_id;
    }
    kernel.speaker_by_name(name).map(|s| s.id).unwrap_or(c.speaker_id)
}

// ---- expression evaluation ----

enum Resolved {
    Value(Value),
    SpeakerRef(u64),
}

/// Spec.md §4.11 order: innermost local scope, then the current speaker's
/// partition via the kernel, then (if neither holds it) whether the name
/// names a declared speaker — in which case it resolves to that speaker's
/// identity, used by member access (`Jared.grade`) and `inspect`.
fn resolve_identifier(kernel: &mut Mary, ctx: &RefCell<Context>, name: &str) -> RResult<Resolved> {
    let (local, speaker_id, speaker_name) = {
        let c = ctx.borrow();
        (c.find_local(name), c.speaker_id, c.speaker_name.clone())
    };
    if let Some(v) = local {
        return Ok(Resolved::Value(v));
    }
    let _ = &speaker_name;
    if let Some(v) = kernel.read(speaker_id, name) {
        return Ok(Resolved::Value(v));
    }
    if let Some(s) = kernel.speaker_by_name(name) {
        return Ok(Resolved::SpeakerRef(s.id));
    }
    Err(HumanLogicaError::Runtime(kernel.log_runtime_error(
        speaker_id,
        "resolve",
        &format!("undefined identifier '{name}'"),
    )))
}

fn eval_expr(kernel: &mut Mary, ctx: &RefCell<Context>, expr: &Expr) -> RResult<Value> {
    match expr {
        Expr::Literal { value, .. } => Ok(value.clone()),
        Expr::Identifier { name, .. } => match resolve_identifier(kernel, ctx, name)? {
            Resolved::Value(v) => Ok(v),
            Resolved::SpeakerRef(_) => Ok(Value::Str(name.clone())),
        },
        Expr::MemberAccess { object, member, .. } => {
            if let Expr::Identifier { name, .. } = object.as_ref() {
                let speaker_id = resolve_owner(kernel, ctx, name);
                if name == "self" || kernel.speaker_by_name(name).is_some() {
                    return Ok(kernel.read(speaker_id, member).unwrap_or(Value::None));
                }
                match resolve_identifier(kernel, ctx, name)? {
                    Resolved::SpeakerRef(id) => return Ok(kernel.read(id, member).unwrap_or(Value::None)),
                    Resolved::Value(v) => return Ok(project_member(&v, member)),
                }
            }
            let v = eval_expr(kernel, ctx, object)?;
            Ok(project_member(&v, member))
        }
        Expr::IndexAccess { object, index, .. } => {
            let obj = eval_expr(kernel, ctx, object)?;
            let idx = eval_expr(kernel, ctx, index)?;
            Ok(project_index(&obj, &idx))
        }
        Expr::Binary { op, lhs, rhs, .. } => eval_binary(kernel, ctx, *op, lhs, rhs),
        Expr::Unary { op, operand, .. } => {
            let v = eval_expr(kernel, ctx, operand)?;
            Ok(match (op, &v) {
                (_, Value::None) => Value::None,
                (UnOp::Not, _) => Value::Bool(!v.is_truthy()),
                (UnOp::Neg, Value::Int(n)) => Value::Int(-n),
                (UnOp::Neg, Value::Float(n)) => Value::Float(-n),
                (UnOp::Neg, _) => {
                    let speaker_id = ctx.borrow().speaker_id;
                    return Err(HumanLogicaError::Runtime(kernel.log_runtime_error(
                        speaker_id,
                        "negate",
                        "cannot negate a non-numeric value",
                    )))
                }
            })
        }
        Expr::Call { callee, args, .. } => eval_call(kernel, ctx, callee, args),
        Expr::Read { path, .. } => {
            let v = eval_expr(kernel, ctx, path)?;
            match v {
                Value::Ref(s) => {
                    let (owner, key) = match s.split_once('.') {
                        Some((prefix, rest)) => (resolve_owner(kernel, ctx, prefix), rest.to_string()),
                        Option::None => {
                            let speaker_id = ctx.borrow().speaker_id;
                            (speaker_id, s)
                        }
                    };
                    Ok(kernel.read(owner, &key).unwrap_or(Value::None))
                }
                other => Ok(other),
            }
        }
    }
}

fn project_member(v: &Value, member: &str) -> Value {
    match v {
        Value::Map(m) => m.get(member).cloned().unwrap_or(Value::None),
        _ => Value::None,
    }
}

fn project_index(v: &Value, index: &Value) -> Value {
    match (v, index) {
        (Value::List(items), Value::Int(i)) => {
            let idx = if *i < 0 { None } else { usize::try_from(*i).ok() };
            idx.and_then(|i| items.get(i)).cloned().unwrap_or(Value::None)
        }
        (Value::Map(m), Value::Str(k)) => m.get(k).cloned().unwrap_or(Value::None),
        _ => Value::None,
    }
}

fn eval_binary(
    kernel: &mut Mary,
    ctx: &RefCell<Context>,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
) -> RResult<Value> {
    if matches!(op, BinOp::And | BinOp::Or) {
        let l = eval_expr(kernel, ctx, lhs)?;
        if matches!(l, Value::None) {
            return Ok(Value::None);
        }
        return match op {
            BinOp::And => {
                if l.is_truthy() {
                    eval_expr(kernel, ctx, rhs)
                } else {
                    Ok(l)
                }
            }
            BinOp::Or => {
                if l.is_truthy() {
                    Ok(l)
                } else {
                    eval_expr(kernel, ctx, rhs)
                }
            }
            _ => unreachable!(),
        };
    }

    let l = eval_expr(kernel, ctx, lhs)?;
    let r = eval_expr(kernel, ctx, rhs)?;
    let speaker_id = ctx.borrow().speaker_id;
    match op {
        BinOp::Add => Ok(l.add(&r)),
        BinOp::Sub => Ok(l.sub(&r)),
        BinOp::Mul => Ok(l.mul(&r)),
        BinOp::Div => l
            .div(&r)
            .map_err(|_| HumanLogicaError::Runtime(kernel.log_runtime_error(speaker_id, "divide", "division by zero"))),
        BinOp::Mod => l
            .rem(&r)
            .map_err(|_| HumanLogicaError::Runtime(kernel.log_runtime_error(speaker_id, "modulo", "division by zero"))),
        BinOp::Eq => Ok(l.eq_value(&r)),
        BinOp::NotEq => Ok(match l.eq_value(&r) {
            Value::Bool(b) => Value::Bool(!b),
            other => other,
        }),
        BinOp::Lt => Ok(l
            .compare(&r)
            .map(|o| Value::Bool(o == std::cmp::Ordering::Less))
            .unwrap_or(Value::None)),
        BinOp::Gt => Ok(l
            .compare(&r)
            .map(|o| Value::Bool(o == std::cmp::Ordering::Greater))
            .unwrap_or(Value::None)),
        BinOp::LtEq => Ok(l
            .compare(&r)
            .map(|o| Value::Bool(o != std::cmp::Ordering::Greater))
            .unwrap_or(Value::None)),
        BinOp::GtEq => Ok(l
            .compare(&r)
            .map(|o| Value::Bool(o != std::cmp::Ordering::Less))
            .unwrap_or(Value::None)),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn eval_call(kernel: &mut Mary, ctx: &RefCell<Context>, callee: &str, args: &[Expr]) -> RResult<Value> {
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        values.push(eval_expr(kernel, ctx, a)?);
    }
    let speaker_id = ctx.borrow().speaker_id;
    let maybe_decl = ctx.borrow().functions.get(callee).cloned();
    let decl = match maybe_decl {
        Some(d) => d,
        Option::None => {
            return Err(HumanLogicaError::Runtime(kernel.log_runtime_error(
                speaker_id,
                "call",
                &format!("call to undefined function '{callee}'"),
            )))
        }
    };
    if decl.params.len() != values.len() {
        return Err(HumanLogicaError::Runtime(kernel.log_runtime_error(
            speaker_id,
            "call",
            &format!(
                "'{callee}' expects {} argument(s), got {}",
                decl.params.len(),
                values.len()
            ),
        )));
    }
    let mut frame = BTreeMap::new();
    for (param, value) in decl.params.iter().zip(values) {
        frame.insert(param.clone(), value);
    }
    ctx.borrow_mut().scopes.push(frame);
    let result = exec_block(kernel, ctx, &decl.body);
    ctx.borrow_mut().scopes.pop();
    match result? {
        Flow::Return(v) => Ok(v),
        _ => Ok(Value::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn run_source(src: &str) -> RResult<RunOutcome> {
        let tokens = Lexer::tokenize(src).unwrap();
        let program = Parser::parse(tokens).unwrap();
        let compiled = Compiler::compile(&program).unwrap();
        let mut kernel = Mary::boot();
        run(&program, &compiled, &mut kernel)
    }

    #[test]
    fn hello_world_output() {
        let outcome = run_source("speaker Jared\nas Jared { speak \"Hello, World!\" }").unwrap();
        assert_eq!(outcome.output, vec!["  [Jared] Hello, World!".to_string()]);
    }

    #[test]
    fn three_valued_when_runs_otherwise_arm() {
        let src = r#"speaker S
as S {
    let ok = false
    when ok { speak "a" } otherwise { speak "b" } broken { speak "c" }
}"#;
        let outcome = run_source(src).unwrap();
        assert_eq!(outcome.output, vec!["  [S] b".to_string()]);
    }

    #[test]
    fn when_active_arm_runs_on_true_condition() {
        let src = r#"speaker S
as S {
    let ok = true
    when ok { speak "a" } otherwise { speak "b" }
}"#;
        let outcome = run_source(src).unwrap();
        assert_eq!(outcome.output, vec!["  [S] a".to_string()]);
    }

    #[test]
    fn broken_loop_without_progress_hits_bound() {
        let src = r#"speaker S
as S {
    let i = 0
    while i < 1, max 3 {
        speak "tick"
    }
}"#;
        let err = run_source(src).unwrap_err();
        assert!(matches!(err, HumanLogicaError::Runtime(_)));
    }

    #[test]
    fn write_ownership_is_enforced_at_runtime_too() {
        let src = "speaker Jared\nspeaker Maria\nas Maria { let self.grade = 1 }";
        let outcome = run_source(src).unwrap();
        assert!(outcome.output.is_empty());
    }

    #[test]
    fn division_by_zero_is_runtime_error() {
        let src = "speaker S\nas S { let x = 1 / 0 }";
        let err = run_source(src).unwrap_err();
        assert!(matches!(err, HumanLogicaError::Runtime(_)));
    }

    #[test]
    fn function_call_returns_value() {
        let src = r#"speaker S
fn double(n) {
    return n * 2
}
as S {
    let x = double(21)
    speak x
}"#;
        let outcome = run_source(src).unwrap();
        assert_eq!(outcome.output, vec!["  [S] 42".to_string()]);
    }

    #[test]
    fn sealed_variable_rejects_further_writes() {
        let src = r#"speaker S
as S {
    let x = 1
    seal x
    let x = 2
}"#;
        let err = run_source(src).unwrap_err();
        assert!(matches!(err, HumanLogicaError::Runtime(_)));
    }

    #[test]
    fn request_and_accept_flow() {
        let src = r#"speaker Jared
speaker Maria
as Jared { request Maria "borrow pencil" }
as Maria { respond accept }"#;
        let outcome = run_source(src);
        assert!(outcome.is_ok());
    }
}
