use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{debug, trace};

use crate::error::CompileError;
use crate::ir::ast::{BinaryOp, LoopControl};
use crate::lower::{self, ExprThunk, IrBuilder, StmtThunk};
use crate::runtime;
use crate::sema::AnalyzedProgram;
use crate::sema::env::SymbolKind;

use super::Backend;

/// Value handle of the textual IR: an immediate or a numbered temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Imm(i32),
    Temp(u32),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(value) => write!(f, "{}", value),
            Operand::Temp(id) => write!(f, "%t{}", id),
        }
    }
}

#[derive(Debug, Clone)]
enum Binding {
    /// Folded constant.
    Const(i32),
    /// Storage: `@name` in the module frame, a `%name[.n]` slot elsewhere.
    Slot { place: String },
    /// A function's result slot inside its own body.
    Ret { symbol: String, place: String },
    Proc { symbol: String },
    Func { symbol: String },
}

#[derive(Debug, Clone, Copy)]
struct Loop {
    cond: u32,
    exit: u32,
}

#[derive(Debug)]
struct Frame {
    symbol: String,
    /// `None` for procedures, the result slot for functions.
    result: Option<String>,
    params: Vec<String>,
    bindings: HashMap<String, Binding>,
    /// Slots handed out per name, so a shadowing local gets its own.
    slots: HashMap<String, usize>,
    lines: Vec<String>,
    loops: Vec<Loop>,
}

impl Frame {
    fn new(symbol: String, params: Vec<String>) -> Self {
        Self {
            symbol,
            result: None,
            params,
            bindings: HashMap::new(),
            slots: HashMap::new(),
            lines: Vec::new(),
            loops: Vec::new(),
        }
    }
}

/// Builder producing a readable SSA-style listing.
///
/// Frame 0 is the module: its bindings are globals and its instructions
/// form the synthetic `@main` entry. Each procedure or function gets its
/// own frame, and a slot of an enclosing routine is addressed with an
/// explicit up-level depth (`^1 %x`).
#[derive(Debug)]
pub struct TextBuilder {
    globals: Vec<String>,
    externals: BTreeMap<String, usize>,
    routines: Vec<String>,
    frames: Vec<Frame>,
    next_temp: u32,
    next_label: u32,
}

impl Default for TextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuilder {
    pub fn new() -> Self {
        Self {
            globals: Vec::new(),
            externals: BTreeMap::new(),
            routines: Vec::new(),
            frames: vec![Frame::new("main".to_string(), Vec::new())],
            next_temp: 0,
            next_label: 0,
        }
    }

    /// Renders the module: globals, external declarations, routines, then
    /// the entry point.
    pub fn finish(mut self) -> String {
        let mut out = String::new();
        for global in &self.globals {
            out.push_str(global);
            out.push('\n');
        }
        for (name, arity) in &self.externals {
            out.push_str(&format!("declare i32 @{}({})\n", name, vec!["i32"; *arity].join(", ")));
        }
        if !self.globals.is_empty() || !self.externals.is_empty() {
            out.push('\n');
        }
        for routine in &self.routines {
            out.push_str(routine);
            out.push('\n');
        }

        let main = self.frames.swap_remove(0);
        out.push_str("define i32 @main() {\nentry:\n");
        for line in &main.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("  ret 0\n}\n");
        out
    }

    fn frame(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn at_module(&self) -> bool {
        self.frames.len() == 1
    }

    fn emit(&mut self, line: String) {
        self.frame().lines.push(format!("  {}", line));
    }

    fn label(&mut self) -> u32 {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    fn place(&mut self, label: u32) {
        self.frame().lines.push(format!("L{}:", label));
    }

    fn temp(&mut self) -> Operand {
        let id = self.next_temp;
        self.next_temp += 1;
        Operand::Temp(id)
    }

    fn bind(&mut self, name: &str, binding: Binding) {
        trace!(name, ?binding, "bind");
        self.frame().bindings.insert(name.to_string(), binding);
    }

    /// Finds `name`, innermost frame first, with its frame index.
    fn resolve(&self, name: &str) -> Option<(usize, Binding)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, frame)| frame.bindings.get(name).map(|b| (index, b.clone())))
    }

    /// Addresses `place`, declared in frame `index`, from the current frame.
    fn place_of(&self, place: &str, index: usize) -> String {
        if index == 0 {
            return place.to_string();
        }
        match self.frames.len() - 1 - index {
            0 => place.to_string(),
            depth => format!("^{} {}", depth, place),
        }
    }

    /// Next unused slot for `name` in the current frame: `%name`, then
    /// `%name.1`, `%name.2` and so on.
    fn fresh_slot(&mut self, name: &str) -> String {
        let count = self.frame().slots.entry(name.to_string()).or_insert(0);
        let place = match *count {
            0 => format!("%{}", name),
            n => format!("%{}.{}", name, n),
        };
        *count += 1;
        place
    }

    fn routine_symbol(&self, name: &str) -> String {
        if self.at_module() {
            if name == "main" { "_main".to_string() } else { name.to_string() }
        } else {
            let parent = &self.frames[self.frames.len() - 1].symbol;
            format!("{}.{}", parent, name)
        }
    }

    /// Declares storage for `name` in the current frame, initialized with
    /// `init`.
    fn storage(&mut self, name: &str, init: Option<Operand>) {
        if self.at_module() {
            match init {
                Some(Operand::Imm(value)) => self.globals.push(format!("global @{} = {}", name, value)),
                other => {
                    self.globals.push(format!("global @{} = 0", name));
                    if let Some(value) = other {
                        self.emit(format!("store @{}, {}", name, value));
                    }
                }
            }
            self.bind(name, Binding::Slot { place: format!("@{}", name) });
        } else {
            let place = self.fresh_slot(name);
            self.emit(format!("slot {}", place));
            if let Some(value) = init {
                self.emit(format!("store {}, {}", place, value));
            }
            self.bind(name, Binding::Slot { place });
        }
    }

    fn emit_call(&mut self, symbol: &str, args: &[Operand]) -> Operand {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        let result = self.temp();
        self.emit(format!("{} = call @{}({})", result, symbol, args.join(", ")));
        result
    }

    /// Lowers `body` into a fresh frame and records the finished routine.
    fn routine(
        &mut self,
        name: &str,
        params: &[String],
        returns_value: bool,
        body: StmtThunk<'_, Self>,
    ) {
        let symbol = self.routine_symbol(name);
        debug!(name, symbol = %symbol, "define routine");
        if returns_value {
            self.bind(name, Binding::Func { symbol: symbol.clone() });
        } else {
            self.bind(name, Binding::Proc { symbol: symbol.clone() });
        }

        self.frames.push(Frame::new(symbol.clone(), params.to_vec()));
        for param in params {
            let place = self.fresh_slot(param);
            self.bind(param, Binding::Slot { place });
        }
        if returns_value {
            let place = self.fresh_slot(name);
            self.emit(format!("slot {}", place));
            self.frame().result = Some(place.clone());
            self.bind(name, Binding::Ret { symbol: symbol.clone(), place });
        }
        body.force(self);

        let frame = self.frames.pop();
        if let Some(frame) = frame {
            self.routines.push(render_routine(frame));
        }
    }
}

fn render_routine(frame: Frame) -> String {
    let params: Vec<String> = frame.params.iter().map(|p| format!("i32 %{}", p)).collect();
    let ret = if frame.result.is_some() { "i32" } else { "void" };
    let mut out = format!("define {} @{}({}) {{\nentry:\n", ret, frame.symbol, params.join(", "));
    for line in &frame.lines {
        out.push_str(line);
        out.push('\n');
    }
    match &frame.result {
        Some(slot) => out.push_str(&format!("  %ret = load {}\n  ret %ret\n", slot)),
        None => out.push_str("  ret void\n"),
    }
    out.push_str("}\n");
    out
}

fn fold(op: BinaryOp, lhs: i32, rhs: i32) -> Option<i32> {
    let value = match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Sub => lhs.wrapping_sub(rhs),
        BinaryOp::Mul => lhs.wrapping_mul(rhs),
        BinaryOp::Div if rhs == 0 => return None,
        BinaryOp::Div => lhs.wrapping_div(rhs),
        BinaryOp::Less => (lhs < rhs) as i32,
        BinaryOp::LessEqual => (lhs <= rhs) as i32,
        BinaryOp::Greater => (lhs > rhs) as i32,
        BinaryOp::GreaterEqual => (lhs >= rhs) as i32,
        BinaryOp::NotEqual => (lhs != rhs) as i32,
        BinaryOp::Equal => (lhs == rhs) as i32,
    };
    Some(value)
}

fn opcode(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "sdiv",
        BinaryOp::Less => "lt",
        BinaryOp::LessEqual => "le",
        BinaryOp::Greater => "gt",
        BinaryOp::GreaterEqual => "ge",
        BinaryOp::NotEqual => "ne",
        BinaryOp::Equal => "eq",
    }
}

impl IrBuilder for TextBuilder {
    type Value = Operand;

    fn block(
        &mut self,
        consts: Option<StmtThunk<'_, Self>>,
        vars: Option<StmtThunk<'_, Self>>,
        routines: StmtThunk<'_, Self>,
        body: Option<StmtThunk<'_, Self>>,
    ) -> Option<Operand> {
        if let Some(consts) = consts {
            consts.force(self);
        }
        if let Some(vars) = vars {
            vars.force(self);
        }
        routines.force(self);
        if let Some(body) = body {
            body.force(self);
        }
        None
    }

    fn constant(&mut self, name: &str, value: Operand) {
        match value {
            Operand::Imm(value) => self.bind(name, Binding::Const(value)),
            // Unfoldable, e.g. a division by zero: keep it in storage.
            other => self.storage(name, Some(other)),
        }
    }

    fn variable(&mut self, name: &str, init: Option<Operand>) {
        self.storage(name, init);
    }

    fn procedure(&mut self, name: &str, block: StmtThunk<'_, Self>) -> Option<Operand> {
        self.routine(name, &[], false, block);
        None
    }

    fn function(&mut self, name: &str, params: &[String], block: StmtThunk<'_, Self>) -> Option<Operand> {
        self.routine(name, params, true, block);
        None
    }

    fn assign(&mut self, name: &str, _target: SymbolKind, value: Operand) -> Option<Operand> {
        let target = self.resolve(name);
        if let Some((index, Binding::Slot { place } | Binding::Ret { place, .. })) = target {
            let place = self.place_of(&place, index);
            self.emit(format!("store {}, {}", place, value));
        }
        None
    }

    fn if_then(
        &mut self,
        cond: Operand,
        then_branch: Option<StmtThunk<'_, Self>>,
        else_branch: Option<StmtThunk<'_, Self>>,
    ) -> Option<Operand> {
        let then_label = self.label();
        let else_label = self.label();
        let end_label = self.label();

        let false_target = if else_branch.is_some() { else_label } else { end_label };
        self.emit(format!("br {}, L{}, L{}", cond, then_label, false_target));

        self.place(then_label);
        if let Some(branch) = then_branch {
            branch.force(self);
        }
        self.emit(format!("jmp L{}", end_label));

        if let Some(branch) = else_branch {
            self.place(else_label);
            branch.force(self);
            self.emit(format!("jmp L{}", end_label));
        }
        self.place(end_label);
        None
    }

    fn while_loop(
        &mut self,
        cond: ExprThunk<'_, Self>,
        body: Option<StmtThunk<'_, Self>>,
    ) -> Option<Operand> {
        let cond_label = self.label();
        let body_label = self.label();
        let exit_label = self.label();

        self.emit(format!("jmp L{}", cond_label));
        self.place(cond_label);
        let cond = cond.force(self);
        self.emit(format!("br {}, L{}, L{}", cond, body_label, exit_label));

        self.place(body_label);
        self.frame().loops.push(Loop {
            cond: cond_label,
            exit: exit_label,
        });
        if let Some(body) = body {
            body.force(self);
        }
        self.frame().loops.pop();
        self.emit(format!("jmp L{}", cond_label));
        self.place(exit_label);
        None
    }

    fn inline_asm(&mut self, text: &str) -> Option<Operand> {
        self.emit(format!("asm {:?}", text));
        None
    }

    fn control(&mut self, control: LoopControl) -> Option<Operand> {
        let Some(current) = self.frame().loops.last().copied() else {
            return None;
        };
        let target = match control {
            LoopControl::Break => current.exit,
            LoopControl::Continue => current.cond,
        };
        self.emit(format!("jmp L{}", target));
        // Anything after the jump lands in a fresh, unreachable block.
        let rest = self.label();
        self.place(rest);
        None
    }

    fn odd(&mut self, operand: Operand) -> Operand {
        if let Operand::Imm(value) = operand {
            return Operand::Imm(((value & 1) != 0) as i32);
        }
        let result = self.temp();
        self.emit(format!("{} = odd {}", result, operand));
        result
    }

    fn binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand) -> Operand {
        if let (Operand::Imm(l), Operand::Imm(r)) = (lhs, rhs) {
            if let Some(value) = fold(op, l, r) {
                return Operand::Imm(value);
            }
        }
        let result = self.temp();
        self.emit(format!("{} = {} {}, {}", result, opcode(op), lhs, rhs));
        result
    }

    fn call(&mut self, name: &str, args: Vec<Operand>) -> Operand {
        match self.resolve(name) {
            Some((_, Binding::Func { symbol } | Binding::Ret { symbol, .. })) => {
                self.emit_call(&symbol, &args)
            }
            _ => {
                let arity = runtime::lookup(name).map_or(args.len(), |p| p.arity);
                self.externals.entry(name.to_string()).or_insert(arity);
                self.emit_call(name, &args)
            }
        }
    }

    fn identifier(&mut self, name: &str, kind: SymbolKind) -> Option<Operand> {
        match (kind, self.resolve(name)) {
            (SymbolKind::Proc, Some((_, Binding::Proc { symbol }))) => {
                self.emit(format!("call @{}()", symbol));
                None
            }
            (SymbolKind::Func | SymbolKind::Ret, _) => Some(self.call(name, Vec::new())),
            (_, Some((_, Binding::Const(value)))) => Some(Operand::Imm(value)),
            (_, Some((index, Binding::Slot { place }))) => {
                let place = self.place_of(&place, index);
                let result = self.temp();
                self.emit(format!("{} = load {}", result, place));
                Some(result)
            }
            _ => None,
        }
    }

    fn number(&mut self, value: i32) -> Operand {
        Operand::Imm(value)
    }
}

/// Backend producing the textual listing.
#[derive(Debug, Default)]
pub struct TextBackend;

impl TextBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for TextBackend {
    fn compile(&mut self, program: &AnalyzedProgram) -> Result<Vec<u8>, CompileError> {
        let mut builder = TextBuilder::new();
        lower::lower_program(program, &mut builder);
        Ok(builder.finish().into_bytes())
    }
}
