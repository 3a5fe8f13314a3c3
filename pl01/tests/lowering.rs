use pl01::backends::BackendType;
use pl01::backends::text::TextBuilder;
use pl01::ir::ast::{BinaryOp, LoopControl};
use pl01::lower::{self, ExprThunk, IrBuilder, StmtThunk};
use pl01::sema::env::SymbolKind;
use pl01::{CompileError, Options, check, compile};

/// Logs every contract call; values are the rendered sub-expressions.
#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
    /// Thunks are only forced when this is set, to observe deferral.
    eager: bool,
}

impl Recorder {
    fn eager() -> Self {
        Self {
            calls: Vec::new(),
            eager: true,
        }
    }

    fn run(&mut self, thunk: Option<StmtThunk<'_, Self>>) {
        if let Some(thunk) = thunk {
            if self.eager {
                thunk.force(self);
            }
        }
    }
}

impl IrBuilder for Recorder {
    type Value = String;

    fn block(
        &mut self,
        consts: Option<StmtThunk<'_, Self>>,
        vars: Option<StmtThunk<'_, Self>>,
        routines: StmtThunk<'_, Self>,
        body: Option<StmtThunk<'_, Self>>,
    ) -> Option<String> {
        self.calls.push("block".to_string());
        self.run(consts);
        self.run(vars);
        self.run(Some(routines));
        self.run(body);
        None
    }

    fn constant(&mut self, name: &str, value: String) {
        self.calls.push(format!("const {} = {}", name, value));
    }

    fn variable(&mut self, name: &str, init: Option<String>) {
        self.calls.push(format!("var {} = {:?}", name, init));
    }

    fn procedure(&mut self, name: &str, block: StmtThunk<'_, Self>) -> Option<String> {
        self.calls.push(format!("procedure {}", name));
        self.run(Some(block));
        None
    }

    fn function(&mut self, name: &str, params: &[String], block: StmtThunk<'_, Self>) -> Option<String> {
        self.calls.push(format!("function {}({})", name, params.join(", ")));
        self.run(Some(block));
        None
    }

    fn assign(&mut self, name: &str, target: SymbolKind, value: String) -> Option<String> {
        self.calls.push(format!("assign {:?} {} := {}", target, name, value));
        None
    }

    fn if_then(
        &mut self,
        cond: String,
        then_branch: Option<StmtThunk<'_, Self>>,
        else_branch: Option<StmtThunk<'_, Self>>,
    ) -> Option<String> {
        self.calls.push(format!("if {}", cond));
        self.run(then_branch);
        self.calls.push("else".to_string());
        self.run(else_branch);
        None
    }

    fn while_loop(&mut self, cond: ExprThunk<'_, Self>, body: Option<StmtThunk<'_, Self>>) -> Option<String> {
        self.calls.push("while".to_string());
        if self.eager {
            let cond = cond.force(self);
            self.calls.push(format!("cond {}", cond));
        }
        self.run(body);
        None
    }

    fn inline_asm(&mut self, text: &str) -> Option<String> {
        self.calls.push(format!("asm {:?}", text));
        None
    }

    fn control(&mut self, control: LoopControl) -> Option<String> {
        self.calls.push(format!("{:?}", control));
        None
    }

    fn odd(&mut self, operand: String) -> String {
        format!("odd({})", operand)
    }

    fn binary(&mut self, op: BinaryOp, lhs: String, rhs: String) -> String {
        format!("({:?} {} {})", op, lhs, rhs)
    }

    fn call(&mut self, name: &str, args: Vec<String>) -> String {
        self.calls.push(format!("call {}", name));
        format!("{}({})", name, args.join(", "))
    }

    fn identifier(&mut self, name: &str, kind: SymbolKind) -> Option<String> {
        assert_ne!(kind, SymbolKind::Error, "unresolved identifier {}", name);
        self.calls.push(format!("id {} {:?}", name, kind));
        match kind {
            SymbolKind::Proc => None,
            _ => Some(name.to_string()),
        }
    }

    fn number(&mut self, value: i32) -> String {
        value.to_string()
    }
}

const FIB: &str = "const limit = 10;
var n = limit;

function fib(n);
begin
   if n <= 2 then fib := 1
   else fib := fib(n - 1) + fib(n - 2)
end;

procedure show;
   write(fib(n));

while n > 0 do begin
   show;
   n := n - 1;
   if odd n then continue;
   asm begin nop end
end.";

#[test]
fn calls_follow_block_order() {
    let mut recorder = Recorder::eager();
    compile(FIB, &Options::default(), &mut recorder).unwrap();

    let expected = [
        "block",
        "const limit = 10",
        "id limit Const",
        "var n = Some(\"limit\")",
        "function fib(n)",
        "block",
        "id n Var",
        "if (LessEqual n 2)",
        "assign Ret fib := 1",
        "else",
        "id n Var",
        "call fib",
        "id n Var",
        "call fib",
        "assign Ret fib := (Add fib((Sub n 1)) fib((Sub n 2)))",
        "procedure show",
        "block",
        "id n Var",
        "call fib",
        "call write",
        "while",
        "id n Var",
        "cond (Greater n 0)",
        "id show Proc",
        "id n Var",
        "assign Var n := (Sub n 1)",
        "id n Var",
        "if odd(n)",
        "Continue",
        "else",
        "asm \"nop\\n\"",
    ];
    let pos = |call: &str| recorder.calls.iter().position(|c| c == call);
    assert_eq!(recorder.calls.len(), expected.len(), "{:#?}", recorder.calls);
    for (actual, expected) in recorder.calls.iter().zip(expected) {
        assert_eq!(actual, expected);
    }
    assert!(pos("const limit = 10") < pos("function fib(n)"));
}

#[test]
fn deferred_sub_trees_wait_for_the_builder() {
    let mut recorder = Recorder::default();
    compile(FIB, &Options::default(), &mut recorder).unwrap();
    assert_eq!(recorder.calls, vec!["block".to_string()]);
}

#[test]
fn analysis_failure_prevents_lowering() {
    let mut recorder = Recorder::eager();
    let err = compile("x := 1.", &Options::default(), &mut recorder).unwrap_err();
    assert!(matches!(err, CompileError::SemanticError { count: 1 }));
    assert!(recorder.calls.is_empty());
}

#[test]
fn text_builder_renders_routines_and_entry() {
    let analyzed = check(FIB, &Options::default()).unwrap();
    let mut builder = TextBuilder::new();
    lower::lower_program(&analyzed, &mut builder);
    let text = builder.finish();

    assert!(text.contains("global @n = 10"), "{}", text);
    assert!(text.contains("declare i32 @write(i32)"));
    assert!(text.contains("define i32 @fib(i32 %n) {"));
    assert!(text.contains("store %fib, 1"));
    assert!(text.contains("call @fib("));
    assert!(text.contains("define void @show() {"));
    assert!(text.contains("define i32 @main() {"));
    assert!(text.contains("asm \"nop\\n\""));
    assert!(text.trim_end().ends_with("ret 0\n}"));
}

#[test]
fn user_main_is_renamed() {
    let analyzed = check("procedure main; write(1); main.", &Options::default()).unwrap();
    let mut backend = BackendType::Text.create();
    let text = String::from_utf8(backend.compile(&analyzed).unwrap()).unwrap();
    assert!(text.contains("define void @_main() {"));
    assert!(text.contains("call @_main()"));
    assert_eq!(text.matches("define i32 @main()").count(), 1);
}

#[test]
fn nested_routine_reaches_enclosing_slot() {
    let source = "procedure outer;
var x;
procedure inner;
   x := x + 1;
begin
   x := 0;
   inner
end;
outer.";
    let analyzed = check(source, &Options::default()).unwrap();
    let mut builder = TextBuilder::new();
    lower::lower_program(&analyzed, &mut builder);
    let text = builder.finish();

    assert!(text.contains("define void @outer.inner() {"), "{}", text);
    assert!(text.contains("= load ^1 %x"));
    assert!(text.contains("store ^1 %x, "));
    assert!(text.contains("store %x, 0"));
    assert!(text.contains("call @outer.inner()"));
}

#[test]
fn loop_control_jumps_to_loop_labels() {
    let source = "var i; while i < 3 do begin i := i + 1; if i = 2 then break end.";
    let analyzed = check(source, &Options::default()).unwrap();
    let mut builder = TextBuilder::new();
    lower::lower_program(&analyzed, &mut builder);
    let text = builder.finish();

    // L0 condition, L1 body, L2 exit
    assert!(text.contains("jmp L0"));
    assert!(text.contains("br %t"));
    assert!(text.contains("jmp L2"));
    assert!(text.contains("L2:"));
}

fn listing(source: &str) -> String {
    let analyzed = check(source, &Options::default()).unwrap();
    let mut builder = TextBuilder::new();
    lower::lower_program(&analyzed, &mut builder);
    builder.finish()
}

#[test]
fn local_shadowing_the_result_gets_its_own_slot() {
    let text = listing("function f; var f; begin f := 2 end; write(f).");

    assert_eq!(text.matches("slot %f\n").count(), 1, "{}", text);
    assert!(text.contains("slot %f.1"));
    assert!(text.contains("store %f.1, 2"));
    assert!(!text.contains("store %f, 2"));
    assert!(text.contains("%ret = load %f\n"));
}

#[test]
fn local_shadowing_a_parameter_gets_its_own_slot() {
    let text = listing("function g(a); var a; begin a := 1; g := a end; write(g(3)).");

    assert!(text.contains("define i32 @g(i32 %a) {"), "{}", text);
    assert!(!text.contains("slot %a\n"));
    assert!(text.contains("slot %a.1"));
    assert!(text.contains("store %a.1, 1"));
    assert!(text.contains("= load %a.1"));
    assert!(text.contains("store %g, %t"));
}

#[test]
fn runtime_declarations_use_the_library_arity() {
    let text = listing("var x; x := getrand.");
    assert!(text.contains("declare i32 @getrand()\n"), "{}", text);
}
