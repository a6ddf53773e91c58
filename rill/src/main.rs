use std::io::{BufRead, Write};
use std::rc::Rc;

use rill::builtins::{Library, NativeAction, RandomLibrary};
use rill::cli;
use rill::interp::{Interactive, Interpreter};
use rill::value::Value;

/// Console output actions for scripts run from the command line.
///
/// The interpreter core performs no I/O; `print` and `printline` are supplied
/// here, by the host.
struct ConsoleLibrary;

impl Library for ConsoleLibrary {
    fn name(&self) -> &'static str {
        "console"
    }

    fn actions(&self) -> Vec<(&'static str, NativeAction)> {
        fn render(args: &[Value]) -> String {
            args.iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join("")
        }
        vec![
            (
                "print",
                Rc::new(|args: &[Value]| {
                    print!("{}", render(args));
                    let _ = std::io::stdout().flush();
                    Ok(())
                }) as NativeAction,
            ),
            (
                "printline",
                Rc::new(|args: &[Value]| {
                    println!("{}", render(args));
                    Ok(())
                }),
            ),
        ]
    }
}

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("rill: {e}");
            eprintln!("Usage: rill [-e<source>] [-s<seed>] [-q] [<script>]");
            std::process::exit(1);
        }
    };

    let mut interp = Interpreter::new();
    interp.install(&ConsoleLibrary);
    let random = match args.seed {
        Some(seed) => RandomLibrary::with_seed(seed),
        None => RandomLibrary::new(),
    };
    interp.install(&random);
    interp.set_var("version", Value::Text(env!("CARGO_PKG_VERSION").to_owned()));

    // ── Batch: -e<source> or a script file ────────────────────────────────────
    if let Some(source) = args.eval {
        run_batch(&mut interp, &source);
        return;
    }
    if let Some(path) = args.script {
        let source = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("rill: {}: {e}", path.display());
                std::process::exit(1);
            }
        };
        run_batch(&mut interp, &source);
        return;
    }

    // ── Interactive session ───────────────────────────────────────────────────
    if !args.quiet {
        println!("rill {}", env!("CARGO_PKG_VERSION"));
        println!("Press Ctrl-D to leave.");
    }
    repl(&mut interp);
}

fn run_batch(interp: &mut Interpreter, source: &str) {
    let result = interp.run(source);
    for line in interp.take_output() {
        println!("{line}");
    }
    if let Err(e) = result {
        eprintln!("rill: {e}");
        std::process::exit(1);
    }
}

fn repl(interp: &mut Interpreter) {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        // A continuation prompt while a block is still open.
        let prompt = if interp.is_deferred() { ". " } else { "> " };
        print!("{prompt}");
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("rill: {e}");
                break;
            }
        }

        match interp.run_interactive(line.trim_end_matches('\n')) {
            Ok(Interactive::Deferred) => {}
            Ok(Interactive::Completed) => {
                for out in interp.take_output() {
                    println!("{out}");
                }
            }
            Err(e) => {
                // Report and keep the session alive; bindings made before the
                // failing statement survive.
                interp.take_output();
                eprintln!("rill: {e}");
            }
        }
    }
}
