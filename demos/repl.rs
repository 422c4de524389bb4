use anyhow::{Context, Result};
use clap::Parser;
use l3eval::ast::{Exp, Program};
use l3eval::evaluator::{Config, EvaluatorKind, evaluate_source};
use l3eval::scheme::{ParseConfig, parse_l3_exp, parse_l3_program, parse_sexp_with_config};
use l3eval::transform::lex_transform;
use l3eval::value::Value;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;

/// Interactive L3 evaluator with classes
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Evaluator to use: env or sub
    #[arg(short, long, default_value = "env")]
    evaluator: EvaluatorKind,

    /// Rewrite classes into procedures before evaluating
    #[arg(short, long)]
    transform: bool,

    /// Log evaluation steps (same as RUST_LOG=l3eval=debug)
    #[arg(short, long)]
    verbose: bool,

    /// Run an (L3 ...) program file and exit
    file: Option<PathBuf>,
}

const PARSE_CONFIG: ParseConfig = ParseConfig {
    handle_comments: true,
};

/// REPL state: top-level definitions are replayed in front of every input
struct Session {
    evaluator: EvaluatorKind,
    transform: bool,
    defines: Vec<Exp>,
}

impl Session {
    fn program(&self, exps: Vec<Exp>) -> Program {
        let program = Program {
            exps: self.defines.iter().cloned().chain(exps).collect(),
        };
        if self.transform {
            lex_transform(&program)
        } else {
            program
        }
    }

    fn run(&self, exps: Vec<Exp>) -> Result<Value, l3eval::Error> {
        self.evaluator.create().evaluate_program(&self.program(exps))
    }

    fn eval_line(&mut self, line: &str) -> Result<Option<Value>, l3eval::Error> {
        let datum = parse_sexp_with_config(line, PARSE_CONFIG)?;

        // Whole programs run on their own, without the session's definitions
        if let Value::List(items) = &datum
            && let Some(Value::Symbol(head)) = items.first()
            && head == "L3"
        {
            let program = parse_l3_program(&datum)?;
            self.show_transform(&program);
            let config = Config {
                evaluator: self.evaluator,
                lex_transform: self.transform,
                parse: PARSE_CONFIG,
            };
            return evaluate_source(line, &config).map(Some);
        }

        let exp = parse_l3_exp(&datum)?;
        self.show_transform(&Program {
            exps: vec![exp.clone()],
        });
        match exp {
            Exp::Define(def) => {
                let program = self.program(vec![Exp::Define(def.clone())]);
                self.evaluator.create().definitions(&program)?;
                println!("{}", def.var);
                self.defines.push(Exp::Define(def));
                Ok(None)
            }
            Exp::CExp(_) => self.run(vec![exp]).map(Some),
        }
    }

    fn show_transform(&self, program: &Program) {
        if self.transform {
            let rewritten = lex_transform(program);
            if rewritten != *program {
                for exp in &rewritten.exps {
                    println!("→ {exp}");
                }
            }
        }
    }

    fn print_environment(&self) {
        let bindings = match self.evaluator.create().definitions(&self.program(vec![])) {
            Ok(env) => env.bindings(),
            Err(e) => {
                println!("Error: {e}");
                return;
            }
        };
        if bindings.is_empty() {
            println!("No definitions.");
            return;
        }
        println!("Definitions ({} total):", bindings.len());
        for (name, value) in bindings {
            println!("  {name} = {value}");
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &args.file {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Config {
            evaluator: args.evaluator,
            lex_transform: args.transform,
            parse: PARSE_CONFIG,
        };
        let value = evaluate_source(&source, &config)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        println!("{value}");
        return Ok(());
    }

    run_repl(Session {
        evaluator: args.evaluator,
        transform: args.transform,
        defines: Vec::new(),
    })
}

fn run_repl(mut session: Session) -> Result<()> {
    println!("L3 evaluator with classes ({} model)", session.evaluator);
    println!("Enter expressions like: ((class (a) ((get (lambda () a)))) 1)");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().context("Could not initialize REPL")?;

    loop {
        match rl.readline("l3> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        session.print_environment();
                        continue;
                    }
                    ":transform" => {
                        session.transform = !session.transform;
                        println!(
                            "Class transformation {}",
                            if session.transform { "enabled" } else { "disabled" }
                        );
                        continue;
                    }
                    ":reset" => {
                        session.defines.clear();
                        println!("Definitions cleared.");
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                if let Some(name) = line.strip_prefix(":evaluator") {
                    match name.trim().parse::<EvaluatorKind>() {
                        Ok(kind) => {
                            session.evaluator = kind;
                            println!("Using the {kind} evaluator");
                        }
                        Err(e) => println!("Error: {e}"),
                    }
                    continue;
                }

                match session.eval_line(line) {
                    Ok(Some(value)) => println!("{value}"),
                    Ok(None) => {}
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => return Err(err).context("Reading input failed"),
        }
    }
    Ok(())
}

fn print_help() {
    println!("L3 evaluator commands:");
    println!("  :help            - Show this help message");
    println!("  :env             - Show current definitions and their values");
    println!("  :transform       - Toggle rewriting classes into procedures");
    println!("  :evaluator NAME  - Switch evaluator (env or sub)");
    println!("  :reset           - Forget all definitions");
    println!("  :quit            - Exit the interpreter");
    println!("  Ctrl+C           - Exit the interpreter");
    println!();
    println!("Forms: define, lambda, let, if, quote, class");
    println!("Primitives: + - * / = < > <= >= eq? string=? not and or");
    println!("            cons car cdr list pair? null? list? number? boolean? symbol? string?");
    println!();
    println!("Examples:");
    println!("  (define pair (class (a b) ((first (lambda () a)) (second (lambda () b)))))");
    println!("  (define p34 (pair 3 4))");
    println!("  (p34 'first)");
    println!("  (L3 (define x 2) (* x x))");
    println!();
}
