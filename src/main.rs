//! jltc - type system inspector
//!
//! Loads a universe of source declarations and class files, then answers
//! type algebra and lookup queries against it.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use jltc::frontend::encoding::TypeEncoder;
use jltc::frontend::scheduler::require;
use jltc::types::{ClassKind, MemberInstance, ProcedureInstance};
use jltc::{ClassId, Session, Type, TypeSystemConfig, Universe};

/// Type system inspector for Java-like class universes
#[derive(Parser, Debug)]
#[command(name = "jltc")]
#[command(version)]
#[command(about = "Inspect the type algebra and member lookup of a class universe")]
struct Cli {
    /// Type system configuration (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Universe of source declarations and class files (JSON)
    #[arg(short, long, value_name = "FILE")]
    universe: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the flags, supertypes and members of a class
    Dump { class: String },

    /// Is A a subtype of B?
    Subtype { a: String, b: String },

    /// Is a cast from A to B legal?
    Cast { a: String, b: String },

    /// Least common ancestor of A and B
    Lca { a: String, b: String },

    /// Resolve a method call by overload resolution
    Call {
        class: String,
        method: String,
        /// Argument types, written as in source
        args: Vec<String>,
        /// Class the call is made from
        #[arg(long, value_name = "CLASS")]
        from: Option<String>,
    },

    /// Print the embedded metadata of a class
    Encode { class: String },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => TypeSystemConfig::load(path)?,
        None => TypeSystemConfig::default(),
    };
    let universe = Universe::load(&cli.universe)?;
    let session = Session::from_universe(config, universe);
    let ts = &session.ts;

    match &cli.command {
        Commands::Dump { class } => {
            let id = session.class(class)?;
            session.compile_all()?;
            require(ts, || ts.ensure_all_members(id))?;
            dump(&session, id)?;
        }
        Commands::Subtype { a, b } => {
            let (a, b) = (session.type_named(a)?, session.type_named(b)?);
            println!("{}", ts.is_subtype(&a, &b)?);
        }
        Commands::Cast { a, b } => {
            let (a, b) = (session.type_named(a)?, session.type_named(b)?);
            let implicit = ts.is_implicit_cast_valid(&a, &b)?;
            let explicit = ts.is_cast_valid(&a, &b)?;
            println!("implicit: {}, explicit: {}", implicit, explicit);
        }
        Commands::Lca { a, b } => {
            let (a, b) = (session.type_named(a)?, session.type_named(b)?);
            let lca = ts.least_common_ancestor(&a, &b)?;
            println!("{}", ts.type_name(&lca));
        }
        Commands::Call { class, method, args, from } => {
            let container = Type::Class(session.class(class)?);
            let args = args.iter().map(|a| session.type_named(a)).collect::<jltc::Result<Vec<_>>>()?;
            let accessor = from.as_deref().map(|f| session.class(f)).transpose()?;
            session.compile_all()?;
            let mi = require(ts, || ts.find_method(&container, method, &args, accessor))
                .with_context(|| format!("resolving {}.{}", class, method))?;
            println!(
                "{} {} {}.{}",
                mi.flags(),
                ts.type_name(mi.return_type()),
                ts.type_name(mi.container()),
                ts.signature(&mi)
            );
        }
        Commands::Encode { class } => {
            let id = session.class(class)?;
            session.compile_all()?;
            println!("{}", TypeEncoder::new(ts).encode(id)?);
        }
    }
    Ok(())
}

fn dump(session: &Session, id: ClassId) -> Result<()> {
    let ts = &session.ts;
    let kind = match ts.kind(id) {
        ClassKind::TopLevel => "top-level",
        ClassKind::Member { .. } => "member",
        ClassKind::Local { .. } => "local",
        ClassKind::Anonymous { .. } => "anonymous",
    };
    println!("{} {} class {}", ts.flags(id), kind, ts.full_name(id));
    if let Some(sup) = ts.super_type(id)? {
        println!("  extends {}", ts.type_name(&sup));
    }
    let interfaces = ts.interfaces(id)?;
    if !interfaces.is_empty() {
        println!("  implements {}", ts.type_names(&interfaces).join(", "));
    }
    for member in ts.member_classes(id)? {
        println!("  class {}", ts.full_name(member));
    }
    for field in ts.fields(id)? {
        println!("  {} {} {}", field.flags(), ts.type_name(field.ty()), field.name());
    }
    for ctor in ts.constructors(id)? {
        println!("  {} {}", ctor.flags(), ts.signature(&ctor));
    }
    for method in ts.methods(id)? {
        let throws = method.throw_types();
        let throws = if throws.is_empty() {
            String::new()
        } else {
            format!(" throws {}", ts.type_names(throws).join(", "))
        };
        println!("  {} {} {}{}", method.flags(), ts.type_name(method.return_type()), ts.signature(&method), throws);
    }
    Ok(())
}
