//! Command-line front end for a task database file.
//!
//! Usage:
//!   task_cli <db_path> add <json>
//!   task_cli <db_path> get <id>
//!   task_cli <db_path> update <json>
//!   task_cli <db_path> delete <id>
//!   task_cli <db_path> list
//!   task_cli <db_path> count
//!   task_cli <db_path> stats
//!
//! Diagnostics go to stderr, filtered by the `TASK_STORE_LOG` variable
//! (default `warn`).

use std::env;
use std::process::exit;
use task_store::codec;
use task_store::logging::init_logging;
use task_store::{Config, Db, Result, StoreError};

fn print_usage() {
    eprintln!("Usage: task_cli <db_path> <command> [args...]");
    eprintln!("Commands:");
    eprintln!("  add <json>      - Insert a task, e.g. '{{\"title\": \"Write report\"}}'");
    eprintln!("  get <id>        - Show a task");
    eprintln!("  update <json>   - Update fields of a task, 'id' is required");
    eprintln!("  delete <id>     - Delete a task");
    eprintln!("  list            - Print all tasks as a JSON array");
    eprintln!("  count           - Print the number of tasks");
    eprintln!("  stats           - Show database statistics");
}

fn usage() -> ! {
    print_usage();
    exit(1);
}

fn parse_id(arg: Option<&String>) -> Result<u32> {
    let arg = arg.ok_or_else(|| StoreError::invalid_operation("missing task id"))?;
    arg.parse::<u32>()
        .map_err(|_| StoreError::invalid_operation(format!("invalid task id '{}'", arg)))
}

fn payload(arg: Option<&String>) -> Result<&str> {
    arg.map(String::as_str)
        .ok_or_else(|| StoreError::invalid_operation("missing JSON payload"))
}

fn run(db: &Db, command: &str, args: &[String]) -> Result<()> {
    match command {
        "add" => {
            let id = db.add(payload(args.first())?)?;
            println!("Task added with ID {}", id);
        }

        "get" => {
            let task = db.find(parse_id(args.first())?)?;
            println!("{}", codec::describe(&task));
        }

        "update" => {
            let task = db.update_json(payload(args.first())?)?;
            println!("{}", codec::to_json(&task)?);
        }

        "delete" => {
            let id = parse_id(args.first())?;
            db.delete(id)?;
            println!("Task {} deleted", id);
        }

        "list" => {
            println!("{}", db.enumerate_all_json()?);
        }

        "count" => {
            println!("{}", db.count());
        }

        "stats" => {
            let stats = db.stats();
            println!("Database Statistics:");
            println!("  Records:     {}", stats.record_count);
            println!("  Free blocks: {}", stats.free_blocks);
            println!("  Next id:     {}", stats.next_id);
            println!("  Capacity:    {}", stats.capacity);
            println!("  Data end:    {}", stats.data_end);
        }

        _ => {
            print_usage();
            return Err(StoreError::invalid_operation(format!(
                "unknown command '{}'",
                command
            )));
        }
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        usage();
    }

    let level = env::var("TASK_STORE_LOG").unwrap_or_else(|_| "warn".to_string());
    if let Err(e) = init_logging(&level) {
        eprintln!("WARNING: {}", e);
    }

    let db = match Db::open(Config::new(&args[1])) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("ERROR: Failed to open database: {}", e);
            exit(1);
        }
    };

    let outcome = run(&db, &args[2], &args[3..]);

    if let Err(e) = db.shutdown() {
        eprintln!("ERROR: Failed to close database: {}", e);
        exit(1);
    }
    if let Err(e) = outcome {
        eprintln!("ERROR: {}", e);
        exit(1);
    }
}
