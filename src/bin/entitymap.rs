use std::{env, process};

use entitymap::{
    EntityMapError, OrmConfig, PersistenceContext, cli::CommandLineConfig,
    translator::ColumnStyle,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", CommandLineConfig::help());
        return;
    }
    let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let config = match CommandLineConfig::from_args(&arg_refs) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            eprint!("{}", CommandLineConfig::help());
            process::exit(2);
        }
    };

    let mapping = match load_mapping(&config) {
        Ok(mapping) => mapping,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };

    if let Err(err) = run_command(&config, &mapping) {
        eprintln!("command failed: {err}");
        process::exit(1);
    }
}

fn load_mapping(config: &CommandLineConfig) -> Result<OrmConfig, String> {
    let path = config.require_config()?;
    OrmConfig::from_path(path).map_err(|e| e.to_string())
}

fn run_command(config: &CommandLineConfig, mapping: &OrmConfig) -> Result<(), EntityMapError> {
    match config.command.as_str() {
        "entities" => {
            let registry = mapping.registry()?;
            for entity in registry.entities() {
                println!(
                    "{} -> {} ({} properties, {} associations)",
                    entity.name(),
                    entity.table(),
                    entity.properties().len(),
                    entity.associations().len()
                );
            }
            Ok(())
        }
        "translate" => {
            let sql = config.require_input().map_err(EntityMapError::precondition)?;
            let ctx = PersistenceContext::from_config(mapping)?;
            println!("{}", ctx.translator().translate_sql(sql, ColumnStyle::Qualified)?);
            Ok(())
        }
        "count" => {
            let entity = config.require_input().map_err(EntityMapError::precondition)?;
            let ctx = PersistenceContext::from_config(mapping)?;
            let total = ctx.from(entity).count(&ctx)?;
            println!("{entity}={total}");
            Ok(())
        }
        other => Err(EntityMapError::precondition(format!(
            "unknown command {other}"
        ))),
    }
}
