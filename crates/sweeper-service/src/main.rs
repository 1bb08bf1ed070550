//! Main entry point for the stale-order sweeper.
//!
//! The `sweeper` binary cancels unpaid orders that have sat in an
//! awaiting-payment status for too long. It runs the sweep on a schedule,
//! optionally serves a small HTTP API, and offers one-shot commands for
//! operators.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sweeper_config::Config;
use sweeper_core::{SweepEngine, SweeperBuilder, SweeperFactories};

mod apis;
mod commands;
mod server;

use commands::SettingsArgs;
use sweeper_orders::implementations::file::create_repository as create_file_orders;
use sweeper_orders::implementations::memory::create_repository as create_memory_orders;
use sweeper_storage::implementations::file::create_storage as create_file_storage;
use sweeper_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the sweeper.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "SWEEPER_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Command to run; defaults to `run`
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run scheduled sweeps (and the API server when enabled) until interrupted
	Run,
	/// Run one sweep now and print the outcome
	RunNow,
	/// Show or change the sweep settings
	Settings {
		#[command(subcommand)]
		action: SettingsCommand,
	},
	/// Load orders from a JSON array into the order repository
	ImportOrders {
		/// JSON file holding the orders
		file: PathBuf,
	},
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
	/// Print the effective settings as JSON
	Show,
	/// Update the settings; omitted flags keep their current value
	Set(SettingsArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.sweeper.id);

	let engine = build_engine(config.clone())?;
	engine.initialize().await?;

	match args.command.unwrap_or(Command::Run) {
		Command::Run => commands::run(engine.clone(), &config).await?,
		Command::RunNow => {
			let result = commands::run_now(engine.clone(), &config).await?;
			println!("{}", result.summary());
		},
		Command::Settings { action } => match action {
			SettingsCommand::Show => {
				let settings = engine.settings().read().await?;
				println!("{}", serde_json::to_string_pretty(&settings)?);
			},
			SettingsCommand::Set(update) => {
				let settings = commands::update_settings(engine.settings(), update).await?;
				println!("{}", serde_json::to_string_pretty(&settings)?);
			},
		},
		Command::ImportOrders { file } => {
			let count = commands::import_orders(engine.orders().as_ref(), &file).await?;
			println!("Imported {} orders", count);
		},
	}

	engine.shutdown().await?;
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the sweep engine with the storage and order implementations
/// compiled into this binary.
fn build_engine(config: Config) -> Result<SweepEngine, Box<dyn std::error::Error>> {
	let builder = SweeperBuilder::new(config);

	let storage_factories = create_factory_map!(
		sweeper_storage::StorageInterface,
		sweeper_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let order_factories = create_factory_map!(
		sweeper_orders::OrderRepository,
		sweeper_orders::OrderError,
		"file" => create_file_orders,
		"memory" => create_memory_orders,
	);

	let factories = SweeperFactories {
		storage_factories,
		order_factories,
	};

	Ok(builder.build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use sweeper_config::builders::ConfigBuilder;
	use tempfile::tempdir;

	#[test]
	fn test_args_default_to_run() {
		let args = Args::try_parse_from(["sweeper"]).unwrap();
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
		assert!(args.command.is_none());
	}

	#[test]
	fn test_settings_set_arguments() {
		let args = Args::try_parse_from([
			"sweeper",
			"--config",
			"custom.toml",
			"settings",
			"set",
			"--enabled",
			"false",
			"--statuses",
			"pending,on-hold",
			"--hours",
			"pending=48",
		])
		.unwrap();

		assert_eq!(args.config, PathBuf::from("custom.toml"));
		match args.command {
			Some(Command::Settings {
				action: SettingsCommand::Set(update),
			}) => {
				assert_eq!(update.enabled, Some(false));
				assert_eq!(
					update.statuses,
					Some(vec!["pending".to_string(), "on-hold".to_string()])
				);
				assert_eq!(update.hours, vec!["pending=48".to_string()]);
			},
			other => panic!("unexpected command: {:?}", other),
		}
	}

	#[test]
	fn test_import_orders_requires_file() {
		assert!(Args::try_parse_from(["sweeper", "import-orders"]).is_err());
		let args = Args::try_parse_from(["sweeper", "import-orders", "orders.json"]).unwrap();
		assert!(matches!(args.command, Some(Command::ImportOrders { .. })));
	}

	#[test]
	fn test_create_factory_map_macro() {
		use sweeper_storage::implementations::memory::create_storage;
		use sweeper_storage::{StorageError, StorageInterface};

		let factories = create_factory_map!(
			StorageInterface,
			StorageError,
			"memory" => create_storage,
		);

		assert_eq!(factories.len(), 1);
		assert!(factories.contains_key("memory"));
	}

	#[tokio::test]
	async fn test_build_engine_with_file_backends() {
		let dir = tempdir().unwrap();
		let mut table = toml::Table::new();
		table.insert(
			"storage_path".to_string(),
			toml::Value::String(dir.path().display().to_string()),
		);
		let config = ConfigBuilder::new()
			.settings_backend("file", toml::Value::Table(table.clone()))
			.orders_backend("file", toml::Value::Table(table))
			.build();

		let engine = build_engine(config).unwrap();
		engine.initialize().await.unwrap();

		assert!(dir.path().join("settings").join("current.json").exists());
		assert!(engine.orders().is_available().await);
	}

	#[test]
	fn test_build_engine_rejects_unknown_backend() {
		let config = ConfigBuilder::new()
			.orders_backend("postgres", toml::Value::Table(toml::Table::new()))
			.build();
		assert!(build_engine(config).is_err());
	}
}
