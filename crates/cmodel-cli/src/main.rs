//! The `config-model` binary.
//!
//! `registry serve` runs the registry service; `registry get/list/push/
//! delete` are thin remote clients of it; `compile` builds a plugin into a
//! local directory without a server; `init` warms the module resolver so
//! the first publish does not pay the fetch.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cmodel_cache::{CacheConfig, PluginCache};
use cmodel_compiler::{CompilerConfig, PluginCompiler};
use cmodel_module::{Resolver, ResolverConfig};
use cmodel_registry::{
    ConfigModelRegistry, RegistryConfig, RegistryService, ServerConfig, serve,
};
use colored::Colorize;
use tracing::info;

mod client;

use client::RegistryClient;

/// Initialize the tracing subscriber. An explicit --trace level wins over
/// the RUST_LOG environment; the fallback keeps operational logging on.
fn initialize_tracing(level: &Option<String>) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match level {
        Some(level) => {
            let filter = format!(
                "cmodel_core={level},cmodel_module={level},cmodel_cache={level},\
                 cmodel_compiler={level},cmodel_registry={level},config_model={level},\
                 tower_http={level}"
            );
            EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"))
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

#[derive(Parser)]
#[command(name = "config-model")]
#[command(about = "Config model plugin registry", long_about = None)]
struct Cli {
    /// Enable tracing (levels: trace, debug, info, warn, error)
    #[arg(long, global = true)]
    trace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the model registry
    Registry(RegistryArgs),
    /// Compile a config model plugin locally
    Compile(CompileArgs),
    /// Warm the module resolver for the configured target
    Init(InitArgs),
}

#[derive(Args)]
struct RegistryArgs {
    #[command(subcommand)]
    command: RegistryCommands,
}

#[derive(Subcommand)]
enum RegistryCommands {
    /// Start the model registry server
    Serve(ServeArgs),
    /// Get a model from the registry
    Get(GetArgs),
    /// List models in the registry
    List(ListArgs),
    /// Push a model to the registry
    Push(PushArgs),
    /// Delete a model from the registry
    Delete(DeleteArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// The registry service port
    #[arg(short, long, default_value_t = 5151)]
    port: u16,

    /// The path in which to store the registry models
    #[arg(long, env = "CONFIG_MODEL_REGISTRY", default_value = "/etc/onos/registry")]
    registry_path: PathBuf,

    /// The path in which to store compiled plugins
    #[arg(long, default_value = "/etc/onos/plugins")]
    cache_path: PathBuf,

    /// The path in which to store temporary build artifacts
    #[arg(long, default_value = "/etc/onos/build")]
    build_path: PathBuf,

    /// The path in which to store the resolved module state
    #[arg(long, default_value = "/etc/onos/mod")]
    mod_path: PathBuf,

    /// The target module reference, path[@version]
    #[arg(long, env = "CONFIG_MODULE_TARGET", default_value = "")]
    mod_target: String,

    /// An optional replacement module reference, path[@version]
    #[arg(long, env = "CONFIG_MODULE_REPLACE", default_value = "")]
    mod_replace: String,

    /// The CA certificate
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// The certificate
    #[arg(long)]
    cert: Option<PathBuf>,

    /// The key
    #[arg(long)]
    key: Option<PathBuf>,

    /// Leave build trees in place after compilation
    #[arg(long = "skipcleanup")]
    skip_cleanup: bool,
}

#[derive(Args)]
struct AddressArg {
    /// The registry address
    #[arg(short, long, default_value = "localhost:5151")]
    address: String,
}

#[derive(Args)]
struct GetArgs {
    #[command(flatten)]
    address: AddressArg,

    /// The model name
    #[arg(short, long)]
    name: String,

    /// The model version
    #[arg(short, long)]
    version: String,
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    address: AddressArg,
}

#[derive(Args)]
struct PushArgs {
    #[command(flatten)]
    address: AddressArg,

    /// The model name
    #[arg(short, long)]
    name: String,

    /// The model version
    #[arg(short, long)]
    version: String,

    /// The module organization applied to every module
    #[arg(short, long, default_value = "")]
    organization: String,

    /// A model module, NAME@REVISION=FILE; repeatable
    #[arg(short, long = "module")]
    modules: Vec<String>,
}

#[derive(Args)]
struct DeleteArgs {
    #[command(flatten)]
    address: AddressArg,

    /// The model name
    #[arg(short, long)]
    name: String,

    /// The model version
    #[arg(short, long)]
    version: String,
}

#[derive(Args)]
struct CompileArgs {
    /// The model name
    #[arg(short, long)]
    name: String,

    /// The model version
    #[arg(short, long)]
    version: String,

    /// The module organization applied to every module
    #[arg(short, long, default_value = "")]
    organization: String,

    /// A model module, NAME@REVISION=FILE; repeatable
    #[arg(short, long = "module")]
    modules: Vec<String>,

    /// The build path; defaults to {output-path}/build
    #[arg(short, long)]
    build_path: Option<PathBuf>,

    /// The output path; defaults to the working directory
    #[arg(short = 'p', long)]
    output_path: Option<PathBuf>,

    /// The target module reference, path[@version]
    #[arg(long, env = "CONFIG_MODULE_TARGET", default_value = "")]
    mod_target: String,

    /// An optional replacement module reference, path[@version]
    #[arg(long, env = "CONFIG_MODULE_REPLACE", default_value = "")]
    mod_replace: String,

    /// The path in which to store the resolved module state
    #[arg(long, default_value = "/etc/onos/mod")]
    mod_path: PathBuf,
}

#[derive(Args)]
struct InitArgs {
    /// The target module reference, path[@version]
    #[arg(long, env = "CONFIG_MODULE_TARGET")]
    mod_target: String,

    /// An optional replacement module reference, path[@version]
    #[arg(long, env = "CONFIG_MODULE_REPLACE", default_value = "")]
    mod_replace: String,

    /// The path in which to store the resolved module state
    #[arg(long, default_value = "/etc/onos/mod")]
    mod_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(&cli.trace);

    match cli.command {
        Commands::Registry(registry) => match registry.command {
            RegistryCommands::Serve(args) => serve_command(args).await,
            RegistryCommands::Get(args) => get_command(args).await,
            RegistryCommands::List(args) => list_command(args).await,
            RegistryCommands::Push(args) => push_command(args).await,
            RegistryCommands::Delete(args) => delete_command(args).await,
        },
        Commands::Compile(args) => compile_command(args).await,
        Commands::Init(args) => init_command(args).await,
    }
}

async fn compile_command(args: CompileArgs) -> Result<()> {
    let output_path = match args.output_path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let build_path = args
        .build_path
        .unwrap_or_else(|| output_path.join("build"));

    let model = client::build_push_model(
        &args.name,
        &args.version,
        &args.organization,
        &args.modules,
    )?;
    let descriptor = model.into_descriptor();
    descriptor.validate()?;

    let resolver = (!args.mod_target.is_empty()).then(|| {
        Arc::new(Resolver::new(ResolverConfig {
            path: args.mod_path,
            target: args.mod_target,
            replace: args.mod_replace,
        }))
    });
    let compiler = PluginCompiler::new(
        CompilerConfig {
            template_path: None,
            build_path,
            skip_cleanup: false,
            mod_tidy: false,
        },
        resolver,
    );

    let artifact = output_path.join(descriptor.artifact_file_name());
    compiler.compile(&descriptor, &artifact).await?;

    // The output directory doubles as a local registry.
    let registry = ConfigModelRegistry::new(RegistryConfig { path: output_path });
    registry.add(&descriptor).await?;

    print_status_line("compile", Status::Ok, &artifact.display().to_string());
    Ok(())
}

async fn serve_command(args: ServeArgs) -> Result<()> {
    let resolver = Arc::new(Resolver::new(ResolverConfig {
        path: args.mod_path,
        target: args.mod_target.clone(),
        replace: args.mod_replace,
    }));

    let registry = Arc::new(ConfigModelRegistry::new(RegistryConfig {
        path: args.registry_path.clone(),
    }));
    let cache = Arc::new(PluginCache::new(
        CacheConfig {
            path: args.cache_path,
        },
        Arc::clone(&resolver),
    ));
    // Without a configured target the compiler falls back to its manifest
    // template instead of the resolver.
    let compiler_resolver = (!args.mod_target.is_empty()).then(|| Arc::clone(&resolver));
    let compiler = Arc::new(PluginCompiler::new(
        CompilerConfig {
            template_path: None,
            build_path: args.build_path,
            skip_cleanup: args.skip_cleanup,
            mod_tidy: false,
        },
        compiler_resolver,
    ));

    let service = Arc::new(RegistryService::new(registry, cache, compiler));

    info!(registry = %args.registry_path.display(), "starting registry server");
    serve(
        service,
        ServerConfig {
            port: args.port,
            ca_cert: args.ca_cert,
            cert: args.cert,
            key: args.key,
        },
    )
    .await?;
    Ok(())
}

async fn get_command(args: GetArgs) -> Result<()> {
    let client = RegistryClient::new(&args.address.address);
    let model = client.get_model(&args.name, &args.version).await?;
    println!("{}", serde_json::to_string_pretty(&model)?);
    Ok(())
}

async fn list_command(args: ListArgs) -> Result<()> {
    let client = RegistryClient::new(&args.address.address);
    for model in client.list_models().await? {
        println!("{}", serde_json::to_string_pretty(&model)?);
    }
    Ok(())
}

async fn push_command(args: PushArgs) -> Result<()> {
    let client = RegistryClient::new(&args.address.address);
    let model = client::build_push_model(
        &args.name,
        &args.version,
        &args.organization,
        &args.modules,
    )?;
    client.push_model(model).await?;
    print_status_line("push", Status::Ok, &format!("{}/{}", args.name, args.version));
    Ok(())
}

async fn delete_command(args: DeleteArgs) -> Result<()> {
    let client = RegistryClient::new(&args.address.address);
    client.delete_model(&args.name, &args.version).await?;
    print_status_line(
        "delete",
        Status::Ok,
        &format!("{}/{}", args.name, args.version),
    );
    Ok(())
}

async fn init_command(args: InitArgs) -> Result<()> {
    print_section_header("Module Resolver");
    let resolver = Resolver::new(ResolverConfig {
        path: args.mod_path.clone(),
        target: args.mod_target.clone(),
        replace: args.mod_replace,
    });

    let (manifest, hash) = match resolver.resolve().await {
        Ok(resolved) => resolved,
        Err(e) => {
            print_status_line("target", Status::Error, &args.mod_target);
            return Err(e.into());
        }
    };
    print_status_line("target", Status::Ok, &args.mod_target);
    print_status_line(
        "module",
        Status::Ok,
        manifest.module.as_deref().unwrap_or("<unnamed>"),
    );
    print_status_line("hash", Status::Ok, &hash.to_base64url());
    print_status_line("state", Status::Ok, &args.mod_path.display().to_string());
    Ok(())
}

fn print_section_header(title: &str) {
    let line = "==============================".dimmed();
    println!("{}", line);
    println!("{}", title.bold());
    println!("{}", line);
}

enum Status {
    Ok,
    Error,
}

fn print_status_line(label: &str, status: Status, value: &str) {
    let status_str = match status {
        Status::Ok => "OK".green().bold(),
        Status::Error => "FAILED".red().bold(),
    };
    println!("{:<10} [{}] {}", label.bold(), status_str, value);
}
