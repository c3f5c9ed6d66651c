/// Create EC2 Image Builder pipelines and assets.
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use ibp::definition::PipelineDefinition;
use ibp::{api, aws, definition, orchestrator};
use log::{error, info};
use thiserror::Error;

/// Create an EC2 Image Builder pipeline and its dependent resources from
/// a declarative pipeline definition.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// File containing the pipeline definition, referencing components and such.
    #[arg(long)]
    pipeline_def: String,

    /// S3 bucket to temporarily store component definitions in (optional).
    /// Use if the API tells you the component has too many characters.
    #[arg(long)]
    component_bucket: Option<String>,

    /// Start the pipeline after creation.
    #[arg(long)]
    start_pipeline: bool,

    /// Recreate non-versioned resources instead of reusing them.
    #[arg(long)]
    update: bool,

    /// Increase output verbosity.
    #[arg(long)]
    debug: bool,

    /// Region to create the pipeline resources in.
    #[arg(long, default_value = "us-east-1")]
    region: String,
}

#[derive(Error, Debug)]
enum Error {
    #[error("pipeline definition: {0}")]
    Definition(#[from] definition::Error),

    #[error("session: {0}")]
    Session(#[from] api::ApiError),

    #[error(transparent)]
    Provision(#[from] orchestrator::Error),
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            error!("fatal: {err}");
            std::process::exit(1)
        }
    }
}

async fn run() -> Result<(), Error> {
    let args = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.debug { "debug" } else { "info" }),
    )
    .init();

    // The definition is validated in full before any remote call.
    let definition = PipelineDefinition::parse_file(&args.pipeline_def)?;

    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(args.region.clone()))
        .load()
        .await;

    info!("Obtaining session details");
    let session = aws::session_details(&config).await?;
    info!("Account: {}", session.account);
    info!("Alias: {}", session.aliases.join(", "));
    info!("User: {}", session.user());

    let registry = aws::ImageBuilderService::new(&config);
    let identity = aws::IdentityService::new(&config);
    let staging = aws::StagingService::new(&config);

    let options = orchestrator::RunOptions {
        staging_bucket: args.component_bucket,
        start_pipeline: args.start_pipeline,
        update: args.update,
    };

    let outcome = orchestrator::run(
        &registry,
        &identity,
        &staging,
        &options,
        &definition,
        &session.account,
    )
    .await?;

    if let Some(image_arn) = outcome.image_build_arn {
        info!("Creating image {image_arn}");
    }
    Ok(())
}
