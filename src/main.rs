use clap::{Args, Parser, Subcommand};
use curator::api::CollectionApi;
use curator::config::Config;
use curator::dispatcher::{
    LinkFormModal, RecordDispatcher, RecordModal, ResourceConfig, RowCapabilities,
};
use curator::gallery_client::GalleryClient;
use curator::import::{
    ConversionUpdate, DataUriEncoder, DetailLoad, Encoder, FileRef, ImageDetailSession,
    SubmitPolicy, UploadSession,
};
use curator::models::RecordId;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Admin tool for gallery collections
#[derive(Parser, Debug)]
#[command(name = "curator", version)]
struct Cli {
    /// Base URL of the collection API (overrides CURATOR_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Rows per listing page (overrides CURATOR_PAGE_SIZE)
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Simultaneous image encodes (overrides CURATOR_ENCODE_CONCURRENCY)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List records of a resource (images, links or specs)
    List {
        resource: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Create an image collection from files
    Upload {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Refuse to upload unless every file converts
        #[arg(long)]
        strict: bool,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show one image collection
    ShowImages { id: String },
    /// Change an image collection's text and add images
    EditImages {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        files: Vec<PathBuf>,
    },
    /// Delete one image from an image collection
    DeleteImage { collection_id: String, image_id: String },
    /// Manage link collections
    #[command(subcommand)]
    Link(LinkCommand),
    /// Delete a record of a resource
    Delete { resource: String, id: String },
}

#[derive(Subcommand, Debug)]
enum LinkCommand {
    Create(LinkFields),
    /// Update the link of a link collection
    Update {
        collection_id: String,
        #[command(flatten)]
        fields: LinkFields,
    },
    /// Delete the link of a link collection
    Delete { collection_id: String },
}

#[derive(Args, Debug)]
struct LinkFields {
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    url: String,
}

/// Shared handles for one CLI invocation
struct App {
    config: Config,
    api: Arc<dyn CollectionApi>,
    encoder: Arc<dyn Encoder>,
}

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size.max(1);
    }
    if let Some(concurrency) = cli.concurrency {
        config.encode_concurrency = Some(concurrency.max(1));
    }

    let client = GalleryClient::new(
        config.require_api_url()?,
        config.api_token.clone(),
        config.request_timeout,
    )?;
    let app = App {
        config,
        api: Arc::new(client),
        encoder: Arc::new(DataUriEncoder),
    };

    match cli.command {
        Command::List {
            resource,
            page,
            search,
        } => list(&app, &resource, page, &search).await,
        Command::Upload {
            title,
            description,
            strict,
            files,
        } => upload(&app, title, description, strict, &files).await,
        Command::ShowImages { id } => show_images(&app, &id).await,
        Command::EditImages {
            id,
            title,
            description,
            files,
        } => edit_images(&app, &id, title, description, &files).await,
        Command::DeleteImage {
            collection_id,
            image_id,
        } => delete_image(&app, &collection_id, &image_id).await,
        Command::Link(command) => link(&app, command).await,
        Command::Delete { resource, id } => delete(&app, &resource, &id).await,
    }
}

fn resource(name: &str) -> Result<ResourceConfig, Box<dyn Error>> {
    ResourceConfig::by_name(name)
        .ok_or_else(|| format!("Unknown resource '{}' (expected images, links or specs)", name).into())
}

fn stage(paths: &[PathBuf]) -> Result<Vec<FileRef>, Box<dyn Error>> {
    paths
        .iter()
        .map(|path| {
            FileRef::from_path(path).map_err(|e| -> Box<dyn Error> {
                format!("Cannot read {}: {}", path.display(), e).into()
            })
        })
        .collect()
}

fn log_update(update: &ConversionUpdate) {
    match update {
        ConversionUpdate::Started(key) => info!("Converting {}", key),
        ConversionUpdate::Ready(key) => info!("Converted {}", key),
        ConversionUpdate::Failed { key, reason } => warn!("Failed to convert {}: {}", key, reason),
        ConversionUpdate::Discarded(_) => {}
    }
}

/// Keep cells readable when they hold data URIs
fn shorten(cell: &str) -> String {
    const MAX: usize = 48;
    if cell.chars().count() <= MAX {
        cell.to_string()
    } else {
        format!("{}...", cell.chars().take(MAX).collect::<String>())
    }
}

async fn list(app: &App, name: &str, page: u32, search: &str) -> Result<(), Box<dyn Error>> {
    let mut table = RecordDispatcher::new(
        app.api.clone(),
        resource(name)?,
        RowCapabilities::none(),
        app.config.page_size,
        app.encoder.clone(),
        app.config.encode_concurrency,
    );
    table.set_search(search);
    table.refresh().await?;
    if page > 1 {
        table.go_to_page(page);
        table.refresh().await?;
    }

    let view = table.view();
    println!("{}", view.title);
    println!("{}", view.columns.join("\t"));
    match &view.placeholder {
        Some(placeholder) => println!("{}", placeholder),
        None => {
            for row in &view.rows {
                let cells: Vec<String> = row.cells.iter().map(|c| shorten(c)).collect();
                println!("{}", cells.join("\t"));
            }
        }
    }
    if let Some(summary) = &view.summary {
        println!("{}", summary);
    }
    if let Some(pagination) = &view.pagination {
        println!("Page {} of {}", pagination.page, pagination.total_pages);
    }
    Ok(())
}

async fn upload(
    app: &App,
    title: String,
    description: String,
    strict: bool,
    paths: &[PathBuf],
) -> Result<(), Box<dyn Error>> {
    let policy = if strict {
        SubmitPolicy::Strict
    } else {
        SubmitPolicy::Lenient
    };
    let mut session = UploadSession::new(
        app.api.clone(),
        ResourceConfig::image_collections().endpoint,
        app.encoder.clone(),
        app.config.encode_concurrency,
    )
    .with_policy(policy);

    session.set_title(title);
    session.set_description(description);
    session.add_files(stage(paths)?);

    while let Some(update) = session.next_update().await {
        log_update(&update);
    }

    let outcome = session.submit().await?;
    for skipped in &outcome.skipped {
        warn!("{} was not uploaded", skipped.key);
    }
    println!(
        "Uploaded {} of {} image(s)",
        outcome.image_count,
        paths.len()
    );
    Ok(())
}

fn detail_session(app: &App, id: &str) -> ImageDetailSession {
    ImageDetailSession::new(
        app.api.clone(),
        ResourceConfig::image_collections().endpoint,
        RecordId::from(id),
        app.encoder.clone(),
        app.config.encode_concurrency,
    )
}

async fn load_detail(session: &mut ImageDetailSession) -> Result<(), Box<dyn Error>> {
    match session.load().await? {
        DetailLoad::Loaded => Ok(()),
        DetailLoad::Redirect(_) => Err(format!("Image collection {} not found", session.id()).into()),
    }
}

async fn show_images(app: &App, id: &str) -> Result<(), Box<dyn Error>> {
    let mut session = detail_session(app, id);
    load_detail(&mut session).await?;

    if let Some(record) = session.record() {
        println!("{} ({})", record.title, record.id);
        println!("{}", record.description);
        if let Some(date) = record.upload_date() {
            println!("Uploaded {}", date);
        }
        if record.images.is_empty() {
            println!("No images");
        }
        for image in &record.images {
            println!("  {}\t{}", image.id, shorten(&image.image));
        }
    }
    Ok(())
}

async fn edit_images(
    app: &App,
    id: &str,
    title: Option<String>,
    description: Option<String>,
    paths: &[PathBuf],
) -> Result<(), Box<dyn Error>> {
    let mut session = detail_session(app, id);
    load_detail(&mut session).await?;

    session.begin_edit();
    if let Some(title) = title {
        session.set_title(title);
    }
    if let Some(description) = description {
        session.set_description(description);
    }
    session.add_files(stage(paths)?);
    for update in session.settle().await {
        log_update(&update);
    }

    session.save().await?;
    let count = session.record().map_or(0, |r| r.images.len());
    println!("Saved image collection {} ({} image(s))", id, count);
    Ok(())
}

async fn delete_image(app: &App, collection_id: &str, image_id: &str) -> Result<(), Box<dyn Error>> {
    let mut session = detail_session(app, collection_id);
    load_detail(&mut session).await?;

    session.delete_image(&RecordId::from(image_id)).await?;
    println!("Deleted image {}", image_id);
    Ok(())
}

async fn link(app: &App, command: LinkCommand) -> Result<(), Box<dyn Error>> {
    let config = ResourceConfig::link_collections();

    match command {
        LinkCommand::Create(fields) => {
            let mut modal = LinkFormModal::create(app.api.clone(), &config.endpoint);
            modal.title = fields.title;
            modal.description = fields.description;
            modal.url = fields.url;
            modal.submit().await?;
            println!("Created link");
        }
        LinkCommand::Update {
            collection_id,
            fields,
        } => {
            let record = app
                .api
                .get(&config.endpoint, &RecordId::from(collection_id.as_str()))
                .await?;
            let row = config.project_row(&record);
            let mut modal = LinkFormModal::edit(app.api.clone(), &config.endpoint, &row)?;
            if !fields.title.is_empty() {
                modal.title = fields.title;
            }
            if !fields.description.is_empty() {
                modal.description = fields.description;
            }
            if !fields.url.is_empty() {
                modal.url = fields.url;
            }
            modal.submit().await?;
            println!("Updated link of collection {}", collection_id);
        }
        LinkCommand::Delete { collection_id } => {
            delete(app, "links", &collection_id).await?;
        }
    }
    Ok(())
}

/// Delete one record through a listing surface so the confirmation and lock apply
async fn delete(app: &App, name: &str, id: &str) -> Result<(), Box<dyn Error>> {
    let config = resource(name)?;
    let mut table = RecordDispatcher::new(
        app.api.clone(),
        config,
        RowCapabilities::all(),
        app.config.page_size,
        app.encoder.clone(),
        app.config.encode_concurrency,
    );

    // Page through the listing until the row turns up
    let target = RecordId::from(id);
    table.refresh().await?;
    let index = loop {
        if let Some(index) = table
            .rows()
            .iter()
            .position(|row| row.id.as_ref() == Some(&target))
        {
            break index;
        }
        if !table.next_page() {
            return Err(format!("{} {} not found", table.config().title, id).into());
        }
        table.refresh().await?;
    };

    let request = table.request_delete(index)?;
    info!("Deleting {} via {}", request.id, request.endpoint);
    table.confirm_delete().await?;
    println!("Deleted {} {}", table.config().title, id);
    Ok(())
}
