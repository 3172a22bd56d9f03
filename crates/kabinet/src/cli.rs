//! Argument parsing, command dispatch and rendering.
//!
//! Every command runs as the `local` user, which is created on first use and
//! owns everything in the local data directory. `--json` switches rendering
//! from human-readable tables to one JSON document on stdout, so scripts can
//! consume the same commands.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kabinetapp::import::{
    export_collection, FieldMapping, ImportOptions, ImporterRegistry, ValueTransform,
};
use kabinetapp::media::FsMedia;
use kabinetapp::model::{localized, localized_text};
use kabinetapp::properties::{PropertyParams, PropertyType};
use kabinetapp::{
    AccessContext, CatalogStore, Collection, FsBackend, ItemDraft, ItemQuery, KabinetConfig,
    KabinetError, LoanState, SortDirection, SortKey,
};

#[derive(Parser)]
#[command(name = "kabinet", version, about = "Personal collection catalogue")]
struct Cli {
    /// Data directory (defaults to the OS data dir).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to kabinet.toml in the data directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Text,
    Longtext,
    Number,
    Date,
    Datetime,
    Rating,
    Yesno,
    Url,
    Image,
    File,
    Color,
}

impl From<KindArg> for PropertyType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Text => PropertyType::Text,
            KindArg::Longtext => PropertyType::LongText,
            KindArg::Number => PropertyType::Number,
            KindArg::Date => PropertyType::Date,
            KindArg::Datetime => PropertyType::DateTime,
            KindArg::Rating => PropertyType::Rating,
            KindArg::Yesno => PropertyType::YesNo,
            KindArg::Url => PropertyType::Url,
            KindArg::Image => PropertyType::Image,
            KindArg::File => PropertyType::File,
            KindArg::Color => PropertyType::Color,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List collections.
    Collections,
    /// Create a collection.
    CreateCollection {
        name: String,
        /// Free-form type tag ("books", "games", ...).
        #[arg(long, default_value = "generic")]
        kind: String,
    },
    /// Delete a collection and everything it owns.
    DeleteCollection { collection: Uuid },
    /// Show a collection's property schema.
    Properties { collection: Uuid },
    /// Define a property on a collection.
    DefineProperty {
        collection: Uuid,
        name: String,
        #[arg(long, value_enum, default_value = "text")]
        kind: KindArg,
        #[arg(long)]
        title: bool,
        #[arg(long)]
        cover: bool,
        #[arg(long)]
        multiple: bool,
        #[arg(long)]
        filterable: bool,
        #[arg(long)]
        sortable: bool,
    },
    /// List items of a collection, with filters and sorting.
    Items {
        collection: Uuid,
        /// Filter as property=expression; repeatable, all must match.
        #[arg(long = "filter", value_name = "PROP=EXPR")]
        filters: Vec<String>,
        /// Sort key as property or property:desc; repeatable.
        #[arg(long = "sort", value_name = "PROP[:desc]")]
        sort: Vec<String>,
        /// Page size; 0 returns everything. Defaults to the configured
        /// page_size.
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one item with all its values.
    Show { collection: Uuid, item: Uuid },
    /// Create an item, with initial values as property=value pairs.
    Add {
        collection: Uuid,
        /// Initial values as property=value; repeat a property for rows.
        #[arg(value_name = "PROP=VALUE")]
        values: Vec<String>,
    },
    /// Overwrite one property's values on an item.
    Set {
        collection: Uuid,
        item: Uuid,
        property: String,
        values: Vec<String>,
    },
    /// Delete an item.
    DeleteItem { collection: Uuid, item: Uuid },
    /// List the fields a source file would import.
    Scan { file: PathBuf },
    /// Import a file into a collection.
    Import {
        collection: Uuid,
        file: PathBuf,
        /// Dedup key property; defaults to the schema's id property.
        #[arg(long)]
        id_property: Option<String>,
        /// Field rename as from=to; to empty discards the field.
        #[arg(long = "rename", value_name = "FROM=TO")]
        renames: Vec<String>,
        /// Copy the named field's values into media storage.
        #[arg(long = "download", value_name = "PROP")]
        downloads: Vec<String>,
        /// Do not auto-create properties for unknown fields.
        #[arg(long)]
        no_auto_create: bool,
    },
    /// Export a collection to a .kab archive.
    Export { collection: Uuid, file: PathBuf },
    /// List loans of a collection.
    Loans { collection: Uuid },
    /// Lend an item out.
    Lend {
        collection: Uuid,
        item: Uuid,
        borrower: String,
    },
    /// Mark a loan returned.
    Return { collection: Uuid, loan: Uuid },
}

pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => ProjectDirs::from("org", "kabinet", "kabinet")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| anyhow!("cannot determine a data directory, pass --data-dir"))?,
    };
    debug!(data_dir = %data_dir.display(), "opening catalog");

    let config_file = cli.config.clone().or_else(|| {
        let default = data_dir.join("kabinet.toml");
        default.exists().then_some(default)
    });
    let config = KabinetConfig::load(config_file.as_deref())?;

    let mut store = CatalogStore::new(FsBackend::new(&data_dir));
    let ctx = local_context(&store)?;
    let media_dir = config
        .media_dir
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("media"));

    dispatch(&cli, &mut store, &ctx, &config, &media_dir)
}

/// The single-user context every CLI command runs under. The `local` user is
/// created on first use.
fn local_context(store: &CatalogStore<FsBackend>) -> anyhow::Result<AccessContext> {
    let user = match store.get_user_by_username("local") {
        Ok(user) => user,
        Err(KabinetError::UserNotFound(_)) => store.create_user("local")?,
        Err(err) => return Err(err.into()),
    };
    Ok(AccessContext::authenticated(user.id))
}

fn dispatch(
    cli: &Cli,
    store: &mut CatalogStore<FsBackend>,
    ctx: &AccessContext,
    config: &KabinetConfig,
    media_dir: &Path,
) -> anyhow::Result<()> {
    match &cli.command {
        Command::Collections => {
            let collections = store.list_collections(ctx)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&collections)?);
            } else if collections.is_empty() {
                println!("no collections");
            } else {
                for coll in &collections {
                    println!(
                        "{}  {}  [{}]",
                        coll.id,
                        collection_name(coll, &config.locale),
                        coll.kind
                    );
                }
            }
        }
        Command::CreateCollection { name, kind } => {
            let owner = ctx
                .user
                .ok_or_else(|| anyhow!("no local user"))?;
            let coll = store.create_collection(localized(&config.locale, name), kind, owner)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&coll)?);
            } else {
                println!("created {}", coll.id);
            }
        }
        Command::DeleteCollection { collection } => {
            store.delete_collection(*collection)?;
            if !cli.json {
                println!("deleted {collection}");
            }
        }
        Command::Properties { collection } => {
            let coll = store.get_collection(ctx, *collection)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&coll.properties)?);
            } else {
                for prop in &coll.properties {
                    let mut flags = Vec::new();
                    for (set, tag) in [
                        (prop.is_id, "id"),
                        (prop.is_title, "title"),
                        (prop.is_cover, "cover"),
                        (prop.multiple, "multiple"),
                        (prop.filterable, "filterable"),
                        (prop.sortable, "sortable"),
                    ] {
                        if set {
                            flags.push(tag);
                        }
                    }
                    println!("{:<20} {:?}  {}", prop.name, prop.kind, flags.join(","));
                }
            }
        }
        Command::DefineProperty {
            collection,
            name,
            kind,
            title,
            cover,
            multiple,
            filterable,
            sortable,
        } => {
            let params = PropertyParams {
                kind: Some((*kind).into()),
                is_title: *title,
                is_cover: *cover,
                multiple: *multiple,
                filterable: *filterable,
                sortable: *sortable,
                ..Default::default()
            };
            let prop = store.define_property(*collection, name, params)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&prop)?);
            } else {
                println!("defined {}", prop.name);
            }
        }
        Command::Items {
            collection,
            filters,
            sort,
            limit,
            offset,
        } => {
            let query = ItemQuery {
                filters: parse_pairs(filters, "filter")?,
                sort: parse_sort(sort)?,
                limit: limit.unwrap_or(config.page_size),
                offset: *offset,
            };
            let media = FsMedia::new(media_dir);
            let page = store.dump_items(ctx, *collection, &query, &media)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                for card in &page.items {
                    println!("{}  {}", card.id, card.name);
                }
                println!("{} of {} item(s)", page.items.len(), page.total);
            }
        }
        Command::Show { collection, item } => {
            let item = store.get_item(ctx, *collection, *item)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&item)?);
            } else {
                println!("{}  {}", item.id, item.name);
                for (property, values) in &item.values {
                    println!("  {:<18} {}", property, values.join(", "));
                }
            }
        }
        Command::Add { collection, values } => {
            let mut properties: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for pair in values {
                let (property, value) = split_pair(pair, "value")?;
                properties.entry(property).or_default().push(value);
            }
            let item = store.create_item(
                *collection,
                ItemDraft {
                    visibility: None,
                    properties,
                },
            )?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&item)?);
            } else {
                println!("created {}", item.id);
            }
        }
        Command::Set {
            collection,
            item,
            property,
            values,
        } => {
            let item = store.set_property_value(*collection, *item, property, values)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&item)?);
            } else {
                println!("updated {}", item.id);
            }
        }
        Command::DeleteItem { collection, item } => {
            store.delete_item(*collection, *item)?;
            if !cli.json {
                println!("deleted {item}");
            }
        }
        Command::Scan { file } => {
            let mut importer = importer_for(file)?;
            importer.load(file)?;
            let fields = importer.scan_fields();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&fields)?);
            } else {
                println!(
                    "{} record(s), fields: {}",
                    importer.records().len(),
                    fields.join(", ")
                );
            }
        }
        Command::Import {
            collection,
            file,
            id_property,
            renames,
            downloads,
            no_auto_create,
        } => {
            let mut mapping = FieldMapping::default();
            for pair in renames {
                let (from, to) = split_pair(pair, "rename")?;
                mapping = mapping.rename(from, to);
            }
            for field in downloads {
                mapping = mapping.transform(field.clone(), ValueTransform::Download);
            }
            let media = FsMedia::new(media_dir);

            let mut importer = importer_for(file)?;
            importer.load(file)?;
            let report = importer.import(
                store,
                &ImportOptions {
                    collection: *collection,
                    mapping,
                    id_property: id_property.clone(),
                    auto_create: !no_auto_create,
                    media: &media,
                },
            )?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "created": report.created,
                        "updated": report.updated,
                        "skipped": report.skipped,
                        "properties_created": report.properties_created,
                        "errors": report.errors,
                    })
                );
            } else {
                println!(
                    "imported: {} created, {} updated, {} skipped, {} properties added",
                    report.created, report.updated, report.skipped, report.properties_created
                );
                for error in &report.errors {
                    eprintln!("  skipped: {error}");
                }
            }
        }
        Command::Export { collection, file } => {
            let media = FsMedia::new(media_dir);
            export_collection(store, ctx, *collection, file, &media)?;
            if !cli.json {
                println!("exported to {}", file.display());
            }
        }
        Command::Loans { collection } => {
            let loans = store.list_loans(*collection)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&loans)?);
            } else if loans.is_empty() {
                println!("no loans");
            } else {
                for loan in &loans {
                    println!("{}  {:?}  {}  item {}", loan.id, loan.state, loan.borrower, loan.item_id);
                }
            }
        }
        Command::Lend {
            collection,
            item,
            borrower,
        } => {
            let loan = store.request_loan(*collection, *item, borrower.clone())?;
            let loan = store.advance_loan(*collection, loan.id, LoanState::Lent)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&loan)?);
            } else {
                println!("lent to {} (loan {})", loan.borrower, loan.id);
            }
        }
        Command::Return { collection, loan } => {
            let loan = store.advance_loan(*collection, *loan, LoanState::Returned)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&loan)?);
            } else {
                println!("returned (loan {})", loan.id);
            }
        }
    }
    Ok(())
}

fn collection_name(coll: &Collection, locale: &str) -> String {
    localized_text(&coll.name, locale)
        .unwrap_or("(unnamed)")
        .to_string()
}

fn importer_for(file: &Path) -> anyhow::Result<Box<dyn kabinetapp::import::Importer>> {
    let registry = ImporterRegistry::with_defaults();
    registry.for_path(file).with_context(|| {
        format!(
            "no importer for {} (known extensions: {})",
            file.display(),
            registry.extensions().join(", ")
        )
    })
}

fn split_pair(pair: &str, what: &str) -> anyhow::Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("malformed {what} '{pair}', expected key=value"),
    }
}

fn parse_pairs(pairs: &[String], what: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for pair in pairs {
        let (key, value) = split_pair(pair, what)?;
        map.insert(key, value);
    }
    Ok(map)
}

fn parse_sort(keys: &[String]) -> anyhow::Result<Vec<SortKey>> {
    keys.iter()
        .map(|key| match key.split_once(':') {
            None => Ok(SortKey::asc(key)),
            Some((property, "asc")) => Ok(SortKey::asc(property)),
            Some((property, "desc")) => Ok(SortKey {
                property: property.to_string(),
                direction: SortDirection::Desc,
            }),
            Some((_, other)) => bail!("unknown sort direction '{other}', expected asc or desc"),
        })
        .collect()
}
