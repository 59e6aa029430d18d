use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use miette::miette;
use pharmacy_backoffice::application::requests::{PersonRequest, PersonUpdate, ProductRequest};
use pharmacy_backoffice::config::{AppConfig, load_config};
use pharmacy_backoffice::domain::ids::{CartLineId, PersonId, ProductId, SaleId};
use pharmacy_backoffice::domain::person::Role;
use pharmacy_backoffice::domain::ports::Principal;
use pharmacy_backoffice::error::PharmacyError;
use pharmacy_backoffice::interfaces::backoffice::{Backoffice, StoreSet};
use pharmacy_backoffice::interfaces::csv::product_reader::ProductReader;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Pharmacy back office: catalog, accounts, carts and sales", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Products CSV imported before the command runs
    #[arg(long, global = true)]
    seed_products: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Product catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// Persons and credentials
    #[command(subcommand)]
    Person(PersonCommand),
    /// The acting person's cart
    #[command(subcommand)]
    Cart(CartCommand),
    /// Sales
    #[command(subcommand)]
    Sale(SaleCommand),
}

#[derive(Subcommand)]
enum CatalogCommand {
    List,
    Get { id: u64 },
    Create(ProductArgs),
    Update {
        id: u64,
        #[command(flatten)]
        product: ProductArgs,
    },
    Delete { id: u64 },
    /// Import every row of a products CSV
    Import { csv: PathBuf },
}

#[derive(Subcommand)]
enum PersonCommand {
    List,
    Get { id: u64 },
    /// Self-service sign-up; the role is always `user`
    Register(PersonArgs),
    /// Administrative creation honouring `--role`
    Create(PersonArgs),
    Update {
        id: u64,
        #[command(flatten)]
        update: PersonUpdateArgs,
    },
    Delete { id: u64 },
    Authenticate {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    ChangePassword {
        #[command(flatten)]
        actor: Actor,
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
}

#[derive(Subcommand)]
enum CartCommand {
    Show(Actor),
    Add {
        #[command(flatten)]
        actor: Actor,
        #[arg(long)]
        product: u64,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,
    },
    Remove {
        #[command(flatten)]
        actor: Actor,
        #[arg(long)]
        line: u64,
    },
    /// Overwrite a line's quantity; 0 removes the line
    Set {
        #[command(flatten)]
        actor: Actor,
        #[arg(long)]
        line: u64,
        #[arg(long, allow_negative_numbers = true)]
        quantity: i64,
    },
    Clear(Actor),
    /// Turn the cart into a sale and empty it
    Checkout(Actor),
}

#[derive(Subcommand)]
enum SaleCommand {
    List,
    Get { id: u64 },
    Create {
        #[arg(long)]
        buyer: u64,
        /// `<product>:<quantity>`, repeatable
        #[arg(long = "line", value_parser = parse_line, allow_negative_numbers = true)]
        lines: Vec<(ProductId, i64)>,
    },
    /// Reassign the buyer
    Update {
        id: u64,
        #[arg(long)]
        buyer: u64,
    },
    Delete { id: u64 },
    /// The acting person's purchase history
    Mine(Actor),
}

#[derive(Args)]
struct Actor {
    /// E-mail of the acting person
    #[arg(long = "as")]
    email: String,
}

#[derive(Args)]
struct ProductArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    price: Decimal,
    #[arg(long)]
    description: String,
    #[arg(long)]
    image_link: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    expiry_date: NaiveDate,
    #[arg(long)]
    manufacturer: String,
}

#[derive(Args)]
struct PersonArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    national_id: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long, value_parser = parse_role)]
    role: Option<Role>,
}

#[derive(Args)]
struct PersonUpdateArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    national_id: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[arg(long, value_parser = parse_role)]
    role: Option<Role>,
}

impl From<ProductArgs> for ProductRequest {
    fn from(args: ProductArgs) -> Self {
        Self {
            name: args.name,
            price: args.price,
            description: args.description,
            image_link: args.image_link,
            expiry_date: args.expiry_date,
            manufacturer: args.manufacturer,
        }
    }
}

impl From<PersonArgs> for PersonRequest {
    fn from(args: PersonArgs) -> Self {
        Self {
            name: args.name,
            national_id: args.national_id,
            phone: args.phone,
            email: args.email,
            password: args.password,
            role: args.role,
        }
    }
}

impl From<PersonUpdateArgs> for PersonUpdate {
    fn from(args: PersonUpdateArgs) -> Self {
        Self {
            name: args.name,
            national_id: args.national_id,
            phone: args.phone,
            email: args.email,
            password: args.password,
            role: args.role,
        }
    }
}

impl Actor {
    fn principal(&self) -> Principal {
        Principal::new(self.email.clone())
    }
}

fn parse_line(raw: &str) -> Result<(ProductId, i64), String> {
    let (product, quantity) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected <product>:<quantity>, got '{raw}'"))?;
    let product: u64 = product
        .trim()
        .parse()
        .map_err(|e| format!("bad product id '{product}': {e}"))?;
    let quantity: i64 = quantity
        .trim()
        .parse()
        .map_err(|e| format!("bad quantity '{quantity}': {e}"))?;
    Ok((ProductId::new(product), quantity))
}

fn parse_role(raw: &str) -> Result<Role, String> {
    match raw.to_ascii_lowercase().as_str() {
        "admin" => Ok(Role::Admin),
        "employee" => Ok(Role::Employee),
        "user" => Ok(Role::User),
        other => Err(format!("unknown role '{other}' (admin, employee, user)")),
    }
}

fn exit_code(err: &PharmacyError) -> u8 {
    match err {
        PharmacyError::NotFound { .. } => 3,
        PharmacyError::InvalidInput(_) => 4,
        PharmacyError::Conflict { .. } => 5,
        PharmacyError::Unauthorized | PharmacyError::Unauthenticated => 6,
        PharmacyError::Config(_) => 7,
        _ => 1,
    }
}

fn open_stores(db_path: Option<PathBuf>) -> Result<StoreSet, PharmacyError> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            info!(path = %path.display(), "Using RocksDB storage");
            StoreSet::rocksdb(path)
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(StoreSet::in_memory())
        }
        None => Ok(StoreSet::in_memory()),
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), PharmacyError> {
    let stores = open_stores(cli.db_path.or(config.storage.db_path.clone()))?;
    let office = Backoffice::from_config(stores, &config);

    if let Some(path) = cli.seed_products {
        let reader = ProductReader::new(File::open(&path)?);
        let seeded = office.catalog().import_products(reader.products()).await?;
        info!(count = seeded.len(), path = %path.display(), "Seeded products");
    }

    match cli.command {
        Command::Catalog(command) => {
            let catalog = office.catalog();
            match command {
                CatalogCommand::List => emit(&catalog.list_products().await?),
                CatalogCommand::Get { id } => emit(&catalog.get_product(ProductId::new(id)).await?),
                CatalogCommand::Create(product) => {
                    emit(&catalog.create_product(product.into()).await?)
                }
                CatalogCommand::Update { id, product } => emit(
                    &catalog
                        .update_product(ProductId::new(id), product.into())
                        .await?,
                ),
                CatalogCommand::Delete { id } => {
                    catalog.delete_product(ProductId::new(id)).await?;
                    emit(&json!({ "deleted": "product", "id": id }))
                }
                CatalogCommand::Import { csv } => {
                    let reader = ProductReader::new(File::open(csv)?);
                    emit(&catalog.import_products(reader.products()).await?)
                }
            }
        }
        Command::Person(command) => {
            let accounts = office.accounts();
            match command {
                PersonCommand::List => emit(&accounts.list_persons().await?),
                PersonCommand::Get { id } => emit(&accounts.get_person(PersonId::new(id)).await?),
                PersonCommand::Register(person) => emit(&accounts.register(person.into()).await?),
                PersonCommand::Create(person) => {
                    emit(&accounts.create_person(person.into()).await?)
                }
                PersonCommand::Update { id, update } => emit(
                    &accounts
                        .update_person(PersonId::new(id), update.into())
                        .await?,
                ),
                PersonCommand::Delete { id } => {
                    accounts.delete_person(PersonId::new(id)).await?;
                    emit(&json!({ "deleted": "person", "id": id }))
                }
                PersonCommand::Authenticate { email, password } => {
                    emit(&accounts.authenticate(&email, &password).await?)
                }
                PersonCommand::ChangePassword {
                    actor,
                    current,
                    new,
                } => {
                    office
                        .change_my_password(&actor.principal(), &current, &new)
                        .await?;
                    emit(&json!({ "password_changed": actor.email }))
                }
            }
        }
        Command::Cart(command) => match command {
            CartCommand::Show(actor) => emit(&office.my_cart(&actor.principal()).await?),
            CartCommand::Add {
                actor,
                product,
                quantity,
            } => emit(
                &office
                    .add_to_my_cart(&actor.principal(), ProductId::new(product), quantity)
                    .await?,
            ),
            CartCommand::Remove { actor, line } => emit(
                &office
                    .remove_from_my_cart(&actor.principal(), CartLineId::new(line))
                    .await?,
            ),
            CartCommand::Set {
                actor,
                line,
                quantity,
            } => emit(
                &office
                    .set_my_cart_quantity(&actor.principal(), CartLineId::new(line), quantity)
                    .await?,
            ),
            CartCommand::Clear(actor) => emit(&office.clear_my_cart(&actor.principal()).await?),
            CartCommand::Checkout(actor) => emit(&office.checkout(&actor.principal()).await?),
        },
        Command::Sale(command) => {
            let sales = office.sales();
            match command {
                SaleCommand::List => emit(&sales.list_sales().await?),
                SaleCommand::Get { id } => emit(&sales.get_sale(SaleId::new(id)).await?),
                SaleCommand::Create { buyer, lines } => {
                    emit(&sales.create_sale(PersonId::new(buyer), lines).await?)
                }
                SaleCommand::Update { id, buyer } => emit(
                    &sales
                        .update_sale(SaleId::new(id), PersonId::new(buyer))
                        .await?,
                ),
                SaleCommand::Delete { id } => {
                    sales.delete_sale(SaleId::new(id)).await?;
                    emit(&json!({ "deleted": "sale", "id": id }))
                }
                SaleCommand::Mine(actor) => emit(&office.my_sales(&actor.principal()).await?),
            }
        }
    }
}

fn emit<T: Serialize>(value: &T) -> Result<(), PharmacyError> {
    let out =
        serde_json::to_string_pretty(value).map_err(|e| PharmacyError::InternalError(Box::new(e)))?;
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(|path| load_config(path)).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => return report(err),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(err),
    }
}

fn report(err: PharmacyError) -> ExitCode {
    let code = exit_code(&err);
    eprintln!("{:?}", miette!("{}", err));
    ExitCode::from(code)
}
