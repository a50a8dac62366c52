use clap::{Args, Subcommand};
use log::info;
use rust_decimal::Decimal;
use serde_json::Value;

use loan_sim_core::catalogue::{ProductCatalogue, ProductRequest};

use crate::input;

/// Location of the JSON product catalogue
#[derive(Args)]
pub struct CatalogueArgs {
    /// Path to the catalogue file (a JSON array of products)
    #[arg(long, env = "LOANSIM_CATALOGUE")]
    pub catalogue: String,
}

/// Product fields for add/update
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ProductFields {
    /// Product name
    #[arg(long)]
    pub name: String,

    /// Nominal annual rate in percent (0 to 100)
    #[arg(long)]
    pub annual_rate: Option<Decimal>,

    /// Longest term the product allows, in months
    #[arg(long)]
    pub max_term_months: Option<i64>,
}

#[derive(Subcommand)]
pub enum ProductsCommand {
    /// List every product in the catalogue
    List(CatalogueArgs),
    /// Show a single product
    Show {
        #[command(flatten)]
        catalogue: CatalogueArgs,
        /// Product id
        #[arg(long)]
        id: u64,
    },
    /// Add a product (the catalogue file is created if missing)
    Add {
        #[command(flatten)]
        catalogue: CatalogueArgs,
        #[command(flatten)]
        fields: ProductFields,
    },
    /// Replace a product's name, rate and maximum term
    Update {
        #[command(flatten)]
        catalogue: CatalogueArgs,
        /// Product id
        #[arg(long)]
        id: u64,
        #[command(flatten)]
        fields: ProductFields,
    },
    /// Remove a product
    Remove {
        #[command(flatten)]
        catalogue: CatalogueArgs,
        /// Product id
        #[arg(long)]
        id: u64,
    },
}

impl From<ProductFields> for ProductRequest {
    fn from(fields: ProductFields) -> Self {
        ProductRequest {
            name: fields.name,
            annual_rate: fields.annual_rate,
            max_term_months: fields.max_term_months,
        }
    }
}

/// Load the catalogue stored at `path`.
pub fn load_catalogue(path: &str) -> Result<ProductCatalogue, Box<dyn std::error::Error>> {
    let records = input::file::read_json(path)?;
    Ok(ProductCatalogue::from_products(records)?)
}

fn load_or_new(path: &str) -> Result<ProductCatalogue, Box<dyn std::error::Error>> {
    if input::file::exists(path) {
        load_catalogue(path)
    } else {
        info!("catalogue {path} not found; starting empty");
        Ok(ProductCatalogue::new())
    }
}

fn save_catalogue(path: &str, catalogue: &ProductCatalogue) -> Result<(), Box<dyn std::error::Error>> {
    input::file::write_json(path, &catalogue.list())
}

pub fn run_products(command: ProductsCommand) -> Result<Value, Box<dyn std::error::Error>> {
    match command {
        ProductsCommand::List(args) => {
            let catalogue = load_catalogue(&args.catalogue)?;
            Ok(serde_json::to_value(catalogue.list())?)
        }
        ProductsCommand::Show { catalogue, id } => {
            let catalogue = load_catalogue(&catalogue.catalogue)?;
            Ok(serde_json::to_value(catalogue.get(id)?)?)
        }
        ProductsCommand::Add { catalogue: args, fields } => {
            let mut catalogue = load_or_new(&args.catalogue)?;
            let product = catalogue.create(&fields.into())?;
            save_catalogue(&args.catalogue, &catalogue)?;
            Ok(serde_json::to_value(product)?)
        }
        ProductsCommand::Update { catalogue: args, id, fields } => {
            let mut catalogue = load_catalogue(&args.catalogue)?;
            let product = catalogue.update(id, &fields.into())?;
            save_catalogue(&args.catalogue, &catalogue)?;
            Ok(serde_json::to_value(product)?)
        }
        ProductsCommand::Remove { catalogue: args, id } => {
            let mut catalogue = load_catalogue(&args.catalogue)?;
            let product = catalogue.remove(id)?;
            save_catalogue(&args.catalogue, &catalogue)?;
            Ok(serde_json::to_value(product)?)
        }
    }
}
