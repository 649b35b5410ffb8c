use crate::domain::order::OrderRequest;
use crate::utils::error::Result;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "promo-checkout")]
#[command(about = "Promo-code reservation and order dispatch for the storefront")]
pub struct CliConfig {
    #[arg(long, short, default_value = "promo-checkout.toml")]
    pub config: PathBuf,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Reset every catalogued promo counter to its limit
    Seed,
    /// Show the remaining count for a promo code
    Balance { code: String },
    /// Check whether a promo code can be applied, without consuming it
    Apply { code: String },
    /// Submit an order read from a JSON file
    Checkout {
        order_file: PathBuf,
        #[arg(long, help = "Override the promo code in the order file")]
        promo: Option<String>,
    },
    /// Validate the configuration and catalog, then exit
    Validate,
}

/// Reads an order request from a local JSON file.
pub fn load_order_request<P: AsRef<Path>>(path: P, promo: Option<&str>) -> Result<OrderRequest> {
    let data = fs::read(path)?;
    let mut request: OrderRequest = serde_json::from_slice(&data)?;
    if let Some(code) = promo {
        request.promo_code = Some(code.to_string());
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_checkout_subcommand() {
        let cli = CliConfig::parse_from([
            "promo-checkout",
            "--config",
            "shop.toml",
            "checkout",
            "order.json",
            "--promo",
            "NEW",
        ]);
        assert_eq!(cli.config, PathBuf::from("shop.toml"));
        match cli.command {
            Command::Checkout { order_file, promo } => {
                assert_eq!(order_file, PathBuf::from("order.json"));
                assert_eq!(promo.as_deref(), Some("NEW"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_load_order_request_with_promo_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"items":[{{"id":"p1","name":"Tea","qty":2,"unit":3.0}}],"fulfill":"pickup"}}"#
        )
        .unwrap();

        let request = load_order_request(file.path(), Some("NEWYEAR22")).unwrap();
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.promo_code.as_deref(), Some("NEWYEAR22"));
    }

    #[test]
    fn test_load_order_request_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_order_request(file.path(), None).is_err());
    }
}
