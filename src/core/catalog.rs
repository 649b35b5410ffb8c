use crate::domain::model::{PromoDefinition, PromoKind};
use crate::utils::error::{CheckoutError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Read-only promo code catalog, loaded once and passed in explicitly.
///
/// A broken catalog source is always a configuration fault; only a well-formed
/// catalog can answer "no such code".
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    promos: BTreeMap<String, PromoDefinition>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    promos: Vec<PromoDefinition>,
}

impl Catalog {
    pub fn from_definitions(definitions: Vec<PromoDefinition>) -> Result<Self> {
        let mut promos = BTreeMap::new();
        for def in definitions {
            validate_definition(&def)?;
            if promos.contains_key(&def.code) {
                return Err(CheckoutError::InvalidConfigValueError {
                    field: "promos.code".to_string(),
                    value: def.code.clone(),
                    reason: "Duplicate promo code".to_string(),
                });
            }
            promos.insert(def.code.clone(), def);
        }
        Ok(Self { promos })
    }

    /// 解析 `[[promos]]` 格式的 TOML 目錄
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| CheckoutError::ConfigValidationError {
                field: "catalog".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        Self::from_definitions(file.promos)
    }

    /// Reads a `code,kind,value,limit` CSV catalog.
    pub fn from_csv_reader<R: Read>(source: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        let definitions = reader
            .deserialize()
            .collect::<std::result::Result<Vec<PromoDefinition>, csv::Error>>()?;
        Self::from_definitions(definitions)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        match extension {
            "toml" => Self::from_toml_str(&std::fs::read_to_string(path)?),
            "csv" => Self::from_csv_reader(std::fs::File::open(path)?),
            other => Err(CheckoutError::InvalidConfigValueError {
                field: "catalog".to_string(),
                value: path.display().to_string(),
                reason: format!("Unsupported catalog format '{}'. Use toml or csv", other),
            }),
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn resolve(&self, code: &str) -> Result<&PromoDefinition> {
        self.promos
            .get(code)
            .ok_or_else(|| CheckoutError::PromoNotFound {
                code: code.to_string(),
            })
    }

    pub fn definitions(&self) -> impl Iterator<Item = &PromoDefinition> {
        self.promos.values()
    }

    pub fn len(&self) -> usize {
        self.promos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.promos.is_empty()
    }
}

fn validate_definition(def: &PromoDefinition) -> Result<()> {
    validate_non_empty_string("promos.code", &def.code)?;
    if !def.value.is_finite() || def.value <= 0.0 {
        return Err(CheckoutError::InvalidConfigValueError {
            field: format!("promos.{}.value", def.code),
            value: def.value.to_string(),
            reason: "Discount value must be a positive number".to_string(),
        });
    }
    if def.kind == PromoKind::Percent {
        validate_range(&format!("promos.{}.value", def.code), def.value, 0.0, 100.0)?;
    }
    Ok(())
}
