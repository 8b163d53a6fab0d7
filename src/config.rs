use crate::payments::money;
use anyhow::{anyhow, Context, Result};
use bigdecimal::BigDecimal;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub paystack: PaystackSettings,
    pub payments: PaymentSettings,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` selects the in-process store
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Clone)]
pub struct PaystackSettings {
    pub secret_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for PaystackSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaystackSettings")
            .field("secret_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    /// Minor units, inclusive
    pub min_amount: i64,
    /// Minor units, inclusive
    pub max_amount: i64,
    /// Fail pending payments whose webhook verification cannot reach the gateway
    pub fail_on_verify_error: bool,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: "NGN".to_string(),
            min_amount: 100,
            max_amount: 100_000_000,
            fail_on_verify_error: true,
        }
    }
}

fn parse_major_amount(key: &str, raw: &str) -> Result<i64> {
    let amount = BigDecimal::from_str(raw.trim())
        .with_context(|| format!("{} must be a decimal amount", key))?;
    money::major_to_minor(&amount).map_err(|e| anyhow!("{}: {}", key, e))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{} must be true or false, got {}", key, other)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let server = ServerConfig {
            host: var("HOST", "0.0.0.0"),
            port: var("PORT", "8000")
                .parse()
                .context("PORT must be a valid number")?,
            environment: var("ENVIRONMENT", "development"),
        };

        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_connections: var("DATABASE_MAX_CONNECTIONS", "20")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
        };

        let paystack = PaystackSettings {
            secret_key: lookup("PAYSTACK_SECRET_KEY").context("PAYSTACK_SECRET_KEY not set")?,
            base_url: var("PAYSTACK_BASE_URL", "https://api.paystack.co"),
            timeout_secs: var("PAYSTACK_TIMEOUT_SECS", "30")
                .parse()
                .context("PAYSTACK_TIMEOUT_SECS must be a valid number")?,
        };

        let payments = PaymentSettings {
            currency: var("PAYMENT_CURRENCY", "NGN").trim().to_uppercase(),
            min_amount: parse_major_amount("PAYMENT_MIN_AMOUNT", &var("PAYMENT_MIN_AMOUNT", "1.00"))?,
            max_amount: parse_major_amount(
                "PAYMENT_MAX_AMOUNT",
                &var("PAYMENT_MAX_AMOUNT", "1000000.00"),
            )?,
            fail_on_verify_error: parse_bool(
                "PAYMENT_FAIL_ON_VERIFY_ERROR",
                &var("PAYMENT_FAIL_ON_VERIFY_ERROR", "true"),
            )?,
        };

        let config = Config {
            server,
            database,
            paystack,
            payments,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be at least 1"));
        }

        if self.paystack.secret_key.trim().is_empty() {
            return Err(anyhow!("PAYSTACK_SECRET_KEY cannot be empty"));
        }

        if self.paystack.base_url.trim().is_empty() {
            return Err(anyhow!("PAYSTACK_BASE_URL cannot be empty"));
        }

        if self.paystack.timeout_secs == 0 {
            return Err(anyhow!("PAYSTACK_TIMEOUT_SECS must be at least 1"));
        }

        if self.payments.currency.len() != 3 {
            return Err(anyhow!(
                "PAYMENT_CURRENCY must be a 3-letter code, got {}",
                self.payments.currency
            ));
        }

        if self.payments.min_amount <= 0 {
            return Err(anyhow!("PAYMENT_MIN_AMOUNT must be positive"));
        }

        if self.payments.min_amount > self.payments.max_amount {
            return Err(anyhow!(
                "PAYMENT_MIN_AMOUNT ({}) exceeds PAYMENT_MAX_AMOUNT ({})",
                money::format_minor(self.payments.min_amount),
                money::format_minor(self.payments.max_amount)
            ));
        }

        Ok(())
    }
}
