use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::UserId;
use crate::errors::DomainError;
use crate::segmentation::classify;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(format!("cust-{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Nuevo,
    #[serde(rename = "VIP")]
    Vip,
    Frecuente,
    Ocasional,
    Inactivo,
    #[serde(rename = "En Riesgo")]
    EnRiesgo,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Nuevo => "Nuevo",
            Segment::Vip => "VIP",
            Segment::Frecuente => "Frecuente",
            Segment::Ocasional => "Ocasional",
            Segment::Inactivo => "Inactivo",
            Segment::EnRiesgo => "En Riesgo",
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Segment {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Nuevo" => Ok(Self::Nuevo),
            "VIP" => Ok(Self::Vip),
            "Frecuente" => Ok(Self::Frecuente),
            "Ocasional" => Ok(Self::Ocasional),
            "Inactivo" => Ok(Self::Inactivo),
            "En Riesgo" => Ok(Self::EnRiesgo),
            other => Err(DomainError::UnknownLabel { kind: "segment", value: other.to_string() }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoyaltyLevel {
    Bronce,
    Plata,
    Oro,
    Platino,
    Diamante,
}

impl LoyaltyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LoyaltyLevel::Bronce => "Bronce",
            LoyaltyLevel::Plata => "Plata",
            LoyaltyLevel::Oro => "Oro",
            LoyaltyLevel::Platino => "Platino",
            LoyaltyLevel::Diamante => "Diamante",
        }
    }
}

impl std::str::FromStr for LoyaltyLevel {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Bronce" => Ok(Self::Bronce),
            "Plata" => Ok(Self::Plata),
            "Oro" => Ok(Self::Oro),
            "Platino" => Ok(Self::Platino),
            "Diamante" => Ok(Self::Diamante),
            other => Err(DomainError::UnknownLabel { kind: "loyalty level", value: other.to_string() }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChurnRisk {
    Bajo,
    Medio,
    Alto,
}

impl ChurnRisk {
    pub fn as_str(self) -> &'static str {
        match self {
            ChurnRisk::Bajo => "Bajo",
            ChurnRisk::Medio => "Medio",
            ChurnRisk::Alto => "Alto",
        }
    }
}

impl std::str::FromStr for ChurnRisk {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Bajo" => Ok(Self::Bajo),
            "Medio" => Ok(Self::Medio),
            "Alto" => Ok(Self::Alto),
            other => Err(DomainError::UnknownLabel { kind: "churn risk", value: other.to_string() }),
        }
    }
}

/// Engagement snapshot derived from a customer's qualifying orders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerMetrics {
    pub total_orders: u32,
    pub total_spent: Decimal,
    pub average_order_value: Decimal,
    pub last_order_date: Option<DateTime<Utc>>,
    pub days_since_last_order: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerPreferences {
    /// Most-bought category first.
    pub categories: Vec<String>,
}

impl CustomerPreferences {
    pub fn top_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Provisioned,
    OrderPlaced,
    MetricsRecomputed,
}

impl InteractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::Provisioned => "provisioned",
            InteractionKind::OrderPlaced => "order_placed",
            InteractionKind::MetricsRecomputed => "metrics_recomputed",
        }
    }
}

impl std::str::FromStr for InteractionKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "provisioned" => Ok(Self::Provisioned),
            "order_placed" => Ok(Self::OrderPlaced),
            "metrics_recomputed" => Ok(Self::MetricsRecomputed),
            other => {
                Err(DomainError::UnknownLabel { kind: "interaction kind", value: other.to_string() })
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInteraction {
    pub kind: InteractionKind,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub user_id: UserId,
    pub segment: Segment,
    pub loyalty_level: LoyaltyLevel,
    pub churn_risk: Option<ChurnRisk>,
    pub lifetime_value: Decimal,
    pub is_high_value: bool,
    pub metrics: CustomerMetrics,
    pub preferences: CustomerPreferences,
    pub interactions: Vec<CustomerInteraction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Fresh record for a user with no purchase history yet.
    pub fn provision(user_id: UserId, now: DateTime<Utc>) -> Self {
        let mut customer = Self {
            id: CustomerId::generate(),
            user_id,
            segment: Segment::Nuevo,
            loyalty_level: LoyaltyLevel::Bronce,
            churn_risk: None,
            lifetime_value: Decimal::ZERO,
            is_high_value: false,
            metrics: CustomerMetrics::default(),
            preferences: CustomerPreferences::default(),
            interactions: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        customer.apply_metrics(CustomerMetrics::default(), now);
        customer.record_interaction(InteractionKind::Provisioned, "customer record created", now);
        customer
    }

    /// Replaces the metrics snapshot and re-derives every label from it.
    pub fn apply_metrics(&mut self, metrics: CustomerMetrics, now: DateTime<Utc>) {
        let classification = classify(&metrics);
        self.segment = classification.segment;
        self.churn_risk = classification.churn_risk;
        self.loyalty_level = classification.loyalty_level;
        self.lifetime_value = classification.lifetime_value;
        self.is_high_value = classification.is_high_value;
        self.metrics = metrics;
        self.updated_at = now;
    }

    pub fn record_interaction(
        &mut self,
        kind: InteractionKind,
        description: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) {
        self.interactions.push(CustomerInteraction {
            kind,
            description: description.into(),
            occurred_at,
        });
    }
}
