use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Donation record, created once per accepted donation request.
///
/// `payment_intent_id` is a back-reference to the processor-side payment
/// intent; the record never owns or mutates the intent's lifecycle. The
/// unique index on that column is the only serialization point for duplicate
/// submissions.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "donations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Minor currency units (cents)
    pub amount: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    pub currency: String,
    #[sea_orm(unique)]
    pub payment_intent_id: String,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Local donation status vocabulary. The processor's richer status set is
/// collapsed into these three values; updates past `pending` arrive
/// out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "succeeded")]
    Succeeded,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}
