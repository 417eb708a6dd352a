use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: Uuid,
    pub plan_id: Uuid,
    pub user_id: Uuid,
    pub date_booked: DateTime<Utc>,
    pub num_people: u32,
    pub payment_status: PaymentStatus,
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// New booking awaiting payment.
    ///
    /// `total_amount` is not derived from the plan price: there is no payment
    /// processing, so it stays 0 until an operator settles the booking.
    pub fn pending(plan_id: Uuid, user_id: Uuid, num_people: u32) -> Self {
        let now = Utc::now();
        Self {
            booking_id: Uuid::new_v4(),
            plan_id,
            user_id,
            date_booked: now,
            num_people,
            payment_status: PaymentStatus::Pending,
            total_amount: 0.0,
            created_at: now,
            updated_at: None,
        }
    }
}
