//! Application services
//!
//! Services hold the logic that spans several repositories or an outbound
//! integration. Plain reads stay in the handlers, which call repositories
//! directly.

mod auth;
mod billing;
mod catalog;
mod family;
mod verification;

pub use auth::{AuthService, AuthSession, ProfessorSession};
pub use billing::{BillingService, CheckoutSession, PromoPreview, WebhookOutcome};
pub use catalog::{CatalogService, Editor, SheetSummary, UnlockOutcome};
pub use family::{ChildSummary, FamilyService};
pub use verification::{CodeSent, VerificationService};

use crate::db::repositories::is_unique_violation;
use crate::errors::AppError;

/// Replace a unique-constraint violation with `conflict()`
pub(crate) fn on_unique_violation<F>(err: AppError, conflict: F) -> AppError
where
    F: FnOnce() -> AppError,
{
    match &err {
        AppError::Database(db_err) if is_unique_violation(db_err) => conflict(),
        _ => err,
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-memory integrations recording what services send

    use crate::errors::{AppError, Result};
    use crate::integrations::{CreatedSubscription, EmailMessage, EmailSender, PaymentGateway, SmsGateway};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn first_code(text: &str) -> Option<String> {
        text.split(|c: char| !c.is_ascii_digit())
            .find(|run| run.len() >= 4)
            .map(String::from)
    }

    #[derive(Default)]
    pub struct RecordingSms {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSms {
        /// Code contained in the last message
        pub fn last_code(&self) -> Option<String> {
            let sent = self.sent.lock().unwrap();
            sent.last().and_then(|(_, body)| first_code(body))
        }
    }

    #[async_trait]
    impl SmsGateway for RecordingSms {
        async fn send(&self, to: &str, body: &str) -> Result<()> {
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingEmail {
        pub sent: Mutex<Vec<EmailMessage>>,
    }

    impl RecordingEmail {
        pub fn last_code(&self) -> Option<String> {
            let sent = self.sent.lock().unwrap();
            sent.last().and_then(|m| first_code(&m.text))
        }
    }

    #[async_trait]
    impl EmailSender for RecordingEmail {
        async fn send(&self, message: EmailMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    /// Payment gateway answering like Stripe in test mode
    #[derive(Default)]
    pub struct FakePayments {
        pub customers: Mutex<Vec<String>>,
        pub subscriptions: Mutex<Vec<(String, String, Option<String>)>>,
        pub canceled: Mutex<Vec<String>>,
        pub coupons: Mutex<Vec<i32>>,
        pub fail_subscriptions: bool,
    }

    #[async_trait]
    impl PaymentGateway for FakePayments {
        async fn create_customer(&self, _email: &str, _name: &str, user_id: Uuid) -> Result<String> {
            let id = format!("cus_{}", user_id.simple());
            self.customers.lock().unwrap().push(id.clone());
            Ok(id)
        }

        async fn create_subscription(
            &self,
            customer_id: &str,
            price_id: &str,
            coupon_id: Option<&str>,
        ) -> Result<CreatedSubscription> {
            if self.fail_subscriptions {
                return Err(AppError::PaymentProvider {
                    message: "card_error: Your card was declined.".into(),
                });
            }
            let mut subs = self.subscriptions.lock().unwrap();
            subs.push((customer_id.into(), price_id.into(), coupon_id.map(String::from)));
            let n = subs.len();
            Ok(CreatedSubscription {
                id: format!("sub_{}", n),
                status: "incomplete".into(),
                current_period_end: None,
                cancel_at_period_end: false,
                client_secret: Some(format!("pi_{}_secret", n)),
                payment_intent_id: Some(format!("pi_{}", n)),
                amount_due: 990,
                currency: "eur".into(),
            })
        }

        async fn cancel_subscription(&self, subscription_id: &str) -> Result<CreatedSubscription> {
            self.canceled.lock().unwrap().push(subscription_id.to_string());
            Ok(CreatedSubscription {
                id: subscription_id.to_string(),
                status: "active".into(),
                current_period_end: None,
                cancel_at_period_end: true,
                client_secret: None,
                payment_intent_id: None,
                amount_due: 0,
                currency: "eur".into(),
            })
        }

        async fn create_coupon(&self, percent_off: i32) -> Result<String> {
            self.coupons.lock().unwrap().push(percent_off);
            Ok(format!("coupon_{}", percent_off))
        }
    }
}
